use std::io::Write;

use super::{ReportSink, Summary};
use crate::Result;

const INDENT: &str = "      ";

/// Prints the metric summary as plain text
pub struct ConsoleSummary<W: Write> {
    out: W,
}

impl ConsoleSummary<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleSummary<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ReportSink for ConsoleSummary<W> {
    fn show_metrics(&mut self, summary: &Summary) -> Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "information to {}", summary.symbol)?;
        if let Some(start) = summary.start_date {
            writeln!(self.out, "{INDENT}start_date: {start}")?;
        }
        if let Some(end) = summary.end_date {
            writeln!(self.out, "{INDENT}end_date: {end}")?;
        }
        writeln!(self.out)?;

        for metric in &summary.metrics {
            writeln!(
                self.out,
                "{INDENT}{}: {}",
                metric.display_name,
                metric.formatted_value()
            )?;
        }

        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::BacktestMetrics;
    use chrono::NaiveDate;

    fn summary() -> Summary {
        Summary {
            symbol: "MSFT".to_string(),
            start_date: NaiveDate::from_ymd_opt(2019, 6, 1),
            end_date: NaiveDate::from_ymd_opt(2022, 1, 6),
            metrics: BacktestMetrics::compute(&[], &[], 1000.0).metrics,
        }
    }

    #[test]
    fn test_summary_layout() {
        let mut sink = ConsoleSummary::new(Vec::new());
        sink.show_metrics(&summary()).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "information to MSFT");
        assert_eq!(lines[2], "      start_date: 2019-06-01");
        assert_eq!(lines[3], "      end_date: 2022-01-06");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "      Cumulative Returns (%): 0");
        assert!(lines.contains(&"      Total Trades: 0"));
        assert_eq!(lines.len(), 5 + 12);
    }

    #[test]
    fn test_summary_without_dates() {
        let mut summary = summary();
        summary.start_date = None;
        summary.end_date = None;
        summary.metrics.truncate(1);

        let mut sink = ConsoleSummary::new(Vec::new());
        sink.show_metrics(&summary).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(text, "\ninformation to MSFT\n\n      Cumulative Returns (%): 0\n");
    }

    #[test]
    fn test_chart_is_ignored() {
        let mut sink = ConsoleSummary::new(Vec::new());
        let chart = crate::report::ChartData {
            title: "t".to_string(),
            panels: Vec::new(),
        };
        sink.render_chart(&chart).unwrap();
        assert!(sink.into_inner().is_empty());
    }
}
