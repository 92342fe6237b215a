// Backtest reporting: chart rendering and metric summaries
pub mod chart;
pub mod summary;

pub use chart::HtmlChart;
pub use summary::ConsoleSummary;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::backtest::metrics::Metric;
use crate::backtest::BacktestResult;
use crate::config::ReportSettings;
use crate::indicators::rolling_sma;
use crate::models::TradeSide;
use crate::Result;

/// One subplot row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Panel {
    StockValue,
    AccountValue,
    Trades,
}

impl Panel {
    pub fn title(&self) -> &'static str {
        match self {
            Panel::StockValue => "Stock Value",
            Panel::AccountValue => "Account Value",
            Panel::Trades => "Trades",
        }
    }
}

/// Which rows the chart shows, top to bottom
pub fn subplot_layout(show_stock_value: bool, show_account_value: bool, show_trades: bool) -> Vec<Panel> {
    let mut rows = Vec::new();

    if show_stock_value {
        rows.push(Panel::StockValue);
    }
    if show_account_value {
        rows.push(Panel::AccountValue);
    }
    if show_trades {
        rows.push(Panel::Trades);
    }

    rows
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceMode {
    Lines,
    Markers,
}

/// A named time series drawn in one panel
#[derive(Debug, Clone, Serialize)]
pub struct Series {
    pub name: String,
    pub x: Vec<DateTime<Utc>>,
    pub y: Vec<f64>,
    pub mode: TraceMode,
    pub show_legend: bool,
}

impl Series {
    fn line(name: &str, points: impl IntoIterator<Item = (DateTime<Utc>, f64)>, show_legend: bool) -> Self {
        let (x, y) = points.into_iter().unzip();
        Self {
            name: name.to_string(),
            x,
            y,
            mode: TraceMode::Lines,
            show_legend,
        }
    }

    fn markers(name: &str, points: impl IntoIterator<Item = (DateTime<Utc>, f64)>) -> Self {
        let (x, y) = points.into_iter().unzip();
        Self {
            name: name.to_string(),
            x,
            y,
            mode: TraceMode::Markers,
            show_legend: true,
        }
    }
}

/// Everything needed to draw the backtest chart
#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub title: String,
    pub panels: Vec<(Panel, Vec<Series>)>,
}

impl ChartData {
    pub fn from_result(result: &BacktestResult, settings: &ReportSettings) -> Self {
        // Only show the stock row when there is data for it
        let show_stock = settings.show_stock_value && !result.price_history.is_empty();
        let rows = subplot_layout(show_stock, settings.show_account_value, settings.show_trades);

        let panels = rows
            .into_iter()
            .map(|panel| {
                let series = match panel {
                    Panel::StockValue => stock_series(result),
                    Panel::AccountValue => vec![Series::line(
                        "Account Value",
                        result.snapshots.iter().map(|s| (s.time, s.account_value)),
                        false,
                    )],
                    Panel::Trades => vec![Series::line(
                        "Trades",
                        result.snapshots.iter().map(|s| (s.time, s.holdings)),
                        false,
                    )],
                };
                (panel, series)
            })
            .collect();

        Self {
            title: format!(
                "{} SMA {}/{} backtest",
                result.symbol, result.short_period, result.long_period
            ),
            panels,
        }
    }

    pub fn row_titles(&self) -> Vec<&'static str> {
        self.panels.iter().map(|(panel, _)| panel.title()).collect()
    }
}

fn stock_series(result: &BacktestResult) -> Vec<Series> {
    let times: Vec<DateTime<Utc>> = result.price_history.iter().map(|b| b.timestamp).collect();
    let closes: Vec<f64> = result.price_history.iter().map(|b| b.close).collect();

    let mut series = vec![Series::line(
        "Stock Value",
        times.iter().copied().zip(closes.iter().copied()),
        false,
    )];

    for period in [result.short_period, result.long_period] {
        let sma = rolling_sma(&closes, period);
        series.push(Series::line(
            &format!("SMA {}", period),
            times
                .iter()
                .zip(sma)
                .filter_map(|(t, v)| v.map(|v| (*t, v))),
            true,
        ));
    }

    for (side, name) in [(TradeSide::Buy, "Buy"), (TradeSide::Sell, "Sell")] {
        let fills: Vec<_> = result
            .trades
            .iter()
            .filter(|t| t.side == side)
            .map(|t| (t.timestamp, t.price))
            .collect();
        if !fills.is_empty() {
            series.push(Series::markers(name, fills));
        }
    }

    series
}

/// Header and metrics for the textual summary
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub symbol: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub metrics: Vec<Metric>,
}

impl Summary {
    pub fn from_result(result: &BacktestResult) -> Self {
        Self {
            symbol: result.symbol.clone(),
            start_date: Some(result.start_date),
            end_date: Some(result.end_date),
            metrics: result.metrics.metrics.clone(),
        }
    }
}

/// Destination for backtest output
///
/// Sinks ignore the parts they do not render.
pub trait ReportSink {
    fn render_chart(&mut self, _chart: &ChartData) -> Result<()> {
        Ok(())
    }

    fn show_metrics(&mut self, _summary: &Summary) -> Result<()> {
        Ok(())
    }
}

/// Send a backtest result to every sink
pub fn publish(
    result: &BacktestResult,
    settings: &ReportSettings,
    sinks: &mut [&mut dyn ReportSink],
) -> Result<()> {
    let chart = ChartData::from_result(result, settings);
    let summary = Summary::from_result(result);

    for sink in sinks.iter_mut() {
        sink.render_chart(&chart)?;
        sink.show_metrics(&summary)?;
    }

    Ok(())
}
