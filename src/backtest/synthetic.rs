use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use clap::ValueEnum;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::api::HistoricalDataProvider;
use crate::models::Bar;
use crate::Result;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MarketScenario {
    /// Steady uptrend with noise (+0.1% per session on average)
    Uptrend,
    /// Steady downtrend with noise (-0.1% per session on average)
    Downtrend,
    /// Sideways/choppy market (mean-reverting around the base price)
    Sideways,
    /// High volatility (±3% daily swings)
    Volatile,
}

/// Generates deterministic daily stock bars for offline backtests
///
/// Bars are produced for weekdays only. The same seed and scenario always
/// yield the same series for a given date range.
#[derive(Debug, Clone)]
pub struct SyntheticDataGenerator {
    seed: u64,
    scenario: MarketScenario,
    base_price: f64,
    base_volume: f64,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64, scenario: MarketScenario) -> Self {
        Self {
            seed,
            scenario,
            base_price: 150.0,
            base_volume: 25_000_000.0,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    pub fn scenario(&self) -> MarketScenario {
        self.scenario
    }

    /// Generate one bar per weekday in `[start, end]`
    pub fn generate(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut bars = Vec::new();
        let mut current_price = self.base_price;
        let mut day = start;

        while day <= end {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                current_price = self.next_price(&mut rng, current_price);
                bars.push(self.create_bar(&mut rng, symbol, current_price, session_time(day)));
            }
            day += Duration::days(1);
        }

        bars
    }

    fn next_price(&self, rng: &mut StdRng, price: f64) -> f64 {
        let next = match self.scenario {
            MarketScenario::Uptrend => {
                // Drift + reduced noise so trend is dominant
                price * (1.0 + 0.001 + rng.gen_range(-0.01..0.01))
            }
            MarketScenario::Downtrend => price * (1.0 - 0.001 + rng.gen_range(-0.01..0.01)),
            MarketScenario::Sideways => {
                // Mean reversion force + noise
                let reversion = (self.base_price - price) * 0.1;
                price + reversion + price * rng.gen_range(-0.01..0.01)
            }
            MarketScenario::Volatile => price * (1.0 + rng.gen_range(-0.03..0.03)),
        };

        // Prevent price from going too low
        next.max(self.base_price * 0.05)
    }

    /// Helper to create a bar from the session close
    fn create_bar(
        &self,
        rng: &mut StdRng,
        symbol: &str,
        close: f64,
        timestamp: DateTime<Utc>,
    ) -> Bar {
        let noise_pct = 0.01; // ±1% intraday range

        let high = close * (1.0 + rng.gen_range(0.0..noise_pct));
        let low = close * (1.0 - rng.gen_range(0.0..noise_pct));
        let open = (close * (1.0 + rng.gen_range(-noise_pct..noise_pct))).clamp(low, high);

        // Vary volume ±30%
        let volume = (self.base_volume * rng.gen_range(0.7..1.3)).round();

        Bar {
            symbol: symbol.to_string(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Daily bars are stamped at 05:00 UTC, matching how Alpaca reports US sessions
fn session_time(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::from_hms_opt(5, 0, 0).unwrap_or_default())
        .and_utc()
}

impl HistoricalDataProvider for SyntheticDataGenerator {
    async fn daily_bars(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Bar>> {
        let bars = self.generate(symbol, start, end);
        tracing::info!(
            "Generated {} synthetic {:?} bars for {} ({} to {})",
            bars.len(),
            self.scenario,
            symbol,
            start,
            end
        );
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weekdays_only() {
        let gen = SyntheticDataGenerator::new(42, MarketScenario::Sideways);
        // 2021-01-04 is a Monday; two full weeks
        let bars = gen.generate("SYNTH", date(2021, 1, 4), date(2021, 1, 17));

        assert_eq!(bars.len(), 10);
        for bar in &bars {
            let weekday = bar.timestamp.date_naive().weekday();
            assert!(!matches!(weekday, Weekday::Sat | Weekday::Sun));
        }
    }

    #[test]
    fn test_generate_uptrend() {
        let gen = SyntheticDataGenerator::new(42, MarketScenario::Uptrend);
        let bars = gen.generate("SYNTH", date(2019, 1, 1), date(2020, 12, 31));

        let first_price = bars.first().unwrap().close;
        let last_price = bars.last().unwrap().close;

        assert!(
            last_price > first_price,
            "Uptrend should end higher: {} -> {}",
            first_price,
            last_price
        );
    }

    #[test]
    fn test_generate_downtrend() {
        let gen = SyntheticDataGenerator::new(42, MarketScenario::Downtrend);
        let bars = gen.generate("SYNTH", date(2019, 1, 1), date(2020, 12, 31));

        let first_price = bars.first().unwrap().close;
        let last_price = bars.last().unwrap().close;

        assert!(
            last_price < first_price,
            "Downtrend should end lower: {} -> {}",
            first_price,
            last_price
        );
    }

    #[test]
    fn test_generate_sideways() {
        let gen = SyntheticDataGenerator::new(42, MarketScenario::Sideways);
        let bars = gen.generate("SYNTH", date(2019, 1, 1), date(2020, 12, 31));

        // Should stay roughly around base price (±10%)
        for bar in &bars {
            assert!(
                bar.close > 135.0 && bar.close < 165.0,
                "Sideways should stay near base: {}",
                bar.close
            );
        }
    }

    #[test]
    fn test_same_seed_same_series() {
        let a = SyntheticDataGenerator::new(7, MarketScenario::Volatile);
        let b = SyntheticDataGenerator::new(7, MarketScenario::Volatile);

        let bars_a = a.generate("SYNTH", date(2021, 1, 1), date(2021, 6, 30));
        let bars_b = b.generate("SYNTH", date(2021, 1, 1), date(2021, 6, 30));

        assert_eq!(bars_a, bars_b);
    }

    #[test]
    fn test_timestamps_are_sequential() {
        let gen = SyntheticDataGenerator::new(42, MarketScenario::Uptrend);
        let bars = gen.generate("SYNTH", date(2021, 1, 1), date(2021, 3, 31));

        for i in 1..bars.len() {
            assert!(
                bars[i].timestamp > bars[i - 1].timestamp,
                "Timestamps should be sequential"
            );
        }
    }

    #[test]
    fn test_ohlc_consistency() {
        let gen = SyntheticDataGenerator::new(42, MarketScenario::Volatile);
        let bars = gen.generate("SYNTH", date(2021, 1, 1), date(2021, 12, 31));

        for bar in &bars {
            assert!(bar.high >= bar.close, "High should be >= close");
            assert!(bar.high >= bar.open, "High should be >= open");
            assert!(bar.low <= bar.close, "Low should be <= close");
            assert!(bar.low <= bar.open, "Low should be <= open");
        }
    }

    #[test]
    fn test_provider_interface() {
        let gen = SyntheticDataGenerator::new(1, MarketScenario::Uptrend);
        let bars =
            tokio_test::block_on(gen.daily_bars("MSFT", date(2021, 1, 4), date(2021, 1, 8)))
                .unwrap();

        assert_eq!(bars.len(), 5);
        assert!(bars.iter().all(|b| b.symbol == "MSFT"));
    }
}
