use chrono::{NaiveDate, TimeDelta};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Error, Result};

const DEFAULT_CONFIG_FILE: &str = "smacross";
const ENV_PREFIX: &str = "SMACROSS";

/// Extra calendar days fetched on top of the scaled warm-up window
pub const WARMUP_PADDING_DAYS: i64 = 10;

/// Strategy parameters shared by the signal and the backtest driver
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StrategyConfig {
    pub short_period: usize,
    pub long_period: usize,
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            short_period: 10,
            long_period: 50,
            symbol: "MSFT".to_string(),
            start_date: NaiveDate::from_ymd_opt(2019, 6, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2022, 1, 6).unwrap_or_default(),
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.short_period == 0 {
            return Err(Error::Config("strategy.short_period must be >= 1".into()));
        }
        if self.long_period <= self.short_period {
            return Err(Error::Config(format!(
                "strategy.long_period ({}) must be greater than strategy.short_period ({})",
                self.long_period, self.short_period
            )));
        }
        if self.symbol.trim().is_empty() {
            return Err(Error::Config("strategy.symbol must not be empty".into()));
        }
        if self.start_date >= self.end_date {
            return Err(Error::Config(format!(
                "strategy.start_date ({}) must be before strategy.end_date ({})",
                self.start_date, self.end_date
            )));
        }
        Ok(())
    }

    /// Calendar days to look back from `start_date` for `long_period` trading days
    ///
    /// `warmup_factor` converts trading days to calendar days (weekends, holidays).
    pub fn warmup_days(&self, warmup_factor: f64) -> i64 {
        ((self.long_period as f64 * warmup_factor).floor() as i64).saturating_add(WARMUP_PADDING_DAYS)
    }

    /// First calendar day to fetch so that enough trading days precede `start_date`
    pub fn warmup_start(&self, warmup_factor: f64) -> Result<NaiveDate> {
        self.lookback_start(self.warmup_days(warmup_factor))
    }

    /// `start_date` minus `days` calendar days
    pub fn lookback_start(&self, days: i64) -> Result<NaiveDate> {
        TimeDelta::try_days(days)
            .and_then(|delta| self.start_date.checked_sub_signed(delta))
            .ok_or_else(|| {
                Error::Config(format!(
                    "warm-up of {} days before {} is out of the supported date range",
                    days, self.start_date
                ))
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestSettings {
    pub initial_cash: f64,
    pub quote_currency: String,
    pub warmup_factor: f64,
}

impl Default for BacktestSettings {
    fn default() -> Self {
        Self {
            initial_cash: 10_000.0,
            quote_currency: "USD".to_string(),
            warmup_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlpacaSettings {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub data_url: String,
    /// Corporate action adjustment: raw, split, dividend or all
    pub adjustment: String,
    pub requests_per_minute: u32,
}

impl Default for AlpacaSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            secret_key: None,
            data_url: "https://data.alpaca.markets".to_string(),
            adjustment: "raw".to_string(),
            requests_per_minute: 200,
        }
    }
}

impl AlpacaSettings {
    /// Fill missing credentials from the standard Alpaca environment variables
    pub fn with_standard_env(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = std::env::var("APCA_API_KEY_ID").ok();
        }
        if self.secret_key.is_none() {
            self.secret_key = std::env::var("APCA_API_SECRET_KEY").ok();
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportSettings {
    pub show_stock_value: bool,
    pub show_account_value: bool,
    pub show_trades: bool,
    pub chart_path: PathBuf,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            show_stock_value: true,
            show_account_value: true,
            show_trades: true,
            chart_path: PathBuf::from("backtest.html"),
        }
    }
}

/// Top-level application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub strategy: StrategyConfig,
    pub backtest: BacktestSettings,
    pub alpaca: AlpacaSettings,
    pub report: ReportSettings,
}

impl Settings {
    /// Load layered settings
    ///
    /// 1. Built-in defaults.
    /// 2. TOML file: `path` if given (must exist), otherwise `smacross.toml` if present.
    /// 3. Environment variables, e.g. `SMACROSS__STRATEGY__SYMBOL=AAPL`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        let settings = Settings {
            alpaca: settings.alpaca.with_standard_env(),
            ..settings
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()?;

        if self.backtest.initial_cash.is_nan() || self.backtest.initial_cash <= 0.0 {
            return Err(Error::Config("backtest.initial_cash must be > 0".into()));
        }
        if self.backtest.warmup_factor.is_nan() || self.backtest.warmup_factor < 1.0 {
            return Err(Error::Config("backtest.warmup_factor must be >= 1.0".into()));
        }
        self.strategy.warmup_start(self.backtest.warmup_factor)?;
        if self.alpaca.requests_per_minute == 0 {
            return Err(Error::Config(
                "alpaca.requests_per_minute must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();

        assert_eq!(settings.strategy.short_period, 10);
        assert_eq!(settings.strategy.long_period, 50);
        assert_eq!(settings.strategy.symbol, "MSFT");
        assert_eq!(settings.backtest.initial_cash, 10_000.0);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_warmup_start() {
        let config = StrategyConfig::default();
        // 50 * 2.0 + 10 = 110 days before 2019-06-01
        assert_eq!(
            config.warmup_start(BacktestSettings::default().warmup_factor).unwrap(),
            NaiveDate::from_ymd_opt(2019, 2, 11).unwrap()
        );
        // floor(50 * 1.44) + 10 = 82 days
        assert_eq!(
            config.warmup_start(1.44).unwrap(),
            NaiveDate::from_ymd_opt(2019, 3, 11).unwrap()
        );
    }

    #[test]
    fn test_huge_long_period_is_config_error() {
        let mut settings = Settings::default();
        settings.strategy.long_period = 1_000_000_000_000_000;

        assert!(matches!(
            settings.strategy.warmup_start(2.0),
            Err(Error::Config(_))
        ));
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("out of the supported date range"));
    }

    #[test]
    fn test_validate_rejects_bad_periods() {
        let config = StrategyConfig {
            short_period: 50,
            long_period: 10,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be greater than"));

        let config = StrategyConfig {
            short_period: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_dates() {
        let config = StrategyConfig {
            start_date: NaiveDate::from_ymd_opt(2022, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = std::env::temp_dir().join(format!("smacross-cfg-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("custom.toml");

        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[strategy]
short_period = 5
long_period = 20
symbol = "AAPL"
start_date = "2020-01-02"
end_date = "2021-01-04"

[backtest]
initial_cash = 2500.0

[report]
show_trades = false
"#
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.strategy.short_period, 5);
        assert_eq!(settings.strategy.long_period, 20);
        assert_eq!(settings.strategy.symbol, "AAPL");
        assert_eq!(
            settings.strategy.start_date,
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
        );
        assert_eq!(settings.backtest.initial_cash, 2500.0);
        // Untouched sections keep their defaults
        assert_eq!(settings.backtest.quote_currency, "USD");
        assert!(!settings.report.show_trades);
        assert!(settings.report.show_stock_value);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let path = std::env::temp_dir().join("smacross-does-not-exist.toml");
        let result = Settings::load(Some(&path));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
