use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AccountSnapshot, Trade, TradeSide};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const VAR_CONFIDENCE: f64 = 0.95;

/// Completed buy→sell round trip, used for win/loss statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTrip {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub holding_period_days: i64,
}

impl RoundTrip {
    /// Pair each sell with the preceding buy; an unmatched trailing buy is ignored
    pub fn from_trades(trades: &[Trade]) -> Vec<RoundTrip> {
        let mut round_trips = Vec::new();
        let mut entry: Option<&Trade> = None;

        for trade in trades {
            match (trade.side, entry) {
                (TradeSide::Buy, _) => entry = Some(trade),
                (TradeSide::Sell, Some(buy)) => {
                    let quantity = trade.quantity.min(buy.quantity);
                    round_trips.push(RoundTrip {
                        entry_time: buy.timestamp,
                        exit_time: trade.timestamp,
                        entry_price: buy.price,
                        exit_price: trade.price,
                        quantity,
                        pnl: (trade.price - buy.price) * quantity,
                        pnl_pct: ((trade.price - buy.price) / buy.price) * 100.0,
                        holding_period_days: (trade.timestamp - buy.timestamp).num_days(),
                    });
                    entry = None;
                }
                (TradeSide::Sell, None) => {
                    tracing::warn!("Sell at {} without a matching buy", trade.timestamp);
                }
            }
        }

        round_trips
    }
}

/// Named performance figure for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metric {
    pub key: String,
    pub display_name: String,
    pub value: f64,
}

impl Metric {
    fn new(key: &str, display_name: &str, value: f64) -> Self {
        Self {
            key: key.to_string(),
            display_name: display_name.to_string(),
            value,
        }
    }

    /// Integers print without decimals, everything else with four
    pub fn formatted_value(&self) -> String {
        if self.value.fract() == 0.0 && self.value.abs() < 1e15 {
            format!("{:.0}", self.value)
        } else {
            format!("{:.4}", self.value)
        }
    }
}

/// Backtest performance metrics in display order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub metrics: Vec<Metric>,
    pub round_trips: Vec<RoundTrip>,
}

impl BacktestMetrics {
    /// Calculate metrics from the account value series and fills
    pub fn compute(snapshots: &[AccountSnapshot], trades: &[Trade], initial_value: f64) -> Self {
        let mut values = Vec::with_capacity(snapshots.len() + 1);
        values.push(initial_value);
        values.extend(snapshots.iter().map(|s| s.account_value));

        let returns = daily_returns(&values);
        let final_value = values.last().copied().unwrap_or(initial_value);

        let cum_returns = if initial_value > 0.0 {
            (final_value / initial_value - 1.0) * 100.0
        } else {
            0.0
        };

        let years = match (snapshots.first(), snapshots.last()) {
            (Some(first), Some(last)) => (last.time - first.time).num_days() as f64 / 365.25,
            _ => 0.0,
        };
        let cagr = if years > 0.0 && initial_value > 0.0 && final_value > 0.0 {
            ((final_value / initial_value).powf(1.0 / years) - 1.0) * 100.0
        } else {
            0.0
        };

        let mean_return = mean(&returns);
        let std_dev = std_dev(&returns);
        let downside = downside_deviation(&returns);
        let annualizer = TRADING_DAYS_PER_YEAR.sqrt();

        let sharpe = ratio(mean_return, std_dev) * annualizer;
        let sortino = ratio(mean_return, downside) * annualizer;
        let max_drawdown = max_drawdown_pct(&values);
        let calmar = ratio(cagr, max_drawdown);
        let (var, cvar) = value_at_risk(&returns, VAR_CONFIDENCE);

        let round_trips = RoundTrip::from_trades(trades);
        let wins = round_trips.iter().filter(|r| r.pnl > 0.0).count();
        let win_rate = if round_trips.is_empty() {
            0.0
        } else {
            (wins as f64 / round_trips.len() as f64) * 100.0
        };

        let metrics = vec![
            Metric::new("cum_returns", "Cumulative Returns (%)", cum_returns),
            Metric::new("cagr", "Compound Annual Growth Rate (%)", cagr),
            Metric::new("sharpe", "Sharpe Ratio", sharpe),
            Metric::new("sortino", "Sortino Ratio", sortino),
            Metric::new("calmar", "Calmar Ratio", calmar),
            Metric::new("volatility", "Volatility", std_dev * annualizer),
            Metric::new("variance", "Variance", std_dev * std_dev),
            Metric::new("max_drawdown", "Max Drawdown (%)", max_drawdown),
            Metric::new("var", "Value-at-Risk", var),
            Metric::new("cvar", "Conditional Value-at-Risk", cvar),
            Metric::new("total_trades", "Total Trades", trades.len() as f64),
            Metric::new("win_rate", "Win Rate (%)", win_rate),
        ];

        Self {
            metrics,
            round_trips,
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.metrics.iter().find(|m| m.key == key).map(|m| m.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.iter()
    }
}

fn daily_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation; zero with fewer than two points
fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    variance.sqrt()
}

fn downside_deviation(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = xs.iter().map(|x| x.min(0.0).powi(2)).sum();
    (sum_sq / xs.len() as f64).sqrt()
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Largest peak-to-trough decline in percent of the peak
fn max_drawdown_pct(values: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0;

    for &value in values {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let drawdown = (peak - value) / peak * 100.0;
            if drawdown > max_dd {
                max_dd = drawdown;
            }
        }
    }

    max_dd
}

/// Historical VaR and CVaR of daily returns, reported as positive losses
fn value_at_risk(returns: &[f64], confidence: f64) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }

    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let cutoff = (((1.0 - confidence) * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    let var = -sorted[cutoff];
    let cvar = -mean(&sorted[..=cutoff]);

    (var, cvar)
}
