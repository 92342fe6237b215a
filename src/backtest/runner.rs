use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::HistoricalDataProvider;
use crate::backtest::metrics::BacktestMetrics;
use crate::config::{BacktestSettings, StrategyConfig};
use crate::execution::{Broker, ExecutionAction, Executor, PaperBroker};
use crate::models::{AccountSnapshot, Bar, Signal, Trade};
use crate::strategy::{CrossoverSignal, Strategy};
use crate::{Error, Result};

/// Fetches tried before giving up on a short warm-up
const MAX_WARMUP_FETCHES: u32 = 3;

fn count_before(bars: &[Bar], day: NaiveDate) -> usize {
    bars.iter().filter(|b| b.timestamp.date_naive() < day).count()
}

/// Everything a backtest produced, ready for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy: String,
    pub short_period: usize,
    pub long_period: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_cash: f64,
    pub quote_currency: String,
    /// All fetched bars including the warm-up period
    pub price_history: Vec<Bar>,
    /// One snapshot per replayed bar
    pub snapshots: Vec<AccountSnapshot>,
    pub trades: Vec<Trade>,
    pub metrics: BacktestMetrics,
}

impl BacktestResult {
    pub fn final_account_value(&self) -> f64 {
        self.snapshots
            .last()
            .map(|s| s.account_value)
            .unwrap_or(self.initial_cash)
    }
}

/// Backtest runner that replays daily closes through the crossover signal
pub struct BacktestRunner {
    config: StrategyConfig,
    settings: BacktestSettings,
    executor: Executor,
}

impl BacktestRunner {
    /// Create a new backtest runner
    pub fn new(config: StrategyConfig, settings: BacktestSettings) -> Result<Self> {
        config.validate()?;
        config.warmup_start(settings.warmup_factor)?;
        Ok(Self {
            config,
            settings,
            executor: Executor::new(),
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// First day of the warm-up fetch window
    pub fn warmup_start(&self) -> Result<NaiveDate> {
        self.config.warmup_start(self.settings.warmup_factor)
    }

    /// Fetch history from `provider` and run the backtest
    ///
    /// The look-back doubles (up to `MAX_WARMUP_FETCHES` fetches) while fewer
    /// than `long_period` bars precede `start_date`.
    pub async fn run<P: HistoricalDataProvider>(&self, provider: &P) -> Result<BacktestResult> {
        let needed = self.config.long_period;
        let mut days = self.config.warmup_days(self.settings.warmup_factor);
        let mut from = self.config.lookback_start(days)?;
        let mut attempt = 1;

        let bars = loop {
            let bars = provider
                .daily_bars(&self.config.symbol, from, self.config.end_date)
                .await?;

            let warmup_bars = count_before(&bars, self.config.start_date);
            if warmup_bars >= needed || attempt >= MAX_WARMUP_FETCHES {
                break bars;
            }

            days = days.saturating_mul(2);
            match self.config.lookback_start(days) {
                Ok(earlier) => {
                    tracing::warn!(
                        "Only {} of {} warm-up bars since {}, retrying from {}",
                        warmup_bars,
                        needed,
                        from,
                        earlier
                    );
                    from = earlier;
                    attempt += 1;
                }
                Err(_) => break bars,
            }
        };

        self.run_on_bars(bars)
    }

    /// Run the backtest over already-loaded bars (warm-up included)
    pub fn run_on_bars(&self, bars: Vec<Bar>) -> Result<BacktestResult> {
        let mut strategy = CrossoverSignal::from_config(&self.config)?;
        self.run_with_strategy(&mut strategy, bars)
    }

    /// Run with any strategy
    ///
    /// Bars dated before `start_date` seed the strategy; bars from `start_date`
    /// through `end_date` are replayed one close at a time.
    pub fn run_with_strategy<S: Strategy>(
        &self,
        strategy: &mut S,
        mut bars: Vec<Bar>,
    ) -> Result<BacktestResult> {
        bars.sort_by_key(|b| b.timestamp);

        let symbol = self.config.symbol.as_str();
        let start = self.config.start_date;
        let end = self.config.end_date;

        let seed: Vec<f64> = bars
            .iter()
            .filter(|b| b.timestamp.date_naive() < start)
            .map(|b| b.close)
            .collect();

        let replay: Vec<&Bar> = bars
            .iter()
            .filter(|b| {
                let day = b.timestamp.date_naive();
                day >= start && day <= end
            })
            .collect();

        if replay.is_empty() {
            return Err(Error::InvalidInput(format!(
                "no bars for {} between {} and {}",
                symbol, start, end
            )));
        }

        strategy.initialize(&seed)?;

        tracing::info!(
            "Starting backtest: {} {} ({} warm-up bars, {} replay bars)",
            strategy.name(),
            symbol,
            seed.len(),
            replay.len()
        );

        let mut broker = PaperBroker::new(self.settings.initial_cash);
        let mut snapshots = Vec::with_capacity(replay.len());
        let mut rejected_orders = 0;

        for bar in replay {
            broker.mark_price(symbol, bar.close, bar.timestamp);

            let signal = strategy.on_price(bar.close)?;
            let decision = self
                .executor
                .process_signal(signal, &broker, symbol, bar.close);

            match decision.action {
                ExecutionAction::Submit(order) => match broker.market_order(&order) {
                    Ok(trade) => {
                        tracing::debug!(
                            "{}: {} {} @ ${:.2} ({})",
                            bar.timestamp.date_naive(),
                            trade.side,
                            trade.quantity,
                            trade.price,
                            decision.reason
                        );
                    }
                    Err(e) => {
                        rejected_orders += 1;
                        tracing::warn!("{}: order rejected: {}", bar.timestamp.date_naive(), e);
                    }
                },
                ExecutionAction::Skip => {
                    if signal != Signal::Hold {
                        tracing::warn!(
                            "{}: {:?} skipped: {}",
                            bar.timestamp.date_naive(),
                            signal,
                            decision.reason
                        );
                    }
                }
            }

            snapshots.push(AccountSnapshot {
                time: bar.timestamp,
                account_value: broker.account_value(),
                price: bar.close,
                holdings: broker.available(symbol),
            });
        }

        let trades = broker.into_trades();
        let metrics = BacktestMetrics::compute(&snapshots, &trades, self.settings.initial_cash);

        let result = BacktestResult {
            symbol: symbol.to_string(),
            strategy: strategy.name().to_string(),
            short_period: self.config.short_period,
            long_period: self.config.long_period,
            start_date: start,
            end_date: end,
            initial_cash: self.settings.initial_cash,
            quote_currency: self.settings.quote_currency.clone(),
            price_history: bars,
            snapshots,
            trades,
            metrics,
        };

        tracing::info!(
            "Backtest complete: {} trades ({} rejected), final value {:.2} {} ({:+.2}%)",
            result.trades.len(),
            rejected_orders,
            result.final_account_value(),
            result.quote_currency,
            result.metrics.get("cum_returns").unwrap_or(0.0)
        );

        Ok(result)
    }
}
