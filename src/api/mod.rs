pub mod alpaca;

pub use alpaca::AlpacaClient;

use chrono::NaiveDate;
use std::future::Future;

use crate::models::Bar;
use crate::Result;

/// Source of daily historical bars
///
/// Implementations return bars for `symbol` with timestamps inside
/// `[start, end]`, ordered oldest first.
pub trait HistoricalDataProvider {
    fn daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Bar>>> + Send;
}
