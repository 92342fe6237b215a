// Trading strategy module
pub mod price_window;
pub mod sma_crossover;

pub use price_window::PriceWindow;
pub use sma_crossover::CrossoverSignal;

use crate::models::Signal;
use crate::Result;

/// Base trait for stateful price-driven strategies
///
/// The driver seeds the strategy once with `initialize` and then feeds one
/// price per event through `on_price`.
pub trait Strategy: Send {
    /// Get strategy name
    fn name(&self) -> &str;

    /// Number of historical prices required by `initialize`
    fn warmup_len(&self) -> usize;

    /// Seed internal state from historical prices (oldest first)
    fn initialize(&mut self, history: &[f64]) -> Result<()>;

    /// Consume the next price and decide what to do
    fn on_price(&mut self, price: f64) -> Result<Signal>;

    /// Whether the strategy currently considers itself long
    fn has_position(&self) -> bool;
}
