// Technical indicators module

pub mod moving_average;

pub use moving_average::{calculate_sma, rolling_sma};
