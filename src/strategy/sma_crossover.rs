use super::{PriceWindow, Strategy};
use crate::config::StrategyConfig;
use crate::models::Signal;
use crate::{Error, Result};

/// Dual simple-moving-average crossover signal
///
/// Keeps the last `long_period` prices and compares the short and long means on
/// every price. Buys when the long mean is above the short mean while flat and
/// sells when it drops below while long. Equal means never trigger a transition.
///
/// At most one position is open at a time: Buy and Sell strictly alternate.
#[derive(Debug, Clone)]
pub struct CrossoverSignal {
    short_period: usize,
    long_period: usize,
    window: PriceWindow,
    has_position: bool,
    initialized: bool,
}

impl CrossoverSignal {
    /// Create an uninitialized signal; requires `0 < short_period < long_period`
    pub fn new(short_period: usize, long_period: usize) -> Result<Self> {
        if short_period == 0 {
            return Err(Error::InvalidInput(
                "short period must be at least 1".to_string(),
            ));
        }
        if long_period <= short_period {
            return Err(Error::InvalidInput(format!(
                "long period ({}) must be greater than short period ({})",
                long_period, short_period
            )));
        }

        Ok(Self {
            short_period,
            long_period,
            window: PriceWindow::new(long_period),
            has_position: false,
            initialized: false,
        })
    }

    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        Self::new(config.short_period, config.long_period)
    }

    pub fn short_period(&self) -> usize {
        self.short_period
    }

    pub fn long_period(&self) -> usize {
        self.long_period
    }

    pub fn short_mean(&self) -> Option<f64> {
        self.window.mean_of_last(self.short_period)
    }

    pub fn long_mean(&self) -> Option<f64> {
        self.window.mean_of_last(self.long_period)
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn window(&self) -> &PriceWindow {
        &self.window
    }

    fn decide(&mut self, short_mean: f64, long_mean: f64) -> Signal {
        if long_mean > short_mean && !self.has_position {
            self.has_position = true;
            Signal::Buy
        } else if long_mean < short_mean && self.has_position {
            self.has_position = false;
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}

impl Strategy for CrossoverSignal {
    fn name(&self) -> &str {
        "SmaCrossover"
    }

    fn warmup_len(&self) -> usize {
        self.long_period
    }

    fn initialize(&mut self, history: &[f64]) -> Result<()> {
        if history.len() < self.long_period {
            return Err(Error::InvalidInput(format!(
                "need at least {} historical prices to seed the window, got {}",
                self.long_period,
                history.len()
            )));
        }

        self.window.seed(history);
        self.has_position = false;
        self.initialized = true;

        tracing::debug!(
            "Seeded SMA({}/{}) window with {} prices",
            self.short_period,
            self.long_period,
            self.window.len()
        );

        Ok(())
    }

    fn on_price(&mut self, price: f64) -> Result<Signal> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }

        self.window.push(price);

        // Window is full after initialize, so both means exist
        let (short_mean, long_mean) = match (self.short_mean(), self.long_mean()) {
            (Some(s), Some(l)) => (s, l),
            _ => return Err(Error::NotInitialized),
        };

        let signal = self.decide(short_mean, long_mean);

        tracing::trace!(
            price,
            short_mean,
            long_mean,
            ?signal,
            "SMA crossover evaluated"
        );

        Ok(signal)
    }

    fn has_position(&self) -> bool {
        self.has_position
    }
}
