use std::collections::VecDeque;

/// Fixed-capacity rolling window of the most recent prices
///
/// Pushing onto a full window evicts the oldest price.
#[derive(Debug, Clone)]
pub struct PriceWindow {
    prices: VecDeque<f64>,
    capacity: usize,
}

impl PriceWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            prices: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Add a price, removing the oldest one if the window is full
    pub fn push(&mut self, price: f64) {
        self.prices.push_back(price);

        while self.prices.len() > self.capacity {
            self.prices.pop_front();
        }
    }

    /// Replace the contents with the last `capacity` entries of `prices`
    pub fn seed(&mut self, prices: &[f64]) {
        self.prices.clear();
        let skip = prices.len().saturating_sub(self.capacity);
        self.prices.extend(prices.iter().skip(skip).copied());
    }

    /// Mean of the `n` most recent prices
    pub fn mean_of_last(&self, n: usize) -> Option<f64> {
        if n == 0 || self.prices.len() < n {
            return None;
        }

        let sum: f64 = self.prices.iter().rev().take(n).sum();
        Some(sum / n as f64)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.prices.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prices from oldest to newest
    pub fn to_vec(&self) -> Vec<f64> {
        self.prices.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_window() {
        let window = PriceWindow::new(5);
        assert_eq!(window.capacity(), 5);
        assert!(window.is_empty());
        assert!(!window.is_full());
    }

    #[test]
    fn test_max_len_limit() {
        let mut window = PriceWindow::new(5);

        for i in 0..10 {
            window.push(100.0 + i as f64);
        }

        // Should only keep the last 5: 105-109
        assert_eq!(window.len(), 5);
        assert_eq!(window.to_vec(), vec![105.0, 106.0, 107.0, 108.0, 109.0]);
    }

    #[test]
    fn test_seed_keeps_most_recent() {
        let mut window = PriceWindow::new(3);
        window.seed(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert!(window.is_full());
        assert_eq!(window.to_vec(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_seed_replaces_contents() {
        let mut window = PriceWindow::new(3);
        window.push(42.0);
        window.seed(&[1.0, 2.0]);

        assert_eq!(window.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_mean_of_last() {
        let mut window = PriceWindow::new(3);
        window.seed(&[10.0, 10.0, 1.0]);

        assert_eq!(window.mean_of_last(2), Some(5.5));
        assert_eq!(window.mean_of_last(3), Some(7.0));
        assert_eq!(window.mean_of_last(4), None);
        assert_eq!(window.mean_of_last(0), None);
    }
}
