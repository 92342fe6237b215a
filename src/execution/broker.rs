use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{OrderRequest, Trade, TradeSide};
use crate::{Error, Result};

/// Order execution interface
///
/// The crossover signal never calls a broker directly; the driver turns
/// decisions into orders and submits them here.
pub trait Broker {
    /// Submit a market order and return the resulting fill
    fn market_order(&mut self, order: &OrderRequest) -> Result<Trade>;

    /// Free cash in the quote currency
    fn cash(&self) -> f64;

    /// Shares of `symbol` available to sell
    fn available(&self, symbol: &str) -> f64;
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    price: f64,
    time: DateTime<Utc>,
}

/// Simulated cash account that fills market orders at the last marked price
#[derive(Debug, Clone)]
pub struct PaperBroker {
    cash: f64,
    holdings: HashMap<String, f64>,
    marks: HashMap<String, Mark>,
    trades: Vec<Trade>,
}

impl PaperBroker {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            cash: initial_cash,
            holdings: HashMap::new(),
            marks: HashMap::new(),
            trades: Vec::new(),
        }
    }

    /// Record the current market price of `symbol`; subsequent orders fill here
    pub fn mark_price(&mut self, symbol: &str, price: f64, time: DateTime<Utc>) {
        self.marks.insert(symbol.to_string(), Mark { price, time });
    }

    /// Cash plus all holdings valued at their last marked price
    pub fn account_value(&self) -> f64 {
        let holdings_value: f64 = self
            .holdings
            .iter()
            .map(|(symbol, qty)| {
                let price = self.marks.get(symbol).map(|m| m.price).unwrap_or(0.0);
                qty * price
            })
            .sum();

        self.cash + holdings_value
    }

    /// All fills so far, oldest first
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }
}

impl Broker for PaperBroker {
    fn market_order(&mut self, order: &OrderRequest) -> Result<Trade> {
        if order.quantity.is_nan() || order.quantity <= 0.0 {
            return Err(Error::Order(format!(
                "quantity must be positive, got {}",
                order.quantity
            )));
        }

        let mark = self.marks.get(&order.symbol).copied().ok_or_else(|| {
            Error::Order(format!("no market price for {}", order.symbol))
        })?;

        let notional = order.quantity * mark.price;

        match order.side {
            TradeSide::Buy => {
                if notional > self.cash {
                    return Err(Error::Order(format!(
                        "insufficient cash: need ${:.2}, have ${:.2}",
                        notional, self.cash
                    )));
                }
                self.cash -= notional;
                *self.holdings.entry(order.symbol.clone()).or_insert(0.0) += order.quantity;
            }
            TradeSide::Sell => {
                let available = self.available(&order.symbol);
                if order.quantity > available {
                    return Err(Error::Order(format!(
                        "insufficient {}: selling {}, have {}",
                        order.symbol, order.quantity, available
                    )));
                }
                self.cash += notional;
                let remaining = available - order.quantity;
                if remaining > 0.0 {
                    self.holdings.insert(order.symbol.clone(), remaining);
                } else {
                    self.holdings.remove(&order.symbol);
                }
            }
        }

        let trade = Trade {
            id: Uuid::new_v4(),
            symbol: order.symbol.clone(),
            side: order.side,
            price: mark.price,
            quantity: order.quantity,
            timestamp: mark.time,
        };

        tracing::debug!(
            "Filled {} {} {} @ ${:.2} (cash ${:.2})",
            trade.side,
            trade.quantity,
            trade.symbol,
            trade.price,
            self.cash
        );

        self.trades.push(trade.clone());
        Ok(trade)
    }

    fn cash(&self) -> f64 {
        self.cash
    }

    fn available(&self, symbol: &str) -> f64 {
        self.holdings.get(symbol).copied().unwrap_or(0.0)
    }
}
