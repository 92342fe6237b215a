use super::Broker;
use crate::models::{OrderRequest, Signal, TradeSide};

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionAction {
    Submit(OrderRequest),
    Skip,
}

#[derive(Debug, Clone)]
pub struct ExecutionDecision {
    pub action: ExecutionAction,
    pub reason: String,
}

/// Turns strategy signals into sized market orders
///
/// Buys spend all free cash on whole shares; sells liquidate the whole
/// holding.
#[derive(Debug, Default, Clone)]
pub struct Executor;

impl Executor {
    pub fn new() -> Self {
        Self
    }

    /// Process a signal and decide what to do
    pub fn process_signal<B: Broker>(
        &self,
        signal: Signal,
        broker: &B,
        symbol: &str,
        current_price: f64,
    ) -> ExecutionDecision {
        match signal {
            Signal::Buy => {
                if current_price.is_nan() || current_price <= 0.0 {
                    return skip(format!("Invalid price {}", current_price));
                }

                // Round the amount down to whole shares
                let mut quantity = (broker.cash() / current_price).floor();
                if quantity * current_price > broker.cash() {
                    // Division rounded up to the next whole share
                    quantity -= 1.0;
                }
                if quantity < 1.0 {
                    return skip(format!(
                        "Buy signal but ${:.2} cash cannot cover one share @ ${:.2}",
                        broker.cash(),
                        current_price
                    ));
                }

                ExecutionDecision {
                    action: ExecutionAction::Submit(OrderRequest {
                        symbol: symbol.to_string(),
                        side: TradeSide::Buy,
                        quantity,
                    }),
                    reason: format!("Buy signal: {} shares with available cash", quantity),
                }
            }

            Signal::Sell => {
                let quantity = broker.available(symbol).floor();
                if quantity < 1.0 {
                    return skip("Sell signal but no shares to sell".to_string());
                }

                ExecutionDecision {
                    action: ExecutionAction::Submit(OrderRequest {
                        symbol: symbol.to_string(),
                        side: TradeSide::Sell,
                        quantity,
                    }),
                    reason: format!("Sell signal: closing {} shares", quantity),
                }
            }

            Signal::Hold => skip("Hold signal".to_string()),
        }
    }
}

fn skip(reason: String) -> ExecutionDecision {
    ExecutionDecision {
        action: ExecutionAction::Skip,
        reason,
    }
}
