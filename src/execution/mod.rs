// Order sizing and simulated execution
pub mod broker;
pub mod executor;

pub use broker::{Broker, PaperBroker};
pub use executor::{ExecutionAction, ExecutionDecision, Executor};
