//! Order Management System (OMS)
//!
//! Order entity, depth snapshots, traders and the pluggable lifecycle policy:
//! - Limit price placement at the middle of the executable spread
//! - Time-based cancellation of resting orders on the trading clock
//! - Early cancellation to release funds for a competing opportunity

pub mod execution;
pub mod manager;
pub mod orderbook;
pub mod price_details;
pub mod request;
pub mod trader;
pub mod types;

pub use execution::FillSimulator;
pub use manager::{is_cancellable, DefaultOrderManager, OrderManager, Resubmission};
pub use orderbook::{DepthSnapshot, OrderBook};
pub use price_details::SymbolPriceDetails;
pub use request::{OrderRequest, PricingContext};
pub use trader::{CancelMode, SimulatedTrader, Trader};
pub use types::{Order, OrderId, OrderState, OrderType, TriggerCondition};
