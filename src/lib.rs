//! Order Lifecycle
//!
//! Pluggable order lifecycle policy for a trading engine, with a
//! candle-replay host to run it against historical data:
//! - limit prices placed at the middle of the executable spread,
//! - resting orders cancelled once they have been open too long,
//! - older orders given up to fund opportunities on other instruments.
//!
//! Monetary values use exact decimal arithmetic:
//!
//! ```
//! use order_lifecycle::Money;
//!
//! let spread: Money = "0.03".parse().unwrap();
//! assert_eq!(spread.half().to_string(), "0.015");
//! ```

pub mod config;
pub mod data;
pub mod oms;
pub mod replay;
pub mod time;
pub mod types;

pub use config::Config;
pub use oms::{DefaultOrderManager, OrderManager};
pub use replay::{ReplayReport, Replayer};
pub use time::TimeInterval;
pub use types::*;
