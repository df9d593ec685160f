//! Per-instrument execution context handed to order managers

use crate::oms::price_details::SymbolPriceDetails;
use crate::oms::types::Order;
use crate::{Candle, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an order manager can see of, and ask from, the instrument an order
/// trades on.
pub trait Trader {
    fn symbol(&self) -> &Symbol;

    /// Most recent closed candle; `None` until the first one arrives
    fn latest_candle(&self) -> Option<&Candle>;

    fn price_details(&self) -> &SymbolPriceDetails;

    /// Request cancellation of `order`. Whether it completes before this returns
    /// depends on the venue; read `order.is_cancelled()` afterwards to know.
    fn cancel(&self, order: &mut Order) {
        order.request_cancel();
    }

    /// Trading clock: close time of the latest candle
    fn now(&self) -> Option<DateTime<Utc>> {
        self.latest_candle().map(|candle| candle.close_time)
    }
}

/// How a simulated venue acknowledges cancellations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    /// Confirmed within the cancel call, at the latest candle close
    #[default]
    Immediate,
    /// Left pending; the engine confirms when the next candle arrives
    NextCandle,
}

/// Trader backed by replayed candles
#[derive(Debug, Clone)]
pub struct SimulatedTrader {
    symbol: Symbol,
    price_details: SymbolPriceDetails,
    cancel_mode: CancelMode,
    latest: Option<Candle>,
}

impl SimulatedTrader {
    pub fn new(symbol: Symbol, price_details: SymbolPriceDetails) -> Self {
        Self {
            symbol,
            price_details,
            cancel_mode: CancelMode::default(),
            latest: None,
        }
    }

    pub fn with_cancel_mode(mut self, cancel_mode: CancelMode) -> Self {
        self.cancel_mode = cancel_mode;
        self
    }

    pub fn with_candle(mut self, candle: Candle) -> Self {
        self.latest = Some(candle);
        self
    }

    pub fn cancel_mode(&self) -> CancelMode {
        self.cancel_mode
    }

    pub fn update(&mut self, candle: Candle) {
        self.latest = Some(candle);
    }
}

impl Trader for SimulatedTrader {
    fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    fn latest_candle(&self) -> Option<&Candle> {
        self.latest.as_ref()
    }

    fn price_details(&self) -> &SymbolPriceDetails {
        &self.price_details
    }

    fn cancel(&self, order: &mut Order) {
        if !order.request_cancel() {
            return;
        }
        if self.cancel_mode == CancelMode::Immediate {
            let at = self.now().unwrap_or(order.submitted_at);
            order.confirm_cancel(at);
        }
    }
}
