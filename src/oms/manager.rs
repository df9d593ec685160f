//! Order lifecycle policy
//!
//! An [`OrderManager`] is consulted by the engine at fixed points of an order's
//! life: before submission (to price it), after each evaluation cycle (to decide
//! whether a resting order has overstayed), and when a new opportunity on a
//! different instrument needs the funds an open order is holding.
//!
//! Managers never perform I/O and keep no per-order state. Time is always read
//! from the trader's latest candle close, so replays make identical decisions.

use crate::oms::orderbook::OrderBook;
use crate::oms::request::{OrderRequest, PricingContext};
use crate::oms::trader::Trader;
use crate::oms::types::Order;
use crate::time::TimeInterval;
use crate::Side;
use tracing::{debug, trace};

/// One-shot channel for replacing an order.
///
/// Consumed by [`Resubmission::submit`], so a manager can resubmit at most once
/// per call, and borrowed for the call only, so it cannot be stored.
pub struct Resubmission<'a> {
    sink: &'a mut dyn FnMut(Order),
}

impl<'a> Resubmission<'a> {
    pub fn new(sink: &'a mut dyn FnMut(Order)) -> Self {
        Self { sink }
    }

    pub fn submit(self, order: Order) {
        (self.sink)(order);
    }
}

/// Orders the lifecycle policy is allowed to cancel on its own: standalone and
/// unconditional. Bracket legs and stop orders belong to whoever created them.
pub fn is_cancellable(order: &Order) -> bool {
    order.parent.is_none() && order.trigger_condition.is_none()
}

/// Pluggable order lifecycle policy held by the engine as `Box<dyn OrderManager>`
pub trait OrderManager: Send + Sync {
    /// Set `request.price` from the book before submission. Absent or one-sided
    /// books leave the requested price as it is.
    fn prepare_order(
        &self,
        book: Option<&OrderBook>,
        request: &mut OrderRequest,
        context: &PricingContext,
    );

    /// The order reached a terminal state this cycle
    fn finalized(&self, _order: &Order, _trader: &dyn Trader) {}

    /// The order was partially filled or otherwise changed but is still open
    fn updated(&self, _order: &mut Order, _trader: &dyn Trader, _resubmit: Resubmission<'_>) {}

    /// The order is open and nothing happened to it this cycle
    fn unchanged(&self, order: &mut Order, trader: &dyn Trader, resubmit: Resubmission<'_>);

    /// Try to free the funds held by `order` for an opportunity on
    /// `new_symbol_trader`. Returns true only if the order is cancelled by the
    /// time this returns.
    fn cancel_to_release_funds_for(
        &self,
        order: &mut Order,
        current_trader: &dyn Trader,
        new_symbol_trader: &dyn Trader,
    ) -> bool;

    fn is_cancellable(&self, order: &Order) -> bool {
        is_cancellable(order)
    }
}

/// Baseline policy: price at the middle of the executable spread, cancel orders
/// open for `max_time_to_keep_order_open`, and give up orders past half of it
/// when funds are needed elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultOrderManager {
    max_time_to_keep_order_open: TimeInterval,
}

impl DefaultOrderManager {
    pub fn new(max_time_to_keep_order_open: TimeInterval) -> Self {
        Self {
            max_time_to_keep_order_open,
        }
    }

    pub fn max_time_to_keep_order_open(&self) -> TimeInterval {
        self.max_time_to_keep_order_open
    }
}

impl OrderManager for DefaultOrderManager {
    fn prepare_order(
        &self,
        book: Option<&OrderBook>,
        request: &mut OrderRequest,
        context: &PricingContext,
    ) {
        let Some(book) = book.filter(|b| b.has_depth()) else {
            return;
        };

        let original_price = request.price;
        let quantity = request.quantity;
        let spread = book.spread(quantity);
        let ask = book.average_ask(quantity);
        let bid = book.average_bid(quantity);

        request.price = match request.side {
            Side::Buy => bid + spread.half(),
            Side::Sell => ask - spread.half(),
        };

        let details = &context.price_details;
        debug!(
            "{} - spread of {}: ask {}, bid {}. Requested at {}. Going to {} {} at {}",
            request.symbol,
            details.price_to_string(spread),
            details.price_to_string(ask),
            details.price_to_string(bid),
            details.price_to_string(original_price),
            request.side,
            details.quantity_to_string(quantity),
            details.price_to_string(request.price),
        );
    }

    fn finalized(&self, order: &Order, trader: &dyn Trader) {
        trace!(
            "{} order {} finalized as {:?} after {}s",
            trader.symbol(),
            order.id,
            order.state,
            trader
                .now()
                .map(|now| order.time_elapsed(now).num_seconds())
                .unwrap_or_default(),
        );
    }

    fn unchanged(&self, order: &mut Order, trader: &dyn Trader, _resubmit: Resubmission<'_>) {
        let Some(now) = trader.now() else {
            return;
        };
        if self.is_cancellable(order)
            && order.time_elapsed(now) >= self.max_time_to_keep_order_open.duration()
        {
            debug!(
                "{} order {} open for {}s, limit {}: cancelling",
                trader.symbol(),
                order.id,
                order.time_elapsed(now).num_seconds(),
                self.max_time_to_keep_order_open,
            );
            trader.cancel(order);
        }
    }

    fn cancel_to_release_funds_for(
        &self,
        order: &mut Order,
        current_trader: &dyn Trader,
        new_symbol_trader: &dyn Trader,
    ) -> bool {
        let Some(now) = current_trader.now() else {
            return false;
        };
        if !self.is_cancellable(order)
            || order.time_elapsed(now) <= self.max_time_to_keep_order_open.half()
        {
            return false;
        }

        current_trader.cancel(order);
        let released = order.is_cancelled();
        debug!(
            "{} order {} cancelled to fund {}: {}",
            current_trader.symbol(),
            order.id,
            new_symbol_trader.symbol(),
            if released { "released" } else { "pending" },
        );
        released
    }
}
