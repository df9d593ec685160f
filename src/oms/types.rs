//! Order entity and its state machine
//!
//! The order is owned by the hosting engine. Lifecycle policies only hold a
//! reference for the duration of a call and may only push it towards
//! cancellation.

use crate::{Candle, Money, Side, Symbol};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

pub type OrderId = u64;

static ORDER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate next order ID (thread-safe, lock-free)
pub fn next_order_id() -> OrderId {
    ORDER_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// Rests at `price` until the market trades through it
    Limit,
    /// Fills at the next candle open
    Market,
}

/// Order state as seen by the engine.
///
/// ```text
/// Open ──fill──> PartiallyFilled ──fill──> Filled
///   │                  │
///   └──request_cancel──┴──> CancelRequested ──confirm──> Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    Open,
    PartiallyFilled,
    /// Cancellation sent, not yet confirmed by the exchange/simulator
    CancelRequested,
    Filled,
    Cancelled,
    Rejected,
}

/// Activation condition of an order.
///
/// Conditional orders belong to whoever armed them; lifecycle policies leave
/// them alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerCondition {
    #[default]
    None,
    StopLoss { price: Money },
    StopGain { price: Money },
}

impl TriggerCondition {
    pub fn is_none(&self) -> bool {
        matches!(self, TriggerCondition::None)
    }

    /// Whether `candle` traded at or through the trigger price: down to it for
    /// a stop loss, up to it for a stop gain.
    pub fn is_reached(&self, candle: &Candle) -> bool {
        match self {
            TriggerCondition::None => true,
            TriggerCondition::StopLoss { price } => candle.low <= price.to_f64(),
            TriggerCondition::StopGain { price } => candle.high >= price.to_f64(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub price: Money,
    pub quantity: Money,
    pub filled_quantity: Money,
    pub state: OrderState,
    pub trigger_condition: TriggerCondition,
    /// When the trigger condition was met; unset while the order is armed
    #[serde(default)]
    pub triggered_at: Option<DateTime<Utc>>,
    /// Set when this order is a leg of a bracket
    pub parent: Option<OrderId>,
    pub submitted_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn new(
        symbol: Symbol,
        side: Side,
        order_type: OrderType,
        quantity: Money,
        price: Money,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: next_order_id(),
            symbol,
            side,
            order_type,
            price,
            quantity,
            filled_quantity: Money::ZERO,
            state: OrderState::Open,
            trigger_condition: TriggerCondition::None,
            triggered_at: None,
            parent: None,
            submitted_at,
            closed_at: None,
        }
    }

    pub fn limit(
        symbol: Symbol,
        side: Side,
        quantity: Money,
        price: Money,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self::new(symbol, side, OrderType::Limit, quantity, price, submitted_at)
    }

    pub fn with_parent(mut self, parent: OrderId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_trigger(mut self, trigger_condition: TriggerCondition) -> Self {
        self.trigger_condition = trigger_condition;
        self
    }

    /// Waiting for its trigger condition; cannot execute yet
    pub fn is_armed(&self) -> bool {
        !self.trigger_condition.is_none() && self.triggered_at.is_none()
    }

    pub fn activate(&mut self, at: DateTime<Utc>) {
        if self.is_armed() {
            self.triggered_at = Some(at);
        }
    }

    pub fn remaining_quantity(&self) -> Money {
        (self.quantity - self.filled_quantity).max(Money::ZERO)
    }

    /// Still resting on the book (a pending cancel counts as resting)
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            OrderState::Open | OrderState::PartiallyFilled | OrderState::CancelRequested
        )
    }

    pub fn is_finalized(&self) -> bool {
        matches!(
            self.state,
            OrderState::Filled | OrderState::Cancelled | OrderState::Rejected
        )
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == OrderState::Cancelled
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.state == OrderState::CancelRequested
    }

    /// Time the order has been open as of `now`, or its whole lifetime once closed.
    /// Never negative.
    pub fn time_elapsed(&self, now: DateTime<Utc>) -> Duration {
        let end = self.closed_at.unwrap_or(now);
        (end - self.submitted_at).max(Duration::zero())
    }

    /// Ask for cancellation. Returns false when the order is already finalized
    /// or a cancellation is already pending.
    pub fn request_cancel(&mut self) -> bool {
        match self.state {
            OrderState::Open | OrderState::PartiallyFilled => {
                self.state = OrderState::CancelRequested;
                true
            }
            _ => false,
        }
    }

    /// Exchange/simulator acknowledged the cancel
    pub fn confirm_cancel(&mut self, at: DateTime<Utc>) {
        if self.is_active() {
            self.state = OrderState::Cancelled;
            self.closed_at = Some(at);
        }
    }

    pub fn reject(&mut self, at: DateTime<Utc>) {
        self.state = OrderState::Rejected;
        self.closed_at = Some(at);
    }

    /// Apply an execution of up to `quantity`; returns the quantity actually filled
    pub fn fill(&mut self, quantity: Money, at: DateTime<Utc>) -> Money {
        if !self.is_active() || !quantity.is_positive() {
            return Money::ZERO;
        }
        let filled = quantity.min(self.remaining_quantity());
        self.filled_quantity += filled;

        if self.remaining_quantity().is_zero() {
            self.state = OrderState::Filled;
            self.closed_at = Some(at);
        } else if self.state == OrderState::Open {
            self.state = OrderState::PartiallyFilled;
        }
        filled
    }
}
