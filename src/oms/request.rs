//! Pre-submission order proposals

use crate::oms::price_details::SymbolPriceDetails;
use crate::oms::types::{Order, OrderType};
use crate::{Money, Side, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only services available while pricing an order
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingContext {
    pub price_details: SymbolPriceDetails,
}

impl PricingContext {
    pub fn new(price_details: SymbolPriceDetails) -> Self {
        Self { price_details }
    }
}

/// Order proposal. Only `price` may be changed by an order manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Money,
    pub price: Money,
}

impl OrderRequest {
    pub fn limit_buy(symbol: Symbol, quantity: Money, price: Money) -> Self {
        Self {
            symbol,
            side: Side::Buy,
            order_type: OrderType::Limit,
            quantity,
            price,
        }
    }

    pub fn limit_sell(symbol: Symbol, quantity: Money, price: Money) -> Self {
        Self {
            symbol,
            side: Side::Sell,
            order_type: OrderType::Limit,
            quantity,
            price,
        }
    }

    /// Cash (BUY) or asset (SELL) amount the order ties up while open
    pub fn reserved_amount(&self) -> Money {
        match self.side {
            Side::Buy => self.price * self.quantity,
            Side::Sell => self.quantity,
        }
    }

    pub fn into_order(self, submitted_at: DateTime<Utc>) -> Order {
        Order::new(
            self.symbol,
            self.side,
            self.order_type,
            self.quantity,
            self.price,
            submitted_at,
        )
    }
}
