//! Per-symbol price and quantity precision

use crate::Money;
use serde::{Deserialize, Serialize};

/// Number of decimal places an instrument is quoted and traded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolPriceDetails {
    pub price_decimal_places: u32,
    pub quantity_decimal_places: u32,
}

impl SymbolPriceDetails {
    pub fn new(price_decimal_places: u32, quantity_decimal_places: u32) -> Self {
        Self {
            price_decimal_places,
            quantity_decimal_places,
        }
    }

    pub fn round_price(&self, price: Money) -> Money {
        price.round_dp(self.price_decimal_places)
    }

    pub fn round_quantity(&self, quantity: Money) -> Money {
        quantity.round_dp(self.quantity_decimal_places)
    }

    /// Format a price with exactly `price_decimal_places` decimals
    pub fn price_to_string(&self, price: Money) -> String {
        format!(
            "{:.*}",
            self.price_decimal_places as usize,
            self.round_price(price).inner()
        )
    }

    pub fn quantity_to_string(&self, quantity: Money) -> String {
        format!(
            "{:.*}",
            self.quantity_decimal_places as usize,
            self.round_quantity(quantity).inner()
        )
    }
}

impl Default for SymbolPriceDetails {
    fn default() -> Self {
        Self::new(8, 8)
    }
}
