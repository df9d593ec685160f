//! Market depth snapshot used to price new orders
//!
//! Levels are kept in BTreeMaps keyed by price: bids are read from the top
//! (highest first), asks from the bottom (lowest first). Averages are
//! volume-weighted over the depth a given quantity would consume.

use crate::Money;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `[price, quantity]` pair as it appears in depth snapshots
pub type Level = [Money; 2];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DepthSnapshot", into = "DepthSnapshot")]
pub struct OrderBook {
    bids: BTreeMap<Money, Money>,
    asks: BTreeMap<Money, Money>,
}

/// Wire shape of a book: `{ "bids": [[price, qty], ...], "asks": [...] }`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DepthSnapshot {
    #[serde(default)]
    pub bids: Vec<Level>,
    #[serde(default)]
    pub asks: Vec<Level>,
}

impl From<DepthSnapshot> for OrderBook {
    fn from(snapshot: DepthSnapshot) -> Self {
        OrderBook::from_levels(&snapshot.bids, &snapshot.asks)
    }
}

impl From<OrderBook> for DepthSnapshot {
    fn from(book: OrderBook) -> Self {
        DepthSnapshot {
            bids: book.bids.iter().rev().map(|(p, q)| [*p, *q]).collect(),
            asks: book.asks.iter().map(|(p, q)| [*p, *q]).collect(),
        }
    }
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_levels(bids: &[Level], asks: &[Level]) -> Self {
        let mut book = Self::new();
        for [price, qty] in bids {
            book.update_bid(*price, *qty);
        }
        for [price, qty] in asks {
            book.update_ask(*price, *qty);
        }
        book
    }

    /// Set the quantity resting at a bid price. Zero (or less) removes the level.
    pub fn update_bid(&mut self, price: Money, quantity: Money) {
        Self::apply(&mut self.bids, price, quantity);
    }

    /// Set the quantity resting at an ask price. Zero (or less) removes the level.
    pub fn update_ask(&mut self, price: Money, quantity: Money) {
        Self::apply(&mut self.asks, price, quantity);
    }

    fn apply(side: &mut BTreeMap<Money, Money>, price: Money, quantity: Money) {
        if quantity.is_positive() {
            side.insert(price, quantity);
        } else {
            side.remove(&price);
        }
    }

    pub fn best_bid(&self) -> Option<Money> {
        self.bids.keys().next_back().copied()
    }

    pub fn best_ask(&self) -> Option<Money> {
        self.asks.keys().next().copied()
    }

    /// No levels on either side
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Both sides carry liquidity, so a spread can be measured
    pub fn has_depth(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Average price a sell of `quantity` would achieve against the bids
    pub fn average_bid(&self, quantity: Money) -> Money {
        Self::weighted_average(self.bids.iter().rev(), quantity)
    }

    /// Average price a buy of `quantity` would achieve against the asks
    pub fn average_ask(&self, quantity: Money) -> Money {
        Self::weighted_average(self.asks.iter(), quantity)
    }

    /// Distance between the achievable ask and bid averages for `quantity`
    pub fn spread(&self, quantity: Money) -> Money {
        self.average_ask(quantity) - self.average_bid(quantity)
    }

    // Walks levels best-first. A book shallower than `quantity` averages over
    // everything it has; a zero quantity reads the touch.
    fn weighted_average<'a>(
        mut levels: impl Iterator<Item = (&'a Money, &'a Money)>,
        quantity: Money,
    ) -> Money {
        if !quantity.is_positive() {
            return levels.next().map(|(price, _)| *price).unwrap_or(Money::ZERO);
        }

        let mut remaining = quantity;
        let mut cost = Money::ZERO;
        let mut consumed = Money::ZERO;

        for (price, available) in levels {
            let take = remaining.min(*available);
            cost += *price * take;
            consumed += take;
            remaining -= take;
            if remaining.is_zero() {
                break;
            }
        }

        cost / consumed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn m(v: rust_decimal::Decimal) -> Money {
        Money::new(v)
    }

    fn book() -> OrderBook {
        OrderBook::from_levels(
            &[[m(dec!(99)), m(dec!(1))], [m(dec!(98)), m(dec!(3))]],
            &[[m(dec!(101)), m(dec!(2))], [m(dec!(103)), m(dec!(2))]],
        )
    }

    #[test]
    fn test_best_bid_ask() {
        let book = book();
        assert_eq!(book.best_bid(), Some(m(dec!(99))));
        assert_eq!(book.best_ask(), Some(m(dec!(101))));
    }

    #[test]
    fn test_averages_within_top_level() {
        let book = book();
        assert_eq!(book.average_bid(m(dec!(1))), m(dec!(99)));
        assert_eq!(book.average_ask(m(dec!(1))), m(dec!(101)));
        assert_eq!(book.spread(m(dec!(1))), m(dec!(2)));
    }

    #[test]
    fn test_averages_walk_depth() {
        let book = book();
        // bids: 1 @ 99 + 1 @ 98
        assert_eq!(book.average_bid(m(dec!(2))), m(dec!(98.5)));
        // asks: 2 @ 101 + 2 @ 103
        assert_eq!(book.average_ask(m(dec!(4))), m(dec!(102)));
        assert_eq!(book.spread(m(dec!(2))), m(dec!(2.5)));
    }

    #[test]
    fn test_quantity_beyond_depth_uses_everything() {
        let book = book();
        // 2 @ 101 + 2 @ 103, nothing more to take
        assert_eq!(book.average_ask(m(dec!(10))), m(dec!(102)));
    }

    #[test]
    fn test_zero_quantity_reads_touch() {
        let book = book();
        assert_eq!(book.average_bid(Money::ZERO), m(dec!(99)));
        assert_eq!(book.average_ask(Money::ZERO), m(dec!(101)));
    }

    #[test]
    fn test_zero_quantity_level_removes() {
        let mut book = book();
        book.update_bid(m(dec!(99)), Money::ZERO);
        assert_eq!(book.best_bid(), Some(m(dec!(98))));
        assert_eq!(book.bid_levels(), 1);
    }

    #[test]
    fn test_empty_and_depth() {
        let mut book = OrderBook::new();
        assert!(book.is_empty());
        assert!(!book.has_depth());

        book.update_ask(m(dec!(101)), m(dec!(1)));
        assert!(!book.is_empty());
        assert!(!book.has_depth());
        assert_eq!(book.average_bid(m(dec!(1))), Money::ZERO);

        book.update_bid(m(dec!(99)), m(dec!(1)));
        assert!(book.has_depth());
    }

    #[test]
    fn test_deserialize_snapshot() {
        let json = r#"{"bids": [["99.5", "1"], ["99", "2"]], "asks": [["100.5", "3"]]}"#;
        let book: OrderBook = serde_json::from_str(json).unwrap();
        assert_eq!(book.best_bid(), Some(m(dec!(99.5))));
        assert_eq!(book.best_ask(), Some(m(dec!(100.5))));
        assert_eq!(book.bid_levels(), 2);
    }
}
