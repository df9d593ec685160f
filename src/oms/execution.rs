//! Candle-driven fill simulation for resting orders

use crate::oms::types::{Order, OrderType};
use crate::{Candle, Money, Side};

/// Fills orders against replayed candles.
///
/// A limit order executes at its own price when the candle trades through it;
/// a market order executes at the candle open. The filled quantity is capped at
/// `participation_rate` of the candle volume, so large orders fill over several
/// candles.
#[derive(Debug, Clone, Copy)]
pub struct FillSimulator {
    participation_rate: f64,
}

impl FillSimulator {
    pub fn new(participation_rate: f64) -> Self {
        Self {
            participation_rate: participation_rate.clamp(0.0, 1.0),
        }
    }

    pub fn participation_rate(&self) -> f64 {
        self.participation_rate
    }

    /// Price this candle would execute `order` at, if it executes at all
    pub fn fill_price(&self, order: &Order, candle: &Candle) -> Option<Money> {
        match (order.order_type, order.side) {
            (OrderType::Market, _) => Some(Money::from_f64(candle.open)),
            (OrderType::Limit, Side::Buy) => {
                (candle.low <= order.price.to_f64()).then_some(order.price)
            }
            (OrderType::Limit, Side::Sell) => {
                (candle.high >= order.price.to_f64()).then_some(order.price)
            }
        }
    }

    /// Quantity this candle can give `order`
    pub fn available_quantity(&self, order: &Order, candle: &Candle) -> Money {
        let liquidity = Money::from_f64(candle.volume * self.participation_rate);
        order.remaining_quantity().min(liquidity)
    }

    /// Fill `order` from `candle`; returns the executed price and quantity.
    /// An armed order is activated first if the candle reaches its trigger,
    /// and otherwise does not execute.
    pub fn execute(&self, order: &mut Order, candle: &Candle) -> Option<(Money, Money)> {
        if !order.is_active() {
            return None;
        }
        if order.is_armed() {
            if !order.trigger_condition.is_reached(candle) {
                return None;
            }
            order.activate(candle.close_time);
        }
        let price = self.fill_price(order, candle)?;
        let quantity = self.available_quantity(order, candle);
        let filled = order.fill(quantity, candle.close_time);
        filled.is_positive().then_some((price, filled))
    }
}

impl Default for FillSimulator {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oms::types::{OrderState, TriggerCondition};
    use crate::Symbol;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn create_candle(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle::new_unchecked(t0(), t0() + Duration::minutes(1), open, high, low, close, volume)
    }

    fn limit(side: Side, quantity: Money, price: Money) -> Order {
        Order::limit(Symbol::new("BTCUSDT"), side, quantity, price, t0())
    }

    #[test]
    fn test_buy_limit_fill() {
        let sim = FillSimulator::default();
        let mut order = limit(Side::Buy, Money::ONE, Money::new(dec!(50000)));

        let candle = create_candle(51000.0, 52000.0, 49500.0, 50500.0, 10.0);
        let (price, qty) = sim.execute(&mut order, &candle).unwrap();

        assert_eq!(price, Money::new(dec!(50000)));
        assert_eq!(qty, Money::ONE);
        assert_eq!(order.state, OrderState::Filled);
        assert_eq!(order.closed_at, Some(candle.close_time));
    }

    #[test]
    fn test_buy_limit_no_fill() {
        let sim = FillSimulator::default();
        let mut order = limit(Side::Buy, Money::ONE, Money::new(dec!(50000)));

        let candle = create_candle(51000.0, 52000.0, 50100.0, 51500.0, 10.0);
        assert!(sim.execute(&mut order, &candle).is_none());
        assert_eq!(order.state, OrderState::Open);
    }

    #[test]
    fn test_sell_limit_fill() {
        let sim = FillSimulator::default();
        let order = limit(Side::Sell, Money::ONE, Money::new(dec!(52000)));

        let candle = create_candle(51000.0, 52500.0, 50500.0, 51500.0, 10.0);
        assert_eq!(sim.fill_price(&order, &candle), Some(Money::new(dec!(52000))));
    }

    #[test]
    fn test_market_order_fills_at_open() {
        let sim = FillSimulator::default();
        let order = Order::new(
            Symbol::new("BTCUSDT"),
            Side::Buy,
            OrderType::Market,
            Money::ONE,
            Money::ZERO,
            t0(),
        );
        let candle = create_candle(50000.0, 52000.0, 49500.0, 51000.0, 10.0);
        assert_eq!(sim.fill_price(&order, &candle), Some(Money::from_i64(50000)));
    }

    #[test]
    fn test_participation_caps_fill() {
        let sim = FillSimulator::new(0.5);
        let mut order = limit(Side::Buy, Money::from_i64(10), Money::new(dec!(100)));

        // half of 6 = 3 per candle
        let candle = create_candle(101.0, 102.0, 99.0, 100.0, 6.0);
        let (_, qty) = sim.execute(&mut order, &candle).unwrap();
        assert_eq!(qty, Money::from_i64(3));
        assert_eq!(order.state, OrderState::PartiallyFilled);
        assert_eq!(order.remaining_quantity(), Money::from_i64(7));
    }

    #[test]
    fn test_zero_volume_does_not_fill() {
        let sim = FillSimulator::default();
        let mut order = limit(Side::Buy, Money::ONE, Money::new(dec!(100)));
        let candle = create_candle(101.0, 102.0, 99.0, 100.0, 0.0);
        assert!(sim.execute(&mut order, &candle).is_none());
        assert_eq!(order.state, OrderState::Open);
    }

    #[test]
    fn test_armed_order_waits_for_trigger() {
        let sim = FillSimulator::default();
        let mut order = limit(Side::Buy, Money::ONE, Money::new(dec!(100))).with_trigger(
            TriggerCondition::StopGain {
                price: Money::new(dec!(150)),
            },
        );

        let quiet = create_candle(100.0, 101.0, 99.0, 100.0, 10.0);
        assert!(sim.execute(&mut order, &quiet).is_none());
        assert_eq!(order.state, OrderState::Open);
        assert!(order.is_armed());

        // reaches 150 and trades back through the limit
        let breakout = create_candle(100.0, 151.0, 99.0, 140.0, 10.0);
        assert_eq!(
            sim.execute(&mut order, &breakout),
            Some((Money::new(dec!(100)), Money::ONE))
        );
        assert_eq!(order.triggered_at, Some(breakout.close_time));
        assert_eq!(order.state, OrderState::Filled);
    }
}
