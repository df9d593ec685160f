//! Replay engine
//!
//! Deterministic host for an [`OrderManager`]: candles of every symbol are
//! merged on their close time and, for each one, the engine
//! 1. confirms cancellations left pending by the simulated venue,
//! 2. fills resting orders and reports them to the manager as finalized,
//!    updated or unchanged,
//! 3. submits the order intents that have become due, priced by the manager,
//!    asking it to give up older orders on other symbols when cash is short.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::oms::{
    CancelMode, FillSimulator, Order, OrderBook, OrderId, OrderManager, OrderRequest, OrderType,
    PricingContext, Resubmission, SimulatedTrader, SymbolPriceDetails, Trader, TriggerCondition,
};
use crate::types::CandleValidationError;
use crate::{Candle, Money, Side, Symbol};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("unknown symbol {0}")]
    UnknownSymbol(Symbol),

    #[error("symbol {0} registered twice")]
    DuplicateSymbol(Symbol),

    #[error("invalid candle {index} for {symbol}: {source}")]
    InvalidCandle {
        symbol: Symbol,
        index: usize,
        #[source]
        source: CandleValidationError,
    },

    #[error("candle {index} for {symbol} does not close after the previous one")]
    Unordered { symbol: Symbol, index: usize },
}

/// An order the scenario wants placed once its symbol's clock reaches `submit_at`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: Money,
    /// Requested price, kept when no usable book is supplied
    pub price: Money,
    pub submit_at: DateTime<Utc>,
    #[serde(default)]
    pub book: Option<OrderBook>,
    #[serde(default)]
    pub trigger: TriggerCondition,
}

/// Which decision led to a cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelSource {
    /// `unchanged` found the order too old
    Lifecycle,
    /// Given up to fund an order on another symbol
    FundRelease,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    Submitted {
        side: Side,
        quantity: Money,
        requested_price: Money,
        price: Money,
    },
    Resubmitted {
        replaces: OrderId,
    },
    /// Trigger condition met, the order can now execute
    Triggered,
    PartiallyFilled {
        price: Money,
        quantity: Money,
    },
    Filled {
        price: Money,
        quantity: Money,
    },
    CancelRequested {
        source: CancelSource,
    },
    Cancelled {
        source: CancelSource,
    },
    Rejected {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    pub at: DateTime<Utc>,
    pub symbol: Symbol,
    pub order_id: Option<OrderId>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Cash and asset balances; open orders hold their reservation until they fill
/// or are cancelled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub cash: Money,
    pub holdings: BTreeMap<Symbol, Money>,
}

impl Account {
    pub fn new(cash: Money, holdings: BTreeMap<Symbol, Money>) -> Self {
        Self { cash, holdings }
    }

    pub fn holding(&self, symbol: &Symbol) -> Money {
        self.holdings.get(symbol).copied().unwrap_or_default()
    }

    /// BUY reserves quote cash, SELL reserves the asset. False if short.
    pub fn reserve(&mut self, side: Side, symbol: &Symbol, amount: Money) -> bool {
        let balance = match side {
            Side::Buy => &mut self.cash,
            Side::Sell => self.holdings.entry(symbol.clone()).or_default(),
        };
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        true
    }

    /// Return what the unfilled part of `order` still holds
    pub fn release(&mut self, order: &Order) {
        let remaining = order.remaining_quantity();
        match order.side {
            Side::Buy => self.cash += order.price * remaining,
            Side::Sell => *self.holdings.entry(order.symbol.clone()).or_default() += remaining,
        }
    }

    pub fn settle_fill(&mut self, side: Side, symbol: &Symbol, price: Money, quantity: Money) {
        match side {
            Side::Buy => *self.holdings.entry(symbol.clone()).or_default() += quantity,
            Side::Sell => self.cash += price * quantity,
        }
    }
}

fn reserved_amount(order: &Order) -> Money {
    match order.side {
        Side::Buy => order.price * order.remaining_quantity(),
        Side::Sell => order.remaining_quantity(),
    }
}

#[derive(Debug, Default)]
struct Ledger {
    account: Account,
    events: Vec<ReplayEvent>,
    pending_cancels: BTreeMap<OrderId, CancelSource>,
}

impl Ledger {
    fn record(
        &mut self,
        at: DateTime<Utc>,
        symbol: &Symbol,
        order_id: Option<OrderId>,
        kind: EventKind,
    ) {
        debug!("{} {} order {:?}: {:?}", at, symbol, order_id, kind);
        self.events.push(ReplayEvent {
            at,
            symbol: symbol.clone(),
            order_id,
            kind,
        });
    }

    /// Book the outcome of a cancel request. Returns true when the order has
    /// just become cancelled and the manager should be told it is finalized.
    fn observe_cancel(&mut self, order: &Order, at: DateTime<Utc>, source: CancelSource) -> bool {
        if order.is_cancelled() {
            let source = self.pending_cancels.remove(&order.id).unwrap_or(source);
            self.account.release(order);
            self.record(at, &order.symbol, Some(order.id), EventKind::Cancelled { source });
            return true;
        }
        if order.is_cancel_requested() {
            if let Entry::Vacant(slot) = self.pending_cancels.entry(order.id) {
                slot.insert(source);
                self.record(
                    at,
                    &order.symbol,
                    Some(order.id),
                    EventKind::CancelRequested { source },
                );
            }
        }
        false
    }
}

#[derive(Debug, Clone)]
struct ScheduledIntent {
    intent: OrderIntent,
    done: bool,
}

/// Outcome of a replay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayReport {
    pub events: Vec<ReplayEvent>,
    pub orders: Vec<Order>,
    pub final_cash: Money,
    pub holdings: BTreeMap<Symbol, Money>,
    /// Intents whose symbol never reached their submission time
    pub unsubmitted: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub submitted: usize,
    pub filled: usize,
    pub partial_fills: usize,
    pub cancelled_lifecycle: usize,
    pub cancelled_fund_release: usize,
    pub rejected: usize,
    pub unsubmitted: usize,
}

impl ReplayReport {
    pub fn summary(&self) -> ReplaySummary {
        let mut summary = ReplaySummary {
            unsubmitted: self.unsubmitted,
            ..Default::default()
        };
        for event in &self.events {
            match event.kind {
                EventKind::Submitted { .. } | EventKind::Resubmitted { .. } => {
                    summary.submitted += 1
                }
                EventKind::Filled { .. } => summary.filled += 1,
                EventKind::PartiallyFilled { .. } => summary.partial_fills += 1,
                EventKind::Cancelled {
                    source: CancelSource::Lifecycle,
                } => summary.cancelled_lifecycle += 1,
                EventKind::Cancelled {
                    source: CancelSource::FundRelease,
                } => summary.cancelled_fund_release += 1,
                EventKind::Rejected { .. } => summary.rejected += 1,
                EventKind::CancelRequested { .. } | EventKind::Triggered => {}
            }
        }
        summary
    }

    pub fn events_for(&self, order_id: OrderId) -> impl Iterator<Item = &ReplayEvent> {
        self.events
            .iter()
            .filter(move |event| event.order_id == Some(order_id))
    }
}

/// Drives an order manager over replayed candles
pub struct Replayer {
    manager: Box<dyn OrderManager>,
    simulator: FillSimulator,
    cancel_mode: CancelMode,
    traders: BTreeMap<Symbol, SimulatedTrader>,
    candles: BTreeMap<Symbol, Vec<Candle>>,
    intents: Vec<ScheduledIntent>,
    orders: Vec<Order>,
    ledger: Ledger,
}

impl Replayer {
    pub fn new(config: &Config, manager: Box<dyn OrderManager>) -> Self {
        Replayer {
            manager,
            simulator: FillSimulator::new(config.execution.participation_rate),
            cancel_mode: config.execution.cancel_mode,
            traders: BTreeMap::new(),
            candles: BTreeMap::new(),
            intents: Vec::new(),
            orders: Vec::new(),
            ledger: Ledger {
                account: Account::new(config.account.initial_cash, config.account.holdings()),
                ..Default::default()
            },
        }
    }

    pub fn add_symbol(
        &mut self,
        symbol: Symbol,
        price_details: SymbolPriceDetails,
        candles: Vec<Candle>,
    ) -> Result<(), ReplayError> {
        if self.traders.contains_key(&symbol) {
            return Err(ReplayError::DuplicateSymbol(symbol));
        }
        for (index, candle) in candles.iter().enumerate() {
            candle.validate().map_err(|source| ReplayError::InvalidCandle {
                symbol: symbol.clone(),
                index,
                source,
            })?;
            if index > 0 && candle.close_time <= candles[index - 1].close_time {
                return Err(ReplayError::Unordered {
                    symbol: symbol.clone(),
                    index,
                });
            }
        }

        let trader =
            SimulatedTrader::new(symbol.clone(), price_details).with_cancel_mode(self.cancel_mode);
        self.traders.insert(symbol.clone(), trader);
        self.candles.insert(symbol, candles);
        Ok(())
    }

    pub fn schedule(&mut self, intent: OrderIntent) -> Result<(), ReplayError> {
        if !self.traders.contains_key(&intent.symbol) {
            return Err(ReplayError::UnknownSymbol(intent.symbol));
        }
        self.intents.push(ScheduledIntent {
            intent,
            done: false,
        });
        Ok(())
    }

    pub fn account(&self) -> &Account {
        &self.ledger.account
    }

    pub fn run(mut self) -> ReplayReport {
        let mut timeline: Vec<(DateTime<Utc>, Symbol, usize)> = self
            .candles
            .iter()
            .flat_map(|(symbol, candles)| {
                candles
                    .iter()
                    .enumerate()
                    .map(move |(index, candle)| (candle.close_time, symbol.clone(), index))
            })
            .collect();
        timeline.sort();

        info!(
            "Replaying {} candles across {} symbols with {} order intents",
            timeline.len(),
            self.traders.len(),
            self.intents.len()
        );

        for (_, symbol, index) in timeline {
            let candle = self.candles[&symbol][index].clone();
            if let Some(trader) = self.traders.get_mut(&symbol) {
                trader.update(candle.clone());
            }
            self.confirm_pending_cancels(&symbol, &candle);
            self.evaluate_orders(&symbol, &candle);
            self.submit_due_intents(&symbol, candle.close_time);
        }

        let unsubmitted = self.intents.iter().filter(|i| !i.done).count();
        let report = ReplayReport {
            events: self.ledger.events,
            orders: self.orders,
            final_cash: self.ledger.account.cash,
            holdings: self.ledger.account.holdings,
            unsubmitted,
        };
        info!("Replay finished: {:?}", report.summary());
        report
    }

    fn confirm_pending_cancels(&mut self, symbol: &Symbol, candle: &Candle) {
        let Some(trader) = self.traders.get(symbol) else {
            return;
        };
        for order in self
            .orders
            .iter_mut()
            .filter(|o| &o.symbol == symbol && o.is_cancel_requested())
        {
            order.confirm_cancel(candle.datetime);
            if self
                .ledger
                .observe_cancel(order, candle.datetime, CancelSource::Lifecycle)
            {
                self.manager.finalized(order, trader);
            }
        }
    }

    fn evaluate_orders(&mut self, symbol: &Symbol, candle: &Candle) {
        let Some(trader) = self.traders.get(symbol) else {
            return;
        };
        let now = candle.close_time;
        let mut replacements: Vec<(OrderId, Order)> = Vec::new();

        for order in self
            .orders
            .iter_mut()
            .filter(|o| &o.symbol == symbol && o.is_active() && !o.is_cancel_requested())
        {
            let was_armed = order.is_armed();
            let fill = self.simulator.execute(order, candle);
            if was_armed && !order.is_armed() {
                self.ledger
                    .record(now, symbol, Some(order.id), EventKind::Triggered);
            }
            if let Some((price, quantity)) = fill {
                self.ledger
                    .account
                    .settle_fill(order.side, symbol, price, quantity);
                let kind = if order.is_finalized() {
                    EventKind::Filled { price, quantity }
                } else {
                    EventKind::PartiallyFilled { price, quantity }
                };
                self.ledger.record(now, symbol, Some(order.id), kind);
            }

            let mut resubmitted = Vec::new();
            {
                let mut sink = |replacement: Order| resubmitted.push(replacement);
                match fill {
                    Some(_) if order.is_finalized() => self.manager.finalized(order, trader),
                    Some(_) => self.manager.updated(order, trader, Resubmission::new(&mut sink)),
                    None => self.manager.unchanged(order, trader, Resubmission::new(&mut sink)),
                }
            }
            replacements.extend(resubmitted.into_iter().map(|r| (order.id, r)));

            if self.ledger.observe_cancel(order, now, CancelSource::Lifecycle) {
                self.manager.finalized(order, trader);
            }
        }

        for (replaces, order) in replacements {
            self.accept_resubmission(replaces, order, now);
        }
    }

    // Funds are reserved at the order price, so only priced orders are accepted.
    fn accept_resubmission(&mut self, replaces: OrderId, order: Order, now: DateTime<Utc>) {
        let rejection = if !self.traders.contains_key(&order.symbol) {
            Some("unknown symbol")
        } else if order.order_type == OrderType::Market {
            Some("market orders are not supported")
        } else if !order.price.is_positive() {
            Some("order price must be positive")
        } else {
            None
        };
        if let Some(reason) = rejection {
            self.ledger.record(
                now,
                &order.symbol,
                Some(order.id),
                EventKind::Rejected {
                    reason: reason.to_string(),
                },
            );
            return;
        }
        if !self
            .ledger
            .account
            .reserve(order.side, &order.symbol, reserved_amount(&order))
        {
            self.ledger.record(
                now,
                &order.symbol,
                Some(order.id),
                EventKind::Rejected {
                    reason: "insufficient funds".to_string(),
                },
            );
            return;
        }
        self.ledger.record(
            now,
            &order.symbol,
            Some(order.id),
            EventKind::Resubmitted { replaces },
        );
        self.orders.push(order);
    }

    fn submit_due_intents(&mut self, symbol: &Symbol, now: DateTime<Utc>) {
        for index in 0..self.intents.len() {
            let scheduled = &self.intents[index];
            if scheduled.done
                || &scheduled.intent.symbol != symbol
                || scheduled.intent.submit_at > now
            {
                continue;
            }
            self.intents[index].done = true;
            let intent = self.intents[index].intent.clone();
            self.submit(intent, now);
        }
    }

    fn submit(&mut self, intent: OrderIntent, now: DateTime<Utc>) {
        let Some(trader) = self.traders.get(&intent.symbol) else {
            return;
        };
        let context = PricingContext::new(*trader.price_details());

        let mut request = OrderRequest {
            symbol: intent.symbol.clone(),
            side: intent.side,
            order_type: OrderType::Limit,
            quantity: intent.quantity,
            price: intent.price,
        };
        self.manager
            .prepare_order(intent.book.as_ref(), &mut request, &context);

        let amount = request.reserved_amount();
        if request.side == Side::Buy && self.ledger.account.cash < amount {
            self.release_funds_for(&request.symbol, amount);
        }
        if !self
            .ledger
            .account
            .reserve(request.side, &request.symbol, amount)
        {
            self.ledger.record(
                now,
                &request.symbol,
                None,
                EventKind::Rejected {
                    reason: "insufficient funds".to_string(),
                },
            );
            return;
        }

        let order = request.into_order(now).with_trigger(intent.trigger);
        self.ledger.record(
            now,
            &order.symbol,
            Some(order.id),
            EventKind::Submitted {
                side: order.side,
                quantity: order.quantity,
                requested_price: intent.price,
                price: order.price,
            },
        );
        self.orders.push(order);
    }

    // Oldest BUY orders on other symbols are offered to the manager first.
    fn release_funds_for(&mut self, new_symbol: &Symbol, needed: Money) {
        let Some(new_trader) = self.traders.get(new_symbol) else {
            return;
        };

        let mut candidates: Vec<usize> = self
            .orders
            .iter()
            .enumerate()
            .filter(|(_, o)| {
                o.side == Side::Buy
                    && &o.symbol != new_symbol
                    && o.is_active()
                    && !o.is_cancel_requested()
            })
            .map(|(index, _)| index)
            .collect();
        candidates.sort_by_key(|&index| {
            let order = &self.orders[index];
            (order.submitted_at, order.id)
        });

        for index in candidates {
            if self.ledger.account.cash >= needed {
                break;
            }
            let order = &mut self.orders[index];
            let Some(current) = self.traders.get(&order.symbol) else {
                continue;
            };
            let at = current.now().unwrap_or(order.submitted_at);
            let released = self
                .manager
                .cancel_to_release_funds_for(order, current, new_trader);
            debug_assert_eq!(
                released,
                order.is_cancelled(),
                "order {} reported release {} in state {:?}",
                order.id,
                released,
                order.state
            );
            let finalized = self
                .ledger
                .observe_cancel(order, at, CancelSource::FundRelease);
            if finalized {
                self.manager.finalized(order, current);
            }
        }
    }
}
