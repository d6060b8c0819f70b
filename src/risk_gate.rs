//! Stateful admission control: per-symbol cooldowns and a daily trade cap.
//!
//! All state lives behind one mutex and is only reachable through the
//! methods below. Daily counters reset lazily: the first call that observes
//! a later UTC date than the stored anchor clears them, so no timer task is
//! needed.
//!
//! `evaluate` + `record_execution` give the plain check-then-record flow.
//! `reserve` performs the same check and holds an in-flight slot under the
//! same lock, so two concurrent signals for one symbol cannot both pass
//! before the first order lands. The slot is released when the
//! [`Reservation`] is dropped unless it was confirmed.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::RiskConfig;
use crate::context::TimeProvider;
use crate::model::{Decision, DenyReason, ParsedSignal};

#[derive(Debug, Default)]
struct RiskState {
    last_execution: HashMap<String, DateTime<Utc>>,
    daily_trades: u32,
    day_anchor: Option<NaiveDate>,
    in_flight: HashMap<String, u32>,
    in_flight_total: u32,
}

impl RiskState {
    /// Returns true when a new trading day cleared the counters.
    fn reconcile_day(&mut self, now: DateTime<Utc>) -> bool {
        let current_day = now.date_naive();
        match self.day_anchor {
            None => {
                self.day_anchor = Some(current_day);
                false
            }
            Some(anchor) if current_day > anchor => {
                self.day_anchor = Some(current_day);
                self.daily_trades = 0;
                self.last_execution.clear();
                true
            }
            Some(_) => false,
        }
    }

    fn record(&mut self, symbol: &str, now: DateTime<Utc>) {
        self.last_execution.insert(symbol.to_string(), now);
        self.daily_trades += 1;
    }

    fn release(&mut self, symbol: &str) {
        if let Some(count) = self.in_flight.get_mut(symbol) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(symbol);
            }
            self.in_flight_total = self.in_flight_total.saturating_sub(1);
        }
    }
}

/// Snapshot of the gate for operators.
#[derive(Debug, Clone, Serialize)]
pub struct RiskSnapshot {
    pub trading_day: Option<NaiveDate>,
    pub daily_trades: u32,
    pub max_daily_trades: Option<u32>,
    pub in_flight: u32,
    /// Remaining cooldown per symbol, in seconds.
    pub cooldowns: BTreeMap<String, i64>,
}

pub struct RiskGate {
    cooldown: Option<Duration>,
    max_daily_trades: Option<u32>,
    clock: Arc<dyn TimeProvider>,
    state: Mutex<RiskState>,
}

impl RiskGate {
    pub fn new(config: &RiskConfig, clock: Arc<dyn TimeProvider>) -> Self {
        // Values past chrono's range saturate; the day rollover clears them anyway.
        let cooldown = match config.cooldown_seconds {
            0 => None,
            secs => Some(
                i64::try_from(secs)
                    .ok()
                    .and_then(Duration::try_seconds)
                    .unwrap_or(Duration::MAX),
            ),
        };
        let max_daily_trades = Some(config.max_daily_trades).filter(|cap| *cap > 0);

        info!(
            cooldown_seconds = config.cooldown_seconds,
            max_daily_trades = config.max_daily_trades,
            "RiskGate initialized"
        );

        Self {
            cooldown,
            max_daily_trades,
            clock,
            state: Mutex::new(RiskState::default()),
        }
    }

    /// Admission check against current state. Does not consume budget.
    pub fn evaluate(&self, signal: &ParsedSignal, desired_notional: Decimal) -> Decision {
        if desired_notional <= Decimal::ZERO {
            return Decision::Deny(DenyReason::NonPositiveNotional);
        }

        let now = self.clock.now();
        let mut state = self.state.lock();
        self.roll_day(&mut state, now);

        match self.check(&state, signal.symbol(), now) {
            Ok(()) => Decision::Allow {
                notional: desired_notional,
            },
            Err(reason) => Decision::Deny(reason),
        }
    }

    /// Record an order that was accepted by the exchange.
    pub fn record_execution(&self, signal: &ParsedSignal, executed_notional: Decimal) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.roll_day(&mut state, now);
        state.record(signal.symbol(), now);

        debug!(
            symbol = %signal.symbol(),
            notional = %executed_notional,
            daily_trades = state.daily_trades,
            "risk recorded execution"
        );
    }

    /// Evaluate and, when allowed, hold an in-flight slot for the symbol.
    pub fn reserve(
        &self,
        signal: &ParsedSignal,
        desired_notional: Decimal,
    ) -> Result<Reservation<'_>, DenyReason> {
        if desired_notional <= Decimal::ZERO {
            return Err(DenyReason::NonPositiveNotional);
        }

        let now = self.clock.now();
        let mut state = self.state.lock();
        self.roll_day(&mut state, now);
        self.check(&state, signal.symbol(), now)?;

        *state
            .in_flight
            .entry(signal.symbol().to_string())
            .or_insert(0) += 1;
        state.in_flight_total += 1;

        Ok(Reservation {
            gate: self,
            symbol: signal.symbol().to_string(),
            notional: desired_notional,
            settled: false,
        })
    }

    pub fn snapshot(&self) -> RiskSnapshot {
        let now = self.clock.now();
        let mut state = self.state.lock();
        self.roll_day(&mut state, now);

        let cooldowns = match self.cooldown {
            Some(cooldown) => state
                .last_execution
                .iter()
                .filter_map(|(symbol, last)| {
                    let remaining = cooldown.checked_sub(&(now - *last))?;
                    (remaining > Duration::zero())
                        .then(|| (symbol.clone(), remaining.num_seconds()))
                })
                .collect(),
            None => BTreeMap::new(),
        };

        RiskSnapshot {
            trading_day: state.day_anchor,
            daily_trades: state.daily_trades,
            max_daily_trades: self.max_daily_trades,
            in_flight: state.in_flight_total,
            cooldowns,
        }
    }

    fn roll_day(&self, state: &mut RiskState, now: DateTime<Utc>) {
        if state.reconcile_day(now) {
            info!(trading_day = %now.date_naive(), "risk counters reset for new UTC day");
        }
    }

    fn check(&self, state: &RiskState, symbol: &str, now: DateTime<Utc>) -> Result<(), DenyReason> {
        if let Some(cooldown) = self.cooldown {
            if let Some(last) = state.last_execution.get(symbol) {
                if now - *last < cooldown {
                    return Err(DenyReason::CooldownActive);
                }
            }
            if state.in_flight.contains_key(symbol) {
                return Err(DenyReason::ExecutionPending);
            }
        }

        if let Some(cap) = self.max_daily_trades {
            if state.daily_trades + state.in_flight_total >= cap {
                return Err(DenyReason::DailyTradeLimit);
            }
        }

        Ok(())
    }

    fn settle(&self, symbol: &str, executed_notional: Option<Decimal>) {
        let now = self.clock.now();
        let mut state = self.state.lock();
        state.release(symbol);

        match executed_notional {
            Some(notional) => {
                self.roll_day(&mut state, now);
                state.record(symbol, now);
                debug!(
                    symbol = %symbol,
                    notional = %notional,
                    daily_trades = state.daily_trades,
                    "risk confirmed reservation"
                );
            }
            None => debug!(symbol = %symbol, "risk reservation released"),
        }
    }
}

/// In-flight admission held by [`RiskGate::reserve`].
#[must_use = "dropping a reservation releases it immediately"]
pub struct Reservation<'a> {
    gate: &'a RiskGate,
    symbol: String,
    notional: Decimal,
    settled: bool,
}

impl Reservation<'_> {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn notional(&self) -> Decimal {
        self.notional
    }

    /// The order went through: start the cooldown and count the trade.
    pub fn confirm(mut self, executed_notional: Decimal) {
        self.settled = true;
        self.gate.settle(&self.symbol, Some(executed_notional));
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.gate.settle(&self.symbol, None);
        }
    }
}
