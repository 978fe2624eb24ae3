//! Per-candle decision state machine.
//!
//! One pass per candle, three steps:
//!
//! 0. Warm-up gate: no trend value, no decision, state unchanged.
//! 1. Dynamic stop: an open position is closed when the close crosses the
//!    stop line (long: `close <= stop`, short: `close >= stop`).
//! 2. Trend entry/exit: `close < trend` goes short, `close > trend` goes long,
//!    closing an opposite position first. A side just stopped out in step 1
//!    cannot be re-entered in the same pass.
//!
//! Signals are returned in emission order:
//! `[stop close] -> [trend close] -> [trend open]`.

use serde::{Deserialize, Serialize};

use super::state::{EngineError, EngineState};
use crate::domain::{Candle, Position, PositionSide, Signal, SignalReason, SignalSide};
use crate::indicators::{IndicatorValue, TrendReading};

/// How long a stop-out blocks re-entry on the stopped side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReentryGuard {
    /// Only the pass that fired the stop is guarded; cleared at the start of
    /// every decided candle.
    #[default]
    SameCandle,
    /// Guard persists across candles until the next stop overwrites it.
    UntilNextStop,
}

/// Notification-facing record of what happened during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Opened {
        side: PositionSide,
        price: f64,
        reason: SignalReason,
    },
    Closed {
        side: PositionSide,
        price: f64,
        reason: SignalReason,
        return_fraction: f64,
    },
}

/// Output of one decision pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Decision {
    /// Trade intents, in emission order.
    pub signals: Vec<Signal>,
    pub events: Vec<EngineEvent>,
}

impl Decision {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty() && self.events.is_empty()
    }
}

/// The decision routine shared by the backtest and live drivers.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    market: String,
    guard: ReentryGuard,
}

impl DecisionEngine {
    pub fn new(market: impl Into<String>, guard: ReentryGuard) -> Self {
        Self {
            market: market.into(),
            guard,
        }
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn guard(&self) -> ReentryGuard {
        self.guard
    }

    /// Run one decision pass for `candle`.
    ///
    /// Pure: the new state and everything the caller should forward are
    /// returned; nothing is sent anywhere from here.
    pub fn decide(
        &self,
        candle: &Candle,
        reading: TrendReading,
        state: EngineState,
    ) -> Result<(EngineState, Decision), EngineError> {
        let mut decision = Decision::default();
        let IndicatorValue::Ready(trend) = reading.trend else {
            return Ok((state, decision));
        };

        let mut state = state;
        if self.guard == ReentryGuard::SameCandle {
            state.previous_closed_side = None;
        }
        let price = candle.close;

        // Step 1: dynamic stop
        if let (Some(position), Some(stop)) = (state.position, reading.stop.value()) {
            let stopped = match position.side {
                PositionSide::Long => price <= stop,
                PositionSide::Short => price >= stop,
            };
            if stopped {
                self.close(&mut state, &mut decision, position, price, SignalReason::Stop)?;
                state.previous_closed_side = Some(position.side);
            }
        }

        // Step 2: trend following
        let entry_side = if price < trend {
            Some(PositionSide::Short)
        } else if price > trend {
            Some(PositionSide::Long)
        } else {
            None
        };

        if let Some(side) = entry_side {
            let conflicting = state.position.map_or(true, |p| p.side != side);
            if conflicting && state.previous_closed_side != Some(side) {
                if let Some(position) = state.position {
                    self.close(
                        &mut state,
                        &mut decision,
                        position,
                        price,
                        SignalReason::TrendReversal,
                    )?;
                }
                decision.signals.push(Signal::new(
                    self.market.clone(),
                    side.into(),
                    SignalReason::TrendEntry,
                ));
                state.position = Some(Position::open(side, state.balance, price));
                decision.events.push(EngineEvent::Opened {
                    side,
                    price,
                    reason: SignalReason::TrendEntry,
                });
            }
        }

        Ok((state, decision))
    }

    fn close(
        &self,
        state: &mut EngineState,
        decision: &mut Decision,
        position: Position,
        price: f64,
        reason: SignalReason,
    ) -> Result<(), EngineError> {
        let return_fraction = position.close(price);
        state.apply_return(return_fraction)?;
        state.position = None;
        decision
            .signals
            .push(Signal::new(self.market.clone(), SignalSide::Close, reason));
        decision.events.push(EngineEvent::Closed {
            side: position.side,
            price,
            reason,
            return_fraction,
        });
        Ok(())
    }
}
