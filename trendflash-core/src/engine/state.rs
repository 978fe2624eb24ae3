//! Engine state: the open position, the re-entry guard, and the balance.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Position, PositionSide};

/// Errors from the decision math. Any of these aborts the driver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("initial balance must be finite and positive, got {0}")]
    InvalidInitialBalance(f64),

    #[error("balance became non-finite ({balance}) after applying return {return_fraction}")]
    NonFiniteBalance { balance: f64, return_fraction: f64 },

    #[error("position liquidated: return {return_fraction} would take the balance to {balance}")]
    Liquidated { balance: f64, return_fraction: f64 },
}

/// State carried from one decision pass to the next.
///
/// Owned by exactly one consumer (backtest loop or live loop) and threaded
/// through [`crate::engine::DecisionEngine::decide`] by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub position: Option<Position>,
    /// Side most recently closed by the stop indicator. Gates same-side
    /// re-entry; see [`crate::engine::ReentryGuard`] for how long it lives.
    pub previous_closed_side: Option<PositionSide>,
    pub balance: f64,
    pub initial_balance: f64,
}

impl EngineState {
    pub fn new(initial_balance: f64) -> Result<Self, EngineError> {
        if !initial_balance.is_finite() || initial_balance <= 0.0 {
            return Err(EngineError::InvalidInitialBalance(initial_balance));
        }
        Ok(Self {
            position: None,
            previous_closed_side: None,
            balance: initial_balance,
            initial_balance,
        })
    }

    /// Cumulative return relative to the initial balance.
    pub fn roi(&self) -> f64 {
        (self.balance - self.initial_balance) / self.initial_balance
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Compound a realized return into the balance.
    ///
    /// The balance must stay finite and strictly positive.
    pub fn apply_return(&mut self, return_fraction: f64) -> Result<(), EngineError> {
        let balance = self.balance * (1.0 + return_fraction);
        if !balance.is_finite() {
            return Err(EngineError::NonFiniteBalance {
                balance,
                return_fraction,
            });
        }
        if return_fraction <= -1.0 {
            return Err(EngineError::Liquidated {
                balance,
                return_fraction,
            });
        }
        self.balance = balance;
        Ok(())
    }
}
