//! Position ledger: at most one open position, full-balance allocation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn opposite(self) -> Self {
        match self {
            PositionSide::Long => PositionSide::Short,
            PositionSide::Short => PositionSide::Long,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

/// A single open position.
///
/// The whole balance at entry is allocated; there is no independent sizing.
/// A position is never mutated: it is created by [`Position::open`] and
/// consumed by the engine after [`Position::close`] yields its return.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub open_price: f64,
    pub open_balance: f64,
}

impl Position {
    pub fn open(side: PositionSide, balance: f64, price: f64) -> Self {
        Self {
            side,
            open_price: price,
            open_balance: balance,
        }
    }

    /// Realized return fraction when exiting at `exit_price`.
    ///
    /// Long: `(exit - open) / open`. Short: `(open - exit) / open`.
    pub fn close(&self, exit_price: f64) -> f64 {
        match self.side {
            PositionSide::Long => (exit_price - self.open_price) / self.open_price,
            PositionSide::Short => (self.open_price - exit_price) / self.open_price,
        }
    }
}
