//! TradeRecord: a completed round-trip trade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::PositionSide;
use super::signal::SignalReason;

/// A complete round-trip trade record: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: PositionSide,

    // ── Entry ──
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_balance: f64,

    // ── Exit ──
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_reason: SignalReason,

    /// Realized return fraction of the whole balance at entry.
    pub return_fraction: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.return_fraction > 0.0
    }

    pub fn pnl(&self) -> f64 {
        self.entry_balance * self.return_fraction
    }

    pub fn holding_time(&self) -> chrono::Duration {
        self.exit_time - self.entry_time
    }
}
