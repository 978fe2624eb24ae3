//! Trade intents emitted by the decision engine.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::position::PositionSide;

/// What a signal asks the downstream trader to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSide {
    Long,
    Short,
    Close,
}

impl From<PositionSide> for SignalSide {
    fn from(side: PositionSide) -> Self {
        match side {
            PositionSide::Long => SignalSide::Long,
            PositionSide::Short => SignalSide::Short,
        }
    }
}

impl fmt::Display for SignalSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalSide::Long => write!(f, "long"),
            SignalSide::Short => write!(f, "short"),
            SignalSide::Close => write!(f, "close"),
        }
    }
}

/// Why a position was opened or closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalReason {
    /// Close crossed the stop indicator.
    Stop,
    /// Close crossed the trend line against the open position.
    TrendReversal,
    /// Close crossed the trend line with no conflicting position.
    TrendEntry,
}

impl fmt::Display for SignalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalReason::Stop => write!(f, "stop"),
            SignalReason::TrendReversal => write!(f, "trend-reversal"),
            SignalReason::TrendEntry => write!(f, "trend"),
        }
    }
}

/// A single trade intent. Signals from one candle are delivered in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signal {
    pub market: String,
    pub side: SignalSide,
    pub reason: SignalReason,
}

impl Signal {
    pub fn new(market: impl Into<String>, side: SignalSide, reason: SignalReason) -> Self {
        Self {
            market: market.into(),
            side,
            reason,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.market, self.side, self.reason)
    }
}
