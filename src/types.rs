// =============================================================================
// Shared types used across the Borealis trading pipeline
// =============================================================================

use serde::{Deserialize, Serialize};

/// Recommended action produced by the signal evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    StrongBuy,
    Buy,
    Watch,
    Avoid,
}

impl SignalAction {
    /// Column value used in the signals table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongBuy => "strong_buy",
            Self::Buy => "buy",
            Self::Watch => "watch",
            Self::Avoid => "avoid",
        }
    }

    /// True for the actions that open positions.
    pub fn is_entry(&self) -> bool {
        matches!(self, Self::StrongBuy | Self::Buy)
    }
}

impl std::fmt::Display for SignalAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// How a position was originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSource {
    Signal,
    CopyTrade,
}

impl PositionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signal => "signal",
            Self::CopyTrade => "copy_trade",
        }
    }
}

impl std::fmt::Display for PositionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the real trader executes swaps or only the paper book runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    PaperOnly,
    Live,
}

impl Default for TradingMode {
    fn default() -> Self {
        Self::PaperOnly
    }
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PaperOnly => write!(f, "PaperOnly"),
            Self::Live => write!(f, "Live"),
        }
    }
}
