// =============================================================================
// Close conditions — shared by paper, real, and copy traders
// =============================================================================
//
// Pure decision function mapping (position, market) to a close reason.
// Precedence: rug → take_profit → trailing_stop → stop_loss → early_stop →
// timeout → liquidity_removed. Deterministic and side-effect-free; all three
// traders delegate here so the books close identically.
// =============================================================================

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Rug,
    TakeProfit,
    TrailingStop,
    StopLoss,
    EarlyStop,
    Timeout,
    LiquidityRemoved,
    MirrorSell,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rug => "rug",
            Self::TakeProfit => "take_profit",
            Self::TrailingStop => "trailing_stop",
            Self::StopLoss => "stop_loss",
            Self::EarlyStop => "early_stop",
            Self::Timeout => "timeout",
            Self::LiquidityRemoved => "liquidity_removed",
            Self::MirrorSell => "mirror_sell",
        }
    }

    /// Urgent reasons bypass the circuit breaker on real closes.
    pub fn is_urgent(&self) -> bool {
        matches!(
            self,
            Self::Rug | Self::StopLoss | Self::EarlyStop | Self::Timeout
        )
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The slice of a position the decider needs.
#[derive(Debug, Clone, Default)]
pub struct PositionView {
    pub entry_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub opened_at: Option<DateTime<Utc>>,
}

/// Tunables for the close decision.
#[derive(Debug, Clone)]
pub struct CloseOptions {
    pub take_profit_x: f64,
    pub stop_loss_pct: f64,
    pub timeout_hours: i64,
    pub trailing_activation_x: f64,
    pub trailing_drawdown_pct: f64,
    /// Current pool liquidity; `None` = unknown, never triggers the
    /// liquidity-removed close.
    pub liquidity_usd: Option<f64>,
    /// Set when the price feed has flatlined; disables the price-coherence
    /// guard so a drained pool still closes.
    pub is_dead_price: bool,
    /// Fresh positions are exempt from the liquidity check while indexers
    /// catch up.
    pub liquidity_grace_period_sec: i64,
}

impl Default for CloseOptions {
    fn default() -> Self {
        Self {
            take_profit_x: 2.0,
            stop_loss_pct: -50.0,
            timeout_hours: 8,
            trailing_activation_x: 1.5,
            trailing_drawdown_pct: 20.0,
            liquidity_usd: None,
            is_dead_price: false,
            liquidity_grace_period_sec: 90,
        }
    }
}

fn dec(v: f64) -> Decimal {
    Decimal::from_f64(v).unwrap_or_default()
}

/// Check whether a position should be closed. Returns the reason or `None`.
pub fn check_close_conditions(
    pos: &PositionView,
    current_price: Decimal,
    is_rug: bool,
    now: DateTime<Utc>,
    opts: &CloseOptions,
) -> Option<CloseReason> {
    if is_rug {
        return Some(CloseReason::Rug);
    }

    let hundred = Decimal::from(100);
    let entry = pos.entry_price.filter(|e| *e > Decimal::ZERO);

    if let Some(entry) = entry {
        let multiplier = current_price / entry;
        let pnl_pct = (current_price - entry) / entry * hundred;

        // Hard take profit (capture gains before the dump)
        if multiplier >= dec(opts.take_profit_x) {
            return Some(CloseReason::TakeProfit);
        }

        // Trailing stop: once max reached the activation multiple, close on
        // drawdown from max. If actual PnL already breached the stop loss,
        // report stop_loss for accurate reason tracking.
        if let Some(max) = pos.max_price.filter(|m| *m > Decimal::ZERO) {
            let max_mult = max / entry;
            if max_mult >= dec(opts.trailing_activation_x) {
                let drawdown = (max - current_price) / max * hundred;
                if drawdown >= dec(opts.trailing_drawdown_pct) {
                    if pnl_pct <= dec(opts.stop_loss_pct) {
                        return Some(CloseReason::StopLoss);
                    }
                    return Some(CloseReason::TrailingStop);
                }
            }
        }

    }

    // Liquidity removed — requires both depleted liquidity AND a crashed
    // price. The coherence guard keeps stale liquidity feeds from closing
    // healthy positions; bonding-curve listings often report near-zero
    // liquidity while the token trades fine. Checked ahead of the plain
    // stop loss so a drained pool is recorded as liquidity_removed, not as
    // an ordinary price stop.
    if let Some(liq) = opts.liquidity_usd {
        if liq < 5_000.0 {
            let price_healthy = !opts.is_dead_price
                && entry.is_some_and(|e| current_price >= e / Decimal::from(2));
            let past_grace = match pos.opened_at {
                Some(opened) => {
                    now - opened > Duration::seconds(opts.liquidity_grace_period_sec)
                }
                None => true,
            };
            if !price_healthy && past_grace {
                return Some(CloseReason::LiquidityRemoved);
            }
        }
    }

    if let Some(entry) = entry {
        let pnl_pct = (current_price - entry) / entry * hundred;

        // Hard stop loss
        if pnl_pct <= dec(opts.stop_loss_pct) {
            return Some(CloseReason::StopLoss);
        }

        // Early stop: cut losses faster in the first 30 minutes
        if let Some(opened) = pos.opened_at {
            let age = now - opened;
            if age <= Duration::minutes(30) && pnl_pct <= Decimal::from(-20) {
                return Some(CloseReason::EarlyStop);
            }
        }
    }

    // Timeout
    if let Some(opened) = pos.opened_at {
        if now - opened >= Duration::hours(opts.timeout_hours) {
            return Some(CloseReason::Timeout);
        }
    }

    None
}
