// =============================================================================
// Risk Manager & Circuit Breaker — pre-trade checks and failure cooldown
// =============================================================================
//
// RiskManager is a stateless validator consulted before every real buy.
// TradingCircuitBreaker pauses trading after consecutive swap failures and
// auto-resets after a cooldown; the reset is lazy, performed on the next
// `is_tripped` read.
// =============================================================================

use std::time::Instant;

use parking_lot::Mutex;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Circuit breaker
// ---------------------------------------------------------------------------

struct BreakerState {
    consecutive_failures: u32,
    tripped_at: Option<Instant>,
    total_failures: u32,
}

/// Pauses trading after consecutive failures. Auto-resets after cooldown.
pub struct TradingCircuitBreaker {
    threshold: u32,
    cooldown_sec: u64,
    state: Mutex<BreakerState>,
}

impl TradingCircuitBreaker {
    pub fn new(threshold: u32, cooldown_sec: u64) -> Self {
        Self {
            threshold,
            cooldown_sec,
            state: Mutex::new(BreakerState {
                consecutive_failures: 0,
                tripped_at: None,
                total_failures: 0,
            }),
        }
    }

    /// Whether the breaker is currently active. Resets lazily once the
    /// cooldown has elapsed.
    pub fn is_tripped(&self) -> bool {
        let mut state = self.state.lock();
        match state.tripped_at {
            None => false,
            Some(at) => {
                if at.elapsed().as_secs() >= self.cooldown_sec {
                    state.tripped_at = None;
                    state.consecutive_failures = 0;
                    info!("circuit breaker reset after cooldown");
                    false
                } else {
                    true
                }
            }
        }
    }

    /// Seconds remaining until auto-reset. 0 when not tripped.
    pub fn seconds_until_reset(&self) -> f64 {
        let state = self.state.lock();
        match state.tripped_at {
            None => 0.0,
            Some(at) => (self.cooldown_sec as f64 - at.elapsed().as_secs_f64()).max(0.0),
        }
    }

    pub fn total_failures(&self) -> u32 {
        self.state.lock().total_failures
    }

    /// A successful trade resets the consecutive-failure counter.
    pub fn record_success(&self) {
        self.state.lock().consecutive_failures = 0;
    }

    /// Record a failed trade; trips the breaker at the threshold.
    pub fn record_failure(&self, error: &str) {
        let mut state = self.state.lock();
        state.consecutive_failures += 1;
        state.total_failures += 1;
        warn!(
            failures = state.consecutive_failures,
            threshold = self.threshold,
            error,
            "trade failure recorded"
        );
        if state.consecutive_failures >= self.threshold {
            state.tripped_at = Some(Instant::now());
            warn!(
                cooldown_sec = self.cooldown_sec,
                total_failures = state.total_failures,
                "circuit breaker TRIPPED — pausing trades"
            );
        }
    }
}

impl Default for TradingCircuitBreaker {
    fn default() -> Self {
        Self::new(3, 1800)
    }
}

// ---------------------------------------------------------------------------
// Risk manager
// ---------------------------------------------------------------------------

/// Pre-trade risk checks. All checks are synchronous pure logic.
pub struct RiskManager {
    max_sol_per_trade: Decimal,
    max_positions: i64,
    max_exposure_sol: Decimal,
    min_liquidity_usd: f64,
    min_wallet_balance_sol: Decimal,
}

impl RiskManager {
    pub fn new(
        max_sol_per_trade: f64,
        max_positions: i64,
        max_total_exposure_sol: f64,
        min_liquidity_usd: f64,
        min_wallet_balance_sol: f64,
    ) -> Self {
        Self {
            max_sol_per_trade: Decimal::from_f64(max_sol_per_trade).unwrap_or_default(),
            max_positions,
            max_exposure_sol: Decimal::from_f64(max_total_exposure_sol).unwrap_or_default(),
            min_liquidity_usd,
            min_wallet_balance_sol: Decimal::from_f64(min_wallet_balance_sol)
                .unwrap_or_default(),
        }
    }

    /// Check whether a buy is allowed. Returns `(allowed, reason)`; the
    /// reason is empty when allowed.
    pub fn pre_buy_check(
        &self,
        wallet_balance_sol: Decimal,
        open_position_count: i64,
        total_open_exposure_sol: Decimal,
        invest_sol: Decimal,
        liquidity_usd: Option<f64>,
    ) -> (bool, String) {
        // Balance must cover the trade plus a fee reserve.
        if wallet_balance_sol < invest_sol + self.min_wallet_balance_sol {
            return (
                false,
                format!(
                    "Insufficient balance: {wallet_balance_sol} SOL < {invest_sol} + {} reserve",
                    self.min_wallet_balance_sol
                ),
            );
        }

        // Trade size limit. 1.6x allows the strong_buy 1.5x multiplier plus
        // a small buffer.
        let size_cap = self.max_sol_per_trade * Decimal::new(16, 1);
        if invest_sol > size_cap {
            return (
                false,
                format!("Trade size {invest_sol} exceeds max {size_cap}"),
            );
        }

        if open_position_count >= self.max_positions {
            return (
                false,
                format!(
                    "Max positions reached: {open_position_count}/{}",
                    self.max_positions
                ),
            );
        }

        if total_open_exposure_sol + invest_sol > self.max_exposure_sol {
            return (
                false,
                format!(
                    "Total exposure {} exceeds max {}",
                    total_open_exposure_sol + invest_sol,
                    self.max_exposure_sol
                ),
            );
        }

        if let Some(liq) = liquidity_usd {
            if liq < self.min_liquidity_usd {
                return (
                    false,
                    format!("Liquidity ${liq:.0} < min ${:.0}", self.min_liquidity_usd),
                );
            }
        }

        (true, String::new())
    }

    /// Check whether a sell is possible with the held balance.
    pub fn pre_sell_check(
        &self,
        token_balance_raw: u64,
        required_amount_raw: u64,
    ) -> (bool, String) {
        if token_balance_raw < required_amount_raw {
            return (
                false,
                format!(
                    "Insufficient token balance: {token_balance_raw} < {required_amount_raw}"
                ),
            );
        }
        (true, String::new())
    }
}
