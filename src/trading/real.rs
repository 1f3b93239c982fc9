// =============================================================================
// Real trader — live positions executed through the swap executor
// =============================================================================
//
// Mirrors the paper trader's surface (on_signal / update_positions /
// sweep_stale_positions) with real execution on top: risk manager pre-flight,
// circuit breaker around swaps, escalating-slippage sell retries, and P&L
// recomputed from actual SOL in vs SOL out.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::alerts::{AlertEvent, Alerts};
use crate::persistence::rows::{PositionRow, SignalRow, TradeRow};
use crate::persistence::Database;
use crate::trading::close_conditions::{
    check_close_conditions, CloseOptions, CloseReason, PositionView,
};
use crate::trading::paper::{summarize, PortfolioSummary};
use crate::trading::risk::{RiskManager, TradingCircuitBreaker};
use crate::types::{PositionSource, TradeSide};
use crate::providers::{SwapExecutor, WalletBalance, LAMPORTS_PER_SOL};

/// Tunables for the real book.
#[derive(Debug, Clone)]
pub struct RealTraderConfig {
    pub sol_per_trade: f64,
    pub take_profit_x: f64,
    pub stop_loss_pct: f64,
    pub timeout_hours: i64,
}

impl Default for RealTraderConfig {
    fn default() -> Self {
        Self {
            sol_per_trade: 0.05,
            take_profit_x: 2.0,
            stop_loss_pct: -50.0,
            timeout_hours: 8,
        }
    }
}

/// Escalating slippage for sell retries: 5% → 15% → 25%.
const SLIPPAGE_ESCALATION: [u32; 3] = [500, 1500, 2500];
/// Failed sells before the position is force-closed as a total loss.
const MAX_SELL_ATTEMPTS: u32 = 3;

pub struct RealTrader {
    db: Arc<Database>,
    wallet: Arc<dyn WalletBalance>,
    swap: Arc<dyn SwapExecutor>,
    risk: RiskManager,
    circuit: TradingCircuitBreaker,
    alerts: Arc<dyn Alerts>,
    cfg: RealTraderConfig,
    /// Consecutive sell failures per position id, for auto force-close.
    sell_fail_count: Mutex<HashMap<i64, u32>>,
}

impl RealTrader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Arc<Database>,
        wallet: Arc<dyn WalletBalance>,
        swap: Arc<dyn SwapExecutor>,
        risk: RiskManager,
        circuit: TradingCircuitBreaker,
        alerts: Arc<dyn Alerts>,
        cfg: RealTraderConfig,
    ) -> Self {
        Self {
            db,
            wallet,
            swap,
            risk,
            circuit,
            alerts,
            cfg,
            sell_fail_count: Mutex::new(HashMap::new()),
        }
    }

    pub fn circuit_tripped(&self) -> bool {
        self.circuit.is_tripped()
    }

    // -------------------------------------------------------------------------
    // Entry on signal
    // -------------------------------------------------------------------------

    /// Open a real position when a qualifying signal fires.
    pub async fn on_signal(
        &self,
        signal: &SignalRow,
        price: Option<Decimal>,
        symbol: Option<&str>,
        liquidity_usd: Option<f64>,
    ) -> Result<Option<PositionRow>> {
        if signal.status != "strong_buy" && signal.status != "buy" {
            debug!(address = %signal.token_address, status = %signal.status, "real: skipping signal");
            return Ok(None);
        }
        let Some(price) = price.filter(|p| *p > Decimal::ZERO) else {
            warn!(address = %signal.token_address, "real: invalid price, skipping");
            return Ok(None);
        };

        if self.circuit.is_tripped() {
            warn!("real: circuit breaker tripped, skipping trade");
            return Ok(None);
        }

        if self.db.open_position(signal.token_id, 0, "signal")?.is_some() {
            info!(address = %signal.token_address, "real: duplicate position, skipping");
            return Ok(None);
        }

        let size_multiplier = if signal.status == "strong_buy" {
            Decimal::new(15, 1)
        } else {
            Decimal::ONE
        };
        let invest_sol =
            Decimal::from_f64(self.cfg.sol_per_trade).unwrap_or_default() * size_multiplier;

        // Risk pre-flight
        let wallet_balance = self.wallet.get_sol_balance().await?;
        let open_count = self.db.count_open_positions(0, None, false)?;
        let exposure = self.db.total_open_exposure(0)?;
        let (allowed, reason) = self.risk.pre_buy_check(
            wallet_balance,
            open_count,
            exposure,
            invest_sol,
            liquidity_usd,
        );
        if !allowed {
            info!(reason = %reason, "real: risk check blocked");
            return Ok(None);
        }

        // Execute the buy
        let sol_lamports = (invest_sol * Decimal::from(LAMPORTS_PER_SOL))
            .to_u64()
            .unwrap_or(0);
        let result = self.swap.buy_token(&signal.token_address, sol_lamports, None).await;

        if !result.success {
            self.circuit
                .record_failure(result.error.as_deref().unwrap_or("Unknown"));
            warn!(
                address = %signal.token_address,
                error = result.error.as_deref().unwrap_or("?"),
                "real: buy failed"
            );
            if self.circuit.is_tripped() {
                self.alerts.notify(AlertEvent::TradingError {
                    message: format!(
                        "Circuit breaker tripped after {} failures. Cooldown: {:.0}s",
                        self.circuit.total_failures(),
                        self.circuit.seconds_until_reset()
                    ),
                });
            }
            return Ok(None);
        }
        self.circuit.record_success();

        let amount_token = result.output_amount.unwrap_or_default();
        let symbol = symbol
            .map(str::to_string)
            .unwrap_or_else(|| signal.token_address.chars().take(12).collect());

        self.db.insert_trade(&TradeRow {
            signal_id: Some(signal.id),
            token_id: signal.token_id,
            token_address: signal.token_address.clone(),
            side: TradeSide::Buy.to_string(),
            amount_sol: Some(invest_sol),
            amount_token: Some(amount_token),
            price: Some(price),
            slippage_pct: result
                .price_impact_pct
                .and_then(Decimal::from_f64),
            fee_sol: result.fee_sol,
            tx_hash: result.tx_hash.clone(),
            is_paper: 0,
            source: PositionSource::Signal.to_string(),
            status: "filled".into(),
            ..Default::default()
        })?;

        let position = PositionRow {
            signal_id: Some(signal.id),
            token_id: signal.token_id,
            token_address: signal.token_address.clone(),
            symbol: Some(symbol.clone()),
            entry_price: Some(price),
            current_price: Some(price),
            amount_token: Some(amount_token),
            amount_sol_invested: Some(invest_sol),
            max_price: Some(price),
            status: "open".into(),
            is_paper: 0,
            source: PositionSource::Signal.to_string(),
            opened_at: Some(Utc::now()),
            ..Default::default()
        };
        let Some(position_id) = self.db.insert_position(&position)? else {
            debug!(address = %signal.token_address, "real: lost open race, skipping");
            return Ok(None);
        };

        info!(
            address = %signal.token_address,
            status = %signal.status,
            price = %price,
            invest_sol = %invest_sol,
            tx = result.tx_hash.as_deref().unwrap_or(""),
            "real: opened position"
        );
        self.alerts.notify(AlertEvent::PositionOpened {
            symbol,
            address: signal.token_address.clone(),
            price: price.to_f64().unwrap_or(0.0),
            sol_amount: invest_sol.to_f64().unwrap_or(0.0),
            action: signal.status.clone(),
            is_paper: false,
        });

        let mut opened = position;
        opened.id = position_id;
        Ok(Some(opened))
    }

    // -------------------------------------------------------------------------
    // Updates and closes
    // -------------------------------------------------------------------------

    /// Update all open real positions for a token; execute sells for any that
    /// meet a close condition.
    pub async fn update_positions(
        &self,
        token_id: i64,
        current_price: Option<Decimal>,
        is_rug: bool,
        sol_price_usd: Option<f64>,
    ) -> Result<()> {
        let Some(current_price) = current_price.filter(|p| *p > Decimal::ZERO) else {
            return Ok(());
        };

        let positions = self
            .db
            .open_positions_for_token(token_id, Some(0), "signal")?;
        if positions.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let sol_usd = sol_price_usd
            .and_then(Decimal::from_f64)
            .filter(|d| *d > Decimal::ZERO)
            .unwrap_or_else(|| Decimal::from(150));

        for mut pos in positions {
            pos.current_price = Some(current_price);
            if pos.max_price.is_none() || pos.max_price.is_some_and(|m| current_price > m) {
                pos.max_price = Some(current_price);
            }
            if let Some(entry) = pos.entry_price.filter(|e| *e > Decimal::ZERO) {
                let pnl_pct = (current_price - entry) / entry * Decimal::from(100);
                pos.pnl_pct = pnl_pct;
                if let Some(invested) = pos.amount_sol_invested {
                    pos.pnl_usd = invested * pnl_pct / Decimal::from(100) * sol_usd;
                }
            }

            let view = PositionView {
                entry_price: pos.entry_price,
                max_price: pos.max_price,
                opened_at: pos.opened_at,
            };
            let opts = CloseOptions {
                take_profit_x: self.cfg.take_profit_x,
                stop_loss_pct: self.cfg.stop_loss_pct,
                timeout_hours: self.cfg.timeout_hours,
                ..Default::default()
            };
            match check_close_conditions(&view, current_price, is_rug, now, &opts) {
                Some(reason) => {
                    self.execute_close(pos, reason, current_price, sol_usd).await?;
                }
                None => self.db.update_position(&pos)?,
            }
        }
        Ok(())
    }

    /// Execute a sell swap and close the position. Returns true when the
    /// position was closed; on swap failure the position stays open for a
    /// retry with escalated slippage on the next cycle.
    async fn execute_close(
        &self,
        mut pos: PositionRow,
        reason: CloseReason,
        price: Decimal,
        sol_usd: Decimal,
    ) -> Result<bool> {
        let fail_count = *self.sell_fail_count.lock().get(&pos.id).unwrap_or(&0);
        let symbol = pos.symbol.clone().unwrap_or_default();

        // Pool likely dead after repeated failed sells: book a total loss.
        if fail_count >= MAX_SELL_ATTEMPTS {
            warn!(
                symbol = %symbol,
                attempts = fail_count,
                "real: auto force-close after failed sells, pool likely dead"
            );
            pos.status = "closed".into();
            pos.close_reason = Some(format!("{reason}+sell_failed"));
            pos.closed_at = Some(Utc::now());
            pos.current_price = Some(price);
            pos.pnl_pct = Decimal::from(-100);
            pos.pnl_usd = -pos.amount_sol_invested.unwrap_or_default() * sol_usd;
            self.db.update_position(&pos)?;
            self.sell_fail_count.lock().remove(&pos.id);
            self.alerts.notify(AlertEvent::TradingError {
                message: format!(
                    "Auto force-closed {symbol} after {fail_count} failed sells (total loss)"
                ),
            });
            return Ok(true);
        }

        // Urgent closes and retries bypass the tripped breaker.
        if self.circuit.is_tripped() && !reason.is_urgent() && fail_count == 0 {
            warn!(address = %pos.token_address, "real: circuit breaker active, deferring close");
            return Ok(false);
        }

        let (token_balance_raw, _decimals) =
            self.wallet.get_token_balance(&pos.token_address).await?;
        if token_balance_raw == 0 {
            warn!(
                address = %pos.token_address,
                "real: no token balance, closing without sell"
            );
            pos.status = "closed".into();
            pos.close_reason = Some(format!("{reason}+no_balance"));
            pos.closed_at = Some(Utc::now());
            pos.current_price = Some(price);
            pos.pnl_pct = Decimal::from(-100);
            pos.pnl_usd = -pos.amount_sol_invested.unwrap_or_default() * sol_usd;
            self.db.update_position(&pos)?;
            self.sell_fail_count.lock().remove(&pos.id);
            return Ok(true);
        }

        let slippage_idx = (fail_count as usize).min(SLIPPAGE_ESCALATION.len() - 1);
        let slippage_bps = SLIPPAGE_ESCALATION[slippage_idx];
        if fail_count > 0 {
            info!(
                symbol = %symbol,
                attempt = fail_count + 1,
                slippage_bps,
                "real: sell retry with escalated slippage"
            );
        }

        let result = self
            .swap
            .sell_token(&pos.token_address, token_balance_raw, Some(slippage_bps))
            .await;

        if !result.success {
            self.sell_fail_count.lock().insert(pos.id, fail_count + 1);
            self.circuit
                .record_failure(result.error.as_deref().unwrap_or("Sell failed"));
            warn!(
                symbol = %symbol,
                error = result.error.as_deref().unwrap_or("?"),
                attempt = fail_count + 1,
                max = MAX_SELL_ATTEMPTS,
                "real: sell failed"
            );
            if fail_count + 1 >= MAX_SELL_ATTEMPTS {
                self.alerts.notify(AlertEvent::TradingError {
                    message: format!(
                        "Sell failed {}x for {symbol}; will force-close next cycle",
                        fail_count + 1
                    ),
                });
            }
            return Ok(false);
        }

        self.circuit.record_success();
        self.sell_fail_count.lock().remove(&pos.id);

        pos.status = "closed".into();
        pos.close_reason = Some(reason.as_str().to_string());
        pos.closed_at = Some(Utc::now());
        pos.current_price = Some(price);

        // Exit SOL from the actual swap output (lamports).
        let exit_sol = result
            .output_amount
            .map(|out| out / Decimal::from(LAMPORTS_PER_SOL))
            .unwrap_or_default();
        let sell_fee = result.fee_sol.unwrap_or_default();

        self.db.insert_trade(&TradeRow {
            signal_id: pos.signal_id,
            token_id: pos.token_id,
            token_address: pos.token_address.clone(),
            side: TradeSide::Sell.to_string(),
            amount_sol: Some(exit_sol),
            amount_token: Some(Decimal::from(token_balance_raw)),
            price: Some(price),
            slippage_pct: result.price_impact_pct.and_then(Decimal::from_f64),
            fee_sol: Some(sell_fee),
            tx_hash: result.tx_hash.clone(),
            is_paper: 0,
            source: PositionSource::Signal.to_string(),
            status: "filled".into(),
            ..Default::default()
        })?;

        // P&L from actual chain flows: SOL received minus SOL invested.
        let buy_sol = pos.amount_sol_invested.unwrap_or_default();
        let actual_received = exit_sol - sell_fee;
        let actual_pnl_sol = actual_received - buy_sol;
        pos.pnl_pct = if buy_sol > Decimal::ZERO {
            actual_pnl_sol / buy_sol * Decimal::from(100)
        } else {
            Decimal::ZERO
        };
        pos.pnl_usd = actual_pnl_sol * sol_usd;
        self.db.update_position(&pos)?;

        info!(
            symbol = %symbol,
            reason = %reason,
            pnl_pct = %pos.pnl_pct,
            bought_sol = %buy_sol,
            received_sol = %actual_received,
            tx = result.tx_hash.as_deref().unwrap_or(""),
            "real: closed position"
        );
        self.alerts.notify(AlertEvent::PositionClosed {
            symbol,
            address: pos.token_address.clone(),
            entry_price: pos.entry_price.and_then(|p| p.to_f64()).unwrap_or(0.0),
            exit_price: price.to_f64().unwrap_or(0.0),
            pnl_pct: pos.pnl_pct.to_f64().unwrap_or(0.0),
            reason: reason.as_str().into(),
            is_paper: false,
        });
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Stale sweep
    // -------------------------------------------------------------------------

    /// Close real positions past the timeout, executing actual sells.
    pub async fn sweep_stale_positions(&self) -> Result<usize> {
        let cutoff = Utc::now() - Duration::hours(self.cfg.timeout_hours);
        let stale = self.db.stale_open_positions(cutoff, Some(0), Some("signal"))?;
        let total = stale.len();

        let mut closed = 0;
        for pos in stale {
            let exit_price = pos
                .current_price
                .or(pos.entry_price)
                .unwrap_or(Decimal::ZERO);
            if self
                .execute_close(pos, CloseReason::Timeout, exit_price, Decimal::from(150))
                .await?
            {
                closed += 1;
            }
        }

        if total > 0 {
            info!(closed, total, timeout_hours = self.cfg.timeout_hours, "real: swept stale positions");
        }
        Ok(closed)
    }

    pub fn portfolio_summary(&self) -> Result<PortfolioSummary> {
        let open = self.db.positions_with_status("open", 0)?;
        let closed = self.db.positions_with_status("closed", 0)?;
        Ok(summarize(&open, &closed))
    }
}
