// =============================================================================
// Paper trader — simulated positions driven by signals
// =============================================================================
//
// Opens a position when a strong_buy/buy signal fires, updates P&L on every
// enrichment cycle, and closes via the shared close-conditions decider. Also
// owns the micro-snipe flow: a tiny position opened at PRE_SCAN that is
// topped up to full size once a qualifying signal confirms.
// =============================================================================

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::alerts::{AlertEvent, Alerts};
use crate::persistence::rows::{PositionRow, SignalRow, TradeRow};
use crate::persistence::Database;
use crate::trading::close_conditions::{
    check_close_conditions, CloseOptions, CloseReason, PositionView,
};
use crate::types::{PositionSource, TradeSide};

/// Tunables for the paper book.
#[derive(Debug, Clone)]
pub struct PaperTraderConfig {
    pub sol_per_trade: f64,
    pub max_positions: i64,
    pub take_profit_x: f64,
    pub stop_loss_pct: f64,
    pub timeout_hours: i64,
    pub trailing_activation_x: f64,
    pub trailing_drawdown_pct: f64,
    pub liquidity_grace_period_sec: i64,
    pub micro_snipe_sol: f64,
    pub micro_snipe_max_positions: i64,
}

impl Default for PaperTraderConfig {
    fn default() -> Self {
        Self {
            sol_per_trade: 0.5,
            max_positions: 10,
            take_profit_x: 2.0,
            stop_loss_pct: -50.0,
            timeout_hours: 4,
            trailing_activation_x: 1.5,
            trailing_drawdown_pct: 20.0,
            liquidity_grace_period_sec: 90,
            micro_snipe_sol: 0.07,
            micro_snipe_max_positions: 5,
        }
    }
}

/// Aggregate portfolio stats for dashboards.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PortfolioSummary {
    pub open_count: usize,
    pub closed_count: usize,
    pub total_invested_sol: f64,
    pub total_pnl_usd: f64,
    pub win_rate: f64,
    pub wins: usize,
    pub losses: usize,
    pub best_pnl_pct: f64,
    pub worst_pnl_pct: f64,
}

pub struct PaperTrader {
    db: Arc<Database>,
    alerts: Arc<dyn Alerts>,
    cfg: PaperTraderConfig,
}

/// Entry/exit price impact when the order is large relative to the pool.
/// Applied whenever the USD size exceeds 2% of liquidity; capped at 50%.
fn slippage_adjusted_price(
    price: Decimal,
    size_sol: Decimal,
    liquidity_usd: Option<f64>,
    sol_price_usd: Option<f64>,
) -> Decimal {
    let (Some(liq), Some(sol_usd)) = (liquidity_usd, sol_price_usd) else {
        return price;
    };
    if liq <= 0.0 || sol_usd <= 0.0 {
        return price;
    }
    let size_usd = size_sol.to_f64().unwrap_or(0.0) * sol_usd;
    if size_usd <= liq * 0.02 {
        return price;
    }
    let slippage_pct = (size_usd / liq * 100.0).min(50.0);
    price * Decimal::from_f64(1.0 + slippage_pct / 100.0).unwrap_or(Decimal::ONE)
}

fn sol_usd_or_default(sol_price_usd: Option<f64>) -> Decimal {
    sol_price_usd
        .and_then(Decimal::from_f64)
        .filter(|d| *d > Decimal::ZERO)
        .unwrap_or_else(|| Decimal::from(150))
}

/// Synthetic fill id so paper trades stay distinguishable from real ones.
fn sim_fill_id() -> String {
    format!("sim-{}", uuid::Uuid::new_v4())
}

impl PaperTrader {
    pub fn new(db: Arc<Database>, alerts: Arc<dyn Alerts>, cfg: PaperTraderConfig) -> Self {
        Self { db, alerts, cfg }
    }

    fn close_options(
        &self,
        liquidity_usd: Option<f64>,
        is_dead_price: bool,
    ) -> CloseOptions {
        CloseOptions {
            take_profit_x: self.cfg.take_profit_x,
            stop_loss_pct: self.cfg.stop_loss_pct,
            timeout_hours: self.cfg.timeout_hours,
            trailing_activation_x: self.cfg.trailing_activation_x,
            trailing_drawdown_pct: self.cfg.trailing_drawdown_pct,
            liquidity_usd,
            is_dead_price,
            liquidity_grace_period_sec: self.cfg.liquidity_grace_period_sec,
        }
    }

    // -------------------------------------------------------------------------
    // Entry on signal
    // -------------------------------------------------------------------------

    /// Open a paper position when a qualifying signal fires. Returns the new
    /// (or topped-up) position, or `None` when skipped.
    pub fn on_signal(
        &self,
        signal: &SignalRow,
        price: Option<Decimal>,
        symbol: Option<&str>,
        liquidity_usd: Option<f64>,
        sol_price_usd: Option<f64>,
        lp_removed_pct: Option<f64>,
    ) -> Result<Option<PositionRow>> {
        if signal.status != "strong_buy" && signal.status != "buy" {
            debug!(address = %signal.token_address, status = %signal.status, "paper: skipping signal");
            return Ok(None);
        }
        let Some(price) = price.filter(|p| *p > Decimal::ZERO) else {
            warn!(address = %signal.token_address, "paper: invalid price, skipping");
            return Ok(None);
        };

        // LP already partially removed at entry means the scam is in
        // progress; profitable entries had 0% removed.
        if lp_removed_pct.is_some_and(|p| p >= 30.0) {
            warn!(
                address = %signal.token_address,
                lp_removed = lp_removed_pct.unwrap_or(0.0),
                "paper: blocking entry, LP removal in progress"
            );
            return Ok(None);
        }

        let open_count = self.db.count_open_positions(1, None, false)?;
        if open_count >= self.cfg.max_positions {
            warn!(
                open = open_count,
                max = self.cfg.max_positions,
                address = %signal.token_address,
                "paper: max positions reached"
            );
            return Ok(None);
        }

        // Duplicate open position: skip, unless it is a micro entry — then
        // top it up to full size.
        if let Some(existing) = self.db.open_position(signal.token_id, 1, "signal")? {
            if existing.is_micro_entry == 1 {
                return self
                    .topup_micro_position(existing, signal, price, liquidity_usd, sol_price_usd)
                    .map(Some);
            }
            info!(address = %signal.token_address, "paper: duplicate position, skipping");
            return Ok(None);
        }

        // Volume-weighted entry: strong_buy is 1.5x base size.
        let size_multiplier = if signal.status == "strong_buy" {
            Decimal::new(15, 1)
        } else {
            Decimal::ONE
        };
        let invest_sol = Decimal::from_f64(self.cfg.sol_per_trade).unwrap_or_default()
            * size_multiplier;

        let effective_price =
            slippage_adjusted_price(price, invest_sol, liquidity_usd, sol_price_usd);
        let amount_token = if effective_price > Decimal::ZERO {
            invest_sol / effective_price
        } else {
            Decimal::ZERO
        };

        let symbol = symbol
            .map(str::to_string)
            .unwrap_or_else(|| short_addr(&signal.token_address));

        let position = PositionRow {
            signal_id: Some(signal.id),
            token_id: signal.token_id,
            token_address: signal.token_address.clone(),
            symbol: Some(symbol.clone()),
            entry_price: Some(effective_price),
            current_price: Some(price),
            amount_token: Some(amount_token),
            amount_sol_invested: Some(invest_sol),
            max_price: Some(price),
            status: "open".into(),
            is_paper: 1,
            source: PositionSource::Signal.to_string(),
            opened_at: Some(Utc::now()),
            ..Default::default()
        };

        let Some(position_id) = self.db.insert_position(&position)? else {
            debug!(address = %signal.token_address, "paper: lost open race, skipping");
            return Ok(None);
        };

        self.db.insert_trade(&TradeRow {
            signal_id: Some(signal.id),
            token_id: signal.token_id,
            token_address: signal.token_address.clone(),
            side: TradeSide::Buy.to_string(),
            amount_sol: Some(invest_sol),
            amount_token: Some(amount_token),
            price: Some(effective_price),
            is_paper: 1,
            source: PositionSource::Signal.to_string(),
            tx_hash: Some(sim_fill_id()),
            status: "filled".into(),
            ..Default::default()
        })?;

        info!(
            address = %signal.token_address,
            status = %signal.status,
            price = %price,
            invest_sol = %invest_sol,
            "paper: opened position"
        );

        self.alerts.notify(AlertEvent::PositionOpened {
            symbol,
            address: signal.token_address.clone(),
            price: price.to_f64().unwrap_or(0.0),
            sol_amount: invest_sol.to_f64().unwrap_or(0.0),
            action: signal.status.clone(),
            is_paper: true,
        });

        let mut opened = position;
        opened.id = position_id;
        Ok(Some(opened))
    }

    // -------------------------------------------------------------------------
    // Micro-snipe entry at PRE_SCAN
    // -------------------------------------------------------------------------

    /// Open a tiny position before full scoring. Topped up to full size if a
    /// later stage confirms with buy/strong_buy.
    pub fn on_prescan_entry(
        &self,
        token_id: i64,
        token_address: &str,
        symbol: Option<&str>,
        price: Decimal,
        liquidity_usd: Option<f64>,
        sol_price_usd: Option<f64>,
    ) -> Result<Option<PositionRow>> {
        if price <= Decimal::ZERO {
            return Ok(None);
        }

        let micro_count = self.db.count_open_positions(1, None, true)?;
        if micro_count >= self.cfg.micro_snipe_max_positions {
            debug!(
                micro = micro_count,
                max = self.cfg.micro_snipe_max_positions,
                address = token_address,
                "micro: cap reached, skipping"
            );
            return Ok(None);
        }
        let open_count = self.db.count_open_positions(1, None, false)?;
        if open_count >= self.cfg.max_positions {
            debug!(address = token_address, "micro: total cap reached, skipping");
            return Ok(None);
        }
        if self.db.open_position(token_id, 1, "signal")?.is_some() {
            debug!(address = token_address, "micro: position exists, skipping");
            return Ok(None);
        }

        let invest_sol = Decimal::from_f64(self.cfg.micro_snipe_sol).unwrap_or_default();
        let effective_price =
            slippage_adjusted_price(price, invest_sol, liquidity_usd, sol_price_usd);
        let amount_token = if effective_price > Decimal::ZERO {
            invest_sol / effective_price
        } else {
            Decimal::ZERO
        };
        let symbol = symbol
            .map(str::to_string)
            .unwrap_or_else(|| short_addr(token_address));

        let position = PositionRow {
            signal_id: None,
            token_id,
            token_address: token_address.to_string(),
            symbol: Some(symbol.clone()),
            entry_price: Some(effective_price),
            current_price: Some(price),
            amount_token: Some(amount_token),
            amount_sol_invested: Some(invest_sol),
            max_price: Some(price),
            status: "open".into(),
            is_paper: 1,
            is_micro_entry: 1,
            source: PositionSource::Signal.to_string(),
            opened_at: Some(Utc::now()),
            ..Default::default()
        };

        let Some(position_id) = self.db.insert_position(&position)? else {
            debug!(address = token_address, "micro: lost open race, skipping");
            return Ok(None);
        };

        self.db.insert_trade(&TradeRow {
            signal_id: None,
            token_id,
            token_address: token_address.to_string(),
            side: TradeSide::Buy.to_string(),
            amount_sol: Some(invest_sol),
            amount_token: Some(amount_token),
            price: Some(effective_price),
            is_paper: 1,
            source: PositionSource::Signal.to_string(),
            tx_hash: Some(sim_fill_id()),
            status: "filled".into(),
            ..Default::default()
        })?;

        info!(
            address = token_address,
            price = %price,
            invest_sol = %invest_sol,
            "micro: opened micro-snipe position"
        );

        self.alerts.notify(AlertEvent::PositionOpened {
            symbol,
            address: token_address.to_string(),
            price: price.to_f64().unwrap_or(0.0),
            sol_amount: invest_sol.to_f64().unwrap_or(0.0),
            action: "micro_snipe".into(),
            is_paper: true,
        });

        let mut opened = position;
        opened.id = position_id;
        Ok(Some(opened))
    }

    /// Top up a micro-snipe position to full size on a confirming signal.
    /// Updates the existing row in place (single UPDATE) so the partial
    /// unique index is never challenged.
    fn topup_micro_position(
        &self,
        mut position: PositionRow,
        signal: &SignalRow,
        price: Decimal,
        liquidity_usd: Option<f64>,
        sol_price_usd: Option<f64>,
    ) -> Result<PositionRow> {
        let size_multiplier = if signal.status == "strong_buy" {
            Decimal::new(15, 1)
        } else {
            Decimal::ONE
        };
        let full_size = Decimal::from_f64(self.cfg.sol_per_trade).unwrap_or_default()
            * size_multiplier;

        let already_invested = position.amount_sol_invested.unwrap_or_default();
        let additional_sol = full_size - already_invested;
        if additional_sol <= Decimal::ZERO {
            position.is_micro_entry = 0;
            position.signal_id = Some(signal.id);
            self.db.update_position(&position)?;
            info!(address = %signal.token_address, "micro: top-up skipped, already full size");
            return Ok(position);
        }

        let effective_price =
            slippage_adjusted_price(price, additional_sol, liquidity_usd, sol_price_usd);
        let additional_tokens = if effective_price > Decimal::ZERO {
            additional_sol / effective_price
        } else {
            Decimal::ZERO
        };

        // Weighted-average entry across the micro fill and the top-up.
        let old_entry = position.entry_price.unwrap_or(price);
        let new_entry = (already_invested * old_entry + additional_sol * effective_price)
            / (already_invested + additional_sol);

        position.entry_price = Some(new_entry);
        position.amount_sol_invested = Some(already_invested + additional_sol);
        position.amount_token =
            Some(position.amount_token.unwrap_or_default() + additional_tokens);
        position.signal_id = Some(signal.id);
        position.is_micro_entry = 0;
        if new_entry > Decimal::ZERO {
            position.pnl_pct = (price - new_entry) / new_entry * Decimal::from(100);
        }
        self.db.update_position(&position)?;

        self.db.insert_trade(&TradeRow {
            signal_id: Some(signal.id),
            token_id: signal.token_id,
            token_address: signal.token_address.clone(),
            side: TradeSide::Buy.to_string(),
            amount_sol: Some(additional_sol),
            amount_token: Some(additional_tokens),
            price: Some(effective_price),
            is_paper: 1,
            source: PositionSource::Signal.to_string(),
            tx_hash: Some(sim_fill_id()),
            status: "filled".into(),
            ..Default::default()
        })?;

        info!(
            address = %signal.token_address,
            status = %signal.status,
            additional_sol = %additional_sol,
            total_sol = %position.amount_sol_invested.unwrap_or_default(),
            avg_entry = %new_entry,
            "micro: topped up to full size"
        );

        self.alerts.notify(AlertEvent::PositionOpened {
            symbol: position.symbol.clone().unwrap_or_default(),
            address: signal.token_address.clone(),
            price: price.to_f64().unwrap_or(0.0),
            sol_amount: additional_sol.to_f64().unwrap_or(0.0),
            action: "micro_topup".into(),
            is_paper: true,
        });

        Ok(position)
    }

    // -------------------------------------------------------------------------
    // Updates and closes
    // -------------------------------------------------------------------------

    /// Update all open paper positions for a token and close any that meet a
    /// close condition.
    pub fn update_positions(
        &self,
        token_id: i64,
        current_price: Option<Decimal>,
        is_rug: bool,
        liquidity_usd: Option<f64>,
        sol_price_usd: Option<f64>,
        is_dead_price: bool,
    ) -> Result<()> {
        let Some(current_price) = current_price.filter(|p| *p > Decimal::ZERO) else {
            return Ok(());
        };

        let positions = self
            .db
            .open_positions_for_token(token_id, Some(1), "signal")?;
        let now = Utc::now();
        let sol_usd = sol_usd_or_default(sol_price_usd);

        for mut pos in positions {
            // Price sanity: a 1000x jump from entry in minutes is corrupted
            // API data, and memecoins essentially never trade above $1.
            if let Some(entry) = pos.entry_price.filter(|e| *e > Decimal::ZERO) {
                let ratio = (current_price / entry).to_f64().unwrap_or(0.0);
                if ratio > 1000.0 {
                    warn!(
                        token_id,
                        current = %current_price,
                        entry = %entry,
                        "paper: rejecting garbage price (ratio > 1000x)"
                    );
                    continue;
                }
                if current_price > Decimal::ONE {
                    warn!(
                        token_id,
                        current = %current_price,
                        "paper: rejecting suspicious price above $1"
                    );
                    continue;
                }
            }

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
            let opts = self.close_options(liquidity_usd, is_dead_price);
            match check_close_conditions(&view, current_price, is_rug, now, &opts) {
                Some(reason) => {
                    self.close_position(pos, reason, current_price, liquidity_usd, sol_usd)?;
                }
                None => self.db.update_position(&pos)?,
            }
        }
        Ok(())
    }

    fn close_position(
        &self,
        mut pos: PositionRow,
        reason: CloseReason,
        price: Decimal,
        liquidity_usd: Option<f64>,
        sol_usd: Decimal,
    ) -> Result<()> {
        pos.status = "closed".into();
        pos.close_reason = Some(reason.as_str().to_string());
        pos.closed_at = Some(Utc::now());
        pos.current_price = Some(price);

        if reason == CloseReason::LiquidityRemoved {
            // Estimate a realistic illiquid exit rather than marking the
            // last quoted price as achievable.
            let liq = liquidity_usd.unwrap_or(0.0);
            let invested = pos.amount_sol_invested.unwrap_or(Decimal::ONE);
            let (exit_pnl, exit_price, exit_sol) = if price <= Decimal::ZERO || liq == 0.0 {
                (Decimal::from(-100), Decimal::ZERO, Decimal::ZERO)
            } else if liq < 100.0 {
                (Decimal::from(-95), Decimal::ZERO, Decimal::ZERO)
            } else {
                // Quadratic impact: selling 1x of the pool costs ~50%,
                // 2x ~90%, floor at 10% recovery.
                let raw_exit_sol = pos.amount_token.unwrap_or_default() * price;
                let raw_exit_usd =
                    raw_exit_sol.to_f64().unwrap_or(0.0) * sol_usd.to_f64().unwrap_or(150.0);
                let impact = raw_exit_usd / liq.max(1.0);
                let slippage = (impact * impact * 50.0).min(90.0);
                let keep = (1.0 - slippage / 100.0).max(0.10);
                let exit_sol = raw_exit_sol * Decimal::from_f64(keep).unwrap_or(Decimal::ONE);
                let pnl = (exit_sol - invested) / invested * Decimal::from(100);
                (pnl, price, exit_sol)
            };

            pos.pnl_pct = exit_pnl;
            pos.pnl_usd =
                pos.amount_sol_invested.unwrap_or_default() * exit_pnl / Decimal::from(100)
                    * sol_usd;
            self.db.update_position(&pos)?;
            self.db.insert_trade(&TradeRow {
                signal_id: pos.signal_id,
                token_id: pos.token_id,
                token_address: pos.token_address.clone(),
                side: TradeSide::Sell.to_string(),
                amount_sol: Some(exit_sol),
                amount_token: pos.amount_token,
                price: Some(exit_price),
                is_paper: 1,
                source: pos.source.clone(),
                tx_hash: Some(sim_fill_id()),
                status: "filled".into(),
                ..Default::default()
            })?;
            warn!(
                address = %pos.token_address,
                pnl_pct = %exit_pnl,
                liquidity = liq,
                "paper: closed on liquidity removal"
            );
            self.notify_close(&pos, price);
            return Ok(());
        }

        // Exit value at the close price, with a haircut when the exit is
        // large relative to the pool.
        let mut exit_sol = pos.amount_sol_invested.unwrap_or_default();
        if pos.entry_price.is_some_and(|e| e > Decimal::ZERO) && price > Decimal::ZERO {
            exit_sol = pos.amount_token.unwrap_or_default() * price;
        }
        if let Some(liq) = liquidity_usd.filter(|l| *l > 0.0) {
            let exit_usd = exit_sol.to_f64().unwrap_or(0.0) * sol_usd.to_f64().unwrap_or(150.0);
            if exit_usd > liq * 0.02 {
                let slippage_pct = (exit_usd / liq * 100.0).min(50.0);
                let keep = (1.0 - slippage_pct / 100.0).max(0.5);
                exit_sol = exit_sol * Decimal::from_f64(keep).unwrap_or(Decimal::ONE);
                pos.close_reason = Some(format!("{reason}+slippage"));
            }
        }

        self.db.update_position(&pos)?;
        self.db.insert_trade(&TradeRow {
            signal_id: pos.signal_id,
            token_id: pos.token_id,
            token_address: pos.token_address.clone(),
            side: TradeSide::Sell.to_string(),
            amount_sol: Some(exit_sol),
            amount_token: pos.amount_token,
            price: Some(price),
            is_paper: 1,
            source: pos.source.clone(),
            tx_hash: Some(sim_fill_id()),
            status: "filled".into(),
            ..Default::default()
        })?;

        info!(
            address = %pos.token_address,
            reason = %reason,
            pnl_pct = %pos.pnl_pct,
            "paper: closed position"
        );
        self.notify_close(&pos, price);
        Ok(())
    }

    fn notify_close(&self, pos: &PositionRow, price: Decimal) {
        self.alerts.notify(AlertEvent::PositionClosed {
            symbol: pos.symbol.clone().unwrap_or_default(),
            address: pos.token_address.clone(),
            entry_price: pos.entry_price.and_then(|p| p.to_f64()).unwrap_or(0.0),
            exit_price: price.to_f64().unwrap_or(0.0),
            pnl_pct: pos.pnl_pct.to_f64().unwrap_or(0.0),
            reason: pos.close_reason.clone().unwrap_or_default(),
            is_paper: true,
        });
    }

    // -------------------------------------------------------------------------
    // Stale sweep
    // -------------------------------------------------------------------------

    /// Close positions past the timeout regardless of price updates. Returns
    /// the number of positions closed.
    pub fn sweep_stale_positions(&self) -> Result<usize> {
        let cutoff = Utc::now() - Duration::hours(self.cfg.timeout_hours);
        let stale = self.db.stale_open_positions(cutoff, Some(1), Some("signal"))?;
        let count = stale.len();

        for pos in stale {
            let exit_price = pos
                .current_price
                .or(pos.entry_price)
                .unwrap_or(Decimal::ZERO);
            self.close_position(
                pos,
                CloseReason::Timeout,
                exit_price,
                None,
                Decimal::from(150),
            )?;
        }

        if count > 0 {
            info!(count, timeout_hours = self.cfg.timeout_hours, "paper: swept stale positions");
        }
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Summary
    // -------------------------------------------------------------------------

    pub fn portfolio_summary(&self) -> Result<PortfolioSummary> {
        let open = self.db.positions_with_status("open", 1)?;
        let closed = self.db.positions_with_status("closed", 1)?;
        Ok(summarize(&open, &closed))
    }
}

/// Shared summary math for paper and real books.
pub fn summarize(
    open: &[PositionRow],
    closed: &[PositionRow],
) -> PortfolioSummary {
    let total_invested: f64 = open
        .iter()
        .chain(closed)
        .filter_map(|p| p.amount_sol_invested.and_then(|d| d.to_f64()))
        .sum();
    let total_pnl: f64 = open
        .iter()
        .chain(closed)
        .filter_map(|p| p.pnl_usd.to_f64())
        .sum();
    let wins = closed
        .iter()
        .filter(|p| p.pnl_pct > Decimal::ZERO)
        .count();
    let losses = closed.len() - wins;
    let best = closed
        .iter()
        .filter_map(|p| p.pnl_pct.to_f64())
        .fold(f64::NEG_INFINITY, f64::max);
    let worst = closed
        .iter()
        .filter_map(|p| p.pnl_pct.to_f64())
        .fold(f64::INFINITY, f64::min);

    PortfolioSummary {
        open_count: open.len(),
        closed_count: closed.len(),
        total_invested_sol: total_invested,
        total_pnl_usd: total_pnl,
        win_rate: (wins as f64 / (wins + losses).max(1) as f64 * 1000.0).round() / 10.0,
        wins,
        losses,
        best_pnl_pct: if closed.is_empty() { 0.0 } else { best },
        worst_pnl_pct: if closed.is_empty() { 0.0 } else { worst },
    }
}

fn short_addr(address: &str) -> String {
    address.chars().take(12).collect()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::LogAlerts;
    use crate::persistence::rows::TokenRow;
    use rust_decimal_macros::dec;

    fn setup() -> (Arc<Database>, PaperTrader, i64, SignalRow) {
        let db = Arc::new(Database::in_memory().unwrap());
        let token_id = db
            .upsert_token(&TokenRow {
                address: "MintPaper111".into(),
                chain: "sol".into(),
                symbol: Some("PPR".into()),
                ..Default::default()
            })
            .unwrap();
        let signal_id = db
            .record_signal(&SignalRow {
                token_id,
                token_address: "MintPaper111".into(),
                status: "buy".into(),
                score: Some(62),
                net_score: Some(6),
                ..Default::default()
            })
            .unwrap();
        let signal = SignalRow {
            id: signal_id,
            token_id,
            token_address: "MintPaper111".into(),
            status: "buy".into(),
            ..Default::default()
        };
        let trader = PaperTrader::new(db.clone(), Arc::new(LogAlerts), PaperTraderConfig::default());
        (db, trader, token_id, signal)
    }

    #[test]
    fn opens_position_on_buy_signal() {
        let (db, trader, token_id, signal) = setup();
        let pos = trader
            .on_signal(&signal, Some(dec!(0.001)), Some("PPR"), None, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(pos.amount_sol_invested, Some(dec!(0.5)));
        assert_eq!(pos.entry_price, Some(dec!(0.001)));
        assert_eq!(pos.amount_token, Some(dec!(500)));
        assert!(db.open_position(token_id, 1, "signal").unwrap().is_some());
    }

    #[test]
    fn strong_buy_sizes_up() {
        let (_db, trader, _token_id, mut signal) = setup();
        signal.status = "strong_buy".into();
        let pos = trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(pos.amount_sol_invested, Some(dec!(0.75)));
    }

    #[test]
    fn skips_watch_and_invalid_price() {
        let (_db, trader, _token_id, mut signal) = setup();
        signal.status = "watch".into();
        assert!(trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, None)
            .unwrap()
            .is_none());
        signal.status = "buy".into();
        assert!(trader
            .on_signal(&signal, Some(dec!(0)), None, None, None, None)
            .unwrap()
            .is_none());
        assert!(trader
            .on_signal(&signal, None, None, None, None, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn blocks_entry_when_lp_removal_in_progress() {
        let (_db, trader, _token_id, signal) = setup();
        assert!(trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, Some(49.9))
            .unwrap()
            .is_none());
    }

    #[test]
    fn duplicate_position_is_skipped() {
        let (_db, trader, _token_id, signal) = setup();
        assert!(trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, None)
            .unwrap()
            .is_some());
        assert!(trader
            .on_signal(&signal, Some(dec!(0.002)), None, None, None, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn entry_slippage_applied_for_large_order() {
        let (_db, trader, _token_id, signal) = setup();
        // 0.5 SOL at $150 = $75 against a $1000 pool → 7.5% of liquidity.
        let pos = trader
            .on_signal(
                &signal,
                Some(dec!(0.001)),
                None,
                Some(1000.0),
                Some(150.0),
                None,
            )
            .unwrap()
            .unwrap();
        let entry = pos.entry_price.unwrap();
        assert!(entry > dec!(0.001), "entry {entry} should include slippage");
    }

    #[test]
    fn take_profit_close_records_sell() {
        let (db, trader, token_id, signal) = setup();
        trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, None)
            .unwrap()
            .unwrap();
        // 2.5x the entry → take profit.
        trader
            .update_positions(token_id, Some(dec!(0.0025)), false, None, Some(150.0), false)
            .unwrap();
        let closed = db.positions_with_status("closed", 1).unwrap();
        assert_eq!(closed.len(), 1);
        let pos = &closed[0];
        assert_eq!(pos.close_reason.as_deref(), Some("take_profit"));
        assert!(pos.closed_at.is_some());
        assert_eq!(pos.pnl_pct, dec!(150));
    }

    #[test]
    fn max_price_tracks_peak() {
        let (db, trader, token_id, signal) = setup();
        trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, None)
            .unwrap();
        trader
            .update_positions(token_id, Some(dec!(0.0015)), false, None, None, false)
            .unwrap();
        trader
            .update_positions(token_id, Some(dec!(0.0012)), false, None, None, false)
            .unwrap();
        let pos = db.open_position(token_id, 1, "signal").unwrap().unwrap();
        assert_eq!(pos.max_price, Some(dec!(0.0015)));
        assert_eq!(pos.current_price, Some(dec!(0.0012)));
        assert!(pos.max_price.unwrap() >= pos.current_price.unwrap());
    }

    #[test]
    fn garbage_price_rejected() {
        let (db, trader, token_id, signal) = setup();
        trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, None)
            .unwrap();
        // 2000x jump — corrupted data, must not touch the position.
        trader
            .update_positions(token_id, Some(dec!(2)), false, None, None, false)
            .unwrap();
        let pos = db.open_position(token_id, 1, "signal").unwrap().unwrap();
        assert_eq!(pos.current_price, Some(dec!(0.001)));
        assert_eq!(pos.status, "open");
    }

    #[test]
    fn micro_snipe_then_topup_weighted_average() {
        let (db, trader, token_id, signal) = setup();
        let micro = trader
            .on_prescan_entry(token_id, "MintPaper111", Some("PPR"), dec!(0.001), None, None)
            .unwrap()
            .unwrap();
        assert_eq!(micro.is_micro_entry, 1);
        assert!(micro.signal_id.is_none());
        assert_eq!(micro.amount_sol_invested, Some(dec!(0.07)));

        let topped = trader
            .on_signal(&signal, Some(dec!(0.002)), None, None, None, None)
            .unwrap()
            .unwrap();
        assert_eq!(topped.is_micro_entry, 0);
        assert_eq!(topped.signal_id, Some(signal.id));
        assert_eq!(topped.amount_sol_invested, Some(dec!(0.5)));
        // (0.07 * 0.001 + 0.43 * 0.002) / 0.5 = 0.00186
        assert_eq!(topped.entry_price, Some(dec!(0.00186)));

        // Still exactly one open position for the token.
        let open = db
            .open_positions_for_token(token_id, Some(1), "signal")
            .unwrap();
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn micro_cap_respected() {
        let db = Arc::new(Database::in_memory().unwrap());
        let cfg = PaperTraderConfig {
            micro_snipe_max_positions: 2,
            ..Default::default()
        };
        let trader = PaperTrader::new(db.clone(), Arc::new(LogAlerts), cfg);
        for i in 0..3 {
            let addr = format!("MintMicro{i}");
            let tid = db
                .upsert_token(&TokenRow {
                    address: addr.clone(),
                    chain: "sol".into(),
                    ..Default::default()
                })
                .unwrap();
            trader
                .on_prescan_entry(tid, &addr, None, dec!(0.001), None, None)
                .unwrap();
        }
        assert_eq!(db.count_open_positions(1, None, true).unwrap(), 2);
    }

    #[test]
    fn liquidity_removed_close_uses_impact_model() {
        let (db, trader, token_id, signal) = setup();
        trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, None)
            .unwrap();
        // Age the position past the liquidity grace window.
        let mut pos = db.open_position(token_id, 1, "signal").unwrap().unwrap();
        pos.opened_at = Some(Utc::now() - Duration::minutes(10));
        db.update_position(&pos).unwrap();
        // Price crashed 90% with a drained pool ($500) → liquidity_removed.
        trader
            .update_positions(token_id, Some(dec!(0.0001)), false, Some(500.0), Some(150.0), false)
            .unwrap();
        let closed = db.positions_with_status("closed", 1).unwrap();
        assert_eq!(closed.len(), 1);
        let pos = &closed[0];
        assert_eq!(pos.close_reason.as_deref(), Some("liquidity_removed"));
        // Exit value must be well below the raw token value.
        assert!(pos.pnl_pct < dec!(-80));
    }

    #[test]
    fn rug_close_on_update() {
        let (db, trader, token_id, signal) = setup();
        trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, None)
            .unwrap();
        trader
            .update_positions(token_id, Some(dec!(0.0009)), true, None, None, false)
            .unwrap();
        let closed = db.positions_with_status("closed", 1).unwrap();
        assert_eq!(closed[0].close_reason.as_deref(), Some("rug"));
    }

    #[test]
    fn sweep_closes_aged_positions() {
        let (db, trader, token_id, signal) = setup();
        trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, None)
            .unwrap();
        // A fresh position is not stale.
        assert_eq!(trader.sweep_stale_positions().unwrap(), 0);

        // Backdate the open beyond the timeout window.
        let mut pos = db.open_position(token_id, 1, "signal").unwrap().unwrap();
        pos.opened_at = Some(Utc::now() - Duration::hours(5));
        db.update_position(&pos).unwrap();

        assert_eq!(trader.sweep_stale_positions().unwrap(), 1);
        let closed = db.positions_with_status("closed", 1).unwrap();
        assert_eq!(closed[0].close_reason.as_deref(), Some("timeout"));
    }

    #[test]
    fn portfolio_summary_counts() {
        let (_db, trader, token_id, signal) = setup();
        trader
            .on_signal(&signal, Some(dec!(0.001)), None, None, None, None)
            .unwrap();
        trader
            .update_positions(token_id, Some(dec!(0.0025)), false, None, Some(150.0), false)
            .unwrap();
        let summary = trader.portfolio_summary().unwrap();
        assert_eq!(summary.open_count, 0);
        assert_eq!(summary.closed_count, 1);
        assert_eq!(summary.wins, 1);
        assert_eq!(summary.losses, 0);
        assert_eq!(summary.win_rate, 100.0);
    }
}
