// =============================================================================
// Copy trader — mirror trades from tracked wallets in real time
// =============================================================================
//
// An external detector reports one event per transaction signature involving
// a tracked wallet. Each event is deduplicated, parsed through the
// deeper-commitment parse endpoint (with retries), classified as BUY or SELL
// from the native + token transfer flows, and mirrored into copy-trade
// positions. Position updates and closes reuse the shared decider.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use anyhow::Result;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::alerts::{AlertEvent, Alerts};
use crate::persistence::rows::{PositionRow, TokenRow, TradeRow, TrackedWalletRow};
use crate::persistence::Database;
use crate::providers::types::ParsedWalletTx;
use crate::providers::WalletTxParser;
use crate::trading::close_conditions::{
    check_close_conditions, CloseOptions, CloseReason, PositionView,
};
use crate::types::{PositionSource, TradeSide};
use crate::wallets::WalletRegistry;

/// Wrapped SOL mint — excluded from the token-transfer legs.
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// A parsed swap performed by a tracked wallet.
#[derive(Debug, Clone)]
pub struct CopySwap {
    pub wallet_address: String,
    pub wallet_label: String,
    pub signature: String,
    pub side: String,
    pub token_mint: String,
    pub sol_amount: Decimal,
    pub token_amount: Decimal,
    pub source_dex: String,
}

/// Signature dedup with a short TTL; Redis-backed when available, in-memory
/// otherwise.
pub struct SignatureDedup {
    redis: Option<redis::Client>,
    seen: Mutex<HashMap<String, Instant>>,
    ttl: StdDuration,
}

impl SignatureDedup {
    pub fn new(redis: Option<redis::Client>, ttl_sec: u64) -> Self {
        Self {
            redis,
            seen: Mutex::new(HashMap::new()),
            ttl: StdDuration::from_secs(ttl_sec),
        }
    }

    /// Returns true when the signature is new; marks it seen either way.
    pub async fn check_and_mark(&self, signature: &str) -> bool {
        if let Some(client) = &self.redis {
            if let Ok(mut con) = client.get_async_connection().await {
                let set: redis::RedisResult<Option<String>> = redis::cmd("SET")
                    .arg(format!("copy:seen:{signature}"))
                    .arg("1")
                    .arg("NX")
                    .arg("EX")
                    .arg(self.ttl.as_secs())
                    .query_async(&mut con)
                    .await;
                if let Ok(reply) = set {
                    return reply.is_some();
                }
                // fall through to the in-memory map on Redis failure
            }
        }
        let mut seen = self.seen.lock();
        let now = Instant::now();
        seen.retain(|_, at| now.duration_since(*at) < self.ttl);
        match seen.get(signature) {
            Some(_) => false,
            None => {
                seen.insert(signature.to_string(), now);
                true
            }
        }
    }
}

/// Tunables for copy trading.
#[derive(Debug, Clone)]
pub struct CopyTraderConfig {
    pub take_profit_x: f64,
    pub stop_loss_pct: f64,
    pub timeout_hours: i64,
    pub trailing_activation_x: f64,
    pub trailing_drawdown_pct: f64,
    pub max_positions: i64,
    pub default_sol_per_trade: f64,
    pub min_sol_amount: f64,
    pub dedup_ttl_sec: u64,
    /// Delays before each parse attempt; shrunk to zero in tests.
    pub parse_retry_delays_sec: Vec<f64>,
}

impl Default for CopyTraderConfig {
    fn default() -> Self {
        Self {
            take_profit_x: 1.5,
            stop_loss_pct: -50.0,
            timeout_hours: 8,
            trailing_activation_x: 1.3,
            trailing_drawdown_pct: 15.0,
            max_positions: 20,
            default_sol_per_trade: 0.05,
            min_sol_amount: 0.01,
            dedup_ttl_sec: 300,
            parse_retry_delays_sec: vec![2.0, 5.0, 10.0],
        }
    }
}

/// Stats counters surfaced on the admin API.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct CopyStats {
    pub events_received: u64,
    pub swaps_parsed: u64,
    pub buys_opened: u64,
    pub sells_mirrored: u64,
    pub skipped_dedup: u64,
    pub skipped_non_swap: u64,
    pub errors: u64,
}

pub struct CopyTrader {
    db: Arc<Database>,
    parser: Arc<dyn WalletTxParser>,
    registry: Arc<WalletRegistry>,
    alerts: Arc<dyn Alerts>,
    dedup: SignatureDedup,
    cfg: CopyTraderConfig,
    stats: Mutex<CopyStats>,
}

impl CopyTrader {
    pub fn new(
        db: Arc<Database>,
        parser: Arc<dyn WalletTxParser>,
        registry: Arc<WalletRegistry>,
        alerts: Arc<dyn Alerts>,
        redis: Option<redis::Client>,
        cfg: CopyTraderConfig,
    ) -> Self {
        let dedup = SignatureDedup::new(redis, cfg.dedup_ttl_sec);
        Self {
            db,
            parser,
            registry,
            alerts,
            dedup,
            cfg,
            stats: Mutex::new(CopyStats::default()),
        }
    }

    pub fn stats(&self) -> CopyStats {
        self.stats.lock().clone()
    }

    fn close_options(&self, liquidity_usd: Option<f64>, is_dead_price: bool) -> CloseOptions {
        CloseOptions {
            take_profit_x: self.cfg.take_profit_x,
            stop_loss_pct: self.cfg.stop_loss_pct,
            timeout_hours: self.cfg.timeout_hours,
            trailing_activation_x: self.cfg.trailing_activation_x,
            trailing_drawdown_pct: self.cfg.trailing_drawdown_pct,
            liquidity_usd,
            is_dead_price,
            ..Default::default()
        }
    }

    // -------------------------------------------------------------------------
    // Event entry point
    // -------------------------------------------------------------------------

    /// Handle one observed transaction from a tracked wallet.
    pub async fn on_wallet_event(&self, wallet_address: &str, signature: &str) -> Result<()> {
        self.stats.lock().events_received += 1;
        let sig_short: String = signature.chars().take(16).collect();

        if !self.dedup.check_and_mark(signature).await {
            self.stats.lock().skipped_dedup += 1;
            debug!(sig = %sig_short, "copy: dedup skip");
            return Ok(());
        }

        let Some(config) = self.registry.get(wallet_address) else {
            debug!(wallet = wallet_address, "copy: wallet not tracked");
            return Ok(());
        };
        if !config.enabled {
            info!(wallet = wallet_address, "copy: wallet disabled");
            return Ok(());
        }

        // The detector fires at a shallow commitment; the parse endpoint
        // needs a deeper one, so retry with increasing delays.
        let mut tx: Option<ParsedWalletTx> = None;
        for (attempt, delay) in self.cfg.parse_retry_delays_sec.iter().enumerate() {
            if *delay > 0.0 {
                tokio::time::sleep(StdDuration::from_secs_f64(*delay)).await;
            }
            match self.parser.get_parsed_transaction(signature).await {
                Ok(Some(parsed)) => {
                    if attempt > 0 {
                        info!(sig = %sig_short, attempt = attempt + 1, "copy: parse resolved on retry");
                    }
                    tx = Some(parsed);
                    break;
                }
                Ok(None) => {
                    debug!(sig = %sig_short, attempt = attempt + 1, "copy: parse empty");
                }
                Err(e) => {
                    warn!(sig = %sig_short, attempt = attempt + 1, error = %e, "copy: parse error");
                }
            }
        }
        let Some(tx) = tx else {
            self.stats.lock().errors += 1;
            warn!(sig = %sig_short, "copy: parse empty after all attempts");
            return Ok(());
        };

        // Validate: must be a SWAP, no error, fee payer equal to the wallet.
        if tx.tx_type != "SWAP" {
            self.stats.lock().skipped_non_swap += 1;
            info!(sig = %sig_short, tx_type = %tx.tx_type, "copy: not a swap");
            return Ok(());
        }
        if tx.transaction_error {
            info!(sig = %sig_short, "copy: transaction errored");
            return Ok(());
        }
        if tx.fee_payer.as_deref() != Some(wallet_address) {
            info!(sig = %sig_short, "copy: fee payer mismatch");
            return Ok(());
        }

        let Some(swap) = self.parse_swap(wallet_address, &config, &tx) else {
            info!(sig = %sig_short, "copy: no SOL flow or below min size");
            return Ok(());
        };
        self.stats.lock().swaps_parsed += 1;

        let settings = self.registry.settings();
        if swap.side == "buy" {
            if settings.paper_mode {
                self.handle_buy(&swap, &config, true).await?;
            }
            if settings.real_mode {
                self.handle_buy(&swap, &config, false).await?;
            }
        } else if swap.side == "sell" && settings.sell_mirror {
            self.handle_sell(&swap)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Swap parsing
    // -------------------------------------------------------------------------

    /// Derive side and amounts from native-SOL and SPL transfers.
    /// BUY: wallet sends SOL beyond the fee and receives a non-SOL token.
    /// SELL: wallet sends tokens and net-receives SOL.
    fn parse_swap(
        &self,
        wallet_address: &str,
        config: &TrackedWalletRow,
        tx: &ParsedWalletTx,
    ) -> Option<CopySwap> {
        let sol_out: u64 = tx
            .native_transfers
            .iter()
            .filter(|t| t.from_user_account == wallet_address)
            .map(|t| t.amount)
            .sum();
        let sol_in: u64 = tx
            .native_transfers
            .iter()
            .filter(|t| t.to_user_account == wallet_address)
            .map(|t| t.amount)
            .sum();

        let tokens_received: Vec<_> = tx
            .token_transfers
            .iter()
            .filter(|t| {
                t.to_user_account == wallet_address && t.mint != SOL_MINT && !t.mint.is_empty()
            })
            .collect();
        let tokens_sent: Vec<_> = tx
            .token_transfers
            .iter()
            .filter(|t| {
                t.from_user_account == wallet_address && t.mint != SOL_MINT && !t.mint.is_empty()
            })
            .collect();

        let label = if config.label.is_empty() {
            wallet_address.chars().take(12).collect()
        } else {
            config.label.clone()
        };

        // BUY: SOL out beyond the fee and a token received.
        if sol_out > tx.fee {
            if let Some(token) = tokens_received.first() {
                let lamports = sol_out - tx.fee;
                let sol_amount =
                    Decimal::from(lamports) / Decimal::from(1_000_000_000u64);
                if sol_amount
                    < Decimal::from_f64(self.cfg.min_sol_amount).unwrap_or_default()
                {
                    return None;
                }
                return Some(CopySwap {
                    wallet_address: wallet_address.to_string(),
                    wallet_label: label,
                    signature: tx.signature.clone(),
                    side: TradeSide::Buy.to_string(),
                    token_mint: token.mint.clone(),
                    sol_amount,
                    token_amount: token.token_amount,
                    source_dex: tx.source.clone().unwrap_or_else(|| "UNKNOWN".into()),
                });
            }
        }

        // SELL: tokens sent and net SOL received.
        let net_sol_in = sol_in.saturating_sub(sol_out);
        if net_sol_in > 0 {
            if let Some(token) = tokens_sent.first() {
                let sol_amount =
                    Decimal::from(net_sol_in) / Decimal::from(1_000_000_000u64);
                return Some(CopySwap {
                    wallet_address: wallet_address.to_string(),
                    wallet_label: label,
                    signature: tx.signature.clone(),
                    side: TradeSide::Sell.to_string(),
                    token_mint: token.mint.clone(),
                    sol_amount,
                    token_amount: token.token_amount,
                    source_dex: tx.source.clone().unwrap_or_else(|| "UNKNOWN".into()),
                });
            }
        }

        None
    }

    // -------------------------------------------------------------------------
    // Buy handler
    // -------------------------------------------------------------------------

    async fn handle_buy(
        &self,
        swap: &CopySwap,
        config: &TrackedWalletRow,
        is_paper: bool,
    ) -> Result<Option<PositionRow>> {
        let is_paper_int = i64::from(is_paper);
        let mode = if is_paper { "PAPER" } else { "REAL" };

        let open_count = self.db.count_open_positions(is_paper_int, Some("copy_trade"), false)?;
        if open_count >= self.cfg.max_positions {
            debug!(
                open = open_count,
                max = self.cfg.max_positions,
                mint = %swap.token_mint,
                "copy: max positions reached"
            );
            return Ok(None);
        }

        let token = self.get_or_create_token(&swap.token_mint)?;

        if self
            .db
            .open_position(token.id, is_paper_int, "copy_trade")?
            .is_some()
        {
            debug!(mode, mint = %swap.token_mint, "copy: duplicate position, skipping");
            return Ok(None);
        }

        // Mirror sizing: observed amount scaled by the wallet multiplier,
        // clamped into [min_sol, wallet max].
        let multiplier = Decimal::from_f64(config.multiplier).unwrap_or(Decimal::ONE);
        let max_sol = Decimal::from_f64(config.max_sol_per_trade)
            .filter(|d| *d > Decimal::ZERO)
            .unwrap_or_else(|| {
                Decimal::from_f64(self.cfg.default_sol_per_trade).unwrap_or_default()
            });
        let min_sol = Decimal::from_f64(self.cfg.min_sol_amount).unwrap_or_default();
        let invest_sol = (swap.sol_amount * multiplier).min(max_sol).max(min_sol);

        let price = if swap.token_amount > Decimal::ZERO {
            swap.sol_amount / swap.token_amount
        } else {
            Decimal::ZERO
        };
        if price <= Decimal::ZERO {
            warn!(mint = %swap.token_mint, "copy: zero price, skipping");
            return Ok(None);
        }
        let amount_token = invest_sol / price;

        // Real-mode execution is pending explicit support; real rows carry
        // the observed signature as their tx hash.
        let tx_hash = (!is_paper).then(|| swap.signature.clone());

        let symbol = token
            .symbol
            .clone()
            .unwrap_or_else(|| swap.token_mint.chars().take(12).collect());

        let position = PositionRow {
            signal_id: None,
            token_id: token.id,
            token_address: swap.token_mint.clone(),
            symbol: Some(symbol.clone()),
            entry_price: Some(price),
            current_price: Some(price),
            amount_token: Some(amount_token),
            amount_sol_invested: Some(invest_sol),
            max_price: Some(price),
            status: "open".into(),
            is_paper: is_paper_int,
            source: PositionSource::CopyTrade.to_string(),
            copied_from_wallet: Some(swap.wallet_address.clone()),
            opened_at: Some(Utc::now()),
            ..Default::default()
        };
        let Some(position_id) = self.db.insert_position(&position)? else {
            debug!(mode, mint = %swap.token_mint, "copy: lost open race");
            return Ok(None);
        };

        self.db.insert_trade(&TradeRow {
            signal_id: None,
            token_id: token.id,
            token_address: swap.token_mint.clone(),
            side: TradeSide::Buy.to_string(),
            amount_sol: Some(invest_sol),
            amount_token: Some(amount_token),
            price: Some(price),
            tx_hash,
            is_paper: is_paper_int,
            source: PositionSource::CopyTrade.to_string(),
            copied_from_wallet: Some(swap.wallet_address.clone()),
            status: "filled".into(),
            ..Default::default()
        })?;

        self.stats.lock().buys_opened += 1;
        info!(
            mode,
            symbol = %symbol,
            wallet = %swap.wallet_label,
            invest_sol = %invest_sol,
            price = %price,
            dex = %swap.source_dex,
            "copy: mirrored buy"
        );
        self.alerts.notify(AlertEvent::PositionOpened {
            symbol,
            address: swap.token_mint.clone(),
            price: price.to_f64().unwrap_or(0.0),
            sol_amount: invest_sol.to_f64().unwrap_or(0.0),
            action: format!("copy_buy:{}", swap.wallet_label),
            is_paper,
        });

        let mut opened = position;
        opened.id = position_id;
        Ok(Some(opened))
    }

    // -------------------------------------------------------------------------
    // Sell handler (mirror close)
    // -------------------------------------------------------------------------

    fn handle_sell(&self, swap: &CopySwap) -> Result<()> {
        let positions = self
            .db
            .open_copy_positions(&swap.token_mint, &swap.wallet_address)?;
        for pos in positions {
            let exit_price = pos
                .current_price
                .or(pos.entry_price)
                .unwrap_or(Decimal::ZERO);
            self.close_position(pos, CloseReason::MirrorSell, exit_price, None, Decimal::from(150))?;
            self.stats.lock().sells_mirrored += 1;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Updates, closes, sweep
    // -------------------------------------------------------------------------

    /// Update all open copy-trade positions for a token.
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
            .open_positions_for_token(token_id, None, "copy_trade")?;
        if positions.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let sol_usd = sol_price_usd
            .and_then(Decimal::from_f64)
            .filter(|d| *d > Decimal::ZERO)
            .unwrap_or_else(|| Decimal::from(150));

        for mut pos in positions {
            // Same price sanity guards as the signal-driven books.
            if let Some(entry) = pos.entry_price.filter(|e| *e > Decimal::ZERO) {
                let ratio = (current_price / entry).to_f64().unwrap_or(0.0);
                if ratio > 1000.0 || current_price > Decimal::ONE {
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
            let liq = liquidity_usd.unwrap_or(0.0);
            let invested = pos.amount_sol_invested.unwrap_or(Decimal::ONE);
            pos.pnl_pct = if price <= Decimal::ZERO || liq == 0.0 {
                Decimal::from(-100)
            } else if liq < 100.0 {
                Decimal::from(-95)
            } else {
                let raw_exit_sol = pos.amount_token.unwrap_or_default() * price;
                let raw_exit_usd =
                    raw_exit_sol.to_f64().unwrap_or(0.0) * sol_usd.to_f64().unwrap_or(150.0);
                let impact = raw_exit_usd / liq.max(1.0);
                let slippage = (impact * impact * 50.0).min(90.0);
                let keep = (1.0 - slippage / 100.0).max(0.10);
                let exit_sol = raw_exit_sol * Decimal::from_f64(keep).unwrap_or(Decimal::ONE);
                (exit_sol - invested) / invested * Decimal::from(100)
            };
            pos.pnl_usd = pos.amount_sol_invested.unwrap_or_default() * pos.pnl_pct
                / Decimal::from(100)
                * sol_usd;
        }

        self.db.update_position(&pos)?;
        self.db.insert_trade(&TradeRow {
            signal_id: None,
            token_id: pos.token_id,
            token_address: pos.token_address.clone(),
            side: TradeSide::Sell.to_string(),
            amount_sol: pos.amount_sol_invested,
            amount_token: pos.amount_token,
            price: Some(price),
            is_paper: pos.is_paper,
            source: PositionSource::CopyTrade.to_string(),
            copied_from_wallet: pos.copied_from_wallet.clone(),
            status: "filled".into(),
            ..Default::default()
        })?;

        let mode = if pos.is_paper == 1 { "PAPER" } else { "REAL" };
        info!(
            mode,
            symbol = pos.symbol.as_deref().unwrap_or(""),
            reason = %reason,
            pnl_pct = %pos.pnl_pct,
            "copy: closed position"
        );
        self.alerts.notify(AlertEvent::PositionClosed {
            symbol: pos.symbol.clone().unwrap_or_default(),
            address: pos.token_address.clone(),
            entry_price: pos.entry_price.and_then(|p| p.to_f64()).unwrap_or(0.0),
            exit_price: price.to_f64().unwrap_or(0.0),
            pnl_pct: pos.pnl_pct.to_f64().unwrap_or(0.0),
            reason: reason.as_str().into(),
            is_paper: pos.is_paper == 1,
        });
        Ok(())
    }

    /// Close copy-trade positions past the timeout. Returns the count.
    pub fn sweep_stale_positions(&self) -> Result<usize> {
        let cutoff = Utc::now() - Duration::hours(self.cfg.timeout_hours);
        let stale = self
            .db
            .stale_open_positions(cutoff, None, Some("copy_trade"))?;
        let count = stale.len();
        for pos in stale {
            let exit_price = pos
                .current_price
                .or(pos.entry_price)
                .unwrap_or(Decimal::ZERO);
            self.close_position(pos, CloseReason::Timeout, exit_price, None, Decimal::from(150))?;
        }
        if count > 0 {
            info!(count, "copy: swept stale positions");
        }
        Ok(count)
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    /// Get the token row or create a minimal record for the FK.
    fn get_or_create_token(&self, mint: &str) -> Result<TokenRow> {
        if let Some(token) = self.db.token_by_address(mint)? {
            return Ok(token);
        }
        let id = self.db.upsert_token(&TokenRow {
            address: mint.to_string(),
            chain: "sol".into(),
            source: Some("copy_trade".into()),
            ..Default::default()
        })?;
        Ok(self
            .db
            .token_by_id(id)?
            .unwrap_or_else(|| TokenRow {
                id,
                address: mint.to_string(),
                chain: "sol".into(),
                ..Default::default()
            }))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::LogAlerts;
    use crate::providers::types::{NativeTransfer, SplTransfer};
    use crate::wallets::CopySettings;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    const WALLET: &str = "TrackedWallet11111";
    const MINT: &str = "CopyMint111111";

    struct FakeParser {
        txs: Mutex<HashMap<String, ParsedWalletTx>>,
        empty_first: Mutex<u32>,
    }

    #[async_trait]
    impl WalletTxParser for FakeParser {
        async fn get_parsed_transaction(&self, signature: &str) -> Result<Option<ParsedWalletTx>> {
            let mut empty = self.empty_first.lock();
            if *empty > 0 {
                *empty -= 1;
                return Ok(None);
            }
            Ok(self.txs.lock().get(signature).cloned())
        }
    }

    fn buy_tx(signature: &str, sol: u64, tokens: Decimal) -> ParsedWalletTx {
        ParsedWalletTx {
            signature: signature.into(),
            tx_type: "SWAP".into(),
            source: Some("JUPITER".into()),
            fee_payer: Some(WALLET.into()),
            fee: 5_000,
            transaction_error: false,
            timestamp: 1_700_000_000,
            native_transfers: vec![NativeTransfer {
                from_user_account: WALLET.into(),
                to_user_account: "Pool".into(),
                amount: sol,
            }],
            token_transfers: vec![SplTransfer {
                from_user_account: "Pool".into(),
                to_user_account: WALLET.into(),
                mint: MINT.into(),
                token_amount: tokens,
            }],
        }
    }

    fn sell_tx(signature: &str, sol_received: u64, tokens: Decimal) -> ParsedWalletTx {
        ParsedWalletTx {
            signature: signature.into(),
            tx_type: "SWAP".into(),
            source: Some("RAYDIUM".into()),
            fee_payer: Some(WALLET.into()),
            fee: 5_000,
            transaction_error: false,
            timestamp: 1_700_000_100,
            native_transfers: vec![NativeTransfer {
                from_user_account: "Pool".into(),
                to_user_account: WALLET.into(),
                amount: sol_received,
            }],
            token_transfers: vec![SplTransfer {
                from_user_account: WALLET.into(),
                to_user_account: "Pool".into(),
                mint: MINT.into(),
                token_amount: tokens,
            }],
        }
    }

    struct Fixture {
        db: Arc<Database>,
        parser: Arc<FakeParser>,
        trader: CopyTrader,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::in_memory().unwrap());
        let registry = Arc::new(WalletRegistry::new(
            vec![TrackedWalletRow {
                address: WALLET.into(),
                label: "whale-a".into(),
                enabled: true,
                multiplier: 1.0,
                max_sol_per_trade: 0.1,
            }],
            CopySettings::default(),
        ));
        let parser = Arc::new(FakeParser {
            txs: Mutex::new(HashMap::new()),
            empty_first: Mutex::new(0),
        });
        let cfg = CopyTraderConfig {
            parse_retry_delays_sec: vec![0.0, 0.0, 0.0],
            ..Default::default()
        };
        let trader = CopyTrader::new(
            db.clone(),
            parser.clone(),
            registry,
            Arc::new(LogAlerts),
            None,
            cfg,
        );
        Fixture { db, parser, trader }
    }

    #[tokio::test]
    async fn mirrors_buy_into_paper_position() {
        let f = fixture();
        // 0.055 SOL spent (after fee 0.05) on 1000 tokens.
        f.parser
            .txs
            .lock()
            .insert("Sig1".into(), buy_tx("Sig1", 50_005_000, dec!(1000)));
        f.trader.on_wallet_event(WALLET, "Sig1").await.unwrap();

        let token = f.db.token_by_address(MINT).unwrap().unwrap();
        let pos = f.db.open_position(token.id, 1, "copy_trade").unwrap().unwrap();
        assert_eq!(pos.copied_from_wallet.as_deref(), Some(WALLET));
        // observed 0.05 SOL * 1.0 multiplier, clamped to wallet max 0.1
        assert_eq!(pos.amount_sol_invested, Some(dec!(0.05)));
        // price = 0.05 / 1000
        assert_eq!(pos.entry_price, Some(dec!(0.00005)));

        let stats = f.trader.stats();
        assert_eq!(stats.events_received, 1);
        assert_eq!(stats.swaps_parsed, 1);
        assert_eq!(stats.buys_opened, 1);
    }

    #[tokio::test]
    async fn dedup_skips_repeated_signature() {
        let f = fixture();
        f.parser
            .txs
            .lock()
            .insert("Sig2".into(), buy_tx("Sig2", 50_005_000, dec!(1000)));
        f.trader.on_wallet_event(WALLET, "Sig2").await.unwrap();
        f.trader.on_wallet_event(WALLET, "Sig2").await.unwrap();
        let stats = f.trader.stats();
        assert_eq!(stats.events_received, 2);
        assert_eq!(stats.skipped_dedup, 1);
        assert_eq!(stats.buys_opened, 1);
    }

    #[tokio::test]
    async fn disabled_wallet_is_skipped() {
        let f = fixture();
        let registry = WalletRegistry::new(
            vec![TrackedWalletRow {
                address: WALLET.into(),
                label: "off".into(),
                enabled: false,
                multiplier: 1.0,
                max_sol_per_trade: 0.1,
            }],
            CopySettings::default(),
        );
        let trader = CopyTrader::new(
            f.db.clone(),
            f.parser.clone(),
            Arc::new(registry),
            Arc::new(LogAlerts),
            None,
            CopyTraderConfig {
                parse_retry_delays_sec: vec![0.0],
                ..Default::default()
            },
        );
        f.parser
            .txs
            .lock()
            .insert("Sig3".into(), buy_tx("Sig3", 50_005_000, dec!(1000)));
        trader.on_wallet_event(WALLET, "Sig3").await.unwrap();
        assert_eq!(trader.stats().buys_opened, 0);
    }

    #[tokio::test]
    async fn non_swap_and_fee_payer_mismatch_skipped() {
        let f = fixture();
        let mut transfer = buy_tx("Sig4", 50_005_000, dec!(1000));
        transfer.tx_type = "TRANSFER".into();
        f.parser.txs.lock().insert("Sig4".into(), transfer);
        f.trader.on_wallet_event(WALLET, "Sig4").await.unwrap();
        assert_eq!(f.trader.stats().skipped_non_swap, 1);

        let mut mismatch = buy_tx("Sig5", 50_005_000, dec!(1000));
        mismatch.fee_payer = Some("SomeoneElse".into());
        f.parser.txs.lock().insert("Sig5".into(), mismatch);
        f.trader.on_wallet_event(WALLET, "Sig5").await.unwrap();
        assert_eq!(f.trader.stats().buys_opened, 0);
    }

    #[tokio::test]
    async fn parse_retry_resolves_on_second_attempt() {
        let f = fixture();
        *f.parser.empty_first.lock() = 1;
        f.parser
            .txs
            .lock()
            .insert("Sig6".into(), buy_tx("Sig6", 50_005_000, dec!(1000)));
        f.trader.on_wallet_event(WALLET, "Sig6").await.unwrap();
        assert_eq!(f.trader.stats().buys_opened, 1);
    }

    #[tokio::test]
    async fn parse_empty_after_retries_counts_error() {
        let f = fixture();
        *f.parser.empty_first.lock() = 10;
        f.trader.on_wallet_event(WALLET, "SigMissing").await.unwrap();
        assert_eq!(f.trader.stats().errors, 1);
    }

    #[tokio::test]
    async fn small_buy_below_min_sol_skipped() {
        let f = fixture();
        // 0.005 SOL after fee — below the 0.01 minimum.
        f.parser
            .txs
            .lock()
            .insert("Sig7".into(), buy_tx("Sig7", 5_005_000, dec!(100)));
        f.trader.on_wallet_event(WALLET, "Sig7").await.unwrap();
        assert_eq!(f.trader.stats().swaps_parsed, 0);
        assert_eq!(f.trader.stats().buys_opened, 0);
    }

    #[tokio::test]
    async fn wallet_multiplier_and_cap_applied() {
        let f = fixture();
        let registry = WalletRegistry::new(
            vec![TrackedWalletRow {
                address: WALLET.into(),
                label: "half".into(),
                enabled: true,
                multiplier: 0.5,
                max_sol_per_trade: 0.02,
            }],
            CopySettings::default(),
        );
        let trader = CopyTrader::new(
            f.db.clone(),
            f.parser.clone(),
            Arc::new(registry),
            Arc::new(LogAlerts),
            None,
            CopyTraderConfig {
                parse_retry_delays_sec: vec![0.0],
                ..Default::default()
            },
        );
        // Whale spends 1 SOL; 0.5x = 0.5 SOL, capped at wallet max 0.02.
        f.parser
            .txs
            .lock()
            .insert("Sig8".into(), buy_tx("Sig8", 1_000_005_000, dec!(10000)));
        trader.on_wallet_event(WALLET, "Sig8").await.unwrap();
        let token = f.db.token_by_address(MINT).unwrap().unwrap();
        let pos = f.db.open_position(token.id, 1, "copy_trade").unwrap().unwrap();
        assert_eq!(pos.amount_sol_invested, Some(dec!(0.02)));
    }

    #[tokio::test]
    async fn mirror_sell_closes_copy_positions() {
        let f = fixture();
        f.parser
            .txs
            .lock()
            .insert("Sig9".into(), buy_tx("Sig9", 50_005_000, dec!(1000)));
        f.trader.on_wallet_event(WALLET, "Sig9").await.unwrap();

        f.parser
            .txs
            .lock()
            .insert("Sig10".into(), sell_tx("Sig10", 80_000_000, dec!(1000)));
        f.trader.on_wallet_event(WALLET, "Sig10").await.unwrap();

        let closed = f.db.positions_with_status("closed", 1).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].close_reason.as_deref(), Some("mirror_sell"));
        assert_eq!(f.trader.stats().sells_mirrored, 1);
    }

    #[tokio::test]
    async fn update_positions_applies_close_conditions() {
        let f = fixture();
        f.parser
            .txs
            .lock()
            .insert("Sig11".into(), buy_tx("Sig11", 50_005_000, dec!(1000)));
        f.trader.on_wallet_event(WALLET, "Sig11").await.unwrap();
        let token = f.db.token_by_address(MINT).unwrap().unwrap();

        // 1.6x entry (take profit at 1.5x for the copy book).
        f.trader
            .update_positions(token.id, Some(dec!(0.00008)), false, None, Some(150.0), false)
            .unwrap();
        let closed = f.db.positions_with_status("closed", 1).unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].close_reason.as_deref(), Some("take_profit"));
    }
}
