// =============================================================================
// Enrichment worker — drives tokens through the stage schedule
// =============================================================================
//
// A pool of these runs concurrently, each popping tasks from the persistent
// queue. PRE_SCAN does the instant on-chain checks; every other stage fans
// out the stage's provider fetches, persists a snapshot, recomputes scores
// and signals, feeds the traders, and enqueues the next stage.
//
// Each task is a failure isolation boundary: one token's errors never halt
// the pool.
// =============================================================================

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures_util::join;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::enrichment::queue::{queue_now, PersistentEnrichmentQueue};
use crate::enrichment::stage::EnrichmentStage;
use crate::enrichment::task::{EnrichmentTask, PRIORITY_NORMAL};
use crate::persistence::rows::{
    OutcomeRow, SecurityRow, SignalRow, SnapshotRow, TokenRow, TopHolderDbRow,
};
use crate::persistence::Database;
use crate::providers::mint::MintRpc;
use crate::providers::jupiter::SellSimulator;
use crate::providers::types::{SecurityData, TokenInfoData};
use crate::providers::TokenDataProvider;
use crate::scoring::{
    compute_score_v2, compute_score_v3, CreatorView, SecurityView, SignalContext, SnapshotView,
};
use crate::signals::copycat::CopycatLedger;
use crate::signals::evaluate_signals;
use crate::trading::{CopyTrader, PaperTrader, RealTrader};

/// Everything a worker needs, injected at construction.
pub struct WorkerDeps {
    pub db: Arc<Database>,
    pub queue: Arc<PersistentEnrichmentQueue>,
    pub mint_rpc: Arc<dyn MintRpc>,
    pub sell_sim: Option<Arc<dyn SellSimulator>>,
    pub data: Arc<dyn TokenDataProvider>,
    pub paper: Arc<PaperTrader>,
    pub real: Option<Arc<RealTrader>>,
    pub copy: Option<Arc<CopyTrader>>,
    pub copycat: Arc<CopycatLedger>,
}

pub struct EnrichmentWorker {
    deps: WorkerDeps,
    shutdown: Arc<AtomicBool>,
}

impl EnrichmentWorker {
    pub fn new(deps: WorkerDeps, shutdown: Arc<AtomicBool>) -> Self {
        Self { deps, shutdown }
    }

    /// Worker loop: pop, process, repeat until shutdown. The current task is
    /// always drained before exiting.
    pub async fn run(&self, worker_id: usize) {
        info!(worker_id, "enrichment worker started");
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            let task = match tokio::time::timeout(
                std::time::Duration::from_secs(2),
                self.deps.queue.get(),
            )
            .await
            {
                Ok(task) => task,
                Err(_) => continue,
            };

            let address = task.address.clone();
            let stage = task.stage;
            if let Err(e) = self.process_task(task).await {
                warn!(worker_id, address = %address, stage = %stage, error = %e, "task failed");
            }
        }
        info!(worker_id, "enrichment worker drained");
    }

    /// Process one task: branch on stage.
    pub async fn process_task(&self, task: EnrichmentTask) -> Result<()> {
        if task.stage == EnrichmentStage::PreScan {
            self.run_prescan(task).await
        } else {
            self.run_stage(task).await
        }
    }

    // -------------------------------------------------------------------------
    // PRE_SCAN
    // -------------------------------------------------------------------------

    /// Instant checks at +5s: parse the mint account, hard-reject obvious
    /// scams, simulate a sell, accumulate a soft risk boost, open a
    /// micro-snipe, and hand everything to INITIAL.
    async fn run_prescan(&self, task: EnrichmentTask) -> Result<()> {
        let address = &task.address;
        let mint_info = self.deps.mint_rpc.parse_mint(address).await;

        // Infrastructure failures must not reject the token: a parse error
        // passes it through with no boost.
        if mint_info.parse_error.is_none() {
            if mint_info.mint_authority_active() && mint_info.freeze_authority_active() {
                info!(address = %address, "prescan: rejected, mint + freeze authority both active");
                return Ok(());
            }
            if mint_info.has_dangerous_extensions() {
                info!(
                    address = %address,
                    extensions = ?mint_info.dangerous_extensions,
                    "prescan: rejected, dangerous Token2022 extensions"
                );
                return Ok(());
            }
        }

        let risk_boost = if mint_info.parse_error.is_none() {
            i32::from(mint_info.risk_score())
        } else {
            0
        };

        // Sell simulation. "No route" only rejects when the mint authority
        // is also active — aggregator outages must not cause false rejects.
        let mut sell_sim = None;
        if let Some(simulator) = &self.deps.sell_sim {
            let decimals = if mint_info.decimals > 0 {
                mint_info.decimals
            } else {
                6
            };
            let result = simulator.simulate_sell(address, 1000, decimals).await;
            if !result.sellable
                && result.error.is_some()
                && !result.api_error
                && mint_info.mint_authority_active()
            {
                info!(address = %address, "prescan: rejected, unsellable with active mint authority");
                return Ok(());
            }
            sell_sim = Some(result);
        }

        // Micro-snipe entry before full scoring, when a price is available.
        let token_id = self.ensure_token(address)?;
        if let Some(info) = self.deps.data.token_info(address).await {
            if let Some(price) = info.price.filter(|p| *p > Decimal::ZERO) {
                let sol_usd = self.deps.data.sol_price_usd().await;
                let liquidity = info.liquidity_usd.and_then(|d| d.to_f64());
                if let Err(e) = self.deps.paper.on_prescan_entry(
                    token_id,
                    address,
                    None,
                    price,
                    liquidity,
                    sol_usd,
                ) {
                    warn!(address = %address, error = %e, "prescan: micro-snipe entry failed");
                }
            }
        }

        // Carry everything forward to INITIAL.
        let mut next = EnrichmentTask::new(
            address.clone(),
            EnrichmentStage::Initial,
            task.discovery_time + EnrichmentStage::Initial.offset_sec() as f64,
        );
        next.priority = PRIORITY_NORMAL;
        next.discovery_time = task.discovery_time;
        next.prescan_risk_boost = risk_boost;
        next.prescan_mint_info = Some(mint_info);
        next.prescan_sell_sim = sell_sim;
        self.deps.queue.put(next, true).await;

        debug!(address = %address, risk_boost, "prescan: passed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Normal stages
    // -------------------------------------------------------------------------

    async fn run_stage(&self, task: EnrichmentTask) -> Result<()> {
        let address = &task.address;
        let cfg = task.stage.config();
        let token = self.token_or_minimal(address)?;

        // Fan out the stage's fetch plan concurrently. Trade counts ride on
        // the info payload, so fetch_trades implies an info fetch.
        let data = &self.deps.data;
        let (info, security_data, holders, dex, smart_money, volatility, metadata, sol_usd) = join!(
            async {
                if cfg.fetch_info || cfg.fetch_trades {
                    data.token_info(address).await
                } else {
                    None
                }
            },
            async {
                if cfg.fetch_security {
                    data.security_info(address).await
                } else {
                    None
                }
            },
            async {
                if cfg.fetch_top_holders {
                    data.top_holders(address).await
                } else {
                    Vec::new()
                }
            },
            async {
                if cfg.fetch_dex {
                    data.dex_pair(address).await
                } else {
                    None
                }
            },
            async {
                if cfg.check_smart_money {
                    data.smart_money_count(address).await
                } else {
                    None
                }
            },
            async {
                if cfg.fetch_ohlcv {
                    data.volatility_5m(address).await
                } else {
                    None
                }
            },
            async {
                if cfg.fetch_metadata {
                    data.metadata(address).await
                } else {
                    None
                }
            },
            data.sol_price_usd(),
        );

        let prev_row = self.deps.db.latest_snapshot(token.id).unwrap_or(None);
        let now = Utc::now();

        // Token age and holder dynamics.
        let token_age_minutes = (task.discovery_time > 0.0)
            .then(|| ((queue_now() - task.discovery_time) / 60.0).max(0.0));
        let holders_now = info.as_ref().and_then(|i| i.holders_count);
        let (holder_velocity, holder_growth_pct) =
            holder_dynamics(holders_now, prev_row.as_ref(), now, token_age_minutes);

        // Assemble the snapshot row (scores filled in below).
        let mut snapshot = build_snapshot(token.id, &task, &info, &dex, smart_money, volatility);
        snapshot.holder_growth_pct = holder_growth_pct;
        snapshot.timestamp = Some(now);

        // Merge security: this stage's fetch wins, stored record fills gaps.
        let stored_security = self.deps.db.security(token.id).unwrap_or(None);
        let security_row = security_data
            .as_ref()
            .map(|fresh| security_to_row(token.id, fresh));
        let effective_security = security_row.clone().or(stored_security);

        // Creator profile and copycat history.
        let creator = match token.creator_address.as_deref() {
            Some(creator_address) => {
                self.deps.db.creator_profile(creator_address).unwrap_or(None)
            }
            None => None,
        };
        let symbol = token.symbol.clone().unwrap_or_default();
        let copycat_rug_count = if symbol.is_empty() {
            0
        } else {
            self.deps.copycat.rug_count(&symbol).await
        };

        // One context per step, shared by both scorers and the evaluator.
        let ctx = SignalContext {
            holder_velocity,
            holder_growth_pct,
            lp_removed_pct: info.as_ref().and_then(|i| i.lp_removed_pct),
            dev_holds_pct: effective_security
                .as_ref()
                .and_then(|s| s.dev_holds_pct)
                .and_then(|d| d.to_f64()),
            volatility_5m: volatility,
            token_age_minutes,
            rugcheck_score: effective_security.as_ref().and_then(|s| s.rugcheck_score),
            mint_info: task.prescan_mint_info.clone(),
            sell_sim: task.prescan_sell_sim.clone(),
            mint_risk_boost: task.prescan_risk_boost,
            bundled_buy_detected: effective_security
                .as_ref()
                .and_then(|s| s.bundled_buy_detected)
                .unwrap_or(false),
            raydium_lp_burned: effective_security
                .as_ref()
                .and_then(|s| s.lp_burned_pct_raydium)
                .and_then(|p| p.to_f64())
                .map(|p| p >= 90.0),
            pumpfun_dead_tokens: creator.as_ref().and_then(|c| c.pumpfun_dead_tokens),
            funding_chain_risk: creator.as_ref().and_then(|c| c.funding_risk_score),
            metadata_score: metadata.as_ref().and_then(|m| m.metadata_score),
            metaplex_mutable: metadata.as_ref().and_then(|m| m.mutable),
            metaplex_has_homoglyphs: metadata.as_ref().is_some_and(|m| m.has_homoglyphs),
            has_website: metadata.as_ref().map(|m| m.website.is_some()),
            copycat_rugged: copycat_rug_count > 0,
            copycat_rug_count,
            ..Default::default()
        };

        // Pure views for the scorers.
        let mut view = snapshot_view(&snapshot);
        let security_view = effective_security.as_ref().map(row_to_security_view);
        let creator_view = creator.as_ref().map(|c| CreatorView {
            risk_score: c.risk_score,
            rugged_count: c.rugged_count,
            total_launches: c.total_launches,
        });

        let score_v2 = compute_score_v2(&view, security_view.as_ref(), creator_view.as_ref(), &ctx);
        let score_v3 = compute_score_v3(&view, security_view.as_ref(), creator_view.as_ref(), &ctx);
        snapshot.score = Some(score_v2 as i64);
        snapshot.score_v3 = Some(score_v3 as i64);
        view.score = Some(score_v2 as i64);

        // Persist. A failed write rolls back that record only; scoring,
        // traders, and the next-stage enqueue continue from memory.
        let snapshot_id = match self.deps.db.insert_snapshot(&snapshot) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(address = %address, error = %e, "stage: snapshot persist failed");
                None
            }
        };
        if let Some(snapshot_id) = snapshot_id {
            if !holders.is_empty() {
                let rows: Vec<TopHolderDbRow> = holders
                    .iter()
                    .map(|h| TopHolderDbRow {
                        snapshot_id,
                        token_id: token.id,
                        rank: h.rank,
                        address: h.address.clone(),
                        balance: h.balance,
                        percentage: h.percentage,
                        pnl: h.pnl,
                    })
                    .collect();
                if let Err(e) = self.deps.db.insert_top_holders(&rows) {
                    warn!(address = %address, error = %e, "stage: top holders persist failed");
                }
            }
        }
        if let Some(row) = &security_row {
            if let Err(e) = self.deps.db.upsert_security(row) {
                warn!(address = %address, error = %e, "stage: security persist failed");
            }
        }

        // Outcome tracking (peaks are monotonic; HOUR_24 finalises).
        let outcome = self.update_outcome(&token, &snapshot, &task).await;

        // Signal evaluation against the previous snapshot.
        let prev_view = prev_row.as_ref().map(row_view);
        let result = evaluate_signals(
            &view,
            security_view.as_ref(),
            creator_view.as_ref(),
            prev_view.as_ref(),
            &ctx,
        );
        debug!(
            address = %address,
            stage = %task.stage,
            score_v2,
            score_v3,
            net = result.net_score,
            action = %result.action,
            "stage: evaluated"
        );

        let mut signal_row = SignalRow {
            token_id: token.id,
            token_address: address.clone(),
            status: result.action.as_str().to_string(),
            score: Some(score_v2 as i64),
            net_score: Some(result.net_score as i64),
            rules_fired: serde_json::to_string(&result.rule_names()).ok(),
            price: snapshot.price,
            market_cap: snapshot.market_cap,
            liquidity_usd: snapshot.liquidity_usd,
            ..Default::default()
        };
        if result.action != crate::types::SignalAction::Avoid {
            match self.deps.db.record_signal(&signal_row) {
                Ok(id) => signal_row.id = id,
                Err(e) => warn!(address = %address, error = %e, "stage: signal persist failed"),
            }
        }

        // Feed the traders.
        let price = snapshot.price;
        let liquidity = view.best_liquidity();
        let is_rug = ctx.lp_removed_pct.is_some_and(|p| p >= 50.0)
            || outcome.as_ref().and_then(|o| o.is_rug) == Some(true);

        if result.action.is_entry() {
            if let Err(e) = self.deps.paper.on_signal(
                &signal_row,
                price,
                token.symbol.as_deref(),
                liquidity,
                sol_usd,
                ctx.lp_removed_pct,
            ) {
                warn!(address = %address, error = %e, "stage: paper on_signal failed");
            }
            if let Some(real) = &self.deps.real {
                if let Err(e) = real
                    .on_signal(&signal_row, price, token.symbol.as_deref(), liquidity)
                    .await
                {
                    warn!(address = %address, error = %e, "stage: real on_signal failed");
                }
            }
        }

        if let Err(e) =
            self.deps
                .paper
                .update_positions(token.id, price, is_rug, liquidity, sol_usd, false)
        {
            warn!(address = %address, error = %e, "stage: paper update failed");
        }
        if let Some(real) = &self.deps.real {
            if let Err(e) = real.update_positions(token.id, price, is_rug, sol_usd).await {
                warn!(address = %address, error = %e, "stage: real update failed");
            }
        }
        if let Some(copy) = &self.deps.copy {
            if let Err(e) =
                copy.update_positions(token.id, price, is_rug, liquidity, sol_usd, false)
            {
                warn!(address = %address, error = %e, "stage: copy update failed");
            }
        }

        // Mirror outcome data onto the token's signals.
        if let Some(outcome) = &outcome {
            let peak_roi = outcome
                .peak_multiplier
                .map(|m| (m - Decimal::ONE) * Decimal::from(100));
            if let Err(e) = self.deps.db.update_signal_outcomes(
                token.id,
                outcome.peak_multiplier,
                peak_roi,
                outcome.is_rug,
            ) {
                warn!(address = %address, error = %e, "stage: signal outcome update failed");
            }
        }

        // Prune: abandon further stages when the score fell below the
        // stage's threshold. The record stays.
        if let Some(threshold) = cfg.prune_below_score {
            if (score_v2 as i64) < threshold {
                info!(
                    address = %address,
                    stage = %task.stage,
                    score = score_v2,
                    threshold,
                    "stage: pruned, abandoning further enrichment"
                );
                return Ok(());
            }
        }

        // Enqueue the next stage.
        if let Some(next_stage) = task.stage.next() {
            let mut next = EnrichmentTask::new(
                address.clone(),
                next_stage,
                task.discovery_time + next_stage.offset_sec() as f64,
            );
            next.priority = PRIORITY_NORMAL;
            next.discovery_time = task.discovery_time;
            next.last_score = Some(score_v2 as i64);
            next.prescan_risk_boost = task.prescan_risk_boost;
            next.prescan_mint_info = task.prescan_mint_info.clone();
            next.prescan_sell_sim = task.prescan_sell_sim.clone();
            self.deps.queue.put(next, true).await;
        }

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Outcome tracking
    // -------------------------------------------------------------------------

    /// Raise peak fields monotonically; at HOUR_24 set final mcap/multiplier
    /// and the rug flag (final at least 90% below peak). A newly confirmed
    /// rug also lands in the copycat ledger.
    async fn update_outcome(
        &self,
        token: &TokenRow,
        snapshot: &SnapshotRow,
        task: &EnrichmentTask,
    ) -> Option<OutcomeRow> {
        let mcap = snapshot.market_cap?;
        let existing = self.deps.db.outcome(token.id).unwrap_or(None);
        let was_rug = existing.as_ref().and_then(|o| o.is_rug) == Some(true);

        let initial = existing
            .as_ref()
            .and_then(|o| o.initial_mcap)
            .unwrap_or(mcap);
        let prev_peak = existing.as_ref().and_then(|o| o.peak_mcap);
        let peak_advanced = prev_peak.map_or(true, |p| mcap > p);
        let peak_mcap = prev_peak.map_or(mcap, |p| p.max(mcap));
        let peak_multiplier = (initial > Decimal::ZERO).then(|| peak_mcap / initial);
        let peak_price = match (existing.as_ref().and_then(|o| o.peak_price), snapshot.price) {
            (Some(prev), Some(cur)) => Some(prev.max(cur)),
            (prev, cur) => cur.or(prev),
        };
        let time_to_peak_sec = if peak_advanced && task.discovery_time > 0.0 {
            Some((queue_now() - task.discovery_time).max(0.0) as i64)
        } else {
            existing.as_ref().and_then(|o| o.time_to_peak_sec)
        };

        let mut outcome = OutcomeRow {
            token_id: token.id,
            initial_mcap: Some(initial),
            peak_mcap: Some(peak_mcap),
            peak_price,
            peak_multiplier,
            time_to_peak_sec,
            outcome_stage: Some(task.stage.as_str().to_string()),
            final_mcap: existing.as_ref().and_then(|o| o.final_mcap),
            final_multiplier: existing.as_ref().and_then(|o| o.final_multiplier),
            is_rug: existing.as_ref().and_then(|o| o.is_rug),
        };

        if task.stage == EnrichmentStage::Hour24 {
            outcome.final_mcap = Some(mcap);
            let final_multiplier =
                (initial > Decimal::ZERO).then(|| mcap / initial);
            outcome.final_multiplier = final_multiplier;
            // Rug iff the final multiplier sits at least 90% below the peak.
            if let (Some(final_mult), Some(peak_mult)) = (final_multiplier, peak_multiplier) {
                outcome.is_rug = Some(final_mult <= peak_mult * Decimal::new(1, 1));
            }
        }

        if let Err(e) = self.deps.db.upsert_outcome(&outcome) {
            warn!(address = %token.address, error = %e, "outcome persist failed");
        }

        // First confirmation of a rug feeds the copycat symbol history.
        if !was_rug && outcome.is_rug == Some(true) {
            if let Some(symbol) = token.symbol.as_deref().filter(|s| !s.is_empty()) {
                self.deps.copycat.record_rug(symbol).await;
            }
        }

        Some(outcome)
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn ensure_token(&self, address: &str) -> Result<i64> {
        if let Some(token) = self.deps.db.token_by_address(address)? {
            return Ok(token.id);
        }
        self.deps.db.upsert_token(&TokenRow {
            address: address.to_string(),
            chain: "sol".into(),
            source: Some("enrichment".into()),
            ..Default::default()
        })
    }

    fn token_or_minimal(&self, address: &str) -> Result<TokenRow> {
        let id = self.ensure_token(address)?;
        Ok(self
            .deps
            .db
            .token_by_id(id)?
            .unwrap_or_else(|| TokenRow {
                id,
                address: address.to_string(),
                chain: "sol".into(),
                ..Default::default()
            }))
    }
}

// ---------------------------------------------------------------------------
// Pure assembly helpers
// ---------------------------------------------------------------------------

fn build_snapshot(
    token_id: i64,
    task: &EnrichmentTask,
    info: &Option<TokenInfoData>,
    dex: &Option<crate::providers::types::DexPairData>,
    smart_money: Option<i64>,
    volatility: Option<f64>,
) -> SnapshotRow {
    SnapshotRow {
        token_id,
        stage: task.stage.as_str().to_string(),
        price: info.as_ref().and_then(|i| i.price).or_else(|| dex.as_ref().and_then(|d| d.price)),
        market_cap: info
            .as_ref()
            .and_then(|i| i.market_cap)
            .or_else(|| dex.as_ref().and_then(|d| d.fdv)),
        liquidity_usd: info.as_ref().and_then(|i| i.liquidity_usd),
        volume_5m: info.as_ref().and_then(|i| i.volume_5m),
        volume_1h: info.as_ref().and_then(|i| i.volume_1h),
        volume_24h: info.as_ref().and_then(|i| i.volume_24h),
        holders_count: info.as_ref().and_then(|i| i.holders_count),
        top10_holders_pct: info.as_ref().and_then(|i| i.top10_holders_pct),
        smart_wallets_count: smart_money,
        buys_5m: info.as_ref().and_then(|i| i.buys_5m),
        sells_5m: info.as_ref().and_then(|i| i.sells_5m),
        buys_1h: info.as_ref().and_then(|i| i.buys_1h),
        sells_1h: info.as_ref().and_then(|i| i.sells_1h),
        buys_24h: info.as_ref().and_then(|i| i.buys_24h),
        sells_24h: info.as_ref().and_then(|i| i.sells_24h),
        volatility_5m: volatility,
        lp_removed_pct: info.as_ref().and_then(|i| i.lp_removed_pct),
        dex_price: dex.as_ref().and_then(|d| d.price),
        dex_liquidity_usd: dex.as_ref().and_then(|d| d.liquidity_usd),
        dex_volume_5m: dex.as_ref().and_then(|d| d.volume_5m),
        dex_volume_1h: dex.as_ref().and_then(|d| d.volume_1h),
        dex_volume_24h: dex.as_ref().and_then(|d| d.volume_24h),
        ..Default::default()
    }
}

fn snapshot_view(row: &SnapshotRow) -> SnapshotView {
    SnapshotView {
        price: row.price,
        market_cap: row.market_cap,
        liquidity_usd: row.liquidity_usd,
        volume_5m: row.volume_5m,
        volume_1h: row.volume_1h,
        volume_24h: row.volume_24h,
        holders_count: row.holders_count,
        top10_holders_pct: row.top10_holders_pct,
        smart_wallets_count: row.smart_wallets_count,
        buys_5m: row.buys_5m,
        sells_5m: row.sells_5m,
        buys_1h: row.buys_1h,
        sells_1h: row.sells_1h,
        buys_24h: row.buys_24h,
        sells_24h: row.sells_24h,
        dex_price: row.dex_price,
        dex_liquidity_usd: row.dex_liquidity_usd,
        dex_volume_5m: row.dex_volume_5m,
        dex_volume_1h: row.dex_volume_1h,
        dex_volume_24h: row.dex_volume_24h,
        score: row.score,
    }
}

fn row_view(row: &SnapshotRow) -> SnapshotView {
    snapshot_view(row)
}

fn security_to_row(token_id: i64, data: &SecurityData) -> SecurityRow {
    SecurityRow {
        token_id,
        is_mintable: data.is_mintable,
        lp_burned: data.lp_burned,
        lp_locked: data.lp_locked,
        lp_lock_duration_days: data.lp_lock_duration_days,
        contract_renounced: data.contract_renounced,
        is_honeypot: data.is_honeypot,
        buy_tax: data.buy_tax,
        sell_tax: data.sell_tax,
        top10_holders_pct: data.top10_holders_pct,
        dev_holds_pct: data.dev_holds_pct,
        dev_token_balance: data.dev_token_balance,
        rugcheck_score: data.rugcheck_score,
        rugcheck_score_max: data.rugcheck_score,
        rugcheck_risks: data.rugcheck_risks.clone(),
        bundled_buy_detected: data.bundled_buy_detected,
        lp_burned_pct_raydium: data.lp_burned_pct_raydium,
    }
}

fn row_to_security_view(row: &SecurityRow) -> SecurityView {
    SecurityView {
        is_mintable: row.is_mintable,
        lp_burned: row.lp_burned,
        lp_locked: row.lp_locked,
        lp_lock_duration_days: row.lp_lock_duration_days,
        contract_renounced: row.contract_renounced,
        is_honeypot: row.is_honeypot,
        buy_tax: row.buy_tax,
        sell_tax: row.sell_tax,
        top10_holders_pct: row.top10_holders_pct,
        rugcheck_score: row.rugcheck_score,
        rugcheck_risks: row.rugcheck_risks.clone(),
    }
}

/// Holder velocity (holders/min) and growth percent since the previous
/// snapshot. With no prior observation, velocity falls back to holders over
/// token age.
fn holder_dynamics(
    holders_now: Option<i64>,
    prev: Option<&SnapshotRow>,
    now: chrono::DateTime<Utc>,
    token_age_minutes: Option<f64>,
) -> (Option<f64>, Option<f64>) {
    let Some(curr) = holders_now else {
        return (None, None);
    };
    match prev {
        Some(prev_row) => {
            let Some(prev_holders) = prev_row.holders_count else {
                return (None, None);
            };
            let minutes = prev_row
                .timestamp
                .map(|t| (now - t).num_seconds().max(1) as f64 / 60.0);
            let velocity = minutes
                .filter(|m| *m > 0.0)
                .map(|m| (curr - prev_holders) as f64 / m);
            let growth = (prev_holders > 0)
                .then(|| (curr - prev_holders) as f64 / prev_holders as f64 * 100.0);
            (velocity, growth)
        }
        None => {
            let velocity = token_age_minutes
                .filter(|a| *a > 0.0)
                .map(|age| curr as f64 / age);
            (velocity, None)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::LogAlerts;
    use crate::providers::types::{MintInfo, SellSimResult, TokenInfoData};
    use crate::trading::{PaperTrader, PaperTraderConfig};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;

    struct FakeMint {
        info: MintInfo,
    }

    #[async_trait]
    impl MintRpc for FakeMint {
        async fn parse_mint(&self, _mint: &str) -> MintInfo {
            self.info.clone()
        }
    }

    struct FakeSim {
        result: SellSimResult,
    }

    #[async_trait]
    impl SellSimulator for FakeSim {
        async fn simulate_sell(&self, _m: &str, _a: u64, _d: u8) -> SellSimResult {
            self.result.clone()
        }
    }

    #[derive(Default)]
    struct FakeData {
        info: Mutex<Option<TokenInfoData>>,
    }

    #[async_trait]
    impl TokenDataProvider for FakeData {
        async fn token_info(&self, _mint: &str) -> Option<TokenInfoData> {
            self.info.lock().clone()
        }
        async fn security_info(&self, _mint: &str) -> Option<SecurityData> {
            None
        }
        async fn top_holders(&self, _mint: &str) -> Vec<crate::providers::types::TopHolderRow> {
            Vec::new()
        }
        async fn dex_pair(&self, _mint: &str) -> Option<crate::providers::types::DexPairData> {
            None
        }
        async fn smart_money_count(&self, _mint: &str) -> Option<i64> {
            None
        }
        async fn volatility_5m(&self, _mint: &str) -> Option<f64> {
            None
        }
        async fn metadata(&self, _mint: &str) -> Option<crate::providers::types::TokenMetadataData> {
            None
        }
        async fn sol_price_usd(&self) -> Option<f64> {
            Some(150.0)
        }
    }

    struct Fixture {
        db: Arc<Database>,
        queue: Arc<PersistentEnrichmentQueue>,
        data: Arc<FakeData>,
        worker: EnrichmentWorker,
    }

    fn fixture(mint: MintInfo, sell: Option<SellSimResult>) -> Fixture {
        let db = Arc::new(Database::in_memory().unwrap());
        let queue = Arc::new(PersistentEnrichmentQueue::new(None, 5000));
        let data = Arc::new(FakeData::default());
        let paper = Arc::new(PaperTrader::new(
            db.clone(),
            Arc::new(LogAlerts),
            PaperTraderConfig::default(),
        ));
        let worker = EnrichmentWorker::new(
            WorkerDeps {
                db: db.clone(),
                queue: queue.clone(),
                mint_rpc: Arc::new(FakeMint { info: mint }),
                sell_sim: sell.map(|result| {
                    Arc::new(FakeSim { result }) as Arc<dyn SellSimulator>
                }),
                data: data.clone(),
                paper,
                real: None,
                copy: None,
                copycat: Arc::new(CopycatLedger::new(None)),
            },
            Arc::new(AtomicBool::new(false)),
        );
        Fixture {
            db,
            queue,
            data,
            worker,
        }
    }

    fn prescan_task(address: &str) -> EnrichmentTask {
        let mut task = EnrichmentTask::new(address, EnrichmentStage::PreScan, queue_now() - 5.0);
        task.discovery_time = queue_now() - 10.0;
        task
    }

    fn clean_mint() -> MintInfo {
        MintInfo {
            supply: 1_000_000,
            decimals: 6,
            ..Default::default()
        }
    }

    // --- PRE_SCAN ---

    #[tokio::test]
    async fn prescan_rejects_dual_authorities() {
        let f = fixture(
            MintInfo {
                mint_authority: Some("Auth".into()),
                freeze_authority: Some("Freezer".into()),
                ..clean_mint()
            },
            None,
        );
        f.worker.process_task(prescan_task("MintA")).await.unwrap();
        assert!(!f.queue.contains("MintA", EnrichmentStage::Initial).await);
    }

    #[tokio::test]
    async fn prescan_rejects_dangerous_extensions() {
        let f = fixture(
            MintInfo {
                is_token2022: true,
                dangerous_extensions: vec!["PERMANENT_DELEGATE".into()],
                ..clean_mint()
            },
            None,
        );
        f.worker.process_task(prescan_task("MintB")).await.unwrap();
        assert!(!f.queue.contains("MintB", EnrichmentStage::Initial).await);
    }

    #[tokio::test]
    async fn prescan_passes_clean_token_and_enqueues_initial() {
        let f = fixture(clean_mint(), Some(SellSimResult {
            sellable: true,
            price_impact_pct: Some(2.0),
            ..Default::default()
        }));
        f.worker.process_task(prescan_task("MintC")).await.unwrap();
        assert!(f.queue.contains("MintC", EnrichmentStage::Initial).await);

        let next = f.queue.get().await;
        assert_eq!(next.stage, EnrichmentStage::Initial);
        assert_eq!(next.prescan_risk_boost, 0);
        assert!(next.prescan_mint_info.is_some());
        assert!(next.prescan_sell_sim.is_some());
    }

    #[tokio::test]
    async fn prescan_soft_flags_boost_but_pass() {
        let f = fixture(
            MintInfo {
                is_token2022: true,
                risky_extensions: vec!["TRANSFER_FEE_CONFIG".into()],
                ..clean_mint()
            },
            None,
        );
        f.worker.process_task(prescan_task("MintD")).await.unwrap();
        let next = f.queue.get().await;
        assert!(next.prescan_risk_boost >= 10);
    }

    #[tokio::test]
    async fn prescan_unsellable_with_mint_authority_rejected() {
        let f = fixture(
            MintInfo {
                mint_authority: Some("ActiveAuth".into()),
                ..clean_mint()
            },
            Some(SellSimResult {
                sellable: false,
                error: Some("No route found".into()),
                ..Default::default()
            }),
        );
        f.worker.process_task(prescan_task("MintE")).await.unwrap();
        assert!(!f.queue.contains("MintE", EnrichmentStage::Initial).await);
    }

    #[tokio::test]
    async fn prescan_api_error_does_not_reject() {
        let f = fixture(
            MintInfo {
                mint_authority: Some("ActiveAuth".into()),
                ..clean_mint()
            },
            Some(SellSimResult {
                sellable: false,
                error: Some("HTTP 401".into()),
                api_error: true,
                ..Default::default()
            }),
        );
        f.worker.process_task(prescan_task("MintF")).await.unwrap();
        assert!(f.queue.contains("MintF", EnrichmentStage::Initial).await);
    }

    #[tokio::test]
    async fn prescan_rpc_error_passes_with_no_boost() {
        let f = fixture(
            MintInfo {
                parse_error: Some("timeout".into()),
                // Even with fields that would normally boost/reject:
                mint_authority: Some("Auth".into()),
                freeze_authority: Some("Freezer".into()),
                ..clean_mint()
            },
            None,
        );
        f.worker.process_task(prescan_task("MintG")).await.unwrap();
        let next = f.queue.get().await;
        assert_eq!(next.stage, EnrichmentStage::Initial);
        assert_eq!(next.prescan_risk_boost, 0);
    }

    // --- Normal stages ---

    fn healthy_info() -> TokenInfoData {
        TokenInfoData {
            price: Some(dec!(0.00002)),
            market_cap: Some(dec!(45000)),
            liquidity_usd: Some(dec!(60000)),
            volume_1h: Some(dec!(150000)),
            volume_5m: Some(dec!(30000)),
            holders_count: Some(320),
            buys_1h: Some(400),
            sells_1h: Some(100),
            buys_5m: Some(40),
            sells_5m: Some(10),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stage_persists_snapshot_and_enqueues_next() {
        let f = fixture(clean_mint(), None);
        *f.data.info.lock() = Some(healthy_info());
        let token_id = f
            .db
            .upsert_token(&TokenRow {
                address: "MintH".into(),
                chain: "sol".into(),
                symbol: Some("HLT".into()),
                ..Default::default()
            })
            .unwrap();

        let mut task = EnrichmentTask::new("MintH", EnrichmentStage::Initial, queue_now() - 1.0);
        task.discovery_time = queue_now() - 9.0;
        f.worker.process_task(task).await.unwrap();

        let snapshot = f.db.latest_snapshot(token_id).unwrap().unwrap();
        assert_eq!(snapshot.stage, "INITIAL");
        assert!(snapshot.score.is_some());
        assert!(snapshot.score_v3.is_some());
        assert!(snapshot.score.unwrap() > 0);

        // Next stage scheduled at discovery + MIN_2 offset.
        assert!(f.queue.contains("MintH", EnrichmentStage::Min2).await);
    }

    #[tokio::test]
    async fn stage_prunes_below_threshold() {
        let f = fixture(clean_mint(), None);
        // Thin data: low liquidity, few holders → score below the MIN_5
        // prune threshold of 20.
        *f.data.info.lock() = Some(TokenInfoData {
            price: Some(dec!(0.00001)),
            market_cap: Some(dec!(6000)),
            liquidity_usd: Some(dec!(6000)),
            volume_1h: Some(dec!(500)),
            holders_count: Some(8),
            ..Default::default()
        });
        f.db.upsert_token(&TokenRow {
            address: "MintI".into(),
            chain: "sol".into(),
            ..Default::default()
        })
        .unwrap();

        let mut task = EnrichmentTask::new("MintI", EnrichmentStage::Min5, queue_now() - 1.0);
        task.discovery_time = queue_now() - 301.0;
        f.worker.process_task(task).await.unwrap();

        assert!(!f.queue.contains("MintI", EnrichmentStage::Min10).await);
    }

    #[tokio::test]
    async fn outcome_peaks_are_monotonic_and_final_stage_sets_rug() {
        let f = fixture(clean_mint(), None);
        let token_id = f
            .db
            .upsert_token(&TokenRow {
                address: "MintJ".into(),
                chain: "sol".into(),
                symbol: Some("RUGJ".into()),
                ..Default::default()
            })
            .unwrap();

        // First observation: mcap 10k.
        *f.data.info.lock() = Some(TokenInfoData {
            price: Some(dec!(0.0001)),
            market_cap: Some(dec!(10000)),
            liquidity_usd: Some(dec!(30000)),
            holders_count: Some(50),
            volume_1h: Some(dec!(5000)),
            ..Default::default()
        });
        let mut task = EnrichmentTask::new("MintJ", EnrichmentStage::Initial, queue_now());
        task.discovery_time = queue_now() - 10.0;
        f.worker.process_task(task).await.unwrap();

        // Pump to 100k at MIN_2.
        *f.data.info.lock() = Some(TokenInfoData {
            price: Some(dec!(0.001)),
            market_cap: Some(dec!(100000)),
            liquidity_usd: Some(dec!(30000)),
            holders_count: Some(80),
            volume_1h: Some(dec!(5000)),
            ..Default::default()
        });
        let mut task = EnrichmentTask::new("MintJ", EnrichmentStage::Min2, queue_now());
        task.discovery_time = queue_now() - 20.0;
        f.worker.process_task(task).await.unwrap();

        let outcome = f.db.outcome(token_id).unwrap().unwrap();
        assert_eq!(outcome.initial_mcap, Some(dec!(10000)));
        assert_eq!(outcome.peak_mcap, Some(dec!(100000)));
        assert_eq!(outcome.peak_multiplier, Some(dec!(10)));
        assert!(outcome.peak_mcap >= outcome.initial_mcap);

        // Dump back to 500 at HOUR_24 → final multiplier 0.05, peak 10x →
        // 99.5% below peak → rug.
        *f.data.info.lock() = Some(TokenInfoData {
            price: Some(dec!(0.000005)),
            market_cap: Some(dec!(500)),
            liquidity_usd: Some(dec!(100)),
            holders_count: Some(20),
            volume_1h: Some(dec!(10)),
            ..Default::default()
        });
        let mut task = EnrichmentTask::new("MintJ", EnrichmentStage::Hour24, queue_now());
        task.discovery_time = queue_now() - 86400.0;
        f.worker.process_task(task).await.unwrap();

        let outcome = f.db.outcome(token_id).unwrap().unwrap();
        assert_eq!(outcome.final_mcap, Some(dec!(500)));
        assert_eq!(outcome.is_rug, Some(true));
        // Peak survives the dump.
        assert_eq!(outcome.peak_mcap, Some(dec!(100000)));
        // The rug landed in the copycat ledger under the token symbol.
        assert_eq!(f.worker.deps.copycat.rug_count("RUGJ").await, 1);
        // And HOUR_24 has no successor.
        assert!(!f.queue.contains("MintJ", EnrichmentStage::Hour24).await);
    }

    #[tokio::test]
    async fn strong_signal_opens_paper_position() {
        let f = fixture(clean_mint(), None);
        *f.data.info.lock() = Some(healthy_info());
        let token_id = f
            .db
            .upsert_token(&TokenRow {
                address: "MintK".into(),
                chain: "sol".into(),
                symbol: Some("STRK".into()),
                ..Default::default()
            })
            .unwrap();

        let mut task = EnrichmentTask::new("MintK", EnrichmentStage::Initial, queue_now());
        task.discovery_time = queue_now() - 9.0;
        f.worker.process_task(task).await.unwrap();

        // The healthy profile fires enough bullish rules for an entry, so a
        // paper position exists for the token.
        let pos = f.db.open_position(token_id, 1, "signal").unwrap();
        assert!(pos.is_some(), "expected a paper position to open");
        // And an active entry signal was recorded.
        let strong = f.db.active_signal(token_id, "strong_buy").unwrap();
        let buy = f.db.active_signal(token_id, "buy").unwrap();
        assert!(strong.is_some() || buy.is_some());
    }
}
