// =============================================================================
// Storage row structs — one per relational table
// =============================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A discovered token. Created on first sighting, mutated only by additive
/// upsert, never deleted.
#[derive(Debug, Clone, Default)]
pub struct TokenRow {
    pub id: i64,
    pub address: String,
    pub chain: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub source: Option<String>,
    pub creator_address: Option<String>,
    pub initial_buy_sol: Option<Decimal>,
    pub initial_mcap_sol: Option<Decimal>,
    pub bonding_curve_key: Option<String>,
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub first_seen_at: Option<DateTime<Utc>>,
}

/// Immutable point-in-time observation; many per token.
#[derive(Debug, Clone, Default)]
pub struct SnapshotRow {
    pub id: i64,
    pub token_id: i64,
    pub stage: String,
    pub price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub liquidity_usd: Option<Decimal>,
    pub volume_5m: Option<Decimal>,
    pub volume_1h: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub holders_count: Option<i64>,
    pub top10_holders_pct: Option<Decimal>,
    pub dev_holds_pct: Option<Decimal>,
    pub smart_wallets_count: Option<i64>,
    pub buys_5m: Option<i64>,
    pub sells_5m: Option<i64>,
    pub buys_1h: Option<i64>,
    pub sells_1h: Option<i64>,
    pub buys_24h: Option<i64>,
    pub sells_24h: Option<i64>,
    pub volatility_5m: Option<f64>,
    pub lp_removed_pct: Option<f64>,
    pub dex_price: Option<Decimal>,
    pub dex_liquidity_usd: Option<Decimal>,
    pub dex_volume_5m: Option<Decimal>,
    pub dex_volume_1h: Option<Decimal>,
    pub dex_volume_24h: Option<Decimal>,
    pub jupiter_price: Option<Decimal>,
    pub holder_growth_pct: Option<f64>,
    pub llm_risk_score: Option<i64>,
    pub score: Option<i64>,
    pub score_v3: Option<i64>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Security analysis; one row per token, upserted.
#[derive(Debug, Clone, Default)]
pub struct SecurityRow {
    pub token_id: i64,
    pub is_mintable: Option<bool>,
    pub lp_burned: Option<bool>,
    pub lp_locked: Option<bool>,
    pub lp_lock_duration_days: Option<i64>,
    pub contract_renounced: Option<bool>,
    pub is_honeypot: Option<bool>,
    pub buy_tax: Option<Decimal>,
    pub sell_tax: Option<Decimal>,
    pub top10_holders_pct: Option<Decimal>,
    pub dev_holds_pct: Option<Decimal>,
    pub dev_token_balance: Option<Decimal>,
    pub rugcheck_score: Option<i64>,
    /// Monotonic maximum of every rugcheck score ever seen.
    pub rugcheck_score_max: Option<i64>,
    pub rugcheck_risks: Option<String>,
    pub bundled_buy_detected: Option<bool>,
    pub lp_burned_pct_raydium: Option<Decimal>,
}

/// Per-snapshot top-holder listing row. Immutable.
#[derive(Debug, Clone, Default)]
pub struct TopHolderDbRow {
    pub snapshot_id: i64,
    pub token_id: i64,
    pub rank: i64,
    pub address: String,
    pub balance: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub pnl: Option<Decimal>,
}

/// Peak/final tracking; one per token, peak fields only ever move up.
#[derive(Debug, Clone, Default)]
pub struct OutcomeRow {
    pub token_id: i64,
    pub initial_mcap: Option<Decimal>,
    pub peak_mcap: Option<Decimal>,
    pub peak_price: Option<Decimal>,
    pub peak_multiplier: Option<Decimal>,
    pub time_to_peak_sec: Option<i64>,
    pub final_mcap: Option<Decimal>,
    pub final_multiplier: Option<Decimal>,
    pub is_rug: Option<bool>,
    pub outcome_stage: Option<String>,
}

/// Aggregated creator history; one per creator address, upserted.
#[derive(Debug, Clone, Default)]
pub struct CreatorProfileRow {
    pub address: String,
    pub total_launches: i64,
    pub rugged_count: i64,
    pub success_count: i64,
    pub avg_peak_multiplier: Option<Decimal>,
    pub risk_score: Option<i64>,
    pub funding_risk_score: Option<i64>,
    pub pumpfun_dead_tokens: Option<i64>,
    pub last_launch_at: Option<DateTime<Utc>>,
}

/// An emitted trading signal with outcome columns filled in later.
#[derive(Debug, Clone, Default)]
pub struct SignalRow {
    pub id: i64,
    pub token_id: i64,
    pub token_address: String,
    pub status: String,
    pub score: Option<i64>,
    pub net_score: Option<i64>,
    /// JSON array of fired rule names.
    pub rules_fired: Option<String>,
    pub price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub liquidity_usd: Option<Decimal>,
    pub peak_multiplier_after: Option<Decimal>,
    pub peak_roi_pct: Option<Decimal>,
    pub is_rug_after: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Executed trade, real or paper. Append-only.
#[derive(Debug, Clone, Default)]
pub struct TradeRow {
    pub id: i64,
    pub signal_id: Option<i64>,
    pub token_id: i64,
    pub token_address: String,
    pub side: String,
    pub amount_sol: Option<Decimal>,
    pub amount_token: Option<Decimal>,
    pub price: Option<Decimal>,
    pub slippage_pct: Option<Decimal>,
    pub fee_sol: Option<Decimal>,
    pub tx_hash: Option<String>,
    pub is_paper: i64,
    pub source: String,
    pub copied_from_wallet: Option<String>,
    pub status: String,
    pub executed_at: Option<DateTime<Utc>>,
}

/// Aggregated position. Mutated by its owning trader until closed.
#[derive(Debug, Clone, Default)]
pub struct PositionRow {
    pub id: i64,
    pub signal_id: Option<i64>,
    pub token_id: i64,
    pub token_address: String,
    pub symbol: Option<String>,
    pub entry_price: Option<Decimal>,
    pub current_price: Option<Decimal>,
    pub amount_token: Option<Decimal>,
    pub amount_sol_invested: Option<Decimal>,
    pub pnl_pct: Decimal,
    pub pnl_usd: Decimal,
    pub max_price: Option<Decimal>,
    pub status: String,
    pub close_reason: Option<String>,
    pub is_paper: i64,
    pub is_micro_entry: i64,
    pub source: String,
    pub copied_from_wallet: Option<String>,
    pub opened_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// A wallet mirrored by the copy trader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedWalletRow {
    pub address: String,
    pub label: String,
    pub enabled: bool,
    pub multiplier: f64,
    pub max_sol_per_trade: f64,
}
