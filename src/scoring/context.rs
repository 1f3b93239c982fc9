// =============================================================================
// SignalContext — per-enrichment-step bundle of optional named signals
// =============================================================================
//
// The evaluator and scorers accept ~40 optional inputs gathered from many
// analysers. Rather than threading them as separate arguments, the worker
// builds one SignalContext per step and passes it to both score variants and
// the signal evaluator.
// =============================================================================

use crate::providers::types::{MintInfo, SellSimResult};

/// All optional auxiliary signals for one scoring/evaluation pass.
///
/// Every field defaults to "unknown"; the pure functions treat missing data
/// as neutral.
#[derive(Debug, Clone, Default)]
pub struct SignalContext {
    // Holder dynamics
    pub holder_velocity: Option<f64>,
    pub holder_growth_pct: Option<f64>,
    pub holders_in_profit_pct: Option<f64>,

    // Whale / smart money
    pub whale_score_impact: i32,
    pub smart_money_weighted: Option<f64>,
    pub cross_whale_detected: bool,

    // Launch-curve metadata
    pub bonding_curve_pct: Option<f64>,
    pub launchpad: Option<String>,
    pub launchpad_score: Option<i32>,

    // Market structure
    pub lp_removed_pct: Option<f64>,
    pub dev_holds_pct: Option<f64>,
    pub volatility_5m: Option<f64>,
    pub jupiter_price: Option<f64>,
    pub token_age_minutes: Option<f64>,

    // External risk scores
    pub rugcheck_score: Option<i64>,
    pub rugcheck_danger_count: Option<i64>,
    pub rugcheck_insider_pct: Option<f64>,
    pub solsniffer_score: Option<i64>,
    pub bubblemaps_decentralization: Option<f64>,
    pub goplus_is_honeypot: Option<bool>,
    pub goplus_critical_flags: Vec<String>,

    // PRE_SCAN carry-through
    pub mint_info: Option<MintInfo>,
    pub sell_sim: Option<SellSimResult>,
    pub mint_risk_boost: i32,

    // First-block forensics
    pub bundled_buy_detected: bool,
    pub pumpfun_dead_tokens: Option<i64>,
    pub raydium_lp_burned: Option<bool>,
    pub fee_payer_sybil_score: Option<f64>,
    pub funding_chain_risk: Option<i64>,
    pub convergence_detected: bool,
    pub wash_trading_suspected: bool,
    pub jito_bundle_detected: bool,

    // Metadata / socials
    pub metadata_score: Option<i32>,
    pub metaplex_mutable: Option<bool>,
    pub metaplex_has_homoglyphs: bool,
    pub has_website: Option<bool>,
    pub domain_age_days: Option<i64>,
    pub tg_member_count: Option<i64>,
    pub twitter_mentions: Option<i64>,
    pub twitter_kol_mentions: Option<i64>,
    pub twitter_viral: bool,
    pub llm_risk_score: Option<i64>,

    // Aggregator token-list status
    pub jupiter_banned: bool,
    pub jupiter_strict: bool,

    // Copycat symbol history
    pub copycat_rugged: bool,
    pub copycat_rug_count: i64,
}

impl SignalContext {
    /// True when the sell simulation failed for a token reason (not an API
    /// outage).
    pub fn sell_sim_failed(&self) -> bool {
        match &self.sell_sim {
            Some(sim) => !sim.sellable && sim.error.is_some() && !sim.api_error,
            None => false,
        }
    }
}
