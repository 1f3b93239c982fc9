// =============================================================================
// Signal evaluator — rule-based pattern matching on enriched data
// =============================================================================
//
// Evaluates a freshly-enriched snapshot against the full rule set. Hard gates
// short-circuit with a single fired rule and a forced avoid; soft rules
// accumulate signed weights; caps clamp the totals before classification.
//
// Rule thresholds and weights are calibrated against historical rug-rate
// data — do not tune them casually.
// =============================================================================

pub mod copycat;
pub mod decay;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::scoring::context::SignalContext;
use crate::scoring::views::{CreatorView, SecurityView, SnapshotView};
use crate::types::SignalAction;

/// A named rule that fired during evaluation.
#[derive(Debug, Clone)]
pub struct SignalRule {
    pub name: &'static str,
    /// Positive = bullish, negative = bearish, zero = cap marker.
    pub weight: i32,
    pub description: String,
}

/// Result of evaluating all rules against a snapshot.
#[derive(Debug, Clone)]
pub struct SignalResult {
    pub rules_fired: Vec<SignalRule>,
    pub bullish_score: i32,
    pub bearish_score: i32,
    pub net_score: i32,
    pub action: SignalAction,
}

impl SignalResult {
    pub fn fired(&self, name: &str) -> bool {
        self.rules_fired.iter().any(|r| r.name == name)
    }

    pub fn rule(&self, name: &str) -> Option<&SignalRule> {
        self.rules_fired.iter().find(|r| r.name == name)
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules_fired.iter().map(|r| r.name).collect()
    }

    fn hard_avoid(rule: SignalRule) -> Self {
        Self {
            rules_fired: vec![rule],
            bullish_score: 0,
            bearish_score: 10,
            net_score: -10,
            action: SignalAction::Avoid,
        }
    }
}

fn classify(net: i32) -> SignalAction {
    if net >= 8 {
        SignalAction::StrongBuy
    } else if net >= 5 {
        SignalAction::Buy
    } else if net >= 2 {
        SignalAction::Watch
    } else {
        SignalAction::Avoid
    }
}

/// Active scam-flag names for the compound fingerprint gate.
fn compound_scam_flags(
    security: Option<&SecurityView>,
    ctx: &SignalContext,
) -> Vec<&'static str> {
    let mut flags = Vec::new();

    let lp_unsecured = security.is_some_and(|s| {
        s.lp_burned != Some(true)
            && s.lp_locked != Some(true)
            && ctx.raydium_lp_burned == Some(false)
    });
    if lp_unsecured {
        flags.push("lp_unsecured");
    }
    if security.is_some_and(|s| s.is_mintable == Some(true)) {
        flags.push("mintable");
    }
    if ctx.bundled_buy_detected {
        flags.push("bundled_buy");
    }
    if ctx.pumpfun_dead_tokens.is_some_and(|d| d >= 5) {
        flags.push("serial_deployer");
    }
    if ctx.fee_payer_sybil_score.is_some_and(|s| s > 0.5) {
        flags.push("fee_payer_sybil");
    }
    if ctx.rugcheck_danger_count.is_some_and(|c| c >= 3) {
        flags.push("rugcheck_multi_danger");
    }
    if holder_concentration_risk(security, ctx) {
        flags.push("holder_concentration");
    }

    flags
}

/// Classic concentration rug pattern: extreme rugcheck score plus
/// holder/ownership risk text, without the benign "LP Unlocked" marker that
/// every standard launchpad token carries.
fn holder_concentration_risk(security: Option<&SecurityView>, ctx: &SignalContext) -> bool {
    if !ctx.rugcheck_score.is_some_and(|s| s >= 20_000) {
        return false;
    }
    let Some(risks) = security.and_then(|s| s.rugcheck_risks.as_deref()) else {
        return false;
    };
    let lower = risks.to_lowercase();
    let holder_risk = lower.contains("holder") || lower.contains("ownership");
    holder_risk && !lower.contains("lp unlocked")
}

/// Evaluate all signal rules against enriched data.
pub fn evaluate_signals(
    snapshot: &SnapshotView,
    security: Option<&SecurityView>,
    creator: Option<&CreatorView>,
    prev_snapshot: Option<&SnapshotView>,
    ctx: &SignalContext,
) -> SignalResult {
    let mut fired: Vec<SignalRule> = Vec::new();

    let liq = snapshot.best_liquidity().unwrap_or(0.0);
    let holders = snapshot.holders_count.unwrap_or(0);
    let mcap = snapshot
        .market_cap
        .and_then(|m| m.to_f64())
        .unwrap_or(0.0);
    let score = snapshot.score.unwrap_or(0);
    let age = ctx.token_age_minutes;

    // --- HARD GATES (early reject — skip all other rules) ---

    // HG1: tokens below the minimum liquidity floor are unsellable in
    // practice. Zero/missing liquidity passes: no data is not a signal.
    if liq > 0.0 && liq < 5_000.0 {
        return SignalResult::hard_avoid(SignalRule {
            name: "low_liquidity_gate",
            weight: -10,
            description: format!("Hard gate: liquidity ${liq:.0} < $5K (high rug risk)"),
        });
    }

    // HG2: extreme MCap/Liq — empty order book, no exit liquidity.
    if liq > 0.0 && mcap > 0.0 && mcap / liq > 10.0 {
        return SignalResult::hard_avoid(SignalRule {
            name: "extreme_mcap_liq_gate",
            weight: -10,
            description: format!(
                "Hard gate: MCap/Liq ratio {:.1}x > 10 (no exit liquidity)",
                mcap / liq
            ),
        });
    }

    // HG3: compound scam fingerprint — three or more simultaneous red flags.
    let scam_flags = compound_scam_flags(security, ctx);
    if scam_flags.len() >= 3 {
        return SignalResult::hard_avoid(SignalRule {
            name: "compound_scam_fingerprint",
            weight: -10,
            description: format!(
                "Hard gate: {} scam flags active: {}",
                scam_flags.len(),
                scam_flags.join(", ")
            ),
        });
    }

    // HG4: serial copycat — the same symbol has already rugged repeatedly.
    if ctx.copycat_rugged && ctx.copycat_rug_count >= 2 {
        return SignalResult::hard_avoid(SignalRule {
            name: "copycat_serial_scam",
            weight: -10,
            description: format!(
                "Hard gate: symbol rugged {} times before (serial scam)",
                ctx.copycat_rug_count
            ),
        });
    }

    let mut fire = |name: &'static str, weight: i32, description: String| {
        fired.push(SignalRule {
            name,
            weight,
            description,
        });
    };

    // Buy/sell counts with the 1h window preferred and 5m fallback.
    let buys = snapshot
        .buys_1h
        .filter(|b| *b > 0)
        .or(snapshot.buys_5m)
        .unwrap_or(0);
    let sells = snapshot
        .sells_1h
        .filter(|s| *s > 0)
        .or(snapshot.sells_5m)
        .unwrap_or(0);
    let sm = snapshot.smart_wallets_count.unwrap_or(0);
    let buys_5m = snapshot.buys_5m.unwrap_or(0);
    let sells_5m = snapshot.sells_5m.unwrap_or(0);

    // --- BULLISH RULES ---

    if score >= 60 {
        fire("high_score", 3, format!("Score {score} >= 60"));
    }

    if sells > 0 && buys as f64 / sells as f64 >= 3.0 {
        fire(
            "buy_pressure",
            2,
            format!("Buy/sell ratio {:.1}x", buys as f64 / sells as f64),
        );
    }

    if sm >= 2 {
        fire("smart_money", 3, format!("{sm} smart wallets in top holders"));
    }

    if let Some(velocity) = ctx.holder_velocity.filter(|v| *v >= 50.0) {
        fire("holder_velocity", 2, format!("Holder velocity {velocity:.0}/min"));
    }

    let strong_liquidity = liq >= 50_000.0;
    if strong_liquidity {
        fire("strong_liquidity", 2, format!("Liquidity ${liq:.0}"));
    }

    let vol = snapshot
        .volume_1h
        .or(snapshot.dex_volume_1h)
        .or(snapshot.volume_5m)
        .and_then(|v| v.to_f64())
        .unwrap_or(0.0);
    if liq > 0.0 && vol / liq >= 2.0 {
        fire("volume_spike", 2, format!("Vol/liq ratio {:.1}x", vol / liq));
    }

    if let Some(risk) = creator.and_then(|c| c.risk_score) {
        if risk < 20 {
            fire("safe_creator", 1, format!("Creator risk {risk}"));
        }
    }

    if let Some(sec) = security {
        let mut sec_flags: Vec<&str> = Vec::new();
        if sec.lp_burned == Some(true) || sec.lp_locked == Some(true) {
            sec_flags.push("LP secured");
        }
        if sec.contract_renounced == Some(true) {
            sec_flags.push("renounced");
        }
        if sec.sell_tax.is_some_and(|t| t <= Decimal::from(5)) {
            sec_flags.push("low tax");
        }
        if sec_flags.len() >= 2 {
            fire("security_cleared", 3, sec_flags.join(", "));
        }
    }

    let prev_price = prev_snapshot
        .and_then(|p| p.price)
        .and_then(|p| p.to_f64())
        .filter(|p| *p > 0.0);
    let curr_price = snapshot.price.and_then(|p| p.to_f64());
    if let (Some(prev_p), Some(curr_p)) = (prev_price, curr_price) {
        let change_pct = (curr_p - prev_p) / prev_p * 100.0;
        if change_pct >= 20.0 {
            fire(
                "price_momentum",
                2,
                format!("Price +{change_pct:.0}% since last check"),
            );
        }
    }

    // --- BEARISH RULES ---

    if security.and_then(|s| s.is_honeypot) == Some(true) {
        fire("honeypot", -10, "Token is a honeypot".into());
    }

    if let Some(risk) = creator.and_then(|c| c.risk_score) {
        if risk >= 60 {
            fire("risky_creator", -3, format!("Creator risk score {risk}"));
        }
    }

    if let Some(top10) = snapshot
        .top10_holders_pct
        .filter(|t| *t > Decimal::from(50))
        .and_then(|t| t.to_f64())
    {
        fire("high_concentration", -2, format!("Top 10 hold {top10:.0}%"));
    }

    if liq > 0.0 && liq < 5_000.0 {
        fire("tiny_liquidity", -2, format!("Liquidity only ${liq:.0}"));
    }

    // Graduated liquidity penalties below the comfortable band.
    if (5_000.0..8_000.0).contains(&liq) {
        fire(
            "very_low_liquidity",
            -3,
            format!("Liquidity ${liq:.0} barely above floor"),
        );
    } else if (8_000.0..20_000.0).contains(&liq) {
        fire(
            "low_liquidity_soft",
            -2,
            format!("Liquidity ${liq:.0} below $20K"),
        );
    }

    if let Some(tax) = security
        .and_then(|s| s.sell_tax)
        .filter(|t| *t > Decimal::from(10))
        .and_then(|t| t.to_f64())
    {
        fire("high_sell_tax", -3, format!("Sell tax {tax:.0}%"));
    }

    // Tiered rugcheck penalty. Most fresh launchpad tokens sit at 50-3000
    // ("Low LP Providers", "Mutable Metadata") so the base tier stays mild.
    if let Some(rc) = ctx.rugcheck_score {
        if rc >= 5000 {
            fire("rugcheck_danger", -5, format!("Rugcheck score {rc} (scam level)"));
        } else if rc >= 3000 {
            fire("rugcheck_danger", -4, format!("Rugcheck score {rc} (high danger)"));
        } else if rc >= 50 {
            fire("rugcheck_danger", -2, format!("Rugcheck score {rc} (dangerous)"));
        }
    }

    if let Some(ss) = ctx.solsniffer_score {
        if ss < 30 {
            fire("solsniffer_danger", -4, format!("SolSniffer score {ss} (dangerous)"));
        } else if ss >= 80 {
            fire("solsniffer_safe", 2, format!("SolSniffer score {ss} (safe)"));
        }
    }

    if let Some(dev) = ctx.dev_holds_pct.filter(|d| *d >= 50.0) {
        fire("high_dev_holds", -2, format!("Dev holds {dev:.0}%"));
    }

    if let (Some(jup), Some(curr_p)) = (ctx.jupiter_price, curr_price) {
        if curr_p > 0.0 {
            let div = ((curr_p - jup).abs() / curr_p) * 100.0;
            if div > 20.0 {
                fire(
                    "price_manipulation",
                    -3,
                    format!("Price divergence {div:.0}% across sources"),
                );
            }
        }
    }

    // Volume dried up — skipped for tokens younger than 30 minutes where
    // vol_1h physically cannot exceed vol_5m by much.
    let vol_5m_val = snapshot.vol_5m();
    let vol_1h_val = snapshot.vol_1h();
    if vol_5m_val > 0.0 && vol_1h_val > 0.0 {
        let young = age.is_some_and(|a| a < 30.0);
        if !young && vol_1h_val / vol_5m_val > 12.0 {
            fire(
                "volume_dried_up",
                -2,
                format!("Volume dying: 1h/5m ratio {:.1}x", vol_1h_val / vol_5m_val),
            );
        }
    }

    if let (Some(prev), Some(curr_h)) = (prev_snapshot, snapshot.holders_count) {
        if let Some(prev_h) = prev.holders_count.filter(|h| *h > 0) {
            if ctx.holder_velocity.is_some() {
                let growth_rate = (curr_h - prev_h) as f64 / prev_h as f64 * 100.0;
                if growth_rate < -5.0 {
                    fire(
                        "holder_deceleration",
                        -1,
                        format!("Holders declining: {prev_h} -> {curr_h} ({growth_rate:+.1}%)"),
                    );
                }
            }
        }
    }

    if let Some(pct) = ctx.lp_removed_pct.filter(|p| *p >= 20.0) {
        let severity = if pct >= 50.0 { "critical" } else { "warning" };
        fire("lp_removal_active", -4, format!("LP removed {pct:.0}% ({severity})"));
    }

    if ctx.cross_whale_detected {
        fire(
            "cross_token_coordination",
            -3,
            "Cross-token whale activity detected (coordinated pump suspected)".into(),
        );
    }

    // Healthy growth: rising price on low volatility with real buy pressure.
    if let (Some(volat), Some(prev_p), Some(curr_p)) = (ctx.volatility_5m, prev_price, curr_price)
    {
        if volat < 10.0 {
            let change = (curr_p - prev_p) / prev_p * 100.0;
            if change >= 10.0 && buys > 0 && sells > 0 && buys as f64 / sells as f64 >= 2.0 {
                fire(
                    "strong_momentum",
                    2,
                    format!("Healthy growth: +{change:.0}%, low vol ({volat:.0}%)"),
                );
            }
        }
    }

    if let Some(mint) = &ctx.mint_info {
        if mint.has_dangerous_extensions() {
            fire(
                "token2022_danger",
                -3,
                format!(
                    "Token2022 dangerous extensions: {}",
                    mint.dangerous_extensions.join(", ")
                ),
            );
        }
    }

    if ctx.sell_sim_failed() {
        let err = ctx
            .sell_sim
            .as_ref()
            .and_then(|s| s.error.clone())
            .unwrap_or_default();
        fire("sell_sim_failed", -5, format!("Sell simulation failed: {err}"));
    }

    if ctx.bundled_buy_detected {
        fire(
            "bundled_buy",
            -3,
            "Bundled buys detected: first-block buyers funded by creator".into(),
        );
    }

    if let Some(dead) = ctx.pumpfun_dead_tokens {
        if dead >= 3 {
            fire(
                "serial_deployer",
                -3,
                format!("Creator has {dead} dead tokens on launchpad"),
            );
        } else if dead == 2 {
            fire(
                "serial_deployer_mild",
                -2,
                format!("Creator has {dead} dead tokens on launchpad"),
            );
        }
    }

    let lp_unsecured =
        security.is_some_and(|s| s.lp_burned != Some(true) && s.lp_locked != Some(true));
    if ctx.raydium_lp_burned == Some(false) && lp_unsecured {
        fire(
            "lp_not_burned",
            -2,
            "LP not burned or locked (pool verified)".into(),
        );
    }

    if ctx.goplus_is_honeypot == Some(true) {
        fire("goplus_honeypot", -10, "Secondary source confirms honeypot".into());
    }

    if ctx.metadata_score.is_some_and(|m| m <= -3) {
        fire(
            "no_socials",
            -1,
            "No social links found (website, twitter, telegram)".into(),
        );
    }

    if ctx.wash_trading_suspected {
        fire(
            "wash_trading_pnl",
            -3,
            "Wash trading suspected: most holders at loss while price rises".into(),
        );
    }

    if !ctx.goplus_critical_flags.is_empty() {
        let flags: Vec<&str> = ctx
            .goplus_critical_flags
            .iter()
            .take(3)
            .map(String::as_str)
            .collect();
        fire(
            "goplus_critical_risk",
            -5,
            format!("Critical security flags: {}", flags.join(", ")),
        );
    }

    if let Some(count) = ctx.rugcheck_danger_count.filter(|c| *c >= 3) {
        fire(
            "rugcheck_multi_danger",
            -3,
            format!("Rugcheck: {count} danger-level risks detected"),
        );
    }

    if let Some(dec) = ctx.bubblemaps_decentralization.filter(|d| *d < 0.3) {
        fire(
            "low_decentralization",
            -3,
            format!("Decentralization score {dec:.2} (< 0.3)"),
        );
    }

    if let Some(sybil) = ctx.fee_payer_sybil_score.filter(|s| *s > 0.5) {
        fire(
            "fee_payer_sybil",
            -6,
            format!("Sybil attack: {:.0}% buyers share fee payer", sybil * 100.0),
        );
    }

    if let Some(risk) = ctx.funding_chain_risk.filter(|r| *r >= 60) {
        fire(
            "funding_chain_suspicious",
            -4,
            format!("Suspicious funding chain: risk score {risk}"),
        );
    }

    if ctx.convergence_detected {
        fire(
            "token_convergence",
            -5,
            "Token convergence: first-block buyers send to same destination".into(),
        );
    }

    if ctx.jito_bundle_detected {
        fire(
            "jito_bundle_snipe",
            -3,
            "MEV bundle snipe detected in first block".into(),
        );
    }

    if ctx.metaplex_mutable == Some(true) {
        fire(
            "mutable_metadata",
            -1,
            "Token metadata is mutable (creator can change name/image)".into(),
        );
    }

    if ctx.metaplex_has_homoglyphs {
        fire(
            "name_spoofing",
            -5,
            "Homoglyph characters detected in token name".into(),
        );
    }

    if let Some(pct) = ctx.rugcheck_insider_pct.filter(|p| *p >= 30.0) {
        fire(
            "high_insider_network",
            -4,
            format!("Insider network: {pct:.0}% of top holders are insiders"),
        );
    }

    if ctx.jupiter_banned {
        fire("jupiter_banned", -10, "Token is BANNED on aggregator token list".into());
    }

    if ctx.jupiter_strict {
        fire(
            "jupiter_verified",
            3,
            "Token is aggregator STRICT verified (highest trust)".into(),
        );
    }

    // --- VELOCITY RULES ---

    if buys_5m >= 50 {
        fire(
            "explosive_buy_velocity",
            3,
            format!("Explosive buy velocity: {buys_5m} buys in 5m"),
        );
    }

    if let Some(age_min) = age.filter(|a| *a > 0.0) {
        if holders >= 10 {
            let per_min = holders as f64 / age_min;
            if per_min >= 25.0 {
                fire(
                    "holder_acceleration",
                    3,
                    format!("Holder acceleration: {per_min:.0} holders/min"),
                );
            }
        }
    }

    if sm >= 3 && age.is_some_and(|a| a <= 10.0) {
        fire(
            "smart_money_early_entry",
            4,
            format!("{sm} smart wallets entered within 10m of launch"),
        );
    }

    let vol_5m_check = snapshot.vol_5m();
    if liq > 0.0 && vol_5m_check > 0.0 && vol_5m_check / liq >= 5.0 {
        fire(
            "volume_spike_ratio",
            2,
            format!("Extreme volume spike: 5m vol/liq = {:.1}x", vol_5m_check / liq),
        );
    }

    if buys_5m >= 20 && (sells_5m as f64) < buys_5m as f64 * 0.3 && holders >= 30 {
        fire(
            "organic_buy_pattern",
            2,
            format!("Organic buying: {buys_5m} buys, {holders} holders"),
        );
    }

    // --- FAST ENTRY RULES (fire on INITIAL without a previous snapshot) ---

    let fresh = age.is_some_and(|a| a < 3.0);
    if prev_snapshot.is_none()
        && fresh
        && liq > 0.0
        && mcap > 0.0
        && mcap / liq < 5.0
        && holders >= 15
        && sells > 0
        && buys as f64 / sells as f64 >= 3.0
        && !ctx.rugcheck_score.is_some_and(|rc| rc >= 5000)
    {
        fire(
            "early_organic_momentum",
            3,
            format!(
                "Fresh healthy launch: {holders} holders, buy ratio {:.1}x",
                buys as f64 / sells as f64
            ),
        );
    }

    if fresh && liq > 0.0 && vol_5m_check / liq >= 0.5 {
        fire(
            "fresh_volume_surge",
            2,
            format!("Fresh volume surge: 5m vol/liq = {:.2}x", vol_5m_check / liq),
        );
    }

    // --- COMMUNITY & LLM RULES ---

    if let Some(members) = ctx.tg_member_count.filter(|m| *m >= 500) {
        fire(
            "active_tg_community",
            2,
            format!("Active Telegram community: {members} members"),
        );
    }

    if ctx.has_website == Some(true) {
        if let Some(days) = ctx.domain_age_days.filter(|d| *d >= 30) {
            fire(
                "established_website",
                1,
                format!("Established website (domain age: {days}d)"),
            );
        }
    }

    if let Some(llm) = ctx.llm_risk_score {
        if llm >= 80 {
            fire("llm_high_risk", -1, format!("LLM analysis: high risk score {llm}/100"));
        } else if llm <= 25 {
            fire("llm_low_risk", 2, format!("LLM analysis: low risk score {llm}/100"));
        }
    }

    if let Some(growth) = ctx.holder_growth_pct {
        if growth >= 100.0 {
            fire(
                "explosive_holder_growth",
                3,
                format!("Holder growth +{growth:.0}% since last snapshot"),
            );
        } else if growth <= -20.0 {
            fire(
                "holder_exodus",
                -3,
                format!("Holder exodus: {growth:.0}% since last snapshot"),
            );
        }
    }

    // --- ANTI-SCAM RULES ---

    if (1..=5).contains(&holders) {
        fire("low_holders", -3, format!("Only {holders} holders"));
    }

    if lp_unsecured && security.is_some() && age.is_some_and(|a| a < 10.0) && holders < 30 {
        fire(
            "unsecured_lp_fresh",
            -3,
            "LP not secured on fresh token with few holders".into(),
        );
    }

    let copycat_single = ctx.copycat_rugged && ctx.copycat_rug_count < 2;
    if copycat_single {
        fire(
            "copycat_rugged_symbol",
            -6,
            "Symbol previously rugged once (copycat launch)".into(),
        );
    }

    if age.is_some_and(|a| a <= 5.0)
        && holders > 0
        && buys_5m as f64 / holders as f64 >= 3.5
    {
        fire(
            "abnormal_buys_per_holder",
            -3,
            format!(
                "Abnormal buys/holder ratio {:.1} (bot farm suspected)",
                buys_5m as f64 / holders as f64
            ),
        );
    }

    // --- GRADUATION RUG RULES ---

    let mut graduation_zone = false;
    if liq >= 150_000.0 && mcap > 0.0 && mcap / liq <= 2.0 && fresh {
        graduation_zone = true;
        fire(
            "graduation_rug_structural",
            -7,
            format!(
                "Graduation drain pattern: ${liq:.0} liq, ratio {:.1}x, age < 3m",
                mcap / liq
            ),
        );
    } else if liq >= 50_000.0
        && mcap > 0.0
        && mcap / liq <= 2.0
        && fresh
        && ctx.rugcheck_score.is_some_and(|rc| rc >= 5000)
    {
        fire(
            "graduation_rug_pattern",
            -5,
            format!("Graduation pool ${liq:.0} with scam-level rugcheck"),
        );
    }

    if ctx.holder_growth_pct.is_some_and(|g| g >= 500.0)
        && liq >= 20_000.0
        && age.is_some_and(|a| a < 2.0)
    {
        fire(
            "bot_holder_farming",
            -3,
            format!(
                "Holder farming: +{:.0}% growth on ${liq:.0} pool",
                ctx.holder_growth_pct.unwrap_or(0.0)
            ),
        );
    }

    if ctx.holder_growth_pct.is_some_and(|g| g >= 3000.0) && liq >= 100_000.0 && fresh {
        fire(
            "extreme_graduation_growth",
            -6,
            format!(
                "Extreme holder growth +{:.0}% on graduation pool",
                ctx.holder_growth_pct.unwrap_or(0.0)
            ),
        );
    }

    if ctx.holder_velocity.is_some_and(|v| v >= 200.0)
        && ctx.rugcheck_score.is_some_and(|rc| rc >= 3000)
        && liq < 30_000.0
    {
        fire(
            "velocity_danger_compound",
            -6,
            "High holder velocity + dangerous rugcheck on micro pool".into(),
        );
    }

    if holder_concentration_risk(security, ctx) {
        fire(
            "holder_concentration_danger",
            -4,
            "Extreme rugcheck with holder/ownership concentration risk".into(),
        );
    }

    // Fake liquidity trap: a big pool on a fresh token without proportional
    // trade volume is staged, not organic.
    if strong_liquidity && fresh && vol_5m_check > 0.0 && vol_5m_check / liq < 0.5 {
        fire(
            "fake_liquidity_trap",
            -5,
            format!("${liq:.0} liq but 5m vol/liq only {:.2}x", vol_5m_check / liq),
        );
    }

    // --- TOTALS, CAPS, CLASSIFICATION ---

    let mut bullish: i32 = fired.iter().filter(|r| r.weight > 0).map(|r| r.weight).sum();
    let bearish: i32 = fired
        .iter()
        .filter(|r| r.weight < 0)
        .map(|r| r.weight)
        .sum::<i32>()
        .abs();

    // Bot farms stack velocity rules on micro pools; cap the upside there.
    if liq > 0.0 && liq < 20_000.0 && bullish > 8 {
        bullish = 8;
        fired.push(SignalRule {
            name: "low_liq_velocity_cap",
            weight: 0,
            description: "Bullish capped at 8 on sub-$20K liquidity".into(),
        });
    }

    let mut net = bullish - bearish;

    if graduation_zone {
        net = net.min(2);
    }
    if copycat_single {
        net = net.min(4);
    }

    SignalResult {
        rules_fired: fired,
        bullish_score: bullish,
        bearish_score: bearish,
        net_score: net,
        action: classify(net),
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot() -> SnapshotView {
        SnapshotView {
            liquidity_usd: Some(dec!(50000)),
            holders_count: Some(100),
            volume_1h: Some(dec!(30000)),
            score: Some(55),
            ..Default::default()
        }
    }

    fn security() -> SecurityView {
        SecurityView {
            is_honeypot: Some(false),
            is_mintable: Some(false),
            lp_burned: Some(true),
            lp_locked: Some(false),
            contract_renounced: Some(true),
            sell_tax: Some(dec!(0)),
            top10_holders_pct: Some(dec!(20)),
            ..Default::default()
        }
    }

    fn eval(snap: &SnapshotView, sec: Option<&SecurityView>, ctx: &SignalContext) -> SignalResult {
        evaluate_signals(snap, sec, None, None, ctx)
    }

    // --- HG1: low liquidity gate ---

    #[test]
    fn liq_3k_hard_blocked() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(3000)),
            ..snapshot()
        };
        let result = eval(&snap, Some(&security()), &SignalContext::default());
        assert_eq!(result.action, SignalAction::Avoid);
        assert_eq!(result.net_score, -10);
        assert!(result.fired("low_liquidity_gate"));
        assert_eq!(result.rules_fired.len(), 1);
    }

    #[test]
    fn liq_4999_blocked_5000_passes() {
        let blocked = SnapshotView {
            liquidity_usd: Some(dec!(4999)),
            score: Some(70),
            ..snapshot()
        };
        let result = eval(&blocked, Some(&security()), &SignalContext::default());
        assert!(result.fired("low_liquidity_gate"));

        let passes = SnapshotView {
            liquidity_usd: Some(dec!(5000)),
            ..snapshot()
        };
        let result = eval(&passes, Some(&security()), &SignalContext::default());
        assert!(!result.fired("low_liquidity_gate"));
        assert!(result.fired("very_low_liquidity"));
    }

    #[test]
    fn liq_zero_passes_gate() {
        let snap = SnapshotView {
            liquidity_usd: None,
            dex_liquidity_usd: None,
            ..snapshot()
        };
        let result = eval(&snap, Some(&security()), &SignalContext::default());
        assert!(!result.fired("low_liquidity_gate"));
    }

    #[test]
    fn dex_liq_fallback_blocked() {
        let snap = SnapshotView {
            liquidity_usd: None,
            dex_liquidity_usd: Some(dec!(3000)),
            ..snapshot()
        };
        let result = eval(&snap, Some(&security()), &SignalContext::default());
        assert!(result.fired("low_liquidity_gate"));
    }

    #[test]
    fn high_score_still_blocked_under_5k() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(4000)),
            score: Some(70),
            smart_wallets_count: Some(5),
            buys_1h: Some(1000),
            sells_1h: Some(100),
            ..snapshot()
        };
        let ctx = SignalContext {
            holder_velocity: Some(100.0),
            ..Default::default()
        };
        let result = eval(&snap, Some(&security()), &ctx);
        assert_eq!(result.action, SignalAction::Avoid);
        assert_eq!(result.net_score, -10);
        assert!(result.fired("low_liquidity_gate"));
        assert!(!result.fired("high_score"));
        assert!(!result.fired("smart_money"));
    }

    // --- Soft liquidity penalties ---

    #[test]
    fn soft_penalty_bands() {
        let at = |liq: Decimal| {
            let snap = SnapshotView {
                liquidity_usd: Some(liq),
                ..snapshot()
            };
            eval(&snap, Some(&security()), &SignalContext::default())
        };
        assert!(at(dec!(15000)).fired("low_liquidity_soft"));
        assert!(!at(dec!(15000)).fired("low_liquidity_gate"));
        assert!(!at(dec!(20000)).fired("low_liquidity_soft"));
        assert!(!at(dec!(20000)).fired("very_low_liquidity"));
        assert!(at(dec!(5000)).fired("very_low_liquidity"));
    }

    // --- HG2: extreme mcap/liq ---

    #[test]
    fn mcap_liq_ratio_gate() {
        let at = |liq: Decimal, mcap: Decimal| {
            let snap = SnapshotView {
                liquidity_usd: Some(liq),
                market_cap: Some(mcap),
                ..snapshot()
            };
            eval(&snap, Some(&security()), &SignalContext::default())
        };
        // 12.5x → blocked
        let blocked = at(dec!(40000), dec!(500000));
        assert_eq!(blocked.action, SignalAction::Avoid);
        assert!(blocked.fired("extreme_mcap_liq_gate"));
        assert_eq!(blocked.net_score, -10);
        // 10x exactly → passes (> 10, not >=)
        assert!(!at(dec!(50000), dec!(500000)).fired("extreme_mcap_liq_gate"));
        // healthy 1x → passes
        assert!(!at(dec!(50000), dec!(50000)).fired("extreme_mcap_liq_gate"));
        // zero liq → skip ratio check
        assert!(!at(dec!(0), dec!(500000)).fired("extreme_mcap_liq_gate"));
        // zero mcap → passes
        assert!(!at(dec!(50000), dec!(0)).fired("extreme_mcap_liq_gate"));
    }

    #[test]
    fn liq_gate_checked_before_ratio_gate() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(2000)),
            market_cap: Some(dec!(800000)),
            ..snapshot()
        };
        let result = eval(&snap, Some(&security()), &SignalContext::default());
        assert!(result.fired("low_liquidity_gate"));
        assert!(!result.fired("extreme_mcap_liq_gate"));
    }

    // --- HG3: compound scam fingerprint ---

    #[test]
    fn three_scam_flags_hard_avoid() {
        let sec = SecurityView {
            lp_burned: Some(false),
            lp_locked: Some(false),
            is_mintable: Some(true),
            ..security()
        };
        let ctx = SignalContext {
            raydium_lp_burned: Some(false),
            bundled_buy_detected: true,
            ..Default::default()
        };
        let result = eval(&snapshot(), Some(&sec), &ctx);
        assert_eq!(result.action, SignalAction::Avoid);
        assert_eq!(result.net_score, -10);
        assert!(result.fired("compound_scam_fingerprint"));
        assert_eq!(result.rules_fired.len(), 1);
    }

    #[test]
    fn two_scam_flags_not_blocked() {
        let sec = SecurityView {
            lp_burned: Some(false),
            lp_locked: Some(false),
            is_mintable: Some(true),
            ..security()
        };
        let ctx = SignalContext {
            raydium_lp_burned: Some(false),
            ..Default::default()
        };
        let result = eval(&snapshot(), Some(&sec), &ctx);
        assert!(!result.fired("compound_scam_fingerprint"));
    }

    #[test]
    fn four_scam_flags_blocked() {
        let sec = SecurityView {
            lp_burned: Some(false),
            lp_locked: Some(false),
            is_mintable: Some(true),
            ..security()
        };
        let ctx = SignalContext {
            raydium_lp_burned: Some(false),
            pumpfun_dead_tokens: Some(5),
            fee_payer_sybil_score: Some(0.6),
            ..Default::default()
        };
        let result = eval(&snapshot(), Some(&sec), &ctx);
        assert_eq!(result.action, SignalAction::Avoid);
        assert!(result.fired("compound_scam_fingerprint"));
    }

    // --- HG4 + copycat cap ---

    #[test]
    fn copycat_serial_two_rugs_hard_avoid() {
        let snap = SnapshotView {
            score: Some(70),
            holders_count: Some(200),
            smart_wallets_count: Some(5),
            ..snapshot()
        };
        let ctx = SignalContext {
            copycat_rugged: true,
            copycat_rug_count: 2,
            ..Default::default()
        };
        let result = eval(&snap, Some(&security()), &ctx);
        assert_eq!(result.action, SignalAction::Avoid);
        assert_eq!(result.net_score, -10);
        assert!(result.fired("copycat_serial_scam"));
        assert_eq!(result.rules_fired.len(), 1);
    }

    #[test]
    fn copycat_single_rug_penalty_and_cap() {
        let snap = SnapshotView {
            score: Some(75),
            holders_count: Some(100),
            smart_wallets_count: Some(5),
            buys_5m: Some(80),
            buys_1h: Some(200),
            sells_1h: Some(30),
            volume_5m: Some(dec!(300000)),
            ..snapshot()
        };
        let ctx = SignalContext {
            copycat_rugged: true,
            copycat_rug_count: 1,
            token_age_minutes: Some(2.0),
            ..Default::default()
        };
        let result = eval(&snap, Some(&security()), &ctx);
        assert!(result.fired("copycat_rugged_symbol"));
        assert!(!result.fired("copycat_serial_scam"));
        assert_eq!(result.rule("copycat_rugged_symbol").unwrap().weight, -6);
        assert!(result.net_score <= 4);
        assert!(matches!(
            result.action,
            SignalAction::Watch | SignalAction::Avoid
        ));
    }

    #[test]
    fn copycat_count_zero_treated_as_single() {
        let ctx = SignalContext {
            copycat_rugged: true,
            copycat_rug_count: 0,
            ..Default::default()
        };
        let result = eval(&snapshot(), Some(&security()), &ctx);
        assert!(result.fired("copycat_rugged_symbol"));
        assert!(!result.fired("copycat_serial_scam"));
    }

    // --- Rugcheck tiers ---

    #[test]
    fn rugcheck_danger_tiers() {
        let at = |rc: i64| {
            let ctx = SignalContext {
                rugcheck_score: Some(rc),
                ..Default::default()
            };
            eval(&snapshot(), Some(&security()), &ctx)
        };
        assert_eq!(at(200).rule("rugcheck_danger").unwrap().weight, -2);
        assert_eq!(at(2999).rule("rugcheck_danger").unwrap().weight, -2);
        assert_eq!(at(3000).rule("rugcheck_danger").unwrap().weight, -4);
        assert_eq!(at(4999).rule("rugcheck_danger").unwrap().weight, -4);
        assert_eq!(at(5000).rule("rugcheck_danger").unwrap().weight, -5);
        assert_eq!(at(11500).rule("rugcheck_danger").unwrap().weight, -5);
        assert!(!eval(&snapshot(), Some(&security()), &SignalContext::default())
            .fired("rugcheck_danger"));
    }

    // --- Low holders ---

    #[test]
    fn low_holders_penalty_band() {
        let at = |holders: i64| {
            let snap = SnapshotView {
                holders_count: Some(holders),
                ..snapshot()
            };
            eval(&snap, Some(&security()), &SignalContext::default())
        };
        assert_eq!(at(3).rule("low_holders").unwrap().weight, -3);
        assert!(at(5).fired("low_holders"));
        assert!(at(1).fired("low_holders"));
        assert!(!at(6).fired("low_holders"));
        assert!(!at(0).fired("low_holders"));
    }

    // --- Unsecured LP fresh ---

    #[test]
    fn unsecured_lp_fresh_conditions() {
        let sec = SecurityView {
            lp_burned: Some(false),
            lp_locked: Some(false),
            ..security()
        };
        let fresh_few = SnapshotView {
            holders_count: Some(15),
            ..snapshot()
        };
        let ctx = SignalContext {
            raydium_lp_burned: Some(false),
            token_age_minutes: Some(3.0),
            ..Default::default()
        };
        let result = eval(&fresh_few, Some(&sec), &ctx);
        assert_eq!(result.rule("unsecured_lp_fresh").unwrap().weight, -3);

        // Too old
        let old_ctx = SignalContext {
            token_age_minutes: Some(15.0),
            ..ctx.clone()
        };
        assert!(!eval(&fresh_few, Some(&sec), &old_ctx).fired("unsecured_lp_fresh"));

        // Enough holders
        let many = SnapshotView {
            holders_count: Some(50),
            ..snapshot()
        };
        assert!(!eval(&many, Some(&sec), &ctx).fired("unsecured_lp_fresh"));

        // LP burned
        assert!(!eval(&fresh_few, Some(&security()), &ctx).fired("unsecured_lp_fresh"));
    }

    // --- Serial deployer tiers ---

    #[test]
    fn serial_deployer_tiers() {
        let at = |dead: i64| {
            let ctx = SignalContext {
                pumpfun_dead_tokens: Some(dead),
                ..Default::default()
            };
            eval(&snapshot(), Some(&security()), &ctx)
        };
        assert!(!at(1).fired("serial_deployer_mild"));
        assert!(!at(1).fired("serial_deployer"));
        assert_eq!(at(2).rule("serial_deployer_mild").unwrap().weight, -2);
        assert!(!at(2).fired("serial_deployer"));
        assert_eq!(at(3).rule("serial_deployer").unwrap().weight, -3);
        assert!(!at(3).fired("serial_deployer_mild"));
    }

    // --- Abnormal buys/holder ---

    #[test]
    fn abnormal_buys_per_holder_thresholds() {
        let at = |buys: i64, holders: i64, age: Option<f64>| {
            let snap = SnapshotView {
                holders_count: Some(holders),
                buys_5m: Some(buys),
                sells_5m: Some(10),
                ..snapshot()
            };
            let ctx = SignalContext {
                token_age_minutes: age,
                ..Default::default()
            };
            eval(&snap, Some(&security()), &ctx)
        };
        assert!(at(150, 30, Some(2.0)).fired("abnormal_buys_per_holder"));
        assert!(at(35, 10, Some(3.0)).fired("abnormal_buys_per_holder"));
        assert!(!at(34, 10, Some(3.0)).fired("abnormal_buys_per_holder"));
        assert!(!at(150, 30, Some(10.0)).fired("abnormal_buys_per_holder"));
        assert!(!at(150, 30, None).fired("abnormal_buys_per_holder"));
        assert!(!at(50, 0, Some(2.0)).fired("abnormal_buys_per_holder"));
    }

    // --- Graduation rug rules ---

    #[test]
    fn graduation_structural_fires_and_caps() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(174000)),
            market_cap: Some(dec!(261000)),
            holders_count: Some(200),
            buys_1h: Some(500),
            sells_1h: Some(50),
            score: Some(65),
            ..snapshot()
        };
        let ctx = SignalContext {
            token_age_minutes: Some(0.8),
            holder_velocity: Some(200.0),
            ..Default::default()
        };
        let result = eval(&snap, Some(&security()), &ctx);
        assert_eq!(result.rule("graduation_rug_structural").unwrap().weight, -7);
        assert!(result.net_score <= 2);
        assert!(matches!(
            result.action,
            SignalAction::Watch | SignalAction::Avoid
        ));
    }

    #[test]
    fn graduation_structural_guards() {
        let base_ctx = SignalContext {
            token_age_minutes: Some(0.8),
            ..Default::default()
        };
        // Low liq
        let low = SnapshotView {
            liquidity_usd: Some(dec!(14444)),
            market_cap: Some(dec!(8389)),
            ..snapshot()
        };
        assert!(!eval(&low, Some(&security()), &base_ctx).fired("graduation_rug_structural"));
        // Diverged ratio
        let diverged = SnapshotView {
            liquidity_usd: Some(dec!(174000)),
            market_cap: Some(dec!(500000)),
            ..snapshot()
        };
        assert!(!eval(&diverged, Some(&security()), &base_ctx).fired("graduation_rug_structural"));
        // Old token
        let big = SnapshotView {
            liquidity_usd: Some(dec!(174000)),
            market_cap: Some(dec!(261000)),
            ..snapshot()
        };
        let old_ctx = SignalContext {
            token_age_minutes: Some(4.0),
            ..Default::default()
        };
        assert!(!eval(&big, Some(&security()), &old_ctx).fired("graduation_rug_structural"));
    }

    #[test]
    fn graduation_pattern_elif_of_structural() {
        // $75K pool with scam-level rugcheck → pattern fires
        let medium = SnapshotView {
            liquidity_usd: Some(dec!(75000)),
            market_cap: Some(dec!(90000)),
            ..snapshot()
        };
        let ctx = SignalContext {
            rugcheck_score: Some(11500),
            token_age_minutes: Some(1.0),
            ..Default::default()
        };
        let result = eval(&medium, Some(&security()), &ctx);
        assert_eq!(result.rule("graduation_rug_pattern").unwrap().weight, -5);

        // Low rugcheck → no pattern
        let clean_ctx = SignalContext {
            rugcheck_score: Some(500),
            token_age_minutes: Some(1.0),
            ..Default::default()
        };
        assert!(!eval(&medium, Some(&security()), &clean_ctx).fired("graduation_rug_pattern"));

        // Structural preempts pattern
        let big = SnapshotView {
            liquidity_usd: Some(dec!(174000)),
            market_cap: Some(dec!(261000)),
            ..snapshot()
        };
        let big_ctx = SignalContext {
            rugcheck_score: Some(11500),
            token_age_minutes: Some(0.8),
            ..Default::default()
        };
        let result = eval(&big, Some(&security()), &big_ctx);
        assert!(result.fired("graduation_rug_structural"));
        assert!(!result.fired("graduation_rug_pattern"));
    }

    #[test]
    fn bot_holder_farming_conditions() {
        let at = |liq: Decimal, growth: f64, age: f64| {
            let snap = SnapshotView {
                liquidity_usd: Some(liq),
                market_cap: Some(liq * dec!(1.5)),
                ..snapshot()
            };
            let ctx = SignalContext {
                holder_growth_pct: Some(growth),
                token_age_minutes: Some(age),
                ..Default::default()
            };
            eval(&snap, Some(&security()), &ctx)
        };
        assert!(at(dec!(174000), 5100.0, 0.8).fired("bot_holder_farming"));
        assert!(at(dec!(50000), 600.0, 1.0).fired("bot_holder_farming"));
        assert!(!at(dec!(14000), 800.0, 1.0).fired("bot_holder_farming"));
        assert!(!at(dec!(174000), 300.0, 1.0).fired("bot_holder_farming"));
        assert!(!at(dec!(174000), 5000.0, 3.0).fired("bot_holder_farming"));
    }

    #[test]
    fn extreme_graduation_growth_conditions() {
        let at = |liq: Decimal, growth: f64, age: f64| {
            let snap = SnapshotView {
                liquidity_usd: Some(liq),
                market_cap: Some(liq * dec!(1.5)),
                ..snapshot()
            };
            let ctx = SignalContext {
                holder_growth_pct: Some(growth),
                token_age_minutes: Some(age),
                ..Default::default()
            };
            eval(&snap, Some(&security()), &ctx)
        };
        let hit = at(dec!(174000), 6650.0, 0.8);
        assert_eq!(hit.rule("extreme_graduation_growth").unwrap().weight, -6);
        assert!(at(dec!(214739), 9650.0, 0.8).fired("extreme_graduation_growth"));
        assert!(!at(dec!(13600), 2031.0, 0.8).fired("extreme_graduation_growth"));
        assert!(!at(dec!(174000), 2500.0, 0.8).fired("extreme_graduation_growth"));
        assert!(!at(dec!(174000), 6000.0, 4.0).fired("extreme_graduation_growth"));
    }

    // --- Velocity danger compound ---

    #[test]
    fn velocity_danger_compound_conditions() {
        let at = |liq: Decimal, velocity: f64, rc: i64| {
            let snap = SnapshotView {
                liquidity_usd: Some(liq),
                market_cap: Some(liq),
                ..snapshot()
            };
            let ctx = SignalContext {
                holder_velocity: Some(velocity),
                rugcheck_score: Some(rc),
                token_age_minutes: Some(1.0),
                ..Default::default()
            };
            eval(&snap, Some(&security()), &ctx)
        };
        assert_eq!(
            at(dec!(13000), 417.0, 3501)
                .rule("velocity_danger_compound")
                .unwrap()
                .weight,
            -6
        );
        assert!(at(dec!(29000), 200.0, 3000).fired("velocity_danger_compound"));
        assert!(!at(dec!(13000), 300.0, 2000).fired("velocity_danger_compound"));
        assert!(!at(dec!(50000), 400.0, 3500).fired("velocity_danger_compound"));
        assert!(!at(dec!(13000), 150.0, 3500).fired("velocity_danger_compound"));
        assert!(!at(dec!(14274), 194.0, 15357).fired("velocity_danger_compound"));
    }

    // --- Holder concentration danger ---

    #[test]
    fn holder_concentration_danger_conditions() {
        let at = |rc: i64, risks: &str| {
            let sec = SecurityView {
                rugcheck_risks: Some(risks.to_string()),
                ..security()
            };
            let snap = SnapshotView {
                liquidity_usd: Some(dec!(15000)),
                market_cap: Some(dec!(30000)),
                holders_count: Some(50),
                ..snapshot()
            };
            let ctx = SignalContext {
                rugcheck_score: Some(rc),
                ..Default::default()
            };
            eval(&snap, Some(&sec), &ctx)
        };
        let hit = at(21000, "Top 10 holders high ownership, Low Liquidity");
        assert_eq!(hit.rule("holder_concentration_danger").unwrap().weight, -4);
        // LP Unlocked exemption (the standard launchpad marker)
        assert!(!at(21000, "Large Amount of LP Unlocked, Top 10 holders high ownership")
            .fired("holder_concentration_danger"));
        // Below threshold
        assert!(!at(19999, "Top 10 holders high ownership").fired("holder_concentration_danger"));
        assert!(at(20000, "Top 10 holders high ownership").fired("holder_concentration_danger"));
        // No holder keywords
        assert!(!at(25000, "Low Liquidity, Mutable Metadata").fired("holder_concentration_danger"));
        // Case-insensitive
        assert!(at(22000, "TOP 10 HOLDERS HIGH OWNERSHIP").fired("holder_concentration_danger"));
        assert!(!at(22000, "lp unlocked, top 10 holders high ownership")
            .fired("holder_concentration_danger"));
    }

    // --- Low-liq velocity cap ---

    #[test]
    fn low_liq_velocity_cap_applies() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(15000)),
            market_cap: Some(dec!(9000)),
            holders_count: Some(80),
            volume_1h: Some(dec!(10000)),
            buys_5m: Some(80),
            sells_5m: Some(2),
            buys_1h: Some(80),
            sells_1h: Some(2),
            score: Some(50),
            ..Default::default()
        };
        let ctx = SignalContext {
            holder_velocity: Some(200.0),
            rugcheck_score: Some(11500),
            token_age_minutes: Some(0.5),
            holder_growth_pct: Some(200.0),
            ..Default::default()
        };
        let result = eval(&snap, Some(&security()), &ctx);
        assert!(result.bullish_score <= 8);
        assert!(result.fired("low_liq_velocity_cap"));
    }

    #[test]
    fn low_liq_velocity_cap_not_at_20k() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(20000)),
            market_cap: Some(dec!(15000)),
            holders_count: Some(80),
            volume_1h: Some(dec!(10000)),
            buys_5m: Some(80),
            sells_5m: Some(2),
            buys_1h: Some(80),
            sells_1h: Some(2),
            score: Some(50),
            ..Default::default()
        };
        let ctx = SignalContext {
            holder_velocity: Some(200.0),
            token_age_minutes: Some(0.5),
            holder_growth_pct: Some(200.0),
            ..Default::default()
        };
        let result = eval(&snap, Some(&security()), &ctx);
        assert!(!result.fired("low_liq_velocity_cap"));
    }

    // --- Fake liquidity trap ---

    #[test]
    fn fake_liquidity_trap_fires_without_volume() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(50000)),
            market_cap: Some(dec!(30000)),
            holders_count: Some(47),
            volume_1h: Some(dec!(6900)),
            volume_5m: Some(dec!(6900)),
            buys_5m: Some(40),
            sells_5m: Some(11),
            buys_1h: Some(40),
            sells_1h: Some(11),
            score: Some(45),
            ..Default::default()
        };
        let ctx = SignalContext {
            holder_velocity: Some(60.0),
            token_age_minutes: Some(0.4),
            holder_growth_pct: Some(57.0),
            ..Default::default()
        };
        let result = eval(&snap, Some(&security()), &ctx);
        assert_eq!(result.rule("fake_liquidity_trap").unwrap().weight, -5);
        assert!(result.fired("strong_liquidity"));
        assert!(!result.fired("fresh_volume_surge"));
    }

    #[test]
    fn fake_liquidity_trap_skips_with_volume() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(50000)),
            market_cap: Some(dec!(30000)),
            holders_count: Some(59),
            volume_1h: Some(dec!(50000)),
            volume_5m: Some(dec!(30000)),
            buys_5m: Some(86),
            sells_5m: Some(48),
            buys_1h: Some(86),
            sells_1h: Some(48),
            score: Some(50),
            ..Default::default()
        };
        let ctx = SignalContext {
            token_age_minutes: Some(0.4),
            ..Default::default()
        };
        let result = eval(&snap, Some(&security()), &ctx);
        assert!(!result.fired("fake_liquidity_trap"));
        assert!(result.fired("fresh_volume_surge"));
    }

    // --- Fast entry rules ---

    #[test]
    fn early_organic_momentum_conditions() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(12000)),
            market_cap: Some(dec!(15000)),
            holders_count: Some(25),
            buys_1h: Some(40),
            sells_1h: Some(10),
            score: Some(55),
            ..Default::default()
        };
        let fresh = SignalContext {
            token_age_minutes: Some(1.5),
            ..Default::default()
        };
        assert!(eval(&snap, Some(&security()), &fresh).fired("early_organic_momentum"));

        // Old token
        let old = SignalContext {
            token_age_minutes: Some(5.0),
            ..Default::default()
        };
        assert!(!eval(&snap, Some(&security()), &old).fired("early_organic_momentum"));

        // With a previous snapshot
        let prev = snapshot();
        let result = evaluate_signals(&snap, Some(&security()), None, Some(&prev), &fresh);
        assert!(!result.fired("early_organic_momentum"));

        // Pumped ratio
        let pumped = SnapshotView {
            market_cap: Some(dec!(60000)),
            liquidity_usd: Some(dec!(10000)),
            ..snap.clone()
        };
        assert!(!eval(&pumped, Some(&security()), &fresh).fired("early_organic_momentum"));

        // Few holders
        let few = SnapshotView {
            holders_count: Some(10),
            ..snap.clone()
        };
        assert!(!eval(&few, Some(&security()), &fresh).fired("early_organic_momentum"));

        // Extreme rugcheck blocks
        let risky = SignalContext {
            token_age_minutes: Some(1.5),
            rugcheck_score: Some(11500),
            ..Default::default()
        };
        assert!(!eval(&snap, Some(&security()), &risky).fired("early_organic_momentum"));
    }

    #[test]
    fn fresh_volume_surge_conditions() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(10000)),
            market_cap: Some(dec!(12000)),
            volume_5m: Some(dec!(8000)),
            score: Some(55),
            ..Default::default()
        };
        let fresh = SignalContext {
            token_age_minutes: Some(1.0),
            ..Default::default()
        };
        assert!(eval(&snap, Some(&security()), &fresh).fired("fresh_volume_surge"));

        let old = SignalContext {
            token_age_minutes: Some(5.0),
            ..Default::default()
        };
        assert!(!eval(&snap, Some(&security()), &old).fired("fresh_volume_surge"));

        let low_vol = SnapshotView {
            volume_5m: Some(dec!(3000)),
            ..snap.clone()
        };
        assert!(!eval(&low_vol, Some(&security()), &fresh).fired("fresh_volume_surge"));
    }

    // --- End-to-end scenarios ---

    #[test]
    fn honeypot_token_avoided() {
        let sec = SecurityView {
            is_honeypot: Some(true),
            ..security()
        };
        let result = eval(&snapshot(), Some(&sec), &SignalContext::default());
        assert!(result.fired("honeypot"));
        assert_eq!(result.action, SignalAction::Avoid);
    }

    #[test]
    fn clean_strong_buy_scenario() {
        let snap = SnapshotView {
            liquidity_usd: Some(dec!(60000)),
            holders_count: Some(300),
            volume_1h: Some(dec!(200000)),
            buys_1h: Some(100),
            sells_1h: Some(20),
            smart_wallets_count: Some(2),
            score: Some(65),
            ..Default::default()
        };
        let ctx = SignalContext {
            holder_velocity: Some(80.0),
            ..Default::default()
        };
        let result = eval(&snap, Some(&security()), &ctx);
        for name in [
            "high_score",
            "buy_pressure",
            "smart_money",
            "holder_velocity",
            "strong_liquidity",
            "volume_spike",
            "security_cleared",
        ] {
            assert!(result.fired(name), "expected {name} to fire");
        }
        assert!(result.net_score >= 8);
        assert_eq!(result.action, SignalAction::StrongBuy);
    }

    #[test]
    fn classification_boundaries() {
        assert_eq!(classify(8), SignalAction::StrongBuy);
        assert_eq!(classify(7), SignalAction::Buy);
        assert_eq!(classify(5), SignalAction::Buy);
        assert_eq!(classify(4), SignalAction::Watch);
        assert_eq!(classify(2), SignalAction::Watch);
        assert_eq!(classify(1), SignalAction::Avoid);
        assert_eq!(classify(-10), SignalAction::Avoid);
    }

    #[test]
    fn volume_dried_up_skips_young_tokens() {
        let snap = SnapshotView {
            volume_5m: Some(dec!(1000)),
            volume_1h: Some(dec!(20000)),
            ..snapshot()
        };
        let young = SignalContext {
            token_age_minutes: Some(10.0),
            ..Default::default()
        };
        assert!(!eval(&snap, Some(&security()), &young).fired("volume_dried_up"));

        let mature = SignalContext {
            token_age_minutes: Some(45.0),
            ..Default::default()
        };
        assert!(eval(&snap, Some(&security()), &mature).fired("volume_dried_up"));
    }

    #[test]
    fn sell_sim_api_error_does_not_fire() {
        use crate::providers::types::SellSimResult;
        let ctx = SignalContext {
            sell_sim: Some(SellSimResult {
                sellable: false,
                error: Some("HTTP 401".into()),
                api_error: true,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!eval(&snapshot(), Some(&security()), &ctx).fired("sell_sim_failed"));
    }
}
