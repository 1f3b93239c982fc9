// =============================================================================
// Scoring model v3 — momentum-weighted
// =============================================================================
//
// Differs from v2 in how it weighs components: momentum (buy pressure,
// vol/liquidity, volume acceleration) and smart money carry more weight,
// security acts as a pass/fail gate rather than an additive block, and
// holder velocity is weighted more heavily.
//
// Pure function: no I/O, no clock, no randomness.
// =============================================================================

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::scoring::context::SignalContext;
use crate::scoring::views::{CreatorView, SecurityView, SnapshotView};

/// Compute the momentum-weighted 0-100 score. 0 is reserved for hard
/// disqualifiers (no liquidity data, honeypot, banned, extreme rugcheck,
/// single-holder ownership).
pub fn compute_score_v3(
    snapshot: &SnapshotView,
    security: Option<&SecurityView>,
    creator: Option<&CreatorView>,
    ctx: &SignalContext,
) -> u8 {
    let liquidity = match snapshot.best_liquidity() {
        Some(l) => l,
        None => return 0,
    };

    // Hard disqualifiers
    if security.and_then(|s| s.is_honeypot) == Some(true) {
        return 0;
    }
    if ctx.goplus_is_honeypot == Some(true) {
        return 0;
    }
    if ctx.jupiter_banned {
        return 0;
    }
    if ctx.rugcheck_score.is_some_and(|s| s >= 20_000) {
        return 0;
    }
    if let Some(sec) = security {
        if sec
            .rugcheck_risks
            .as_deref()
            .is_some_and(|r| r.to_lowercase().contains("single holder ownership"))
        {
            return 0;
        }
    }

    let mut score: i32 = 0;
    let holders = snapshot.holders_count.unwrap_or(0);

    // --- Liquidity gate (0-15) — threshold check with diminishing returns ---
    if liquidity >= 50_000.0 {
        score += 15;
    } else if liquidity >= 25_000.0 {
        score += 12;
    } else if liquidity >= 10_000.0 {
        score += 8;
    } else if liquidity >= 5_000.0 {
        score += 4;
    }

    // --- Momentum: buy pressure (0-15) ---
    let buy_ratio = snapshot.buy_sell_ratio();
    if let Some(ratio) = buy_ratio {
        if ratio >= 4.0 {
            score += 15;
        } else if ratio >= 2.5 {
            score += 12;
        } else if ratio >= 1.8 {
            score += 8;
        } else if ratio >= 1.3 {
            score += 4;
        }
    }

    // --- Momentum: volume/liquidity ratio (0-15) ---
    if let Some(volume) = snapshot.best_volume() {
        if liquidity > 0.0 {
            let ratio = volume / liquidity;
            if ratio >= 3.0 {
                score += 15;
            } else if ratio >= 1.5 {
                score += 12;
            } else if ratio >= 0.8 {
                score += 8;
            } else if ratio >= 0.3 {
                score += 4;
            }
        }
    }

    // --- Momentum: volume acceleration, 5m extrapolated vs 1h (0-5) ---
    // Skipped for young tokens where vol_1h ~ vol_5m and the ratio is
    // meaningless.
    let vol_5m = snapshot.vol_5m();
    let vol_1h = snapshot.vol_1h();
    if vol_5m > 0.0 && vol_1h > 100.0 && vol_1h > vol_5m * 3.0 {
        let accel = (vol_5m * 12.0) / vol_1h;
        if accel >= 2.0 {
            score += 5;
        } else if accel >= 1.5 {
            score += 3;
        }
    }

    // --- Smart money (0-20) — strongest single signal ---
    if let Some(weighted) = ctx.smart_money_weighted {
        if weighted >= 2.5 {
            score += 20;
        } else if weighted >= 1.5 {
            score += 14;
        } else if weighted >= 0.5 {
            score += 8;
        }
    } else {
        let sm = snapshot.smart_wallets_count.unwrap_or(0);
        if sm >= 3 {
            score += 20;
        } else if sm >= 2 {
            score += 14;
        } else if sm >= 1 {
            score += 8;
        }
    }

    // --- Holder velocity (0-15) ---
    if let Some(velocity) = ctx.holder_velocity {
        if velocity >= 100.0 {
            score += 15;
        } else if velocity >= 50.0 {
            score += 10;
        } else if velocity >= 25.0 {
            score += 6;
        } else if velocity >= 10.0 {
            score += 3;
        }
    }

    // --- Holders (0-10) — crowd validation ---
    if holders >= 300 {
        score += 10;
    } else if holders >= 150 {
        score += 7;
    } else if holders >= 50 {
        score += 4;
    }

    // --- Security gate (-30 to +10) ---
    if let Some(sec) = security {
        if sec.lp_burned == Some(true) || sec.lp_locked == Some(true) {
            score += 5;
        }
        if sec.contract_renounced == Some(true) {
            score += 3;
        }
        if sec
            .top10_holders_pct
            .is_some_and(|p| p < Decimal::from(25))
        {
            score += 2;
        }
        if sec.is_mintable == Some(true) {
            score -= 20;
        }
        if sec.sell_tax.is_some_and(|t| t > Decimal::from(10)) {
            score -= 10;
        }
    }

    // --- Creator risk (-15 max) ---
    if let Some(risk) = creator.and_then(|c| c.risk_score) {
        if risk >= 80 {
            score -= 15;
        } else if risk >= 60 {
            score -= 8;
        } else if risk >= 40 {
            score -= 3;
        }
    }

    // --- Whale dynamics (-10 to +8) ---
    score += ctx.whale_score_impact;

    score += lp_lock_bonus(security);
    score += buy_tax_penalty(security);
    score += bonding_curve_bonus(ctx.bonding_curve_pct);
    score += launchpad_adjustment(ctx);
    score += lp_removal_penalty(ctx.lp_removed_pct);

    // --- Dev holds (-20 to +3) ---
    if let Some(dev) = ctx.dev_holds_pct {
        if dev >= 80.0 {
            score -= 20;
        } else if dev >= 50.0 {
            score -= 10;
        } else if dev >= 30.0 {
            score -= 4;
        } else if dev < 5.0 {
            score += 3;
        }
    }

    // --- Volatility (-8 to +2) ---
    if let Some(vol) = ctx.volatility_5m {
        if vol >= 50.0 {
            score -= 8;
        } else if vol >= 25.0 {
            score -= 3;
        } else if vol < 3.0 {
            score += 2;
        }
    }

    // --- Rugcheck (-20 to +5) ---
    if let Some(rc) = ctx.rugcheck_score {
        if rc >= 50 {
            score -= 20;
        } else if rc >= 30 {
            score -= 10;
        } else if rc < 10 {
            score += 5;
        }
    }

    // --- 24h sustained interest (-5 to +3) ---
    if let (Some(b24), Some(s24)) = (snapshot.buys_24h, snapshot.sells_24h) {
        if s24 > 0 {
            let ratio_24h = b24 as f64 / s24 as f64;
            if ratio_24h >= 2.0 && buy_ratio.is_some_and(|r| r >= 2.0) {
                score += 3;
            } else if ratio_24h < 0.3 {
                score -= 5;
            }
        }
    }

    // --- PRE_SCAN risk boost (0 to -45) ---
    score -= ctx.mint_risk_boost;

    // --- Sell simulation failed (-25, harsher than v2) ---
    if ctx.sell_sim_failed() {
        score -= 25;
    }

    // --- Bundled buy (-12) ---
    if ctx.bundled_buy_detected {
        score -= 12;
    }

    // --- Serial deployer (-5 to -20, harsher than v2) ---
    if let Some(dead) = ctx.pumpfun_dead_tokens {
        if dead >= 10 {
            score -= 20;
        } else if dead >= 5 {
            score -= 12;
        } else if dead >= 3 {
            score -= 5;
        }
    }

    // --- Raydium LP verification (-3 to +3) ---
    if let Some(burned) = ctx.raydium_lp_burned {
        score += if burned { 3 } else { -3 };
    }

    // --- Fee payer sybil (-18 to -10) ---
    if let Some(sybil) = ctx.fee_payer_sybil_score {
        if sybil > 0.7 {
            score -= 18;
        } else if sybil > 0.5 {
            score -= 10;
        }
    }

    // --- Funding chain risk (0 to -15) ---
    if let Some(risk) = ctx.funding_chain_risk {
        if risk >= 80 {
            score -= 15;
        } else if risk >= 60 {
            score -= 8;
        } else if risk >= 40 {
            score -= 3;
        }
    }

    // --- Token convergence (-18) ---
    if ctx.convergence_detected {
        score -= 18;
    }

    // --- Metadata score (-3 to +4) ---
    if let Some(meta) = ctx.metadata_score {
        if meta >= 7 {
            score += 4;
        } else if meta >= 4 {
            score += 2;
        } else if meta <= -3 {
            score -= 3;
        }
    }

    // --- Wash trading (-12) ---
    if ctx.wash_trading_suspected {
        score -= 12;
    }

    // --- Rugcheck danger count (-15 to -6) ---
    if let Some(count) = ctx.rugcheck_danger_count {
        if count >= 3 {
            score -= 15;
        } else if count >= 2 {
            score -= 6;
        }
    }

    // --- Decentralization (-10 to +3) ---
    if let Some(dec) = ctx.bubblemaps_decentralization {
        if dec >= 0.7 {
            score += 3;
        } else if dec < 0.3 {
            score -= 10;
        } else if dec < 0.4 {
            score -= 5;
        }
    }

    // --- SolSniffer cross-validation (-6 to +3) ---
    if let Some(ss) = ctx.solsniffer_score {
        if ss >= 80 {
            score += 3;
        } else if ss < 30 {
            score -= 6;
        }
    }

    // --- Holder PnL (-3 to +2) ---
    if let Some(profit_pct) = ctx.holders_in_profit_pct {
        if profit_pct >= 60.0 {
            score += 2;
        } else if profit_pct <= 20.0 {
            score -= 3;
        }
    }

    // --- Social signals (0 to +9) ---
    if ctx.twitter_kol_mentions.is_some_and(|k| k >= 1) {
        score += 5;
    } else if ctx.twitter_mentions.is_some_and(|m| m >= 10) {
        score += 2;
    }
    if ctx.twitter_viral {
        score += 4;
    }

    // --- Holder growth velocity (-3 to +15) ---
    if let Some(growth) = ctx.holder_growth_pct {
        if growth >= 200.0 {
            score += 15;
        } else if growth >= 100.0 {
            score += 10;
        } else if growth >= 50.0 {
            score += 5;
        } else if growth <= -30.0 {
            score -= 3;
        }
    }

    // --- Website/domain (0 to +3) ---
    if ctx.has_website == Some(true) {
        if let Some(age) = ctx.domain_age_days {
            if age >= 30 {
                score += 3;
            } else if age >= 7 {
                score += 1;
            }
        }
    }

    // --- Telegram community (0 to +5) ---
    if let Some(members) = ctx.tg_member_count {
        if members >= 5000 {
            score += 5;
        } else if members >= 1000 {
            score += 3;
        } else if members >= 200 {
            score += 1;
        }
    }

    // --- LLM risk assessment (-5 to +3) ---
    if let Some(llm) = ctx.llm_risk_score {
        if llm >= 80 {
            score -= 5;
        } else if llm >= 50 {
            score -= 2;
        } else if llm <= 20 {
            score += 3;
        }
    }

    // --- Data completeness cap ---
    if snapshot.data_points(security.is_some()) < 3 {
        score = score.min(40);
    }

    score.clamp(0, 100) as u8
}

/// LP lock duration bonus (shared with v2).
pub(super) fn lp_lock_bonus(security: Option<&SecurityView>) -> i32 {
    match security.and_then(|s| s.lp_lock_duration_days) {
        Some(days) if days >= 365 => 5,
        Some(days) if days >= 90 => 3,
        Some(days) if days >= 30 => 1,
        _ => 0,
    }
}

/// Buy tax penalty (shared with v2).
pub(super) fn buy_tax_penalty(security: Option<&SecurityView>) -> i32 {
    match security.and_then(|s| s.buy_tax).and_then(|t| t.to_f64()) {
        Some(tax) if tax > 10.0 => -5,
        Some(tax) if tax > 5.0 => -2,
        _ => 0,
    }
}

/// Bonding-curve maturity bonus (shared with v2).
pub(super) fn bonding_curve_bonus(pct: Option<f64>) -> i32 {
    match pct {
        Some(p) if p >= 80.0 => 5,
        Some(p) if p >= 50.0 => 3,
        Some(p) if p >= 25.0 => 1,
        _ => 0,
    }
}

/// Launchpad reputation adjustment (shared with v2). A precomputed launchpad
/// score wins over the trusted-name lookup.
pub(super) fn launchpad_adjustment(ctx: &SignalContext) -> i32 {
    if let Some(score) = ctx.launchpad_score {
        return score;
    }
    match ctx.launchpad.as_deref() {
        Some(pad) => {
            let trusted = ["believe", "letsbonk", "boop"];
            if trusted.contains(&pad.to_lowercase().as_str()) {
                3
            } else {
                -2
            }
        }
        None => 0,
    }
}

/// LP removal penalty (shared with v2).
pub(super) fn lp_removal_penalty(pct: Option<f64>) -> i32 {
    match pct {
        Some(p) if p >= 50.0 => -25,
        Some(p) if p >= 30.0 => -15,
        Some(p) if p >= 20.0 => -8,
        _ => 0,
    }
}
