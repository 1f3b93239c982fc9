// =============================================================================
// Scoring model v2 — balanced
// =============================================================================
//
// Weighs liquidity and holder count more heavily than v3; security is an
// additive block rather than a gate. Runs alongside v3 on every snapshot for
// A/B comparison against realised outcomes.
// =============================================================================

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::scoring::context::SignalContext;
use crate::scoring::v3::{
    bonding_curve_bonus, buy_tax_penalty, launchpad_adjustment, lp_lock_bonus,
    lp_removal_penalty,
};
use crate::scoring::views::{CreatorView, SecurityView, SnapshotView};

/// Compute the balanced 0-100 score. 0 is reserved for hard disqualifiers.
pub fn compute_score_v2(
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

    let mut score: i32 = 0;
    let holders = snapshot.holders_count.unwrap_or(0);

    // --- Liquidity (0-20) ---
    if liquidity >= 50_000.0 {
        score += 20;
    } else if liquidity >= 10_000.0 {
        score += 15;
    } else if liquidity >= 5_000.0 {
        score += 8;
    } else if liquidity > 0.0 {
        score += 3;
    }

    // --- Holders (0-15) ---
    if holders >= 300 {
        score += 15;
    } else if holders >= 100 {
        score += 12;
    } else if holders >= 50 {
        score += 8;
    } else if holders >= 20 {
        score += 4;
    }

    // --- Volume/liquidity ratio (0-25) ---
    if let Some(volume) = snapshot.best_volume() {
        if liquidity > 0.0 {
            let ratio = volume / liquidity;
            if ratio >= 5.0 {
                score += 25;
            } else if ratio >= 2.0 {
                score += 18;
            } else if ratio >= 1.0 {
                score += 12;
            } else if ratio >= 0.5 {
                score += 6;
            }
        }
    }

    // --- Smart money: +5 per wallet, capped at +15 ---
    let sm = snapshot.smart_wallets_count.unwrap_or(0);
    score += (sm.min(3) * 5) as i32;

    // --- Holder velocity (0-10) ---
    if let Some(velocity) = ctx.holder_velocity {
        if velocity >= 100.0 {
            score += 10;
        } else if velocity >= 50.0 {
            score += 7;
        } else if velocity >= 20.0 {
            score += 3;
        }
    }

    // --- Security (additive) ---
    if let Some(sec) = security {
        if sec.lp_burned == Some(true) || sec.lp_locked == Some(true) {
            score += 6;
        }
        if sec.contract_renounced == Some(true) {
            score += 4;
        }
        if sec
            .top10_holders_pct
            .is_some_and(|p| p < Decimal::from(25))
        {
            score += 3;
        }
        if sec
            .sell_tax
            .and_then(|t| t.to_f64())
            .is_some_and(|t| t <= 5.0)
        {
            score += 2;
        }
        if sec.is_mintable == Some(true) {
            score -= 15;
        }
        if sec.sell_tax.is_some_and(|t| t > Decimal::from(10)) {
            score -= 10;
        }
    }

    // --- Creator risk ---
    if let Some(risk) = creator.and_then(|c| c.risk_score) {
        if risk >= 80 {
            score -= 20;
        } else if risk >= 60 {
            score -= 12;
        } else if risk >= 40 {
            score -= 5;
        }
    }

    // --- Whale dynamics ---
    score += ctx.whale_score_impact;

    // Shared tails with v3
    score += lp_lock_bonus(security);
    score += buy_tax_penalty(security);
    score += bonding_curve_bonus(ctx.bonding_curve_pct);
    score += launchpad_adjustment(ctx);
    score += lp_removal_penalty(ctx.lp_removed_pct);

    // --- Data completeness cap ---
    if snapshot.data_points(security.is_some()) < 3 {
        score = score.min(40);
    }

    score.clamp(0, 100) as u8
}
