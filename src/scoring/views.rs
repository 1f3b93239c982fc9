// =============================================================================
// Plain-data views consumed by the pure scoring and signal functions
// =============================================================================
//
// Scorers never touch storage rows or database handles: the worker builds
// these views from whatever the current stage fetched, and the pure functions
// tolerate any missing field.
// =============================================================================

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Point-in-time observation of a token, as seen by scoring/signals.
#[derive(Debug, Clone, Default)]
pub struct SnapshotView {
    pub price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub liquidity_usd: Option<Decimal>,
    pub volume_5m: Option<Decimal>,
    pub volume_1h: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub holders_count: Option<i64>,
    pub top10_holders_pct: Option<Decimal>,
    pub smart_wallets_count: Option<i64>,
    pub buys_5m: Option<i64>,
    pub sells_5m: Option<i64>,
    pub buys_1h: Option<i64>,
    pub sells_1h: Option<i64>,
    pub buys_24h: Option<i64>,
    pub sells_24h: Option<i64>,
    /// Cross-validation price/liquidity from the alternate DEX listing.
    pub dex_price: Option<Decimal>,
    pub dex_liquidity_usd: Option<Decimal>,
    pub dex_volume_5m: Option<Decimal>,
    pub dex_volume_1h: Option<Decimal>,
    pub dex_volume_24h: Option<Decimal>,
    /// Composite score already computed for this snapshot (signal input).
    pub score: Option<i64>,
}

impl SnapshotView {
    /// Primary liquidity with alternate-DEX fallback, as f64.
    pub fn best_liquidity(&self) -> Option<f64> {
        self.liquidity_usd
            .or(self.dex_liquidity_usd)
            .and_then(|d| d.to_f64())
    }

    /// Best available volume metric, preferring the 1h window.
    pub fn best_volume(&self) -> Option<f64> {
        for v in [self.volume_1h, self.volume_5m, self.volume_24h] {
            if let Some(v) = v {
                return v.to_f64();
            }
        }
        for v in [self.dex_volume_1h, self.dex_volume_5m, self.dex_volume_24h] {
            if let Some(v) = v {
                return v.to_f64();
            }
        }
        None
    }

    /// Buy/sell ratio from trade counts, preferring the 1h window.
    pub fn buy_sell_ratio(&self) -> Option<f64> {
        for (buys, sells) in [(self.buys_1h, self.sells_1h), (self.buys_5m, self.sells_5m)] {
            if let (Some(b), Some(s)) = (buys, sells) {
                if s > 0 {
                    return Some(b as f64 / s as f64);
                }
            }
        }
        None
    }

    pub fn vol_5m(&self) -> f64 {
        self.volume_5m
            .or(self.dex_volume_5m)
            .and_then(|d| d.to_f64())
            .unwrap_or(0.0)
    }

    pub fn vol_1h(&self) -> f64 {
        self.volume_1h
            .or(self.dex_volume_1h)
            .and_then(|d| d.to_f64())
            .unwrap_or(0.0)
    }

    /// Count of available data categories, for the completeness cap.
    pub fn data_points(&self, has_security: bool) -> usize {
        [
            self.liquidity_usd.is_some() || self.dex_liquidity_usd.is_some(),
            self.holders_count.is_some(),
            self.volume_1h.is_some() || self.dex_volume_1h.is_some(),
            has_security,
            self.smart_wallets_count.is_some(),
            self.top10_holders_pct.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}

/// Security record view.
#[derive(Debug, Clone, Default)]
pub struct SecurityView {
    pub is_mintable: Option<bool>,
    pub lp_burned: Option<bool>,
    pub lp_locked: Option<bool>,
    pub lp_lock_duration_days: Option<i64>,
    pub contract_renounced: Option<bool>,
    pub is_honeypot: Option<bool>,
    pub buy_tax: Option<Decimal>,
    pub sell_tax: Option<Decimal>,
    pub top10_holders_pct: Option<Decimal>,
    pub rugcheck_score: Option<i64>,
    pub rugcheck_risks: Option<String>,
}

/// Creator profile view.
#[derive(Debug, Clone, Default)]
pub struct CreatorView {
    pub risk_score: Option<i64>,
    pub rugged_count: i64,
    pub total_launches: i64,
}
