// =============================================================================
// Signal decay — downgrade stale signals by TTL
// =============================================================================
//
// Transition rules:
//   strong_buy → buy     (after strong_buy_ttl_hours)
//   buy        → watch   (after buy_ttl_hours)
//   watch      → expired (after watch_ttl_hours)
//
// TTLs run from updated_at so re-confirmed signals reset their clock. Each
// downgrade first expires any existing signal of the target status for the
// same token, inside the same transaction, so the partial unique index
// (token_id, status) over active statuses is never violated.
// =============================================================================

use anyhow::Result;
use chrono::{Duration, Utc};
use tracing::info;

use crate::persistence::Database;

/// TTLs for each downgrade step.
#[derive(Debug, Clone)]
pub struct DecayConfig {
    pub strong_buy_ttl_hours: i64,
    pub buy_ttl_hours: i64,
    pub watch_ttl_hours: i64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            strong_buy_ttl_hours: 4,
            buy_ttl_hours: 6,
            watch_ttl_hours: 12,
        }
    }
}

/// Downgrade signals past their TTL. Returns the total number downgraded.
pub fn decay_stale_signals(db: &Database, cfg: &DecayConfig) -> Result<usize> {
    let now = Utc::now();
    let mut total = 0;

    total += db.expire_then_downgrade(
        "strong_buy",
        "buy",
        now - Duration::hours(cfg.strong_buy_ttl_hours),
    )?;
    total += db.expire_then_downgrade("buy", "watch", now - Duration::hours(cfg.buy_ttl_hours))?;
    total += db.expire_then_downgrade(
        "watch",
        "expired",
        now - Duration::hours(cfg.watch_ttl_hours),
    )?;

    if total > 0 {
        info!(total, "signal decay: downgraded stale signals");
    }
    Ok(total)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::rows::{SignalRow, TokenRow};

    fn db_with_token() -> (Database, i64) {
        let db = Database::in_memory().unwrap();
        let token_id = db
            .upsert_token(&TokenRow {
                address: "MintDecay1".into(),
                chain: "sol".into(),
                ..Default::default()
            })
            .unwrap();
        (db, token_id)
    }

    fn signal(token_id: i64, status: &str) -> SignalRow {
        SignalRow {
            token_id,
            token_address: "MintDecay1".into(),
            status: status.into(),
            ..Default::default()
        }
    }

    #[test]
    fn fresh_signals_do_not_decay() {
        let (db, token_id) = db_with_token();
        db.record_signal(&signal(token_id, "strong_buy")).unwrap();
        let total = decay_stale_signals(&db, &DecayConfig::default()).unwrap();
        assert_eq!(total, 0);
        assert!(db.active_signal(token_id, "strong_buy").unwrap().is_some());
    }

    #[test]
    fn expired_ttl_cascades_one_step() {
        let (db, token_id) = db_with_token();
        db.record_signal(&signal(token_id, "strong_buy")).unwrap();
        // Zero TTLs make everything instantly stale; strong_buy drops to buy
        // in the first sweep, then buy drops to watch within the same sweep
        // because the downgrade refreshes are evaluated per transition.
        let cfg = DecayConfig {
            strong_buy_ttl_hours: 0,
            buy_ttl_hours: 48,
            watch_ttl_hours: 48,
        };
        let total = decay_stale_signals(&db, &cfg).unwrap();
        assert_eq!(total, 1);
        assert!(db.active_signal(token_id, "strong_buy").unwrap().is_none());
        assert!(db.active_signal(token_id, "buy").unwrap().is_some());
    }

    #[test]
    fn downgrade_expires_conflicting_target_row() {
        let (db, token_id) = db_with_token();
        db.record_signal(&signal(token_id, "strong_buy")).unwrap();
        db.record_signal(&signal(token_id, "buy")).unwrap();
        let cfg = DecayConfig {
            strong_buy_ttl_hours: 0,
            buy_ttl_hours: 48,
            watch_ttl_hours: 48,
        };
        decay_stale_signals(&db, &cfg).unwrap();
        // Exactly one active buy remains (the downgraded strong_buy), the
        // previous buy is expired, no unique violation occurred.
        assert!(db.active_signal(token_id, "buy").unwrap().is_some());
        assert!(db.active_signal(token_id, "strong_buy").unwrap().is_none());
    }
}
