// =============================================================================
// Copycat ledger — per-symbol rug history behind the copycat rules
// =============================================================================
//
// Scammers relaunch the same ticker repeatedly. The ledger counts confirmed
// rugs per symbol; the evaluator penalises a single prior rug and
// hard-avoids serial offenders. Redis-backed so the history survives
// restarts, with an in-memory fallback.
// =============================================================================

use std::collections::HashMap;

use parking_lot::Mutex;
use redis::AsyncCommands;
use tracing::{debug, info};

const REDIS_KEY_RUGS: &str = "copycat:rugs";

pub struct CopycatLedger {
    redis: Option<redis::Client>,
    fallback: Mutex<HashMap<String, i64>>,
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

impl CopycatLedger {
    pub fn new(redis: Option<redis::Client>) -> Self {
        Self {
            redis,
            fallback: Mutex::new(HashMap::new()),
        }
    }

    /// Record a confirmed rug for a symbol. Returns the new count.
    pub async fn record_rug(&self, symbol: &str) -> i64 {
        let key = normalize(symbol);
        if key.is_empty() {
            return 0;
        }
        if let Some(client) = &self.redis {
            if let Ok(mut con) = client.get_async_connection().await {
                if let Ok(count) = con.hincr::<_, _, _, i64>(REDIS_KEY_RUGS, &key, 1).await {
                    info!(symbol = %key, count, "copycat: rug recorded");
                    return count;
                }
                debug!(symbol = %key, "copycat: redis unavailable, using fallback");
            }
        }
        let mut map = self.fallback.lock();
        let count = map.entry(key.clone()).or_insert(0);
        *count += 1;
        info!(symbol = %key, count = *count, "copycat: rug recorded");
        *count
    }

    /// How many times this symbol has rugged before.
    pub async fn rug_count(&self, symbol: &str) -> i64 {
        let key = normalize(symbol);
        if key.is_empty() {
            return 0;
        }
        if let Some(client) = &self.redis {
            if let Ok(mut con) = client.get_async_connection().await {
                if let Ok(count) = con
                    .hget::<_, _, Option<i64>>(REDIS_KEY_RUGS, &key)
                    .await
                {
                    return count.unwrap_or(0);
                }
            }
        }
        self.fallback.lock().get(&key).copied().unwrap_or(0)
    }
}
