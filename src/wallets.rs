// =============================================================================
// Wallet registry — tracked wallets and copy-trading settings
// =============================================================================
//
// The admin surface mutates rarely; the copy trader reads on every event.
// Each write publishes a fresh immutable snapshot (Arc-swapped map) so
// readers always observe a consistent view without holding a lock across
// their whole callback.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::persistence::rows::TrackedWalletRow;

/// Global copy-trading switches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopySettings {
    pub paper_mode: bool,
    pub real_mode: bool,
    pub sell_mirror: bool,
}

impl Default for CopySettings {
    fn default() -> Self {
        Self {
            paper_mode: true,
            real_mode: false,
            sell_mirror: true,
        }
    }
}

/// Capability interface over the tracked-wallets map, consumed by both the
/// admin surface and the copy trader.
pub struct WalletRegistry {
    wallets: RwLock<Arc<HashMap<String, TrackedWalletRow>>>,
    settings: RwLock<CopySettings>,
}

impl WalletRegistry {
    pub fn new(initial: Vec<TrackedWalletRow>, settings: CopySettings) -> Self {
        let map: HashMap<String, TrackedWalletRow> = initial
            .into_iter()
            .map(|w| (w.address.clone(), w))
            .collect();
        Self {
            wallets: RwLock::new(Arc::new(map)),
            settings: RwLock::new(settings),
        }
    }

    /// Consistent point-in-time view of all tracked wallets.
    pub fn snapshot(&self) -> Arc<HashMap<String, TrackedWalletRow>> {
        self.wallets.read().clone()
    }

    pub fn get(&self, address: &str) -> Option<TrackedWalletRow> {
        self.wallets.read().get(address).cloned()
    }

    /// Insert or replace a wallet config, publishing a new snapshot.
    pub fn upsert(&self, wallet: TrackedWalletRow) {
        let mut guard = self.wallets.write();
        let mut next = (**guard).clone();
        next.insert(wallet.address.clone(), wallet);
        *guard = Arc::new(next);
    }

    /// Remove a wallet config. Returns whether it existed.
    pub fn remove(&self, address: &str) -> bool {
        let mut guard = self.wallets.write();
        let mut next = (**guard).clone();
        let existed = next.remove(address).is_some();
        *guard = Arc::new(next);
        existed
    }

    pub fn settings(&self) -> CopySettings {
        self.settings.read().clone()
    }

    pub fn set_settings(&self, settings: CopySettings) {
        *self.settings.write() = settings;
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(address: &str) -> TrackedWalletRow {
        TrackedWalletRow {
            address: address.into(),
            label: format!("label-{address}"),
            enabled: true,
            multiplier: 1.0,
            max_sol_per_trade: 0.05,
        }
    }

    #[test]
    fn snapshot_is_immutable_under_writes() {
        let registry = WalletRegistry::new(vec![wallet("W1")], CopySettings::default());
        let before = registry.snapshot();
        registry.upsert(wallet("W2"));
        // The old snapshot still sees one wallet; a fresh one sees two.
        assert_eq!(before.len(), 1);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn upsert_replaces_and_remove_deletes() {
        let registry = WalletRegistry::new(vec![], CopySettings::default());
        registry.upsert(wallet("W1"));
        let mut updated = wallet("W1");
        updated.enabled = false;
        registry.upsert(updated);
        assert!(!registry.get("W1").unwrap().enabled);
        assert!(registry.remove("W1"));
        assert!(!registry.remove("W1"));
        assert!(registry.get("W1").is_none());
    }

    #[test]
    fn settings_roundtrip() {
        let registry = WalletRegistry::new(vec![], CopySettings::default());
        assert!(registry.settings().paper_mode);
        registry.set_settings(CopySettings {
            paper_mode: false,
            real_mode: true,
            sell_mirror: false,
        });
        let s = registry.settings();
        assert!(!s.paper_mode);
        assert!(s.real_mode);
        assert!(!s.sell_mirror);
    }
}
