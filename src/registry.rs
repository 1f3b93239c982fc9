// =============================================================================
// Service registry — constructor-injected dependencies, built once at init
// =============================================================================
//
// Everything the loops and the admin surface need hangs off one Registry
// built in main. No global singletons: subsystems receive Arcs explicitly.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::enrichment::PersistentEnrichmentQueue;
use crate::persistence::Database;
use crate::runtime_config::RuntimeConfig;
use crate::trading::{CopyTrader, PaperTrader, RealTrader};
use crate::wallets::WalletRegistry;

pub struct Registry {
    pub config: RwLock<RuntimeConfig>,
    pub db: Arc<Database>,
    pub queue: Arc<PersistentEnrichmentQueue>,
    pub paper: Arc<PaperTrader>,
    pub real: Option<Arc<RealTrader>>,
    pub copy: Option<Arc<CopyTrader>>,
    pub wallets: Arc<WalletRegistry>,
    started_at: Instant,
}

impl Registry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RuntimeConfig,
        db: Arc<Database>,
        queue: Arc<PersistentEnrichmentQueue>,
        paper: Arc<PaperTrader>,
        real: Option<Arc<RealTrader>>,
        copy: Option<Arc<CopyTrader>>,
        wallets: Arc<WalletRegistry>,
    ) -> Self {
        Self {
            config: RwLock::new(config),
            db,
            queue,
            paper,
            real,
            copy,
            wallets,
            started_at: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
