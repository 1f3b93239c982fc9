// =============================================================================
// Borealis — Main Entry Point
// =============================================================================
//
// Real-time discovery → enrichment → scoring → trading pipeline for newly
// launched Solana tokens. Starts in paper-only mode; real execution requires
// an explicit Live config plus a wired swap executor.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod alerts;
mod api;
mod discovery;
mod enrichment;
mod persistence;
mod providers;
mod registry;
mod runtime_config;
mod scoring;
mod signals;
mod trading;
mod types;
mod wallets;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::alerts::LogAlerts;
use crate::enrichment::worker::{EnrichmentWorker, WorkerDeps};
use crate::enrichment::PersistentEnrichmentQueue;
use crate::persistence::Database;
use crate::providers::jupiter::JupiterClient;
use crate::providers::market::{HttpMarketData, HttpTxParser};
use crate::providers::mint::RpcMintParser;
use crate::providers::jupiter::SellSimulator;
use crate::registry::Registry;
use crate::runtime_config::RuntimeConfig;
use crate::signals::copycat::CopycatLedger;
use crate::signals::decay::decay_stale_signals;
use crate::trading::{CopyTrader, PaperTrader, RealTrader};
use crate::types::TradingMode;
use crate::wallets::{CopySettings, WalletRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║              Borealis — Starting Up                      ║");
    info!("╚══════════════════════════════════════════════════════════╝");

    let config_path =
        std::env::var("BOREALIS_CONFIG").unwrap_or_else(|_| "runtime_config.json".into());
    let config = RuntimeConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        RuntimeConfig::default()
    });

    // ── 2. Storage & queue ───────────────────────────────────────────────
    let db_path = std::env::var("BOREALIS_DB").unwrap_or_else(|_| "borealis.db".into());
    let db = Arc::new(Database::open(&db_path)?);

    let redis_client = match std::env::var("REDIS_URL") {
        Ok(url) => match redis::Client::open(url.as_str()) {
            Ok(client) => {
                info!(url = %url, "redis configured for queue persistence");
                Some(client)
            }
            Err(e) => {
                warn!(error = %e, "invalid REDIS_URL, queue falls back to memory");
                None
            }
        },
        Err(_) => {
            warn!("REDIS_URL not set — queue will not survive restarts");
            None
        }
    };

    let queue = Arc::new(PersistentEnrichmentQueue::new(
        redis_client.clone(),
        config.queue_max_size,
    ));
    let (recovered, purged, migrated) = queue.recover().await;
    info!(recovered, purged, migrated, "queue recovery complete");

    // ── 3. Providers ─────────────────────────────────────────────────────
    let rpc_url = std::env::var("SOLANA_RPC_URL")
        .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into());
    let mint_rpc = Arc::new(RpcMintParser::new(&rpc_url)?);

    let jupiter = Arc::new(JupiterClient::new(
        std::env::var("JUPITER_API_KEY").ok().as_deref(),
    ));
    let market = Arc::new(HttpMarketData::new(jupiter.clone())?);

    // ── 4. Traders ───────────────────────────────────────────────────────
    let alerts = Arc::new(LogAlerts);
    let paper = Arc::new(PaperTrader::new(
        db.clone(),
        alerts.clone(),
        config.paper_trader_config(),
    ));

    // Real execution needs a swap executor wired against a signing wallet;
    // without one the Live mode request cannot be honoured.
    let real: Option<Arc<RealTrader>> = None;
    if config.trading_mode == TradingMode::Live {
        warn!("trading_mode=Live but no swap executor is configured — staying paper-only");
    }

    let wallet_rows = db.load_tracked_wallets().unwrap_or_default();
    info!(wallets = wallet_rows.len(), "tracked wallets loaded");
    let wallet_registry = Arc::new(WalletRegistry::new(wallet_rows, CopySettings::default()));

    let copy = match std::env::var("TX_PARSE_URL") {
        Ok(url) => {
            let parser = Arc::new(HttpTxParser::new(url)?);
            Some(Arc::new(CopyTrader::new(
                db.clone(),
                parser,
                wallet_registry.clone(),
                alerts.clone(),
                redis_client.clone(),
                config.copy_trader_config(),
            )))
        }
        Err(_) => {
            warn!("TX_PARSE_URL not set — copy trading disabled");
            None
        }
    };

    let copycat = Arc::new(CopycatLedger::new(redis_client.clone()));

    // ── 5. Registry ──────────────────────────────────────────────────────
    let registry = Arc::new(Registry::new(
        config.clone(),
        db.clone(),
        queue.clone(),
        paper.clone(),
        real.clone(),
        copy.clone(),
        wallet_registry.clone(),
    ));

    // ── 6. Worker pool ───────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut worker_handles = Vec::new();
    for worker_id in 0..config.worker_count {
        let worker = EnrichmentWorker::new(
            WorkerDeps {
                db: db.clone(),
                queue: queue.clone(),
                mint_rpc: mint_rpc.clone(),
                sell_sim: Some(jupiter.clone() as Arc<dyn SellSimulator>),
                data: market.clone(),
                paper: paper.clone(),
                real: real.clone(),
                copy: copy.clone(),
                copycat: copycat.clone(),
            },
            shutdown.clone(),
        );
        worker_handles.push(tokio::spawn(async move {
            worker.run(worker_id).await;
        }));
    }
    info!(count = config.worker_count, "enrichment workers launched");

    // ── 7. Stale-position sweep loop ─────────────────────────────────────
    {
        let paper = paper.clone();
        let real = real.clone();
        let copy = copy.clone();
        let interval_sec = config.sweep_interval_sec;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_sec));
            loop {
                interval.tick().await;
                if let Err(e) = paper.sweep_stale_positions() {
                    warn!(error = %e, "paper sweep failed");
                }
                if let Some(real) = &real {
                    if let Err(e) = real.sweep_stale_positions().await {
                        warn!(error = %e, "real sweep failed");
                    }
                }
                if let Some(copy) = &copy {
                    if let Err(e) = copy.sweep_stale_positions() {
                        warn!(error = %e, "copy sweep failed");
                    }
                }
            }
        });
    }

    // ── 8. Signal decay loop ─────────────────────────────────────────────
    {
        let db = db.clone();
        let decay_cfg = config.decay_config();
        let interval_sec = config.decay_interval_sec;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(interval_sec));
            loop {
                interval.tick().await;
                if let Err(e) = decay_stale_signals(&db, &decay_cfg) {
                    warn!(error = %e, "signal decay failed");
                }
            }
        });
    }

    // ── 9. API server ────────────────────────────────────────────────────
    let bind_addr =
        std::env::var("BOREALIS_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    {
        let registry = registry.clone();
        let bind_addr = bind_addr.clone();
        tokio::spawn(async move {
            let app = api::rest::router(registry);
            match tokio::net::TcpListener::bind(&bind_addr).await {
                Ok(listener) => {
                    info!(addr = %bind_addr, "API server listening");
                    if let Err(e) = axum::serve(listener, app).await {
                        error!(error = %e, "API server failed");
                    }
                }
                Err(e) => error!(addr = %bind_addr, error = %e, "failed to bind API server"),
            }
        });
    }

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 10. Graceful shutdown ────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received — draining workers");
    shutdown.store(true, Ordering::Relaxed);
    for handle in worker_handles {
        let _ = handle.await;
    }

    if let Err(e) = registry.config.read().save(&config_path) {
        error!(error = %e, "failed to save runtime config on shutdown");
    }

    info!("Borealis shut down complete.");
    Ok(())
}
