// =============================================================================
// Discovery intake — token-launch events from the external feed
// =============================================================================
//
// The subscriber itself lives outside this service; it delivers one
// LaunchEvent per newly observed mint. Intake upserts the token record and
// schedules the PRE_SCAN stage five seconds out.
// =============================================================================

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::enrichment::queue::{queue_now, PersistentEnrichmentQueue};
use crate::enrichment::stage::EnrichmentStage;
use crate::enrichment::task::EnrichmentTask;
use crate::persistence::rows::TokenRow;
use crate::persistence::Database;

fn default_chain() -> String {
    "sol".to_string()
}

/// A token-launch event as delivered by the discovery feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchEvent {
    pub mint: String,
    #[serde(default = "default_chain")]
    pub chain: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub creator_address: Option<String>,
    #[serde(default)]
    pub initial_buy_sol: Option<Decimal>,
    #[serde(default)]
    pub initial_mcap_sol: Option<Decimal>,
    #[serde(default)]
    pub bonding_curve_key: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// Upsert the token and enqueue PRE_SCAN at +5s. Returns the token id.
pub async fn handle_launch_event(
    db: &Database,
    queue: &Arc<PersistentEnrichmentQueue>,
    event: &LaunchEvent,
) -> Result<i64> {
    let token_id = db.upsert_token(&TokenRow {
        address: event.mint.clone(),
        chain: event.chain.clone(),
        name: event.name.clone(),
        symbol: event.symbol.clone(),
        source: event.source.clone().or_else(|| Some("launch_feed".into())),
        creator_address: event.creator_address.clone(),
        initial_buy_sol: event.initial_buy_sol,
        initial_mcap_sol: event.initial_mcap_sol,
        bonding_curve_key: event.bonding_curve_key.clone(),
        ..Default::default()
    })?;

    let discovery_time = queue_now();
    let mut task = EnrichmentTask::new(
        event.mint.clone(),
        EnrichmentStage::PreScan,
        discovery_time + EnrichmentStage::PreScan.offset_sec() as f64,
    );
    task.discovery_time = discovery_time;
    // Dedup between discovery sources: a second sighting must not reset the
    // schedule.
    queue.put(task, false).await;

    info!(
        mint = %event.mint,
        symbol = event.symbol.as_deref().unwrap_or(""),
        "discovery: token enqueued for PRE_SCAN"
    );
    Ok(token_id)
}
