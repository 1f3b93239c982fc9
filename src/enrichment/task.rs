// =============================================================================
// Enrichment task — one job in the persistent priority queue
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::enrichment::stage::EnrichmentStage;
use crate::providers::types::{MintInfo, SellSimResult};

/// Lower number = higher priority.
pub const PRIORITY_MIGRATION: u8 = 0;
pub const PRIORITY_NORMAL: u8 = 1;

/// Score weight of the priority tier.
pub const PRIORITY_WEIGHT: f64 = 1e12;
/// Score weight of the stage bucket (PRE_SCAN sorts behind everything else).
pub const STAGE_BUCKET_WEIGHT: f64 = 0.5e12;

/// A single enrichment job. Equality key for dedup is `(address, stage)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentTask {
    pub priority: u8,
    /// Absolute time (queue-clock seconds) when the task becomes ready.
    pub scheduled_at: f64,
    pub address: String,
    pub stage: EnrichmentStage,
    #[serde(default)]
    pub is_migration: bool,
    #[serde(default)]
    pub discovery_time: f64,
    #[serde(default)]
    pub last_score: Option<i64>,
    // PRE_SCAN results carried forward to INITIAL
    #[serde(default)]
    pub instant_rejected: bool,
    #[serde(default)]
    pub prescan_risk_boost: i32,
    #[serde(default)]
    pub prescan_mint_info: Option<MintInfo>,
    #[serde(default)]
    pub prescan_sell_sim: Option<SellSimResult>,
}

impl EnrichmentTask {
    pub fn new(address: impl Into<String>, stage: EnrichmentStage, scheduled_at: f64) -> Self {
        Self {
            priority: PRIORITY_NORMAL,
            scheduled_at,
            address: address.into(),
            stage,
            is_migration: false,
            discovery_time: 0.0,
            last_score: None,
            instant_rejected: false,
            prescan_risk_boost: 0,
            prescan_mint_info: None,
            prescan_sell_sim: None,
        }
    }

    /// Dedup key: one queue entry per `(address, stage)`.
    pub fn task_id(&self) -> String {
        format!("{}:{}", self.address, self.stage)
    }

    /// Combine priority, stage bucket, and scheduled time into one sortable
    /// score. Three-tier ordering:
    /// 1. Priority: migrations (0) sort before normal tasks (1).
    /// 2. Stage bucket: PRE_SCAN sorts behind every other stage. PRE_SCAN is
    ///    a high-volume cheap gate; pre-vetted tokens waiting for signal
    ///    generation must not starve behind the constant PRE_SCAN inflow.
    /// 3. Scheduled time: FIFO within the same bucket.
    pub fn sort_score(&self) -> f64 {
        self.priority as f64 * PRIORITY_WEIGHT
            + self.stage_bucket() as f64 * STAGE_BUCKET_WEIGHT
            + self.scheduled_at
    }

    pub fn stage_bucket(&self) -> u8 {
        u8::from(self.stage == EnrichmentStage::PreScan)
    }
}

/// Decompose a sort score back into `(priority, stage_bucket, scheduled_at)`.
pub fn decode_sort_score(score: f64) -> (u8, u8, f64) {
    let priority = (score / PRIORITY_WEIGHT).floor();
    let rem = score - priority * PRIORITY_WEIGHT;
    let bucket = (rem / STAGE_BUCKET_WEIGHT).floor();
    let scheduled_at = rem - bucket * STAGE_BUCKET_WEIGHT;
    (priority as u8, bucket as u8, scheduled_at)
}
