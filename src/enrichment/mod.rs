// =============================================================================
// Enrichment — staged, persistent, priority-ordered token processing
// =============================================================================

pub mod queue;
pub mod stage;
pub mod task;
pub mod worker;

pub use queue::{queue_now, PersistentEnrichmentQueue};
pub use stage::EnrichmentStage;
pub use task::EnrichmentTask;
pub use worker::EnrichmentWorker;
