// =============================================================================
// Scoring — pure 0-100 quality scores over enriched snapshots
// =============================================================================

pub mod context;
pub mod v2;
pub mod v3;
pub mod views;

pub use context::SignalContext;
pub use v2::compute_score_v2;
pub use v3::compute_score_v3;
pub use views::{CreatorView, SecurityView, SnapshotView};
