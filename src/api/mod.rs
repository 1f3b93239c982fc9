// =============================================================================
// Admin API — status, portfolios, copy-trading management
// =============================================================================

pub mod rest;
