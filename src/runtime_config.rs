// =============================================================================
// Runtime Configuration — hot-reloadable pipeline settings with atomic save
// =============================================================================
//
// Central configuration hub for the Borealis pipeline. Every tunable lives
// here so the service can be reconfigured without a rebuild.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash. All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::signals::decay::DecayConfig;
use crate::trading::copy::CopyTraderConfig;
use crate::trading::paper::PaperTraderConfig;
use crate::trading::real::RealTraderConfig;
use crate::types::TradingMode;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_worker_count() -> usize {
    8
}

fn default_queue_max_size() -> usize {
    5000
}

fn default_sweep_interval_sec() -> u64 {
    300
}

fn default_decay_interval_sec() -> u64 {
    600
}

fn default_paper_sol_per_trade() -> f64 {
    0.5
}

fn default_paper_max_positions() -> i64 {
    10
}

fn default_take_profit_x() -> f64 {
    2.0
}

fn default_stop_loss_pct() -> f64 {
    -50.0
}

fn default_paper_timeout_hours() -> i64 {
    4
}

fn default_trailing_activation_x() -> f64 {
    1.5
}

fn default_trailing_drawdown_pct() -> f64 {
    20.0
}

fn default_liquidity_grace_sec() -> i64 {
    90
}

fn default_micro_snipe_sol() -> f64 {
    0.07
}

fn default_micro_snipe_max_positions() -> i64 {
    5
}

fn default_real_sol_per_trade() -> f64 {
    0.05
}

fn default_real_max_positions() -> i64 {
    3
}

fn default_real_max_exposure_sol() -> f64 {
    0.5
}

fn default_real_min_liquidity_usd() -> f64 {
    10_000.0
}

fn default_real_min_balance_sol() -> f64 {
    0.05
}

fn default_real_timeout_hours() -> i64 {
    8
}

fn default_circuit_threshold() -> u32 {
    3
}

fn default_circuit_cooldown_sec() -> u64 {
    1800
}

fn default_copy_take_profit_x() -> f64 {
    1.5
}

fn default_copy_trailing_activation_x() -> f64 {
    1.3
}

fn default_copy_trailing_drawdown_pct() -> f64 {
    15.0
}

fn default_copy_max_positions() -> i64 {
    20
}

fn default_copy_sol_per_trade() -> f64 {
    0.05
}

fn default_copy_min_sol() -> f64 {
    0.01
}

fn default_copy_dedup_ttl_sec() -> u64 {
    300
}

fn default_strong_buy_ttl_hours() -> i64 {
    4
}

fn default_buy_ttl_hours() -> i64 {
    6
}

fn default_watch_ttl_hours() -> i64 {
    12
}

// =============================================================================
// Parameter blocks
// =============================================================================

/// Paper trading tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperParams {
    #[serde(default = "default_paper_sol_per_trade")]
    pub sol_per_trade: f64,
    #[serde(default = "default_paper_max_positions")]
    pub max_positions: i64,
    #[serde(default = "default_take_profit_x")]
    pub take_profit_x: f64,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    #[serde(default = "default_paper_timeout_hours")]
    pub timeout_hours: i64,
    #[serde(default = "default_trailing_activation_x")]
    pub trailing_activation_x: f64,
    #[serde(default = "default_trailing_drawdown_pct")]
    pub trailing_drawdown_pct: f64,
    #[serde(default = "default_liquidity_grace_sec")]
    pub liquidity_grace_period_sec: i64,
    #[serde(default = "default_micro_snipe_sol")]
    pub micro_snipe_sol: f64,
    #[serde(default = "default_micro_snipe_max_positions")]
    pub micro_snipe_max_positions: i64,
}

impl Default for PaperParams {
    fn default() -> Self {
        serde_json::from_str("{}").expect("defaults")
    }
}

/// Real trading tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealParams {
    #[serde(default = "default_real_sol_per_trade")]
    pub sol_per_trade: f64,
    #[serde(default = "default_real_max_positions")]
    pub max_positions: i64,
    #[serde(default = "default_real_max_exposure_sol")]
    pub max_total_exposure_sol: f64,
    #[serde(default = "default_real_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
    #[serde(default = "default_real_min_balance_sol")]
    pub min_wallet_balance_sol: f64,
    #[serde(default = "default_take_profit_x")]
    pub take_profit_x: f64,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    #[serde(default = "default_real_timeout_hours")]
    pub timeout_hours: i64,
    #[serde(default = "default_circuit_threshold")]
    pub circuit_breaker_threshold: u32,
    #[serde(default = "default_circuit_cooldown_sec")]
    pub circuit_breaker_cooldown_sec: u64,
}

impl Default for RealParams {
    fn default() -> Self {
        serde_json::from_str("{}").expect("defaults")
    }
}

/// Copy trading tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyParams {
    #[serde(default = "default_copy_take_profit_x")]
    pub take_profit_x: f64,
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    #[serde(default = "default_real_timeout_hours")]
    pub timeout_hours: i64,
    #[serde(default = "default_copy_trailing_activation_x")]
    pub trailing_activation_x: f64,
    #[serde(default = "default_copy_trailing_drawdown_pct")]
    pub trailing_drawdown_pct: f64,
    #[serde(default = "default_copy_max_positions")]
    pub max_positions: i64,
    #[serde(default = "default_copy_sol_per_trade")]
    pub default_sol_per_trade: f64,
    #[serde(default = "default_copy_min_sol")]
    pub min_sol_amount: f64,
    #[serde(default = "default_copy_dedup_ttl_sec")]
    pub dedup_ttl_sec: u64,
}

impl Default for CopyParams {
    fn default() -> Self {
        serde_json::from_str("{}").expect("defaults")
    }
}

/// Signal decay TTLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayParams {
    #[serde(default = "default_strong_buy_ttl_hours")]
    pub strong_buy_ttl_hours: i64,
    #[serde(default = "default_buy_ttl_hours")]
    pub buy_ttl_hours: i64,
    #[serde(default = "default_watch_ttl_hours")]
    pub watch_ttl_hours: i64,
}

impl Default for DecayParams {
    fn default() -> Self {
        serde_json::from_str("{}").expect("defaults")
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration for the pipeline.
///
/// Every field has a serde default so that older JSON files missing new
/// fields still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// PaperOnly on startup for safety; Live requires an explicit config.
    #[serde(default)]
    pub trading_mode: TradingMode,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_queue_max_size")]
    pub queue_max_size: usize,

    /// Interval of the stale-position sweep loop.
    #[serde(default = "default_sweep_interval_sec")]
    pub sweep_interval_sec: u64,

    /// Interval of the signal decay loop.
    #[serde(default = "default_decay_interval_sec")]
    pub decay_interval_sec: u64,

    #[serde(default)]
    pub paper: PaperParams,

    #[serde(default)]
    pub real: RealParams,

    #[serde(default)]
    pub copy: CopyParams,

    #[serde(default)]
    pub decay: DecayParams,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        serde_json::from_str("{}").expect("defaults")
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`. A missing file is an
    /// error so the caller can fall back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;
        info!(path = %path.display(), trading_mode = %config.trading_mode, "runtime config loaded");
        Ok(config)
    }

    /// Persist the current configuration using an atomic write (tmp, then
    /// rename) so a crash mid-write cannot corrupt the file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).context("failed to serialise runtime config")?;
        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;
        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    pub fn paper_trader_config(&self) -> PaperTraderConfig {
        PaperTraderConfig {
            sol_per_trade: self.paper.sol_per_trade,
            max_positions: self.paper.max_positions,
            take_profit_x: self.paper.take_profit_x,
            stop_loss_pct: self.paper.stop_loss_pct,
            timeout_hours: self.paper.timeout_hours,
            trailing_activation_x: self.paper.trailing_activation_x,
            trailing_drawdown_pct: self.paper.trailing_drawdown_pct,
            liquidity_grace_period_sec: self.paper.liquidity_grace_period_sec,
            micro_snipe_sol: self.paper.micro_snipe_sol,
            micro_snipe_max_positions: self.paper.micro_snipe_max_positions,
        }
    }

    pub fn real_trader_config(&self) -> RealTraderConfig {
        RealTraderConfig {
            sol_per_trade: self.real.sol_per_trade,
            take_profit_x: self.real.take_profit_x,
            stop_loss_pct: self.real.stop_loss_pct,
            timeout_hours: self.real.timeout_hours,
        }
    }

    pub fn copy_trader_config(&self) -> CopyTraderConfig {
        CopyTraderConfig {
            take_profit_x: self.copy.take_profit_x,
            stop_loss_pct: self.copy.stop_loss_pct,
            timeout_hours: self.copy.timeout_hours,
            trailing_activation_x: self.copy.trailing_activation_x,
            trailing_drawdown_pct: self.copy.trailing_drawdown_pct,
            max_positions: self.copy.max_positions,
            default_sol_per_trade: self.copy.default_sol_per_trade,
            min_sol_amount: self.copy.min_sol_amount,
            dedup_ttl_sec: self.copy.dedup_ttl_sec,
            ..CopyTraderConfig::default()
        }
    }

    pub fn decay_config(&self) -> DecayConfig {
        DecayConfig {
            strong_buy_ttl_hours: self.decay.strong_buy_ttl_hours,
            buy_ttl_hours: self.decay.buy_ttl_hours,
            watch_ttl_hours: self.decay.watch_ttl_hours,
        }
    }
}
