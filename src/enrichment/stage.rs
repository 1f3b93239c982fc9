// =============================================================================
// Enrichment stages — fixed schedule of offsets and fetch plans
// =============================================================================
//
// Twelve stages from +5s to +24h. Dense coverage in the first hour for pump
// detection, sparse tail for outcome tracking. Each stage names what to
// fetch and whether to prune low-scoring tokens afterwards.
// =============================================================================

use serde::{Deserialize, Serialize};

/// A step in a token's enrichment lifetime, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EnrichmentStage {
    PreScan,
    Initial,
    Min2,
    Min5,
    Min10,
    Min15,
    Min30,
    Hour1,
    Hour2,
    Hour4,
    Hour8,
    Hour24,
}

/// What to fetch and whether to prune at a given stage.
#[derive(Debug, Clone, Copy)]
pub struct StageConfig {
    pub offset_sec: u64,
    pub fetch_info: bool,
    pub fetch_security: bool,
    pub fetch_top_holders: bool,
    pub fetch_dex: bool,
    pub check_smart_money: bool,
    pub fetch_ohlcv: bool,
    pub fetch_trades: bool,
    pub fetch_metadata: bool,
    pub prune_below_score: Option<i64>,
    pub run_prescan: bool,
}

const fn base_config(offset_sec: u64) -> StageConfig {
    StageConfig {
        offset_sec,
        fetch_info: false,
        fetch_security: false,
        fetch_top_holders: false,
        fetch_dex: false,
        check_smart_money: false,
        fetch_ohlcv: false,
        fetch_trades: false,
        fetch_metadata: false,
        prune_below_score: None,
        run_prescan: false,
    }
}

impl EnrichmentStage {
    pub const ALL: [EnrichmentStage; 12] = [
        Self::PreScan,
        Self::Initial,
        Self::Min2,
        Self::Min5,
        Self::Min10,
        Self::Min15,
        Self::Min30,
        Self::Hour1,
        Self::Hour2,
        Self::Hour4,
        Self::Hour8,
        Self::Hour24,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreScan => "PRE_SCAN",
            Self::Initial => "INITIAL",
            Self::Min2 => "MIN_2",
            Self::Min5 => "MIN_5",
            Self::Min10 => "MIN_10",
            Self::Min15 => "MIN_15",
            Self::Min30 => "MIN_30",
            Self::Hour1 => "HOUR_1",
            Self::Hour2 => "HOUR_2",
            Self::Hour4 => "HOUR_4",
            Self::Hour8 => "HOUR_8",
            Self::Hour24 => "HOUR_24",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|stage| stage.as_str() == s)
    }

    /// The stage that follows this one; `None` after HOUR_24.
    pub fn next(&self) -> Option<Self> {
        let idx = Self::ALL.iter().position(|s| s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    /// Offset from discovery time, in seconds.
    pub fn offset_sec(&self) -> u64 {
        self.config().offset_sec
    }

    /// Fetch plan and prune threshold for this stage.
    pub fn config(&self) -> StageConfig {
        match self {
            // +5s — instant reject of obvious scams via mint parse + sell sim
            Self::PreScan => StageConfig {
                run_prescan: true,
                ..base_config(5)
            },
            // +8s — full baseline
            Self::Initial => StageConfig {
                fetch_info: true,
                fetch_security: true,
                fetch_top_holders: true,
                check_smart_money: true,
                fetch_metadata: true,
                ..base_config(8)
            },
            // +15s — quick cross-checked price for fast re-score
            Self::Min2 => StageConfig {
                fetch_info: true,
                fetch_dex: true,
                ..base_config(15)
            },
            // +5m — holder shift, prune low scores
            Self::Min5 => StageConfig {
                fetch_top_holders: true,
                fetch_dex: true,
                check_smart_money: true,
                fetch_trades: true,
                fetch_ohlcv: true,
                prune_below_score: Some(20),
                ..base_config(5 * 60)
            },
            // +10m — price trajectory
            Self::Min10 => StageConfig {
                fetch_dex: true,
                ..base_config(10 * 60)
            },
            // +15m — deep check, prune
            Self::Min15 => StageConfig {
                fetch_info: true,
                fetch_top_holders: true,
                check_smart_money: true,
                fetch_ohlcv: true,
                fetch_trades: true,
                prune_below_score: Some(25),
                ..base_config(15 * 60)
            },
            // +30m — security re-check
            Self::Min30 => StageConfig {
                fetch_info: true,
                fetch_security: true,
                ..base_config(30 * 60)
            },
            // +1h — holder behaviour
            Self::Hour1 => StageConfig {
                fetch_top_holders: true,
                fetch_dex: true,
                check_smart_money: true,
                fetch_ohlcv: true,
                fetch_trades: true,
                ..base_config(60 * 60)
            },
            // +2h — cross-validation
            Self::Hour2 => StageConfig {
                fetch_dex: true,
                ..base_config(2 * 60 * 60)
            },
            // +4h — deep check
            Self::Hour4 => StageConfig {
                fetch_info: true,
                fetch_security: true,
                fetch_ohlcv: true,
                ..base_config(4 * 60 * 60)
            },
            // +8h — trajectory
            Self::Hour8 => StageConfig {
                fetch_dex: true,
                ..base_config(8 * 60 * 60)
            },
            // +24h — final assessment + outcome
            Self::Hour24 => StageConfig {
                fetch_info: true,
                fetch_security: true,
                ..base_config(24 * 60 * 60)
            },
        }
    }

    /// Maximum queue age before a pending task of this stage is purged.
    /// PRE_SCAN and INITIAL carry explicit limits; everything else ages out
    /// at three times its stage offset.
    pub fn staleness_limit_sec(&self) -> u64 {
        match self {
            Self::PreScan => 300,
            Self::Initial => 900,
            other => other.offset_sec() * 3,
        }
    }
}

impl std::fmt::Display for EnrichmentStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
