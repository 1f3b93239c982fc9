// =============================================================================
// Typed results returned by external data providers
// =============================================================================
//
// The pipeline consumes these plain records; the HTTP/RPC plumbing behind
// them is interchangeable. Provider failures are values (parse_error /
// api_error fields), never panics: an unreachable API must not read as a
// negative token signal.
// =============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parsed SPL / Token2022 mint account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MintInfo {
    #[serde(default)]
    pub supply: u64,
    #[serde(default)]
    pub decimals: u8,
    /// None = renounced.
    #[serde(default)]
    pub mint_authority: Option<String>,
    /// None = safe.
    #[serde(default)]
    pub freeze_authority: Option<String>,
    #[serde(default)]
    pub is_token2022: bool,
    #[serde(default)]
    pub extensions: Vec<u16>,
    #[serde(default)]
    pub dangerous_extensions: Vec<String>,
    #[serde(default)]
    pub risky_extensions: Vec<String>,
    #[serde(default)]
    pub parse_error: Option<String>,
}

impl MintInfo {
    pub fn mint_authority_active(&self) -> bool {
        self.mint_authority.is_some()
    }

    pub fn freeze_authority_active(&self) -> bool {
        self.freeze_authority.is_some()
    }

    pub fn has_dangerous_extensions(&self) -> bool {
        !self.dangerous_extensions.is_empty()
    }

    /// Risk score from mint properties alone (0-100).
    pub fn risk_score(&self) -> u8 {
        let mut score: u32 = 0;
        if self.mint_authority_active() {
            score += 20;
        }
        if self.freeze_authority_active() {
            score += 15;
        }
        score += 20 * self.dangerous_extensions.len() as u32;
        score += 10 * self.risky_extensions.len() as u32;
        score.min(100) as u8
    }
}

/// Result of simulating a sell via the swap-aggregator quote endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SellSimResult {
    #[serde(default)]
    pub sellable: bool,
    /// SOL output of the simulated sell.
    #[serde(default)]
    pub output_amount: Option<Decimal>,
    #[serde(default)]
    pub price_impact_pct: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    /// True when the API itself was unavailable (401/403/5xx/timeout).
    /// Must never be interpreted as a token problem.
    #[serde(default)]
    pub api_error: bool,
}

/// A swap quote from the aggregator.
#[derive(Debug, Clone)]
pub struct SwapQuote {
    pub input_amount: u64,
    pub output_amount: u64,
    pub price_impact_pct: Option<f64>,
}

/// Outcome of a real swap execution attempt.
#[derive(Debug, Clone, Default)]
pub struct SwapResult {
    pub success: bool,
    pub tx_hash: Option<String>,
    /// Raw input units (lamports for buys, token units for sells).
    pub input_amount: Option<Decimal>,
    /// Raw output units (token units for buys, lamports for sells).
    pub output_amount: Option<Decimal>,
    pub price_impact_pct: Option<f64>,
    pub fee_sol: Option<Decimal>,
    pub error: Option<String>,
    pub is_retryable: bool,
}

/// Market snapshot data from the primary token-info provider.
#[derive(Debug, Clone, Default)]
pub struct TokenInfoData {
    pub price: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub liquidity_usd: Option<Decimal>,
    pub volume_5m: Option<Decimal>,
    pub volume_1h: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub holders_count: Option<i64>,
    pub buys_5m: Option<i64>,
    pub sells_5m: Option<i64>,
    pub buys_1h: Option<i64>,
    pub sells_1h: Option<i64>,
    pub buys_24h: Option<i64>,
    pub sells_24h: Option<i64>,
    pub top10_holders_pct: Option<Decimal>,
    pub volatility_5m: Option<f64>,
    pub lp_removed_pct: Option<f64>,
}

/// Security record from the security provider.
#[derive(Debug, Clone, Default)]
pub struct SecurityData {
    pub is_mintable: Option<bool>,
    pub lp_burned: Option<bool>,
    pub lp_locked: Option<bool>,
    pub lp_lock_duration_days: Option<i64>,
    pub contract_renounced: Option<bool>,
    pub is_honeypot: Option<bool>,
    pub buy_tax: Option<Decimal>,
    pub sell_tax: Option<Decimal>,
    pub top10_holders_pct: Option<Decimal>,
    pub dev_holds_pct: Option<Decimal>,
    pub dev_token_balance: Option<Decimal>,
    pub rugcheck_score: Option<i64>,
    pub rugcheck_risks: Option<String>,
    pub bundled_buy_detected: Option<bool>,
    pub lp_burned_pct_raydium: Option<Decimal>,
}

/// One row of the top-holders listing.
#[derive(Debug, Clone)]
pub struct TopHolderRow {
    pub rank: i64,
    pub address: String,
    pub balance: Option<Decimal>,
    pub percentage: Option<Decimal>,
    pub pnl: Option<Decimal>,
}

/// Cross-validation data from the alternate DEX listing.
#[derive(Debug, Clone, Default)]
pub struct DexPairData {
    pub price: Option<Decimal>,
    pub liquidity_usd: Option<Decimal>,
    pub volume_5m: Option<Decimal>,
    pub volume_1h: Option<Decimal>,
    pub volume_24h: Option<Decimal>,
    pub fdv: Option<Decimal>,
}

/// Token metadata and social presence.
#[derive(Debug, Clone, Default)]
pub struct TokenMetadataData {
    pub website: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    /// Signed completeness score over the social links.
    pub metadata_score: Option<i32>,
    pub mutable: Option<bool>,
    pub has_homoglyphs: bool,
}

/// A native-SOL transfer inside a parsed wallet transaction.
#[derive(Debug, Clone, Default)]
pub struct NativeTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    /// Lamports.
    pub amount: u64,
}

/// An SPL token transfer inside a parsed wallet transaction.
#[derive(Debug, Clone, Default)]
pub struct SplTransfer {
    pub from_user_account: String,
    pub to_user_account: String,
    pub mint: String,
    pub token_amount: Decimal,
}

/// A parsed transaction from the wallet-event parse endpoint.
#[derive(Debug, Clone, Default)]
pub struct ParsedWalletTx {
    pub signature: String,
    pub tx_type: String,
    pub source: Option<String>,
    pub fee_payer: Option<String>,
    /// Lamports paid as the transaction fee.
    pub fee: u64,
    pub transaction_error: bool,
    pub timestamp: i64,
    pub native_transfers: Vec<NativeTransfer>,
    pub token_transfers: Vec<SplTransfer>,
}
