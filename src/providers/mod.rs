// =============================================================================
// Providers — seams to external data and execution services
// =============================================================================
//
// Each provider is specified by the function it exposes, not its protocol.
// Traders and the worker depend only on these traits so tests can inject
// fakes and implementations stay interchangeable.
// =============================================================================

pub mod jupiter;
pub mod market;
pub mod mint;
pub mod types;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

use types::{
    DexPairData, ParsedWalletTx, SecurityData, SwapResult, TokenInfoData, TokenMetadataData,
    TopHolderRow,
};

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Executes real swaps on chain. At-least-once semantics: callers dedupe.
#[async_trait]
pub trait SwapExecutor: Send + Sync {
    /// Swap `sol_lamports` of SOL into `mint`.
    async fn buy_token(
        &self,
        mint: &str,
        sol_lamports: u64,
        slippage_bps: Option<u32>,
    ) -> SwapResult;

    /// Swap `raw_amount` token units of `mint` back into SOL.
    async fn sell_token(
        &self,
        mint: &str,
        raw_amount: u64,
        slippage_bps: Option<u32>,
    ) -> SwapResult;
}

/// Read-only view of the trading wallet.
#[async_trait]
pub trait WalletBalance: Send + Sync {
    async fn get_sol_balance(&self) -> Result<Decimal>;

    /// Returns `(raw_amount, decimals)` for the wallet's holding of `mint`.
    async fn get_token_balance(&self, mint: &str) -> Result<(u64, u8)>;
}

/// Market, security, holder, and social data for the enrichment worker.
///
/// Every method swallows provider failures and returns "unknown": scoring
/// treats missing fields as neutral, and an unavailable API must never read
/// as a negative token signal.
#[async_trait]
pub trait TokenDataProvider: Send + Sync {
    async fn token_info(&self, mint: &str) -> Option<TokenInfoData>;
    async fn security_info(&self, mint: &str) -> Option<SecurityData>;
    async fn top_holders(&self, mint: &str) -> Vec<TopHolderRow>;
    async fn dex_pair(&self, mint: &str) -> Option<DexPairData>;
    async fn smart_money_count(&self, mint: &str) -> Option<i64>;
    /// Candle-derived 5-minute volatility percent.
    async fn volatility_5m(&self, mint: &str) -> Option<f64>;
    async fn metadata(&self, mint: &str) -> Option<TokenMetadataData>;
    async fn sol_price_usd(&self) -> Option<f64>;
}

/// Parses a transaction signature into transfer flows. The wallet-event
/// detector observes at a shallow commitment; this endpoint needs a deeper
/// one, hence callers retry.
#[async_trait]
pub trait WalletTxParser: Send + Sync {
    async fn get_parsed_transaction(&self, signature: &str) -> Result<Option<ParsedWalletTx>>;
}
