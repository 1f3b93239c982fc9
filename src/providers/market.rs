// =============================================================================
// HTTP market-data provider — token info and cross-DEX validation
// =============================================================================
//
// Thin client over a public pair-listing API plus the aggregator price
// endpoint. Holder, security, and social analysers are separate services;
// when they are not configured this provider simply reports "unknown" and
// the scorers degrade gracefully under the data-completeness cap.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use crate::providers::jupiter::JupiterClient;
use crate::providers::types::{
    DexPairData, NativeTransfer, ParsedWalletTx, SecurityData, SplTransfer, TokenInfoData,
    TokenMetadataData, TopHolderRow,
};
use crate::providers::{TokenDataProvider, WalletTxParser};

const DEX_PAIRS_URL: &str = "https://api.dexscreener.com/latest/dex/tokens";
const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

pub struct HttpMarketData {
    client: reqwest::Client,
    pairs_url: String,
    jupiter: Arc<JupiterClient>,
}

fn json_decimal(value: &serde_json::Value) -> Option<Decimal> {
    if let Some(s) = value.as_str() {
        return s.parse().ok();
    }
    value.as_f64().and_then(rust_decimal::prelude::FromPrimitive::from_f64)
}

impl HttpMarketData {
    pub fn new(jupiter: Arc<JupiterClient>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            pairs_url: DEX_PAIRS_URL.to_string(),
            jupiter,
        })
    }

    /// The most liquid pair listing for a mint, if indexed.
    async fn best_pair(&self, mint: &str) -> Option<serde_json::Value> {
        let url = format!("{}/{}", self.pairs_url, mint);
        let resp = self.client.get(&url).send().await.ok()?;
        if !resp.status().is_success() {
            debug!(mint, status = %resp.status(), "market: pair lookup failed");
            return None;
        }
        let body: serde_json::Value = resp.json().await.ok()?;
        let pairs = body.get("pairs")?.as_array()?;
        pairs
            .iter()
            .max_by(|a, b| {
                let liq_a = a
                    .pointer("/liquidity/usd")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0);
                let liq_b = b
                    .pointer("/liquidity/usd")
                    .and_then(|v| v.as_f64())
                    .unwrap_or(0.0);
                liq_a.partial_cmp(&liq_b).unwrap_or(std::cmp::Ordering::Equal)
            })
            .cloned()
    }
}

#[async_trait]
impl TokenDataProvider for HttpMarketData {
    async fn token_info(&self, mint: &str) -> Option<TokenInfoData> {
        let pair = self.best_pair(mint).await?;
        Some(TokenInfoData {
            price: pair.get("priceUsd").map(json_decimal).flatten(),
            market_cap: pair.get("marketCap").map(json_decimal).flatten(),
            liquidity_usd: pair.pointer("/liquidity/usd").map(json_decimal).flatten(),
            volume_5m: pair.pointer("/volume/m5").map(json_decimal).flatten(),
            volume_1h: pair.pointer("/volume/h1").map(json_decimal).flatten(),
            volume_24h: pair.pointer("/volume/h24").map(json_decimal).flatten(),
            buys_5m: pair.pointer("/txns/m5/buys").and_then(|v| v.as_i64()),
            sells_5m: pair.pointer("/txns/m5/sells").and_then(|v| v.as_i64()),
            buys_1h: pair.pointer("/txns/h1/buys").and_then(|v| v.as_i64()),
            sells_1h: pair.pointer("/txns/h1/sells").and_then(|v| v.as_i64()),
            buys_24h: pair.pointer("/txns/h24/buys").and_then(|v| v.as_i64()),
            sells_24h: pair.pointer("/txns/h24/sells").and_then(|v| v.as_i64()),
            ..Default::default()
        })
    }

    async fn security_info(&self, _mint: &str) -> Option<SecurityData> {
        // Security analysis comes from a dedicated service; unknown here.
        None
    }

    async fn top_holders(&self, _mint: &str) -> Vec<TopHolderRow> {
        Vec::new()
    }

    async fn dex_pair(&self, mint: &str) -> Option<DexPairData> {
        let pair = self.best_pair(mint).await?;
        Some(DexPairData {
            price: pair.get("priceUsd").map(json_decimal).flatten(),
            liquidity_usd: pair.pointer("/liquidity/usd").map(json_decimal).flatten(),
            volume_5m: pair.pointer("/volume/m5").map(json_decimal).flatten(),
            volume_1h: pair.pointer("/volume/h1").map(json_decimal).flatten(),
            volume_24h: pair.pointer("/volume/h24").map(json_decimal).flatten(),
            fdv: pair.get("fdv").map(json_decimal).flatten(),
        })
    }

    async fn smart_money_count(&self, _mint: &str) -> Option<i64> {
        None
    }

    async fn volatility_5m(&self, _mint: &str) -> Option<f64> {
        None
    }

    async fn metadata(&self, _mint: &str) -> Option<TokenMetadataData> {
        None
    }

    async fn sol_price_usd(&self) -> Option<f64> {
        self.jupiter.get_price(WSOL_MINT).await
    }
}

// =============================================================================
// Wallet transaction parse endpoint
// =============================================================================

/// Client for an enhanced-transactions parse API (deeper commitment than the
/// event detector).
pub struct HttpTxParser {
    client: reqwest::Client,
    url: String,
}

impl HttpTxParser {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl WalletTxParser for HttpTxParser {
    async fn get_parsed_transaction(&self, signature: &str) -> Result<Option<ParsedWalletTx>> {
        let payload = serde_json::json!({ "transactions": [signature] });
        let resp = self.client.post(&self.url).json(&payload).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("parse endpoint returned HTTP {}", resp.status());
        }
        let body: serde_json::Value = resp.json().await?;
        let Some(tx) = body.as_array().and_then(|a| a.first()) else {
            return Ok(None);
        };

        let native_transfers = tx
            .get("nativeTransfers")
            .and_then(|v| v.as_array())
            .map(|transfers| {
                transfers
                    .iter()
                    .map(|t| NativeTransfer {
                        from_user_account: t
                            .get("fromUserAccount")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        to_user_account: t
                            .get("toUserAccount")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        amount: t.get("amount").and_then(|v| v.as_u64()).unwrap_or(0),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let token_transfers = tx
            .get("tokenTransfers")
            .and_then(|v| v.as_array())
            .map(|transfers| {
                transfers
                    .iter()
                    .map(|t| SplTransfer {
                        from_user_account: t
                            .get("fromUserAccount")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        to_user_account: t
                            .get("toUserAccount")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        mint: t
                            .get("mint")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        token_amount: t
                            .get("tokenAmount")
                            .map(json_decimal)
                            .flatten()
                            .unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Some(ParsedWalletTx {
            signature: signature.to_string(),
            tx_type: tx
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            source: tx.get("source").and_then(|v| v.as_str()).map(String::from),
            fee_payer: tx
                .get("feePayer")
                .and_then(|v| v.as_str())
                .map(String::from),
            fee: tx.get("fee").and_then(|v| v.as_u64()).unwrap_or(0),
            transaction_error: !tx
                .get("transactionError")
                .map(|v| v.is_null())
                .unwrap_or(true),
            timestamp: tx.get("timestamp").and_then(|v| v.as_i64()).unwrap_or(0),
            native_transfers,
            token_transfers,
        }))
    }
}
