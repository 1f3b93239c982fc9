// =============================================================================
// Swap-aggregator client — sell simulation (quote API) and price fallback
// =============================================================================
//
// The quote endpoint doubles as a honeypot probe: a token with no sell route
// may be unsellable. Error taxonomy matters here — a 400 "no route" is a
// statement about the token, while 401/403/5xx/timeouts are statements about
// the API and must never count against the token.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::providers::types::{SellSimResult, SwapQuote};

const PRICE_URL: &str = "https://api.jup.ag/price/v2";
const QUOTE_URL: &str = "https://api.jup.ag/swap/v1/quote";
/// Wrapped SOL mint address.
const WSOL_MINT: &str = "So11111111111111111111111111111111111111112";

const MAX_RETRIES: u32 = 2;
const RETRY_DELAYS: [f64; 2] = [1.0, 3.0];

/// Simulates sells through the aggregator quote endpoint.
#[async_trait]
pub trait SellSimulator: Send + Sync {
    async fn simulate_sell(&self, mint: &str, amount_tokens: u64, decimals: u8) -> SellSimResult;
}

/// Async HTTP client for the aggregator price and quote APIs.
pub struct JupiterClient {
    client: reqwest::Client,
    price_url: String,
    quote_url: String,
}

impl JupiterClient {
    pub fn new(api_key: Option<&str>) -> Self {
        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            if let Ok(value) = HeaderValue::from_str(key) {
                headers.insert("x-api-key", value);
            }
        }
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            price_url: PRICE_URL.to_string(),
            quote_url: QUOTE_URL.to_string(),
        }
    }

    /// Fetch a swap quote. Transient failures retry with small delays.
    pub async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount: u64,
        slippage_bps: u32,
    ) -> Result<SwapQuote, String> {
        let params = [
            ("inputMint", input_mint.to_string()),
            ("outputMint", output_mint.to_string()),
            ("amount", amount.to_string()),
            ("slippageBps", slippage_bps.to_string()),
        ];
        let resp = self
            .client
            .get(&self.quote_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let body: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
        let out_amount = body
            .get("outAmount")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        let in_amount = body
            .get("inAmount")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(amount);
        let impact = body
            .get("priceImpactPct")
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok());
        Ok(SwapQuote {
            input_amount: in_amount,
            output_amount: out_amount,
            price_impact_pct: impact,
        })
    }

    /// Current USD price for a mint, if the aggregator has one.
    pub async fn get_price(&self, mint: &str) -> Option<f64> {
        let resp = self
            .client
            .get(&self.price_url)
            .query(&[("ids", mint)])
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            debug!(mint, status = %resp.status(), "jupiter: price lookup failed");
            return None;
        }
        let body: serde_json::Value = resp.json().await.ok()?;
        body.pointer(&format!("/data/{mint}/price"))
            .and_then(|v| v.as_str())
            .and_then(|s| s.parse::<f64>().ok())
    }
}

#[async_trait]
impl SellSimulator for JupiterClient {
    /// Simulate selling tokens for SOL. "No route" (400) reports the token
    /// as unsellable; API unavailability sets `api_error` instead.
    async fn simulate_sell(&self, mint: &str, amount_tokens: u64, decimals: u8) -> SellSimResult {
        let raw_amount = amount_tokens.saturating_mul(10u64.saturating_pow(decimals as u32));
        let params = [
            ("inputMint", mint.to_string()),
            ("outputMint", WSOL_MINT.to_string()),
            ("amount", raw_amount.to_string()),
            // generous tolerance; this is a route probe, not an execution
            ("slippageBps", "5000".to_string()),
        ];

        for attempt in 0..=MAX_RETRIES {
            let resp = match self.client.get(&self.quote_url).query(&params).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if attempt < MAX_RETRIES {
                        let delay = RETRY_DELAYS[attempt.min(1) as usize];
                        debug!(mint, error = %e, "jupiter: sell sim retrying");
                        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                        continue;
                    }
                    warn!(mint, error = %e, "jupiter: sell sim failed after retries");
                    return SellSimResult {
                        sellable: false,
                        error: Some(e.to_string()),
                        api_error: true,
                        ..Default::default()
                    };
                }
            };

            let status = resp.status();
            if status.as_u16() == 429 || status.is_server_error() {
                if attempt < MAX_RETRIES {
                    let delay = RETRY_DELAYS[attempt.min(1) as usize];
                    tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    continue;
                }
                return SellSimResult {
                    sellable: false,
                    error: Some(format!("HTTP {status}")),
                    api_error: true,
                    ..Default::default()
                };
            }
            if status.as_u16() == 400 {
                // An explicit quote rejection is a token statement.
                let body: serde_json::Value = resp.json().await.unwrap_or_default();
                let message = body
                    .get("error")
                    .or_else(|| body.get("message"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown error");
                return SellSimResult {
                    sellable: false,
                    error: Some(message.to_string()),
                    ..Default::default()
                };
            }
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return SellSimResult {
                    sellable: false,
                    error: Some(format!("HTTP {status}")),
                    api_error: true,
                    ..Default::default()
                };
            }
            if !status.is_success() {
                return SellSimResult {
                    sellable: false,
                    error: Some(format!("HTTP {status}")),
                    api_error: true,
                    ..Default::default()
                };
            }

            let body: serde_json::Value = match resp.json().await {
                Ok(body) => body,
                Err(e) => {
                    return SellSimResult {
                        sellable: false,
                        error: Some(e.to_string()),
                        api_error: true,
                        ..Default::default()
                    }
                }
            };
            let out_amount = body
                .get("outAmount")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0);
            let impact = body
                .get("priceImpactPct")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse::<f64>().ok());
            return SellSimResult {
                sellable: out_amount > 0,
                output_amount: Some(Decimal::from(out_amount) / Decimal::from(1_000_000_000u64)),
                price_impact_pct: impact,
                error: None,
                api_error: false,
            };
        }

        SellSimResult {
            sellable: false,
            error: Some("Max retries exceeded".into()),
            api_error: true,
            ..Default::default()
        }
    }
}
