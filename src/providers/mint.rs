// =============================================================================
// Mint account parser — SPL Token / Token2022 via raw RPC account data
// =============================================================================
//
// Fetches the mint account with getAccountInfo (base64) and decodes the
// fixed 82-byte SPL layout plus Token2022 TLV extensions. Dangerous
// extensions (permanent delegate, non-transferable, transfer hook) are hard
// PRE_SCAN rejects; risky ones (transfer fee, default account state) only
// add soft risk.
// =============================================================================

use anyhow::Result;
use async_trait::async_trait;
use base64::Engine;
use serde_json::json;
use tracing::{debug, warn};

use crate::providers::types::MintInfo;

/// SPL Token mint layout: 82 bytes.
/// [0:36]   mintAuthorityOption (4) + mintAuthority (32)
/// [36:44]  supply (u64 LE)
/// [44:45]  decimals (u8)
/// [45:46]  isInitialized (bool)
/// [46:82]  freezeAuthorityOption (4) + freezeAuthority (32)
const SPL_MINT_SIZE: usize = 82;

/// The system program address; an authority set to it counts as renounced.
const NULL_ADDRESS: &str = "11111111111111111111111111111111";

/// Token2022 extension type ids (from the token-2022 program source).
const EXT_TRANSFER_FEE_CONFIG: u16 = 1;
const EXT_DEFAULT_ACCOUNT_STATE: u16 = 6;
const EXT_NON_TRANSFERABLE: u16 = 9;
const EXT_PERMANENT_DELEGATE: u16 = 12;
const EXT_TRANSFER_HOOK: u16 = 14;

fn extension_name(ext: u16) -> Option<&'static str> {
    match ext {
        EXT_TRANSFER_FEE_CONFIG => Some("TRANSFER_FEE_CONFIG"),
        EXT_DEFAULT_ACCOUNT_STATE => Some("DEFAULT_ACCOUNT_STATE"),
        EXT_NON_TRANSFERABLE => Some("NON_TRANSFERABLE"),
        EXT_PERMANENT_DELEGATE => Some("PERMANENT_DELEGATE"),
        EXT_TRANSFER_HOOK => Some("TRANSFER_HOOK"),
        _ => None,
    }
}

fn is_dangerous(ext: u16) -> bool {
    matches!(
        ext,
        EXT_PERMANENT_DELEGATE | EXT_NON_TRANSFERABLE | EXT_TRANSFER_HOOK
    )
}

fn is_risky(ext: u16) -> bool {
    matches!(ext, EXT_TRANSFER_FEE_CONFIG | EXT_DEFAULT_ACCOUNT_STATE)
}

/// Parses mint accounts over RPC.
#[async_trait]
pub trait MintRpc: Send + Sync {
    async fn parse_mint(&self, mint: &str) -> MintInfo;
}

/// Concrete RPC-backed parser.
pub struct RpcMintParser {
    rpc_url: String,
    client: reqwest::Client,
}

impl RpcMintParser {
    pub fn new(rpc_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()?;
        Ok(Self {
            rpc_url: rpc_url.into(),
            client,
        })
    }
}

#[async_trait]
impl MintRpc for RpcMintParser {
    async fn parse_mint(&self, mint: &str) -> MintInfo {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getAccountInfo",
            "params": [mint, {"encoding": "base64", "commitment": "confirmed"}],
        });

        let resp = match self.client.post(&self.rpc_url).json(&payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(mint, error = %e, "mint: rpc request failed");
                return MintInfo {
                    parse_error: Some(e.to_string()),
                    ..Default::default()
                };
            }
        };
        if !resp.status().is_success() {
            return MintInfo {
                parse_error: Some(format!("RPC HTTP {}", resp.status())),
                ..Default::default()
            };
        }
        let body: serde_json::Value = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                return MintInfo {
                    parse_error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let Some(raw_b64) = body
            .pointer("/result/value/data/0")
            .and_then(|v| v.as_str())
        else {
            return MintInfo {
                parse_error: Some("Account not found".into()),
                ..Default::default()
            };
        };
        let raw = match base64::engine::general_purpose::STANDARD.decode(raw_b64) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(mint, error = %e, "mint: bad base64 account data");
                return MintInfo {
                    parse_error: Some(e.to_string()),
                    ..Default::default()
                };
            }
        };

        decode_mint(&raw)
    }
}

/// Decode raw mint account bytes (SPL Token or Token2022).
pub fn decode_mint(raw: &[u8]) -> MintInfo {
    if raw.len() < SPL_MINT_SIZE {
        return MintInfo {
            parse_error: Some(format!("Data too short: {} bytes", raw.len())),
            ..Default::default()
        };
    }

    // COption<Pubkey>: 4-byte option tag + 32-byte key.
    let mint_auth_option = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
    let mint_authority = (mint_auth_option == 1)
        .then(|| bytes_to_base58(&raw[4..36]))
        .filter(|a| a != NULL_ADDRESS);

    let supply = u64::from_le_bytes(raw[36..44].try_into().unwrap_or_default());
    let decimals = raw[44];

    let freeze_auth_option = u32::from_le_bytes([raw[46], raw[47], raw[48], raw[49]]);
    let freeze_authority = (freeze_auth_option == 1)
        .then(|| bytes_to_base58(&raw[50..82]))
        .filter(|a| a != NULL_ADDRESS);

    // Any data past the base layout means Token2022 extensions.
    let is_token2022 = raw.len() > SPL_MINT_SIZE;
    let mut extensions = Vec::new();
    let mut dangerous = Vec::new();
    let mut risky = Vec::new();
    if is_token2022 {
        extensions = parse_extensions(&raw[SPL_MINT_SIZE..]);
        for ext in &extensions {
            if let Some(name) = extension_name(*ext) {
                if is_dangerous(*ext) {
                    dangerous.push(name.to_string());
                } else if is_risky(*ext) {
                    risky.push(name.to_string());
                }
            }
        }
    }

    MintInfo {
        supply,
        decimals,
        mint_authority,
        freeze_authority,
        is_token2022,
        extensions,
        dangerous_extensions: dangerous,
        risky_extensions: risky,
        parse_error: None,
    }
}

/// Parse Token2022 TLV entries: account type byte, then
/// u16 type + u16 length + payload per extension.
fn parse_extensions(ext_data: &[u8]) -> Vec<u16> {
    let mut extensions = Vec::new();
    let mut offset = usize::from(!ext_data.is_empty());

    while offset + 4 <= ext_data.len() {
        let ext_type = u16::from_le_bytes([ext_data[offset], ext_data[offset + 1]]);
        let ext_len = u16::from_le_bytes([ext_data[offset + 2], ext_data[offset + 3]]) as usize;

        if ext_type == 0 && ext_len == 0 {
            break;
        }
        extensions.push(ext_type);
        offset += 4 + ext_len;
    }

    extensions
}

const B58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Base58 encoding for 32-byte account keys.
fn bytes_to_base58(data: &[u8]) -> String {
    // Big-integer division over the raw bytes.
    let mut digits: Vec<u8> = Vec::with_capacity(data.len() * 2);
    for &byte in data {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let mut out = Vec::with_capacity(digits.len() + 1);
    for &byte in data {
        if byte == 0 {
            out.push(b'1');
        } else {
            break;
        }
    }
    for &digit in digits.iter().rev() {
        out.push(B58_ALPHABET[digit as usize]);
    }
    if out.is_empty() {
        out.push(b'1');
    }
    String::from_utf8(out).unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    /// Build a raw SPL mint account with the given authorities.
    fn spl_mint(mint_auth: Option<[u8; 32]>, freeze_auth: Option<[u8; 32]>) -> Vec<u8> {
        let mut raw = vec![0u8; SPL_MINT_SIZE];
        if let Some(auth) = mint_auth {
            raw[0..4].copy_from_slice(&1u32.to_le_bytes());
            raw[4..36].copy_from_slice(&auth);
        }
        raw[36..44].copy_from_slice(&1_000_000u64.to_le_bytes());
        raw[44] = 6;
        raw[45] = 1;
        if let Some(auth) = freeze_auth {
            raw[46..50].copy_from_slice(&1u32.to_le_bytes());
            raw[50..82].copy_from_slice(&auth);
        }
        raw
    }

    fn with_extensions(mut raw: Vec<u8>, exts: &[(u16, u16)]) -> Vec<u8> {
        raw.push(1); // account type
        for (ext_type, len) in exts {
            raw.extend_from_slice(&ext_type.to_le_bytes());
            raw.extend_from_slice(&len.to_le_bytes());
            raw.extend(std::iter::repeat(0u8).take(*len as usize));
        }
        raw
    }

    #[test]
    fn clean_spl_mint_decodes() {
        let info = decode_mint(&spl_mint(None, None));
        assert!(info.parse_error.is_none());
        assert_eq!(info.supply, 1_000_000);
        assert_eq!(info.decimals, 6);
        assert!(!info.mint_authority_active());
        assert!(!info.freeze_authority_active());
        assert!(!info.is_token2022);
        assert_eq!(info.risk_score(), 0);
    }

    #[test]
    fn active_authorities_detected() {
        let info = decode_mint(&spl_mint(Some([7u8; 32]), Some([9u8; 32])));
        assert!(info.mint_authority_active());
        assert!(info.freeze_authority_active());
        // +20 mint authority, +15 freeze authority
        assert_eq!(info.risk_score(), 35);
    }

    #[test]
    fn null_authority_counts_as_renounced() {
        let info = decode_mint(&spl_mint(Some([0u8; 32]), None));
        // All-zero key encodes to the system program address.
        assert!(!info.mint_authority_active());
    }

    #[test]
    fn dangerous_extensions_detected() {
        let raw = with_extensions(
            spl_mint(None, None),
            &[(EXT_PERMANENT_DELEGATE, 36), (EXT_TRANSFER_HOOK, 64)],
        );
        let info = decode_mint(&raw);
        assert!(info.is_token2022);
        assert!(info.has_dangerous_extensions());
        assert_eq!(
            info.dangerous_extensions,
            vec!["PERMANENT_DELEGATE", "TRANSFER_HOOK"]
        );
        // +20 per dangerous extension
        assert_eq!(info.risk_score(), 40);
    }

    #[test]
    fn risky_extensions_add_soft_risk() {
        let raw = with_extensions(
            spl_mint(None, None),
            &[(EXT_TRANSFER_FEE_CONFIG, 108), (EXT_DEFAULT_ACCOUNT_STATE, 1)],
        );
        let info = decode_mint(&raw);
        assert!(!info.has_dangerous_extensions());
        assert_eq!(
            info.risky_extensions,
            vec!["TRANSFER_FEE_CONFIG", "DEFAULT_ACCOUNT_STATE"]
        );
        assert_eq!(info.risk_score(), 20);
    }

    #[test]
    fn unknown_extension_types_are_kept_but_unclassified() {
        let raw = with_extensions(spl_mint(None, None), &[(18, 64), (19, 32)]);
        let info = decode_mint(&raw);
        assert_eq!(info.extensions, vec![18, 19]);
        assert!(info.dangerous_extensions.is_empty());
        assert!(info.risky_extensions.is_empty());
    }

    #[test]
    fn truncated_account_reports_parse_error() {
        let info = decode_mint(&[0u8; 40]);
        assert!(info.parse_error.is_some());
    }

    #[test]
    fn base58_known_values() {
        assert_eq!(bytes_to_base58(&[0u8; 32]), NULL_ADDRESS);
        // Leading zeros become leading '1's.
        assert_eq!(bytes_to_base58(&[0, 0, 1]), "112");
    }

    #[test]
    fn risk_score_caps_at_100() {
        let raw = with_extensions(
            spl_mint(Some([7u8; 32]), Some([9u8; 32])),
            &[
                (EXT_PERMANENT_DELEGATE, 36),
                (EXT_TRANSFER_HOOK, 64),
                (EXT_NON_TRANSFERABLE, 1),
                (EXT_TRANSFER_FEE_CONFIG, 108),
            ],
        );
        let info = decode_mint(&raw);
        // 20 + 15 + 3*20 + 10 = 105 → capped
        assert_eq!(info.risk_score(), 100);
    }
}
