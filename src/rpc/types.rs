//! Wire types for JSON-RPC envelopes and the collaborator methods
//!
//! Only the fields the snapshot uses are modelled; everything else in the
//! upstream payloads is ignored by serde.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 response envelope
///
/// `jsonrpc` is required so that arbitrary JSON objects (proxy error pages
/// rendered as JSON, `{}`) are not mistaken for a successful response.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcEnvelope {
    pub jsonrpc: String,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<RpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// `{ context, value }` wrapper used by most account queries
#[derive(Debug, Clone, Deserialize)]
pub struct RpcContextual<T> {
    pub value: T,
}

/// Entry of a `getSignaturesForAddress` result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub confirmation_status: Option<String>,
}

/// Entry of a `getTokenAccountsByOwner` result with `jsonParsed` encoding
#[derive(Debug, Clone, Deserialize)]
pub struct KeyedTokenAccount {
    pub pubkey: String,
    pub account: ParsedTokenAccount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedTokenAccount {
    pub data: ParsedTokenAccountData,
    #[serde(default)]
    pub lamports: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedTokenAccountData {
    pub parsed: ParsedTokenAccountBody,
    #[serde(default)]
    pub program: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedTokenAccountBody {
    pub info: TokenAccountInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAccountInfo {
    pub mint: String,
    #[serde(default)]
    pub owner: String,
    pub token_amount: UiTokenAmount,
}

/// Token amount as rendered by the RPC node
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    pub amount: String,
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount: Option<f64>,
    #[serde(default)]
    pub ui_amount_string: Option<String>,
}

impl UiTokenAmount {
    /// Raw integer amount; malformed strings count as zero
    pub fn raw(&self) -> u64 {
        self.amount.parse::<u64>().unwrap_or(0)
    }

    /// Decimal-normalized amount, derived from the raw amount when the node
    /// omits `uiAmount`
    pub fn ui(&self) -> f64 {
        self.ui_amount
            .unwrap_or_else(|| self.raw() as f64 / 10f64.powi(self.decimals as i32))
    }
}

/// `getAsset` (DAS) result, reduced to display metadata
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Asset {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub content: Option<AssetContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetContent {
    #[serde(default)]
    pub metadata: AssetMetadata,
    #[serde(default)]
    pub links: Option<AssetLinks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetLinks {
    #[serde(default)]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_accounts_parse() {
        let json = r#"[{
            "pubkey": "7xLk17EQQ5KLDLDe44wCmupJKJjTGd8hs3eSVVhCx932",
            "account": {
                "lamports": 2039280,
                "owner": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA",
                "data": {
                    "program": "spl-token",
                    "space": 165,
                    "parsed": {
                        "type": "account",
                        "info": {
                            "isNative": false,
                            "mint": "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
                            "owner": "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM",
                            "state": "initialized",
                            "tokenAmount": {
                                "amount": "1500000",
                                "decimals": 6,
                                "uiAmount": 1.5,
                                "uiAmountString": "1.5"
                            }
                        }
                    }
                }
            }
        }]"#;

        let accounts: Vec<KeyedTokenAccount> = serde_json::from_str(json).unwrap();
        assert_eq!(accounts.len(), 1);
        let info = &accounts[0].account.data.parsed.info;
        assert_eq!(info.mint, "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
        assert_eq!(info.token_amount.raw(), 1_500_000);
        assert_eq!(info.token_amount.ui(), 1.5);
    }

    #[test]
    fn test_ui_amount_falls_back_to_raw() {
        let amount = UiTokenAmount {
            amount: "2500".to_string(),
            decimals: 3,
            ui_amount: None,
            ui_amount_string: None,
        };
        assert_eq!(amount.ui(), 2.5);
    }

    #[test]
    fn test_asset_tolerates_missing_content() {
        let asset: Asset = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(asset.id, "abc");
        assert!(asset.content.is_none());
    }
}
