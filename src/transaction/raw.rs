//! `getTransaction` result shape for the `json` encoding

use {
    crate::rpc::types::UiTokenAmount,
    serde::Deserialize,
    serde_json::Value,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub meta: Option<RawMeta>,
    pub transaction: RawTransactionBody,
    /// `"legacy"` or a version number
    #[serde(default)]
    pub version: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeta {
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub fee: u64,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
    #[serde(default)]
    pub pre_token_balances: Option<Vec<RawTokenBalance>>,
    #[serde(default)]
    pub post_token_balances: Option<Vec<RawTokenBalance>>,
    #[serde(default)]
    pub log_messages: Option<Vec<String>>,
    #[serde(default)]
    pub loaded_addresses: Option<RawLoadedAddresses>,
    #[serde(default)]
    pub compute_units_consumed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenBalance {
    pub account_index: usize,
    pub mint: String,
    #[serde(default)]
    pub owner: Option<String>,
    pub ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLoadedAddresses {
    #[serde(default)]
    pub writable: Vec<String>,
    #[serde(default)]
    pub readonly: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransactionBody {
    pub signatures: Vec<String>,
    pub message: RawMessage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMessage {
    pub account_keys: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<RawInstruction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawInstruction {
    pub program_id_index: usize,
    #[serde(default)]
    pub accounts: Vec<usize>,
    #[serde(default)]
    pub data: String,
    #[serde(default)]
    pub stack_height: Option<u32>,
}
