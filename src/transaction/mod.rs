//! Parsed transaction records
//!
//! A [`TransactionRecord`] is built once from a `getTransaction` result and
//! never mutated afterwards. Balance deltas are computed at parse time so
//! consumers never have to look at raw pre/post balance vectors.

pub mod balance_extractor;
pub mod raw;

use {
    balance_extractor::{
        build_full_account_keys, extract_sol_changes, extract_token_changes, BalanceDelta,
    },
    raw::RawTransaction,
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

/// Execution status of a landed transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TransactionStatus {
    Success,
    /// Landed but failed; `error` is the upstream error JSON
    Failed { error: Value },
}

/// Top-level instruction with program id and accounts resolved to addresses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionRecord {
    pub program_id: String,
    pub accounts: Vec<String>,
    /// Base58 instruction data as returned by the node
    pub data: String,
    pub stack_height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub signature: String,
    pub slot: u64,
    pub block_time: Option<i64>,
    pub fee: u64,
    #[serde(flatten)]
    pub status: TransactionStatus,
    pub sol_changes: Vec<BalanceDelta>,
    pub token_changes: Vec<BalanceDelta>,
    pub instructions: Vec<InstructionRecord>,
    pub signatures: Vec<String>,
    /// `"legacy"` or the numeric version rendered as a string
    pub version: String,
    pub compute_units_consumed: Option<u64>,
    pub log_messages: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid transaction JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transaction has no status meta")]
    MissingMeta,

    #[error("requested {requested} but node returned {returned}")]
    SignatureMismatch { requested: String, returned: String },

    #[error("instruction references account index {index} of {len}")]
    AccountIndexOutOfRange { index: usize, len: usize },
}

impl TransactionRecord {
    /// Parse a `getTransaction` result (`json` encoding) for `signature`
    ///
    /// The first signature of the transaction must match the requested one;
    /// a node answering for a different transaction is a decoding failure,
    /// not a success.
    pub fn from_rpc_result(signature: &str, result: Value) -> Result<Self, ParseError> {
        let raw: RawTransaction = serde_json::from_value(result)?;
        let meta = raw.meta.ok_or(ParseError::MissingMeta)?;

        let returned = raw.transaction.signatures.first().cloned().unwrap_or_default();
        if returned != signature {
            return Err(ParseError::SignatureMismatch {
                requested: signature.to_string(),
                returned,
            });
        }

        let account_keys = build_full_account_keys(&raw.transaction.message.account_keys, &meta);

        let resolve = |index: usize| {
            account_keys
                .get(index)
                .cloned()
                .ok_or(ParseError::AccountIndexOutOfRange {
                    index,
                    len: account_keys.len(),
                })
        };

        let instructions = raw
            .transaction
            .message
            .instructions
            .iter()
            .map(|ix| {
                Ok(InstructionRecord {
                    program_id: resolve(ix.program_id_index)?,
                    accounts: ix
                        .accounts
                        .iter()
                        .map(|&idx| resolve(idx))
                        .collect::<Result<_, _>>()?,
                    data: ix.data.clone(),
                    stack_height: ix.stack_height,
                })
            })
            .collect::<Result<Vec<_>, ParseError>>()?;

        let status = match &meta.err {
            None | Some(Value::Null) => TransactionStatus::Success,
            Some(err) => TransactionStatus::Failed { error: err.clone() },
        };

        let version = match raw.version {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            _ => "legacy".to_string(),
        };

        Ok(Self {
            signature: signature.to_string(),
            slot: raw.slot,
            block_time: raw.block_time,
            fee: meta.fee,
            status,
            sol_changes: extract_sol_changes(&meta, &account_keys),
            token_changes: extract_token_changes(&meta, &account_keys),
            instructions,
            signatures: raw.transaction.signatures,
            version,
            compute_units_consumed: meta.compute_units_consumed,
            log_messages: meta.log_messages.unwrap_or_default(),
        })
    }
}
