//! Solana JSON-RPC access
//!
//! The client performs exactly one HTTP round trip per call and turns the
//! response into a [`FetchOutcome`]. Retry policy is not decided here; the
//! fetch scheduler owns it.

pub mod client;
pub mod outcome;
pub mod types;

pub use client::{classify_response, parse_retry_after, RateLimitPolicy, RpcClient};
pub use outcome::FetchOutcome;

use std::time::Duration;

/// SPL Token program, used to enumerate token accounts owned by a wallet
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// RPC methods this service knows how to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcMethod {
    GetTransaction,
    GetSignaturesForAddress,
    GetBalance,
    GetTokenAccountsByOwner,
    GetAsset,
}

impl RpcMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMethod::GetTransaction => "getTransaction",
            RpcMethod::GetSignaturesForAddress => "getSignaturesForAddress",
            RpcMethod::GetBalance => "getBalance",
            RpcMethod::GetTokenAccountsByOwner => "getTokenAccountsByOwner",
            RpcMethod::GetAsset => "getAsset",
        }
    }
}

impl std::fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a collaborator call that has no retry policy of its own
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("rate limited, retry after {0:?}")]
    RateLimited(Duration),

    #[error("transient RPC failure: {0}")]
    Transient(String),

    #[error("RPC request rejected: {0}")]
    Permanent(String),

    #[error("failed to decode {method} result: {source}")]
    Decode {
        method: RpcMethod,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}
