//! Transaction history fetch pipeline
//!
//! ## Flow
//!
//! ```text
//! list_signatures ──> WorkQueue ──> workers ──> RpcClient::get_transaction
//!                        ^             │
//!                        └── requeue ──┤ (RateLimited / Transient)
//!                                      v
//!                              collector task ──> ResultSet
//! ```
//!
//! Every listed signature ends up either fetched or abandoned with a cause.
//! A cancelled run additionally reports the signatures still pending; the
//! three sets always partition the listing.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//! use tokio_util::sync::CancellationToken;
//! use walletflow::{fetch_transactions, rpc::RateLimitPolicy, FetchConfig, RpcClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RpcClient::new(
//!     "https://api.mainnet-beta.solana.com",
//!     Duration::from_secs(10),
//!     RateLimitPolicy::default(),
//! )?;
//! let report = fetch_transactions(
//!     Arc::new(client),
//!     "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM",
//!     &FetchConfig::default(),
//!     CancellationToken::new(),
//! )
//! .await?;
//! println!("{} fetched", report.results.transactions.len());
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod queue;
pub mod scheduler;
pub mod signatures;

pub use collector::{AbandonKind, Abandonment, ResultCollector, ResultSet};

use {
    crate::{
        rpc::{types::SignatureInfo, FetchOutcome, RpcClient},
        transaction::TransactionRecord,
    },
    async_trait::async_trait,
    std::{sync::Arc, time::Duration},
    tokio_util::sync::CancellationToken,
};

/// Upstream operations the pipeline consumes
///
/// Implemented by [`RpcClient`]; tests substitute scripted sources.
#[async_trait]
pub trait TransactionSource: Send + Sync {
    async fn list_signatures(
        &self,
        address: &str,
        limit: Option<usize>,
    ) -> FetchOutcome<Vec<SignatureInfo>>;

    async fn fetch_transaction(&self, signature: &str) -> FetchOutcome<TransactionRecord>;
}

#[async_trait]
impl TransactionSource for RpcClient {
    async fn list_signatures(
        &self,
        address: &str,
        limit: Option<usize>,
    ) -> FetchOutcome<Vec<SignatureInfo>> {
        self.get_signatures_for_address(address, limit).await
    }

    async fn fetch_transaction(&self, signature: &str) -> FetchOutcome<TransactionRecord> {
        self.get_transaction(signature).await
    }
}

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    /// Attempts per signature before it is abandoned (at least 1)
    pub max_attempts: u32,
    /// Concurrent fetch workers; 1 drains the queue serially
    pub workers: usize,
    /// Local delay after a transient failure
    pub transient_backoff: Duration,
    /// Bound for each individual upstream call
    pub call_timeout: Duration,
    /// Ceiling for a server-requested retry delay
    pub max_retry_delay: Duration,
    /// `limit` passed to `getSignaturesForAddress`
    pub signature_limit: Option<usize>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            workers: 4,
            transient_backoff: Duration::from_secs(1),
            call_timeout: Duration::from_secs(10),
            max_retry_delay: Duration::from_secs(60),
            signature_limit: None,
        }
    }
}

/// Pipeline-level failures; nothing is fetched when one occurs
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("failed to list signatures: {0}")]
    SignatureListing(String),

    #[error("cancelled before signatures were listed")]
    Cancelled,
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct FetchReport {
    pub address: String,
    /// Distinct signatures returned by the listing
    pub signature_count: usize,
    pub results: ResultSet,
    /// Signatures left unresolved by cancellation, queue order
    pub pending: Vec<String>,
    /// True when `cancel` fired before the run finished
    pub cancelled: bool,
}

impl FetchReport {
    /// True when every listed signature was fetched or abandoned
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Fetch the full transaction history of `address`
///
/// Lists signatures once, then drains them through the scheduler until
/// every signature is resolved or `cancel` fires. On cancellation no new
/// fetches start, in-flight fetches finish (bounded by the per-call
/// timeout), and the report lists what is still pending.
///
/// Arguments:
/// - `source`: RPC access, shared read-only
/// - `address`: base58 wallet address
/// - `config`: pipeline tuning
/// - `cancel`: request-scoped cancellation
pub async fn fetch_transactions(
    source: Arc<dyn TransactionSource>,
    address: &str,
    config: &FetchConfig,
    cancel: CancellationToken,
) -> Result<FetchReport, FetchError> {
    let listed = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        listed = signatures::list_signatures(
            source.as_ref(),
            address,
            config.signature_limit,
            config.call_timeout,
        ) => listed?,
    };

    let mut signatures = listed;
    let mut seen = std::collections::HashSet::new();
    signatures.retain(|sig| seen.insert(sig.clone()));
    let signature_count = signatures.len();

    let (results, pending) = scheduler::run(source, signatures, config, &cancel).await;

    debug_assert_eq!(results.len() + pending.len(), signature_count);

    Ok(FetchReport {
        address: address.to_string(),
        signature_count,
        results,
        pending,
        cancelled: cancel.is_cancelled(),
    })
}
