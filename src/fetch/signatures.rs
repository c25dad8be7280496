use {
    super::{FetchError, TransactionSource},
    crate::rpc::FetchOutcome,
    solana_pubkey::Pubkey,
    std::{str::FromStr, time::Duration},
};

/// List every signature for `address`, most recent first
///
/// One upstream call. Any failure, including a rate limit, is fatal: a
/// partial signature list would silently truncate the wallet history.
///
/// Arguments:
/// - `source`: RPC access
/// - `address`: base58 wallet address, validated before any call is made
/// - `limit`: optional `limit` for `getSignaturesForAddress`
/// - `call_timeout`: bound for the single call
pub async fn list_signatures(
    source: &dyn TransactionSource,
    address: &str,
    limit: Option<usize>,
    call_timeout: Duration,
) -> Result<Vec<String>, FetchError> {
    Pubkey::from_str(address).map_err(|e| FetchError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })?;

    let outcome = match tokio::time::timeout(call_timeout, source.list_signatures(address, limit)).await {
        Ok(outcome) => outcome,
        Err(_) => FetchOutcome::Transient(format!("timed out after {:?}", call_timeout)),
    };

    match outcome {
        FetchOutcome::Success(infos) => {
            let signatures: Vec<String> = infos.into_iter().map(|info| info.signature).collect();
            log::info!("📜 {} signatures listed for {}", signatures.len(), address);
            Ok(signatures)
        }
        FetchOutcome::RateLimited(delay) => Err(FetchError::SignatureListing(format!(
            "rate limited (retry after {:?})",
            delay
        ))),
        FetchOutcome::Transient(cause) | FetchOutcome::Permanent(cause) => {
            Err(FetchError::SignatureListing(cause))
        }
    }
}
