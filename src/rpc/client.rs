use {
    super::{
        types::{Asset, KeyedTokenAccount, RpcContextual, RpcEnvelope, SignatureInfo},
        FetchOutcome, RpcError, RpcMethod, TOKEN_PROGRAM_ID,
    },
    crate::transaction::TransactionRecord,
    chrono::{DateTime, Utc},
    serde::de::DeserializeOwned,
    serde_json::{json, Value},
    std::{
        sync::{
            atomic::{AtomicU64, Ordering},
            Arc,
        },
        time::Duration,
    },
};

/// JSON-RPC error codes that mean "the node could not answer right now"
///
/// - `-32603` internal error
/// - `-32005` node unhealthy / behind
/// - `-32004` block not available for slot
/// - `-32014` block status not yet available
/// - `-32016` minimum context slot not reached
const RETRYABLE_RPC_CODES: &[i64] = &[-32603, -32005, -32004, -32014, -32016];

/// Bounds for server-paced retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Delay for HTTP 429 responses without a usable `Retry-After`
    pub default_delay: Duration,
    /// Ceiling for any delay a server asks for
    pub max_delay: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            default_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Solana JSON-RPC client
///
/// Cheap to clone; clones share the underlying connection pool and request
/// id counter. Holds no per-request state, so one instance serves every
/// wallet request.
#[derive(Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    rate_limit: RateLimitPolicy,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    /// Create a client for `url`
    ///
    /// Arguments:
    /// - `timeout`: upper bound for one call, connect through body read
    /// - `rate_limit`: default and ceiling for server-paced delays
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        rate_limit: RateLimitPolicy,
    ) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            url: url.into(),
            rate_limit,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Issue one JSON-RPC call and classify the response
    ///
    /// Never retries and never fails past this boundary: every failure mode
    /// maps to a [`FetchOutcome`] variant. On success the raw `result` value
    /// is returned, which may be `null`.
    pub async fn call(&self, method: RpcMethod, params: Vec<Value>) -> FetchOutcome<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method.as_str(),
            "params": params,
        });

        let response = match self.http.post(&self.url).json(&payload).send().await {
            Ok(response) => response,
            Err(e) => {
                let cause = if e.is_timeout() {
                    format!("{} timed out", method)
                } else {
                    format!("{} request failed: {}", method, e)
                };
                return FetchOutcome::Transient(cause);
            }
        };

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return FetchOutcome::Transient(format!("{} body read failed: {}", method, e));
            }
        };

        classify_response(
            status,
            retry_after.as_deref(),
            &body,
            Utc::now(),
            self.rate_limit,
        )
    }

    /// Call and decode, for collaborators that apply no retry policy
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: RpcMethod,
        params: Vec<Value>,
    ) -> Result<T, RpcError> {
        let value = self.call(method, params).await.into_result()?;
        serde_json::from_value(value).map_err(|source| RpcError::Decode { method, source })
    }

    /// Fetch and parse one transaction
    ///
    /// A `null` result (unknown or pruned signature) and a result that does
    /// not decode as a transaction are both permanent: asking again returns
    /// the same answer.
    pub async fn get_transaction(&self, signature: &str) -> FetchOutcome<TransactionRecord> {
        let params = vec![
            json!(signature),
            json!({
                "encoding": "json",
                "maxSupportedTransactionVersion": 0,
            }),
        ];

        self.call(RpcMethod::GetTransaction, params)
            .await
            .and_then(|result| parse_transaction(signature, result))
    }

    /// `getSignaturesForAddress`, most recent first
    pub async fn get_signatures_for_address(
        &self,
        address: &str,
        limit: Option<usize>,
    ) -> FetchOutcome<Vec<SignatureInfo>> {
        let mut params = vec![json!(address)];
        if let Some(limit) = limit {
            params.push(json!({ "limit": limit }));
        }

        self.call(RpcMethod::GetSignaturesForAddress, params)
            .await
            .and_then(|result| match serde_json::from_value::<Option<Vec<SignatureInfo>>>(result) {
                Ok(list) => FetchOutcome::Success(list.unwrap_or_default()),
                Err(e) => FetchOutcome::Transient(format!("malformed signature list: {}", e)),
            })
    }

    /// SOL balance in lamports
    pub async fn get_balance(&self, address: &str) -> Result<u64, RpcError> {
        let balance: RpcContextual<u64> =
            self.request(RpcMethod::GetBalance, vec![json!(address)]).await?;
        Ok(balance.value)
    }

    /// SPL token accounts owned by `owner`, `jsonParsed` encoding
    pub async fn get_token_accounts_by_owner(
        &self,
        owner: &str,
    ) -> Result<Vec<KeyedTokenAccount>, RpcError> {
        let accounts: RpcContextual<Vec<KeyedTokenAccount>> = self
            .request(
                RpcMethod::GetTokenAccountsByOwner,
                vec![
                    json!(owner),
                    json!({ "programId": TOKEN_PROGRAM_ID }),
                    json!({ "encoding": "jsonParsed" }),
                ],
            )
            .await?;
        Ok(accounts.value)
    }

    /// DAS `getAsset` metadata for a mint
    pub async fn get_asset(&self, mint: &str) -> Result<Asset, RpcError> {
        self.request(RpcMethod::GetAsset, vec![json!(mint)]).await
    }
}

fn parse_transaction(signature: &str, result: Value) -> FetchOutcome<TransactionRecord> {
    if result.is_null() {
        return FetchOutcome::Permanent("transaction not found".to_string());
    }

    match TransactionRecord::from_rpc_result(signature, result) {
        Ok(record) => FetchOutcome::Success(record),
        Err(e) => FetchOutcome::Permanent(format!("undecodable transaction: {}", e)),
    }
}

/// Map one HTTP response to a [`FetchOutcome`]
///
/// Arguments:
/// - `status`: HTTP status code
/// - `retry_after`: raw `Retry-After` header value, if any
/// - `body`: response body
/// - `now`: reference time for HTTP-date `Retry-After` values
/// - `rate_limit`: default delay for 429 responses without a usable hint,
///   and the ceiling every server-supplied delay is clamped to
pub fn classify_response(
    status: u16,
    retry_after: Option<&str>,
    body: &str,
    now: DateTime<Utc>,
    rate_limit: RateLimitPolicy,
) -> FetchOutcome<Value> {
    if !(200..300).contains(&status) {
        if let Some(delay) = retry_after.and_then(|v| parse_retry_after(v, now)) {
            return FetchOutcome::RateLimited(delay.min(rate_limit.max_delay));
        }
        if status == 429 {
            return FetchOutcome::RateLimited(rate_limit.default_delay.min(rate_limit.max_delay));
        }
        return FetchOutcome::Transient(format!("received non-2xx status: {}", status));
    }

    let envelope: RpcEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => return FetchOutcome::Transient(format!("malformed JSON-RPC response: {}", e)),
    };

    if let Some(error) = envelope.error {
        let cause = format!("rpc error {}: {}", error.code, error.message);
        return if RETRYABLE_RPC_CODES.contains(&error.code) {
            FetchOutcome::Transient(cause)
        } else {
            FetchOutcome::Permanent(cause)
        };
    }

    FetchOutcome::Success(envelope.result)
}

/// Parse a `Retry-After` header: delta-seconds or an HTTP-date
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();

    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
