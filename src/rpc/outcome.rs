use std::time::Duration;

/// Result of a single upstream call, as seen by the fetch scheduler.
///
/// The variant is decided once, at the RPC boundary. Callers never inspect
/// error strings to recover a delay: a server-supplied backoff travels as a
/// typed [`Duration`] on [`FetchOutcome::RateLimited`].
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T> {
    Success(T),
    /// Upstream refused the request and asked to be retried after `delay`.
    RateLimited(Duration),
    /// Retryable failure with no server-supplied delay.
    Transient(String),
    /// Non-retryable failure specific to this request.
    Permanent(String),
}

impl<T> FetchOutcome<T> {
    pub fn map<U, F>(self, f: F) -> FetchOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            FetchOutcome::Success(value) => FetchOutcome::Success(f(value)),
            FetchOutcome::RateLimited(delay) => FetchOutcome::RateLimited(delay),
            FetchOutcome::Transient(cause) => FetchOutcome::Transient(cause),
            FetchOutcome::Permanent(cause) => FetchOutcome::Permanent(cause),
        }
    }

    /// Chain a fallible conversion of the success payload.
    ///
    /// Non-success variants pass through untouched.
    pub fn and_then<U, F>(self, f: F) -> FetchOutcome<U>
    where
        F: FnOnce(T) -> FetchOutcome<U>,
    {
        match self {
            FetchOutcome::Success(value) => f(value),
            FetchOutcome::RateLimited(delay) => FetchOutcome::RateLimited(delay),
            FetchOutcome::Transient(cause) => FetchOutcome::Transient(cause),
            FetchOutcome::Permanent(cause) => FetchOutcome::Permanent(cause),
        }
    }

    /// Collapse into a `Result` for callers with no retry policy of their own.
    pub fn into_result(self) -> Result<T, super::RpcError> {
        match self {
            FetchOutcome::Success(value) => Ok(value),
            FetchOutcome::RateLimited(delay) => Err(super::RpcError::RateLimited(delay)),
            FetchOutcome::Transient(cause) => Err(super::RpcError::Transient(cause)),
            FetchOutcome::Permanent(cause) => Err(super::RpcError::Permanent(cause)),
        }
    }
}
