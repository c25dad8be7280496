//! Service configuration from environment variables

use {
    crate::{fetch::FetchConfig, rpc::RateLimitPolicy},
    std::{env, net::SocketAddr, time::Duration},
};

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";
pub const DEFAULT_GECKOTERMINAL_URL: &str = "https://api.geckoterminal.com/api/v2";

/// getSignaturesForAddress accepts at most this many entries per call
const MAX_SIGNATURE_LIMIT: usize = 1000;

/// Configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub listen_addr: SocketAddr,
    /// Per-call timeout for every upstream HTTP request
    pub rpc_timeout: Duration,
    /// Default delay for HTTP 429 without a usable Retry-After, and the
    /// ceiling for every server-supplied delay
    pub rate_limit: RateLimitPolicy,
    /// Deadline for one wallet request; the fetch pipeline is cancelled
    /// when it elapses and returns what it has
    pub request_deadline: Duration,
    pub fetch: FetchConfig,
    /// Fill token `history_prices` from GeckoTerminal OHLCV data
    pub fetch_price_history: bool,
    pub coingecko_url: String,
    pub geckoterminal_url: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `SOLANA_RPC_URL` (default: https://api.mainnet-beta.solana.com)
    /// - `LISTEN_ADDR` (default: 0.0.0.0:3000)
    /// - `RPC_TIMEOUT_MS` (default: 10000)
    /// - `RATE_LIMIT_DEFAULT_MS` (default: 2000)
    /// - `RATE_LIMIT_MAX_MS` (default: 60000)
    /// - `REQUEST_DEADLINE_MS` (default: 60000)
    /// - `FETCH_MAX_ATTEMPTS` (default: 10)
    /// - `FETCH_WORKERS` (default: 4)
    /// - `TRANSIENT_BACKOFF_MS` (default: 1000)
    /// - `SIGNATURE_LIMIT` (default: unset, upstream default)
    /// - `FETCH_PRICE_HISTORY` (default: false)
    /// - `COINGECKO_API_URL`, `GECKOTERMINAL_API_URL`
    ///
    /// Unset variables fall back to defaults; set but unparseable values are
    /// rejected.
    pub fn from_env() -> Result<Self, ConfigError> {
        let rpc_url = env::var("SOLANA_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());
        if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                var: "SOLANA_RPC_URL",
                reason: "must start with http:// or https://".to_string(),
            });
        }

        let listen_addr = parse_var::<SocketAddr>("LISTEN_ADDR", None)?
            .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let defaults = FetchConfig::default();

        let max_attempts: u32 = parse_var("FETCH_MAX_ATTEMPTS", Some(defaults.max_attempts))?
            .unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                var: "FETCH_MAX_ATTEMPTS",
                reason: "must be at least 1".to_string(),
            });
        }

        let workers: usize =
            parse_var("FETCH_WORKERS", Some(defaults.workers))?.unwrap_or(defaults.workers);
        if workers == 0 {
            return Err(ConfigError::InvalidValue {
                var: "FETCH_WORKERS",
                reason: "must be at least 1".to_string(),
            });
        }

        let signature_limit: Option<usize> = parse_var("SIGNATURE_LIMIT", None)?;
        if let Some(limit) = signature_limit {
            if limit == 0 || limit > MAX_SIGNATURE_LIMIT {
                return Err(ConfigError::InvalidValue {
                    var: "SIGNATURE_LIMIT",
                    reason: format!("must be between 1 and {}", MAX_SIGNATURE_LIMIT),
                });
            }
        }

        let rpc_timeout = millis_var("RPC_TIMEOUT_MS", 10_000)?;

        let rate_limit = RateLimitPolicy {
            default_delay: millis_var("RATE_LIMIT_DEFAULT_MS", 2_000)?,
            max_delay: millis_var("RATE_LIMIT_MAX_MS", 60_000)?,
        };
        if rate_limit.max_delay < rate_limit.default_delay {
            return Err(ConfigError::InvalidValue {
                var: "RATE_LIMIT_MAX_MS",
                reason: "must not be below RATE_LIMIT_DEFAULT_MS".to_string(),
            });
        }

        Ok(Self {
            rpc_url,
            listen_addr,
            rpc_timeout,
            rate_limit,
            request_deadline: millis_var("REQUEST_DEADLINE_MS", 60_000)?,
            fetch: FetchConfig {
                max_attempts,
                workers,
                transient_backoff: millis_var(
                    "TRANSIENT_BACKOFF_MS",
                    defaults.transient_backoff.as_millis() as u64,
                )?,
                call_timeout: rpc_timeout,
                max_retry_delay: rate_limit.max_delay,
                signature_limit,
            },
            fetch_price_history: parse_var("FETCH_PRICE_HISTORY", Some(false))?.unwrap_or(false),
            coingecko_url: env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| DEFAULT_COINGECKO_URL.to_string()),
            geckoterminal_url: env::var("GECKOTERMINAL_API_URL")
                .unwrap_or_else(|_| DEFAULT_GECKOTERMINAL_URL.to_string()),
        })
    }
}

/// Parse `var` if set, otherwise return `default`
fn parse_var<T>(var: &'static str, default: Option<T>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .to_lowercase()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                var,
                reason: format!("'{}': {}", raw, e),
            }),
        Err(_) => Ok(default),
    }
}

fn millis_var(var: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let ms = parse_var(var, Some(default_ms))?.unwrap_or(default_ms);
    Ok(Duration::from_millis(ms))
}
