//! Price data for wallet valuation
//!
//! - CoinGecko: SOL/USD spot price
//! - GeckoTerminal: token USD prices, top pool per token, pool OHLCV history
//!
//! ## API Reference
//!
//! - `{coingecko}/simple/price?ids=solana&vs_currencies=usd`
//! - `{geckoterminal}/simple/networks/solana/token_price/{mints}`
//! - `{geckoterminal}/networks/solana/tokens/{mint}/pools?page=1`
//! - `{geckoterminal}/networks/solana/pools/{pool}/ohlcv/hour?currency=usd`
//!
//! Failures here never abort a snapshot; they are logged and the affected
//! values stay empty.

pub mod coingecko;
pub mod geckoterminal;

pub use geckoterminal::Ohlcv;

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("price request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("price API error: {status} from {url}")]
    Status { status: u16, url: String },

    #[error("price missing from response: {0}")]
    Missing(String),
}

/// HTTP client for both price services
#[derive(Clone)]
pub struct PriceClient {
    http: reqwest::Client,
    coingecko_url: String,
    geckoterminal_url: String,
}

impl PriceClient {
    pub fn new(
        coingecko_url: impl Into<String>,
        geckoterminal_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, PriceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            coingecko_url: trim_base(coingecko_url.into()),
            geckoterminal_url: trim_base(geckoterminal_url.into()),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, PriceError> {
        let response = self
            .http
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PriceError::Status {
                status: response.status().as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.json().await?)
    }
}

fn trim_base(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
