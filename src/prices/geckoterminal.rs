use {
    super::{PriceClient, PriceError},
    serde::{Deserialize, Serialize},
    std::collections::HashMap,
};

/// GeckoTerminal accepts at most this many addresses per token_price call
const MAX_ADDRESSES_PER_CALL: usize = 30;

#[derive(Debug, Deserialize)]
struct TokenPriceResponse {
    data: TokenPriceData,
}

#[derive(Debug, Deserialize)]
struct TokenPriceData {
    attributes: TokenPriceAttributes,
}

#[derive(Debug, Deserialize)]
struct TokenPriceAttributes {
    /// Prices come back as decimal strings; unknown tokens map to `null`
    token_prices: HashMap<String, Option<String>>,
}

#[derive(Debug, Deserialize)]
struct PoolsResponse {
    data: Vec<Pool>,
}

#[derive(Debug, Deserialize)]
struct Pool {
    attributes: PoolAttributes,
}

#[derive(Debug, Deserialize)]
struct PoolAttributes {
    address: String,
}

#[derive(Debug, Deserialize)]
struct OhlcvResponse {
    data: OhlcvData,
}

#[derive(Debug, Deserialize)]
struct OhlcvData {
    attributes: OhlcvAttributes,
}

#[derive(Debug, Deserialize)]
struct OhlcvAttributes {
    /// `[timestamp, open, high, low, close, volume]`
    ohlcv_list: Vec<Vec<f64>>,
}

/// One OHLCV candle
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ohlcv {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl PriceClient {
    /// USD prices for `mints`, keyed by mint
    ///
    /// Mints GeckoTerminal does not know are absent from the map, and so are
    /// the mints of any chunk whose request failed.
    pub async fn get_token_prices(&self, mints: &[String]) -> HashMap<String, f64> {
        let mut prices = HashMap::new();

        for chunk in mints.chunks(MAX_ADDRESSES_PER_CALL) {
            let url = format!(
                "{}/simple/networks/solana/token_price/{}",
                self.geckoterminal_url,
                chunk.join(",")
            );
            match self.get_json::<TokenPriceResponse>(&url).await {
                Ok(response) => prices.extend(parse_token_prices(response)),
                Err(e) => log::warn!("⚠️  Token prices unavailable for {} mint(s): {}", chunk.len(), e),
            }
        }

        prices
    }

    /// Address of the top pool for `mint`, if it trades anywhere
    pub async fn get_top_pool(&self, mint: &str) -> Result<Option<String>, PriceError> {
        let url = format!(
            "{}/networks/solana/tokens/{}/pools?page=1",
            self.geckoterminal_url, mint
        );
        let response: PoolsResponse = self.get_json(&url).await?;
        Ok(response.data.into_iter().next().map(|pool| pool.attributes.address))
    }

    /// Hourly USD OHLCV candles for `pool`, newest first as returned upstream
    pub async fn get_hourly_ohlcv(&self, pool: &str) -> Result<Vec<Ohlcv>, PriceError> {
        let url = format!(
            "{}/networks/solana/pools/{}/ohlcv/hour?currency=usd",
            self.geckoterminal_url, pool
        );
        let response: OhlcvResponse = self.get_json(&url).await?;
        Ok(parse_ohlcv(response))
    }
}

fn parse_token_prices(response: TokenPriceResponse) -> HashMap<String, f64> {
    response
        .data
        .attributes
        .token_prices
        .into_iter()
        .filter_map(|(mint, price)| {
            let parsed = price.as_deref().and_then(|p| p.parse::<f64>().ok());
            if parsed.is_none() {
                log::debug!("No usable price for {}: {:?}", mint, price);
            }
            parsed.map(|p| (mint, p))
        })
        .collect()
}

fn parse_ohlcv(response: OhlcvResponse) -> Vec<Ohlcv> {
    response
        .data
        .attributes
        .ohlcv_list
        .into_iter()
        .filter_map(|row| match row.as_slice() {
            [timestamp, open, high, low, close, volume] => Some(Ohlcv {
                timestamp: *timestamp as i64,
                open: *open,
                high: *high,
                low: *low,
                close: *close,
                volume: *volume,
            }),
            _ => None,
        })
        .collect()
}
