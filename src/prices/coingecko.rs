use {
    super::{PriceClient, PriceError},
    std::collections::HashMap,
};

/// `simple/price` response: `{"solana": {"usd": 123.45}}`
type SimplePriceResponse = HashMap<String, HashMap<String, f64>>;

impl PriceClient {
    /// Current SOL price in USD
    pub async fn get_sol_price(&self) -> Result<f64, PriceError> {
        let url = format!(
            "{}/simple/price?ids=solana&vs_currencies=usd",
            self.coingecko_url
        );
        let response: SimplePriceResponse = self.get_json(&url).await?;
        sol_usd(&response)
    }
}

fn sol_usd(response: &SimplePriceResponse) -> Result<f64, PriceError> {
    response
        .get("solana")
        .and_then(|prices| prices.get("usd"))
        .copied()
        .ok_or_else(|| PriceError::Missing("solana/usd".to_string()))
}
