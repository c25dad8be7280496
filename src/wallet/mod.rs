//! Wallet snapshot assembly
//!
//! Combines the SOL balance, priced token holdings and the transaction
//! history of one address. Only an invalid address, a failed balance or
//! token-account lookup, or a fatal fetch error aborts a snapshot; price and
//! metadata lookups degrade to empty fields.

pub mod types;

pub use types::{AbandonedSignature, AbandonedSummary, TokenSnapshot, WalletSnapshot};

use {
    crate::{
        config::Config,
        fetch::{fetch_transactions, FetchConfig, FetchError, TransactionSource},
        prices::{PriceClient, PriceError},
        rpc::{types::KeyedTokenAccount, RpcClient, RpcError, LAMPORTS_PER_SOL},
    },
    solana_pubkey::Pubkey,
    std::{collections::HashMap, str::FromStr, sync::Arc},
    tokio_util::sync::CancellationToken,
};

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("{what} failed: {source}")]
    Rpc {
        what: &'static str,
        #[source]
        source: RpcError,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to build price client: {0}")]
    Price(#[from] PriceError),
}

/// Builds [`WalletSnapshot`]s; shared by every request
pub struct WalletAssembler {
    rpc: Arc<RpcClient>,
    /// Transaction history source, the RPC client unless replaced
    history: Arc<dyn TransactionSource>,
    prices: PriceClient,
    fetch: FetchConfig,
    fetch_price_history: bool,
}

impl WalletAssembler {
    pub fn new(
        rpc: Arc<RpcClient>,
        prices: PriceClient,
        fetch: FetchConfig,
        fetch_price_history: bool,
    ) -> Self {
        Self {
            history: rpc.clone(),
            rpc,
            prices,
            fetch,
            fetch_price_history,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, WalletError> {
        let rpc = RpcClient::new(
            &config.rpc_url,
            config.rpc_timeout,
            config.rate_limit,
        )
        .map_err(|source| WalletError::Rpc {
            what: "RPC client setup",
            source,
        })?;
        let prices = PriceClient::new(
            &config.coingecko_url,
            &config.geckoterminal_url,
            config.rpc_timeout,
        )?;

        Ok(Self::new(
            Arc::new(rpc),
            prices,
            config.fetch.clone(),
            config.fetch_price_history,
        ))
    }

    /// Read transaction history from `source` instead of the RPC client
    pub fn with_history_source(mut self, source: Arc<dyn TransactionSource>) -> Self {
        self.history = source;
        self
    }

    /// Build the snapshot for `address`
    ///
    /// Holdings and the transaction fetch run concurrently, and a fatal
    /// error on either side drops the other. When `cancel` fires the fetch
    /// pipeline stops and reports its pending signatures, and tokens not yet
    /// enriched keep their amount and price without metadata.
    pub async fn snapshot(
        &self,
        address: &str,
        cancel: CancellationToken,
    ) -> Result<WalletSnapshot, WalletError> {
        Pubkey::from_str(address).map_err(|e| WalletError::InvalidAddress {
            address: address.to_string(),
            reason: e.to_string(),
        })?;

        log::info!("🔍 Scanning wallet {}", address);

        let history = async {
            fetch_transactions(self.history.clone(), address, &self.fetch, cancel.clone())
                .await
                .map_err(WalletError::from)
        };
        let ((sol_balance, sol_price, tokens), report) =
            tokio::try_join!(self.holdings(address, &cancel), history)?;

        let snapshot = WalletSnapshot::assemble(address, sol_balance, sol_price, tokens, report);

        log::info!(
            "💰 Wallet {}: ${:.2} across {} token(s), {} transaction(s), {} abandoned, {} pending",
            address,
            snapshot.wallet_value,
            snapshot.tokens.len(),
            snapshot.transactions.len(),
            snapshot.abandoned.count,
            snapshot.pending.len()
        );

        Ok(snapshot)
    }

    /// SOL balance, SOL price and priced token holdings
    async fn holdings(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<(f64, Option<f64>, Vec<TokenSnapshot>), WalletError> {
        let lamports = self
            .rpc
            .get_balance(address)
            .await
            .map_err(|source| WalletError::Rpc {
                what: "getBalance",
                source,
            })?;
        let sol_balance = lamports as f64 / LAMPORTS_PER_SOL;

        let sol_price = match self.prices.get_sol_price().await {
            Ok(price) => Some(price),
            Err(e) => {
                log::warn!("⚠️  SOL price unavailable: {}", e);
                None
            }
        };

        let accounts = self
            .rpc
            .get_token_accounts_by_owner(address)
            .await
            .map_err(|source| WalletError::Rpc {
                what: "getTokenAccountsByOwner",
                source,
            })?;
        let held = aggregate_holdings(&accounts);

        let mints: Vec<String> = held.iter().map(|(mint, _)| mint.clone()).collect();
        let prices = if mints.is_empty() {
            HashMap::new()
        } else {
            self.prices.get_token_prices(&mints).await
        };

        let mut tokens = Vec::with_capacity(held.len());
        for (mint, amount) in held {
            let price = prices.get(&mint).copied();
            let token = tokio::select! {
                biased;
                _ = cancel.cancelled() => TokenSnapshot::bare(&mint, amount).with_price(price),
                token = self.describe_token(&mint, amount, price) => token,
            };
            tokens.push(token);
        }
        if cancel.is_cancelled() {
            log::warn!("⏰ Token enrichment cut short for {}", address);
        }

        Ok((sol_balance, sol_price, tokens))
    }

    async fn describe_token(&self, mint: &str, amount: f64, price: Option<f64>) -> TokenSnapshot {
        let mut token = TokenSnapshot::bare(mint, amount).with_price(price);

        match self.rpc.get_asset(mint).await {
            Ok(asset) => {
                if let Some(content) = asset.content {
                    token.name = content.metadata.name;
                    token.symbol = content.metadata.symbol;
                    token.description = content.metadata.description;
                    token.image = content.links.and_then(|links| links.image);
                }
            }
            Err(e) => log::debug!("No metadata for {}: {}", mint, e),
        }

        match self.prices.get_top_pool(mint).await {
            Ok(pool) => token.pool = pool,
            Err(e) => log::debug!("No pool for {}: {}", mint, e),
        }

        if self.fetch_price_history {
            if let Some(pool) = token.pool.as_deref() {
                match self.prices.get_hourly_ohlcv(pool).await {
                    Ok(candles) => token.history_prices = candles.iter().map(|c| c.close).collect(),
                    Err(e) => log::debug!("No price history for {}: {}", mint, e),
                }
            }
        }

        log::info!(
            "🪙 Found token {} ({}) amount={} price={:?}",
            if token.name.is_empty() { mint } else { token.name.as_str() },
            mint,
            token.amount,
            token.price
        );

        token
    }
}

/// Sum UI amounts per mint, dropping empty accounts; first-seen mint order
pub fn aggregate_holdings(accounts: &[KeyedTokenAccount]) -> Vec<(String, f64)> {
    let mut order: Vec<String> = Vec::new();
    let mut amounts: HashMap<String, f64> = HashMap::new();

    for account in accounts {
        let info = &account.account.data.parsed.info;
        if info.token_amount.raw() == 0 {
            continue;
        }
        let entry = amounts.entry(info.mint.clone()).or_insert_with(|| {
            order.push(info.mint.clone());
            0.0
        });
        *entry += info.token_amount.ui();
    }

    order
        .into_iter()
        .map(|mint| {
            let amount = amounts.get(&mint).copied().unwrap_or_default();
            (mint, amount)
        })
        .collect()
}
