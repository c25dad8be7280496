//! Wallet Server - HTTP wallet snapshot service
//!
//! Serves `GET /{address}` with the SOL balance, priced token holdings and
//! full transaction history of a Solana address.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin wallet_server
//! curl http://localhost:3000/9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM
//! ```
//!
//! See [`walletflow::Config::from_env`] for the environment variables.

use {
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
    walletflow::{server, Config, WalletAssembler},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    // HTTP client/server internals stay at warn unless RUST_LOG names them
    let log_level = std::env::var("RUST_LOG").unwrap_or_default();
    for module in ["hyper", "hyper_util", "reqwest"] {
        if !log_level.contains(module) {
            builder.filter_module(module, log::LevelFilter::Warn);
        }
    }
    builder.target(env_logger::Target::Stderr).init();

    let config = Config::from_env()?;

    log::info!("🚀 Starting wallet server...");
    log::info!("📊 Configuration:");
    log::info!("   SOLANA_RPC_URL: {}", config.rpc_url);
    log::info!("   LISTEN_ADDR: {}", config.listen_addr);
    log::info!("   RPC timeout: {:?}", config.rpc_timeout);
    log::info!("   Request deadline: {:?}", config.request_deadline);
    log::info!(
        "   Fetch: {} worker(s), {} max attempts, {:?} transient backoff",
        config.fetch.workers,
        config.fetch.max_attempts,
        config.fetch.transient_backoff
    );
    log::info!("   Price history: {}", config.fetch_price_history);

    let state = Arc::new(server::ServerState {
        assembler: WalletAssembler::from_config(&config)?,
        request_deadline: config.request_deadline,
    });

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => log::info!("🛑 Ctrl-C received, shutting down"),
                Err(e) => log::error!("❌ Failed to listen for Ctrl-C: {}", e),
            }
            shutdown.cancel();
        });
    }

    server::run_server(config.listen_addr, state, shutdown).await?;

    log::info!("✅ Wallet server shut down cleanly");
    Ok(())
}
