//! Fetch Trace - run the transaction fetch pipeline for one address
//!
//! Lists every signature of the address, fetches each transaction through
//! the rate-limit aware scheduler and prints the resulting report as JSON on
//! stdout. Progress, rate-limit waits and abandonments are logged to stderr.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin fetch_trace -- --address <WALLET_ADDRESS>
//! RUST_LOG=walletflow=debug cargo run --bin fetch_trace -- <WALLET_ADDRESS>
//! ```
//!
//! Ctrl-C stops the run early; the report then lists the pending
//! signatures. `FETCH_ADDRESS` may replace the argument.

use {
    serde_json::json,
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
    walletflow::{fetch_transactions, Config, RpcClient},
};

fn address_from_args() -> Result<String, Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let address = match args.as_slice() {
        [flag, value] if flag == "--address" => Some(value.clone()),
        [value] if !value.starts_with("--") => Some(value.clone()),
        [] => std::env::var("FETCH_ADDRESS").ok(),
        _ => None,
    };

    address.ok_or_else(|| "usage: fetch_trace [--address] <WALLET_ADDRESS>".into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("reqwest", log::LevelFilter::Warn)
        .target(env_logger::Target::Stderr)
        .init();

    let address = address_from_args()?;
    let config = Config::from_env()?;

    log::info!("🔍 Tracing transactions for {}", address);
    log::info!("   RPC: {}", config.rpc_url);

    let client = RpcClient::new(
        &config.rpc_url,
        config.rpc_timeout,
        config.rate_limit,
    )?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("🛑 Ctrl-C received, finishing in-flight fetches");
                cancel.cancel();
            }
        });
    }

    let started = std::time::Instant::now();
    let report = fetch_transactions(Arc::new(client), &address, &config.fetch, cancel).await?;

    log::info!(
        "📊 {} signatures in {:.1}s: {} fetched, {} abandoned, {} pending",
        report.signature_count,
        started.elapsed().as_secs_f64(),
        report.results.transactions.len(),
        report.results.abandoned.len(),
        report.pending.len()
    );

    let abandoned: Vec<_> = report
        .results
        .abandoned
        .iter()
        .map(|(signature, abandonment)| {
            json!({
                "signature": signature,
                "kind": abandonment.kind,
                "cause": abandonment.cause,
                "attempts": abandonment.attempts,
            })
        })
        .collect();

    let output = json!({
        "address": report.address,
        "signatureCount": report.signature_count,
        "transactions": report.results.transactions_by_block_time(),
        "abandoned": abandoned,
        "pending": report.pending,
        "cancelled": report.cancelled,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
