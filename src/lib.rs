//! # walletflow
//!
//! Wallet snapshot service for Solana addresses.
//!
//! A snapshot combines the SOL balance, SPL token holdings priced through
//! CoinGecko/GeckoTerminal, and the full transaction history of the address.
//! The history is pulled by a rate-limit aware fetch pipeline (see [`fetch`])
//! which keeps retrying upstream refusals at the pace the RPC node asks for,
//! and reports every signature it had to give up on.
//!
//! ## Module Organization
//!
//! - `rpc` - JSON-RPC client and outcome classification
//! - `transaction` - Parsed transaction records and balance deltas
//! - `fetch` - Signature listing, work queue, scheduler, result collector
//! - `prices` - CoinGecko and GeckoTerminal price clients
//! - `wallet` - Snapshot assembly
//! - `server` - HTTP front (`GET /{address}`)
//! - `config` - Environment configuration

pub mod config;
pub mod fetch;
pub mod prices;
pub mod rpc;
pub mod server;
pub mod transaction;
pub mod wallet;

pub use config::{Config, ConfigError};
pub use fetch::{fetch_transactions, FetchConfig, FetchError, FetchReport, ResultSet, TransactionSource};
pub use rpc::{FetchOutcome, RpcClient};
pub use transaction::TransactionRecord;
pub use wallet::{WalletAssembler, WalletSnapshot};
