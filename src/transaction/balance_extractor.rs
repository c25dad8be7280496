use {
    super::raw::{RawMeta, RawTokenBalance},
    serde::{Deserialize, Serialize},
};

/// Native SOL pseudo-mint (wrapped SOL mint address)
pub const SOL_MINT: &str = "So11111111111111111111111111111111111111112";

/// Represents a balance change (delta) for a single account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDelta {
    /// Account index in the transaction
    pub account_index: usize,
    /// Account address, when the index resolves to a known key
    pub account: Option<String>,
    /// Token account owner (tokens only; SOL accounts own themselves)
    pub owner: Option<String>,
    /// Mint address (for tokens) or SOL
    pub mint: String,
    /// Raw amount change (post - pre)
    pub raw_change: i128,
    /// Normalized UI amount change
    pub ui_change: f64,
    /// Decimals for this mint
    pub decimals: u8,
    /// Is this a SOL change (not token)?
    pub is_sol: bool,
}

/// Build complete account keys list (static + loaded addresses from ALTs)
///
/// Solana v0 transactions can have accounts in Address Lookup Tables (ALTs).
/// These appear in the meta's `loadedAddresses` (writable and readonly)
/// and are indexed after the static account keys.
pub fn build_full_account_keys(static_keys: &[String], meta: &RawMeta) -> Vec<String> {
    let mut all_keys = static_keys.to_vec();
    let static_count = all_keys.len();

    if let Some(loaded) = &meta.loaded_addresses {
        all_keys.extend(loaded.writable.iter().cloned());
        all_keys.extend(loaded.readonly.iter().cloned());

        if !loaded.writable.is_empty() || !loaded.readonly.is_empty() {
            log::debug!(
                "Account keys: {} total ({} static + {} writable + {} readonly ALT)",
                all_keys.len(),
                static_count,
                loaded.writable.len(),
                loaded.readonly.len()
            );
        }
    }

    all_keys
}

/// Extract all SOL balance changes from transaction metadata
///
/// Computes deltas by comparing postBalances to preBalances for each account.
/// Every non-zero lamport change is kept, fee debits included.
pub fn extract_sol_changes(meta: &RawMeta, account_keys: &[String]) -> Vec<BalanceDelta> {
    let mut deltas = Vec::new();

    for (idx, (pre, post)) in meta
        .pre_balances
        .iter()
        .zip(meta.post_balances.iter())
        .enumerate()
    {
        let raw_change = (*post as i128) - (*pre as i128);

        if raw_change == 0 {
            continue;
        }

        let account = account_keys.get(idx).cloned();
        if account.is_none() {
            log::warn!(
                "⚠️  SOL account lookup failed: idx {} >= account_keys.len() {}",
                idx,
                account_keys.len()
            );
        }

        deltas.push(BalanceDelta {
            account_index: idx,
            owner: account.clone(),
            account,
            mint: SOL_MINT.to_string(),
            raw_change,
            ui_change: raw_change as f64 / crate::rpc::LAMPORTS_PER_SOL,
            decimals: 9,
            is_sol: true,
        });
    }

    deltas
}

/// Extract all token balance changes from transaction metadata
///
/// Matches pre and post token balances by account index. Accounts that only
/// appear in the post balances were opened by the transaction; accounts that
/// only appear in the pre balances were closed.
pub fn extract_token_changes(meta: &RawMeta, account_keys: &[String]) -> Vec<BalanceDelta> {
    let empty = Vec::new();
    let pre_token_balances = meta.pre_token_balances.as_ref().unwrap_or(&empty);
    let post_token_balances = meta.post_token_balances.as_ref().unwrap_or(&empty);

    let mut deltas = Vec::new();

    for pre in pre_token_balances {
        let post = post_token_balances
            .iter()
            .find(|p| p.account_index == pre.account_index);

        let (pre_raw, pre_ui) = (pre.ui_token_amount.raw(), pre.ui_token_amount.ui());
        let (post_raw, post_ui) = match post {
            Some(p) => (p.ui_token_amount.raw(), p.ui_token_amount.ui()),
            None => (0, 0.0), // Account closed
        };

        let raw_change = (post_raw as i128) - (pre_raw as i128);
        if raw_change == 0 {
            continue;
        }

        deltas.push(token_delta(pre, account_keys, raw_change, post_ui - pre_ui));
    }

    // New token accounts (not in pre_token_balances)
    for post in post_token_balances {
        let exists_in_pre = pre_token_balances
            .iter()
            .any(|pre| pre.account_index == post.account_index);

        let post_raw = post.ui_token_amount.raw();
        if !exists_in_pre && post_raw > 0 {
            deltas.push(token_delta(
                post,
                account_keys,
                post_raw as i128,
                post.ui_token_amount.ui(),
            ));
        }
    }

    deltas
}

fn token_delta(
    balance: &RawTokenBalance,
    account_keys: &[String],
    raw_change: i128,
    ui_change: f64,
) -> BalanceDelta {
    let account_index = balance.account_index;
    let account = account_keys.get(account_index).cloned();
    if account.is_none() {
        log::warn!(
            "⚠️  Token account lookup failed: idx {} >= account_keys.len() {}",
            account_index,
            account_keys.len()
        );
    }

    BalanceDelta {
        account_index,
        account,
        owner: balance.owner.clone(),
        mint: balance.mint.clone(),
        raw_change,
        ui_change,
        decimals: balance.ui_token_amount.decimals,
        is_sol: false,
    }
}
