use {
    crate::{
        fetch::{Abandonment, FetchReport},
        transaction::TransactionRecord,
    },
    chrono::{DateTime, Utc},
    serde::Serialize,
};

/// One SPL token holding, priced where a price is known
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenSnapshot {
    pub name: String,
    pub symbol: String,
    /// Mint address
    pub address: String,
    /// Top GeckoTerminal pool for the mint
    pub pool: Option<String>,
    pub description: String,
    pub image: Option<String>,
    pub amount: f64,
    /// USD price; `None` when no price service knows the token
    pub price: Option<f64>,
    /// Hourly close prices, newest first
    pub history_prices: Vec<f64>,
    pub value: Option<f64>,
}

impl TokenSnapshot {
    /// Holding with no metadata and no price yet
    pub fn bare(mint: &str, amount: f64) -> Self {
        Self {
            name: String::new(),
            symbol: String::new(),
            address: mint.to_string(),
            pool: None,
            description: String::new(),
            image: None,
            amount,
            price: None,
            history_prices: Vec::new(),
            value: None,
        }
    }

    pub fn with_price(mut self, price: Option<f64>) -> Self {
        self.price = price;
        self.value = price.map(|p| p * self.amount);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbandonedSignature {
    pub signature: String,
    #[serde(flatten)]
    pub abandonment: Abandonment,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AbandonedSummary {
    pub count: usize,
    pub signatures: Vec<AbandonedSignature>,
}

/// Full wallet view returned by `GET /{address}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSnapshot {
    pub address: String,
    pub sol_balance: f64,
    /// `None` when the SOL price was unavailable
    pub sol_value: Option<f64>,
    pub wallet_value: f64,
    pub tokens: Vec<TokenSnapshot>,
    /// Newest first
    pub transactions: Vec<TransactionRecord>,
    pub abandoned: AbandonedSummary,
    /// Signatures the request deadline left unfetched
    pub pending: Vec<String>,
    #[serde(rename = "last_updated")]
    pub last_updated: DateTime<Utc>,
}

impl WalletSnapshot {
    pub fn assemble(
        address: &str,
        sol_balance: f64,
        sol_price: Option<f64>,
        tokens: Vec<TokenSnapshot>,
        report: FetchReport,
    ) -> Self {
        let sol_value = sol_price.map(|price| sol_balance * price);
        let wallet_value = wallet_value(sol_value, &tokens);

        let transactions = report
            .results
            .transactions_by_block_time()
            .into_iter()
            .cloned()
            .collect();

        let mut signatures: Vec<AbandonedSignature> = report
            .results
            .abandoned
            .into_iter()
            .map(|(signature, abandonment)| AbandonedSignature {
                signature,
                abandonment,
            })
            .collect();
        signatures.sort_by(|a, b| a.signature.cmp(&b.signature));

        Self {
            address: address.to_string(),
            sol_balance,
            sol_value,
            wallet_value,
            tokens,
            transactions,
            abandoned: AbandonedSummary {
                count: signatures.len(),
                signatures,
            },
            pending: report.pending,
            last_updated: Utc::now(),
        }
    }
}

/// SOL value plus every priced token; unpriced tokens contribute nothing
pub fn wallet_value(sol_value: Option<f64>, tokens: &[TokenSnapshot]) -> f64 {
    sol_value.unwrap_or(0.0) + tokens.iter().filter_map(|t| t.value).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            fetch::{AbandonKind, ResultSet},
            transaction::{
                tests::{sample_result, SIG},
                TransactionRecord,
            },
        },
    };

    fn record(signature: &str, block_time: Option<i64>) -> TransactionRecord {
        let mut record = TransactionRecord::from_rpc_result(SIG, sample_result(SIG)).unwrap();
        record.signature = signature.to_string();
        record.block_time = block_time;
        record
    }

    #[test]
    fn test_unpriced_tokens_excluded_from_value() {
        let tokens = vec![
            TokenSnapshot::bare("MintA", 10.0).with_price(Some(2.5)),
            TokenSnapshot::bare("MintB", 1000.0).with_price(None),
        ];

        assert_eq!(tokens[0].value, Some(25.0));
        assert_eq!(tokens[1].value, None);
        assert_eq!(wallet_value(Some(100.0), &tokens), 125.0);
        assert_eq!(wallet_value(None, &tokens), 25.0);
    }

    #[test]
    fn test_assemble_orders_and_summarises() {
        let mut results = ResultSet::default();
        results.transactions.insert("old".into(), record("old", Some(100)));
        results.transactions.insert("new".into(), record("new", Some(200)));
        results.abandoned.insert(
            "zz".into(),
            Abandonment {
                kind: AbandonKind::Permanent,
                cause: "transaction not found".into(),
                attempts: 1,
            },
        );
        results.abandoned.insert(
            "aa".into(),
            Abandonment {
                kind: AbandonKind::MaxAttemptsExceeded,
                cause: "max attempts exceeded".into(),
                attempts: 10,
            },
        );

        let report = FetchReport {
            address: "wallet".into(),
            signature_count: 5,
            results,
            pending: vec!["later".into()],
            cancelled: true,
        };

        let snapshot = WalletSnapshot::assemble("wallet", 2.0, Some(150.0), vec![], report);

        assert_eq!(snapshot.sol_value, Some(300.0));
        assert_eq!(snapshot.wallet_value, 300.0);
        let order: Vec<&str> = snapshot.transactions.iter().map(|t| t.signature.as_str()).collect();
        assert_eq!(order, vec!["new", "old"]);
        assert_eq!(snapshot.abandoned.count, 2);
        assert_eq!(snapshot.abandoned.signatures[0].signature, "aa");
        assert_eq!(snapshot.pending, vec!["later".to_string()]);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let tokens = vec![TokenSnapshot::bare("MintB", 3.0)];
        let snapshot = WalletSnapshot::assemble("wallet", 1.0, None, tokens, FetchReport::default());
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["solBalance"], 1.0);
        assert!(json["solValue"].is_null());
        assert_eq!(json["walletValue"], 0.0);
        assert!(json["tokens"][0]["price"].is_null());
        assert!(json["tokens"][0]["history_prices"].is_array());
        assert_eq!(json["abandoned"]["count"], 0);
        assert!(json["last_updated"].is_string());
    }

    #[test]
    fn test_abandoned_entry_flattens() {
        let entry = AbandonedSignature {
            signature: "sig".into(),
            abandonment: Abandonment {
                kind: AbandonKind::MaxAttemptsExceeded,
                cause: "max attempts exceeded".into(),
                attempts: 3,
            },
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["signature"], "sig");
        assert_eq!(json["kind"], "maxAttemptsExceeded");
        assert_eq!(json["attempts"], 3);
    }
}
