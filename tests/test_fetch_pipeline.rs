//! Integration tests for the transaction fetch pipeline
//!
//! A scripted in-memory source stands in for the RPC node. Each signature
//! gets a script of outcomes that is replayed call by call, then a fallback
//! outcome repeated forever. Tests run on a paused clock, so delays of
//! several seconds complete instantly and dispatch times are exact.
//!
//! Key properties tested:
//! - Every listed signature ends fetched, abandoned or (on cancel) pending
//! - Rate-limited entries are not redispatched before their delay elapses
//! - Permanent failures are abandoned after a single attempt
//! - Retryable failures, rate limits included, stop at the attempt ceiling
//! - Server-requested delays are capped by `max_retry_delay`
//! - Listing failures and invalid addresses are fatal

#[cfg(test)]
mod fetch_pipeline_tests {
    use {
        async_trait::async_trait,
        std::{
            collections::{HashMap, HashSet, VecDeque},
            sync::{Arc, Mutex},
            time::Duration,
        },
        tokio::time::Instant,
        tokio_util::sync::CancellationToken,
        walletflow::{
            fetch::{AbandonKind, FetchError},
            fetch_transactions,
            rpc::types::SignatureInfo,
            transaction::{TransactionRecord, TransactionStatus},
            FetchConfig, FetchOutcome, TransactionSource,
        },
    };

    const WALLET: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Ok,
        RateLimited(u64),
        Transient,
        Permanent(&'static str),
        /// Takes this many seconds, then succeeds
        Slow(u64),
        /// Never answers
        Hang,
    }

    struct ScriptedSource {
        listing: FetchOutcome<Vec<String>>,
        scripts: Mutex<HashMap<String, (VecDeque<Step>, Step)>>,
        dispatches: Mutex<Vec<(String, Instant)>>,
        list_calls: Mutex<usize>,
    }

    impl ScriptedSource {
        fn new(signatures: &[String]) -> Self {
            Self {
                listing: FetchOutcome::Success(signatures.to_vec()),
                scripts: Mutex::new(HashMap::new()),
                dispatches: Mutex::new(Vec::new()),
                list_calls: Mutex::new(0),
            }
        }

        fn failing_listing(outcome: FetchOutcome<Vec<String>>) -> Self {
            Self {
                listing: outcome,
                ..Self::new(&[])
            }
        }

        fn script(self, signature: &str, steps: &[Step], then: Step) -> Self {
            self.scripts
                .lock()
                .unwrap()
                .insert(signature.to_string(), (steps.iter().copied().collect(), then));
            self
        }

        fn dispatch_times(&self, signature: &str) -> Vec<Instant> {
            self.dispatches
                .lock()
                .unwrap()
                .iter()
                .filter(|(sig, _)| sig == signature)
                .map(|(_, at)| *at)
                .collect()
        }

        fn total_dispatches(&self) -> usize {
            self.dispatches.lock().unwrap().len()
        }

        fn next_step(&self, signature: &str) -> Step {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(signature) {
                Some((steps, then)) => steps.pop_front().unwrap_or(*then),
                None => Step::Ok,
            }
        }
    }

    #[async_trait]
    impl TransactionSource for ScriptedSource {
        async fn list_signatures(
            &self,
            _address: &str,
            _limit: Option<usize>,
        ) -> FetchOutcome<Vec<SignatureInfo>> {
            *self.list_calls.lock().unwrap() += 1;
            self.listing.clone().map(|signatures| {
                signatures
                    .into_iter()
                    .enumerate()
                    .map(|(i, signature)| SignatureInfo {
                        signature,
                        slot: 1_000 - i as u64,
                        err: None,
                        memo: None,
                        block_time: Some(1_700_000_000 - i as i64),
                        confirmation_status: Some("finalized".to_string()),
                    })
                    .collect()
            })
        }

        async fn fetch_transaction(&self, signature: &str) -> FetchOutcome<TransactionRecord> {
            self.dispatches
                .lock()
                .unwrap()
                .push((signature.to_string(), Instant::now()));

            match self.next_step(signature) {
                Step::Ok => FetchOutcome::Success(record(signature)),
                Step::RateLimited(secs) => FetchOutcome::RateLimited(Duration::from_secs(secs)),
                Step::Transient => FetchOutcome::Transient("HTTP 503 Service Unavailable".to_string()),
                Step::Permanent(cause) => FetchOutcome::Permanent(cause.to_string()),
                Step::Slow(secs) => {
                    tokio::time::sleep(Duration::from_secs(secs)).await;
                    FetchOutcome::Success(record(signature))
                }
                Step::Hang => std::future::pending().await,
            }
        }
    }

    fn sig(i: u8) -> String {
        let mut bytes = [7u8; 64];
        bytes[0] = i;
        bytes[63] = i.wrapping_mul(31);
        solana_signature::Signature::from(bytes).to_string()
    }

    fn sigs(n: u8) -> Vec<String> {
        (1..=n).map(sig).collect()
    }

    fn record(signature: &str) -> TransactionRecord {
        TransactionRecord {
            signature: signature.to_string(),
            slot: 250_000_000,
            block_time: Some(1_700_000_000),
            fee: 5_000,
            status: TransactionStatus::Success,
            sol_changes: Vec::new(),
            token_changes: Vec::new(),
            instructions: Vec::new(),
            signatures: vec![signature.to_string()],
            version: "0".to_string(),
            compute_units_consumed: Some(1_200),
            log_messages: Vec::new(),
        }
    }

    fn config(workers: usize, max_attempts: u32) -> FetchConfig {
        FetchConfig {
            max_attempts,
            workers,
            transient_backoff: Duration::from_secs(1),
            call_timeout: Duration::from_secs(5),
            max_retry_delay: Duration::from_secs(60),
            signature_limit: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_signatures_succeed() {
        let signatures = sigs(3);
        let source = Arc::new(ScriptedSource::new(&signatures));

        let report = fetch_transactions(source.clone(), WALLET, &config(4, 10), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.signature_count, 3);
        assert_eq!(report.results.transactions.len(), 3);
        assert!(report.results.abandoned.is_empty());
        assert!(report.is_complete());
        assert!(!report.cancelled);
        assert_eq!(source.total_dispatches(), 3);
        for signature in &signatures {
            assert_eq!(report.results.transactions[signature].signature, *signature);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_redispatch_respects_delay() {
        let signatures = sigs(2);
        let (a, b) = (signatures[0].clone(), signatures[1].clone());
        let source = Arc::new(ScriptedSource::new(&signatures).script(
            &a,
            &[Step::RateLimited(2), Step::RateLimited(2)],
            Step::Ok,
        ));

        let report = fetch_transactions(source.clone(), WALLET, &config(1, 10), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.results.transactions.contains_key(&a));
        assert!(report.results.transactions.contains_key(&b));
        assert!(report.results.abandoned.is_empty());

        let times = source.dispatch_times(&a);
        assert_eq!(times.len(), 3, "two refusals then a success");
        for pair in times.windows(2) {
            assert!(
                pair[1] - pair[0] >= Duration::from_secs(2),
                "redispatched after {:?}",
                pair[1] - pair[0]
            );
        }
        assert_eq!(source.dispatch_times(&b).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_entry_does_not_block_others() {
        let signatures = sigs(3);
        let source = Arc::new(ScriptedSource::new(&signatures).script(
            &signatures[0],
            &[Step::RateLimited(30)],
            Step::Ok,
        ));
        let start = Instant::now();

        let report = fetch_transactions(source.clone(), WALLET, &config(1, 10), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.results.transactions.len(), 3);
        // The other two were served while the first one waited
        for signature in &signatures[1..] {
            let times = source.dispatch_times(signature);
            assert!(times[0] - start < Duration::from_secs(1));
        }
        let retried = source.dispatch_times(&signatures[0]);
        assert!(retried[1] - retried[0] >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_rate_limit_delay_capped() {
        let signatures = sigs(2);
        let (a, b) = (signatures[0].clone(), signatures[1].clone());
        let source = Arc::new(ScriptedSource::new(&signatures).script(
            &a,
            &[Step::RateLimited(u64::MAX)],
            Step::Ok,
        ));

        let report = fetch_transactions(source.clone(), WALLET, &config(2, 10), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.is_complete());
        assert!(report.results.transactions.contains_key(&a));
        assert!(report.results.transactions.contains_key(&b));

        let times = source.dispatch_times(&a);
        assert_eq!(times.len(), 2);
        let waited = times[1] - times[0];
        assert!(waited >= Duration::from_secs(60), "redispatched after {:?}", waited);
        assert!(waited < Duration::from_secs(61), "redispatched after {:?}", waited);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_refusals_hit_attempt_ceiling() {
        let signatures = sigs(1);
        let r = signatures[0].clone();
        let source = Arc::new(ScriptedSource::new(&signatures).script(&r, &[], Step::RateLimited(2)));

        let report = fetch_transactions(source.clone(), WALLET, &config(1, 3), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.is_complete());
        let abandonment = &report.results.abandoned[&r];
        assert_eq!(abandonment.kind, AbandonKind::MaxAttemptsExceeded);
        assert_eq!(abandonment.cause, "max attempts exceeded");
        assert_eq!(abandonment.attempts, 3);

        let times = source.dispatch_times(&r);
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_secs(2));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_abandoned_once() {
        let signatures = sigs(2);
        let c = signatures[0].clone();
        let source = Arc::new(ScriptedSource::new(&signatures).script(&c, &[], Step::Permanent("not found")));

        let report = fetch_transactions(source.clone(), WALLET, &config(2, 10), CancellationToken::new())
            .await
            .unwrap();

        let abandonment = &report.results.abandoned[&c];
        assert_eq!(abandonment.kind, AbandonKind::Permanent);
        assert_eq!(abandonment.cause, "not found");
        assert_eq!(abandonment.attempts, 1);
        assert_eq!(source.dispatch_times(&c).len(), 1);
        assert_eq!(report.results.transactions.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_hit_attempt_ceiling() {
        let signatures = sigs(1);
        let d = signatures[0].clone();
        let source = Arc::new(ScriptedSource::new(&signatures).script(&d, &[], Step::Transient));

        let report = fetch_transactions(source.clone(), WALLET, &config(1, 3), CancellationToken::new())
            .await
            .unwrap();

        let abandonment = &report.results.abandoned[&d];
        assert_eq!(abandonment.kind, AbandonKind::MaxAttemptsExceeded);
        assert_eq!(abandonment.cause, "max attempts exceeded");
        assert_eq!(abandonment.attempts, 3);
        assert_eq!(source.dispatch_times(&d).len(), 3);
        assert!(report.results.transactions.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success_waits_local_backoff() {
        let signatures = sigs(1);
        let e = signatures[0].clone();
        let source = Arc::new(ScriptedSource::new(&signatures).script(&e, &[Step::Transient], Step::Ok));

        let report = fetch_transactions(source.clone(), WALLET, &config(1, 10), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.results.transactions.contains_key(&e));
        let times = source.dispatch_times(&e);
        assert_eq!(times.len(), 2);
        assert!(times[1] - times[0] >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_call_times_out_as_transient() {
        let signatures = sigs(1);
        let h = signatures[0].clone();
        let source = Arc::new(ScriptedSource::new(&signatures).script(&h, &[Step::Hang], Step::Ok));

        let report = fetch_transactions(source.clone(), WALLET, &config(1, 10), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.results.transactions.contains_key(&h));
        let times = source.dispatch_times(&h);
        assert_eq!(times.len(), 2);
        // call timeout (5s) plus transient backoff (1s)
        assert!(times[1] - times[0] >= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_run_partitions_signatures() {
        let signatures = sigs(10);
        let mut source = ScriptedSource::new(&signatures);
        for signature in &signatures {
            source = source.script(signature, &[], Step::Slow(1));
        }
        let source = Arc::new(source);

        let cancel = CancellationToken::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(2_500)).await;
                cancel.cancel();
            });
        }

        let start = Instant::now();
        let report = fetch_transactions(source.clone(), WALLET, &config(1, 10), cancel)
            .await
            .unwrap();

        // Cancel at 2.5s, the in-flight call finishes at 3s
        assert!(start.elapsed() <= Duration::from_millis(2_500) + Duration::from_secs(5));
        assert!(!report.is_complete());
        assert!(report.cancelled);
        assert_eq!(report.results.transactions.len(), 3);
        assert_eq!(report.results.len() + report.pending.len(), signatures.len());

        let mut seen: HashSet<&String> = report.results.transactions.keys().collect();
        seen.extend(report.results.abandoned.keys());
        for signature in &report.pending {
            assert!(seen.insert(signature), "{} both resolved and pending", signature);
        }
        let all: HashSet<&String> = signatures.iter().collect();
        assert_eq!(seen, all);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_listing() {
        let source = Arc::new(ScriptedSource::new(&sigs(2)));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = fetch_transactions(source, WALLET, &config(1, 10), cancel).await;
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listing_failure_is_fatal() {
        for outcome in [
            FetchOutcome::RateLimited(Duration::from_secs(10)),
            FetchOutcome::Transient("HTTP 502 Bad Gateway".to_string()),
            FetchOutcome::Permanent("rpc error -32602: invalid params".to_string()),
        ] {
            let source = Arc::new(ScriptedSource::failing_listing(outcome));

            let result = fetch_transactions(source.clone(), WALLET, &config(2, 10), CancellationToken::new()).await;

            assert!(matches!(result, Err(FetchError::SignatureListing(_))));
            assert_eq!(source.total_dispatches(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_address_rejected_without_calls() {
        let source = Arc::new(ScriptedSource::new(&sigs(1)));

        let result = fetch_transactions(source.clone(), "not-a-wallet", &config(1, 10), CancellationToken::new()).await;

        assert!(matches!(result, Err(FetchError::InvalidAddress { .. })));
        assert_eq!(*source.list_calls.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_and_malformed_signatures() {
        let mut listed = sigs(2);
        listed.push(listed[0].clone());
        listed.push("definitely-not-a-signature".to_string());
        let source = Arc::new(ScriptedSource::new(&listed));

        let report = fetch_transactions(source.clone(), WALLET, &config(2, 10), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.signature_count, 3);
        assert_eq!(report.results.transactions.len(), 2);
        let malformed = &report.results.abandoned["definitely-not-a-signature"];
        assert_eq!(malformed.kind, AbandonKind::Permanent);
        assert_eq!(malformed.attempts, 0);
        assert_eq!(source.dispatch_times(&listed[0]).len(), 1);
        assert_eq!(source.total_dispatches(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_pool_resolves_each_signature_once() {
        let signatures = sigs(24);
        let mut source = ScriptedSource::new(&signatures);
        for (i, signature) in signatures.iter().enumerate() {
            source = match i % 4 {
                0 => source.script(signature, &[Step::RateLimited(3), Step::Transient], Step::Ok),
                1 => source.script(signature, &[Step::Slow(2)], Step::Ok),
                2 => source.script(signature, &[], Step::Permanent("transaction not found")),
                _ => source,
            };
        }
        let source = Arc::new(source);

        let report = fetch_transactions(source.clone(), WALLET, &config(4, 10), CancellationToken::new())
            .await
            .unwrap();

        assert!(report.is_complete());
        assert_eq!(report.results.len(), 24);
        assert_eq!(report.results.transactions.len(), 18);
        assert_eq!(report.results.abandoned.len(), 6);
        for signature in report.results.transactions.keys() {
            assert!(!report.results.abandoned.contains_key(signature));
        }
        // 6 signatures needed three dispatches, the rest one each
        assert_eq!(source.total_dispatches(), 6 * 3 + 18);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_history() {
        let source = Arc::new(ScriptedSource::new(&[]));

        let report = fetch_transactions(source, WALLET, &config(4, 10), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.signature_count, 0);
        assert!(report.results.is_empty());
        assert!(report.is_complete());
    }
}
