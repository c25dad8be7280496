//! Backoff-aware fetch scheduler
//!
//! A bounded pool of workers drains a shared [`WorkQueue`]:
//!
//! 1. Claim the first eligible entry (or sleep until one matures / another
//!    worker requeues)
//! 2. Fetch it under a per-call timeout
//! 3. Success -> collector; RateLimited -> requeue after the server's delay;
//!    Transient -> requeue after the local backoff; Permanent -> abandon
//! 4. Retryable failures that reach `max_attempts` are abandoned
//!
//! Resolutions travel to a single collector task over a channel. The queue
//! mutex is only held for claim/requeue/release, never across an await.

use {
    super::{
        collector::{collector_task, AbandonKind, Abandonment, Resolution, ResolutionMessage, ResultSet},
        queue::{Claim, PendingWork, WorkQueue},
        FetchConfig, TransactionSource,
    },
    crate::rpc::FetchOutcome,
    solana_signature::Signature,
    std::{
        str::FromStr,
        sync::{Arc, Mutex, MutexGuard},
        time::Duration,
    },
    tokio::{
        sync::{mpsc, Notify},
        task::JoinSet,
        time::{sleep_until, timeout, Instant},
    },
    tokio_util::sync::CancellationToken,
};

pub const MAX_ATTEMPTS_EXCEEDED: &str = "max attempts exceeded";

/// State shared by the workers of one pipeline run
struct WorkerContext {
    source: Arc<dyn TransactionSource>,
    queue: Arc<Mutex<WorkQueue>>,
    /// Signalled whenever the queue changes: requeue, release, drain
    wake: Notify,
    results_tx: mpsc::Sender<ResolutionMessage>,
    cancel: CancellationToken,
    max_attempts: u32,
    transient_backoff: Duration,
    call_timeout: Duration,
    max_retry_delay: Duration,
}

impl WorkerContext {
    fn queue(&self) -> MutexGuard<'_, WorkQueue> {
        lock(&self.queue)
    }

    async fn resolve(&self, signature: String, resolution: Resolution) {
        self.queue().release(&signature);
        self.wake.notify_waiters();

        if self.results_tx.send((signature, resolution)).await.is_err() {
            log::error!("❌ Collector dropped before pipeline finished");
        }
    }

    async fn abandon(&self, work: PendingWork, kind: AbandonKind, cause: String, attempts: u32) {
        log::warn!(
            "⚠️  Abandoning {} after {} attempt(s): {}",
            work.signature,
            attempts,
            cause
        );
        self.resolve(
            work.signature,
            Resolution::Abandoned(Abandonment {
                kind,
                cause,
                attempts,
            }),
        )
        .await;
    }

    /// Requeue at the tail after `delay`, or abandon at the attempt ceiling
    async fn retry(&self, mut work: PendingWork, delay: Duration, cause: String) {
        work.attempts += 1;

        if work.attempts >= self.max_attempts {
            log::debug!("Last failure for {}: {}", work.signature, cause);
            let attempts = work.attempts;
            self.abandon(
                work,
                AbandonKind::MaxAttemptsExceeded,
                MAX_ATTEMPTS_EXCEEDED.to_string(),
                attempts,
            )
            .await;
            return;
        }

        let delay = delay.min(self.max_retry_delay);
        let now = Instant::now();
        work.not_before = now.checked_add(delay).unwrap_or(now);
        self.queue().requeue(work);
        self.wake.notify_waiters();
    }

    async fn settle(&self, work: PendingWork, outcome: FetchOutcome<crate::transaction::TransactionRecord>) {
        match outcome {
            FetchOutcome::Success(record) => {
                log::debug!("✅ Fetched {} (slot {})", work.signature, record.slot);
                self.resolve(work.signature, Resolution::Fetched(record)).await;
            }
            FetchOutcome::Permanent(cause) => {
                let attempts = work.attempts + 1;
                self.abandon(work, AbandonKind::Permanent, cause, attempts).await;
            }
            FetchOutcome::RateLimited(delay) => {
                log::info!(
                    "⏳ Rate limited, retrying {} after {:?} (attempt {})",
                    work.signature,
                    delay,
                    work.attempts + 1
                );
                self.retry(work, delay, format!("rate limited for {:?}", delay)).await;
            }
            FetchOutcome::Transient(cause) => {
                log::warn!(
                    "⚠️  Transient failure for {} (attempt {}): {}",
                    work.signature,
                    work.attempts + 1,
                    cause
                );
                self.retry(work, self.transient_backoff, cause).await;
            }
        }
    }
}

fn lock(queue: &Mutex<WorkQueue>) -> MutexGuard<'_, WorkQueue> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn worker(id: usize, ctx: Arc<WorkerContext>) {
    log::debug!("Fetch worker {} started", id);

    loop {
        if ctx.cancel.is_cancelled() {
            break;
        }

        // Registered before inspecting the queue so a notify_waiters() issued
        // between the claim and the wait below is not lost
        let wake = ctx.wake.notified();
        let claim = ctx.queue().claim(Instant::now());

        match claim {
            Claim::Ready(work) => {
                let outcome =
                    match timeout(ctx.call_timeout, ctx.source.fetch_transaction(&work.signature)).await {
                        Ok(outcome) => outcome,
                        Err(_) => FetchOutcome::Transient(format!("timed out after {:?}", ctx.call_timeout)),
                    };
                ctx.settle(work, outcome).await;
            }
            Claim::NotBefore(at) => {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    _ = sleep_until(at) => {}
                    _ = wake => {}
                }
            }
            Claim::Idle => {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => break,
                    _ = wake => {}
                }
            }
            Claim::Drained => break,
        }
    }

    log::debug!("Fetch worker {} stopped", id);
}

/// Drive every signature to a terminal state, or stop early on cancellation
///
/// Signatures that do not parse as a transaction signature are abandoned
/// without a fetch. Returns the collected results and the signatures left
/// unresolved (empty unless `cancel` fired).
pub async fn run(
    source: Arc<dyn TransactionSource>,
    signatures: Vec<String>,
    config: &FetchConfig,
    cancel: &CancellationToken,
) -> (ResultSet, Vec<String>) {
    let (results_tx, results_rx) = mpsc::channel::<ResolutionMessage>(config.workers.max(1) * 4);
    let collector = tokio::spawn(collector_task(results_rx));

    let (valid, invalid): (Vec<String>, Vec<String>) = signatures
        .into_iter()
        .partition(|sig| Signature::from_str(sig).is_ok());

    for signature in invalid {
        let abandonment = Abandonment {
            kind: AbandonKind::Permanent,
            cause: "invalid signature".to_string(),
            attempts: 0,
        };
        if results_tx
            .send((signature, Resolution::Abandoned(abandonment)))
            .await
            .is_err()
        {
            log::error!("❌ Collector dropped before pipeline started");
        }
    }

    let queue = Arc::new(Mutex::new(WorkQueue::seed(valid, Instant::now())));
    let (queued, workers) = {
        let queue = lock(&queue);
        let workers = if queue.is_empty() { 0 } else { config.workers.max(1).min(queue.len()) };
        (queue.len(), workers)
    };

    // A worker panic must not leave the others waiting on a claim that will
    // never be released
    let stop = cancel.child_token();

    let ctx = Arc::new(WorkerContext {
        source,
        queue: queue.clone(),
        wake: Notify::new(),
        results_tx,
        cancel: stop.clone(),
        max_attempts: config.max_attempts.max(1),
        transient_backoff: config.transient_backoff,
        call_timeout: config.call_timeout,
        max_retry_delay: config.max_retry_delay,
    });

    log::info!("🚀 Fetching {} transactions with {} worker(s)", queued, workers);

    let mut pool = JoinSet::new();
    for id in 0..workers {
        pool.spawn(worker(id, ctx.clone()));
    }
    drop(ctx);

    while let Some(joined) = pool.join_next().await {
        if let Err(e) = joined {
            log::error!("❌ Fetch worker failed: {}", e);
            stop.cancel();
        }
    }

    let orphaned = lock(&queue).in_flight();
    if orphaned > 0 {
        log::warn!("⚠️  {} claim(s) never released, reporting them as pending", orphaned);
    }

    let results = match collector.await {
        Ok(results) => results,
        Err(e) => {
            log::error!("❌ Collector task failed: {}", e);
            ResultSet::default()
        }
    };

    let pending = lock(&queue).pending_signatures();

    log::info!(
        "📊 Fetch finished: {} fetched, {} abandoned, {} pending",
        results.transactions.len(),
        results.abandoned.len(),
        pending.len()
    );

    (results, pending)
}
