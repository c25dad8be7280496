use {
    crate::transaction::TransactionRecord,
    serde::Serialize,
    std::collections::HashMap,
    tokio::sync::mpsc,
};

/// Why a signature was given up on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AbandonKind {
    /// Upstream answered with a non-retryable failure
    Permanent,
    /// Retryable failures hit the attempt ceiling
    MaxAttemptsExceeded,
}

/// Terminal record of an abandoned signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Abandonment {
    pub kind: AbandonKind,
    pub cause: String,
    /// Fetch attempts made before giving up
    pub attempts: u32,
}

/// Terminal state of one signature, sent from a worker to the collector
#[derive(Debug, Clone)]
pub enum Resolution {
    Fetched(TransactionRecord),
    Abandoned(Abandonment),
}

/// Message sent through the channel from fetch workers to the collector task
pub type ResolutionMessage = (String, Resolution);

/// Final mapping from signature to record or abandonment
///
/// A signature appears in at most one of the two maps.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    pub transactions: HashMap<String, TransactionRecord>,
    pub abandoned: HashMap<String, Abandonment>,
}

impl ResultSet {
    /// Resolved signatures (fetched + abandoned)
    pub fn len(&self) -> usize {
        self.transactions.len() + self.abandoned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.transactions.contains_key(signature) || self.abandoned.contains_key(signature)
    }

    /// Fetched records, newest block time first; records without a block
    /// time sort last, ties broken by slot then signature
    pub fn transactions_by_block_time(&self) -> Vec<&TransactionRecord> {
        let mut records: Vec<&TransactionRecord> = self.transactions.values().collect();
        records.sort_by(|a, b| {
            b.block_time
                .cmp(&a.block_time)
                .then_with(|| b.slot.cmp(&a.slot))
                .then_with(|| a.signature.cmp(&b.signature))
        });
        records
    }
}

/// Accumulates resolutions; the first resolution for a signature wins
#[derive(Debug, Default)]
pub struct ResultCollector {
    results: ResultSet,
    duplicates: usize,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolution, returning `false` if the signature was already
    /// resolved (the new resolution is discarded)
    pub fn record(&mut self, signature: String, resolution: Resolution) -> bool {
        if self.results.contains(&signature) {
            self.duplicates += 1;
            log::warn!("⚠️  Duplicate resolution for {} ignored", signature);
            return false;
        }

        match resolution {
            Resolution::Fetched(record) => {
                self.results.transactions.insert(signature, record);
            }
            Resolution::Abandoned(abandonment) => {
                self.results.abandoned.insert(signature, abandonment);
            }
        }
        true
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Hand over the accumulated results
    ///
    /// Consumes the collector; the collector task only calls this once every
    /// sender has been dropped, so no partial view escapes.
    pub fn drain(self) -> ResultSet {
        self.results
    }
}

/// Background task that receives resolutions from the channel until every
/// worker has dropped its sender, then returns the final set
pub async fn collector_task(mut receiver: mpsc::Receiver<ResolutionMessage>) -> ResultSet {
    let mut collector = ResultCollector::new();

    while let Some((signature, resolution)) = receiver.recv().await {
        collector.record(signature, resolution);
    }

    if collector.duplicates() > 0 {
        log::warn!(
            "⚠️  Collector discarded {} duplicate resolutions",
            collector.duplicates()
        );
    }

    collector.drain()
}
