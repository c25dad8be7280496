//! Delay-respecting work queue
//!
//! FIFO for fairness, except that an entry whose `not_before` lies in the
//! future is skipped until it matures. Claimed entries are tracked as in
//! flight until they are released or re-enqueued, so the queue can tell
//! "drained" apart from "waiting on a worker that may still requeue".

use {
    std::collections::{HashSet, VecDeque},
    tokio::time::Instant,
};

/// A signature waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWork {
    pub signature: String,
    /// Failed attempts so far
    pub attempts: u32,
    /// Earliest time the next attempt may be dispatched
    pub not_before: Instant,
}

/// Result of trying to claim work
#[derive(Debug, PartialEq, Eq)]
pub enum Claim {
    /// An eligible entry, now in flight for the caller
    Ready(PendingWork),
    /// Nothing eligible yet; the earliest entry matures at this instant
    NotBefore(Instant),
    /// Queue empty but other claims are in flight and may requeue
    Idle,
    /// Queue empty and nothing in flight
    Drained,
}

#[derive(Debug, Default)]
pub struct WorkQueue {
    entries: VecDeque<PendingWork>,
    in_flight: HashSet<String>,
}

impl WorkQueue {
    /// Seed the queue, preserving input order and dropping duplicates
    pub fn seed<I>(signatures: I, now: Instant) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        let entries = signatures
            .into_iter()
            .filter(|sig| seen.insert(sig.clone()))
            .map(|signature| PendingWork {
                signature,
                attempts: 0,
                not_before: now,
            })
            .collect();

        Self {
            entries,
            in_flight: HashSet::new(),
        }
    }

    /// Claim the first entry that is eligible at `now`
    pub fn claim(&mut self, now: Instant) -> Claim {
        if let Some(pos) = self.entries.iter().position(|w| w.not_before <= now) {
            if let Some(work) = self.entries.remove(pos) {
                self.in_flight.insert(work.signature.clone());
                return Claim::Ready(work);
            }
        }

        if let Some(earliest) = self.entries.iter().map(|w| w.not_before).min() {
            Claim::NotBefore(earliest)
        } else if !self.in_flight.is_empty() {
            Claim::Idle
        } else {
            Claim::Drained
        }
    }

    /// Return a claimed entry to the tail of the queue
    pub fn requeue(&mut self, work: PendingWork) {
        self.in_flight.remove(&work.signature);
        self.entries.push_back(work);
    }

    /// Drop a claimed entry for good (fetched or abandoned)
    pub fn release(&mut self, signature: &str) {
        self.in_flight.remove(signature);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Every signature not yet resolved: queued entries in queue order,
    /// then claims that were never released
    pub fn pending_signatures(&self) -> Vec<String> {
        let mut pending: Vec<String> = self.entries.iter().map(|w| w.signature.clone()).collect();
        let mut orphaned: Vec<String> = self.in_flight.iter().cloned().collect();
        orphaned.sort();
        pending.extend(orphaned);
        pending
    }
}
