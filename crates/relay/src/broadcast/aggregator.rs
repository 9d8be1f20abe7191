// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job outcome counters with a one-shot completion signal.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::push::DeliveryOutcome;

/// Final tally of one broadcast job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub job_id: u64,
    pub recipients: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failed endpoints removed from the registry as expired.
    pub pruned: usize,
}

/// Lifecycle of a broadcast job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Dispatched,
    InFlight { pending: usize },
    Completed(BroadcastResult),
}

/// Counts outcomes for exactly one job.
///
/// Each delivery task first claims one of `recipients` slots, bumps its
/// counter, then decrements `pending`; the task that takes `pending` to zero
/// publishes the result, so every counter increment happens-before the
/// publish. Records beyond the slot count are dropped.
pub struct ResultAggregator {
    job_id: u64,
    recipients: usize,
    unclaimed: AtomicUsize,
    succeeded: AtomicUsize,
    failed: AtomicUsize,
    pruned: AtomicUsize,
    pending: AtomicUsize,
    started: AtomicBool,
    result_tx: watch::Sender<Option<BroadcastResult>>,
}

impl ResultAggregator {
    /// A job with zero recipients is complete on construction.
    pub fn new(job_id: u64, recipients: usize) -> Self {
        let (result_tx, _) = watch::channel(None);
        let aggregator = Self {
            job_id,
            recipients,
            unclaimed: AtomicUsize::new(recipients),
            succeeded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            pruned: AtomicUsize::new(0),
            pending: AtomicUsize::new(recipients),
            started: AtomicBool::new(false),
            result_tx,
        };
        if recipients == 0 {
            aggregator.publish();
        }
        aggregator
    }

    pub fn job_id(&self) -> u64 {
        self.job_id
    }

    /// Mark delivery tasks as spawned (`Dispatched -> InFlight`).
    pub fn begin(&self) {
        self.started.store(true, Ordering::Release);
    }

    /// Record one task's outcome. Must be called exactly once per recipient.
    pub fn record(&self, outcome: &DeliveryOutcome, pruned: bool) {
        let claimed =
            self.unclaimed.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if claimed.is_err() {
            tracing::warn!(job_id = self.job_id, "outcome recorded after broadcast completed");
            return;
        }

        match outcome {
            DeliveryOutcome::Success => self.succeeded.fetch_add(1, Ordering::Relaxed),
            DeliveryOutcome::Failure(_) => self.failed.fetch_add(1, Ordering::Relaxed),
        };
        if pruned {
            self.pruned.fetch_add(1, Ordering::Relaxed);
        }

        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.publish();
        }
    }

    fn publish(&self) {
        let result = BroadcastResult {
            job_id: self.job_id,
            recipients: self.recipients,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        };
        self.result_tx.send_replace(Some(result));
    }

    pub fn state(&self) -> JobState {
        if let Some(result) = *self.result_tx.borrow() {
            return JobState::Completed(result);
        }
        if !self.started.load(Ordering::Acquire) {
            return JobState::Dispatched;
        }
        JobState::InFlight { pending: self.pending.load(Ordering::Acquire) }
    }

    pub fn completion(&self) -> BroadcastCompletion {
        BroadcastCompletion { rx: self.result_tx.subscribe() }
    }
}

/// Resolves once the job's final result is published.
#[derive(Clone)]
pub struct BroadcastCompletion {
    rx: watch::Receiver<Option<BroadcastResult>>,
}

impl BroadcastCompletion {
    /// Wait for the final result. `None` if the job was abandoned, i.e. every
    /// delivery task was dropped before reporting (runtime shutdown).
    pub async fn wait(mut self) -> Option<BroadcastResult> {
        self.rx.wait_for(Option::is_some).await.ok().and_then(|result| *result)
    }

    /// The final result if the job already completed.
    pub fn result(&self) -> Option<BroadcastResult> {
        *self.rx.borrow()
    }
}

#[cfg(test)]
#[path = "aggregator_tests.rs"]
mod tests;
