// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast fan-out: one delivery task per subscription in a registry
//! snapshot, plus one waiter task that reports the job's final tally.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Semaphore;

use crate::broadcast::aggregator::{
    BroadcastCompletion, BroadcastResult, JobState, ResultAggregator,
};
use crate::push::vapid::VapidCredentials;
use crate::push::{DeliveryOutcome, DeliveryTransport, FailureReason};
use crate::registry::SubscriptionRegistry;
use crate::subscription::Subscription;

/// Number of completed broadcast results kept for `/broadcasts`.
const HISTORY_LIMIT: usize = 32;

/// Tuning knobs for delivery fan-out.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    /// Max in-flight deliveries per job. `None` or `Some(0)` means one task
    /// per endpoint with no further limit.
    pub max_concurrent: Option<usize>,
    /// Remove subscriptions the push service reports as gone.
    pub prune_expired: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self { max_concurrent: None, prune_expired: true }
    }
}

/// Handle to an in-flight broadcast. Dropping it does not cancel the job.
pub struct BroadcastHandle {
    pub job_id: u64,
    pub recipients: usize,
    aggregator: Arc<ResultAggregator>,
    completion: BroadcastCompletion,
}

impl BroadcastHandle {
    pub fn state(&self) -> JobState {
        self.aggregator.state()
    }

    pub fn completion(&self) -> BroadcastCompletion {
        self.completion.clone()
    }

    /// Wait for every delivery task to report.
    pub async fn wait(self) -> Option<BroadcastResult> {
        self.completion.wait().await
    }
}

/// Everything a delivery task needs, shared by all tasks of one job.
struct Job {
    payload: Bytes,
    registry: Arc<SubscriptionRegistry>,
    transport: Arc<dyn DeliveryTransport>,
    credentials: Arc<VapidCredentials>,
    aggregator: Arc<ResultAggregator>,
    limiter: Option<Arc<Semaphore>>,
    prune_expired: bool,
}

pub struct BroadcastDispatcher {
    registry: Arc<SubscriptionRegistry>,
    transport: Arc<dyn DeliveryTransport>,
    credentials: Arc<VapidCredentials>,
    options: DispatchOptions,
    last_job_id: AtomicU64,
    history: Arc<Mutex<VecDeque<BroadcastResult>>>,
}

impl BroadcastDispatcher {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        transport: Arc<dyn DeliveryTransport>,
        credentials: Arc<VapidCredentials>,
        mut options: DispatchOptions,
    ) -> Self {
        options.max_concurrent = options.max_concurrent.filter(|&n| n > 0);
        Self {
            registry,
            transport,
            credentials,
            options,
            last_job_id: AtomicU64::new(0),
            history: Arc::new(Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT))),
        }
    }

    /// Start a broadcast of `payload` to every currently registered endpoint.
    ///
    /// Returns as soon as the tasks are spawned. Must be called from within a
    /// tokio runtime.
    pub fn dispatch(&self, payload: Bytes) -> BroadcastHandle {
        let job_id = self.last_job_id.fetch_add(1, Ordering::Relaxed) + 1;
        let snapshot = self.registry.snapshot();
        let recipients = snapshot.len();
        let aggregator = Arc::new(ResultAggregator::new(job_id, recipients));
        let completion = aggregator.completion();

        let job = Arc::new(Job {
            payload,
            registry: Arc::clone(&self.registry),
            transport: Arc::clone(&self.transport),
            credentials: Arc::clone(&self.credentials),
            aggregator: Arc::clone(&aggregator),
            limiter: self.options.max_concurrent.map(|n| Arc::new(Semaphore::new(n))),
            prune_expired: self.options.prune_expired,
        });

        aggregator.begin();
        for subscription in snapshot.iter() {
            tokio::spawn(deliver_one(Arc::clone(&job), Arc::clone(subscription)));
        }
        drop(job);
        tracing::info!(job_id, recipients, "broadcast dispatched");

        spawn_reporter(job_id, completion.clone(), Arc::clone(&self.history));

        BroadcastHandle { job_id, recipients, aggregator, completion }
    }

    /// Results of recently completed broadcasts, oldest first.
    pub fn recent(&self) -> Vec<BroadcastResult> {
        self.history.lock().iter().copied().collect()
    }

    /// Per-job delivery bound in effect. `None` means unbounded.
    pub fn max_concurrent(&self) -> Option<usize> {
        self.options.max_concurrent
    }

    /// Number of broadcasts dispatched since startup.
    pub fn dispatched(&self) -> u64 {
        self.last_job_id.load(Ordering::Relaxed)
    }
}

/// Deliver to one endpoint and record exactly one outcome for it.
async fn deliver_one(job: Arc<Job>, subscription: Arc<Subscription>) {
    let job_id = job.aggregator.job_id();
    let _permit = match job.limiter {
        Some(ref sem) => sem.acquire().await.ok(),
        None => None,
    };

    // The transport may panic while building its future as well as while
    // polling it; both must surface as one recorded failure.
    let delivery =
        async { job.transport.deliver(&subscription, &job.payload, &job.credentials).await };
    let outcome = AssertUnwindSafe(delivery)
        .catch_unwind()
        .await
        .unwrap_or(DeliveryOutcome::Failure(FailureReason::Panicked));

    let mut pruned = false;
    match outcome {
        DeliveryOutcome::Success => {
            tracing::debug!(job_id, endpoint = %subscription.endpoint, "delivered");
        }
        DeliveryOutcome::Failure(ref reason) => {
            tracing::warn!(
                job_id,
                endpoint = %subscription.endpoint,
                reason = %reason,
                "delivery failed"
            );
            if reason.is_gone() && job.prune_expired {
                pruned = job.registry.remove_if_current(&subscription);
                if pruned {
                    tracing::info!(
                        job_id,
                        endpoint = %subscription.endpoint,
                        "removed expired subscription"
                    );
                }
            }
        }
    }

    job.aggregator.record(&outcome, pruned);
}

/// Wait for the job's completion signal and log the final tally.
fn spawn_reporter(
    job_id: u64,
    completion: BroadcastCompletion,
    history: Arc<Mutex<VecDeque<BroadcastResult>>>,
) {
    let started = Instant::now();
    tokio::spawn(async move {
        let Some(result) = completion.wait().await else {
            tracing::warn!(job_id, "broadcast abandoned before all deliveries reported");
            return;
        };
        tracing::info!(
            job_id,
            recipients = result.recipients,
            succeeded = result.succeeded,
            failed = result.failed,
            pruned = result.pruned,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "broadcast complete"
        );

        let mut history = history.lock();
        if history.len() == HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(result);
    });
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
