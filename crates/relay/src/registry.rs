// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concurrent store of registered push subscriptions, keyed by endpoint.
//!
//! Records are immutable `Arc`s swapped in under a short write lock, so a
//! reader either sees a complete old record or a complete new one. Locks are
//! never held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::subscription::Subscription;

/// Point-in-time copy of the registry used as one broadcast's membership.
pub type Snapshot = Arc<[Arc<Subscription>]>;

/// Whether a registration created a new identity or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    Replaced,
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<String, Arc<Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the record for `subscription.endpoint`.
    pub fn register(&self, subscription: Subscription) -> RegisterOutcome {
        let key = subscription.endpoint.clone();
        let record = Arc::new(subscription);
        match self.entries.write().insert(key, record) {
            Some(_) => RegisterOutcome::Replaced,
            None => RegisterOutcome::Created,
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.entries.read().values().cloned().collect()
    }

    pub fn get(&self, endpoint: &str) -> Option<Arc<Subscription>> {
        self.entries.read().get(endpoint).cloned()
    }

    pub fn remove(&self, endpoint: &str) -> bool {
        self.entries.write().remove(endpoint).is_some()
    }

    /// Remove `record` only if it is still the stored record for its endpoint.
    ///
    /// A re-registration that landed after `record` was snapshotted is kept.
    pub fn remove_if_current(&self, record: &Arc<Subscription>) -> bool {
        let mut entries = self.entries.write();
        match entries.get(&record.endpoint) {
            Some(current) if Arc::ptr_eq(current, record) => {
                entries.remove(&record.endpoint);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
