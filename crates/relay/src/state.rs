// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use crate::broadcast::{BroadcastDispatcher, DispatchOptions};
use crate::config::RelayConfig;
use crate::push::vapid::VapidCredentials;
use crate::push::DeliveryTransport;
use crate::registry::SubscriptionRegistry;

/// Shared relay state, handed to every HTTP handler.
pub struct RelayState {
    pub registry: Arc<SubscriptionRegistry>,
    pub credentials: Arc<VapidCredentials>,
    pub dispatcher: BroadcastDispatcher,
}

impl RelayState {
    pub fn new(
        config: &RelayConfig,
        credentials: Arc<VapidCredentials>,
        transport: Arc<dyn DeliveryTransport>,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let options = DispatchOptions {
            max_concurrent: config.delivery_limit(),
            prune_expired: config.prune_expired,
        };
        let dispatcher = BroadcastDispatcher::new(
            Arc::clone(&registry),
            transport,
            Arc::clone(&credentials),
            options,
        );
        Self { registry, credentials, dispatcher }
    }
}

/// Return current epoch seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
