// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the push relay.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "pushrelay", version, about = "Web Push subscription relay")]
pub struct RelayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "PUSHRELAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "PUSHRELAY_PORT")]
    pub port: u16,

    /// Contact URI sent as the VAPID `sub` claim (`mailto:` or `https:`).
    #[arg(long, default_value = "mailto:example@example.com", env = "PUSHRELAY_VAPID_SUBJECT")]
    pub vapid_subject: String,

    /// Path to a VAPID key file. Generated on first start when missing.
    /// Without it a fresh key pair is generated on every start.
    #[arg(long, env = "PUSHRELAY_VAPID_KEYS")]
    pub vapid_keys: Option<PathBuf>,

    /// Seconds the push service should retain an undelivered message.
    #[arg(long, default_value_t = 30, env = "PUSHRELAY_TTL_SECS")]
    pub ttl_secs: u32,

    /// Optional `Urgency` header (very-low, low, normal, high).
    #[arg(long, env = "PUSHRELAY_URGENCY")]
    pub urgency: Option<String>,

    /// Per-delivery request timeout in milliseconds.
    #[arg(long, default_value_t = 10000, env = "PUSHRELAY_DELIVERY_TIMEOUT_MS")]
    pub delivery_timeout_ms: u64,

    /// Upper bound on in-flight deliveries per broadcast. Unbounded if unset.
    #[arg(long, env = "PUSHRELAY_MAX_CONCURRENT_DELIVERIES")]
    pub max_concurrent_deliveries: Option<usize>,

    /// Drop subscriptions the push service reports as gone (404/410).
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        env = "PUSHRELAY_PRUNE_EXPIRED"
    )]
    pub prune_expired: bool,

    /// Log format (json or text).
    #[arg(long, default_value = "text", env = "PUSHRELAY_LOG_FORMAT")]
    pub log_format: String,
}

impl RelayConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Requested concurrency bound for a single broadcast, as configured.
    pub fn delivery_limit(&self) -> Option<usize> {
        self.max_concurrent_deliveries
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 8080,
            vapid_subject: "mailto:example@example.com".to_owned(),
            vapid_keys: None,
            ttl_secs: 30,
            urgency: None,
            delivery_timeout_ms: 10000,
            max_concurrent_deliveries: None,
            prune_expired: true,
            log_format: "text".to_owned(),
        }
    }
}
