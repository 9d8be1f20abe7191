// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Web Push delivery: VAPID credentials, payload encryption, and the HTTP
//! transport that sends one message to one subscription.

pub mod client;
pub mod encrypt;
pub mod vapid;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::push::vapid::VapidCredentials;
use crate::subscription::Subscription;

/// Result of one delivery attempt to one subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Success,
    Failure(FailureReason),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Why a delivery did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The push service answered with a non-success status.
    Rejected { status: u16, body: String },
    /// The push service reports the subscription no longer exists (404/410).
    Gone { status: u16 },
    Timeout,
    Network(String),
    /// Encryption or request signing failed.
    Crypto(String),
    /// The stored key material or endpoint URL is unusable.
    InvalidSubscription(String),
    /// The transport panicked while delivering.
    Panicked,
}

impl FailureReason {
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone { .. })
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status, body } if body.is_empty() => {
                write!(f, "push service rejected message ({status})")
            }
            Self::Rejected { status, body } => {
                write!(f, "push service rejected message ({status}): {body}")
            }
            Self::Gone { status } => write!(f, "subscription expired ({status})"),
            Self::Timeout => f.write_str("delivery timed out"),
            Self::Network(e) => write!(f, "network error: {e}"),
            Self::Crypto(e) => write!(f, "crypto error: {e}"),
            Self::InvalidSubscription(e) => write!(f, "invalid subscription: {e}"),
            Self::Panicked => f.write_str("delivery task panicked"),
        }
    }
}

/// Performs one delivery attempt. Every error is reported as
/// [`DeliveryOutcome::Failure`]; implementations never fail the caller.
pub trait DeliveryTransport: Send + Sync + 'static {
    fn deliver<'a>(
        &'a self,
        subscription: &'a Subscription,
        payload: &'a [u8],
        credentials: &'a VapidCredentials,
    ) -> Pin<Box<dyn Future<Output = DeliveryOutcome> + Send + 'a>>;
}
