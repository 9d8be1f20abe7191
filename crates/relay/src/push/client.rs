// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client that delivers one encrypted message to one push service endpoint.

use std::future::Future;
use std::pin::Pin;
use std::sync::Once;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Client, StatusCode};

use crate::config::RelayConfig;
use crate::push::vapid::{self, VapidCredentials};
use crate::push::{encrypt, DeliveryOutcome, DeliveryTransport, FailureReason};
use crate::state::epoch_secs;
use crate::subscription::Subscription;

/// Response bodies kept in rejection reasons are cut to this many chars.
const MAX_ERROR_BODY_CHARS: usize = 256;

static CRYPTO_PROVIDER: Once = Once::new();

/// Install the rustls crypto provider (reqwest is built without one).
pub fn ensure_crypto_provider() {
    CRYPTO_PROVIDER.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Web Push delivery over HTTPS with VAPID authentication.
pub struct WebPushTransport {
    client: Client,
    subject: String,
    ttl_secs: u32,
    urgency: Option<String>,
}

impl WebPushTransport {
    pub fn new(subject: String, ttl_secs: u32, timeout: Duration) -> Self {
        ensure_crypto_provider();
        let client = Client::builder().timeout(timeout).build().unwrap_or_default();
        Self { client, subject, ttl_secs, urgency: None }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(config.vapid_subject.clone(), config.ttl_secs, config.delivery_timeout())
            .with_urgency(config.urgency.clone())
    }

    pub fn with_urgency(mut self, urgency: Option<String>) -> Self {
        self.urgency = urgency;
        self
    }

    /// Encrypt, sign, and POST `payload` to the subscription's endpoint.
    pub async fn send(
        &self,
        subscription: &Subscription,
        payload: &[u8],
        credentials: &VapidCredentials,
    ) -> DeliveryOutcome {
        let request = match self.build_request(subscription, payload, credentials) {
            Ok(req) => req,
            Err(reason) => return DeliveryOutcome::Failure(reason),
        };

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return DeliveryOutcome::Failure(FailureReason::Timeout),
            Err(e) => return DeliveryOutcome::Failure(FailureReason::Network(e.to_string())),
        };

        let status = resp.status();
        if status.is_success() {
            return DeliveryOutcome::Success;
        }
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return DeliveryOutcome::Failure(FailureReason::Gone { status: status.as_u16() });
        }
        let text = resp.text().await.unwrap_or_default();
        let body: String = text.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
        DeliveryOutcome::Failure(FailureReason::Rejected { status: status.as_u16(), body })
    }

    fn build_request(
        &self,
        subscription: &Subscription,
        payload: &[u8],
        credentials: &VapidCredentials,
    ) -> Result<reqwest::RequestBuilder, FailureReason> {
        let ua_public = subscription.p256dh_bytes().map_err(FailureReason::InvalidSubscription)?;
        let auth_secret = subscription.auth_bytes().map_err(FailureReason::InvalidSubscription)?;
        let audience =
            vapid::audience(&subscription.endpoint).map_err(FailureReason::InvalidSubscription)?;

        let body = encrypt::encrypt(payload, &ua_public, &auth_secret).map_err(|e| match e {
            encrypt::EncryptError::InvalidKey(_) => FailureReason::InvalidSubscription(e.to_string()),
            _ => FailureReason::Crypto(e.to_string()),
        })?;
        let authorization = credentials
            .authorization_header(&audience, &self.subject, epoch_secs())
            .map_err(|e| FailureReason::Crypto(e.to_string()))?;

        let mut req = self
            .client
            .post(&subscription.endpoint)
            .header("TTL", self.ttl_secs.to_string())
            .header(CONTENT_ENCODING, "aes128gcm")
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(AUTHORIZATION, authorization)
            .body(body);
        if let Some(ref urgency) = self.urgency {
            req = req.header("Urgency", urgency.as_str());
        }
        Ok(req)
    }
}

impl DeliveryTransport for WebPushTransport {
    fn deliver<'a>(
        &'a self,
        subscription: &'a Subscription,
        payload: &'a [u8],
        credentials: &'a VapidCredentials,
    ) -> Pin<Box<dyn Future<Output = DeliveryOutcome> + Send + 'a>> {
        Box::pin(self.send(subscription, payload, credentials))
    }
}
