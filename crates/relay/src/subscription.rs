// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Push subscription records as produced by `PushSubscription.toJSON()`.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Lenient decoders: browsers emit unpadded base64url, some libraries pad or
/// use the standard alphabet.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A registered push endpoint. Identity is the `endpoint` URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<f64>,
    pub keys: SubscriptionKeys,
}

/// Client key material used to encrypt payloads for one subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionKeys {
    /// User agent P-256 public key (uncompressed point), base64url.
    pub p256dh: String,
    /// 16-byte authentication secret, base64url.
    pub auth: String,
}

impl Subscription {
    pub fn new(endpoint: impl Into<String>, p256dh: impl Into<String>, auth: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            expiration_time: None,
            keys: SubscriptionKeys { p256dh: p256dh.into(), auth: auth.into() },
        }
    }

    /// Reject records that cannot identify a subscription at all.
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.trim().is_empty() {
            return Err("subscription endpoint must not be empty".to_owned());
        }
        Ok(())
    }

    /// Decoded user agent public key.
    pub fn p256dh_bytes(&self) -> Result<Vec<u8>, String> {
        decode_key(&self.keys.p256dh).map_err(|e| format!("invalid p256dh key: {e}"))
    }

    /// Decoded authentication secret.
    pub fn auth_bytes(&self) -> Result<Vec<u8>, String> {
        decode_key(&self.keys.auth).map_err(|e| format!("invalid auth secret: {e}"))
    }
}

/// Decode a base64url (or standard base64) key, padded or not.
pub fn decode_key(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let value = value.trim();
    URL_SAFE_LENIENT.decode(value).or_else(|_| STANDARD_LENIENT.decode(value))
}
