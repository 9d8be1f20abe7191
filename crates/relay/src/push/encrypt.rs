// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message encryption for Web Push (RFC 8291) using the `aes128gcm` content
//! coding (RFC 8188). Every message is a single record.

use std::fmt;

use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM};
use ring::agreement::{self, EphemeralPrivateKey, UnparsedPublicKey, ECDH_P256};
use ring::hkdf::{self, Salt, HKDF_SHA256};
use ring::rand::{SecureRandom, SystemRandom};

/// Record size advertised in the content-coding header.
pub const RECORD_SIZE: u32 = 4096;

const SALT_LEN: usize = 16;
const PUBLIC_KEY_LEN: usize = 65;
const AUTH_SECRET_LEN: usize = 16;
const TAG_LEN: usize = 16;

/// salt || rs || idlen || keyid
pub const HEADER_LEN: usize = SALT_LEN + 4 + 1 + PUBLIC_KEY_LEN;

/// Largest payload that fits a 4096-byte push message.
pub const MAX_PAYLOAD_LEN: usize = RECORD_SIZE as usize - HEADER_LEN - TAG_LEN - 1;

/// Padding delimiter for the last (only) record.
const LAST_RECORD: u8 = 0x02;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptError {
    PayloadTooLarge { len: usize },
    InvalidKey(String),
    Crypto(&'static str),
}

impl fmt::Display for EncryptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { len } => {
                write!(f, "payload of {len} bytes exceeds {MAX_PAYLOAD_LEN} bytes")
            }
            Self::InvalidKey(e) => write!(f, "invalid subscription key: {e}"),
            Self::Crypto(e) => f.write_str(e),
        }
    }
}

impl std::error::Error for EncryptError {}

/// Content encryption key and nonce for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentKeys {
    pub cek: [u8; 16],
    pub nonce: [u8; 12],
}

struct OkmLen(usize);

impl hkdf::KeyType for OkmLen {
    fn len(&self) -> usize {
        self.0
    }
}

fn expand(prk: &hkdf::Prk, info: &[&[u8]], out: &mut [u8]) -> Result<(), EncryptError> {
    prk.expand(info, OkmLen(out.len()))
        .and_then(|okm| okm.fill(out))
        .map_err(|_| EncryptError::Crypto("HKDF expand failed"))
}

/// Derive the content keys from an ECDH shared secret (RFC 8291 §3.3–3.4).
pub fn derive_content_keys(
    ecdh_secret: &[u8],
    auth_secret: &[u8],
    ua_public: &[u8],
    as_public: &[u8],
    salt: &[u8],
) -> Result<ContentKeys, EncryptError> {
    let prk_key = Salt::new(HKDF_SHA256, auth_secret).extract(ecdh_secret);
    let mut ikm = [0u8; 32];
    expand(&prk_key, &[&b"WebPush: info\0"[..], ua_public, as_public], &mut ikm)?;

    let prk = Salt::new(HKDF_SHA256, salt).extract(&ikm);
    let mut keys = ContentKeys { cek: [0u8; 16], nonce: [0u8; 12] };
    expand(&prk, &[&b"Content-Encoding: aes128gcm\0"[..]], &mut keys.cek)?;
    expand(&prk, &[&b"Content-Encoding: nonce\0"[..]], &mut keys.nonce)?;
    Ok(keys)
}

/// Encrypt `payload` as one record and prepend the content-coding header.
pub fn seal_record(
    payload: &[u8],
    keys: &ContentKeys,
    salt: &[u8; SALT_LEN],
    as_public: &[u8],
) -> Result<Vec<u8>, EncryptError> {
    let key = UnboundKey::new(&AES_128_GCM, &keys.cek)
        .map_err(|_| EncryptError::Crypto("invalid content encryption key"))?;
    let key = LessSafeKey::new(key);

    let mut record = Vec::with_capacity(payload.len() + 1 + TAG_LEN);
    record.extend_from_slice(payload);
    record.push(LAST_RECORD);
    let nonce = Nonce::assume_unique_for_key(keys.nonce);
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut record)
        .map_err(|_| EncryptError::Crypto("AES-GCM seal failed"))?;

    let mut body = Vec::with_capacity(HEADER_LEN + record.len());
    body.extend_from_slice(salt);
    body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
    body.push(as_public.len() as u8);
    body.extend_from_slice(as_public);
    body.extend_from_slice(&record);
    Ok(body)
}

/// Encrypt `payload` for the user agent holding `ua_public`/`auth_secret`.
pub fn encrypt(
    payload: &[u8],
    ua_public: &[u8],
    auth_secret: &[u8],
) -> Result<Vec<u8>, EncryptError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(EncryptError::PayloadTooLarge { len: payload.len() });
    }
    if ua_public.len() != PUBLIC_KEY_LEN || ua_public[0] != 0x04 {
        return Err(EncryptError::InvalidKey(format!(
            "p256dh must be a {PUBLIC_KEY_LEN}-byte uncompressed P-256 point, got {} bytes",
            ua_public.len()
        )));
    }
    if auth_secret.len() != AUTH_SECRET_LEN {
        return Err(EncryptError::InvalidKey(format!(
            "auth secret must be {AUTH_SECRET_LEN} bytes, got {}",
            auth_secret.len()
        )));
    }

    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).map_err(|_| EncryptError::Crypto("salt generation failed"))?;

    let private = EphemeralPrivateKey::generate(&ECDH_P256, &rng)
        .map_err(|_| EncryptError::Crypto("ephemeral key generation failed"))?;
    let as_public = private
        .compute_public_key()
        .map_err(|_| EncryptError::Crypto("ephemeral public key derivation failed"))?;
    let as_public = as_public.as_ref();

    let keys = agreement::agree_ephemeral(
        private,
        &UnparsedPublicKey::new(&ECDH_P256, ua_public),
        |ecdh_secret| derive_content_keys(ecdh_secret, auth_secret, ua_public, as_public, &salt),
    )
    .map_err(|_| EncryptError::InvalidKey("p256dh is not a point on P-256".to_owned()))??;

    seal_record(payload, &keys, &salt, as_public)
}

#[cfg(test)]
#[path = "encrypt_tests.rs"]
mod tests;
