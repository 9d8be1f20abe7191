// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! VAPID (RFC 8292) application server credentials.
//!
//! The key pair is P-256. The public key is exported as the base64url
//! uncompressed point browsers expect for `applicationServerKey`; the private
//! key is kept as a PKCS#8 document.

use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_FIXED_SIGNING};
use serde::{Deserialize, Serialize};

/// Lifetime of a signed VAPID token. RFC 8292 caps this at 24 hours.
pub const TOKEN_LIFETIME_SECS: u64 = 12 * 60 * 60;

/// Errors creating, loading, or using VAPID credentials.
#[derive(Debug)]
pub enum CredentialError {
    Generate,
    InvalidKey(String),
    Io(std::io::Error),
    Json(serde_json::Error),
    Sign,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generate => f.write_str("failed to generate VAPID key pair"),
            Self::InvalidKey(e) => write!(f, "invalid VAPID key: {e}"),
            Self::Io(e) => write!(f, "VAPID key file: {e}"),
            Self::Json(e) => write!(f, "VAPID key file is not valid JSON: {e}"),
            Self::Sign => f.write_str("failed to sign VAPID token"),
        }
    }
}

impl std::error::Error for CredentialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CredentialError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for CredentialError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// On-disk form of a key pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VapidKeyFile {
    pub public_key: String,
    /// Base64url PKCS#8 document.
    pub private_key: String,
}

/// Signing key pair used to authenticate every outbound delivery.
pub struct VapidCredentials {
    key_pair: EcdsaKeyPair,
    pkcs8: Vec<u8>,
    public_key: String,
    rng: SystemRandom,
}

impl fmt::Debug for VapidCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VapidCredentials").field("public_key", &self.public_key).finish()
    }
}

impl VapidCredentials {
    /// Generate a fresh P-256 key pair.
    pub fn generate() -> Result<Self, CredentialError> {
        let rng = SystemRandom::new();
        let doc = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &rng)
            .map_err(|_| CredentialError::Generate)?;
        Self::from_pkcs8(doc.as_ref().to_vec())
    }

    pub fn from_pkcs8(pkcs8: Vec<u8>) -> Result<Self, CredentialError> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_FIXED_SIGNING, &pkcs8, &rng)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        let public_key = URL_SAFE_NO_PAD.encode(key_pair.public_key().as_ref());
        Ok(Self { key_pair, pkcs8, public_key, rng })
    }

    /// Base64url uncompressed public key (65 bytes before encoding).
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Raw uncompressed public key bytes.
    pub fn public_key_bytes(&self) -> &[u8] {
        self.key_pair.public_key().as_ref()
    }

    pub fn to_key_file(&self) -> VapidKeyFile {
        VapidKeyFile {
            public_key: self.public_key.clone(),
            private_key: URL_SAFE_NO_PAD.encode(&self.pkcs8),
        }
    }

    pub fn from_key_file(file: &VapidKeyFile) -> Result<Self, CredentialError> {
        let pkcs8 = URL_SAFE_NO_PAD
            .decode(file.private_key.trim())
            .map_err(|e| CredentialError::InvalidKey(format!("private key: {e}")))?;
        let creds = Self::from_pkcs8(pkcs8)?;
        if creds.public_key != file.public_key.trim() {
            return Err(CredentialError::InvalidKey(
                "public key does not match private key".to_owned(),
            ));
        }
        Ok(creds)
    }

    /// Load the key pair at `path`, or generate one and save it there.
    pub fn load_or_generate(path: &Path) -> Result<Self, CredentialError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let file: VapidKeyFile = serde_json::from_str(&contents)?;
            let creds = Self::from_key_file(&file)?;
            tracing::info!(path = %path.display(), "loaded VAPID keys");
            return Ok(creds);
        }

        let creds = Self::generate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        save(path, &creds.to_key_file())?;
        tracing::info!(path = %path.display(), "generated and saved new VAPID keys");
        Ok(creds)
    }

    /// Sign an ES256 JWT for `audience` (the push service origin).
    pub fn sign_jwt(
        &self,
        audience: &str,
        subject: &str,
        expires_at: u64,
    ) -> Result<String, CredentialError> {
        let header = URL_SAFE_NO_PAD.encode(br#"{"typ":"JWT","alg":"ES256"}"#);
        let claims = serde_json::json!({ "aud": audience, "exp": expires_at, "sub": subject });
        let claims = URL_SAFE_NO_PAD.encode(claims.to_string());
        let signing_input = format!("{header}.{claims}");
        let signature = self
            .key_pair
            .sign(&self.rng, signing_input.as_bytes())
            .map_err(|_| CredentialError::Sign)?;
        Ok(format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature.as_ref())))
    }

    /// `Authorization` header value for a request to `audience`.
    pub fn authorization_header(
        &self,
        audience: &str,
        subject: &str,
        now_secs: u64,
    ) -> Result<String, CredentialError> {
        let token = self.sign_jwt(audience, subject, now_secs + TOKEN_LIFETIME_SECS)?;
        Ok(format!("vapid t={token}, k={}", self.public_key))
    }
}

/// JWT audience for an endpoint: its origin (`scheme://host[:port]`).
pub fn audience(endpoint: &str) -> Result<String, String> {
    let url = reqwest::Url::parse(endpoint).map_err(|e| format!("invalid endpoint URL: {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url.origin().ascii_serialization()),
        other => Err(format!("unsupported endpoint scheme: {other}")),
    }
}

/// Save a key file atomically (write tmp + rename), readable by the owner only.
pub fn save(path: &Path, file: &VapidKeyFile) -> Result<(), CredentialError> {
    let json = serde_json::to_string_pretty(file)?;
    let tmp_name = format!(
        "{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "vapid_tests.rs"]
mod tests;
