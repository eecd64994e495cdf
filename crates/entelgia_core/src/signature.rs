//! Signature layer: keyed authentication of memory payloads.
//!
//! Every long-term memory row carries an HMAC-SHA256 tag over the canonical
//! JSON rendering of `{content, emotion, timestamp, topic}`. Keys are sorted
//! lexicographically and no whitespace is emitted, so the same payload always
//! produces the same bytes regardless of how the caller assembled it.
//!
//! The store records `sha256(key)` as a fingerprint; a mismatch on startup
//! means the key was rotated and rows must be re-signed on the next write.

use crate::error::SignatureError;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length of a hex-encoded HMAC-SHA256 tag.
const SIGNATURE_HEX_LEN: usize = 64;

/// Environment variable holding the signing secret.
pub const KEY_ENV_VAR: &str = "MEMORY_SECRET_KEY";

/// Used only when no key is supplied. Every use is logged as a security event.
const INSECURE_DEV_KEY: &str = "dev-insecure-key-change-in-production-DANGER";

/// The signed fields of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignedPayload<'a> {
    pub content: &'a str,
    pub emotion: &'a str,
    pub topic: &'a str,
    pub timestamp: &'a str,
}

impl<'a> SignedPayload<'a> {
    pub fn new(content: &'a str, emotion: &'a str, topic: &'a str, timestamp: &'a str) -> Self {
        Self {
            content,
            emotion,
            topic,
            timestamp,
        }
    }

    /// Canonical bytes: compact JSON with lexicographically sorted keys.
    pub fn canonical(&self) -> Result<Vec<u8>, SignatureError> {
        if self.content.is_empty() {
            return Err(SignatureError::InvalidInput("message"));
        }
        let mut fields = BTreeMap::new();
        fields.insert("content", self.content);
        fields.insert("emotion", self.emotion);
        fields.insert("timestamp", self.timestamp);
        fields.insert("topic", self.topic);
        Ok(serde_json::to_vec(&fields)?)
    }
}

/// Compute the hex-encoded HMAC-SHA256 of `message` under `key`.
pub fn sign_message(message: &[u8], key: &[u8]) -> Result<String, SignatureError> {
    Ok(hex::encode(mac_bytes(message, key)?))
}

/// Verify a hex signature in constant time.
///
/// Only the canonical form (64 lowercase hex chars, nothing around them)
/// verifies. Anything else is a mismatch, not an error: a corrupted row must
/// read as forgotten rather than abort the query.
pub fn verify_message(
    message: &[u8],
    key: &[u8],
    signature_hex: &str,
) -> Result<bool, SignatureError> {
    let expected = mac_bytes(message, key)?;
    if !is_canonical_hex(signature_hex) {
        return Ok(false);
    }
    let provided = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(false),
    };
    Ok(expected.as_slice().ct_eq(provided.as_slice()).into())
}

fn is_canonical_hex(text: &str) -> bool {
    text.len() == SIGNATURE_HEX_LEN
        && text.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

fn mac_bytes(message: &[u8], key: &[u8]) -> Result<Vec<u8>, SignatureError> {
    if key.is_empty() {
        return Err(SignatureError::InvalidInput("key"));
    }
    if message.is_empty() {
        return Err(SignatureError::InvalidInput("message"));
    }
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| SignatureError::InvalidInput("key"))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Sign a memory payload.
pub fn sign(payload: &SignedPayload<'_>, key: &[u8]) -> Result<String, SignatureError> {
    sign_message(&payload.canonical()?, key)
}

/// Verify a memory payload against a stored signature.
pub fn verify(
    payload: &SignedPayload<'_>,
    key: &[u8],
    signature_hex: &str,
) -> Result<bool, SignatureError> {
    verify_message(&payload.canonical()?, key, signature_hex)
}

/// Lowercase hex sha256 of a key, stored to detect rotation.
pub fn key_fingerprint(key: &[u8]) -> String {
    hex::encode(Sha256::digest(key))
}

/// The active signing secret.
#[derive(Clone)]
pub struct SigningKey {
    bytes: Vec<u8>,
    insecure: bool,
}

impl SigningKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, SignatureError> {
        let bytes = key.into();
        if bytes.is_empty() {
            return Err(SignatureError::InvalidInput("key"));
        }
        Ok(Self {
            bytes,
            insecure: false,
        })
    }

    /// Read the key from `MEMORY_SECRET_KEY`, falling back to a clearly
    /// marked development key when it is absent.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(KEY_ENV_VAR).ok())
    }

    fn from_value(value: Option<String>) -> Self {
        match value.filter(|v| !v.trim().is_empty()) {
            Some(v) => Self {
                bytes: v.into_bytes(),
                insecure: false,
            },
            None => {
                tracing::warn!(
                    target: "entelgia::security",
                    "{} is not set; signing memories with the insecure development key",
                    KEY_ENV_VAR
                );
                Self::insecure_default()
            }
        }
    }

    pub fn insecure_default() -> Self {
        Self {
            bytes: INSECURE_DEV_KEY.as_bytes().to_vec(),
            insecure: true,
        }
    }

    pub fn is_insecure(&self) -> bool {
        self.insecure
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn fingerprint(&self) -> String {
        key_fingerprint(&self.bytes)
    }

    pub fn sign(&self, payload: &SignedPayload<'_>) -> Result<String, SignatureError> {
        sign(payload, &self.bytes)
    }

    pub fn verify(
        &self,
        payload: &SignedPayload<'_>,
        signature_hex: &str,
    ) -> Result<bool, SignatureError> {
        verify(payload, &self.bytes, signature_hex)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("bytes", &"<redacted>")
            .field("insecure", &self.insecure)
            .finish()
    }
}
