// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session Identity Module
//!
//! A session secret is the root from which a device derives its rotating
//! temporary identifiers (TIDs) for one validity window. Anyone holding the
//! secret can regenerate every identifier it produced, which is what makes a
//! later disclosure matchable without a central issuer.

mod generator;

pub use generator::{validate, IdentityGenerator, SecureTid};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

use crate::crypto::{random_secret, CryptoError};

/// Size of a session secret in bytes.
pub const SESSION_SECRET_SIZE: usize = 32;

/// Identity-related errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Time step must be positive, got {0}")]
    InvalidTimeStep(i32),
    #[error("Expiry must be positive, got {0}")]
    InvalidExpiry(i32),
    #[error("Unsupported key derivation function: {0}")]
    UnsupportedKdf(String),
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Key derivation scheme a session secret is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KdfId {
    /// Keyed BLAKE2b-160 hash id with BLAKE2b-128 MAC.
    #[serde(rename = "BLAKE2B160")]
    Blake2b160,
}

impl KdfId {
    /// Returns the persisted/wire name of this scheme.
    pub fn as_str(&self) -> &'static str {
        match self {
            KdfId::Blake2b160 => "BLAKE2B160",
        }
    }
}

impl fmt::Display for KdfId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KdfId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BLAKE2B160" => Ok(KdfId::Blake2b160),
            other => Err(IdentityError::UnsupportedKdf(other.to_string())),
        }
    }
}

/// A session secret and the time parameters of its validity window.
///
/// Immutable once created. The secret bytes are zeroized on drop and never
/// printed by `Debug`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionKeySecret {
    #[serde(with = "secret_base64")]
    secret_key: [u8; SESSION_SECRET_SIZE],
    time_reference_sec: i64,
    expire_after_sec: i32,
    time_step_sec: i32,
    kdf_id: KdfId,
}

impl Drop for SessionKeySecret {
    fn drop(&mut self) {
        self.secret_key.zeroize();
    }
}

impl fmt::Debug for SessionKeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKeySecret")
            .field("secret_key", &format_args!("[REDACTED {}]", self.fingerprint()))
            .field("time_reference_sec", &self.time_reference_sec)
            .field("expire_after_sec", &self.expire_after_sec)
            .field("time_step_sec", &self.time_step_sec)
            .field("kdf_id", &self.kdf_id)
            .finish()
    }
}

impl SessionKeySecret {
    /// Creates a session secret, rejecting non-positive time parameters.
    pub fn new(
        secret_key: [u8; SESSION_SECRET_SIZE],
        time_reference_sec: i64,
        expire_after_sec: i32,
        time_step_sec: i32,
        kdf_id: KdfId,
    ) -> Result<Self, IdentityError> {
        let secret = SessionKeySecret {
            secret_key,
            time_reference_sec,
            expire_after_sec,
            time_step_sec,
            kdf_id,
        };
        secret.check()?;
        Ok(secret)
    }

    /// Creates a session secret from a byte slice (e.g. a disclosed key).
    ///
    /// The slice must be exactly 32 bytes; an empty key is rejected.
    pub fn from_slice(
        secret_key: &[u8],
        time_reference_sec: i64,
        expire_after_sec: i32,
        time_step_sec: i32,
        kdf_id: KdfId,
    ) -> Result<Self, IdentityError> {
        let bytes: [u8; SESSION_SECRET_SIZE] =
            secret_key
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: SESSION_SECRET_SIZE,
                    actual: secret_key.len(),
                })?;
        Self::new(bytes, time_reference_sec, expire_after_sec, time_step_sec, kdf_id)
    }

    /// Generates a fresh random BLAKE2b-160 session secret starting at `now_sec`.
    pub fn generate(
        now_sec: i64,
        expire_after_sec: i32,
        time_step_sec: i32,
    ) -> Result<Self, IdentityError> {
        let bytes = random_secret()?;
        Self::new(
            bytes,
            now_sec,
            expire_after_sec,
            time_step_sec,
            KdfId::Blake2b160,
        )
    }

    /// Validates the time parameters.
    ///
    /// Deserialized secrets skip the constructor, so generators re-check.
    pub(crate) fn check(&self) -> Result<(), IdentityError> {
        if self.time_step_sec <= 0 {
            return Err(IdentityError::InvalidTimeStep(self.time_step_sec));
        }
        if self.expire_after_sec <= 0 {
            return Err(IdentityError::InvalidExpiry(self.expire_after_sec));
        }
        Ok(())
    }

    pub fn secret_key(&self) -> &[u8; SESSION_SECRET_SIZE] {
        &self.secret_key
    }

    pub fn time_reference_sec(&self) -> i64 {
        self.time_reference_sec
    }

    pub fn expire_after_sec(&self) -> i32 {
        self.expire_after_sec
    }

    pub fn time_step_sec(&self) -> i32 {
        self.time_step_sec
    }

    pub fn kdf_id(&self) -> KdfId {
        self.kdf_id
    }

    /// Returns the secret as standard base64 (persisted form).
    pub fn secret_key_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(self.secret_key)
    }

    /// Returns a short, non-reversible fingerprint for logs.
    pub fn fingerprint(&self) -> String {
        let digest = ring::digest::digest(&ring::digest::SHA256, &self.secret_key);
        hex::encode(&digest.as_ref()[..4])
    }
}

/// Serde helper for the 32-byte secret as base64.
mod secret_base64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::SESSION_SECRET_SIZE;

    pub fn serialize<S>(bytes: &[u8; SESSION_SECRET_SIZE], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; SESSION_SECRET_SIZE], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid length for session secret"))
    }
}
