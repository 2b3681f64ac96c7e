// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Temporary identifier derivation.

use std::fmt;

use base64::Engine;

use super::{IdentityError, KdfId, SessionKeySecret};
use crate::crypto::blake2b::{compute_mac, constant_time_eq, derive_hash_id};
use crate::crypto::{HASH_ID_SIZE, MAC_SIZE};

/// An on-wire temporary identifier: hash id, the challenge it answers, and
/// the MAC binding the two under the session secret.
#[derive(Clone, PartialEq, Eq)]
pub struct SecureTid {
    pub scheme: KdfId,
    pub hash_id: [u8; HASH_ID_SIZE],
    pub challenge: Vec<u8>,
    pub hmac: [u8; MAC_SIZE],
}

impl SecureTid {
    /// Returns the hash id as standard base64, the form used as an
    /// encounter identifier.
    pub fn hash_id_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.hash_id)
    }
}

impl fmt::Debug for SecureTid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureTid")
            .field("scheme", &self.scheme)
            .field("hash_id", &hex::encode(self.hash_id))
            .field("challenge", &hex::encode(&self.challenge))
            .field("hmac", &hex::encode(self.hmac))
            .finish()
    }
}

/// Checks that `tid.hmac` is the MAC of `(tid.hash_id, tid.challenge)` under
/// `secret`.
///
/// The hash id is taken as given and not re-derived: this proves possession
/// of the secret, not that the identifier belongs to any particular time
/// step.
pub fn validate(secret: &SessionKeySecret, tid: &SecureTid) -> bool {
    if tid.scheme != secret.kdf_id() {
        return false;
    }
    let expected = compute_mac(secret.secret_key(), &tid.hash_id, &tid.challenge);
    constant_time_eq(&expected, &tid.hmac)
}

/// Derives rotating temporary identifiers from one session secret.
///
/// Stateless apart from the bound secret; every output is a pure function of
/// the secret, the key index and the challenge.
#[derive(Clone)]
pub struct IdentityGenerator {
    secret: SessionKeySecret,
}

impl fmt::Debug for IdentityGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityGenerator")
            .field("secret", &self.secret)
            .finish()
    }
}

impl IdentityGenerator {
    /// Binds a generator to `secret`, failing fast on malformed parameters.
    pub fn new(secret: SessionKeySecret) -> Result<Self, IdentityError> {
        secret.check()?;
        Ok(IdentityGenerator { secret })
    }

    /// Creates a generator over a fresh random secret starting at `now_sec`.
    pub fn generate(
        now_sec: i64,
        expire_after_sec: i32,
        time_step_sec: i32,
    ) -> Result<Self, IdentityError> {
        let secret = SessionKeySecret::generate(now_sec, expire_after_sec, time_step_sec)?;
        Ok(IdentityGenerator { secret })
    }

    pub fn secret(&self) -> &SessionKeySecret {
        &self.secret
    }

    /// Returns true once `now_sec` is past the end of the validity window.
    pub fn is_expired(&self, now_sec: i64) -> bool {
        let end = self
            .secret
            .time_reference_sec()
            .saturating_add(i64::from(self.secret.expire_after_sec()));
        now_sec > end
    }

    /// Maps a timestamp to its key index.
    ///
    /// Timestamps before the time reference collapse to index 0, so the first
    /// interval is open-ended into the past.
    pub fn key_index_at(&self, timestamp_sec: i64) -> u64 {
        let offset = timestamp_sec.saturating_sub(self.secret.time_reference_sec());
        if offset <= 0 {
            return 0;
        }
        (offset / i64::from(self.secret.time_step_sec())) as u64
    }

    /// Derives the hash id for `key_index` without computing a MAC.
    pub fn nth_hash_id(&self, key_index: u64) -> [u8; HASH_ID_SIZE] {
        derive_hash_id(self.secret.secret_key(), key_index)
    }

    /// Derives the temporary identifier for `key_index` answering `challenge`.
    ///
    /// An empty challenge is accepted; the MAC then covers the hash id alone.
    pub fn generate_nth(&self, key_index: u64, challenge: &[u8]) -> SecureTid {
        let hash_id = self.nth_hash_id(key_index);
        let hmac = compute_mac(self.secret.secret_key(), &hash_id, challenge);
        SecureTid {
            scheme: self.secret.kdf_id(),
            hash_id,
            challenge: challenge.to_vec(),
            hmac,
        }
    }

    /// Derives the temporary identifier valid at `timestamp_sec`.
    pub fn generate_at(&self, timestamp_sec: i64, challenge: &[u8]) -> SecureTid {
        self.generate_nth(self.key_index_at(timestamp_sec), challenge)
    }
}
