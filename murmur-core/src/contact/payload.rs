// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Decoded transport payloads.

use base64::Engine;

use super::ProtocolError;
use crate::crypto::HASH_ID_SIZE;
use crate::identity::SecureTid;

/// Public-key payload of the key-agreement scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgattPayload {
    pub version: u8,
    pub organization: u16,
    pub pub_key: Vec<u8>,
}

/// A peer's temporary identifier answering its own challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TidPayload {
    pub version: u8,
    pub organization: u16,
    pub temporary_id: Vec<u8>,
    pub challenge: Vec<u8>,
    pub hmac: Vec<u8>,
}

impl TidPayload {
    /// Builds the payload a device advertises for `tid`.
    pub fn from_secure_tid(version: u8, organization: u16, tid: &SecureTid) -> Self {
        TidPayload {
            version,
            organization,
            temporary_id: tid.hash_id.to_vec(),
            challenge: tid.challenge.clone(),
            hmac: tid.hmac.to_vec(),
        }
    }
}

/// A peer's temporary identifier answering our challenge, plus a challenge
/// for us to answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TidWithChallengePayload {
    pub version: u8,
    pub organization: u16,
    pub temporary_id: Vec<u8>,
    /// Echo of the challenge this device issued.
    pub challenge: Vec<u8>,
    pub hmac: Vec<u8>,
    pub challenge2: Vec<u8>,
}

/// What the transport observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationPayload {
    Agatt(AgattPayload),
    Tid(TidPayload),
    TidWithChallenge(TidWithChallengePayload),
    /// Re-sighting of a peripheral without a new handshake.
    Ping,
}

/// A decoded observation delivered by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactObservation {
    /// Opaque peer address (BLE MAC or platform handle).
    pub peer_address: String,
    pub rssi: i32,
    pub timestamp_ms: i64,
    /// Challenge this device wrote on the connection, if any.
    pub issued_challenge: Option<Vec<u8>>,
    pub payload: ObservationPayload,
}

/// A structurally valid temporary identifier ready to be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTid {
    pub version: u8,
    pub organization: u16,
    /// Base64 hash id.
    pub identifier: String,
    pub challenge: Vec<u8>,
    pub hmac: Vec<u8>,
}

fn check_temporary_id(temporary_id: &[u8]) -> Result<String, ProtocolError> {
    if temporary_id.is_empty() {
        return Err(ProtocolError::EmptyTemporaryId);
    }
    if temporary_id.len() != HASH_ID_SIZE {
        return Err(ProtocolError::InvalidTemporaryIdLength {
            expected: HASH_ID_SIZE,
            actual: temporary_id.len(),
        });
    }
    Ok(base64::engine::general_purpose::STANDARD.encode(temporary_id))
}

impl TidPayload {
    pub fn validate(&self) -> Result<ValidatedTid, ProtocolError> {
        Ok(ValidatedTid {
            version: self.version,
            organization: self.organization,
            identifier: check_temporary_id(&self.temporary_id)?,
            challenge: self.challenge.clone(),
            hmac: self.hmac.clone(),
        })
    }
}

impl TidWithChallengePayload {
    /// Validates the identifier and that `challenge` echoes `issued`.
    pub fn validate(&self, issued: Option<&[u8]>) -> Result<ValidatedTid, ProtocolError> {
        let identifier = check_temporary_id(&self.temporary_id)?;
        match issued {
            Some(issued) if crate::crypto::constant_time_eq(issued, &self.challenge) => {}
            _ => return Err(ProtocolError::ChallengeMismatch),
        }
        Ok(ValidatedTid {
            version: self.version,
            organization: self.organization,
            identifier,
            challenge: self.challenge.clone(),
            hmac: self.hmac.clone(),
        })
    }
}
