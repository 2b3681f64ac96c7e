// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Contact Ingestion Module
//!
//! Turns decoded transport observations into encounter records. The BLE
//! layer hands over already-decoded payloads; this module validates them,
//! applies the reconnect throttle, and writes to storage.
//!
//! # Flow
//!
//! ```text
//! ContactObservation ──▶ validate ──▶ Storage::record_contact
//!        │                   │
//!        │                   └─ ProtocolError: dropped and logged
//!        └─ Ping ──▶ Storage::record_ping (gap-capped)
//! ```

mod ingest;
mod payload;
mod policy;

pub use ingest::{ContactIngestor, Ingested};
pub use payload::{
    AgattPayload, ContactObservation, ObservationPayload, TidPayload, TidWithChallengePayload,
    ValidatedTid,
};
pub use policy::{ReconnectDecision, ReconnectPolicy};

use base64::Engine;
use thiserror::Error;

/// Number of SHA-256 bytes kept in a peripheral hash.
const PERIPHERAL_HASH_BYTES: usize = 6;

/// Decoded-payload errors. Never leave the ingestion component.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Temporary identifier is empty")]
    EmptyTemporaryId,
    #[error("Invalid temporary identifier length: expected {expected}, got {actual}")]
    InvalidTemporaryIdLength { expected: usize, actual: usize },
    #[error("Echoed challenge does not match the issued challenge")]
    ChallengeMismatch,
    #[error("No prior contact through peripheral {0}")]
    UnknownPeripheral(String),
    #[error("Unsupported payload: {0}")]
    UnsupportedPayload(&'static str),
}

/// Hashes a BLE peripheral address into the opaque form stored with contacts.
///
/// Base64 of the first 6 bytes of SHA-256 over the address string.
pub fn peripheral_hash(address: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, address.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(&digest.as_ref()[..PERIPHERAL_HASH_BYTES])
}
