// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Observation ingestion.

use std::sync::Arc;

use tracing::{debug, warn};

use super::payload::{ContactObservation, ObservationPayload, ValidatedTid};
use super::{peripheral_hash, ProtocolError};
use crate::storage::{ContactMeta, PeripheralPing, Storage, StorageError};

/// Result of ingesting one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// A contact event was recorded.
    Contact { event_id: i64 },
    /// A ping was recorded, or skipped because the gap was too large.
    Ping { event_id: Option<i64> },
}

/// Writes decoded observations to storage.
pub struct ContactIngestor {
    storage: Arc<Storage>,
    ping_max_elapsed_ms: i64,
}

impl ContactIngestor {
    pub fn new(storage: Arc<Storage>, ping_max_elapsed_ms: i64) -> Self {
        ContactIngestor {
            storage,
            ping_max_elapsed_ms,
        }
    }

    /// Ingests one observation.
    ///
    /// Protocol errors are logged and the observation dropped (`Ok(None)`);
    /// only storage failures are returned.
    pub fn ingest(&self, observation: &ContactObservation) -> Result<Option<Ingested>, StorageError> {
        let hash = peripheral_hash(&observation.peer_address);

        if let ObservationPayload::Ping = observation.payload {
            return self.ingest_ping(&hash, observation.timestamp_ms);
        }

        match Self::validate(observation) {
            Ok(tid) => self.ingest_tid(&hash, observation, tid).map(Some),
            Err(e) => Ok(dropped(&hash, &e)),
        }
    }

    fn validate(observation: &ContactObservation) -> Result<ValidatedTid, ProtocolError> {
        match &observation.payload {
            ObservationPayload::Tid(tid) => tid.validate(),
            ObservationPayload::TidWithChallenge(tid) => {
                tid.validate(observation.issued_challenge.as_deref())
            }
            ObservationPayload::Agatt(_) => Err(ProtocolError::UnsupportedPayload("agatt")),
            ObservationPayload::Ping => Err(ProtocolError::UnsupportedPayload("ping")),
        }
    }

    fn ingest_tid(
        &self,
        hash: &str,
        observation: &ContactObservation,
        tid: ValidatedTid,
    ) -> Result<Ingested, StorageError> {
        let meta = ContactMeta {
            peripheral_hash: hash.to_string(),
            organization: tid.organization,
            protocol_version: tid.version,
            challenge: tid.challenge,
            hmac: tid.hmac,
            rssi: observation.rssi,
            metadata: None,
        };
        let event_id = self
            .storage
            .record_contact(&tid.identifier, observation.timestamp_ms, &meta)?;
        debug!(peripheral = %hash, event_id, "recorded contact");
        Ok(Ingested::Contact { event_id })
    }

    fn ingest_ping(&self, hash: &str, timestamp_ms: i64) -> Result<Option<Ingested>, StorageError> {
        let event_id = match self.storage.record_ping_for_peripheral(
            hash,
            timestamp_ms,
            self.ping_max_elapsed_ms,
        )? {
            PeripheralPing::Recorded(event_id) => Some(event_id),
            PeripheralPing::GapTooLarge => None,
            PeripheralPing::UnknownPeripheral => {
                return Ok(dropped(hash, &ProtocolError::UnknownPeripheral(hash.to_string())));
            }
        };
        debug!(peripheral = %hash, ?event_id, "recorded ping");
        Ok(Some(Ingested::Ping { event_id }))
    }
}

fn dropped(hash: &str, error: &ProtocolError) -> Option<Ingested> {
    warn!(peripheral = %hash, %error, "dropped contact observation");
    None
}
