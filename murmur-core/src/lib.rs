// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Murmur Core Library
//!
//! Privacy-preserving proximity tracing core: rotating temporary
//! identifiers derived from session secrets, a local encounter store, and
//! matching of disclosed secrets against recorded encounters.

pub mod api;
pub mod contact;
pub mod crypto;
pub mod exposure;
pub mod identity;
pub mod keys;
pub mod matching;
pub mod storage;
pub mod worker;

pub use api::{Murmur, MurmurConfig, MurmurError, MurmurResult};
pub use contact::{
    peripheral_hash, ContactIngestor, ContactObservation, Ingested, ObservationPayload,
    ProtocolError, ReconnectDecision, ReconnectPolicy, TidPayload, TidWithChallengePayload,
};
pub use crypto::{AgreementKeyPair, CryptoError, InteractionProof, KeyAgreement};
pub use exposure::ExposureEstimator;
pub use identity::{
    validate, IdentityError, IdentityGenerator, KdfId, SecureTid, SessionKeySecret,
};
pub use keys::{KeyStoreError, SessionKeyStore};
pub use matching::MatchEngine;
pub use storage::{ContactMeta, CoreEvent, CoreEventCode, Storage, StorageError};
pub use worker::{FlushHandle, IngestWorker, MetricsSnapshot, WorkerClosed};
