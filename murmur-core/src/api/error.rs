// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! API Error Types
//!
//! Unified error type for the Murmur API layer.

use thiserror::Error;

use crate::contact::ProtocolError;
use crate::crypto::CryptoError;
use crate::identity::IdentityError;
use crate::keys::KeyStoreError;
use crate::storage::StorageError;
use crate::worker::WorkerClosed;

/// Unified error type for Murmur operations.
#[derive(Error, Debug)]
pub enum MurmurError {
    /// Malformed key material.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Invalid session key parameters.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Storage operation failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Malformed decoded payload.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Session key rotation failed.
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    /// The ingestion worker is gone.
    #[error("worker error: {0}")]
    Worker(#[from] WorkerClosed),

    /// `start` called while running.
    #[error("already started")]
    AlreadyStarted,

    /// Operation requires a running instance.
    #[error("not started")]
    NotStarted,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for Murmur operations.
pub type MurmurResult<T> = Result<T, MurmurError>;
