// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Cryptographic primitives.
//!
//! X25519 key agreement for interaction proofs and the BLAKE2b
//! constructions behind rotating temporary identifiers.

pub mod agreement;
pub mod blake2b;

use thiserror::Error;

pub use agreement::{AgreementKeyPair, InteractionProof, KeyAgreement, INTERACTION_TOKEN_SIZE};
pub use blake2b::{constant_time_eq, random_secret, HASH_ID_SIZE, MAC_SIZE};

/// Cryptographic error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("System random number generator failed")]
    RandomFailure,
}
