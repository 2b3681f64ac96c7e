// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! BLAKE2b Constructions
//!
//! - hash id: keyed BLAKE2b-160, salt = big-endian key index, fixed personalization
//! - MAC: keyed BLAKE2b-128 over `hash_id || challenge`
//! - interaction token: unkeyed BLAKE2b-160 over `shared_secret || public_key`
//!
//! Parameters are fixed by the wire protocol; changing any of them breaks
//! matching against identifiers recorded by other devices.

use blake2::digest::consts::{U16, U20};
use blake2::digest::{Digest, Mac};
use blake2::{Blake2b, Blake2bMac};
use ring::rand::{SecureRandom, SystemRandom};
use subtle::ConstantTimeEq;

use super::CryptoError;

/// Size of a derived hash id in bytes (160 bits).
pub const HASH_ID_SIZE: usize = 20;

/// Size of a temporary identifier MAC in bytes (128 bits).
pub const MAC_SIZE: usize = 16;

/// BLAKE2b personalization for hash id derivation.
const HASH_ID_PERSONALIZATION: &[u8; 16] = b"~WhisperSecureId";

type Blake2b160 = Blake2b<U20>;
type Blake2bMac160 = Blake2bMac<U20>;
type Blake2bMac128 = Blake2bMac<U16>;

/// Encodes a key index as a 16-byte BLAKE2b salt.
///
/// The index occupies the first 8 bytes big-endian, the rest is zero.
fn key_index_salt(key_index: u64) -> [u8; 16] {
    let mut salt = [0u8; 16];
    salt[..8].copy_from_slice(&key_index.to_be_bytes());
    salt
}

/// Derives the hash id for `key_index` from a session secret.
pub fn derive_hash_id(secret: &[u8; 32], key_index: u64) -> [u8; HASH_ID_SIZE] {
    let salt = key_index_salt(key_index);
    let kdf = Blake2bMac160::new_with_salt_and_personal(secret, &salt, HASH_ID_PERSONALIZATION)
        .expect("32-byte key and 16-byte salt are within BLAKE2b limits");

    let mut out = [0u8; HASH_ID_SIZE];
    out.copy_from_slice(&kdf.finalize().into_bytes());
    out
}

/// Computes the MAC binding a hash id to a challenge.
///
/// An empty challenge is valid: the MAC then covers the hash id alone.
pub fn compute_mac(secret: &[u8; 32], hash_id: &[u8], challenge: &[u8]) -> [u8; MAC_SIZE] {
    let mut mac = Blake2bMac128::new_with_salt_and_personal(secret, &[], &[])
        .expect("32-byte key is within BLAKE2b limits");
    Mac::update(&mut mac, hash_id);
    Mac::update(&mut mac, challenge);

    let mut out = [0u8; MAC_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Hashes a shared secret together with a public key into an interaction token.
pub fn interaction_token(shared_secret: &[u8], public_key: &[u8]) -> [u8; HASH_ID_SIZE] {
    let mut hasher = Blake2b160::new();
    Digest::update(&mut hasher, shared_secret);
    Digest::update(&mut hasher, public_key);

    let mut out = [0u8; HASH_ID_SIZE];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Constant-time byte comparison.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Draws a fresh 32-byte secret from the system RNG.
pub fn random_secret() -> Result<[u8; 32], CryptoError> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes).map_err(|_| CryptoError::RandomFailure)?;
    Ok(bytes)
}
