// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! X25519 Key Agreement
//!
//! Diffie-Hellman over Curve25519 producing either a raw shared secret or a
//! pair of asymmetric interaction tokens:
//!
//! - `tell_token = H(shared || local_public)`: disclosed after a positive diagnosis
//! - `hear_token = H(shared || peer_public)`: kept locally and watched for
//!
//! Both sides of one exchange compute the same shared secret, so A's tell
//! token equals B's hear token and vice versa.

use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

use super::blake2b::{interaction_token, HASH_ID_SIZE};
use super::CryptoError;

/// Size of an interaction token in bytes.
pub const INTERACTION_TOKEN_SIZE: usize = HASH_ID_SIZE;

/// X25519 public key length.
const PUBLIC_KEY_SIZE: usize = 32;

/// X25519 keypair used for interaction proofs.
pub struct AgreementKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl std::fmt::Debug for AgreementKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgreementKeyPair")
            .field("secret", &"[REDACTED]")
            .field("public", &hex::encode(self.public.as_bytes()))
            .finish()
    }
}

impl AgreementKeyPair {
    /// Generates a new random X25519 keypair.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        AgreementKeyPair { secret, public }
    }

    /// Restores a keypair from its 32-byte private scalar.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        AgreementKeyPair { secret, public }
    }

    /// Returns the public key bytes.
    pub fn public_key(&self) -> &[u8; 32] {
        self.public.as_bytes()
    }

    /// Returns the private key bytes (for persistence).
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

/// Paired tokens proving that two devices completed a key exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct InteractionProof {
    /// Token disclosed if this device's owner is flagged.
    pub tell_token: [u8; INTERACTION_TOKEN_SIZE],
    /// Token this device watches for in disclosures.
    pub hear_token: [u8; INTERACTION_TOKEN_SIZE],
}

impl std::fmt::Debug for InteractionProof {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractionProof")
            .field("tell_token", &hex::encode(self.tell_token))
            .field("hear_token", &hex::encode(self.hear_token))
            .finish()
    }
}

/// Stateless key agreement operations.
pub struct KeyAgreement;

impl KeyAgreement {
    /// Generates a fresh keypair from the OS RNG.
    pub fn generate_key_pair() -> AgreementKeyPair {
        AgreementKeyPair::generate()
    }

    /// Computes the X25519 shared secret with a peer public key.
    ///
    /// Fails with `InvalidPublicKey` if the key has the wrong length or is a
    /// low-order point (the exchange would not be contributory).
    pub fn derive_shared_secret(
        ours: &AgreementKeyPair,
        peer_public: &[u8],
    ) -> Result<[u8; 32], CryptoError> {
        let peer: [u8; PUBLIC_KEY_SIZE] = peer_public
            .try_into()
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        let shared = ours.secret.diffie_hellman(&PublicKey::from(peer));
        if !shared.was_contributory() {
            return Err(CryptoError::InvalidPublicKey);
        }
        Ok(*shared.as_bytes())
    }

    /// Derives the tell/hear token pair for an exchange with `peer_public`.
    pub fn derive_interaction_proof(
        ours: &AgreementKeyPair,
        peer_public: &[u8],
    ) -> Result<InteractionProof, CryptoError> {
        let mut shared = Self::derive_shared_secret(ours, peer_public)?;
        let proof = InteractionProof {
            tell_token: interaction_token(&shared, ours.public_key()),
            hear_token: interaction_token(&shared, peer_public),
        };
        shared.zeroize();
        Ok(proof)
    }
}
