// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for Session Secrets and Temporary Identifier Generation

mod common;

use common::strategies::{challenge_strategy, session_secret_strategy};
use common::{generator, secret};
use murmur_core::crypto::{CryptoError, HASH_ID_SIZE};
use murmur_core::identity::{
    validate, IdentityError, IdentityGenerator, KdfId, SecureTid, SessionKeySecret,
};
use proptest::prelude::*;

// =============================================================================
// Construction
// =============================================================================

#[test]
fn test_zero_time_step_fails_at_construction() {
    let result = SessionKeySecret::new([1u8; 32], 0, 100, 0, KdfId::Blake2b160);
    assert_eq!(result.unwrap_err(), IdentityError::InvalidTimeStep(0));
}

#[test]
fn test_negative_time_step_fails_at_construction() {
    let result = SessionKeySecret::new([1u8; 32], 0, 100, -10, KdfId::Blake2b160);
    assert_eq!(result.unwrap_err(), IdentityError::InvalidTimeStep(-10));
}

#[test]
fn test_non_positive_expiry_fails_at_construction() {
    let result = SessionKeySecret::new([1u8; 32], 0, 0, 10, KdfId::Blake2b160);
    assert_eq!(result.unwrap_err(), IdentityError::InvalidExpiry(0));
}

#[test]
fn test_empty_secret_rejected() {
    let result = SessionKeySecret::from_slice(&[], 0, 100, 10, KdfId::Blake2b160);
    assert_eq!(
        result.unwrap_err(),
        IdentityError::Crypto(CryptoError::InvalidKeyLength {
            expected: 32,
            actual: 0
        })
    );
}

#[test]
fn test_deserialized_secret_rechecked_by_generator() {
    let json = r#"{
        "secretKey": "AQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQEBAQE=",
        "timeReferenceSec": 0,
        "expireAfterSec": 100,
        "timeStepSec": 0,
        "kdfId": "BLAKE2B160"
    }"#;
    let secret: SessionKeySecret = serde_json::from_str(json).unwrap();
    assert_eq!(
        IdentityGenerator::new(secret).unwrap_err(),
        IdentityError::InvalidTimeStep(0)
    );
}

#[test]
fn test_unknown_kdf_name_rejected() {
    let err = "SHA1".parse::<KdfId>().unwrap_err();
    assert_eq!(err, IdentityError::UnsupportedKdf("SHA1".to_string()));
    assert_eq!("BLAKE2B160".parse::<KdfId>().unwrap(), KdfId::Blake2b160);
}

// =============================================================================
// Disclosure format
// =============================================================================

#[test]
fn test_secret_serializes_with_base64_key() {
    let s = secret(0x01, 1_600_000_000, 604_800, 3600);
    let json = serde_json::to_value(&s).unwrap();

    assert_eq!(json["secretKey"], s.secret_key_base64());
    assert_eq!(json["timeReferenceSec"], 1_600_000_000i64);
    assert_eq!(json["expireAfterSec"], 604_800);
    assert_eq!(json["timeStepSec"], 3600);
    assert_eq!(json["kdfId"], "BLAKE2B160");

    let back: SessionKeySecret = serde_json::from_value(json).unwrap();
    assert_eq!(back, s);
}

#[test]
fn test_secret_debug_does_not_leak_key() {
    let s = secret(0xAB, 0, 100, 10);
    let debug = format!("{:?}", s);
    assert!(debug.contains("REDACTED"));
    assert!(debug.contains(&s.fingerprint()));
    assert!(!debug.contains(&s.secret_key_base64()));
    assert!(!debug.contains(&hex::encode(s.secret_key())));
}

// =============================================================================
// Expiry and key indices
// =============================================================================

#[test]
fn test_expiry_is_strictly_after_window() {
    let gen = generator(&secret(1, 10, 100, 10));
    assert!(!gen.is_expired(10));
    assert!(!gen.is_expired(110));
    assert!(gen.is_expired(111));
}

#[test]
fn test_key_index_steps() {
    let gen = generator(&secret(1, 1000, 10_000, 100));
    assert_eq!(gen.key_index_at(1000), 0);
    assert_eq!(gen.key_index_at(1099), 0);
    assert_eq!(gen.key_index_at(1100), 1);
    assert_eq!(gen.key_index_at(1750), 7);
}

#[test]
fn test_timestamps_before_reference_clamp_to_first_index() {
    let gen = generator(&secret(1, 1000, 10_000, 100));
    assert_eq!(gen.key_index_at(999), 0);
    assert_eq!(gen.key_index_at(-5_000_000), 0);
    assert_eq!(gen.generate_at(0, b"c"), gen.generate_nth(0, b"c"));
}

// =============================================================================
// Generation and validation
// =============================================================================

#[test]
fn test_generate_nth_fields() {
    let s = secret(7, 0, 1000, 10);
    let tid = generator(&s).generate_nth(3, b"challenge");

    assert_eq!(tid.scheme, KdfId::Blake2b160);
    assert_eq!(tid.hash_id.len(), HASH_ID_SIZE);
    assert_eq!(tid.challenge, b"challenge".to_vec());
    assert_eq!(tid.hash_id_base64().len(), 28);
    assert!(validate(&s, &tid));
}

#[test]
fn test_hash_id_independent_of_challenge() {
    let gen = generator(&secret(7, 0, 1000, 10));
    let a = gen.generate_nth(3, b"one");
    let b = gen.generate_nth(3, b"two");
    assert_eq!(a.hash_id, b.hash_id);
    assert_ne!(a.hmac, b.hmac);
    assert_eq!(gen.nth_hash_id(3), a.hash_id);
}

#[test]
fn test_empty_challenge_is_accepted_and_validates() {
    let s = secret(7, 0, 1000, 10);
    let tid = generator(&s).generate_nth(0, &[]);

    assert!(tid.challenge.is_empty());
    assert!(validate(&s, &tid));
    // MAC over the hash id alone, distinct from a one-byte zero challenge
    assert_ne!(tid.hmac, generator(&s).generate_nth(0, &[0x00]).hmac);
}

#[test]
fn test_validate_rejects_wrong_secret() {
    let tid = generator(&secret(1, 0, 1000, 10)).generate_nth(0, b"c");
    assert!(!validate(&secret(2, 0, 1000, 10), &tid));
}

#[test]
fn test_validate_rejects_tampered_challenge() {
    let s = secret(1, 0, 1000, 10);
    let mut tid = generator(&s).generate_nth(0, b"c");
    tid.challenge = b"d".to_vec();
    assert!(!validate(&s, &tid));
}

#[test]
fn test_validate_does_not_rederive_hash_id() {
    // A MAC computed over an arbitrary hash id still validates: validation
    // proves knowledge of the secret, not that the id came from this key.
    let s = secret(1, 0, 1000, 10);
    let foreign = generator(&secret(2, 0, 1000, 10)).nth_hash_id(4);
    let tid = SecureTid {
        scheme: KdfId::Blake2b160,
        hash_id: foreign,
        challenge: b"c".to_vec(),
        hmac: murmur_core::crypto::blake2b::compute_mac(s.secret_key(), &foreign, b"c"),
    };
    assert!(validate(&s, &tid));
}

#[test]
fn test_generated_secrets_are_fresh() {
    let a = IdentityGenerator::generate(0, 100, 10).unwrap();
    let b = IdentityGenerator::generate(0, 100, 10).unwrap();
    assert_ne!(a.secret().secret_key(), b.secret().secret_key());
    assert_eq!(a.secret().time_reference_sec(), 0);
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_generated_tid_validates(
        secret in session_secret_strategy(),
        key_index in 0u64..100_000,
        challenge in challenge_strategy(),
    ) {
        let gen = IdentityGenerator::new(secret.clone()).unwrap();
        let tid = gen.generate_nth(key_index, &challenge);
        prop_assert!(validate(&secret, &tid));
        prop_assert_eq!(tid, gen.generate_nth(key_index, &challenge));
    }

    #[test]
    fn prop_first_window_is_open_into_the_past(
        secret in session_secret_strategy(),
        before in 1i64..10_000_000,
        challenge in challenge_strategy(),
    ) {
        let gen = IdentityGenerator::new(secret.clone()).unwrap();
        let reference = secret.time_reference_sec();
        let first = gen.generate_nth(0, &challenge);
        prop_assert_eq!(gen.generate_at(reference - before, &challenge), first.clone());
        prop_assert_eq!(gen.generate_at(reference, &challenge), first);
    }

    #[test]
    fn prop_same_step_same_identifier(
        secret in session_secret_strategy(),
        step_index in 0i64..1000,
        offset_a in 0i64..100_000,
        offset_b in 0i64..100_000,
    ) {
        let gen = IdentityGenerator::new(secret.clone()).unwrap();
        let step = i64::from(secret.time_step_sec());
        let start = secret.time_reference_sec() + step_index * step;
        let a = start + offset_a % step;
        let b = start + offset_b % step;
        prop_assert_eq!(gen.key_index_at(a), step_index as u64);
        prop_assert_eq!(gen.generate_at(a, b"c").hash_id, gen.generate_at(b, b"c").hash_id);
    }
}
