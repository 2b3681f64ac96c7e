// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Common Test Utilities
//!
//! Shared fixtures for storage, session keys and the reference encounter
//! scenario used by several test files.

#![allow(dead_code)]

pub mod strategies;

use murmur_core::contact::peripheral_hash;
use murmur_core::identity::{IdentityGenerator, KdfId, SessionKeySecret};
use murmur_core::storage::{ContactMeta, PeripheralPing, Storage};

pub const ADDR_A: &str = "aa:aa:aa:aa:aa:aa";
pub const ADDR_B: &str = "bb:bb:bb:bb:bb:bb";
pub const ADDR_C: &str = "cc:cc:cc:cc:cc:cc";
pub const ADDR_D: &str = "dd:dd:dd:dd:dd:dd";

/// Installs a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn in_memory_storage() -> Storage {
    Storage::in_memory().expect("in-memory storage")
}

/// A BLAKE2b-160 session secret filled with `fill`.
pub fn secret(fill: u8, time_reference_sec: i64, expire_after_sec: i32, time_step_sec: i32) -> SessionKeySecret {
    SessionKeySecret::new(
        [fill; 32],
        time_reference_sec,
        expire_after_sec,
        time_step_sec,
        KdfId::Blake2b160,
    )
    .expect("valid session secret")
}

pub fn generator(secret: &SessionKeySecret) -> IdentityGenerator {
    IdentityGenerator::new(secret.clone()).expect("valid generator")
}

pub fn meta(address: &str, challenge: &[u8], hmac: &[u8]) -> ContactMeta {
    ContactMeta {
        peripheral_hash: peripheral_hash(address),
        organization: 0x01,
        protocol_version: 1,
        challenge: challenge.to_vec(),
        hmac: hmac.to_vec(),
        rssi: -60,
        metadata: None,
    }
}

/// Disclosed keys of the reference scenario: `SKC` produced identities X and
/// Y, `SKD` produced Z, `SKE` produced nothing that was recorded.
pub struct Scenario {
    pub skc: SessionKeySecret,
    pub skd: SessionKeySecret,
    pub ske: SessionKeySecret,
    pub x: String,
    pub y: String,
    pub z: String,
}

pub fn scenario_keys() -> Scenario {
    let skc = secret(0xC0, 2000, 1000, 100);
    let skd = secret(0xD0, 3000, 1000, 100);
    let ske = secret(0xE0, 4000, 1000, 100);

    let x = generator(&skc).generate_nth(0, b"c1").hash_id_base64();
    let y = generator(&skc).generate_nth(2, b"c3").hash_id_base64();
    let z = generator(&skd).generate_nth(2, b"c4").hash_id_base64();

    Scenario {
        skc,
        skd,
        ske,
        x,
        y,
        z,
    }
}

/// Records the reference encounters:
///
/// - X seen at 2020 (addr a), 2050 (addr b) and 2075 (addr c, other challenge)
/// - Y seen at 2250 (addr d)
/// - Z seen at 3250 (addr a), then pinged through addr a at 3350, 3450, 3550
///   and 4000 with a 200 ms gap cap; the last ping is rejected.
pub fn record_scenario(storage: &Storage) -> Scenario {
    let s = scenario_keys();
    let skc = generator(&s.skc);
    let skd = generator(&s.skd);

    let x1 = skc.generate_nth(0, b"c1");
    let x2 = skc.generate_nth(0, b"c2");
    let y = skc.generate_nth(2, b"c3");
    let z = skd.generate_nth(2, b"c4");

    storage
        .record_contact(&s.x, 2020, &meta(ADDR_A, &x1.challenge, &x1.hmac))
        .unwrap();
    storage
        .record_contact(&s.x, 2050, &meta(ADDR_B, &x1.challenge, &x1.hmac))
        .unwrap();
    storage
        .record_contact(&s.x, 2075, &meta(ADDR_C, &x2.challenge, &x2.hmac))
        .unwrap();
    storage
        .record_contact(&s.y, 2250, &meta(ADDR_D, &y.challenge, &y.hmac))
        .unwrap();
    storage
        .record_contact(&s.z, 3250, &meta(ADDR_A, &z.challenge, &z.hmac))
        .unwrap();

    let hash_a = peripheral_hash(ADDR_A);
    for (at, accepted) in [(3350, true), (3450, true), (3550, true), (4000, false)] {
        let ping = storage.record_ping_for_peripheral(&hash_a, at, 200).unwrap();
        assert_eq!(
            matches!(ping, PeripheralPing::Recorded(_)),
            accepted,
            "ping at {}",
            at
        );
    }

    s
}
