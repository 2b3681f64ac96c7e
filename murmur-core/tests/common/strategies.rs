// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Proptest Strategies

use proptest::prelude::*;

use murmur_core::identity::{KdfId, SessionKeySecret};

/// Strategy for 32-byte session secrets.
pub fn secret_bytes_strategy() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>())
}

/// Strategy for challenges, including the empty challenge.
pub fn challenge_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..32)
}

/// Strategy for valid session secrets with realistic windows.
pub fn session_secret_strategy() -> impl Strategy<Value = SessionKeySecret> {
    (
        secret_bytes_strategy(),
        0i64..2_000_000_000,
        1i32..1_000_000,
        1i32..100_000,
    )
        .prop_map(|(bytes, reference, expire, step)| {
            SessionKeySecret::new(bytes, reference, expire, step, KdfId::Blake2b160)
                .expect("positive windows")
        })
}
