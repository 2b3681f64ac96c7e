// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the Session Key Store
//!
//! Rotation on expiry, eviction of the active key, alien key insertion.

mod common;

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use common::{in_memory_storage, secret};
use murmur_core::keys::SessionKeyStore;
use murmur_core::storage::Storage;

fn store() -> SessionKeyStore {
    SessionKeyStore::new(Arc::new(in_memory_storage()))
}

fn key_of(store: &SessionKeyStore, now: i64) -> [u8; 32] {
    *store
        .get_current_generator(now, 100, 10)
        .unwrap()
        .secret()
        .secret_key()
}

#[test]
fn test_empty_store_has_no_recent_keys() {
    let store = store();
    assert!(store.extract_recent_local_keys(0).unwrap().is_empty());
    assert!(store.last_local_keys(5).unwrap().is_empty());
}

#[test]
fn test_rotation_follows_expiry() {
    let store = store();

    let k1 = key_of(&store, 10);
    // not expired: 20 <= 10 + 100
    let k2 = key_of(&store, 20);
    assert_eq!(k1, k2);

    // expired: 130 > 10 + 100
    let k3 = key_of(&store, 130);
    assert_ne!(k3, k2);

    let k4 = key_of(&store, 240);
    assert_ne!(k4, k3);

    // earlier timestamps do not expire the current key
    let k5 = key_of(&store, 120);
    assert_eq!(k5, k4);

    let recent = store.last_local_keys(5).unwrap();
    let keys: Vec<[u8; 32]> = recent.iter().map(|s| *s.secret_key()).collect();
    assert_eq!(keys, vec![k4, k3, k1]);

    let last = store.last_local_keys(1).unwrap();
    assert_eq!(last.len(), 1);
    assert_eq!(*last[0].secret_key(), k4);
}

#[test]
fn test_new_key_takes_requested_window() {
    let store = store();
    let gen = store.get_current_generator(1000, 600, 60).unwrap();
    assert_eq!(gen.secret().time_reference_sec(), 1000);
    assert_eq!(gen.secret().expire_after_sec(), 600);
    assert_eq!(gen.secret().time_step_sec(), 60);
}

#[test]
fn test_invalid_window_surfaces_identity_error() {
    let store = store();
    let result = store.get_current_generator(0, 100, 0);
    assert!(matches!(
        result,
        Err(murmur_core::keys::KeyStoreError::Identity(_))
    ));
}

#[test]
fn test_extract_recent_local_keys_filters_by_reference() {
    let store = store();
    let k1 = key_of(&store, 10);
    let k2 = key_of(&store, 130);
    let k3 = key_of(&store, 240);

    let since_100: Vec<[u8; 32]> = store
        .extract_recent_local_keys(100)
        .unwrap()
        .iter()
        .map(|s| *s.secret_key())
        .collect();
    assert_eq!(since_100, vec![k3, k2]);

    // strictly after
    let since_10 = store.extract_recent_local_keys(10).unwrap();
    assert_eq!(since_10.len(), 2);
    assert!(since_10.iter().all(|s| *s.secret_key() != k1));
}

#[test]
fn test_evicting_active_key_rotates_immediately() {
    let store = store();
    let g1 = store.get_current_generator(10, 100, 10).unwrap();
    let g3 = store.get_current_generator(130, 100, 10).unwrap();
    let g4 = store.get_current_generator(240, 100, 10).unwrap();
    let (k1, k3, k4) = (
        *g1.secret().secret_key(),
        *g3.secret().secret_key(),
        *g4.secret().secret_key(),
    );

    let deleted = store
        .evict_local_keys(&[g4.secret().clone()], 250)
        .unwrap();
    assert_eq!(deleted, 1);

    let keys: Vec<[u8; 32]> = store
        .last_local_keys(5)
        .unwrap()
        .iter()
        .map(|s| *s.secret_key())
        .collect();
    assert_eq!(keys.len(), 3);
    assert!(![k1, k3, k4].contains(&keys[0]));
    assert_eq!(&keys[1..], &[k3, k1]);

    // the replacement is now current, with the evicted key's window
    let current = store.get_current_generator(250, 999, 99).unwrap();
    assert_eq!(*current.secret().secret_key(), keys[0]);
    assert_eq!(current.secret().expire_after_sec(), 100);
    assert_eq!(current.secret().time_step_sec(), 10);

    store
        .evict_local_keys(&[g1.secret().clone(), g3.secret().clone()], 260)
        .unwrap();
    let remaining = store.last_local_keys(5).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(*remaining[0].secret_key(), keys[0]);
}

#[test]
fn test_evicting_unknown_key_is_noop() {
    let store = store();
    key_of(&store, 10);
    let deleted = store
        .evict_local_keys(&[secret(0x42, 0, 100, 10)], 20)
        .unwrap();
    assert_eq!(deleted, 0);
    assert_eq!(store.last_local_keys(5).unwrap().len(), 1);
}

#[test]
fn test_alien_key_insert_is_idempotent() {
    let store = store();
    let disclosed = secret(0x77, 0, 100, 10);

    let first = store.insert_alien_key(&disclosed, "covid-19").unwrap();
    let second = store.insert_alien_key(&disclosed, "other").unwrap();
    assert_eq!(first, second);

    let aliens = store.storage().list_alien_session_keys().unwrap();
    assert_eq!(aliens.len(), 1);
    assert_eq!(aliens[0].tag.as_deref(), Some("covid-19"));
    assert!(!aliens[0].is_local);
    assert_eq!(aliens[0].secret, disclosed);

    // alien keys never become the local generator
    assert!(store.last_local_keys(5).unwrap().is_empty());
}

#[test]
fn test_current_key_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("murmur.db");

    let k1 = {
        let store = SessionKeyStore::new(Arc::new(Storage::open(&path).unwrap()));
        key_of(&store, 10)
    };

    let store = SessionKeyStore::new(Arc::new(Storage::open(&path).unwrap()));
    assert_eq!(key_of(&store, 50), k1);
    assert_ne!(key_of(&store, 500), k1);
}

#[test]
fn test_concurrent_callers_see_one_rotation() {
    let store = Arc::new(store());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                key_of(&store, 1000)
            })
        })
        .collect();

    let keys: HashSet<[u8; 32]> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(keys.len(), 1);
    assert_eq!(store.storage().count_local_session_keys().unwrap(), 1);
}
