// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session Key Store
//!
//! Owns the device's current identity generator and rotates it when its
//! session key expires or is evicted. Every check-then-rotate runs inside
//! one critical section, so concurrent callers see at most one rotation per
//! expiry boundary.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::info;

use crate::crypto::constant_time_eq;
use crate::identity::{IdentityError, IdentityGenerator, SessionKeySecret};
use crate::storage::{Storage, StorageError};

/// Session key store errors.
#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
    /// No usable generator could be produced (e.g. the RNG failed).
    #[error("Key rotation failed: {0}")]
    Rotation(String),
}

/// Persistent store of local and disclosed session keys.
pub struct SessionKeyStore {
    storage: Arc<Storage>,
    current: Mutex<Option<IdentityGenerator>>,
}

impl SessionKeyStore {
    /// Creates a store over `storage`. The current generator is loaded
    /// lazily from the most recent persisted local key.
    pub fn new(storage: Arc<Storage>) -> Self {
        SessionKeyStore {
            storage,
            current: Mutex::new(None),
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Returns the active generator, rotating to a fresh secret if there is
    /// none or it has expired at `now_sec`.
    ///
    /// The expiry and step only apply to a newly created secret.
    pub fn get_current_generator(
        &self,
        now_sec: i64,
        expire_after_sec: i32,
        time_step_sec: i32,
    ) -> Result<IdentityGenerator, KeyStoreError> {
        let mut current = self.current.lock();
        self.load_persisted(&mut current)?;

        match current.as_ref() {
            Some(generator) if !generator.is_expired(now_sec) => Ok(generator.clone()),
            _ => self.rotate(&mut current, now_sec, expire_after_sec, time_step_sec),
        }
    }

    /// Lists local secrets created after `since_sec`, most recent first.
    pub fn extract_recent_local_keys(
        &self,
        since_sec: i64,
    ) -> Result<Vec<SessionKeySecret>, KeyStoreError> {
        Ok(self.storage.local_session_keys_since(since_sec)?)
    }

    /// Lists the `limit` most recent local secrets, most recent first.
    pub fn last_local_keys(&self, limit: usize) -> Result<Vec<SessionKeySecret>, KeyStoreError> {
        Ok(self.storage.last_local_session_keys(limit)?)
    }

    /// Deletes the given local secrets.
    ///
    /// If the active secret is among them, a replacement starting at
    /// `now_sec` with the same expiry and step is created first, so the
    /// store always keeps an active generator. Returns the number of keys
    /// deleted.
    pub fn evict_local_keys(
        &self,
        keys: &[SessionKeySecret],
        now_sec: i64,
    ) -> Result<usize, KeyStoreError> {
        let mut current = self.current.lock();
        self.load_persisted(&mut current)?;

        let mut deleted = 0;
        for key in keys {
            let is_active = current.as_ref().is_some_and(|generator| {
                constant_time_eq(generator.secret().secret_key(), key.secret_key())
            });

            if is_active {
                self.rotate(
                    &mut current,
                    now_sec,
                    key.expire_after_sec(),
                    key.time_step_sec(),
                )?;
            }

            if self.storage.delete_session_key(key)? {
                deleted += 1;
                info!(
                    fingerprint = %key.fingerprint(),
                    was_active = is_active,
                    "evicted local session key"
                );
            }
        }
        Ok(deleted)
    }

    /// Stores a disclosed secret under `tag`. Idempotent on the secret:
    /// re-inserting returns the existing row id.
    pub fn insert_alien_key(
        &self,
        secret: &SessionKeySecret,
        tag: &str,
    ) -> Result<i64, StorageError> {
        self.storage.insert_session_key(secret, false, Some(tag))
    }

    fn load_persisted(&self, current: &mut Option<IdentityGenerator>) -> Result<(), KeyStoreError> {
        if current.is_none() {
            if let Some(secret) = self.storage.last_local_session_key()? {
                *current = Some(IdentityGenerator::new(secret)?);
            }
        }
        Ok(())
    }

    /// Creates, persists and installs a new generator. Caller holds the lock.
    fn rotate(
        &self,
        current: &mut Option<IdentityGenerator>,
        now_sec: i64,
        expire_after_sec: i32,
        time_step_sec: i32,
    ) -> Result<IdentityGenerator, KeyStoreError> {
        let generator = IdentityGenerator::generate(now_sec, expire_after_sec, time_step_sec)
            .map_err(|e| match e {
                IdentityError::Crypto(err) => KeyStoreError::Rotation(err.to_string()),
                other => KeyStoreError::Identity(other),
            })?;

        self.storage
            .insert_session_key(generator.secret(), true, None)?;

        info!(
            fingerprint = %generator.secret().fingerprint(),
            time_reference_sec = now_sec,
            expire_after_sec,
            "rotated local session key"
        );

        *current = Some(generator.clone());
        Ok(generator)
    }
}
