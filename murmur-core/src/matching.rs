// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Match Engine
//!
//! Tests disclosed session keys against recorded encounters. For each key,
//! every hash id it could have produced within its (capped) validity window
//! is regenerated and looked up by identifier. Cost is one KDF evaluation
//! and one indexed lookup per key index.

use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use tracing::{debug, info, warn};

use crate::identity::{IdentityGenerator, SessionKeySecret};
use crate::keys::SessionKeyStore;
use crate::storage::{CoreEvent, CoreEventCode, StorageError};

/// Hash-id matching over the encounter store.
pub struct MatchEngine {
    keys: Arc<SessionKeyStore>,
}

impl MatchEngine {
    pub fn new(keys: Arc<SessionKeyStore>) -> Self {
        MatchEngine { keys }
    }

    /// Matches `disclosed` keys against stored identities and tags hits.
    ///
    /// Each key is checked for key indices `0..=min(expire, force_expiry_sec) / step`.
    /// A key with at least one hit is stored once as an alien key under
    /// `tag` and every matched identity points at it. Returns the number of
    /// identities matched by this call; already-tagged identities count
    /// again when re-matched. Malformed keys are skipped.
    pub fn process_tainted_keys(
        &self,
        disclosed: &[SessionKeySecret],
        tag: &str,
        force_expiry_sec: i32,
        now_ms: i64,
    ) -> Result<usize, StorageError> {
        let storage = self.keys.storage();
        let started = Instant::now();
        storage.record_core_event(
            &CoreEvent::new(now_ms, CoreEventCode::ProcessKeysStart)
                .with_ints(disclosed.len() as i64, 0)
                .with_text(tag),
        )?;

        let mut matches = 0;
        for secret in disclosed {
            matches += self.match_key(secret, tag, force_expiry_sec)?;
        }

        let elapsed_ms = started.elapsed().as_millis() as i64;
        storage.record_core_event(
            &CoreEvent::new(now_ms + elapsed_ms, CoreEventCode::ProcessKeysStop)
                .with_ints(elapsed_ms, matches as i64)
                .with_text(tag),
        )?;

        info!(
            keys = disclosed.len(),
            matches,
            elapsed_ms,
            tag,
            "processed disclosed session keys"
        );
        Ok(matches)
    }

    fn match_key(
        &self,
        secret: &SessionKeySecret,
        tag: &str,
        force_expiry_sec: i32,
    ) -> Result<usize, StorageError> {
        let generator = match IdentityGenerator::new(secret.clone()) {
            Ok(generator) => generator,
            Err(e) => {
                warn!(fingerprint = %secret.fingerprint(), error = %e, "skipping malformed disclosed key");
                return Ok(0);
            }
        };

        let window_sec = secret.expire_after_sec().min(force_expiry_sec);
        if window_sec < 0 {
            return Ok(0);
        }
        let valid_indices = (window_sec / secret.time_step_sec()) as u64;

        let storage = self.keys.storage();
        let mut session_key_row_id = None;
        let mut matches = 0;

        for key_index in 0..=valid_indices {
            let identifier =
                base64::engine::general_purpose::STANDARD.encode(generator.nth_hash_id(key_index));
            if storage.find_identity(&identifier)?.is_none() {
                continue;
            }

            let row_id = match session_key_row_id {
                Some(row_id) => row_id,
                None => {
                    let row_id = self.keys.insert_alien_key(secret, tag)?;
                    session_key_row_id = Some(row_id);
                    row_id
                }
            };
            // The identity may have been pruned since the lookup.
            if storage.tag_identity(&identifier, row_id)? {
                matches += 1;
            }
        }

        if matches > 0 {
            debug!(fingerprint = %secret.fingerprint(), matches, "disclosed key matched");
        }
        Ok(matches)
    }
}
