// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Session key storage operations.

use base64::Engine;
use rusqlite::{params, OptionalExtension};

use super::{Storage, StorageError};
use crate::identity::{KdfId, SessionKeySecret};

/// A persisted session key with its provenance.
#[derive(Debug, Clone)]
pub struct StoredSessionKey {
    pub row_id: i64,
    pub secret: SessionKeySecret,
    /// True for keys this device generated, false for disclosed ("alien") keys.
    pub is_local: bool,
    /// Risk tag of an alien key. Always `None` for local keys.
    pub tag: Option<String>,
}

/// Internal struct for database row data.
struct SessionKeyRow {
    row_id: i64,
    secret_key: String,
    time_reference_sec: i64,
    expire_after_sec: i32,
    time_step_sec: i32,
    kdf_id: String,
    is_local: bool,
    tag: Option<String>,
}

const SESSION_KEY_COLUMNS: &str = "row_id, secret_key, time_reference_sec, expire_after_sec,
     time_step_sec, kdf_id, is_local, tag";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionKeyRow> {
    Ok(SessionKeyRow {
        row_id: row.get(0)?,
        secret_key: row.get(1)?,
        time_reference_sec: row.get(2)?,
        expire_after_sec: row.get(3)?,
        time_step_sec: row.get(4)?,
        kdf_id: row.get(5)?,
        is_local: row.get(6)?,
        tag: row.get(7)?,
    })
}

impl SessionKeyRow {
    fn into_stored(self) -> Result<StoredSessionKey, StorageError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.secret_key)
            .map_err(|e| StorageError::Serialization(format!("session key: {}", e)))?;
        let kdf_id = self
            .kdf_id
            .parse::<KdfId>()
            .map_err(|e| StorageError::Serialization(format!("session key: {}", e)))?;
        let secret = SessionKeySecret::from_slice(
            &bytes,
            self.time_reference_sec,
            self.expire_after_sec,
            self.time_step_sec,
            kdf_id,
        )
        .map_err(|e| StorageError::Serialization(format!("session key: {}", e)))?;

        Ok(StoredSessionKey {
            row_id: self.row_id,
            secret,
            is_local: self.is_local,
            tag: self.tag,
        })
    }
}

fn collect_secrets(rows: Vec<SessionKeyRow>) -> Result<Vec<SessionKeySecret>, StorageError> {
    rows.into_iter()
        .map(|row| row.into_stored().map(|stored| stored.secret))
        .collect()
}

impl Storage {
    // === Session Key Operations ===

    /// Inserts a session key unless one with the same secret exists.
    ///
    /// Returns the row id of the stored key in both cases. The existing row
    /// keeps its provenance and tag.
    pub fn insert_session_key(
        &self,
        secret: &SessionKeySecret,
        is_local: bool,
        tag: Option<&str>,
    ) -> Result<i64, StorageError> {
        let encoded = secret.secret_key_base64();
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO session_keys
             (secret_key, time_reference_sec, expire_after_sec, time_step_sec, kdf_id, is_local, tag)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                encoded,
                secret.time_reference_sec(),
                secret.expire_after_sec(),
                secret.time_step_sec(),
                secret.kdf_id().as_str(),
                is_local,
                tag,
            ],
        )?;

        let row_id: i64 = tx.query_row(
            "SELECT row_id FROM session_keys WHERE secret_key = ?1",
            params![encoded],
            |row| row.get(0),
        )?;

        tx.commit()?;
        Ok(row_id)
    }

    /// Loads the most recent local session key.
    pub fn last_local_session_key(&self) -> Result<Option<SessionKeySecret>, StorageError> {
        let conn = self.conn();
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM session_keys WHERE is_local = 1
                     ORDER BY time_reference_sec DESC, row_id DESC LIMIT 1",
                    SESSION_KEY_COLUMNS
                ),
                [],
                read_row,
            )
            .optional()?;

        match row {
            Some(row) => Ok(Some(row.into_stored()?.secret)),
            None => Ok(None),
        }
    }

    /// Lists local session keys whose time reference is after `since_sec`,
    /// most recent first.
    pub fn local_session_keys_since(
        &self,
        since_sec: i64,
    ) -> Result<Vec<SessionKeySecret>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM session_keys
             WHERE is_local = 1 AND time_reference_sec > ?1
             ORDER BY time_reference_sec DESC, row_id DESC",
            SESSION_KEY_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![since_sec], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        collect_secrets(rows)
    }

    /// Lists the `limit` most recent local session keys, most recent first.
    pub fn last_local_session_keys(
        &self,
        limit: usize,
    ) -> Result<Vec<SessionKeySecret>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM session_keys WHERE is_local = 1
             ORDER BY time_reference_sec DESC, row_id DESC LIMIT ?1",
            SESSION_KEY_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        collect_secrets(rows)
    }

    /// Lists disclosed session keys inserted by matching.
    pub fn list_alien_session_keys(&self) -> Result<Vec<StoredSessionKey>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM session_keys WHERE is_local = 0 ORDER BY row_id",
            SESSION_KEY_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(SessionKeyRow::into_stored).collect()
    }

    /// Deletes a session key by secret. Identities that referenced it revert
    /// to an unknown session key.
    ///
    /// Returns true if a row was deleted.
    pub fn delete_session_key(&self, secret: &SessionKeySecret) -> Result<bool, StorageError> {
        let deleted = self.conn().execute(
            "DELETE FROM session_keys WHERE secret_key = ?1",
            params![secret.secret_key_base64()],
        )?;
        Ok(deleted > 0)
    }

    /// Counts local session keys.
    pub fn count_local_session_keys(&self) -> Result<usize, StorageError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM session_keys WHERE is_local = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
