// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Core event journal.
//!
//! A small append-only log of lifecycle and matching events, kept for
//! diagnostics and pruned together with encounter data.

use rusqlite::params;

use super::{Storage, StorageError};

/// Journaled event kinds. Codes are persisted and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreEventCode {
    ScanStarted,
    ScanStopped,
    /// `int1` = number of disclosed keys.
    ProcessKeysStart,
    /// `int1` = elapsed ms, `int2` = matches.
    ProcessKeysStop,
    /// `int1` = identities deleted.
    Prune,
}

impl CoreEventCode {
    pub fn code(&self) -> i64 {
        match self {
            CoreEventCode::ScanStarted => 0x00,
            CoreEventCode::ScanStopped => 0x01,
            CoreEventCode::ProcessKeysStart => 0x02,
            CoreEventCode::ProcessKeysStop => 0x03,
            CoreEventCode::Prune => 0x04,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0x00 => Some(CoreEventCode::ScanStarted),
            0x01 => Some(CoreEventCode::ScanStopped),
            0x02 => Some(CoreEventCode::ProcessKeysStart),
            0x03 => Some(CoreEventCode::ProcessKeysStop),
            0x04 => Some(CoreEventCode::Prune),
            _ => None,
        }
    }
}

/// A journal entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreEvent {
    pub timestamp_ms: i64,
    pub code: CoreEventCode,
    pub int1: i64,
    pub int2: i64,
    pub text1: String,
}

impl CoreEvent {
    pub fn new(timestamp_ms: i64, code: CoreEventCode) -> Self {
        CoreEvent {
            timestamp_ms,
            code,
            int1: 0,
            int2: 0,
            text1: String::new(),
        }
    }

    pub fn with_ints(mut self, int1: i64, int2: i64) -> Self {
        self.int1 = int1;
        self.int2 = int2;
        self
    }

    pub fn with_text(mut self, text1: impl Into<String>) -> Self {
        self.text1 = text1.into();
        self
    }
}

impl Storage {
    // === Journal Operations ===

    /// Appends an event to the journal.
    pub fn record_core_event(&self, event: &CoreEvent) -> Result<i64, StorageError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO core_events (timestamp_ms, code, int1, int2, text1)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                event.timestamp_ms,
                event.code.code(),
                event.int1,
                event.int2,
                event.text1,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Lists journal entries in insertion order.
    pub fn list_core_events(&self) -> Result<Vec<CoreEvent>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT timestamp_ms, code, int1, int2, text1 FROM core_events ORDER BY row_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(timestamp_ms, code, int1, int2, text1)| {
                let code = CoreEventCode::from_code(code).ok_or_else(|| {
                    StorageError::Serialization(format!("unknown core event code {}", code))
                })?;
                Ok(CoreEvent {
                    timestamp_ms,
                    code,
                    int1,
                    int2,
                    text1,
                })
            })
            .collect()
    }

    /// Deletes journal entries older than `threshold_ms`.
    pub fn prune_core_events_older_than(&self, threshold_ms: i64) -> Result<usize, StorageError> {
        let deleted = self.conn().execute(
            "DELETE FROM core_events WHERE timestamp_ms < ?1",
            params![threshold_ms],
        )?;
        Ok(deleted)
    }
}
