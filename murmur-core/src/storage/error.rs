// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Storage error types.

use thiserror::Error;

/// Storage error types.
///
/// Unique-index races on first sightings and key inserts are resolved with
/// `INSERT OR IGNORE` and a re-read, so they never surface here.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A persisted row could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Migration error: {0}")]
    Migration(String),
}
