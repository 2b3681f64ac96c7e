// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Persistent Storage Module
//!
//! SQLite-backed store for session keys, encountered identities, contact
//! and ping events, and the core event journal. Referential integrity is
//! enforced by the database: deleting an identity cascades to its events,
//! deleting a session key resets identities that referenced it.

#[cfg(feature = "testing")]
pub mod encounters;
#[cfg(not(feature = "testing"))]
mod encounters;

#[cfg(feature = "testing")]
pub mod error;
#[cfg(not(feature = "testing"))]
mod error;

#[cfg(feature = "testing")]
pub mod events;
#[cfg(not(feature = "testing"))]
mod events;

#[cfg(feature = "testing")]
pub mod session_keys;
#[cfg(not(feature = "testing"))]
mod session_keys;

pub mod migration;

pub use encounters::{
    ContactEventRecord, ContactMeta, PeerIdentityRecord, PeripheralPing, PingEventRecord,
};
pub use error::StorageError;
pub use events::{CoreEvent, CoreEventCode};
pub use session_keys::StoredSessionKey;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::Connection;
use std::path::Path;

/// SQLite-based storage implementation.
///
/// The connection sits behind a mutex so a single `Storage` can be shared
/// through an `Arc` between the ingestion worker and foreground calls.
pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    /// Opens or creates a storage database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Creates an in-memory storage.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        // Must be set outside any transaction and on every connection.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migration::MigrationRunner::run(&conn, &migration::all_migrations())?;
        Ok(Storage {
            conn: Mutex::new(conn),
        })
    }

    /// Returns the current schema version.
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        migration::MigrationRunner::current_version(&self.conn())
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}
