// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Database Schema Migration Framework
//!
//! Versioned schema migrations with transactional safety. The runner tracks
//! applied versions in a `schema_version` table and runs pending migrations
//! in order within a single transaction.

use rusqlite::Connection;

use super::StorageError;

/// A single schema migration step.
pub struct Migration {
    /// Monotonically increasing version number (starting at 1).
    pub version: u32,
    /// Human-readable name for this migration.
    pub name: &'static str,
    /// SQL executed as one batch.
    pub sql: &'static str,
}

/// Runs schema migrations against a database connection.
pub struct MigrationRunner;

impl MigrationRunner {
    /// Runs all pending migrations in a transaction.
    ///
    /// If any migration fails, all changes of this run are rolled back.
    pub fn run(conn: &Connection, migrations: &[Migration]) -> Result<(), StorageError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER NOT NULL
            );",
        )?;

        let current_version = Self::current_version(conn)?;

        let pending: Vec<&Migration> = migrations
            .iter()
            .filter(|m| m.version > current_version)
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        for window in pending.windows(2) {
            if window[0].version >= window[1].version {
                return Err(StorageError::Migration(format!(
                    "Migrations are not in order: v{} before v{}",
                    window[0].version, window[1].version
                )));
            }
        }

        conn.execute_batch("BEGIN EXCLUSIVE TRANSACTION;")?;

        for migration in &pending {
            if let Err(e) = conn.execute_batch(migration.sql) {
                conn.execute_batch("ROLLBACK;")?;
                return Err(StorageError::Migration(format!(
                    "Migration v{} '{}' failed: {}",
                    migration.version, migration.name, e
                )));
            }

            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0);

            if let Err(e) = conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![migration.version, now],
            ) {
                conn.execute_batch("ROLLBACK;")?;
                return Err(StorageError::Migration(format!(
                    "Failed to record migration v{}: {}",
                    migration.version, e
                )));
            }

            tracing::debug!(
                version = migration.version,
                name = migration.name,
                "applied schema migration"
            );
        }

        conn.execute_batch("COMMIT;")?;
        Ok(())
    }

    /// Returns the current schema version, or 0 if no migrations have been applied.
    pub fn current_version(conn: &Connection) -> Result<u32, StorageError> {
        let table_exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
            [],
            |row| row.get(0),
        )?;

        if !table_exists {
            return Ok(0);
        }

        let version: Option<u32> =
            conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })?;

        Ok(version.unwrap_or(0))
    }
}

/// Returns all registered migrations in version order.
///
/// New migrations are appended to the end of this list.
pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            version: 1,
            name: "encounter_schema",
            sql: MIGRATION_V1_ENCOUNTERS,
        },
        Migration {
            version: 2,
            name: "core_event_journal",
            sql: MIGRATION_V2_CORE_EVENTS,
        },
    ]
}

const MIGRATION_V1_ENCOUNTERS: &str = "
CREATE TABLE IF NOT EXISTS session_keys (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    secret_key TEXT NOT NULL UNIQUE,
    time_reference_sec INTEGER NOT NULL,
    expire_after_sec INTEGER NOT NULL,
    time_step_sec INTEGER NOT NULL,
    kdf_id TEXT NOT NULL,
    is_local INTEGER NOT NULL,
    tag TEXT
);
CREATE INDEX IF NOT EXISTS idx_session_keys_local
    ON session_keys(is_local, time_reference_sec);
CREATE INDEX IF NOT EXISTS idx_session_keys_tag ON session_keys(tag);

CREATE TABLE IF NOT EXISTS peer_identities (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    identifier TEXT NOT NULL UNIQUE,
    last_seen_ms INTEGER NOT NULL,
    session_key_row_id INTEGER
        REFERENCES session_keys(row_id) ON DELETE SET NULL
);
CREATE INDEX IF NOT EXISTS idx_peer_identities_last_seen
    ON peer_identities(last_seen_ms);
CREATE INDEX IF NOT EXISTS idx_peer_identities_session_key
    ON peer_identities(session_key_row_id);

CREATE TABLE IF NOT EXISTS contact_events (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    peripheral_hash TEXT NOT NULL,
    connect_time_ms INTEGER NOT NULL,
    organization INTEGER NOT NULL,
    protocol_version INTEGER NOT NULL,
    peer_identity_row_id INTEGER NOT NULL
        REFERENCES peer_identities(row_id) ON DELETE CASCADE,
    challenge BLOB NOT NULL,
    hmac BLOB NOT NULL,
    rssi INTEGER NOT NULL,
    metadata TEXT
);
CREATE INDEX IF NOT EXISTS idx_contact_events_peripheral
    ON contact_events(peripheral_hash, connect_time_ms);
CREATE INDEX IF NOT EXISTS idx_contact_events_identity
    ON contact_events(peer_identity_row_id);

CREATE TABLE IF NOT EXISTS ping_events (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    peer_identity_row_id INTEGER NOT NULL
        REFERENCES peer_identities(row_id) ON DELETE CASCADE,
    timestamp_ms INTEGER NOT NULL,
    elapsed_ms INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ping_events_identity
    ON ping_events(peer_identity_row_id, timestamp_ms);
";

const MIGRATION_V2_CORE_EVENTS: &str = "
CREATE TABLE IF NOT EXISTS core_events (
    row_id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp_ms INTEGER NOT NULL,
    code INTEGER NOT NULL,
    int1 INTEGER NOT NULL DEFAULT 0,
    int2 INTEGER NOT NULL DEFAULT 0,
    text1 TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_core_events_timestamp ON core_events(timestamp_ms);
";
