// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Encounter storage operations.
//!
//! One `peer_identities` row per distinct identifier ever seen, owning the
//! contact and ping events recorded against it.

use rusqlite::{params, Connection, OptionalExtension};

use super::{Storage, StorageError};

/// Transport metadata stored with a contact event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMeta {
    /// Opaque hash of the peer's BLE address.
    pub peripheral_hash: String,
    pub organization: u16,
    pub protocol_version: u8,
    /// Challenge the advertised identifier answered.
    pub challenge: Vec<u8>,
    pub hmac: Vec<u8>,
    pub rssi: i32,
    pub metadata: Option<String>,
}

/// A distinct encountered identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerIdentityRecord {
    pub row_id: i64,
    /// Base64 hash id.
    pub identifier: String,
    pub last_seen_ms: i64,
    /// Backing session key, `None` until matching finds it.
    pub session_key_row_id: Option<i64>,
}

/// One BLE connection that yielded an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactEventRecord {
    pub row_id: i64,
    pub peer_identity_row_id: i64,
    pub connect_time_ms: i64,
    pub meta: ContactMeta,
}

/// One sighting of a known identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingEventRecord {
    pub row_id: i64,
    pub peer_identity_row_id: i64,
    pub timestamp_ms: i64,
    pub elapsed_ms: i64,
}

/// Result of [`Storage::record_ping_for_peripheral`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralPing {
    /// Ping stored under this event id.
    Recorded(i64),
    /// The gap since the previous ping reached the cap.
    GapTooLarge,
    /// No identity has connected through this peripheral.
    UnknownPeripheral,
}

const CONTACT_COLUMNS: &str = "row_id, peer_identity_row_id, connect_time_ms, peripheral_hash,
     organization, protocol_version, challenge, hmac, rssi, metadata";

fn read_identity(row: &rusqlite::Row<'_>) -> rusqlite::Result<PeerIdentityRecord> {
    Ok(PeerIdentityRecord {
        row_id: row.get(0)?,
        identifier: row.get(1)?,
        last_seen_ms: row.get(2)?,
        session_key_row_id: row.get(3)?,
    })
}

fn read_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContactEventRecord> {
    Ok(ContactEventRecord {
        row_id: row.get(0)?,
        peer_identity_row_id: row.get(1)?,
        connect_time_ms: row.get(2)?,
        meta: ContactMeta {
            peripheral_hash: row.get(3)?,
            organization: row.get(4)?,
            protocol_version: row.get(5)?,
            challenge: row.get(6)?,
            hmac: row.get(7)?,
            rssi: row.get(8)?,
            metadata: row.get(9)?,
        },
    })
}

fn read_ping(row: &rusqlite::Row<'_>) -> rusqlite::Result<PingEventRecord> {
    Ok(PingEventRecord {
        row_id: row.get(0)?,
        peer_identity_row_id: row.get(1)?,
        timestamp_ms: row.get(2)?,
        elapsed_ms: row.get(3)?,
    })
}

/// Inserts a ping unless the gap since the previous one reaches `max_elapsed_ms`.
fn insert_ping(
    conn: &Connection,
    identity_row_id: i64,
    timestamp_ms: i64,
    max_elapsed_ms: i64,
) -> Result<Option<i64>, StorageError> {
    let prior: Option<i64> = conn
        .query_row(
            "SELECT timestamp_ms FROM ping_events WHERE peer_identity_row_id = ?1
             ORDER BY timestamp_ms DESC, row_id DESC LIMIT 1",
            params![identity_row_id],
            |row| row.get(0),
        )
        .optional()?;

    let elapsed = prior.map_or(0, |prior| timestamp_ms.saturating_sub(prior));
    if elapsed >= max_elapsed_ms {
        return Ok(None);
    }

    conn.execute(
        "INSERT INTO ping_events (peer_identity_row_id, timestamp_ms, elapsed_ms)
         VALUES (?1, ?2, ?3)",
        params![identity_row_id, timestamp_ms, elapsed],
    )?;
    Ok(Some(conn.last_insert_rowid()))
}

impl Storage {
    // === Encounter Operations ===

    /// Records a contact with `identifier` observed at `observed_at_ms`.
    ///
    /// Creates the identity on first sighting, otherwise advances its last
    /// seen time. Also records a zero-elapsed ping. Returns the contact
    /// event id.
    pub fn record_contact(
        &self,
        identifier: &str,
        observed_at_ms: i64,
        meta: &ContactMeta,
    ) -> Result<i64, StorageError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        // Unique index on identifier: a racing first sighting is ignored and
        // the existing row is re-read below.
        tx.execute(
            "INSERT OR IGNORE INTO peer_identities (identifier, last_seen_ms, session_key_row_id)
             VALUES (?1, ?2, NULL)",
            params![identifier, observed_at_ms],
        )?;
        let identity_row_id: i64 = tx.query_row(
            "SELECT row_id FROM peer_identities WHERE identifier = ?1",
            params![identifier],
            |row| row.get(0),
        )?;
        tx.execute(
            "UPDATE peer_identities SET last_seen_ms = MAX(last_seen_ms, ?2) WHERE row_id = ?1",
            params![identity_row_id, observed_at_ms],
        )?;

        tx.execute(
            "INSERT INTO ping_events (peer_identity_row_id, timestamp_ms, elapsed_ms)
             VALUES (?1, ?2, 0)",
            params![identity_row_id, observed_at_ms],
        )?;

        tx.execute(
            "INSERT INTO contact_events
             (peripheral_hash, connect_time_ms, organization, protocol_version,
              peer_identity_row_id, challenge, hmac, rssi, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                meta.peripheral_hash,
                observed_at_ms,
                meta.organization,
                meta.protocol_version,
                identity_row_id,
                meta.challenge,
                meta.hmac,
                meta.rssi,
                meta.metadata,
            ],
        )?;
        let event_id = tx.last_insert_rowid();

        tx.commit()?;
        Ok(event_id)
    }

    /// Records a re-sighting of a known identity.
    ///
    /// Returns `None` without inserting when the gap since the identity's
    /// previous ping is `max_elapsed_ms` or more. A first ping is recorded
    /// with zero elapsed time.
    pub fn record_ping(
        &self,
        identity_row_id: i64,
        timestamp_ms: i64,
        max_elapsed_ms: i64,
    ) -> Result<Option<i64>, StorageError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT COUNT(*) > 0 FROM peer_identities WHERE row_id = ?1",
            params![identity_row_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::NotFound(format!(
                "peer identity {}",
                identity_row_id
            )));
        }

        let ping = insert_ping(&tx, identity_row_id, timestamp_ms, max_elapsed_ms)?;
        tx.commit()?;
        Ok(ping)
    }

    /// Records a re-sighting of whichever identity last connected through
    /// `peripheral_hash`.
    ///
    /// The lookup and the insert share one transaction, so a concurrent
    /// prune shows up as [`PeripheralPing::UnknownPeripheral`].
    pub fn record_ping_for_peripheral(
        &self,
        peripheral_hash: &str,
        timestamp_ms: i64,
        max_elapsed_ms: i64,
    ) -> Result<PeripheralPing, StorageError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let identity_row_id: Option<i64> = tx
            .query_row(
                "SELECT peer_identity_row_id FROM contact_events WHERE peripheral_hash = ?1
                 ORDER BY connect_time_ms DESC, row_id DESC LIMIT 1",
                params![peripheral_hash],
                |row| row.get(0),
            )
            .optional()?;

        let Some(identity_row_id) = identity_row_id else {
            return Ok(PeripheralPing::UnknownPeripheral);
        };

        let ping = insert_ping(&tx, identity_row_id, timestamp_ms, max_elapsed_ms)?;
        tx.commit()?;
        Ok(ping.map_or(PeripheralPing::GapTooLarge, PeripheralPing::Recorded))
    }

    /// Returns the most recent contact made through `peripheral_hash`.
    pub fn last_contact_for_peripheral(
        &self,
        peripheral_hash: &str,
    ) -> Result<Option<ContactEventRecord>, StorageError> {
        let conn = self.conn();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM contact_events WHERE peripheral_hash = ?1
                     ORDER BY connect_time_ms DESC, row_id DESC LIMIT 1",
                    CONTACT_COLUMNS
                ),
                params![peripheral_hash],
                read_contact,
            )
            .optional()?;
        Ok(record)
    }

    /// Looks up an identity by its identifier.
    pub fn find_identity(
        &self,
        identifier: &str,
    ) -> Result<Option<PeerIdentityRecord>, StorageError> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT row_id, identifier, last_seen_ms, session_key_row_id
             FROM peer_identities WHERE identifier = ?1",
            params![identifier],
            read_identity,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StorageError::Database(e)),
        }
    }

    /// Points the identity with `identifier` at the session key that
    /// generated it.
    ///
    /// Returns `false` if no such identity exists, for example because it
    /// was pruned after being looked up.
    pub fn tag_identity(
        &self,
        identifier: &str,
        session_key_row_id: i64,
    ) -> Result<bool, StorageError> {
        let updated = self.conn().execute(
            "UPDATE peer_identities SET session_key_row_id = ?2 WHERE identifier = ?1",
            params![identifier, session_key_row_id],
        )?;
        Ok(updated == 1)
    }

    /// Deletes identities last seen before `threshold_ms` together with
    /// their contact and ping events.
    ///
    /// Returns the number of identities deleted.
    pub fn prune_identities_older_than(&self, threshold_ms: i64) -> Result<usize, StorageError> {
        let deleted = self.conn().execute(
            "DELETE FROM peer_identities WHERE last_seen_ms < ?1",
            params![threshold_ms],
        )?;
        Ok(deleted)
    }

    /// Counts identities seen after `since_ms`.
    pub fn count_interactions_since(&self, since_ms: i64) -> Result<i64, StorageError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM peer_identities WHERE last_seen_ms > ?1",
            params![since_ms],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Counts identities seen after `since_ms` whose session key carries `tag`.
    pub fn count_tagged_interactions_since(
        &self,
        tag: &str,
        since_ms: i64,
    ) -> Result<i64, StorageError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM peer_identities peer
             INNER JOIN session_keys sk ON peer.session_key_row_id = sk.row_id
             WHERE peer.last_seen_ms > ?2 AND sk.tag = ?1",
            params![tag, since_ms],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Counts ping events of identities whose session key carries `tag`.
    pub fn count_tagged_pings(&self, tag: &str) -> Result<i64, StorageError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(ping.elapsed_ms) FROM ping_events ping
             INNER JOIN peer_identities peer ON ping.peer_identity_row_id = peer.row_id
             INNER JOIN session_keys sk ON peer.session_key_row_id = sk.row_id
             WHERE sk.tag = ?1",
            params![tag],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Lists identities whose session key carries `tag`.
    pub fn identities_with_tag(&self, tag: &str) -> Result<Vec<PeerIdentityRecord>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT peer.row_id, peer.identifier, peer.last_seen_ms, peer.session_key_row_id
             FROM peer_identities peer
             INNER JOIN session_keys sk ON peer.session_key_row_id = sk.row_id
             WHERE sk.tag = ?1 ORDER BY peer.row_id",
        )?;
        let records = stmt
            .query_map(params![tag], read_identity)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Lists all identities.
    pub fn list_identities(&self) -> Result<Vec<PeerIdentityRecord>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT row_id, identifier, last_seen_ms, session_key_row_id
             FROM peer_identities ORDER BY row_id",
        )?;
        let records = stmt
            .query_map([], read_identity)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Lists all contact events in insertion order.
    pub fn list_contact_events(&self) -> Result<Vec<ContactEventRecord>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM contact_events ORDER BY row_id",
            CONTACT_COLUMNS
        ))?;
        let records = stmt
            .query_map([], read_contact)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Lists all ping events in insertion order.
    pub fn list_ping_events(&self) -> Result<Vec<PingEventRecord>, StorageError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT row_id, peer_identity_row_id, timestamp_ms, elapsed_ms
             FROM ping_events ORDER BY row_id",
        )?;
        let records = stmt
            .query_map([], read_ping)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}
