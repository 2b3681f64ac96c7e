// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Reconnect throttling.

use crate::storage::ContactEventRecord;

/// What the transport should do with a scanned peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Open a connection and read a fresh identifier.
    Connect,
    /// Record a ping against the identity last read from this peripheral.
    Ping { identity_row_id: i64 },
    /// Nothing to do.
    Ignore,
}

/// Throttles reconnections to recently contacted peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub must_reconnect_after_ms: i64,
}

impl ReconnectPolicy {
    pub fn new(must_reconnect_after_ms: i64) -> Self {
        ReconnectPolicy {
            must_reconnect_after_ms,
        }
    }

    /// Decides how to handle a peripheral given its last contact.
    ///
    /// `must_connect` is the scanner's own priority decision (e.g. the peer
    /// is not going to connect to us). A peripheral contacted less than
    /// `must_reconnect_after_ms` ago is pinged instead of reconnected.
    pub fn decide(
        &self,
        last_contact: Option<&ContactEventRecord>,
        now_ms: i64,
        must_connect: bool,
    ) -> ReconnectDecision {
        let throttled = must_connect
            && last_contact.is_some_and(|last| {
                now_ms < last.connect_time_ms.saturating_add(self.must_reconnect_after_ms)
            });

        match last_contact {
            Some(last) if !must_connect || throttled => ReconnectDecision::Ping {
                identity_row_id: last.peer_identity_row_id,
            },
            _ if must_connect => ReconnectDecision::Connect,
            _ => ReconnectDecision::Ignore,
        }
    }
}
