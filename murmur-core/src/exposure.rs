// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Exposure estimation.

use std::sync::Arc;

use crate::storage::{Storage, StorageError};

/// Aggregates tagged encounters into a relative risk signal.
pub struct ExposureEstimator {
    storage: Arc<Storage>,
}

impl ExposureEstimator {
    pub fn new(storage: Arc<Storage>) -> Self {
        ExposureEstimator { storage }
    }

    /// Counts ping events (contacts included) of identities tagged `tag`.
    ///
    /// A unitless count, not a calibrated dose. Zero when nothing matched.
    pub fn estimate_exposure(&self, tag: &str) -> Result<i64, StorageError> {
        self.storage.count_tagged_pings(tag)
    }

    /// Counts distinct identities seen after `since_ms`.
    pub fn interactions_since(&self, since_ms: i64) -> Result<i64, StorageError> {
        self.storage.count_interactions_since(since_ms)
    }

    /// Counts distinct identities seen after `since_ms` and tagged `tag`.
    pub fn risk_interactions_since(&self, tag: &str, since_ms: i64) -> Result<i64, StorageError> {
        self.storage.count_tagged_interactions_since(tag, since_ms)
    }
}
