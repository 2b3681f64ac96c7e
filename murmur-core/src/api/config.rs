// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration for the tracing core.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::{MurmurError, MurmurResult};

const DAY_SEC: i64 = 24 * 3600;

/// Murmur configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MurmurConfig {
    /// Database file; `None` keeps everything in memory.
    pub storage_path: Option<PathBuf>,

    /// Organization code advertised in payloads.
    pub organization_code: u16,

    /// Lifetime of a local session key.
    pub session_key_validity_sec: i32,

    /// Lifetime of one temporary identifier (the key index step).
    pub temporary_id_validity_sec: i32,

    /// How long encounters are kept, and the cap on disclosed key windows.
    pub incubation_period_sec: i64,

    /// Largest gap between two sightings still counted as one encounter.
    pub ping_max_elapsed_ms: i64,

    /// Minimum delay before reconnecting to a peripheral.
    pub must_reconnect_after_ms: i64,
}

impl Default for MurmurConfig {
    fn default() -> Self {
        MurmurConfig {
            storage_path: None,
            organization_code: 0x01,
            session_key_validity_sec: (7 * DAY_SEC) as i32,
            temporary_id_validity_sec: 3600,
            incubation_period_sec: 21 * DAY_SEC,
            ping_max_elapsed_ms: 5 * 60 * 1000,
            must_reconnect_after_ms: 30 * 60 * 1000,
        }
    }
}

impl MurmurConfig {
    /// Uses an on-disk database at `path`.
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }

    /// Checks that all windows are positive and consistent.
    pub fn validate(&self) -> MurmurResult<()> {
        if self.session_key_validity_sec <= 0 {
            return Err(MurmurError::Configuration(
                "session_key_validity_sec must be positive".into(),
            ));
        }
        if self.temporary_id_validity_sec <= 0 {
            return Err(MurmurError::Configuration(
                "temporary_id_validity_sec must be positive".into(),
            ));
        }
        if self.temporary_id_validity_sec > self.session_key_validity_sec {
            return Err(MurmurError::Configuration(
                "temporary_id_validity_sec exceeds session_key_validity_sec".into(),
            ));
        }
        if self.incubation_period_sec <= 0 {
            return Err(MurmurError::Configuration(
                "incubation_period_sec must be positive".into(),
            ));
        }
        if self.ping_max_elapsed_ms <= 0 {
            return Err(MurmurError::Configuration(
                "ping_max_elapsed_ms must be positive".into(),
            ));
        }
        if self.must_reconnect_after_ms <= 0 {
            return Err(MurmurError::Configuration(
                "must_reconnect_after_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Loads a JSON configuration file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> MurmurResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| MurmurError::Configuration(format!("{}: {}", path.display(), e)))?;
        let config: MurmurConfig = serde_json::from_str(&json)
            .map_err(|e| MurmurError::Configuration(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> MurmurResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| MurmurError::Configuration(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| MurmurError::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Incubation period clamped to the range of a key window.
    pub(crate) fn incubation_window_sec(&self) -> i32 {
        self.incubation_period_sec.clamp(0, i64::from(i32::MAX)) as i32
    }
}
