// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Main Murmur Orchestrator
//!
//! Ties storage, the session key store, the ingestion worker and matching
//! together behind one handle.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::info;

use super::config::MurmurConfig;
use super::error::{MurmurError, MurmurResult};
use crate::contact::{
    peripheral_hash, ContactIngestor, ContactObservation, ReconnectDecision, ReconnectPolicy,
    TidPayload,
};
use crate::exposure::ExposureEstimator;
use crate::identity::{SecureTid, SessionKeySecret};
use crate::keys::SessionKeyStore;
use crate::matching::MatchEngine;
use crate::storage::{CoreEvent, CoreEventCode, Storage};
use crate::worker::IngestWorker;

/// Protocol version advertised in payloads.
pub const PROTOCOL_VERSION: u8 = 1;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Main Murmur handle.
///
/// # Example
///
/// ```ignore
/// use murmur_core::api::{Murmur, MurmurConfig};
///
/// let murmur = Murmur::new(MurmurConfig::default())?;
/// murmur.start()?;
/// let tid = murmur.current_secure_tid(b"nonce")?;
/// // ... hand observations from the transport to murmur.submit_observation()
/// let matches = murmur.process_tainted_keys(&disclosed, "covid-19")?;
/// murmur.stop()?;
/// ```
pub struct Murmur {
    config: MurmurConfig,
    storage: Arc<Storage>,
    keys: Arc<SessionKeyStore>,
    matcher: MatchEngine,
    exposure: ExposureEstimator,
    reconnect: ReconnectPolicy,
    worker: Mutex<Option<IngestWorker>>,
}

impl Murmur {
    /// Opens storage per `config`. The ingestion worker is not running
    /// until [`Murmur::start`].
    pub fn new(config: MurmurConfig) -> MurmurResult<Self> {
        config.validate()?;

        let storage = match &config.storage_path {
            Some(path) => Storage::open(path)?,
            None => Storage::in_memory()?,
        };
        let storage = Arc::new(storage);
        let keys = Arc::new(SessionKeyStore::new(Arc::clone(&storage)));

        Ok(Murmur {
            matcher: MatchEngine::new(Arc::clone(&keys)),
            exposure: ExposureEstimator::new(Arc::clone(&storage)),
            reconnect: ReconnectPolicy::new(config.must_reconnect_after_ms),
            worker: Mutex::new(None),
            config,
            storage,
            keys,
        })
    }

    /// Creates an in-memory instance with default configuration.
    pub fn in_memory() -> MurmurResult<Self> {
        Self::new(MurmurConfig::default())
    }

    // === Lifecycle ===

    /// Starts the ingestion worker.
    pub fn start(&self) -> MurmurResult<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Err(MurmurError::AlreadyStarted);
        }

        self.storage
            .record_core_event(&CoreEvent::new(now_ms(), CoreEventCode::ScanStarted))?;

        let ingestor = ContactIngestor::new(Arc::clone(&self.storage), self.config.ping_max_elapsed_ms);
        *worker = Some(IngestWorker::start(ingestor));
        info!(organization = self.config.organization_code, "murmur started");
        Ok(())
    }

    /// Drains queued observations, then stops the worker.
    pub fn stop(&self) -> MurmurResult<()> {
        let worker = self.worker.lock().take().ok_or(MurmurError::NotStarted)?;
        worker.shutdown();

        self.storage
            .record_core_event(&CoreEvent::new(now_ms(), CoreEventCode::ScanStopped))?;
        info!("murmur stopped");
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        self.worker.lock().is_some()
    }

    // === Ingestion ===

    /// Queues a decoded observation for the worker.
    pub fn submit_observation(&self, observation: ContactObservation) -> MurmurResult<()> {
        let worker = self.worker.lock();
        let worker = worker.as_ref().ok_or(MurmurError::NotStarted)?;
        Ok(worker.submit(observation)?)
    }

    /// Waits until every observation submitted so far is stored.
    ///
    /// The worker lock is released before waiting, so producers keep
    /// submitting during the drain.
    pub fn flush(&self) -> MurmurResult<()> {
        let handle = self
            .worker
            .lock()
            .as_ref()
            .map(IngestWorker::flush_handle)
            .ok_or(MurmurError::NotStarted)?;
        Ok(handle.flush()?)
    }

    /// Decides whether the transport should connect to or ping `peer_address`.
    pub fn reconnect_decision(
        &self,
        peer_address: &str,
        now_ms: i64,
        must_connect: bool,
    ) -> MurmurResult<ReconnectDecision> {
        let last = self
            .storage
            .last_contact_for_peripheral(&peripheral_hash(peer_address))?;
        Ok(self.reconnect.decide(last.as_ref(), now_ms, must_connect))
    }

    // === Local Identity ===

    /// Returns the temporary identifier to advertise now.
    pub fn current_secure_tid(&self, challenge: &[u8]) -> MurmurResult<SecureTid> {
        self.current_secure_tid_at(now_ms(), challenge)
    }

    /// Returns the temporary identifier to advertise at `now_ms`, rotating
    /// the session key if it expired.
    pub fn current_secure_tid_at(&self, now_ms: i64, challenge: &[u8]) -> MurmurResult<SecureTid> {
        let now_sec = now_ms.div_euclid(1000);
        let generator = self.keys.get_current_generator(
            now_sec,
            self.config.session_key_validity_sec,
            self.config.temporary_id_validity_sec,
        )?;
        Ok(generator.generate_at(now_sec, challenge))
    }

    /// Returns the payload to serve to a connecting peer at `now_ms`.
    pub fn current_tid_payload_at(&self, now_ms: i64, challenge: &[u8]) -> MurmurResult<TidPayload> {
        let tid = self.current_secure_tid_at(now_ms, challenge)?;
        Ok(TidPayload::from_secure_tid(
            PROTOCOL_VERSION,
            self.config.organization_code,
            &tid,
        ))
    }

    /// Local session keys created within the last `period_sec`, most recent first.
    pub fn extract_recent_session_keys(&self, period_sec: i64) -> MurmurResult<Vec<SessionKeySecret>> {
        self.extract_recent_session_keys_at(now_ms(), period_sec)
    }

    pub fn extract_recent_session_keys_at(
        &self,
        now_ms: i64,
        period_sec: i64,
    ) -> MurmurResult<Vec<SessionKeySecret>> {
        let since_sec = now_ms.div_euclid(1000).saturating_sub(period_sec);
        Ok(self.keys.extract_recent_local_keys(since_sec)?)
    }

    /// Deletes a local session key, rotating if it was active.
    pub fn evict_local_key(&self, key: &SessionKeySecret) -> MurmurResult<()> {
        self.evict_local_keys_at(now_ms(), std::slice::from_ref(key))?;
        Ok(())
    }

    pub fn evict_local_keys_at(&self, now_ms: i64, keys: &[SessionKeySecret]) -> MurmurResult<usize> {
        Ok(self.keys.evict_local_keys(keys, now_ms.div_euclid(1000))?)
    }

    // === Matching & Exposure ===

    /// Matches disclosed keys, capping each key window at the incubation period.
    pub fn process_tainted_keys(&self, keys: &[SessionKeySecret], tag: &str) -> MurmurResult<usize> {
        self.process_tainted_keys_at(now_ms(), keys, tag)
    }

    pub fn process_tainted_keys_at(
        &self,
        now_ms: i64,
        keys: &[SessionKeySecret],
        tag: &str,
    ) -> MurmurResult<usize> {
        Ok(self
            .matcher
            .process_tainted_keys(keys, tag, self.config.incubation_window_sec(), now_ms)?)
    }

    pub fn risk_exposure(&self, tag: &str) -> MurmurResult<i64> {
        Ok(self.exposure.estimate_exposure(tag)?)
    }

    pub fn number_of_interactions(&self, since_ms: i64) -> MurmurResult<i64> {
        Ok(self.exposure.interactions_since(since_ms)?)
    }

    pub fn number_of_risk_interactions(&self, tag: &str, since_ms: i64) -> MurmurResult<i64> {
        Ok(self.exposure.risk_interactions_since(tag, since_ms)?)
    }

    // === Maintenance ===

    /// Drops encounters and journal entries older than the incubation period.
    pub fn prune(&self) -> MurmurResult<usize> {
        self.prune_at(now_ms())
    }

    /// Drops encounters and journal entries older than `now_ms` minus the
    /// incubation period. Returns the number of identities deleted.
    pub fn prune_at(&self, now_ms: i64) -> MurmurResult<usize> {
        let threshold_ms =
            now_ms.saturating_sub(self.config.incubation_period_sec.saturating_mul(1000));
        let identities = self.storage.prune_identities_older_than(threshold_ms)?;
        let events = self.storage.prune_core_events_older_than(threshold_ms)?;

        self.storage.record_core_event(
            &CoreEvent::new(now_ms, CoreEventCode::Prune).with_ints(identities as i64, events as i64),
        )?;
        info!(identities, events, threshold_ms, "pruned encounter data");
        Ok(identities)
    }

    // === Accessors ===

    pub fn config(&self) -> &MurmurConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn session_keys(&self) -> &Arc<SessionKeyStore> {
        &self.keys
    }
}
