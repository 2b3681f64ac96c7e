// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Ingestion Worker
//!
//! A single consumer thread over an unbounded FIFO queue of observations.
//! The queue is unbounded so transport callbacks never block; memory grows
//! instead. FIFO order matters: ping elapsed times are computed against the
//! most recent prior ping.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::contact::{ContactIngestor, ContactObservation};

/// Returned when submitting to a worker that has shut down.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("ingest worker is shut down")]
pub struct WorkerClosed;

/// Worker counters.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    pub ingested: AtomicU64,
    pub dropped: AtomicU64,
    pub failed: AtomicU64,
}

impl WorkerMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ingested: self.ingested.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Observations recorded (contacts and pings, including gap-skipped pings).
    pub ingested: u64,
    /// Observations rejected by payload validation.
    pub dropped: u64,
    /// Observations lost to storage errors.
    pub failed: u64,
}

enum WorkerCmd {
    Observe(Box<ContactObservation>),
    Flush { response_tx: Sender<()> },
    Shutdown,
}

/// Flush barrier detached from the [`IngestWorker`] that created it.
#[derive(Clone)]
pub struct FlushHandle {
    tx: Sender<WorkerCmd>,
}

impl FlushHandle {
    /// Blocks until every observation queued before this call is processed.
    ///
    /// Fails with [`WorkerClosed`] once the worker has shut down.
    pub fn flush(&self) -> Result<(), WorkerClosed> {
        let (response_tx, response_rx) = bounded(1);
        self.tx
            .send(WorkerCmd::Flush { response_tx })
            .map_err(|_| WorkerClosed)?;
        response_rx.recv().map_err(|_| WorkerClosed)
    }
}

/// Handle to the ingestion thread.
pub struct IngestWorker {
    tx: Sender<WorkerCmd>,
    metrics: Arc<WorkerMetrics>,
    worker_thread: Option<thread::JoinHandle<()>>,
}

impl IngestWorker {
    /// Spawns the consumer thread.
    pub fn start(ingestor: ContactIngestor) -> Self {
        let (tx, rx) = unbounded();
        let metrics = Arc::new(WorkerMetrics::default());
        let metrics_clone = Arc::clone(&metrics);

        let worker_thread = thread::Builder::new()
            .name("murmur-ingest".to_string())
            .spawn(move || Self::run(ingestor, rx, metrics_clone))
            .ok();

        if worker_thread.is_none() {
            error!("failed to spawn ingest thread");
        }

        IngestWorker {
            tx,
            metrics,
            worker_thread,
        }
    }

    /// Queues an observation. Never blocks.
    pub fn submit(&self, observation: ContactObservation) -> Result<(), WorkerClosed> {
        self.tx
            .send(WorkerCmd::Observe(Box::new(observation)))
            .map_err(|_| WorkerClosed)
    }

    /// Blocks until every observation queued before this call is processed.
    pub fn flush(&self) -> Result<(), WorkerClosed> {
        self.flush_handle().flush()
    }

    /// Returns a handle that can wait on the queue after the worker itself
    /// is no longer borrowed.
    pub fn flush_handle(&self) -> FlushHandle {
        FlushHandle {
            tx: self.tx.clone(),
        }
    }

    /// Number of commands waiting in the queue.
    pub fn pending(&self) -> usize {
        self.tx.len()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Drains the queue and joins the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(handle) = self.worker_thread.take() {
            // Queued behind every pending observation, so they drain first.
            let _ = self.tx.send(WorkerCmd::Shutdown);
            if handle.join().is_err() {
                error!("ingest thread panicked");
            }
        }
    }

    fn run(ingestor: ContactIngestor, rx: Receiver<WorkerCmd>, metrics: Arc<WorkerMetrics>) {
        debug!("ingest worker started");
        for cmd in rx.iter() {
            match cmd {
                WorkerCmd::Observe(observation) => match ingestor.ingest(&observation) {
                    Ok(Some(_)) => {
                        metrics.ingested.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(None) => {
                        metrics.dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        metrics.failed.fetch_add(1, Ordering::Relaxed);
                        error!(error = %e, "failed to store contact observation");
                    }
                },
                WorkerCmd::Flush { response_tx } => {
                    let _ = response_tx.send(());
                }
                WorkerCmd::Shutdown => break,
            }
        }
        info!(metrics = ?metrics.snapshot(), "ingest worker stopped");
    }
}

impl Drop for IngestWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
