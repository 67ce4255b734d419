use super::{BatchKey, BatchStore, StoreError};
use crate::flow::FlowRecord;
use anyhow::{Context, Result, anyhow};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, error, info, warn};

struct PendingBatch {
    key: BatchKey,
    records: Vec<FlowRecord>,
}

#[derive(Debug, Error)]
#[error("store writer has shut down")]
pub struct WriterClosed;

/// Sending side of the store writer. Clones feed the same writer; the
/// writer finishes once every handle is dropped.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: Sender<PendingBatch>,
}

impl WriterHandle {
    pub async fn append(&self, key: BatchKey, records: Vec<FlowRecord>) -> Result<(), WriterClosed> {
        self.tx
            .send(PendingBatch { key, records })
            .await
            .map_err(|_| WriterClosed)
    }
}

impl std::fmt::Debug for PendingBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingBatch")
            .field("key", &self.key)
            .field("records", &self.records.len())
            .finish()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriterSummary {
    pub batches_appended: usize,
    pub records_appended: usize,
    pub duplicates_rejected: usize,
    pub persists: usize,
    pub failed_persists: usize,
    /// True when the final persist failed and appended batches were lost.
    pub unsaved: bool,
}

/// Single owner of a [`BatchStore`]. All appends are serialized through
/// one thread, which persists after draining whatever is queued.
pub struct StoreWriter {
    thread: JoinHandle<WriterSummary>,
}

impl StoreWriter {
    pub fn spawn(store: BatchStore, queue_depth: usize) -> Result<(Self, WriterHandle)> {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        info!(
            path = ?store.path(),
            batches = store.batches().len(),
            unreadable = store.unreadable(),
            "Spawning store writer"
        );
        let thread = thread::Builder::new()
            .name("Store Writer".to_string())
            .spawn(move || run(store, rx))
            .context("Failed to spawn store writer thread")?;
        Ok((Self { thread }, WriterHandle { tx }))
    }

    /// Waits for the writer to drain its queue and persist for the last time.
    pub fn join(self) -> Result<WriterSummary> {
        self.thread
            .join()
            .map_err(|_| anyhow!("store writer thread panicked"))
    }
}

fn run(mut store: BatchStore, mut rx: Receiver<PendingBatch>) -> WriterSummary {
    let mut summary = WriterSummary::default();
    let mut dirty = false;

    while let Some(first) = rx.blocking_recv() {
        dirty |= apply(&mut store, first, &mut summary);
        while let Ok(next) = rx.try_recv() {
            dirty |= apply(&mut store, next, &mut summary);
        }
        if dirty {
            dirty = !flush(&store, &mut summary);
        }
    }

    if dirty {
        warn!(path = ?store.path(), "Retrying store write before shutdown");
        dirty = !flush(&store, &mut summary);
    }
    summary.unsaved = dirty;

    info!(
        path = ?store.path(),
        batches = summary.batches_appended,
        records = summary.records_appended,
        persists = summary.persists,
        failed = summary.failed_persists,
        "Store writer stopped"
    );
    summary
}

fn apply(store: &mut BatchStore, batch: PendingBatch, summary: &mut WriterSummary) -> bool {
    let records = batch.records.len();
    match store.append(batch.key, batch.records) {
        Ok(()) => {
            summary.batches_appended += 1;
            summary.records_appended += records;
            true
        }
        Err(StoreError::DuplicateKey(key)) => {
            error!(batch = %key, records, "Batch key already stored; dropping batch");
            summary.duplicates_rejected += 1;
            false
        }
        Err(e) => {
            error!(error = ?e, "Failed to append batch");
            false
        }
    }
}

/// Failed writes keep the batches in memory; the next flush includes them.
fn flush(store: &BatchStore, summary: &mut WriterSummary) -> bool {
    match store.persist() {
        Ok(()) => {
            summary.persists += 1;
            debug!(path = ?store.path(), "Store flushed");
            true
        }
        Err(e) => {
            summary.failed_persists += 1;
            error!(error = ?e, "Failed to persist batch store");
            false
        }
    }
}
