use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the listener and whoever wants to observe it.
#[derive(Debug, Default)]
pub struct CollectorStats {
    datagrams: AtomicU64,
    decode_errors: AtomicU64,
    records: AtomicU64,
    templates: AtomicU64,
    skipped_flowsets: AtomicU64,
    dropped_records: AtomicU64,
    batches: AtomicU64,
}

impl CollectorStats {
    pub(super) fn record_datagram(&self) {
        self.datagrams.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn record_templates(&self, count: usize) {
        self.templates.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(super) fn record_skipped(&self, flowsets: usize, records: usize) {
        self.skipped_flowsets
            .fetch_add(flowsets as u64, Ordering::Relaxed);
        self.dropped_records
            .fetch_add(records as u64, Ordering::Relaxed);
    }

    pub(super) fn record_batch(&self, records: usize) {
        self.records.fetch_add(records as u64, Ordering::Relaxed);
        self.batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams: self.datagrams.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
            templates: self.templates.load(Ordering::Relaxed),
            skipped_flowsets: self.skipped_flowsets.load(Ordering::Relaxed),
            dropped_records: self.dropped_records.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub datagrams: u64,
    pub decode_errors: u64,
    pub records: u64,
    pub templates: u64,
    pub skipped_flowsets: u64,
    pub dropped_records: u64,
    pub batches: u64,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "datagrams={} decode_errors={} batches={} records={} templates={} skipped_flowsets={} dropped_records={}",
            self.datagrams,
            self.decode_errors,
            self.batches,
            self.records,
            self.templates,
            self.skipped_flowsets,
            self.dropped_records
        )
    }
}
