//! Offline pass over a store file: pairs each batch's records into
//! connections and prints one line per connection.

use crate::config::AnalyzerConfig;
use crate::connection::{ConnectionFilter, PairingMode, reconstruct};
use crate::resolve::{NumericResolver, Resolver, ServiceTable, SystemResolver};
use crate::store::{self, BatchKey, Batches};
use anyhow::{Context, Result};
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M.%S";

#[derive(Debug, Error)]
#[error("File {} does not exist!", .0.display())]
pub struct MissingStore(pub PathBuf);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisReport {
    pub batches: usize,
    pub records: usize,
    pub connections: usize,
    pub unpaired: usize,
    pub rejected: usize,
    pub filtered: usize,
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} batches, {} records, {} connections ({} unpaired, {} rejected, {} filtered)",
            self.batches, self.records, self.connections, self.unpaired, self.rejected, self.filtered
        )
    }
}

pub struct Analyzer<R> {
    resolver: R,
    pairing: PairingMode,
    filter: ConnectionFilter,
}

impl<R: Resolver> Analyzer<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            pairing: PairingMode::default(),
            filter: ConnectionFilter::default(),
        }
    }

    pub fn with_pairing(mut self, pairing: PairingMode) -> Self {
        self.pairing = pairing;
        self
    }

    pub fn with_filter(mut self, filter: ConnectionFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Walks batches in ascending key order. `connections` counts every
    /// pair built, including the ones the filter hides.
    pub fn analyze(&self, batches: &Batches, out: &mut impl Write) -> io::Result<AnalysisReport> {
        let mut report = AnalysisReport::default();

        for (key, records) in batches {
            report.batches += 1;
            report.records += records.len();

            let timestamp = batch_timestamp(key);
            let pairing = reconstruct(records, self.pairing);
            if pairing.unpaired > 0 {
                debug!(batch = %key, records = records.len(), "Trailing record left unpaired");
            }
            report.unpaired += pairing.unpaired;
            report.rejected += pairing.rejected;

            for connection in &pairing.connections {
                report.connections += 1;
                let summary = connection.summarize(&self.resolver);
                if !self.filter.matches_summary(&summary) {
                    report.filtered += 1;
                    continue;
                }
                writeln!(out, "{}", summary.line(&timestamp))?;
            }
        }

        Ok(report)
    }
}

/// Local wall-clock rendering of a batch key; falls back to the raw key
/// for timestamps chrono cannot represent.
pub fn batch_timestamp(key: &BatchKey) -> String {
    key.to_local()
        .map(|time| time.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_else(|| key.to_string())
}

pub fn run(config: &AnalyzerConfig, out: &mut impl Write) -> Result<AnalysisReport> {
    if !config.store.exists() {
        return Err(MissingStore(config.store.clone()).into());
    }

    let batches = store::load(&config.store)
        .with_context(|| format!("Failed to load store {:?}", config.store))?;
    info!(path = ?config.store, batches = batches.len(), "Store loaded");

    let services = ServiceTable::load_or_empty(&config.services);
    let filter = ConnectionFilter::new(&config.filter);

    let report = if config.resolve_hostnames {
        Analyzer::new(SystemResolver::new(services))
            .with_pairing(config.pairing)
            .with_filter(filter)
            .analyze(&batches, out)
    } else {
        Analyzer::new(NumericResolver::new(services))
            .with_pairing(config.pairing)
            .with_filter(filter)
            .analyze(&batches, out)
    }
    .context("Failed to write report")?;

    info!(
        batches = report.batches,
        records = report.records,
        connections = report.connections,
        unpaired = report.unpaired,
        rejected = report.rejected,
        filtered = report.filtered,
        "Analysis finished"
    );
    Ok(report)
}
