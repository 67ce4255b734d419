//! UDP listener that decodes export datagrams and hands each datagram's
//! records to the store writer as one batch.

use crate::config::CollectorConfig;
use crate::decoder::{Decoder, NetflowDecoder};
use crate::store::{BatchKey, BatchStore, KeySource, StoreWriter, WriterClosed, WriterHandle};
use crate::template::TemplateCache;
use anyhow::{Context, Result};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, warn};

mod shutdown;
mod stats;

#[cfg(test)]
mod tests;

pub use stats::{CollectorStats, StatsSnapshot};

const MAX_DATAGRAM: usize = 65_535;

pub struct Collector<D> {
    socket: UdpSocket,
    decoder: D,
    templates: TemplateCache,
    writer: WriterHandle,
    keys: KeySource,
    stats: Arc<CollectorStats>,
}

impl<D: Decoder> Collector<D> {
    pub fn new(
        socket: UdpSocket,
        decoder: D,
        templates: TemplateCache,
        writer: WriterHandle,
        keys: KeySource,
    ) -> Self {
        Self {
            socket,
            decoder,
            templates,
            writer,
            keys,
            stats: Arc::new(CollectorStats::default()),
        }
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn stats(&self) -> Arc<CollectorStats> {
        Arc::clone(&self.stats)
    }

    pub fn templates(&self) -> TemplateCache {
        self.templates.clone()
    }

    /// Receives until `shutdown` resolves. A datagram already being handled
    /// is finished first. Dropping the collector releases its writer handle.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested; no longer accepting datagrams");
                    break;
                }
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            self.handle_datagram(&buf[..len], peer)
                                .await
                                .context("Store writer stopped unexpectedly")?;
                        }
                        Err(e) => warn!(error = ?e, "Failed to receive datagram"),
                    }
                }
            }
        }

        Ok(())
    }

    /// Decodes one datagram and queues its records. Decode failures drop
    /// the datagram; only a vanished writer is an error.
    pub async fn handle_datagram(
        &mut self,
        datagram: &[u8],
        peer: SocketAddr,
    ) -> Result<Option<BatchKey>, WriterClosed> {
        self.stats.record_datagram();
        debug!(%peer, length = datagram.len(), "Received datagram");

        let packet = match self.decoder.decode(datagram, &self.templates) {
            Ok(packet) => packet,
            Err(error) => {
                self.stats.record_decode_error();
                warn!(%peer, %error, "Dropping malformed datagram");
                return Ok(None);
            }
        };

        if !packet.templates.is_empty() {
            let merged = self.templates.merge(packet.templates);
            self.stats.record_templates(merged.added + merged.redefined);
            debug!(
                %peer,
                added = merged.added,
                redefined = merged.redefined,
                known = self.templates.len(),
                "Templates merged"
            );
        }
        self.stats
            .record_skipped(packet.skipped_flowsets, packet.dropped_records);

        if packet.records.is_empty() {
            debug!(%peer, version = packet.version, "Datagram carried no flow records");
            return Ok(None);
        }

        let key = self.keys.next();
        let records = packet.records.len();
        self.writer
            .append(key.clone(), packet.records)
            .await
            .inspect_err(|_| error!(batch = %key, records, "Store writer is gone; batch lost"))?;
        self.stats.record_batch(records);
        debug!(%peer, batch = %key, records, version = packet.version, "Batch queued");
        Ok(Some(key))
    }
}

pub async fn run(config: CollectorConfig) -> Result<()> {
    let socket = UdpSocket::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;

    let store = BatchStore::open(&config.store)
        .with_context(|| format!("Failed to open store {:?}", config.store))?;
    let keys = KeySource::after(store.last_key());
    let (writer, handle) = StoreWriter::spawn(store, config.queue_depth)?;

    let collector = Collector::new(socket, NetflowDecoder, TemplateCache::new(), handle, keys);
    let stats = collector.stats();
    info!(
        addr = %collector.local_addr()?,
        store = ?config.store,
        "Listening for NetFlow exports"
    );

    let outcome = collector.run(shutdown::signal()).await;

    let summary = tokio::task::spawn_blocking(move || writer.join())
        .await
        .context("Store writer join task failed")??;

    info!(stats = %stats.snapshot(), "Collector stopped");
    if summary.unsaved {
        error!(
            path = ?config.store,
            records = summary.records_appended,
            "Some batches could not be written before exit"
        );
    }
    outcome
}
