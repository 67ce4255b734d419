//! Bidirectional connections rebuilt from pairs of unidirectional flow
//! records.
//!
//! Pairing is a heuristic: exporters usually emit the forward and reverse
//! records of a flow next to each other, so adjacent records are paired.
//! Nothing guarantees two adjacent records belong together unless
//! [`PairingMode::Verified`] is used.

use crate::flow::FlowRecord;
use crate::resolve::Resolver;
use std::fmt;
use std::net::IpAddr;

mod filter;
mod format;


pub use filter::ConnectionFilter;
pub use format::{ConnectionSummary, human_duration, human_size};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PairingMode {
    /// Every two adjacent records form a connection.
    #[default]
    Adjacent,
    /// Adjacent records pair only when their endpoints mirror each other.
    Verified,
}

/// `src` is the peer that sent more data, which is not necessarily the
/// peer that opened the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub src: IpAddr,
    pub dest: IpAddr,
    pub src_port: Option<u16>,
    pub dest_port: Option<u16>,
    pub size: u64,
    /// Milliseconds.
    pub duration: u64,
}

impl Connection {
    /// Ties go to `a`. Addresses, ports, size and duration all come from the
    /// record that carried more bytes.
    pub fn from_pair(a: &FlowRecord, b: &FlowRecord) -> Self {
        let src = if a.in_bytes >= b.in_bytes { a } else { b };
        Self {
            src: src.src_addr,
            dest: src.dst_addr,
            src_port: src.src_port,
            dest_port: src.dst_port,
            size: src.in_bytes,
            duration: src.duration_ms(),
        }
    }

    pub fn human_size(&self) -> String {
        human_size(self.size)
    }

    pub fn human_duration(&self) -> String {
        human_duration(self.duration)
    }

    /// `(src, dest)` host names; unresolvable addresses come back verbatim.
    pub fn hostnames(&self, resolver: &impl Resolver) -> (String, String) {
        (resolver.hostname(self.src), resolver.hostname(self.dest))
    }

    /// Service of the sending port, else of the receiving port.
    pub fn service(&self, resolver: &impl Resolver) -> String {
        self.src_port
            .and_then(|port| resolver.service(port))
            .or_else(|| self.dest_port.and_then(|port| resolver.service(port)))
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn summarize(&self, resolver: &impl Resolver) -> ConnectionSummary {
        let (src_host, dest_host) = self.hostnames(resolver);
        ConnectionSummary {
            service: self.service(resolver),
            size: self.human_size(),
            duration: self.human_duration(),
            src_host,
            src: self.src,
            src_port: self.src_port,
            dest_host,
            dest: self.dest,
            dest_port: self.dest_port,
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Connection from {} to {}, size {}",
            self.src,
            self.dest,
            self.human_size()
        )
    }
}

/// True when `b` looks like the reverse direction of `a`. Ports are only
/// compared when both records carry them.
pub fn is_reverse_pair(a: &FlowRecord, b: &FlowRecord) -> bool {
    if a.src_addr != b.dst_addr || a.dst_addr != b.src_addr {
        return false;
    }
    match (a.src_port, a.dst_port, b.src_port, b.dst_port) {
        (Some(a_src), Some(a_dst), Some(b_src), Some(b_dst)) => a_src == b_dst && a_dst == b_src,
        _ => true,
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub connections: Vec<Connection>,
    /// Trailing record left without a partner (0 or 1).
    pub unpaired: usize,
    /// Records discarded because their partner did not mirror them.
    pub rejected: usize,
}

/// Sweeps a batch left to right holding at most one pending record.
pub fn reconstruct(records: &[FlowRecord], mode: PairingMode) -> Pairing {
    let mut pairing = Pairing::default();
    let mut pending: Option<&FlowRecord> = None;

    for record in records {
        let Some(first) = pending.take() else {
            pending = Some(record);
            continue;
        };
        if mode == PairingMode::Verified && !is_reverse_pair(first, record) {
            pairing.rejected += 1;
            pending = Some(record);
            continue;
        }
        pairing.connections.push(Connection::from_pair(first, record));
    }

    if pending.is_some() {
        pairing.unpaired = 1;
    }
    pairing
}
