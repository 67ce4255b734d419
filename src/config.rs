//! Command-line surfaces of the two binaries and the plain settings they
//! resolve to.

use crate::connection::PairingMode;
use clap::Parser;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::level_filters::LevelFilter;


pub const DEFAULT_PORT: u16 = 2055;
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;
pub const DEFAULT_SERVICES: &str = "/etc/services";

/// Collect NetFlow v5/v9 exports and store every datagram's records.
#[derive(Parser, Debug, Clone)]
#[command(name = "flowpair", author, version, about, long_about = None)]
pub struct CollectorArgs {
    /// Address to listen on; empty means all interfaces
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// UDP port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Store file (defaults to <unix seconds>.json)
    #[arg(short = 'o', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Batches that may wait for the store writer
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH)]
    pub queue_depth: usize,
}

impl CollectorArgs {
    pub fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        }
    }

    pub fn into_config(self) -> CollectorConfig {
        let host = match self.host.trim() {
            "" => "0.0.0.0".to_string(),
            host => host.to_string(),
        };
        let store = self.file.unwrap_or_else(default_store_path);
        CollectorConfig {
            host,
            port: self.port,
            store,
            queue_depth: self.queue_depth.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    pub host: String,
    pub port: u16,
    pub store: PathBuf,
    pub queue_depth: usize,
}

/// Pair the flows of a store file into connections and print them.
#[derive(Parser, Debug, Clone)]
#[command(name = "flowpair-analyze", author, version, about, long_about = None)]
pub struct AnalyzerArgs {
    /// Store file written by the collector
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Enable debug logging
    #[arg(short = 'D', long)]
    pub debug: bool,

    /// Only pair records whose addresses and ports mirror each other
    #[arg(long)]
    pub verify_pairs: bool,

    /// Show addresses instead of reverse-resolved host names
    #[arg(long)]
    pub no_resolve: bool,

    /// Services database used to name ports
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SERVICES)]
    pub services: PathBuf,

    /// Only print connections whose fields contain this text
    #[arg(long, value_name = "TEXT")]
    pub filter: Option<String>,
}

impl AnalyzerArgs {
    pub fn log_level(&self) -> LevelFilter {
        if self.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::WARN
        }
    }

    pub fn into_config(self) -> AnalyzerConfig {
        AnalyzerConfig {
            store: self.file,
            pairing: if self.verify_pairs {
                PairingMode::Verified
            } else {
                PairingMode::Adjacent
            },
            resolve_hostnames: !self.no_resolve,
            services: self.services,
            filter: self.filter.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    pub store: PathBuf,
    pub pairing: PairingMode,
    pub resolve_hostnames: bool,
    pub services: PathBuf,
    pub filter: String,
}

impl AnalyzerConfig {
    pub fn new(store: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
            pairing: PairingMode::default(),
            resolve_hostnames: true,
            services: PathBuf::from(DEFAULT_SERVICES),
            filter: String::new(),
        }
    }
}

fn default_store_path() -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    PathBuf::from(format!("{secs}.json"))
}
