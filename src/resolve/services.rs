use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Port to service name table in `/etc/services` format.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceTable {
    by_port: HashMap<u16, String>,
}

impl ServiceTable {
    /// Parses lines of `name port/protocol [aliases...] [# comment]`.
    /// The first name listed for a port wins, whatever its protocol.
    pub fn parse(text: &str) -> Self {
        let mut by_port = HashMap::new();
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default();
            let mut columns = line.split_whitespace();
            let (Some(name), Some(port_proto)) = (columns.next(), columns.next()) else {
                continue;
            };
            let port = port_proto.split('/').next().unwrap_or_default();
            if let Ok(port) = port.parse::<u16>() {
                by_port.entry(port).or_insert_with(|| name.to_string());
            }
        }
        Self { by_port }
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let table = Self::parse(&text);
        debug!(path = ?path, services = table.len(), "Loaded service table");
        Ok(table)
    }

    /// A table that cannot be read is treated as empty; every port is then
    /// reported as unknown.
    pub fn load_or_empty(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|error| {
            warn!(path = ?path, %error, "Service table unavailable");
            Self::default()
        })
    }

    pub fn lookup(&self, port: u16) -> Option<&str> {
        self.by_port.get(&port).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_port.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_port.is_empty()
    }
}

impl FromIterator<(u16, String)> for ServiceTable {
    fn from_iter<I: IntoIterator<Item = (u16, String)>>(iter: I) -> Self {
        let mut by_port = HashMap::new();
        for (port, name) in iter {
            by_port.entry(port).or_insert(name);
        }
        Self { by_port }
    }
}
