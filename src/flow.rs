use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use thiserror::Error;


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => IpVersion::V4,
            IpAddr::V6(_) => IpVersion::V6,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }
}

impl TryFrom<u64> for IpVersion {
    type Error = FlowRecordError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            4 => Ok(IpVersion::V4),
            6 => Ok(IpVersion::V6),
            other => Err(FlowRecordError::UnsupportedVersion(other)),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowRecordError {
    #[error("unsupported IP protocol version {0}")]
    UnsupportedVersion(u64),
    #[error("missing field {0}")]
    MissingField(&'static str),
    #[error("{field} is not a valid address: {value}")]
    InvalidAddress { field: &'static str, value: String },
    #[error("source {src} and destination {dst} belong to different address families")]
    MixedFamilies { src: IpAddr, dst: IpAddr },
}

/// One side of a flow: an address and, when the exporter tracks it, a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub ip: IpAddr,
    pub port: Option<u16>,
}

impl Endpoint {
    pub fn new(ip: IpAddr, port: Option<u16>) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}", SocketAddr::new(self.ip, port)),
            None => write!(f, "{}", self.ip),
        }
    }
}

/// A unidirectional flow summary as reported by an exporter.
///
/// `first_switched` and `last_switched` are readings of the exporter's
/// 32-bit uptime clock in milliseconds, not wall-clock time. Fields the
/// collector does not interpret are carried in `extra` under their NetFlow
/// names so a store survives a load/persist cycle unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredFlow", into = "StoredFlow")]
pub struct FlowRecord {
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,
    pub in_bytes: u64,
    pub first_switched: u32,
    pub last_switched: u32,
    pub extra: BTreeMap<String, Value>,
}

impl FlowRecord {
    pub fn new(
        src_addr: IpAddr,
        dst_addr: IpAddr,
        in_bytes: u64,
        first_switched: u32,
        last_switched: u32,
    ) -> Result<Self, FlowRecordError> {
        if IpVersion::of(&src_addr) != IpVersion::of(&dst_addr) {
            return Err(FlowRecordError::MixedFamilies {
                src: src_addr,
                dst: dst_addr,
            });
        }

        Ok(Self {
            src_addr,
            dst_addr,
            src_port: None,
            dst_port: None,
            in_bytes,
            first_switched,
            last_switched,
            extra: BTreeMap::new(),
        })
    }

    pub fn with_ports(mut self, src_port: u16, dst_port: u16) -> Self {
        self.src_port = Some(src_port);
        self.dst_port = Some(dst_port);
        self
    }

    pub fn ip_version(&self) -> IpVersion {
        IpVersion::of(&self.src_addr)
    }

    pub fn source(&self) -> Endpoint {
        Endpoint::new(self.src_addr, self.src_port)
    }

    pub fn destination(&self) -> Endpoint {
        Endpoint::new(self.dst_addr, self.dst_port)
    }

    /// Parses one stored record. IPv6 addresses written as integers can
    /// exceed 64 bits, so they are read from the raw number text before the
    /// record itself is decoded.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut fields: BTreeMap<String, Box<RawValue>> = serde_json::from_str(text)?;
        for name in ["IPV6_SRC_ADDR", "IPV6_DST_ADDR"] {
            let Some(number) = fields
                .get(name)
                .and_then(|raw| raw.get().parse::<u128>().ok())
            else {
                continue;
            };
            let address = serde_json::to_string(&Ipv6Addr::from(number).to_string())?;
            fields.insert(name.to_string(), RawValue::from_string(address)?);
        }
        serde_json::from_str(&serde_json::to_string(&fields)?)
    }

    /// Milliseconds between first and last switched, tolerating one wrap
    /// of the exporter's 32-bit clock. Multiple wraps are not detectable.
    pub fn duration_ms(&self) -> u64 {
        switched_delta(self.first_switched, self.last_switched)
    }
}

pub fn switched_delta(first_switched: u32, last_switched: u32) -> u64 {
    u64::from(last_switched.wrapping_sub(first_switched))
}

impl fmt::Display for FlowRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} ({} bytes)",
            self.source(),
            self.destination(),
            self.in_bytes
        )
    }
}

/// Addresses in older dumps were written as integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredAddr {
    Text(String),
    Numeric(u64),
}

impl StoredAddr {
    fn resolve(self, field: &'static str, version: IpVersion) -> Result<IpAddr, FlowRecordError> {
        let invalid = |value: String| FlowRecordError::InvalidAddress { field, value };
        let addr = match self {
            StoredAddr::Text(text) => text.trim().parse::<IpAddr>().map_err(|_| invalid(text))?,
            StoredAddr::Numeric(n) => match version {
                IpVersion::V4 => u32::try_from(n)
                    .map(|n| IpAddr::V4(Ipv4Addr::from(n)))
                    .map_err(|_| invalid(n.to_string()))?,
                IpVersion::V6 => IpAddr::V6(Ipv6Addr::from(u128::from(n))),
            },
        };
        if IpVersion::of(&addr) != version {
            return Err(invalid(addr.to_string()));
        }
        Ok(addr)
    }

    fn into_value(self) -> Value {
        match self {
            StoredAddr::Text(text) => Value::String(text),
            StoredAddr::Numeric(n) => Value::from(n),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredFlow {
    #[serde(rename = "IP_PROTOCOL_VERSION", default, skip_serializing_if = "Option::is_none")]
    ip_version: Option<u64>,
    #[serde(rename = "IPV4_SRC_ADDR", default, skip_serializing_if = "Option::is_none")]
    ipv4_src: Option<StoredAddr>,
    #[serde(rename = "IPV4_DST_ADDR", default, skip_serializing_if = "Option::is_none")]
    ipv4_dst: Option<StoredAddr>,
    #[serde(rename = "IPV6_SRC_ADDR", default, skip_serializing_if = "Option::is_none")]
    ipv6_src: Option<StoredAddr>,
    #[serde(rename = "IPV6_DST_ADDR", default, skip_serializing_if = "Option::is_none")]
    ipv6_dst: Option<StoredAddr>,
    #[serde(rename = "L4_SRC_PORT", default, skip_serializing_if = "Option::is_none")]
    src_port: Option<u16>,
    #[serde(rename = "L4_DST_PORT", default, skip_serializing_if = "Option::is_none")]
    dst_port: Option<u16>,
    #[serde(rename = "IN_BYTES")]
    in_bytes: u64,
    #[serde(rename = "FIRST_SWITCHED")]
    first_switched: u32,
    #[serde(rename = "LAST_SWITCHED")]
    last_switched: u32,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

impl TryFrom<StoredFlow> for FlowRecord {
    type Error = FlowRecordError;

    fn try_from(stored: StoredFlow) -> Result<Self, Self::Error> {
        let version = match stored.ip_version {
            Some(number) => IpVersion::try_from(number)?,
            None if stored.ipv4_src.is_some() => IpVersion::V4,
            None if stored.ipv6_src.is_some() => IpVersion::V6,
            None => return Err(FlowRecordError::MissingField("IP_PROTOCOL_VERSION")),
        };

        let mut extra = stored.extra;
        let (src, dst, unused) = match version {
            IpVersion::V4 => (
                ("IPV4_SRC_ADDR", stored.ipv4_src),
                ("IPV4_DST_ADDR", stored.ipv4_dst),
                [("IPV6_SRC_ADDR", stored.ipv6_src), ("IPV6_DST_ADDR", stored.ipv6_dst)],
            ),
            IpVersion::V6 => (
                ("IPV6_SRC_ADDR", stored.ipv6_src),
                ("IPV6_DST_ADDR", stored.ipv6_dst),
                [("IPV4_SRC_ADDR", stored.ipv4_src), ("IPV4_DST_ADDR", stored.ipv4_dst)],
            ),
        };
        for (name, value) in unused {
            if let Some(value) = value {
                extra.insert(name.to_string(), value.into_value());
            }
        }

        let src_addr = src
            .1
            .ok_or(FlowRecordError::MissingField(src.0))?
            .resolve(src.0, version)?;
        let dst_addr = dst
            .1
            .ok_or(FlowRecordError::MissingField(dst.0))?
            .resolve(dst.0, version)?;

        Ok(FlowRecord {
            src_addr,
            dst_addr,
            src_port: stored.src_port,
            dst_port: stored.dst_port,
            in_bytes: stored.in_bytes,
            first_switched: stored.first_switched,
            last_switched: stored.last_switched,
            extra,
        })
    }
}

impl From<FlowRecord> for StoredFlow {
    fn from(record: FlowRecord) -> Self {
        let version = record.ip_version();
        let src = Some(StoredAddr::Text(record.src_addr.to_string()));
        let dst = Some(StoredAddr::Text(record.dst_addr.to_string()));
        let mut extra = record.extra;

        let (ipv4_src, ipv4_dst, ipv6_src, ipv6_dst) = match version {
            IpVersion::V4 => (
                src,
                dst,
                take_address(&mut extra, "IPV6_SRC_ADDR"),
                take_address(&mut extra, "IPV6_DST_ADDR"),
            ),
            IpVersion::V6 => (
                take_address(&mut extra, "IPV4_SRC_ADDR"),
                take_address(&mut extra, "IPV4_DST_ADDR"),
                src,
                dst,
            ),
        };

        StoredFlow {
            ip_version: Some(u64::from(version.number())),
            ipv4_src,
            ipv4_dst,
            ipv6_src,
            ipv6_dst,
            src_port: record.src_port,
            dst_port: record.dst_port,
            in_bytes: record.in_bytes,
            first_switched: record.first_switched,
            last_switched: record.last_switched,
            extra,
        }
    }
}

fn take_address(extra: &mut BTreeMap<String, Value>, name: &str) -> Option<StoredAddr> {
    match extra.remove(name)? {
        Value::String(text) => Some(StoredAddr::Text(text)),
        Value::Number(n) if n.is_u64() => n.as_u64().map(StoredAddr::Numeric),
        other => {
            extra.insert(name.to_string(), other);
            None
        }
    }
}
