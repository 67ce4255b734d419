use super::fields::{self, read_ipv4, read_ipv6, read_uint};
use crate::flow::{FlowRecord, FlowRecordError, IpVersion};
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::trace;

/// Collects decoded field values for one data record.
#[derive(Debug, Default)]
pub(crate) struct RecordBuilder {
    ip_version: Option<u64>,
    ipv4_src: Option<Ipv4Addr>,
    ipv4_dst: Option<Ipv4Addr>,
    ipv6_src: Option<Ipv6Addr>,
    ipv6_dst: Option<Ipv6Addr>,
    src_port: Option<u16>,
    dst_port: Option<u16>,
    in_bytes: Option<u64>,
    first_switched: Option<u32>,
    last_switched: Option<u32>,
    extra: BTreeMap<String, Value>,
}

impl RecordBuilder {
    pub(crate) fn set(&mut self, field_type: u16, value: &[u8]) {
        match field_type {
            fields::IP_PROTOCOL_VERSION => self.ip_version = read_uint(value),
            fields::IPV4_SRC_ADDR => self.ipv4_src = read_ipv4(value),
            fields::IPV4_DST_ADDR => self.ipv4_dst = read_ipv4(value),
            fields::IPV6_SRC_ADDR => self.ipv6_src = read_ipv6(value),
            fields::IPV6_DST_ADDR => self.ipv6_dst = read_ipv6(value),
            fields::L4_SRC_PORT => self.src_port = read_narrow(value),
            fields::L4_DST_PORT => self.dst_port = read_narrow(value),
            fields::IN_BYTES => self.in_bytes = read_uint(value),
            fields::FIRST_SWITCHED => self.first_switched = read_narrow(value),
            fields::LAST_SWITCHED => self.last_switched = read_narrow(value),
            other => match fields::describe(other) {
                Some((name, kind)) => {
                    if let Some(value) = kind.to_json(value) {
                        self.extra.insert(name.to_string(), value);
                    }
                }
                None => trace!(field_type = other, length = value.len(), "Ignoring unknown field"),
            },
        }
    }

    pub(crate) fn finish(self) -> Result<FlowRecord, FlowRecordError> {
        let version = match self.ip_version {
            Some(number) => IpVersion::try_from(number)?,
            None if self.ipv4_src.is_some() => IpVersion::V4,
            None if self.ipv6_src.is_some() => IpVersion::V6,
            None => return Err(FlowRecordError::MissingField("IPV4_SRC_ADDR")),
        };

        let (src_addr, dst_addr) = match version {
            IpVersion::V4 => (
                self.ipv4_src
                    .map(IpAddr::V4)
                    .ok_or(FlowRecordError::MissingField("IPV4_SRC_ADDR"))?,
                self.ipv4_dst
                    .map(IpAddr::V4)
                    .ok_or(FlowRecordError::MissingField("IPV4_DST_ADDR"))?,
            ),
            IpVersion::V6 => (
                self.ipv6_src
                    .map(IpAddr::V6)
                    .ok_or(FlowRecordError::MissingField("IPV6_SRC_ADDR"))?,
                self.ipv6_dst
                    .map(IpAddr::V6)
                    .ok_or(FlowRecordError::MissingField("IPV6_DST_ADDR"))?,
            ),
        };

        let mut record = FlowRecord::new(
            src_addr,
            dst_addr,
            self.in_bytes.ok_or(FlowRecordError::MissingField("IN_BYTES"))?,
            self.first_switched
                .ok_or(FlowRecordError::MissingField("FIRST_SWITCHED"))?,
            self.last_switched
                .ok_or(FlowRecordError::MissingField("LAST_SWITCHED"))?,
        )?;
        record.src_port = self.src_port;
        record.dst_port = self.dst_port;
        record.extra = self.extra;
        Ok(record)
    }
}

fn read_narrow<T: TryFrom<u64>>(value: &[u8]) -> Option<T> {
    read_uint(value).and_then(|v| T::try_from(v).ok())
}
