//! NetFlow v9 field type numbers and the names records are stored under.
//! Mostly derived from https://netflow.caligare.com/netflow_v9.htm

use serde_json::Value;
use std::net::{Ipv4Addr, Ipv6Addr};

pub const IN_BYTES: u16 = 1;
pub const IN_PKTS: u16 = 2;
pub const FLOWS: u16 = 3;
pub const PROTOCOL: u16 = 4;
pub const SRC_TOS: u16 = 5;
pub const TCP_FLAGS: u16 = 6;
pub const L4_SRC_PORT: u16 = 7;
pub const IPV4_SRC_ADDR: u16 = 8;
pub const SRC_MASK: u16 = 9;
pub const INPUT_SNMP: u16 = 10;
pub const L4_DST_PORT: u16 = 11;
pub const IPV4_DST_ADDR: u16 = 12;
pub const DST_MASK: u16 = 13;
pub const OUTPUT_SNMP: u16 = 14;
pub const IPV4_NEXT_HOP: u16 = 15;
pub const SRC_AS: u16 = 16;
pub const DST_AS: u16 = 17;
pub const BGP_IPV4_NEXT_HOP: u16 = 18;
pub const LAST_SWITCHED: u16 = 21;
pub const FIRST_SWITCHED: u16 = 22;
pub const OUT_BYTES: u16 = 23;
pub const OUT_PKTS: u16 = 24;
pub const IPV6_SRC_ADDR: u16 = 27;
pub const IPV6_DST_ADDR: u16 = 28;
pub const IPV6_SRC_MASK: u16 = 29;
pub const IPV6_DST_MASK: u16 = 30;
pub const IPV6_FLOW_LABEL: u16 = 31;
pub const ICMP_TYPE: u16 = 32;
pub const DST_TOS: u16 = 55;
pub const IN_SRC_MAC: u16 = 56;
pub const OUT_DST_MAC: u16 = 57;
pub const SRC_VLAN: u16 = 58;
pub const DST_VLAN: u16 = 59;
pub const IP_PROTOCOL_VERSION: u16 = 60;
pub const DIRECTION: u16 = 61;
pub const IPV6_NEXT_HOP: u16 = 62;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Unsigned,
    Ipv4,
    Ipv6,
    Mac,
}

const DESCRIPTIONS: &[(u16, &str, FieldKind)] = &[
    (IN_PKTS, "IN_PKTS", FieldKind::Unsigned),
    (FLOWS, "FLOWS", FieldKind::Unsigned),
    (PROTOCOL, "PROTOCOL", FieldKind::Unsigned),
    (SRC_TOS, "SRC_TOS", FieldKind::Unsigned),
    (TCP_FLAGS, "TCP_FLAGS", FieldKind::Unsigned),
    (SRC_MASK, "SRC_MASK", FieldKind::Unsigned),
    (INPUT_SNMP, "INPUT_SNMP", FieldKind::Unsigned),
    (DST_MASK, "DST_MASK", FieldKind::Unsigned),
    (OUTPUT_SNMP, "OUTPUT_SNMP", FieldKind::Unsigned),
    (IPV4_NEXT_HOP, "IPV4_NEXT_HOP", FieldKind::Ipv4),
    (SRC_AS, "SRC_AS", FieldKind::Unsigned),
    (DST_AS, "DST_AS", FieldKind::Unsigned),
    (BGP_IPV4_NEXT_HOP, "BGP_IPV4_NEXT_HOP", FieldKind::Ipv4),
    (OUT_BYTES, "OUT_BYTES", FieldKind::Unsigned),
    (OUT_PKTS, "OUT_PKTS", FieldKind::Unsigned),
    (IPV6_SRC_MASK, "IPV6_SRC_MASK", FieldKind::Unsigned),
    (IPV6_DST_MASK, "IPV6_DST_MASK", FieldKind::Unsigned),
    (IPV6_FLOW_LABEL, "IPV6_FLOW_LABEL", FieldKind::Unsigned),
    (ICMP_TYPE, "ICMP_TYPE", FieldKind::Unsigned),
    (DST_TOS, "DST_TOS", FieldKind::Unsigned),
    (IN_SRC_MAC, "IN_SRC_MAC", FieldKind::Mac),
    (OUT_DST_MAC, "OUT_DST_MAC", FieldKind::Mac),
    (SRC_VLAN, "SRC_VLAN", FieldKind::Unsigned),
    (DST_VLAN, "DST_VLAN", FieldKind::Unsigned),
    (DIRECTION, "DIRECTION", FieldKind::Unsigned),
    (IPV6_NEXT_HOP, "IPV6_NEXT_HOP", FieldKind::Ipv6),
];

/// Name and value kind for fields kept as extra record data.
pub fn describe(field_type: u16) -> Option<(&'static str, FieldKind)> {
    DESCRIPTIONS
        .iter()
        .find(|(id, _, _)| *id == field_type)
        .map(|(_, name, kind)| (*name, *kind))
}

impl FieldKind {
    pub fn to_json(self, bytes: &[u8]) -> Option<Value> {
        match self {
            FieldKind::Unsigned => read_uint(bytes).map(Value::from),
            FieldKind::Ipv4 => read_ipv4(bytes).map(|ip| Value::String(ip.to_string())),
            FieldKind::Ipv6 => read_ipv6(bytes).map(|ip| Value::String(ip.to_string())),
            FieldKind::Mac => (bytes.len() == 6).then(|| {
                let octets: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
                Value::String(octets.join(":"))
            }),
        }
    }
}

/// Big-endian unsigned integer of 1 to 8 bytes.
pub fn read_uint(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() || bytes.len() > 8 {
        return None;
    }
    Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

pub fn read_ipv4(bytes: &[u8]) -> Option<Ipv4Addr> {
    let octets: [u8; 4] = bytes.try_into().ok()?;
    Some(Ipv4Addr::from(octets))
}

pub fn read_ipv6(bytes: &[u8]) -> Option<Ipv6Addr> {
    let octets: [u8; 16] = bytes.try_into().ok()?;
    Some(Ipv6Addr::from(octets))
}
