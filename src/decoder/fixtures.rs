//! Hand-built NetFlow datagrams for tests.

use super::fields::*;

pub(crate) const IPV4_TEMPLATE_ID: u16 = 256;

pub(crate) const IPV4_FIELDS: [(u16, u16); 8] = [
    (IPV4_SRC_ADDR, 4),
    (IPV4_DST_ADDR, 4),
    (L4_SRC_PORT, 2),
    (L4_DST_PORT, 2),
    (IN_BYTES, 4),
    (FIRST_SWITCHED, 4),
    (LAST_SWITCHED, 4),
    (IP_PROTOCOL_VERSION, 1),
];

pub(crate) const IPV6_TEMPLATE_ID: u16 = 257;

pub(crate) const IPV6_FIELDS: [(u16, u16); 9] = [
    (IPV6_SRC_ADDR, 16),
    (IPV6_DST_ADDR, 16),
    (L4_SRC_PORT, 2),
    (L4_DST_PORT, 2),
    (IN_BYTES, 8),
    (IN_PKTS, 4),
    (FIRST_SWITCHED, 4),
    (LAST_SWITCHED, 4),
    (IP_PROTOCOL_VERSION, 1),
];

pub(crate) fn v9_datagram(flowsets: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&9u16.to_be_bytes()); // version
    buf.extend_from_slice(&(flowsets.len() as u16).to_be_bytes()); // count
    buf.extend_from_slice(&123_456u32.to_be_bytes()); // sys uptime
    buf.extend_from_slice(&1_700_000_000u32.to_be_bytes()); // unix secs
    buf.extend_from_slice(&1u32.to_be_bytes()); // sequence
    buf.extend_from_slice(&0u32.to_be_bytes()); // source id
    for flowset in flowsets {
        buf.extend_from_slice(flowset);
    }
    buf
}

pub(crate) fn template_flowset(template_id: u16, fields: &[(u16, u16)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&template_id.to_be_bytes());
    body.extend_from_slice(&(fields.len() as u16).to_be_bytes());
    for (field_type, length) in fields {
        body.extend_from_slice(&field_type.to_be_bytes());
        body.extend_from_slice(&length.to_be_bytes());
    }
    flowset(0, body)
}

pub(crate) fn data_flowset(template_id: u16, records: &[Vec<u8>]) -> Vec<u8> {
    flowset(template_id, records.concat())
}

fn flowset(flowset_id: u16, mut body: Vec<u8>) -> Vec<u8> {
    while (body.len() + 4) % 4 != 0 {
        body.push(0);
    }
    let mut buf = Vec::with_capacity(body.len() + 4);
    buf.extend_from_slice(&flowset_id.to_be_bytes());
    buf.extend_from_slice(&((body.len() + 4) as u16).to_be_bytes());
    buf.extend_from_slice(&body);
    buf
}

/// A record laid out per [`IPV4_FIELDS`].
pub(crate) fn ipv4_record(
    src: [u8; 4],
    dst: [u8; 4],
    ports: (u16, u16),
    in_bytes: u32,
    switched: (u32, u32),
) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&src);
    buf.extend_from_slice(&dst);
    buf.extend_from_slice(&ports.0.to_be_bytes());
    buf.extend_from_slice(&ports.1.to_be_bytes());
    buf.extend_from_slice(&in_bytes.to_be_bytes());
    buf.extend_from_slice(&switched.0.to_be_bytes());
    buf.extend_from_slice(&switched.1.to_be_bytes());
    buf.push(4);
    buf
}

/// A record laid out per [`IPV6_FIELDS`].
pub(crate) fn ipv6_record(src: [u8; 16], dst: [u8; 16], in_bytes: u64, packets: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&src);
    buf.extend_from_slice(&dst);
    buf.extend_from_slice(&40000u16.to_be_bytes());
    buf.extend_from_slice(&443u16.to_be_bytes());
    buf.extend_from_slice(&in_bytes.to_be_bytes());
    buf.extend_from_slice(&packets.to_be_bytes());
    buf.extend_from_slice(&100u32.to_be_bytes());
    buf.extend_from_slice(&350u32.to_be_bytes());
    buf.push(6);
    buf
}

/// The request/response pair of a short HTTPS exchange.
pub(crate) fn https_exchange() -> Vec<Vec<u8>> {
    vec![
        ipv4_record([10, 0, 0, 2], [10, 0, 0, 1], (51000, 443), 500, (1000, 2000)),
        ipv4_record([10, 0, 0, 1], [10, 0, 0, 2], (443, 51000), 1500, (1000, 2000)),
    ]
}

pub(crate) fn v5_datagram(records: &[V5Record]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&5u16.to_be_bytes());
    buf.extend_from_slice(&(records.len() as u16).to_be_bytes());
    buf.extend_from_slice(&123_456u32.to_be_bytes()); // sys uptime
    buf.extend_from_slice(&1_700_000_000u32.to_be_bytes()); // unix secs
    buf.extend_from_slice(&0u32.to_be_bytes()); // unix nsecs
    buf.extend_from_slice(&7u32.to_be_bytes()); // flow sequence
    buf.extend_from_slice(&[0, 0]); // engine type, engine id
    buf.extend_from_slice(&0u16.to_be_bytes()); // sampling interval
    for record in records {
        buf.extend_from_slice(&record.encode());
    }
    buf
}

pub(crate) struct V5Record {
    pub src: [u8; 4],
    pub dst: [u8; 4],
    pub ports: (u16, u16),
    pub packets: u32,
    pub octets: u32,
    pub switched: (u32, u32),
    pub protocol: u8,
}

impl V5Record {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(48);
        buf.extend_from_slice(&self.src);
        buf.extend_from_slice(&self.dst);
        buf.extend_from_slice(&[0, 0, 0, 0]); // next hop
        buf.extend_from_slice(&1u16.to_be_bytes()); // input
        buf.extend_from_slice(&2u16.to_be_bytes()); // output
        buf.extend_from_slice(&self.packets.to_be_bytes());
        buf.extend_from_slice(&self.octets.to_be_bytes());
        buf.extend_from_slice(&self.switched.0.to_be_bytes());
        buf.extend_from_slice(&self.switched.1.to_be_bytes());
        buf.extend_from_slice(&self.ports.0.to_be_bytes());
        buf.extend_from_slice(&self.ports.1.to_be_bytes());
        buf.push(0); // pad
        buf.push(0x1b); // tcp flags
        buf.push(self.protocol);
        buf.push(0); // tos
        buf.extend_from_slice(&0u16.to_be_bytes()); // src as
        buf.extend_from_slice(&0u16.to_be_bytes()); // dst as
        buf.push(24); // src mask
        buf.push(24); // dst mask
        buf.extend_from_slice(&0u16.to_be_bytes()); // pad
        buf
    }
}
