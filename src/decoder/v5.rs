use super::fields::*;
use super::record::RecordBuilder;
use super::{DecodeError, DecodedPacket, read_u16};
use tracing::{trace, warn};

const HEADER_LEN: usize = 24;
const RECORD_LEN: usize = 48;

/// Fixed v5 record layout as (field type, offset, length).
const LAYOUT: [(u16, usize, usize); 18] = [
    (IPV4_SRC_ADDR, 0, 4),
    (IPV4_DST_ADDR, 4, 4),
    (IPV4_NEXT_HOP, 8, 4),
    (INPUT_SNMP, 12, 2),
    (OUTPUT_SNMP, 14, 2),
    (IN_PKTS, 16, 4),
    (IN_BYTES, 20, 4),
    (FIRST_SWITCHED, 24, 4),
    (LAST_SWITCHED, 28, 4),
    (L4_SRC_PORT, 32, 2),
    (L4_DST_PORT, 34, 2),
    (TCP_FLAGS, 37, 1),
    (PROTOCOL, 38, 1),
    (SRC_TOS, 39, 1),
    (SRC_AS, 40, 2),
    (DST_AS, 42, 2),
    (SRC_MASK, 44, 1),
    (DST_MASK, 45, 1),
];

pub(super) fn decode(datagram: &[u8]) -> Result<DecodedPacket, DecodeError> {
    if datagram.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: HEADER_LEN,
            available: datagram.len(),
        });
    }

    let count = read_u16(datagram, 2)? as usize;
    let needed = HEADER_LEN + count * RECORD_LEN;
    if datagram.len() < needed {
        return Err(DecodeError::Truncated {
            needed,
            available: datagram.len(),
        });
    }

    let mut packet = DecodedPacket {
        version: 5,
        ..Default::default()
    };

    for raw in datagram[HEADER_LEN..needed].chunks_exact(RECORD_LEN) {
        let mut builder = RecordBuilder::default();
        builder.set(IP_PROTOCOL_VERSION, &[4]);
        for (field_type, offset, len) in LAYOUT {
            builder.set(field_type, &raw[offset..offset + len]);
        }

        match builder.finish() {
            Ok(record) => packet.records.push(record),
            Err(error) => {
                warn!(%error, "Dropping undecodable v5 record");
                packet.dropped_records += 1;
            }
        }
    }

    trace!(count, records = packet.records.len(), "Decoded NetFlow v5 datagram");
    Ok(packet)
}
