use super::record::RecordBuilder;
use super::{DecodeError, DecodedPacket, read_u16};
use crate::template::{Template, TemplateCache, TemplateField, TemplateId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

const HEADER_LEN: usize = 20;
const FLOWSET_HEADER_LEN: usize = 4;
const TEMPLATE_FLOWSET_ID: u16 = 0;
const OPTIONS_TEMPLATE_FLOWSET_ID: u16 = 1;
const MIN_DATA_FLOWSET_ID: u16 = 256;

pub(super) fn decode(
    datagram: &[u8],
    cache: &TemplateCache,
) -> Result<DecodedPacket, DecodeError> {
    if datagram.len() < HEADER_LEN {
        return Err(DecodeError::Truncated {
            needed: HEADER_LEN,
            available: datagram.len(),
        });
    }
    let count = read_u16(datagram, 2)?;

    let mut packet = DecodedPacket {
        version: 9,
        ..Default::default()
    };
    // Templates defined earlier in this datagram apply to later flowsets.
    let mut defined: HashMap<TemplateId, Arc<Template>> = HashMap::new();
    let mut offset = HEADER_LEN;

    while offset + FLOWSET_HEADER_LEN <= datagram.len() {
        let flowset_id = read_u16(datagram, offset)?;
        let length = read_u16(datagram, offset + 2)? as usize;
        if length < FLOWSET_HEADER_LEN {
            return Err(DecodeError::MalformedFlowset {
                flowset_id,
                offset,
                reason: "length shorter than flowset header",
            });
        }
        let end = offset + length;
        if end > datagram.len() {
            return Err(DecodeError::MalformedFlowset {
                flowset_id,
                offset,
                reason: "length runs past end of datagram",
            });
        }
        let body = &datagram[offset + FLOWSET_HEADER_LEN..end];

        match flowset_id {
            TEMPLATE_FLOWSET_ID => {
                for template in parse_templates(body)? {
                    debug!(
                        template_id = template.id,
                        fields = template.fields.len(),
                        "Template defined"
                    );
                    defined.insert(template.id, Arc::new(template.clone()));
                    packet.templates.push(template);
                }
            }
            OPTIONS_TEMPLATE_FLOWSET_ID => {
                debug!("Skipping options template flowset");
            }
            id if id >= MIN_DATA_FLOWSET_ID => {
                let template = defined.get(&id).cloned().or_else(|| cache.get(id));
                match template {
                    Some(template) => decode_data(body, &template, &mut packet),
                    None => {
                        warn!(
                            template_id = id,
                            "Data flowset references unknown template; dropping"
                        );
                        packet.skipped_flowsets += 1;
                    }
                }
            }
            reserved => {
                debug!(flowset_id = reserved, "Skipping reserved flowset id");
            }
        }

        offset = end;
    }

    trace!(
        count,
        templates = packet.templates.len(),
        records = packet.records.len(),
        "Decoded NetFlow v9 datagram"
    );
    Ok(packet)
}

fn parse_templates(body: &[u8]) -> Result<Vec<Template>, DecodeError> {
    let mut templates = Vec::new();
    let mut pos = 0;

    while pos + 4 <= body.len() {
        let template_id = read_u16(body, pos)?;
        let field_count = read_u16(body, pos + 2)? as usize;
        pos += 4;

        if template_id == 0 && field_count == 0 {
            // padding
            break;
        }
        if template_id < MIN_DATA_FLOWSET_ID {
            return Err(DecodeError::MalformedTemplate {
                template_id,
                reason: "template id below 256",
            });
        }
        if field_count == 0 {
            return Err(DecodeError::MalformedTemplate {
                template_id,
                reason: "template has no fields",
            });
        }
        if pos + field_count * 4 > body.len() {
            return Err(DecodeError::MalformedTemplate {
                template_id,
                reason: "field list runs past end of flowset",
            });
        }

        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            let field_type = read_u16(body, pos)?;
            let length = read_u16(body, pos + 2)?;
            if length == 0 {
                return Err(DecodeError::MalformedTemplate {
                    template_id,
                    reason: "zero-length field",
                });
            }
            fields.push(TemplateField::new(field_type, length));
            pos += 4;
        }
        templates.push(Template::new(template_id, fields));
    }

    Ok(templates)
}

fn decode_data(body: &[u8], template: &Template, packet: &mut DecodedPacket) {
    let record_len = template.record_length();
    if record_len == 0 {
        warn!(template_id = template.id, "Template has no width; dropping flowset");
        packet.skipped_flowsets += 1;
        return;
    }

    // Anything shorter than a full record at the end is padding.
    for chunk in body.chunks_exact(record_len) {
        let mut builder = RecordBuilder::default();
        let mut pos = 0;
        for field in &template.fields {
            let len = field.length as usize;
            builder.set(field.field_type, &chunk[pos..pos + len]);
            pos += len;
        }

        match builder.finish() {
            Ok(record) => packet.records.push(record),
            Err(error) => {
                warn!(template_id = template.id, %error, "Dropping undecodable flow record");
                packet.dropped_records += 1;
            }
        }
    }
}
