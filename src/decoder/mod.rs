//! Turns raw export datagrams into flow records.
//!
//! The collector only depends on the [`Decoder`] trait; [`NetflowDecoder`]
//! understands NetFlow v5 and v9.

use crate::flow::FlowRecord;
use crate::template::{Template, TemplateCache};
use thiserror::Error;

pub mod fields;
mod record;
mod v5;
mod v9;

#[cfg(test)]
pub(crate) mod fixtures;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("datagram truncated: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },
    #[error("unsupported NetFlow version {0}")]
    UnsupportedVersion(u16),
    #[error("malformed flowset {flowset_id} at offset {offset}: {reason}")]
    MalformedFlowset {
        flowset_id: u16,
        offset: usize,
        reason: &'static str,
    },
    #[error("malformed template {template_id}: {reason}")]
    MalformedTemplate {
        template_id: u16,
        reason: &'static str,
    },
}

/// Everything learned from one datagram.
#[derive(Debug, Default, Clone)]
pub struct DecodedPacket {
    pub version: u16,
    /// Templates defined by this datagram, in the order they appeared.
    pub templates: Vec<Template>,
    pub records: Vec<FlowRecord>,
    /// Data flowsets skipped because their template is unknown.
    pub skipped_flowsets: usize,
    /// Data records dropped because required fields were missing.
    pub dropped_records: usize,
}

pub trait Decoder: Send + Sync {
    /// Must not modify `templates`; newly defined templates are returned in
    /// the packet for the caller to merge.
    fn decode(
        &self,
        datagram: &[u8],
        templates: &TemplateCache,
    ) -> Result<DecodedPacket, DecodeError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NetflowDecoder;

impl Decoder for NetflowDecoder {
    fn decode(
        &self,
        datagram: &[u8],
        templates: &TemplateCache,
    ) -> Result<DecodedPacket, DecodeError> {
        match read_u16(datagram, 0)? {
            5 => v5::decode(datagram),
            9 => v9::decode(datagram, templates),
            other => Err(DecodeError::UnsupportedVersion(other)),
        }
    }
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> Result<u16, DecodeError> {
    buf.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(DecodeError::Truncated {
            needed: offset + 2,
            available: buf.len(),
        })
}
