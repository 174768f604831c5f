//! # Wire Body Codec
//!
//! Hand-written big-endian codec for the state request body. The transport's
//! command header already carries the cache name and topology id, so the body
//! holds only the kind ordinal plus, for origin-bearing kinds, the requester
//! address and the segment set.
//!
//! Layout:
//!
//! ```text
//! byte 0          kind ordinal
//! origin-bearing kinds only:
//!   u32           origin length
//!   bytes         origin (UTF-8)
//!   u32           segment count
//!   u32 * count   segment ids, ascending
//! ```

use crate::domain::errors::StateTransferError;
use crate::domain::request::{RequestKind, StateRequest};
use grid_types::{CacheName, NodeAddress, SegmentSet, TopologyId};

/// Encode the wire body of a request.
pub fn encode(request: &StateRequest) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 8 + 4 * request.segments().len());
    out.push(request.kind().ordinal());

    if let Some(origin) = request.origin() {
        let name = origin.as_str().as_bytes();
        out.extend_from_slice(&(name.len() as u32).to_be_bytes());
        out.extend_from_slice(name);
        out.extend_from_slice(&(request.segments().len() as u32).to_be_bytes());
        for &segment in request.segments() {
            out.extend_from_slice(&segment.to_be_bytes());
        }
    }

    out
}

/// Decode a wire body back into a request.
///
/// `cache_name` and `topology_id` come from the transport's command header.
/// An unknown ordinal fails before any further interpretation of the buffer;
/// truncation, duplicate segments, and trailing bytes are all malformed.
pub fn decode(
    cache_name: CacheName,
    topology_id: TopologyId,
    body: &[u8],
) -> Result<StateRequest, StateTransferError> {
    let mut reader = Reader::new(body);
    let kind = RequestKind::from_ordinal(reader.read_u8("truncated kind ordinal")?)?;

    let request = match kind {
        RequestKind::GetClusterListeners => {
            StateRequest::get_cluster_listeners(cache_name, topology_id)
        }
        RequestKind::GetTransactions => {
            let (origin, segments) = read_origin_and_segments(&mut reader)?;
            StateRequest::get_transactions(cache_name, origin, topology_id, segments)?
        }
        RequestKind::StartOutboundTransfer => {
            let (origin, segments) = read_origin_and_segments(&mut reader)?;
            StateRequest::start_outbound_transfer(cache_name, origin, topology_id, segments)?
        }
        RequestKind::CancelOutboundTransfer => {
            let (origin, segments) = read_origin_and_segments(&mut reader)?;
            StateRequest::cancel_outbound_transfer(cache_name, origin, topology_id, segments)?
        }
    };

    reader.finish()?;
    Ok(request)
}

fn read_origin_and_segments(
    reader: &mut Reader<'_>,
) -> Result<(NodeAddress, SegmentSet), StateTransferError> {
    let len = reader.read_u32("truncated origin length")? as usize;
    let bytes = reader.take(len, "truncated origin bytes")?;
    let name = std::str::from_utf8(bytes)
        .map_err(|_| StateTransferError::MalformedRequest("origin is not valid UTF-8"))?;
    let origin = NodeAddress::new(name);

    let count = reader.read_u32("truncated segment count")?;
    let mut segments = SegmentSet::new();
    for _ in 0..count {
        let segment = reader.read_u32("truncated segment id")?;
        if !segments.insert(segment) {
            return Err(StateTransferError::MalformedRequest("duplicate segment id"));
        }
    }

    Ok((origin, segments))
}

/// Bounds-checked cursor over the body buffer.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], StateTransferError> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or(StateTransferError::MalformedRequest("length overflow"))?;
        if end > self.buf.len() {
            return Err(StateTransferError::MalformedRequest(what));
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self, what: &'static str) -> Result<u8, StateTransferError> {
        Ok(self.take(1, what)?[0])
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, StateTransferError> {
        let bytes = self.take(4, what)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(bytes);
        Ok(u32::from_be_bytes(buf))
    }

    fn finish(&self) -> Result<(), StateTransferError> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(StateTransferError::MalformedRequest(
                "trailing bytes after request body",
            ))
        }
    }
}
