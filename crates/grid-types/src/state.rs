//! # Segment State In Transit
//!
//! The units of cache data moved between nodes while segment ownership
//! changes hands: individual entries and the chunks that batch them.

use crate::ids::SegmentId;
use serde::{Deserialize, Serialize};

/// One cache record in transit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Serialized key bytes.
    pub key: Vec<u8>,
    /// Serialized value bytes.
    pub value: Vec<u8>,
}

impl CacheEntry {
    /// Create an entry from key and value bytes.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// One batch of entries streamed for a single segment.
///
/// The producer sets `last_chunk` on the final batch of a segment so the
/// receiver can tell a completed segment from an interrupted stream. A
/// segment with no data still produces one empty chunk with `last_chunk`
/// set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChunk {
    /// Segment the entries belong to.
    pub segment: SegmentId,
    /// Entries in this batch.
    pub entries: Vec<CacheEntry>,
    /// Whether this is the final batch for the segment.
    pub last_chunk: bool,
}

impl StateChunk {
    /// Create a chunk from its parts.
    pub fn new(segment: SegmentId, entries: Vec<CacheEntry>, last_chunk: bool) -> Self {
        Self {
            segment,
            entries,
            last_chunk,
        }
    }
}
