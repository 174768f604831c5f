//! # Core Identifiers
//!
//! Segment, topology, and cache identity types shared by every subsystem.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// Identifier of one fixed-size partition of a cache's key space.
pub type SegmentId = u32;

/// A set of segments with unique members and deterministic iteration order.
pub type SegmentSet = BTreeSet<SegmentId>;

/// Monotonically increasing version of the cluster topology.
pub type TopologyId = u64;

/// Snapshot boundary handed out by a transaction table.
///
/// Opaque everywhere except inside the transaction subsystem that mints it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConsistencyPoint(pub u64);

/// Name of one cache instance.
///
/// Interned-style: cheap to clone, compared by content, shown in log fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct CacheName(Arc<str>);

impl CacheName {
    /// Create a cache name from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().into())
    }

    /// Borrow the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for CacheName {
    fn from(name: String) -> Self {
        Self(name.into())
    }
}

impl From<CacheName> for String {
    fn from(name: CacheName) -> Self {
        name.0.as_ref().to_owned()
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build a [`SegmentSet`] from any iterator of segment ids.
///
/// Duplicates collapse; ordering of the input does not matter.
pub fn segment_set(segments: impl IntoIterator<Item = SegmentId>) -> SegmentSet {
    segments.into_iter().collect()
}
