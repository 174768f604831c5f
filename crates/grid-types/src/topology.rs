//! # Topology View
//!
//! One node's current picture of the cluster: the topology version, the
//! member list, and the segments the node owns under that version.

use crate::address::NodeAddress;
use crate::ids::{SegmentId, SegmentSet, TopologyId};
use serde::{Deserialize, Serialize};

/// The local node's view of the cluster topology.
///
/// Published whole by the membership layer on every change; consumers read a
/// consistent snapshot and never mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyView {
    /// Version of this view. Never decreases across published views.
    pub topology_id: TopologyId,
    /// All nodes that are members under this view.
    pub members: Vec<NodeAddress>,
    /// Segments the local node owns under this view.
    pub local_segments: SegmentSet,
}

impl TopologyView {
    /// Create a view from its parts.
    pub fn new(
        topology_id: TopologyId,
        members: Vec<NodeAddress>,
        local_segments: SegmentSet,
    ) -> Self {
        Self {
            topology_id,
            members,
            local_segments,
        }
    }

    /// Whether `addr` is a member under this view.
    pub fn is_member(&self, addr: &NodeAddress) -> bool {
        self.members.contains(addr)
    }

    /// Whether the local node owns `segment` under this view.
    pub fn owns_segment(&self, segment: SegmentId) -> bool {
        self.local_segments.contains(&segment)
    }
}
