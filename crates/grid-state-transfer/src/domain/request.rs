//! # State Request Envelope
//!
//! The typed command that travels between nodes during state transfer, plus
//! the key identifying one outbound transfer and the typed reply.
//!
//! A request is built through one smart constructor per kind, so every value
//! in the system satisfies the per-kind shape rules: the three origin-bearing
//! kinds carry a requester address and a non-empty segment set, the listener
//! export carries neither.

use crate::domain::errors::StateTransferError;
use grid_types::{
    CacheName, ListenerInstallation, NodeAddress, SegmentId, SegmentSet, TopologyId,
    TransactionInfo,
};
use serde::{Deserialize, Serialize};

/// The four operations a state request can carry.
///
/// Wire ordinals are fixed forever; appending new kinds is the only
/// compatible evolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Snapshot the in-flight transactions touching the requested segments.
    GetTransactions = 0,
    /// Export the cluster-wide listener registrations.
    GetClusterListeners = 1,
    /// Begin streaming the requested segments back to the origin.
    StartOutboundTransfer = 2,
    /// Stop streaming the requested segments to the origin.
    CancelOutboundTransfer = 3,
}

impl RequestKind {
    /// Wire ordinal of this kind.
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Resolve a wire ordinal back to a kind.
    pub fn from_ordinal(ordinal: u8) -> Result<Self, StateTransferError> {
        match ordinal {
            0 => Ok(Self::GetTransactions),
            1 => Ok(Self::GetClusterListeners),
            2 => Ok(Self::StartOutboundTransfer),
            3 => Ok(Self::CancelOutboundTransfer),
            other => Err(StateTransferError::UnknownRequestKind(other)),
        }
    }
}

/// A state transfer request between two nodes.
///
/// Immutable once constructed. The receiving side decodes an equivalent
/// value, dispatches it once, and discards it; a request carries no identity
/// beyond its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRequest {
    cache_name: CacheName,
    kind: RequestKind,
    origin: Option<NodeAddress>,
    topology_id: TopologyId,
    segments: SegmentSet,
}

impl StateRequest {
    /// Command-family tag on the multiplexed cluster channel.
    pub const COMMAND_ID: u8 = 15;

    /// Request the in-flight transactions touching `segments`.
    pub fn get_transactions(
        cache_name: CacheName,
        origin: NodeAddress,
        topology_id: TopologyId,
        segments: SegmentSet,
    ) -> Result<Self, StateTransferError> {
        Self::with_origin(
            cache_name,
            RequestKind::GetTransactions,
            origin,
            topology_id,
            segments,
        )
    }

    /// Request the cluster-wide listener registrations.
    ///
    /// The only kind with no origin and no segments.
    pub fn get_cluster_listeners(cache_name: CacheName, topology_id: TopologyId) -> Self {
        Self {
            cache_name,
            kind: RequestKind::GetClusterListeners,
            origin: None,
            topology_id,
            segments: SegmentSet::new(),
        }
    }

    /// Ask the receiver to start streaming `segments` back to `origin`.
    pub fn start_outbound_transfer(
        cache_name: CacheName,
        origin: NodeAddress,
        topology_id: TopologyId,
        segments: SegmentSet,
    ) -> Result<Self, StateTransferError> {
        Self::with_origin(
            cache_name,
            RequestKind::StartOutboundTransfer,
            origin,
            topology_id,
            segments,
        )
    }

    /// Ask the receiver to stop streaming `segments` to `origin`.
    pub fn cancel_outbound_transfer(
        cache_name: CacheName,
        origin: NodeAddress,
        topology_id: TopologyId,
        segments: SegmentSet,
    ) -> Result<Self, StateTransferError> {
        Self::with_origin(
            cache_name,
            RequestKind::CancelOutboundTransfer,
            origin,
            topology_id,
            segments,
        )
    }

    fn with_origin(
        cache_name: CacheName,
        kind: RequestKind,
        origin: NodeAddress,
        topology_id: TopologyId,
        segments: SegmentSet,
    ) -> Result<Self, StateTransferError> {
        if segments.is_empty() {
            return Err(StateTransferError::MalformedRequest(
                "segment set must not be empty",
            ));
        }
        Ok(Self {
            cache_name,
            kind,
            origin: Some(origin),
            topology_id,
            segments,
        })
    }

    /// Cache instance this request targets.
    pub fn cache_name(&self) -> &CacheName {
        &self.cache_name
    }

    /// Operation this request carries.
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Requesting node, absent only for [`RequestKind::GetClusterListeners`].
    pub fn origin(&self) -> Option<&NodeAddress> {
        self.origin.as_ref()
    }

    /// Topology version the request was issued under.
    pub fn topology_id(&self) -> TopologyId {
        self.topology_id
    }

    /// Segments the request concerns, empty only for
    /// [`RequestKind::GetClusterListeners`].
    pub fn segments(&self) -> &SegmentSet {
        &self.segments
    }

    /// Whether the transport should hold the channel open for a reply.
    ///
    /// Cancel is fire-and-forget; every other kind produces a payload or a
    /// completion the requester waits on.
    pub fn expects_return_value(&self) -> bool {
        self.kind != RequestKind::CancelOutboundTransfer
    }

    /// Whether dispatch may suspend the calling task.
    ///
    /// Always true: every kind can wait in the topology gate, so requests
    /// must never be dispatched on the transport's I/O driver.
    pub fn can_block(&self) -> bool {
        true
    }
}

/// Identity of one logical outbound transfer.
///
/// Two start requests producing the same key denote the same transfer; the
/// registry treats the second as an idempotent retry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutboundTransferKey {
    /// Node the segment streams toward.
    pub origin: NodeAddress,
    /// Topology version the transfer was requested under.
    pub topology_id: TopologyId,
    /// Segment being streamed.
    pub segment: SegmentId,
}

impl OutboundTransferKey {
    /// Create a key from its parts.
    pub fn new(origin: NodeAddress, topology_id: TopologyId, segment: SegmentId) -> Self {
        Self {
            origin,
            topology_id,
            segment,
        }
    }
}

/// Typed result of one dispatched state request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateResponse {
    /// Reply to [`RequestKind::GetTransactions`], ordered by transaction id.
    Transactions(Vec<TransactionInfo>),
    /// Reply to [`RequestKind::GetClusterListeners`], ordered by listener id.
    ClusterListeners(Vec<ListenerInstallation>),
    /// Unit outcome for start and cancel requests.
    None,
}
