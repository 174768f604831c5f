//! # Domain Errors
//!
//! Error types for the state transfer subsystem. One enum covers the whole
//! crate; collaborator failures pass through as their own variants without
//! reinterpretation.

use grid_types::{CacheName, NodeAddress, SegmentId, TopologyId};
use std::time::Duration;
use thiserror::Error;

/// State transfer error types.
#[derive(Debug, Error)]
pub enum StateTransferError {
    /// Wire ordinal that names no request kind.
    #[error("Unknown request kind ordinal: {0}")]
    UnknownRequestKind(u8),

    /// Request body failed structural validation.
    #[error("Malformed request: {0}")]
    MalformedRequest(&'static str),

    /// The local topology never reached the requested version.
    #[error("Topology timeout: needed {needed}, local still {local} after {waited:?}")]
    TopologyTimeout {
        /// Version the request was issued under.
        needed: TopologyId,
        /// Version the local node had when the wait gave up.
        local: TopologyId,
        /// How long the caller waited before giving up.
        waited: Duration,
    },

    /// The target cache is shutting down on this node.
    #[error("Cache is stopping: {0}")]
    CacheStopping(CacheName),

    /// An outbound transfer was cancelled or invalidated mid-stream.
    #[error("Transfer aborted: origin {origin}, topology {topology_id}, segment {segment}")]
    TransferAborted {
        /// Node the segment was streaming toward.
        origin: NodeAddress,
        /// Topology version the transfer was requested under.
        topology_id: TopologyId,
        /// Segment whose stream was cut short.
        segment: SegmentId,
    },

    /// Storage collaborator failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transaction table collaborator failure.
    #[error("Transaction table error: {0}")]
    TransactionTable(String),

    /// Listener registry collaborator failure.
    #[error("Listener registry error: {0}")]
    ListenerRegistry(String),

    /// Transport collaborator failure.
    #[error("Transport error: {0}")]
    Transport(String),
}
