//! # Inbound Port
//!
//! What the provider side of state transfer can be asked to do. The RPC
//! dispatcher drives this trait for remote requests; local subsystems may
//! call it directly.

use crate::domain::errors::StateTransferError;
use async_trait::async_trait;
use grid_types::{ListenerInstallation, NodeAddress, SegmentSet, TopologyId, TransactionInfo};

/// State provider API - inbound port.
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Snapshot the in-flight transactions touching `segments`, ordered by
    /// transaction id.
    async fn get_transactions(
        &self,
        origin: &NodeAddress,
        topology_id: TopologyId,
        segments: &SegmentSet,
    ) -> Result<Vec<TransactionInfo>, StateTransferError>;

    /// Export the cluster-wide listener installations, ordered by listener
    /// id.
    async fn get_cluster_listeners(
        &self,
    ) -> Result<Vec<ListenerInstallation>, StateTransferError>;

    /// Start streaming each of `segments` toward `origin`. Idempotent per
    /// (origin, topology, segment).
    async fn start_outbound_transfer(
        &self,
        origin: &NodeAddress,
        topology_id: TopologyId,
        segments: &SegmentSet,
    ) -> Result<(), StateTransferError>;

    /// Stop streaming each of `segments` toward `origin`. Absent transfers
    /// are skipped.
    async fn cancel_outbound_transfer(
        &self,
        origin: &NodeAddress,
        topology_id: TopologyId,
        segments: &SegmentSet,
    ) -> Result<(), StateTransferError>;
}
