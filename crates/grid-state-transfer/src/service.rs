//! # State Provider Service
//!
//! Provider-side implementation of the state transfer API.
//!
//! This service:
//! 1. Answers transaction snapshot requests from joining nodes
//! 2. Exports cluster-wide listener installations
//! 3. Starts and cancels outbound segment streams through the registry
//!
//! Topology gating happens before requests reach this service; by the time
//! a method runs, the local node has reached the topology version the
//! request was addressed to.

use crate::domain::errors::StateTransferError;
use crate::domain::services::{order_installations, project_transactions};
use crate::ports::inbound::StateProvider;
use crate::ports::outbound::{ListenerRegistry, TransactionTable};
use crate::transfer::registry::OutboundTransferRegistry;
use async_trait::async_trait;
use grid_types::{ListenerInstallation, NodeAddress, SegmentSet, TopologyId, TransactionInfo};
use std::sync::Arc;
use tracing::debug;

/// The provider side of cluster state transfer.
pub struct StateProviderService {
    registry: Arc<OutboundTransferRegistry>,
    transactions: Arc<dyn TransactionTable>,
    listeners: Arc<dyn ListenerRegistry>,
}

impl StateProviderService {
    /// Create a provider over the given transfer registry and lookups.
    pub fn new(
        registry: Arc<OutboundTransferRegistry>,
        transactions: Arc<dyn TransactionTable>,
        listeners: Arc<dyn ListenerRegistry>,
    ) -> Self {
        Self {
            registry,
            transactions,
            listeners,
        }
    }

    /// The outbound transfer registry this provider streams through.
    pub fn registry(&self) -> &Arc<OutboundTransferRegistry> {
        &self.registry
    }
}

#[async_trait]
impl StateProvider for StateProviderService {
    async fn get_transactions(
        &self,
        origin: &NodeAddress,
        topology_id: TopologyId,
        segments: &SegmentSet,
    ) -> Result<Vec<TransactionInfo>, StateTransferError> {
        let point = self.transactions.consistency_point().await?;
        let snapshot = self.transactions.snapshot_at(point, segments).await?;
        let projected = project_transactions(snapshot, segments);
        debug!(
            origin = %origin,
            topology_id,
            point = point.0,
            count = projected.len(),
            "Projected transaction snapshot"
        );
        Ok(projected)
    }

    async fn get_cluster_listeners(
        &self,
    ) -> Result<Vec<ListenerInstallation>, StateTransferError> {
        let installations = self.listeners.current_installations().await?;
        let ordered = order_installations(installations);
        debug!(count = ordered.len(), "Exported cluster listeners");
        Ok(ordered)
    }

    async fn start_outbound_transfer(
        &self,
        origin: &NodeAddress,
        topology_id: TopologyId,
        segments: &SegmentSet,
    ) -> Result<(), StateTransferError> {
        self.registry.start(origin, topology_id, segments)
    }

    async fn cancel_outbound_transfer(
        &self,
        origin: &NodeAddress,
        topology_id: TopologyId,
        segments: &SegmentSet,
    ) -> Result<(), StateTransferError> {
        self.registry.cancel(origin, topology_id, segments)
    }
}
