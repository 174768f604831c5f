//! # Outbound Transfer Task
//!
//! The per-key worker streaming one segment toward its origin. Chunks flow
//! storage -> forwarder -> transport; the forwarder refuses chunks once the
//! transfer's cancel flag trips, so a cancelled stream stops between chunks
//! without preemption.

use crate::domain::errors::StateTransferError;
use crate::domain::request::OutboundTransferKey;
use crate::ports::outbound::{ChunkSink, SegmentStore, StateTransport};
use crate::transfer::cancel::CancelFlag;
use crate::transfer::registry::{TransferHandle, TransferStats};
use async_trait::async_trait;
use dashmap::DashMap;
use grid_types::StateChunk;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// Sink that forwards chunks of one transfer to the requesting node.
pub struct ChunkForwarder {
    key: OutboundTransferKey,
    cancel: CancelFlag,
    transport: Arc<dyn StateTransport>,
}

impl ChunkForwarder {
    /// Create a forwarder for the transfer identified by `key`.
    pub fn new(
        key: OutboundTransferKey,
        cancel: CancelFlag,
        transport: Arc<dyn StateTransport>,
    ) -> Self {
        Self {
            key,
            cancel,
            transport,
        }
    }

    fn aborted(&self) -> StateTransferError {
        StateTransferError::TransferAborted {
            origin: self.key.origin.clone(),
            topology_id: self.key.topology_id,
            segment: self.key.segment,
        }
    }
}

#[async_trait]
impl ChunkSink for ChunkForwarder {
    async fn push_chunk(&self, chunk: StateChunk) -> Result<(), StateTransferError> {
        if self.cancel.is_cancelled() {
            return Err(self.aborted());
        }
        self.transport
            .send_state(&self.key.origin, self.key.topology_id, chunk)
            .await
    }
}

/// One spawned streaming worker. Owns everything it needs so the registry
/// borrowing rules stay simple.
pub(crate) struct TransferTask {
    pub(crate) key: OutboundTransferKey,
    pub(crate) transfer_id: u64,
    pub(crate) cancel: CancelFlag,
    pub(crate) chunk_size: usize,
    pub(crate) store: Arc<dyn SegmentStore>,
    pub(crate) transport: Arc<dyn StateTransport>,
    pub(crate) entries: Arc<DashMap<OutboundTransferKey, TransferHandle>>,
    pub(crate) stats: Arc<TransferStats>,
}

impl TransferTask {
    /// Stream the segment, then clean up the registry entry.
    ///
    /// Removal is guarded by this task's transfer id: whoever cancelled the
    /// entry may already have replaced it with a restarted transfer, and a
    /// finished task must never evict that newer generation.
    pub(crate) async fn run(self) {
        let forwarder =
            ChunkForwarder::new(self.key.clone(), self.cancel.clone(), self.transport);
        let result = self
            .store
            .stream_segment(self.key.segment, self.chunk_size, &forwarder, &self.cancel)
            .await;

        if self.cancel.is_cancelled() {
            debug!(
                origin = %self.key.origin,
                topology_id = self.key.topology_id,
                segment = self.key.segment,
                "Outbound transfer aborted"
            );
            return;
        }

        match result {
            Ok(()) => {
                let removed = self
                    .entries
                    .remove_if(&self.key, |_, handle| handle.transfer_id == self.transfer_id);
                if removed.is_some() {
                    self.stats.completed.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        origin = %self.key.origin,
                        topology_id = self.key.topology_id,
                        segment = self.key.segment,
                        "Outbound transfer completed"
                    );
                }
            }
            Err(err) => {
                self.entries
                    .remove_if(&self.key, |_, handle| handle.transfer_id == self.transfer_id);
                warn!(
                    origin = %self.key.origin,
                    topology_id = self.key.topology_id,
                    segment = self.key.segment,
                    error = %err,
                    "Outbound transfer failed"
                );
            }
        }
    }
}
