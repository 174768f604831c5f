//! # Outbound Transfer Registry
//!
//! Provider-side table of active outbound transfers, keyed by (origin,
//! topology version, segment). Start is idempotent per key, cancel of an
//! absent key is a no-op, and topology changes invalidate entries whose
//! origin left or whose version fell behind while local ownership moved on.
//!
//! The table is a `DashMap`, so starts and cancels on different keys never
//! contend and operations on the same key are linearized by its shard lock.

use crate::domain::errors::StateTransferError;
use crate::domain::request::OutboundTransferKey;
use crate::domain::services::transfer_survives;
use crate::ports::outbound::{SegmentStore, StateTransport};
use crate::transfer::cancel::CancelFlag;
use crate::transfer::task::TransferTask;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use grid_types::{NodeAddress, SegmentSet, TopologyId, TopologyView};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Counters for registry activity.
#[derive(Debug, Default)]
pub struct TransferStats {
    /// Transfers started (idempotent retries excluded).
    pub started: AtomicU64,
    /// Transfers that streamed to completion.
    pub completed: AtomicU64,
    /// Transfers removed by an explicit cancel request.
    pub cancelled: AtomicU64,
    /// Transfers removed by topology invalidation or shutdown.
    pub invalidated: AtomicU64,
}

/// One active transfer's registry record.
///
/// The transfer id distinguishes generations of the same key: a transfer
/// that was cancelled and restarted gets a fresh id, and only the task
/// holding the matching id may remove the entry on completion.
pub(crate) struct TransferHandle {
    pub(crate) cancel: CancelFlag,
    pub(crate) transfer_id: u64,
}

/// Provider-side table of active outbound transfers.
pub struct OutboundTransferRegistry {
    entries: Arc<DashMap<OutboundTransferKey, TransferHandle>>,
    stats: Arc<TransferStats>,
    next_transfer_id: AtomicU64,
    chunk_size: usize,
    store: Arc<dyn SegmentStore>,
    transport: Arc<dyn StateTransport>,
}

impl OutboundTransferRegistry {
    /// Create a registry streaming through `store` and `transport`.
    pub fn new(
        store: Arc<dyn SegmentStore>,
        transport: Arc<dyn StateTransport>,
        chunk_size: usize,
    ) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            stats: Arc::new(TransferStats::default()),
            next_transfer_id: AtomicU64::new(0),
            chunk_size,
            store,
            transport,
        }
    }

    /// Start streaming each of `segments` toward `origin`.
    ///
    /// A key that is already active is left untouched, so a retried request
    /// cannot double-stream a segment. Validation happens before any entry
    /// is created; a failed call leaves the registry unchanged. Streaming
    /// tasks are spawned onto the ambient tokio runtime.
    pub fn start(
        &self,
        origin: &NodeAddress,
        topology_id: TopologyId,
        segments: &SegmentSet,
    ) -> Result<(), StateTransferError> {
        if segments.is_empty() {
            return Err(StateTransferError::MalformedRequest(
                "segment set must not be empty",
            ));
        }

        for &segment in segments {
            let key = OutboundTransferKey::new(origin.clone(), topology_id, segment);
            match self.entries.entry(key.clone()) {
                Entry::Occupied(_) => {
                    debug!(
                        origin = %origin,
                        topology_id,
                        segment,
                        "Outbound transfer already active, ignoring retry"
                    );
                }
                Entry::Vacant(slot) => {
                    let cancel = CancelFlag::new();
                    let transfer_id = self.next_transfer_id.fetch_add(1, Ordering::Relaxed);
                    slot.insert(TransferHandle {
                        cancel: cancel.clone(),
                        transfer_id,
                    });
                    self.stats.started.fetch_add(1, Ordering::Relaxed);
                    debug!(origin = %origin, topology_id, segment, "Starting outbound transfer");

                    let task = TransferTask {
                        key,
                        transfer_id,
                        cancel,
                        chunk_size: self.chunk_size,
                        store: Arc::clone(&self.store),
                        transport: Arc::clone(&self.transport),
                        entries: Arc::clone(&self.entries),
                        stats: Arc::clone(&self.stats),
                    };
                    tokio::spawn(task.run());
                }
            }
        }

        Ok(())
    }

    /// Cancel the transfers toward `origin` for each of `segments`.
    ///
    /// Absent keys are skipped: a cancel racing a natural completion is
    /// expected, not an error.
    pub fn cancel(
        &self,
        origin: &NodeAddress,
        topology_id: TopologyId,
        segments: &SegmentSet,
    ) -> Result<(), StateTransferError> {
        for &segment in segments {
            let key = OutboundTransferKey::new(origin.clone(), topology_id, segment);
            if let Some((_, handle)) = self.entries.remove(&key) {
                handle.cancel.cancel();
                self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(origin = %origin, topology_id, segment, "Cancelled outbound transfer");
            }
        }
        Ok(())
    }

    /// Drop every entry that does not survive under `view`.
    ///
    /// Returns how many entries were invalidated.
    pub fn apply_view(&self, view: &TopologyView) -> usize {
        let mut dropped = 0;
        self.entries.retain(|key, handle| {
            if transfer_survives(key, view) {
                true
            } else {
                handle.cancel.cancel();
                self.stats.invalidated.fetch_add(1, Ordering::Relaxed);
                dropped += 1;
                debug!(
                    origin = %key.origin,
                    topology_id = key.topology_id,
                    segment = key.segment,
                    view = view.topology_id,
                    "Invalidating outbound transfer"
                );
                false
            }
        });
        if dropped > 0 {
            info!(
                dropped,
                topology_id = view.topology_id,
                "Topology change invalidated outbound transfers"
            );
        }
        dropped
    }

    /// Cancel and drop every entry. Cache stop path.
    pub fn shutdown(&self) -> usize {
        let mut dropped = 0;
        self.entries.retain(|_, handle| {
            handle.cancel.cancel();
            self.stats.invalidated.fetch_add(1, Ordering::Relaxed);
            dropped += 1;
            false
        });
        info!(dropped, "Outbound transfer registry shut down");
        dropped
    }

    /// Number of currently active transfers.
    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    /// Whether `key` denotes an active transfer.
    pub fn is_active(&self, key: &OutboundTransferKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Snapshot of the active keys.
    pub fn active_keys(&self) -> Vec<OutboundTransferKey> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Registry counters.
    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }
}

/// Drive registry invalidation from topology view changes.
///
/// Applies the current view immediately, then every published change until
/// the tracker goes away. Event-driven; nothing is polled.
pub async fn topology_monitor(
    registry: Arc<OutboundTransferRegistry>,
    mut views: watch::Receiver<TopologyView>,
) {
    loop {
        let view = views.borrow_and_update().clone();
        registry.apply_view(&view);

        if views.changed().await.is_err() {
            debug!("Topology channel closed, stopping transfer monitor");
            return;
        }
    }
}
