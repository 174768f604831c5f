//! # Outbound Ports
//!
//! Traits for the collaborators state transfer depends on: the storage
//! engine, the node-to-node chunk transport, the transaction table, and the
//! cluster listener registry. Mock implementations for tests live at the
//! bottom of the file.

use crate::domain::errors::StateTransferError;
use crate::transfer::cancel::CancelFlag;
use async_trait::async_trait;
use grid_types::{
    CacheEntry, ConsistencyPoint, ListenerInstallation, NodeAddress, SegmentId, SegmentSet,
    StateChunk, TopologyId, TransactionInfo,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Segment storage - outbound port.
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Stream every entry of `segment` into `sink`, at most `chunk_size`
    /// entries per chunk, with the final chunk marked.
    ///
    /// `cancel` is checked between chunks: once tripped the store may stop
    /// early and return `Ok`, so callers that care about the difference must
    /// re-check the flag after the call. A sink error ends the stream.
    async fn stream_segment(
        &self,
        segment: SegmentId,
        chunk_size: usize,
        sink: &dyn ChunkSink,
        cancel: &CancelFlag,
    ) -> Result<(), StateTransferError>;
}

/// Destination for streamed chunks.
#[async_trait]
pub trait ChunkSink: Send + Sync {
    /// Accept one chunk. May suspend for backpressure; an error stops the
    /// stream.
    async fn push_chunk(&self, chunk: StateChunk) -> Result<(), StateTransferError>;
}

/// Node-to-node chunk transport - outbound port.
#[async_trait]
pub trait StateTransport: Send + Sync {
    /// Deliver one chunk to `dest`.
    async fn send_state(
        &self,
        dest: &NodeAddress,
        topology_id: TopologyId,
        chunk: StateChunk,
    ) -> Result<(), StateTransferError>;
}

/// Transaction table - outbound port.
///
/// The table owns the consistency boundary: a snapshot at a point misses no
/// transaction that could still commit on the new owner, and double-counts
/// nothing already moved by ordinary replication.
#[async_trait]
pub trait TransactionTable: Send + Sync {
    /// Current snapshot boundary.
    async fn consistency_point(&self) -> Result<ConsistencyPoint, StateTransferError>;

    /// In-flight transactions at `point` that touch `segments`.
    ///
    /// May over-approximate; the caller re-filters by segment.
    async fn snapshot_at(
        &self,
        point: ConsistencyPoint,
        segments: &SegmentSet,
    ) -> Result<Vec<TransactionInfo>, StateTransferError>;
}

/// Cluster listener registry - outbound port.
#[async_trait]
pub trait ListenerRegistry: Send + Sync {
    /// All current cluster-wide listener installations.
    async fn current_installations(&self)
        -> Result<Vec<ListenerInstallation>, StateTransferError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock segment store for testing.
///
/// Streams fixed per-segment data. In gated mode every chunk waits for one
/// permit first, so tests can hold a stream mid-flight and race cancellation
/// against it deterministically.
#[derive(Default)]
pub struct MockSegmentStore {
    entries: HashMap<SegmentId, Vec<CacheEntry>>,
    gates: HashMap<SegmentId, Arc<Semaphore>>,
    streams: Mutex<Vec<SegmentId>>,
}

impl MockSegmentStore {
    /// Store with no data; every segment streams one empty final chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with per-segment entries.
    pub fn with_entries(entries: HashMap<SegmentId, Vec<CacheEntry>>) -> Self {
        Self {
            entries,
            ..Self::default()
        }
    }

    /// Gate every known segment behind a zero-permit semaphore.
    pub fn gated(mut self) -> Self {
        self.gates = self
            .entries
            .keys()
            .map(|&segment| (segment, Arc::new(Semaphore::new(0))))
            .collect();
        self
    }

    /// Allow `chunks` more chunks of `segment` to flow.
    pub fn release(&self, segment: SegmentId, chunks: usize) {
        if let Some(gate) = self.gates.get(&segment) {
            gate.add_permits(chunks);
        }
    }

    /// Segments whose streams have started, in start order.
    pub fn streams_started(&self) -> Vec<SegmentId> {
        self.streams.lock().clone()
    }
}

#[async_trait]
impl SegmentStore for MockSegmentStore {
    async fn stream_segment(
        &self,
        segment: SegmentId,
        chunk_size: usize,
        sink: &dyn ChunkSink,
        cancel: &CancelFlag,
    ) -> Result<(), StateTransferError> {
        self.streams.lock().push(segment);

        let entries = self.entries.get(&segment).cloned().unwrap_or_default();
        let chunk_size = chunk_size.max(1);
        let mut chunks = Vec::new();
        if entries.is_empty() {
            chunks.push(StateChunk::new(segment, Vec::new(), true));
        } else {
            let mut batches = entries.chunks(chunk_size).peekable();
            while let Some(batch) = batches.next() {
                let last = batches.peek().is_none();
                chunks.push(StateChunk::new(segment, batch.to_vec(), last));
            }
        }

        for chunk in chunks {
            if let Some(gate) = self.gates.get(&segment) {
                let permit = gate
                    .acquire()
                    .await
                    .map_err(|_| StateTransferError::Storage("chunk gate closed".to_string()))?;
                permit.forget();
            }
            if cancel.is_cancelled() {
                return Ok(());
            }
            sink.push_chunk(chunk).await?;
        }
        Ok(())
    }
}

/// One chunk recorded by [`MockStateTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentChunk {
    /// Destination node.
    pub dest: NodeAddress,
    /// Topology version the chunk was sent under.
    pub topology_id: TopologyId,
    /// The chunk itself.
    pub chunk: StateChunk,
}

/// Mock chunk transport recording everything sent.
#[derive(Default)]
pub struct MockStateTransport {
    sent: Mutex<Vec<SentChunk>>,
    fail_message: Option<String>,
}

impl MockStateTransport {
    /// Transport that accepts and records every chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that rejects every send with a transport error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_message: Some(message.into()),
        }
    }

    /// Everything sent so far, in send order.
    pub fn sent(&self) -> Vec<SentChunk> {
        self.sent.lock().clone()
    }

    /// Chunks sent so far for one segment.
    pub fn sent_for_segment(&self, segment: SegmentId) -> usize {
        self.sent
            .lock()
            .iter()
            .filter(|s| s.chunk.segment == segment)
            .count()
    }
}

#[async_trait]
impl StateTransport for MockStateTransport {
    async fn send_state(
        &self,
        dest: &NodeAddress,
        topology_id: TopologyId,
        chunk: StateChunk,
    ) -> Result<(), StateTransferError> {
        if let Some(message) = &self.fail_message {
            return Err(StateTransferError::Transport(message.clone()));
        }
        self.sent.lock().push(SentChunk {
            dest: dest.clone(),
            topology_id,
            chunk,
        });
        Ok(())
    }
}

/// Mock transaction table for testing.
///
/// Hands back the whole table from `snapshot_at`, deliberately unfiltered,
/// so the caller's segment projection is exercised.
pub struct MockTransactionTable {
    point: ConsistencyPoint,
    transactions: Vec<TransactionInfo>,
    snapshot_points: Mutex<Vec<ConsistencyPoint>>,
}

impl MockTransactionTable {
    /// Table at `point` holding `transactions`.
    pub fn new(point: ConsistencyPoint, transactions: Vec<TransactionInfo>) -> Self {
        Self {
            point,
            transactions,
            snapshot_points: Mutex::new(Vec::new()),
        }
    }

    /// Points passed to `snapshot_at`, in call order.
    pub fn snapshot_points(&self) -> Vec<ConsistencyPoint> {
        self.snapshot_points.lock().clone()
    }

    /// How many snapshots have been taken.
    pub fn snapshot_count(&self) -> usize {
        self.snapshot_points.lock().len()
    }
}

#[async_trait]
impl TransactionTable for MockTransactionTable {
    async fn consistency_point(&self) -> Result<ConsistencyPoint, StateTransferError> {
        Ok(self.point)
    }

    async fn snapshot_at(
        &self,
        point: ConsistencyPoint,
        _segments: &SegmentSet,
    ) -> Result<Vec<TransactionInfo>, StateTransferError> {
        self.snapshot_points.lock().push(point);
        Ok(self.transactions.clone())
    }
}

/// Mock listener registry for testing.
#[derive(Default)]
pub struct MockListenerRegistry {
    installations: Vec<ListenerInstallation>,
}

impl MockListenerRegistry {
    /// Registry holding `installations`.
    pub fn with_installations(installations: Vec<ListenerInstallation>) -> Self {
        Self { installations }
    }
}

#[async_trait]
impl ListenerRegistry for MockListenerRegistry {
    async fn current_installations(
        &self,
    ) -> Result<Vec<ListenerInstallation>, StateTransferError> {
        Ok(self.installations.clone())
    }
}
