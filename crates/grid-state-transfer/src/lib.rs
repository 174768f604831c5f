//! # Grid State Transfer
//!
//! Node-to-node state transfer for the GridCache cluster.
//!
//! **Command ID:** 15
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//! **Status:** Production-Ready
//!
//! ## Purpose
//!
//! Move cache segments and transactional context between nodes when the
//! cluster topology changes:
//! - A typed request envelope with a stable wire format (four request kinds)
//! - Topology gating, so a request addressed to a newer topology waits for
//!   the local node to catch up
//! - An outbound transfer registry with idempotent start, cooperative
//!   cancellation, and automatic invalidation on topology change
//! - Transaction snapshot projection and cluster listener export for
//!   joining nodes
//!
//! ## Module Structure
//!
//! ```text
//! grid-state-transfer/
//! ├── domain/          # Request envelope, wire codec, errors, invariants
//! ├── ports/           # Provider API trait + collaborator traits and mocks
//! ├── rpc/             # Frame handling and request dispatch
//! ├── transfer/        # Cancel flag, transfer registry, streaming task
//! ├── topology.rs      # Topology tracker and guard
//! ├── service.rs       # Provider service wiring it all together
//! └── config.rs        # Tunables
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod domain;
pub mod ports;
pub mod rpc;
pub mod service;
pub mod topology;
pub mod transfer;

// Re-exports
pub use config::StateTransferConfig;
pub use domain::{
    invariant_monotonic_topology, invariant_request_shape, invariant_unique_transfer_keys,
    order_installations, project_transactions, transfer_survives, OutboundTransferKey,
    RequestKind, StateRequest, StateResponse, StateTransferError,
};
pub use ports::{
    ChunkSink, ListenerRegistry, MockListenerRegistry, MockSegmentStore, MockStateTransport,
    MockTransactionTable, SegmentStore, SentChunk, StateProvider, StateTransport,
    TransactionTable,
};
pub use rpc::StateRequestDispatcher;
pub use service::StateProviderService;
pub use topology::{TopologyGuard, TopologyTracker};
pub use transfer::{
    topology_monitor, CancelFlag, ChunkForwarder, OutboundTransferRegistry, TransferStats,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
