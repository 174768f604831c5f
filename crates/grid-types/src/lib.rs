//! # Grid Types Crate
//!
//! Cross-subsystem domain entities for GridCache: cache and node identity,
//! segment and topology types, and the payloads moved during state transfer
//! (segment chunks, transaction snapshots, listener descriptors).
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: all cross-subsystem types are defined here.
//! - **Plain Values**: everything is `serde`-serializable data with no
//!   behavior beyond cheap helpers; subsystem logic lives in subsystem crates.

pub mod address;
pub mod ids;
pub mod listeners;
pub mod state;
pub mod topology;
pub mod transactions;

pub use address::NodeAddress;
pub use ids::{CacheName, ConsistencyPoint, SegmentId, SegmentSet, TopologyId};
pub use listeners::{ListenerFilter, ListenerInstallation};
pub use state::{CacheEntry, StateChunk};
pub use topology::TopologyView;
pub use transactions::{GlobalTxId, TransactionInfo, WriteOp};
