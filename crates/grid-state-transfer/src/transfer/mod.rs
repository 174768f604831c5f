//! # Outbound Transfer Engine
//!
//! Streaming of cache segments toward requesting nodes: the cancel flag
//! shared between a transfer and its canceller, the registry of active
//! transfers, and the per-segment streaming task.

pub mod cancel;
pub mod registry;
pub mod task;

pub use cancel::CancelFlag;
pub use registry::{topology_monitor, OutboundTransferRegistry, TransferStats};
pub use task::ChunkForwarder;
