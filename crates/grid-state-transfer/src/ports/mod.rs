//! # Ports Module
//!
//! Inbound provider API and outbound collaborator traits, with mock
//! implementations for tests.

pub mod inbound;
pub mod outbound;

pub use inbound::StateProvider;
pub use outbound::{
    ChunkSink, ListenerRegistry, MockListenerRegistry, MockSegmentStore, MockStateTransport,
    MockTransactionTable, SegmentStore, SentChunk, StateTransport, TransactionTable,
};
