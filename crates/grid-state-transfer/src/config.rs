//! # State Transfer Configuration
//!
//! Tunables for the provider side of cluster state transfer.

use serde::{Deserialize, Serialize};

/// State transfer configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StateTransferConfig {
    /// How long an incoming request may wait for the local node to reach
    /// the topology version it was addressed to, in milliseconds.
    pub await_topology_timeout_ms: u64,

    /// Cache entries per streamed state chunk.
    pub chunk_size: usize,
}

impl Default for StateTransferConfig {
    fn default() -> Self {
        Self {
            await_topology_timeout_ms: 240_000,
            chunk_size: 512,
        }
    }
}

impl StateTransferConfig {
    /// Create a config for testing (smaller values).
    pub fn for_testing() -> Self {
        Self {
            await_topology_timeout_ms: 200,
            chunk_size: 2,
        }
    }
}
