//! # In-Flight Transaction Snapshots
//!
//! The transaction metadata handed to a new segment owner so it can finish
//! transactions that were still running when ownership moved.

use crate::address::NodeAddress;
use crate::ids::SegmentSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cluster-wide identifier of one transaction.
///
/// Ordering is by originator, then local id, so snapshot replies have a
/// deterministic order regardless of table iteration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlobalTxId {
    /// Node that started the transaction.
    pub originator: NodeAddress,
    /// Identifier unique within the originator.
    pub local_id: u64,
}

impl GlobalTxId {
    /// Create a transaction id from its parts.
    pub fn new(originator: NodeAddress, local_id: u64) -> Self {
        Self {
            originator,
            local_id,
        }
    }
}

impl fmt::Display for GlobalTxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.originator, self.local_id)
    }
}

/// One logged modification of an in-flight transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteOp {
    /// Write or overwrite a key.
    Put {
        /// Serialized key bytes.
        key: Vec<u8>,
        /// Serialized value bytes.
        value: Vec<u8>,
    },
    /// Delete a key.
    Remove {
        /// Serialized key bytes.
        key: Vec<u8>,
    },
}

impl WriteOp {
    /// The key this operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } => key,
            Self::Remove { key } => key,
        }
    }
}

/// Snapshot record of one in-flight transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    /// Cluster-wide transaction id.
    pub tx_id: GlobalTxId,
    /// Segments this transaction touches.
    pub segments: SegmentSet,
    /// Keys the transaction currently holds locks on.
    pub locked_keys: Vec<Vec<u8>>,
    /// Modification log in execution order.
    pub modifications: Vec<WriteOp>,
}

impl TransactionInfo {
    /// Whether this transaction touches at least one of `segments`.
    pub fn touches_any(&self, segments: &SegmentSet) -> bool {
        self.segments.iter().any(|s| segments.contains(s))
    }
}
