//! # Cluster-Wide Listener Descriptors
//!
//! A cluster listener is registered once by an owner node but must observe
//! events on every node. These descriptors are what a newly joining node
//! installs locally to take part.

use crate::address::NodeAddress;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Key filter attached to a cluster listener.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ListenerFilter {
    /// Observe events for every key.
    AllKeys,
    /// Observe events only for keys with this byte prefix.
    KeyPrefix(Vec<u8>),
}

impl ListenerFilter {
    /// Whether `key` passes this filter.
    pub fn matches(&self, key: &[u8]) -> bool {
        match self {
            Self::AllKeys => true,
            Self::KeyPrefix(prefix) => key.starts_with(prefix),
        }
    }
}

/// Descriptor of one cluster-wide listener installation.
///
/// Ordering is by `listener_id` so exported sets have a deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListenerInstallation {
    /// Unique id of the registration.
    pub listener_id: Uuid,
    /// Node that owns the listener and receives its notifications.
    pub owner: NodeAddress,
    /// Filter every node applies before forwarding events to the owner.
    pub filter: ListenerFilter,
}

impl ListenerInstallation {
    /// Register a new listener with a fresh id.
    pub fn new(owner: NodeAddress, filter: ListenerFilter) -> Self {
        Self {
            listener_id: Uuid::new_v4(),
            owner,
            filter,
        }
    }
}
