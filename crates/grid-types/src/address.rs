//! # Node Addressing
//!
//! Logical addresses of cluster members. Addresses are opaque names minted by
//! the membership layer; this crate only compares, hashes, and displays them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Logical address of one cluster node.
///
/// Cheap to clone and usable as a map key. The physical endpoint behind an
/// address is the transport's concern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct NodeAddress(Arc<str>);

impl NodeAddress {
    /// Create an address from any string-like value.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().into())
    }

    /// Borrow the address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NodeAddress {
    fn from(name: String) -> Self {
        Self(name.into())
    }
}

impl From<NodeAddress> for String {
    fn from(addr: NodeAddress) -> Self {
        addr.0.as_ref().to_owned()
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
