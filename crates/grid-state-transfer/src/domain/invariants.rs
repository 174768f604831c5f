//! # Domain Invariants
//!
//! Rules that must always hold for state transfer, written as checkable
//! functions. The dispatcher re-checks request shape on every dispatch; the
//! others back the topology tracker and the registry tests.

use crate::domain::errors::StateTransferError;
use crate::domain::request::{OutboundTransferKey, RequestKind, StateRequest};
use grid_types::TopologyId;
use std::collections::HashSet;

/// Invariant: a request's origin and segment set match its kind.
///
/// The three origin-bearing kinds carry an origin and a non-empty segment
/// set; the listener export carries neither. Smart constructors enforce
/// this at build time; this check catches values that bypassed them.
pub fn invariant_request_shape(request: &StateRequest) -> Result<(), StateTransferError> {
    match request.kind() {
        RequestKind::GetClusterListeners => {
            if request.origin().is_some() {
                return Err(StateTransferError::MalformedRequest(
                    "listener export must not carry an origin",
                ));
            }
            if !request.segments().is_empty() {
                return Err(StateTransferError::MalformedRequest(
                    "listener export must not carry segments",
                ));
            }
        }
        _ => {
            if request.origin().is_none() {
                return Err(StateTransferError::MalformedRequest(
                    "origin missing for origin-bearing kind",
                ));
            }
            if request.segments().is_empty() {
                return Err(StateTransferError::MalformedRequest(
                    "segment set must not be empty",
                ));
            }
        }
    }
    Ok(())
}

/// Invariant: at most one active transfer per key.
pub fn invariant_unique_transfer_keys(keys: &[OutboundTransferKey]) -> bool {
    let mut seen = HashSet::new();
    keys.iter().all(|key| seen.insert(key))
}

/// Invariant: published topology versions never regress.
pub fn invariant_monotonic_topology(current: TopologyId, next: TopologyId) -> bool {
    next >= current
}
