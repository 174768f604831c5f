//! # Domain Services
//!
//! Pure projection and survival logic used by the provider. No I/O, no
//! shared state; every function here is deterministic on its inputs.

use crate::domain::request::OutboundTransferKey;
use grid_types::{ListenerInstallation, SegmentSet, TopologyView, TransactionInfo};

/// Filter a transaction snapshot down to the transactions touching at least
/// one of the requested segments, ordered by transaction id.
///
/// The transaction table may hand back a superset; this is the authoritative
/// segment filter.
pub fn project_transactions(
    snapshot: Vec<TransactionInfo>,
    segments: &SegmentSet,
) -> Vec<TransactionInfo> {
    let mut hits: Vec<TransactionInfo> = snapshot
        .into_iter()
        .filter(|tx| tx.touches_any(segments))
        .collect();
    hits.sort_by(|a, b| a.tx_id.cmp(&b.tx_id));
    hits
}

/// Order exported listener installations by listener id.
pub fn order_installations(
    mut installations: Vec<ListenerInstallation>,
) -> Vec<ListenerInstallation> {
    installations.sort_by(|a, b| a.listener_id.cmp(&b.listener_id));
    installations
}

/// Whether the transfer identified by `key` survives under `view`.
///
/// A transfer dies when its origin left the cluster, or when the topology
/// moved past it and the local node no longer owns the segment. A transfer
/// at the view's own version always survives: the requester is still
/// entitled to it.
pub fn transfer_survives(key: &OutboundTransferKey, view: &TopologyView) -> bool {
    if !view.is_member(&key.origin) {
        return false;
    }
    if key.topology_id < view.topology_id && !view.owns_segment(key.segment) {
        return false;
    }
    true
}
