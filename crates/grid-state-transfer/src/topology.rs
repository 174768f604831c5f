//! # Topology Tracking and Gating
//!
//! The tracker is the single publication point for the local node's topology
//! view; the membership subsystem pushes views in, everything else reads
//! through watch receivers. The guard suspends state transfer work until the
//! local view has caught up with the version a request was issued under.

use crate::domain::errors::StateTransferError;
use crate::domain::invariants::invariant_monotonic_topology;
use grid_types::{CacheName, TopologyId, TopologyView};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Single-writer publisher of the local topology view.
pub struct TopologyTracker {
    sender: watch::Sender<TopologyView>,
}

impl TopologyTracker {
    /// Create a tracker seeded with `initial`.
    pub fn new(initial: TopologyView) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// Publish a new view. A view whose version regresses is dropped.
    pub fn publish(&self, view: TopologyView) {
        let current = self.sender.borrow().topology_id;
        if !invariant_monotonic_topology(current, view.topology_id) {
            warn!(
                current,
                regressed = view.topology_id,
                "Dropping topology view with regressing version"
            );
            return;
        }
        debug!(
            topology_id = view.topology_id,
            members = view.members.len(),
            local_segments = view.local_segments.len(),
            "Publishing topology view"
        );
        self.sender.send_replace(view);
    }

    /// Subscribe to view changes.
    pub fn subscribe(&self) -> watch::Receiver<TopologyView> {
        self.sender.subscribe()
    }

    /// Snapshot of the current view.
    pub fn current(&self) -> TopologyView {
        self.sender.borrow().clone()
    }
}

/// Gate that holds state transfer work until the local topology view is
/// recent enough to answer safely.
///
/// Dropping the tracker, or calling [`TopologyGuard::stop`], fails current
/// and future waiters fast with `CacheStopping` instead of letting them wait
/// out their timeout.
pub struct TopologyGuard {
    cache_name: CacheName,
    views: watch::Receiver<TopologyView>,
    stop: watch::Sender<bool>,
    stopping: watch::Receiver<bool>,
}

impl TopologyGuard {
    /// Create a guard for `cache_name` reading views from `views`.
    pub fn new(cache_name: CacheName, views: watch::Receiver<TopologyView>) -> Self {
        let (stop, stopping) = watch::channel(false);
        Self {
            cache_name,
            views,
            stop,
            stopping,
        }
    }

    /// Cache this guard gates.
    pub fn cache_name(&self) -> &CacheName {
        &self.cache_name
    }

    /// Current local topology version.
    pub fn local_topology_id(&self) -> TopologyId {
        self.views.borrow().topology_id
    }

    /// Whether [`TopologyGuard::stop`] has been called.
    pub fn is_stopping(&self) -> bool {
        *self.stopping.borrow()
    }

    /// Signal that the cache is stopping. Idempotent.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Suspend until the local topology version reaches `min_topology_id`.
    ///
    /// Returns immediately when the version is already high enough. Gives up
    /// with `TopologyTimeout` after `timeout`, and with `CacheStopping` as
    /// soon as the cache stops, whichever comes first.
    pub async fn await_topology(
        &self,
        min_topology_id: TopologyId,
        timeout: Duration,
    ) -> Result<(), StateTransferError> {
        let mut views = self.views.clone();
        let mut stopping = self.stopping.clone();

        if *stopping.borrow_and_update() {
            return Err(StateTransferError::CacheStopping(self.cache_name.clone()));
        }

        let local = views.borrow_and_update().topology_id;
        if local >= min_topology_id {
            return Ok(());
        }

        debug!(
            cache = %self.cache_name,
            needed = min_topology_id,
            local,
            "Waiting for topology to catch up"
        );

        let wait = async {
            loop {
                tokio::select! {
                    changed = views.changed() => {
                        if changed.is_err() {
                            // Tracker dropped: the cache is going away.
                            return Err(StateTransferError::CacheStopping(self.cache_name.clone()));
                        }
                        let current = views.borrow_and_update().topology_id;
                        if current >= min_topology_id {
                            return Ok(());
                        }
                    }
                    changed = stopping.changed() => {
                        if changed.is_err() || *stopping.borrow_and_update() {
                            return Err(StateTransferError::CacheStopping(self.cache_name.clone()));
                        }
                    }
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(StateTransferError::TopologyTimeout {
                needed: min_topology_id,
                local: self.views.borrow().topology_id,
                waited: timeout,
            }),
        }
    }
}
