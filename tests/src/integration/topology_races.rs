//! # Topology Race Tests
//!
//! Requests and transfers racing topology changes: a request addressed to a
//! topology version the local node has not seen yet, the guard timing out or
//! fast-failing on cache stop, and active transfers invalidated by newly
//! published views.

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use grid_state_transfer::domain::wire;
    use grid_state_transfer::{
        topology_monitor, MockListenerRegistry, MockSegmentStore, MockStateTransport,
        MockTransactionTable, OutboundTransferRegistry, StateProviderService, StateRequest,
        StateRequestDispatcher, StateResponse, StateTransferConfig, StateTransferError,
        TopologyGuard, TopologyTracker,
    };
    use grid_types::ids::segment_set;
    use grid_types::{
        CacheEntry, CacheName, ConsistencyPoint, NodeAddress, SegmentSet, TopologyView,
    };

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn cache() -> CacheName {
        CacheName::new("users")
    }

    fn origin() -> NodeAddress {
        NodeAddress::new("node-b")
    }

    fn view_with(
        topology_id: u64,
        members: Vec<NodeAddress>,
        local_segments: SegmentSet,
    ) -> TopologyView {
        TopologyView::new(topology_id, members, local_segments)
    }

    fn view(topology_id: u64) -> TopologyView {
        view_with(
            topology_id,
            vec![NodeAddress::new("node-a"), origin()],
            segment_set([3, 7]),
        )
    }

    fn entries(n: usize) -> Vec<CacheEntry> {
        (0..n)
            .map(|i| CacheEntry::new(vec![i as u8], vec![0xAB]))
            .collect()
    }

    /// One provider node at topology version 2, with a gated store so active
    /// transfers stay parked until a test releases them.
    struct Cluster {
        dispatcher: StateRequestDispatcher,
        tracker: TopologyTracker,
        guard: Arc<TopologyGuard>,
        service: Arc<StateProviderService>,
        store: Arc<MockSegmentStore>,
        transport: Arc<MockStateTransport>,
    }

    fn cluster() -> Cluster {
        let config = StateTransferConfig::for_testing();
        let store = Arc::new(
            MockSegmentStore::with_entries(HashMap::from([
                (3, entries(10)),
                (7, entries(2)),
            ]))
            .gated(),
        );
        let transport = Arc::new(MockStateTransport::new());
        let registry = Arc::new(OutboundTransferRegistry::new(
            store.clone(),
            transport.clone(),
            config.chunk_size,
        ));
        let service = Arc::new(StateProviderService::new(
            registry,
            Arc::new(MockTransactionTable::new(ConsistencyPoint(0), Vec::new())),
            Arc::new(MockListenerRegistry::default()),
        ));
        let tracker = TopologyTracker::new(view(2));
        let guard = Arc::new(TopologyGuard::new(cache(), tracker.subscribe()));
        let dispatcher = StateRequestDispatcher::new(service.clone(), guard.clone(), config);
        Cluster {
            dispatcher,
            tracker,
            guard,
            service,
            store,
            transport,
        }
    }

    async fn send(
        cluster: &Cluster,
        request: &StateRequest,
    ) -> Result<StateResponse, StateTransferError> {
        cluster
            .dispatcher
            .handle_frame(
                StateRequest::COMMAND_ID,
                request.cache_name().clone(),
                request.topology_id(),
                &wire::encode(request),
            )
            .await
    }

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    // =========================================================================
    // GUARD RACES
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_request_for_future_topology_waits_for_publish() {
        let cluster = cluster();
        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 3, segment_set([3]))
                .unwrap();

        let handle = tokio::spawn({
            let dispatcher = cluster.dispatcher.clone();
            let request = request.clone();
            async move {
                dispatcher
                    .handle_frame(
                        StateRequest::COMMAND_ID,
                        request.cache_name().clone(),
                        request.topology_id(),
                        &wire::encode(&request),
                    )
                    .await
            }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());
        assert_eq!(cluster.service.registry().active_count(), 0);

        cluster.tracker.publish(view(3));
        let response = handle.await.unwrap().unwrap();
        assert_eq!(response, StateResponse::None);
        settle().await;
        assert_eq!(cluster.service.registry().active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out_when_topology_never_arrives() {
        let cluster = cluster();
        let request =
            StateRequest::get_transactions(cache(), origin(), 9, segment_set([3])).unwrap();

        let result = send(&cluster, &request).await;

        match result {
            Err(StateTransferError::TopologyTimeout {
                needed,
                local,
                waited,
            }) => {
                assert_eq!(needed, 9);
                assert_eq!(local, 2);
                assert_eq!(waited, Duration::from_millis(200));
            }
            other => panic!("expected topology timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_fails_pending_requests_fast() {
        let cluster = cluster();
        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 5, segment_set([3]))
                .unwrap();

        let handle = tokio::spawn({
            let dispatcher = cluster.dispatcher.clone();
            async move { dispatcher.dispatch(request).await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());

        cluster.guard.stop();
        let result = handle.await.unwrap();
        assert!(matches!(
            result,
            Err(StateTransferError::CacheStopping(name)) if name.as_str() == "users"
        ));
        assert_eq!(cluster.service.registry().active_count(), 0);
    }

    #[tokio::test]
    async fn test_stopped_cache_rejects_new_requests_immediately() {
        let cluster = cluster();
        cluster.guard.stop();

        let request =
            StateRequest::get_transactions(cache(), origin(), 2, segment_set([3])).unwrap();
        let result = send(&cluster, &request).await;

        assert!(matches!(
            result,
            Err(StateTransferError::CacheStopping(_))
        ));
    }

    // =========================================================================
    // TRANSFER INVALIDATION
    // =========================================================================

    #[tokio::test]
    async fn test_topology_advance_invalidates_transfer_for_moved_segment() {
        let cluster = cluster();
        tokio::spawn(topology_monitor(
            cluster.service.registry().clone(),
            cluster.tracker.subscribe(),
        ));
        settle().await;

        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segment_set([3]))
                .unwrap();
        send(&cluster, &request).await.unwrap();
        settle().await;
        assert_eq!(cluster.service.registry().active_count(), 1);

        // Segment 3 leaves local ownership at version 3.
        cluster.tracker.publish(view_with(
            3,
            vec![NodeAddress::new("node-a"), origin()],
            segment_set([7]),
        ));
        settle().await;

        assert_eq!(cluster.service.registry().active_count(), 0);
        assert_eq!(
            cluster
                .service
                .registry()
                .stats()
                .invalidated
                .load(Ordering::Relaxed),
            1
        );

        // The aborted stream must deliver nothing once released.
        cluster.store.release(3, 16);
        settle().await;
        assert_eq!(cluster.transport.sent_for_segment(3), 0);
    }

    #[tokio::test]
    async fn test_member_departure_invalidates_all_its_transfers() {
        let cluster = cluster();
        tokio::spawn(topology_monitor(
            cluster.service.registry().clone(),
            cluster.tracker.subscribe(),
        ));
        settle().await;

        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segment_set([3, 7]))
                .unwrap();
        send(&cluster, &request).await.unwrap();
        settle().await;
        assert_eq!(cluster.service.registry().active_count(), 2);

        // The requester leaves; local ownership is unchanged.
        cluster
            .tracker
            .publish(view_with(3, vec![NodeAddress::new("node-a")], segment_set([3, 7])));
        settle().await;

        assert_eq!(cluster.service.registry().active_count(), 0);
        assert_eq!(
            cluster
                .service
                .registry()
                .stats()
                .invalidated
                .load(Ordering::Relaxed),
            2
        );
    }

    #[tokio::test]
    async fn test_republished_view_keeps_current_transfers() {
        let cluster = cluster();
        tokio::spawn(topology_monitor(
            cluster.service.registry().clone(),
            cluster.tracker.subscribe(),
        ));
        settle().await;

        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segment_set([3]))
                .unwrap();
        send(&cluster, &request).await.unwrap();
        settle().await;

        // Same version published again, even with different local segments:
        // entries at the view's own version always survive.
        cluster.tracker.publish(view_with(
            2,
            vec![NodeAddress::new("node-a"), origin()],
            segment_set([7]),
        ));
        settle().await;

        assert_eq!(cluster.service.registry().active_count(), 1);
        assert_eq!(
            cluster
                .service
                .registry()
                .stats()
                .invalidated
                .load(Ordering::Relaxed),
            0
        );
    }
}
