//! # State Transfer Flow Tests
//!
//! Full round trips through the public surface: a consuming node's request
//! is encoded, handed to the dispatcher as a raw transport frame, gated,
//! routed to the provider service, and observed at the mock collaborators.
//!
//! ## Flows Tested
//!
//! 1. **Join**: `StartOutboundTransfer` streams the requested segments in
//!    chunks to the requesting node, then the registry empties itself
//! 2. **Rebalance**: `CancelOutboundTransfer` stops exactly the named
//!    segments mid-stream
//! 3. **Handoff**: `GetTransactions` and `GetClusterListeners` return
//!    deterministic projections
//! 4. **Hostile input**: malformed frames are rejected before any side
//!    effect

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use grid_state_transfer::domain::wire;
    use grid_state_transfer::{
        MockListenerRegistry, MockSegmentStore, MockStateTransport, MockTransactionTable,
        OutboundTransferRegistry, StateProviderService, StateRequest, StateRequestDispatcher,
        StateResponse, StateTransferConfig, StateTransferError, TopologyGuard, TopologyTracker,
    };
    use grid_types::ids::segment_set;
    use grid_types::{
        CacheEntry, CacheName, ConsistencyPoint, GlobalTxId, ListenerFilter,
        ListenerInstallation, NodeAddress, SegmentSet, TopologyView, TransactionInfo, WriteOp,
    };
    use rand::seq::SliceRandom;
    use rand::Rng;
    use uuid::Uuid;

    // =========================================================================
    // TEST FIXTURES
    // =========================================================================

    fn cache() -> CacheName {
        CacheName::new("users")
    }

    fn origin() -> NodeAddress {
        NodeAddress::new("node-b")
    }

    fn view(topology_id: u64) -> TopologyView {
        TopologyView::new(
            topology_id,
            vec![NodeAddress::new("node-a"), origin()],
            segment_set([1, 3, 5, 7]),
        )
    }

    fn entries(n: usize) -> Vec<CacheEntry> {
        (0..n)
            .map(|i| CacheEntry::new(vec![i as u8], vec![0xEE]))
            .collect()
    }

    /// Entries per segment in the default store: 1 -> 5, 3 -> 10, 5 -> 2,
    /// 7 -> 2. At two entries per chunk that is 3, 5, 1, 1 chunks.
    fn default_store() -> MockSegmentStore {
        MockSegmentStore::with_entries(HashMap::from([
            (1, entries(5)),
            (3, entries(10)),
            (5, entries(2)),
            (7, entries(2)),
        ]))
    }

    /// One provider node wired end to end, at topology version 2.
    struct Cluster {
        dispatcher: StateRequestDispatcher,
        service: Arc<StateProviderService>,
        store: Arc<MockSegmentStore>,
        transport: Arc<MockStateTransport>,
        _tracker: TopologyTracker,
    }

    fn cluster_with(
        store: MockSegmentStore,
        table: MockTransactionTable,
        listeners: MockListenerRegistry,
    ) -> Cluster {
        let config = StateTransferConfig::for_testing();
        let store = Arc::new(store);
        let transport = Arc::new(MockStateTransport::new());
        let registry = Arc::new(OutboundTransferRegistry::new(
            store.clone(),
            transport.clone(),
            config.chunk_size,
        ));
        let service = Arc::new(StateProviderService::new(
            registry,
            Arc::new(table),
            Arc::new(listeners),
        ));
        let tracker = TopologyTracker::new(view(2));
        let guard = Arc::new(TopologyGuard::new(cache(), tracker.subscribe()));
        let dispatcher = StateRequestDispatcher::new(service.clone(), guard, config);
        Cluster {
            dispatcher,
            service,
            store,
            transport,
            _tracker: tracker,
        }
    }

    fn cluster() -> Cluster {
        cluster_with(
            default_store(),
            MockTransactionTable::new(ConsistencyPoint(0), Vec::new()),
            MockListenerRegistry::default(),
        )
    }

    /// Encode `request` and dispatch it the way the transport would.
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

    /// Let spawned streaming tasks run until they park or finish.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    fn tx(originator: &str, local_id: u64, segments: SegmentSet) -> TransactionInfo {
        TransactionInfo {
            tx_id: GlobalTxId {
                originator: NodeAddress::new(originator),
                local_id,
            },
            segments,
            locked_keys: vec![b"k".to_vec()],
            modifications: vec![WriteOp::Remove { key: b"k".to_vec() }],
        }
    }

    // =========================================================================
    // JOIN FLOW
    // =========================================================================

    #[tokio::test]
    async fn test_join_flow_streams_requested_segments() {
        let cluster = cluster();
        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segment_set([1, 5]))
                .unwrap();

        let response = send(&cluster, &request).await.unwrap();
        assert_eq!(response, StateResponse::None);
        settle().await;

        assert_eq!(cluster.transport.sent_for_segment(1), 3);
        assert_eq!(cluster.transport.sent_for_segment(5), 1);
        assert_eq!(cluster.transport.sent_for_segment(3), 0);
        assert_eq!(cluster.service.registry().active_count(), 0);

        for sent in cluster.transport.sent() {
            assert_eq!(sent.dest, origin());
            assert_eq!(sent.topology_id, 2);
        }
    }

    #[tokio::test]
    async fn test_join_flow_marks_only_the_final_chunk() {
        let cluster = cluster();
        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segment_set([1]))
                .unwrap();
        send(&cluster, &request).await.unwrap();
        settle().await;

        let markers: Vec<bool> = cluster
            .transport
            .sent()
            .iter()
            .filter(|s| s.chunk.segment == 1)
            .map(|s| s.chunk.last_chunk)
            .collect();
        assert_eq!(markers, vec![false, false, true]);
    }

    #[tokio::test]
    async fn test_retried_start_frame_does_not_double_stream() {
        let cluster = cluster_with(
            default_store().gated(),
            MockTransactionTable::new(ConsistencyPoint(0), Vec::new()),
            MockListenerRegistry::default(),
        );
        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segment_set([3]))
                .unwrap();

        send(&cluster, &request).await.unwrap();
        settle().await;
        send(&cluster, &request).await.unwrap();
        settle().await;

        cluster.store.release(3, 16);
        settle().await;

        assert_eq!(cluster.transport.sent_for_segment(3), 5);
        assert_eq!(cluster.store.streams_started(), vec![3]);
        assert_eq!(
            cluster
                .service
                .registry()
                .stats()
                .started
                .load(Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_random_join_retries_stream_each_segment_once() {
        let mut rng = rand::thread_rng();
        let all = [1u32, 3, 5, 7];
        let count = rng.gen_range(1..=all.len());
        let segments: SegmentSet = all.choose_multiple(&mut rng, count).copied().collect();
        let chunks_for = |segment: u32| match segment {
            1 => 3,
            3 => 5,
            5 => 1,
            7 => 1,
            _ => unreachable!(),
        };

        let cluster = cluster_with(
            default_store().gated(),
            MockTransactionTable::new(ConsistencyPoint(0), Vec::new()),
            MockListenerRegistry::default(),
        );
        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segments.clone())
                .unwrap();

        for _ in 0..3 {
            send(&cluster, &request).await.unwrap();
        }
        settle().await;
        for &segment in &segments {
            cluster.store.release(segment, 16);
        }
        settle().await;

        for &segment in &segments {
            assert_eq!(cluster.transport.sent_for_segment(segment), chunks_for(segment));
        }
        assert_eq!(
            cluster
                .service
                .registry()
                .stats()
                .started
                .load(Ordering::Relaxed),
            segments.len() as u64
        );
    }

    // =========================================================================
    // REBALANCE FLOW
    // =========================================================================

    #[tokio::test]
    async fn test_rebalance_cancels_only_the_named_segment() {
        let cluster = cluster_with(
            default_store().gated(),
            MockTransactionTable::new(ConsistencyPoint(0), Vec::new()),
            MockListenerRegistry::default(),
        );
        let start =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segment_set([3, 7]))
                .unwrap();
        send(&cluster, &start).await.unwrap();
        settle().await;

        let cancel =
            StateRequest::cancel_outbound_transfer(cache(), origin(), 2, segment_set([3]))
                .unwrap();
        assert!(!cancel.expects_return_value());
        let response = send(&cluster, &cancel).await.unwrap();
        assert_eq!(response, StateResponse::None);

        cluster.store.release(3, 16);
        cluster.store.release(7, 16);
        settle().await;

        assert_eq!(cluster.transport.sent_for_segment(3), 0);
        assert_eq!(cluster.transport.sent_for_segment(7), 1);
        assert_eq!(cluster.service.registry().active_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_is_silent() {
        let cluster = cluster();
        let start =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segment_set([5]))
                .unwrap();
        send(&cluster, &start).await.unwrap();
        settle().await;
        assert_eq!(cluster.service.registry().active_count(), 0);

        let cancel =
            StateRequest::cancel_outbound_transfer(cache(), origin(), 2, segment_set([5]))
                .unwrap();
        let response = send(&cluster, &cancel).await.unwrap();
        assert_eq!(response, StateResponse::None);
    }

    // =========================================================================
    // TRANSACTION AND LISTENER HANDOFF
    // =========================================================================

    #[tokio::test]
    async fn test_joining_node_receives_overlapping_transactions_in_order() {
        let table = MockTransactionTable::new(
            ConsistencyPoint(17),
            vec![
                tx("node-c", 9, segment_set([1])),
                tx("node-a", 4, segment_set([1, 5])),
                tx("node-a", 1, segment_set([8])),
            ],
        );
        let cluster = cluster_with(default_store(), table, MockListenerRegistry::default());

        let request =
            StateRequest::get_transactions(cache(), origin(), 2, segment_set([1, 2])).unwrap();
        let response = send(&cluster, &request).await.unwrap();

        match response {
            StateResponse::Transactions(transactions) => {
                let ids: Vec<(String, u64)> = transactions
                    .iter()
                    .map(|t| (t.tx_id.originator.to_string(), t.tx_id.local_id))
                    .collect();
                assert_eq!(
                    ids,
                    vec![
                        ("node-a".to_string(), 4),
                        ("node-c".to_string(), 9),
                    ]
                );
            }
            other => panic!("expected transactions, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_joining_node_receives_listeners_ordered_by_id() {
        let listeners = MockListenerRegistry::with_installations(vec![
            ListenerInstallation {
                listener_id: Uuid::from_u128(9),
                owner: NodeAddress::new("node-c"),
                filter: ListenerFilter::AllKeys,
            },
            ListenerInstallation {
                listener_id: Uuid::from_u128(2),
                owner: NodeAddress::new("node-a"),
                filter: ListenerFilter::KeyPrefix(b"user:".to_vec()),
            },
        ]);
        let cluster = cluster_with(
            default_store(),
            MockTransactionTable::new(ConsistencyPoint(0), Vec::new()),
            listeners,
        );

        let request = StateRequest::get_cluster_listeners(cache(), 2);
        let response = send(&cluster, &request).await.unwrap();

        match response {
            StateResponse::ClusterListeners(installations) => {
                let ids: Vec<Uuid> =
                    installations.iter().map(|i| i.listener_id).collect();
                assert_eq!(ids, vec![Uuid::from_u128(2), Uuid::from_u128(9)]);
            }
            other => panic!("expected listeners, got {other:?}"),
        }
    }

    // =========================================================================
    // HOSTILE INPUT
    // =========================================================================

    #[tokio::test]
    async fn test_unknown_kind_is_rejected_without_side_effects() {
        let cluster = cluster();
        let result = cluster
            .dispatcher
            .handle_frame(StateRequest::COMMAND_ID, cache(), 2, &[9])
            .await;

        assert!(matches!(
            result,
            Err(StateTransferError::UnknownRequestKind(9))
        ));
        assert_eq!(cluster.service.registry().active_count(), 0);
        assert!(cluster.transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_segments_are_rejected_without_side_effects() {
        let cluster = cluster();
        // StartOutboundTransfer for "node-b" with segment 3 listed twice.
        let mut body = vec![2u8];
        body.extend_from_slice(&6u32.to_be_bytes());
        body.extend_from_slice(b"node-b");
        body.extend_from_slice(&2u32.to_be_bytes());
        body.extend_from_slice(&3u32.to_be_bytes());
        body.extend_from_slice(&3u32.to_be_bytes());

        let result = cluster
            .dispatcher
            .handle_frame(StateRequest::COMMAND_ID, cache(), 2, &body)
            .await;

        assert!(matches!(
            result,
            Err(StateTransferError::MalformedRequest(_))
        ));
        assert_eq!(cluster.service.registry().active_count(), 0);
    }

    #[tokio::test]
    async fn test_trailing_bytes_are_rejected() {
        let cluster = cluster();
        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segment_set([1]))
                .unwrap();
        let mut body = wire::encode(&request);
        body.push(0xFF);

        let result = cluster
            .dispatcher
            .handle_frame(StateRequest::COMMAND_ID, cache(), 2, &body)
            .await;

        assert!(matches!(
            result,
            Err(StateTransferError::MalformedRequest(_))
        ));
        assert_eq!(cluster.service.registry().active_count(), 0);
    }

    #[tokio::test]
    async fn test_foreign_command_id_is_rejected_before_decoding() {
        let cluster = cluster();
        let request =
            StateRequest::start_outbound_transfer(cache(), origin(), 2, segment_set([1]))
                .unwrap();

        let result = cluster
            .dispatcher
            .handle_frame(StateRequest::COMMAND_ID + 1, cache(), 2, &wire::encode(&request))
            .await;

        assert!(matches!(
            result,
            Err(StateTransferError::MalformedRequest(_))
        ));
        assert_eq!(cluster.service.registry().active_count(), 0);
    }
}
