//! # State Request Dispatcher
//!
//! Receiving side of the state request protocol. A transport frame comes in
//! as a command id plus header fields plus an opaque body; the dispatcher
//! decodes it, gates on the topology version the request was addressed to,
//! and routes to the provider by request kind.
//!
//! Every dispatched request runs inside a tracing span carrying the cache
//! name, kind, topology version, and a fresh correlation id. The span is
//! attached with `Instrument`, so it covers every exit path including
//! cancellation.

use crate::config::StateTransferConfig;
use crate::domain::errors::StateTransferError;
use crate::domain::invariants::invariant_request_shape;
use crate::domain::request::{RequestKind, StateRequest, StateResponse};
use crate::domain::wire;
use crate::ports::inbound::StateProvider;
use crate::topology::TopologyGuard;
use grid_types::{CacheName, NodeAddress, TopologyId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, Instrument};
use uuid::Uuid;

/// Dispatches decoded state requests to the provider.
#[derive(Clone)]
pub struct StateRequestDispatcher {
    provider: Arc<dyn StateProvider>,
    guard: Arc<TopologyGuard>,
    config: StateTransferConfig,
}

impl StateRequestDispatcher {
    /// Create a dispatcher in front of `provider`, gated by `guard`.
    pub fn new(
        provider: Arc<dyn StateProvider>,
        guard: Arc<TopologyGuard>,
        config: StateTransferConfig,
    ) -> Self {
        Self {
            provider,
            guard,
            config,
        }
    }

    /// Handle one raw transport frame addressed to this command family.
    ///
    /// `cache_name` and `topology_id` ride the transport header; `body` is
    /// the encoded request. Frames tagged with a foreign command id are
    /// rejected before the body is touched.
    pub async fn handle_frame(
        &self,
        command_id: u8,
        cache_name: CacheName,
        topology_id: TopologyId,
        body: &[u8],
    ) -> Result<StateResponse, StateTransferError> {
        if command_id != StateRequest::COMMAND_ID {
            return Err(StateTransferError::MalformedRequest(
                "frame does not carry a state request",
            ));
        }
        let request = wire::decode(cache_name, topology_id, body)?;
        self.dispatch(request).await
    }

    /// Dispatch one decoded request and resolve its typed response.
    pub async fn dispatch(
        &self,
        request: StateRequest,
    ) -> Result<StateResponse, StateTransferError> {
        let span = info_span!(
            "state_request",
            cache = %request.cache_name(),
            kind = ?request.kind(),
            topology_id = request.topology_id(),
            request_id = %Uuid::new_v4(),
        );
        self.dispatch_inner(request).instrument(span).await
    }

    async fn dispatch_inner(
        &self,
        request: StateRequest,
    ) -> Result<StateResponse, StateTransferError> {
        invariant_request_shape(&request)?;

        self.guard
            .await_topology(
                request.topology_id(),
                Duration::from_millis(self.config.await_topology_timeout_ms),
            )
            .await?;

        debug!("Dispatching state request");
        let response = match request.kind() {
            RequestKind::GetTransactions => StateResponse::Transactions(
                self.provider
                    .get_transactions(
                        require_origin(&request)?,
                        request.topology_id(),
                        request.segments(),
                    )
                    .await?,
            ),
            RequestKind::GetClusterListeners => {
                StateResponse::ClusterListeners(self.provider.get_cluster_listeners().await?)
            }
            RequestKind::StartOutboundTransfer => {
                self.provider
                    .start_outbound_transfer(
                        require_origin(&request)?,
                        request.topology_id(),
                        request.segments(),
                    )
                    .await?;
                StateResponse::None
            }
            RequestKind::CancelOutboundTransfer => {
                self.provider
                    .cancel_outbound_transfer(
                        require_origin(&request)?,
                        request.topology_id(),
                        request.segments(),
                    )
                    .await?;
                StateResponse::None
            }
        };
        Ok(response)
    }
}

fn require_origin(request: &StateRequest) -> Result<&NodeAddress, StateTransferError> {
    request
        .origin()
        .ok_or(StateTransferError::MalformedRequest(
            "origin missing for origin-bearing request",
        ))
}
