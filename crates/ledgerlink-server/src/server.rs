//! Lookup server: router, middleware and listener

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::Method;
use axum::Router;
use ledgerlink_client::OnChainQueryFacade;
use ledgerlink_rpc::LedgerCall;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};

use crate::error::{Result, ServerError};
use crate::routes::create_router;
use crate::state::{AppState, SharedState, DEFAULT_MAX_BATCH_IDS};

/// Default cap on HTTP requests handled at once
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 256;

pub struct LedgerLinkServer<C: LedgerCall> {
    state: SharedState<C>,
    addr: SocketAddr,
    max_concurrent_requests: usize,
}

impl<C: LedgerCall + 'static> LedgerLinkServer<C> {
    /// Router with CORS and the request concurrency limit applied
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(Any);

        create_router(self.state.clone())
            .layer(cors)
            .layer(GlobalConcurrencyLimitLayer::new(self.max_concurrent_requests))
    }

    /// Bind the configured address and serve until the process stops
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = self.router();
        tracing::info!(addr = %listener.local_addr()?, "Starting ledgerlink server");

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the server state for testing
    pub fn state(&self) -> SharedState<C> {
        self.state.clone()
    }
}

/// Builder for LedgerLinkServer
pub struct ServerBuilder<C: LedgerCall> {
    facade: OnChainQueryFacade<C>,
    addr: SocketAddr,
    prometheus: Option<PrometheusHandle>,
    max_batch_ids: usize,
    max_concurrent_requests: usize,
}

impl<C: LedgerCall + 'static> ServerBuilder<C> {
    pub fn new(facade: OnChainQueryFacade<C>) -> Self {
        Self {
            facade,
            addr: ([127, 0, 0, 1], 3000).into(),
            prometheus: None,
            max_batch_ids: DEFAULT_MAX_BATCH_IDS,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    pub fn addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.addr = ([0, 0, 0, 0], port).into();
        self
    }

    /// Serve `/metrics` from this recorder
    pub fn prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    pub fn max_batch_ids(mut self, max: usize) -> Self {
        self.max_batch_ids = max;
        self
    }

    pub fn max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    pub fn build(self) -> Result<LedgerLinkServer<C>> {
        if self.max_batch_ids == 0 || self.max_concurrent_requests == 0 {
            return Err(ServerError::Internal(
                "max_batch_ids and max_concurrent_requests must be at least 1".into(),
            ));
        }

        let mut state = AppState::new(self.facade);
        state.prometheus = self.prometheus;
        state.max_batch_ids = self.max_batch_ids;

        Ok(LedgerLinkServer {
            state: Arc::new(state),
            addr: self.addr,
            max_concurrent_requests: self.max_concurrent_requests,
        })
    }
}
