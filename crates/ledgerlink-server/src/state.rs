//! State shared by every request handler

use std::sync::Arc;

use ledgerlink_client::OnChainQueryFacade;
use ledgerlink_rpc::LedgerCall;
use metrics_exporter_prometheus::PrometheusHandle;

/// Upper bound on ids accepted by one batch request
pub const DEFAULT_MAX_BATCH_IDS: usize = 100;

/// Upper bound on `limit` for the recent listing
pub const MAX_RECENT_LIMIT: usize = 100;

pub struct AppState<C: LedgerCall> {
    pub facade: OnChainQueryFacade<C>,
    /// Present when the process installed a Prometheus recorder
    pub prometheus: Option<PrometheusHandle>,
    pub max_batch_ids: usize,
}

pub type SharedState<C> = Arc<AppState<C>>;

impl<C: LedgerCall> AppState<C> {
    pub fn new(facade: OnChainQueryFacade<C>) -> Self {
        Self {
            facade,
            prometheus: None,
            max_batch_ids: DEFAULT_MAX_BATCH_IDS,
        }
    }
}
