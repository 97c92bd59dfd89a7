//! The remote-call capability the resilience layer wraps

use std::future::Future;
use std::sync::Arc;

use ledgerlink_core::{LedgerRequest, LedgerResponse};
use serde::Serialize;
use thiserror::Error;

/// Failure reported by a remote capability, already classified
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// Expected to succeed if retried (throttling, timeouts, 5xx)
    #[error("transient: {0}")]
    Transient(String),

    /// Retrying will not help (bad request, revert, decode failure)
    #[error("{0}")]
    Permanent(String),
}

impl CallError {
    pub fn transient(message: impl Into<String>) -> Self {
        CallError::Transient(message.into())
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        CallError::Permanent(message.into())
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, CallError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            CallError::Transient(m) | CallError::Permanent(m) => m,
        }
    }
}

/// A connection to the ledger, supplied by whoever owns the network client
///
/// Implementations classify their own failures into [`CallError`]; they do
/// not retry, pace or cache. `call_batch` must return one result per request,
/// in request order.
pub trait RemoteCall: Send + Sync {
    type Request: Serialize + Clone + Send + Sync;
    type Response: Clone + Send + Sync;

    fn call(
        &self,
        request: &Self::Request,
    ) -> impl Future<Output = Result<Self::Response, CallError>> + Send;

    fn call_batch(
        &self,
        requests: &[Self::Request],
    ) -> impl Future<Output = Result<Vec<Result<Self::Response, CallError>>, CallError>> + Send;
}

impl<C: RemoteCall> RemoteCall for Arc<C> {
    type Request = C::Request;
    type Response = C::Response;

    fn call(
        &self,
        request: &Self::Request,
    ) -> impl Future<Output = Result<Self::Response, CallError>> + Send {
        (**self).call(request)
    }

    fn call_batch(
        &self,
        requests: &[Self::Request],
    ) -> impl Future<Output = Result<Vec<Result<Self::Response, CallError>>, CallError>> + Send {
        (**self).call_batch(requests)
    }
}

/// A [`RemoteCall`] that speaks the ledger request types
pub trait LedgerCall: RemoteCall<Request = LedgerRequest, Response = LedgerResponse> {}

impl<C> LedgerCall for C where C: RemoteCall<Request = LedgerRequest, Response = LedgerResponse> {}
