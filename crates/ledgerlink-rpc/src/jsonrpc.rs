//! [`RemoteCall`] over Ethereum JSON-RPC
//!
//! Reads become `eth_call`s against the per-class contract at the latest
//! block; writes become `eth_sendRawTransaction`. Batches use native
//! JSON-RPC batching, one HTTP round trip per batch.

use std::collections::HashMap;
use std::future::Future;

use alloy_json_rpc::RpcError;
use alloy_primitives::{Address, Bytes, B256};
use alloy_rpc_client::{ClientBuilder, RpcClient, Waiter};
use alloy_rpc_types::BlockNumberOrTag;
use alloy_transport::{TransportError, TransportErrorKind};
use ledgerlink_core::{parse_address, ClassConfig, EntityClass, LedgerRequest, LedgerResponse};
use serde_json::{json, Value};
use tracing::info;

use crate::{abi, CallError, RemoteCall};

type CallParams = (Value, BlockNumberOrTag);

/// Ledger client backed by an alloy JSON-RPC client
pub struct JsonRpcLedger {
    client: RpcClient,
    contracts: HashMap<EntityClass, Address>,
}

impl JsonRpcLedger {
    pub async fn connect(rpc_url: &str, classes: &[ClassConfig]) -> anyhow::Result<Self> {
        let client = ClientBuilder::default().connect(rpc_url).await?;
        let ledger = Self::new(client, classes)?;
        info!(rpc_url, classes = classes.len(), "Connected to ledger");
        Ok(ledger)
    }

    pub fn new(client: RpcClient, classes: &[ClassConfig]) -> ledgerlink_core::Result<Self> {
        let contracts = classes
            .iter()
            .map(|c| Ok((c.class, Address::from(parse_address(&c.contract)?))))
            .collect::<ledgerlink_core::Result<HashMap<_, _>>>()?;
        Ok(Self { client, contracts })
    }

    pub fn contract(&self, class: EntityClass) -> Option<Address> {
        self.contracts.get(&class).copied()
    }

    fn call_params(&self, request: &LedgerRequest) -> Result<CallParams, CallError> {
        let class = match request {
            LedgerRequest::Entity { class, .. } | LedgerRequest::EntityCount { class } => *class,
            LedgerRequest::SendRawTransaction { .. } => {
                return Err(CallError::permanent("transactions are not contract calls"))
            }
        };
        let contract = self
            .contract(class)
            .ok_or_else(|| CallError::permanent(format!("no contract configured for {}", class)))?;
        let data = abi::encode_call(request)
            .ok_or_else(|| CallError::permanent("request has no calldata"))?;

        Ok((json!({ "to": contract, "data": data }), BlockNumberOrTag::Latest))
    }

    async fn send_raw_transaction(&self, raw: &str) -> Result<LedgerResponse, CallError> {
        let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
            .map_err(|e| CallError::permanent(format!("invalid raw transaction: {}", e)))?;
        let hash: B256 = self
            .client
            .request("eth_sendRawTransaction", (Bytes::from(bytes),))
            .await
            .map_err(|e| classify(&e))?;
        Ok(LedgerResponse::TxHash(hash.to_string()))
    }
}

/// Turn an `eth_call` outcome into a response for `request`
fn interpret(
    request: &LedgerRequest,
    outcome: Result<Bytes, TransportError>,
) -> Result<LedgerResponse, CallError> {
    match (request, outcome) {
        (LedgerRequest::Entity { class, .. }, Ok(data)) => abi::decode_entity(*class, &data)
            .map(LedgerResponse::Entity)
            .map_err(|e| CallError::permanent(e.to_string())),
        // Getters revert for ids past the end on some deployments
        (LedgerRequest::Entity { .. }, Err(err)) if is_revert(&err) => {
            Ok(LedgerResponse::Entity(None))
        }
        (LedgerRequest::EntityCount { .. }, Ok(data)) => abi::decode_count(&data)
            .map(LedgerResponse::Count)
            .map_err(|e| CallError::permanent(e.to_string())),
        (_, Err(err)) => Err(classify(&err)),
        (LedgerRequest::SendRawTransaction { .. }, Ok(_)) => {
            Err(CallError::permanent("unexpected eth_call result for a transaction"))
        }
    }
}

fn is_revert(err: &TransportError) -> bool {
    match err {
        RpcError::ErrorResp(payload) => payload.message.contains("execution reverted"),
        _ => false,
    }
}

/// Sort a transport failure into retryable or not
pub(crate) fn classify(err: &TransportError) -> CallError {
    let message = err.to_string();
    match err {
        RpcError::ErrorResp(payload) => {
            let lower = payload.message.to_lowercase();
            if payload.code == 429
                || payload.code == -32005
                || lower.contains("rate limit")
                || lower.contains("too many requests")
            {
                CallError::transient(message)
            } else {
                CallError::permanent(message)
            }
        }
        RpcError::Transport(TransportErrorKind::HttpError(http)) => {
            if http.status == 429 || http.status >= 500 {
                CallError::transient(message)
            } else {
                CallError::permanent(message)
            }
        }
        // Connection resets, timeouts, missing batch entries
        RpcError::Transport(_) | RpcError::NullResp => CallError::transient(message),
        _ => CallError::permanent(message),
    }
}

impl RemoteCall for JsonRpcLedger {
    type Request = LedgerRequest;
    type Response = LedgerResponse;

    fn call(
        &self,
        request: &LedgerRequest,
    ) -> impl Future<Output = Result<LedgerResponse, CallError>> + Send {
        async move {
            if let LedgerRequest::SendRawTransaction { raw } = request {
                return self.send_raw_transaction(raw).await;
            }

            let params = self.call_params(request)?;
            let outcome: Result<Bytes, TransportError> =
                self.client.request("eth_call", params).await;
            interpret(request, outcome)
        }
    }

    fn call_batch(
        &self,
        requests: &[LedgerRequest],
    ) -> impl Future<Output = Result<Vec<Result<LedgerResponse, CallError>>, CallError>> + Send
    {
        async move {
            let mut batch = self.client.new_batch();
            let mut waiters: Vec<Result<Waiter<Bytes>, CallError>> =
                Vec::with_capacity(requests.len());

            for request in requests {
                let waiter = match self.call_params(request) {
                    Ok(params) => batch
                        .add_call::<_, Bytes>("eth_call", &params)
                        .map_err(|e| CallError::permanent(e.to_string())),
                    Err(err) => Err(err),
                };
                waiters.push(waiter);
            }

            if waiters.iter().any(|w| w.is_ok()) {
                batch.send().await.map_err(|e| classify(&e))?;
            }

            let mut results = Vec::with_capacity(requests.len());
            for (request, waiter) in requests.iter().zip(waiters) {
                results.push(match waiter {
                    Ok(waiter) => interpret(request, waiter.await),
                    Err(err) => Err(err),
                });
            }
            Ok(results)
        }
    }
}
