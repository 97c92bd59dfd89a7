//! HTTP routes for the lookup API
//!
//! Only public ids cross this boundary; internal ids never appear in a
//! response body.

use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use ledgerlink_core::{Entity, EntityClass};
use ledgerlink_rpc::LedgerCall;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServerError};
use crate::metrics::{self, ROUTE_BATCH, ROUTE_ENTITY, ROUTE_RECENT};
use crate::state::{SharedState, MAX_RECENT_LIMIT};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub classes: Vec<EntityClass>,
    pub in_flight: usize,
}

/// One entity with its public id
#[derive(Debug, Serialize, Deserialize)]
pub struct EntityResponse {
    pub id: String,
    pub entity: Entity,
}

#[derive(Deserialize)]
pub struct BatchRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchItem {
    Found { id: String, entity: Entity },
    NotFound { id: String },
    Error { id: String, error: String },
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
}

#[derive(Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentResponse {
    pub class: EntityClass,
    pub items: Vec<EntityResponse>,
}

async fn health<C: LedgerCall + 'static>(State(state): State<SharedState<C>>) -> Json<HealthResponse> {
    let mut classes: Vec<EntityClass> = state.facade.classes().collect();
    classes.sort_by_key(|c| c.as_str());

    Json(HealthResponse {
        status: "ok".to_string(),
        classes,
        in_flight: state.facade.ledger().in_flight(),
    })
}

async fn prometheus<C: LedgerCall + 'static>(State(state): State<SharedState<C>>) -> Response {
    match &state.prometheus {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

fn parse_class(s: &str) -> Result<EntityClass> {
    s.parse()
        .map_err(|_| ServerError::InvalidRequest(format!("unknown entity class: {}", s)))
}

fn outcome<T>(result: &Result<T>) -> &'static str {
    match result {
        Ok(_) => metrics::OUTCOME_FOUND,
        Err(ServerError::NotFound(_)) => metrics::OUTCOME_NOT_FOUND,
        Err(ServerError::InvalidRequest(_)) => metrics::OUTCOME_CLIENT_ERROR,
        Err(ServerError::Upstream(_)) => metrics::OUTCOME_UPSTREAM_ERROR,
        Err(_) => metrics::OUTCOME_SERVER_ERROR,
    }
}

async fn get_entity<C: LedgerCall + 'static>(
    State(state): State<SharedState<C>>,
    Path((class, id)): Path<(String, String)>,
) -> Result<Json<EntityResponse>> {
    let start = Instant::now();
    let result = lookup_entity(&state, &class, id).await;
    metrics::record_http_request(ROUTE_ENTITY, outcome(&result), start.elapsed());
    result.map(Json)
}

async fn lookup_entity<C: LedgerCall + 'static>(
    state: &SharedState<C>,
    class: &str,
    id: String,
) -> Result<EntityResponse> {
    let class = parse_class(class)?;
    match state.facade.get_by_id(class, &id).await? {
        Some(entity) => Ok(EntityResponse { id, entity }),
        None => Err(ServerError::NotFound(format!("no {} with id {}", class, id))),
    }
}

async fn get_batch<C: LedgerCall + 'static>(
    State(state): State<SharedState<C>>,
    Path(class): Path<String>,
    Json(request): Json<BatchRequest>,
) -> Result<Json<BatchResponse>> {
    let start = Instant::now();
    let result = lookup_batch(&state, &class, request.ids).await;
    metrics::record_http_request(ROUTE_BATCH, outcome(&result), start.elapsed());
    result.map(Json)
}

async fn lookup_batch<C: LedgerCall + 'static>(
    state: &SharedState<C>,
    class: &str,
    ids: Vec<String>,
) -> Result<BatchResponse> {
    let class = parse_class(class)?;
    state.facade.codec(class)?;
    if ids.len() > state.max_batch_ids {
        return Err(ServerError::InvalidRequest(format!(
            "at most {} ids per batch, got {}",
            state.max_batch_ids,
            ids.len()
        )));
    }

    let lookups = state.facade.get_many(class, &ids).await;
    let results: Vec<BatchItem> = ids
        .into_iter()
        .zip(lookups)
        .map(|(id, lookup)| match lookup {
            Ok(Some(entity)) => BatchItem::Found { id, entity },
            Ok(None) => BatchItem::NotFound { id },
            Err(e) => BatchItem::Error {
                id,
                error: e.to_string(),
            },
        })
        .collect();

    let found = results.iter().filter(|r| matches!(r, BatchItem::Found { .. })).count();
    let not_found = results.iter().filter(|r| matches!(r, BatchItem::NotFound { .. })).count();
    metrics::record_batch_items(found, not_found, results.len() - found - not_found);

    Ok(BatchResponse { results })
}

async fn get_recent<C: LedgerCall + 'static>(
    State(state): State<SharedState<C>>,
    Path(class): Path<String>,
    Query(params): Query<RecentParams>,
) -> Result<Json<RecentResponse>> {
    let start = Instant::now();
    let result = lookup_recent(&state, &class, params.limit.unwrap_or(10)).await;
    metrics::record_http_request(ROUTE_RECENT, outcome(&result), start.elapsed());
    result.map(Json)
}

async fn lookup_recent<C: LedgerCall + 'static>(
    state: &SharedState<C>,
    class: &str,
    limit: usize,
) -> Result<RecentResponse> {
    let class = parse_class(class)?;
    let items = state
        .facade
        .list_recent(class, limit.min(MAX_RECENT_LIMIT))
        .await?
        .into_iter()
        .map(|(id, entity)| EntityResponse {
            id: id.into_string(),
            entity,
        })
        .collect();
    Ok(RecentResponse { class, items })
}

/// Create the router with all endpoints
pub fn create_router<C: LedgerCall + 'static>(state: SharedState<C>) -> Router {
    Router::new()
        .route("/health", get(health::<C>))
        .route("/metrics", get(prometheus::<C>))
        .route("/v1/{class}/id/{id}", get(get_entity::<C>))
        .route("/v1/{class}/batch", post(get_batch::<C>))
        .route("/v1/{class}/recent", get(get_recent::<C>))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use ledgerlink_client::OnChainQueryFacade;
    use ledgerlink_core::{IdentifierCodec, ResilienceConfig};
    use ledgerlink_rpc::mock::sample_raffle;
    use ledgerlink_rpc::{CallError, MockLedger, ResilientLedger};
    use tower::ServiceExt;

    use crate::state::AppState;

    fn state(mock: MockLedger) -> SharedState<MockLedger> {
        let resilience = ResilienceConfig {
            jitter: 0.0,
            base_delay_ms: 1,
            ..Default::default()
        };
        let ledger = Arc::new(ResilientLedger::new(mock, &resilience).unwrap());
        let codecs = vec![IdentifierCodec::new(EntityClass::Raffle, "S", 100, 12).unwrap()];
        let facade = OnChainQueryFacade::new(codecs, ledger).unwrap();
        Arc::new(AppState::new(facade))
    }

    fn raffles(n: u64) -> MockLedger {
        let mock = MockLedger::new();
        for id in 0..n {
            mock.insert(id, sample_raffle(id));
        }
        mock
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn test_parse_class() {
        assert_eq!(parse_class("raffle").unwrap(), EntityClass::Raffle);
        assert_eq!(parse_class("payment-link").unwrap(), EntityClass::PaymentLink);
        assert!(parse_class("lottery").is_err());
    }

    #[tokio::test]
    async fn test_entity_found_and_missing() {
        let router = create_router(state(raffles(1)));

        let (status, body) = send(router.clone(), get_request("/v1/raffle/id/092726d9dd57")).await;
        assert_eq!(status, StatusCode::OK);
        let response: EntityResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(response.id, "092726d9dd57");
        assert_eq!(response.entity, sample_raffle(0));

        let (status, _) = send(router.clone(), get_request("/v1/raffle/id/ffffffffffff")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(router.clone(), get_request("/v1/lottery/id/092726d9dd57")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(router, get_request("/v1/payment_link/id/092726d9dd57")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ledger_failure_is_bad_gateway() {
        let mock = raffles(1);
        mock.fail_next(3, CallError::transient("503 Service Unavailable"));
        let router = create_router(state(mock));

        let (status, body) = send(router, get_request("/v1/raffle/id/092726d9dd57")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(String::from_utf8_lossy(&body).contains("Gave up after 3 attempts"));
    }

    #[tokio::test]
    async fn test_batch_body_shape() {
        let router = create_router(state(raffles(1)));
        let request = Request::builder()
            .method("POST")
            .uri("/v1/raffle/batch")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"ids":["092726d9dd57","nope"]}"#))
            .unwrap();

        let (status, body) = send(router, request).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["results"][0]["status"], "found");
        assert_eq!(json["results"][0]["entity"]["kind"], "raffle");
        assert_eq!(json["results"][1]["status"], "not_found");
        assert_eq!(json["results"][1]["id"], "nope");
    }

    #[tokio::test]
    async fn test_batch_for_unserved_class_is_404_even_when_empty() {
        let router = create_router(state(raffles(1)));

        for body in [r#"{"ids":[]}"#, r#"{"ids":["092726d9dd57"]}"#] {
            let request = Request::builder()
                .method("POST")
                .uri("/v1/payment_link/batch")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap();
            let (status, _) = send(router.clone(), request).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{}", body);
        }
    }

    #[tokio::test]
    async fn test_health_and_metrics_without_recorder() {
        let router = create_router(state(MockLedger::new()));

        let (status, body) = send(router.clone(), get_request("/health")).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["classes"][0], "raffle");

        let (status, _) = send(router, get_request("/metrics")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
