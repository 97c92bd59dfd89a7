//! End-to-end server tests
//!
//! Runs the real router on an ephemeral port in front of the in-memory
//! ledger and talks to it over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use ledgerlink::{
    CallError, EntityClass, IdentifierCodec, MockLedger, OnChainQueryFacade, ResilienceConfig,
    ResilientLedger, ServerBuilder,
};
use ledgerlink_rpc::mock::sample_raffle;
use ledgerlink_server::routes::{BatchResponse, EntityResponse, RecentResponse};
use ledgerlink_server::SharedState;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tokio::net::TcpListener;

/// Test harness for running E2E server tests
pub struct TestHarness {
    pub server_url: String,
    pub state: SharedState<MockLedger>,
    pub http: Client,
    _shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestHarness {
    pub async fn new() -> Self {
        let mock = MockLedger::new();
        for id in 0..6 {
            mock.insert(id, sample_raffle(id));
        }
        Self::with_ledger(mock).await
    }

    pub async fn with_ledger(mock: MockLedger) -> Self {
        let resilience = ResilienceConfig {
            jitter: 0.0,
            base_delay_ms: 5,
            max_attempts: 2,
            ..Default::default()
        };
        let ledger = Arc::new(ResilientLedger::new(mock, &resilience).expect("valid resilience config"));
        let codecs = vec![IdentifierCodec::new(EntityClass::Raffle, "S", 100, 12).expect("valid codec")];
        let facade = OnChainQueryFacade::new(codecs, ledger).expect("valid facade");

        let server = ServerBuilder::new(facade)
            .max_batch_ids(4)
            .build()
            .expect("server should build");
        let state = server.state();
        let router = server.router();

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("Bind should succeed");
        let addr: SocketAddr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Self {
            server_url: format!("http://{}", addr),
            state,
            http: Client::new(),
            _shutdown: Some(shutdown_tx),
        }
    }

    fn public_id(&self, id: u64) -> String {
        self.state
            .facade
            .public_id(EntityClass::Raffle, id)
            .expect("raffle codec")
            .into_string()
    }

    fn mock(&self) -> &MockLedger {
        self.state.facade.ledger().remote()
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.server_url, path))
            .send()
            .await
            .expect("request should complete")
    }

    async fn batch(&self, ids: &[&str]) -> reqwest::Response {
        self.http
            .post(format!("{}/v1/raffle/batch", self.server_url))
            .json(&json!({ "ids": ids }))
            .send()
            .await
            .expect("request should complete")
    }
}

#[tokio::test]
async fn test_health() {
    let harness = TestHarness::new().await;
    let response = harness.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["classes"], json!(["raffle"]));
}

#[tokio::test]
async fn test_get_entity_by_public_id() {
    let harness = TestHarness::new().await;
    let id = harness.public_id(3);

    let response = harness.get(&format!("/v1/raffle/id/{}", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let text = response.text().await.unwrap();
    let body: EntityResponse = serde_json::from_str(&text).unwrap();
    assert_eq!(body.id, id);
    assert_eq!(body.entity, sample_raffle(3));

    // Internal ids never leave the server
    let raw: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(raw.get("internal_id").is_none());
    assert_eq!(raw.as_object().unwrap().len(), 2);

    // Served from cache the second time
    let calls = harness.mock().calls();
    let response = harness.get(&format!("/v1/raffle/id/{}", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(harness.mock().calls(), calls);
}

#[tokio::test]
async fn test_unknown_ids_are_404() {
    let harness = TestHarness::new().await;

    // Resolves below the bound, but the contract has no such raffle
    let response = harness.get(&format!("/v1/raffle/id/{}", harness.public_id(42))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = harness.get("/v1/raffle/id/not-a-public-id").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = harness.get("/v1/raffles-and-more/id/abc").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ledger_outage_is_502() {
    let mock = MockLedger::new().with_entity(0, sample_raffle(0));
    mock.fail_next(2, CallError::transient("503 Service Unavailable"));
    let harness = TestHarness::with_ledger(mock).await;

    let id = harness.public_id(0);
    let response = harness.get(&format!("/v1/raffle/id/{}", id)).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(harness.mock().calls(), 2);

    // The outage is over and nothing was cached
    let response = harness.get(&format!("/v1/raffle/id/{}", id)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_batch_preserves_order() {
    let harness = TestHarness::new().await;
    let a = harness.public_id(1);
    let c = harness.public_id(5);

    let response = harness.batch(&[&a, "unknown", &c]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["status"], "found");
    assert_eq!(results[0]["id"], a.as_str());
    assert_eq!(results[1]["status"], "not_found");
    assert_eq!(results[2]["status"], "found");
    assert_eq!(results[2]["id"], c.as_str());

    assert_eq!(harness.mock().batch_sizes(), vec![2]);
}

#[tokio::test]
async fn test_batch_reports_item_errors() {
    let mock = MockLedger::new();
    for id in 0..3 {
        mock.insert(id, sample_raffle(id));
    }
    mock.fail_request(
        ledgerlink::LedgerRequest::entity(EntityClass::Raffle, 1),
        1,
        CallError::permanent("execution reverted: paused"),
    );
    let harness = TestHarness::with_ledger(mock).await;
    let ids: Vec<String> = (0..3).map(|id| harness.public_id(id)).collect();
    let refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let response = harness.batch(&refs).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: BatchResponse = response.json().await.unwrap();

    let statuses: Vec<String> = body
        .results
        .iter()
        .map(|item| serde_json::to_value(item).unwrap()["status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(statuses, vec!["found", "error", "found"]);
}

#[tokio::test]
async fn test_batch_size_limit() {
    let harness = TestHarness::new().await;
    let response = harness.batch(&["a", "b", "c", "d", "e"]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_recent() {
    let harness = TestHarness::new().await;

    let response = harness.get("/v1/raffle/recent?limit=2").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: RecentResponse = response.json().await.unwrap();

    assert_eq!(body.class, EntityClass::Raffle);
    assert_eq!(body.items.len(), 2);
    assert_eq!(body.items[0].id, harness.public_id(5));
    assert_eq!(body.items[0].entity, sample_raffle(5));
    assert_eq!(body.items[1].id, harness.public_id(4));
}
