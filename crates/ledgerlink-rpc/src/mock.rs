//! In-memory ledger for tests and local development
//!
//! Answers [`LedgerRequest`]s from a map of entities. Failures can be
//! scripted per invocation or per request, and every invocation is counted
//! so callers can assert on how the resilience layer used the remote.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use ledgerlink_core::{
    keccak256, Entity, EntityClass, InternalId, LedgerRequest, LedgerResponse, LinkStatus,
    PaymentLink, Raffle, RaffleStatus,
};

use crate::{CallError, RemoteCall};

#[derive(Debug, Default)]
struct MockState {
    entities: HashMap<(EntityClass, InternalId), Entity>,
    counts: HashMap<EntityClass, u64>,
    invocation_failures: VecDeque<CallError>,
    item_failures: HashMap<LedgerRequest, VecDeque<CallError>>,
    request_latency: HashMap<LedgerRequest, Duration>,
    batch_sizes: Vec<usize>,
    received: Vec<LedgerRequest>,
    arrivals: Vec<Instant>,
    sent_transactions: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MockLedger {
    state: Mutex<MockState>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    batch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every invocation sleeps this long before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Single calls for `request` take `latency` instead of the default
    pub fn with_request_latency(self, request: LedgerRequest, latency: Duration) -> Self {
        self.lock().request_latency.insert(request, latency);
        self
    }

    pub fn with_entity(self, id: InternalId, entity: Entity) -> Self {
        self.insert(id, entity);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store an entity; the class count grows to cover `id`
    pub fn insert(&self, id: InternalId, entity: Entity) {
        let class = entity.class();
        let mut state = self.lock();
        state.entities.insert((class, id), entity);
        let count = state.counts.entry(class).or_default();
        *count = (*count).max(id + 1);
    }

    pub fn remove(&self, class: EntityClass, id: InternalId) {
        self.lock().entities.remove(&(class, id));
    }

    /// Override the entity count reported for `class`
    pub fn set_count(&self, class: EntityClass, count: u64) {
        self.lock().counts.insert(class, count);
    }

    /// Fail the next `times` invocations (single or batch) with `error`
    pub fn fail_next(&self, times: usize, error: CallError) {
        let mut state = self.lock();
        state
            .invocation_failures
            .extend(std::iter::repeat(error).take(times));
    }

    /// Fail the next `times` answers to `request` with `error`
    pub fn fail_request(&self, request: LedgerRequest, times: usize, error: CallError) {
        let mut state = self.lock();
        state
            .item_failures
            .entry(request)
            .or_default()
            .extend(std::iter::repeat(error).take(times));
    }

    /// Single-request invocations so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Batch invocations so far
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    /// All remote invocations, single and batch
    pub fn invocations(&self) -> usize {
        self.calls() + self.batch_calls()
    }

    /// Size of every batch invocation, in order
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    /// Highest number of invocations observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Requests of single-request invocations, in arrival order
    pub fn received(&self) -> Vec<LedgerRequest> {
        self.lock().received.clone()
    }

    /// When each invocation, single or batch, reached the remote
    pub fn arrivals(&self) -> Vec<Instant> {
        self.lock().arrivals.clone()
    }

    pub fn sent_transactions(&self) -> Vec<String> {
        self.lock().sent_transactions.clone()
    }

    pub fn reset_counters(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.batch_calls.store(0, Ordering::SeqCst);
        self.max_in_flight.store(0, Ordering::SeqCst);
        let mut state = self.lock();
        state.batch_sizes.clear();
        state.received.clear();
        state.arrivals.clear();
    }

    async fn simulate_latency(&self, latency: Option<Duration>) {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn answer(&self, state: &mut MockState, request: &LedgerRequest) -> Result<LedgerResponse, CallError> {
        if let Some(error) = state
            .item_failures
            .get_mut(request)
            .and_then(|queue| queue.pop_front())
        {
            return Err(error);
        }

        match request {
            LedgerRequest::Entity { class, id } => Ok(LedgerResponse::Entity(
                state.entities.get(&(*class, *id)).cloned(),
            )),
            LedgerRequest::EntityCount { class } => Ok(LedgerResponse::Count(
                state.counts.get(class).copied().unwrap_or(0),
            )),
            LedgerRequest::SendRawTransaction { raw } => {
                let hex_str = raw.strip_prefix("0x").unwrap_or(raw);
                let bytes = hex::decode(hex_str)
                    .map_err(|e| CallError::permanent(format!("invalid raw transaction: {}", e)))?;
                state.sent_transactions.push(raw.clone());
                Ok(LedgerResponse::TxHash(format!(
                    "0x{}",
                    hex::encode(keccak256(&bytes))
                )))
            }
        }
    }
}

impl RemoteCall for MockLedger {
    type Request = LedgerRequest;
    type Response = LedgerResponse;

    fn call(
        &self,
        request: &LedgerRequest,
    ) -> impl Future<Output = Result<LedgerResponse, CallError>> + Send {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let latency = {
                let mut state = self.lock();
                state.received.push(request.clone());
                state.arrivals.push(Instant::now());
                state.request_latency.get(request).copied().or(self.latency)
            };
            self.simulate_latency(latency).await;

            let mut state = self.lock();
            if let Some(error) = state.invocation_failures.pop_front() {
                return Err(error);
            }
            self.answer(&mut state, request)
        }
    }

    fn call_batch(
        &self,
        requests: &[LedgerRequest],
    ) -> impl Future<Output = Result<Vec<Result<LedgerResponse, CallError>>, CallError>> + Send
    {
        async move {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            {
                let mut state = self.lock();
                state.batch_sizes.push(requests.len());
                state.arrivals.push(Instant::now());
            }
            self.simulate_latency(self.latency).await;

            let mut state = self.lock();
            if let Some(error) = state.invocation_failures.pop_front() {
                return Err(error);
            }
            Ok(requests
                .iter()
                .map(|request| self.answer(&mut state, request))
                .collect())
        }
    }
}

/// Deterministic raffle whose fields derive from `seed`
pub fn sample_raffle(seed: u64) -> Entity {
    let mut creator = [0u8; 20];
    creator[0] = 0x11;
    creator[12..].copy_from_slice(&seed.to_be_bytes());
    Entity::Raffle(Raffle {
        creator,
        ticket_price: 1_000_000_000_000_000 * (u128::from(seed) + 1),
        max_tickets: 100,
        tickets_sold: seed % 100,
        ends_at: 1_700_000_000 + seed * 3600,
        status: RaffleStatus::Open,
    })
}

/// Deterministic payment link whose fields derive from `seed`
pub fn sample_payment_link(seed: u64) -> Entity {
    let mut creator = [0u8; 20];
    creator[0] = 0x22;
    creator[12..].copy_from_slice(&seed.to_be_bytes());
    Entity::PaymentLink(PaymentLink {
        creator,
        token: [0u8; 20],
        amount: 5_000_000 * (u128::from(seed) + 1),
        expires_at: 0,
        status: LinkStatus::Active,
    })
}
