//! The resilience layer around a [`RemoteCall`]

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use ledgerlink_core::ResilienceConfig;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::{ResilienceError, Result};
use crate::metrics::{self, OP_BATCH, OP_CALL, OP_WRITE};
use crate::{with_retry, CallError, RateLimiter, RemoteCall, RequestState, RetryPolicy, TtlCache};

/// Shared entry point for every ledger call
///
/// Wrap in an `Arc` and hand clones to all callers: the cache, the rate
/// limiter and the concurrency cap are only meaningful when shared.
pub struct ResilientLedger<C: RemoteCall> {
    remote: C,
    policy: RetryPolicy,
    limiter: RateLimiter,
    permits: Semaphore,
    max_in_flight: usize,
    cache: Mutex<TtlCache<String, C::Response>>,
    batch_size: usize,
    inter_batch_delay: Duration,
}

impl<C: RemoteCall> ResilientLedger<C> {
    pub fn new(remote: C, config: &ResilienceConfig) -> ledgerlink_core::Result<Self> {
        config.validate()?;

        Ok(Self {
            remote,
            policy: RetryPolicy::from(config),
            limiter: RateLimiter::new(config.requests_per_second, config.burst),
            permits: Semaphore::new(config.max_in_flight),
            max_in_flight: config.max_in_flight,
            cache: Mutex::new(TtlCache::new(config.cache_ttl(), config.cache_capacity)),
            batch_size: config.batch_size,
            inter_batch_delay: config.inter_batch_delay(),
        })
    }

    pub fn remote(&self) -> &C {
        &self.remote
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Remote invocations currently outstanding
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    pub fn cached_entries(&self) -> usize {
        self.cache().len()
    }

    /// Read through the cache, retrying transient failures
    ///
    /// Dropping the returned future cancels the call: an outstanding remote
    /// request and any backoff timer are dropped with it, and nothing is
    /// cached. Spawn the future to let it finish regardless.
    pub async fn read(&self, request: &C::Request) -> Result<C::Response> {
        let key = cache_key(request)?;
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let response = with_retry(&self.policy, OP_CALL, |_| self.invoke(request)).await?;
        self.cache().insert(key, response.clone());
        Ok(response)
    }

    /// Read many independent requests, batching the cache misses
    ///
    /// Results come back in submission order. Misses are sent in batches of
    /// `batch_size`, one batch after another with `inter_batch_delay` between
    /// them; each item retries on its own.
    pub async fn read_many(&self, requests: &[C::Request]) -> Vec<Result<C::Response>> {
        let mut results: Vec<Option<Result<C::Response>>> =
            (0..requests.len()).map(|_| None).collect();
        let mut misses: Vec<(usize, String)> = Vec::new();

        for (index, request) in requests.iter().enumerate() {
            match cache_key(request) {
                Ok(key) => match self.cached(&key) {
                    Some(hit) => results[index] = Some(Ok(hit)),
                    None => misses.push((index, key)),
                },
                Err(err) => results[index] = Some(Err(err)),
            }
        }

        for (batch_index, chunk) in misses.chunks(self.batch_size).enumerate() {
            if batch_index > 0 && !self.inter_batch_delay.is_zero() {
                sleep(self.inter_batch_delay).await;
            }

            let batch: Vec<C::Request> = chunk
                .iter()
                .map(|(index, _)| requests[*index].clone())
                .collect();
            debug!(batch = batch_index, size = batch.len(), "Dispatching batch");

            let outcomes = self.dispatch_batch(&batch).await;
            let mut cache = self.cache();
            for ((index, key), outcome) in chunk.iter().zip(outcomes) {
                if let Ok(response) = &outcome {
                    cache.insert(key.clone(), response.clone());
                }
                results[*index] = Some(outcome);
            }
        }

        results
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| Err(ResilienceError::Permanent("request was not dispatched".into())))
            })
            .collect()
    }

    /// Send a state-changing request; retried but never cached
    pub async fn write(&self, request: &C::Request) -> Result<C::Response> {
        with_retry(&self.policy, OP_WRITE, |_| self.invoke(request)).await
    }

    /// Drop the cached response for `request`, if any
    pub fn invalidate(&self, request: &C::Request) {
        if let Ok(key) = cache_key(request) {
            self.cache().remove(&key);
        }
    }

    pub fn clear_cache(&self) {
        self.cache().clear();
    }

    fn cache(&self) -> MutexGuard<'_, TtlCache<String, C::Response>> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cached(&self, key: &str) -> Option<C::Response> {
        let mut cache = self.cache();
        if !cache.is_enabled() {
            return None;
        }
        let hit = cache.get(&key.to_string());
        metrics::record_cache_lookup(hit.is_some());
        hit
    }

    /// Take a concurrency permit, then a rate token
    ///
    /// Pacing applies to the moment a call leaves, so callers released
    /// together from the semaphore still go out one token apart.
    async fn admit(&self) -> std::result::Result<SemaphorePermit<'_>, CallError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| CallError::permanent("ledger is shutting down"))?;
        self.limiter.acquire().await;
        metrics::set_in_flight(self.in_flight());
        Ok(permit)
    }

    async fn invoke(&self, request: &C::Request) -> std::result::Result<C::Response, CallError> {
        let permit = self.admit().await?;
        let start = Instant::now();
        let outcome = self.remote.call(request).await;
        drop(permit);

        metrics::set_in_flight(self.in_flight());
        metrics::record_remote_call(OP_CALL, outcome_label(&outcome), start.elapsed());
        outcome
    }

    async fn invoke_batch(
        &self,
        requests: &[C::Request],
    ) -> std::result::Result<Vec<std::result::Result<C::Response, CallError>>, CallError> {
        let permit = self.admit().await?;
        let start = Instant::now();
        let outcome = self.remote.call_batch(requests).await;
        drop(permit);

        metrics::set_in_flight(self.in_flight());
        metrics::record_remote_call(OP_BATCH, outcome_label(&outcome), start.elapsed());
        metrics::record_batch_size(requests.len());
        outcome
    }

    /// Run one batch to completion, resending only the items still pending
    async fn dispatch_batch(&self, requests: &[C::Request]) -> Vec<Result<C::Response>> {
        let mut states: Vec<RequestState<C::Response>> =
            requests.iter().map(|_| RequestState::new()).collect();
        let mut delays = self.policy.backoff();
        let mut round = 0u32;

        loop {
            let pending: Vec<usize> = states
                .iter()
                .enumerate()
                .filter(|(_, state)| !state.is_terminal())
                .map(|(index, _)| index)
                .collect();
            if pending.is_empty() {
                break;
            }

            if round > 0 {
                let delay = delays.next().unwrap_or(self.policy.max_delay);
                metrics::record_retry(OP_BATCH);
                debug!(
                    attempt = round + 1,
                    pending = pending.len(),
                    backoff_ms = delay.as_millis() as u64,
                    "Retrying batch items after backoff"
                );
                sleep(delay).await;
            }

            let retry: Vec<C::Request> = pending.iter().map(|&i| requests[i].clone()).collect();
            match self.invoke_batch(&retry).await {
                Ok(outcomes) if outcomes.len() == retry.len() => {
                    for (&index, outcome) in pending.iter().zip(outcomes) {
                        states[index].step(outcome, &self.policy);
                    }
                }
                Ok(outcomes) => {
                    let err = CallError::permanent(format!(
                        "batch returned {} results for {} requests",
                        outcomes.len(),
                        retry.len()
                    ));
                    for &index in &pending {
                        states[index].step(Err(err.clone()), &self.policy);
                    }
                }
                Err(err) => {
                    debug!(attempt = round + 1, error = %err, "Batch call failed");
                    for &index in &pending {
                        states[index].step(Err(err.clone()), &self.policy);
                    }
                }
            }
            round += 1;
        }

        let results: Vec<Result<C::Response>> = states
            .into_iter()
            .map(|state| {
                state
                    .into_result()
                    .unwrap_or_else(|| Err(ResilienceError::Permanent("request left pending".into())))
            })
            .collect();

        let exhausted = results
            .iter()
            .filter(|r| matches!(r, Err(e) if e.is_exhausted()))
            .count();
        if exhausted > 0 {
            metrics::record_exhausted(OP_BATCH);
            warn!(exhausted, size = requests.len(), "Batch items exhausted retries");
        }

        results
    }
}

fn cache_key<R: serde::Serialize>(request: &R) -> Result<String> {
    serde_json::to_string(request).map_err(|e| ResilienceError::Encode(e.to_string()))
}

fn outcome_label<T>(outcome: &std::result::Result<T, CallError>) -> &'static str {
    match outcome {
        Ok(_) => metrics::OUTCOME_OK,
        Err(CallError::Transient(_)) => metrics::OUTCOME_TRANSIENT,
        Err(CallError::Permanent(_)) => metrics::OUTCOME_PERMANENT,
    }
}
