//! Public-id lookups against the ledger
//!
//! Resolution is local (codec), fetching goes through the shared
//! [`ResilientLedger`]. The facade adds no retries of its own.
//!
//! Ledger work runs on its own task. A caller that drops a pending lookup
//! detaches from it: the dispatched request and any retry timers still run
//! to completion, and a successful response is cached for the next caller.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use ledgerlink_core::{
    Entity, EntityClass, Error, IdentifierCodec, InternalId, LedgerLinkConfig, LedgerRequest,
    LedgerResponse, OpaqueId, PublicId, SchemeKind,
};
use ledgerlink_rpc::{LedgerCall, ResilientLedger};
use tracing::{debug, info, warn};

use crate::error::{QueryError, Result};

pub struct OnChainQueryFacade<C: LedgerCall> {
    codecs: HashMap<EntityClass, IdentifierCodec>,
    ledger: Arc<ResilientLedger<C>>,
}

impl<C: LedgerCall + 'static> OnChainQueryFacade<C> {
    /// Assemble a facade from ready-made codecs, one per class
    pub fn new(codecs: Vec<IdentifierCodec>, ledger: Arc<ResilientLedger<C>>) -> Result<Self> {
        let mut by_class = HashMap::with_capacity(codecs.len());
        for codec in codecs {
            let class = codec.class();
            if by_class.insert(class, codec).is_some() {
                return Err(Error::DuplicateClass(class).into());
            }
        }
        Ok(Self {
            codecs: by_class,
            ledger,
        })
    }

    /// Build codecs from `config` and check every search bound against the ledger
    ///
    /// Fails with [`Error::SearchBoundTooSmall`] when a contract already holds
    /// more entities than its bound can reach.
    pub async fn connect(config: &LedgerLinkConfig, ledger: Arc<ResilientLedger<C>>) -> Result<Self> {
        let codecs = config
            .classes
            .iter()
            .map(IdentifierCodec::from_config)
            .collect::<ledgerlink_core::Result<Vec<_>>>()?;
        let facade = Self::new(codecs, ledger)?;

        for codec in facade.codecs.values() {
            let observed = facade.entity_count(codec.class()).await?;
            if observed > codec.search_bound() {
                return Err(Error::SearchBoundTooSmall {
                    class: codec.class(),
                    bound: codec.search_bound(),
                    observed,
                }
                .into());
            }
            info!(
                class = %codec.class(),
                observed,
                search_bound = codec.search_bound(),
                reverse_index = codec.has_reverse_index(),
                "Class ready"
            );
        }

        Ok(facade)
    }

    pub fn ledger(&self) -> &Arc<ResilientLedger<C>> {
        &self.ledger
    }

    pub fn classes(&self) -> impl Iterator<Item = EntityClass> + '_ {
        self.codecs.keys().copied()
    }

    pub fn codec(&self, class: EntityClass) -> Result<&IdentifierCodec> {
        self.codecs.get(&class).ok_or(QueryError::UnknownClass(class))
    }

    /// Internal id behind `opaque`, or `None` if nothing below the bound matches
    pub fn resolve(&self, class: EntityClass, opaque: &str) -> Result<Option<InternalId>> {
        Ok(self.codec(class)?.decode(opaque))
    }

    pub fn public_id(&self, class: EntityClass, internal_id: InternalId) -> Result<OpaqueId> {
        Ok(self.codec(class)?.encode(internal_id))
    }

    /// Run `op` against the shared ledger on a task of its own
    async fn on_ledger<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: FnOnce(Arc<ResilientLedger<C>>) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(op(Arc::clone(&self.ledger)))
            .await
            .map_err(|e| QueryError::TaskFailed(e.to_string()))
    }

    async fn read(&self, request: LedgerRequest) -> Result<LedgerResponse> {
        let response = self
            .on_ledger(move |ledger| async move { ledger.read(&request).await })
            .await??;
        Ok(response)
    }

    pub async fn entity_count(&self, class: EntityClass) -> Result<u64> {
        match self.read(LedgerRequest::entity_count(class)).await? {
            LedgerResponse::Count(count) => Ok(count),
            other => Err(unexpected("count", &other)),
        }
    }

    pub async fn get_by_id(&self, class: EntityClass, opaque: &str) -> Result<Option<Entity>> {
        let Some(id) = self.resolve(class, opaque)? else {
            debug!(%class, "Public id did not resolve");
            return Ok(None);
        };
        let response = self.read(LedgerRequest::entity(class, id)).await?;
        into_entity(response)
    }

    /// Like [`Self::get_by_id`], refusing ids from the timestamped scheme
    pub async fn get_by_public_id(&self, class: EntityClass, id: &PublicId) -> Result<Option<Entity>> {
        match id {
            PublicId::Sequential(opaque) => self.get_by_id(class, opaque.as_str()).await,
            PublicId::Timestamped(_) => Err(QueryError::UnsupportedScheme(SchemeKind::Timestamped)),
        }
    }

    /// Fetch several entities with one resilience-layer submission
    ///
    /// Output order matches `ids`. Ids that do not resolve come back as
    /// `Ok(None)` and are never sent to the ledger.
    pub async fn get_many<S: AsRef<str>>(
        &self,
        class: EntityClass,
        ids: &[S],
    ) -> Vec<Result<Option<Entity>>> {
        let codec = match self.codec(class) {
            Ok(codec) => codec,
            Err(_) => {
                return ids
                    .iter()
                    .map(|_| Err(QueryError::UnknownClass(class)))
                    .collect()
            }
        };

        let resolved: Vec<Option<InternalId>> =
            ids.iter().map(|id| codec.decode(id.as_ref())).collect();
        let requests: Vec<LedgerRequest> = resolved
            .iter()
            .flatten()
            .map(|&id| LedgerRequest::entity(class, id))
            .collect();
        debug!(%class, requested = ids.len(), resolved = requests.len(), "Fetching entities");

        let mut responses = match self
            .on_ledger(move |ledger| async move { ledger.read_many(&requests).await })
            .await
        {
            Ok(responses) => responses.into_iter(),
            Err(err) => {
                let message = err.to_string();
                return resolved
                    .iter()
                    .map(|slot| match slot {
                        Some(_) => Err(QueryError::TaskFailed(message.clone())),
                        None => Ok(None),
                    })
                    .collect();
            }
        };
        resolved
            .into_iter()
            .map(|slot| -> Result<Option<Entity>> {
                if slot.is_none() {
                    return Ok(None);
                }
                match responses.next() {
                    Some(response) => into_entity(response?),
                    None => Err(QueryError::UnexpectedResponse("missing batch result".into())),
                }
            })
            .collect()
    }

    /// The newest `limit` entities of `class`, newest first, with their public ids
    ///
    /// Only ids below the search bound are listed, so every returned public
    /// id resolves again through [`Self::get_by_id`].
    pub async fn list_recent(&self, class: EntityClass, limit: usize) -> Result<Vec<(OpaqueId, Entity)>> {
        let codec = self.codec(class)?;
        let count = self.entity_count(class).await?;
        if count > codec.search_bound() {
            warn!(
                %class,
                count,
                search_bound = codec.search_bound(),
                "Ledger holds entities past the search bound; listing only those below it"
            );
        }

        let listable = count.min(codec.search_bound());
        let ids: Vec<InternalId> = (0..listable).rev().take(limit).collect();
        let requests: Vec<LedgerRequest> = ids.iter().map(|&id| LedgerRequest::entity(class, id)).collect();

        let responses = self
            .on_ledger(move |ledger| async move { ledger.read_many(&requests).await })
            .await?;

        let mut recent = Vec::with_capacity(ids.len());
        for (id, response) in ids.into_iter().zip(responses) {
            if let Some(entity) = into_entity(response?)? {
                recent.push((codec.encode(id), entity));
            }
        }
        Ok(recent)
    }
}

fn into_entity(response: LedgerResponse) -> Result<Option<Entity>> {
    match response {
        LedgerResponse::Entity(entity) => Ok(entity),
        other => Err(unexpected("entity", &other)),
    }
}

fn unexpected(expected: &str, got: &LedgerResponse) -> QueryError {
    QueryError::UnexpectedResponse(format!("expected {}, got {:?}", expected, got))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use ledgerlink_core::{ClassConfig, ResilienceConfig};
    use ledgerlink_rpc::mock::{sample_payment_link, sample_raffle};
    use ledgerlink_rpc::{CallError, MockLedger};

    const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    fn resilience() -> ResilienceConfig {
        ResilienceConfig {
            jitter: 0.0,
            ..Default::default()
        }
    }

    fn facade_with(mock: MockLedger, search_bound: u64) -> OnChainQueryFacade<MockLedger> {
        let ledger = Arc::new(ResilientLedger::new(mock, &resilience()).unwrap());
        let codecs = vec![
            IdentifierCodec::new(EntityClass::Raffle, "S", search_bound, 12).unwrap(),
            IdentifierCodec::new(EntityClass::PaymentLink, "L", search_bound, 16).unwrap(),
        ];
        OnChainQueryFacade::new(codecs, ledger).unwrap()
    }

    fn raffles(n: u64) -> MockLedger {
        let mock = MockLedger::new();
        for id in 0..n {
            mock.insert(id, sample_raffle(id));
        }
        mock
    }

    fn config(search_bound: u64) -> LedgerLinkConfig {
        LedgerLinkConfig {
            rpc_url: "http://localhost:8545".into(),
            classes: vec![ClassConfig {
                class: EntityClass::Raffle,
                contract: CONTRACT.into(),
                salt: "S".into(),
                search_bound,
                id_length: 12,
                reverse_index: false,
                verify_collisions: false,
            }],
            timestamp_salt: None,
            resilience: resilience(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_golden() {
        let facade = facade_with(raffles(1), 100);
        assert_eq!(facade.public_id(EntityClass::Raffle, 0).unwrap(), "092726d9dd57");
        assert_eq!(facade.resolve(EntityClass::Raffle, "092726d9dd57").unwrap(), Some(0));
        assert_eq!(facade.resolve(EntityClass::Raffle, "ffffffffffff").unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_by_id_found_and_not_found() {
        let facade = facade_with(raffles(3), 100);

        let id = facade.public_id(EntityClass::Raffle, 2).unwrap();
        let entity = facade.get_by_id(EntityClass::Raffle, id.as_str()).await.unwrap();
        assert_eq!(entity, Some(sample_raffle(2)));

        // Resolves, but nothing on chain yet
        let id = facade.public_id(EntityClass::Raffle, 50).unwrap();
        assert_eq!(facade.get_by_id(EntityClass::Raffle, id.as_str()).await.unwrap(), None);

        // Does not resolve: no remote call
        let calls = facade.ledger().remote().calls();
        assert_eq!(facade.get_by_id(EntityClass::Raffle, "not-an-id").await.unwrap(), None);
        assert_eq!(facade.ledger().remote().calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_get_by_id_within_ttl_is_free() {
        let facade = facade_with(raffles(1), 100);
        let id = facade.public_id(EntityClass::Raffle, 0).unwrap();

        facade.get_by_id(EntityClass::Raffle, id.as_str()).await.unwrap();
        assert_eq!(facade.ledger().remote().invocations(), 1);

        facade.get_by_id(EntityClass::Raffle, id.as_str()).await.unwrap();
        assert_eq!(facade.ledger().remote().invocations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_many_preserves_order_with_one_batch() {
        let facade = facade_with(raffles(5), 100);
        let a = facade.public_id(EntityClass::Raffle, 1).unwrap();
        let c = facade.public_id(EntityClass::Raffle, 3).unwrap();

        let results = facade
            .get_many(EntityClass::Raffle, &[a.as_str(), "unresolvable", c.as_str()])
            .await;

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap(), &Some(sample_raffle(1)));
        assert!(results[1].as_ref().unwrap().is_none());
        assert_eq!(results[2].as_ref().unwrap(), &Some(sample_raffle(3)));

        let remote = facade.ledger().remote();
        assert_eq!(remote.batch_sizes(), vec![2]);
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_many_reports_item_errors_in_place() {
        let mock = raffles(3);
        mock.fail_request(
            LedgerRequest::entity(EntityClass::Raffle, 1),
            1,
            CallError::permanent("execution reverted: paused"),
        );
        let facade = facade_with(mock, 100);
        let ids: Vec<OpaqueId> = (0..3)
            .map(|id| facade.public_id(EntityClass::Raffle, id).unwrap())
            .collect();

        let results = facade.get_many(EntityClass::Raffle, &ids).await;
        assert!(results[0].as_ref().unwrap().is_some());
        assert!(matches!(results[1], Err(QueryError::Ledger(_))));
        assert!(results[2].as_ref().unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_search_bound_limits_resolution() {
        let facade = facade_with(raffles(8), 5);
        let codec = IdentifierCodec::new(EntityClass::Raffle, "S", 100, 12).unwrap();
        let beyond = codec.encode(7);

        assert_eq!(facade.resolve(EntityClass::Raffle, beyond.as_str()).unwrap(), None);
        assert_eq!(facade.get_by_id(EntityClass::Raffle, beyond.as_str()).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_class() {
        let ledger = Arc::new(ResilientLedger::new(raffles(1), &resilience()).unwrap());
        let codecs = vec![IdentifierCodec::new(EntityClass::Raffle, "S", 10, 12).unwrap()];
        let facade = OnChainQueryFacade::new(codecs, ledger).unwrap();

        assert!(matches!(
            facade.resolve(EntityClass::PaymentLink, "abc"),
            Err(QueryError::UnknownClass(EntityClass::PaymentLink))
        ));
        let results = facade.get_many(EntityClass::PaymentLink, &["abc"]).await;
        assert!(matches!(results[0], Err(QueryError::UnknownClass(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_duplicate_codecs() {
        let ledger = Arc::new(ResilientLedger::new(MockLedger::new(), &resilience()).unwrap());
        let codecs = vec![
            IdentifierCodec::new(EntityClass::Raffle, "S", 10, 12).unwrap(),
            IdentifierCodec::new(EntityClass::Raffle, "T", 10, 12).unwrap(),
        ];
        assert!(matches!(
            OnChainQueryFacade::new(codecs, ledger),
            Err(QueryError::Config(Error::DuplicateClass(EntityClass::Raffle)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_checks_search_bound() {
        let ledger = Arc::new(ResilientLedger::new(raffles(10), &resilience()).unwrap());
        let err = OnChainQueryFacade::connect(&config(5), ledger)
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            QueryError::Config(Error::SearchBoundTooSmall {
                class: EntityClass::Raffle,
                bound: 5,
                observed: 10
            })
        ));

        let ledger = Arc::new(ResilientLedger::new(raffles(10), &resilience()).unwrap());
        let facade = OnChainQueryFacade::connect(&config(10), ledger).await.unwrap();
        assert_eq!(facade.classes().collect::<Vec<_>>(), vec![EntityClass::Raffle]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timestamped_ids_are_rejected() {
        let facade = facade_with(raffles(1), 10);
        let stamps = ledgerlink_core::TimestampedIdentifierCodec::new("test-salt").unwrap();
        let id = PublicId::from(stamps.encode(0, 1_700_000_000_000));
        assert!(matches!(
            facade.get_by_public_id(EntityClass::Raffle, &id).await,
            Err(QueryError::UnsupportedScheme(SchemeKind::Timestamped))
        ));

        let id = PublicId::from(facade.public_id(EntityClass::Raffle, 0).unwrap());
        assert!(facade.get_by_public_id(EntityClass::Raffle, &id).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_recent() {
        let mock = raffles(5);
        mock.insert(0, sample_payment_link(0));
        let facade = facade_with(mock, 100);

        let recent = facade.list_recent(EntityClass::Raffle, 3).await.unwrap();
        let expected: Vec<_> = [4, 3, 2]
            .iter()
            .map(|&id| (facade.public_id(EntityClass::Raffle, id).unwrap(), sample_raffle(id)))
            .collect();
        assert_eq!(recent, expected);

        let all = facade.list_recent(EntityClass::Raffle, 50).await.unwrap();
        assert_eq!(all.len(), 5);
        assert!(facade.list_recent(EntityClass::PaymentLink, 5).await.unwrap().len() == 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_lookup_runs_to_completion() {
        let mock = raffles(1).with_latency(Duration::from_millis(100));
        mock.fail_next(1, CallError::transient("timeout"));
        let facade = facade_with(mock, 100);
        let id = facade.public_id(EntityClass::Raffle, 0).unwrap();

        // Give up while the first attempt is still outstanding
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            facade.get_by_id(EntityClass::Raffle, id.as_str()),
        )
        .await;
        assert!(abandoned.is_err());

        // The retry fires anyway and its answer lands in the cache
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(facade.ledger().remote().calls(), 2);
        assert_eq!(facade.ledger().cached_entries(), 1);

        let entity = facade.get_by_id(EntityClass::Raffle, id.as_str()).await.unwrap();
        assert_eq!(entity, Some(sample_raffle(0)));
        assert_eq!(facade.ledger().remote().calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_recent_stays_below_search_bound() {
        let facade = facade_with(raffles(8), 5);

        let recent = facade.list_recent(EntityClass::Raffle, 3).await.unwrap();
        let ids: Vec<Option<InternalId>> = recent
            .iter()
            .map(|(id, _)| facade.resolve(EntityClass::Raffle, id.as_str()).unwrap())
            .collect();
        assert_eq!(ids, vec![Some(4), Some(3), Some(2)]);

        for (id, entity) in &recent {
            let fetched = facade.get_by_id(EntityClass::Raffle, id.as_str()).await.unwrap();
            assert_eq!(fetched.as_ref(), Some(entity));
        }
    }
}
