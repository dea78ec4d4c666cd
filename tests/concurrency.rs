// tests/concurrency.rs
//
// Same-entity signals must never be lost to a last-write-wins race: a writer that
// loses the conditional write recomputes its merge on the fresh profile.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use chrono::Utc;
use cognitive_profile_engine::{
    merge_signal_into_profile, CasOutcome, CognitiveProfile, EngineConfig, EngineError,
    EngineResult, InMemoryProfileStore, MergeConfig, ProfileService, ProfileStore, Signal,
    SignalSource,
};

fn quiz() -> Signal {
    Signal::new(SignalSource::Quiz, 0.8, Utc::now()).with_intent("learn", 1.0)
}

fn purchase() -> Signal {
    Signal::new(SignalSource::Purchase, 1.0, Utc::now()).with_intent("purchase_intent", 1.0)
}

/// Lets a competing writer slip in between the service's read and its write,
/// for the first `races` conditional writes.
struct RacingStore {
    inner: InMemoryProfileStore,
    races: AtomicU32,
    cas_calls: AtomicU32,
}

impl RacingStore {
    fn new(races: u32) -> Self {
        Self {
            inner: InMemoryProfileStore::new(),
            races: AtomicU32::new(races),
            cas_calls: AtomicU32::new(0),
        }
    }

    async fn competing_write(&self, entity_id: &str) {
        let current = self.inner.get(entity_id).await.unwrap();
        let expected = current.as_ref().map_or(0, CognitiveProfile::version);
        let r = merge_signal_into_profile(
            current.as_ref(),
            &purchase(),
            &MergeConfig::default(),
            Utc::now(),
        );
        let out = self
            .inner
            .compare_and_set(entity_id, expected, r.profile)
            .await
            .unwrap();
        assert_eq!(out, CasOutcome::Applied);
    }
}

#[async_trait::async_trait]
impl ProfileStore for RacingStore {
    async fn get(&self, entity_id: &str) -> EngineResult<Option<CognitiveProfile>> {
        self.inner.get(entity_id).await
    }

    async fn compare_and_set(
        &self,
        entity_id: &str,
        expected_version: u64,
        new_profile: CognitiveProfile,
    ) -> EngineResult<CasOutcome> {
        self.cas_calls.fetch_add(1, Ordering::SeqCst);
        let race = self
            .races
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if race {
            self.competing_write(entity_id).await;
        }
        self.inner
            .compare_and_set(entity_id, expected_version, new_profile)
            .await
    }

    fn name(&self) -> &'static str {
        "racing"
    }
}

#[tokio::test]
async fn lost_race_is_recomputed_not_dropped() {
    let store = Arc::new(RacingStore::new(1));
    let svc = ProfileService::new(store.clone(), EngineConfig::default());

    // Seed through the inner store so the armed race hits the service's write.
    let base = merge_signal_into_profile(None, &quiz(), &MergeConfig::default(), Utc::now());
    store.inner.compare_and_set("c1", 0, base.profile).await.unwrap();

    let r = svc.submit_signal("c1", quiz()).await.unwrap();

    // base(1) + competing purchase(1) + our quiz(1)
    assert_eq!(r.profile.total_signals, 3);
    assert_eq!(store.cas_calls.load(Ordering::SeqCst), 2);

    let stored = store.get("c1").await.unwrap().unwrap();
    assert_eq!(stored.total_signals, 3);
    // The competing purchase survived the retry.
    assert!(stored.intent_vector.contains_key("purchase_intent"));
    assert!(stored.signal_sources.contains(&SignalSource::Purchase));
}

#[tokio::test]
async fn exhausted_retries_surface_conflict() {
    let store = Arc::new(RacingStore::new(u32::MAX));
    let mut cfg = EngineConfig::default();
    cfg.service.max_retries = 3;
    let svc = ProfileService::new(store.clone(), cfg);

    let err = svc.submit_signal("c1", quiz()).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Conflict {
            entity_id: "c1".into(),
            attempts: 3
        }
    );
    assert_eq!(store.cas_calls.load(Ordering::SeqCst), 3);

    // Only the three competing writes landed.
    let stored = store.get("c1").await.unwrap().unwrap();
    assert_eq!(stored.total_signals, 3);
    assert!(!stored.signal_sources.contains(&SignalSource::Quiz));
}

#[tokio::test]
async fn dedup_claim_is_released_after_conflict() {
    let store = Arc::new(RacingStore::new(2));
    let mut cfg = EngineConfig::default();
    cfg.service.max_retries = 2;
    cfg.service.dedup_by_source_id = true;
    let svc = ProfileService::new(store.clone(), cfg);

    let err = svc
        .submit_signal("c1", quiz().with_source_id("sess-1"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");

    // Races exhausted; the same source_id is accepted on the next try.
    let r = svc
        .submit_signal("c1", quiz().with_source_id("sess-1"))
        .await
        .unwrap();
    assert_eq!(r.profile.total_signals, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn simultaneous_submissions_all_land() {
    let svc = ProfileService::new(Arc::new(InMemoryProfileStore::new()), {
        let mut cfg = EngineConfig::default();
        cfg.service.max_retries = 64;
        cfg
    });

    let base = svc.submit_signal("c1", quiz()).await.unwrap().profile.total_signals;

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let svc = svc.clone();
            tokio::spawn(async move {
                let s = if i % 2 == 0 { quiz() } else { purchase() };
                svc.submit_signal("c1", s).await
            })
        })
        .collect();

    for h in handles {
        h.await.unwrap().unwrap();
    }

    let stored = svc.profile("c1").await.unwrap().unwrap();
    assert_eq!(stored.total_signals, base + 16);
    assert_eq!(svc.history("c1", 100).len(), 17);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_entities_are_independent() {
    let svc = ProfileService::new(Arc::new(InMemoryProfileStore::new()), EngineConfig::default());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let svc = svc.clone();
            tokio::spawn(async move { svc.submit_signal(&format!("c{i}"), quiz()).await })
        })
        .collect();
    for h in handles {
        assert_eq!(h.await.unwrap().unwrap().profile.total_signals, 1);
    }
}
