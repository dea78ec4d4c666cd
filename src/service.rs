//! # Profile Service
//!
//! The single mutating entry point: `submit_signal(entity_id, signal)`.
//!
//! Each attempt reads the current profile together with its version, runs the
//! pure merge, and writes back conditioned on that version. When a concurrent
//! writer wins, the whole merge is recomputed against the fresh profile; a stale
//! result is never written. After `max_retries` lost races the caller gets
//! `EngineError::Conflict`.
//!
//! Signals for different entities never share state here; signals for the same
//! entity are serialised by the store's conditional write.

use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::SignalAdapters;
use crate::config::EngineConfig;
use crate::engine::merge_signal_into_profile;
use crate::error::{EngineError, EngineResult};
use crate::history::{AuditEntry, MergeHistory};
use crate::metrics;
use crate::profile::{CognitiveProfile, MergeResult};
use crate::signal::{RawSignal, Signal};
use crate::store::{CasOutcome, ProfileStore};

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn ProfileStore>,
    config: Arc<EngineConfig>,
    adapters: SignalAdapters,
    history: Arc<MergeHistory>,
    /// `source_id`s already merged, per entity. Only used when de-duplication is on.
    /// Process-local; lost on restart.
    seen: Arc<DashMap<String, SeenIds>>,
}

/// The most recent `dedup_window` source ids of one entity.
#[derive(Debug, Default)]
struct SeenIds {
    order: VecDeque<String>,
    ids: HashSet<String>,
}

impl SeenIds {
    /// `false` when `id` is already inside the window.
    fn claim(&mut self, id: &str, window: usize) -> bool {
        if !self.ids.insert(id.to_string()) {
            return false;
        }
        self.order.push_back(id.to_string());
        while self.order.len() > window {
            if let Some(old) = self.order.pop_front() {
                self.ids.remove(&old);
            }
        }
        true
    }

    fn release(&mut self, id: &str) {
        if self.ids.remove(id) {
            self.order.retain(|x| x != id);
        }
    }
}

impl ProfileService {
    /// The config is sanitised here, so the blend cap and coefficients hold no
    /// matter how the caller built it.
    pub fn new(store: Arc<dyn ProfileStore>, config: EngineConfig) -> Self {
        let config = config.sanitized();
        let history = MergeHistory::with_capacity(config.service.history_capacity);
        let adapters = SignalAdapters::new(config.adapters.clone());
        Self {
            store,
            config: Arc::new(config),
            adapters,
            history: Arc::new(history),
            seen: Arc::new(DashMap::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn adapters(&self) -> &SignalAdapters {
        &self.adapters
    }

    pub async fn profile(&self, entity_id: &str) -> EngineResult<Option<CognitiveProfile>> {
        self.store.get(entity_id).await
    }

    pub fn history(&self, entity_id: &str, n: usize) -> Vec<AuditEntry> {
        self.history.snapshot_last_n(entity_id, n)
    }

    /// Validate a wire-shaped signal, then submit it.
    pub async fn submit_raw(&self, entity_id: &str, raw: RawSignal) -> EngineResult<MergeResult> {
        let signal = raw
            .into_signal(&self.config.adapters.source_confidence, Utc::now())
            .inspect_err(|e| {
                metrics::record_rejected(e.kind());
                warn!(entity_id, error = %e, "signal rejected");
            })?;
        self.submit_signal(entity_id, signal).await
    }

    /// Merge `signal` into the entity's profile and persist the result.
    ///
    /// Re-submitting an identical signal counts as a second observation unless
    /// `dedup_by_source_id` is enabled and the signal carries a `source_id`.
    pub async fn submit_signal(&self, entity_id: &str, signal: Signal) -> EngineResult<MergeResult> {
        let claimed = self.claim_source_id(entity_id, &signal)?;

        let outcome = self.merge_with_retry(entity_id, &signal).await;
        if outcome.is_err() {
            if let Some(id) = claimed {
                self.release_source_id(entity_id, &id);
            }
        }
        outcome
    }

    async fn merge_with_retry(&self, entity_id: &str, signal: &Signal) -> EngineResult<MergeResult> {
        let max_attempts = self.config.service.max_retries.max(1);

        for attempt in 1..=max_attempts {
            let current = self.store.get(entity_id).await?;
            let expected = current.as_ref().map_or(0, CognitiveProfile::version);

            let result =
                merge_signal_into_profile(current.as_ref(), signal, &self.config.merge, Utc::now());

            match self
                .store
                .compare_and_set(entity_id, expected, result.profile.clone())
                .await?
            {
                CasOutcome::Applied => {
                    debug!(
                        entity_id,
                        source = %signal.source,
                        attempt,
                        total_signals = result.profile.total_signals,
                        "profile updated"
                    );
                    metrics::record_merge(signal.source, result.weights.adjusted_weight);
                    self.history
                        .push(entity_id, AuditEntry::from_merge(signal, &result));
                    return Ok(result);
                }
                CasOutcome::Conflict { current_version } => {
                    metrics::record_conflict();
                    warn!(
                        entity_id,
                        attempt,
                        expected,
                        current_version,
                        store = self.store.name(),
                        "concurrent profile write, recomputing merge"
                    );
                }
            }
        }

        metrics::record_rejected("conflict");
        Err(EngineError::Conflict {
            entity_id: entity_id.to_string(),
            attempts: max_attempts,
        })
    }

    /// Reserve `source_id` for this entity. `Ok(None)` when de-duplication does not apply.
    fn claim_source_id(&self, entity_id: &str, signal: &Signal) -> EngineResult<Option<String>> {
        if !self.config.service.dedup_by_source_id {
            return Ok(None);
        }
        let Some(id) = signal.source_id.as_deref() else {
            return Ok(None);
        };

        let window = self.config.service.dedup_window;
        let mut seen = self.seen.entry(entity_id.to_string()).or_default();
        if !seen.claim(id, window) {
            metrics::record_rejected("duplicate");
            return Err(EngineError::Duplicate {
                entity_id: entity_id.to_string(),
                source_id: id.to_string(),
            });
        }
        Ok(Some(id.to_string()))
    }

    fn release_source_id(&self, entity_id: &str, source_id: &str) {
        if let Some(mut seen) = self.seen.get_mut(entity_id) {
            seen.release(source_id);
        }
    }
}
