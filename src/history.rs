//! history.rs — bounded in-memory audit log of merges, per entity.
//!
//! Each entry is a compact fingerprint of one accepted merge: which source moved
//! the profile, with what weight, and the signed deltas it produced.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;

use crate::profile::{AppliedWeights, MergeResult};
use crate::signal::{Signal, SignalSource};
use crate::vector::TraitVector;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub merged_at: DateTime<Utc>,
    pub source: SignalSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// `total_signals` after this merge.
    pub total_signals: u64,
    pub weights: AppliedWeights,
    pub delta_intent_vector: TraitVector,
    pub delta_trait_vector: TraitVector,
    pub confidence_delta: f64,
    pub entropy_delta: f64,
}

impl AuditEntry {
    pub fn from_merge(signal: &Signal, result: &MergeResult) -> Self {
        Self {
            merged_at: result.profile.last_updated_at.unwrap_or_else(Utc::now),
            source: signal.source,
            source_id: signal.source_id.clone(),
            total_signals: result.profile.total_signals,
            weights: result.weights,
            delta_intent_vector: result.delta_intent_vector.clone(),
            delta_trait_vector: result.delta_trait_vector.clone(),
            confidence_delta: result.confidence_delta,
            entropy_delta: result.entropy_delta,
        }
    }
}

#[derive(Debug)]
pub struct MergeHistory {
    inner: DashMap<String, VecDeque<AuditEntry>>,
    cap: usize,
}

impl MergeHistory {
    /// `cap` entries are kept per entity (at most 10 000, at least 1).
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: DashMap::new(),
            cap: cap.clamp(1, 10_000),
        }
    }

    /// Insert keeping the log ordered by `total_signals`. Concurrent writers of
    /// one entity may record their merges out of commit order.
    pub fn push(&self, entity_id: &str, entry: AuditEntry) {
        let mut log = self.inner.entry(entity_id.to_string()).or_default();
        let at = log
            .iter()
            .rposition(|e| e.total_signals <= entry.total_signals)
            .map_or(0, |i| i + 1);
        log.insert(at, entry);
        while log.len() > self.cap {
            log.pop_front();
        }
    }

    /// Newest-last slice of at most `n` entries.
    pub fn snapshot_last_n(&self, entity_id: &str, n: usize) -> Vec<AuditEntry> {
        match self.inner.get(entity_id) {
            Some(log) => {
                let start = log.len().saturating_sub(n);
                log.iter().skip(start).cloned().collect()
            }
            None => Vec::new(),
        }
    }
}
