//! profile.rs — per-entity belief state and the output of a single merge.
//!
//! `CognitiveProfile` is what downstream consumers read (dashboards, the quiz
//! condition evaluator, AI context builders). It is only ever replaced by the
//! profile carried in a newer `MergeResult`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::signal::SignalSource;
use crate::vector::{self, TraitVector};

/// Which of the two distributions a read refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Intent,
    Trait,
}

/// Normalised intent/trait distributions plus derived uncertainty metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CognitiveProfile {
    pub intent_vector: TraitVector,
    pub trait_vector: TraitVector,
    /// Overall belief stability in `[0, 1]`.
    pub confidence_score: f64,
    /// EMA of recent change magnitude, `>= 0`.
    pub volatility_score: f64,
    /// Mean normalised entropy of the two vectors, `[0, 1]`.
    pub entropy_score: f64,
    pub total_signals: u64,
    pub signal_sources: BTreeSet<SignalSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<DateTime<Utc>>,
}

impl Default for CognitiveProfile {
    fn default() -> Self {
        Self::empty()
    }
}

impl CognitiveProfile {
    /// Starting point for an entity that has no profile yet: nothing known,
    /// maximal uncertainty, zero confidence.
    pub fn empty() -> Self {
        Self {
            intent_vector: TraitVector::new(),
            trait_vector: TraitVector::new(),
            confidence_score: 0.0,
            volatility_score: 0.0,
            entropy_score: 1.0,
            total_signals: 0,
            signal_sources: BTreeSet::new(),
            last_updated_at: None,
        }
    }

    /// Version tag for conditional writes. Grows by exactly one per accepted merge.
    pub fn version(&self) -> u64 {
        self.total_signals
    }

    pub fn vector(&self, dim: Dimension) -> &TraitVector {
        match dim {
            Dimension::Intent => &self.intent_vector,
            Dimension::Trait => &self.trait_vector,
        }
    }

    pub fn primary_intent(&self) -> Option<(&str, f64)> {
        vector::primary_key(&self.intent_vector)
    }

    pub fn primary_trait(&self) -> Option<(&str, f64)> {
        vector::primary_key(&self.trait_vector)
    }

    pub fn intent_value(&self, key: &str) -> f64 {
        self.intent_vector.get(key).copied().unwrap_or(0.0)
    }

    pub fn trait_value(&self, key: &str) -> f64 {
        self.trait_vector.get(key).copied().unwrap_or(0.0)
    }

    /// Threshold check used by branching conditions: `value(key) >= threshold`.
    pub fn meets_threshold(&self, dim: Dimension, key: &str, threshold: f64) -> bool {
        self.vector(dim).get(key).is_some_and(|&v| v >= threshold)
    }
}

/// Weights that were applied to the incoming signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedWeights {
    pub recency_weight: f64,
    pub signal_weight: f64,
    pub adjusted_weight: f64,
}

/// Output of one merge: the new profile plus what changed (audit only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    pub profile: CognitiveProfile,
    #[serde(default, skip_serializing_if = "TraitVector::is_empty")]
    pub delta_intent_vector: TraitVector,
    #[serde(default, skip_serializing_if = "TraitVector::is_empty")]
    pub delta_trait_vector: TraitVector,
    pub confidence_delta: f64,
    pub entropy_delta: f64,
    pub weights: AppliedWeights,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> CognitiveProfile {
        let mut p = CognitiveProfile::empty();
        p.intent_vector.insert("learn".into(), 0.5);
        p.intent_vector.insert("purchase_intent".into(), 0.5);
        p.trait_vector.insert("analytical".into(), 0.75);
        p.trait_vector.insert("social".into(), 0.25);
        p.total_signals = 3;
        p.signal_sources.insert(SignalSource::Quiz);
        p.signal_sources.insert(SignalSource::Purchase);
        p
    }

    #[test]
    fn empty_profile_starts_uncertain() {
        let p = CognitiveProfile::empty();
        assert_eq!(p.entropy_score, 1.0);
        assert_eq!(p.confidence_score, 0.0);
        assert_eq!(p.version(), 0);
        assert!(p.primary_intent().is_none());
    }

    #[test]
    fn readers_see_values_and_thresholds() {
        let p = sample();
        assert_eq!(p.primary_trait(), Some(("analytical", 0.75)));
        assert_eq!(p.primary_intent(), Some(("learn", 0.5)));
        assert_eq!(p.trait_value("missing"), 0.0);
        assert!(p.meets_threshold(Dimension::Trait, "analytical", 0.7));
        assert!(!p.meets_threshold(Dimension::Trait, "social", 0.3));
        assert!(!p.meets_threshold(Dimension::Intent, "nope", 0.0));
    }

    #[test]
    fn serialized_shape_is_stable() {
        let v = serde_json::to_value(sample()).unwrap();
        assert_eq!(v["total_signals"], json!(3));
        assert_eq!(v["signal_sources"], json!(["quiz", "purchase"]));
        assert_eq!(v["intent_vector"]["learn"], json!(0.5));
        assert!(v.get("last_updated_at").is_none());

        let back: CognitiveProfile = serde_json::from_value(v).unwrap();
        assert_eq!(back, sample());
    }
}
