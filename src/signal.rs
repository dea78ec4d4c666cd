//! Canonical signal record: one timestamped, confidence-weighted observation
//! about an entity's intents and traits.
//!
//! `RawSignal` is the lenient wire shape (string source, optional fields);
//! `Signal` is what the engine consumes. Conversion is where validation lives:
//! an unknown source is rejected, everything else is coerced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};
use tracing::warn;

use crate::adapters::SourceConfidenceConfig;
use crate::error::{EngineError, EngineResult};
use crate::vector::TraitVector;

/// Where an observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Quiz,
    Survey,
    Social,
    Purchase,
    Manual,
    Webhook,
    Import,
}

impl SignalSource {
    pub const ALL: [SignalSource; 7] = [
        SignalSource::Quiz,
        SignalSource::Survey,
        SignalSource::Social,
        SignalSource::Purchase,
        SignalSource::Manual,
        SignalSource::Webhook,
        SignalSource::Import,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalSource::Quiz => "quiz",
            SignalSource::Survey => "survey",
            SignalSource::Social => "social",
            SignalSource::Purchase => "purchase",
            SignalSource::Manual => "manual",
            SignalSource::Webhook => "webhook",
            SignalSource::Import => "import",
        }
    }

    /// Built-in trust level of the source, used when a signal carries no confidence.
    pub fn default_confidence(&self) -> f64 {
        match self {
            SignalSource::Quiz => 0.8,
            SignalSource::Survey => 0.6,
            SignalSource::Social => 0.4,
            SignalSource::Purchase => 1.0,
            SignalSource::Manual => 0.9,
            SignalSource::Webhook => 0.5,
            SignalSource::Import => 0.5,
        }
    }
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalSource {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_lowercase();
        SignalSource::ALL
            .into_iter()
            .find(|src| src.as_str() == norm)
            .ok_or_else(|| EngineError::validation("source", format!("unknown source `{}`", s.trim())))
    }
}

/// Immutable observation fed to the merge engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub source: SignalSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default)]
    pub intent_vector: TraitVector,
    #[serde(default)]
    pub trait_vector: TraitVector,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    /// Opaque to the engine.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Signal {
    pub fn new(source: SignalSource, confidence: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            source,
            source_id: None,
            source_name: None,
            intent_vector: TraitVector::new(),
            trait_vector: TraitVector::new(),
            confidence: clamp_confidence(confidence),
            timestamp,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_intent(mut self, key: impl Into<String>, value: f64) -> Self {
        self.intent_vector.insert(key.into(), value);
        self
    }

    pub fn with_trait(mut self, key: impl Into<String>, value: f64) -> Self {
        self.trait_vector.insert(key.into(), value);
        self
    }

    pub fn with_intent_vector(mut self, v: TraitVector) -> Self {
        self.intent_vector = v;
        self
    }

    pub fn with_trait_vector(mut self, v: TraitVector) -> Self {
        self.trait_vector = v;
        self
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Confidence as the engine uses it: clamped into `[0, 1]`, NaN read as 0.
    pub fn effective_confidence(&self) -> f64 {
        clamp_confidence(self.confidence)
    }
}

/// Lenient inbound shape. Missing vectors are empty, missing confidence falls back
/// to the source default, missing timestamp means "now".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSignal {
    pub source: String,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub intent_vector: Option<TraitVector>,
    #[serde(default)]
    pub trait_vector: Option<TraitVector>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl RawSignal {
    pub fn into_signal(
        self,
        confidences: &SourceConfidenceConfig,
        now: DateTime<Utc>,
    ) -> EngineResult<Signal> {
        let source: SignalSource = self.source.parse()?;

        let confidence = match self.confidence {
            Some(c) => {
                let clamped = clamp_confidence(c);
                if clamped != c {
                    warn!(%source, raw = c, clamped, "signal confidence out of range, clamped");
                }
                clamped
            }
            None => confidences.confidence_for(source),
        };

        Ok(Signal {
            source,
            source_id: self.source_id,
            source_name: self.source_name,
            intent_vector: self.intent_vector.unwrap_or_default(),
            trait_vector: self.trait_vector.unwrap_or_default(),
            confidence,
            timestamp: self.timestamp.unwrap_or(now),
            metadata: self.metadata,
        })
    }
}

fn clamp_confidence(c: f64) -> f64 {
    if c.is_nan() {
        0.0
    } else {
        c.clamp(0.0, 1.0)
    }
}
