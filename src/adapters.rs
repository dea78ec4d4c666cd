//! # Signal Adapters
//!
//! Translate domain events from the collaborating systems into canonical
//! [`Signal`]s, encoding per-source trust once so callers don't have to:
//!
//! - quiz completion → confidence 0.8, vectors as scored by the quiz runtime
//! - survey response → confidence 0.6
//! - social-listening mention → confidence 0.4, sentiment → `engagement` intent
//! - purchase → confidence 1.0, order value → bounded `high_value` intent,
//!   repeat-buyer flag → `repeat_buyer` trait
//!
//! Default confidences can be overridden per source through the
//! `[adapters.source_confidence.confidences]` table of the engine config, or
//! replaced wholesale by a JSON file (`{"confidences": {"quiz": 0.9}}`) named in
//! `PROFILE_ENGINE_SOURCE_CONFIDENCE_PATH`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};
use tracing::warn;

use crate::config::AdapterConfig;
use crate::signal::{Signal, SignalSource};
use crate::vector::TraitVector;

pub const ENGAGEMENT_KEY: &str = "engagement";
pub const HIGH_VALUE_KEY: &str = "high_value";
pub const REPEAT_BUYER_KEY: &str = "repeat_buyer";

/// Per-source confidence overrides. Sources not listed use
/// [`SignalSource::default_confidence`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceConfidenceConfig {
    /// Keyed by source name (`quiz`, `survey`, ...).
    #[serde(default)]
    pub confidences: HashMap<String, f64>,
}

impl SourceConfidenceConfig {
    /// Load overrides from a JSON file. Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "invalid source confidence file, using defaults");
                Self::default_seed()
            }),
            Err(_) => Self::default_seed(),
        }
    }

    /// Explicit table of the built-in confidences.
    pub fn default_seed() -> Self {
        let confidences = SignalSource::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), s.default_confidence()))
            .collect();
        Self { confidences }
    }

    /// Override (case-insensitive) or the built-in default, clamped to `[0, 1]`.
    pub fn confidence_for(&self, source: SignalSource) -> f64 {
        let name = source.as_str();
        let hit = self.confidences.get(name).copied().or_else(|| {
            self.confidences
                .iter()
                .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
                .map(|(_, &v)| v)
        });
        match hit {
            Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
            _ => source.default_confidence(),
        }
    }
}

/// Scored quiz completion from the quiz runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizCompletion {
    pub quiz_id: String,
    #[serde(default)]
    pub quiz_name: Option<String>,
    /// Identifies this particular completion; used as `source_id`.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub intent_vector: TraitVector,
    #[serde(default)]
    pub trait_vector: TraitVector,
    pub completed_at: DateTime<Utc>,
}

/// Scored survey response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub survey_id: String,
    #[serde(default)]
    pub survey_name: Option<String>,
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub intent_vector: TraitVector,
    #[serde(default)]
    pub trait_vector: TraitVector,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Position on the `engagement` intent dimension.
    pub fn engagement(&self) -> f64 {
        match self {
            Sentiment::Positive => 0.8,
            Sentiment::Neutral => 0.5,
            Sentiment::Negative => 0.2,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }
}

/// Sentiment-scored mention from the social listening ingester.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialListeningEvent {
    #[serde(default)]
    pub mention_id: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    pub sentiment: Sentiment,
    pub detected_at: DateTime<Utc>,
}

/// Order from the CRM / order store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseEvent {
    pub transaction_id: String,
    #[serde(default)]
    pub category: Option<String>,
    pub order_value: f64,
    #[serde(default)]
    pub is_repeat_buyer: bool,
    pub purchased_at: DateTime<Utc>,
}

/// Stateless translator configured with the adapter tunables.
#[derive(Debug, Clone, Default)]
pub struct SignalAdapters {
    cfg: AdapterConfig,
}

impl SignalAdapters {
    pub fn new(cfg: AdapterConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.cfg
    }

    fn base(&self, source: SignalSource, at: DateTime<Utc>) -> Signal {
        Signal::new(source, self.cfg.source_confidence.confidence_for(source), at)
    }

    pub fn quiz(&self, ev: QuizCompletion) -> Signal {
        let mut s = self
            .base(SignalSource::Quiz, ev.completed_at)
            .with_intent_vector(ev.intent_vector)
            .with_trait_vector(ev.trait_vector)
            .with_metadata("quiz_id", ev.quiz_id);
        s.source_id = ev.session_id;
        s.source_name = ev.quiz_name;
        s
    }

    pub fn survey(&self, ev: SurveyResponse) -> Signal {
        let mut s = self
            .base(SignalSource::Survey, ev.answered_at)
            .with_intent_vector(ev.intent_vector)
            .with_trait_vector(ev.trait_vector)
            .with_metadata("survey_id", ev.survey_id);
        s.source_id = ev.response_id;
        s.source_name = ev.survey_name;
        s
    }

    pub fn social(&self, ev: SocialListeningEvent) -> Signal {
        let mut s = self
            .base(SignalSource::Social, ev.detected_at)
            .with_intent(ENGAGEMENT_KEY, ev.sentiment.engagement())
            .with_metadata("sentiment", ev.sentiment.as_str());
        s.source_id = ev.mention_id;
        s.source_name = ev.platform;
        s
    }

    pub fn purchase(&self, ev: PurchaseEvent) -> Signal {
        let value = order_value_score(ev.order_value, self.cfg.high_value_ceiling);
        let mut s = self
            .base(SignalSource::Purchase, ev.purchased_at)
            .with_intent(HIGH_VALUE_KEY, value)
            .with_trait(REPEAT_BUYER_KEY, if ev.is_repeat_buyer { 1.0 } else { 0.0 })
            .with_source_id(ev.transaction_id)
            .with_metadata("order_value", ev.order_value);
        if let Some(cat) = ev.category {
            s = s.with_metadata("category", cat);
        }
        s
    }
}

/// Order value mapped into `[0, 1]`, saturating at `ceiling`.
pub fn order_value_score(order_value: f64, ceiling: f64) -> f64 {
    if !order_value.is_finite() || order_value <= 0.0 || ceiling <= 0.0 {
        return 0.0;
    }
    (order_value / ceiling).clamp(0.0, 1.0)
}
