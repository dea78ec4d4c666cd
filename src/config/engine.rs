// src/config/engine.rs
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf};
use tracing::{info, warn};

use crate::adapters::SourceConfidenceConfig;

pub const DEFAULT_ENGINE_CONFIG_PATH: &str = "config/engine.toml";
pub const ENV_ENGINE_CONFIG_PATH: &str = "PROFILE_ENGINE_CONFIG_PATH";
pub const ENV_MAX_RETRIES: &str = "PROFILE_ENGINE_MAX_RETRIES";
pub const ENV_DEDUP: &str = "PROFILE_ENGINE_DEDUP";
pub const ENV_SOURCE_CONFIDENCE_PATH: &str = "PROFILE_ENGINE_SOURCE_CONFIDENCE_PATH";

/// Every tunable of the merge computation. `Default` is the reference instance:
/// recency 0.3 / confidence 0.4 (floor 0.3), 30-day grace, 0.95 decay per 30 days,
/// 50% blend cap, volatility EMA 0.7/0.3, confidence channels 0.4/0.4/0.2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    pub recency_coeff: f64,
    pub confidence_coeff: f64,
    pub decay_factor: f64,
    pub max_age_full_weight_days: f64,
    pub decay_step_days: f64,
    /// Divisor growth per absorbed signal in the adjusted weight.
    pub maturity_rate: f64,
    /// Upper bound of the blend fraction once a profile holds at least one signal.
    pub max_incoming_weight: f64,
    pub volatility_blend_prev: f64,
    pub volatility_blend_new: f64,
    pub confidence_weights: ConfidenceWeights,
    /// Signal count scale in `1 − e^(−n / scale)`.
    pub signal_volume_scale: f64,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            recency_coeff: 0.3,
            confidence_coeff: 0.4,
            decay_factor: 0.95,
            max_age_full_weight_days: 30.0,
            decay_step_days: 30.0,
            maturity_rate: 0.1,
            max_incoming_weight: 0.5,
            volatility_blend_prev: 0.7,
            volatility_blend_new: 0.3,
            confidence_weights: ConfidenceWeights::default(),
            signal_volume_scale: 5.0,
        }
    }
}

/// Weights of the three evidence channels of `confidence_score`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub signal: f64,
    pub entropy: f64,
    pub recency: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            signal: 0.4,
            entropy: 0.4,
            recency: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Read-merge-write attempts before surfacing a conflict.
    pub max_retries: u32,
    /// Reject a signal whose `source_id` was already merged for the same entity.
    pub dedup_by_source_id: bool,
    /// Source ids remembered per entity for de-duplication; older ids age out.
    pub dedup_window: usize,
    /// Audit entries retained per entity.
    pub history_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            dedup_by_source_id: false,
            dedup_window: 1000,
            history_capacity: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Order value at which the `high_value` purchase dimension saturates at 1.0.
    pub high_value_ceiling: f64,
    pub source_confidence: SourceConfidenceConfig,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            high_value_ceiling: 1000.0,
            source_confidence: SourceConfidenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub merge: MergeConfig,
    pub service: ServiceConfig,
    pub adapters: AdapterConfig,
}

impl EngineConfig {
    /// Resolve the config path from `PROFILE_ENGINE_CONFIG_PATH` (falling back to
    /// `config/engine.toml`), load it, then apply env overrides.
    /// A missing file at the default path yields defaults; a missing file at an
    /// explicitly configured path is an error.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = env::var(ENV_ENGINE_CONFIG_PATH).ok().map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENGINE_CONFIG_PATH));

        let cfg = if path.exists() {
            Self::load_from_file(&path)?
        } else if explicit.is_some() {
            anyhow::bail!(
                "{ENV_ENGINE_CONFIG_PATH} points to non-existent path {}",
                path.display()
            );
        } else {
            info!(path = %path.display(), "engine config not found, using defaults");
            Self::default()
        };

        Ok(cfg.with_env_overrides())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading engine config from {}", path.display()))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("parsing engine config {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let cfg: EngineConfig = toml::from_str(s)?;
        Ok(cfg.sanitized())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(n) = env::var(ENV_MAX_RETRIES)
            .ok()
            .and_then(|v| v.trim().parse::<u32>().ok())
        {
            self.service.max_retries = n;
        }
        if let Ok(v) = env::var(ENV_DEDUP) {
            self.service.dedup_by_source_id = matches!(v.trim(), "1" | "true" | "yes");
        }
        if let Ok(p) = env::var(ENV_SOURCE_CONFIDENCE_PATH) {
            self.adapters.source_confidence = SourceConfidenceConfig::load_from_file(p.trim());
        }
        self.sanitized()
    }

    /// Clamp every coefficient into a usable range, restoring defaults where a
    /// combination is unusable.
    pub fn sanitized(mut self) -> Self {
        let d = MergeConfig::default();
        let m = &mut self.merge;

        m.recency_coeff = clamp01_or(m.recency_coeff, d.recency_coeff);
        m.confidence_coeff = clamp01_or(m.confidence_coeff, d.confidence_coeff);
        if m.recency_coeff + m.confidence_coeff >= 1.0 {
            warn!(
                recency_coeff = m.recency_coeff,
                confidence_coeff = m.confidence_coeff,
                "coefficients leave no residual weight, restoring defaults"
            );
            m.recency_coeff = d.recency_coeff;
            m.confidence_coeff = d.confidence_coeff;
        }

        m.decay_factor = clamp01_or(m.decay_factor, d.decay_factor);
        if !(m.max_age_full_weight_days.is_finite() && m.max_age_full_weight_days >= 0.0) {
            m.max_age_full_weight_days = d.max_age_full_weight_days;
        }
        if !(m.decay_step_days.is_finite() && m.decay_step_days > 0.0) {
            m.decay_step_days = d.decay_step_days;
        }
        if !(m.maturity_rate.is_finite() && m.maturity_rate >= 0.0) {
            m.maturity_rate = d.maturity_rate;
        }
        if !(m.max_incoming_weight.is_finite()
            && m.max_incoming_weight > 0.0
            && m.max_incoming_weight <= 0.5)
        {
            warn!(
                max_incoming_weight = m.max_incoming_weight,
                "blend cap must be in (0, 0.5], restoring default"
            );
            m.max_incoming_weight = d.max_incoming_weight;
        }

        m.volatility_blend_prev = clamp01_or(m.volatility_blend_prev, d.volatility_blend_prev);
        m.volatility_blend_new = clamp01_or(m.volatility_blend_new, d.volatility_blend_new);

        let cw = &mut m.confidence_weights;
        cw.signal = clamp01_or(cw.signal, d.confidence_weights.signal);
        cw.entropy = clamp01_or(cw.entropy, d.confidence_weights.entropy);
        cw.recency = clamp01_or(cw.recency, d.confidence_weights.recency);

        if !(m.signal_volume_scale.is_finite() && m.signal_volume_scale > 0.0) {
            m.signal_volume_scale = d.signal_volume_scale;
        }

        if !(self.adapters.high_value_ceiling.is_finite() && self.adapters.high_value_ceiling > 0.0)
        {
            self.adapters.high_value_ceiling = AdapterConfig::default().high_value_ceiling;
        }
        if self.service.max_retries == 0 {
            self.service.max_retries = 1;
        }
        if self.service.dedup_window == 0 {
            self.service.dedup_window = 1;
        }

        self
    }
}

fn clamp01_or(x: f64, fallback: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        fallback
    }
}
