//! # Merge Engine
//! Pure, testable logic that maps `(profile?, signal, config, now)` → `MergeResult`.
//! No I/O and no clock reads, suitable for unit tests and offline replay.
//!
//! Policy: the first signal defines the profile outright; every later signal is
//! blended in with an adjusted weight that never exceeds the configured cap
//! (0.5 by default), so accumulated history is never erased. Confidence blends
//! signal volume, concentration (1 − entropy) and freshness.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::MergeConfig;
use crate::profile::{AppliedWeights, CognitiveProfile, MergeResult};
use crate::signal::Signal;
use crate::vector::{self, TraitVector};
use crate::weighting;

/// Merge one signal into the current profile (or into an empty one).
pub fn merge_signal_into_profile(
    current: Option<&CognitiveProfile>,
    signal: &Signal,
    cfg: &MergeConfig,
    now: DateTime<Utc>,
) -> MergeResult {
    let empty = CognitiveProfile::empty();
    let before = current.unwrap_or(&empty);
    let n_before = before.total_signals;

    // 1) Weights
    let w = weighting::weigh(
        cfg,
        signal.timestamp,
        signal.effective_confidence(),
        n_before,
        now,
    );

    // 2) Blend each dimension independently
    let intent_vector = blend(&before.intent_vector, &signal.intent_vector, w.adjusted);
    let trait_vector = blend(&before.trait_vector, &signal.trait_vector, w.adjusted);

    // 3) Audit deltas
    let delta_intent_vector = vector::delta(&before.intent_vector, &intent_vector);
    let delta_trait_vector = vector::delta(&before.trait_vector, &trait_vector);

    // 4) Uncertainty metrics
    let entropy_score = profile_entropy(&intent_vector, &trait_vector);

    let change = (vector::l1_norm(&delta_intent_vector) + vector::l1_norm(&delta_trait_vector)) / 2.0;
    let volatility_raw = change * w.adjusted;
    let volatility_score = if n_before == 0 {
        volatility_raw
    } else {
        cfg.volatility_blend_prev * before.volatility_score + cfg.volatility_blend_new * volatility_raw
    };
    let volatility_score = volatility_score.max(0.0);

    let total_signals = n_before + 1;
    let confidence_score = confidence(cfg, total_signals, entropy_score, w.recency);

    let mut signal_sources = before.signal_sources.clone();
    signal_sources.insert(signal.source);

    let profile = CognitiveProfile {
        intent_vector,
        trait_vector,
        confidence_score,
        volatility_score,
        entropy_score,
        total_signals,
        signal_sources,
        last_updated_at: Some(now),
    };

    debug!(
        source = %signal.source,
        total_signals,
        recency = w.recency,
        signal_weight = w.signal,
        adjusted = w.adjusted,
        intent_keys = profile.intent_vector.len(),
        trait_keys = profile.trait_vector.len(),
        "merged signal"
    );

    MergeResult {
        confidence_delta: profile.confidence_score - before.confidence_score,
        entropy_delta: profile.entropy_score - before.entropy_score,
        profile,
        delta_intent_vector,
        delta_trait_vector,
        weights: AppliedWeights {
            recency_weight: w.recency,
            signal_weight: w.signal,
            adjusted_weight: w.adjusted,
        },
    }
}

/// Rebuild a profile from an ordered log of `(signal, merged_at)` pairs.
/// Returns `None` for an empty log (the profile would be absent).
pub fn replay<'a, I>(log: I, cfg: &MergeConfig) -> Option<CognitiveProfile>
where
    I: IntoIterator<Item = (&'a Signal, DateTime<Utc>)>,
{
    log.into_iter().fold(None, |acc, (signal, merged_at)| {
        Some(merge_signal_into_profile(acc.as_ref(), signal, cfg, merged_at).profile)
    })
}

/// Normalised blend of one dimension. A dimension the signal does not supply
/// is carried over untouched; full weight takes the incoming distribution as is.
///
/// Incoming magnitudes are merged as given, so `{engagement: 0.2}` pulls less than
/// `{engagement: 0.8}`. Only a vector with more than unit mass is scaled down to
/// unit mass, which keeps every established key at `>= (1 - weight)` of its value.
fn blend(existing: &TraitVector, incoming: &TraitVector, weight: f64) -> TraitVector {
    let mass = vector::l1_norm(incoming);
    if mass <= 0.0 || !mass.is_finite() {
        return existing.clone();
    }
    if weight >= 1.0 {
        return vector::normalize(incoming);
    }
    if mass > 1.0 {
        let scaled: TraitVector = incoming.iter().map(|(k, &v)| (k.clone(), v / mass)).collect();
        return vector::normalize(&vector::merge(existing, &scaled, weight));
    }
    vector::normalize(&vector::merge(existing, incoming, weight))
}

/// Mean normalised entropy over the dimensions that hold mass. An empty dimension
/// carries no information, so it neither concentrates nor diffuses the score; with
/// both empty the profile stays maximally uncertain.
fn profile_entropy(intent: &TraitVector, traits: &TraitVector) -> f64 {
    let parts: Vec<f64> = [intent, traits]
        .into_iter()
        .filter(|v| !v.is_empty())
        .map(vector::entropy)
        .collect();
    if parts.is_empty() {
        return 1.0;
    }
    (parts.iter().sum::<f64>() / parts.len() as f64).clamp(0.0, 1.0)
}

/// `w_signal·(1 − e^(−n/scale)) + w_entropy·(1 − entropy) + w_recency·recency`, clamped.
fn confidence(cfg: &MergeConfig, total_signals: u64, entropy: f64, recency: f64) -> f64 {
    let cw = &cfg.confidence_weights;
    let volume = 1.0 - (-(total_signals as f64) / cfg.signal_volume_scale).exp();
    (cw.signal * volume + cw.entropy * (1.0 - entropy) + cw.recency * recency).clamp(0.0, 1.0)
}
