//! # Weighting Model
//!
//! Three pure functions decide how much an incoming signal may move a profile:
//!
//!   - `recency_weight`: full weight inside a grace window, then exponential decay
//!     in steps of `decay_step_days` (30 by default).
//!   - `signal_weight`: linear blend of recency and confidence plus a residual floor
//!     `1 − recency_coeff − confidence_coeff`.
//!   - `adjusted_weight`: the final blend fraction; `1.0` for the first signal,
//!     otherwise shrinking with accumulated evidence and capped at `max_incoming_weight`.
//!
//! No I/O, no clock reads; `age_days` takes `now` explicitly.

use chrono::{DateTime, Utc};

use crate::config::MergeConfig;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// `1.0` inside the grace window, `decay_factor ^ ((age − grace) / step)` beyond it.
pub fn recency_weight(
    signal_age_days: f64,
    max_age_full_weight: f64,
    decay_factor: f64,
    decay_step_days: f64,
) -> f64 {
    let age = if signal_age_days.is_finite() {
        signal_age_days.max(0.0)
    } else {
        0.0
    };
    if age <= max_age_full_weight {
        return 1.0;
    }
    let step = if decay_step_days > 0.0 { decay_step_days } else { 30.0 };
    decay_factor
        .clamp(0.0, 1.0)
        .powf((age - max_age_full_weight) / step)
}

/// `recency·recency_coeff + confidence·confidence_coeff + (1 − recency_coeff − confidence_coeff)`.
///
/// The residual term is a floor: a signal with zero recency and zero confidence still
/// carries `1 − recency_coeff − confidence_coeff` (0.3 with default coefficients).
pub fn signal_weight(
    recency_weight: f64,
    confidence: f64,
    recency_coeff: f64,
    confidence_coeff: f64,
) -> f64 {
    let floor = 1.0 - recency_coeff - confidence_coeff;
    recency_weight * recency_coeff + confidence * confidence_coeff + floor
}

/// Blend fraction given to the incoming signal.
///
/// `1.0` when the profile has absorbed nothing yet; otherwise
/// `min(signal_weight / (1 + total_signals_before · maturity_rate), max_incoming_weight)`.
pub fn adjusted_weight(
    signal_weight: f64,
    total_signals_before: u64,
    maturity_rate: f64,
    max_incoming_weight: f64,
) -> f64 {
    if total_signals_before == 0 {
        return 1.0;
    }
    let divisor = 1.0 + total_signals_before as f64 * maturity_rate;
    (signal_weight / divisor).min(max_incoming_weight)
}

/// Age of an observation in fractional days. Future timestamps count as age 0.
pub fn age_days(observed_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let ms = (now - observed_at).num_milliseconds().max(0);
    ms as f64 / MILLIS_PER_DAY
}

/// Weights computed for one signal, kept together for logging and audit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalWeights {
    pub recency: f64,
    pub signal: f64,
    pub adjusted: f64,
}

/// Run the full weighting chain for one signal under `cfg`.
pub fn weigh(
    cfg: &MergeConfig,
    observed_at: DateTime<Utc>,
    confidence: f64,
    total_signals_before: u64,
    now: DateTime<Utc>,
) -> SignalWeights {
    let recency = recency_weight(
        age_days(observed_at, now),
        cfg.max_age_full_weight_days,
        cfg.decay_factor,
        cfg.decay_step_days,
    );
    let signal = signal_weight(
        recency,
        confidence,
        cfg.recency_coeff,
        cfg.confidence_coeff,
    );
    let adjusted = adjusted_weight(
        signal,
        total_signals_before,
        cfg.maturity_rate,
        cfg.max_incoming_weight,
    );
    SignalWeights {
        recency,
        signal,
        adjusted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn recency_full_inside_grace_window() {
        assert_eq!(recency_weight(0.0, 30.0, 0.95, 30.0), 1.0);
        assert_eq!(recency_weight(30.0, 30.0, 0.95, 30.0), 1.0);
    }

    #[test]
    fn recency_decays_in_thirty_day_steps() {
        let w60 = recency_weight(60.0, 30.0, 0.95, 30.0);
        assert!((w60 - 0.95).abs() < 1e-12);
        let w90 = recency_weight(90.0, 30.0, 0.95, 30.0);
        assert!((w90 - 0.9025).abs() < 1e-12);
        let w45 = recency_weight(45.0, 30.0, 0.95, 30.0);
        assert!(w45 < 1.0 && w45 > w60);
    }

    #[test]
    fn signal_weight_has_residual_floor() {
        assert!((signal_weight(1.0, 0.8, 0.3, 0.4) - 0.92).abs() < 1e-12);
        assert!((signal_weight(0.0, 0.0, 0.3, 0.4) - 0.3).abs() < 1e-12);
        assert!((signal_weight(1.0, 1.0, 0.3, 0.4) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn adjusted_weight_first_signal_and_cap() {
        assert_eq!(adjusted_weight(0.3, 0, 0.1, 0.5), 1.0);
        assert_eq!(adjusted_weight(0.92, 1, 0.1, 0.5), 0.5);
        assert!((adjusted_weight(0.3, 10, 0.1, 0.5) - 0.15).abs() < 1e-12);
    }

    #[test]
    fn adjusted_weight_shrinks_as_profile_matures() {
        let early = adjusted_weight(0.6, 2, 0.1, 0.5);
        let late = adjusted_weight(0.6, 50, 0.1, 0.5);
        assert!(late < early);
        assert!(late > 0.0);
    }

    #[test]
    fn future_timestamps_have_zero_age() {
        let now = Utc::now();
        assert_eq!(age_days(now + Duration::days(3), now), 0.0);
        assert!((age_days(now - Duration::days(2), now) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn weigh_uses_config_defaults() {
        let now = Utc::now();
        let w = weigh(&MergeConfig::default(), now, 1.0, 2, now);
        assert_eq!(w.recency, 1.0);
        assert!((w.signal - 1.0).abs() < 1e-12);
        assert_eq!(w.adjusted, 0.5);
    }
}
