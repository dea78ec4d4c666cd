//! # Vector Algebra
//!
//! Pure functions over labelled distributions (`label → weight`), used for both
//! the intent and the trait dimension of a profile.
//!
//! - `merge`: convex blend of two vectors over the union of their keys.
//! - `normalize`: scale so that `Σ|v| = 1`; an all-zero vector becomes empty.
//! - `delta`: signed per-key change, filtered by a small epsilon (audit only).
//! - `entropy`: Shannon entropy normalised to `[0, 1]`.
//! - `primary_key` / `top_n`: read helpers for downstream consumers.
//!
//! `TraitVector` is a `BTreeMap`, so iteration order (and therefore rounding and
//! tie-breaking) is identical on every platform.

use std::collections::BTreeMap;

/// Ordered mapping from label to weight.
pub type TraitVector = BTreeMap<String, f64>;

/// Values are rounded to this many decimal digits after normalisation.
pub const NORMALIZE_DECIMALS: i32 = 9;

/// Changes at or below this magnitude are not reported by `delta`.
pub const DELTA_EPSILON: f64 = 1e-4;

/// `result[k] = existing[k]·(1 − w) + incoming[k]·w`, missing keys read as 0.
pub fn merge(existing: &TraitVector, incoming: &TraitVector, incoming_weight: f64) -> TraitVector {
    let w = incoming_weight.clamp(0.0, 1.0);
    let keep = 1.0 - w;

    let mut out = TraitVector::new();
    for (k, &v) in existing {
        out.insert(k.clone(), finite_or_zero(v) * keep);
    }
    for (k, &v) in incoming {
        *out.entry(k.clone()).or_insert(0.0) += finite_or_zero(v) * w;
    }
    out
}

/// Scale every value by `1 / Σ|v|`. Zero (or non-finite) mass yields an empty map.
pub fn normalize(vector: &TraitVector) -> TraitVector {
    let total = l1_norm(vector);
    if total <= 0.0 || !total.is_finite() {
        return TraitVector::new();
    }

    vector
        .iter()
        .filter_map(|(k, &v)| {
            let scaled = round_to(finite_or_zero(v) / total, NORMALIZE_DECIMALS);
            (scaled != 0.0).then(|| (k.clone(), scaled))
        })
        .collect()
}

/// Signed `after[k] − before[k]` for every key whose change exceeds `DELTA_EPSILON`.
pub fn delta(before: &TraitVector, after: &TraitVector) -> TraitVector {
    let mut out = TraitVector::new();
    for k in before.keys().chain(after.keys()) {
        if out.contains_key(k) {
            continue;
        }
        let b = before.get(k).copied().unwrap_or(0.0);
        let a = after.get(k).copied().unwrap_or(0.0);
        let d = a - b;
        if d.abs() > DELTA_EPSILON {
            out.insert(k.clone(), d);
        }
    }
    out
}

/// Normalised Shannon entropy in `[0, 1]`.
///
/// `H = −Σ p·log2(p)` with `p = |v[k]| / Σ|v|`, divided by `log2(n)` where `n` is the
/// number of non-zero keys. Zero or one non-zero key gives `0.0`.
pub fn entropy(vector: &TraitVector) -> f64 {
    let masses: Vec<f64> = vector
        .values()
        .map(|&v| finite_or_zero(v).abs())
        .filter(|&v| v > 0.0)
        .collect();

    let n = masses.len();
    if n <= 1 {
        return 0.0;
    }

    let total: f64 = masses.iter().sum();
    let h: f64 = masses
        .iter()
        .map(|&m| {
            let p = m / total;
            -p * p.log2()
        })
        .sum();

    (h / (n as f64).log2()).clamp(0.0, 1.0)
}

/// Label with the largest value. Ties resolve to the lexicographically first label.
pub fn primary_key(vector: &TraitVector) -> Option<(&str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for (k, &v) in vector {
        match best {
            Some((_, bv)) if v <= bv => {}
            _ => best = Some((k.as_str(), v)),
        }
    }
    best
}

/// Up to `n` labels by descending value (stable on ties).
pub fn top_n(vector: &TraitVector, n: usize) -> Vec<(&str, f64)> {
    let mut all: Vec<(&str, f64)> = vector.iter().map(|(k, &v)| (k.as_str(), v)).collect();
    all.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    all.truncate(n);
    all
}

/// `Σ|v|`, ignoring non-finite entries.
pub fn l1_norm(vector: &TraitVector) -> f64 {
    vector.values().map(|&v| finite_or_zero(v).abs()).sum()
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn round_to(x: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (x * f).round() / f
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tv(pairs: &[(&str, f64)]) -> TraitVector {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn merge_blends_union_of_keys() {
        let a = tv(&[("learn", 1.0)]);
        let b = tv(&[("purchase_intent", 1.0)]);
        let m = merge(&a, &b, 0.5);
        assert_eq!(m, tv(&[("learn", 0.5), ("purchase_intent", 0.5)]));
    }

    #[test]
    fn merge_with_full_weight_takes_incoming() {
        let a = tv(&[("x", 0.3), ("y", 0.7)]);
        let b = tv(&[("y", 2.0)]);
        let m = merge(&a, &b, 1.0);
        assert_eq!(m.get("x"), Some(&0.0));
        assert_eq!(m.get("y"), Some(&2.0));
    }

    #[test]
    fn normalize_scales_to_unit_mass() {
        let n = normalize(&tv(&[("a", 2.0), ("b", 6.0)]));
        assert!((n["a"] - 0.25).abs() < 1e-12);
        assert!((n["b"] - 0.75).abs() < 1e-12);
        assert!((l1_norm(&n) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normalize_all_zero_is_empty_not_nan() {
        assert!(normalize(&tv(&[("a", 0.0), ("b", 0.0)])).is_empty());
        assert!(normalize(&TraitVector::new()).is_empty());
        assert!(normalize(&tv(&[("a", f64::NAN)])).is_empty());
    }

    #[test]
    fn normalize_keeps_sign() {
        let n = normalize(&tv(&[("up", 3.0), ("down", -1.0)]));
        assert!((n["up"] - 0.75).abs() < 1e-12);
        assert!((n["down"] + 0.25).abs() < 1e-12);
    }

    #[test]
    fn delta_filters_small_changes() {
        let before = tv(&[("a", 0.5), ("b", 0.5)]);
        let after = tv(&[("a", 0.50001), ("b", 0.3), ("c", 0.2)]);
        let d = delta(&before, &after);
        assert!(!d.contains_key("a"));
        assert!((d["b"] + 0.2).abs() < 1e-12);
        assert!((d["c"] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn delta_reports_removed_keys() {
        let d = delta(&tv(&[("gone", 0.4)]), &TraitVector::new());
        assert!((d["gone"] + 0.4).abs() < 1e-12);
    }

    #[test]
    fn entropy_bounds() {
        assert_eq!(entropy(&TraitVector::new()), 0.0);
        assert_eq!(entropy(&tv(&[("only", 1.0)])), 0.0);
        assert!((entropy(&tv(&[("a", 0.5), ("b", 0.5)])) - 1.0).abs() < 1e-12);
        assert!((entropy(&tv(&[("a", 1.0), ("b", 1.0), ("c", 1.0)])) - 1.0).abs() < 1e-12);

        let skewed = entropy(&tv(&[("a", 0.9), ("b", 0.1)]));
        assert!(skewed > 0.0 && skewed < 1.0);
    }

    #[test]
    fn entropy_ignores_zero_keys() {
        let e = entropy(&tv(&[("a", 0.5), ("b", 0.5), ("c", 0.0)]));
        assert!((e - 1.0).abs() < 1e-12);
    }

    #[test]
    fn primary_key_and_top_n() {
        let v = tv(&[("b", 0.4), ("a", 0.4), ("c", 0.2)]);
        assert_eq!(primary_key(&v), Some(("a", 0.4)));
        assert_eq!(primary_key(&TraitVector::new()), None);

        let top = top_n(&v, 2);
        assert_eq!(top, vec![("a", 0.4), ("b", 0.4)]);
    }
}
