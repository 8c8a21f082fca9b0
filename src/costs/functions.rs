//! Built-in cost functions.
//!
//! All costs are evaluated from an earlier-frame `source` to a later-frame
//! `target`, are pure, and never return infinity.

use std::collections::BTreeMap;

use crate::TrackableObject;

/// Per-feature penalty weights, keyed by feature name.
pub type FeaturePenalties = BTreeMap<String, f64>;

/// Scaling applied to each normalized feature difference.
///
/// Empirical tuning constant kept for compatibility with existing settings.
pub const FEATURE_PENALTY_SCALE: f64 = 1.5;

/// Stand-in for an exact zero base cost in penalized costs.
///
/// Empirical guard: keeps penalized costs strictly positive so that
/// identical positions with different features still rank by penalty.
pub const ZERO_COST_EPSILON: f64 = f64::MIN_POSITIVE;

/// Squared euclidean distance between source and target positions.
///
/// Suited to diffusive (Brownian) motion, where the squared displacement
/// grows linearly with time.
#[inline]
pub fn square_distance(source: &TrackableObject, target: &TrackableObject) -> f64 {
    source.square_distance_to(target)
}

/// Normalized difference of one feature between two objects.
///
/// Computes `|f1 - f2| / (f1 + f2)`. Returns `None` if the feature is
/// missing on either side or the ratio is not finite, and 0 when the
/// values cancel out.
pub fn normalized_diff(source: &TrackableObject, target: &TrackableObject, feature: &str) -> Option<f64> {
    let a = source.feature(feature)?;
    let b = target.feature(feature)?;
    if a.is_nan() || b.is_nan() {
        return None;
    }
    if a == -b {
        return Some(0.0);
    }
    let ndiff = (a - b).abs() / (a + b);
    ndiff.is_finite().then_some(ndiff)
}

/// Multiplicative penalty factor `(1 + Σ w_f · 1.5 · ndiff_f)²`.
pub fn penalty_factor(source: &TrackableObject, target: &TrackableObject, penalties: &FeaturePenalties) -> f64 {
    let penalty: f64 = penalties
        .iter()
        .filter_map(|(feature, weight)| {
            normalized_diff(source, target, feature).map(|ndiff| weight * FEATURE_PENALTY_SCALE * ndiff)
        })
        .sum();
    (1.0 + penalty) * (1.0 + penalty)
}

/// Apply feature penalties on top of a base cost.
///
/// An exact zero base cost is replaced by `ZERO_COST_EPSILON`.
#[inline]
pub fn penalized(base: f64, source: &TrackableObject, target: &TrackableObject, penalties: &FeaturePenalties) -> f64 {
    let base = if base == 0.0 { ZERO_COST_EPSILON } else { base };
    base * penalty_factor(source, target, penalties)
}

/// Feature-penalty-weighted squared distance.
///
/// `cost = d² · (1 + Σ penalty_f)²`
pub fn feature_penalty(source: &TrackableObject, target: &TrackableObject, penalties: &FeaturePenalties) -> f64 {
    penalized(square_distance(source, target), source, target, penalties)
}
