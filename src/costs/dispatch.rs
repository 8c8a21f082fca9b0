//! Enum-based cost dispatch.
//!
//! `CostFunction` is the closed set of linking costs. Variants are selected
//! from settings when a run starts and evaluated through a single `match`.

use super::functions::{feature_penalty, penalized, square_distance, FeaturePenalties};
use super::overlap::OverlapCost;
use crate::TrackableObject;

/// Cost of linking a source object to a later target object.
#[derive(Debug, Clone, PartialEq)]
pub enum CostFunction {
    /// Squared euclidean distance.
    SquareDistance,
    /// Squared distance weighted by feature differences.
    FeaturePenalty(FeaturePenalties),
    /// One minus intersection over union of the object shapes.
    Overlap(OverlapCost),
    /// Overlap cost weighted by feature differences.
    OverlapFeaturePenalty(OverlapCost, FeaturePenalties),
}

impl CostFunction {
    /// Distance-based cost, penalized only if `penalties` is non-empty.
    pub fn distance(penalties: &FeaturePenalties) -> Self {
        if penalties.is_empty() {
            CostFunction::SquareDistance
        } else {
            CostFunction::FeaturePenalty(penalties.clone())
        }
    }

    /// Overlap-based cost, penalized only if `penalties` is non-empty.
    pub fn overlap(overlap: OverlapCost, penalties: &FeaturePenalties) -> Self {
        if penalties.is_empty() {
            CostFunction::Overlap(overlap)
        } else {
            CostFunction::OverlapFeaturePenalty(overlap, penalties.clone())
        }
    }

    /// Evaluate the cost of linking `source` to `target`.
    #[inline(always)]
    pub fn cost(&self, source: &TrackableObject, target: &TrackableObject) -> f64 {
        match self {
            CostFunction::SquareDistance => square_distance(source, target),
            CostFunction::FeaturePenalty(penalties) => feature_penalty(source, target, penalties),
            CostFunction::Overlap(overlap) => overlap.cost(source, target),
            CostFunction::OverlapFeaturePenalty(overlap, penalties) => {
                penalized(overlap.cost(source, target), source, target, penalties)
            }
        }
    }

    /// Whether evaluating the cost involves polygon geometry.
    pub fn is_geometric(&self) -> bool {
        matches!(self, CostFunction::Overlap(_) | CostFunction::OverlapFeaturePenalty(..))
    }

    /// Short name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            CostFunction::SquareDistance => "square_distance",
            CostFunction::FeaturePenalty(_) => "feature_penalty",
            CostFunction::Overlap(_) => "overlap",
            CostFunction::OverlapFeaturePenalty(..) => "overlap_feature_penalty",
        }
    }
}
