//! Segment cost matrix: gap closing, splitting and merging candidates.
//!
//! Rows and columns are keyed by an object plus the role it plays:
//!
//! | Event       | Row                  | Column                 | Frame gap          |
//! |-------------|----------------------|------------------------|--------------------|
//! | gap closing | `SegmentEnd(tail)`   | `SegmentStart(head)`   | 1..=max_frame_gap  |
//! | splitting   | `SplitSource(point)` | `SegmentStart(head)`   | 1                  |
//! | merging     | `SegmentEnd(tail)`   | `MergeTarget(point)`   | 1                  |
//!
//! A split source is any object of a segment, its tail included; a merge
//! target is any object of a segment, its head included. A tail that can
//! split also gets `SegmentEnd(tail) -> SegmentStart(head)` entries at the
//! splitting cost, so that a division at the tail reaches both daughters
//! even with gap closing off. Candidates never link a segment to itself.
//! Costs are always distance based.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use super::segments::TrackSegment;
use crate::costs::{CostFunction, FeaturePenalties};
use crate::lap::{AlternativeCost, CandidateBuilder, LinkCandidates};
use crate::settings::SegmentSettings;
use crate::{Error, ObjectCollection, ObjectId, Result, TrackableObject};

/// Row key of the segment matrix.
///
/// Ordered by role, then frame, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentSource {
    /// Tail of a segment, for gap closing and merging.
    SegmentEnd(i32, ObjectId),
    /// Any object of a segment, for splitting.
    SplitSource(i32, ObjectId),
}

impl SegmentSource {
    pub fn object(&self) -> ObjectId {
        match *self {
            SegmentSource::SegmentEnd(_, id) | SegmentSource::SplitSource(_, id) => id,
        }
    }

    pub fn frame(&self) -> i32 {
        match *self {
            SegmentSource::SegmentEnd(frame, _) | SegmentSource::SplitSource(frame, _) => frame,
        }
    }
}

/// Column key of the segment matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SegmentTarget {
    /// Head of a segment, for gap closing and splitting.
    SegmentStart(i32, ObjectId),
    /// Any object of a segment, for merging.
    MergeTarget(i32, ObjectId),
}

impl SegmentTarget {
    pub fn object(&self) -> ObjectId {
        match *self {
            SegmentTarget::SegmentStart(_, id) | SegmentTarget::MergeTarget(_, id) => id,
        }
    }

    pub fn frame(&self) -> i32 {
        match *self {
            SegmentTarget::SegmentStart(frame, _) | SegmentTarget::MergeTarget(frame, _) => frame,
        }
    }
}

/// Segment candidates with per-event counts.
#[derive(Debug, Clone)]
pub struct SegmentCandidates {
    /// `None` when no candidate was found.
    pub candidates: Option<LinkCandidates<SegmentSource, SegmentTarget>>,
    pub gap_closing: usize,
    pub splitting: usize,
    pub merging: usize,
}

impl SegmentCandidates {
    pub fn total(&self) -> usize {
        self.gap_closing + self.splitting + self.merging
    }
}

type Triplet = (SegmentSource, SegmentTarget, f64);

/// Objects of each frame, tagged with the segment they belong to.
type FrameIndex<'a> = BTreeMap<i32, Vec<(usize, &'a TrackableObject)>>;

struct EventCosts {
    gap_closing: Option<(CostFunction, f64)>,
    splitting: Option<(CostFunction, f64)>,
    merging: Option<(CostFunction, f64)>,
}

impl EventCosts {
    fn new(settings: &SegmentSettings) -> Self {
        let event = |allowed: bool, penalties: &FeaturePenalties, max_distance: f64| {
            allowed.then(|| (CostFunction::distance(penalties), max_distance * max_distance))
        };
        Self {
            gap_closing: event(
                settings.allow_gap_closing,
                &settings.gap_closing_feature_penalties,
                settings.gap_closing_max_distance,
            ),
            splitting: event(
                settings.allow_splitting,
                &settings.splitting_feature_penalties,
                settings.splitting_max_distance,
            ),
            merging: event(
                settings.allow_merging,
                &settings.merging_feature_penalties,
                settings.merging_max_distance,
            ),
        }
    }
}

/// Build the segment-level candidate matrix.
///
/// # Arguments
/// * `segments` - Segments from frame-to-frame linking
/// * `objects` - The objects the segments refer to
/// * `settings` - Event switches, thresholds and penalties
///
/// # Errors
/// `Error::InvalidInput` if a segment refers to an unknown object.
pub fn build_segment_candidates(
    segments: &[TrackSegment],
    objects: &ObjectCollection,
    settings: &SegmentSettings,
) -> Result<SegmentCandidates> {
    let lookup = |id: ObjectId| {
        objects
            .get(id)
            .ok_or_else(|| Error::InvalidInput(format!("segment refers to unknown object {}", id)))
    };

    let mut heads: FrameIndex = BTreeMap::new();
    let mut members: FrameIndex = BTreeMap::new();
    let mut resolved: Vec<Vec<&TrackableObject>> = Vec::with_capacity(segments.len());
    for (index, segment) in segments.iter().enumerate() {
        let chain = segment
            .objects()
            .iter()
            .map(|&(_, id)| lookup(id))
            .collect::<Result<Vec<_>>>()?;
        heads.entry(chain[0].frame).or_default().push((index, chain[0]));
        for &object in &chain {
            members.entry(object.frame).or_default().push((index, object));
        }
        resolved.push(chain);
    }

    let events = EventCosts::new(settings);
    let max_frame_gap = settings.max_frame_gap;
    let scale_by_gap = settings.gap_closing_scale_by_frame_gap;

    let rows: Vec<[Vec<Triplet>; 3]> = resolved
        .par_iter()
        .enumerate()
        .map(|(index, chain)| {
            let tail = chain[chain.len() - 1];
            let mut gap_closing = Vec::new();
            let mut splitting = Vec::new();
            let mut merging = Vec::new();

            let last = tail.frame.saturating_add(max_frame_gap);
            if let (Some((cost, max_cost)), true) = (&events.gap_closing, last > tail.frame) {
                for (&frame, candidates) in heads.range(tail.frame + 1..=last) {
                    let gap = (frame - tail.frame) as f64;
                    for &(other, head) in candidates {
                        if other == index {
                            continue;
                        }
                        let c = cost.cost(tail, head);
                        if !(c <= *max_cost) {
                            continue;
                        }
                        let c = if scale_by_gap { c / gap } else { c };
                        gap_closing.push((
                            SegmentSource::SegmentEnd(tail.frame, tail.id),
                            SegmentTarget::SegmentStart(head.frame, head.id),
                            c,
                        ));
                    }
                }
            }

            let next_frame = tail.frame.checked_add(1);
            if let (Some((cost, max_cost)), Some(next)) = (&events.merging, next_frame) {
                for &(other, point) in members.get(&next).into_iter().flatten() {
                    if other == index {
                        continue;
                    }
                    let c = cost.cost(tail, point);
                    if c <= *max_cost {
                        merging.push((
                            SegmentSource::SegmentEnd(tail.frame, tail.id),
                            SegmentTarget::MergeTarget(point.frame, point.id),
                            c,
                        ));
                    }
                }
            }

            if let Some((cost, max_cost)) = &events.splitting {
                for &point in chain {
                    let Some(next) = point.frame.checked_add(1) else { continue };
                    let is_tail = point.id == tail.id;
                    for &(other, head) in heads.get(&next).into_iter().flatten() {
                        if other == index {
                            continue;
                        }
                        let c = cost.cost(point, head);
                        if !(c <= *max_cost) {
                            continue;
                        }
                        splitting.push((
                            SegmentSource::SplitSource(point.frame, point.id),
                            SegmentTarget::SegmentStart(head.frame, head.id),
                            c,
                        ));
                        // A dividing tail needs its end row as well, so that
                        // both daughters can be reached.
                        let continued = gap_closing.iter().any(|(_, t, _)| t.object() == head.id);
                        if is_tail && !continued {
                            splitting.push((
                                SegmentSource::SegmentEnd(tail.frame, tail.id),
                                SegmentTarget::SegmentStart(head.frame, head.id),
                                c,
                            ));
                        }
                    }
                }
            }

            [gap_closing, splitting, merging]
        })
        .collect();

    let mut counts = [0usize; 3];
    let mut builder = CandidateBuilder::new();
    for row in rows {
        for (event, triplets) in row.into_iter().enumerate() {
            counts[event] += triplets.len();
            for (source, target, c) in triplets {
                builder.push(source, target, c);
            }
        }
    }

    let policy = AlternativeCost::new(settings.alternative_cost_factor, settings.cutoff_percentile);
    let candidates = builder.build(policy)?;
    debug!(
        segments = segments.len(),
        gap_closing = counts[0],
        splitting = counts[1],
        merging = counts[2],
        alternative_cost = candidates.as_ref().map(|c| c.alternative_cost),
        "segment candidates built"
    );

    Ok(SegmentCandidates {
        candidates,
        gap_closing: counts[0],
        splitting: counts[1],
        merging: counts[2],
    })
}
