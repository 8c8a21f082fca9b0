//! Frame-to-frame linking.
//!
//! One sparse LAP per pair of consecutive present frames. Pairs are solved
//! concurrently on the current rayon pool; each task returns its own links
//! and the results are merged in frame order by the caller.

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::debug;

use crate::costs::CostFunction;
use crate::lap::{link, AlternativeCost, CandidateBuilder, Link};
use crate::progress::{CancelToken, ProgressLogger};
use crate::settings::LinkingSettings;
use crate::{ObjectCollection, ObjectId, Result, TrackableObject};

/// A realized frame-to-frame link.
pub type FrameLink = Link<ObjectId, ObjectId>;

/// Admissibility filter for frame-to-frame candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LinkingThreshold {
    /// Admit costs strictly below the squared distance.
    MaxDistance(f64),
    /// Admit overlap costs corresponding to an IoU of at least this value.
    MinOverlap(f64),
}

impl LinkingThreshold {
    /// Whether a candidate with this cost may be linked.
    #[inline]
    pub fn admits(&self, cost: f64) -> bool {
        match *self {
            LinkingThreshold::MaxDistance(max_distance) => cost < max_distance * max_distance,
            LinkingThreshold::MinOverlap(min_iou) => cost <= 1.0 - min_iou && cost < 1.0,
        }
    }
}

/// Link the objects of one frame to the objects of the next present frame.
///
/// # Arguments
/// * `sources` - Objects of the earlier frame
/// * `targets` - Objects of the later frame
/// * `cost` - Cost function
/// * `threshold` - Admissibility filter
/// * `alternative_cost_factor` - Multiplier applied to the largest candidate cost
///
/// # Returns
/// Links ordered by source id. Each source and each target appears at most once.
pub fn link_frame_pair(
    sources: &[TrackableObject],
    targets: &[TrackableObject],
    cost: &CostFunction,
    threshold: LinkingThreshold,
    alternative_cost_factor: f64,
) -> Result<Vec<FrameLink>> {
    let row = |source: &TrackableObject| -> Vec<(ObjectId, ObjectId, f64)> {
        targets
            .iter()
            .filter_map(|target| {
                let c = cost.cost(source, target);
                threshold.admits(c).then_some((source.id, target.id, c))
            })
            .collect()
    };

    // Overlap costs are expensive enough to spread rows over the pool.
    let rows: Vec<Vec<(ObjectId, ObjectId, f64)>> = if cost.is_geometric() {
        sources.par_iter().map(row).collect()
    } else {
        sources.iter().map(row).collect()
    };

    let mut builder = CandidateBuilder::new();
    for (source, target, c) in rows.into_iter().flatten() {
        builder.push(source, target, c);
    }
    match builder.build(AlternativeCost::new(alternative_cost_factor, 1.0))? {
        Some(candidates) => link(&candidates),
        None => Ok(Vec::new()),
    }
}

/// Link every pair of consecutive present frames.
///
/// Must run inside the pool that should execute the frame-pair tasks.
/// Cancellation is checked before each task starts. Progress covers the
/// first half of the run.
///
/// # Returns
/// All links, ordered by frame pair then by source id.
pub fn link_all_frames(
    objects: &ObjectCollection,
    settings: &LinkingSettings,
    cancel: &CancelToken,
    logger: &dyn ProgressLogger,
) -> Result<Vec<FrameLink>> {
    let pairs = objects.frame_pairs();
    if pairs.is_empty() {
        return Ok(Vec::new());
    }
    let cost = settings.cost_function();
    let threshold = settings.threshold();
    let completed = AtomicUsize::new(0);

    let per_pair: Vec<Vec<FrameLink>> = pairs
        .par_iter()
        .map(|&(frame, next)| {
            cancel.check()?;
            let links = link_frame_pair(
                objects.objects_in(frame),
                objects.objects_in(next),
                &cost,
                threshold,
                settings.alternative_cost_factor,
            )?;
            let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
            logger.set_progress(0.5 * done as f64 / pairs.len() as f64);
            Ok(links)
        })
        .collect::<Result<_>>()?;

    let links: Vec<FrameLink> = per_pair.into_iter().flatten().collect();
    debug!(
        frame_pairs = pairs.len(),
        links = links.len(),
        cost = cost.name(),
        "frame-to-frame linking done"
    );
    Ok(links)
}
