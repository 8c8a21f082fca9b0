//! Segment linking: solve the segment matrix and reconcile into edges.

use std::collections::BTreeMap;

use tracing::debug;

use super::segment_costs::{SegmentSource, SegmentTarget};
use crate::lap::{link, LinkCandidates};
use crate::{ObjectId, Result};

/// Kind of segment-level event realized by a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentEvent {
    GapClosing,
    Splitting,
    Merging,
}

impl SegmentEvent {
    /// Event encoded by a row/column role pair.
    ///
    /// A tail's end row continuing into a head reads as gap closing, even
    /// when it was admitted for a division at the tail.
    pub fn classify(source: SegmentSource, target: SegmentTarget) -> Self {
        match (source, target) {
            (SegmentSource::SplitSource(..), _) => SegmentEvent::Splitting,
            (SegmentSource::SegmentEnd(..), SegmentTarget::MergeTarget(..)) => SegmentEvent::Merging,
            (SegmentSource::SegmentEnd(..), SegmentTarget::SegmentStart(..)) => SegmentEvent::GapClosing,
        }
    }
}

/// An edge to add to the linkage graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentLink {
    pub source: ObjectId,
    pub target: ObjectId,
    pub cost: f64,
    pub event: SegmentEvent,
}

/// Solve the segment matrix once and translate the matching into edges.
///
/// A row and a column are different roles of objects, so the same object
/// pair can be linked through two roles (e.g. a tail both gap-closing and
/// splitting to the same head). Only the cheaper of such edges is kept.
///
/// # Returns
/// Links ordered by (source, target).
pub fn link_segments(candidates: &LinkCandidates<SegmentSource, SegmentTarget>) -> Result<Vec<SegmentLink>> {
    let mut edges: BTreeMap<(ObjectId, ObjectId), SegmentLink> = BTreeMap::new();
    for l in link(candidates)? {
        let edge = SegmentLink {
            source: l.source.object(),
            target: l.target.object(),
            cost: l.cost,
            event: SegmentEvent::classify(l.source, l.target),
        };
        edges
            .entry((edge.source, edge.target))
            .and_modify(|kept| {
                if edge.cost < kept.cost {
                    *kept = edge;
                }
            })
            .or_insert(edge);
    }

    let links: Vec<SegmentLink> = edges.into_values().collect();
    debug!(
        gap_closing = links.iter().filter(|l| l.event == SegmentEvent::GapClosing).count(),
        splitting = links.iter().filter(|l| l.event == SegmentEvent::Splitting).count(),
        merging = links.iter().filter(|l| l.event == SegmentEvent::Merging).count(),
        "segment links realized"
    );
    Ok(links)
}
