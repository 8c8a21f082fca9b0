//! Track segments: maximal linear chains of the linkage graph.

use std::collections::BTreeMap;

use crate::{LinkageGraph, ObjectId};

/// A gap-free chain of objects, one per frame, ordered by frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSegment {
    objects: Vec<(i32, ObjectId)>,
}

impl TrackSegment {
    /// Build a segment from `(frame, id)` pairs in increasing frame order.
    ///
    /// Returns `None` if the list is empty or frames do not strictly increase.
    pub fn new(objects: Vec<(i32, ObjectId)>) -> Option<Self> {
        if objects.is_empty() || objects.windows(2).any(|w| w[1].0 <= w[0].0) {
            return None;
        }
        Some(Self { objects })
    }

    /// Earliest object.
    pub fn head(&self) -> (i32, ObjectId) {
        self.objects[0]
    }

    /// Latest object.
    pub fn tail(&self) -> (i32, ObjectId) {
        self.objects[self.objects.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// All `(frame, id)` pairs, head first.
    pub fn objects(&self) -> &[(i32, ObjectId)] {
        &self.objects
    }
}

/// Split a linkage graph into its maximal linear chains.
///
/// A chain continues from `a` to `b` while `a` has a single successor `b`
/// and `b` has a single predecessor. Every vertex belongs to exactly one
/// segment; isolated vertices form single-object segments.
///
/// # Returns
/// Segments ordered by head `(frame, id)`.
pub fn split_into_segments(graph: &LinkageGraph) -> Vec<TrackSegment> {
    let mut successors: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
    let mut predecessors: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
    for edge in graph.edges() {
        successors.entry(edge.source).or_default().push(edge.target);
        predecessors.entry(edge.target).or_default().push(edge.source);
    }

    let single = |map: &BTreeMap<ObjectId, Vec<ObjectId>>, id: ObjectId| -> Option<ObjectId> {
        match map.get(&id).map(Vec::as_slice) {
            Some([only]) => Some(*only),
            _ => None,
        }
    };
    let continues = |from: ObjectId| -> Option<ObjectId> {
        let next = single(&successors, from)?;
        single(&predecessors, next).map(|_| next)
    };

    let mut heads: Vec<(i32, ObjectId)> = graph
        .vertices()
        .filter(|&(id, _)| match single(&predecessors, id) {
            Some(previous) => continues(previous) != Some(id),
            None => true,
        })
        .map(|(id, frame)| (frame, id))
        .collect();
    heads.sort();

    let mut segments = Vec::with_capacity(heads.len());
    for (frame, id) in heads {
        let mut chain = vec![(frame, id)];
        let mut current = id;
        while let Some(next) = continues(current) {
            // Edges always go forward in time, so the frame is known.
            let Some(next_frame) = graph.frame(next) else { break };
            chain.push((next_frame, next));
            current = next;
        }
        segments.extend(TrackSegment::new(chain));
    }
    segments
}
