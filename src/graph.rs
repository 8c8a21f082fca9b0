//! Weighted linkage graph produced by tracking.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Error, ObjectId, Result};

/// A realized link between two objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Object in the earlier frame.
    pub source: ObjectId,
    /// Object in the later frame.
    pub target: ObjectId,
    /// Realized linking cost.
    pub weight: f64,
}

/// Directed graph of objects linked forward in time.
///
/// Vertices carry their frame index; every edge goes from an earlier frame
/// to a strictly later one. Vertices and edges are kept in ordered maps so
/// iteration order is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkageGraph {
    vertices: BTreeMap<ObjectId, i32>,
    edges: BTreeMap<(ObjectId, ObjectId), f64>,
}

impl LinkageGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex. Returns false if it was already present.
    pub fn add_vertex(&mut self, id: ObjectId, frame: i32) -> bool {
        self.vertices.insert(id, frame).is_none()
    }

    /// Add a weighted edge between two existing vertices.
    ///
    /// Returns `Ok(false)` and keeps the existing weight if the edge is
    /// already present.
    ///
    /// # Errors
    /// * `Error::InvalidInput` if a vertex is unknown
    /// * `Error::TemporalOrder` if the target is not in a later frame
    pub fn add_edge(&mut self, source: ObjectId, target: ObjectId, weight: f64) -> Result<bool> {
        let source_frame = self.frame_of(source)?;
        let target_frame = self.frame_of(target)?;
        if target_frame <= source_frame {
            return Err(Error::TemporalOrder(format!(
                "{} (frame {}) -> {} (frame {})",
                source, source_frame, target, target_frame
            )));
        }
        if self.edges.contains_key(&(source, target)) {
            return Ok(false);
        }
        self.edges.insert((source, target), weight);
        Ok(true)
    }

    fn frame_of(&self, id: ObjectId) -> Result<i32> {
        self.vertices
            .get(&id)
            .copied()
            .ok_or_else(|| Error::InvalidInput(format!("unknown vertex {}", id)))
    }

    /// Frame of a vertex.
    pub fn frame(&self, id: ObjectId) -> Option<i32> {
        self.vertices.get(&id).copied()
    }

    pub fn contains_vertex(&self, id: ObjectId) -> bool {
        self.vertices.contains_key(&id)
    }

    pub fn contains_edge(&self, source: ObjectId, target: ObjectId) -> bool {
        self.edges.contains_key(&(source, target))
    }

    /// Weight of an edge, if present.
    pub fn edge_weight(&self, source: ObjectId, target: ObjectId) -> Option<f64> {
        self.edges.get(&(source, target)).copied()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Vertices with their frame, ordered by id.
    pub fn vertices(&self) -> impl Iterator<Item = (ObjectId, i32)> + '_ {
        self.vertices.iter().map(|(&id, &frame)| (id, frame))
    }

    /// Edges ordered by (source, target).
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        self.edges.iter().map(|(&(source, target), &weight)| Edge { source, target, weight })
    }

    /// Targets of edges leaving `id`, ordered by id.
    pub fn successors(&self, id: ObjectId) -> Vec<ObjectId> {
        self.edges
            .range((id, ObjectId(0))..=(id, ObjectId(u64::MAX)))
            .map(|(&(_, target), _)| target)
            .collect()
    }

    /// Sources of edges entering `id`, ordered by id.
    pub fn predecessors(&self, id: ObjectId) -> Vec<ObjectId> {
        self.edges
            .keys()
            .filter(|&&(_, target)| target == id)
            .map(|&(source, _)| source)
            .collect()
    }

    pub fn out_degree(&self, id: ObjectId) -> usize {
        self.successors(id).len()
    }

    pub fn in_degree(&self, id: ObjectId) -> usize {
        self.edges.keys().filter(|&&(_, target)| target == id).count()
    }

    /// Number of incoming edges of every vertex.
    pub fn in_degrees(&self) -> BTreeMap<ObjectId, usize> {
        let mut degrees: BTreeMap<ObjectId, usize> = self.vertices.keys().map(|&id| (id, 0)).collect();
        for &(_, target) in self.edges.keys() {
            *degrees.entry(target).or_default() += 1;
        }
        degrees
    }

    /// Sum of all edge weights.
    pub fn total_weight(&self) -> f64 {
        self.edges.values().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> LinkageGraph {
        let mut g = LinkageGraph::new();
        g.add_vertex(ObjectId(1), 0);
        g.add_vertex(ObjectId(2), 1);
        g.add_vertex(ObjectId(3), 1);
        g.add_vertex(ObjectId(4), 2);
        g
    }

    #[test]
    fn test_add_edges() {
        let mut g = graph();
        assert!(g.add_edge(ObjectId(1), ObjectId(2), 1.5).unwrap());
        assert!(g.add_edge(ObjectId(1), ObjectId(3), 2.5).unwrap());
        assert!(g.add_edge(ObjectId(2), ObjectId(4), 0.5).unwrap());
        assert!(!g.add_edge(ObjectId(1), ObjectId(2), 9.0).unwrap());

        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.edge_weight(ObjectId(1), ObjectId(2)), Some(1.5));
        assert_eq!(g.successors(ObjectId(1)), vec![ObjectId(2), ObjectId(3)]);
        assert_eq!(g.predecessors(ObjectId(4)), vec![ObjectId(2)]);
        assert_eq!(g.out_degree(ObjectId(1)), 2);
        assert_eq!(g.in_degree(ObjectId(1)), 0);
        assert_eq!(g.in_degrees()[&ObjectId(4)], 1);
        assert_eq!(g.total_weight(), 4.5);
    }

    #[test]
    fn test_temporal_order_enforced() {
        let mut g = graph();
        assert!(matches!(g.add_edge(ObjectId(2), ObjectId(1), 1.0), Err(Error::TemporalOrder(_))));
        assert!(matches!(g.add_edge(ObjectId(2), ObjectId(3), 1.0), Err(Error::TemporalOrder(_))));
        assert!(matches!(g.add_edge(ObjectId(1), ObjectId(9), 1.0), Err(Error::InvalidInput(_))));
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn test_edges_are_ordered() {
        let mut g = graph();
        g.add_edge(ObjectId(2), ObjectId(4), 1.0).unwrap();
        g.add_edge(ObjectId(1), ObjectId(3), 1.0).unwrap();
        g.add_edge(ObjectId(1), ObjectId(2), 1.0).unwrap();
        let order: Vec<(u64, u64)> = g.edges().map(|e| (e.source.0, e.target.0)).collect();
        assert_eq!(order, vec![(1, 2), (1, 3), (2, 4)]);
    }
}
