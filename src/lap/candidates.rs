//! Candidate link collection and sparse matrix assembly.
//!
//! Stages emit `(source, target, cost)` triplets keyed by their own source
//! and target types. The builder sorts and deduplicates the keys, which fixes
//! the row and column order of the resulting matrix independently of the
//! order in which candidates were found.

use std::fmt::Debug;

use super::sparse::SparseCostMatrix;
use crate::utils::percentile;
use crate::{Error, Result};

/// Alternative ("no link") cost policy: `factor × percentile(costs)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlternativeCost {
    /// Multiplier applied to the percentile.
    pub factor: f64,
    /// Percentile of the candidate costs, in [0, 1].
    pub percentile: f64,
}

impl AlternativeCost {
    pub fn new(factor: f64, percentile: f64) -> Self {
        Self { factor, percentile }
    }

    /// Alternative cost for a set of candidate costs.
    ///
    /// Never zero: if every candidate is free, the alternative is the
    /// smallest positive double so that real links still win.
    pub fn compute(&self, costs: &[f64]) -> Option<f64> {
        let value = self.factor * percentile(costs, self.percentile)?;
        Some(if value > 0.0 { value } else { f64::MIN_POSITIVE })
    }
}

/// Candidate links with their sparse cost matrix.
#[derive(Debug, Clone)]
pub struct LinkCandidates<R, C> {
    /// Row keys, sorted.
    pub sources: Vec<R>,
    /// Column keys, sorted.
    pub targets: Vec<C>,
    /// Costs of admissible links, `sources.len() x targets.len()`.
    pub matrix: SparseCostMatrix,
    /// Cost of leaving a source or a target unlinked.
    pub alternative_cost: f64,
}

/// Accumulates candidate triplets.
#[derive(Debug, Clone)]
pub struct CandidateBuilder<R, C> {
    triplets: Vec<(R, C, f64)>,
}

impl<R, C> Default for CandidateBuilder<R, C> {
    fn default() -> Self {
        Self { triplets: Vec::new() }
    }
}

impl<R, C> CandidateBuilder<R, C>
where
    R: Ord + Copy + Debug,
    C: Ord + Copy + Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one candidate link.
    pub fn push(&mut self, source: R, target: C, cost: f64) {
        self.triplets.push((source, target, cost));
    }

    /// Number of candidates collected so far.
    pub fn len(&self) -> usize {
        self.triplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triplets.is_empty()
    }

    /// Costs of all candidates collected so far.
    pub fn costs(&self) -> Vec<f64> {
        self.triplets.iter().map(|t| t.2).collect()
    }

    /// Assemble the sparse matrix.
    ///
    /// Returns `Ok(None)` if no candidate was collected.
    ///
    /// # Errors
    /// * `Error::DuplicateCandidate` if a (source, target) pair was pushed twice
    /// * `Error::MalformedMatrix` if a cost is negative or not finite
    pub fn build(mut self, alternative: AlternativeCost) -> Result<Option<LinkCandidates<R, C>>> {
        let costs = self.costs();
        let Some(alternative_cost) = alternative.compute(&costs) else {
            return Ok(None);
        };

        self.triplets.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
        if let Some(w) = self.triplets.windows(2).find(|w| w[0].0 == w[1].0 && w[0].1 == w[1].1) {
            return Err(Error::DuplicateCandidate(format!("{:?} -> {:?}", w[0].0, w[0].1)));
        }

        let mut sources: Vec<R> = self.triplets.iter().map(|t| t.0).collect();
        sources.dedup();
        let mut targets: Vec<C> = self.triplets.iter().map(|t| t.1).collect();
        targets.sort();
        targets.dedup();

        let mut cc = Vec::with_capacity(self.triplets.len());
        let mut kk = Vec::with_capacity(self.triplets.len());
        let mut number = vec![0usize; sources.len()];
        let mut row = 0;
        for &(source, target, cost) in &self.triplets {
            while sources[row] != source {
                row += 1;
            }
            // Keys come from the triplets themselves, so the search succeeds.
            let col = targets.binary_search(&target).unwrap_or_default();
            cc.push(cost);
            kk.push(col);
            number[row] += 1;
        }

        let matrix = SparseCostMatrix::try_new(cc, kk, number, targets.len())?;
        Ok(Some(LinkCandidates { sources, targets, matrix, alternative_cost }))
    }
}
