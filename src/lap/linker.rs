//! Linking with "leave unassigned" alternatives.
//!
//! A candidate matrix `TL` (sources x targets) is completed into a square
//! problem that always has a perfect matching:
//!
//! ```text
//! | TL            diag(alt) |
//! | diag(alt)     TL' = alt |
//! ```
//!
//! The top-right diagonal lets a source stay unlinked, the bottom-left
//! diagonal lets a target stay unlinked, and the bottom-right block (the
//! transposed sparsity pattern of `TL`, filled with the alternative cost)
//! pairs up the dummies left over when real links are chosen. A link
//! `(i, j)` is realized only if its cost is below the alternative cost.

use tracing::debug;

use super::candidates::LinkCandidates;
use super::jv::solve;
use super::sparse::SparseCostMatrix;
use crate::{Error, Result};

/// A realized link between a source and a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link<R, C> {
    pub source: R,
    pub target: C,
    pub cost: f64,
}

/// Complete a candidate matrix with alternative-cost blocks.
///
/// # Arguments
/// * `matrix` - Candidate costs (n_rows x n_cols)
/// * `alternative_cost` - Cost of leaving a row or a column unassigned
///
/// # Returns
/// A square (n_rows + n_cols) matrix with a perfect matching
pub fn complement(matrix: &SparseCostMatrix, alternative_cost: f64) -> Result<SparseCostMatrix> {
    if !alternative_cost.is_finite() || alternative_cost < 0.0 {
        return Err(Error::InvalidInput(format!(
            "alternative cost must be finite and non-negative, got {}",
            alternative_cost
        )));
    }
    let n_rows = matrix.n_rows();
    let n_cols = matrix.n_cols();

    let top = matrix.hcat(&SparseCostMatrix::diagonal(n_rows, alternative_cost))?;
    let bottom = SparseCostMatrix::diagonal(n_cols, alternative_cost)
        .hcat(&matrix.transpose().fill_with(alternative_cost))?;
    top.vcat(&bottom)
}

/// Solve a set of candidate links.
///
/// # Returns
/// Realized links, by increasing source key. Every source and every target
/// appears in at most one link.
pub fn link<R: Copy, C: Copy>(candidates: &LinkCandidates<R, C>) -> Result<Vec<Link<R, C>>> {
    let matrix = &candidates.matrix;
    let full = complement(matrix, candidates.alternative_cost)?;
    let assignment = solve(&full)?;

    let links: Vec<Link<R, C>> = assignment
        .pairs()
        .filter(|&(i, j)| i < matrix.n_rows() && j < matrix.n_cols())
        .map(|(i, j)| Link {
            source: candidates.sources[i],
            target: candidates.targets[j],
            cost: matrix.get(i, j, candidates.alternative_cost),
        })
        .collect();

    debug!(
        rows = matrix.n_rows(),
        cols = matrix.n_cols(),
        candidates = matrix.cardinality(),
        alternative_cost = candidates.alternative_cost,
        links = links.len(),
        "solved link candidates"
    );
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lap::candidates::{AlternativeCost, CandidateBuilder};

    #[test]
    fn test_complement_shape() {
        let m = SparseCostMatrix::new(vec![1.0, 2.0, 3.0], vec![0, 2, 1], vec![2, 1], 3);
        let full = complement(&m, 10.0).unwrap();
        assert_eq!(full.n_rows(), 5);
        assert_eq!(full.n_cols(), 5);
        // TL + two diagonals + transposed TL
        assert_eq!(full.cardinality(), 3 + 2 + 3 + 3);
        assert_eq!(full.find(0, 3), Some(10.0));
        assert_eq!(full.find(1, 4), Some(10.0));
        assert_eq!(full.find(2, 0), Some(10.0));
        // bottom-right follows the transposed pattern
        assert_eq!(full.find(2 + 2, 3), Some(10.0));
        assert_eq!(full.find(2 + 2, 4), None);
        assert_eq!(full.find(2 + 1, 4), Some(10.0));
    }

    #[test]
    fn test_complement_rejects_bad_alternative() {
        let m = SparseCostMatrix::diagonal(2, 1.0);
        assert!(complement(&m, f64::INFINITY).is_err());
        assert!(complement(&m, -1.0).is_err());
    }

    #[test]
    fn test_link_prefers_cheap_candidates() {
        let mut builder = CandidateBuilder::new();
        builder.push("a", 1u32, 1.0);
        builder.push("a", 2u32, 4.0);
        builder.push("b", 1u32, 2.0);
        builder.push("c", 3u32, 100.0);
        let candidates = builder.build(AlternativeCost::new(1.0, 0.5)).unwrap().unwrap();
        // alternative = percentile 0.5 of [1, 4, 2, 100] = 4

        let links = link(&candidates).unwrap();
        // Each link saves (alternative - cost): a-1 saves 3, while a-2 plus
        // b-1 save only 2 together. c-3 costs more than leaving c alone.
        let pairs: Vec<(&str, u32)> = links.iter().map(|l| (l.source, l.target)).collect();
        assert_eq!(pairs, vec![("a", 1)]);
        assert_eq!(links[0].cost, 1.0);
    }
}
