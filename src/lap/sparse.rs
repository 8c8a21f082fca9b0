//! Compressed sparse-row cost matrix.

use std::fmt;

use crate::{Error, Result};

/// Sparse cost matrix in compressed sparse-row (CSR) form.
///
/// Only admissible links are stored: a missing entry means "no link", not
/// zero cost. Within a row, column indices are strictly increasing. All
/// stored costs are finite and non-negative.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseCostMatrix {
    /// Costs, row after row.
    cc: Vec<f64>,
    /// Column index of each cost.
    kk: Vec<usize>,
    /// Number of entries in each row.
    number: Vec<usize>,
    /// Offset of each row's first entry in `cc` / `kk`.
    start: Vec<usize>,
    n_cols: usize,
}

impl SparseCostMatrix {
    /// Create a matrix from its CSR arrays.
    ///
    /// # Arguments
    /// * `cc` - Costs, row after row
    /// * `kk` - Column index of each cost
    /// * `number` - Number of entries in each row
    /// * `n_cols` - Number of columns
    ///
    /// # Panics
    /// Panics if the arrays are inconsistent. Malformed matrices are built by
    /// code, never from user input, so this is an internal defect.
    pub fn new(cc: Vec<f64>, kk: Vec<usize>, number: Vec<usize>, n_cols: usize) -> Self {
        match Self::try_new(cc, kk, number, n_cols) {
            Ok(m) => m,
            Err(e) => panic!("{}", e),
        }
    }

    /// Create a matrix from its CSR arrays, returning a Result instead of panicking.
    pub fn try_new(cc: Vec<f64>, kk: Vec<usize>, number: Vec<usize>, n_cols: usize) -> Result<Self> {
        if cc.len() != kk.len() {
            return Err(Error::MalformedMatrix(format!(
                "cost and column arrays differ in length: {} vs {}",
                cc.len(),
                kk.len()
            )));
        }
        let total: usize = number.iter().sum();
        if total != cc.len() {
            return Err(Error::MalformedMatrix(format!(
                "row counts sum to {} but {} entries are stored",
                total,
                cc.len()
            )));
        }

        let mut start = Vec::with_capacity(number.len());
        let mut offset = 0;
        for (row, &n) in number.iter().enumerate() {
            start.push(offset);
            let cols = &kk[offset..offset + n];
            for (k, &col) in cols.iter().enumerate() {
                if col >= n_cols {
                    return Err(Error::MalformedMatrix(format!(
                        "row {} references column {} but matrix has {} columns",
                        row, col, n_cols
                    )));
                }
                if k > 0 && cols[k - 1] >= col {
                    return Err(Error::MalformedMatrix(format!(
                        "row {} column indices are not strictly increasing: {:?}",
                        row, cols
                    )));
                }
            }
            for &cost in &cc[offset..offset + n] {
                if !cost.is_finite() || cost < 0.0 {
                    return Err(Error::MalformedMatrix(format!(
                        "row {} holds invalid cost {}",
                        row, cost
                    )));
                }
            }
            offset += n;
        }

        Ok(Self { cc, kk, number, start, n_cols })
    }

    /// Empty matrix with the given shape.
    pub fn empty(n_rows: usize, n_cols: usize) -> Self {
        Self {
            cc: Vec::new(),
            kk: Vec::new(),
            number: vec![0; n_rows],
            start: vec![0; n_rows],
            n_cols,
        }
    }

    /// Diagonal matrix of size `n` with a constant cost.
    pub fn diagonal(n: usize, cost: f64) -> Self {
        Self::new(vec![cost; n], (0..n).collect(), vec![1; n], n)
    }

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.number.len()
    }

    /// Number of columns.
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Total number of stored entries.
    #[inline]
    pub fn cardinality(&self) -> usize {
        self.cc.len()
    }

    /// Whether the matrix is square.
    pub fn is_square(&self) -> bool {
        self.n_rows() == self.n_cols
    }

    /// Stored entries of a row as `(column, cost)` pairs, by increasing column.
    #[inline]
    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.start[row]..self.start[row] + self.number[row];
        self.kk[range.clone()].iter().copied().zip(self.cc[range].iter().copied())
    }

    /// Number of stored entries in a row.
    #[inline]
    pub fn row_len(&self, row: usize) -> usize {
        self.number[row]
    }

    /// Look up a cost, or `None` if the entry is absent.
    ///
    /// Binary search within the row, O(log k).
    #[inline]
    pub fn find(&self, row: usize, col: usize) -> Option<f64> {
        let s = self.start[row];
        let cols = &self.kk[s..s + self.number[row]];
        cols.binary_search(&col).ok().map(|k| self.cc[s + k])
    }

    /// Look up a cost, or `missing` if the entry is absent.
    #[inline]
    pub fn get(&self, row: usize, col: usize, missing: f64) -> f64 {
        self.find(row, col).unwrap_or(missing)
    }

    /// Smallest and largest stored cost, or `None` for an empty matrix.
    pub fn cost_range(&self) -> Option<(f64, f64)> {
        let first = *self.cc.first()?;
        Some(self.cc.iter().fold((first, first), |(lo, hi), &c| (lo.min(c), hi.max(c))))
    }

    /// Stack `other` below this matrix.
    ///
    /// Row indices of `other` are offset by `self.n_rows()`.
    pub fn vcat(&self, other: &SparseCostMatrix) -> Result<SparseCostMatrix> {
        if self.n_cols != other.n_cols {
            return Err(Error::DimensionMismatch {
                operation: "vcat",
                expected: self.n_cols,
                got: other.n_cols,
            });
        }
        let mut cc = self.cc.clone();
        cc.extend_from_slice(&other.cc);
        let mut kk = self.kk.clone();
        kk.extend_from_slice(&other.kk);
        let mut number = self.number.clone();
        number.extend_from_slice(&other.number);
        Ok(SparseCostMatrix::new(cc, kk, number, self.n_cols))
    }

    /// Place `other` to the right of this matrix.
    ///
    /// Column indices of `other` are offset by `self.n_cols()`.
    pub fn hcat(&self, other: &SparseCostMatrix) -> Result<SparseCostMatrix> {
        if self.n_rows() != other.n_rows() {
            return Err(Error::DimensionMismatch {
                operation: "hcat",
                expected: self.n_rows(),
                got: other.n_rows(),
            });
        }
        let mut cc = Vec::with_capacity(self.cardinality() + other.cardinality());
        let mut kk = Vec::with_capacity(self.cardinality() + other.cardinality());
        let mut number = Vec::with_capacity(self.n_rows());
        for i in 0..self.n_rows() {
            for (j, c) in self.row(i) {
                kk.push(j);
                cc.push(c);
            }
            for (j, c) in other.row(i) {
                kk.push(j + self.n_cols);
                cc.push(c);
            }
            number.push(self.number[i] + other.number[i]);
        }
        Ok(SparseCostMatrix::new(cc, kk, number, self.n_cols + other.n_cols))
    }

    /// Swap rows and columns.
    pub fn transpose(&self) -> SparseCostMatrix {
        // Counting sort by column; rows are visited in order so the new
        // rows come out sorted.
        let mut number = vec![0usize; self.n_cols];
        for &j in &self.kk {
            number[j] += 1;
        }
        let mut next = Vec::with_capacity(self.n_cols);
        let mut offset = 0;
        for &n in &number {
            next.push(offset);
            offset += n;
        }

        let mut cc = vec![0.0; self.cardinality()];
        let mut kk = vec![0usize; self.cardinality()];
        for i in 0..self.n_rows() {
            for (j, c) in self.row(i) {
                let pos = next[j];
                cc[pos] = c;
                kk[pos] = i;
                next[j] += 1;
            }
        }
        SparseCostMatrix::new(cc, kk, number, self.n_rows())
    }

    /// Same sparsity pattern, every stored cost replaced by `value`.
    pub fn fill_with(&self, value: f64) -> SparseCostMatrix {
        let mut filled = self.clone();
        filled.cc.iter_mut().for_each(|c| *c = value);
        filled
    }

    /// Total cost of a row-to-column assignment.
    ///
    /// Unassigned rows contribute nothing.
    pub fn total_assignment_cost(&self, row_to_col: &[Option<usize>]) -> f64 {
        row_to_col
            .iter()
            .enumerate()
            .filter_map(|(i, col)| col.and_then(|j| self.find(i, j)))
            .sum()
    }

    /// Sentinel standing in for absent entries in a dense view.
    ///
    /// Larger than any assignment built only from stored costs, so it is
    /// never part of an optimum that has a real alternative.
    pub fn dense_sentinel(&self) -> f64 {
        let max_cost = self.cost_range().map_or(0.0, |(_, hi)| hi);
        (max_cost + 1.0) * (self.n_rows().max(self.n_cols) as f64 + 1.0)
    }

    /// Materialize a dense matrix, absent entries set to `dense_sentinel()`.
    ///
    /// Quadratic memory: for tests and verification on small inputs only.
    #[cfg(any(test, feature = "dense-reference"))]
    pub fn to_dense_matrix(&self) -> nalgebra::DMatrix<f64> {
        let sentinel = self.dense_sentinel();
        let mut dense = nalgebra::DMatrix::from_element(self.n_rows(), self.n_cols, sentinel);
        for i in 0..self.n_rows() {
            for (j, c) in self.row(i) {
                dense[(i, j)] = c;
            }
        }
        dense
    }
}

impl fmt::Display for SparseCostMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}x{} sparse matrix, {} entries", self.n_rows(), self.n_cols, self.cardinality())?;
        for i in 0..self.n_rows() {
            write!(f, "  row {}:", i)?;
            for (j, c) in self.row(i) {
                write!(f, " ({}, {:.3})", j, c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
