//! Sparse Jonker-Volgenant assignment solver.
//!
//! Shortest augmenting path method working directly on the CSR structure:
//! column reduction, reduction transfer, two passes of augmenting row
//! reduction, then one Dijkstra-like search per remaining free row. Only
//! stored entries are ever visited; absent entries behave as infinite cost.
//!
//! Ties are broken deterministically: column reduction keeps the lowest row
//! index, and the shortest path search settles the lowest column index
//! among equal distances.
#![allow(clippy::needless_range_loop)]

use tracing::trace;

use super::sparse::SparseCostMatrix;
use crate::{Error, Result};

/// Result of a linear assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Column assigned to each row, `None` if unassigned.
    pub row_to_col: Vec<Option<usize>>,
    /// Sum of the costs of all assigned pairs.
    pub total_cost: f64,
}

impl Assignment {
    /// Assignment leaving every row unassigned.
    pub fn unassigned(n_rows: usize) -> Self {
        Self { row_to_col: vec![None; n_rows], total_cost: 0.0 }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.row_to_col.len()
    }

    /// Whether there are no rows.
    pub fn is_empty(&self) -> bool {
        self.row_to_col.is_empty()
    }

    /// Assigned `(row, col)` pairs, by increasing row.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.row_to_col
            .iter()
            .enumerate()
            .filter_map(|(i, col)| col.map(|j| (i, j)))
    }

    /// Number of assigned rows.
    pub fn n_assigned(&self) -> usize {
        self.pairs().count()
    }

    /// Whether no column is used twice and every column is below `n_cols`.
    pub fn is_matching(&self, n_cols: usize) -> bool {
        let mut used = vec![false; n_cols];
        for (_, j) in self.pairs() {
            if j >= n_cols || used[j] {
                return false;
            }
            used[j] = true;
        }
        true
    }
}

/// Solve a square sparse assignment problem.
///
/// Every row must be assigned: absent entries are forbidden. An empty
/// matrix, or a matrix with at most one row and one column, is answered
/// directly without running the general algorithm.
///
/// # Errors
/// * `Error::NonSquareMatrix` if the matrix is not square
/// * `Error::InfeasibleAssignment` if no complete matching exists
pub fn solve(matrix: &SparseCostMatrix) -> Result<Assignment> {
    let (n_rows, n_cols) = (matrix.n_rows(), matrix.n_cols());
    if n_rows == 0 || n_cols == 0 {
        return Ok(Assignment::unassigned(n_rows));
    }
    if n_rows == 1 && n_cols == 1 {
        return Ok(match matrix.find(0, 0) {
            Some(cost) => Assignment { row_to_col: vec![Some(0)], total_cost: cost },
            None => Assignment::unassigned(1),
        });
    }
    if n_rows != n_cols {
        return Err(Error::NonSquareMatrix { rows: n_rows, cols: n_cols });
    }
    JonkerVolgenant::new(matrix)?.run()
}

/// Solve an assignment problem of any shape, allowing rows and columns to
/// stay unassigned at `alternative_cost` each.
///
/// The matrix is completed with alternative-cost blocks (see
/// [`complement`](super::linker::complement)) so that a full matching always
/// exists, then solved. Only real assignments are reported.
pub fn solve_with_alternative(matrix: &SparseCostMatrix, alternative_cost: f64) -> Result<Assignment> {
    let n_rows = matrix.n_rows();
    let n_cols = matrix.n_cols();
    if matrix.cardinality() == 0 {
        return Ok(Assignment::unassigned(n_rows));
    }
    let full = super::linker::complement(matrix, alternative_cost)?;
    let solved = solve(&full)?;
    let row_to_col: Vec<Option<usize>> = solved.row_to_col[..n_rows]
        .iter()
        .map(|col| col.filter(|&j| j < n_cols))
        .collect();
    let total_cost = matrix.total_assignment_cost(&row_to_col);
    Ok(Assignment { row_to_col, total_cost })
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Untouched,
    Todo,
    Done,
}

/// Working state of the shortest path search, reused across free rows.
struct Scratch {
    d: Vec<f64>,
    pred: Vec<usize>,
    mark: Vec<Mark>,
    todo: Vec<usize>,
    done: Vec<usize>,
}

impl Scratch {
    fn new(n: usize) -> Self {
        Self {
            d: vec![f64::INFINITY; n],
            pred: vec![0; n],
            mark: vec![Mark::Untouched; n],
            todo: Vec::new(),
            done: Vec::new(),
        }
    }

    fn reset(&mut self) {
        for &j in self.todo.iter().chain(self.done.iter()) {
            self.d[j] = f64::INFINITY;
            self.mark[j] = Mark::Untouched;
        }
        self.todo.clear();
        self.done.clear();
    }

    /// Lower the tentative distance of column `j` through row `i`.
    #[inline]
    fn relax(&mut self, j: usize, dist: f64, i: usize) {
        match self.mark[j] {
            Mark::Done => {}
            Mark::Untouched => {
                self.mark[j] = Mark::Todo;
                self.todo.push(j);
                self.d[j] = dist;
                self.pred[j] = i;
            }
            Mark::Todo => {
                if dist < self.d[j] {
                    self.d[j] = dist;
                    self.pred[j] = i;
                }
            }
        }
    }

    /// Settle the closest pending column, lowest index on ties.
    fn pop_closest(&mut self) -> Option<usize> {
        let mut best: Option<(usize, usize)> = None;
        for (pos, &j) in self.todo.iter().enumerate() {
            best = match best {
                Some((_, b)) if self.d[b] < self.d[j] || (self.d[b] == self.d[j] && b < j) => best,
                _ => Some((pos, j)),
            };
        }
        let (pos, j) = best?;
        self.todo.swap_remove(pos);
        self.mark[j] = Mark::Done;
        self.done.push(j);
        Some(j)
    }
}

struct JonkerVolgenant<'a> {
    m: &'a SparseCostMatrix,
    n: usize,
    /// Column assigned to each row.
    x: Vec<Option<usize>>,
    /// Row assigned to each column.
    y: Vec<Option<usize>>,
    /// Column dual variables.
    v: Vec<f64>,
}

impl<'a> JonkerVolgenant<'a> {
    fn new(m: &'a SparseCostMatrix) -> Result<Self> {
        let n = m.n_rows();
        if let Some(i) = (0..n).find(|&i| m.row_len(i) == 0) {
            return Err(Error::InfeasibleAssignment { row: i });
        }
        Ok(Self { m, n, x: vec![None; n], y: vec![None; n], v: vec![f64::INFINITY; n] })
    }

    fn run(mut self) -> Result<Assignment> {
        let free = self.column_reduction();
        trace!(n = self.n, free = free.len(), "column reduction done");

        let mut free = free;
        for pass in 0..2 {
            free = self.augmenting_row_reduction(free);
            trace!(pass, free = free.len(), "augmenting row reduction done");
        }

        let mut scratch = Scratch::new(self.n);
        for &row in &free {
            self.augment(row, &mut scratch)?;
        }

        let total_cost = self.m.total_assignment_cost(&self.x);
        Ok(Assignment { row_to_col: self.x, total_cost })
    }

    /// Column reduction and reduction transfer. Returns the free rows.
    fn column_reduction(&mut self) -> Vec<usize> {
        let n = self.n;
        for i in 0..n {
            for (j, c) in self.m.row(i) {
                if c < self.v[j] {
                    self.v[j] = c;
                    self.y[j] = Some(i);
                }
            }
        }

        let mut matches = vec![0usize; n];
        for j in (0..n).rev() {
            let Some(i) = self.y[j] else { continue };
            matches[i] += 1;
            if matches[i] == 1 {
                self.x[i] = Some(j);
            } else {
                self.y[j] = None;
            }
        }

        let mut free = Vec::new();
        for i in 0..n {
            match (matches[i], self.x[i]) {
                (0, _) => free.push(i),
                (1, Some(j1)) => {
                    let min = self
                        .m
                        .row(i)
                        .filter(|&(j, _)| j != j1)
                        .map(|(j, c)| c - self.v[j])
                        .fold(f64::INFINITY, f64::min);
                    if min.is_finite() {
                        self.v[j1] -= min;
                    }
                }
                _ => {}
            }
        }
        free
    }

    /// Two smallest reduced costs of a row: `(u1, j1, u2, j2)`.
    fn two_smallest(&self, i: usize) -> (f64, usize, f64, Option<usize>) {
        let mut u1 = f64::INFINITY;
        let mut j1 = 0;
        let mut u2 = f64::INFINITY;
        let mut j2 = None;
        for (j, c) in self.m.row(i) {
            let h = c - self.v[j];
            if h < u2 {
                if h >= u1 {
                    u2 = h;
                    j2 = Some(j);
                } else {
                    u2 = u1;
                    j2 = if u1.is_finite() { Some(j1) } else { None };
                    u1 = h;
                    j1 = j;
                }
            }
        }
        (u1, j1, u2, j2)
    }

    /// One pass of augmenting row reduction. Returns the rows still free.
    fn augmenting_row_reduction(&mut self, free: Vec<usize>) -> Vec<usize> {
        let mut queue = free;
        let mut still_free = Vec::new();
        // Rows competing for too few columns can bounce forever on
        // infeasible input; past this many steps the rest is left to
        // the shortest path search.
        let max_steps = 8 * self.n + queue.len();
        let mut steps = 0;
        let mut k = 0;
        while k < queue.len() {
            if steps == max_steps {
                still_free.extend_from_slice(&queue[k..]);
                break;
            }
            steps += 1;
            let i = queue[k];
            k += 1;

            let (u1, j1, u2, j2) = self.two_smallest(i);
            let Some(j2) = j2.filter(|_| u2.is_finite()) else {
                // single candidate: left to the shortest path search
                still_free.push(i);
                continue;
            };

            let mut j0 = j1;
            let mut i0 = self.y[j1];
            if u1 < u2 {
                self.v[j0] -= u2 - u1;
            } else if i0.is_some() {
                j0 = j2;
                i0 = self.y[j2];
            }

            if let Some(i0) = i0 {
                self.x[i0] = None;
                if u1 < u2 {
                    k -= 1;
                    queue[k] = i0;
                } else {
                    still_free.push(i0);
                }
            }
            self.x[i] = Some(j0);
            self.y[j0] = Some(i);
        }
        still_free
    }

    /// Grow the matching by one shortest augmenting path from `start`.
    fn augment(&mut self, start: usize, scratch: &mut Scratch) -> Result<()> {
        scratch.reset();
        for (j, c) in self.m.row(start) {
            scratch.relax(j, c - self.v[j], start);
        }

        let (end, mu) = loop {
            let Some(j) = scratch.pop_closest() else {
                return Err(Error::InfeasibleAssignment { row: start });
            };
            let mu = scratch.d[j];
            match self.y[j] {
                None => break (j, mu),
                Some(i) => {
                    let u_i = self.m.get(i, j, f64::INFINITY) - self.v[j];
                    for (k, c) in self.m.row(i) {
                        scratch.relax(k, mu + (c - self.v[k] - u_i), i);
                    }
                }
            }
        };

        for &j in &scratch.done {
            self.v[j] += scratch.d[j] - mu;
        }

        let mut j = end;
        loop {
            let i = scratch.pred[j];
            self.y[j] = Some(i);
            let previous = self.x[i].replace(j);
            if i == start {
                break;
            }
            let Some(prev) = previous else { break };
            j = prev;
        }
        Ok(())
    }
}
