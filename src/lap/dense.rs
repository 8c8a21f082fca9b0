//! Dense reference assignment solver.
//!
//! Hungarian algorithm with row and column potentials, O(n³) time and
//! O(n²) memory. Used to verify the sparse solver on small problems; never
//! used by the tracker itself.
#![allow(clippy::needless_range_loop)]

use nalgebra::DMatrix;

use super::jv::Assignment;

/// Solve a dense assignment problem to optimality.
///
/// Rectangular matrices are padded with zero-cost dummy rows or columns;
/// rows matched to a dummy column are reported as unassigned.
///
/// # Arguments
/// * `cost` - Cost matrix, all entries finite
///
/// # Returns
/// Assignment with `total_cost` summed over real pairs only
pub fn solve_dense(cost: &DMatrix<f64>) -> Assignment {
    let n_rows = cost.nrows();
    let n_cols = cost.ncols();
    if n_rows == 0 || n_cols == 0 {
        return Assignment::unassigned(n_rows);
    }

    let n = n_rows.max(n_cols);
    let at = |i: usize, j: usize| -> f64 {
        if i < n_rows && j < n_cols { cost[(i, j)] } else { 0.0 }
    };

    // 1-based indices, index 0 is the virtual root.
    let mut u = vec![0.0; n + 1];
    let mut v = vec![0.0; n + 1];
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let cur = at(i0 - 1, j - 1) - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut row_to_col = vec![None; n_rows];
    for j in 1..=n {
        let i = p[j];
        if i >= 1 && i <= n_rows && j <= n_cols {
            row_to_col[i - 1] = Some(j - 1);
        }
    }
    let total_cost = row_to_col
        .iter()
        .enumerate()
        .filter_map(|(i, col)| col.map(|j| cost[(i, j)]))
        .sum();

    Assignment { row_to_col, total_cost }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_basic_square() {
        let cost = DMatrix::from_row_slice(3, 3, &[
            4.0, 1.0, 3.0,
            2.0, 0.0, 5.0,
            3.0, 2.0, 2.0,
        ]);
        let result = solve_dense(&cost);
        assert_eq!(result.row_to_col, vec![Some(1), Some(0), Some(2)]);
        // Optimal: (0,1)=1 + (1,0)=2 + (2,2)=2 = 5
        assert_relative_eq!(result.total_cost, 5.0);
    }

    #[test]
    fn test_rectangular_more_rows() {
        let cost = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let result = solve_dense(&cost);

        // Can only match 2 rows to 2 columns
        assert_eq!(result.n_assigned(), 2);
        assert!(result.is_matching(2));
    }

    #[test]
    fn test_rectangular_more_cols() {
        let cost = DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let result = solve_dense(&cost);

        assert_eq!(result.n_assigned(), 2);
        assert!(result.is_matching(3));
        assert_relative_eq!(result.total_cost, 6.0);
    }

    #[test]
    fn test_empty() {
        let result = solve_dense(&DMatrix::zeros(0, 0));
        assert!(result.is_empty());

        let result = solve_dense(&DMatrix::zeros(2, 0));
        assert_eq!(result.row_to_col, vec![None, None]);
    }

    #[test]
    fn test_single_element() {
        let result = solve_dense(&DMatrix::from_element(1, 1, 3.0));
        assert_eq!(result.row_to_col, vec![Some(0)]);
        assert_relative_eq!(result.total_cost, 3.0);
    }

    #[test]
    fn test_greedy_is_not_optimal() {
        // cost[i][j] = (i + 1) * (j + 1): the anti-diagonal wins
        let cost = DMatrix::from_row_slice(3, 3, &[
            1.0, 2.0, 3.0,
            2.0, 4.0, 6.0,
            3.0, 6.0, 9.0,
        ]);
        let result = solve_dense(&cost);
        assert_eq!(result.row_to_col, vec![Some(2), Some(1), Some(0)]);
        assert_relative_eq!(result.total_cost, 10.0);
    }
}
