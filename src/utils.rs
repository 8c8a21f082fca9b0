//! Utility functions shared across the tracker.

use nalgebra::DVector;
use crate::{Error, Result};

/// Validate a position: 2 or 3 finite coordinates.
pub fn validate_position(coords: &[f64]) -> Result<DVector<f64>> {
    if coords.len() != 2 && coords.len() != 3 {
        return Err(Error::InvalidObject(format!(
            "expected 2 or 3 coordinates, got {}",
            coords.len()
        )));
    }
    if coords.iter().any(|c| !c.is_finite()) {
        return Err(Error::InvalidObject(format!(
            "position {:?} has non-finite coordinates",
            coords
        )));
    }
    Ok(DVector::from_column_slice(coords))
}

/// Percentile of a set of values, with `percentile` in [0, 1].
///
/// Sorts a copy of the values and returns the element at rank
/// `round((n - 1) * percentile)`. Returns `None` for an empty set.
pub fn percentile(values: &[f64], percentile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = sorted.len() - 1;
    let pos = ((last as f64) * percentile).round().max(0.0) as usize;
    Some(sorted[pos.min(last)])
}

/// Get the bounding box of a polygon.
///
/// Returns (x1, y1, x2, y2), or `None` for an empty vertex list.
pub fn get_bounding_box(vertices: &[[f64; 2]]) -> Option<(f64, f64, f64, f64)> {
    let first = vertices.first()?;
    let mut min_x = first[0];
    let mut max_x = first[0];
    let mut min_y = first[1];
    let mut max_y = first[1];

    for &[x, y] in vertices {
        if x < min_x { min_x = x; }
        if x > max_x { max_x = x; }
        if y < min_y { min_y = y; }
        if y > max_y { max_y = y; }
    }

    Some((min_x, min_y, max_x, max_y))
}
