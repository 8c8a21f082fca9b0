//! Shape-overlap (IoU) costs.

use std::f64::consts::PI;
use std::str::FromStr;

use geo::{Area, BooleanOps, LineString, Polygon};

use crate::object::RADIUS;
use crate::utils::get_bounding_box;
use crate::{Error, TrackableObject};

/// Number of vertices of the polygon approximating an object without outline.
pub const CIRCLE_VERTICES: usize = 32;

/// How intersection and union areas are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IouMethod {
    /// Axis-aligned bounding boxes of the shapes.
    Fast,
    /// Exact polygon intersection.
    Precise,
}

impl FromStr for IouMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FAST" => Ok(IouMethod::Fast),
            "PRECISE" => Ok(IouMethod::Precise),
            _ => Err(Error::UnknownCostMethod(format!(
                "{}. Supported IoU calculations: FAST, PRECISE",
                s
            ))),
        }
    }
}

/// Overlap cost parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlapCost {
    /// Area computation method.
    pub method: IouMethod,
    /// Factor by which shapes are scaled about the object position.
    pub scale: f64,
}

impl Default for OverlapCost {
    fn default() -> Self {
        Self { method: IouMethod::Precise, scale: 1.0 }
    }
}

impl OverlapCost {
    pub fn new(method: IouMethod, scale: f64) -> Self {
        Self { method, scale }
    }

    /// `1 - IoU` between the shapes of two objects.
    ///
    /// Objects without any shape, or shapes with an empty union, cost 1.
    pub fn cost(&self, source: &TrackableObject, target: &TrackableObject) -> f64 {
        1.0 - self.iou(source, target)
    }

    /// Intersection over union of the shapes of two objects.
    pub fn iou(&self, source: &TrackableObject, target: &TrackableObject) -> f64 {
        let (Some(a), Some(b)) = (shape_vertices(source, self.scale), shape_vertices(target, self.scale)) else {
            return 0.0;
        };
        match self.method {
            IouMethod::Fast => box_iou(&a, &b),
            IouMethod::Precise => polygon_iou(&a, &b),
        }
    }
}

/// Vertices of an object's shape, scaled about its position.
///
/// Uses the outline when present, otherwise a regular polygon of radius
/// `RADIUS`. Returns `None` when neither is available.
pub fn shape_vertices(object: &TrackableObject, scale: f64) -> Option<Vec<[f64; 2]>> {
    let (cx, cy) = (object.x(), object.y());
    if let Some(outline) = &object.outline {
        return Some(
            outline
                .iter()
                .map(|&[x, y]| [cx + scale * (x - cx), cy + scale * (y - cy)])
                .collect(),
        );
    }
    let radius = object.feature(RADIUS).filter(|r| *r > 0.0)?;
    Some(regular_polygon(cx, cy, radius * scale, CIRCLE_VERTICES))
}

/// Regular polygon with `n` vertices inscribed in a circle.
pub fn regular_polygon(cx: f64, cy: f64, radius: f64, n: usize) -> Vec<[f64; 2]> {
    (0..n)
        .map(|i| {
            let theta = 2.0 * PI * i as f64 / n as f64;
            [cx + radius * theta.cos(), cy + radius * theta.sin()]
        })
        .collect()
}

fn ratio(intersection: f64, area_a: f64, area_b: f64) -> f64 {
    let union = area_a + area_b - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    (intersection / union).clamp(0.0, 1.0)
}

fn box_iou(a: &[[f64; 2]], b: &[[f64; 2]]) -> f64 {
    let (Some((ax1, ay1, ax2, ay2)), Some((bx1, by1, bx2, by2))) = (get_bounding_box(a), get_bounding_box(b)) else {
        return 0.0;
    };
    let iw = (ax2.min(bx2) - ax1.max(bx1)).max(0.0);
    let ih = (ay2.min(by2) - ay1.max(by1)).max(0.0);
    ratio(iw * ih, (ax2 - ax1) * (ay2 - ay1), (bx2 - bx1) * (by2 - by1))
}

fn to_polygon(vertices: &[[f64; 2]]) -> Polygon<f64> {
    let ring: Vec<(f64, f64)> = vertices.iter().map(|&[x, y]| (x, y)).collect();
    Polygon::new(LineString::from(ring), vec![])
}

fn polygon_iou(a: &[[f64; 2]], b: &[[f64; 2]]) -> f64 {
    let pa = to_polygon(a);
    let pb = to_polygon(b);
    let area_a = pa.unsigned_area();
    let area_b = pb.unsigned_area();
    if area_a <= 0.0 || area_b <= 0.0 {
        return 0.0;
    }
    let intersection = pa.intersection(&pb).unsigned_area();
    ratio(intersection, area_a, area_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(id: u64, x0: f64, y0: f64, side: f64) -> TrackableObject {
        let c = side / 2.0;
        TrackableObject::new(id, 0, &[x0 + c, y0 + c])
            .unwrap()
            .with_outline(vec![[x0, y0], [x0 + side, y0], [x0 + side, y0 + side], [x0, y0 + side]])
            .unwrap()
    }

    // ===== Polygon IoU =====

    #[test]
    fn test_identical_boxes_cost_zero() {
        let overlap = OverlapCost::new(IouMethod::Fast, 1.0);
        let a = square(0, 0.0, 0.0, 2.0);
        assert_relative_eq!(overlap.cost(&a, &a), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_diagonal_overlap() {
        // Two 2x2 squares shifted by (1, 1): intersection 1, union 7
        let a = square(0, 0.0, 0.0, 2.0);
        let b = square(1, 1.0, 1.0, 2.0);
        for method in [IouMethod::Fast, IouMethod::Precise] {
            let overlap = OverlapCost::new(method, 1.0);
            assert_relative_eq!(overlap.iou(&a, &b), 1.0 / 7.0, epsilon = 1e-9);
            assert_relative_eq!(overlap.cost(&a, &b), 6.0 / 7.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_disjoint_shapes_cost_one() {
        let overlap = OverlapCost::default();
        let a = square(0, 0.0, 0.0, 1.0);
        let b = square(1, 5.0, 5.0, 1.0);
        assert_relative_eq!(overlap.cost(&a, &b), 1.0);
    }

    #[test]
    fn test_missing_shape_cost_one() {
        let overlap = OverlapCost::default();
        let a = TrackableObject::new(0, 0, &[0.0, 0.0]).unwrap();
        let b = square(1, 0.0, 0.0, 1.0);
        assert_eq!(overlap.cost(&a, &b), 1.0);
    }

    #[test]
    fn test_zero_area_shape_cost_one() {
        let overlap = OverlapCost::default();
        let flat = TrackableObject::new(0, 0, &[0.0, 0.0])
            .unwrap()
            .with_outline(vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]])
            .unwrap();
        assert_eq!(overlap.cost(&flat, &flat), 1.0);
    }

    // ===== Radius Approximation =====

    #[test]
    fn test_radius_polygon() {
        let a = TrackableObject::new(0, 0, &[0.0, 0.0]).unwrap().with_feature(RADIUS, 1.0);
        let vertices = shape_vertices(&a, 1.0).unwrap();
        assert_eq!(vertices.len(), CIRCLE_VERTICES);
        let area = to_polygon(&vertices).unsigned_area();
        // Regular 32-gon area: n/2 * r² * sin(2π/n)
        let expected = 16.0 * (2.0 * PI / 32.0).sin();
        assert_relative_eq!(area, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_scale_factor_grows_overlap() {
        let a = TrackableObject::new(0, 0, &[0.0, 0.0]).unwrap().with_feature(RADIUS, 1.0);
        let b = TrackableObject::new(1, 1, &[2.5, 0.0]).unwrap().with_feature(RADIUS, 1.0);
        let plain = OverlapCost::new(IouMethod::Precise, 1.0);
        let enlarged = OverlapCost::new(IouMethod::Precise, 2.0);
        assert_relative_eq!(plain.cost(&a, &b), 1.0);
        assert!(enlarged.cost(&a, &b) < 1.0);
    }

    #[test]
    fn test_iou_method_from_str() {
        assert_eq!("FAST".parse::<IouMethod>().unwrap(), IouMethod::Fast);
        assert_eq!("PRECISE".parse::<IouMethod>().unwrap(), IouMethod::Precise);
        assert!("EXACT".parse::<IouMethod>().is_err());
    }
}
