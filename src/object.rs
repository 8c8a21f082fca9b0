//! Trackable objects: the per-frame detections fed to the tracker.

use std::collections::BTreeMap;
use std::fmt;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::utils::validate_position;
use crate::{Error, Result};

/// Feature name holding the radius used to approximate a missing outline.
pub const RADIUS: &str = "RADIUS";

/// Stable identity of a trackable object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub u64);

impl From<u64> for ObjectId {
    fn from(id: u64) -> Self {
        ObjectId(id)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A detection to be linked.
///
/// Objects are created upstream and treated as an immutable snapshot for the
/// whole tracking run: the tracker only ever reads them.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackableObject {
    /// Identity, unique within one collection.
    pub id: ObjectId,

    /// Frame index.
    pub frame: i32,

    /// Position with 2 or 3 coordinates.
    pub position: DVector<f64>,

    /// Named numerical features (e.g. `RADIUS`, `MEAN_INTENSITY`).
    pub features: BTreeMap<String, f64>,

    /// Optional shape outline as a closed polygon in absolute coordinates.
    pub outline: Option<Vec<[f64; 2]>>,
}

impl TrackableObject {
    /// Create a new object at the given position.
    ///
    /// # Arguments
    /// * `id` - Object identity
    /// * `frame` - Frame index
    /// * `position` - 2 or 3 finite coordinates
    pub fn new(id: impl Into<ObjectId>, frame: i32, position: &[f64]) -> Result<Self> {
        let position = validate_position(position)?;
        Ok(Self {
            id: id.into(),
            frame,
            position,
            features: BTreeMap::new(),
            outline: None,
        })
    }

    /// Builder-style feature setter.
    pub fn with_feature(mut self, name: &str, value: f64) -> Self {
        self.features.insert(name.to_string(), value);
        self
    }

    /// Builder-style outline setter.
    ///
    /// The outline needs at least 3 vertices with finite coordinates.
    pub fn with_outline(mut self, outline: Vec<[f64; 2]>) -> Result<Self> {
        if outline.len() < 3 {
            return Err(Error::InvalidObject(format!(
                "Outline of object {} has {} vertices, need at least 3",
                self.id,
                outline.len()
            )));
        }
        if outline.iter().flatten().any(|c| !c.is_finite()) {
            return Err(Error::InvalidObject(format!(
                "Outline of object {} has non-finite coordinates",
                self.id
            )));
        }
        self.outline = Some(outline);
        Ok(self)
    }

    /// Get a feature value, if present.
    #[inline]
    pub fn feature(&self, name: &str) -> Option<f64> {
        self.features.get(name).copied()
    }

    /// Get the dimensionality of the position (2 or 3).
    pub fn num_dims(&self) -> usize {
        self.position.len()
    }

    /// X coordinate.
    #[inline]
    pub fn x(&self) -> f64 {
        self.position[0]
    }

    /// Y coordinate.
    #[inline]
    pub fn y(&self) -> f64 {
        self.position[1]
    }

    /// Squared euclidean distance to another object.
    ///
    /// Coordinates missing on one side count as zero, so a 2D object
    /// compared to a 3D one behaves as lying in the z = 0 plane.
    pub fn square_distance_to(&self, other: &TrackableObject) -> f64 {
        let n = self.position.len().max(other.position.len());
        (0..n)
            .map(|i| {
                let a = self.position.get(i).copied().unwrap_or(0.0);
                let b = other.position.get(i).copied().unwrap_or(0.0);
                (a - b) * (a - b)
            })
            .sum()
    }

    /// Whether a shape can be derived for overlap costs.
    pub fn has_shape(&self) -> bool {
        self.outline.is_some() || self.feature(RADIUS).map_or(false, |r| r > 0.0)
    }
}
