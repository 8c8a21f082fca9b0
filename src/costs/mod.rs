//! Linking costs between trackable objects.
//!
//! This module provides:
//! - `CostFunction` - enum dispatch over the supported costs
//! - `OverlapCost` / `IouMethod` - shape-overlap parameters
//! - Built-in cost functions (square distance, feature penalties)
//! - `CostMethod` - the cost family selected by the `COST_METHOD` setting

mod dispatch;
mod functions;
mod overlap;

pub use dispatch::CostFunction;
pub use functions::*;
pub use overlap::{regular_polygon, shape_vertices, IouMethod, OverlapCost, CIRCLE_VERTICES};

use std::str::FromStr;

use crate::{Error, Result};

/// Cost family used for frame-to-frame linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostMethod {
    /// Squared distance, optionally feature-penalized.
    Distance,
    /// Shape overlap, optionally feature-penalized.
    Overlap,
}

impl CostMethod {
    /// Setting value for this method.
    pub fn as_str(&self) -> &'static str {
        match self {
            CostMethod::Distance => "DISTANCE",
            CostMethod::Overlap => "OVERLAP",
        }
    }
}

impl FromStr for CostMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "DISTANCE" => Ok(CostMethod::Distance),
            "OVERLAP" => Ok(CostMethod::Overlap),
            _ => Err(Error::UnknownCostMethod(format!(
                "{}. Supported cost methods: DISTANCE, OVERLAP",
                s
            ))),
        }
    }
}
