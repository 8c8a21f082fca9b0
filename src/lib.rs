//! # sparselap - LAP-based particle tracking
//!
//! Links per-frame detections of particles or cells into multi-frame
//! trajectories by solving sparse Linear Assignment Problems.
//!
//! Tracking runs in two stages:
//!
//! 1. Frame-to-frame linking: one sparse LAP per consecutive frame pair,
//!    solved concurrently, producing linear track segments.
//! 2. Segment linking: one composite LAP over all segments encoding gap
//!    closing, track splitting and track merging candidates.
//!
//! Each LAP is solved with a sparse Jonker-Volgenant shortest augmenting
//! path solver working directly on a compressed sparse-row cost matrix.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sparselap_rs::{ObjectCollection, Settings, SparseLapTracker, TrackableObject};
//!
//! let mut objects = ObjectCollection::new();
//! objects.add(TrackableObject::new(0, 0, &[10.0, 10.0]).unwrap()).unwrap();
//! objects.add(TrackableObject::new(1, 1, &[11.0, 10.0]).unwrap()).unwrap();
//!
//! let mut tracker = SparseLapTracker::new(objects, Settings::default_lap());
//! if tracker.check_input() && tracker.process() {
//!     let graph = tracker.result().unwrap();
//!     assert_eq!(graph.edge_count(), 1);
//! }
//! ```

// Public modules
pub mod object;
pub mod collection;
pub mod costs;
pub mod lap;
pub mod graph;
pub mod settings;
pub mod progress;
pub mod tracking;
pub mod tracker;
pub mod utils;

// Re-exports for convenience
pub use object::{ObjectId, TrackableObject};
pub use collection::ObjectCollection;
pub use costs::{CostFunction, CostMethod, IouMethod, OverlapCost};
pub use lap::{Assignment, SparseCostMatrix};
pub use graph::{Edge, LinkageGraph};
pub use settings::{check_settings_validity, LapSettings, SettingValue, Settings};
pub use progress::{CancelToken, ProgressLogger, TracingLogger, VoidLogger};
pub use tracker::{SparseLapTracker, TrackerState};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    use crate::object::ObjectId;

    /// Errors that can occur while tracking
    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum Error {
        #[error("Invalid settings: {0}")]
        InvalidSettings(String),

        #[error("Invalid input: {0}")]
        InvalidInput(String),

        #[error("Invalid object: {0}")]
        InvalidObject(String),

        #[error("Duplicate object id: {0}")]
        DuplicateObject(ObjectId),

        #[error("Malformed sparse cost matrix: {0}")]
        MalformedMatrix(String),

        #[error("Dimension mismatch in {operation}: expected {expected}, got {got}")]
        DimensionMismatch {
            operation: &'static str,
            expected: usize,
            got: usize,
        },

        #[error("Cost matrix must be square, got {rows}x{cols}")]
        NonSquareMatrix { rows: usize, cols: usize },

        #[error("No complete assignment exists: row {row} cannot be matched")]
        InfeasibleAssignment { row: usize },

        #[error("Duplicate link candidate: {0}")]
        DuplicateCandidate(String),

        #[error("Edge violates temporal order: {0}")]
        TemporalOrder(String),

        #[error("Unknown cost method: {0}")]
        UnknownCostMethod(String),

        #[error("Canceled: {0}")]
        Canceled(String),

        #[error("Thread pool error: {0}")]
        ThreadPool(String),
    }

    /// Result type for tracking operations
    pub type Result<T> = std::result::Result<T, Error>;
}
