//! Sparse linear assignment.
//!
//! This module provides:
//! - `SparseCostMatrix` - compressed sparse-row cost matrix
//! - `solve` / `solve_with_alternative` - sparse Jonker-Volgenant solver
//! - `CandidateBuilder` - assembles keyed candidate links into a matrix
//! - `link` - solves candidates with "leave unassigned" alternatives
//! - `solve_dense` - dense reference solver (tests and `dense-reference` only)

mod sparse;
mod jv;
mod candidates;
mod linker;

#[cfg(any(test, feature = "dense-reference"))]
pub mod dense;

pub use sparse::SparseCostMatrix;
pub use jv::{solve, solve_with_alternative, Assignment};
pub use candidates::{AlternativeCost, CandidateBuilder, LinkCandidates};
pub use linker::{complement, link, Link};

#[cfg(any(test, feature = "dense-reference"))]
pub use dense::solve_dense;
