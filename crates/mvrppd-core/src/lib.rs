//! Core data model for the bi-objective multi-vehicle routing problem with
//! pickup and delivery (MVRPPD).
//!
//! A problem [`Instance`] owns the fleet, the request pool, and the vertex
//! geometry. A candidate [`Solution`] carries one path per vehicle together
//! with the MILP decision variables derived from (or defining) those paths,
//! and can verify itself both against the fast per-path feasibility rules and
//! against the full MILP constraint system. A [`ParetoArchive`] accumulates
//! solutions and keeps a bounded, non-dominated-sorted subset of them.

pub mod archive;
pub mod instance;
pub mod solution;

mod read;

pub use archive::ParetoArchive;
pub use instance::{Instance, InstanceData, InstanceError, Request, Stop, Vehicle};
pub use read::ReadError;
pub use solution::{ConstraintViolation, FeasibilityError, PathError, Solution, SolutionError};

/// Tolerance used by the integrity and constraint checkers for floating-point
/// comparisons.
pub const FLOAT_EPS: f64 = f32::EPSILON as f64;
