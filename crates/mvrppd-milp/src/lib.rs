//! Exact MILP solver for the bi-objective MVRPPD.
//!
//! [`model`] defines a solver-agnostic MIP representation together with the
//! incumbent-callback contract the driver relies on; [`engine`] implements
//! that contract on the bundled HiGHS solver; [`solver`] builds the routing
//! model, runs the iterated profit-lower-bound sweep and collects every
//! incumbent into a [`mvrppd_core::ParetoArchive`].

pub mod engine;
pub mod model;
pub mod solver;

mod callback;

pub use engine::HighsEngine;
pub use model::{
    Constraint, EngineError, Incumbent, LazyCuts, LinExpr, MipCallback, MipEngine, MipModel,
    MipOutcome, MipParams, MipStatus, RowSense, VarId, VarKind, Variable,
};
pub use solver::{MilpSolver, SolverConfig};
