//! # nsd-solver: Subproblem Numerics
//!
//! Turns a scenario-tree node into a linear (or mixed-binary) program and
//! solves it with [good_lp] on the pure-Rust Clarabel backend.
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | [`LinearModel`]: ordered variable/row declarations, phase-1 reformulation |
//! | [`templates`] | Compile-time registry of subproblem templates |
//! | [`solve`] | Lowering to good_lp, solving, dual extraction |
//! | [`mip`] | Depth-first branch-and-bound over the LP relaxation |
//! | [`adapter`] | [`LpNodeSolver`]: the [`nsd_algo::NodeSolver`] implementation |
//!
//! Clarabel has no integer support, so binary subproblems are branched here:
//! the relaxation bound comes from the same LP path, and duals for integer
//! models are always taken from the continuous relaxation.

pub mod adapter;
pub mod mip;
pub mod model;
pub mod solve;
pub mod templates;

pub use adapter::LpNodeSolver;
pub use model::{LinearModel, RowOp};
pub use solve::{LpOutcome, LpSolution};
pub use templates::TemplateRegistry;
