//! # nsd-algo: Nested Decomposition over a Scenario Tree
//!
//! The L-shaped / nested Benders decomposition engine for multistage
//! stochastic programs. The crate is solver-agnostic: subproblems reach the
//! numerics through the [`NodeSolver`] trait and everything here works on
//! [`nsd_core::Tree`] state alone.
//!
//! | Module | Role |
//! |--------|------|
//! | [`cuts`] | The four cut computations (pure functions) |
//! | [`schedule`] | Forward/backward frontier walk over the tree |
//! | [`controller`] | Pass loop, cut triggering, stopping criteria, two-phase binary driver |
//! | [`solver`] | [`NodeSolver`] boundary trait and error taxonomy |
//!
//! ## References
//!
//! - J. R. Birge, F. Louveaux, *Introduction to Stochastic Programming*,
//!   2nd ed., Springer, 2011 (nested L-shaped method, ch. 5-6).
//! - G. Laporte, F. Louveaux, "The integer L-shaped method for stochastic
//!   integer programs with complete recourse", *Operations Research
//!   Letters* 13 (1993).

pub mod controller;
pub mod cuts;
pub mod schedule;
pub mod solver;

pub use controller::{Controller, ProblemClass, RunConfig, RunStats, StopReason};
pub use schedule::{PassSchedule, Sense};
pub use solver::{NodeSolver, SolveError, SolveMode, TemplateError};
