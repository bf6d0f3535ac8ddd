//! Boundary between the decomposition engine and the subproblem numerics.
//!
//! The controller never sees a model or a backend; it hands a [`NodeSolver`]
//! the tree and a node id and gets back a [`SolutionRecord`]. Everything the
//! solver needs (data, parent solution, cut pool) it reads from the tree.

use nsd_core::{NodeId, SolutionRecord, Tree, TreeError};
use thiserror::Error;

/// Whether integrality declared by a template is honored or relaxed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveMode {
    Continuous,
    Binary,
}

/// Errors raised while resolving or instantiating a subproblem template.
#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("template `{file}::{function}` is not registered")]
    Unknown { file: String, function: String },

    #[error("template `{template}` requires parameter `{name}`")]
    MissingParam { template: String, name: String },

    #[error("template `{template}`: parameter `{name}` has the wrong shape")]
    InvalidParam { template: String, name: String },

    #[error("template `{template}` requires set `{name}`")]
    MissingSet { template: String, name: String },
}

/// Errors raised while solving node subproblems or assembling cuts.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error("node {id}: {message}")]
    Backend { id: NodeId, message: String },

    #[error("node {id}: phase-1 reformulation is itself infeasible")]
    Phase1Infeasible { id: NodeId },

    #[error("node {id}: recorded solution carries no dual values")]
    MissingDuals { id: NodeId },

    #[error("node {id}: constraint data was not prepared")]
    MissingConstraintInfo { id: NodeId },
}

/// A subproblem solver the controller can drive.
pub trait NodeSolver {
    /// One-time preparation before the pass loop: validates every node's
    /// template against its data and attaches the column-wise constraint
    /// information cut generation reads. Template errors surface here,
    /// before any node is solved.
    fn prepare(&self, tree: &mut Tree) -> Result<(), SolveError>;

    /// Solves one node subproblem against the tree's current state (parent
    /// solution fixed in, cuts injected) and returns the outcome. An
    /// infeasible subproblem is not an error: the record comes back with
    /// `Infeasible` status and phase-1 duals.
    fn solve_node(
        &self,
        tree: &Tree,
        id: NodeId,
        mode: SolveMode,
    ) -> Result<SolutionRecord, SolveError>;
}
