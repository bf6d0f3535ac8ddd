//! # nsd-core: Scenario Tree Data Model
//!
//! Core data structures for nested stochastic decomposition over a scenario
//! tree. The tree is the single mutable artifact of a decomposition run: the
//! algorithm layer reads node data, appends cuts, and records subproblem
//! solutions through [`Tree`], while the solver layer consumes the same state
//! to assemble per-node linear programs.
//!
//! | Type | Role |
//! |------|------|
//! | [`Tree`] | Validated scenario tree with id/stage/children indices |
//! | [`Node`] | One decision point: data, template reference, cuts, solution |
//! | [`NodeSolution`] | `Unsolved` or a [`SolutionRecord`] |
//! | [`CutPool`] | Four append-only cut buckets per node |
//! | [`ConstraintInfo`] | Column-wise constraint coefficients for cut algebra |

pub mod cut;
pub mod error;
pub mod node;
pub mod tree;

pub use cut::{Cut, CutBucket, CutPool};
pub use error::TreeError;
pub use node::{
    ConstraintInfo, CoefTerm, Node, NodeData, NodeSolution, ParamValue, SolutionRecord,
    SolutionStatus, TemplateRef,
};
pub use tree::Tree;

use std::collections::BTreeMap;

/// Scenario tree node identifier.
pub type NodeId = i64;

/// Nested `variable name -> index -> value` map used for solution values,
/// dual values and cut coefficients. Scalar entities use index 0.
pub type ValueMap = BTreeMap<String, BTreeMap<i64, f64>>;

/// Variable/index pairs a node shares with all of its children.
pub type SharedVars = BTreeMap<String, Vec<i64>>;

/// Name of the epigraph variable injected when a node carries optimality
/// cuts. Excluded from shared-variable computation and downstream fixing.
pub const EPIGRAPH_VAR: &str = "theta";
