use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::cut::CutPool;
use crate::{NodeId, ValueMap};

/// Reference to a registered subproblem template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    pub file: String,
    pub function: String,
}

impl TemplateRef {
    pub fn new(file: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            function: function.into(),
        }
    }
}

impl std::fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.file, self.function)
    }
}

/// A parameter value: either a scalar or a map over integer indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Scalar(f64),
    Indexed(BTreeMap<i64, f64>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            ParamValue::Scalar(v) => Some(*v),
            ParamValue::Indexed(_) => None,
        }
    }

    pub fn as_indexed(&self) -> Option<&BTreeMap<i64, f64>> {
        match self {
            ParamValue::Scalar(_) => None,
            ParamValue::Indexed(map) => Some(map),
        }
    }
}

/// Parameters and index sets available to a subproblem template.
///
/// Node-local entries overlay the tree-wide general data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub sets: BTreeMap<String, Vec<i64>>,
}

impl NodeData {
    /// Returns `self` overlaid with `over`; entries in `over` win.
    pub fn overlaid(&self, over: &NodeData) -> NodeData {
        let mut merged = self.clone();
        for (name, value) in &over.params {
            merged.params.insert(name.clone(), value.clone());
        }
        for (name, members) in &over.sets {
            merged.sets.insert(name.clone(), members.clone());
        }
        merged
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolutionStatus {
    Optimal,
    Infeasible,
}

/// Outcome of one subproblem solve.
///
/// For an infeasible subproblem the record carries the phase-1 solution:
/// `objective` holds the total constraint violation under the key `phase1`
/// and `duals` holds the phase-1 duals that feed feasibility cuts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionRecord {
    pub status: SolutionStatus,
    pub variables: ValueMap,
    pub objective: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duals: Option<ValueMap>,
}

impl SolutionRecord {
    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// Sum of the objective components.
    pub fn objective_value(&self) -> f64 {
        self.objective.values().sum()
    }

    /// Value of one variable, if present.
    pub fn variable(&self, name: &str, index: i64) -> Option<f64> {
        self.variables.get(name).and_then(|m| m.get(&index)).copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum NodeSolution {
    #[default]
    Unsolved,
    Solved(SolutionRecord),
}

impl NodeSolution {
    pub fn record(&self) -> Option<&SolutionRecord> {
        match self {
            NodeSolution::Unsolved => None,
            NodeSolution::Solved(record) => Some(record),
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, NodeSolution::Solved(_))
    }
}

/// One coefficient of a variable column: `coef` in row `row` of the
/// constraint family `constraint`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoefTerm {
    pub coef: f64,
    pub constraint: String,
    pub row: i64,
}

/// Column-wise view of a node's base constraint matrix, precomputed once at
/// tree preparation so cut generation never has to re-read a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintInfo {
    /// `variable -> index -> coefficient terms` over all base constraints.
    pub columns: BTreeMap<String, BTreeMap<i64, Vec<CoefTerm>>>,
    /// `(constraint, row) -> right-hand side`.
    pub rhs: BTreeMap<(String, i64), f64>,
}

impl ConstraintInfo {
    pub fn push_term(&mut self, var: &str, index: i64, term: CoefTerm) {
        self.columns
            .entry(var.to_string())
            .or_default()
            .entry(index)
            .or_default()
            .push(term);
    }

    pub fn set_rhs(&mut self, constraint: &str, row: i64, value: f64) {
        self.rhs.insert((constraint.to_string(), row), value);
    }

    /// Coefficient terms of one variable column (empty if absent).
    pub fn column(&self, var: &str, index: i64) -> &[CoefTerm] {
        self.columns
            .get(var)
            .and_then(|m| m.get(&index))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

fn default_probability() -> f64 {
    1.0
}

/// One decision point of the scenario tree.
///
/// `probability` is conditional on the parent; sibling probabilities are
/// normalized where expectations are taken, so they need not sum to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub stage: i64,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    #[serde(default = "default_probability")]
    pub probability: f64,
    pub template: TemplateRef,
    #[serde(flatten)]
    pub data: NodeData,
    #[serde(skip)]
    pub cuts: CutPool,
    #[serde(skip)]
    pub constraint_info: Option<ConstraintInfo>,
    #[serde(skip)]
    pub solution: NodeSolution,
}

impl Node {
    pub fn new(
        id: NodeId,
        stage: i64,
        parent_id: Option<NodeId>,
        probability: f64,
        template: TemplateRef,
    ) -> Self {
        Self {
            id,
            stage,
            parent_id,
            probability,
            template,
            data: NodeData::default(),
            cuts: CutPool::default(),
            constraint_info: None,
            solution: NodeSolution::Unsolved,
        }
    }

    pub fn with_data(mut self, data: NodeData) -> Self {
        self.data = data;
        self
    }

    pub fn is_solved(&self) -> bool {
        self.solution.is_solved()
    }
}
