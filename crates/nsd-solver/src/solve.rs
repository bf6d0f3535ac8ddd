//! Lowering a [`LinearModel`] to good_lp and solving it with Clarabel.
//!
//! Integrality flags are ignored here on purpose: this function *is* the
//! LP relaxation, and [`crate::mip`] drives it to integer optimality.
//! Dual values are reported against the row `(name, index)` identities.

use good_lp::solvers::clarabel::clarabel;
use good_lp::solvers::{DualValues, SolutionWithDual};
use good_lp::{constraint, variable, variables, Expression, ResolutionError, Solution, SolverModel};
use thiserror::Error;

use nsd_core::ValueMap;

use crate::model::{LinearModel, RowOp};

/// Backend failure (unboundedness, numerical breakdown, bad model).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct BackendError(pub String);

#[derive(Debug, Clone)]
pub struct LpSolution {
    pub variables: ValueMap,
    pub objective: f64,
    pub duals: Option<ValueMap>,
}

#[derive(Debug, Clone)]
pub enum LpOutcome {
    Optimal(LpSolution),
    Infeasible,
}

impl LpOutcome {
    pub fn optimal(self) -> Option<LpSolution> {
        match self {
            LpOutcome::Optimal(solution) => Some(solution),
            LpOutcome::Infeasible => None,
        }
    }
}

/// Solves the continuous relaxation of `model`.
pub fn solve_lp(model: &LinearModel, want_duals: bool) -> Result<LpOutcome, BackendError> {
    let mut vars = variables!();
    let mut handles = Vec::with_capacity(model.vars().len());
    for def in model.vars() {
        let mut definition = variable();
        if def.lower.is_finite() {
            definition = definition.min(def.lower);
        }
        if def.upper.is_finite() {
            definition = definition.max(def.upper);
        }
        handles.push(vars.add(definition));
    }

    let mut objective = Expression::from(0.0);
    for (pos, def) in model.vars().iter().enumerate() {
        if def.objective != 0.0 {
            objective += def.objective * handles[pos];
        }
    }

    let mut problem = vars.minimise(objective).using(clarabel);
    let mut row_refs = Vec::with_capacity(model.rows().len());
    for row in model.rows() {
        let mut lhs = Expression::from(0.0);
        for term in &row.terms {
            lhs += term.coef * handles[term.var];
        }
        let constraint = match row.op {
            RowOp::Le => constraint!(lhs <= row.rhs),
            RowOp::Ge => constraint!(lhs >= row.rhs),
            RowOp::Eq => constraint!(lhs == row.rhs),
        };
        row_refs.push(problem.add_constraint(constraint));
    }

    let mut solution = match problem.solve() {
        Ok(solution) => solution,
        Err(ResolutionError::Infeasible) => return Ok(LpOutcome::Infeasible),
        Err(error) => return Err(BackendError(error.to_string())),
    };

    let mut values = ValueMap::new();
    let mut objective_value = 0.0;
    for (pos, def) in model.vars().iter().enumerate() {
        let value = solution.value(handles[pos]);
        objective_value += def.objective * value;
        values
            .entry(def.name.clone())
            .or_default()
            .insert(def.index, value);
    }

    let duals = if want_duals {
        let dual = solution.compute_dual();
        let mut map = ValueMap::new();
        for (row, reference) in model.rows().iter().zip(row_refs) {
            map.entry(row.name.clone())
                .or_default()
                .insert(row.index, dual.dual(reference));
        }
        Some(map)
    } else {
        None
    };

    Ok(LpOutcome::Optimal(LpSolution {
        variables: values,
        objective: objective_value,
        duals,
    }))
}
