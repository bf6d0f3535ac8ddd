//! Cut computations for the nested L-shaped method.
//!
//! All four generators are pure functions from recorded solution state to a
//! [`Cut`]; nothing here touches a model or a solver. Coefficients are built
//! only over the node's shared variables, so a cut stays meaningful across
//! re-solves of the parent.
//!
//! With parent decision `x`, epigraph `theta`, child duals `pi` and child
//! constraint column `T`:
//!
//! - feasibility: `sum((pi' T) x) >= pi' h`, from one infeasible child's
//!   phase-1 duals;
//! - optimality: the probability-weighted aggregate
//!   `sum((p~' pi' T) x) + theta >= p~' pi' h` over all children;
//! - no-good: excludes the current binary point `x~` via
//!   `sum(G x) >= 1 - |support(x~)|` with `G = -1` on the support, `1` off;
//! - binary optimality (Laporte-Louveaux): ties `theta` to the children's
//!   expected cost `EV` at `x~` and relaxes to the lower bound `L` one flip
//!   away.

use nsd_core::{ConstraintInfo, Cut, SharedVars, ValueMap};

/// Binary support membership, tolerant of solver round-off.
fn is_one(value: f64) -> bool {
    (value - 1.0).abs() < 1e-6
}

fn value_of(values: &ValueMap, var: &str, index: i64) -> f64 {
    values.get(var).and_then(|m| m.get(&index)).copied().unwrap_or(0.0)
}

/// `pi' T` restricted to one variable column.
fn column_dual(info: &ConstraintInfo, duals: &ValueMap, var: &str, index: i64) -> f64 {
    info.column(var, index)
        .iter()
        .map(|term| term.coef * value_of(duals, &term.constraint, term.row))
        .sum()
}

/// `pi' h` over every dual the child reported.
fn rhs_dual(info: &ConstraintInfo, duals: &ValueMap) -> f64 {
    duals
        .iter()
        .flat_map(|(constraint, rows)| {
            rows.iter().map(move |(row, dual)| {
                info.rhs
                    .get(&(constraint.clone(), *row))
                    .copied()
                    .unwrap_or(0.0)
                    * dual
            })
        })
        .sum()
}

/// Dual information of one child subproblem.
pub struct ChildDuals<'a> {
    /// Conditional probability (normalized over the sibling set internally).
    pub probability: f64,
    pub duals: &'a ValueMap,
    pub info: &'a ConstraintInfo,
}

/// Feasibility cut from one infeasible child's phase-1 duals:
/// `sum(D x) >= d`.
pub fn feasibility_cut(shared: &SharedVars, duals: &ValueMap, info: &ConstraintInfo) -> Cut {
    let mut coefficients = ValueMap::new();
    for (var, indices) in shared {
        for index in indices {
            coefficients
                .entry(var.clone())
                .or_default()
                .insert(*index, column_dual(info, duals, var, *index));
        }
    }
    Cut::new(coefficients, rhs_dual(info, duals))
}

/// Aggregate optimality cut over all children: `sum(E x) + theta >= e`.
pub fn optimality_cut(shared: &SharedVars, children: &[ChildDuals<'_>]) -> Cut {
    let total: f64 = children.iter().map(|c| c.probability).sum();
    let mut coefficients = ValueMap::new();
    let mut rhs = 0.0;
    for child in children {
        let weight = child.probability / total;
        rhs += weight * rhs_dual(child.info, child.duals);
        for (var, indices) in shared {
            for index in indices {
                *coefficients
                    .entry(var.clone())
                    .or_default()
                    .entry(*index)
                    .or_insert(0.0) += weight * column_dual(child.info, child.duals, var, *index);
            }
        }
    }
    Cut::new(coefficients, rhs)
}

/// No-good cut excluding the binary point `x~`: `sum(G x) >= g`.
pub fn no_good_cut(shared: &SharedVars, values: &ValueMap) -> Cut {
    let mut coefficients = ValueMap::new();
    let mut support = 0.0;
    for (var, indices) in shared {
        for index in indices {
            let on = is_one(value_of(values, var, *index));
            if on {
                support += 1.0;
            }
            coefficients
                .entry(var.clone())
                .or_default()
                .insert(*index, if on { -1.0 } else { 1.0 });
        }
    }
    Cut::new(coefficients, 1.0 - support)
}

/// Binary optimality cut: `sum(F x) + theta >= f` with
/// `F = L - EV` on the support of `x~` and `EV - L` off it, and
/// `f = (L - EV)(delta - 1) + L` where `delta = |support(x~)|`.
pub fn binary_optimality_cut(
    shared: &SharedVars,
    values: &ValueMap,
    expected_value: f64,
    lower_bound: f64,
) -> Cut {
    let gap = lower_bound - expected_value;
    let mut coefficients = ValueMap::new();
    let mut support = 0.0;
    for (var, indices) in shared {
        for index in indices {
            let on = is_one(value_of(values, var, *index));
            if on {
                support += 1.0;
            }
            coefficients
                .entry(var.clone())
                .or_default()
                .insert(*index, if on { gap } else { -gap });
        }
    }
    Cut::new(coefficients, gap * (support - 1.0) + lower_bound)
}
