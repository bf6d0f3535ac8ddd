//! Depth-first branch-and-bound for models with binary/integer variables.
//!
//! Clarabel only solves the continuous cone program, so integrality is
//! enforced here: bound the node with [`solve_lp`], branch on the first
//! fractional integer variable, prune on the incumbent. Minimization
//! throughout.

use tracing::debug;

use crate::model::LinearModel;
use crate::solve::{solve_lp, BackendError, LpOutcome, LpSolution};

const INT_TOL: f64 = 1e-6;
const PRUNE_TOL: f64 = 1e-9;

/// Safety valve against runaway enumeration.
const NODE_LIMIT: usize = 10_000;

fn fractional_part(value: f64) -> f64 {
    (value - value.round()).abs()
}

/// Solves `model` to integer optimality.
pub fn solve_mip(model: &LinearModel) -> Result<LpOutcome, BackendError> {
    if !model.has_integer_vars() {
        return solve_lp(model, false);
    }
    let integer_vars = model.integer_positions();

    let mut best: Option<LpSolution> = None;
    let mut stack = vec![model.clone()];
    let mut explored = 0usize;

    while let Some(candidate) = stack.pop() {
        explored += 1;
        if explored > NODE_LIMIT {
            return Err(BackendError(format!(
                "branch-and-bound exceeded {NODE_LIMIT} nodes"
            )));
        }

        let relaxation = match solve_lp(&candidate, false)? {
            LpOutcome::Optimal(solution) => solution,
            LpOutcome::Infeasible => continue,
        };
        if let Some(incumbent) = &best {
            if relaxation.objective >= incumbent.objective - PRUNE_TOL {
                continue;
            }
        }

        let branch_var = integer_vars.iter().copied().find(|pos| {
            let def = &candidate.vars()[*pos];
            let value = relaxation.variables[&def.name][&def.index];
            fractional_part(value) > INT_TOL
        });

        match branch_var {
            None => {
                debug!(objective = relaxation.objective, "incumbent update");
                best = Some(round_integers(relaxation, &candidate, &integer_vars));
            }
            Some(pos) => {
                let def = &candidate.vars()[pos];
                let value = relaxation.variables[&def.name][&def.index];

                let mut down = candidate.clone();
                down.tighten_upper(pos, value.floor());
                let mut up = candidate.clone();
                up.tighten_lower(pos, value.ceil());

                if down.vars()[pos].lower <= down.vars()[pos].upper {
                    stack.push(down);
                }
                if up.vars()[pos].lower <= up.vars()[pos].upper {
                    stack.push(up);
                }
            }
        }
    }

    Ok(best.map(LpOutcome::Optimal).unwrap_or(LpOutcome::Infeasible))
}

/// Snaps near-integer values to the grid and recomputes the objective.
fn round_integers(
    mut solution: LpSolution,
    model: &LinearModel,
    integer_vars: &[usize],
) -> LpSolution {
    for pos in integer_vars {
        let def = &model.vars()[*pos];
        if let Some(value) = solution
            .variables
            .get_mut(&def.name)
            .and_then(|m| m.get_mut(&def.index))
        {
            *value = value.round();
        }
    }
    let mut objective = 0.0;
    for def in model.vars() {
        objective += def.objective * solution.variables[&def.name][&def.index];
    }
    solution.objective = objective;
    solution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RowOp;

    #[test]
    fn branches_to_the_integer_optimum() {
        // min -3a - 4b  s.t.  2a + 3b <= 4,  a,b binary.
        // The relaxation picks a = 1, b = 2/3; the integer optimum is b = 1.
        let mut model = LinearModel::new();
        let a = model.add_binary_var("z", 1);
        let b = model.add_binary_var("z", 2);
        model.set_objective(a, -3.0);
        model.set_objective(b, -4.0);
        model.add_row("knapsack", 1, vec![(a, 2.0), (b, 3.0)], RowOp::Le, 4.0);

        let solution = solve_mip(&model).unwrap().optimal().unwrap();
        assert!((solution.objective - -4.0).abs() < 1e-6);
        assert!((solution.variables["z"][&1]).abs() < 1e-9);
        assert!((solution.variables["z"][&2] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn integer_infeasibility_is_reported() {
        // z1 + z2 >= 3 over two binaries.
        let mut model = LinearModel::new();
        let a = model.add_binary_var("z", 1);
        let b = model.add_binary_var("z", 2);
        model.set_objective(a, 1.0);
        model.set_objective(b, 1.0);
        model.add_row("cover", 1, vec![(a, 1.0), (b, 1.0)], RowOp::Ge, 3.0);

        assert!(matches!(solve_mip(&model).unwrap(), LpOutcome::Infeasible));
    }

    #[test]
    fn continuous_models_pass_straight_through() {
        let mut model = LinearModel::new();
        let x = model.add_var("x", 1, 0.0, 10.0);
        model.set_objective(x, 1.0);
        model.add_row("floor", 1, vec![(x, 1.0)], RowOp::Ge, 2.5);

        let solution = solve_mip(&model).unwrap().optimal().unwrap();
        assert!((solution.variables["x"][&1] - 2.5).abs() < 1e-6);
    }
}
