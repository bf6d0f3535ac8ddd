//! [`NodeSolver`] implementation over [`LinearModel`] and good_lp.
//!
//! Per node solve: build the template model, pin the parent's recorded
//! decisions, inject the node's cut pool (adding the epigraph variable the
//! first time an optimality-kind cut appears), then solve. An infeasible
//! subproblem falls back to the phase-1 reformulation, whose duals become
//! the feasibility-cut data. Integer models get their primal from
//! branch-and-bound and their duals from the continuous relaxation.

use tracing::debug;

use nsd_algo::{NodeSolver, SolveError, SolveMode};
use nsd_core::{
    CutBucket, NodeId, SolutionRecord, SolutionStatus, Tree, TreeError, ValueMap, EPIGRAPH_VAR,
};
use std::collections::BTreeMap;

use crate::model::{LinearModel, RowOp, VIOLATION_VAR};
use crate::solve::{solve_lp, LpOutcome, LpSolution};
use crate::templates::TemplateRegistry;

pub struct LpNodeSolver {
    registry: TemplateRegistry,
}

impl LpNodeSolver {
    pub fn new(registry: TemplateRegistry) -> Self {
        Self { registry }
    }

    pub fn with_builtin_templates() -> Self {
        Self::new(TemplateRegistry::builtin())
    }

    fn build_model(&self, tree: &Tree, id: NodeId) -> Result<LinearModel, SolveError> {
        let node = tree.get_node(id)?;
        let data = tree.node_data(id)?;
        Ok(self.registry.build(&node.template, &data)?)
    }

    /// Appends the pool's cuts as `>=` rows. Optimality-kind cuts introduce
    /// the epigraph variable (free, unit objective) and carry it with
    /// coefficient one.
    fn inject_cuts(model: &mut LinearModel, tree: &Tree, id: NodeId) -> Result<(), TreeError> {
        let pool = &tree.get_node(id)?.cuts;
        let epigraph = if pool.has_optimality_cuts() {
            let pos = model.add_var(EPIGRAPH_VAR, 0, f64::NEG_INFINITY, f64::INFINITY);
            model.set_objective(pos, 1.0);
            Some(pos)
        } else {
            None
        };

        for bucket in CutBucket::ALL {
            let row_name = match bucket {
                CutBucket::Feasibility => "_cut_feas",
                CutBucket::Optimality => "_cut_opt",
                CutBucket::BinaryFeasibility => "_cut_bin_feas",
                CutBucket::BinaryOptimality => "_cut_bin_opt",
            };
            for (key, cut) in pool.bucket(bucket) {
                let mut terms = Vec::new();
                for (name, indices) in &cut.coefficients {
                    for (index, coef) in indices {
                        // A cut variable the template no longer declares
                        // contributes nothing at this node.
                        if let Some(pos) = model.var_position(name, *index) {
                            terms.push((pos, *coef));
                        }
                    }
                }
                if bucket.is_optimality_kind() {
                    if let Some(pos) = epigraph {
                        terms.push((pos, 1.0));
                    }
                }
                model.add_row(row_name, key as i64, terms, RowOp::Ge, cut.rhs);
            }
        }
        Ok(())
    }

    fn record_from(solution: LpSolution, status: SolutionStatus) -> SolutionRecord {
        let mut variables = solution.variables;
        variables.retain(|name, _| name != VIOLATION_VAR);
        let objective_key = match status {
            SolutionStatus::Optimal => "objective",
            SolutionStatus::Infeasible => "phase1",
        };
        SolutionRecord {
            status,
            variables,
            objective: BTreeMap::from([(objective_key.to_string(), solution.objective)]),
            duals: solution.duals,
        }
    }

    /// Phase-1 fallback for an infeasible subproblem.
    fn solve_phase1(&self, model: &LinearModel, id: NodeId) -> Result<SolutionRecord, SolveError> {
        debug!(node = id, "subproblem infeasible; solving phase-1");
        let phase1 = model.phase1();
        match solve_lp(&phase1, true).map_err(|e| SolveError::Backend {
            id,
            message: e.to_string(),
        })? {
            LpOutcome::Optimal(solution) => {
                Ok(Self::record_from(solution, SolutionStatus::Infeasible))
            }
            LpOutcome::Infeasible => Err(SolveError::Phase1Infeasible { id }),
        }
    }

    fn relaxation_duals(
        &self,
        model: &LinearModel,
        id: NodeId,
    ) -> Result<Option<ValueMap>, SolveError> {
        let mut relaxed = model.clone();
        relaxed.relax_integrality();
        match solve_lp(&relaxed, true).map_err(|e| SolveError::Backend {
            id,
            message: e.to_string(),
        })? {
            LpOutcome::Optimal(solution) => Ok(solution.duals),
            LpOutcome::Infeasible => Err(SolveError::Backend {
                id,
                message: "relaxation of a feasible integer model reported infeasible".to_string(),
            }),
        }
    }
}

impl NodeSolver for LpNodeSolver {
    fn prepare(&self, tree: &mut Tree) -> Result<(), SolveError> {
        let ids: Vec<NodeId> = tree.node_ids().collect();
        for id in ids {
            let model = self.build_model(tree, id)?;
            tree.set_constraint_info(id, model.constraint_info())?;
        }
        Ok(())
    }

    fn solve_node(
        &self,
        tree: &Tree,
        id: NodeId,
        mode: SolveMode,
    ) -> Result<SolutionRecord, SolveError> {
        let mut model = self.build_model(tree, id)?;
        if mode == SolveMode::Continuous {
            model.relax_integrality();
        }

        if let Some(parent) = tree.parent_of(id)? {
            let record = tree
                .get_node(parent)?
                .solution
                .record()
                .ok_or(TreeError::NotSolved(parent))?;
            for (name, indices) in &record.variables {
                if name == EPIGRAPH_VAR {
                    continue;
                }
                for (index, value) in indices {
                    if model.fix_if_present(name, *index, *value) {
                        debug!(node = id, var = %name, index, value, "pinned parent decision");
                    }
                }
            }
        }

        Self::inject_cuts(&mut model, tree, id)?;

        // Duals are only consumed by the parent's cut generation; the root
        // has no parent.
        let want_duals = !tree.is_root(id)?;
        let backend = |e: crate::solve::BackendError| SolveError::Backend {
            id,
            message: e.to_string(),
        };

        if model.has_integer_vars() {
            match crate::mip::solve_mip(&model).map_err(backend)? {
                LpOutcome::Optimal(mut solution) => {
                    if want_duals {
                        solution.duals = self.relaxation_duals(&model, id)?;
                    }
                    Ok(Self::record_from(solution, SolutionStatus::Optimal))
                }
                LpOutcome::Infeasible => self.solve_phase1(&model, id),
            }
        } else {
            match solve_lp(&model, want_duals).map_err(backend)? {
                LpOutcome::Optimal(solution) => {
                    Ok(Self::record_from(solution, SolutionStatus::Optimal))
                }
                LpOutcome::Infeasible => self.solve_phase1(&model, id),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsd_core::{Node, NodeData, ParamValue, TemplateRef};

    fn production_params() -> NodeData {
        let mut data = NodeData::default();
        for (name, value) in [
            ("prod", 2.0),
            ("cost", 1.0),
            ("high_cost", 3.0),
            ("store_cost", 0.5),
            ("demand", 1.0),
        ] {
            data.params.insert(name.to_string(), ParamValue::Scalar(value));
        }
        data
    }

    fn two_stage_tree() -> Tree {
        let mut child_hi = NodeData::default();
        child_hi
            .params
            .insert("demand".to_string(), ParamValue::Scalar(3.0));
        Tree::new(
            vec![
                Node::new(1, 1, None, 1.0, TemplateRef::new("production", "stage1")),
                Node::new(2, 2, Some(1), 0.5, TemplateRef::new("production", "stage2")),
                Node::new(3, 2, Some(1), 0.5, TemplateRef::new("production", "stage2"))
                    .with_data(child_hi),
            ],
            production_params(),
        )
        .unwrap()
    }

    #[test]
    fn prepare_attaches_constraint_info_everywhere() {
        let mut tree = two_stage_tree();
        let solver = LpNodeSolver::with_builtin_templates();
        solver.prepare(&mut tree).unwrap();
        for id in [1, 2, 3] {
            let info = tree.get_node(id).unwrap().constraint_info.as_ref().unwrap();
            assert!(!info.rhs.is_empty());
        }
    }

    #[test]
    fn prepare_rejects_bad_templates_before_any_solve() {
        let mut tree = Tree::new(
            vec![Node::new(1, 1, None, 1.0, TemplateRef::new("production", "nope"))],
            production_params(),
        )
        .unwrap();
        let solver = LpNodeSolver::with_builtin_templates();
        let err = solver.prepare(&mut tree).unwrap_err();
        assert!(matches!(err, SolveError::Template(_)));
    }

    #[test]
    fn root_solve_reports_no_duals() {
        let mut tree = two_stage_tree();
        let solver = LpNodeSolver::with_builtin_templates();
        solver.prepare(&mut tree).unwrap();
        let record = solver.solve_node(&tree, 1, SolveMode::Continuous).unwrap();
        assert_eq!(record.status, SolutionStatus::Optimal);
        assert!(record.duals.is_none());
        // Without cuts the root ignores the future: make 1, store nothing.
        assert!((record.objective_value() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn child_solve_pins_parent_storage_and_reports_duals() {
        let mut tree = two_stage_tree();
        let solver = LpNodeSolver::with_builtin_templates();
        solver.prepare(&mut tree).unwrap();
        let root = solver.solve_node(&tree, 1, SolveMode::Continuous).unwrap();
        tree.record_solution(1, root).unwrap();

        let child = solver.solve_node(&tree, 3, SolveMode::Continuous).unwrap();
        assert_eq!(child.status, SolutionStatus::Optimal);
        // y[1] was fixed to the root's (zero) storage.
        assert!((child.variable("y", 1).unwrap()).abs() < 1e-6);
        // Demand 3 with no carry-in: x = 2 at capacity, w = 1 at premium.
        assert!((child.objective_value() - 5.0).abs() < 1e-5);
        assert!(child.duals.is_some());
    }

    #[test]
    fn epigraph_enters_with_the_first_optimality_cut() {
        let mut tree = two_stage_tree();
        let solver = LpNodeSolver::with_builtin_templates();
        solver.prepare(&mut tree).unwrap();

        let mut coefficients = ValueMap::new();
        coefficients.entry("y".to_string()).or_default().insert(1, 2.0);
        tree.append_cut(1, CutBucket::Optimality, nsd_core::Cut::new(coefficients, 3.0))
            .unwrap();

        let record = solver.solve_node(&tree, 1, SolveMode::Continuous).unwrap();
        let theta = record.variable(EPIGRAPH_VAR, 0).unwrap();
        let y = record.variable("y", 1).unwrap();
        // The cut 2y + theta >= 3 must hold.
        assert!(2.0 * y + theta >= 3.0 - 1e-6);
        // Objective now includes the epigraph term.
        let stage_cost = record.objective_value() - theta;
        assert!(stage_cost >= -1e-6);
    }

    #[test]
    fn infeasible_child_comes_back_with_phase1_duals() {
        // Cover demand 15 with only resource 1 (capacity 5) selected.
        let mut data = NodeData::default();
        data.sets.insert("resources".to_string(), vec![1, 2]);
        data.params.insert(
            "price".to_string(),
            ParamValue::Indexed(BTreeMap::from([(1, 10.0), (2, 50.0)])),
        );
        data.params.insert(
            "capacity".to_string(),
            ParamValue::Indexed(BTreeMap::from([(1, 5.0), (2, 20.0)])),
        );
        data.params.insert(
            "opcost".to_string(),
            ParamValue::Indexed(BTreeMap::from([(1, 1.0), (2, 1.0)])),
        );
        data.params
            .insert("demand".to_string(), ParamValue::Scalar(15.0));
        let mut tree = Tree::new(
            vec![
                Node::new(1, 1, None, 1.0, TemplateRef::new("resources", "stage1")),
                Node::new(2, 2, Some(1), 1.0, TemplateRef::new("resources", "stage2")),
            ],
            data,
        )
        .unwrap();
        let solver = LpNodeSolver::with_builtin_templates();
        solver.prepare(&mut tree).unwrap();

        let mut variables = ValueMap::new();
        let z = variables.entry("z".to_string()).or_default();
        z.insert(1, 1.0);
        z.insert(2, 0.0);
        tree.record_solution(
            1,
            SolutionRecord {
                status: SolutionStatus::Optimal,
                variables,
                objective: BTreeMap::from([("objective".to_string(), 10.0)]),
                duals: None,
            },
        )
        .unwrap();

        let child = solver.solve_node(&tree, 2, SolveMode::Binary).unwrap();
        assert_eq!(child.status, SolutionStatus::Infeasible);
        // Capacity 5 against demand 15 leaves a violation of 10.
        assert!((child.objective["phase1"] - 10.0).abs() < 1e-5);
        assert!(child.duals.is_some());
        // Phase-1 bookkeeping stays internal.
        assert!(!child.variables.contains_key(VIOLATION_VAR));
    }
}
