//! Execution controller for the nested decomposition loop.
//!
//! Drives [`PassSchedule`] sweeps over the tree, triggers cut generation at
//! interior nodes, tracks bounds and counters, and applies the stopping
//! criteria. For binary problems it runs the two-phase scheme: a continuous
//! relaxation first, whose expected value seeds the binary cuts of the
//! second phase.

use std::time::Duration;

use tracing::{debug, info};
use web_time::Instant;

use nsd_core::{ConstraintInfo, Cut, CutBucket, NodeId, Tree, TreeError, ValueMap};

use crate::cuts::{self, ChildDuals};
use crate::schedule::PassSchedule;
use crate::solver::{NodeSolver, SolveError, SolveMode};

/// Tolerance for treating a freshly computed cut as already present.
const CUT_TOL: f64 = 1e-9;

/// Problem class declared for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProblemClass {
    #[default]
    Continuous,
    Binary,
}

impl std::fmt::Display for ProblemClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProblemClass::Continuous => "continuous",
            ProblemClass::Binary => "binary",
        })
    }
}

impl std::str::FromStr for ProblemClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continuous" => Ok(ProblemClass::Continuous),
            "binary" => Ok(ProblemClass::Binary),
            other => Err(format!("unknown problem type `{other}`")),
        }
    }
}

/// Run limits and tolerances. The defaults are effectively unbounded; a run
/// with sensible data stops by convergence.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub problem_class: ProblemClass,
    pub max_time: Duration,
    pub max_iterations: u64,
    pub max_evaluations: u64,
    pub gap_tolerance: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            problem_class: ProblemClass::Continuous,
            max_time: Duration::from_secs(10_000_000),
            max_iterations: 10_000_000,
            max_evaluations: 10_000_000,
            gap_tolerance: 1e-6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Converged,
    TimeLimit,
    IterationLimit,
    EvaluationLimit,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            StopReason::Converged => "converged",
            StopReason::TimeLimit => "time limit",
            StopReason::IterationLimit => "iteration limit",
            StopReason::EvaluationLimit => "evaluation limit",
        })
    }
}

/// Counters and bounds of one phase (the binary driver reports the second
/// phase's stats).
#[derive(Debug, Clone)]
pub struct RunStats {
    /// Completed-or-started passes; incremented when a pass begins.
    pub iterations: u64,
    /// Node subproblem solves.
    pub evaluations: u64,
    pub elapsed: Duration,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub stop: StopReason,
}

impl RunStats {
    fn new() -> Self {
        Self {
            iterations: 0,
            evaluations: 0,
            elapsed: Duration::ZERO,
            lower_bound: f64::NEG_INFINITY,
            upper_bound: f64::INFINITY,
            stop: StopReason::Converged,
        }
    }

    pub fn gap(&self) -> f64 {
        self.upper_bound - self.lower_bound
    }
}

/// Drives a [`NodeSolver`] over a tree until convergence or a limit.
pub struct Controller<S> {
    solver: S,
    config: RunConfig,
}

impl<S: NodeSolver> Controller<S> {
    pub fn new(solver: S, config: RunConfig) -> Self {
        Self { solver, config }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Runs the full decomposition on `tree`.
    pub fn run(&self, tree: &mut Tree) -> Result<RunStats, SolveError> {
        self.solver.prepare(tree)?;
        match self.config.problem_class {
            ProblemClass::Continuous => self.run_phase(tree, SolveMode::Continuous, None),
            ProblemClass::Binary => {
                info!("phase 1: continuous relaxation");
                let relaxed = self.run_phase(tree, SolveMode::Continuous, None)?;
                let lower = tree.expected_value().ok_or_else(|| SolveError::Backend {
                    id: tree.root_id(),
                    message: "continuous relaxation finished without a root solution".to_string(),
                })?;
                info!(
                    lower_bound = lower,
                    relaxation_iterations = relaxed.iterations,
                    "phase 2: binary problem"
                );
                self.run_phase(tree, SolveMode::Binary, Some(lower))
            }
        }
    }

    fn run_phase(
        &self,
        tree: &mut Tree,
        mode: SolveMode,
        lower: Option<f64>,
    ) -> Result<RunStats, SolveError> {
        let start = Instant::now();
        let mut stats = RunStats::new();

        loop {
            stats.iterations += 1;
            debug!(iteration = stats.iterations, "pass start");
            let mut schedule = PassSchedule::new(tree);
            let mut cuts_added = 0usize;

            while let Some((sense, frontier)) = schedule.next_frontier(tree)? {
                for id in frontier {
                    // Cuts are sound only when every child was solved at
                    // this node's current trial point; stale solutions from
                    // an earlier pass are skipped over.
                    if !tree.is_leaf(id)?
                        && tree.children_solved(id)?
                        && tree.solutions_match(id)?
                    {
                        cuts_added += self.generate_cuts(tree, id, mode, lower)?;
                    }

                    let record = self.solver.solve_node(tree, id, mode)?;
                    debug!(
                        node = id,
                        sense = ?sense,
                        status = ?record.status,
                        objective = record.objective_value(),
                        "node solved"
                    );
                    tree.record_solution(id, record)?;
                    stats.evaluations += 1;

                    if let Some(reason) = self.limit_reached(&stats, start) {
                        return Ok(self.finalize(tree, stats, start, reason));
                    }
                }
            }

            if let Some(bound) = tree.expected_value() {
                stats.lower_bound = bound;
            }
            if let Some(cost) = tree.expected_cost() {
                if cost < stats.upper_bound {
                    stats.upper_bound = cost;
                }
            }
            info!(
                iteration = stats.iterations,
                cuts = cuts_added,
                lower_bound = stats.lower_bound,
                upper_bound = stats.upper_bound,
                "pass complete"
            );

            let gap_closed = stats.gap().abs()
                <= self.config.gap_tolerance * stats.upper_bound.abs().max(1.0);
            if cuts_added == 0 || gap_closed {
                return Ok(self.finalize(tree, stats, start, StopReason::Converged));
            }
        }
    }

    fn limit_reached(&self, stats: &RunStats, start: Instant) -> Option<StopReason> {
        if start.elapsed() >= self.config.max_time {
            Some(StopReason::TimeLimit)
        } else if stats.iterations >= self.config.max_iterations {
            Some(StopReason::IterationLimit)
        } else if stats.evaluations >= self.config.max_evaluations {
            Some(StopReason::EvaluationLimit)
        } else {
            None
        }
    }

    fn finalize(
        &self,
        tree: &Tree,
        mut stats: RunStats,
        start: Instant,
        reason: StopReason,
    ) -> RunStats {
        if let Some(bound) = tree.expected_value() {
            stats.lower_bound = bound;
        }
        if let Some(cost) = tree.expected_cost() {
            if cost < stats.upper_bound {
                stats.upper_bound = cost;
            }
        }
        stats.elapsed = start.elapsed();
        stats.stop = reason;
        info!(
            stop = %reason,
            iterations = stats.iterations,
            evaluations = stats.evaluations,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "run finished"
        );
        stats
    }

    /// Generates the cuts a node's freshly solved children support and
    /// appends the ones the pools do not already hold.
    fn generate_cuts(
        &self,
        tree: &mut Tree,
        id: NodeId,
        mode: SolveMode,
        lower: Option<f64>,
    ) -> Result<usize, SolveError> {
        let shared = tree.shared_variables(id)?;
        if shared.is_empty() {
            debug!(node = id, "no shared variables; skipping cut generation");
            return Ok(0);
        }

        let mut pending: Vec<(CutBucket, Cut)> = Vec::new();
        {
            let children = tree.children_of(id)?;
            let mut infeasible = Vec::new();
            for child in children {
                if tree.is_infeasible(*child)? {
                    infeasible.push(*child);
                }
            }

            if infeasible.is_empty() {
                let mut parts = Vec::with_capacity(children.len());
                for child in children {
                    parts.push(ChildDuals {
                        probability: tree.get_node(*child)?.probability,
                        duals: duals_of(tree, *child)?,
                        info: info_of(tree, *child)?,
                    });
                }
                pending.push((CutBucket::Optimality, cuts::optimality_cut(&shared, &parts)));
            } else {
                for child in &infeasible {
                    pending.push((
                        CutBucket::Feasibility,
                        cuts::feasibility_cut(&shared, duals_of(tree, *child)?, info_of(tree, *child)?),
                    ));
                }
            }

            if mode == SolveMode::Binary {
                let record = tree
                    .get_node(id)?
                    .solution
                    .record()
                    .ok_or(TreeError::NotSolved(id))?;
                if infeasible.is_empty() {
                    let total: f64 = children
                        .iter()
                        .map(|c| tree.get_node(*c).map(|n| n.probability))
                        .sum::<Result<f64, _>>()?;
                    let mut expected = 0.0;
                    for child in children {
                        let node = tree.get_node(*child)?;
                        let child_record =
                            node.solution.record().ok_or(TreeError::NotSolved(*child))?;
                        expected += node.probability / total * child_record.objective_value();
                    }
                    pending.push((
                        CutBucket::BinaryOptimality,
                        cuts::binary_optimality_cut(
                            &shared,
                            &record.variables,
                            expected,
                            lower.unwrap_or(0.0),
                        ),
                    ));
                } else {
                    pending.push((
                        CutBucket::BinaryFeasibility,
                        cuts::no_good_cut(&shared, &record.variables),
                    ));
                }
            }
        }

        let mut added = 0;
        for (bucket, cut) in pending {
            if tree.get_node(id)?.cuts.contains_equivalent(bucket, &cut, CUT_TOL) {
                debug!(node = id, bucket = %bucket, "cut already present; skipped");
                continue;
            }
            let key = tree.append_cut(id, bucket, cut)?;
            debug!(node = id, bucket = %bucket, key, "cut appended");
            added += 1;
        }
        Ok(added)
    }
}

/// Phase-1 or optimal duals of a solved child, for cut assembly.
fn duals_of(tree: &Tree, child: NodeId) -> Result<&ValueMap, SolveError> {
    let record = tree
        .get_node(child)?
        .solution
        .record()
        .ok_or(TreeError::NotSolved(child))?;
    record
        .duals
        .as_ref()
        .ok_or(SolveError::MissingDuals { id: child })
}

fn info_of(tree: &Tree, child: NodeId) -> Result<&ConstraintInfo, SolveError> {
    tree.get_node(child)?
        .constraint_info
        .as_ref()
        .ok_or(SolveError::MissingConstraintInfo { id: child })
}
