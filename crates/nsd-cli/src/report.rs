use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use nsd_algo::RunStats;
use nsd_core::{NodeId, SolutionRecord, Tree};

#[derive(Debug, Serialize)]
struct NodeReport<'a> {
    stage: i64,
    probability: f64,
    #[serde(flatten)]
    solution: &'a SolutionRecord,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    stop: String,
    iterations: u64,
    evaluations: u64,
    elapsed_seconds: f64,
    lower_bound: f64,
    upper_bound: f64,
    nodes: BTreeMap<NodeId, NodeReport<'a>>,
}

/// Writes the per-node solution report as YAML.
pub fn write_report(path: &Path, tree: &Tree, stats: &RunStats) -> Result<()> {
    let mut nodes = BTreeMap::new();
    for id in tree.node_ids() {
        let node = tree.get_node(id)?;
        if let Some(solution) = node.solution.record() {
            nodes.insert(
                id,
                NodeReport {
                    stage: node.stage,
                    probability: node.probability,
                    solution,
                },
            );
        }
    }
    let report = RunReport {
        stop: stats.stop.to_string(),
        iterations: stats.iterations,
        evaluations: stats.evaluations,
        elapsed_seconds: stats.elapsed.as_secs_f64(),
        lower_bound: stats.lower_bound,
        upper_bound: stats.upper_bound,
        nodes,
    };
    let text = serde_yaml::to_string(&report).context("serializing solution report")?;
    fs::write(path, text).with_context(|| format!("writing report '{}'", path.display()))
}
