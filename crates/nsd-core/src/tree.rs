use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::cut::{Cut, CutBucket};
use crate::error::TreeError;
use crate::node::{ConstraintInfo, Node, NodeData, SolutionRecord, SolutionStatus};
use crate::{NodeId, SharedVars, EPIGRAPH_VAR};

/// Tolerance for comparing shared-variable values across a node boundary.
const MATCH_TOL: f64 = 1e-9;

/// A validated scenario tree.
///
/// Construction checks the structural invariants once (exactly one root,
/// unique ids, known parents, non-decreasing stages, every node reachable
/// from the root) and builds the id/children/stage indices, so every query
/// afterwards is a map lookup rather than a tree walk.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    index: HashMap<NodeId, usize>,
    children: HashMap<NodeId, Vec<NodeId>>,
    stages: BTreeMap<i64, Vec<NodeId>>,
    root: NodeId,
    general: NodeData,
}

impl Tree {
    /// Builds a tree from node records plus tree-wide general data.
    pub fn new(nodes: Vec<Node>, general: NodeData) -> Result<Self, TreeError> {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut root = None;
        for (pos, node) in nodes.iter().enumerate() {
            if index.insert(node.id, pos).is_some() {
                return Err(TreeError::DuplicateNode(node.id));
            }
            if node.parent_id.is_none() {
                match root {
                    None => root = Some(node.id),
                    Some(existing) => return Err(TreeError::MultipleRoots(existing, node.id)),
                }
            }
        }
        let root = root.ok_or(TreeError::NoRoot)?;

        let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::with_capacity(nodes.len());
        let mut stages: BTreeMap<i64, Vec<NodeId>> = BTreeMap::new();
        for node in &nodes {
            children.entry(node.id).or_default();
            stages.entry(node.stage).or_default().push(node.id);
            if let Some(parent) = node.parent_id {
                let parent_pos = *index.get(&parent).ok_or(TreeError::UnknownParent {
                    id: node.id,
                    parent,
                })?;
                let parent_stage = nodes[parent_pos].stage;
                if node.stage < parent_stage {
                    return Err(TreeError::StageOrder {
                        id: node.id,
                        stage: node.stage,
                        parent,
                        parent_stage,
                    });
                }
                children.entry(parent).or_default().push(node.id);
            }
        }

        // A node whose parent chain never reaches the root (a cycle among
        // non-root nodes) passes the checks above; catch it by walking down.
        let mut reached = HashSet::with_capacity(nodes.len());
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            if reached.insert(id) {
                queue.extend(children[&id].iter().copied());
            }
        }
        for node in &nodes {
            if !reached.contains(&node.id) {
                return Err(TreeError::Unreachable(node.id));
            }
        }

        Ok(Self {
            nodes,
            index,
            children,
            stages,
            root,
            general,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node ids in document order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id)
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn get_node(&self, id: NodeId) -> Result<&Node, TreeError> {
        self.index
            .get(&id)
            .map(|pos| &self.nodes[*pos])
            .ok_or(TreeError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TreeError> {
        match self.index.get(&id) {
            Some(pos) => Ok(&mut self.nodes[*pos]),
            None => Err(TreeError::NodeNotFound(id)),
        }
    }

    pub fn is_root(&self, id: NodeId) -> Result<bool, TreeError> {
        Ok(self.get_node(id)?.id == self.root)
    }

    pub fn parent_of(&self, id: NodeId) -> Result<Option<NodeId>, TreeError> {
        Ok(self.get_node(id)?.parent_id)
    }

    pub fn children_of(&self, id: NodeId) -> Result<&[NodeId], TreeError> {
        self.children
            .get(&id)
            .map(|c| c.as_slice())
            .ok_or(TreeError::NodeNotFound(id))
    }

    pub fn is_leaf(&self, id: NodeId) -> Result<bool, TreeError> {
        Ok(self.children_of(id)?.is_empty())
    }

    pub fn leaf_ids(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| self.children[&n.id].is_empty())
            .map(|n| n.id)
            .collect()
    }

    /// Stage labels present in the tree, ascending.
    pub fn stages(&self) -> Vec<i64> {
        self.stages.keys().copied().collect()
    }

    /// Node ids at one stage (empty when the stage is absent).
    pub fn stage_ids(&self, stage: i64) -> &[NodeId] {
        self.stages.get(&stage).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn general_data(&self) -> &NodeData {
        &self.general
    }

    /// General data overlaid with the node's local entries.
    pub fn node_data(&self, id: NodeId) -> Result<NodeData, TreeError> {
        Ok(self.general.overlaid(&self.get_node(id)?.data))
    }

    /// Product of conditional probabilities along the path from the root.
    pub fn path_probability(&self, id: NodeId) -> Result<f64, TreeError> {
        let mut prob = 1.0;
        let mut cursor = self.get_node(id)?;
        loop {
            prob *= cursor.probability;
            match cursor.parent_id {
                Some(parent) => cursor = self.get_node(parent)?,
                None => return Ok(prob),
            }
        }
    }

    /// Variable/index pairs present in the node's solution and in the
    /// solution of every child. The epigraph variable is never shared.
    pub fn shared_variables(&self, id: NodeId) -> Result<SharedVars, TreeError> {
        let node = self.get_node(id)?;
        let record = node.solution.record().ok_or(TreeError::NotSolved(id))?;
        let mut child_records = Vec::new();
        for child in self.children_of(id)? {
            let child_node = self.get_node(*child)?;
            child_records.push(
                child_node
                    .solution
                    .record()
                    .ok_or(TreeError::NotSolved(*child))?,
            );
        }

        let mut shared = SharedVars::new();
        for (name, indices) in &record.variables {
            if name == EPIGRAPH_VAR {
                continue;
            }
            for index in indices.keys() {
                let everywhere = child_records
                    .iter()
                    .all(|r| r.variable(name, *index).is_some());
                if everywhere {
                    shared.entry(name.clone()).or_default().push(*index);
                }
            }
        }
        shared.retain(|_, indices| !indices.is_empty());
        Ok(shared)
    }

    /// True when every child holds a recorded solution whose values agree
    /// with the node's current solution on every common variable/index pair
    /// (epigraph excluded). False as soon as the node or any child is
    /// unsolved. Leaves are vacuously true.
    pub fn solutions_match(&self, id: NodeId) -> Result<bool, TreeError> {
        let node = self.get_node(id)?;
        let record = match node.solution.record() {
            Some(r) => r,
            None => return Ok(false),
        };
        for child in self.children_of(id)? {
            let child_record = match self.get_node(*child)?.solution.record() {
                Some(r) => r,
                None => return Ok(false),
            };
            for (name, indices) in &record.variables {
                if name == EPIGRAPH_VAR {
                    continue;
                }
                for (index, value) in indices {
                    if let Some(child_value) = child_record.variable(name, *index) {
                        if (child_value - value).abs() > MATCH_TOL {
                            return Ok(false);
                        }
                    }
                }
            }
        }
        Ok(true)
    }

    pub fn children_solved(&self, id: NodeId) -> Result<bool, TreeError> {
        for child in self.children_of(id)? {
            if !self.get_node(*child)?.is_solved() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_infeasible(&self, id: NodeId) -> Result<bool, TreeError> {
        let node = self.get_node(id)?;
        let record = node.solution.record().ok_or(TreeError::NotSolved(id))?;
        Ok(record.status == SolutionStatus::Infeasible)
    }

    /// Appends a cut to one of the node's buckets and returns its key.
    pub fn append_cut(&mut self, id: NodeId, bucket: CutBucket, cut: Cut) -> Result<u64, TreeError> {
        Ok(self.node_mut(id)?.cuts.append(bucket, cut))
    }

    /// Replaces the node's recorded solution.
    pub fn record_solution(&mut self, id: NodeId, record: SolutionRecord) -> Result<(), TreeError> {
        self.node_mut(id)?.solution = crate::node::NodeSolution::Solved(record);
        Ok(())
    }

    pub fn set_constraint_info(
        &mut self,
        id: NodeId,
        info: ConstraintInfo,
    ) -> Result<(), TreeError> {
        self.node_mut(id)?.constraint_info = Some(info);
        Ok(())
    }

    /// Root objective (epigraph included): the run's lower bound.
    pub fn expected_value(&self) -> Option<f64> {
        let root = self.get_node(self.root).ok()?;
        let record = root.solution.record()?;
        record.is_optimal().then(|| record.objective_value())
    }

    /// Probability-weighted sum of per-node stage costs (objective minus the
    /// epigraph term). `None` until every node holds an optimal solution.
    pub fn expected_cost(&self) -> Option<f64> {
        let mut total = 0.0;
        for node in &self.nodes {
            let record = node.solution.record()?;
            if !record.is_optimal() {
                return None;
            }
            let epigraph = record.variable(EPIGRAPH_VAR, 0).unwrap_or(0.0);
            let prob = self.path_probability(node.id).ok()?;
            total += prob * (record.objective_value() - epigraph);
        }
        Some(total)
    }
}
