//! Forward/backward frontier walk over the scenario tree.
//!
//! One pass starts at the root, sweeps down by child expansion, flips at the
//! deepest frontier and sweeps back up by (deduplicated) parent expansion.
//! Every node is therefore visited exactly twice per pass, and the pass ends
//! at the root.

use nsd_core::{NodeId, Tree, TreeError};

/// Direction of the current sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Forward,
    Backward,
}

/// Iterator-like frontier schedule for one full pass.
pub struct PassSchedule {
    sense: Sense,
    frontier: Vec<NodeId>,
    done: bool,
}

impl PassSchedule {
    pub fn new(tree: &Tree) -> Self {
        Self {
            sense: Sense::Forward,
            frontier: vec![tree.root_id()],
            done: false,
        }
    }

    /// Returns the next frontier to visit, or `None` once the backward
    /// sweep has left the root.
    pub fn next_frontier(&mut self, tree: &Tree) -> Result<Option<(Sense, Vec<NodeId>)>, TreeError> {
        if self.done {
            return Ok(None);
        }
        let current = (self.sense, self.frontier.clone());

        match self.sense {
            Sense::Forward => {
                let mut next = Vec::new();
                for id in &self.frontier {
                    next.extend(tree.children_of(*id)?.iter().copied());
                }
                if next.is_empty() {
                    // Deepest frontier reached: revisit it on the way up.
                    self.sense = Sense::Backward;
                } else {
                    self.frontier = next;
                }
            }
            Sense::Backward => {
                let mut next: Vec<NodeId> = Vec::new();
                for id in &self.frontier {
                    if let Some(parent) = tree.parent_of(*id)? {
                        if !next.contains(&parent) {
                            next.push(parent);
                        }
                    }
                }
                if next.is_empty() {
                    self.done = true;
                } else {
                    self.frontier = next;
                }
            }
        }
        Ok(Some(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsd_core::{Node, NodeData, TemplateRef};
    use std::collections::HashMap;

    fn node(id: NodeId, stage: i64, parent: Option<NodeId>) -> Node {
        Node::new(id, stage, parent, 1.0, TemplateRef::new("production", "stage1"))
    }

    fn collect(tree: &Tree) -> Vec<(Sense, Vec<NodeId>)> {
        let mut schedule = PassSchedule::new(tree);
        let mut out = Vec::new();
        while let Some(frontier) = schedule.next_frontier(tree).unwrap() {
            out.push(frontier);
        }
        out
    }

    #[test]
    fn balanced_three_stage_pass_visits_every_node_twice() {
        let tree = Tree::new(
            vec![
                node(1, 1, None),
                node(2, 2, Some(1)),
                node(3, 2, Some(1)),
                node(4, 3, Some(2)),
                node(5, 3, Some(2)),
                node(6, 3, Some(3)),
                node(7, 3, Some(3)),
            ],
            NodeData::default(),
        )
        .unwrap();

        let frontiers = collect(&tree);
        assert_eq!(
            frontiers,
            vec![
                (Sense::Forward, vec![1]),
                (Sense::Forward, vec![2, 3]),
                (Sense::Forward, vec![4, 5, 6, 7]),
                (Sense::Backward, vec![4, 5, 6, 7]),
                (Sense::Backward, vec![2, 3]),
                (Sense::Backward, vec![1]),
            ]
        );

        let mut visits: HashMap<NodeId, usize> = HashMap::new();
        for (_, nodes) in &frontiers {
            for id in nodes {
                *visits.entry(*id).or_default() += 1;
            }
        }
        assert!(visits.values().all(|count| *count == 2));
        // The pass ends at the root.
        assert_eq!(frontiers.last().unwrap().1, vec![1]);
    }

    #[test]
    fn backward_sweep_deduplicates_parents() {
        let tree = Tree::new(
            vec![
                node(1, 1, None),
                node(2, 2, Some(1)),
                node(3, 2, Some(1)),
                node(4, 2, Some(1)),
            ],
            NodeData::default(),
        )
        .unwrap();
        let frontiers = collect(&tree);
        assert_eq!(
            frontiers,
            vec![
                (Sense::Forward, vec![1]),
                (Sense::Forward, vec![2, 3, 4]),
                (Sense::Backward, vec![2, 3, 4]),
                (Sense::Backward, vec![1]),
            ]
        );
    }

    #[test]
    fn single_node_tree_is_visited_twice() {
        let tree = Tree::new(vec![node(1, 1, None)], NodeData::default()).unwrap();
        assert_eq!(
            collect(&tree),
            vec![(Sense::Forward, vec![1]), (Sense::Backward, vec![1])]
        );
    }

    #[test]
    fn unbalanced_tree_revisits_the_deepest_frontier() {
        // Node 3 is a stage-2 leaf; node 4 hangs off node 2.
        let tree = Tree::new(
            vec![
                node(1, 1, None),
                node(2, 2, Some(1)),
                node(3, 2, Some(1)),
                node(4, 3, Some(2)),
            ],
            NodeData::default(),
        )
        .unwrap();
        let frontiers = collect(&tree);
        assert_eq!(frontiers[0], (Sense::Forward, vec![1]));
        assert_eq!(frontiers[1], (Sense::Forward, vec![2, 3]));
        assert_eq!(frontiers[2], (Sense::Forward, vec![4]));
        assert_eq!(frontiers[3], (Sense::Backward, vec![4]));
        assert_eq!(frontiers[4], (Sense::Backward, vec![2]));
        assert_eq!(frontiers[5], (Sense::Backward, vec![1]));
    }
}
