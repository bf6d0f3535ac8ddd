use thiserror::Error;

use crate::NodeId;

/// Structural and lookup errors for the scenario tree.
#[derive(Debug, Error, PartialEq)]
pub enum TreeError {
    #[error("tree has no root node")]
    NoRoot,

    #[error("tree has more than one root node ({0} and {1})")]
    MultipleRoots(NodeId, NodeId),

    #[error("node id {0} appears more than once")]
    DuplicateNode(NodeId),

    #[error("node {id} references unknown parent {parent}")]
    UnknownParent { id: NodeId, parent: NodeId },

    #[error("node {id} (stage {stage}) precedes its parent {parent} (stage {parent_stage})")]
    StageOrder {
        id: NodeId,
        stage: i64,
        parent: NodeId,
        parent_stage: i64,
    },

    #[error("node {0} is not reachable from the root")]
    Unreachable(NodeId),

    #[error("no node {0} in the tree")]
    NodeNotFound(NodeId),

    #[error("node {0} has no recorded solution")]
    NotSolved(NodeId),
}
