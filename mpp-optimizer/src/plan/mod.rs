use std::collections::HashSet;
use std::sync::Arc;

use crate::operator::Operator;

mod logical;
pub use logical::*;

pub type PlanNodeId = u32;

pub type PlanNodeRef = Arc<PlanNode>;

/// One node in a plan.
#[derive(Debug)]
pub struct PlanNode {
    id: PlanNodeId,
    operator: Operator,
    inputs: Vec<PlanNodeRef>,
}

/// The `eq` should ignore `id`.
impl PartialEq for PlanNode {
    fn eq(&self, other: &Self) -> bool {
        self.operator == other.operator && self.inputs == other.inputs
    }
}

/// A query plan.
///
/// A query plan is a single root dag(directed acyclic graph), e.g. the logical tree handed to
/// the optimizer. A CTE producer referenced from several places is a shared node.
#[derive(PartialEq, Debug)]
pub struct Plan {
    root: PlanNodeRef,
}

impl Plan {
    pub fn new(root: PlanNodeRef) -> Self {
        Self { root }
    }

    pub fn root(&self) -> PlanNodeRef {
        self.root.clone()
    }

    /// Every node of the plan once, inputs before the nodes reading them.
    ///
    /// Shared nodes are reported at their first visit, so they always precede each of their
    /// parents.
    pub fn nodes_bottom_up(&self) -> Vec<PlanNodeRef> {
        let mut visited = HashSet::new();
        let mut nodes = vec![];
        // Nodes whose inputs have all been pushed are marked `true`.
        let mut stack = vec![(self.root.clone(), false)];
        while let Some((node, inputs_done)) = stack.pop() {
            if inputs_done {
                nodes.push(node);
                continue;
            }
            if !visited.insert(node.id) {
                continue;
            }
            stack.push((node.clone(), true));
            for input in node.inputs.iter().rev() {
                if !visited.contains(&input.id) {
                    stack.push((input.clone(), false));
                }
            }
        }
        nodes
    }
}

impl PlanNode {
    pub fn new(id: PlanNodeId, operator: Operator, inputs: Vec<PlanNodeRef>) -> Self {
        Self {
            id,
            operator,
            inputs,
        }
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }

    pub fn id(&self) -> PlanNodeId {
        self.id
    }

    pub fn inputs(&self) -> &[PlanNodeRef] {
        &self.inputs
    }
}
