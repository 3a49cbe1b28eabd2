use std::sync::Arc;

use datafusion_common::Column;

use crate::operator::LogicalOperator::{
    LogicalCTEConsumer, LogicalCTEProducer, LogicalDynamicGet, LogicalGet, LogicalSequence,
    LogicalSequenceProject, LogicalSetOp,
};
use crate::operator::Operator::Logical;
use crate::operator::{
    CTEConsumer, CTEProducer, DynamicGet, Get, LogicalOperator, Sequence, SequenceProject,
    SetOperation, SetOperationKind,
};
use crate::plan::{Plan, PlanNode, PlanNodeId, PlanNodeRef};
use crate::properties::{CteId, ScanId};

/// Builds logical plans bottom up.
///
/// Every method except [`LogicalPlanBuilder::build`] puts a new node on top of the current
/// root; leaf methods replace it.
pub struct LogicalPlanBuilder {
    root: Option<PlanNodeRef>,
    next_plan_node_id: PlanNodeId,
}

impl Default for LogicalPlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogicalPlanBuilder {
    pub fn new() -> Self {
        Self {
            root: None,
            next_plan_node_id: 0,
        }
    }

    fn reset_root(&mut self, operator: LogicalOperator, inputs: Vec<PlanNodeRef>) -> &mut Self {
        let plan_node = Arc::new(PlanNode::new(
            self.next_plan_node_id,
            Logical(operator),
            inputs,
        ));
        self.root = Some(plan_node);
        self.next_plan_node_id += 1;
        self
    }

    /// # Panics
    ///
    /// When there is no current root to put the new node on.
    fn current_root(&mut self) -> PlanNodeRef {
        match self.root.take() {
            Some(root) => root,
            None => panic!("Plan builder has no root"),
        }
    }

    pub fn scan<S: Into<String>>(&mut self, table_name: S) -> &mut Self {
        self.reset_root(LogicalGet(Get::new(table_name)), vec![])
    }

    pub fn scan_with_alias<S: Into<String>, A: Into<String>>(
        &mut self,
        table_name: S,
        alias: A,
    ) -> &mut Self {
        self.reset_root(LogicalGet(Get::with_alias(table_name, alias)), vec![])
    }

    pub fn dynamic_scan<S: Into<String>>(
        &mut self,
        table_name: S,
        scan_id: ScanId,
        has_foreign_partitions: bool,
    ) -> &mut Self {
        let dynamic_get = DynamicGet::new(Get::new(table_name), scan_id)
            .with_foreign_partitions(has_foreign_partitions);
        self.reset_root(LogicalDynamicGet(dynamic_get), vec![])
    }

    pub fn cte_consumer(&mut self, id: CteId, columns: Vec<Column>) -> &mut Self {
        self.reset_root(LogicalCTEConsumer(CTEConsumer::new(id, columns)), vec![])
    }

    pub fn cte_producer(&mut self, id: CteId, columns: Vec<Column>) -> &mut Self {
        let input = self.current_root();
        self.reset_root(LogicalCTEProducer(CTEProducer::new(id, columns)), vec![input])
    }

    /// Sequence over `earlier` followed by the current root, which produces the output.
    pub fn sequence(&mut self, earlier: Vec<PlanNodeRef>) -> &mut Self {
        let mut inputs = earlier;
        inputs.push(self.current_root());
        self.reset_root(LogicalSequence(Sequence::new()), inputs)
    }

    pub fn sequence_project<I: IntoIterator<Item = Column>>(
        &mut self,
        partition_by: I,
    ) -> &mut Self {
        let input = self.current_root();
        self.reset_root(
            LogicalSequenceProject(SequenceProject::new(partition_by)),
            vec![input],
        )
    }

    /// Set operation with the current root as first input.
    pub fn set_op(&mut self, kind: SetOperationKind, others: Vec<PlanNodeRef>) -> &mut Self {
        let mut inputs = vec![self.current_root()];
        inputs.extend(others);
        self.reset_root(LogicalSetOp(SetOperation::new(kind)), inputs)
    }

    /// Consume current plan, but not rest state, e.g. plan node id.
    ///
    /// This is useful for building multi child plan, e.g. sequence.
    pub fn build(&mut self) -> Plan {
        Plan::new(self.current_root())
    }
}
