use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum_macros::AsRefStr;

use crate::operator::{
    CTEConsumer, CTEProducer, DynamicGet, Get, Sequence, SequenceProject, SetOperation,
};

/// Logical relational operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, AsRefStr)]
#[enum_dispatch]
pub enum LogicalOperator {
    LogicalGet(Get),
    LogicalDynamicGet(DynamicGet),
    LogicalSequence(Sequence),
    LogicalSequenceProject(SequenceProject),
    LogicalCTEProducer(CTEProducer),
    LogicalCTEConsumer(CTEConsumer),
    LogicalSetOp(SetOperation),
}

impl LogicalOperator {
    /// Operators whose presence anywhere in a query rules out parallel table scans.
    pub fn is_parallel_incompatible(&self) -> bool {
        matches!(
            self,
            LogicalOperator::LogicalSequence(_)
                | LogicalOperator::LogicalSequenceProject(_)
                | LogicalOperator::LogicalCTEProducer(_)
                | LogicalOperator::LogicalCTEConsumer(_)
                | LogicalOperator::LogicalSetOp(_)
        )
    }
}
