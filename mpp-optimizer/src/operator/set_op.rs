use anyhow::anyhow;
use strum_macros::AsRefStr;

use crate::error::OptResult;
use crate::operator::OperatorTrait;
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, AsRefStr)]
pub enum SetOperationKind {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Difference,
    DifferenceAll,
}

/// Set operation over inputs with the same shape, outputs columns of the first input.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SetOperation {
    kind: SetOperationKind,
}

impl SetOperation {
    pub fn new(kind: SetOperationKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> SetOperationKind {
        self.kind
    }
}

impl OperatorTrait for SetOperation {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> OptResult<LogicalProperty> {
        inputs
            .first()
            .map(|prop| (*prop).clone())
            .ok_or_else(|| anyhow!("{} requires at least one input", self.kind.as_ref()))
    }
}
