//! Contains relational operators such as scans, sequences, CTEs and motions.
//!
//! They are classified into two categories: logical and physical. We separate logical and
//! physical operators in two enums since they need to implement different traits. Physical
//! operators implement the property contract in [`PhysicalOperatorTrait`].
mod logical;
pub use logical::*;
mod physical;
pub use physical::*;
mod table_scan;
pub use table_scan::*;
mod sequence;
pub use sequence::*;
mod cte;
pub use cte::*;
mod set_op;
pub use set_op::*;
mod motion;
pub use motion::*;

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum_macros::AsRefStr;

use crate::error::OptResult;
use crate::optimizer::OptimizerContext;
use crate::properties::LogicalProperty;

#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, AsRefStr)]
pub enum Operator {
    Logical(LogicalOperator),
    Physical(PhysicalOperator),
}

#[enum_dispatch(LogicalOperator)]
pub trait OperatorTrait {
    /// Derives logical property from logical properties of inputs.
    fn derive_logical_prop(
        &self,
        ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> OptResult<LogicalProperty>;
}

impl Operator {
    pub fn is_parallel_incompatible(&self) -> bool {
        match self {
            Operator::Logical(op) => op.is_parallel_incompatible(),
            Operator::Physical(_) => false,
        }
    }
}
