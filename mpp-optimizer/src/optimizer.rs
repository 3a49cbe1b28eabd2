use std::fmt::Debug;
use std::sync::Arc;

use crate::catalog::{Catalog, MemoryCatalog};
use crate::config::{OptimizerConfig, QueryContext};
use crate::operator::Operator;
use crate::properties::{LogicalProperty, RequiredProperties};

/// Context for optimization. Includes access to catalog, session variables and facts about the
/// query being optimized.
///
/// It's immutable during optimization and passed explicitly to every rule and enforcer.
#[derive(Clone, Debug)]
pub struct OptimizerContext {
    pub catalog: Arc<dyn Catalog>,
    pub config: OptimizerConfig,
    pub query: QueryContext,
}

impl Default for OptimizerContext {
    fn default() -> Self {
        Self {
            catalog: Arc::new(MemoryCatalog::default()),
            config: OptimizerConfig::default(),
            query: QueryContext::default(),
        }
    }
}

impl OptimizerContext {
    pub fn new(catalog: Arc<dyn Catalog>, config: OptimizerConfig, query: QueryContext) -> Self {
        Self {
            catalog,
            config,
            query,
        }
    }
}

/// Required properties of a plan region, together with the contexts its children were
/// optimized under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptimizationContext {
    pub required: RequiredProperties,
    pub child_contexts: Vec<Arc<OptimizationContext>>,
}

impl OptimizationContext {
    pub fn new(required: RequiredProperties) -> Self {
        Self {
            required,
            child_contexts: vec![],
        }
    }
}

/// Search space interface.
///
/// The concepts of `group` and `group expression` are borrowed from cascades optimizer. Each
/// `group` consists of several `group expressions`, and all group expressions represents
/// logically same plan, e.g. return same result set.
pub trait Optimizer {
    type GroupHandle: OptGroupHandle<O = Self>;
    type ExprHandle: OptExprHandle<O = Self>;
    type Group: OptGroup;
    type Expr: OptExpr<O = Self, InputHandle = Self::GroupHandle>;

    /// These methods are accessed by rules.
    fn context(&self) -> &OptimizerContext;
    fn group_at(&self, group_handle: Self::GroupHandle) -> &Self::Group;
    fn expr_at(&self, expr_handle: Self::ExprHandle) -> &Self::Expr;

    /// All groups in search space.
    fn group_handles(&self) -> Vec<Self::GroupHandle>;
}

pub trait OptExpr {
    type O: Optimizer;
    type InputHandle: OptGroupHandle;

    fn operator(&self) -> &Operator;
    fn inputs_len(&self, opt: &Self::O) -> usize;
    fn input_at(&self, idx: usize, opt: &Self::O) -> Self::InputHandle;
}

pub trait OptGroup {
    fn logical_prop(&self) -> &LogicalProperty;

    /// Group contains an expression that can't run under a parallel plan.
    fn is_parallel_incompatible(&self) -> bool;
}

pub trait OptExprHandle: Clone + Debug + PartialEq + Eq {
    type O: Optimizer<ExprHandle = Self>;
}

pub trait OptGroupHandle: Clone + Debug + PartialEq + Eq {
    type O: Optimizer<GroupHandle = Self>;
}
