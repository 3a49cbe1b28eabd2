//! Optimization rules.
//!
//! All rules in this crate are implementation rules: each one turns a logical operator into its
//! parallel physical counterpart, e.g. [`Get2ParallelTableScanRule`] turns a table scan into a
//! [`ParallelTableScan`](crate::operator::ParallelTableScan).
//!
//! ## Promise
//!
//! Before a rule is applied to an expression the search engine asks for its [`RulePromise`].
//! A rule that can't produce a valid alternative in the current context answers
//! [`RulePromise::None`], and the search engine never calls [`Rule::apply`] for it. This keeps
//! eligibility checks (configuration, catalog facts, the shape of the whole query) out of
//! `apply`, which only builds alternatives.
//!
//! ## Pattern
//!
//! A pattern defines what expression the rule should operate on. The search engine binds the
//! pattern against its expressions and hands the rule an [`OptExpression`] rather than a plan:
//!```no
//! [GroupExprId(0, 0) Sequence]                         [Operator ParallelSequence]
//!          |          |            ImplementParallel            |          |
//!          |          |              SequenceRule               |          |
//!     [GroupId(1)] [GroupId(2)]        -------->           [GroupId(1)] [GroupId(2)]
//! ```
mod opt_expr;
pub use opt_expr::*;
mod pattern;
pub use pattern::*;
mod parallel_scan;
pub use parallel_scan::*;
mod parallel_implementation;
pub use parallel_implementation::*;

use std::fmt::{Debug, Formatter};

use enum_dispatch::enum_dispatch;
use enumset::EnumSetType;
use strum_macros::AsRefStr;

use crate::error::OptResult;
use crate::optimizer::Optimizer;

pub type OptExprVec<O> = Vec<OptExpression<O>>;

pub struct RuleResult<O: Optimizer> {
    exprs: OptExprVec<O>,
}

impl<O: Optimizer> Default for RuleResult<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Optimizer> RuleResult<O> {
    pub fn new() -> Self {
        Self { exprs: vec![] }
    }

    pub fn add(&mut self, new_expr: OptExpression<O>) {
        self.exprs.push(new_expr);
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    pub fn results(self) -> impl Iterator<Item = OptExpression<O>> {
        self.exprs.into_iter()
    }
}

/// A rule should only focus on providing equivalent transformations of optimizer expressions.
#[enum_dispatch(RuleImpl)]
pub trait Rule {
    /// Apply a rule to match sub plan.
    ///
    /// Only called when [`Rule::promise`] is not [`RulePromise::None`] for the bound expression.
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()>;

    /// Pattern for rule.
    fn pattern(&self) -> &Pattern;

    /// Use to identify each rule.
    ///
    /// This is used to avoid applying same rule repeatedly to same group expression.
    fn rule_id(&self) -> RuleId;

    /// How worthwhile applying this rule to the expression is.
    fn promise<O: Optimizer>(&self, expr_handle: O::ExprHandle, optimizer: &O) -> RulePromise;
}

#[enum_dispatch]
#[derive(Clone, AsRefStr)]
pub enum RuleImpl {
    Get2ParallelTableScanRule,
    DynamicGet2ParallelAppendTableScanRule,
    ImplementParallelSequenceRule,
    ImplementParallelCTEConsumerRule,
    ImplementParallelCTEProducerRule,
}

impl Debug for RuleImpl {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_ref())
    }
}

#[derive(EnumSetType, Debug)]
pub enum RuleId {
    Get2ParallelTableScan,
    DynamicGet2ParallelAppendTableScan,
    ImplementParallelSequence,
    ImplementParallelCTEConsumer,
    ImplementParallelCTEProducer,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RulePromise {
    /// The rule must not be applied.
    None = 0,
    Low = 1,
    Medium = 2,
    High = 3,
}

/// All parallel implementation rules.
pub fn parallel_rules() -> Vec<RuleImpl> {
    vec![
        Get2ParallelTableScanRule::new().into(),
        DynamicGet2ParallelAppendTableScanRule::new().into(),
        ImplementParallelSequenceRule::new().into(),
        ImplementParallelCTEConsumerRule::new().into(),
        ImplementParallelCTEProducerRule::new().into(),
    ]
}
