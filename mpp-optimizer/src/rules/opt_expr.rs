use std::fmt::{Debug, Formatter};

use anyhow::bail;

use crate::error::OptResult;
use crate::operator::Operator;
use crate::optimizer::{OptExpr, Optimizer};
use crate::rules::OptExprNode::{ExprHandleNode, GroupHandleNode, OperatorNode};
use crate::rules::OptExprVec;

/// Root of an [`OptExpression`].
pub enum OptExprNode<O: Optimizer> {
    /// Operator created by a rule or an enforcer, not yet in the search space.
    OperatorNode(Operator),
    /// Expression already recorded in the search space.
    ExprHandleNode(O::ExprHandle),
    /// Any expression of a group, only as a leaf.
    GroupHandleNode(O::GroupHandle),
}

// Derives would require `O: Clone` and `O: PartialEq`.
impl<O: Optimizer> Clone for OptExprNode<O> {
    fn clone(&self) -> Self {
        match self {
            OperatorNode(op) => OperatorNode(op.clone()),
            ExprHandleNode(expr) => ExprHandleNode(expr.clone()),
            GroupHandleNode(group) => GroupHandleNode(group.clone()),
        }
    }
}

impl<O: Optimizer> PartialEq for OptExprNode<O> {
    fn eq(&self, other: &Self) -> bool {
        match self {
            OperatorNode(op) => matches!(other, OperatorNode(other_op) if other_op == op),
            ExprHandleNode(expr) => {
                matches!(other, ExprHandleNode(other_expr) if other_expr == expr)
            }
            GroupHandleNode(group) => {
                matches!(other, GroupHandleNode(other_group) if other_group == group)
            }
        }
    }
}

impl<O: Optimizer> Debug for OptExprNode<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OperatorNode(op) => write!(f, "{:?}", op),
            ExprHandleNode(expr) => write!(f, "{:?}", expr),
            GroupHandleNode(group) => write!(f, "group {:?}", group),
        }
    }
}

/// Expression tree exchanged between the search space and rules or enforcers.
///
/// Bindings produced by the search space carry expression handles with group handles as
/// leaves. Alternatives produced by rules carry new operators on top of the bound inputs, and
/// enforcers wrap a child expression in a new motion operator.
pub struct OptExpression<O: Optimizer> {
    node: OptExprNode<O>,
    inputs: OptExprVec<O>,
}

impl<O: Optimizer> Clone for OptExpression<O> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            inputs: self.inputs.clone(),
        }
    }
}

impl<O: Optimizer> PartialEq for OptExpression<O> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.inputs == other.inputs
    }
}

impl<O: Optimizer> OptExpression<O> {
    pub fn with_operator<I>(operator: Operator, inputs: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self {
            node: OperatorNode(operator),
            inputs: inputs.into_iter().collect(),
        }
    }

    pub fn with_expr_handle<I>(handle: O::ExprHandle, inputs: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        Self {
            node: ExprHandleNode(handle),
            inputs: inputs.into_iter().collect(),
        }
    }

    pub fn with_group_handle(handle: O::GroupHandle) -> Self {
        Self {
            node: GroupHandleNode(handle),
            inputs: vec![],
        }
    }

    /// An alternative of `self`: `operator` over the same inputs.
    pub fn with_same_inputs(&self, operator: Operator) -> Self {
        Self {
            node: OperatorNode(operator),
            inputs: self.inputs.clone(),
        }
    }

    pub fn inputs(&self) -> &[Self] {
        &self.inputs
    }

    pub fn node(&self) -> &OptExprNode<O> {
        &self.node
    }

    /// Operator at the root, looked up in `optimizer` for bound expressions.
    ///
    /// Fails for group handles, which stand for several operators.
    pub fn bound_operator<'a>(&'a self, optimizer: &'a O) -> OptResult<&'a Operator> {
        match &self.node {
            OperatorNode(op) => Ok(op),
            ExprHandleNode(expr) => Ok(optimizer.expr_at(expr.clone()).operator()),
            GroupHandleNode(group) => bail!("Group {:?} has no single operator", group),
        }
    }

    fn fmt_indented(&self, f: &mut Formatter<'_>, depth: usize) -> std::fmt::Result {
        writeln!(f, "{:indent$}{:?}", "", self.node, indent = depth * 2)?;
        self.inputs
            .iter()
            .try_for_each(|input| input.fmt_indented(f, depth + 1))
    }
}

impl<O: Optimizer> Debug for OptExpression<O> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Leaf alternative, e.g. a scan produced by a rule.
impl<O: Optimizer> From<Operator> for OptExpression<O> {
    fn from(operator: Operator) -> Self {
        Self::with_operator(operator, vec![])
    }
}
