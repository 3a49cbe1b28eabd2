//! A minimal memo.
//!
//! The memo stores logically equivalent expressions in groups, and is the search space rules
//! are applied in. It records rule results and which rules were applied to each expression, but
//! doesn't cost or pick plans.

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::ops::{Index, IndexMut};

use anyhow::bail;
use derive_more::Display;
use enumset::EnumSet;
use itertools::Itertools;
use log::{debug, info, trace};
use prettytable::{row, Table};

use crate::error::OptResult;
use crate::operator::{LogicalOperator, Operator, OperatorTrait};
use crate::optimizer::{
    OptExpr, OptExprHandle, OptGroup, OptGroupHandle, Optimizer, OptimizerContext,
};
use crate::plan::Plan;
use crate::properties::LogicalProperty;
use crate::rules::OptExprNode::{ExprHandleNode, GroupHandleNode, OperatorNode};
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RuleImpl, RulePromise, RuleResult};

type MemoExpr = OptExpression<Memo>;

/// Dynamic programming table used for storing expression groups.
pub struct Memo {
    context: OptimizerContext,
    /// Used to avoid insert duplicate group expression.
    group_exprs: HashMap<GroupExprKey, GroupExprId>,
    groups: HashMap<GroupId, Group>,
    root_group_id: GroupId,
    next_group_id: GroupId,
}

impl Memo {
    /// Copies `plan` into the memo, one group per plan node.
    ///
    /// Logical properties are derived while inserting, so the catalog in `context` must know
    /// every scanned table.
    pub fn new(plan: Plan, context: OptimizerContext) -> OptResult<Self> {
        let plan_nodes = plan.nodes_bottom_up();
        let mut memo = Memo {
            context,
            group_exprs: HashMap::new(),
            groups: HashMap::new(),
            root_group_id: GroupId(0),
            next_group_id: GroupId(0),
        };

        let mut node_id_to_group_id = HashMap::with_capacity(plan_nodes.len());
        for node in plan_nodes {
            let inputs = node
                .inputs()
                .iter()
                .map(|input| match node_id_to_group_id.get(&input.id()) {
                    Some(group_id) => Ok(*group_id),
                    None => bail!("Input {} of plan node {} not visited", input.id(), node.id()),
                })
                .collect::<OptResult<Vec<GroupId>>>()?;

            let key = GroupExprKey {
                operator: node.operator().clone(),
                inputs,
            };
            let group_id = memo.insert_group_expression(key, None)?.group_id;
            node_id_to_group_id.insert(node.id(), group_id);
        }

        memo.root_group_id = match node_id_to_group_id.get(&plan.root().id()) {
            Some(group_id) => *group_id,
            None => bail!("Root of plan not inserted"),
        };

        Ok(memo)
    }

    pub fn root_group_id(&self) -> GroupId {
        self.root_group_id
    }

    /// The expression the root plan node was copied into.
    pub fn root_expr_id(&self) -> GroupExprId {
        GroupExprId::new(self.root_group_id, 0)
    }

    pub fn logical_expr_ids(&self, group_id: GroupId) -> Vec<GroupExprId> {
        self[group_id]
            .logical_group_exprs
            .keys()
            .copied()
            .sorted_by_key(|id| id.expr_id)
            .collect()
    }

    pub fn physical_expr_ids(&self, group_id: GroupId) -> Vec<GroupExprId> {
        self[group_id]
            .physical_group_exprs
            .keys()
            .copied()
            .sorted_by_key(|id| id.expr_id)
            .collect()
    }

    /// First logical expression, in group order, whose operator satisfies `predicate`.
    pub fn find_logical_expr<P>(&self, predicate: P) -> Option<GroupExprId>
    where
        P: Fn(&LogicalOperator) -> bool,
    {
        self.group_handles()
            .into_iter()
            .flat_map(|group_id| self.logical_expr_ids(group_id))
            .find(|id| {
                self[*id]
                    .operator()
                    .as_logical()
                    .map(|op| predicate(op))
                    .unwrap_or(false)
            })
    }

    /// Insert a rule result into memo and return group expression id.
    ///
    /// Nodes that are expression handles were bound from the memo and are returned unchanged.
    pub fn insert_opt_expression(
        &mut self,
        opt_expr: &MemoExpr,
        target_group: Option<GroupId>,
    ) -> OptResult<GroupExprId> {
        match opt_expr.node() {
            ExprHandleNode(group_expr_id) => Ok(*group_expr_id),
            OperatorNode(operator) => {
                let input_groups = opt_expr
                    .inputs()
                    .iter()
                    .map(|input| match input.node() {
                        GroupHandleNode(group_id) => Ok(*group_id),
                        _ => self
                            .insert_opt_expression(input, None)
                            .map(|id| id.group_id),
                    })
                    .collect::<OptResult<Vec<GroupId>>>()?;

                let group_expr_key = GroupExprKey {
                    operator: operator.clone(),
                    inputs: input_groups,
                };

                self.insert_group_expression(group_expr_key, target_group)
            }
            GroupHandleNode(group_id) => {
                bail!("Group handle {} can't be inserted as an expression", group_id)
            }
        }
    }

    fn insert_group_expression(
        &mut self,
        group_expr_key: GroupExprKey,
        target_group: Option<GroupId>,
    ) -> OptResult<GroupExprId> {
        if let Some(existing) = self.group_exprs.get(&group_expr_key) {
            if let Some(target_group_id) = target_group {
                if target_group_id != existing.group_id {
                    debug!(
                        "Expression {:?} already recorded in group {}, not in {}",
                        group_expr_key.operator, existing.group_id, target_group_id
                    );
                }
            }
            return Ok(*existing);
        }

        let parallel_incompatible = group_expr_key.operator.is_parallel_incompatible()
            || group_expr_key
                .inputs
                .iter()
                .any(|input| self[*input].parallel_incompatible);

        let group_id = match target_group {
            Some(group_id) => group_id,
            None => {
                let logical_prop = self.derive_logical_prop(&group_expr_key)?;
                self.new_group(logical_prop)
            }
        };

        let group = &mut self[group_id];
        group.parallel_incompatible |= parallel_incompatible;
        let group_expr_id = group.insert_group_expr(GroupExpr::new(group_expr_key.clone()));
        info!(
            "Recorded {:?} as group expression {}",
            group_expr_key.operator, group_expr_id
        );
        self.group_exprs.insert(group_expr_key, group_expr_id);

        Ok(group_expr_id)
    }

    fn derive_logical_prop(&self, key: &GroupExprKey) -> OptResult<LogicalProperty> {
        match &key.operator {
            Operator::Logical(op) => {
                let inputs = key
                    .inputs
                    .iter()
                    .map(|group_id| &self[*group_id].logical_prop)
                    .collect::<Vec<&LogicalProperty>>();
                op.derive_logical_prop(&self.context, &inputs)
            }
            Operator::Physical(op) => {
                bail!("Physical operator {} can't start a new group", op.as_ref())
            }
        }
    }

    fn new_group(&mut self, logical_prop: LogicalProperty) -> GroupId {
        let group_id = self.next_group_id;
        self.next_group_id.0 += 1;
        self.groups
            .insert(group_id, Group::new(group_id, logical_prop));
        group_id
    }

    /// Binds `pattern` against the expression `group_expr_id`.
    ///
    /// Inputs not covered by the pattern are bound as group handles.
    pub fn bind(&self, group_expr_id: GroupExprId, pattern: &Pattern) -> Vec<MemoExpr> {
        self.bind_all(&[group_expr_id], pattern)
    }

    fn bind_all(&self, group_expr_ids: &[GroupExprId], pattern: &Pattern) -> Vec<MemoExpr> {
        let matched = group_expr_ids.iter().copied().filter(|id| {
            let group_expr = &self[*id];
            pattern.matches_without_children(group_expr.operator(), group_expr.key.inputs.len())
        });

        match &pattern.children {
            Some(children_patterns) => matched
                .flat_map(|group_expr_id| {
                    children_patterns
                        .iter()
                        .zip(self[group_expr_id].key.inputs.iter())
                        .map(|(child_pattern, group_id)| {
                            self.bind_all(&self.logical_expr_ids(*group_id), child_pattern)
                        })
                        .multi_cartesian_product()
                        .map(move |inputs| OptExpression::with_expr_handle(group_expr_id, inputs))
                })
                .collect(),
            None => matched
                .map(|group_expr_id| {
                    OptExpression::with_expr_handle(
                        group_expr_id,
                        self[group_expr_id]
                            .key
                            .inputs
                            .iter()
                            .map(|group_id| MemoExpr::with_group_handle(*group_id)),
                    )
                })
                .collect(),
        }
    }

    /// Applies `rule` to a logical expression and records its results in the expression's
    /// group.
    ///
    /// Returns ids of the recorded expressions. A rule is applied at most once to an
    /// expression, and not at all when its promise is [`RulePromise::None`].
    pub fn apply_rule(
        &mut self,
        rule: &RuleImpl,
        group_expr_id: GroupExprId,
    ) -> OptResult<Vec<GroupExprId>> {
        let group_expr = &self[group_expr_id];
        if group_expr.is_rule_applied(rule.rule_id())
            || !rule
                .pattern()
                .matches_without_children(group_expr.operator(), group_expr.key.inputs.len())
        {
            return Ok(vec![]);
        }
        self[group_expr_id].set_rule_applied(rule.rule_id());

        if rule.promise(group_expr_id, &*self) == RulePromise::None {
            trace!("Skipping rule {:?} on {}", rule, group_expr_id);
            return Ok(vec![]);
        }

        info!(
            "Beginning to apply rule {:?} to group expression {}",
            rule, group_expr_id
        );

        let mut result = RuleResult::new();
        for binding in self.bind(group_expr_id, rule.pattern()) {
            rule.apply(binding, &*self, &mut result)?;
        }

        let mut recorded = Vec::with_capacity(result.len());
        for result_node in result.results() {
            info!(
                "Result of applying rule {:?} to group expression {}: {:?}",
                rule, group_expr_id, result_node
            );
            recorded.push(self.insert_opt_expression(&result_node, Some(group_expr_id.group_id))?);
        }

        Ok(recorded)
    }

    /// Applies every rule to every logical expression once.
    ///
    /// Returns the number of recorded expressions.
    pub fn apply_rules(&mut self, rules: &[RuleImpl]) -> OptResult<usize> {
        let logical_exprs = self
            .group_handles()
            .into_iter()
            .flat_map(|group_id| self.logical_expr_ids(group_id))
            .collect::<Vec<GroupExprId>>();

        let mut recorded = 0;
        for group_expr_id in logical_exprs {
            for rule in rules {
                recorded += self.apply_rule(rule, group_expr_id)?.len();
            }
        }
        Ok(recorded)
    }
}

impl Optimizer for Memo {
    type GroupHandle = GroupId;
    type ExprHandle = GroupExprId;
    type Group = Group;
    type Expr = GroupExpr;

    fn context(&self) -> &OptimizerContext {
        &self.context
    }

    fn group_at(&self, group_id: GroupId) -> &Group {
        &self[group_id]
    }

    fn expr_at(&self, group_expr_id: GroupExprId) -> &GroupExpr {
        &self[group_expr_id]
    }

    fn group_handles(&self) -> Vec<GroupId> {
        self.groups.keys().copied().sorted().collect()
    }
}

impl Index<GroupId> for Memo {
    type Output = Group;

    fn index(&self, index: GroupId) -> &Group {
        self.groups
            .get(&index)
            .unwrap_or_else(|| panic!("Group {} not found in memo", index))
    }
}

impl IndexMut<GroupId> for Memo {
    fn index_mut(&mut self, index: GroupId) -> &mut Self::Output {
        self.groups
            .get_mut(&index)
            .unwrap_or_else(|| panic!("Group {} not found in memo", index))
    }
}

impl Index<GroupExprId> for Memo {
    type Output = GroupExpr;

    fn index(&self, index: GroupExprId) -> &Self::Output {
        &self[index.group_id][index]
    }
}

impl IndexMut<GroupExprId> for Memo {
    fn index_mut(&mut self, index: GroupExprId) -> &mut Self::Output {
        &mut self[index.group_id][index]
    }
}

impl Debug for Memo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "Groups in memo, root {}:", self.root_group_id)?;
        writeln!(f)?;

        for group_id in self.group_handles() {
            writeln!(f, "{:?}", self[group_id])?;
        }

        Ok(())
    }
}

/// Key of a group in the memo.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Ord, PartialOrd, Display)]
pub struct GroupId(pub usize);

/// Key of an expression, `expr_id` counts the expressions of `group_id` in insertion order.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Display)]
#[display(fmt = "{}.{}", group_id, expr_id)]
pub struct GroupExprId {
    pub group_id: GroupId,
    pub expr_id: usize,
}

impl GroupExprId {
    pub fn new(group_id: GroupId, expr_id: usize) -> Self {
        Self { group_id, expr_id }
    }
}

// `Debug` of ids is their `Display` form, e.g. `3.1`.
macro_rules! debug_as_display {
    ($($id:ty),*) => {
        $(impl Debug for $id {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(self, f)
            }
        })*
    };
}

debug_as_display!(GroupId, GroupExprId);

impl OptGroupHandle for GroupId {
    type O = Memo;
}

impl OptExprHandle for GroupExprId {
    type O = Memo;
}

/// A group contains a set of logically equivalent `GroupExpression`s.
pub struct Group {
    group_id: GroupId,
    logical_prop: LogicalProperty,
    /// Some expression in this group or below it can't run under a parallel plan.
    parallel_incompatible: bool,
    logical_group_exprs: HashMap<GroupExprId, GroupExpr>,
    physical_group_exprs: HashMap<GroupExprId, GroupExpr>,
    next_expr_id: usize,
}

impl Debug for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Group {:?} (parallel incompatible: {}):",
            &self.group_id.0, self.parallel_incompatible
        )?;

        let mut table = Table::new();
        table.add_row(row!["Group Expression Id", "Operator", "Inputs"]);
        let group_exprs = self
            .logical_group_exprs
            .iter()
            .chain(self.physical_group_exprs.iter())
            .sorted_by_key(|(id, _)| id.expr_id);
        for (group_expr_id, group_expr) in group_exprs {
            table.add_row(row![
                group_expr_id.expr_id,
                format!("{:?}", group_expr.key.operator),
                format!("{:?}", group_expr.key.inputs)
            ]);
        }

        writeln!(f, "{}", table)
    }
}

impl Index<GroupExprId> for Group {
    type Output = GroupExpr;

    fn index(&self, index: GroupExprId) -> &Self::Output {
        self.logical_group_exprs
            .get(&index)
            .or_else(|| self.physical_group_exprs.get(&index))
            .unwrap_or_else(|| panic!("Group expression {} not found", index))
    }
}

impl IndexMut<GroupExprId> for Group {
    fn index_mut(&mut self, index: GroupExprId) -> &mut Self::Output {
        if self.logical_group_exprs.contains_key(&index) {
            self.logical_group_exprs.get_mut(&index)
        } else {
            self.physical_group_exprs.get_mut(&index)
        }
        .unwrap_or_else(|| panic!("Group expression {} not found", index))
    }
}

impl OptGroup for Group {
    fn logical_prop(&self) -> &LogicalProperty {
        &self.logical_prop
    }

    fn is_parallel_incompatible(&self) -> bool {
        self.parallel_incompatible
    }
}

impl Group {
    fn new(group_id: GroupId, logical_prop: LogicalProperty) -> Self {
        Self {
            group_id,
            logical_prop,
            parallel_incompatible: false,
            logical_group_exprs: HashMap::new(),
            physical_group_exprs: HashMap::new(),
            next_expr_id: 0,
        }
    }

    /// Number of group expressions.
    pub fn expr_count(&self) -> usize {
        self.logical_group_exprs.len() + self.physical_group_exprs.len()
    }

    fn insert_group_expr(&mut self, group_expr: GroupExpr) -> GroupExprId {
        let group_expr_id = GroupExprId {
            group_id: self.group_id,
            expr_id: self.next_expr_id,
        };
        self.next_expr_id += 1;

        match group_expr.key.operator {
            Operator::Logical(_) => {
                self.logical_group_exprs.insert(group_expr_id, group_expr);
            }
            Operator::Physical(_) => {
                self.physical_group_exprs.insert(group_expr_id, group_expr);
            }
        }

        group_expr_id
    }
}

/// Base group expression information.
#[derive(Eq, PartialEq, Hash, Debug, Clone)]
struct GroupExprKey {
    operator: Operator,
    inputs: Vec<GroupId>,
}

pub struct GroupExpr {
    /// Can be used to uniquely identify a group expression.
    ///
    /// It should not be changed after creation.
    key: GroupExprKey,

    /// Rules already applied to this group expression.
    applied_rules: EnumSet<RuleId>,
}

impl OptExpr for GroupExpr {
    type O = Memo;
    type InputHandle = GroupId;

    fn operator(&self) -> &Operator {
        &self.key.operator
    }

    fn inputs_len(&self, _opt: &Memo) -> usize {
        self.key.inputs.len()
    }

    fn input_at(&self, idx: usize, _opt: &Memo) -> GroupId {
        self.key.inputs[idx]
    }
}

impl GroupExpr {
    fn new(key: GroupExprKey) -> Self {
        Self {
            key,
            applied_rules: EnumSet::new(),
        }
    }

    pub fn is_rule_applied(&self, rule_id: RuleId) -> bool {
        self.applied_rules.contains(rule_id)
    }

    pub fn set_rule_applied(&mut self, rule_id: RuleId) {
        self.applied_rules |= rule_id;
    }

    pub fn inputs(&self) -> &[GroupId] {
        &self.key.inputs
    }

    pub fn is_logical(&self) -> bool {
        matches!(self.key.operator, Operator::Logical(_))
    }

    pub fn is_physical(&self) -> bool {
        matches!(self.key.operator, Operator::Physical(_))
    }
}
