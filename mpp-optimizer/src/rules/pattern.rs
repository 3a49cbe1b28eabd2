use crate::operator::Operator;

pub type OperatorMatcher = fn(&Operator) -> bool;

/// A pattern defines which expressions in the search space a rule operates on.
///
/// To match a `Sequence` over any inputs, the pattern only constrains the root:
/// ```
/// use mpp_optimizer::operator::LogicalOperator::LogicalSequence;
/// use mpp_optimizer::operator::Operator::Logical;
/// use mpp_optimizer::rules::Pattern;
///
/// Pattern::new_leaf(|op| matches!(op, Logical(LogicalSequence(_))));
/// ```
///
/// Inputs of a leaf pattern are bound as group handles, whatever their arity.
pub struct Pattern {
    /// Matches against an operator.
    pub predict: OperatorMatcher,
    /// `None` for leaf node.
    pub children: Option<Vec<Pattern>>,
}

impl Pattern {
    pub fn new_leaf(matcher: OperatorMatcher) -> Pattern {
        Pattern {
            predict: matcher,
            children: None,
        }
    }

    pub fn new<I: IntoIterator<Item = Pattern>>(matcher: OperatorMatcher, children: I) -> Pattern {
        let children = children.into_iter().collect::<Vec<Pattern>>();
        let children_pattern = if !children.is_empty() {
            Some(children)
        } else {
            None
        };

        Pattern {
            predict: matcher,
            children: children_pattern,
        }
    }

    /// Matches the root operator and, when children are constrained, the arity.
    pub fn matches_without_children(&self, operator: &Operator, inputs_len: usize) -> bool {
        (self.predict)(operator)
            && self
                .children
                .as_ref()
                .map(|c| c.len() == inputs_len)
                .unwrap_or(true)
    }
}

pub fn any(_: &Operator) -> bool {
    true
}
