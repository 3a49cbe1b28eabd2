use std::sync::Arc;

use arrow_schema::{Schema, SchemaRef};

use crate::catalog::{MemoryCatalog, RelationDescriptor};
use crate::config::{OptimizerConfig, QueryContext};
use crate::memo::{GroupExprId, GroupId, Memo};
use crate::operator::Operator::Physical;
use crate::operator::PhysicalOperator;
use crate::optimizer::OptimizerContext;
use crate::rules::OptExprNode::OperatorNode;
use crate::rules::OptExpression;

/// Columns `a: Int32` and `b: Utf8`.
pub(crate) const TWO_COLUMN_SCHEMA: &str = r#"{
    "fields": [
        {"name": "a", "nullable": false, "data_type": "Int32", "dict_id": 0, "dict_is_ordered": false, "metadata": {}},
        {"name": "b", "nullable": true, "data_type": "Utf8", "dict_id": 0, "dict_is_ordered": false, "metadata": {}}
    ],
    "metadata": {}
}"#;

pub(crate) fn schema_from_json(json: &str) -> SchemaRef {
    let schema: Schema = serde_json::from_str(json).unwrap();
    Arc::new(schema)
}

/// Randomly distributed heap table with [`TWO_COLUMN_SCHEMA`].
pub(crate) fn random_relation(name: &str) -> RelationDescriptor {
    RelationDescriptor::new(name, schema_from_json(TWO_COLUMN_SCHEMA))
}

pub(crate) fn context_with(
    relations: Vec<RelationDescriptor>,
    config: OptimizerConfig,
    query: QueryContext,
) -> OptimizerContext {
    let catalog = MemoryCatalog::new();
    for relation in relations {
        catalog.register_relation(relation).unwrap();
    }
    OptimizerContext::new(Arc::new(catalog), config, query)
}

/// Context whose catalog holds table `t`.
pub(crate) fn optimizer_context(config: OptimizerConfig, query: QueryContext) -> OptimizerContext {
    context_with(vec![random_relation("t")], config, query)
}

/// A bound leaf expression, used as the child enforcers wrap.
pub(crate) fn scan_expr() -> OptExpression<Memo> {
    OptExpression::with_expr_handle(GroupExprId::new(GroupId(0), 0), vec![])
}

pub(crate) fn physical_operator(expr: &OptExpression<Memo>) -> &PhysicalOperator {
    match expr.node() {
        OperatorNode(Physical(op)) => op,
        other => panic!("Not a physical operator: {:?}", other),
    }
}
