use std::sync::Arc;

use anyhow::bail;
use log::{debug, info};

use crate::catalog::RelationDescriptor;
use crate::error::{CatalogError, OptResult};
use crate::operator::LogicalOperator::{LogicalDynamicGet, LogicalGet};
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::{PhysicalParallelAppendTableScan, PhysicalParallelTableScan};
use crate::operator::{ParallelAppendTableScan, ParallelTableScan};
use crate::optimizer::{OptExpr, OptGroup, Optimizer, OptimizerContext};
use crate::rules::RuleId::{DynamicGet2ParallelAppendTableScan, Get2ParallelTableScan};
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref GET_TO_PARALLEL_TABLE_SCAN_RULE_PATTERN: Pattern = {
        Pattern::new_leaf(|op| {
            matches!(op, Logical(LogicalGet(_)))
        })
    };
    static ref DYNAMIC_GET_TO_PARALLEL_APPEND_TABLE_SCAN_RULE_PATTERN: Pattern = {
        Pattern::new_leaf(|op| {
            matches!(op, Logical(LogicalDynamicGet(_)))
        })
    };
}

/// Checks shared by both parallel scan rules, in the order they short-circuit.
fn scan_promise(rule: &str, relation: &RelationDescriptor, ctx: &OptimizerContext) -> RulePromise {
    if !relation.is_segment_distributed() {
        debug!(
            "{}: table {} is {:?}, no parallel scan",
            rule, relation.name, relation.distribution
        );
        return RulePromise::None;
    }

    if ctx.query.has_replicated_tables {
        debug!(
            "{}: query references replicated tables, no parallel scan of {}",
            rule, relation.name
        );
        return RulePromise::None;
    }

    if relation.storage.is_append_only() {
        if let Some(seg_file_count) = relation.seg_file_count {
            if seg_file_count <= 1 {
                debug!(
                    "{}: table {} has {} segment files, no parallel scan",
                    rule, relation.name, seg_file_count
                );
                return RulePromise::None;
            }
        }
    }

    RulePromise::High
}

fn lookup_relation<O: Optimizer>(
    rule: &str,
    optimizer: &O,
    table_name: &str,
) -> Option<Arc<RelationDescriptor>> {
    let relation = optimizer.context().catalog.relation(table_name);
    if relation.is_none() {
        debug!("{}: table {} not found in catalog", rule, table_name);
    }
    relation
}

/// Implements a table scan as a scan split across workers of each segment.
#[derive(Clone, Default)]
pub struct Get2ParallelTableScanRule {}

impl Get2ParallelTableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for Get2ParallelTableScanRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let get = if let Logical(LogicalGet(get)) = input.bound_operator(optimizer)? {
            get
        } else {
            bail!("Pattern mismatch")
        };

        let ctx = optimizer.context();
        let relation = ctx
            .catalog
            .relation(get.table_name())
            .ok_or_else(|| CatalogError::RelationNotFound(get.table_name().to_string()))?;
        let workers = ctx.config.scan_workers(relation.parallel_workers);
        let scan = ParallelTableScan::new(&relation, get.alias(), workers, ctx.query.dml_query);

        info!(
            "Implementing scan of {} as parallel table scan with {} workers",
            get.table_name(),
            workers
        );
        result.add(OptExpression::from(Physical(PhysicalParallelTableScan(scan))));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &GET_TO_PARALLEL_TABLE_SCAN_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        Get2ParallelTableScan
    }

    fn promise<O: Optimizer>(&self, expr_handle: O::ExprHandle, optimizer: &O) -> RulePromise {
        let ctx = optimizer.context();
        if !ctx.config.is_parallel_mode_ok() {
            debug!("Get2ParallelTableScanRule: parallel mode is off");
            return RulePromise::None;
        }

        if optimizer
            .group_handles()
            .into_iter()
            .any(|group| optimizer.group_at(group).is_parallel_incompatible())
        {
            debug!("Get2ParallelTableScanRule: query contains parallel incompatible operators");
            return RulePromise::None;
        }

        let table_name = match optimizer.expr_at(expr_handle).operator() {
            Logical(LogicalGet(get)) => get.table_name(),
            _ => return RulePromise::None,
        };

        match lookup_relation("Get2ParallelTableScanRule", optimizer, table_name) {
            Some(relation) => scan_promise("Get2ParallelTableScanRule", &relation, ctx),
            None => RulePromise::None,
        }
    }
}

/// Implements a partitioned table scan as a parallel append scan.
#[derive(Clone, Default)]
pub struct DynamicGet2ParallelAppendTableScanRule {}

impl DynamicGet2ParallelAppendTableScanRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for DynamicGet2ParallelAppendTableScanRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let dynamic_get = match input.bound_operator(optimizer)? {
            Logical(LogicalDynamicGet(get)) => get,
            _ => bail!("Pattern mismatch"),
        };

        let ctx = optimizer.context();
        let relation = ctx.catalog.relation(dynamic_get.table_name()).ok_or_else(|| {
            CatalogError::RelationNotFound(dynamic_get.table_name().to_string())
        })?;
        let workers = ctx.config.scan_workers(relation.parallel_workers);
        let scan = ParallelAppendTableScan::new(
            &relation,
            dynamic_get.get().alias(),
            dynamic_get.scan_id(),
            workers,
            ctx.query.dml_query,
        );

        info!(
            "Implementing dynamic scan {} of {} as parallel append scan with {} workers",
            dynamic_get.scan_id(),
            dynamic_get.table_name(),
            workers
        );
        result.add(OptExpression::from(Physical(PhysicalParallelAppendTableScan(
            scan,
        ))));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &DYNAMIC_GET_TO_PARALLEL_APPEND_TABLE_SCAN_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        DynamicGet2ParallelAppendTableScan
    }

    fn promise<O: Optimizer>(&self, expr_handle: O::ExprHandle, optimizer: &O) -> RulePromise {
        let ctx = optimizer.context();
        if !ctx.config.is_parallel_mode_ok() {
            debug!("DynamicGet2ParallelAppendTableScanRule: parallel mode is off");
            return RulePromise::None;
        }

        if !ctx.config.enable_parallel_append_scan {
            debug!("DynamicGet2ParallelAppendTableScanRule: parallel append scan is disabled");
            return RulePromise::None;
        }

        let dynamic_get = match optimizer.expr_at(expr_handle).operator() {
            Logical(LogicalDynamicGet(get)) => get,
            _ => return RulePromise::None,
        };

        if dynamic_get.has_foreign_partitions() {
            debug!(
                "DynamicGet2ParallelAppendTableScanRule: {} has foreign partitions",
                dynamic_get.table_name()
            );
            return RulePromise::None;
        }

        match lookup_relation(
            "DynamicGet2ParallelAppendTableScanRule",
            optimizer,
            dynamic_get.table_name(),
        ) {
            Some(relation) => {
                scan_promise("DynamicGet2ParallelAppendTableScanRule", &relation, ctx)
            }
            None => RulePromise::None,
        }
    }
}
