use std::sync::Arc;

use datafusion_common::Column;

use crate::catalog::RelationDescriptor;
use crate::error::{CatalogError, OptResult};
use crate::operator::{no_relational_child, ChildRequest, OperatorTrait, PhysicalOperatorTrait};
use crate::optimizer::{OptimizationContext, OptimizerContext};
use crate::properties::{
    ColumnSet, CteMap, CteRequirement, DerivedProperties, DistributionRef, DistributionSpec,
    EnforcingType, LogicalProperty, MotionHazard, OrderSpec, PartitionPropagationSpec,
    RewindabilityKind, RewindabilitySpec, ScanId,
};

/// Logical scan of a table.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct Get {
    table_name: String,
    alias: String,
}

impl Get {
    pub fn new<S: Into<String>>(table_name: S) -> Self {
        let table_name = table_name.into();
        Self {
            alias: table_name.clone(),
            table_name,
        }
    }

    pub fn with_alias<S: Into<String>, A: Into<String>>(table_name: S, alias: A) -> Self {
        Self {
            table_name: table_name.into(),
            alias: alias.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl OperatorTrait for Get {
    fn derive_logical_prop(
        &self,
        ctx: &OptimizerContext,
        _inputs: &[&LogicalProperty],
    ) -> OptResult<LogicalProperty> {
        let relation = ctx
            .catalog
            .relation(&self.table_name)
            .ok_or_else(|| CatalogError::RelationNotFound(self.table_name.clone()))?;
        Ok(LogicalProperty::new(relation.output_columns(&self.alias)))
    }
}

/// Logical scan of a partitioned table, partitions are selected at runtime.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct DynamicGet {
    get: Get,
    scan_id: ScanId,
    /// Some partitions are foreign tables.
    has_foreign_partitions: bool,
}

impl DynamicGet {
    pub fn new(get: Get, scan_id: ScanId) -> Self {
        Self {
            get,
            scan_id,
            has_foreign_partitions: false,
        }
    }

    pub fn with_foreign_partitions(mut self, has_foreign_partitions: bool) -> Self {
        self.has_foreign_partitions = has_foreign_partitions;
        self
    }

    pub fn get(&self) -> &Get {
        &self.get
    }

    pub fn table_name(&self) -> &str {
        self.get.table_name()
    }

    pub fn scan_id(&self) -> ScanId {
        self.scan_id
    }

    pub fn has_foreign_partitions(&self) -> bool {
        self.has_foreign_partitions
    }
}

impl OperatorTrait for DynamicGet {
    fn derive_logical_prop(
        &self,
        ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> OptResult<LogicalProperty> {
        self.get.derive_logical_prop(ctx, inputs)
    }
}

/// Table scan split across intra-segment workers.
///
/// Its worker random distribution is built once at construction and shared by every derive
/// call.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ParallelTableScan {
    table_name: String,
    alias: String,
    output_columns: Vec<Column>,
    workers: u32,
    worker_distribution: DistributionRef,
}

impl ParallelTableScan {
    /// # Panics
    ///
    /// When `workers` is zero.
    pub fn new(relation: &RelationDescriptor, alias: &str, workers: u32, dml_query: bool) -> Self {
        assert!(workers > 0, "Parallel table scan requires workers > 0");

        let node_distribution = Arc::new(relation.node_distribution(alias));
        let worker_distribution = Arc::new(
            DistributionSpec::worker_random(workers, Some(node_distribution))
                .with_duplicate_sensitive(dml_query),
        );

        Self {
            table_name: relation.name.clone(),
            alias: alias.to_string(),
            output_columns: relation.output_columns(alias),
            workers,
            worker_distribution,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn workers(&self) -> u32 {
        self.workers
    }

    pub fn worker_distribution(&self) -> &DistributionRef {
        &self.worker_distribution
    }
}

impl PhysicalOperatorTrait for ParallelTableScan {
    fn required_columns(&self, _child: &ChildRequest, _required: &ColumnSet) -> ColumnSet {
        no_relational_child("ParallelTableScan")
    }

    fn required_order(&self, _child: &ChildRequest, _required: &OrderSpec) -> OrderSpec {
        no_relational_child("ParallelTableScan")
    }

    fn required_distribution(
        &self,
        _child: &ChildRequest,
        _required: &DistributionRef,
    ) -> DistributionRef {
        no_relational_child("ParallelTableScan")
    }

    fn required_rewindability(
        &self,
        _child: &ChildRequest,
        _required: &RewindabilitySpec,
    ) -> RewindabilitySpec {
        no_relational_child("ParallelTableScan")
    }

    fn required_partition_propagation(
        &self,
        _child: &ChildRequest,
        _required: &PartitionPropagationSpec,
    ) -> PartitionPropagationSpec {
        no_relational_child("ParallelTableScan")
    }

    fn required_cte(&self, _child: &ChildRequest, _required: &CteRequirement) -> CteRequirement {
        no_relational_child("ParallelTableScan")
    }

    fn provides_required_columns(
        &self,
        _children: &[DerivedProperties],
        required: &ColumnSet,
    ) -> bool {
        required.iter().all(|c| self.output_columns.contains(c))
    }

    fn derive_output_columns(&self, _children: &[DerivedProperties]) -> Vec<Column> {
        self.output_columns.clone()
    }

    fn derive_order(&self, _children: &[DerivedProperties]) -> OrderSpec {
        OrderSpec::empty()
    }

    fn derive_distribution(&self, _children: &[DerivedProperties]) -> DistributionRef {
        self.worker_distribution.clone()
    }

    /// A worker parallel stream is consumed once, replaying needs materialization.
    fn derive_rewindability(&self, _children: &[DerivedProperties]) -> RewindabilitySpec {
        RewindabilitySpec::new(RewindabilityKind::None, MotionHazard::NoMotion)
    }

    fn derive_partition_propagation(
        &self,
        _children: &[DerivedProperties],
    ) -> PartitionPropagationSpec {
        PartitionPropagationSpec::empty()
    }

    fn derive_cte_map(&self, _children: &[DerivedProperties]) -> CteMap {
        CteMap::empty()
    }

    fn distribution_enforcing(
        &self,
        _derived: &DerivedProperties,
        required: &DistributionRef,
    ) -> EnforcingType {
        EnforcingType::of(self.worker_distribution.as_ref(), required.as_ref())
    }

    /// Never the inner side of a nested loop join: no enforcer can make a worker parallel
    /// source safely rescannable.
    fn valid_context(&self, ctx: &OptimizationContext) -> bool {
        !ctx.required.rewindability.is_origin_nl_join()
    }
}

/// Parallel scan over the partitions of a partitioned table.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ParallelAppendTableScan {
    scan: ParallelTableScan,
    scan_id: ScanId,
}

impl ParallelAppendTableScan {
    /// # Panics
    ///
    /// When `workers` is zero.
    pub fn new(
        relation: &RelationDescriptor,
        alias: &str,
        scan_id: ScanId,
        workers: u32,
        dml_query: bool,
    ) -> Self {
        Self {
            scan: ParallelTableScan::new(relation, alias, workers, dml_query),
            scan_id,
        }
    }

    pub fn scan_id(&self) -> ScanId {
        self.scan_id
    }

    pub fn workers(&self) -> u32 {
        self.scan.workers()
    }

    pub fn table_name(&self) -> &str {
        self.scan.table_name()
    }

    pub fn worker_distribution(&self) -> &DistributionRef {
        self.scan.worker_distribution()
    }
}

impl PhysicalOperatorTrait for ParallelAppendTableScan {
    fn required_columns(&self, _child: &ChildRequest, _required: &ColumnSet) -> ColumnSet {
        no_relational_child("ParallelAppendTableScan")
    }

    fn required_order(&self, _child: &ChildRequest, _required: &OrderSpec) -> OrderSpec {
        no_relational_child("ParallelAppendTableScan")
    }

    fn required_distribution(
        &self,
        _child: &ChildRequest,
        _required: &DistributionRef,
    ) -> DistributionRef {
        no_relational_child("ParallelAppendTableScan")
    }

    fn required_rewindability(
        &self,
        _child: &ChildRequest,
        _required: &RewindabilitySpec,
    ) -> RewindabilitySpec {
        no_relational_child("ParallelAppendTableScan")
    }

    fn required_partition_propagation(
        &self,
        _child: &ChildRequest,
        _required: &PartitionPropagationSpec,
    ) -> PartitionPropagationSpec {
        no_relational_child("ParallelAppendTableScan")
    }

    fn required_cte(&self, _child: &ChildRequest, _required: &CteRequirement) -> CteRequirement {
        no_relational_child("ParallelAppendTableScan")
    }

    fn provides_required_columns(
        &self,
        children: &[DerivedProperties],
        required: &ColumnSet,
    ) -> bool {
        self.scan.provides_required_columns(children, required)
    }

    fn derive_output_columns(&self, children: &[DerivedProperties]) -> Vec<Column> {
        self.scan.derive_output_columns(children)
    }

    fn derive_order(&self, children: &[DerivedProperties]) -> OrderSpec {
        self.scan.derive_order(children)
    }

    fn derive_distribution(&self, children: &[DerivedProperties]) -> DistributionRef {
        self.scan.derive_distribution(children)
    }

    fn derive_rewindability(&self, children: &[DerivedProperties]) -> RewindabilitySpec {
        self.scan.derive_rewindability(children)
    }

    /// Consumer of the partitions selected for its scan id.
    fn derive_partition_propagation(
        &self,
        _children: &[DerivedProperties],
    ) -> PartitionPropagationSpec {
        PartitionPropagationSpec::consumer(self.scan_id, self.scan.table_name())
    }

    fn derive_cte_map(&self, children: &[DerivedProperties]) -> CteMap {
        self.scan.derive_cte_map(children)
    }

    fn distribution_enforcing(
        &self,
        derived: &DerivedProperties,
        required: &DistributionRef,
    ) -> EnforcingType {
        self.scan.distribution_enforcing(derived, required)
    }

    fn valid_context(&self, ctx: &OptimizationContext) -> bool {
        self.scan.valid_context(ctx)
    }
}
