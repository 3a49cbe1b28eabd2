use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use anyhow::anyhow;
use datafusion_common::Column;

use crate::error::OptResult;
use crate::operator::{
    last_child, no_relational_child, ChildRequest, OperatorTrait, PhysicalOperatorTrait,
};
use crate::optimizer::OptimizerContext;
use crate::properties::{
    ColumnSet, CteId, CteMap, CteRequirement, CteRole, DerivedProperties, DistributionRef,
    LogicalProperty, OrderSpec, PartitionPropagationSpec, RewindabilitySpec,
};

/// Materializes its input as common table expression `id`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CTEProducer {
    id: CteId,
    columns: Vec<Column>,
}

impl CTEProducer {
    pub fn new(id: CteId, columns: Vec<Column>) -> Self {
        Self { id, columns }
    }

    pub fn id(&self) -> CteId {
        self.id
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

impl OperatorTrait for CTEProducer {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> OptResult<LogicalProperty> {
        if inputs.len() != 1 {
            return Err(anyhow!(
                "CTE producer {} requires exactly one input, got {}",
                self.id,
                inputs.len()
            ));
        }
        Ok(LogicalProperty::new(self.columns.clone()))
    }
}

/// Reads common table expression `id`.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct CTEConsumer {
    id: CteId,
    columns: Vec<Column>,
    /// Producer column position to local column.
    mapping: BTreeMap<usize, Column>,
}

impl CTEConsumer {
    /// Consumer whose `i`-th column reads the `i`-th producer column.
    pub fn new(id: CteId, columns: Vec<Column>) -> Self {
        let mapping = columns.iter().cloned().enumerate().collect();
        Self {
            id,
            columns,
            mapping,
        }
    }

    pub fn id(&self) -> CteId {
        self.id
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn mapping(&self) -> &BTreeMap<usize, Column> {
        &self.mapping
    }
}

impl OperatorTrait for CTEConsumer {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        _inputs: &[&LogicalProperty],
    ) -> OptResult<LogicalProperty> {
        Ok(LogicalProperty::new(self.columns.clone()))
    }
}

/// Parallel producer of common table expression `id`.
///
/// Columns nobody references are pruned, `idx_map` then maps every original column position
/// to its position among the kept columns.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ParallelCTEProducer {
    id: CteId,
    columns: Vec<Column>,
    idx_map: Option<Vec<Option<usize>>>,
    workers: u32,
}

impl ParallelCTEProducer {
    /// `used_mask[i]` tells whether `columns[i]` is referenced. Without a mask every column is
    /// kept.
    pub fn new(id: CteId, columns: &[Column], used_mask: Option<&[bool]>, workers: u32) -> Self {
        assert!(workers > 0, "Parallel CTE producer requires workers > 0");

        match used_mask {
            Some(mask) => {
                assert_eq!(
                    columns.len(),
                    mask.len(),
                    "Used mask doesn't cover every column of CTE {}",
                    id
                );
                let mut kept = Vec::with_capacity(columns.len());
                let idx_map = columns
                    .iter()
                    .zip(mask)
                    .map(|(column, used)| {
                        if *used {
                            kept.push(column.clone());
                            Some(kept.len() - 1)
                        } else {
                            None
                        }
                    })
                    .collect();

                Self {
                    id,
                    columns: kept,
                    idx_map: Some(idx_map),
                    workers,
                }
            }
            None => Self {
                id,
                columns: columns.to_vec(),
                idx_map: None,
                workers,
            },
        }
    }

    pub fn id(&self) -> CteId {
        self.id
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn idx_map(&self) -> Option<&[Option<usize>]> {
        self.idx_map.as_deref()
    }

    pub fn workers(&self) -> u32 {
        self.workers
    }
}

impl PhysicalOperatorTrait for ParallelCTEProducer {
    fn required_columns(&self, _child: &ChildRequest, required: &ColumnSet) -> ColumnSet {
        let mut columns: ColumnSet = self.columns.iter().cloned().collect();
        columns.extend(required.iter().cloned());
        columns
    }

    fn required_order(&self, _child: &ChildRequest, required: &OrderSpec) -> OrderSpec {
        required.clone()
    }

    fn required_distribution(
        &self,
        _child: &ChildRequest,
        required: &DistributionRef,
    ) -> DistributionRef {
        required.clone()
    }

    fn required_rewindability(
        &self,
        _child: &ChildRequest,
        required: &RewindabilitySpec,
    ) -> RewindabilitySpec {
        *required
    }

    fn required_partition_propagation(
        &self,
        _child: &ChildRequest,
        required: &PartitionPropagationSpec,
    ) -> PartitionPropagationSpec {
        required.clone()
    }

    fn required_cte(&self, _child: &ChildRequest, required: &CteRequirement) -> CteRequirement {
        required.without(self.id)
    }

    fn provides_required_columns(
        &self,
        children: &[DerivedProperties],
        required: &ColumnSet,
    ) -> bool {
        children
            .first()
            .map(|c| c.provides_columns(required))
            .unwrap_or(false)
    }

    fn derive_output_columns(&self, children: &[DerivedProperties]) -> Vec<Column> {
        last_child("ParallelCTEProducer", children)
            .output_columns
            .clone()
    }

    fn derive_order(&self, children: &[DerivedProperties]) -> OrderSpec {
        last_child("ParallelCTEProducer", children).order.clone()
    }

    fn derive_distribution(&self, children: &[DerivedProperties]) -> DistributionRef {
        last_child("ParallelCTEProducer", children)
            .distribution
            .clone()
    }

    fn derive_rewindability(&self, children: &[DerivedProperties]) -> RewindabilitySpec {
        last_child("ParallelCTEProducer", children).rewindability
    }

    fn derive_partition_propagation(
        &self,
        children: &[DerivedProperties],
    ) -> PartitionPropagationSpec {
        last_child("ParallelCTEProducer", children)
            .partition_propagation
            .clone()
    }

    fn derive_cte_map(&self, children: &[DerivedProperties]) -> CteMap {
        CteMap::single(self.id, CteRole::Producer)
            .combine(&last_child("ParallelCTEProducer", children).cte_map)
    }
}

/// Parallel consumer of common table expression `id`.
///
/// Only referenced columns are exposed. `idx_map` records their positions in the original
/// column list and is absent when every column is referenced. The order, distribution and
/// rewindability of a consumer come from its producer, so deriving them here is a contract
/// violation.
#[derive(Clone, Debug)]
pub struct ParallelCTEConsumer {
    id: CteId,
    columns: Vec<Column>,
    mapping: BTreeMap<usize, Column>,
    idx_map: Option<Vec<usize>>,
    workers: u32,
}

impl ParallelCTEConsumer {
    pub fn new<F>(
        id: CteId,
        columns: &[Column],
        mapping: BTreeMap<usize, Column>,
        workers: u32,
        is_used: F,
    ) -> Self
    where
        F: Fn(&Column) -> bool,
    {
        assert!(workers > 0, "Parallel CTE consumer requires workers > 0");

        let (idx_map, kept): (Vec<usize>, Vec<Column>) = columns
            .iter()
            .enumerate()
            .filter(|(_, column)| is_used(column))
            .map(|(idx, column)| (idx, column.clone()))
            .unzip();
        let idx_map = if idx_map.len() == columns.len() {
            None
        } else {
            Some(idx_map)
        };

        Self {
            id,
            columns: kept,
            mapping,
            idx_map,
            workers,
        }
    }

    pub fn id(&self) -> CteId {
        self.id
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn mapping(&self) -> &BTreeMap<usize, Column> {
        &self.mapping
    }

    pub fn idx_map(&self) -> Option<&[usize]> {
        self.idx_map.as_deref()
    }

    pub fn workers(&self) -> u32 {
        self.workers
    }
}

/// Two consumers match when they read the same CTE into the same columns.
impl PartialEq for ParallelCTEConsumer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.columns == other.columns
    }
}

impl Eq for ParallelCTEConsumer {}

impl Hash for ParallelCTEConsumer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.columns.hash(state);
    }
}

impl PhysicalOperatorTrait for ParallelCTEConsumer {
    fn required_columns(&self, _child: &ChildRequest, _required: &ColumnSet) -> ColumnSet {
        no_relational_child("ParallelCTEConsumer")
    }

    fn required_order(&self, _child: &ChildRequest, _required: &OrderSpec) -> OrderSpec {
        no_relational_child("ParallelCTEConsumer")
    }

    fn required_distribution(
        &self,
        _child: &ChildRequest,
        _required: &DistributionRef,
    ) -> DistributionRef {
        no_relational_child("ParallelCTEConsumer")
    }

    fn required_rewindability(
        &self,
        _child: &ChildRequest,
        _required: &RewindabilitySpec,
    ) -> RewindabilitySpec {
        no_relational_child("ParallelCTEConsumer")
    }

    fn required_partition_propagation(
        &self,
        _child: &ChildRequest,
        _required: &PartitionPropagationSpec,
    ) -> PartitionPropagationSpec {
        no_relational_child("ParallelCTEConsumer")
    }

    fn required_cte(&self, _child: &ChildRequest, _required: &CteRequirement) -> CteRequirement {
        no_relational_child("ParallelCTEConsumer")
    }

    fn provides_required_columns(
        &self,
        _children: &[DerivedProperties],
        required: &ColumnSet,
    ) -> bool {
        required.iter().all(|c| self.columns.contains(c))
    }

    fn derive_output_columns(&self, _children: &[DerivedProperties]) -> Vec<Column> {
        self.columns.clone()
    }

    fn derive_order(&self, _children: &[DerivedProperties]) -> OrderSpec {
        panic!("Unexpected order derivation on ParallelCTEConsumer({})", self.id)
    }

    fn derive_distribution(&self, _children: &[DerivedProperties]) -> DistributionRef {
        panic!(
            "Unexpected distribution derivation on ParallelCTEConsumer({})",
            self.id
        )
    }

    fn derive_rewindability(&self, _children: &[DerivedProperties]) -> RewindabilitySpec {
        panic!(
            "Unexpected rewindability derivation on ParallelCTEConsumer({})",
            self.id
        )
    }

    fn derive_partition_propagation(
        &self,
        _children: &[DerivedProperties],
    ) -> PartitionPropagationSpec {
        PartitionPropagationSpec::empty()
    }

    fn derive_cte_map(&self, _children: &[DerivedProperties]) -> CteMap {
        CteMap::single(self.id, CteRole::Consumer)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use datafusion_common::Column;

    use crate::operator::{
        ChildRequest, ParallelCTEConsumer, ParallelCTEProducer, PhysicalOperatorTrait,
    };
    use crate::properties::{
        ColumnSet, CteId, CteMap, CteRequirement, CteRole, DerivedProperties, DistributionSpec,
        PropertyRequest,
    };

    fn columns() -> Vec<Column> {
        vec![
            Column::from_qualified_name("cte.a"),
            Column::from_qualified_name("cte.b"),
            Column::from_qualified_name("cte.c"),
        ]
    }

    fn consumer<F: Fn(&Column) -> bool>(id: u32, is_used: F) -> ParallelCTEConsumer {
        let columns = columns();
        let mapping: BTreeMap<usize, Column> = columns.iter().cloned().enumerate().collect();
        ParallelCTEConsumer::new(CteId(id), &columns, mapping, 2, is_used)
    }

    #[test]
    fn test_consumer_idx_map() {
        let all = consumer(1, |_| true);
        assert!(all.idx_map().is_none());
        assert_eq!(3, all.columns().len());

        let pruned = consumer(1, |c| c.name != "b");
        assert_eq!(Some(&[0usize, 2][..]), pruned.idx_map());
        assert_eq!(
            vec![
                Column::from_qualified_name("cte.a"),
                Column::from_qualified_name("cte.c")
            ],
            pruned.columns()
        );
        assert_eq!(3, pruned.mapping().len());
    }

    #[test]
    fn test_consumer_matches() {
        assert_eq!(consumer(1, |_| true), consumer(1, |_| true));
        assert_ne!(consumer(1, |_| true), consumer(2, |_| true));
        assert_ne!(consumer(1, |_| true), consumer(1, |c| c.name != "a"));
    }

    #[test]
    fn test_consumer_derive_cte_map() {
        let consumer = consumer(5, |_| true);
        let map = consumer.derive_cte_map(&[]);
        assert_eq!(Some(CteRole::Consumer), map.role(CteId(5)));
        assert_eq!(consumer.columns().to_vec(), consumer.derive_output_columns(&[]));
    }

    #[test]
    fn test_consumer_provides_required_columns() {
        let consumer = consumer(1, |c| c.name != "c");
        let ab: ColumnSet = vec![
            Column::from_qualified_name("cte.a"),
            Column::from_qualified_name("cte.b"),
        ]
        .into_iter()
        .collect();
        let c: ColumnSet = vec![Column::from_qualified_name("cte.c")].into_iter().collect();

        assert!(consumer.provides_required_columns(&[], &ab));
        assert!(!consumer.provides_required_columns(&[], &c));
        assert!(consumer.provides_required_columns(&[], &ColumnSet::new()));
    }

    #[test]
    #[should_panic(expected = "has no relational child")]
    fn test_consumer_required_distribution_panics() {
        let child = ChildRequest::new(1, 0, &[], PropertyRequest::default());
        consumer(1, |_| true)
            .required_distribution(&child, &Arc::new(DistributionSpec::any()));
    }

    #[test]
    #[should_panic(expected = "has no relational child")]
    fn test_consumer_required_cte_panics() {
        let child = ChildRequest::new(1, 0, &[], PropertyRequest::default());
        consumer(1, |_| true).required_cte(&child, &CteRequirement::empty());
    }

    #[test]
    #[should_panic(expected = "Unexpected order derivation")]
    fn test_consumer_derive_order_panics() {
        consumer(1, |_| true).derive_order(&[]);
    }

    #[test]
    #[should_panic(expected = "Unexpected distribution derivation")]
    fn test_consumer_derive_distribution_panics() {
        consumer(1, |_| true).derive_distribution(&[]);
    }

    #[test]
    fn test_producer_pruning() {
        let producer =
            ParallelCTEProducer::new(CteId(1), &columns(), Some(&[true, false, true]), 2);
        assert_eq!(Some(&[Some(0), None, Some(1)][..]), producer.idx_map());
        assert_eq!(2, producer.columns().len());

        let unpruned = ParallelCTEProducer::new(CteId(1), &columns(), None, 2);
        assert!(unpruned.idx_map().is_none());
        assert_eq!(columns(), unpruned.columns());
    }

    #[test]
    fn test_producer_required_and_derived() {
        let producer =
            ParallelCTEProducer::new(CteId(1), &columns(), Some(&[true, false, false]), 2);
        let child = ChildRequest::new(1, 0, &[], PropertyRequest::default());

        let requested: ColumnSet = vec![Column::from_qualified_name("cte.c")]
            .into_iter()
            .collect();
        let required = producer.required_columns(&child, &requested);
        assert_eq!(2, required.len());
        assert!(required.contains(&Column::from_qualified_name("cte.a")));
        assert!(required.contains(&Column::from_qualified_name("cte.c")));

        let cte = CteRequirement::empty()
            .with_entry(CteId(1), CteRole::Producer, true)
            .with_entry(CteId(2), CteRole::Consumer, true);
        let pushed = producer.required_cte(&child, &cte);
        assert!(pushed.get(CteId(1)).is_none());
        assert!(pushed.get(CteId(2)).is_some());

        let distribution = Arc::new(DistributionSpec::worker_random(2, None));
        assert!(Arc::ptr_eq(
            &distribution,
            &producer.required_distribution(&child, &distribution)
        ));

        let child_props = DerivedProperties::new(columns(), distribution.clone())
            .with_cte_map(CteMap::single(CteId(2), CteRole::Consumer));
        let derived = producer.derive_properties(&[child_props]);
        assert_eq!(distribution, derived.distribution);
        assert_eq!(Some(CteRole::Producer), derived.cte_map.role(CteId(1)));
        assert_eq!(Some(CteRole::Consumer), derived.cte_map.role(CteId(2)));
    }
}
