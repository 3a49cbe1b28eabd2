use std::sync::Arc;

use anyhow::anyhow;
use datafusion_common::Column;

use crate::error::OptResult;
use crate::operator::{last_child, ChildRequest, OperatorTrait, PhysicalOperatorTrait};
use crate::optimizer::OptimizerContext;
use crate::properties::{
    ColumnSet, CteMap, CteRequirement, DerivedProperties, DistributionRef, DistributionSpec,
    LogicalProperty, MotionHazard, OrderSpec, PartitionPropagationSpec, RequestCounts,
    RewindabilityKind, RewindabilitySpec,
};

/// Evaluates inputs left to right and returns the output of the last one.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct Sequence {}

impl Sequence {
    pub fn new() -> Self {
        Self {}
    }
}

impl OperatorTrait for Sequence {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> OptResult<LogicalProperty> {
        inputs
            .last()
            .map(|prop| (*prop).clone())
            .ok_or_else(|| anyhow!("Sequence requires at least one input"))
    }
}

/// Window function evaluation over its input.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SequenceProject {
    partition_by: Vec<Column>,
}

impl SequenceProject {
    pub fn new<I: IntoIterator<Item = Column>>(partition_by: I) -> Self {
        Self {
            partition_by: partition_by.into_iter().collect(),
        }
    }

    pub fn partition_by(&self) -> &[Column] {
        &self.partition_by
    }
}

impl OperatorTrait for SequenceProject {
    fn derive_logical_prop(
        &self,
        _ctx: &OptimizerContext,
        inputs: &[&LogicalProperty],
    ) -> OptResult<LogicalProperty> {
        inputs
            .first()
            .map(|prop| (*prop).clone())
            .ok_or_else(|| anyhow!("SequenceProject requires one input"))
    }
}

/// Sequence whose children run under a worker random distribution.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ParallelSequence {
    workers: u32,
    worker_distribution: DistributionRef,
}

impl ParallelSequence {
    /// # Panics
    ///
    /// When `workers` is zero.
    pub fn new(workers: u32, dml_query: bool) -> Self {
        Self {
            workers,
            worker_distribution: Arc::new(
                DistributionSpec::worker_random(workers, None).with_duplicate_sensitive(dml_query),
            ),
        }
    }

    pub fn workers(&self) -> u32 {
        self.workers
    }

    pub fn worker_distribution(&self) -> &DistributionRef {
        &self.worker_distribution
    }
}

impl PhysicalOperatorTrait for ParallelSequence {
    /// Two distribution alternatives, both resolve to the worker random distribution.
    fn request_counts(&self) -> RequestCounts {
        RequestCounts::default().with_distribution(2)
    }

    /// Only the last child produces output.
    fn required_columns(&self, child: &ChildRequest, required: &ColumnSet) -> ColumnSet {
        if child.is_last_child() {
            required.clone()
        } else {
            ColumnSet::new()
        }
    }

    fn required_order(&self, _child: &ChildRequest, _required: &OrderSpec) -> OrderSpec {
        OrderSpec::empty()
    }

    fn required_distribution(
        &self,
        _child: &ChildRequest,
        _required: &DistributionRef,
    ) -> DistributionRef {
        self.worker_distribution.clone()
    }

    fn required_rewindability(
        &self,
        _child: &ChildRequest,
        required: &RewindabilitySpec,
    ) -> RewindabilitySpec {
        RewindabilitySpec::new(RewindabilityKind::None, required.motion_hazard())
    }

    fn required_partition_propagation(
        &self,
        child: &ChildRequest,
        required: &PartitionPropagationSpec,
    ) -> PartitionPropagationSpec {
        if child.is_last_child() {
            required.clone()
        } else {
            PartitionPropagationSpec::empty()
        }
    }

    /// Earlier children may, but need not, resolve entries. The last child gets whatever is
    /// still unresolved after them.
    fn required_cte(&self, child: &ChildRequest, required: &CteRequirement) -> CteRequirement {
        if child.is_last_child() {
            let earlier = child
                .earlier_children
                .iter()
                .fold(CteMap::empty(), |map, c| map.combine(&c.cte_map));
            required.unresolved_sequence(&earlier)
        } else {
            required.all_optional()
        }
    }

    fn provides_required_columns(
        &self,
        children: &[DerivedProperties],
        required: &ColumnSet,
    ) -> bool {
        children
            .last()
            .map(|c| c.provides_columns(required))
            .unwrap_or(false)
    }

    fn derive_output_columns(&self, children: &[DerivedProperties]) -> Vec<Column> {
        last_child("ParallelSequence", children).output_columns.clone()
    }

    fn derive_order(&self, children: &[DerivedProperties]) -> OrderSpec {
        last_child("ParallelSequence", children).order.clone()
    }

    fn derive_distribution(&self, children: &[DerivedProperties]) -> DistributionRef {
        last_child("ParallelSequence", children).distribution.clone()
    }

    /// Rewinding would re-run the side effects of earlier children, so the output is never
    /// rewindable. Any child's motion hazard is reported.
    fn derive_rewindability(&self, children: &[DerivedProperties]) -> RewindabilitySpec {
        let hazard = if children.iter().any(|c| c.rewindability.has_motion_hazard()) {
            MotionHazard::Motion
        } else {
            MotionHazard::NoMotion
        };
        RewindabilitySpec::new(RewindabilityKind::None, hazard)
    }

    fn derive_partition_propagation(
        &self,
        children: &[DerivedProperties],
    ) -> PartitionPropagationSpec {
        children
            .iter()
            .fold(PartitionPropagationSpec::empty(), |spec, c| {
                spec.combine(&c.partition_propagation)
            })
    }

    fn derive_cte_map(&self, children: &[DerivedProperties]) -> CteMap {
        children
            .iter()
            .fold(CteMap::empty(), |map, c| map.combine(&c.cte_map))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion_common::Column;

    use crate::operator::{ChildRequest, ParallelSequence, PhysicalOperatorTrait};
    use crate::properties::{
        ColumnSet, CteId, CteMap, CteRequirement, CteRole, DerivedProperties, DistributionSpec,
        EnforcingType, MotionHazard, OrderSpec, Ordering, PropertyRequest, RequiredProperties,
        RewindabilityKind, RewindabilitySpec, SegmentKind,
    };

    fn child(name: &str, distribution: DistributionSpec) -> DerivedProperties {
        DerivedProperties::new(
            vec![Column::from_qualified_name(format!("{}.a", name))],
            Arc::new(distribution),
        )
        .with_order(OrderSpec::new(vec![Ordering::asc(
            Column::from_qualified_name(format!("{}.a", name)),
        )]))
    }

    fn children(n: usize) -> Vec<DerivedProperties> {
        (0..n)
            .map(|i| {
                let distribution = if i % 2 == 0 {
                    DistributionSpec::singleton(SegmentKind::Master)
                } else {
                    DistributionSpec::worker_random(i as u32, None)
                };
                child(&format!("t{}", i), distribution)
            })
            .collect()
    }

    #[test]
    fn test_derive_from_last_child() {
        let sequence = ParallelSequence::new(2, false);
        for n in 1..5 {
            let children = children(n);
            let derived = sequence.derive_properties(&children);

            assert_eq!(children[n - 1].distribution, derived.distribution);
            assert_eq!(children[n - 1].order, derived.order);
            assert_eq!(children[n - 1].output_columns, derived.output_columns);
        }
    }

    #[test]
    fn test_derive_rewindability() {
        let sequence = ParallelSequence::new(2, false);
        let mut children = children(3);
        children[2] = children[2].clone().with_rewindability(RewindabilitySpec::new(
            RewindabilityKind::Rewindable,
            MotionHazard::NoMotion,
        ));

        let derived = sequence.derive_rewindability(&children);
        assert_eq!(RewindabilityKind::None, derived.kind());
        assert!(!derived.has_motion_hazard());

        children[0] = children[0].clone().with_rewindability(RewindabilitySpec::new(
            RewindabilityKind::None,
            MotionHazard::Motion,
        ));
        let derived = sequence.derive_rewindability(&children);
        assert_eq!(RewindabilityKind::None, derived.kind());
        assert!(derived.has_motion_hazard());
    }

    #[test]
    fn test_required_properties() {
        let sequence = ParallelSequence::new(3, false);
        assert_eq!(2, sequence.request_counts().total());

        let requested_column = Column::from_qualified_name("t1.a");
        let required = RequiredProperties::default()
            .with_columns(vec![requested_column.clone()])
            .with_order(OrderSpec::new(vec![Ordering::asc(requested_column.clone())]))
            .with_rewindability(RewindabilitySpec::new(
                RewindabilityKind::Rewindable,
                MotionHazard::Motion,
            ));

        let earlier = children(1);
        for request_number in 0..2 {
            let first = sequence.required_properties(2, 0, &[], &required, request_number);
            assert!(first.columns.is_empty());
            assert!(first.order.is_empty());
            assert_eq!(
                &DistributionSpec::worker_random(3, None),
                first.distribution.as_ref()
            );
            assert_eq!(
                RewindabilitySpec::new(RewindabilityKind::None, MotionHazard::Motion),
                first.rewindability
            );

            let last = sequence.required_properties(2, 1, &earlier, &required, request_number);
            let expected_columns: ColumnSet = vec![requested_column.clone()].into_iter().collect();
            assert_eq!(expected_columns, last.columns);
            assert!(last.order.is_empty());
            assert_eq!(first.distribution, last.distribution);
        }
    }

    #[test]
    fn test_required_cte() {
        let sequence = ParallelSequence::new(2, false);
        let required = CteRequirement::empty().with_entry(CteId(7), CteRole::Consumer, true);

        let first = ChildRequest::new(2, 0, &[], PropertyRequest::default());
        let optional = sequence.required_cte(&first, &required);
        assert!(!optional.get(CteId(7)).unwrap().required);

        let earlier = vec![children(1)[0]
            .clone()
            .with_cte_map(CteMap::single(CteId(1), CteRole::Producer))];
        let last = ChildRequest::new(2, 1, &earlier, PropertyRequest::default());
        let unresolved = sequence.required_cte(&last, &required);
        assert_eq!(CteRole::Consumer, unresolved.get(CteId(1)).unwrap().role);
        assert!(unresolved.get(CteId(7)).unwrap().required);
    }

    #[test]
    fn test_enforcing() {
        let sequence = ParallelSequence::new(2, false);
        let derived = sequence.derive_properties(&children(2));

        let ordered = OrderSpec::new(vec![Ordering::asc(Column::from_qualified_name("t1.a"))]);
        assert_eq!(
            EnforcingType::Unnecessary,
            sequence.order_enforcing(&derived, &ordered)
        );
        let other = OrderSpec::new(vec![Ordering::asc(Column::from_qualified_name("t0.a"))]);
        assert_eq!(
            EnforcingType::Required,
            sequence.order_enforcing(&derived, &other)
        );

        let rewindable =
            RewindabilitySpec::new(RewindabilityKind::Rewindable, MotionHazard::NoMotion);
        assert_eq!(
            EnforcingType::Required,
            sequence.rewindability_enforcing(&derived, &rewindable)
        );
        assert_eq!(
            EnforcingType::Unnecessary,
            sequence.rewindability_enforcing(&derived, &RewindabilitySpec::default())
        );

        assert_eq!(
            EnforcingType::Unnecessary,
            sequence.distribution_enforcing(
                &derived,
                &Arc::new(DistributionSpec::worker_random(1, None))
            )
        );
    }

    #[test]
    fn test_provides_required_columns() {
        let sequence = ParallelSequence::new(2, false);
        let children = children(2);
        let last: ColumnSet = vec![Column::from_qualified_name("t1.a")].into_iter().collect();
        let first: ColumnSet = vec![Column::from_qualified_name("t0.a")].into_iter().collect();

        assert!(sequence.provides_required_columns(&children, &last));
        assert!(!sequence.provides_required_columns(&children, &first));
    }
}
