use std::fmt::Debug;

use enum_as_inner::EnumAsInner;
use enum_dispatch::enum_dispatch;
use strum_macros::AsRefStr;

use crate::operator::{
    MotionBroadcast, MotionGather, MotionHashDistribute, MotionRandom, ParallelAppendTableScan,
    ParallelCTEConsumer, ParallelCTEProducer, ParallelSequence, ParallelTableScan,
};
use crate::optimizer::OptimizationContext;
use crate::properties::{
    ColumnSet, CteMap, CteRequirement, DerivedProperties, DistributionRef, EnforcingType,
    EnforcingTypes, OrderSpec, PartitionPropagationSpec, PropertyRequest, RequestCounts,
    RequiredProperties, RewindabilitySpec,
};
use datafusion_common::Column;

/// Physical relational operator.
#[derive(Clone, Debug, Hash, Eq, PartialEq, EnumAsInner, AsRefStr)]
#[enum_dispatch]
pub enum PhysicalOperator {
    PhysicalParallelTableScan(ParallelTableScan),
    PhysicalParallelAppendTableScan(ParallelAppendTableScan),
    PhysicalParallelSequence(ParallelSequence),
    PhysicalParallelCTEProducer(ParallelCTEProducer),
    PhysicalParallelCTEConsumer(ParallelCTEConsumer),
    PhysicalMotionHashDistribute(MotionHashDistribute),
    PhysicalMotionRandom(MotionRandom),
    PhysicalMotionGather(MotionGather),
    PhysicalMotionBroadcast(MotionBroadcast),
}

/// Everything an operator needs to compute the requirement of one child.
#[derive(Clone, Copy, Debug)]
pub struct ChildRequest<'a> {
    /// Number of relational children of the operator.
    pub arity: usize,
    pub child_index: usize,
    /// Derived properties of the children optimized before `child_index`.
    pub earlier_children: &'a [DerivedProperties],
    /// Decomposed request number.
    pub request: PropertyRequest,
}

impl<'a> ChildRequest<'a> {
    pub fn new(
        arity: usize,
        child_index: usize,
        earlier_children: &'a [DerivedProperties],
        request: PropertyRequest,
    ) -> Self {
        assert!(
            child_index < arity,
            "Child index {} out of range, arity: {}",
            child_index,
            arity
        );
        Self {
            arity,
            child_index,
            earlier_children,
            request,
        }
    }

    pub fn is_last_child(&self) -> bool {
        self.child_index + 1 == self.arity
    }
}

/// Property contract of physical operators.
///
/// The search engine drives it in four steps for every `(operator, required properties)`
/// pair:
///
/// 1. For every request number in `0..request_counts().total()` and every child, ask what to
/// require from the child (`required_*`), and optimize the child under that requirement.
/// 2. Derive the operator's own properties from the optimized children (`derive_*`).
/// 3. Ask whether the derived properties need an enforcer (`*_enforcing`).
/// 4. Optionally veto the whole context (`valid_context`).
///
/// Operators without relational children panic on every `required_*` call.
#[enum_dispatch(PhysicalOperator)]
pub trait PhysicalOperatorTrait: Debug + PartialEq {
    /// Number of requirement alternatives generated per property kind.
    fn request_counts(&self) -> RequestCounts {
        RequestCounts::default()
    }

    fn required_columns(&self, child: &ChildRequest, required: &ColumnSet) -> ColumnSet;

    fn required_order(&self, child: &ChildRequest, required: &OrderSpec) -> OrderSpec;

    fn required_distribution(
        &self,
        child: &ChildRequest,
        required: &DistributionRef,
    ) -> DistributionRef;

    fn required_rewindability(
        &self,
        child: &ChildRequest,
        required: &RewindabilitySpec,
    ) -> RewindabilitySpec;

    fn required_partition_propagation(
        &self,
        child: &ChildRequest,
        required: &PartitionPropagationSpec,
    ) -> PartitionPropagationSpec;

    fn required_cte(&self, child: &ChildRequest, required: &CteRequirement) -> CteRequirement;

    /// Whether the operator can provide `required` columns given its children.
    fn provides_required_columns(
        &self,
        children: &[DerivedProperties],
        required: &ColumnSet,
    ) -> bool;

    fn derive_output_columns(&self, children: &[DerivedProperties]) -> Vec<Column>;

    fn derive_order(&self, children: &[DerivedProperties]) -> OrderSpec;

    fn derive_distribution(&self, children: &[DerivedProperties]) -> DistributionRef;

    fn derive_rewindability(&self, children: &[DerivedProperties]) -> RewindabilitySpec;

    fn derive_partition_propagation(
        &self,
        children: &[DerivedProperties],
    ) -> PartitionPropagationSpec;

    fn derive_cte_map(&self, children: &[DerivedProperties]) -> CteMap;

    fn order_enforcing(&self, derived: &DerivedProperties, required: &OrderSpec) -> EnforcingType {
        EnforcingType::of(&derived.order, required)
    }

    fn distribution_enforcing(
        &self,
        derived: &DerivedProperties,
        required: &DistributionRef,
    ) -> EnforcingType {
        EnforcingType::of(derived.distribution.as_ref(), required.as_ref())
    }

    fn rewindability_enforcing(
        &self,
        derived: &DerivedProperties,
        required: &RewindabilitySpec,
    ) -> EnforcingType {
        EnforcingType::of(&derived.rewindability, required)
    }

    fn partition_propagation_enforcing(
        &self,
        derived: &DerivedProperties,
        required: &PartitionPropagationSpec,
    ) -> EnforcingType {
        EnforcingType::of(&derived.partition_propagation, required)
    }

    /// Rejects contexts no enforcer can fix.
    fn valid_context(&self, _ctx: &OptimizationContext) -> bool {
        true
    }

    fn lookup_request(&self, request_number: usize) -> PropertyRequest {
        self.request_counts().lookup(request_number)
    }

    /// Computes the complete requirement of child `child_index` for `request_number`.
    fn required_properties(
        &self,
        arity: usize,
        child_index: usize,
        earlier_children: &[DerivedProperties],
        required: &RequiredProperties,
        request_number: usize,
    ) -> RequiredProperties {
        let child = ChildRequest::new(
            arity,
            child_index,
            earlier_children,
            self.lookup_request(request_number),
        );

        RequiredProperties {
            columns: self.required_columns(&child, &required.columns),
            order: self.required_order(&child, &required.order),
            distribution: self.required_distribution(&child, &required.distribution),
            rewindability: self.required_rewindability(&child, &required.rewindability),
            partition_propagation: self
                .required_partition_propagation(&child, &required.partition_propagation),
            cte: self.required_cte(&child, &required.cte),
        }
    }

    fn derive_properties(&self, children: &[DerivedProperties]) -> DerivedProperties {
        DerivedProperties {
            output_columns: self.derive_output_columns(children),
            order: self.derive_order(children),
            distribution: self.derive_distribution(children),
            rewindability: self.derive_rewindability(children),
            partition_propagation: self.derive_partition_propagation(children),
            cte_map: self.derive_cte_map(children),
        }
    }

    fn enforcing_types(
        &self,
        derived: &DerivedProperties,
        required: &RequiredProperties,
    ) -> EnforcingTypes {
        EnforcingTypes {
            order: self.order_enforcing(derived, &required.order),
            distribution: self.distribution_enforcing(derived, &required.distribution),
            rewindability: self.rewindability_enforcing(derived, &required.rewindability),
            partition_propagation: self
                .partition_propagation_enforcing(derived, &required.partition_propagation),
        }
    }
}

/// Aborts a relational child request made to an operator without children.
pub(crate) fn no_relational_child(operator: &str) -> ! {
    panic!("{} has no relational child", operator)
}

/// Last element of `children`, which must not be empty.
pub(crate) fn last_child<'a>(
    operator: &str,
    children: &'a [DerivedProperties],
) -> &'a DerivedProperties {
    children
        .last()
        .unwrap_or_else(|| panic!("{} requires at least one derived child", operator))
}
