//! Motions move rows between segments or workers. They are the enforcers of distribution.

use std::sync::Arc;

use datafusion_common::Column;

use crate::operator::{last_child, ChildRequest, PhysicalOperatorTrait};
use crate::properties::{
    ColumnSet, CteMap, CteRequirement, DerivedProperties, DistributionRef, DistributionSpec,
    MotionHazard, OrderSpec, PartitionPropagationSpec, RewindabilityKind, RewindabilitySpec,
    SegmentKind,
};

/// Property contract shared by every motion: children are asked for anything, the motion
/// provides its own distribution and breaks ordering and rewindability.
macro_rules! impl_motion {
    ($motion:ident, $name:literal) => {
        impl PhysicalOperatorTrait for $motion {
            fn required_columns(&self, _child: &ChildRequest, required: &ColumnSet) -> ColumnSet {
                required.clone()
            }

            fn required_order(&self, _child: &ChildRequest, _required: &OrderSpec) -> OrderSpec {
                OrderSpec::empty()
            }

            fn required_distribution(
                &self,
                _child: &ChildRequest,
                _required: &DistributionRef,
            ) -> DistributionRef {
                Arc::new(DistributionSpec::any())
            }

            fn required_rewindability(
                &self,
                _child: &ChildRequest,
                _required: &RewindabilitySpec,
            ) -> RewindabilitySpec {
                RewindabilitySpec::default()
            }

            fn required_partition_propagation(
                &self,
                _child: &ChildRequest,
                required: &PartitionPropagationSpec,
            ) -> PartitionPropagationSpec {
                required.clone()
            }

            fn required_cte(
                &self,
                _child: &ChildRequest,
                required: &CteRequirement,
            ) -> CteRequirement {
                required.clone()
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
                last_child($name, children).output_columns.clone()
            }

            fn derive_order(&self, _children: &[DerivedProperties]) -> OrderSpec {
                OrderSpec::empty()
            }

            fn derive_distribution(&self, _children: &[DerivedProperties]) -> DistributionRef {
                self.distribution()
            }

            fn derive_rewindability(&self, _children: &[DerivedProperties]) -> RewindabilitySpec {
                RewindabilitySpec::new(RewindabilityKind::None, MotionHazard::Motion)
            }

            fn derive_partition_propagation(
                &self,
                children: &[DerivedProperties],
            ) -> PartitionPropagationSpec {
                last_child($name, children).partition_propagation.clone()
            }

            fn derive_cte_map(&self, children: &[DerivedProperties]) -> CteMap {
                last_child($name, children).cte_map.clone()
            }
        }
    };
}

/// Redistributes rows by hash of columns.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct MotionHashDistribute {
    distribution: DistributionRef,
}

impl MotionHashDistribute {
    pub fn new(distribution: DistributionRef) -> Self {
        Self { distribution }
    }

    pub fn distribution(&self) -> DistributionRef {
        self.distribution.clone()
    }
}

/// Redistributes rows randomly, across segments or workers depending on its spec.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct MotionRandom {
    distribution: DistributionRef,
}

impl MotionRandom {
    pub fn new(distribution: DistributionRef) -> Self {
        Self { distribution }
    }

    pub fn distribution(&self) -> DistributionRef {
        self.distribution.clone()
    }
}

/// Collects all rows on a single node.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct MotionGather {
    segment: SegmentKind,
}

impl MotionGather {
    pub fn new(segment: SegmentKind) -> Self {
        Self { segment }
    }

    pub fn distribution(&self) -> DistributionRef {
        Arc::new(DistributionSpec::singleton(self.segment))
    }
}

/// Sends a full copy of its input to every segment.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct MotionBroadcast {}

impl MotionBroadcast {
    pub fn new() -> Self {
        Self {}
    }

    pub fn distribution(&self) -> DistributionRef {
        Arc::new(DistributionSpec::replicated())
    }
}

impl_motion!(MotionHashDistribute, "MotionHashDistribute");
impl_motion!(MotionRandom, "MotionRandom");
impl_motion!(MotionGather, "MotionGather");
impl_motion!(MotionBroadcast, "MotionBroadcast");

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion_common::Column;

    use crate::operator::{MotionGather, MotionRandom, PhysicalOperatorTrait};
    use crate::properties::{
        DerivedProperties, DistributionSpec, EnforcingType, PropertyRequest, RequiredProperties,
        RewindabilityKind, RewindabilitySpec, SegmentKind,
    };

    fn child() -> DerivedProperties {
        DerivedProperties::new(
            vec![Column::from_qualified_name("t.a")],
            Arc::new(DistributionSpec::random()),
        )
    }

    #[test]
    fn test_motion_derives_own_distribution() {
        let spec = Arc::new(DistributionSpec::worker_random(4, None));
        let motion = MotionRandom::new(spec.clone());

        let derived = motion.derive_properties(&[child()]);
        assert!(Arc::ptr_eq(&spec, &derived.distribution));
        assert_eq!(RewindabilityKind::None, derived.rewindability.kind());
        assert!(derived.rewindability.has_motion_hazard());
        assert_eq!(child().output_columns, derived.output_columns);
    }

    #[test]
    fn test_motion_requires_any() {
        let motion = MotionGather::new(SegmentKind::Master);
        let required = RequiredProperties::default()
            .with_distribution(Arc::new(DistributionSpec::singleton(SegmentKind::Master)));

        let child_required = motion.required_properties(1, 0, &[], &required, 0);
        assert_eq!(&DistributionSpec::any(), child_required.distribution.as_ref());
        assert_eq!(RewindabilitySpec::default(), child_required.rewindability);
        assert_eq!(PropertyRequest::default(), motion.lookup_request(0));

        let derived = motion.derive_properties(&[child()]);
        assert_eq!(
            EnforcingType::Unnecessary,
            motion.distribution_enforcing(&derived, &required.distribution)
        );
    }
}
