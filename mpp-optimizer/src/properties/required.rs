use std::collections::HashSet;
use std::sync::Arc;

use datafusion_common::Column;

use crate::properties::{
    CteMap, CteRequirement, DistributionRef, DistributionSpec, EnforcingType, OrderSpec,
    PartitionPropagationSpec, PhysicalProp, RewindabilitySpec,
};

pub type ColumnSet = HashSet<Column>;

/// Properties a parent requires from a plan region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredProperties {
    pub columns: ColumnSet,
    pub order: OrderSpec,
    pub distribution: DistributionRef,
    pub rewindability: RewindabilitySpec,
    pub partition_propagation: PartitionPropagationSpec,
    pub cte: CteRequirement,
}

impl Default for RequiredProperties {
    fn default() -> Self {
        Self {
            columns: ColumnSet::new(),
            order: OrderSpec::empty(),
            distribution: Arc::new(DistributionSpec::any()),
            rewindability: RewindabilitySpec::default(),
            partition_propagation: PartitionPropagationSpec::empty(),
            cte: CteRequirement::empty(),
        }
    }
}

impl RequiredProperties {
    pub fn with_distribution(mut self, distribution: DistributionRef) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_rewindability(mut self, rewindability: RewindabilitySpec) -> Self {
        self.rewindability = rewindability;
        self
    }

    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order = order;
        self
    }

    pub fn with_columns<I: IntoIterator<Item = Column>>(mut self, columns: I) -> Self {
        self.columns = columns.into_iter().collect();
        self
    }
}

/// Properties an operator derives bottom-up from its optimized children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedProperties {
    pub output_columns: Vec<Column>,
    pub order: OrderSpec,
    pub distribution: DistributionRef,
    pub rewindability: RewindabilitySpec,
    pub partition_propagation: PartitionPropagationSpec,
    pub cte_map: CteMap,
}

impl DerivedProperties {
    pub fn new(output_columns: Vec<Column>, distribution: DistributionRef) -> Self {
        Self {
            output_columns,
            order: OrderSpec::empty(),
            distribution,
            rewindability: RewindabilitySpec::default(),
            partition_propagation: PartitionPropagationSpec::empty(),
            cte_map: CteMap::empty(),
        }
    }

    pub fn with_order(mut self, order: OrderSpec) -> Self {
        self.order = order;
        self
    }

    pub fn with_rewindability(mut self, rewindability: RewindabilitySpec) -> Self {
        self.rewindability = rewindability;
        self
    }

    pub fn with_cte_map(mut self, cte_map: CteMap) -> Self {
        self.cte_map = cte_map;
        self
    }

    pub fn with_partition_propagation(mut self, spec: PartitionPropagationSpec) -> Self {
        self.partition_propagation = spec;
        self
    }

    pub fn provides_columns(&self, required: &ColumnSet) -> bool {
        required.iter().all(|c| self.output_columns.contains(c))
    }
}

/// Enforcing decision for every property kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EnforcingTypes {
    pub order: EnforcingType,
    pub distribution: EnforcingType,
    pub rewindability: EnforcingType,
    pub partition_propagation: EnforcingType,
}

impl EnforcingTypes {
    /// Any property needs an enforcer.
    pub fn needs_enforcer(&self) -> bool {
        [
            self.order,
            self.distribution,
            self.rewindability,
            self.partition_propagation,
        ]
        .contains(&EnforcingType::Required)
    }
}

impl EnforcingType {
    /// `Unnecessary` iff `derived` satisfies `required`.
    pub fn of<P: PhysicalProp>(derived: &P, required: &P) -> Self {
        if derived.satisfies(required) {
            EnforcingType::Unnecessary
        } else {
            EnforcingType::Required
        }
    }
}
