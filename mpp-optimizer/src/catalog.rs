//! Metadata access.
//!
//! The optimizer only needs a narrow view of relations: their columns, how they are laid out
//! across segments and on disk, and the parallel scan hints attached to them.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::{Arc, RwLock};

use arrow_schema::SchemaRef;
use datafusion_common::Column;
use serde::Deserialize;

use crate::error::CatalogError;
use crate::properties::{DistributionSpec, SegmentKind};

/// How a relation is distributed across segments.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelDistribution {
    /// Distributed by hash of the named columns.
    Hashed(Vec<String>),
    Random,
    /// A full copy on every segment.
    Replicated,
    /// Only stored on the coordinator.
    MasterOnly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Heap,
    AppendOnlyRows,
    AppendOnlyColumns,
}

impl StorageType {
    pub fn is_append_only(&self) -> bool {
        matches!(
            self,
            StorageType::AppendOnlyRows | StorageType::AppendOnlyColumns
        )
    }
}

/// Metadata of one relation.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationDescriptor {
    pub name: String,
    pub schema: SchemaRef,
    pub distribution: RelDistribution,
    pub storage: StorageType,
    /// Per table worker count, overrides the session default.
    pub parallel_workers: Option<u32>,
    /// Number of on-disk segment files of append only storage, `None` when unknown.
    pub seg_file_count: Option<u32>,
}

impl RelationDescriptor {
    pub fn new<S: Into<String>>(name: S, schema: SchemaRef) -> Self {
        Self {
            name: name.into(),
            schema,
            distribution: RelDistribution::Random,
            storage: StorageType::Heap,
            parallel_workers: None,
            seg_file_count: None,
        }
    }

    pub fn with_distribution(mut self, distribution: RelDistribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn with_storage(mut self, storage: StorageType, seg_file_count: Option<u32>) -> Self {
        self.storage = storage;
        self.seg_file_count = seg_file_count;
        self
    }

    pub fn with_parallel_workers(mut self, parallel_workers: Option<u32>) -> Self {
        self.parallel_workers = parallel_workers;
        self
    }

    /// Rows are spread over the segments rather than copied to each of them or kept on the
    /// coordinator.
    pub fn is_segment_distributed(&self) -> bool {
        matches!(
            self.distribution,
            RelDistribution::Hashed(_) | RelDistribution::Random
        )
    }

    /// Columns exposed by a scan of this relation under `alias`.
    pub fn output_columns(&self, alias: &str) -> Vec<Column> {
        self.schema
            .fields()
            .iter()
            .map(|f| Column::from_qualified_name(format!("{}.{}", alias, f.name())))
            .collect()
    }

    /// Segment level distribution of a scan of this relation under `alias`.
    pub fn node_distribution(&self, alias: &str) -> DistributionSpec {
        match &self.distribution {
            RelDistribution::Hashed(columns) => DistributionSpec::hashed(
                columns
                    .iter()
                    .map(|c| Column::from_qualified_name(format!("{}.{}", alias, c))),
            ),
            RelDistribution::Random => DistributionSpec::random(),
            RelDistribution::Replicated => DistributionSpec::replicated(),
            RelDistribution::MasterOnly => DistributionSpec::singleton(SegmentKind::Master),
        }
    }
}

pub trait Catalog: Debug + Send + Sync {
    fn relation(&self, name: &str) -> Option<Arc<RelationDescriptor>>;
}

/// Catalog backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    relations: RwLock<HashMap<String, Arc<RelationDescriptor>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_relation(
        &self,
        relation: RelationDescriptor,
    ) -> Result<Arc<RelationDescriptor>, CatalogError> {
        let mut relations = self
            .relations
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if relations.contains_key(&relation.name) {
            return Err(CatalogError::DuplicateRelation(relation.name));
        }

        let relation = Arc::new(relation);
        relations.insert(relation.name.clone(), relation.clone());
        Ok(relation)
    }
}

impl Catalog for MemoryCatalog {
    fn relation(&self, name: &str) -> Option<Arc<RelationDescriptor>> {
        self.relations
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
            .cloned()
    }
}
