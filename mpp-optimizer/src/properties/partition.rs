use std::collections::BTreeMap;

use derive_more::{Display, From};

use crate::properties::PhysicalProp;

/// Identifies a partitioned table scan within a query.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Display, From)]
pub struct ScanId(pub u32);

#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq)]
pub enum PartitionRole {
    /// Scans the selected partitions.
    Consumer,
    /// Computes which partitions a consumer should scan.
    Producer,
}

#[derive(Hash, Debug, Clone, Eq, PartialEq)]
pub struct PartitionPropagation {
    pub role: PartitionRole,
    pub table_name: String,
}

/// Partition propagation entries keyed by scan id.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct PartitionPropagationSpec {
    entries: BTreeMap<ScanId, PartitionPropagation>,
}

impl PartitionPropagationSpec {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn consumer<S: Into<String>>(scan_id: ScanId, table_name: S) -> Self {
        let mut spec = Self::default();
        spec.insert(scan_id, PartitionRole::Consumer, table_name);
        spec
    }

    pub fn insert<S: Into<String>>(&mut self, scan_id: ScanId, role: PartitionRole, table_name: S) {
        self.entries.insert(
            scan_id,
            PartitionPropagation {
                role,
                table_name: table_name.into(),
            },
        );
    }

    pub fn get(&self, scan_id: ScanId) -> Option<&PartitionPropagation> {
        self.entries.get(&scan_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of both specs, entries of `self` win on conflicting scan ids.
    pub fn combine(&self, other: &Self) -> Self {
        let mut entries = other.entries.clone();
        entries.extend(self.entries.iter().map(|(k, v)| (*k, v.clone())));
        Self { entries }
    }
}

impl PhysicalProp for PartitionPropagationSpec {
    fn satisfies(&self, required: &Self) -> bool {
        required.entries.iter().all(|(scan_id, required)| {
            self.entries
                .get(scan_id)
                .map(|provided| provided.role == required.role)
                .unwrap_or(false)
        })
    }
}
