//! Common table expression properties.
//!
//! A [`CteMap`] is derived bottom-up and records which CTE producers and consumers appear in a
//! subtree and are not yet paired with each other. A [`CteRequirement`] is pushed top-down and
//! tells a child which producers/consumers it is expected to contain.

use std::collections::BTreeMap;

use derive_more::{Display, From};

/// Identifies a common table expression within a query.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Display, From)]
pub struct CteId(pub u32);

#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq)]
pub enum CteRole {
    Producer,
    Consumer,
}

impl CteRole {
    fn counterpart(self) -> Self {
        match self {
            CteRole::Producer => CteRole::Consumer,
            CteRole::Consumer => CteRole::Producer,
        }
    }
}

/// Unresolved CTE producers/consumers found in a subtree.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct CteMap {
    entries: BTreeMap<CteId, CteRole>,
}

impl CteMap {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(id: CteId, role: CteRole) -> Self {
        let mut map = Self::default();
        map.entries.insert(id, role);
        map
    }

    pub fn role(&self, id: CteId) -> Option<CteRole> {
        self.entries.get(&id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CteId, CteRole)> + '_ {
        self.entries.iter().map(|(id, role)| (*id, *role))
    }

    /// Merges two maps. A producer and a consumer of the same CTE resolve each other and
    /// disappear from the result.
    pub fn combine(&self, other: &Self) -> Self {
        let mut entries = BTreeMap::new();
        for (id, role) in self.iter() {
            if other.role(id) != Some(role.counterpart()) {
                entries.insert(id, role);
            }
        }
        for (id, role) in other.iter() {
            if self.role(id) != Some(role.counterpart()) {
                entries.insert(id, role);
            }
        }

        Self { entries }
    }

    /// Every mandatory entry of `required` must be present with the same role.
    pub fn satisfies(&self, required: &CteRequirement) -> bool {
        required
            .entries
            .iter()
            .filter(|(_, entry)| entry.required)
            .all(|(id, entry)| self.role(*id) == Some(entry.role))
    }
}

#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq)]
pub struct CteRequirementEntry {
    pub role: CteRole,
    /// `false` means the entry may, but need not, be found in the subtree.
    pub required: bool,
}

/// CTE producers/consumers a subtree is expected to contain.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct CteRequirement {
    entries: BTreeMap<CteId, CteRequirementEntry>,
}

impl CteRequirement {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: CteId, role: CteRole, required: bool) {
        self.entries.insert(id, CteRequirementEntry { role, required });
    }

    pub fn with_entry(mut self, id: CteId, role: CteRole, required: bool) -> Self {
        self.insert(id, role, required);
        self
    }

    pub fn get(&self, id: CteId) -> Option<&CteRequirementEntry> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Same entries, none of them mandatory.
    pub fn all_optional(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(id, entry)| {
                    (
                        *id,
                        CteRequirementEntry {
                            role: entry.role,
                            required: false,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Requirement for the last child of a sequence.
    ///
    /// Keeps the entries not already resolved by `earlier` (the combined CTE map of the
    /// preceding children). Every producer found earlier must be consumed by the last child.
    pub fn unresolved_sequence(&self, earlier: &CteMap) -> Self {
        let mut entries: BTreeMap<CteId, CteRequirementEntry> = self
            .entries
            .iter()
            .filter(|(id, entry)| earlier.role(**id) != Some(entry.role))
            .map(|(id, entry)| (*id, *entry))
            .collect();

        for (id, role) in earlier.iter() {
            if role == CteRole::Producer {
                entries.insert(
                    id,
                    CteRequirementEntry {
                        role: CteRole::Consumer,
                        required: true,
                    },
                );
            }
        }

        Self { entries }
    }

    /// Pushes a requirement through a CTE producer: the producer resolves consumers of its own
    /// id, so the child only has to provide the rest.
    pub fn without(&self, id: CteId) -> Self {
        let mut entries = self.entries.clone();
        entries.remove(&id);
        Self { entries }
    }
}
