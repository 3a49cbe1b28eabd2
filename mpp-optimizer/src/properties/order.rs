use datafusion_common::Column;
use smallvec::SmallVec;

use crate::properties::PhysicalProp;

/// Ordering of one column.
#[derive(Hash, Debug, Clone, Eq, PartialEq)]
pub struct Ordering {
    column: Column,
    /// Ascending or descending.
    asc: bool,
    /// Should null be treated first.
    nulls_first: bool,
}

impl Ordering {
    pub fn new(column: Column, asc: bool, nulls_first: bool) -> Self {
        Self {
            column,
            asc,
            nulls_first,
        }
    }

    pub fn asc(column: Column) -> Self {
        Self::new(column, true, false)
    }

    pub fn column(&self) -> &Column {
        &self.column
    }
}

/// Ordering property specification.
#[derive(Hash, Debug, Clone, Eq, PartialEq, Default)]
pub struct OrderSpec {
    orders: SmallVec<[Ordering; 2]>,
}

impl OrderSpec {
    pub fn new<I: IntoIterator<Item = Ordering>>(orders: I) -> Self {
        Self {
            orders: orders.into_iter().collect(),
        }
    }

    /// No ordering required or provided.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn orders(&self) -> &[Ordering] {
        &self.orders
    }
}

impl PhysicalProp for OrderSpec {
    /// A sort on `(a, b)` also provides `(a)`.
    fn satisfies(&self, required: &Self) -> bool {
        required.orders.len() <= self.orders.len()
            && self
                .orders
                .iter()
                .zip(required.orders.iter())
                .all(|(provided, required)| provided == required)
    }
}

#[cfg(test)]
mod tests {
    use datafusion_common::Column;

    use crate::properties::{OrderSpec, Ordering, PhysicalProp};

    fn asc(name: &str) -> Ordering {
        Ordering::asc(Column::from_qualified_name(name))
    }

    #[test]
    fn test_prefix_satisfies() {
        let provided = OrderSpec::new(vec![asc("t.a"), asc("t.b")]);

        assert!(provided.satisfies(&OrderSpec::empty()));
        assert!(provided.satisfies(&OrderSpec::new(vec![asc("t.a")])));
        assert!(provided.satisfies(&provided));
        assert!(!provided.satisfies(&OrderSpec::new(vec![asc("t.b")])));
        assert!(!OrderSpec::empty().satisfies(&provided));
    }

    #[test]
    fn test_direction_matters() {
        let desc = OrderSpec::new(vec![Ordering::new(
            Column::from_qualified_name("t.a"),
            false,
            true,
        )]);
        assert!(!desc.satisfies(&OrderSpec::new(vec![asc("t.a")])));
    }
}
