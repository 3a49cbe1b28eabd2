//! Properties of relational operators.
//!
//! Currently we have two kinds of properties: [`LogicalProperty`] and physical properties.
//! Logical properties are shared by logically equivalent plans, such as output columns.
//! Physical properties are concerned with sorting, distribution, rewindability, partition
//! propagation and common table expressions. Each physical property kind is required top-down
//! and derived bottom-up, see [`RequiredProperties`] and [`DerivedProperties`].

mod distribution;
pub use distribution::*;
mod order;
pub use order::*;
mod logical;
pub use logical::*;
mod rewindability;
pub use rewindability::*;
mod partition;
pub use partition::*;
mod cte;
pub use cte::*;
mod required;
pub use required::*;
mod request;
pub use request::*;

use std::fmt::Debug;
use std::hash::Hash;

pub trait PhysicalProp: Debug + Hash {
    /// Tests whether `self` satisfies `required`.
    fn satisfies(&self, required: &Self) -> bool;
}

/// Whether an enforcer is needed on top of an operator for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnforcingType {
    Unnecessary,
    Required,
}
