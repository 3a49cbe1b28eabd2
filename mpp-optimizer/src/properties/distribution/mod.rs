//! Data distribution across segments and workers.
//!
//! A [`DistributionSpec`] describes either how an operator's output rows are spread (derived) or
//! how a parent needs them spread (required). Specs are immutable once built and shared between
//! plan alternatives through [`DistributionRef`].

mod worker_random;
pub use worker_random::*;

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use datafusion_common::Column;
use itertools::Itertools;
use log::trace;
use strum_macros::AsRefStr;

use crate::operator::Operator::Physical;
use crate::operator::PhysicalOperator::{
    PhysicalMotionBroadcast, PhysicalMotionGather, PhysicalMotionHashDistribute,
    PhysicalMotionRandom,
};
use crate::operator::{MotionBroadcast, MotionGather, MotionHashDistribute, MotionRandom};
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::properties::PhysicalProp;
use crate::rules::OptExpression;

pub type DistributionRef = Arc<DistributionSpec>;

/// Where a singleton distribution lives.
#[derive(Hash, Debug, Clone, Copy, Eq, PartialEq)]
pub enum SegmentKind {
    /// Coordinator node.
    Master,
    /// Any single segment.
    Segment,
}

#[derive(Hash, Debug, Clone, Eq, PartialEq, AsRefStr)]
pub enum DistributionKind {
    /// All rows live on one node.
    Singleton(SegmentKind),
    /// Every segment has a full copy.
    Replicated,
    /// Rows are spread across segments without any rule.
    Random,
    /// Rows are spread across segments by hash values of columns.
    Hashed(Vec<Column>),
    /// Spread across more than one segment, in any way.
    NonSingleton { allow_replicated: bool },
    /// Anything but a full copy on every segment.
    NonReplicated,
    Any,
    /// Rows are spread across intra-node workers on top of a segment level distribution.
    WorkerRandom(WorkerRandomSpec),
}

#[derive(Hash, Debug, Clone, Eq, PartialEq)]
pub struct DistributionSpec {
    kind: DistributionKind,
    /// Redistributing may add or lose duplicates in a way that corrupts a DML statement.
    duplicate_sensitive: bool,
}

impl DistributionSpec {
    fn new(kind: DistributionKind) -> Self {
        Self {
            kind,
            duplicate_sensitive: false,
        }
    }

    pub fn singleton(segment: SegmentKind) -> Self {
        Self::new(DistributionKind::Singleton(segment))
    }

    pub fn replicated() -> Self {
        Self::new(DistributionKind::Replicated)
    }

    pub fn random() -> Self {
        Self::new(DistributionKind::Random)
    }

    pub fn hashed<I: IntoIterator<Item = Column>>(columns: I) -> Self {
        Self::new(DistributionKind::Hashed(columns.into_iter().collect()))
    }

    pub fn non_singleton(allow_replicated: bool) -> Self {
        Self::new(DistributionKind::NonSingleton { allow_replicated })
    }

    pub fn non_replicated() -> Self {
        Self::new(DistributionKind::NonReplicated)
    }

    pub fn any() -> Self {
        Self::new(DistributionKind::Any)
    }

    pub fn with_duplicate_sensitive(mut self, duplicate_sensitive: bool) -> Self {
        self.duplicate_sensitive = duplicate_sensitive;
        self
    }

    pub fn kind(&self) -> &DistributionKind {
        &self.kind
    }

    pub fn is_duplicate_sensitive(&self) -> bool {
        self.duplicate_sensitive
    }

    pub fn as_worker_random(&self) -> Option<&WorkerRandomSpec> {
        match &self.kind {
            DistributionKind::WorkerRandom(spec) => Some(spec),
            _ => None,
        }
    }

    pub fn is_worker_random(&self) -> bool {
        self.as_worker_random().is_some()
    }

    /// Structural equality.
    pub fn matches(&self, other: &Self) -> bool {
        self == other
    }

    /// Moving rows out of this distribution inside a DML statement may introduce duplicates.
    pub fn is_duplicate_hazard(&self, dml_query: bool) -> bool {
        dml_query
            && matches!(
                self.kind,
                DistributionKind::Replicated | DistributionKind::WorkerRandom(_)
            )
    }

    /// The duplicate sensitivity part of satisfaction: a sensitive requirement needs a
    /// sensitive provider.
    fn duplicate_compatible(&self, required: &Self) -> bool {
        self.duplicate_sensitive || !required.duplicate_sensitive
    }

    /// Appends enforcers that turn `child`'s output into `self`.
    ///
    /// `self` is the required distribution, `child_distribution` is what `child` derives. No
    /// enforcer is appended when the requirement can't be enforced, e.g. the motion kind is
    /// disabled, and callers must treat the requirement as unsatisfiable on this path.
    pub fn append_enforcers<O: Optimizer>(
        &self,
        ctx: &OptimizerContext,
        child_distribution: &DistributionSpec,
        child: OptExpression<O>,
        enforcers: &mut Vec<OptExpression<O>>,
    ) {
        match &self.kind {
            DistributionKind::WorkerRandom(worker_random) => worker_random.append_enforcers(
                self,
                ctx,
                child_distribution,
                child,
                enforcers,
            ),
            DistributionKind::Hashed(_) => {
                append_hash_motion(self, ctx, child_distribution, child, enforcers)
            }
            DistributionKind::Random => {
                if ctx.config.disable_motion_random {
                    trace!("Random motion disabled, can't enforce {}", self);
                    return;
                }
                let hazard = child_distribution.is_duplicate_hazard(ctx.query.dml_query);
                let spec = self
                    .clone()
                    .with_duplicate_sensitive(self.duplicate_sensitive || hazard);
                trace!("Enforcing {} with random motion", spec);
                enforcers.push(OptExpression::with_operator(
                    Physical(PhysicalMotionRandom(MotionRandom::new(Arc::new(spec)))),
                    vec![child],
                ));
            }
            DistributionKind::Singleton(segment) => {
                trace!("Enforcing {} with gather motion", self);
                enforcers.push(OptExpression::with_operator(
                    Physical(PhysicalMotionGather(MotionGather::new(*segment))),
                    vec![child],
                ));
            }
            DistributionKind::Replicated => {
                trace!("Enforcing {} with broadcast motion", self);
                enforcers.push(OptExpression::with_operator(
                    Physical(PhysicalMotionBroadcast(MotionBroadcast::new())),
                    vec![child],
                ));
            }
            DistributionKind::NonSingleton { .. }
            | DistributionKind::NonReplicated
            | DistributionKind::Any => {
                trace!("No enforcer for {}", self);
            }
        }
    }
}

/// Hash redistribution towards `required`, which must be a hashed spec.
fn append_hash_motion<O: Optimizer>(
    required: &DistributionSpec,
    ctx: &OptimizerContext,
    child_distribution: &DistributionSpec,
    child: OptExpression<O>,
    enforcers: &mut Vec<OptExpression<O>>,
) {
    if ctx.config.disable_motion_hash_distribute {
        trace!("Hash distribute motion disabled, can't enforce {}", required);
        return;
    }

    let hazard = child_distribution.is_duplicate_hazard(ctx.query.dml_query);
    let spec = required
        .clone()
        .with_duplicate_sensitive(required.duplicate_sensitive || hazard);
    trace!("Enforcing {} with hash distribute motion", spec);
    enforcers.push(OptExpression::with_operator(
        Physical(PhysicalMotionHashDistribute(MotionHashDistribute::new(
            Arc::new(spec),
        ))),
        vec![child],
    ));
}

impl PhysicalProp for DistributionSpec {
    fn satisfies(&self, required: &Self) -> bool {
        use DistributionKind::*;

        if self.matches(required) {
            return true;
        }

        if let WorkerRandom(worker_random) = &self.kind {
            return worker_random.satisfies(self, required);
        }

        match (&self.kind, &required.kind) {
            (_, Any) => true,
            (Random, Random) => self.duplicate_compatible(required),
            (Hashed(columns), Hashed(required_columns)) => {
                columns == required_columns && self.duplicate_compatible(required)
            }
            (Random | Hashed(_), NonSingleton { .. } | NonReplicated) => true,
            (Singleton(segment), Singleton(required_segment)) => segment == required_segment,
            (Singleton(_), NonReplicated) => true,
            (Replicated, Replicated) => true,
            (Replicated, NonSingleton { allow_replicated }) => *allow_replicated,
            (
                NonSingleton { allow_replicated },
                NonSingleton {
                    allow_replicated: required_allow_replicated,
                },
            ) => !*allow_replicated || *required_allow_replicated,
            (NonReplicated, NonReplicated) => true,
            _ => false,
        }
    }
}

impl Display for DistributionSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            DistributionKind::Singleton(segment) => write!(f, "Singleton({:?})", segment)?,
            DistributionKind::Hashed(columns) => write!(
                f,
                "Hashed[{}]",
                columns.iter().map(|c| c.flat_name()).join(", ")
            )?,
            DistributionKind::NonSingleton { allow_replicated } => write!(
                f,
                "NonSingleton(allow_replicated: {})",
                allow_replicated
            )?,
            DistributionKind::WorkerRandom(spec) => {
                write!(f, "WorkerRandom[workers:{}] base:{}", spec.workers(), spec.base())?
            }
            kind => write!(f, "{}", kind.as_ref())?,
        }

        if self.duplicate_sensitive {
            write!(f, " (duplicate sensitive)")?;
        }
        Ok(())
    }
}
