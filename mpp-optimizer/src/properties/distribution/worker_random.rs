use std::sync::Arc;

use log::trace;

use crate::operator::MotionRandom;
use crate::operator::Operator::Physical;
use crate::operator::PhysicalOperator::PhysicalMotionRandom;
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::properties::{DistributionKind, DistributionRef, DistributionSpec, PhysicalProp};
use crate::rules::OptExpression;

/// Worker level random distribution.
///
/// Rows are randomly scattered across `workers` threads inside each segment, in addition to
/// the segment level scattering described by `base`.
#[derive(Hash, Debug, Clone, Eq, PartialEq)]
pub struct WorkerRandomSpec {
    workers: u32,
    base: DistributionRef,
}

impl WorkerRandomSpec {
    fn new(workers: u32, base: DistributionRef) -> Self {
        assert!(workers > 0, "Worker random distribution requires workers > 0");
        assert!(
            !base.is_worker_random(),
            "Base of worker random distribution must be segment level, got {}",
            base
        );
        Self { workers, base }
    }

    pub fn workers(&self) -> u32 {
        self.workers
    }

    pub fn base(&self) -> &DistributionRef {
        &self.base
    }

    /// `this` is the spec wrapping `self`, it carries the duplicate sensitive flag.
    pub(super) fn satisfies(&self, this: &DistributionSpec, required: &DistributionSpec) -> bool {
        match required.kind() {
            DistributionKind::WorkerRandom(required_worker) => {
                self.workers == required_worker.workers
                    && self.base.satisfies(&required_worker.base)
                    && this.duplicate_compatible(required)
            }
            DistributionKind::Random => {
                self.base.satisfies(required) && this.duplicate_compatible(required)
            }
            DistributionKind::Any
            | DistributionKind::NonSingleton { .. }
            | DistributionKind::NonReplicated => true,
            _ => false,
        }
    }

    /// Enforces `this`, the spec wrapping `self`, on top of `child` with a random motion
    /// that redistributes into `self.workers` workers over `self.base`.
    pub(super) fn append_enforcers<O: Optimizer>(
        &self,
        this: &DistributionSpec,
        ctx: &OptimizerContext,
        child_distribution: &DistributionSpec,
        child: OptExpression<O>,
        enforcers: &mut Vec<OptExpression<O>>,
    ) {
        debug_assert!(
            matches!(this.kind(), DistributionKind::WorkerRandom(spec) if spec == self),
            "{} doesn't wrap the enforcing worker random spec",
            this
        );
        if ctx.config.disable_motion_random {
            trace!("Random motion disabled, can't enforce {}", this);
            return;
        }

        let hazard = child_distribution.is_duplicate_hazard(ctx.query.dml_query);
        let duplicate_sensitive = this.is_duplicate_sensitive() || ctx.query.dml_query || hazard;
        let spec = DistributionSpec::worker_random(self.workers, Some(self.base.clone()))
            .with_duplicate_sensitive(duplicate_sensitive);
        trace!("Enforcing {} with random motion", spec);
        enforcers.push(OptExpression::with_operator(
            Physical(PhysicalMotionRandom(MotionRandom::new(Arc::new(spec)))),
            vec![child],
        ));
    }
}

impl DistributionSpec {
    /// Creates a worker random distribution over `base`, a plain segment level random
    /// distribution when `base` is `None`.
    ///
    /// # Panics
    ///
    /// When `workers` is zero or `base` is itself worker level.
    pub fn worker_random(workers: u32, base: Option<DistributionRef>) -> Self {
        let base = base.unwrap_or_else(|| Arc::new(DistributionSpec::random()));
        DistributionSpec::new(DistributionKind::WorkerRandom(WorkerRandomSpec::new(
            workers, base,
        )))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use datafusion_common::Column;

    use crate::config::{OptimizerConfig, QueryContext};
    use crate::memo::Memo;
    use crate::properties::{DistributionSpec, PhysicalProp, SegmentKind};
    use crate::rules::OptExpression;
    use crate::test_utils::{optimizer_context, physical_operator, scan_expr};

    fn worker_random(workers: u32) -> DistributionSpec {
        DistributionSpec::worker_random(workers, None)
    }

    #[test]
    fn test_default_base_is_random() {
        let spec = worker_random(3);
        let worker = spec.as_worker_random().unwrap();

        assert_eq!(3, worker.workers());
        assert_eq!(&DistributionSpec::random(), worker.base().as_ref());
        assert!(!spec.is_duplicate_sensitive());
    }

    #[test]
    #[should_panic(expected = "workers > 0")]
    fn test_zero_workers() {
        worker_random(0);
    }

    #[test]
    #[should_panic(expected = "must be segment level")]
    fn test_nested_worker_random() {
        DistributionSpec::worker_random(2, Some(Arc::new(worker_random(2))));
    }

    #[test]
    fn test_matches() {
        let w1 = worker_random(4);
        let w2 = DistributionSpec::worker_random(4, Some(Arc::new(DistributionSpec::random())));

        assert!(w1.matches(&w2));
        assert!(!w1.matches(&worker_random(2)));
        assert!(!w1.matches(&w2.clone().with_duplicate_sensitive(true)));
        assert!(!w1.matches(&DistributionSpec::random()));
    }

    #[test]
    fn test_satisfies_random_iff_base_does() {
        let random = DistributionSpec::random();
        let bases = vec![
            DistributionSpec::random(),
            DistributionSpec::hashed(vec![Column::from_qualified_name("t.a")]),
            DistributionSpec::singleton(SegmentKind::Segment),
            DistributionSpec::replicated(),
        ];

        for base in bases {
            let expected = base.satisfies(&random);
            let spec = DistributionSpec::worker_random(4, Some(Arc::new(base.clone())));
            assert_eq!(expected, spec.satisfies(&random), "base: {}", base);
        }
    }

    #[test]
    fn test_satisfies_worker_random() {
        let plain = worker_random(4);
        let sensitive = worker_random(4).with_duplicate_sensitive(true);

        assert!(sensitive.satisfies(&plain));
        assert!(!plain.satisfies(&sensitive));
        assert!(!plain.satisfies(&worker_random(2)));

        let hashed_base = DistributionSpec::worker_random(
            4,
            Some(Arc::new(DistributionSpec::hashed(vec![
                Column::from_qualified_name("t.a"),
            ]))),
        );
        assert!(!hashed_base.satisfies(&plain));
    }

    #[test]
    fn test_satisfies_loose_requirements() {
        let spec = worker_random(4);

        assert!(spec.satisfies(&DistributionSpec::any()));
        assert!(spec.satisfies(&DistributionSpec::non_singleton(false)));
        assert!(spec.satisfies(&DistributionSpec::non_replicated()));
        assert!(!spec.satisfies(&DistributionSpec::singleton(SegmentKind::Master)));
        assert!(!spec.satisfies(&DistributionSpec::replicated()));
        assert!(!spec.satisfies(&DistributionSpec::hashed(vec![
            Column::from_qualified_name("t.a")
        ])));
    }

    fn enforce(
        required: &DistributionSpec,
        config: OptimizerConfig,
        query: QueryContext,
    ) -> Vec<OptExpression<Memo>> {
        let ctx = optimizer_context(config, query);
        let mut enforcers = vec![];
        required.append_enforcers::<Memo>(&ctx, &worker_random(4), scan_expr(), &mut enforcers);
        enforcers
    }

    #[test]
    fn test_random_enforcer_satisfies_requirement() {
        for required in [worker_random(8), worker_random(4), worker_random(2)] {
            let enforcers =
                enforce(&required, OptimizerConfig::parallel(), QueryContext::default());
            assert_eq!(1, enforcers.len());

            let motion = physical_operator(&enforcers[0])
                .as_physical_motion_random()
                .unwrap();
            assert!(
                motion.distribution().satisfies(&required),
                "{} doesn't satisfy {}",
                motion.distribution(),
                required
            );
            assert_eq!(&required, motion.distribution().as_ref());

            let disabled = OptimizerConfig::parallel().with_motion_random_disabled(true);
            assert!(enforce(&required, disabled, QueryContext::default()).is_empty());
        }
    }

    #[test]
    fn test_random_enforcer_keeps_base() {
        let hashed = DistributionSpec::hashed(vec![Column::from_qualified_name("t.a")]);
        let required = DistributionSpec::worker_random(3, Some(Arc::new(hashed)));

        let enforcers = enforce(&required, OptimizerConfig::parallel(), QueryContext::default());
        let motion = physical_operator(&enforcers[0])
            .as_physical_motion_random()
            .unwrap();
        assert!(motion.distribution().matches(&required));
    }

    #[test]
    fn test_random_enforcer_in_dml() {
        let enforcers = enforce(
            &worker_random(8),
            OptimizerConfig::parallel(),
            QueryContext::dml(),
        );
        let motion = physical_operator(&enforcers[0])
            .as_physical_motion_random()
            .unwrap();
        assert!(motion.distribution().is_duplicate_sensitive());
        assert!(motion
            .distribution()
            .satisfies(&worker_random(8).with_duplicate_sensitive(true)));
    }

    #[test]
    fn test_hash_enforcer_over_worker_random_child_in_dml() {
        let hashed = DistributionSpec::hashed(vec![Column::from_qualified_name("t.a")]);

        let enforcers = enforce(&hashed, OptimizerConfig::parallel(), QueryContext::dml());
        let motion = physical_operator(&enforcers[0])
            .as_physical_motion_hash_distribute()
            .unwrap();
        assert!(motion.distribution().is_duplicate_sensitive());

        let enforcers = enforce(&hashed, OptimizerConfig::parallel(), QueryContext::default());
        let motion = physical_operator(&enforcers[0])
            .as_physical_motion_hash_distribute()
            .unwrap();
        assert!(!motion.distribution().is_duplicate_sensitive());
    }
}
