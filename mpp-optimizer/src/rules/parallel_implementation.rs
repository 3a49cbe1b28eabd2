use anyhow::bail;
use log::{debug, info};

use crate::error::OptResult;
use crate::operator::LogicalOperator::{LogicalCTEConsumer, LogicalCTEProducer, LogicalSequence};
use crate::operator::Operator::{Logical, Physical};
use crate::operator::PhysicalOperator::{
    PhysicalParallelCTEConsumer, PhysicalParallelCTEProducer, PhysicalParallelSequence,
};
use crate::operator::{ParallelCTEConsumer, ParallelCTEProducer, ParallelSequence};
use crate::optimizer::{Optimizer, OptimizerContext};
use crate::rules::RuleId::{
    ImplementParallelCTEConsumer, ImplementParallelCTEProducer, ImplementParallelSequence,
};
use crate::rules::{OptExpression, Pattern, Rule, RuleId, RulePromise, RuleResult};

#[rustfmt::skip::macros(lazy_static)]
lazy_static! {
    static ref IMPLEMENT_PARALLEL_SEQUENCE_RULE_PATTERN: Pattern = {
        Pattern::new_leaf(|op| {
            matches!(op, Logical(LogicalSequence(_)))
        })
    };
    static ref IMPLEMENT_PARALLEL_CTE_CONSUMER_RULE_PATTERN: Pattern = {
        Pattern::new_leaf(|op| {
            matches!(op, Logical(LogicalCTEConsumer(_)))
        })
    };
    static ref IMPLEMENT_PARALLEL_CTE_PRODUCER_RULE_PATTERN: Pattern = {
        Pattern::new_leaf(|op| {
            matches!(op, Logical(LogicalCTEProducer(_)))
        })
    };
}

/// Sequence and CTE implementations only depend on the session being able to run parallel
/// plans.
fn parallel_mode_promise(rule: &str, ctx: &OptimizerContext) -> RulePromise {
    if !ctx.config.is_parallel_mode_ok() {
        debug!("{}: parallel mode is off", rule);
        return RulePromise::None;
    }
    if ctx.config.sequence_cte_workers == 0 {
        debug!("{}: no workers configured", rule);
        return RulePromise::None;
    }
    RulePromise::High
}

#[derive(Clone, Default)]
pub struct ImplementParallelSequenceRule {}

impl ImplementParallelSequenceRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for ImplementParallelSequenceRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        if !matches!(input.bound_operator(optimizer)?, Logical(LogicalSequence(_))) {
            bail!("Pattern mismatch");
        }

        let ctx = optimizer.context();
        let workers = ctx.config.sequence_cte_workers;
        info!(
            "Implementing sequence of {} inputs as parallel sequence with {} workers",
            input.inputs().len(),
            workers
        );
        result.add(input.with_same_inputs(Physical(PhysicalParallelSequence(
            ParallelSequence::new(workers, ctx.query.dml_query),
        ))));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &IMPLEMENT_PARALLEL_SEQUENCE_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        ImplementParallelSequence
    }

    fn promise<O: Optimizer>(&self, _expr_handle: O::ExprHandle, optimizer: &O) -> RulePromise {
        parallel_mode_promise("ImplementParallelSequenceRule", optimizer.context())
    }
}

/// Implements a CTE consumer, dropping columns the query never references.
#[derive(Clone, Default)]
pub struct ImplementParallelCTEConsumerRule {}

impl ImplementParallelCTEConsumerRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for ImplementParallelCTEConsumerRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let consumer = if let Logical(LogicalCTEConsumer(c)) = input.bound_operator(optimizer)? {
            c
        } else {
            bail!("Pattern mismatch")
        };

        let ctx = optimizer.context();
        let workers = ctx.config.sequence_cte_workers;
        let parallel_consumer = ParallelCTEConsumer::new(
            consumer.id(),
            consumer.columns(),
            consumer.mapping().clone(),
            workers,
            |column| ctx.query.is_column_used(column),
        );

        info!(
            "Implementing consumer of CTE {} as parallel CTE consumer with {} workers",
            consumer.id(),
            workers
        );
        result.add(OptExpression::from(Physical(PhysicalParallelCTEConsumer(
            parallel_consumer,
        ))));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &IMPLEMENT_PARALLEL_CTE_CONSUMER_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        ImplementParallelCTEConsumer
    }

    fn promise<O: Optimizer>(&self, _expr_handle: O::ExprHandle, optimizer: &O) -> RulePromise {
        parallel_mode_promise("ImplementParallelCTEConsumerRule", optimizer.context())
    }
}

/// Implements a CTE producer, pruning columns the query never references.
#[derive(Clone, Default)]
pub struct ImplementParallelCTEProducerRule {}

impl ImplementParallelCTEProducerRule {
    pub fn new() -> Self {
        Self {}
    }
}

impl Rule for ImplementParallelCTEProducerRule {
    fn apply<O: Optimizer>(
        &self,
        input: OptExpression<O>,
        optimizer: &O,
        result: &mut RuleResult<O>,
    ) -> OptResult<()> {
        let producer = if let Logical(LogicalCTEProducer(p)) = input.bound_operator(optimizer)? {
            p
        } else {
            bail!("Pattern mismatch")
        };

        let ctx = optimizer.context();
        let workers = ctx.config.sequence_cte_workers;
        let used_mask = producer
            .columns()
            .iter()
            .map(|column| ctx.query.is_column_used(column))
            .collect::<Vec<bool>>();
        let used_mask = if used_mask.iter().all(|used| *used) {
            None
        } else {
            Some(used_mask.as_slice())
        };

        info!(
            "Implementing producer of CTE {} as parallel CTE producer with {} workers",
            producer.id(),
            workers
        );
        result.add(input.with_same_inputs(Physical(PhysicalParallelCTEProducer(
            ParallelCTEProducer::new(producer.id(), producer.columns(), used_mask, workers),
        ))));
        Ok(())
    }

    fn pattern(&self) -> &Pattern {
        &IMPLEMENT_PARALLEL_CTE_PRODUCER_RULE_PATTERN
    }

    fn rule_id(&self) -> RuleId {
        ImplementParallelCTEProducer
    }

    fn promise<O: Optimizer>(&self, _expr_handle: O::ExprHandle, optimizer: &O) -> RulePromise {
        parallel_mode_promise("ImplementParallelCTEProducerRule", optimizer.context())
    }
}
