use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema};
use datafusion_common::Column;
use maplit::hashset;
use serde::Deserialize;

use mpp_optimizer::catalog::{MemoryCatalog, RelDistribution, RelationDescriptor, StorageType};
use mpp_optimizer::config::{OptimizerConfig, QueryContext};
use mpp_optimizer::memo::Memo;
use mpp_optimizer::operator::PhysicalOperator;
use mpp_optimizer::optimizer::{OptExpr, Optimizer, OptimizerContext};
use mpp_optimizer::plan::{LogicalPlanBuilder, Plan};
use mpp_optimizer::properties::{CteId, DistributionSpec, PhysicalProp};
use mpp_optimizer::rules::{parallel_rules, Get2ParallelTableScanRule, Rule, RulePromise};

const TABLE_SCAN_SCENARIOS: &str = include_str!("scenarios/table_scan.yaml");

#[derive(Debug, Deserialize)]
struct TableSpec {
    distribution: RelDistribution,
    storage: StorageType,
    #[serde(default)]
    parallel_workers: Option<u32>,
    #[serde(default)]
    seg_file_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    table: TableSpec,
    config: OptimizerConfig,
    expected_workers: Option<u32>,
}

fn relation(name: &str, table: &TableSpec) -> RelationDescriptor {
    let schema = Schema::new(vec![
        Field::new("a", DataType::Int32, false),
        Field::new("b", DataType::Utf8, true),
    ]);
    RelationDescriptor::new(name, Arc::new(schema))
        .with_distribution(table.distribution.clone())
        .with_storage(table.storage, table.seg_file_count)
        .with_parallel_workers(table.parallel_workers)
}

fn optimize(
    plan: Plan,
    relations: Vec<RelationDescriptor>,
    config: OptimizerConfig,
    query: QueryContext,
) -> Memo {
    let catalog = MemoryCatalog::new();
    for relation in relations {
        catalog.register_relation(relation).unwrap();
    }
    let context = OptimizerContext::new(Arc::new(catalog), config, query);
    let mut memo = Memo::new(plan, context).unwrap();
    memo.apply_rules(&parallel_rules()).unwrap();
    memo
}

fn physical_operators(memo: &Memo) -> Vec<PhysicalOperator> {
    memo.group_handles()
        .into_iter()
        .flat_map(|group_id| memo.physical_expr_ids(group_id))
        .filter_map(|expr_id| memo.expr_at(expr_id).operator().as_physical().cloned())
        .collect()
}

#[test]
fn test_table_scan_scenarios() {
    let scenarios: Vec<Scenario> = serde_yaml::from_str(TABLE_SCAN_SCENARIOS).unwrap();
    assert!(!scenarios.is_empty());

    for scenario in scenarios {
        let plan = LogicalPlanBuilder::new().scan("t").build();
        let memo = optimize(
            plan,
            vec![relation("t", &scenario.table)],
            scenario.config.clone(),
            QueryContext::default(),
        );

        let expected_promise = if scenario.expected_workers.is_some() {
            RulePromise::High
        } else {
            RulePromise::None
        };
        assert_eq!(
            expected_promise,
            Get2ParallelTableScanRule::new().promise(memo.root_expr_id(), &memo),
            "{}",
            scenario.name
        );

        let scans = physical_operators(&memo)
            .into_iter()
            .filter_map(|op| op.into_physical_parallel_table_scan().ok())
            .collect::<Vec<_>>();
        match scenario.expected_workers {
            Some(workers) => {
                assert_eq!(1, scans.len(), "{}", scenario.name);
                assert_eq!(workers, scans[0].workers(), "{}", scenario.name);
                let delivered = scans[0].worker_distribution();
                assert!(
                    delivered.satisfies(&DistributionSpec::worker_random(workers, None)),
                    "{}",
                    scenario.name
                );
                assert!(
                    delivered.satisfies(&DistributionSpec::random()),
                    "{}",
                    scenario.name
                );
            }
            None => assert!(scans.is_empty(), "{}", scenario.name),
        }
    }
}

#[test]
fn test_sequence_with_cte_goes_parallel_without_parallel_scans() {
    let table = TableSpec {
        distribution: RelDistribution::Random,
        storage: StorageType::Heap,
        parallel_workers: None,
        seg_file_count: None,
    };
    let mut builder = LogicalPlanBuilder::new();
    let producer = builder
        .scan("t")
        .cte_producer(
            CteId(1),
            vec![
                Column::from_qualified_name("t.a"),
                Column::from_qualified_name("t.b"),
            ],
        )
        .build()
        .root();
    let plan = builder
        .cte_consumer(
            CteId(1),
            vec![
                Column::from_qualified_name("c.a"),
                Column::from_qualified_name("c.b"),
            ],
        )
        .sequence(vec![producer])
        .build();

    let query = QueryContext {
        unused_columns: hashset! { Column::from_qualified_name("c.b") },
        ..Default::default()
    };
    let memo = optimize(
        plan,
        vec![relation("t", &table)],
        OptimizerConfig::parallel().with_max_parallel_workers_per_gather(4),
        query,
    );

    let operators = physical_operators(&memo);
    let names = operators
        .iter()
        .map(|op| op.as_ref().to_string())
        .collect::<Vec<_>>();
    assert!(names.contains(&"PhysicalParallelSequence".to_string()));
    assert!(names.contains(&"PhysicalParallelCTEProducer".to_string()));
    assert!(names.contains(&"PhysicalParallelCTEConsumer".to_string()));
    assert!(!names.contains(&"PhysicalParallelTableScan".to_string()));
}
