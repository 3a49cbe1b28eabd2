//! Optimizer configuration.
//!
//! Everything the parallel rules and enforcers consult lives in [`OptimizerConfig`] (session
//! wide switches) or [`QueryContext`] (facts about the query being optimized). Both are plain
//! immutable values carried by [`OptimizerContext`](crate::optimizer::OptimizerContext).

use std::collections::HashSet;

use datafusion_common::Column;
use serde::Deserialize;

/// Worker count used when neither the table nor the session asks for one.
pub const DEFAULT_PARALLEL_WORKERS: u32 = 2;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Parallel plans are enabled for this session.
    pub enable_parallel: bool,
    /// Parallel execution is safe in the current mode, e.g. not inside a parallel-restricted
    /// function or a cursor.
    pub parallel_safe: bool,
    /// Session default for the number of workers per node, `0` means unset.
    pub max_parallel_workers_per_gather: u32,
    /// Hash redistribute motions may not be generated.
    pub disable_motion_hash_distribute: bool,
    /// Random redistribute motions may not be generated.
    pub disable_motion_random: bool,
    /// Partitioned tables may be scanned by parallel append scans.
    pub enable_parallel_append_scan: bool,
    /// Worker count used by the parallel sequence and CTE implementation rules.
    pub sequence_cte_workers: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enable_parallel: false,
            parallel_safe: true,
            max_parallel_workers_per_gather: 0,
            disable_motion_hash_distribute: false,
            disable_motion_random: false,
            enable_parallel_append_scan: true,
            sequence_cte_workers: DEFAULT_PARALLEL_WORKERS,
        }
    }
}

impl OptimizerConfig {
    /// Config with parallel mode switched on and everything else left at defaults.
    pub fn parallel() -> Self {
        Self {
            enable_parallel: true,
            ..Default::default()
        }
    }

    pub fn with_max_parallel_workers_per_gather(mut self, workers: u32) -> Self {
        self.max_parallel_workers_per_gather = workers;
        self
    }

    pub fn with_motion_hash_distribute_disabled(mut self, disabled: bool) -> Self {
        self.disable_motion_hash_distribute = disabled;
        self
    }

    pub fn with_motion_random_disabled(mut self, disabled: bool) -> Self {
        self.disable_motion_random = disabled;
        self
    }

    pub fn is_parallel_mode_ok(&self) -> bool {
        self.enable_parallel && self.parallel_safe
    }

    /// Picks worker count for a scan.
    ///
    /// Priority: table level setting > session default > [`DEFAULT_PARALLEL_WORKERS`].
    pub fn scan_workers(&self, table_parallel_workers: Option<u32>) -> u32 {
        match table_parallel_workers {
            Some(workers) if workers > 0 => workers,
            _ if self.max_parallel_workers_per_gather > 0 => {
                self.max_parallel_workers_per_gather
            }
            _ => DEFAULT_PARALLEL_WORKERS,
        }
    }
}

/// Facts about the query currently being optimized.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryContext {
    /// The statement modifies data (insert/update/delete).
    pub dml_query: bool,
    /// Some table referenced by the query is replicated.
    pub has_replicated_tables: bool,
    /// Columns that no operator of the query references.
    pub unused_columns: HashSet<Column>,
}

impl QueryContext {
    pub fn dml() -> Self {
        Self {
            dml_query: true,
            ..Default::default()
        }
    }

    pub fn is_column_used(&self, column: &Column) -> bool {
        !self.unused_columns.contains(column)
    }
}
