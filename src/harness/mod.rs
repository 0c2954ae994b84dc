//! Parallel execution: partitioning, forked workers, and log reconciliation

pub mod action;
pub mod aggregate;
pub mod partition;
pub mod record;
pub mod supervisor;
pub mod worker;

pub use action::{Action, WorkItem, NOT_AVAILABLE};
pub use aggregate::{AggregateReport, Reconciliation};
pub use partition::{partition, PartitionPlan, Shard};
pub use supervisor::{RetryPolicy, ShardOutcome, ShardReport, Supervisor, Verdict};
pub use worker::{WorkerDriver, WorkerExit};
