pub mod coordinator;
pub mod partition_worker;

pub use coordinator::{
    merge_partitions, partition_bounds, AggregationCoordinator, AggregationOutcome,
    CoordinatorState, DistributionStrategy, MalformedPolicy, RunSummary,
};
pub use partition_worker::{PartitionResult, PartitionStats, PartitionWorker};
