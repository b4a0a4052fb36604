//! Error taxonomy for the aggregation pipeline, separated by blast radius:
//! configuration problems abort before I/O, worker errors kill one partition,
//! run errors mark the whole run failed.

use crate::event::UnknownKindError;

/// Invalid pipeline parameters, detected before any I/O happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("partition count must be at least 1")]
    ZeroPartitions,
    #[error("partition index {index} is out of range for {count} partitions")]
    IndexOutOfRange { count: u32, index: u32 },
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
    #[error("page size must be at least 1")]
    ZeroPageSize,
    #[error("worker cap must be at least 1")]
    ZeroWorkers,
}

/// Failure of a single partition worker. Chunks the worker committed before
/// failing stay durable; rerunning the job resumes from its checkpoint.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    UnknownKind(#[from] UnknownKindError),
    /// Feed reads and chunk commits share this failure mode. Not retried
    /// in-process; a rerun picks up from the last committed chunk.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Whole-run failure reported by the orchestrator. Any single worker failure
/// fails the run; durable progress in other partitions is never rolled back.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("partition {index} failed: {source}")]
    Worker {
        index: u32,
        #[source]
        source: WorkerError,
    },
    #[error("worker task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}
