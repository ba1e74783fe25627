use thiserror::Error;

use crate::processors::CoordinatorState;
use crate::readers::ParseError;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("{count} malformed line(s) in input, first: {first}")]
    MalformedInput { count: u64, first: ParseError },

    #[error("Partition worker {worker_id} panicked")]
    WorkerPanicked { worker_id: usize },

    #[error("Invalid coordinator transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: CoordinatorState,
        to: CoordinatorState,
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Interrupted twice, aborting without a report")]
    Interrupted,

    #[error("Async task error: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}
