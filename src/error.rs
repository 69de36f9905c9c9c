use thiserror::Error;

use crate::scheduler::JobId;
use crate::worker::WorkerId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Worker not found: {0}")]
    WorkerNotFound(WorkerId),

    #[error("Worker {requested} is not the last worker (last is {last})")]
    NotLastWorker { requested: WorkerId, last: WorkerId },

    #[error("Worker {0} is busy")]
    WorkerBusy(WorkerId),

    #[error("Worker {0} is idle")]
    WorkerIdle(WorkerId),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job {job} is not assigned to worker {worker}")]
    JobNotAssigned { job: JobId, worker: WorkerId },

    #[error("Invalid identifier: {0:?}")]
    InvalidId(String),

    #[error("Invalid priority: {0:?}")]
    InvalidPriority(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
