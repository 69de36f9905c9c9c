pub mod dispatcher;
pub mod job;
pub mod queue;

pub use dispatcher::{Assignment, DispatchSnapshot, OrderDispatcher, RemovedWorker};
pub use job::{Job, JobId, JobState, Priority};
pub use queue::DispatchQueue;
