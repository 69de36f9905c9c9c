use std::collections::VecDeque;

use crate::scheduler::job::{Job, JobId};

/// Pending orders, kept sorted by descending priority rank and FIFO within a
/// rank.
#[derive(Debug, Default)]
pub struct DispatchQueue {
    jobs: VecDeque<Job>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert before the first job with a strictly lower rank, or at the back.
    ///
    /// Rolled-back jobs go through here as well, so they queue behind every
    /// job of their own tier rather than jumping to the head.
    pub fn insert(&mut self, job: Job) {
        let rank = job.priority.rank();
        let position = self
            .jobs
            .iter()
            .position(|queued| queued.priority.rank() < rank)
            .unwrap_or(self.jobs.len());
        self.jobs.insert(position, job);
    }

    /// Pop the head of the queue.
    pub fn take_next(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// Pull a specific job out of the queue, wherever it sits.
    pub fn remove(&mut self, id: JobId) -> Option<Job> {
        let position = self.position(id)?;
        self.jobs.remove(position)
    }

    pub fn peek(&self) -> Option<&Job> {
        self.jobs.front()
    }

    pub fn get(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Zero-based queue position of a job
    pub fn position(&self, id: JobId) -> Option<usize> {
        self.jobs.iter().position(|j| j.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    /// Owned copy of the queue in dispatch order
    pub fn snapshot(&self) -> Vec<Job> {
        self.jobs.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
