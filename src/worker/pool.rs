use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::error::{DispatchError, Result};
use crate::scheduler::JobId;

/// Bot identifier. Sequence numbers start at 1 and are never handed out twice
/// by the same pool, so a removed bot's id cannot be confused with a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bot #{}", self.0)
    }
}

impl FromStr for WorkerId {
    type Err = DispatchError;

    /// Accepts `Bot #3`, `bot-3` and `3`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let lower = trimmed.to_ascii_lowercase();
        let digits = lower
            .strip_prefix("bot #")
            .or_else(|| lower.strip_prefix("bot-"))
            .unwrap_or(lower.as_str());
        digits
            .parse()
            .map(WorkerId)
            .map_err(|_| DispatchError::InvalidId(s.to_string()))
    }
}

impl Serialize for WorkerId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerStatus {
    Idle,
    Busy,
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Idle => write!(f, "idle"),
            WorkerStatus::Busy => write!(f, "busy"),
        }
    }
}

/// A bot. `current_job` and `remaining_ticks` are set exactly when the bot is
/// busy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Worker {
    pub id: WorkerId,
    pub status: WorkerStatus,
    pub current_job: Option<JobId>,
    pub remaining_ticks: Option<u32>,
}

impl Worker {
    fn new(id: WorkerId) -> Self {
        Self {
            id,
            status: WorkerStatus::Idle,
            current_job: None,
            remaining_ticks: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == WorkerStatus::Idle
    }
}

/// Result of asking the pool what removing its last bot would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRemoval {
    pub worker: WorkerId,
    /// Job the bot is holding. Must be rolled back before the removal is
    /// confirmed.
    pub orphaned_job: Option<JobId>,
}

/// Ordered set of bots. Grows at the back and shrinks from the back.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Worker>,
    next_seq: u64,
    countdown_ticks: u32,
}

impl WorkerPool {
    pub fn new(countdown_ticks: u32) -> Self {
        Self {
            workers: Vec::new(),
            next_seq: 1,
            countdown_ticks,
        }
    }

    pub fn countdown_ticks(&self) -> u32 {
        self.countdown_ticks
    }

    /// Append a new idle bot
    pub fn add_worker(&mut self) -> WorkerId {
        let id = WorkerId(self.next_seq);
        self.next_seq += 1;
        self.workers.push(Worker::new(id));
        tracing::info!(worker_id = %id, pool_size = self.workers.len(), "Worker added");
        id
    }

    /// First half of a pool shrink: report the last bot and any job it would
    /// orphan. Nothing is modified.
    pub fn last_removal(&self) -> Option<PendingRemoval> {
        self.workers.last().map(|w| PendingRemoval {
            worker: w.id,
            orphaned_job: w.current_job,
        })
    }

    /// Second half of a pool shrink. Only the last bot may be removed and it
    /// must be idle by now.
    pub fn confirm_removal(&mut self, id: WorkerId) -> Result<Worker> {
        let last = self
            .workers
            .last()
            .ok_or(DispatchError::WorkerNotFound(id))?;
        if last.id != id {
            if self.get(id).is_none() {
                return Err(DispatchError::WorkerNotFound(id));
            }
            return Err(DispatchError::NotLastWorker {
                requested: id,
                last: last.id,
            });
        }
        if !last.is_idle() {
            return Err(DispatchError::WorkerBusy(id));
        }
        let removed = self
            .workers
            .pop()
            .ok_or_else(|| DispatchError::Internal("pool emptied during removal".to_string()))?;
        tracing::info!(worker_id = %id, pool_size = self.workers.len(), "Worker removed");
        Ok(removed)
    }

    /// Idle bots in pool order, read from live state
    pub fn list_idle(&self) -> Vec<WorkerId> {
        self.workers
            .iter()
            .filter(|w| w.is_idle())
            .map(|w| w.id)
            .collect()
    }

    /// Mark a bot busy with `job` and load a full countdown. Does not start a
    /// timer.
    pub fn assign(&mut self, id: WorkerId, job: JobId) -> Result<()> {
        let ticks = self.countdown_ticks;
        let worker = self.get_mut(id)?;
        if !worker.is_idle() {
            return Err(DispatchError::WorkerBusy(id));
        }
        worker.status = WorkerStatus::Busy;
        worker.current_job = Some(job);
        worker.remaining_ticks = Some(ticks);
        Ok(())
    }

    /// Return a bot to idle. Yields the job it was holding, if any.
    pub fn release(&mut self, id: WorkerId) -> Result<Option<JobId>> {
        let worker = self.get_mut(id)?;
        worker.status = WorkerStatus::Idle;
        worker.remaining_ticks = None;
        Ok(worker.current_job.take())
    }

    /// Reload a busy bot's countdown to the full duration.
    pub fn reset_countdown(&mut self, id: WorkerId) -> Result<()> {
        let ticks = self.countdown_ticks;
        let worker = self.get_mut(id)?;
        if worker.is_idle() {
            return Err(DispatchError::WorkerIdle(id));
        }
        worker.remaining_ticks = Some(ticks);
        Ok(())
    }

    /// Decrement a busy bot's remaining ticks if positive and return what is
    /// left. `None` for unknown or idle bots.
    pub(crate) fn tick_down(&mut self, id: WorkerId) -> Option<u32> {
        let worker = self.workers.iter_mut().find(|w| w.id == id)?;
        let remaining = worker.remaining_ticks.as_mut()?;
        if *remaining > 0 {
            *remaining -= 1;
        }
        Some(*remaining)
    }

    pub fn get(&self, id: WorkerId) -> Option<&Worker> {
        self.workers.iter().find(|w| w.id == id)
    }

    fn get_mut(&mut self, id: WorkerId) -> Result<&mut Worker> {
        self.workers
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(DispatchError::WorkerNotFound(id))
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn last(&self) -> Option<&Worker> {
        self.workers.last()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_id_display_and_parse() {
        let id = WorkerId(3);
        assert_eq!(id.to_string(), "Bot #3");
        assert_eq!("Bot #3".parse::<WorkerId>().unwrap(), id);
        assert_eq!("bot-3".parse::<WorkerId>().unwrap(), id);
        assert_eq!("3".parse::<WorkerId>().unwrap(), id);
        assert!("Bot #x".parse::<WorkerId>().is_err());
    }

    #[test]
    fn ids_are_not_reused_after_removal() {
        let mut pool = WorkerPool::new(10);
        pool.add_worker();
        let second = pool.add_worker();
        pool.confirm_removal(second).unwrap();
        let third = pool.add_worker();
        assert_eq!(third, WorkerId(3));
    }

    #[test]
    fn assign_and_release() {
        let mut pool = WorkerPool::new(10);
        let id = pool.add_worker();
        pool.assign(id, JobId(10_000)).unwrap();

        let worker = pool.get(id).unwrap();
        assert_eq!(worker.status, WorkerStatus::Busy);
        assert_eq!(worker.current_job, Some(JobId(10_000)));
        assert_eq!(worker.remaining_ticks, Some(10));
        assert!(pool.list_idle().is_empty());

        assert_eq!(pool.release(id).unwrap(), Some(JobId(10_000)));
        let worker = pool.get(id).unwrap();
        assert!(worker.is_idle());
        assert!(worker.current_job.is_none());
        assert!(worker.remaining_ticks.is_none());
    }

    #[test]
    fn assign_busy_worker_fails() {
        let mut pool = WorkerPool::new(10);
        let id = pool.add_worker();
        pool.assign(id, JobId(1)).unwrap();
        assert_eq!(pool.assign(id, JobId(2)), Err(DispatchError::WorkerBusy(id)));
    }

    #[test]
    fn assign_unknown_worker_fails() {
        let mut pool = WorkerPool::new(10);
        assert_eq!(
            pool.assign(WorkerId(9), JobId(1)),
            Err(DispatchError::WorkerNotFound(WorkerId(9)))
        );
    }

    #[test]
    fn last_removal_reports_orphan() {
        let mut pool = WorkerPool::new(10);
        assert!(pool.last_removal().is_none());

        pool.add_worker();
        let last = pool.add_worker();
        pool.assign(last, JobId(7)).unwrap();

        let removal = pool.last_removal().unwrap();
        assert_eq!(removal.worker, last);
        assert_eq!(removal.orphaned_job, Some(JobId(7)));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn confirm_removal_rejects_busy_and_non_last() {
        let mut pool = WorkerPool::new(10);
        let first = pool.add_worker();
        let last = pool.add_worker();
        pool.assign(last, JobId(1)).unwrap();

        assert_eq!(
            pool.confirm_removal(first),
            Err(DispatchError::NotLastWorker {
                requested: first,
                last
            })
        );
        assert_eq!(pool.confirm_removal(last), Err(DispatchError::WorkerBusy(last)));
        assert_eq!(
            pool.confirm_removal(WorkerId(42)),
            Err(DispatchError::WorkerNotFound(WorkerId(42)))
        );

        pool.release(last).unwrap();
        assert_eq!(pool.confirm_removal(last).unwrap().id, last);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn list_idle_keeps_pool_order() {
        let mut pool = WorkerPool::new(10);
        let a = pool.add_worker();
        let b = pool.add_worker();
        let c = pool.add_worker();
        pool.assign(b, JobId(1)).unwrap();
        assert_eq!(pool.list_idle(), vec![a, c]);
    }

    #[test]
    fn tick_down_stops_at_zero() {
        let mut pool = WorkerPool::new(2);
        let id = pool.add_worker();
        assert_eq!(pool.tick_down(id), None);

        pool.assign(id, JobId(1)).unwrap();
        assert_eq!(pool.tick_down(id), Some(1));
        assert_eq!(pool.tick_down(id), Some(0));
        assert_eq!(pool.tick_down(id), Some(0));
    }

    #[test]
    fn reset_countdown_requires_busy_worker() {
        let mut pool = WorkerPool::new(4);
        let id = pool.add_worker();
        assert_eq!(pool.reset_countdown(id), Err(DispatchError::WorkerIdle(id)));

        pool.assign(id, JobId(1)).unwrap();
        pool.tick_down(id);
        pool.reset_countdown(id).unwrap();
        assert_eq!(pool.get(id).unwrap().remaining_ticks, Some(4));
    }
}
