use serde::Serialize;

use crate::config::SimulationConfig;
use crate::error::{DispatchError, Result};
use crate::scheduler::job::{Job, JobId, Priority, FIRST_JOB_ID};
use crate::scheduler::queue::DispatchQueue;
use crate::worker::{
    CountdownScheduler, Expired, PendingRemoval, TimerId, Worker, WorkerId, WorkerPool,
};

/// A bot paired with an order by an assignment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub worker: WorkerId,
    pub job: JobId,
    pub timer: TimerId,
}

/// Outcome of shrinking the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RemovedWorker {
    pub worker: WorkerId,
    /// Order that went back to the pending queue because the bot was busy
    pub rolled_back: Option<JobId>,
}

/// Read-only copy of the whole dispatch state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    pub ticks: u64,
    pub workers: Vec<Worker>,
    pub pending: Vec<Job>,
    pub in_progress: Vec<Job>,
    pub completed: Vec<Job>,
}

/// Owns the bots, the three order collections and the countdowns, and moves
/// orders through `Pending -> InProgress -> Completed`.
///
/// Every order lives in exactly one of `queue`, `in_progress` or `completed`.
/// All operations are synchronous and leave that invariant intact on return.
#[derive(Debug)]
pub struct OrderDispatcher {
    pool: WorkerPool,
    queue: DispatchQueue,
    in_progress: Vec<Job>,
    completed: Vec<Job>,
    countdowns: CountdownScheduler<JobId>,
    next_job_id: u64,
    ticks: u64,
}

impl OrderDispatcher {
    pub fn new(config: &SimulationConfig) -> Self {
        let mut dispatcher = Self {
            pool: WorkerPool::new(config.countdown_ticks),
            queue: DispatchQueue::new(),
            in_progress: Vec::new(),
            completed: Vec::new(),
            countdowns: CountdownScheduler::new(),
            next_job_id: FIRST_JOB_ID,
            ticks: 0,
        };
        for _ in 0..config.initial_workers {
            dispatcher.pool.add_worker();
        }
        dispatcher
    }

    /// Queue a new order and immediately try to hand it to an idle bot.
    pub fn create_job(&mut self, priority: Priority) -> JobId {
        let id = JobId(self.next_job_id);
        self.next_job_id += 1;

        self.queue.insert(Job::new(id, priority));
        tracing::info!(job_id = %id, %priority, pending = self.queue.len(), "Job created");

        self.assign_pass();
        id
    }

    /// Pair idle bots (pool order) with pending orders (queue order) until one
    /// side runs out.
    pub fn assign_pass(&mut self) -> Vec<Assignment> {
        let mut assignments = Vec::new();

        for worker in self.pool.list_idle() {
            let Some(job_id) = self.queue.peek().map(|j| j.id) else {
                break;
            };
            match self.start_job(worker, job_id) {
                Ok(assignment) => assignments.push(assignment),
                Err(e) => {
                    tracing::error!(
                        worker_id = %worker,
                        job_id = %job_id,
                        error = %e,
                        "Assignment failed"
                    );
                }
            }
        }

        if assignments.is_empty() {
            tracing::debug!(
                idle = self.pool.list_idle().len(),
                pending = self.queue.len(),
                "Assignment pass made no matches"
            );
        }
        assignments
    }

    /// Hand a specific pending order to a specific idle bot, bypassing queue
    /// order.
    pub fn assign_job(&mut self, worker: WorkerId, job: JobId) -> Result<Assignment> {
        self.start_job(worker, job)
    }

    fn start_job(&mut self, worker: WorkerId, job_id: JobId) -> Result<Assignment> {
        if self.queue.get(job_id).is_none() {
            return Err(DispatchError::JobNotFound(job_id));
        }

        self.pool.assign(worker, job_id)?;
        let timer = match self.countdowns.start(&mut self.pool, worker, job_id) {
            Ok(timer) => timer,
            Err(e) => {
                self.pool.release(worker)?;
                return Err(e);
            }
        };

        let mut job = self
            .queue
            .remove(job_id)
            .ok_or(DispatchError::JobNotFound(job_id))?;
        job.start(worker);
        tracing::info!(
            job_id = %job_id,
            worker_id = %worker,
            priority = %job.priority,
            "Job assigned"
        );
        self.in_progress.push(job);

        Ok(Assignment {
            worker,
            job: job_id,
            timer,
        })
    }

    /// Finish an in-progress order, free its bot and run another assignment
    /// pass.
    pub fn complete_job(&mut self, worker: WorkerId, job_id: JobId) -> Result<()> {
        let index = self
            .in_progress
            .iter()
            .position(|j| j.id == job_id)
            .ok_or(DispatchError::JobNotFound(job_id))?;
        if self.in_progress[index].assigned_worker != Some(worker) {
            return Err(DispatchError::JobNotAssigned {
                job: job_id,
                worker,
            });
        }
        if self.pool.get(worker).is_none() {
            return Err(DispatchError::WorkerNotFound(worker));
        }

        self.countdowns.stop(worker);
        self.pool.release(worker)?;

        let mut job = self.in_progress.remove(index);
        job.complete();
        tracing::info!(job_id = %job_id, worker_id = %worker, "Job completed");
        self.completed.push(job);

        self.assign_pass();
        Ok(())
    }

    /// Put a bot's current order back in the pending queue and free the bot.
    ///
    /// The order keeps its id and priority and is queued behind every order of
    /// its own tier. Idle bots are a no-op.
    pub fn rollback(&mut self, worker: WorkerId) -> Result<Option<JobId>> {
        let current = self
            .pool
            .get(worker)
            .ok_or(DispatchError::WorkerNotFound(worker))?
            .current_job;
        let Some(job_id) = current else {
            tracing::debug!(worker_id = %worker, "Rollback on idle worker");
            return Ok(None);
        };
        let index = self
            .in_progress
            .iter()
            .position(|j| j.id == job_id)
            .ok_or_else(|| {
                DispatchError::Internal(format!(
                    "{} holds {} which is not in progress",
                    worker, job_id
                ))
            })?;

        self.countdowns.stop(worker);
        self.pool.release(worker)?;

        let mut job = self.in_progress.remove(index);
        job.roll_back();
        tracing::info!(
            job_id = %job_id,
            worker_id = %worker,
            rollbacks = job.rollbacks,
            "Job rolled back"
        );
        self.queue.insert(job);

        Ok(Some(job_id))
    }

    pub fn add_worker(&mut self) -> WorkerId {
        let id = self.pool.add_worker();
        self.assign_pass();
        id
    }

    /// Shrink the pool by its last bot. An empty pool is a no-op.
    pub fn remove_last_worker(&mut self) -> Result<Option<RemovedWorker>> {
        let Some(removal) = self.pool.last_removal() else {
            tracing::debug!("Remove requested on empty pool");
            return Ok(None);
        };
        self.remove(removal).map(Some)
    }

    /// Remove a bot by id. Only the last bot may be removed.
    pub fn remove_worker(&mut self, id: WorkerId) -> Result<RemovedWorker> {
        let removal = self
            .pool
            .last_removal()
            .ok_or(DispatchError::WorkerNotFound(id))?;
        if removal.worker != id {
            return Err(match self.pool.get(id) {
                Some(_) => DispatchError::NotLastWorker {
                    requested: id,
                    last: removal.worker,
                },
                None => DispatchError::WorkerNotFound(id),
            });
        }
        self.remove(removal)
    }

    fn remove(&mut self, removal: PendingRemoval) -> Result<RemovedWorker> {
        let rolled_back = match removal.orphaned_job {
            Some(_) => self.rollback(removal.worker)?,
            None => None,
        };
        self.countdowns.stop(removal.worker);
        self.pool.confirm_removal(removal.worker)?;

        // Another bot may be idle while the rolled-back order waits.
        if rolled_back.is_some() {
            self.assign_pass();
        }

        Ok(RemovedWorker {
            worker: removal.worker,
            rolled_back,
        })
    }

    /// Advance every countdown by one tick and complete the orders whose
    /// countdown ran out, in bot order. Returns the completed order ids.
    pub fn tick(&mut self) -> Vec<JobId> {
        self.ticks += 1;
        let expired = self.countdowns.tick(&mut self.pool);
        tracing::debug!(tick = self.ticks, expired = expired.len(), "Tick");

        let mut completed = Vec::with_capacity(expired.len());
        for Expired {
            worker,
            payload: job_id,
            ..
        } in expired
        {
            match self.complete_job(worker, job_id) {
                Ok(()) => completed.push(job_id),
                Err(e) => {
                    tracing::error!(
                        worker_id = %worker,
                        job_id = %job_id,
                        error = %e,
                        "Completion failed"
                    );
                }
            }
        }
        completed
    }

    pub fn list_workers(&self) -> Vec<Worker> {
        self.pool.workers().to_vec()
    }

    pub fn list_pending(&self) -> Vec<Job> {
        self.queue.snapshot()
    }

    pub fn list_in_progress(&self) -> Vec<Job> {
        self.in_progress.clone()
    }

    pub fn list_completed(&self) -> Vec<Job> {
        self.completed.clone()
    }

    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            ticks: self.ticks,
            workers: self.list_workers(),
            pending: self.list_pending(),
            in_progress: self.list_in_progress(),
            completed: self.list_completed(),
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn countdowns(&self) -> &CountdownScheduler<JobId> {
        &self.countdowns
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// No order is pending or in progress.
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.in_progress.is_empty()
    }
}
