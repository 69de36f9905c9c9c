use std::collections::BTreeMap;

use crate::error::Result;
use crate::worker::pool::{WorkerId, WorkerPool};

/// Handle for one started countdown. Restarting a bot's countdown yields a new
/// handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Debug)]
struct Countdown<T> {
    timer_id: TimerId,
    payload: T,
}

/// A countdown that ran out on this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired<T> {
    pub worker: WorkerId,
    pub timer_id: TimerId,
    pub payload: T,
}

/// One live countdown per bot, keyed by bot id.
///
/// The remaining tick count lives on the bot itself; the scheduler only
/// decides which bots are counting down and hands back each countdown's
/// payload exactly once when the bot reaches zero. Timers are plain data, so
/// [`CountdownScheduler::stop`] takes effect immediately and a stopped timer
/// can never fire.
#[derive(Debug)]
pub struct CountdownScheduler<T> {
    timers: BTreeMap<WorkerId, Countdown<T>>,
    next_timer: u64,
}

impl<T> Default for CountdownScheduler<T> {
    fn default() -> Self {
        Self {
            timers: BTreeMap::new(),
            next_timer: 1,
        }
    }
}

impl<T> CountdownScheduler<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a full-length countdown for a busy bot, replacing any countdown it
    /// already has.
    pub fn start(
        &mut self,
        pool: &mut WorkerPool,
        worker: WorkerId,
        payload: T,
    ) -> Result<TimerId> {
        pool.reset_countdown(worker)?;

        let timer_id = TimerId(self.next_timer);
        self.next_timer += 1;
        if let Some(old) = self.timers.insert(worker, Countdown { timer_id, payload }) {
            tracing::debug!(
                worker_id = %worker,
                timer_id = old.timer_id.0,
                "Replaced live countdown"
            );
        }
        tracing::debug!(
            worker_id = %worker,
            timer_id = timer_id.0,
            ticks = pool.countdown_ticks(),
            "Countdown started"
        );
        Ok(timer_id)
    }

    /// Cancel a bot's countdown. Returns false when there was none.
    pub fn stop(&mut self, worker: WorkerId) -> bool {
        match self.timers.remove(&worker) {
            Some(countdown) => {
                tracing::debug!(
                    worker_id = %worker,
                    timer_id = countdown.timer_id.0,
                    "Countdown stopped"
                );
                true
            }
            None => false,
        }
    }

    /// Advance every live countdown by one tick, in bot id order.
    ///
    /// Countdowns that reach zero are removed and returned. A countdown whose
    /// bot has disappeared or gone idle is discarded.
    pub fn tick(&mut self, pool: &mut WorkerPool) -> Vec<Expired<T>> {
        let workers: Vec<WorkerId> = self.timers.keys().copied().collect();
        let mut expired = Vec::new();

        for worker in workers {
            match pool.tick_down(worker) {
                Some(0) => {
                    if let Some(countdown) = self.timers.remove(&worker) {
                        expired.push(Expired {
                            worker,
                            timer_id: countdown.timer_id,
                            payload: countdown.payload,
                        });
                    }
                }
                Some(_) => {}
                None => {
                    tracing::warn!(
                        worker_id = %worker,
                        "Discarding countdown for idle or removed worker"
                    );
                    self.timers.remove(&worker);
                }
            }
        }

        expired
    }

    pub fn is_running(&self, worker: WorkerId) -> bool {
        self.timers.contains_key(&worker)
    }

    pub fn timer_id(&self, worker: WorkerId) -> Option<TimerId> {
        self.timers.get(&worker).map(|c| c.timer_id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
