use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::SimulationConfig;
use crate::error::Result;
use crate::scheduler::{DispatchSnapshot, Job, JobId, OrderDispatcher, Priority, RemovedWorker};
use crate::worker::{Worker, WorkerId};

/// The single logical scheduler: one task ticks the dispatcher at a fixed
/// cadence while callers mutate it through a [`SimulationHandle`].
///
/// Ticks and API calls both take the dispatcher's write lock, so a tick never
/// lands in the middle of an operation.
pub struct Simulation {
    config: SimulationConfig,
    dispatcher: Arc<RwLock<OrderDispatcher>>,
    ticks_tx: watch::Sender<u64>,
}

impl Simulation {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let dispatcher = OrderDispatcher::new(&config);
        let (ticks_tx, _) = watch::channel(0);

        Ok(Self {
            config,
            dispatcher: Arc::new(RwLock::new(dispatcher)),
            ticks_tx,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn handle(&self) -> SimulationHandle {
        SimulationHandle {
            dispatcher: self.dispatcher.clone(),
            ticks_rx: self.ticks_tx.subscribe(),
        }
    }

    /// Tick until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) {
        let period = self.config.tick_interval();
        let mut interval = tick_interval(period);

        tracing::info!(
            countdown_ticks = self.config.countdown_ticks,
            tick_interval_ms = self.config.tick_interval_ms,
            "Simulation started"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Simulation stopping");
                    break;
                }
                _ = next_tick(&mut interval) => {}
            }

            let (tick, completed) = {
                let mut dispatcher = self.dispatcher.write().await;
                let completed = dispatcher.tick();
                (dispatcher.ticks(), completed)
            };
            if !completed.is_empty() {
                tracing::debug!(tick, completed = completed.len(), "Orders completed on tick");
            }
            self.ticks_tx.send_replace(tick);
        }
    }
}

/// First tick fires one full period after start, so the first countdown is as
/// long as every other one.
fn tick_interval(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(interval)
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => tokio::task::yield_now().await,
    }
}

/// Cloneable async facade over the dispatcher. Every read returns an owned
/// snapshot.
#[derive(Clone)]
pub struct SimulationHandle {
    dispatcher: Arc<RwLock<OrderDispatcher>>,
    ticks_rx: watch::Receiver<u64>,
}

impl SimulationHandle {
    pub async fn create_job(&self, priority: Priority) -> JobId {
        self.dispatcher.write().await.create_job(priority)
    }

    pub async fn add_worker(&self) -> WorkerId {
        self.dispatcher.write().await.add_worker()
    }

    pub async fn remove_last_worker(&self) -> Result<Option<RemovedWorker>> {
        self.dispatcher.write().await.remove_last_worker()
    }

    pub async fn remove_worker(&self, id: WorkerId) -> Result<RemovedWorker> {
        self.dispatcher.write().await.remove_worker(id)
    }

    pub async fn list_workers(&self) -> Vec<Worker> {
        self.dispatcher.read().await.list_workers()
    }

    pub async fn list_pending(&self) -> Vec<Job> {
        self.dispatcher.read().await.list_pending()
    }

    pub async fn list_in_progress(&self) -> Vec<Job> {
        self.dispatcher.read().await.list_in_progress()
    }

    pub async fn list_completed(&self) -> Vec<Job> {
        self.dispatcher.read().await.list_completed()
    }

    pub async fn snapshot(&self) -> DispatchSnapshot {
        self.dispatcher.read().await.snapshot()
    }

    /// Wait until no order is pending or in progress. Returns false on
    /// timeout.
    pub async fn wait_until_drained(&self, timeout: Duration) -> bool {
        let mut ticks_rx = self.ticks_rx.clone();
        let wait = async {
            loop {
                if self.dispatcher.read().await.is_drained() {
                    return true;
                }
                if ticks_rx.changed().await.is_err() {
                    // Simulation dropped; nothing will change any more
                    return self.dispatcher.read().await.is_drained();
                }
            }
        };
        tokio::time::timeout(timeout, wait).await.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_invalid_config() {
        let config = SimulationConfig::default().with_countdown_ticks(0);
        assert!(Simulation::new(config).is_err());
    }

    #[tokio::test]
    async fn handle_operations_apply_immediately() {
        let sim = Simulation::new(SimulationConfig::default()).unwrap();
        let handle = sim.handle();

        let worker = handle.add_worker().await;
        let job = handle.create_job(Priority::Vip).await;

        let workers = handle.list_workers().await;
        assert_eq!(workers[0].id, worker);
        assert_eq!(workers[0].current_job, Some(job));
        assert_eq!(handle.list_in_progress().await.len(), 1);
        assert!(handle.list_pending().await.is_empty());
    }

    #[tokio::test]
    async fn drained_wait_times_out_without_ticks() {
        let sim = Simulation::new(SimulationConfig::default().with_initial_workers(1)).unwrap();
        let handle = sim.handle();
        handle.create_job(Priority::Normal).await;

        assert!(!handle.wait_until_drained(Duration::from_millis(50)).await);
    }

    #[tokio::test]
    async fn zero_interval_runs_to_completion() {
        let config = SimulationConfig::default()
            .with_countdown_ticks(3)
            .with_tick_interval_ms(0)
            .with_initial_workers(2);
        let sim = Arc::new(Simulation::new(config).unwrap());
        let handle = sim.handle();
        for _ in 0..4 {
            handle.create_job(Priority::Normal).await;
        }

        let token = CancellationToken::new();
        let runner = {
            let sim = sim.clone();
            let token = token.clone();
            tokio::spawn(async move { sim.run(token).await })
        };

        assert!(handle.wait_until_drained(Duration::from_secs(5)).await);
        token.cancel();
        runner.await.unwrap();

        assert_eq!(handle.list_completed().await.len(), 4);
    }
}
