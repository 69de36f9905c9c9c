use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{DispatchError, Result};

/// Timing parameters for the dispatch simulation.
///
/// Both values are configurable so tests can run with short (or zero) tick
/// intervals and short countdowns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Number of ticks a bot spends on one order
    pub countdown_ticks: u32,
    /// Milliseconds between ticks. Zero ticks as fast as the runtime allows.
    pub tick_interval_ms: u64,
    /// Bots added to the pool at startup
    pub initial_workers: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: 10,
            tick_interval_ms: 1000,
            initial_workers: 0,
        }
    }
}

impl SimulationConfig {
    pub fn with_countdown_ticks(mut self, ticks: u32) -> Self {
        self.countdown_ticks = ticks;
        self
    }

    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    pub fn with_initial_workers(mut self, count: usize) -> Self {
        self.initial_workers = count;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject values that would make the simulation meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.countdown_ticks == 0 {
            return Err(DispatchError::InvalidConfig(
                "countdown_ticks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// HTTP dashboard settings. No address means the dashboard is disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardConfig {
    pub listen_addr: Option<SocketAddr>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub simulation: SimulationConfig,
    pub dashboard: DashboardConfig,
}

impl NodeConfig {
    pub fn new(simulation: SimulationConfig) -> Self {
        Self {
            simulation,
            ..Default::default()
        }
    }

    pub fn with_dashboard(mut self, addr: SocketAddr) -> Self {
        self.dashboard.listen_addr = Some(addr);
        self
    }
}
