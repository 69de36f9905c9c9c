use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::NodeConfig;
use crate::dashboard::{run_dashboard, DashboardState};
use crate::error::Result;
use crate::simulation::{Simulation, SimulationHandle};

/// Main node that wires the simulation and the dashboard together
pub struct Node {
    pub config: NodeConfig,
    pub simulation: Arc<Simulation>,
}

impl Node {
    pub fn new(config: NodeConfig) -> Result<Self> {
        let simulation = Simulation::new(config.simulation.clone())?;
        Ok(Self {
            config,
            simulation: Arc::new(simulation),
        })
    }

    pub fn handle(&self) -> SimulationHandle {
        self.simulation.handle()
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Spawns the dashboard when an address is configured, then drives the
    /// simulation tick loop on the current task.
    pub async fn run(self, shutdown: CancellationToken) {
        let dashboard = self.config.dashboard.listen_addr.map(|addr| {
            let state = DashboardState {
                simulation: self.simulation.handle(),
            };
            let token = shutdown.clone();
            tokio::spawn(async move {
                run_dashboard(addr, state, token).await;
            })
        });

        self.simulation.run(shutdown).await;

        if let Some(dashboard) = dashboard {
            if let Err(e) = dashboard.await {
                tracing::error!(error = %e, "Dashboard task panicked");
            }
        }
        tracing::info!("Node stopped");
    }
}
