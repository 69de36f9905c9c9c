use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use dispatch_sim::config::{NodeConfig, SimulationConfig};
use dispatch_sim::node::Node;
use dispatch_sim::scheduler::{Job, Priority};
use dispatch_sim::shutdown::install_shutdown_handler;
use dispatch_sim::simulation::Simulation;

#[derive(Parser, Debug)]
#[command(name = "dispatch-sim")]
#[command(version)]
#[command(about = "Order dispatch simulator with a pool of bots")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the simulation with an HTTP dashboard until interrupted
    Server(ServerArgs),

    /// Queue a batch of orders, run until drained and print the results
    Simulate(SimulateArgs),
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct TimingArgs {
    /// Ticks a bot spends on each order
    #[arg(long, env = "DISPATCH_COUNTDOWN_TICKS", default_value = "10")]
    countdown_ticks: u32,

    /// Milliseconds per tick (0 ticks as fast as possible)
    #[arg(long, env = "DISPATCH_TICK_MS", default_value = "1000")]
    tick_ms: u64,

    /// Bots in the pool at startup
    #[arg(long, env = "DISPATCH_WORKERS", default_value = "0")]
    workers: usize,
}

impl TimingArgs {
    fn simulation_config(&self) -> SimulationConfig {
        SimulationConfig::default()
            .with_countdown_ticks(self.countdown_ticks)
            .with_tick_interval_ms(self.tick_ms)
            .with_initial_workers(self.workers)
    }
}

#[derive(Parser, Debug)]
struct ServerArgs {
    #[command(flatten)]
    timing: TimingArgs,

    /// Port for the web dashboard
    #[arg(long, env = "DISPATCH_DASHBOARD_PORT", default_value = "8080")]
    dashboard_port: u16,
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    #[command(flatten)]
    timing: TimingArgs,

    /// Normal orders to queue
    #[arg(long, default_value = "0")]
    normal: usize,

    /// VIP orders to queue
    #[arg(long, default_value = "0")]
    vip: usize,

    /// Give up after this many seconds
    #[arg(long, default_value = "300")]
    timeout_secs: u64,

    /// Output format
    #[arg(long, short = 'o', default_value = "table")]
    output: OutputFormat,
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct SimulateOutput {
    drained: bool,
    ticks: u64,
    completed: Vec<Job>,
    pending: Vec<Job>,
    in_progress: Vec<Job>,
}

// =============================================================================
// Commands
// =============================================================================

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

async fn run_server(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let dashboard_addr: SocketAddr = format!("0.0.0.0:{}", args.dashboard_port).parse()?;
    let config = NodeConfig::new(args.timing.simulation_config()).with_dashboard(dashboard_addr);

    tracing::info!(
        countdown_ticks = config.simulation.countdown_ticks,
        tick_ms = config.simulation.tick_interval_ms,
        workers = config.simulation.initial_workers,
        dashboard_addr = %dashboard_addr,
        "Starting dispatch-sim node"
    );

    let node = Node::new(config)?;
    let shutdown = install_shutdown_handler();
    node.run(shutdown).await;

    Ok(())
}

async fn run_simulate(args: SimulateArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let simulation = Arc::new(Simulation::new(args.timing.simulation_config())?);
    let handle = simulation.handle();

    for _ in 0..args.normal {
        handle.create_job(Priority::Normal).await;
    }
    for _ in 0..args.vip {
        handle.create_job(Priority::Vip).await;
    }

    let shutdown = CancellationToken::new();
    let runner = {
        let simulation = simulation.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { simulation.run(shutdown).await })
    };

    let drained = handle
        .wait_until_drained(Duration::from_secs(args.timeout_secs))
        .await;
    shutdown.cancel();
    runner.await?;

    let snapshot = handle.snapshot().await;
    match args.output {
        OutputFormat::Json => {
            let output = SimulateOutput {
                drained,
                ticks: snapshot.ticks,
                completed: snapshot.completed,
                pending: snapshot.pending,
                in_progress: snapshot.in_progress,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            if !drained {
                println!("Timed out before all orders completed.");
            }
            println!("Completed after {} ticks", snapshot.ticks);
            println!("{:<10} {:<8} {:<10} ROLLBACKS", "ORDER", "PRIORITY", "BOT");
            println!("{}", "-".repeat(40));
            for job in &snapshot.completed {
                let bot = job
                    .completed_by
                    .map(|w| w.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<10} {:<8} {:<10} {}",
                    job.id.to_string(),
                    job.priority.to_string(),
                    bot,
                    job.rollbacks
                );
            }
            if !snapshot.pending.is_empty() || !snapshot.in_progress.is_empty() {
                println!();
                println!(
                    "Unfinished: {} pending, {} in progress",
                    snapshot.pending.len(),
                    snapshot.in_progress.len()
                );
            }
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Server(server_args) => run_server(server_args).await?,
        Commands::Simulate(simulate_args) => run_simulate(simulate_args).await?,
    }

    Ok(())
}
