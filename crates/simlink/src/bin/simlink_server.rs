//! SIMLINK server
//!
//! Runs the simulation loop on its own thread and the orchestration service
//! on a tokio runtime until Ctrl-C.
//!
//! # Usage
//!
//! ```bash
//! # defaults: 60 Hz, no peer, service on 127.0.0.1:7600
//! simlink_server
//!
//! # with a config file, peer sync forced on
//! simlink_server --config simlink.toml --sync
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use simlink::{serve_orchestration, AppConfig, SimulationRunner};
use tokio::sync::Notify;

#[derive(Parser, Debug)]
#[command(name = "simlink_server")]
#[command(about = "Simulation loop with dynamic objects and co-simulation sync", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the tick rate (Hz)
    #[arg(long)]
    tick_rate: Option<u32>,

    /// Enable the co-simulation bridge
    #[arg(long)]
    sync: bool,

    /// Override the orchestration listen address
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(tick_rate) = args.tick_rate {
        config.simulation.tick_rate = tick_rate;
    }
    if args.sync {
        config.sync.enabled = true;
    }
    if let Some(bind) = args.bind {
        config.service.bind = bind;
    }
    config.validate()?;

    tracing::info!("SIMLINK server starting...");
    tracing::info!("  Tick rate: {} Hz", config.simulation.tick_rate);
    tracing::info!("  Step: {} s", config.simulation.step_dt());
    if config.sync.enabled {
        tracing::info!("  Peer: {}", config.sync.address());
    }

    let world = config.scene.build()?;
    let (mut runner, orchestrator) = SimulationRunner::from_config(world, &config);

    let stop = Arc::new(AtomicBool::new(false));
    let sim_stop = Arc::clone(&stop);
    let simulation = std::thread::Builder::new()
        .name("simlink-simulation".to_string())
        .spawn(move || runner.run(&sim_stop))?;

    let shutdown = Arc::new(Notify::new());
    let service = if config.service.enabled {
        let listener = tokio::net::TcpListener::bind(&config.service.bind).await?;
        Some(tokio::spawn(serve_orchestration(
            listener,
            orchestrator,
            Arc::clone(&shutdown),
        )))
    } else {
        None
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    shutdown.notify_one();
    if let Some(service) = service {
        service.await??;
    }

    stop.store(true, Ordering::Release);
    if simulation.join().is_err() {
        tracing::error!("simulation thread panicked");
    }
    Ok(())
}
