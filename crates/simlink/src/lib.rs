//! # SIMLINK
//!
//! Runs a simulation at a fixed rate while two external actors work on it:
//! an orchestration layer that spawns and destroys bodies, and a
//! co-simulation peer that exchanges state every tick.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐        ┌───────────────────┐        ┌────────────┐
//! │ Orchestration     │ queue  │ Simulation loop   │ tick   │ SyncBridge │
//! │ service (tokio)   │───────►│ (fixed rate)      │◄──────►│            │◄──► peer
//! └───────────────────┘        └─────────┬─────────┘        └────────────┘
//!                                        │ single writer
//!                              ┌─────────▼─────────┐
//!                              │ Simulation state  │
//!                              └───────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use simlink::{AppConfig, SimulationRunner};
//!
//! let config = AppConfig::load("simlink.toml")?;
//! let world = config.scene.build()?;
//! let (mut runner, orchestrator) = SimulationRunner::from_config(world, &config);
//! std::thread::spawn(move || runner.run(&shutdown));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod runner;
pub mod service;
pub mod tick;

pub use config::{
    AppConfig, ConfigError, FixtureConfig, JointConfig, SceneConfig, ServiceConfig,
    SimulationConfig,
};
pub use runner::{Simulation, SimulationRunner};
pub use service::serve_orchestration;
pub use tick::{TickPacer, TickPhases, TickStats, MAX_BACKLOG};
