//! # Simulation Runner
//!
//! Owns the simulation and drives everything that touches it, once per tick:
//!
//! ```text
//! ┌──────────────────────── one tick ────────────────────────┐
//! │ drain spawns → drain destroys → peer exchange → step     │
//! │ └──── lifecycle ────────────┘   └ exchange ┘   → publish │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each phase is timed and handed to the [`TickPacer`], so a slow peer shows
//! up as peer-bound late ticks rather than a generally slow loop.
//!
//! The runner is moved onto the simulation thread; nothing else ever gets
//! `&mut` access to the simulation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use simlink_core::{SceneWorld, SimulationStateAccessor};
use simlink_lifecycle::{LifecycleCoordinator, Orchestrator};
use simlink_sync::{BridgeState, SyncBridge, TcpChannel};

use crate::config::AppConfig;
use crate::tick::{TickPacer, TickPhases, TickStats};

/// A simulation the runner can advance.
pub trait Simulation: SimulationStateAccessor + Send {
    /// Advances the simulation by `dt` seconds.
    fn step(&mut self, dt: f64);
}

impl Simulation for SceneWorld {
    fn step(&mut self, dt: f64) {
        SceneWorld::step(self, dt);
    }
}

/// Drives one simulation at a fixed rate.
pub struct SimulationRunner<S: Simulation> {
    simulation: S,
    coordinator: Arc<LifecycleCoordinator>,
    bridge: Option<SyncBridge>,
    pacer: TickPacer,
    step_dt: f64,
}

impl<S: Simulation> SimulationRunner<S> {
    /// Creates a runner and publishes the startup scene to the coordinator.
    ///
    /// The bridge, if any, starts negotiating immediately.
    pub fn new(
        simulation: S,
        coordinator: Arc<LifecycleCoordinator>,
        mut bridge: Option<SyncBridge>,
        tick_rate: u32,
        step_dt: f64,
    ) -> Self {
        coordinator.refresh_live(&simulation);
        if let Some(bridge) = bridge.as_mut() {
            bridge.start(&simulation);
        }
        Self {
            simulation,
            coordinator,
            bridge,
            pacer: TickPacer::new(tick_rate),
            step_dt,
        }
    }

    /// Wires a runner from configuration.
    ///
    /// Returns the runner and the orchestrator that feeds it. A TCP bridge
    /// is created when `sync.enabled` is set.
    pub fn from_config(simulation: S, config: &AppConfig) -> (Self, Orchestrator) {
        let coordinator = Arc::new(LifecycleCoordinator::new(config.lifecycle.clone()));
        let bridge = config.sync.enabled.then(|| {
            let channel = TcpChannel::new(config.sync.address(), config.sync.reply_timeout());
            SyncBridge::new(config.sync.clone(), Box::new(channel))
        });
        let orchestrator = Orchestrator::new(Arc::clone(&coordinator));
        let runner = Self::new(
            simulation,
            coordinator,
            bridge,
            config.simulation.tick_rate,
            config.simulation.step_dt(),
        );
        (runner, orchestrator)
    }

    /// Runs one tick and returns where its time went.
    pub fn tick(&mut self) -> TickPhases {
        let start = Instant::now();
        self.coordinator.drain_spawns(&mut self.simulation);
        self.coordinator.drain_destroys(&mut self.simulation);
        let drained = Instant::now();

        let renegotiate = self.coordinator.take_renegotiation();
        match self.bridge.as_mut() {
            Some(bridge) => {
                if renegotiate {
                    bridge.renegotiate(&self.simulation);
                }
                bridge.tick(&mut self.simulation);
            }
            None if renegotiate => tracing::warn!("renegotiation requested but no peer is configured"),
            None => {}
        }
        let exchanged = Instant::now();

        self.simulation.step(self.step_dt);
        self.coordinator.refresh_live(&self.simulation);

        let phases = TickPhases {
            lifecycle: drained - start,
            exchange: exchanged - drained,
            step: exchanged.elapsed(),
        };
        self.pacer.record(phases, self.step_dt);
        phases
    }

    /// Ticks at the configured rate until `shutdown` is set, then releases
    /// the peer channel.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        tracing::info!(
            "simulation loop started ({:?} per tick, {} s simulated per tick)",
            self.pacer.period(),
            self.step_dt
        );
        while !shutdown.load(Ordering::Acquire) {
            self.pacer.wait_for_tick();
            self.tick();
        }

        if let Some(bridge) = self.bridge.as_mut() {
            bridge.shutdown();
        }
        let stats = self.pacer.stats();
        tracing::info!(
            "simulation loop stopped after {} ticks: {:.3} s simulated in {:.3} s (x{:.2})",
            stats.ticks,
            stats.simulated_secs,
            self.pacer.wall_time().as_secs_f64(),
            self.pacer.real_time_factor()
        );
        tracing::info!(
            "  busy: mean {:?}, max {:?}; late {} ({} peer-bound); exchange mean {:?}",
            stats.mean_busy(),
            stats.max_busy,
            stats.late_ticks,
            stats.peer_bound_ticks,
            stats.mean_exchange()
        );
        if let Some(bridge) = self.bridge() {
            let peer = bridge.stats();
            tracing::info!(
                "  peer: {} negotiations, {} exchanges, {} resets, {} mismatches",
                peer.negotiations,
                peer.exchanges,
                peer.peer_resets,
                peer.mismatches
            );
        }
    }

    /// The simulation.
    #[must_use]
    pub const fn simulation(&self) -> &S {
        &self.simulation
    }

    /// The coordinator shared with the orchestrator.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<LifecycleCoordinator> {
        &self.coordinator
    }

    /// The bridge, if configured.
    #[must_use]
    pub fn bridge(&self) -> Option<&SyncBridge> {
        self.bridge.as_ref()
    }

    /// Bridge state, if a bridge is configured.
    #[must_use]
    pub fn bridge_state(&self) -> Option<BridgeState> {
        self.bridge().map(SyncBridge::state)
    }

    /// Pacing statistics.
    #[must_use]
    pub const fn tick_stats(&self) -> &TickStats {
        self.pacer.stats()
    }
}
