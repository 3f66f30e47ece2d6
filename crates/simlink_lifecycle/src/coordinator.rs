//! # Lifecycle Coordinator
//!
//! Serializes spawn/destroy requests from any number of orchestration
//! threads against the single simulation-step thread.
//!
//! ## Flow
//!
//! ```text
//! caller thread                         simulation-step thread
//! ─────────────                         ──────────────────────
//! lock queue
//!   filter (pending, live, dup)
//!   enqueue, target = gen + 1
//!   wait_until(deadline) ──┐
//!                          │            lock queue
//!                          │              apply every pending entry
//!                          │              apply_and_settle()   (once)
//!                          │              refresh live index
//!                          │              gen += 1
//!                          └─────────── notify_all
//! gen >= target: read own result
//! ```
//!
//! One condition variable per request kind is shared by every waiter of
//! that kind. A waiter only learns that *a* drain happened; it then looks up
//! its own names in the live index (spawn) or in the destroyed-state table
//! (destroy). A timeout returns an empty result but leaves the entries
//! queued: the next drain still applies them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use simlink_core::{ObjectState, SimulationStateAccessor, SpawnRequest};

/// Configuration for the lifecycle coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// How long a caller waits for the drain that applies its batch (ms).
    pub wait_timeout_ms: u64,
    /// Number of destroy generations for which final states are kept for
    /// callers that have not collected them yet.
    pub destroyed_state_retention: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 100,
            destroyed_state_retention: 16,
        }
    }
}

impl LifecycleConfig {
    /// Wait timeout as a `Duration`.
    #[must_use]
    pub const fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

#[derive(Default)]
struct SpawnQueue {
    pending: VecDeque<SpawnRequest>,
    generation: u64,
}

#[derive(Default)]
struct DestroyQueue {
    pending: VecDeque<String>,
    generation: u64,
    /// Final state of destroyed bodies, tagged with the destroy generation.
    destroyed: HashMap<String, (u64, ObjectState)>,
}

/// Snapshot of the live simulation, published by the simulation thread.
#[derive(Default)]
struct LiveIndex {
    /// Live body name -> permanent flag.
    bodies: HashMap<String, bool>,
    /// States of live non-permanent bodies.
    states: Vec<ObjectState>,
}

impl LiveIndex {
    fn contains(&self, name: &str) -> bool {
        self.bodies.contains_key(name)
    }

    fn is_destroyable(&self, name: &str) -> bool {
        self.bodies.get(name).is_some_and(|permanent| !permanent)
    }
}

/// Waits until `generation(guard) >= target` or the deadline passes.
///
/// Returns true if the target generation was reached.
fn wait_for_generation<T>(
    condvar: &Condvar,
    guard: &mut MutexGuard<'_, T>,
    generation: impl Fn(&T) -> u64,
    target: u64,
    deadline: Instant,
) -> bool {
    while generation(guard) < target {
        if condvar.wait_until(guard, deadline).timed_out() {
            return generation(guard) >= target;
        }
    }
    true
}

/// Coordinates runtime spawning and destruction of bodies.
///
/// `request_*` may be called from any thread. `drain_*` and `refresh_live`
/// must only be called from the simulation-step thread.
pub struct LifecycleCoordinator {
    config: LifecycleConfig,
    spawn: Mutex<SpawnQueue>,
    spawn_done: Condvar,
    destroy: Mutex<DestroyQueue>,
    destroy_done: Condvar,
    live: RwLock<LiveIndex>,
    /// Operator asked for a fresh peer handshake.
    renegotiate: AtomicBool,
}

impl LifecycleCoordinator {
    /// Creates a coordinator with an empty live index.
    ///
    /// Call [`refresh_live`](Self::refresh_live) once the simulation is
    /// loaded so that requests are filtered against the startup scene.
    #[must_use]
    pub fn new(config: LifecycleConfig) -> Self {
        Self {
            config,
            spawn: Mutex::new(SpawnQueue::default()),
            spawn_done: Condvar::new(),
            destroy: Mutex::new(DestroyQueue::default()),
            destroy_done: Condvar::new(),
            live: RwLock::new(LiveIndex::default()),
            renegotiate: AtomicBool::new(false),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Queues bodies for spawning and waits for the drain that applies them.
    ///
    /// Names that are already live, already pending or repeated inside
    /// `batch` are dropped. Returns the accepted names that are live after
    /// the drain; an entry that failed to apply is absent. Returns an empty
    /// list immediately if nothing was accepted, and an empty list on
    /// timeout (the entries stay queued).
    pub fn request_spawn(&self, batch: Vec<SpawnRequest>) -> Vec<String> {
        if batch.is_empty() {
            return Vec::new();
        }

        let mut queue = self.spawn.lock();
        let accepted: Vec<SpawnRequest> = {
            let live = self.live.read();
            let mut seen = HashSet::new();
            batch
                .into_iter()
                .filter(|request| {
                    !live.contains(&request.name)
                        && !queue.pending.iter().any(|p| p.name == request.name)
                        && seen.insert(request.name.clone())
                })
                .collect()
        };
        if accepted.is_empty() {
            return Vec::new();
        }

        let names: Vec<String> = accepted.iter().map(|request| request.name.clone()).collect();
        queue.pending.extend(accepted);

        let target = queue.generation + 1;
        let deadline = Instant::now() + self.config.wait_timeout();
        if !wait_for_generation(&self.spawn_done, &mut queue, |q| q.generation, target, deadline) {
            tracing::debug!("spawn wait timed out for {:?}", names);
            return Vec::new();
        }
        drop(queue);

        let live = self.live.read();
        names.into_iter().filter(|name| live.contains(name)).collect()
    }

    /// Queues bodies for destruction and waits for the drain that removes
    /// them.
    ///
    /// Only live, non-permanent, not already pending names are accepted.
    /// Returns the last state of every body the drain removed, in request
    /// order. Returns an empty list if nothing was accepted or on timeout.
    pub fn request_destroy(&self, names: Vec<String>) -> Vec<ObjectState> {
        if names.is_empty() {
            return Vec::new();
        }

        let mut queue = self.destroy.lock();
        let accepted: Vec<String> = {
            let live = self.live.read();
            let mut seen = HashSet::new();
            names
                .into_iter()
                .filter(|name| {
                    live.is_destroyable(name)
                        && !queue.pending.contains(name)
                        && seen.insert(name.clone())
                })
                .collect()
        };
        if accepted.is_empty() {
            return Vec::new();
        }

        queue.pending.extend(accepted.iter().cloned());

        let target = queue.generation + 1;
        let deadline = Instant::now() + self.config.wait_timeout();
        if !wait_for_generation(&self.destroy_done, &mut queue, |q| q.generation, target, deadline) {
            tracing::debug!("destroy wait timed out for {:?}", accepted);
            return Vec::new();
        }

        accepted
            .iter()
            .filter_map(|name| queue.destroyed.remove(name).map(|(_, state)| state))
            .collect()
    }

    /// Applies every queued spawn, settles once and wakes all spawn waiters.
    ///
    /// Simulation-step thread only. Returns the number of bodies added.
    pub fn drain_spawns<A>(&self, accessor: &mut A) -> usize
    where
        A: SimulationStateAccessor + ?Sized,
    {
        let mut queue = self.spawn.lock();
        if queue.pending.is_empty() {
            return 0;
        }

        let generation = queue.generation + 1;
        let mut applied = 0;
        while let Some(request) = queue.pending.pop_front() {
            match accessor.spawn_body(&request) {
                Ok(()) => {
                    applied += 1;
                    tracing::info!("[Spawn #{}] {}", generation, request.name);
                }
                Err(e) => {
                    tracing::warn!("[Spawn #{}] skipped {}: {}", generation, request.name, e);
                }
            }
        }

        accessor.apply_and_settle();
        self.refresh_live(&*accessor);

        queue.generation = generation;
        drop(queue);
        self.spawn_done.notify_all();
        applied
    }

    /// Applies every queued destroy, settles once and wakes all destroy
    /// waiters.
    ///
    /// Simulation-step thread only. Returns the number of bodies removed.
    pub fn drain_destroys<A>(&self, accessor: &mut A) -> usize
    where
        A: SimulationStateAccessor + ?Sized,
    {
        let mut queue = self.destroy.lock();
        if queue.pending.is_empty() {
            return 0;
        }

        let generation = queue.generation + 1;
        let mut removed = 0;
        while let Some(name) = queue.pending.pop_front() {
            let state = accessor.object_state(&name);
            match accessor.remove_body(&name) {
                Ok(()) => {
                    removed += 1;
                    tracing::info!("[Destroy #{}] {}", generation, name);
                    if let Some(state) = state {
                        queue.destroyed.insert(name, (generation, state));
                    }
                }
                Err(e) => {
                    tracing::warn!("[Destroy #{}] skipped {}: {}", generation, name, e);
                }
            }
        }

        accessor.apply_and_settle();
        self.refresh_live(&*accessor);

        queue.generation = generation;
        let retention = self.config.destroyed_state_retention;
        queue
            .destroyed
            .retain(|_, (recorded, _)| generation.saturating_sub(*recorded) <= retention);
        drop(queue);
        self.destroy_done.notify_all();
        removed
    }

    /// Rebuilds the live index from the simulation.
    ///
    /// Simulation-step thread only. Called after every drain; the runtime
    /// also calls it once per tick so [`live_states`](Self::live_states)
    /// stays current.
    pub fn refresh_live<A>(&self, accessor: &A)
    where
        A: SimulationStateAccessor + ?Sized,
    {
        let bodies = accessor.bodies();
        let mut index = LiveIndex {
            bodies: HashMap::with_capacity(bodies.len()),
            states: Vec::new(),
        };
        for body in bodies {
            if !body.permanent {
                if let Some(state) = accessor.object_state(&body.name) {
                    index.states.push(state);
                }
            }
            index.bodies.insert(body.name, body.permanent);
        }
        *self.live.write() = index;
    }

    /// States of every live non-permanent body, as of the last refresh.
    #[must_use]
    pub fn live_states(&self) -> Vec<ObjectState> {
        self.live.read().states.clone()
    }

    /// Returns true if the body was live at the last refresh.
    #[must_use]
    pub fn is_live(&self, name: &str) -> bool {
        self.live.read().contains(name)
    }

    /// Asks the simulation-step thread to renegotiate with the peer on its
    /// next tick. Repeated requests before that tick collapse into one.
    pub fn request_renegotiation(&self) {
        self.renegotiate.store(true, Ordering::Release);
        tracing::info!("peer renegotiation requested");
    }

    /// Takes a pending renegotiation request.
    ///
    /// Simulation-step thread only.
    pub fn take_renegotiation(&self) -> bool {
        self.renegotiate.swap(false, Ordering::AcqRel)
    }

    /// Number of completed spawn drains.
    #[must_use]
    pub fn spawn_generation(&self) -> u64 {
        self.spawn.lock().generation
    }

    /// Number of completed destroy drains.
    #[must_use]
    pub fn destroy_generation(&self) -> u64 {
        self.destroy.lock().generation
    }

    /// Number of queued spawn entries.
    #[must_use]
    pub fn pending_spawns(&self) -> usize {
        self.spawn.lock().pending.len()
    }

    /// Number of queued destroy entries.
    #[must_use]
    pub fn pending_destroys(&self) -> usize {
        self.destroy.lock().pending.len()
    }
}

impl Default for LifecycleCoordinator {
    fn default() -> Self {
        Self::new(LifecycleConfig::default())
    }
}
