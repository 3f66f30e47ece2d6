//! # SIMLINK Lifecycle
//!
//! Runtime spawning and destruction of simulated bodies.
//!
//! ## Design Principles
//!
//! 1. **Single writer** - only the simulation-step thread applies changes
//! 2. **Batched settle** - one `apply_and_settle` per drain, never per entry
//! 3. **Bounded waits** - callers block at most `wait_timeout_ms`
//! 4. **Partial success** - a failing entry never blocks the rest of its batch
//!
//! ## Example
//!
//! ```rust,ignore
//! use simlink_lifecycle::{LifecycleCoordinator, Orchestrator};
//!
//! let coordinator = Arc::new(LifecycleCoordinator::default());
//! let orchestrator = Orchestrator::new(Arc::clone(&coordinator));
//!
//! // orchestration thread
//! let names = orchestrator.spawn_objects(vec![SpawnRequest::boxed("box1", half)]);
//!
//! // simulation-step thread, once per tick
//! coordinator.drain_spawns(&mut world);
//! coordinator.drain_destroys(&mut world);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod coordinator;
pub mod orchestration;

pub use coordinator::{LifecycleConfig, LifecycleCoordinator};
pub use orchestration::{OrchestrationRequest, OrchestrationResponse, Orchestrator};
