//! # SIMLINK Core
//!
//! The simulation state model shared by the lifecycle coordinator, the
//! synchronization bridge and the runtime.
//!
//! ## Contents
//!
//! - **Math**: `Vec3`, `Quaternion` (`w, x, y, z`), `Pose`, `Twist`
//! - **Descriptors**: `SpawnRequest`, `ObjectState`, body/joint info
//! - **Accessor seam**: `SimulationStateAccessor`, implemented by the physics
//!   integrator, with scalar `StateSlot` addressing for the peer exchange
//! - **SceneWorld**: kinematic reference implementation of the accessor
//!
//! ## Threading
//!
//! ```text
//! orchestration threads        simulation-step thread       peer
//!        │                              │                     │
//!        │  enqueue (lifecycle)         │ &mut accessor       │
//!        ├─────────────────────────────►│ drain + settle      │
//!        │                              │ exchange (sync) ◄──►│
//! ```
//!
//! The simulation-step thread is the single writer of simulation state.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod access;
pub mod error;
pub mod math;
pub mod object;
pub mod scene;

pub use access::{SimulationStateAccessor, SlotTarget, StateSlot};
pub use error::{SimError, SimResult};
pub use math::{Pose, Quaternion, Twist, Vec3};
pub use object::{
    BodyId, BodyInfo, Inertial, JointId, JointInfo, JointKind, ObjectState, Rgba, Shape,
    SpawnRequest,
};
pub use scene::{FixtureKind, SceneWorld, WORLD_BODY};
