//! # Simulation State Accessor
//!
//! The seam between the coordination core and the physics integrator.
//!
//! ```text
//! simlink defines:                     the simulator implements:
//! ┌──────────────────────────────┐     ┌─────────────────────────┐
//! │ trait SimulationStateAccessor│ ←── │ impl for its model/data │
//! └──────────────────────────────┘     └─────────────────────────┘
//! ```
//!
//! Only the simulation-step thread ever holds `&mut` to an accessor. Other
//! threads learn about the simulation through snapshots the core publishes.

use crate::error::SimResult;
use crate::object::{BodyId, BodyInfo, JointId, JointInfo, ObjectState, SpawnRequest};

/// What a [`StateSlot`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotTarget {
    /// World position of a body (3 components).
    BodyPosition(BodyId),
    /// World orientation of a body (4 components, `w, x, y, z`).
    BodyQuaternion(BodyId),
    /// Coordinate of a 1-D joint (1 component).
    JointPosition(JointId),
    /// Externally driven position of a mocap body (3 components).
    MocapPosition(BodyId),
    /// Externally driven orientation of a mocap body (4 components).
    MocapQuaternion(BodyId),
}

impl SlotTarget {
    /// Number of scalar components behind this target.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::BodyPosition(_) | Self::MocapPosition(_) => 3,
            Self::BodyQuaternion(_) | Self::MocapQuaternion(_) => 4,
            Self::JointPosition(_) => 1,
        }
    }
}

/// One scalar inside the simulation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StateSlot {
    /// The attribute.
    pub target: SlotTarget,
    /// Component index, `< target.width()`.
    pub component: u8,
}

impl StateSlot {
    /// Expands a target into its component slots, in component order.
    pub fn expand(target: SlotTarget) -> impl Iterator<Item = Self> {
        (0..target.width()).map(move |component| Self {
            target,
            // width() is at most 4
            component: component as u8,
        })
    }
}

/// Access to the live simulation.
///
/// Structural mutations (`spawn_body`, `remove_body`) and slot writes are
/// committed by [`apply_and_settle`](Self::apply_and_settle), which also
/// recomputes derived kinematics.
pub trait SimulationStateAccessor {
    /// All live bodies.
    fn bodies(&self) -> Vec<BodyInfo>;

    /// Looks up a live body by name.
    fn body(&self, name: &str) -> Option<BodyInfo>;

    /// All live joints.
    fn joints(&self) -> Vec<JointInfo>;

    /// Current state of a live body.
    fn object_state(&self, name: &str) -> Option<ObjectState>;

    /// Changes whenever bodies or joints are added or removed.
    fn structure_version(&self) -> u64;

    /// Adds a body described by `request`.
    ///
    /// # Errors
    ///
    /// Fails if the name is taken, a resource is missing or the descriptor
    /// is invalid. Nothing is added on failure.
    fn spawn_body(&mut self, request: &SpawnRequest) -> SimResult<()>;

    /// Removes a non-permanent body.
    ///
    /// # Errors
    ///
    /// Fails if the body is unknown or permanent.
    fn remove_body(&mut self, name: &str) -> SimResult<()>;

    /// Reads one scalar.
    ///
    /// # Errors
    ///
    /// Fails if the slot does not resolve in the current structure version.
    fn read_slot(&self, slot: StateSlot) -> SimResult<f64>;

    /// Writes one scalar.
    ///
    /// # Errors
    ///
    /// Fails if the slot does not resolve in the current structure version.
    fn write_slot(&mut self, slot: StateSlot, value: f64) -> SimResult<()>;

    /// Commits pending changes and brings the model to a consistent state.
    fn apply_and_settle(&mut self);

    /// Returns true if a body with that name is live.
    fn has_body(&self, name: &str) -> bool {
        self.body(name).is_some()
    }
}
