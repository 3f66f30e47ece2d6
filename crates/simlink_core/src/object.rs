//! # Object Descriptors
//!
//! Types that cross the orchestration boundary: what to spawn, and the
//! state handed back when a body goes away.

use serde::{Deserialize, Serialize};

use crate::math::{Pose, Twist, Vec3};

/// Opaque body identifier inside a simulation.
///
/// Identifiers are only meaningful for one structure version of the
/// simulation; see [`crate::SimulationStateAccessor::structure_version`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BodyId(pub u32);

/// Opaque joint identifier inside a simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JointId(pub u32);

/// Geometric shape of a spawned body.
///
/// Dimensions are half-extents, as the simulator expects them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// Axis-aligned box.
    Box {
        /// Half-extents along x, y, z.
        size: Vec3,
    },
    /// Sphere.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// Cylinder along the local z axis.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Half of the cylinder length.
        half_length: f64,
    },
    /// Reference to a mesh resource known to the simulation.
    Mesh {
        /// Resource name (without extension).
        resource: String,
        /// Per-axis scale.
        #[serde(default = "unit_scale")]
        scale: Vec3,
    },
}

fn unit_scale() -> Vec3 {
    Vec3::new(1.0, 1.0, 1.0)
}

/// Mass properties of a spawned body.
///
/// A zero mass means "let the simulator derive it from the geometry".
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Inertial {
    /// Mass in kilograms.
    pub mass: f64,
    /// Center of mass offset in the body frame.
    pub com: Vec3,
    /// Inertia tensor component.
    pub ixx: f64,
    /// Inertia tensor component.
    pub ixy: f64,
    /// Inertia tensor component.
    pub ixz: f64,
    /// Inertia tensor component.
    pub iyy: f64,
    /// Inertia tensor component.
    pub iyz: f64,
    /// Inertia tensor component.
    pub izz: f64,
}

impl Inertial {
    /// Returns true if a full inertia tensor was given.
    #[must_use]
    pub fn has_full_inertia(&self) -> bool {
        [self.ixx, self.ixy, self.ixz, self.iyy, self.iyz, self.izz]
            .iter()
            .any(|v| *v != 0.0)
    }

    /// Checks that the mass properties describe a physical body.
    ///
    /// A given tensor needs positive principal moments that satisfy the
    /// triangle inequality. Without a tensor only the mass is checked.
    ///
    /// # Errors
    ///
    /// Returns the reason the properties are rejected.
    pub fn check(&self) -> Result<(), &'static str> {
        if !self.mass.is_finite() || self.mass < 0.0 {
            return Err("mass must be finite and non-negative");
        }
        if !self.has_full_inertia() {
            return Ok(());
        }
        let (ixx, iyy, izz) = (self.ixx, self.iyy, self.izz);
        if ixx <= 0.0 || iyy <= 0.0 || izz <= 0.0 {
            return Err("principal moments of inertia must be positive");
        }
        if ixx + iyy < izz || iyy + izz < ixx || ixx + izz < iyy {
            return Err("moments of inertia violate the triangle inequality");
        }
        Ok(())
    }
}

/// RGBA color, components in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Default for Rgba {
    fn default() -> Self {
        Self { r: 0.5, g: 0.5, b: 0.5, a: 1.0 }
    }
}

impl Rgba {
    /// Returns true if every component lies in `[0, 1]`.
    #[must_use]
    pub fn in_range(&self) -> bool {
        [self.r, self.g, self.b, self.a]
            .iter()
            .all(|c| (0.0..=1.0).contains(c))
    }
}

/// Request to add one body to the running simulation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnRequest {
    /// Unique body name.
    pub name: String,
    /// Geometry.
    pub shape: Shape,
    /// Optional mass properties.
    #[serde(default)]
    pub inertial: Option<Inertial>,
    /// Initial pose.
    #[serde(default)]
    pub pose: Pose,
    /// Initial velocity, applied to movable bodies only.
    #[serde(default)]
    pub velocity: Twist,
    /// Movable bodies get a free joint; anchored ones are mocap-driven.
    #[serde(default = "default_movable")]
    pub movable: bool,
    /// Display color.
    #[serde(default)]
    pub rgba: Rgba,
}

fn default_movable() -> bool {
    true
}

impl SpawnRequest {
    /// Creates a movable box at the identity pose.
    #[must_use]
    pub fn boxed(name: impl Into<String>, half_extents: Vec3) -> Self {
        Self {
            name: name.into(),
            shape: Shape::Box { size: half_extents },
            inertial: None,
            pose: Pose::IDENTITY,
            velocity: Twist::ZERO,
            movable: true,
            rgba: Rgba::default(),
        }
    }

    /// Sets the initial pose.
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Sets the initial velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Twist) -> Self {
        self.velocity = velocity;
        self
    }

    /// Marks the body as anchored (mocap-driven, zero degrees of freedom).
    #[must_use]
    pub fn anchored(mut self) -> Self {
        self.movable = false;
        self
    }
}

/// Last-known state of a body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    /// Body name.
    pub name: String,
    /// World pose.
    pub pose: Pose,
    /// Velocity (zero for bodies without a free joint).
    pub velocity: Twist,
}

/// Read-only description of a body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyInfo {
    /// Identifier for the current structure version.
    pub id: BodyId,
    /// Body name.
    pub name: String,
    /// Degrees of freedom contributed by the body's joints.
    pub dof: u32,
    /// Whether the pose is driven externally (mocap).
    pub mocap: bool,
    /// Permanent bodies belong to the loaded scene and cannot be destroyed.
    pub permanent: bool,
}

/// Kind of a joint.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JointKind {
    /// Six degrees of freedom.
    Free,
    /// Three rotational degrees of freedom.
    Ball,
    /// One rotational degree of freedom.
    Hinge,
    /// One translational degree of freedom.
    Slide,
}

impl JointKind {
    /// Number of degrees of freedom.
    #[must_use]
    pub const fn dof(self) -> u32 {
        match self {
            Self::Free => 6,
            Self::Ball => 3,
            Self::Hinge | Self::Slide => 1,
        }
    }

    /// Hinge and slide joints carry a single scalar coordinate.
    #[must_use]
    pub const fn is_one_dimensional(self) -> bool {
        matches!(self, Self::Hinge | Self::Slide)
    }
}

/// Read-only description of a joint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JointInfo {
    /// Identifier for the current structure version.
    pub id: JointId,
    /// Joint name.
    pub name: String,
    /// Joint kind.
    pub kind: JointKind,
    /// Body the joint moves.
    pub body: BodyId,
}
