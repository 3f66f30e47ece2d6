//! Mathematical types shared between the simulation, the orchestration layer
//! and the external peer.
//!
//! Everything is `f64`: these values are copied bit-exact into the peer
//! exchange buffers.

use serde::{Deserialize, Serialize};

/// 3D Vector - position, velocity, size
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f64; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Returns true if every component is exactly zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Unit quaternion for orientations.
///
/// Component order is `w, x, y, z` everywhere: in memory, in the schema and
/// on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    /// W (scalar) component
    pub w: f64,
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Quaternion {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 0.0);

    /// Converts to array in `w, x, y, z` order
    #[must_use]
    pub const fn to_array(self) -> [f64; 4] {
        [self.w, self.x, self.y, self.z]
    }

    /// Creates from an array in `w, x, y, z` order
    #[must_use]
    pub const fn from_array(arr: [f64; 4]) -> Self {
        Self::new(arr[0], arr[1], arr[2], arr[3])
    }

    /// Returns the normalized quaternion, or identity for a zero quaternion.
    #[must_use]
    pub fn normalized(self) -> Self {
        let norm = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if norm <= f64::EPSILON {
            return Self::IDENTITY;
        }
        Self::new(self.w / norm, self.x / norm, self.y / norm, self.z / norm)
    }

    /// Advances the orientation by a world-frame angular velocity over `dt`.
    #[must_use]
    pub fn integrate(self, angular: Vec3, dt: f64) -> Self {
        // q' = q + 0.5 * dt * (0, w) * q
        let half_dt = 0.5 * dt;
        let (ox, oy, oz) = (angular.x, angular.y, angular.z);
        Self::new(
            self.w + half_dt * (-ox * self.x - oy * self.y - oz * self.z),
            self.x + half_dt * (ox * self.w + oy * self.z - oz * self.y),
            self.y + half_dt * (oy * self.w + oz * self.x - ox * self.z),
            self.z + half_dt * (oz * self.w + ox * self.y - oy * self.x),
        )
        .normalized()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Pose - position + orientation
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position
    pub position: Vec3,
    /// Orientation
    pub orientation: Quaternion,
}

impl Pose {
    /// Creates a new pose
    #[must_use]
    pub const fn new(position: Vec3, orientation: Quaternion) -> Self {
        Self { position, orientation }
    }

    /// Identity pose
    pub const IDENTITY: Self = Self::new(Vec3::ZERO, Quaternion::IDENTITY);
}

/// Twist - linear + angular velocity
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    /// Linear velocity
    pub linear: Vec3,
    /// Angular velocity
    pub angular: Vec3,
}

impl Twist {
    /// Creates a new twist
    #[must_use]
    pub const fn new(linear: Vec3, angular: Vec3) -> Self {
        Self { linear, angular }
    }

    /// Zero twist
    pub const ZERO: Self = Self::new(Vec3::ZERO, Vec3::ZERO);
}
