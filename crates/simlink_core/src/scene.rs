//! # Scene World
//!
//! Reference implementation of [`SimulationStateAccessor`]: a kinematic
//! world of named rigid bodies.
//!
//! It integrates free bodies with constant velocity and copies mocap targets
//! into mocap-driven bodies. There is no collision or dynamics. The real
//! physics integrator plugs in behind the same trait; `SceneWorld` is what
//! the runtime uses when no integrator is linked, and what the tests drive.
//!
//! ## Body Kinds
//!
//! | Kind   | Degrees of freedom | Pose driven by              |
//! |--------|--------------------|-----------------------------|
//! | Static | 0                  | nothing                     |
//! | Free   | 6                  | velocity integration        |
//! | Mocap  | 0                  | mocap target (external)     |
//!
//! Hinge and slide joints add one degree of freedom each to their body.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::access::{SimulationStateAccessor, SlotTarget, StateSlot};
use crate::error::{SimError, SimResult};
use crate::math::{Pose, Twist, Vec3};
use crate::object::{
    BodyId, BodyInfo, JointId, JointInfo, JointKind, ObjectState, Shape, SpawnRequest,
};

/// Name of the implicit root body.
pub const WORLD_BODY: &str = "world";

/// How a fixture body moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureKind {
    /// Never moves.
    Static,
    /// Free-floating, six degrees of freedom.
    Free,
    /// Pose driven externally.
    Mocap,
}

#[derive(Clone, Debug)]
struct SceneBody {
    name: String,
    pose: Pose,
    velocity: Twist,
    /// Mocap target, present only for mocap-driven bodies.
    mocap: Option<Pose>,
    free: bool,
    dof: u32,
    permanent: bool,
}

#[derive(Clone, Debug)]
struct SceneJoint {
    name: String,
    kind: JointKind,
    body: BodyId,
    position: f64,
    velocity: f64,
}

/// Kinematic reference world.
#[derive(Debug)]
pub struct SceneWorld {
    bodies: BTreeMap<BodyId, SceneBody>,
    names: HashMap<String, BodyId>,
    joints: BTreeMap<JointId, SceneJoint>,
    meshes: HashSet<String>,
    next_body: u32,
    next_joint: u32,
    structure_version: u64,
    settle_count: u64,
    time: f64,
}

impl SceneWorld {
    /// Creates a world containing only the permanent root body.
    #[must_use]
    pub fn new() -> Self {
        let mut world = Self {
            bodies: BTreeMap::new(),
            names: HashMap::new(),
            joints: BTreeMap::new(),
            meshes: HashSet::new(),
            next_body: 0,
            next_joint: 0,
            structure_version: 0,
            settle_count: 0,
            time: 0.0,
        };
        world.insert_body(WORLD_BODY, Pose::IDENTITY, FixtureKind::Static, true);
        world
    }

    /// Adds a permanent body that is part of the loaded scene.
    ///
    /// # Errors
    ///
    /// Fails if the name is already taken.
    pub fn add_fixture(&mut self, name: &str, pose: Pose, kind: FixtureKind) -> SimResult<BodyId> {
        if self.names.contains_key(name) {
            return Err(SimError::DuplicateBody(name.to_string()));
        }
        Ok(self.insert_body(name, pose, kind, true))
    }

    /// Adds a joint to an existing body.
    ///
    /// # Errors
    ///
    /// Fails if the body is unknown.
    pub fn add_joint(&mut self, name: &str, kind: JointKind, body: &str) -> SimResult<JointId> {
        let body_id = *self
            .names
            .get(body)
            .ok_or_else(|| SimError::UnknownBody(body.to_string()))?;
        if let Some(scene_body) = self.bodies.get_mut(&body_id) {
            scene_body.dof += kind.dof();
        }

        let id = JointId(self.next_joint);
        self.next_joint += 1;
        self.joints.insert(
            id,
            SceneJoint {
                name: name.to_string(),
                kind,
                body: body_id,
                position: 0.0,
                velocity: 0.0,
            },
        );
        self.structure_version += 1;
        Ok(id)
    }

    /// Makes a mesh resource available to spawn requests.
    pub fn register_mesh(&mut self, resource: impl Into<String>) {
        self.meshes.insert(resource.into());
    }

    /// Sets the velocity of a free body.
    ///
    /// # Errors
    ///
    /// Fails if the body is unknown.
    pub fn set_velocity(&mut self, name: &str, velocity: Twist) -> SimResult<()> {
        let body = self.body_mut(name)?;
        if body.free {
            body.velocity = velocity;
        }
        Ok(())
    }

    /// Sets the velocity of a 1-D joint.
    ///
    /// # Errors
    ///
    /// Fails if no joint has that name.
    pub fn set_joint_velocity(&mut self, name: &str, velocity: f64) -> SimResult<()> {
        let joint = self
            .joints
            .values_mut()
            .find(|joint| joint.name == name)
            .ok_or_else(|| SimError::UnknownSlot(name.to_string()))?;
        joint.velocity = velocity;
        Ok(())
    }

    /// Number of `apply_and_settle` calls so far.
    #[must_use]
    pub const fn settle_count(&self) -> u64 {
        self.settle_count
    }

    /// Simulated time in seconds.
    #[must_use]
    pub const fn time(&self) -> f64 {
        self.time
    }

    /// Advances the world by `dt` seconds.
    pub fn step(&mut self, dt: f64) {
        for body in self.bodies.values_mut() {
            if let Some(target) = body.mocap {
                body.pose = target;
            } else if body.free {
                body.pose.position = body.pose.position + body.velocity.linear * dt;
                body.pose.orientation = body.pose.orientation.integrate(body.velocity.angular, dt);
            }
        }
        for joint in self.joints.values_mut() {
            joint.position += joint.velocity * dt;
        }
        self.time += dt;
    }

    fn insert_body(&mut self, name: &str, pose: Pose, kind: FixtureKind, permanent: bool) -> BodyId {
        let id = BodyId(self.next_body);
        self.next_body += 1;
        let body = SceneBody {
            name: name.to_string(),
            pose,
            velocity: Twist::ZERO,
            mocap: (kind == FixtureKind::Mocap).then_some(pose),
            free: kind == FixtureKind::Free,
            dof: if kind == FixtureKind::Free { JointKind::Free.dof() } else { 0 },
            permanent,
        };
        self.bodies.insert(id, body);
        self.names.insert(name.to_string(), id);
        self.structure_version += 1;
        id
    }

    fn body_mut(&mut self, name: &str) -> SimResult<&mut SceneBody> {
        let id = self
            .names
            .get(name)
            .ok_or_else(|| SimError::UnknownBody(name.to_string()))?;
        self.bodies
            .get_mut(id)
            .ok_or_else(|| SimError::UnknownBody(name.to_string()))
    }

    fn body_by_id(&self, id: BodyId) -> SimResult<&SceneBody> {
        self.bodies
            .get(&id)
            .ok_or_else(|| SimError::UnknownSlot(format!("body #{}", id.0)))
    }

    fn body_by_id_mut(&mut self, id: BodyId) -> SimResult<&mut SceneBody> {
        self.bodies
            .get_mut(&id)
            .ok_or_else(|| SimError::UnknownSlot(format!("body #{}", id.0)))
    }

    fn validate(&self, request: &SpawnRequest) -> SimResult<()> {
        let invalid = |reason: &str| SimError::InvalidDescriptor {
            name: request.name.clone(),
            reason: reason.to_string(),
        };

        if request.name.is_empty() {
            return Err(invalid("empty name"));
        }
        match &request.shape {
            Shape::Box { size } => {
                if size.x <= 0.0 || size.y <= 0.0 || size.z <= 0.0 {
                    return Err(invalid("box half-extents must be positive"));
                }
            }
            Shape::Sphere { radius } => {
                if *radius <= 0.0 {
                    return Err(invalid("sphere radius must be positive"));
                }
            }
            Shape::Cylinder { radius, half_length } => {
                if *radius <= 0.0 || *half_length <= 0.0 {
                    return Err(invalid("cylinder dimensions must be positive"));
                }
            }
            Shape::Mesh { resource, .. } => {
                if !self.meshes.contains(resource) {
                    return Err(SimError::ResourceUnavailable(resource.clone()));
                }
            }
        }
        if let Some(inertial) = &request.inertial {
            inertial.check().map_err(invalid)?;
        }
        if !request.rgba.in_range() {
            return Err(invalid("color components must lie in [0, 1]"));
        }
        Ok(())
    }

    fn info(id: BodyId, body: &SceneBody) -> BodyInfo {
        BodyInfo {
            id,
            name: body.name.clone(),
            dof: body.dof,
            mocap: body.mocap.is_some(),
            permanent: body.permanent,
        }
    }
}

impl Default for SceneWorld {
    fn default() -> Self {
        Self::new()
    }
}

fn component(values: &[f64], slot: StateSlot) -> SimResult<f64> {
    values
        .get(usize::from(slot.component))
        .copied()
        .ok_or_else(|| SimError::UnknownSlot(format!("{slot:?}")))
}

fn set_component<const N: usize>(values: &mut [f64; N], slot: StateSlot, value: f64) -> SimResult<()> {
    let entry = values
        .get_mut(usize::from(slot.component))
        .ok_or_else(|| SimError::UnknownSlot(format!("{slot:?}")))?;
    *entry = value;
    Ok(())
}

impl SimulationStateAccessor for SceneWorld {
    fn bodies(&self) -> Vec<BodyInfo> {
        self.bodies.iter().map(|(id, body)| Self::info(*id, body)).collect()
    }

    fn body(&self, name: &str) -> Option<BodyInfo> {
        let id = self.names.get(name)?;
        self.bodies.get(id).map(|body| Self::info(*id, body))
    }

    fn joints(&self) -> Vec<JointInfo> {
        self.joints
            .iter()
            .map(|(id, joint)| JointInfo {
                id: *id,
                name: joint.name.clone(),
                kind: joint.kind,
                body: joint.body,
            })
            .collect()
    }

    fn object_state(&self, name: &str) -> Option<ObjectState> {
        let id = self.names.get(name)?;
        let body = self.bodies.get(id)?;
        Some(ObjectState {
            name: body.name.clone(),
            pose: body.pose,
            velocity: body.velocity,
        })
    }

    fn structure_version(&self) -> u64 {
        self.structure_version
    }

    fn spawn_body(&mut self, request: &SpawnRequest) -> SimResult<()> {
        if self.names.contains_key(&request.name) {
            return Err(SimError::DuplicateBody(request.name.clone()));
        }
        self.validate(request)?;

        let pose = Pose::new(request.pose.position, request.pose.orientation.normalized());
        let kind = if request.movable { FixtureKind::Free } else { FixtureKind::Mocap };
        let id = self.insert_body(&request.name, pose, kind, false);
        if request.movable {
            if let Some(body) = self.bodies.get_mut(&id) {
                body.velocity = request.velocity;
            }
        }
        tracing::debug!("scene: added body {} (#{})", request.name, id.0);
        Ok(())
    }

    fn remove_body(&mut self, name: &str) -> SimResult<()> {
        let id = *self
            .names
            .get(name)
            .ok_or_else(|| SimError::UnknownBody(name.to_string()))?;
        if self.bodies.get(&id).is_some_and(|body| body.permanent) {
            return Err(SimError::PermanentBody(name.to_string()));
        }
        self.bodies.remove(&id);
        self.names.remove(name);
        self.joints.retain(|_, joint| joint.body != id);
        self.structure_version += 1;
        tracing::debug!("scene: removed body {} (#{})", name, id.0);
        Ok(())
    }

    fn read_slot(&self, slot: StateSlot) -> SimResult<f64> {
        match slot.target {
            SlotTarget::BodyPosition(id) => {
                component(&self.body_by_id(id)?.pose.position.to_array(), slot)
            }
            SlotTarget::BodyQuaternion(id) => {
                component(&self.body_by_id(id)?.pose.orientation.to_array(), slot)
            }
            SlotTarget::JointPosition(id) => {
                let joint = self
                    .joints
                    .get(&id)
                    .ok_or_else(|| SimError::UnknownSlot(format!("joint #{}", id.0)))?;
                component(&[joint.position], slot)
            }
            SlotTarget::MocapPosition(id) | SlotTarget::MocapQuaternion(id) => {
                let target = self
                    .body_by_id(id)?
                    .mocap
                    .ok_or_else(|| SimError::UnknownSlot(format!("body #{} is not mocap", id.0)))?;
                if matches!(slot.target, SlotTarget::MocapPosition(_)) {
                    component(&target.position.to_array(), slot)
                } else {
                    component(&target.orientation.to_array(), slot)
                }
            }
        }
    }

    fn write_slot(&mut self, slot: StateSlot, value: f64) -> SimResult<()> {
        match slot.target {
            SlotTarget::BodyPosition(id) => {
                let body = self.body_by_id_mut(id)?;
                let mut position = body.pose.position.to_array();
                set_component(&mut position, slot, value)?;
                body.pose.position = Vec3::from_array(position);
            }
            SlotTarget::BodyQuaternion(id) => {
                let body = self.body_by_id_mut(id)?;
                let mut orientation = body.pose.orientation.to_array();
                set_component(&mut orientation, slot, value)?;
                body.pose.orientation = crate::math::Quaternion::from_array(orientation);
            }
            SlotTarget::JointPosition(id) => {
                let joint = self
                    .joints
                    .get_mut(&id)
                    .ok_or_else(|| SimError::UnknownSlot(format!("joint #{}", id.0)))?;
                let mut position = [joint.position];
                set_component(&mut position, slot, value)?;
                joint.position = position[0];
            }
            SlotTarget::MocapPosition(id) | SlotTarget::MocapQuaternion(id) => {
                let body = self.body_by_id_mut(id)?;
                let target = body
                    .mocap
                    .as_mut()
                    .ok_or_else(|| SimError::UnknownSlot(format!("body #{} is not mocap", id.0)))?;
                if matches!(slot.target, SlotTarget::MocapPosition(_)) {
                    let mut position = target.position.to_array();
                    set_component(&mut position, slot, value)?;
                    target.position = Vec3::from_array(position);
                } else {
                    let mut orientation = target.orientation.to_array();
                    set_component(&mut orientation, slot, value)?;
                    target.orientation = crate::math::Quaternion::from_array(orientation);
                }
            }
        }
        Ok(())
    }

    fn apply_and_settle(&mut self) {
        for body in self.bodies.values_mut() {
            if let Some(target) = body.mocap {
                body.pose = Pose::new(target.position, target.orientation.normalized());
            } else {
                body.pose.orientation = body.pose.orientation.normalized();
            }
        }
        self.settle_count += 1;
    }
}
