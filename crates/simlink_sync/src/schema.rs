//! # Sync Schema
//!
//! Resolves the configured send/receive lists against the live simulation
//! and fixes the buffer layout for one session.
//!
//! ## Buffer Layout
//!
//! ```text
//! index:  0           1 ..                                   N
//!        ┌───────────┬──────────────────────┬───────────────┬───┐
//!        │ timestamp │ obj A: position x,y,z│ obj A: quat   │...│
//!        └───────────┴──────────────────────┴───────────────┴───┘
//! ```
//!
//! Objects are ordered by name, attributes in configured order. The
//! indirection table (one [`StateSlot`] per number) is resolved here once
//! and reused every tick until the next negotiation.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use simlink_core::{
    BodyId, BodyInfo, JointId, SimResult, SimulationStateAccessor, SlotTarget, StateSlot,
};

use crate::buffer::SyncBuffer;
use crate::config::{AttributeTag, SyncConfig, BODY_GROUP, JOINT_1D_GROUP};
use crate::error::SyncResult;

/// Clock unit of the timestamp slot.
pub const CLOCK_UNIT: &str = "microseconds";

type Bindings = BTreeMap<String, Vec<(AttributeTag, SlotTarget)>>;
type TagMap = BTreeMap<String, Vec<AttributeTag>>;

/// Negotiation document sent to the peer.
#[derive(Serialize)]
struct SchemaDocument<'a> {
    time: &'static str,
    simulator: &'a str,
    #[serde(skip_serializing_if = "is_empty")]
    send: &'a TagMap,
    #[serde(skip_serializing_if = "is_empty")]
    receive: &'a TagMap,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_empty(map: &&TagMap) -> bool {
    map.is_empty()
}

fn body_targets(id: BodyId, tags: &[AttributeTag]) -> Vec<(AttributeTag, SlotTarget)> {
    tags.iter()
        .map(|tag| match tag {
            AttributeTag::Position => (*tag, SlotTarget::BodyPosition(id)),
            AttributeTag::Quaternion => (*tag, SlotTarget::BodyQuaternion(id)),
        })
        .collect()
}

fn proxy_targets(id: BodyId, tags: &[AttributeTag]) -> Vec<(AttributeTag, SlotTarget)> {
    tags.iter()
        .map(|tag| match tag {
            AttributeTag::Position => (*tag, SlotTarget::MocapPosition(id)),
            AttributeTag::Quaternion => (*tag, SlotTarget::MocapQuaternion(id)),
        })
        .collect()
}

/// A 1-D joint only has a position.
fn joint_targets(id: JointId, tags: &[AttributeTag]) -> Vec<(AttributeTag, SlotTarget)> {
    tags.iter()
        .filter(|tag| **tag == AttributeTag::Position)
        .map(|tag| (*tag, SlotTarget::JointPosition(id)))
        .collect()
}

fn flatten(bindings: Bindings) -> (TagMap, Vec<StateSlot>) {
    let slots = bindings
        .values()
        .flatten()
        .flat_map(|(_, target)| StateSlot::expand(*target))
        .collect();
    let tags = bindings
        .into_iter()
        .map(|(name, entries)| (name, entries.into_iter().map(|(tag, _)| tag).collect()))
        .collect();
    (tags, slots)
}

/// Layout of one negotiated session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncSchema {
    simulator: String,
    send: TagMap,
    receive: TagMap,
    send_slots: Vec<StateSlot>,
    receive_slots: Vec<StateSlot>,
    structure_version: u64,
}

impl SyncSchema {
    /// Resolves `config` against the bodies and joints currently live.
    ///
    /// Send keys:
    /// - `body`: every body with degrees of freedom that is neither
    ///   mocap-driven nor a receive object
    /// - `joint_1D`: every hinge/slide joint that is not a receive object
    /// - anything else: the body of that name
    ///
    /// A receive object `X` binds to the mocap body `X` + `proxy_suffix`.
    /// Objects that do not resolve are left out with a warning.
    pub fn derive<A>(config: &SyncConfig, accessor: &A) -> Self
    where
        A: SimulationStateAccessor + ?Sized,
    {
        let bodies = accessor.bodies();
        let by_name: HashMap<&str, &BodyInfo> =
            bodies.iter().map(|body| (body.name.as_str(), body)).collect();

        let mut receive = Bindings::new();
        for (name, tags) in &config.receive {
            let proxy = format!("{name}{}", config.proxy_suffix);
            match by_name.get(proxy.as_str()) {
                Some(body) if body.mocap => {
                    receive.insert(name.clone(), proxy_targets(body.id, tags));
                }
                _ => tracing::warn!("sync: receive object {} has no mocap proxy {}, skipped", name, proxy),
            }
        }

        let mut send = Bindings::new();
        if let Some(tags) = config.send.get(BODY_GROUP) {
            for body in bodies
                .iter()
                .filter(|body| body.dof > 0 && !body.mocap && !config.receive.contains_key(&body.name))
            {
                send.insert(body.name.clone(), body_targets(body.id, tags));
            }
        }
        if let Some(tags) = config.send.get(JOINT_1D_GROUP) {
            for joint in accessor
                .joints()
                .into_iter()
                .filter(|joint| joint.kind.is_one_dimensional() && !config.receive.contains_key(&joint.name))
            {
                send.insert(joint.name, joint_targets(joint.id, tags));
            }
        }
        for (key, tags) in &config.send {
            if key == BODY_GROUP || key == JOINT_1D_GROUP {
                continue;
            }
            match by_name.get(key.as_str()) {
                Some(body) => {
                    send.insert(key.clone(), body_targets(body.id, tags));
                }
                None => tracing::warn!("sync: send object {} is not a live body, skipped", key),
            }
        }

        let (send, send_slots) = flatten(send);
        let (receive, receive_slots) = flatten(receive);
        Self {
            simulator: config.simulator.clone(),
            send,
            receive,
            send_slots,
            receive_slots,
            structure_version: accessor.structure_version(),
        }
    }

    /// Serializes the negotiation document.
    ///
    /// # Errors
    ///
    /// Fails only if JSON encoding fails.
    pub fn document(&self) -> SyncResult<String> {
        let document = SchemaDocument {
            time: CLOCK_UNIT,
            simulator: &self.simulator,
            send: &self.send,
            receive: &self.receive,
        };
        Ok(serde_json::to_string(&document)?)
    }

    /// Send buffer length in doubles, timestamp included.
    #[must_use]
    pub fn send_size(&self) -> usize {
        1 + self.send_slots.len()
    }

    /// Receive buffer length in doubles, timestamp included.
    #[must_use]
    pub fn receive_size(&self) -> usize {
        1 + self.receive_slots.len()
    }

    /// Structure version of the simulation the schema was derived from.
    #[must_use]
    pub const fn structure_version(&self) -> u64 {
        self.structure_version
    }

    /// Whether `other` would negotiate the same session: same document and
    /// the same slot table. Structure versions are not compared.
    #[must_use]
    pub fn same_layout(&self, other: &Self) -> bool {
        self.simulator == other.simulator
            && self.send == other.send
            && self.receive == other.receive
            && self.send_slots == other.send_slots
            && self.receive_slots == other.receive_slots
    }

    /// Send objects and their attributes.
    #[must_use]
    pub const fn send_objects(&self) -> &BTreeMap<String, Vec<AttributeTag>> {
        &self.send
    }

    /// Receive objects and their attributes.
    #[must_use]
    pub const fn receive_objects(&self) -> &BTreeMap<String, Vec<AttributeTag>> {
        &self.receive
    }

    /// Copies the bound simulation values into slots `1..` of `buffer`.
    ///
    /// # Errors
    ///
    /// Fails if a bound slot no longer resolves.
    pub fn read_into<A>(&self, accessor: &A, buffer: &mut SyncBuffer) -> SimResult<()>
    where
        A: SimulationStateAccessor + ?Sized,
    {
        for (value, slot) in buffer.values_mut().iter_mut().skip(1).zip(&self.send_slots) {
            *value = accessor.read_slot(*slot)?;
        }
        Ok(())
    }

    /// Copies slots `1..` of `buffer` into the bound simulation values.
    ///
    /// # Errors
    ///
    /// Fails if a bound slot no longer resolves.
    pub fn write_from<A>(&self, buffer: &SyncBuffer, accessor: &mut A) -> SimResult<()>
    where
        A: SimulationStateAccessor + ?Sized,
    {
        for (value, slot) in buffer.values().iter().skip(1).zip(&self.receive_slots) {
            accessor.write_slot(*slot, *value)?;
        }
        Ok(())
    }
}
