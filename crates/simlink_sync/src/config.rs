//! # Sync Configuration
//!
//! Which objects and attributes are exchanged with the peer, and where the
//! peer lives.
//!
//! ```toml
//! [sync]
//! enabled = true
//! port = 7500
//!
//! [sync.send]
//! body = ["position", "quaternion"]   # every free body
//! joint_1D = ["position"]             # every hinge/slide joint
//!
//! [sync.receive]
//! cup = ["position", "quaternion"]    # drives the mocap body "cup_ref"
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Send key that expands to every live body with degrees of freedom.
pub const BODY_GROUP: &str = "body";

/// Send key that expands to every hinge and slide joint.
pub const JOINT_1D_GROUP: &str = "joint_1D";

/// An attribute of an object exchanged with the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeTag {
    /// `x, y, z` (one number for a 1-D joint).
    Position,
    /// `w, x, y, z`.
    Quaternion,
}

/// Configuration for the synchronization bridge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Whether the bridge runs at all.
    pub enabled: bool,
    /// Peer host.
    pub host: String,
    /// Peer port.
    pub port: u16,
    /// Simulator identifier placed in the schema document.
    pub simulator: String,
    /// Suffix naming the mocap proxy of a receive object.
    pub proxy_suffix: String,
    /// Timeout on every peer reply (ms). `None` blocks.
    pub reply_timeout_ms: Option<u64>,
    /// Delay between connection attempts while negotiating (ms).
    pub connect_retry_ms: u64,
    /// Simulation -> peer: object key to attribute list.
    pub send: BTreeMap<String, Vec<AttributeTag>>,
    /// Peer -> simulation: object name to attribute list.
    pub receive: BTreeMap<String, Vec<AttributeTag>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "127.0.0.1".to_string(),
            port: 7500,
            simulator: "simlink".to_string(),
            proxy_suffix: "_ref".to_string(),
            reply_timeout_ms: None,
            connect_retry_ms: 500,
            send: BTreeMap::new(),
            receive: BTreeMap::new(),
        }
    }
}

impl SyncConfig {
    /// `host:port` of the peer.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Reply timeout as a `Duration`.
    #[must_use]
    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }

    /// Connection retry delay as a `Duration`.
    #[must_use]
    pub const fn connect_retry(&self) -> Duration {
        Duration::from_millis(self.connect_retry_ms)
    }

    /// Adds a send entry.
    #[must_use]
    pub fn with_send(mut self, key: impl Into<String>, tags: &[AttributeTag]) -> Self {
        self.send.insert(key.into(), tags.to_vec());
        self
    }

    /// Adds a receive entry.
    #[must_use]
    pub fn with_receive(mut self, name: impl Into<String>, tags: &[AttributeTag]) -> Self {
        self.receive.insert(name.into(), tags.to_vec());
        self
    }
}
