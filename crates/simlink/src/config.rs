//! # Runtime Configuration
//!
//! One TOML file configures every subsystem. Every section is optional and
//! falls back to its defaults.
//!
//! ```toml
//! [simulation]
//! tick_rate = 60
//!
//! [lifecycle]
//! wait_timeout_ms = 100
//!
//! [scene]
//! meshes = ["bowl"]
//!
//! [[scene.fixtures]]
//! name = "table"
//! kind = "static"
//!
//! [sync]
//! enabled = true
//! [sync.send]
//! body = ["position", "quaternion"]
//!
//! [service]
//! bind = "127.0.0.1:7600"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use simlink_core::{FixtureKind, JointKind, Pose, SceneWorld, SimError};
use simlink_lifecycle::LifecycleConfig;
use simlink_sync::SyncConfig;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid config value: {0}")]
    Invalid(String),

    /// The startup scene could not be built.
    #[error("invalid scene: {0}")]
    Scene(#[from] SimError),
}

/// `[simulation]` section.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Simulated seconds per tick. Defaults to `1 / tick_rate`.
    pub step_dt: Option<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            step_dt: None,
        }
    }
}

impl SimulationConfig {
    /// Simulated seconds per tick.
    #[must_use]
    pub fn step_dt(&self) -> f64 {
        self.step_dt
            .unwrap_or_else(|| 1.0 / f64::from(self.tick_rate.max(1)))
    }
}

/// A body of the startup scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Body name.
    pub name: String,
    /// How the body moves.
    #[serde(default = "default_fixture_kind")]
    pub kind: FixtureKind,
    /// Initial pose.
    #[serde(default)]
    pub pose: Pose,
}

fn default_fixture_kind() -> FixtureKind {
    FixtureKind::Static
}

/// A joint of the startup scene.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JointConfig {
    /// Joint name.
    pub name: String,
    /// Joint kind.
    pub kind: JointKind,
    /// Body the joint moves.
    pub body: String,
}

/// `[scene]` section: the permanent bodies loaded at startup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Mesh resources available to spawn requests.
    pub meshes: Vec<String>,
    /// Startup bodies.
    pub fixtures: Vec<FixtureConfig>,
    /// Startup joints.
    pub joints: Vec<JointConfig>,
}

impl SceneConfig {
    /// Builds the startup scene.
    ///
    /// # Errors
    ///
    /// Fails on duplicate body names or joints on unknown bodies.
    pub fn build(&self) -> Result<SceneWorld, SimError> {
        let mut world = SceneWorld::new();
        for mesh in &self.meshes {
            world.register_mesh(mesh.clone());
        }
        for fixture in &self.fixtures {
            world.add_fixture(&fixture.name, fixture.pose, fixture.kind)?;
        }
        for joint in &self.joints {
            world.add_joint(&joint.name, joint.kind, &joint.body)?;
        }
        Ok(world)
    }
}

/// `[service]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Whether the orchestration service runs.
    pub enabled: bool,
    /// Listen address.
    pub bind: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1:7600".to_string(),
        }
    }
}

/// Complete runtime configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Simulation loop.
    pub simulation: SimulationConfig,
    /// Lifecycle coordinator.
    pub lifecycle: LifecycleConfig,
    /// Startup scene.
    pub scene: SceneConfig,
    /// Co-simulation bridge.
    pub sync: SyncConfig,
    /// Orchestration service.
    pub service: ServiceConfig,
}

impl AppConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Fails on TOML errors, unknown attribute tags or invalid values.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns the first invalid value found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.tick_rate == 0 {
            return Err(ConfigError::Invalid("simulation.tick_rate must be > 0".to_string()));
        }
        if let Some(dt) = self.simulation.step_dt {
            if !(dt.is_finite() && dt > 0.0) {
                return Err(ConfigError::Invalid("simulation.step_dt must be > 0".to_string()));
            }
        }
        if self.sync.enabled && self.sync.host.is_empty() {
            return Err(ConfigError::Invalid("sync.host is empty".to_string()));
        }
        if self.service.enabled && self.service.bind.is_empty() {
            return Err(ConfigError::Invalid("service.bind is empty".to_string()));
        }
        Ok(())
    }
}
