//! # Orchestration Calls
//!
//! Transport-agnostic request/response descriptors for the calls an
//! orchestration layer makes, and the [`Orchestrator`] adapter that turns
//! them into coordinator operations.
//!
//! Calls are tagged by `call` so one line of JSON carries one call:
//!
//! ```text
//! {"call":"spawn_objects","objects":[{"name":"box1","shape":{"kind":"box",...}}]}
//! {"call":"destroy_objects","names":["box1"]}
//! {"call":"query_objects"}
//! {"call":"renegotiate"}
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use simlink_core::{ObjectState, SpawnRequest};

use crate::coordinator::LifecycleCoordinator;

/// A call from the orchestration layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum OrchestrationRequest {
    /// Add bodies to the running simulation.
    SpawnObjects {
        /// Bodies to add.
        objects: Vec<SpawnRequest>,
    },
    /// Remove bodies from the running simulation.
    DestroyObjects {
        /// Names of the bodies to remove.
        names: Vec<String>,
    },
    /// List the runtime-spawned bodies.
    QueryObjects,
    /// Restart the handshake with the co-simulation peer, e.g. after it
    /// changed its object set or the bridge was disabled.
    Renegotiate,
}

/// The answer to an [`OrchestrationRequest`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum OrchestrationResponse {
    /// Names accepted and spawned.
    SpawnObjects {
        /// Possibly empty on timeout, duplicate or failure.
        names: Vec<String>,
    },
    /// Final states of the destroyed bodies.
    DestroyObjects {
        /// One entry per body removed.
        states: Vec<ObjectState>,
    },
    /// Current states of runtime-spawned bodies.
    QueryObjects {
        /// One entry per live non-permanent body.
        states: Vec<ObjectState>,
    },
    /// Renegotiation is scheduled for the next tick.
    Renegotiate,
    /// The call could not be decoded.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

/// Entry point for orchestration calls.
///
/// Cheap to clone; every clone talks to the same coordinator. All methods
/// block for at most the coordinator's wait timeout.
#[derive(Clone)]
pub struct Orchestrator {
    coordinator: Arc<LifecycleCoordinator>,
}

impl Orchestrator {
    /// Creates an orchestrator over a shared coordinator.
    #[must_use]
    pub fn new(coordinator: Arc<LifecycleCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Returns the coordinator.
    #[must_use]
    pub fn coordinator(&self) -> &Arc<LifecycleCoordinator> {
        &self.coordinator
    }

    /// `SpawnObjects`: returns the names that were spawned.
    pub fn spawn_objects(&self, objects: Vec<SpawnRequest>) -> Vec<String> {
        self.coordinator.request_spawn(objects)
    }

    /// `DestroyObjects`: returns the final state of each destroyed body.
    pub fn destroy_objects(&self, names: Vec<String>) -> Vec<ObjectState> {
        self.coordinator.request_destroy(names)
    }

    /// `QueryObjects`: returns the state of every runtime-spawned body.
    #[must_use]
    pub fn query_objects(&self) -> Vec<ObjectState> {
        self.coordinator.live_states()
    }

    /// `Renegotiate`: schedules a peer handshake for the next tick.
    pub fn renegotiate(&self) {
        self.coordinator.request_renegotiation();
    }

    /// Dispatches one call.
    pub fn handle(&self, request: OrchestrationRequest) -> OrchestrationResponse {
        match request {
            OrchestrationRequest::SpawnObjects { objects } => OrchestrationResponse::SpawnObjects {
                names: self.spawn_objects(objects),
            },
            OrchestrationRequest::DestroyObjects { names } => {
                OrchestrationResponse::DestroyObjects {
                    states: self.destroy_objects(names),
                }
            }
            OrchestrationRequest::QueryObjects => OrchestrationResponse::QueryObjects {
                states: self.query_objects(),
            },
            OrchestrationRequest::Renegotiate => {
                self.renegotiate();
                OrchestrationResponse::Renegotiate
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::LifecycleConfig;
    use simlink_core::{SceneWorld, SimulationStateAccessor, Vec3};

    #[test]
    fn test_request_json_shape() {
        let json = r#"{"call":"spawn_objects","objects":[{"name":"box1","shape":{"kind":"box","size":{"x":0.1,"y":0.1,"z":0.1}}}]}"#;
        let request: OrchestrationRequest = serde_json::from_str(json).unwrap();
        match request {
            OrchestrationRequest::SpawnObjects { objects } => {
                assert_eq!(objects.len(), 1);
                assert_eq!(objects[0].name, "box1");
            }
            other => panic!("unexpected {other:?}"),
        }

        let query: OrchestrationRequest =
            serde_json::from_str(r#"{"call":"query_objects"}"#).unwrap();
        assert_eq!(query, OrchestrationRequest::QueryObjects);
    }

    #[test]
    fn test_response_json_shape() {
        let response = OrchestrationResponse::SpawnObjects { names: vec!["box1".to_string()] };
        let json = serde_json::to_string(&response).unwrap();
        assert_eq!(json, r#"{"call":"spawn_objects","names":["box1"]}"#);
    }

    #[test]
    fn test_handle_without_waiting() {
        let mut world = SceneWorld::new();
        world
            .spawn_body(&SpawnRequest::boxed("box1", Vec3::new(0.1, 0.1, 0.1)))
            .unwrap();
        let coordinator = Arc::new(LifecycleCoordinator::new(LifecycleConfig::default()));
        coordinator.refresh_live(&world);
        let orchestrator = Orchestrator::new(coordinator);

        let response = orchestrator.handle(OrchestrationRequest::SpawnObjects { objects: vec![] });
        assert_eq!(response, OrchestrationResponse::SpawnObjects { names: vec![] });

        match orchestrator.handle(OrchestrationRequest::QueryObjects) {
            OrchestrationResponse::QueryObjects { states } => {
                assert_eq!(states.len(), 1);
                assert_eq!(states[0].name, "box1");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_renegotiate_call() {
        let request: OrchestrationRequest =
            serde_json::from_str(r#"{"call":"renegotiate"}"#).unwrap();
        let coordinator = Arc::new(LifecycleCoordinator::default());
        let orchestrator = Orchestrator::new(Arc::clone(&coordinator));

        let response = orchestrator.handle(request);
        assert_eq!(serde_json::to_string(&response).unwrap(), r#"{"call":"renegotiate"}"#);
        assert!(coordinator.take_renegotiation());
    }
}
