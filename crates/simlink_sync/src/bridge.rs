//! # Sync Bridge
//!
//! State machine driving the exchange with the co-simulation peer.
//!
//! ```text
//!                 start / tick
//! Uninitialized ───────────────► Negotiating ──(sizes match)──► Streaming
//!                                  ▲     │                        │
//!                                  │     └─(mismatch / failure)─► Disabled
//!                                  │                              ▲   │
//!                                  ├──(reset, desync, new layout)─┘   │
//!                                  │     (from Streaming)             │
//!                                  └──────── renegotiate() ───────────┘
//! ```
//!
//! The handshake runs on a worker thread that owns the channel until it
//! answers through a bounded channel; ticks never wait for it. Streaming is
//! a synchronous round trip on the simulation-step thread: a slow peer
//! slows the simulation down.
//!
//! A structure change re-derives the schema. Only a changed document or slot
//! table costs a handshake; bodies the schema does not track are ignored.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use simlink_core::SimulationStateAccessor;

use crate::buffer::{SizeReply, SyncBuffer};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult, TransportError};
use crate::schema::SyncSchema;
use crate::transport::PeerChannel;

/// Observable bridge state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BridgeState {
    /// Not started yet.
    Uninitialized,
    /// Handshake in flight.
    Negotiating,
    /// Exchanging buffers every tick.
    Streaming,
    /// Not exchanging; waits for an explicit renegotiation.
    Disabled,
}

/// Counters for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Handshakes started.
    pub negotiations: u64,
    /// Completed buffer exchanges.
    pub exchanges: u64,
    /// Reset signals received from the peer.
    pub peer_resets: u64,
    /// Handshakes rejected because of a size mismatch.
    pub mismatches: u64,
}

/// What the negotiation worker hands back.
struct Handshake {
    channel: Box<dyn PeerChannel>,
    result: SyncResult<SizeReply>,
}

/// A negotiated session: schema plus the two buffers it sized.
struct Session {
    schema: SyncSchema,
    send: SyncBuffer,
    receive: SyncBuffer,
    wire: Vec<u8>,
    reply: Vec<u8>,
}

impl Session {
    fn new(schema: SyncSchema) -> Self {
        let send = SyncBuffer::new(schema.send_size());
        let receive = SyncBuffer::new(schema.receive_size());
        Self {
            schema,
            send,
            receive,
            wire: Vec::new(),
            reply: Vec::new(),
        }
    }
}

enum Phase {
    Uninitialized,
    Negotiating {
        schema: SyncSchema,
        outcome: Receiver<Handshake>,
    },
    Streaming(Session),
    Disabled,
}

/// Result of one streaming round trip.
enum Exchange {
    Applied,
    PeerReset,
}

/// Bridge between the simulation and one co-simulation peer.
pub struct SyncBridge {
    config: SyncConfig,
    /// `None` while the negotiation worker owns the channel.
    channel: Option<Box<dyn PeerChannel>>,
    phase: Phase,
    epoch: Instant,
    cancel: Arc<AtomicBool>,
    stats: BridgeStats,
}

impl SyncBridge {
    /// Creates a bridge in the `Uninitialized` state.
    #[must_use]
    pub fn new(config: SyncConfig, channel: Box<dyn PeerChannel>) -> Self {
        Self {
            config,
            channel: Some(channel),
            phase: Phase::Uninitialized,
            epoch: Instant::now(),
            cancel: Arc::new(AtomicBool::new(false)),
            stats: BridgeStats::default(),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BridgeState {
        match self.phase {
            Phase::Uninitialized => BridgeState::Uninitialized,
            Phase::Negotiating { .. } => BridgeState::Negotiating,
            Phase::Streaming(_) => BridgeState::Streaming,
            Phase::Disabled => BridgeState::Disabled,
        }
    }

    /// Schema of the running session, if streaming.
    #[must_use]
    pub fn schema(&self) -> Option<&SyncSchema> {
        match &self.phase {
            Phase::Streaming(session) => Some(&session.schema),
            _ => None,
        }
    }

    /// Diagnostic counters.
    #[must_use]
    pub const fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Starts the first negotiation. Does nothing unless `Uninitialized`.
    pub fn start<A>(&mut self, accessor: &A)
    where
        A: SimulationStateAccessor + ?Sized,
    {
        if matches!(self.phase, Phase::Uninitialized) {
            self.begin_negotiation(accessor);
        }
    }

    /// Re-derives the schema and starts a new handshake.
    ///
    /// Does nothing while a handshake is already in flight.
    pub fn renegotiate<A>(&mut self, accessor: &A)
    where
        A: SimulationStateAccessor + ?Sized,
    {
        if !matches!(self.phase, Phase::Negotiating { .. }) {
            self.begin_negotiation(accessor);
        }
    }

    /// Stops streaming and releases the channel.
    pub fn shutdown(&mut self) {
        self.cancel.store(true, Ordering::Release);
        self.phase = Phase::Disabled;
        self.channel = None;
    }

    /// Runs the bridge for one tick. Simulation-step thread only.
    ///
    /// Completes a finished handshake, or performs one exchange when
    /// streaming. Never fails: errors become state transitions.
    pub fn tick<A>(&mut self, accessor: &mut A)
    where
        A: SimulationStateAccessor + ?Sized,
    {
        match std::mem::replace(&mut self.phase, Phase::Disabled) {
            Phase::Uninitialized => self.begin_negotiation(&*accessor),
            Phase::Disabled => {}
            Phase::Negotiating { schema, outcome } => {
                self.poll_negotiation(schema, outcome, &*accessor);
            }
            Phase::Streaming(session) => self.stream(session, accessor),
        }
    }

    fn begin_negotiation<A>(&mut self, accessor: &A)
    where
        A: SimulationStateAccessor + ?Sized,
    {
        let Some(mut channel) = self.channel.take() else {
            tracing::error!("sync: no peer channel, bridge disabled");
            self.phase = Phase::Disabled;
            return;
        };

        let schema = SyncSchema::derive(&self.config, accessor);
        let document = match schema.document() {
            Ok(document) => document,
            Err(e) => {
                tracing::error!("sync: cannot encode schema: {}", e);
                self.channel = Some(channel);
                self.phase = Phase::Disabled;
                return;
            }
        };

        self.stats.negotiations += 1;
        tracing::info!(
            "sync: negotiating with {} (send={}, receive={})",
            channel.peer(),
            schema.send_size(),
            schema.receive_size()
        );

        let (tx, rx) = bounded(1);
        let cancel = Arc::clone(&self.cancel);
        let retry = self.config.connect_retry();
        let spawned = thread::Builder::new()
            .name("simlink-negotiation".to_string())
            .spawn(move || {
                let mut reply = Vec::new();
                let result = loop {
                    match channel.request(document.as_bytes(), &mut reply) {
                        Err(TransportError::Unreachable(reason)) if !cancel.load(Ordering::Acquire) => {
                            tracing::debug!("sync: peer not reachable yet ({}), retrying", reason);
                            thread::sleep(retry);
                        }
                        Err(e) => break Err(SyncError::from(e)),
                        Ok(()) => break SizeReply::decode(&reply),
                    }
                };
                // the bridge may be gone; nothing to do then
                let _ = tx.send(Handshake { channel, result });
            });

        self.phase = match spawned {
            Ok(_) => Phase::Negotiating { schema, outcome: rx },
            Err(e) => {
                tracing::error!("sync: cannot start negotiation worker: {}", e);
                Phase::Disabled
            }
        };
    }

    fn poll_negotiation<A>(&mut self, schema: SyncSchema, outcome: Receiver<Handshake>, accessor: &A)
    where
        A: SimulationStateAccessor + ?Sized,
    {
        let handshake = match outcome.try_recv() {
            Ok(handshake) => handshake,
            Err(TryRecvError::Empty) => {
                self.phase = Phase::Negotiating { schema, outcome };
                return;
            }
            Err(TryRecvError::Disconnected) => {
                tracing::error!("sync: negotiation worker exited without answer, bridge disabled");
                self.phase = Phase::Disabled;
                return;
            }
        };

        let peer = handshake.channel.peer();
        self.channel = Some(handshake.channel);

        let sizes = match handshake.result {
            Ok(sizes) => sizes,
            Err(e) => {
                tracing::error!("sync: negotiation with {} failed: {}, bridge disabled", peer, e);
                self.phase = Phase::Disabled;
                return;
            }
        };

        if sizes.send != schema.send_size() as u64 || sizes.receive != schema.receive_size() as u64 {
            self.stats.mismatches += 1;
            let e = SyncError::SizeMismatch {
                peer,
                local_send: schema.send_size(),
                local_receive: schema.receive_size(),
                peer_send: sizes.send,
                peer_receive: sizes.receive,
            };
            tracing::error!("sync: {}, bridge disabled", e);
            self.phase = Phase::Disabled;
            return;
        }

        let Some(schema) = self.current_layout(schema, accessor) else {
            tracing::info!("sync: tracked objects changed during negotiation, renegotiating");
            self.begin_negotiation(accessor);
            return;
        };

        tracing::info!(
            "sync: streaming with {} (send={}, receive={})",
            peer,
            sizes.send,
            sizes.receive
        );
        self.phase = Phase::Streaming(Session::new(schema));
    }

    /// Brings `schema` up to the accessor's structure version.
    ///
    /// Returns `None` if the re-derived layout differs, which needs a new
    /// handshake.
    fn current_layout<A>(&self, schema: SyncSchema, accessor: &A) -> Option<SyncSchema>
    where
        A: SimulationStateAccessor + ?Sized,
    {
        if schema.structure_version() == accessor.structure_version() {
            return Some(schema);
        }
        let current = SyncSchema::derive(&self.config, accessor);
        if current.same_layout(&schema) {
            tracing::debug!("sync: structure changed, layout unchanged");
            Some(current)
        } else {
            None
        }
    }

    fn stream<A>(&mut self, mut session: Session, accessor: &mut A)
    where
        A: SimulationStateAccessor + ?Sized,
    {
        if session.schema.structure_version() != accessor.structure_version() {
            match self.current_layout(session.schema.clone(), &*accessor) {
                Some(schema) => session.schema = schema,
                None => {
                    tracing::info!("sync: tracked objects changed, renegotiating");
                    self.begin_negotiation(&*accessor);
                    return;
                }
            }
        }

        match self.exchange(&mut session, accessor) {
            Ok(Exchange::Applied) => {
                self.stats.exchanges += 1;
                self.phase = Phase::Streaming(session);
            }
            Ok(Exchange::PeerReset) => {
                self.stats.peer_resets += 1;
                tracing::info!("sync: peer requested a reset, renegotiating");
                self.begin_negotiation(&*accessor);
            }
            Err(e @ (SyncError::MalformedReply { .. } | SyncError::Sim(_))) => {
                tracing::warn!("sync: desync ({}), renegotiating", e);
                self.begin_negotiation(&*accessor);
            }
            Err(e) => {
                tracing::error!("sync: exchange failed: {}, bridge disabled", e);
                self.phase = Phase::Disabled;
            }
        }
    }

    fn exchange<A>(&mut self, session: &mut Session, accessor: &mut A) -> SyncResult<Exchange>
    where
        A: SimulationStateAccessor + ?Sized,
    {
        let channel = self
            .channel
            .as_mut()
            .ok_or(SyncError::Transport(TransportError::Closed))?;

        #[allow(clippy::cast_precision_loss)]
        session
            .send
            .set_timestamp(self.epoch.elapsed().as_micros() as f64);
        session.schema.read_into(&*accessor, &mut session.send)?;
        session.send.encode_into(&mut session.wire);

        channel.request(&session.wire, &mut session.reply)?;
        session.receive.decode_from(&session.reply)?;

        if session.receive.timestamp() < 0.0 {
            return Ok(Exchange::PeerReset);
        }
        session.schema.write_from(&session.receive, accessor)?;
        Ok(Exchange::Applied)
    }
}

impl Drop for SyncBridge {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AttributeTag, BODY_GROUP};
    use parking_lot::Mutex;
    use simlink_core::{
        BodyInfo, FixtureKind, JointInfo, ObjectState, Pose, SceneWorld, SimError, SimResult,
        SpawnRequest, StateSlot, Vec3,
    };
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Answers negotiation with fixed sizes and streaming with queued replies.
    /// Without a queued reply it echoes the request. A queued failure is
    /// returned instead of any reply.
    struct ScriptedPeer {
        sizes: SizeReply,
        replies: Arc<Mutex<VecDeque<Vec<f64>>>>,
        failures: Arc<Mutex<VecDeque<TransportError>>>,
        requests: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl PeerChannel for ScriptedPeer {
        fn request(&mut self, payload: &[u8], reply: &mut Vec<u8>) -> Result<(), TransportError> {
            self.requests.lock().push(payload.to_vec());
            if let Some(e) = self.failures.lock().pop_front() {
                return Err(e);
            }
            reply.clear();
            let is_document = std::str::from_utf8(payload).is_ok_and(|text| text.starts_with("{\"time\""));
            if is_document {
                reply.extend_from_slice(&self.sizes.encode());
            } else if let Some(values) = self.replies.lock().pop_front() {
                let mut buffer = SyncBuffer::new(values.len());
                buffer.values_mut().copy_from_slice(&values);
                buffer.encode_into(reply);
            } else {
                reply.extend_from_slice(payload);
            }
            Ok(())
        }

        fn peer(&self) -> String {
            "scripted".to_string()
        }
    }

    /// A scene whose slot reads fail while `broken` is set.
    struct FlakyWorld {
        scene: SceneWorld,
        broken: bool,
    }

    impl SimulationStateAccessor for FlakyWorld {
        fn bodies(&self) -> Vec<BodyInfo> {
            self.scene.bodies()
        }

        fn body(&self, name: &str) -> Option<BodyInfo> {
            self.scene.body(name)
        }

        fn joints(&self) -> Vec<JointInfo> {
            self.scene.joints()
        }

        fn object_state(&self, name: &str) -> Option<ObjectState> {
            self.scene.object_state(name)
        }

        fn structure_version(&self) -> u64 {
            self.scene.structure_version()
        }

        fn spawn_body(&mut self, request: &SpawnRequest) -> SimResult<()> {
            self.scene.spawn_body(request)
        }

        fn remove_body(&mut self, name: &str) -> SimResult<()> {
            self.scene.remove_body(name)
        }

        fn read_slot(&self, slot: StateSlot) -> SimResult<f64> {
            if self.broken {
                return Err(SimError::UnknownSlot(format!("{slot:?}")));
            }
            self.scene.read_slot(slot)
        }

        fn write_slot(&mut self, slot: StateSlot, value: f64) -> SimResult<()> {
            self.scene.write_slot(slot, value)
        }

        fn apply_and_settle(&mut self) {
            self.scene.apply_and_settle();
        }
    }

    struct Fixture {
        world: FlakyWorld,
        bridge: SyncBridge,
        replies: Arc<Mutex<VecDeque<Vec<f64>>>>,
        failures: Arc<Mutex<VecDeque<TransportError>>>,
        requests: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    /// One free body sent, the `cup` proxy received: send 8, receive 8.
    fn fixture(sizes: SizeReply) -> Fixture {
        fixture_with_retry(sizes, SyncConfig::default().connect_retry_ms)
    }

    fn fixture_with_retry(sizes: SizeReply, connect_retry_ms: u64) -> Fixture {
        let mut scene = SceneWorld::new();
        scene.add_fixture("cup_ref", Pose::IDENTITY, FixtureKind::Mocap).unwrap();
        scene
            .spawn_body(&SpawnRequest::boxed("box1", Vec3::new(0.1, 0.1, 0.1)))
            .unwrap();

        let both = [AttributeTag::Position, AttributeTag::Quaternion];
        let config = SyncConfig {
            connect_retry_ms,
            ..SyncConfig::default()
        }
        .with_send(BODY_GROUP, &both)
        .with_receive("cup", &both);

        let replies = Arc::new(Mutex::new(VecDeque::new()));
        let failures = Arc::new(Mutex::new(VecDeque::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let peer = ScriptedPeer {
            sizes,
            replies: Arc::clone(&replies),
            failures: Arc::clone(&failures),
            requests: Arc::clone(&requests),
        };
        Fixture {
            world: FlakyWorld { scene, broken: false },
            bridge: SyncBridge::new(config, Box::new(peer)),
            replies,
            failures,
            requests,
        }
    }

    fn tick_until(fixture: &mut Fixture, state: BridgeState) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while fixture.bridge.state() != state {
            assert!(Instant::now() < deadline, "bridge stuck in {:?}", fixture.bridge.state());
            fixture.bridge.tick(&mut fixture.world);
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_negotiation_reaches_streaming() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        assert_eq!(fixture.bridge.state(), BridgeState::Uninitialized);

        fixture.bridge.start(&fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Negotiating);
        tick_until(&mut fixture, BridgeState::Streaming);

        let schema = fixture.bridge.schema().unwrap();
        assert_eq!(schema.send_size(), 8);
        assert_eq!(fixture.bridge.stats().negotiations, 1);
    }

    #[test]
    fn test_size_mismatch_disables() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 4 });
        fixture.bridge.start(&fixture.world);
        tick_until(&mut fixture, BridgeState::Disabled);

        assert_eq!(fixture.bridge.stats().mismatches, 1);
        // stays disabled: ticks do nothing
        fixture.bridge.tick(&mut fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Disabled);
        assert_eq!(fixture.requests.lock().len(), 1);
    }

    #[test]
    fn test_reply_written_to_proxy() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        tick_until(&mut fixture, BridgeState::Streaming);

        fixture
            .replies
            .lock()
            .push_back(vec![0.0, 1.0, 2.0, 3.0, 1.0, 0.0, 0.0, 0.0]);
        fixture.bridge.tick(&mut fixture.world);
        fixture.world.apply_and_settle();

        let cup = fixture.world.object_state("cup_ref").unwrap();
        assert_eq!(cup.pose.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(fixture.bridge.stats().exchanges, 1);
    }

    #[test]
    fn test_send_buffer_layout() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        tick_until(&mut fixture, BridgeState::Streaming);
        fixture.bridge.tick(&mut fixture.world);

        let requests = fixture.requests.lock();
        let wire = requests.last().unwrap();
        let mut sent = SyncBuffer::new(8);
        sent.decode_from(wire).unwrap();
        assert!(sent.timestamp() >= 0.0);
        // box1 at identity: position 0,0,0 then quaternion w=1
        assert_eq!(&sent.values()[1..], &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_peer_reset_renegotiates() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        tick_until(&mut fixture, BridgeState::Streaming);

        fixture.replies.lock().push_back(vec![-1.0; 8]);
        fixture.bridge.tick(&mut fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Negotiating);
        assert_eq!(fixture.bridge.stats().peer_resets, 1);

        tick_until(&mut fixture, BridgeState::Streaming);
        assert_eq!(fixture.bridge.stats().negotiations, 2);
    }

    #[test]
    fn test_wrong_reply_length_renegotiates() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        tick_until(&mut fixture, BridgeState::Streaming);

        fixture.replies.lock().push_back(vec![0.0; 3]);
        fixture.bridge.tick(&mut fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Negotiating);
    }

    #[test]
    fn test_new_body_renegotiates() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        tick_until(&mut fixture, BridgeState::Streaming);

        fixture
            .world
            .spawn_body(&SpawnRequest::boxed("box2", Vec3::new(0.1, 0.1, 0.1)))
            .unwrap();
        fixture.bridge.tick(&mut fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Negotiating);

        // the scripted peer still answers 8/8, the new schema needs 15
        tick_until(&mut fixture, BridgeState::Disabled);
        assert_eq!(fixture.bridge.stats().mismatches, 1);
    }

    #[test]
    fn test_shutdown_releases_channel() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        tick_until(&mut fixture, BridgeState::Streaming);
        fixture.bridge.shutdown();
        assert_eq!(fixture.bridge.state(), BridgeState::Disabled);

        // no channel left to negotiate with
        fixture.bridge.renegotiate(&fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Disabled);
    }

    #[test]
    fn test_unreachable_peer_is_retried() {
        let mut fixture = fixture_with_retry(SizeReply { send: 8, receive: 8 }, 5);
        {
            let mut failures = fixture.failures.lock();
            failures.push_back(TransportError::Unreachable("refused".to_string()));
            failures.push_back(TransportError::Unreachable("refused".to_string()));
        }

        fixture.bridge.start(&fixture.world);
        tick_until(&mut fixture, BridgeState::Streaming);

        // two refused attempts and the accepted one, all in one negotiation
        assert_eq!(fixture.requests.lock().len(), 3);
        assert_eq!(fixture.bridge.stats().negotiations, 1);
    }

    #[test]
    fn test_closed_peer_disables_until_renegotiated() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        tick_until(&mut fixture, BridgeState::Streaming);

        fixture.failures.lock().push_back(TransportError::Closed);
        fixture.bridge.tick(&mut fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Disabled);

        // no further traffic until asked
        let sent = fixture.requests.lock().len();
        fixture.bridge.tick(&mut fixture.world);
        assert_eq!(fixture.requests.lock().len(), sent);

        fixture.bridge.renegotiate(&fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Negotiating);
        tick_until(&mut fixture, BridgeState::Streaming);
        fixture.bridge.tick(&mut fixture.world);

        let stats = fixture.bridge.stats();
        assert_eq!(stats.negotiations, 2);
        assert_eq!(stats.exchanges, 1);
    }

    #[test]
    fn test_reply_timeout_disables() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        tick_until(&mut fixture, BridgeState::Streaming);

        fixture.failures.lock().push_back(TransportError::TimedOut);
        fixture.bridge.tick(&mut fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Disabled);
        assert_eq!(fixture.bridge.stats().exchanges, 0);

        fixture.bridge.renegotiate(&fixture.world);
        tick_until(&mut fixture, BridgeState::Streaming);
    }

    #[test]
    fn test_failed_negotiation_disables() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        fixture.failures.lock().push_back(TransportError::Closed);
        fixture.bridge.start(&fixture.world);
        tick_until(&mut fixture, BridgeState::Disabled);
        assert_eq!(fixture.bridge.stats().mismatches, 0);
    }

    #[test]
    fn test_unreadable_slot_renegotiates() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        tick_until(&mut fixture, BridgeState::Streaming);
        let sent = fixture.requests.lock().len();

        fixture.world.broken = true;
        fixture.bridge.tick(&mut fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Negotiating);
        // the failed read never reached the peer; only the new schema did
        assert!(fixture.requests.lock().len() <= sent + 1);

        fixture.world.broken = false;
        tick_until(&mut fixture, BridgeState::Streaming);
        assert_eq!(fixture.bridge.stats().negotiations, 2);
    }

    #[test]
    fn test_untracked_body_keeps_streaming() {
        let mut fixture = fixture(SizeReply { send: 8, receive: 8 });
        tick_until(&mut fixture, BridgeState::Streaming);
        let version = fixture.bridge.schema().unwrap().structure_version();

        // anchored bodies are mocap-driven, so the body group ignores them
        fixture
            .world
            .spawn_body(&SpawnRequest::boxed("shelf", Vec3::new(0.1, 0.1, 0.1)).anchored())
            .unwrap();
        fixture.bridge.tick(&mut fixture.world);

        assert_eq!(fixture.bridge.state(), BridgeState::Streaming);
        let stats = fixture.bridge.stats();
        assert_eq!(stats.negotiations, 1);
        assert_eq!(stats.exchanges, 1);
        assert!(fixture.bridge.schema().unwrap().structure_version() > version);

        fixture.world.remove_body("shelf").unwrap();
        fixture.bridge.tick(&mut fixture.world);
        assert_eq!(fixture.bridge.state(), BridgeState::Streaming);
        assert_eq!(fixture.bridge.stats().exchanges, 2);
    }
}
