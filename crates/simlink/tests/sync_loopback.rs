//! Co-simulation bridge against a loopback TCP peer.
//!
//! The peer mirrors what the simulation sends, so a body sent under one name
//! comes back on the proxy of another.

use std::net::TcpListener;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use simlink::SimulationRunner;
use simlink_core::{FixtureKind, Pose, Quaternion, SceneWorld, SimulationStateAccessor, Vec3};
use simlink_lifecycle::LifecycleCoordinator;
use simlink_sync::{
    read_frame, write_frame, AttributeTag, BridgeState, SizeReply, SyncBridge, SyncBuffer,
    SyncConfig, TcpChannel,
};

/// How the peer answers the first data frame.
#[derive(Clone, Copy)]
enum FirstReply {
    Echo,
    Reset,
}

struct Peer {
    address: String,
    documents: mpsc::Receiver<String>,
    handle: JoinHandle<()>,
}

fn spawn_peer(sizes: SizeReply, first: FirstReply) -> Peer {
    serve_peer(TcpListener::bind("127.0.0.1:0").unwrap(), sizes, first)
}

fn serve_peer(listener: TcpListener, sizes: SizeReply, first: FirstReply) -> Peer {
    let address = listener.local_addr().unwrap().to_string();
    let (tx, documents) = mpsc::channel();

    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut frame = Vec::new();
        let mut data_frames = 0u64;
        // ends when the bridge drops the connection
        while read_frame(&mut stream, &mut frame).is_ok() {
            if let Ok(document) = std::str::from_utf8(&frame) {
                if document.starts_with("{\"time\"") {
                    let _ = tx.send(document.to_string());
                    write_frame(&mut stream, &sizes.encode()).unwrap();
                    continue;
                }
            }
            data_frames += 1;
            let reply = match first {
                FirstReply::Reset if data_frames == 1 => {
                    let mut reset = SyncBuffer::new(8);
                    reset.values_mut().fill(-1.0);
                    let mut wire = Vec::new();
                    reset.encode_into(&mut wire);
                    wire
                }
                _ => frame.clone(),
            };
            write_frame(&mut stream, &reply).unwrap();
        }
    });

    Peer { address, documents, handle }
}

/// `box1` is sent; `box1_copy` is received onto `box1_copy_ref`.
fn runner(address: &str) -> SimulationRunner<SceneWorld> {
    runner_with_retry(address, SyncConfig::default().connect_retry_ms)
}

fn runner_with_retry(address: &str, connect_retry_ms: u64) -> SimulationRunner<SceneWorld> {
    let mut world = SceneWorld::new();
    let pose = Pose::new(Vec3::new(0.3, 0.2, 0.1), Quaternion::IDENTITY);
    world.add_fixture("box1", pose, FixtureKind::Static).unwrap();
    world
        .add_fixture("box1_copy_ref", Pose::IDENTITY, FixtureKind::Mocap)
        .unwrap();

    let both = [AttributeTag::Position, AttributeTag::Quaternion];
    let config = SyncConfig {
        enabled: true,
        connect_retry_ms,
        ..SyncConfig::default()
    }
    .with_send("box1", &both)
    .with_receive("box1_copy", &both);

    let channel = TcpChannel::new(address, Some(Duration::from_secs(5)));
    let bridge = SyncBridge::new(config, Box::new(channel));
    SimulationRunner::new(
        world,
        Arc::new(LifecycleCoordinator::default()),
        Some(bridge),
        60,
        0.01,
    )
}

fn tick_until(runner: &mut SimulationRunner<SceneWorld>, done: impl Fn(&mut SimulationRunner<SceneWorld>) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(runner) {
        assert!(Instant::now() < deadline, "bridge stuck in {:?}", runner.bridge_state());
        runner.tick();
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_pose_round_trip_through_peer() {
    let peer = spawn_peer(SizeReply { send: 8, receive: 8 }, FirstReply::Echo);
    let mut runner = runner(&peer.address);

    tick_until(&mut runner, |r| r.bridge_state() == Some(BridgeState::Streaming));
    runner.tick();

    let document = peer.documents.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(document.contains("\"box1\":[\"position\",\"quaternion\"]"));
    assert!(document.contains("\"receive\":{\"box1_copy\""));

    let original = runner.simulation().object_state("box1").unwrap();
    let copy = runner.simulation().object_state("box1_copy_ref").unwrap();
    assert_eq!(copy.pose, original.pose);

    drop(runner);
    peer.handle.join().unwrap();
}

#[test]
fn test_peer_reset_triggers_renegotiation() {
    let peer = spawn_peer(SizeReply { send: 8, receive: 8 }, FirstReply::Reset);
    let mut runner = runner(&peer.address);

    tick_until(&mut runner, |r| {
        r.bridge().is_some_and(|bridge| bridge.stats().peer_resets == 1)
    });
    tick_until(&mut runner, |r| r.bridge_state() == Some(BridgeState::Streaming));

    let stats = runner.bridge().map(SyncBridge::stats).unwrap();
    assert_eq!(stats.negotiations, 2);
    assert!(peer.documents.recv_timeout(Duration::from_secs(1)).is_ok());
    assert!(peer.documents.recv_timeout(Duration::from_secs(1)).is_ok());

    drop(runner);
    peer.handle.join().unwrap();
}

#[test]
fn test_size_mismatch_disables_bridge() {
    let peer = spawn_peer(SizeReply { send: 8, receive: 15 }, FirstReply::Echo);
    let mut runner = runner(&peer.address);

    tick_until(&mut runner, |r| r.bridge_state() == Some(BridgeState::Disabled));
    // a disabled bridge does not stop the simulation
    runner.tick();
    assert_eq!(runner.bridge_state(), Some(BridgeState::Disabled));

    drop(runner);
    peer.handle.join().unwrap();
}

#[test]
fn test_peer_that_starts_late_is_picked_up() {
    // reserve a port, then leave it closed until the bridge is already retrying
    let address = TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .to_string();
    let mut runner = runner_with_retry(&address, 20);

    let waiting_until = Instant::now() + Duration::from_millis(100);
    while Instant::now() < waiting_until {
        runner.tick();
        assert_eq!(runner.bridge_state(), Some(BridgeState::Negotiating));
        thread::sleep(Duration::from_millis(5));
    }

    let peer = serve_peer(
        TcpListener::bind(&address).unwrap(),
        SizeReply { send: 8, receive: 8 },
        FirstReply::Echo,
    );
    tick_until(&mut runner, |r| r.bridge_state() == Some(BridgeState::Streaming));
    runner.tick();

    let stats = runner.bridge().map(SyncBridge::stats).unwrap();
    assert_eq!(stats.negotiations, 1);
    assert!(stats.exchanges >= 1);
    assert!(peer.documents.recv_timeout(Duration::from_secs(1)).is_ok());

    drop(runner);
    peer.handle.join().unwrap();
}
