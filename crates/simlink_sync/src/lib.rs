//! # SIMLINK Sync
//!
//! State exchange with an external co-simulation peer.
//!
//! ## Protocol
//!
//! ```text
//! BRIDGE                                   PEER
//!   |--- schema document (JSON) ----------->|
//!   |<-- send_size, receive_size (2 x u64) -|   sizes must match
//!   |                                       |
//!   |--- [t_us, a0, a1, ...] (f64 LE) ----->|   once per tick
//!   |<-- [t, b0, b1, ...]    (f64 LE) ------|   t < 0: renegotiate
//! ```
//!
//! Sizes count doubles and include the leading timestamp slot. Quaternions
//! are `w, x, y, z`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use simlink_sync::{SyncBridge, SyncConfig, TcpChannel};
//!
//! let channel = TcpChannel::new(config.address(), config.reply_timeout());
//! let mut bridge = SyncBridge::new(config, Box::new(channel));
//! bridge.start(&world);
//!
//! // simulation-step thread, once per tick
//! bridge.tick(&mut world);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bridge;
pub mod buffer;
pub mod config;
pub mod error;
pub mod schema;
pub mod transport;

pub use bridge::{BridgeState, BridgeStats, SyncBridge};
pub use buffer::{SizeReply, SyncBuffer};
pub use config::{AttributeTag, SyncConfig, BODY_GROUP, JOINT_1D_GROUP};
pub use error::{SyncError, SyncResult, TransportError};
pub use schema::SyncSchema;
pub use transport::{read_frame, write_frame, PeerChannel, TcpChannel, MAX_FRAME_LEN};
