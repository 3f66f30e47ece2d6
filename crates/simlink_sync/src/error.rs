//! # Sync Error Types
//!
//! Every failure here ends in a bridge state transition and a log line,
//! never in a failure of the simulation.

use std::io;

use simlink_core::SimError;
use thiserror::Error;

/// Failures of the peer channel.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The peer could not be reached (nothing listening yet).
    #[error("peer unreachable: {0}")]
    Unreachable(String),

    /// The peer closed the connection.
    #[error("peer closed the connection")]
    Closed,

    /// The reply did not arrive within the configured timeout.
    #[error("timed out waiting for the peer")]
    TimedOut,

    /// A frame exceeded the maximum size.
    #[error("frame too large: {len} bytes (max {max})")]
    FrameTooLarge {
        /// Announced or actual length.
        len: usize,
        /// Maximum accepted length.
        max: usize,
    },

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::TimedOut,
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::Closed,
            io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => {
                Self::Unreachable(e.to_string())
            }
            _ => Self::Io(e),
        }
    }
}

/// Failures of the synchronization bridge.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The peer computed different buffer sizes for the schema.
    #[error(
        "buffer size mismatch with {peer}: local send={local_send} receive={local_receive}, \
         peer send={peer_send} receive={peer_receive}"
    )]
    SizeMismatch {
        /// Peer address.
        peer: String,
        /// Locally computed send size.
        local_send: usize,
        /// Locally computed receive size.
        local_receive: usize,
        /// Peer-computed send size.
        peer_send: u64,
        /// Peer-computed receive size.
        peer_receive: u64,
    },

    /// A reply had the wrong length.
    #[error("malformed reply: expected {expected} bytes, got {actual}")]
    MalformedReply {
        /// Expected length in bytes.
        expected: usize,
        /// Received length in bytes.
        actual: usize,
    },

    /// The schema document could not be encoded.
    #[error("schema document: {0}")]
    Document(#[from] serde_json::Error),

    /// A bound slot no longer resolves in the simulation.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// The channel failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for bridge operations.
pub type SyncResult<T> = Result<T, SyncError>;
