//! # Peer Transport
//!
//! Strict request/reply channel to the co-simulation peer: one request, then
//! exactly one reply, never more than one in flight.
//!
//! Over TCP every message is framed as:
//!
//! ```text
//! ┌──────────────────┬─────────────────────┐
//! │ length: u32 (LE) │ payload (length B)  │
//! └──────────────────┴─────────────────────┘
//! ```

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::TransportError;

/// Largest accepted frame payload.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// A request/reply channel to the peer.
///
/// `Send` so the negotiation worker can own it while the handshake runs.
pub trait PeerChannel: Send {
    /// Sends `payload` and blocks for the reply, which replaces the contents
    /// of `reply`.
    ///
    /// # Errors
    ///
    /// Any transport failure. After an error the next call starts a fresh
    /// exchange.
    fn request(&mut self, payload: &[u8], reply: &mut Vec<u8>) -> Result<(), TransportError>;

    /// Human-readable peer address for logs.
    fn peer(&self) -> String;
}

/// Writes one length-prefixed frame.
///
/// # Errors
///
/// Fails on I/O errors or if the payload exceeds [`MAX_FRAME_LEN`].
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError> {
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|_| payload.len() <= MAX_FRAME_LEN)
        .ok_or(TransportError::FrameTooLarge { len: payload.len(), max: MAX_FRAME_LEN })?;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads one length-prefixed frame into `out`.
///
/// # Errors
///
/// Fails on I/O errors, on EOF, or if the announced length exceeds
/// [`MAX_FRAME_LEN`].
pub fn read_frame<R: Read>(reader: &mut R, out: &mut Vec<u8>) -> Result<(), TransportError> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge { len, max: MAX_FRAME_LEN });
    }
    out.clear();
    out.resize(len, 0);
    reader.read_exact(out)?;
    Ok(())
}

fn round_trip(stream: &mut TcpStream, payload: &[u8], reply: &mut Vec<u8>) -> Result<(), TransportError> {
    write_frame(stream, payload)?;
    read_frame(stream, reply)
}

/// [`PeerChannel`] over a TCP connection.
///
/// Connects on first use and again after any failure, so a peer that starts
/// late or restarts is picked up by the next negotiation.
pub struct TcpChannel {
    address: String,
    reply_timeout: Option<Duration>,
    stream: Option<TcpStream>,
}

impl TcpChannel {
    /// Creates an unconnected channel to `address` (`host:port`).
    #[must_use]
    pub fn new(address: impl Into<String>, reply_timeout: Option<Duration>) -> Self {
        Self {
            address: address.into(),
            reply_timeout,
            stream: None,
        }
    }

    fn connect(&mut self) -> Result<&mut TcpStream, TransportError> {
        if self.stream.is_none() {
            let stream = TcpStream::connect(&self.address)
                .map_err(|e| TransportError::Unreachable(format!("{}: {e}", self.address)))?;
            stream.set_nodelay(true)?;
            stream.set_read_timeout(self.reply_timeout)?;
            tracing::debug!("sync: connected to {}", self.address);
            self.stream = Some(stream);
        }
        self.stream
            .as_mut()
            .ok_or_else(|| TransportError::Unreachable(self.address.clone()))
    }
}

impl PeerChannel for TcpChannel {
    fn request(&mut self, payload: &[u8], reply: &mut Vec<u8>) -> Result<(), TransportError> {
        let stream = self.connect()?;
        let result = round_trip(stream, payload, reply);
        if result.is_err() {
            // framing state is unknown after a failure
            self.stream = None;
        }
        result
    }

    fn peer(&self) -> String {
        self.address.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_frame_roundtrip() {
        let mut wire = Vec::new();
        write_frame(&mut wire, b"hello").unwrap();
        assert_eq!(&wire[..4], &5u32.to_le_bytes());

        let mut out = Vec::new();
        read_frame(&mut Cursor::new(wire), &mut out).unwrap();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&u32::MAX.to_le_bytes());
        let mut out = Vec::new();
        let err = read_frame(&mut Cursor::new(wire), &mut out).unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }

    #[test]
    fn test_truncated_frame_is_closed() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&8u32.to_le_bytes());
        wire.extend_from_slice(&[1, 2, 3]);
        let mut out = Vec::new();
        let err = read_frame(&mut Cursor::new(wire), &mut out).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn test_tcp_request_reply() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            read_frame(&mut stream, &mut request).unwrap();
            request.reverse();
            write_frame(&mut stream, &request).unwrap();
        });

        let mut channel = TcpChannel::new(address, Some(Duration::from_secs(5)));
        let mut reply = Vec::new();
        channel.request(&[1, 2, 3], &mut reply).unwrap();
        assert_eq!(reply, vec![3, 2, 1]);
        peer.join().unwrap();
    }

    #[test]
    fn test_unreachable_peer() {
        // bind then drop to get a port nobody listens on
        let address = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .to_string();
        let mut channel = TcpChannel::new(address, None);
        let mut reply = Vec::new();
        let err = channel.request(b"x", &mut reply).unwrap_err();
        assert!(matches!(err, TransportError::Unreachable(_)));
    }
}
