//! # Sync Buffers and Wire Codec
//!
//! Steady-state messages are flat little-endian `f64` sequences. The
//! negotiation reply is two little-endian `u64`: send size, receive size.

use crate::error::{SyncError, SyncResult};

/// Bytes per buffer element on the wire.
pub const F64_BYTES: usize = std::mem::size_of::<f64>();

/// Length of the negotiation reply in bytes.
pub const SIZE_REPLY_BYTES: usize = 2 * std::mem::size_of::<u64>();

/// Fixed-size buffer of doubles for one direction of the exchange.
///
/// Index 0 is the timestamp slot.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncBuffer {
    values: Vec<f64>,
}

impl SyncBuffer {
    /// Allocates a zeroed buffer of `len` doubles.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self { values: vec![0.0; len] }
    }

    /// Number of doubles, timestamp included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the buffer has no slots at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All slots.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// All slots, mutable.
    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    /// Slot 0.
    #[must_use]
    pub fn timestamp(&self) -> f64 {
        self.values.first().copied().unwrap_or_default()
    }

    /// Writes slot 0.
    pub fn set_timestamp(&mut self, timestamp: f64) {
        if let Some(slot) = self.values.first_mut() {
            *slot = timestamp;
        }
    }

    /// Encodes the buffer into `out`, replacing its contents.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(self.values.len() * F64_BYTES);
        for value in &self.values {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    /// Decodes `bytes` into the buffer.
    ///
    /// # Errors
    ///
    /// Fails if `bytes` is not exactly `len() * 8` bytes long. The buffer is
    /// left unchanged in that case.
    pub fn decode_from(&mut self, bytes: &[u8]) -> SyncResult<()> {
        let expected = self.values.len() * F64_BYTES;
        if bytes.len() != expected {
            return Err(SyncError::MalformedReply { expected, actual: bytes.len() });
        }
        for (value, chunk) in self.values.iter_mut().zip(bytes.chunks_exact(F64_BYTES)) {
            let mut raw = [0u8; F64_BYTES];
            raw.copy_from_slice(chunk);
            *value = f64::from_le_bytes(raw);
        }
        Ok(())
    }
}

/// The peer's answer to a negotiation document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SizeReply {
    /// Send buffer length in doubles.
    pub send: u64,
    /// Receive buffer length in doubles.
    pub receive: u64,
}

impl SizeReply {
    /// Encodes the reply.
    #[must_use]
    pub fn encode(self) -> [u8; SIZE_REPLY_BYTES] {
        let mut out = [0u8; SIZE_REPLY_BYTES];
        out[..8].copy_from_slice(&self.send.to_le_bytes());
        out[8..].copy_from_slice(&self.receive.to_le_bytes());
        out
    }

    /// Decodes a reply.
    ///
    /// # Errors
    ///
    /// Fails unless `bytes` is exactly 16 bytes long.
    pub fn decode(bytes: &[u8]) -> SyncResult<Self> {
        if bytes.len() != SIZE_REPLY_BYTES {
            return Err(SyncError::MalformedReply {
                expected: SIZE_REPLY_BYTES,
                actual: bytes.len(),
            });
        }
        let mut send = [0u8; 8];
        let mut receive = [0u8; 8];
        send.copy_from_slice(&bytes[..8]);
        receive.copy_from_slice(&bytes[8..]);
        Ok(Self {
            send: u64::from_le_bytes(send),
            receive: u64::from_le_bytes(receive),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_is_little_endian() {
        let mut buffer = SyncBuffer::new(2);
        buffer.values_mut().copy_from_slice(&[1.0, -2.5]);
        let mut wire = Vec::new();
        buffer.encode_into(&mut wire);

        assert_eq!(wire.len(), 16);
        assert_eq!(&wire[..8], &1.0f64.to_le_bytes());
        assert_eq!(&wire[8..], &(-2.5f64).to_le_bytes());
    }

    #[test]
    fn test_decode_wrong_length_rejected() {
        let mut buffer = SyncBuffer::new(3);
        buffer.set_timestamp(7.0);
        let err = buffer.decode_from(&[0u8; 16]).unwrap_err();
        assert!(matches!(err, SyncError::MalformedReply { expected: 24, actual: 16 }));
        assert_eq!(buffer.timestamp(), 7.0);
    }

    #[test]
    fn test_size_reply_layout() {
        let reply = SizeReply { send: 9, receive: 8 };
        let bytes = reply.encode();
        assert_eq!(&bytes[..8], &9u64.to_le_bytes());
        assert_eq!(SizeReply::decode(&bytes).unwrap(), reply);
        assert!(SizeReply::decode(&bytes[..12]).is_err());
    }
}
