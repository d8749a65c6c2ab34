//! Live frame: one length-prefixed payload.
//!
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use rlog_engine::protocol::{build_frame, FRAME_PREFIX_SIZE};
//!
//! let bytes = build_frame(b"cycle").unwrap();
//! assert_eq!(bytes.len(), FRAME_PREFIX_SIZE + 5);
//! assert_eq!(&bytes[..4], &[0, 0, 0, 5]);
//! ```

use bytes::Bytes;

use super::wire_format::FRAME_PREFIX_SIZE;
use crate::error::{RlogError, Result};

/// A complete live frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    pub fn new(payload: Bytes) -> Self {
        Self { payload }
    }

    /// Create a frame from raw bytes (copies data).
    pub fn from_slice(payload: &[u8]) -> Self {
        Self {
            payload: Bytes::copy_from_slice(payload),
        }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Encode the 4-byte Big Endian length prefix.
#[inline]
pub fn encode_prefix(payload_len: u32) -> [u8; FRAME_PREFIX_SIZE] {
    payload_len.to_be_bytes()
}

/// Build a complete frame (prefix + payload) as a single byte vector.
///
/// # Errors
///
/// Returns a protocol error if the payload does not fit a `u32` prefix.
pub fn build_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        RlogError::Protocol(format!("payload of {} bytes exceeds frame prefix", payload.len()))
    })?;
    let mut buf = Vec::with_capacity(FRAME_PREFIX_SIZE + payload.len());
    buf.extend_from_slice(&encode_prefix(len));
    buf.extend_from_slice(payload);
    Ok(buf)
}
