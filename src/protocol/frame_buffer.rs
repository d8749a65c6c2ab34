//! Reassembles length-prefixed live frames from arbitrary socket chunks.
//!
//! Uses `bytes::BytesMut` so payloads are split off without copying.
//! Two states:
//! - `WaitingForPrefix`: need 4 bytes of Big Endian length
//! - `WaitingForPayload`: prefix consumed, need N more payload bytes
//!
//! # Example
//!
//! ```
//! use rlog_engine::protocol::{build_frame, FrameBuffer};
//!
//! let bytes = build_frame(b"abc").unwrap();
//! let mut buffer = FrameBuffer::new();
//!
//! assert!(buffer.push(&bytes[..2]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[2..]).unwrap();
//! assert_eq!(frames[0].payload(), b"abc");
//! ```

use bytes::{Buf, Bytes, BytesMut};

use super::wire_format::{DEFAULT_MAX_FRAME_PAYLOAD, FRAME_PREFIX_SIZE};
use super::Frame;
use crate::error::{RlogError, Result};

#[derive(Debug, Clone, Copy)]
enum State {
    WaitingForPrefix,
    WaitingForPayload { remaining: u32 },
}

/// Accumulates incoming bytes and yields complete frames in order.
#[derive(Debug)]
pub struct FrameBuffer {
    buffer: BytesMut,
    state: State,
    max_payload: u32,
}

impl FrameBuffer {
    /// Frame buffer with the default 64 MiB payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_FRAME_PAYLOAD)
    }

    pub fn with_max_payload(max_payload: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(16 * 1024),
            state: State::WaitingForPrefix,
            max_payload,
        }
    }

    /// Push a chunk and extract every frame it completes.
    ///
    /// Partial data stays buffered for the next push. Zero-length frames are
    /// returned like any other.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a prefix announces more than the
    /// configured maximum payload. The buffer should be discarded afterwards.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        match self.state {
            State::WaitingForPrefix => {
                if self.buffer.len() < FRAME_PREFIX_SIZE {
                    return Ok(None);
                }
                let len = self.buffer.get_u32();
                if len > self.max_payload {
                    return Err(RlogError::Protocol(format!(
                        "Frame payload {} exceeds maximum {}",
                        len, self.max_payload
                    )));
                }
                if len == 0 {
                    return Ok(Some(Frame::new(Bytes::new())));
                }
                self.state = State::WaitingForPayload { remaining: len };
                self.try_extract_one()
            }
            State::WaitingForPayload { remaining } => {
                let remaining = remaining as usize;
                if self.buffer.len() < remaining {
                    return Ok(None);
                }
                let payload = self.buffer.split_to(remaining).freeze();
                self.state = State::WaitingForPrefix;
                Ok(Some(Frame::new(payload)))
            }
        }
    }

    /// Number of buffered bytes not yet returned as frames.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop buffered bytes and wait for a fresh prefix.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForPrefix;
    }

    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match self.state {
            State::WaitingForPrefix => "WaitingForPrefix",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
