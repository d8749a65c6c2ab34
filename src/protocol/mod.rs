//! Protocol module - RLOG wire grammar and live framing.
//!
//! - Incremental wire decoder and its writer-side counterpart
//! - 4-byte length-prefixed frames and the buffer that reassembles them
//! - Wire constants and tag mapping

mod decoder;
mod encoder;
mod frame;
mod frame_buffer;
mod reader;
mod wire_format;

pub use decoder::{DecodeMode, WireDecoder};
pub use encoder::EntryEncoder;
pub use frame::{build_frame, encode_prefix, Frame};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    record, value_type_from_tag, value_type_tag, DEFAULT_MAX_FRAME_PAYLOAD, FRAME_PREFIX_SIZE,
    HEARTBEAT_DATA, LOG_REVISION, NULL_TAG, STREAM_HEADER_SIZE, TIMESTAMP_SIZE,
};
