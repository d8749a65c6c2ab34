//! RLOG wire format constants and tag mapping.
//!
//! Log stream layout:
//! ```text
//! ┌──────────┬──────────┬─────────────┬───────────────┬─────┬─────────────┬─────
//! │ Revision │ Reserved │ Timestamp   │ Sub-records   │  0  │ Timestamp   │ ...
//! │ 1 byte   │ 1 byte   │ f64 BE      │ (tag 1 or 2)  │     │ f64 BE      │
//! └──────────┴──────────┴─────────────┴───────────────┴─────┴─────────────┴─────
//! ```
//!
//! Sub-records:
//! - tag 1, register key: `u16` key id, `u16` length, UTF-8 bytes
//! - tag 2, field update: `u16` key id, `u8` value type, payload
//!
//! Live framing wraps the same stream in frames:
//! ```text
//! ┌──────────────────┬──────────────────────┐
//! │ Length (4 bytes) │ Payload (N bytes)    │
//! │ u32 BE           │ one logging cycle    │
//! └──────────────────┴──────────────────────┘
//! ```
//!
//! All multi-byte integers and doubles are Big Endian.

use crate::model::ValueType;

/// The only log revision this decoder accepts.
pub const LOG_REVISION: u8 = 1;

/// Stream header size (revision byte + reserved byte).
pub const STREAM_HEADER_SIZE: usize = 2;

/// Encoded timestamp size.
pub const TIMESTAMP_SIZE: usize = 8;

/// Live frame length prefix size.
pub const FRAME_PREFIX_SIZE: usize = 4;

/// Default maximum live frame payload (64 MiB).
pub const DEFAULT_MAX_FRAME_PAYLOAD: u32 = 64 * 1024 * 1024;

/// Marker written to the live peer as a keep-alive.
pub const HEARTBEAT_DATA: [u8; 4] = [6, 3, 2, 8];

/// Sub-record tags.
pub mod record {
    /// Ends the current entry; a timestamp follows.
    pub const NEW_TIMESTAMP: u8 = 0;
    /// Registers a key string under a numeric id.
    pub const REGISTER_KEY: u8 = 1;
    /// Updates the field for a registered key.
    pub const FIELD_UPDATE: u8 = 2;
}

/// Value-type tag for a null update.
pub const NULL_TAG: u8 = 0;

/// Wire tag for a value type.
pub fn value_type_tag(value_type: ValueType) -> u8 {
    match value_type {
        ValueType::Boolean => 1,
        ValueType::BooleanArray => 2,
        ValueType::Integer => 3,
        ValueType::IntegerArray => 4,
        ValueType::Double => 5,
        ValueType::DoubleArray => 6,
        ValueType::String => 7,
        ValueType::StringArray => 8,
        ValueType::Byte => 9,
        ValueType::ByteArray => 10,
    }
}

/// Value type for a wire tag. `None` for the null tag and unknown tags.
pub fn value_type_from_tag(tag: u8) -> Option<ValueType> {
    match tag {
        1 => Some(ValueType::Boolean),
        2 => Some(ValueType::BooleanArray),
        3 => Some(ValueType::Integer),
        4 => Some(ValueType::IntegerArray),
        5 => Some(ValueType::Double),
        6 => Some(ValueType::DoubleArray),
        7 => Some(ValueType::String),
        8 => Some(ValueType::StringArray),
        9 => Some(ValueType::Byte),
        10 => Some(ValueType::ByteArray),
        _ => None,
    }
}
