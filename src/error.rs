//! Error types for rlog-engine.

use std::time::Duration;

use thiserror::Error;

/// Main error type for decoding, storage and live transport operations.
#[derive(Debug, Error)]
pub enum RlogError {
    /// I/O error during file or socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error (configuration loading only).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error (store snapshots).
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error (store snapshots).
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// The log revision byte is not one this decoder understands.
    #[error("log format is incompatible with this decoder (revision {revision})")]
    FormatIncompatible { revision: u8 },

    /// Not enough bytes to finish the current record.
    #[error("truncated stream: need {needed} bytes, {available} available")]
    TruncatedStream { needed: usize, available: usize },

    /// Field update carried a value-type tag outside the known set.
    #[error("unknown value type tag: {tag}")]
    UnknownValueType { tag: u8 },

    /// Sub-record started with a tag outside the known set.
    #[error("unknown record type tag: {tag}")]
    UnknownRecordType { tag: u8 },

    /// Entry timestamp is NaN or earlier than the last stored timestamp.
    #[error("entry timestamp {timestamp} precedes last timestamp {previous}")]
    OutOfOrderTimestamp { previous: f64, timestamp: f64 },

    /// Live framing violation (oversized frame, etc.).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Connection attempt did not complete in time.
    #[error("connection timed out after {0:?}")]
    TransportTimeout(Duration),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,
}

impl RlogError {
    /// Whether the error came from the connection rather than the data.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RlogError::Io(_) | RlogError::TransportTimeout(_) | RlogError::ConnectionClosed
        )
    }
}

/// Result type alias using RlogError.
pub type Result<T> = std::result::Result<T, RlogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_incompatible_names_revision() {
        let err = RlogError::FormatIncompatible { revision: 7 };
        assert!(err.to_string().contains("revision 7"));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_classification() {
        assert!(RlogError::TransportTimeout(Duration::from_secs(3)).is_transport());
        assert!(RlogError::ConnectionClosed.is_transport());
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(RlogError::from(io).is_transport());
        assert!(!RlogError::UnknownValueType { tag: 42 }.is_transport());
    }
}
