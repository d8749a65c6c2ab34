//! Configuration for decoding and live sessions.
//!
//! All structs implement `Default` and deserialize with `#[serde(default)]`,
//! so a partial JSON document only overrides the fields it names:
//!
//! ```
//! use rlog_engine::config::LiveConfig;
//!
//! let config = LiveConfig::from_json_str(r#"{ "port": 5810 }"#).unwrap();
//! assert_eq!(config.port, 5810);
//! assert_eq!(config.heartbeat_interval_ms, 500);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::{DEFAULT_MAX_FRAME_PAYLOAD, HEARTBEAT_DATA};

/// Default live server port.
pub const DEFAULT_PORT: u16 = 5800;

/// Default connect timeout in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3000;

/// Default time without inbound data before the session is closed.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 3000;

/// Default delay between heartbeats.
pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 500;

/// Default capacity of the live event channel.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

/// What the decoder does with tags it does not recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownTagPolicy {
    /// Treat the record as payload-free, warn, and keep decoding.
    #[default]
    Skip,
    /// Stop decoding with an error.
    Fatal,
}

/// Plausible step between consecutive timestamps.
///
/// A timestamp outside `[last + min_step, last + max_step]` (or non-finite)
/// is treated as corrupted data and skipped byte by byte.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimestampGuard {
    pub min_step: f64,
    pub max_step: f64,
}

impl Default for TimestampGuard {
    fn default() -> Self {
        Self {
            min_step: 0.0001,
            max_step: 15.0,
        }
    }
}

/// Wire decoder configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub unknown_tags: UnknownTagPolicy,
    /// Corrupted-timestamp recovery; disabled when `None`.
    pub timestamp_guard: Option<TimestampGuard>,
}

/// Live session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub idle_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub heartbeat_data: Vec<u8>,
    pub max_frame_payload: u32,
    pub event_channel_capacity: usize,
    pub decoder: DecoderConfig,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            heartbeat_data: HEARTBEAT_DATA.to_vec(),
            max_frame_payload: DEFAULT_MAX_FRAME_PAYLOAD,
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            decoder: DecoderConfig::default(),
        }
    }
}

impl LiveConfig {
    /// Parse a (possibly partial) JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[inline]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    #[inline]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    #[inline]
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}
