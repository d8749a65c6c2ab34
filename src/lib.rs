//! # rlog-engine
//!
//! Log ingestion engine for RLOG telemetry.
//!
//! - **Wire decoding** ([`protocol`]): incremental or one-shot decoding of the
//!   RLOG binary grammar into timestamped [`model::Entry`] batches
//! - **Storage** ([`store`]): a sparse, time-indexed [`store::FieldStore`]
//!   answering "value as of t" and range queries
//! - **Live transport** ([`live`]): length-prefixed frames over TCP with
//!   idle timeout and heartbeat
//!
//! ## Example
//!
//! ```
//! use rlog_engine::model::{Entry, Value, ValueType};
//! use rlog_engine::protocol::EntryEncoder;
//! use rlog_engine::{ingest, DecoderConfig};
//!
//! let bytes = EntryEncoder::encode_log(&[
//!     Entry::new(0.02).with("/Drive/Velocity", Value::Double(1.5)),
//!     Entry::new(0.04).with("/Drive/Velocity", Value::Double(1.75)),
//! ])
//! .unwrap();
//!
//! let store = ingest::load_bytes(&bytes, &DecoderConfig::default()).unwrap();
//! let field = store.find_field("/Drive/Velocity", ValueType::Double).unwrap();
//! let range = store.get_data_in_range(field, 0.0, 1.0);
//! assert_eq!(range.start.unwrap().value, Some(Value::Double(1.5)));
//! assert_eq!(range.samples.len(), 1);
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod ingest;
pub mod live;
pub mod model;
pub mod protocol;
pub mod store;
pub mod transport;

pub use config::{DecoderConfig, LiveConfig};
pub use error::{Result, RlogError};
pub use live::{LiveEvent, LiveSession};
pub use store::FieldStore;
