//! Codec module - serialization of store snapshots.
//!
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`)
//!
//! Codecs are marker structs with static methods, so the format is chosen at
//! compile time.
//!
//! # Example
//!
//! ```
//! use rlog_engine::codec::MsgPackCodec;
//!
//! let encoded = MsgPackCodec::encode(&vec![1.5f64, 2.5]).unwrap();
//! let decoded: Vec<f64> = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, vec![1.5, 2.5]);
//! ```

mod msgpack;

pub use msgpack::MsgPackCodec;
