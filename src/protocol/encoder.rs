//! RLOG encoder, the writer side of the wire grammar.
//!
//! Keys are registered the first time they are seen, so the stream is
//! self-contained for any decoder that starts at its first byte. Each call to
//! [`EntryEncoder::encode_entry`] yields exactly one logging cycle, which is
//! also what one live frame carries.
//!
//! # Example
//!
//! ```
//! use rlog_engine::model::{Entry, Value};
//! use rlog_engine::protocol::{build_frame, EntryEncoder};
//!
//! let mut encoder = EntryEncoder::new();
//! let payload = encoder
//!     .encode_entry(&Entry::new(0.5).with("/Arm/Angle", Value::Double(0.25)))
//!     .unwrap();
//! let frame = build_frame(&payload).unwrap();
//! assert_eq!(&frame[..4], &(payload.len() as u32).to_be_bytes());
//! ```

use std::collections::HashMap;

use super::wire_format::{record, value_type_tag, LOG_REVISION, NULL_TAG};
use crate::error::{RlogError, Result};
use crate::model::{Entry, Value};

/// Stateful RLOG encoder.
#[derive(Debug, Default)]
pub struct EntryEncoder {
    key_ids: HashMap<String, u16>,
    header_written: bool,
}

impl EntryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a whole log (header plus every entry) into one buffer.
    pub fn encode_log(entries: &[Entry]) -> Result<Vec<u8>> {
        let mut encoder = Self::new();
        let mut out = Vec::new();
        for entry in entries {
            encoder.encode_entry_into(entry, &mut out)?;
        }
        Ok(out)
    }

    /// Encode one entry; the first call also writes the stream header.
    pub fn encode_entry(&mut self, entry: &Entry) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_entry_into(entry, &mut out)?;
        Ok(out)
    }

    /// Encode one entry, appending to `out`.
    ///
    /// On error `out` is restored to its previous length and the encoder is
    /// unchanged, so the next entry still starts a valid stream.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if a key, string or array is longer than a
    /// 16-bit length allows, or if more than 65536 keys are used.
    pub fn encode_entry_into(&mut self, entry: &Entry, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        let mut new_keys = Vec::new();
        match self.write_entry(entry, out, &mut new_keys) {
            Ok(()) => {
                self.header_written = true;
                self.key_ids.extend(new_keys);
                Ok(())
            }
            Err(e) => {
                out.truncate(start);
                Err(e)
            }
        }
    }

    /// Write one entry without touching encoder state. Keys first seen here
    /// are collected in `new_keys`.
    fn write_entry(
        &self,
        entry: &Entry,
        out: &mut Vec<u8>,
        new_keys: &mut Vec<(String, u16)>,
    ) -> Result<()> {
        if !self.header_written {
            // Reserved header byte doubles as the first entry's tag
            out.push(LOG_REVISION);
        }
        out.push(record::NEW_TIMESTAMP);
        out.extend_from_slice(&entry.timestamp.to_be_bytes());

        for update in &entry.updates {
            let key_id = self.key_id(&update.key, out, new_keys)?;
            out.push(record::FIELD_UPDATE);
            out.extend_from_slice(&key_id.to_be_bytes());
            match &update.value {
                None => out.push(NULL_TAG),
                Some(value) => {
                    out.push(value_type_tag(value.value_type()));
                    encode_value(value, out)?;
                }
            }
        }
        Ok(())
    }

    /// Look up or register a key id, writing the register record if new.
    fn key_id(
        &self,
        key: &str,
        out: &mut Vec<u8>,
        new_keys: &mut Vec<(String, u16)>,
    ) -> Result<u16> {
        if let Some(id) = self.key_ids.get(key) {
            return Ok(*id);
        }
        if let Some((_, id)) = new_keys.iter().find(|(k, _)| k == key) {
            return Ok(*id);
        }
        let id = u16::try_from(self.key_ids.len() + new_keys.len())
            .map_err(|_| RlogError::Protocol("too many keys for 16-bit key ids".to_string()))?;
        out.push(record::REGISTER_KEY);
        out.extend_from_slice(&id.to_be_bytes());
        encode_string(key, out)?;
        new_keys.push((key.to_string(), id));
        Ok(id)
    }
}

fn encode_len(len: usize, out: &mut Vec<u8>) -> Result<()> {
    let len = u16::try_from(len).map_err(|_| {
        RlogError::Protocol(format!("length {} exceeds 16-bit prefix", len))
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    Ok(())
}

fn encode_string(s: &str, out: &mut Vec<u8>) -> Result<()> {
    encode_len(s.len(), out)?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn encode_value(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Boolean(v) => out.push(u8::from(*v)),
        Value::Byte(v) => out.push(*v),
        Value::Integer(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::Double(v) => out.extend_from_slice(&v.to_be_bytes()),
        Value::String(v) => encode_string(v, out)?,
        Value::BooleanArray(v) => {
            encode_len(v.len(), out)?;
            out.extend(v.iter().map(|b| u8::from(*b)));
        }
        Value::ByteArray(v) => {
            encode_len(v.len(), out)?;
            out.extend_from_slice(v);
        }
        Value::IntegerArray(v) => {
            encode_len(v.len(), out)?;
            for x in v {
                out.extend_from_slice(&x.to_be_bytes());
            }
        }
        Value::DoubleArray(v) => {
            encode_len(v.len(), out)?;
            for x in v {
                out.extend_from_slice(&x.to_be_bytes());
            }
        }
        Value::StringArray(v) => {
            encode_len(v.len(), out)?;
            for s in v {
                encode_string(s, out)?;
            }
        }
    }
    Ok(())
}
