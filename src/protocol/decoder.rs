//! Streaming RLOG decoder.
//!
//! Uses `bytes::BytesMut` to retain unconsumed input between calls and a
//! state machine over the stream grammar:
//! - `Header`: need the revision and reserved bytes
//! - `Timestamp`: need an 8-byte timestamp to open an entry
//! - `Records`: entry open, reading sub-records until tag 0
//! - `Flushed`: entry handed out early at a known boundary (live frames)
//!
//! Each unit (header, timestamp, sub-record) is consumed whole or not at all,
//! so a record split across chunks is never lost or decoded twice.
//!
//! # Example
//!
//! ```
//! use rlog_engine::model::{Entry, Value};
//! use rlog_engine::protocol::{DecodeMode, EntryEncoder, WireDecoder};
//!
//! let bytes = EntryEncoder::encode_log(&[
//!     Entry::new(0.02).with("/Drive/Speed", Value::Double(1.5)),
//! ])
//! .unwrap();
//!
//! let mut decoder = WireDecoder::new();
//! let mut entries = decoder.decode(&bytes[..7], DecodeMode::Incremental).unwrap();
//! entries.extend(decoder.decode(&bytes[7..], DecodeMode::OneShot).unwrap());
//! assert_eq!(entries.len(), 1);
//! assert_eq!(entries[0].updates[0].key, "/Drive/Speed");
//! ```

use std::collections::{HashMap, HashSet};

use bytes::{Buf, BytesMut};

use super::reader::ByteReader;
use super::wire_format::{record, value_type_from_tag, LOG_REVISION, NULL_TAG};
use crate::config::{DecoderConfig, UnknownTagPolicy};
use crate::error::{RlogError, Result};
use crate::model::{Entry, Update, Value, ValueType};

/// How the caller is delivering bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// More bytes may follow; keep any unfinished record for the next call.
    Incremental,
    /// This is the end of the stream; emit the open entry and drop any
    /// truncated trailing record.
    OneShot,
}

/// Decoder state machine.
#[derive(Debug)]
enum State {
    Header,
    Timestamp,
    Records(Entry),
    Flushed { timestamp: f64 },
    Failed { revision: u8 },
}

/// What the next unit of input is expected to be.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Header,
    Timestamp,
    Record,
}

/// One fully parsed unit of input.
#[derive(Debug)]
enum Unit {
    Header,
    Timestamp(f64),
    EndOfEntry,
    RegisterKey { id: u16, key: String },
    Update { key_id: u16, value: Option<Value> },
    UnknownValue { key_id: u16, tag: u8 },
    UnknownRecord { tag: u8 },
}

/// Decodes RLOG bytes into [`Entry`] batches.
///
/// One decoder is one decode session: its key dictionary is never shared with
/// another decoder.
pub struct WireDecoder {
    config: DecoderConfig,
    /// Bytes received but not yet consumed.
    buffer: BytesMut,
    state: State,
    key_ids: HashMap<u16, String>,
    last_timestamp: Option<f64>,
    /// Last good timestamp for which corruption was already reported.
    last_corrupted: Option<f64>,
    warned_tags: HashSet<(bool, u8)>,
    consumed: u64,
    skipped: u64,
    unknown_tags: u64,
}

impl WireDecoder {
    /// Create a decoder with default settings.
    pub fn new() -> Self {
        Self::with_config(DecoderConfig::default())
    }

    pub fn with_config(config: DecoderConfig) -> Self {
        Self {
            config,
            buffer: BytesMut::new(),
            state: State::Header,
            key_ids: HashMap::new(),
            last_timestamp: None,
            last_corrupted: None,
            warned_tags: HashSet::new(),
            consumed: 0,
            skipped: 0,
            unknown_tags: 0,
        }
    }

    /// Decode a complete log with a fresh session.
    pub fn decode_all(bytes: &[u8]) -> Result<Vec<Entry>> {
        Self::new().decode(bytes, DecodeMode::OneShot)
    }

    /// Feed bytes and return every entry completed by them.
    ///
    /// # Errors
    ///
    /// - [`RlogError::FormatIncompatible`] if the revision byte is not supported;
    ///   every later call returns the same error.
    /// - [`RlogError::UnknownValueType`] / [`RlogError::UnknownRecordType`] when
    ///   the unknown-tag policy is `Fatal`.
    ///
    /// Truncated input is never an error: it is retained (incremental) or
    /// dropped after emitting what was decoded (one-shot).
    pub fn decode(&mut self, bytes: &[u8], mode: DecodeMode) -> Result<Vec<Entry>> {
        if let State::Failed { revision } = self.state {
            return Err(RlogError::FormatIncompatible { revision });
        }

        self.buffer.extend_from_slice(bytes);

        let mut entries = Vec::new();
        self.drain(&mut entries)?;

        if mode == DecodeMode::OneShot {
            if !self.buffer.is_empty() {
                tracing::debug!(
                    bytes = self.buffer.len(),
                    offset = self.consumed,
                    "Discarding truncated trailing record"
                );
                self.skipped += self.buffer.len() as u64;
                self.buffer.clear();
            }
            entries.extend(self.flush());
        }

        Ok(entries)
    }

    /// Emit the open entry now, at a known entry boundary.
    ///
    /// Sub-records that arrive afterwards without a new timestamp are
    /// reported as a continuation entry with the same timestamp.
    pub fn flush(&mut self) -> Option<Entry> {
        match std::mem::replace(&mut self.state, State::Timestamp) {
            State::Records(entry) => {
                self.state = State::Flushed {
                    timestamp: entry.timestamp,
                };
                Some(entry)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    /// Total bytes consumed from the stream so far.
    #[inline]
    pub fn consumed_bytes(&self) -> u64 {
        self.consumed
    }

    /// Bytes dropped by corruption recovery or truncation.
    #[inline]
    pub fn skipped_bytes(&self) -> u64 {
        self.skipped
    }

    /// Number of unknown tags skipped.
    #[inline]
    pub fn unknown_tag_count(&self) -> u64 {
        self.unknown_tags
    }

    /// Bytes held back waiting for the rest of a record.
    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of registered keys in this session.
    #[inline]
    pub fn key_count(&self) -> usize {
        self.key_ids.len()
    }

    /// Parse and apply units until the buffer runs short.
    fn drain(&mut self, out: &mut Vec<Entry>) -> Result<()> {
        loop {
            let expect = match &self.state {
                State::Header => Expect::Header,
                State::Timestamp => Expect::Timestamp,
                State::Records(_) | State::Flushed { .. } => Expect::Record,
                State::Failed { revision } => {
                    return Err(RlogError::FormatIncompatible {
                        revision: *revision,
                    })
                }
            };

            let (unit, used) = {
                let mut reader = ByteReader::new(&self.buffer);
                match parse_unit(&mut reader, expect) {
                    Ok(unit) => (unit, reader.position()),
                    Err(RlogError::TruncatedStream { .. }) => return Ok(()),
                    Err(RlogError::FormatIncompatible { revision }) => {
                        tracing::error!(revision, "Unsupported log revision");
                        self.state = State::Failed { revision };
                        return Err(RlogError::FormatIncompatible { revision });
                    }
                    Err(e) => return Err(e),
                }
            };

            if let Unit::Timestamp(timestamp) = unit {
                if self.timestamp_rejected(timestamp) {
                    // Slide forward one byte and look for a valid timestamp
                    self.buffer.advance(1);
                    self.consumed += 1;
                    self.skipped += 1;
                    continue;
                }
            }

            self.buffer.advance(used);
            self.consumed += used as u64;
            self.apply(unit, out)?;
        }
    }

    fn apply(&mut self, unit: Unit, out: &mut Vec<Entry>) -> Result<()> {
        match unit {
            Unit::Header => {
                self.state = State::Timestamp;
            }
            Unit::Timestamp(timestamp) => {
                self.last_timestamp = Some(timestamp);
                self.state = State::Records(Entry::new(timestamp));
            }
            Unit::EndOfEntry => {
                if let State::Records(entry) = std::mem::replace(&mut self.state, State::Timestamp)
                {
                    out.push(entry);
                }
            }
            Unit::RegisterKey { id, key } => {
                tracing::trace!(id, key = %key, "Registered key");
                self.key_ids.insert(id, key);
            }
            Unit::Update { key_id, value } => {
                let Some(key) = self.key_ids.get(&key_id) else {
                    tracing::warn!(key_id, "Update for unregistered key id dropped");
                    return Ok(());
                };
                let update = Update {
                    key: key.clone(),
                    value,
                };
                match &mut self.state {
                    State::Records(entry) => entry.updates.push(update),
                    State::Flushed { timestamp } => {
                        let mut entry = Entry::new(*timestamp);
                        entry.updates.push(update);
                        self.state = State::Records(entry);
                    }
                    _ => {}
                }
            }
            Unit::UnknownValue { key_id, tag } => {
                if self.config.unknown_tags == UnknownTagPolicy::Fatal {
                    return Err(RlogError::UnknownValueType { tag });
                }
                self.unknown_tags += 1;
                if self.warned_tags.insert((true, tag)) {
                    tracing::warn!(key_id, tag, "Skipping update with unknown value type");
                }
            }
            Unit::UnknownRecord { tag } => {
                if self.config.unknown_tags == UnknownTagPolicy::Fatal {
                    return Err(RlogError::UnknownRecordType { tag });
                }
                self.unknown_tags += 1;
                if self.warned_tags.insert((false, tag)) {
                    tracing::warn!(tag, offset = self.consumed, "Skipping unknown record type");
                }
            }
        }
        Ok(())
    }

    /// Check a timestamp against the configured guard.
    fn timestamp_rejected(&mut self, timestamp: f64) -> bool {
        let Some(guard) = self.config.timestamp_guard else {
            return false;
        };

        let rejected = match self.last_timestamp {
            None => !timestamp.is_finite(),
            Some(last) => {
                !timestamp.is_finite()
                    || timestamp < last + guard.min_step
                    || timestamp > last + guard.max_step
            }
        };

        if rejected {
            let last = self.last_timestamp.unwrap_or(0.0);
            if self.last_corrupted != Some(last) {
                tracing::warn!(
                    near_seconds = last,
                    byte = self.consumed,
                    "Corrupted log data skipped"
                );
            }
            self.last_corrupted = Some(last);
        }
        rejected
    }
}

impl Default for WireDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one unit without touching decoder state.
fn parse_unit(reader: &mut ByteReader<'_>, expect: Expect) -> Result<Unit> {
    match expect {
        Expect::Header => {
            let revision = reader.u8()?;
            if revision != LOG_REVISION {
                return Err(RlogError::FormatIncompatible { revision });
            }
            reader.u8()?; // reserved
            Ok(Unit::Header)
        }
        Expect::Timestamp => Ok(Unit::Timestamp(reader.f64()?)),
        Expect::Record => match reader.u8()? {
            record::NEW_TIMESTAMP => Ok(Unit::EndOfEntry),
            record::REGISTER_KEY => {
                let id = reader.u16()?;
                let key = reader.string()?;
                Ok(Unit::RegisterKey { id, key })
            }
            record::FIELD_UPDATE => {
                let key_id = reader.u16()?;
                let tag = reader.u8()?;
                if tag == NULL_TAG {
                    return Ok(Unit::Update {
                        key_id,
                        value: None,
                    });
                }
                match value_type_from_tag(tag) {
                    Some(value_type) => Ok(Unit::Update {
                        key_id,
                        value: Some(parse_value(reader, value_type)?),
                    }),
                    None => Ok(Unit::UnknownValue { key_id, tag }),
                }
            }
            tag => Ok(Unit::UnknownRecord { tag }),
        },
    }
}

fn parse_value(reader: &mut ByteReader<'_>, value_type: ValueType) -> Result<Value> {
    let value = match value_type {
        ValueType::Boolean => Value::Boolean(reader.u8()? != 0),
        ValueType::Byte => Value::Byte(reader.u8()?),
        ValueType::Integer => Value::Integer(reader.i32()?),
        ValueType::Double => Value::Double(reader.f64()?),
        ValueType::String => Value::String(reader.string()?),
        ValueType::BooleanArray => {
            let len = reader.u16()? as usize;
            Value::BooleanArray(reader.take(len)?.iter().map(|b| *b != 0).collect())
        }
        ValueType::ByteArray => {
            let len = reader.u16()? as usize;
            Value::ByteArray(reader.take(len)?.to_vec())
        }
        ValueType::IntegerArray => {
            let len = reader.u16()? as usize;
            let bytes = reader.take(len * 4)?;
            Value::IntegerArray(
                bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            )
        }
        ValueType::DoubleArray => {
            let len = reader.u16()? as usize;
            let bytes = reader.take(len * 8)?;
            Value::DoubleArray(
                bytes
                    .chunks_exact(8)
                    .map(|c| f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            )
        }
        ValueType::StringArray => {
            let len = reader.u16()? as usize;
            let mut strings = Vec::with_capacity(len);
            for _ in 0..len {
                strings.push(reader.string()?);
            }
            Value::StringArray(strings)
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimestampGuard;
    use crate::protocol::EntryEncoder;

    fn sample_log() -> Vec<u8> {
        EntryEncoder::encode_log(&[
            Entry::new(0.0)
                .with("/Robot/Enabled", Value::Boolean(true))
                .with("/Robot/Mode", Value::String("auto".into())),
            Entry::new(0.02)
                .with("/Drive/Pose", Value::DoubleArray(vec![1.0, 2.0, 0.5]))
                .with("/Robot/Enabled", Value::Boolean(false)),
            Entry::new(0.04).with_null("/Robot/Mode"),
        ])
        .unwrap()
    }

    #[test]
    fn test_one_shot_decodes_all_entries() {
        let entries = WireDecoder::decode_all(&sample_log()).unwrap();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].timestamp, 0.0);
        assert_eq!(entries[0].updates.len(), 2);
        assert_eq!(
            entries[1].updates[0].value,
            Some(Value::DoubleArray(vec![1.0, 2.0, 0.5]))
        );
        assert_eq!(entries[2].updates, vec![Update::null("/Robot/Mode")]);
    }

    #[test]
    fn test_rejects_unsupported_revision() {
        let mut bytes = sample_log();
        bytes[0] = 2;

        let mut decoder = WireDecoder::new();
        let err = decoder.decode(&bytes, DecodeMode::OneShot).unwrap_err();
        assert!(matches!(err, RlogError::FormatIncompatible { revision: 2 }));

        // Stays failed; no partial trust
        let err = decoder.decode(&[], DecodeMode::Incremental).unwrap_err();
        assert!(matches!(err, RlogError::FormatIncompatible { revision: 2 }));
    }

    #[test]
    fn test_revision_checked_from_first_byte() {
        let mut decoder = WireDecoder::new();
        let err = decoder.decode(&[9], DecodeMode::Incremental).unwrap_err();
        assert!(matches!(err, RlogError::FormatIncompatible { revision: 9 }));
    }

    #[test]
    fn test_byte_at_a_time_matches_one_shot() {
        let bytes = sample_log();
        let expected = WireDecoder::decode_all(&bytes).unwrap();

        let mut decoder = WireDecoder::new();
        let mut entries = Vec::new();
        for byte in &bytes {
            entries.extend(decoder.decode(&[*byte], DecodeMode::Incremental).unwrap());
        }
        entries.extend(decoder.decode(&[], DecodeMode::OneShot).unwrap());

        assert_eq!(entries, expected);
        assert_eq!(decoder.consumed_bytes(), bytes.len() as u64);
    }

    #[test]
    fn test_incremental_waits_for_entry_terminator() {
        let bytes = sample_log();
        let mut decoder = WireDecoder::new();

        // Everything but the last entry's records: only entries closed by tag 0
        let entries = decoder
            .decode(&bytes, DecodeMode::Incremental)
            .unwrap();
        assert_eq!(entries.len(), 2);

        let last = decoder.flush().unwrap();
        assert_eq!(last.timestamp, 0.04);
        assert!(decoder.flush().is_none());
    }

    #[test]
    fn test_truncated_tail_is_retained_then_completed() {
        let bytes = sample_log();
        let cut = bytes.len() - 3;

        let mut decoder = WireDecoder::new();
        decoder.decode(&bytes[..cut], DecodeMode::Incremental).unwrap();
        assert!(decoder.buffered_len() > 0);

        let rest = decoder.decode(&bytes[cut..], DecodeMode::OneShot).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].updates, vec![Update::null("/Robot/Mode")]);
    }

    #[test]
    fn test_one_shot_stops_silently_on_truncation() {
        let bytes = sample_log();
        // Chop into the middle of the DoubleArray payload of the second entry
        let full = WireDecoder::decode_all(&bytes).unwrap();
        let mut decoder = WireDecoder::new();
        let entries = decoder
            .decode(&bytes[..bytes.len() - 20], DecodeMode::OneShot)
            .unwrap();

        assert_eq!(entries[0], full[0]);
        assert!(entries.len() <= 2);
        assert!(decoder.skipped_bytes() > 0);
    }

    #[test]
    fn test_flush_then_continuation_keeps_timestamp() {
        let mut encoder = EntryEncoder::new();
        let first = encoder
            .encode_entry(&Entry::new(1.0).with("/A", Value::Integer(1)))
            .unwrap();

        let mut decoder = WireDecoder::new();
        assert!(decoder.decode(&first, DecodeMode::Incremental).unwrap().is_empty());
        let flushed = decoder.flush().unwrap();
        assert_eq!(flushed.updates.len(), 1);

        // A stray update with no new timestamp
        let stray = [record::FIELD_UPDATE, 0, 0, 3, 0, 0, 0, 7];
        decoder.decode(&stray, DecodeMode::Incremental).unwrap();
        let continuation = decoder.flush().unwrap();
        assert_eq!(continuation.timestamp, 1.0);
        assert_eq!(continuation.updates[0].value, Some(Value::Integer(7)));
    }

    #[test]
    fn test_unregistered_key_id_dropped() {
        let mut bytes = vec![LOG_REVISION, 0];
        bytes.extend_from_slice(&1.0f64.to_be_bytes());
        // Update for id 5 which was never registered
        bytes.extend_from_slice(&[record::FIELD_UPDATE, 0, 5, 1, 1]);
        // Register id 5, then update it
        bytes.extend_from_slice(&[record::REGISTER_KEY, 0, 5, 0, 2, b'/', b'K']);
        bytes.extend_from_slice(&[record::FIELD_UPDATE, 0, 5, 1, 0]);

        let entries = WireDecoder::decode_all(&bytes).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].updates, vec![Update::new("/K", Value::Boolean(false))]);
    }

    #[test]
    fn test_unknown_value_type_skipped() {
        let mut bytes = vec![LOG_REVISION, 0];
        bytes.extend_from_slice(&1.0f64.to_be_bytes());
        bytes.extend_from_slice(&[record::REGISTER_KEY, 0, 1, 0, 2, b'/', b'K']);
        bytes.extend_from_slice(&[record::FIELD_UPDATE, 0, 1, 42]);
        bytes.extend_from_slice(&[record::FIELD_UPDATE, 0, 1, 9, 0x7F]);

        let mut decoder = WireDecoder::new();
        let entries = decoder.decode(&bytes, DecodeMode::OneShot).unwrap();
        assert_eq!(entries[0].updates, vec![Update::new("/K", Value::Byte(0x7F))]);
        assert_eq!(decoder.unknown_tag_count(), 1);
    }

    #[test]
    fn test_unknown_value_type_fatal_policy() {
        let mut bytes = vec![LOG_REVISION, 0];
        bytes.extend_from_slice(&1.0f64.to_be_bytes());
        bytes.extend_from_slice(&[record::REGISTER_KEY, 0, 1, 0, 2, b'/', b'K']);
        bytes.extend_from_slice(&[record::FIELD_UPDATE, 0, 1, 42]);

        let mut decoder = WireDecoder::with_config(DecoderConfig {
            unknown_tags: UnknownTagPolicy::Fatal,
            ..Default::default()
        });
        let err = decoder.decode(&bytes, DecodeMode::OneShot).unwrap_err();
        assert!(matches!(err, RlogError::UnknownValueType { tag: 42 }));
    }

    #[test]
    fn test_timestamp_guard_skips_corruption() {
        let mut encoder = EntryEncoder::new();
        let first = encoder
            .encode_entry(&Entry::new(1.0).with("/A", Value::Integer(1)))
            .unwrap();
        let second = encoder
            .encode_entry(&Entry::new(1.02).with("/A", Value::Integer(2)))
            .unwrap();

        // Garbage right after the entry terminator shifts the next timestamp
        let mut corrupted = first;
        corrupted.push(record::NEW_TIMESTAMP);
        corrupted.extend_from_slice(&1.0e9f64.to_be_bytes()[..3]);
        corrupted.extend_from_slice(&second[1..]);

        let mut decoder = WireDecoder::with_config(DecoderConfig {
            timestamp_guard: Some(TimestampGuard::default()),
            ..Default::default()
        });
        let entries = decoder.decode(&corrupted, DecodeMode::OneShot).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].timestamp, 1.02);
        assert_eq!(entries[1].updates[0].value, Some(Value::Integer(2)));
        assert_eq!(decoder.skipped_bytes(), 3);
    }

    #[test]
    fn test_key_dictionary_is_per_session() {
        let bytes = sample_log();
        let mut a = WireDecoder::new();
        a.decode(&bytes, DecodeMode::OneShot).unwrap();
        let b = WireDecoder::new();
        assert!(a.key_count() > 0);
        assert_eq!(b.key_count(), 0);
    }
}
