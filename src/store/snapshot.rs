//! Serializable copy of a store's raw data.
//!
//! A snapshot holds the global timestamps and each field's key, type and
//! parallel index/value arrays. Element rosters, lookup maps and display keys
//! are derived, so they are rebuilt on restore rather than stored.

use serde::{Deserialize, Serialize};

use super::{FieldId, FieldStore};
use crate::codec::MsgPackCodec;
use crate::error::{RlogError, Result};
use crate::model::{Value, ValueType};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub timestamps: Vec<f64>,
    pub fields: Vec<FieldSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub key: String,
    pub value_type: ValueType,
    pub indices: Vec<usize>,
    pub values: Vec<Option<Value>>,
}

impl FieldStore {
    /// Copy out the raw data.
    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            timestamps: self.timestamps.clone(),
            fields: self
                .fields
                .iter()
                .map(|field| FieldSnapshot {
                    key: field.key.clone(),
                    value_type: field.value_type,
                    indices: field.indices.clone(),
                    values: field.values.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild a store from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the snapshot breaks a store invariant:
    /// unordered timestamps, mismatched or unordered field arrays, indices
    /// out of range, values of the wrong type, or a repeated `(key, type)`.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        let StoreSnapshot { timestamps, fields } = snapshot;
        if timestamps.iter().any(|t| t.is_nan()) || timestamps.windows(2).any(|w| w[1] < w[0]) {
            return Err(invalid("timestamps are not ordered"));
        }

        let mut store = FieldStore {
            timestamps,
            ..FieldStore::default()
        };
        for field in fields {
            validate_field(&field, store.timestamps.len())?;
            if store.find_field(&field.key, field.value_type).is_some() {
                return Err(invalid(&format!(
                    "duplicate field {} [{}]",
                    field.key, field.value_type
                )));
            }

            let longest = field
                .values
                .iter()
                .filter_map(|v| v.as_ref().and_then(Value::array_len))
                .max();
            let id: FieldId =
                store.insert_field(&field.key, field.value_type, field.indices, field.values);
            if let Some(len) = longest {
                store.grow_elements(id, len);
            }
        }
        store.update_display_keys();
        Ok(store)
    }
}

fn validate_field(field: &FieldSnapshot, timestamp_count: usize) -> Result<()> {
    if field.indices.len() != field.values.len() {
        return Err(invalid(&format!("field {} has mismatched arrays", field.key)));
    }
    if field.indices.windows(2).any(|w| w[1] < w[0]) {
        return Err(invalid(&format!("field {} indices are not ordered", field.key)));
    }
    if field.indices.iter().any(|i| *i >= timestamp_count) {
        return Err(invalid(&format!("field {} index out of range", field.key)));
    }
    let wrong_type = field
        .values
        .iter()
        .flatten()
        .any(|v| v.value_type() != field.value_type);
    if wrong_type {
        return Err(invalid(&format!("field {} has mixed value types", field.key)));
    }
    Ok(())
}

fn invalid(reason: &str) -> RlogError {
    RlogError::Protocol(format!("invalid snapshot: {}", reason))
}

/// Serialize a snapshot to MsgPack bytes.
pub fn encode_snapshot(snapshot: &StoreSnapshot) -> Result<Vec<u8>> {
    MsgPackCodec::encode(snapshot)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<StoreSnapshot> {
    MsgPackCodec::decode(bytes)
}
