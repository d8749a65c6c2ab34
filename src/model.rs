//! Core data types shared by the decoder and the field store.
//!
//! An [`Entry`] is one timestamped batch of [`Update`]s. Each update names a
//! key and either carries a typed [`Value`] or is a null, meaning "cleared".

use std::fmt;

use serde::{Deserialize, Serialize};

/// Type of a stored field.
///
/// Scalar types each have an array variant. The wire null is not a type; it
/// is represented by an update with no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueType {
    Boolean,
    Byte,
    Integer,
    Double,
    String,
    BooleanArray,
    ByteArray,
    IntegerArray,
    DoubleArray,
    StringArray,
}

impl ValueType {
    /// All value types, scalars first.
    pub const ALL: [ValueType; 10] = [
        ValueType::Boolean,
        ValueType::Byte,
        ValueType::Integer,
        ValueType::Double,
        ValueType::String,
        ValueType::BooleanArray,
        ValueType::ByteArray,
        ValueType::IntegerArray,
        ValueType::DoubleArray,
        ValueType::StringArray,
    ];

    /// Name used in type-suffixed display keys.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Boolean => "Boolean",
            ValueType::Byte => "Byte",
            ValueType::Integer => "Integer",
            ValueType::Double => "Double",
            ValueType::String => "String",
            ValueType::BooleanArray => "BooleanArray",
            ValueType::ByteArray => "ByteArray",
            ValueType::IntegerArray => "IntegerArray",
            ValueType::DoubleArray => "DoubleArray",
            ValueType::StringArray => "StringArray",
        }
    }

    #[inline]
    pub fn is_array(self) -> bool {
        self.element_type().is_some()
    }

    /// Scalar type of one element, for array types.
    pub fn element_type(self) -> Option<ValueType> {
        match self {
            ValueType::BooleanArray => Some(ValueType::Boolean),
            ValueType::ByteArray => Some(ValueType::Byte),
            ValueType::IntegerArray => Some(ValueType::Integer),
            ValueType::DoubleArray => Some(ValueType::Double),
            ValueType::StringArray => Some(ValueType::String),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Boolean(bool),
    Byte(u8),
    Integer(i32),
    Double(f64),
    String(String),
    BooleanArray(Vec<bool>),
    ByteArray(Vec<u8>),
    IntegerArray(Vec<i32>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Boolean(_) => ValueType::Boolean,
            Value::Byte(_) => ValueType::Byte,
            Value::Integer(_) => ValueType::Integer,
            Value::Double(_) => ValueType::Double,
            Value::String(_) => ValueType::String,
            Value::BooleanArray(_) => ValueType::BooleanArray,
            Value::ByteArray(_) => ValueType::ByteArray,
            Value::IntegerArray(_) => ValueType::IntegerArray,
            Value::DoubleArray(_) => ValueType::DoubleArray,
            Value::StringArray(_) => ValueType::StringArray,
        }
    }

    /// Number of elements, for array values.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Value::BooleanArray(v) => Some(v.len()),
            Value::ByteArray(v) => Some(v.len()),
            Value::IntegerArray(v) => Some(v.len()),
            Value::DoubleArray(v) => Some(v.len()),
            Value::StringArray(v) => Some(v.len()),
            _ => None,
        }
    }

    /// Element `index` of an array value as a scalar value.
    ///
    /// Returns `None` for scalars and for indices past the end.
    pub fn element(&self, index: usize) -> Option<Value> {
        match self {
            Value::BooleanArray(v) => v.get(index).copied().map(Value::Boolean),
            Value::ByteArray(v) => v.get(index).copied().map(Value::Byte),
            Value::IntegerArray(v) => v.get(index).copied().map(Value::Integer),
            Value::DoubleArray(v) => v.get(index).copied().map(Value::Double),
            Value::StringArray(v) => v.get(index).cloned().map(Value::String),
            _ => None,
        }
    }
}

/// One key's change within an [`Entry`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub key: String,
    /// `None` is an explicit null: every type stored under `key` is cleared.
    pub value: Option<Value>,
}

impl Update {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
        }
    }

    pub fn null(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }
}

/// A timestamped batch of updates (one logging cycle).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// Seconds.
    pub timestamp: f64,
    pub updates: Vec<Update>,
}

impl Entry {
    pub fn new(timestamp: f64) -> Self {
        Self {
            timestamp,
            updates: Vec::new(),
        }
    }

    /// Builder-style helper for tests and encoders.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.updates.push(Update::new(key, value));
        self
    }

    pub fn with_null(mut self, key: impl Into<String>) -> Self {
        self.updates.push(Update::null(key));
        self
    }
}
