//! Field and array-element records stored in the arena.

use serde::{Deserialize, Serialize};

use super::{ElementId, FieldId};
use crate::model::{Value, ValueType};

/// One `(key, type)` time series.
#[derive(Debug, Clone)]
pub(crate) struct Field {
    pub(crate) key: String,
    pub(crate) value_type: ValueType,
    /// Indices into the global timestamp sequence, non-decreasing.
    pub(crate) indices: Vec<usize>,
    /// Parallel to `indices`; `None` is an explicit null.
    pub(crate) values: Vec<Option<Value>>,
    /// Element roster for array types, grows to the longest array seen.
    pub(crate) elements: Vec<ElementId>,
    pub(crate) display_key: String,
}

impl Field {
    pub(crate) fn new(key: String, value_type: ValueType) -> Self {
        Self {
            display_key: key.clone(),
            key,
            value_type,
            indices: Vec::new(),
            values: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, index: usize, value: Option<Value>) {
        self.indices.push(index);
        self.values.push(value);
    }

    /// Whether the most recent value is non-null.
    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        matches!(self.values.last(), Some(Some(_)))
    }
}

/// Virtual sub-field exposing element `index` of its parent's value.
#[derive(Debug, Clone)]
pub(crate) struct ArrayElement {
    pub(crate) parent: FieldId,
    pub(crate) index: usize,
    pub(crate) display_key: String,
}

/// Descriptive copy of a field or element, as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub key: String,
    pub display_key: String,
    /// For elements, the scalar type of one element.
    pub value_type: ValueType,
    /// Set for array elements.
    pub array_index: Option<usize>,
}
