//! The field store arena and its query API.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::field::{ArrayElement, Field, FieldInfo};
use super::range::{field_range, RangeData};
use super::tree::FieldTreeNode;
use super::{ElementId, FieldHandle, FieldId};
use crate::error::{RlogError, Result};
use crate::model::{Entry, Value, ValueType};

/// Authoritative sparse time-series store.
///
/// Mutation happens only through [`FieldStore::add`], which appends. Display
/// keys are kept current on every `add`, so the store can be read between any
/// two calls.
#[derive(Debug, Clone, Default)]
pub struct FieldStore {
    pub(super) timestamps: Vec<f64>,
    pub(super) fields: Vec<Field>,
    pub(super) elements: Vec<ArrayElement>,
    /// Fields sharing a key, in creation order; at most one per type.
    pub(super) by_key: HashMap<String, Vec<FieldId>>,
    pub(super) by_display_key: HashMap<String, FieldHandle>,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry at a new global timestamp.
    ///
    /// For every update the `(key, type)` field is resolved or created and
    /// the value appended. Other-typed fields under the same key that are
    /// still active receive an explicit null at the same index. A null update
    /// clears every active field under its key. Array values grow the
    /// element roster when longer than any earlier value.
    ///
    /// # Errors
    ///
    /// Returns [`RlogError::OutOfOrderTimestamp`] if the timestamp is NaN or
    /// earlier than the last one; the store is left unchanged.
    pub fn add(&mut self, entry: &Entry) -> Result<()> {
        let previous = self.timestamps.last().copied().unwrap_or(f64::NEG_INFINITY);
        if entry.timestamp.is_nan() || entry.timestamp < previous {
            return Err(RlogError::OutOfOrderTimestamp {
                previous,
                timestamp: entry.timestamp,
            });
        }

        let index = self.timestamps.len();
        self.timestamps.push(entry.timestamp);

        for update in &entry.updates {
            match &update.value {
                None => self.clear_key(&update.key, index),
                Some(value) => self.write_value(&update.key, value, index),
            }
        }
        Ok(())
    }

    fn clear_key(&mut self, key: &str, index: usize) {
        if let Some(group) = self.by_key.get(key) {
            for id in group {
                let field = &mut self.fields[id.0];
                if field.is_active() {
                    field.push(index, None);
                }
            }
        }
    }

    fn write_value(&mut self, key: &str, value: &Value, index: usize) {
        let value_type = value.value_type();
        let id = match self.find_field(key, value_type) {
            Some(id) => id,
            None => self.create_field(key, value_type),
        };

        self.fields[id.0].push(index, Some(value.clone()));
        if let Some(len) = value.array_len() {
            self.grow_elements(id, len);
        }

        if let Some(group) = self.by_key.get(key) {
            for sibling in group.iter().filter(|s| **s != id) {
                let field = &mut self.fields[sibling.0];
                if field.is_active() {
                    field.push(index, None);
                }
            }
        }
    }

    fn create_field(&mut self, key: &str, value_type: ValueType) -> FieldId {
        let id = FieldId(self.fields.len());
        self.fields.push(Field::new(key.to_string(), value_type));
        self.by_key.entry(key.to_string()).or_default().push(id);
        self.assign_display_keys(key);
        tracing::debug!(key, value_type = %value_type, "New field");
        id
    }

    pub(super) fn insert_field(
        &mut self,
        key: &str,
        value_type: ValueType,
        indices: Vec<usize>,
        values: Vec<Option<Value>>,
    ) -> FieldId {
        let id = FieldId(self.fields.len());
        let mut field = Field::new(key.to_string(), value_type);
        field.indices = indices;
        field.values = values;
        self.fields.push(field);
        self.by_key.entry(key.to_string()).or_default().push(id);
        id
    }

    /// Extend the element roster of `parent` to `len` entries.
    pub(super) fn grow_elements(&mut self, parent: FieldId, len: usize) {
        let current = self.fields[parent.0].elements.len();
        if len <= current {
            return;
        }
        for index in current..len {
            let id = ElementId(self.elements.len());
            let display_key = format!("{}/{}", self.fields[parent.0].display_key, index);
            insert_element_mapping(&mut self.by_display_key, &display_key, id);
            self.elements.push(ArrayElement {
                parent,
                index,
                display_key,
            });
            self.fields[parent.0].elements.push(id);
        }
        tracing::trace!(
            key = %self.fields[parent.0].key,
            from = current,
            to = len,
            "Array elements added"
        );
    }

    /// Recompute display keys for every field and element under `key`.
    fn assign_display_keys(&mut self, key: &str) {
        let Some(group) = self.by_key.get(key) else {
            return;
        };
        let suffixed = group.len() > 1;
        let mut released = Vec::new();

        for id in group {
            let field = &self.fields[id.0];
            remove_mapping(&mut self.by_display_key, &field.display_key, (*id).into());
            released.push(field.display_key.clone());
            for element in &field.elements {
                let display_key = &self.elements[element.0].display_key;
                remove_mapping(&mut self.by_display_key, display_key, (*element).into());
            }
        }

        for id in group {
            let field = &mut self.fields[id.0];
            field.display_key = if suffixed {
                format!("{}[{}]", field.key, field.value_type)
            } else {
                field.key.clone()
            };
            self.by_display_key
                .insert(field.display_key.clone(), (*id).into());
            for element in &field.elements {
                let element_record = &mut self.elements[element.0];
                element_record.display_key =
                    format!("{}/{}", field.display_key, element_record.index);
                insert_element_mapping(
                    &mut self.by_display_key,
                    &element_record.display_key,
                    *element,
                );
            }
        }

        // An element shadowed by a field's old display key becomes reachable again
        for display_key in released {
            if self.by_display_key.contains_key(&display_key) {
                continue;
            }
            if let Some(i) = self.elements.iter().position(|e| e.display_key == display_key) {
                self.by_display_key
                    .insert(display_key, FieldHandle::Element(ElementId(i)));
            }
        }
    }

    /// Recompute every display key from scratch.
    ///
    /// `add` already keeps display keys current; this is a full rebuild and
    /// calling it repeatedly has no further effect.
    pub fn update_display_keys(&mut self) {
        self.by_display_key.clear();
        let keys: Vec<String> = {
            let mut seen = HashSet::new();
            self.fields
                .iter()
                .filter(|field| seen.insert(field.key.as_str()))
                .map(|field| field.key.clone())
                .collect()
        };
        for key in keys {
            self.assign_display_keys(&key);
        }
    }

    pub fn find_field(&self, key: &str, value_type: ValueType) -> Option<FieldId> {
        self.by_key
            .get(key)?
            .iter()
            .copied()
            .find(|id| self.fields[id.0].value_type == value_type)
    }

    pub fn find_field_by_display_key(&self, display_key: &str) -> Option<FieldHandle> {
        self.by_display_key.get(display_key).copied()
    }

    /// All fields stored under `key`, one per type.
    pub fn fields_for_key(&self, key: &str) -> Vec<FieldId> {
        self.by_key.get(key).cloned().unwrap_or_default()
    }

    pub fn field_info(&self, handle: impl Into<FieldHandle>) -> Option<FieldInfo> {
        match handle.into() {
            FieldHandle::Field(id) => {
                let field = self.fields.get(id.0)?;
                Some(FieldInfo {
                    key: field.key.clone(),
                    display_key: field.display_key.clone(),
                    value_type: field.value_type,
                    array_index: None,
                })
            }
            FieldHandle::Element(id) => {
                let element = self.elements.get(id.0)?;
                let parent = &self.fields[element.parent.0];
                Some(FieldInfo {
                    key: parent.key.clone(),
                    display_key: element.display_key.clone(),
                    value_type: parent.value_type.element_type()?,
                    array_index: Some(element.index),
                })
            }
        }
    }

    /// Carried value at `t0` plus every change in `(t0, t1]`.
    ///
    /// Element ranges are derived from the parent array's range. Unknown
    /// handles yield an empty [`RangeData`].
    pub fn get_data_in_range(&self, handle: impl Into<FieldHandle>, t0: f64, t1: f64) -> RangeData {
        match handle.into() {
            FieldHandle::Field(id) => match self.fields.get(id.0) {
                Some(field) => field_range(&self.timestamps, field, t0, t1),
                None => RangeData::default(),
            },
            FieldHandle::Element(id) => match self.elements.get(id.0) {
                Some(element) => self
                    .get_data_in_range(element.parent, t0, t1)
                    .element(element.index),
                None => RangeData::default(),
            },
        }
    }

    /// Group fields by `/`-separated display key.
    pub fn get_field_tree(&self, include_array_elements: bool) -> FieldTreeNode {
        let fields = self
            .fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.display_key.as_str(), FieldHandle::Field(FieldId(i))));
        if include_array_elements {
            let elements = self
                .elements
                .iter()
                .enumerate()
                .map(|(i, e)| (e.display_key.as_str(), FieldHandle::Element(ElementId(i))))
                .filter(|(key, handle)| self.by_display_key.get(*key) == Some(handle));
            FieldTreeNode::build(fields.chain(elements))
        } else {
            FieldTreeNode::build(fields)
        }
    }

    /// Display keys of all stored fields, in creation order.
    pub fn field_keys(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.display_key.clone()).collect()
    }

    /// Type behind a display key; elements report their scalar type.
    pub fn value_type_of(&self, display_key: &str) -> Option<ValueType> {
        let handle = self.find_field_by_display_key(display_key)?;
        self.field_info(handle).map(|info| info.value_type)
    }

    /// First and last global timestamp.
    pub fn timestamp_range(&self) -> Option<(f64, f64)> {
        Some((*self.timestamps.first()?, *self.timestamps.last()?))
    }

    pub fn timestamps(&self) -> Vec<f64> {
        self.timestamps.clone()
    }

    /// Sorted, deduplicated instants at which any of `handles` changed.
    pub fn timestamps_for(&self, handles: &[FieldHandle]) -> Vec<f64> {
        let mut indices = BTreeSet::new();
        for handle in handles {
            let parent = match handle {
                FieldHandle::Field(id) => Some(*id),
                FieldHandle::Element(id) => self.elements.get(id.0).map(|e| e.parent),
            };
            if let Some(field) = parent.and_then(|id| self.fields.get(id.0)) {
                indices.extend(field.indices.iter().copied());
            }
        }
        let mut out: Vec<f64> = indices.into_iter().map(|i| self.timestamps[i]).collect();
        out.dedup();
        out
    }

    /// Element sub-fields of an array field, by element index.
    pub fn elements_of(&self, field: FieldId) -> Vec<ElementId> {
        self.fields
            .get(field.0)
            .map(|f| f.elements.clone())
            .unwrap_or_default()
    }

    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> {
        (0..self.fields.len()).map(FieldId)
    }

    /// Global timestamps referenced by a field, in recorded order.
    pub fn field_timestamps(&self, field: FieldId) -> Vec<f64> {
        self.fields
            .get(field.0)
            .map(|f| f.indices.iter().map(|i| self.timestamps[*i]).collect())
            .unwrap_or_default()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Number of global timestamps.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Map an element's display key unless a stored field already owns it.
fn insert_element_mapping(map: &mut HashMap<String, FieldHandle>, key: &str, id: ElementId) {
    match map.get(key) {
        Some(FieldHandle::Field(field)) => {
            tracing::debug!(key, ?field, "Array element shadowed by field");
        }
        _ => {
            map.insert(key.to_string(), FieldHandle::Element(id));
        }
    }
}

fn remove_mapping(map: &mut HashMap<String, FieldHandle>, key: &str, handle: FieldHandle) {
    if map.get(key) == Some(&handle) {
        map.remove(key);
    }
}
