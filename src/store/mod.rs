//! Sparse, time-indexed field store.
//!
//! The store keeps one append-only timestamp sequence shared by every field.
//! Each field is identified by `(key, ValueType)` and records the indices at
//! which its value changed together with the new values (or explicit nulls).
//!
//! Fields and array elements live in arenas inside [`FieldStore`] and are
//! addressed by stable [`FieldId`] / [`ElementId`] indices. Queries always
//! return owned copies, never references into the arenas.
//!
//! # Example
//!
//! ```
//! use rlog_engine::model::{Entry, Value, ValueType};
//! use rlog_engine::store::FieldStore;
//!
//! let mut store = FieldStore::new();
//! store.add(&Entry::new(1.0).with("/Arm/Angle", Value::Double(0.5))).unwrap();
//! store.add(&Entry::new(2.0).with("/Arm/Angle", Value::Double(0.75))).unwrap();
//!
//! let field = store.find_field("/Arm/Angle", ValueType::Double).unwrap();
//! let range = store.get_data_in_range(field, 1.5, 3.0);
//! assert_eq!(range.start.unwrap().value, Some(Value::Double(0.5)));
//! assert_eq!(range.samples.len(), 1);
//! ```

mod field;
mod field_store;
mod range;
mod resolution;
mod snapshot;
mod tree;

use serde::{Deserialize, Serialize};

pub use field::FieldInfo;
pub use field_store::FieldStore;
pub use range::{RangeData, Sample};
pub use resolution::{nearest_resolution, RESOLUTIONS};
pub use snapshot::{decode_snapshot, encode_snapshot, FieldSnapshot, StoreSnapshot};
pub use tree::FieldTreeNode;

/// Index of a stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId(pub(crate) usize);

/// Index of an array element sub-field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub(crate) usize);

/// Anything a caller can query: a stored field or an array element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldHandle {
    Field(FieldId),
    Element(ElementId),
}

impl From<FieldId> for FieldHandle {
    fn from(id: FieldId) -> Self {
        FieldHandle::Field(id)
    }
}

impl From<ElementId> for FieldHandle {
    fn from(id: ElementId) -> Self {
        FieldHandle::Element(id)
    }
}
