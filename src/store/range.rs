//! Range queries over one field.
//!
//! A range answer is the carried-forward value in effect at `t0` plus every
//! later change up to and including `t1`.

use serde::{Deserialize, Serialize};

use super::field::Field;
use super::resolution::decimate;
use crate::model::Value;

/// One observation of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: f64,
    /// `None` is an explicit null.
    pub value: Option<Value>,
}

/// Result of [`FieldStore::get_data_in_range`](super::FieldStore::get_data_in_range).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeData {
    /// Value in effect at `t0`: the last change at or before `t0`, or the
    /// field's first change if it starts after `t0`. `None` if the field has
    /// no data.
    pub start: Option<Sample>,
    /// Changes after `start`, up to and including `t1`.
    pub samples: Vec<Sample>,
}

impl RangeData {
    /// True when the field had no data at all.
    pub fn is_empty(&self) -> bool {
        self.start.is_none()
    }

    /// Carried value followed by the in-range samples.
    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.start.iter().chain(self.samples.iter())
    }

    /// Thin the in-range samples to at most one per `min_separation` seconds,
    /// keeping the newest sample of each cluster. The carried value is kept.
    pub fn decimate(&self, min_separation: f64) -> RangeData {
        RangeData {
            start: self.start.clone(),
            samples: decimate(&self.samples, min_separation),
        }
    }

    /// Project an array range onto element `index`; missing elements are null.
    pub(crate) fn element(self, index: usize) -> RangeData {
        let project = |sample: Sample| Sample {
            timestamp: sample.timestamp,
            value: sample.value.and_then(|v| v.element(index)),
        };
        RangeData {
            start: self.start.map(project),
            samples: self.samples.into_iter().map(project).collect(),
        }
    }
}

/// Range answer for a stored field, by binary search on its index array.
pub(crate) fn field_range(timestamps: &[f64], field: &Field, t0: f64, t1: f64) -> RangeData {
    if field.indices.is_empty() {
        return RangeData::default();
    }
    let time_of = |i: usize| timestamps[field.indices[i]];

    let at_or_before = field.indices.partition_point(|&i| timestamps[i] <= t0);
    let carried = at_or_before.saturating_sub(1);
    let end = field.indices.partition_point(|&i| timestamps[i] <= t1);

    let sample = |i: usize| Sample {
        timestamp: time_of(i),
        value: field.values[i].clone(),
    };
    RangeData {
        start: Some(sample(carried)),
        samples: (carried + 1..end.max(carried + 1)).map(sample).collect(),
    }
}
