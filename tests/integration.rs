//! Integration tests for rlog-engine.
//!
//! These tests drive the public API end to end: encode, decode, store, query.
//! Properties over arbitrary logs use `proptest` strategies.

use proptest::prelude::*;

use rlog_engine::codec::MsgPackCodec;
use rlog_engine::model::{Entry, Update, Value, ValueType};
use rlog_engine::protocol::{DecodeMode, EntryEncoder, WireDecoder};
use rlog_engine::store::{decode_snapshot, encode_snapshot, FieldHandle, FieldStore, StoreSnapshot};
use rlog_engine::{ingest, DecoderConfig, RlogError};

const KEYS: [&str; 5] = ["/Drive/Left", "/Drive/Right", "/Arm", "/Vision/Targets", "/Mode"];

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::Boolean),
        any::<u8>().prop_map(Value::Byte),
        any::<i32>().prop_map(Value::Integer),
        (-1.0e6..1.0e6f64).prop_map(Value::Double),
        "[a-z0-9é/ ]{0,8}".prop_map(Value::String),
        prop::collection::vec(any::<bool>(), 0..6).prop_map(Value::BooleanArray),
        prop::collection::vec(any::<u8>(), 0..6).prop_map(Value::ByteArray),
        prop::collection::vec(any::<i32>(), 0..6).prop_map(Value::IntegerArray),
        prop::collection::vec(-1.0e6..1.0e6f64, 0..6).prop_map(Value::DoubleArray),
        prop::collection::vec("[a-z]{0,4}", 0..6).prop_map(Value::StringArray),
    ]
}

fn update_strategy() -> impl Strategy<Value = Update> {
    (
        prop::sample::select(KEYS.to_vec()),
        prop::option::weighted(0.9, value_strategy()),
    )
        .prop_map(|(key, value)| Update {
            key: key.to_string(),
            value,
        })
}

/// Logs with strictly increasing timestamps on a 20 ms grid.
fn log_strategy(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Entry>> {
    prop::collection::vec(
        (1u32..4, prop::collection::vec(update_strategy(), 0..4)),
        len,
    )
    .prop_map(|cycles| {
        let mut timestamp = 0.0;
        cycles
            .into_iter()
            .map(|(step, updates)| {
                timestamp += 0.02 * f64::from(step);
                Entry { timestamp, updates }
            })
            .collect()
    })
}

/// Non-null values written to `(key, type)` across the log, in order.
fn expected_series(entries: &[Entry], key: &str, value_type: ValueType) -> Vec<(f64, Value)> {
    entries
        .iter()
        .flat_map(|entry| {
            entry.updates.iter().filter_map(move |update| match &update.value {
                Some(value) if update.key == key && value.value_type() == value_type => {
                    Some((entry.timestamp, value.clone()))
                }
                _ => None,
            })
        })
        .collect()
}

fn stored_series(store: &FieldStore, key: &str, value_type: ValueType) -> Vec<(f64, Value)> {
    let Some(field) = store.find_field(key, value_type) else {
        return Vec::new();
    };
    store
        .get_data_in_range(field, f64::NEG_INFINITY, f64::INFINITY)
        .iter()
        .filter_map(|sample| sample.value.clone().map(|v| (sample.timestamp, v)))
        .collect()
}

fn load(entries: &[Entry]) -> FieldStore {
    let bytes = EntryEncoder::encode_log(entries).unwrap();
    ingest::load_bytes(&bytes, &DecoderConfig::default()).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_roundtrip_reproduces_entries(entries in log_strategy(0..60)) {
        let bytes = EntryEncoder::encode_log(&entries).unwrap();
        let decoded = WireDecoder::decode_all(&bytes).unwrap();
        prop_assert_eq!(decoded, entries);
    }

    #[test]
    fn test_roundtrip_reproduces_field_series(entries in log_strategy(0..80)) {
        let store = load(&entries);
        for key in KEYS {
            for value_type in ValueType::ALL {
                prop_assert_eq!(
                    stored_series(&store, key, value_type),
                    expected_series(&entries, key, value_type),
                    "{} [{}]",
                    key,
                    value_type
                );
            }
        }
    }

    #[test]
    fn test_chunked_decode_matches_one_shot(
        entries in log_strategy(0..40),
        chunk_sizes in prop::collection::vec(1usize..14, 1..16),
    ) {
        let bytes = EntryEncoder::encode_log(&entries).unwrap();

        let mut decoder = WireDecoder::new();
        let mut decoded = Vec::new();
        let mut rest = &bytes[..];
        for size in chunk_sizes.iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let n = (*size).min(rest.len());
            decoded.extend(decoder.decode(&rest[..n], DecodeMode::Incremental).unwrap());
            rest = &rest[n..];
        }
        decoded.extend(decoder.flush());

        prop_assert_eq!(decoded, entries);
        prop_assert_eq!(decoder.buffered_len(), 0);
        prop_assert_eq!(decoder.consumed_bytes(), bytes.len() as u64);
    }

    #[test]
    fn test_truncated_file_keeps_decoded_prefix(entries in log_strategy(2..40), cut in 1usize..4) {
        let bytes = EntryEncoder::encode_log(&entries).unwrap();

        // every entry is at least 9 bytes, so the cut only touches the last one
        let store = ingest::load_bytes(&bytes[..bytes.len() - cut], &DecoderConfig::default())
            .unwrap();

        let kept = entries.len() - 1;
        let expected: Vec<f64> = entries.iter().map(|e| e.timestamp).collect();
        let timestamps = store.timestamps();
        prop_assert!(timestamps.len() >= kept);
        prop_assert_eq!(&timestamps[..kept], &expected[..kept]);
    }

    #[test]
    fn test_field_indices_monotonic(entries in log_strategy(0..80)) {
        let store = load(&entries);
        for id in store.field_ids() {
            let times = store.field_timestamps(id);
            prop_assert!(times.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn test_display_keys_stable_across_recompute(entries in log_strategy(0..60)) {
        let mut store = load(&entries);
        let keys = store.field_keys();
        let tree = store.get_field_tree(true);

        store.update_display_keys();
        store.update_display_keys();

        prop_assert_eq!(store.field_keys(), keys.clone());
        prop_assert_eq!(store.get_field_tree(true), tree);
        for key in &keys {
            prop_assert!(store.find_field_by_display_key(key).is_some(), "{}", key);
        }
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_queries(entries in log_strategy(0..60)) {
        let store = load(&entries);

        let bytes = encode_snapshot(&store.snapshot()).unwrap();
        let restored = FieldStore::from_snapshot(decode_snapshot(&bytes).unwrap()).unwrap();

        prop_assert_eq!(restored.field_keys(), store.field_keys());
        for key in store.field_keys() {
            let a = store.find_field_by_display_key(&key).unwrap();
            let b = restored.find_field_by_display_key(&key).unwrap();
            prop_assert_eq!(
                restored.get_data_in_range(b, 0.1, 0.5),
                store.get_data_in_range(a, 0.1, 0.5)
            );
        }
    }
}

#[test]
fn test_incompatible_revision_is_fatal() {
    let mut bytes = EntryEncoder::encode_log(&[
        Entry::new(0.02).with("/Mode", Value::String("auto".into())),
        Entry::new(0.04).with("/Arm", Value::Double(1.0)),
    ])
    .unwrap();
    bytes[0] = 0;

    let err = ingest::load_bytes(&bytes, &DecoderConfig::default()).unwrap_err();
    assert!(matches!(err, RlogError::FormatIncompatible { revision: 0 }));
}

#[test]
fn test_array_elements_visible_in_tree() {
    let mut store = FieldStore::new();
    store
        .add(&Entry::new(1.0).with("/Vision/Corners", Value::DoubleArray(vec![0.0, 1.0])))
        .unwrap();
    store
        .add(&Entry::new(2.0).with("/Vision/Corners", Value::DoubleArray(vec![0.0; 5])))
        .unwrap();

    let tree = store.get_field_tree(true);
    let corners = tree.get("/Vision/Corners").unwrap();
    assert_eq!(corners.children.len(), 5);
    assert!(store.get_field_tree(false).get("/Vision/Corners").unwrap().is_leaf());

    let element = corners.children["4"].field.unwrap();
    assert!(matches!(element, FieldHandle::Element(_)));
    let range = store.get_data_in_range(element, 0.0, 3.0);
    assert_eq!(range.start.unwrap().value, None);
    assert_eq!(range.samples[0].value, Some(Value::Double(0.0)));
}

#[test]
fn test_snapshot_is_msgpack_map() {
    let snapshot = StoreSnapshot::default();
    let bytes = MsgPackCodec::encode(&snapshot).unwrap();
    // fixmap with 2 entries: timestamps, fields
    assert_eq!(bytes[0], 0x82);
}
