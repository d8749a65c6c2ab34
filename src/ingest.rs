//! Single-writer pipelines that fill a [`FieldStore`].
//!
//! Exactly one pipeline writes to a store at a time. File loads build a fresh
//! store on the blocking pool and hand it back whole; live ingest appends to
//! a [`SharedStore`] under short write locks, so readers see the store
//! between entries and never mid-entry.

use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::task::JoinHandle;

use crate::config::DecoderConfig;
use crate::error::Result;
use crate::live::{LiveEvent, LiveSession};
use crate::model::Entry;
use crate::protocol::{DecodeMode, WireDecoder};
use crate::store::FieldStore;

/// Store shared between one writer and any number of readers.
pub type SharedStore = Arc<RwLock<FieldStore>>;

pub fn shared_store() -> SharedStore {
    Arc::new(RwLock::new(FieldStore::new()))
}

/// Read access; a poisoned lock still yields the last consistent store.
pub fn read_store(store: &SharedStore) -> RwLockReadGuard<'_, FieldStore> {
    store.read().unwrap_or_else(|e| e.into_inner())
}

fn write_store(store: &SharedStore) -> RwLockWriteGuard<'_, FieldStore> {
    store.write().unwrap_or_else(|e| e.into_inner())
}

/// Decode a complete log and build a store from it.
///
/// A truncated tail is ignored. Entries whose timestamp goes backwards are
/// skipped with a warning.
///
/// # Errors
///
/// Returns the decoder's error for an incompatible revision, or for unknown
/// tags under the fatal policy.
pub fn load_bytes(bytes: &[u8], config: &DecoderConfig) -> Result<FieldStore> {
    let mut decoder = WireDecoder::with_config(config.clone());
    let entries = decoder.decode(bytes, DecodeMode::OneShot)?;

    let mut store = FieldStore::new();
    let rejected = apply_entries(&mut store, &entries);
    tracing::info!(
        entries = entries.len(),
        fields = store.field_count(),
        rejected,
        skipped_bytes = decoder.skipped_bytes(),
        "Log decoded"
    );
    Ok(store)
}

/// Read and decode a log file on the blocking pool.
///
/// Aborting the handle before it completes discards the partial store.
pub fn load_file(path: impl Into<PathBuf>, config: DecoderConfig) -> JoinHandle<Result<FieldStore>> {
    let path = path.into();
    tokio::task::spawn_blocking(move || {
        tracing::debug!(path = %path.display(), "Loading log file");
        let bytes = std::fs::read(&path)?;
        load_bytes(&bytes, &config)
    })
}

/// What a live ingest run did before it ended.
#[derive(Debug)]
pub struct LiveOutcome {
    /// Entries appended to the store.
    pub applied: u64,
    /// Entries skipped for going back in time.
    pub rejected: u64,
    /// The session's terminal event; `None` if the channel closed without one.
    pub terminal: Option<LiveEvent>,
}

/// Apply every entry from `session` to `store` until the session ends.
pub fn spawn_live_ingest(mut session: LiveSession, store: SharedStore) -> JoinHandle<LiveOutcome> {
    tokio::spawn(async move {
        let mut outcome = LiveOutcome {
            applied: 0,
            rejected: 0,
            terminal: None,
        };
        while let Some(event) = session.recv().await {
            match event {
                LiveEvent::Entries(entries) => {
                    let rejected = apply_entries(&mut write_store(&store), &entries);
                    outcome.rejected += rejected;
                    outcome.applied += entries.len() as u64 - rejected;
                }
                terminal => {
                    outcome.terminal = Some(terminal);
                    break;
                }
            }
        }
        tracing::debug!(
            applied = outcome.applied,
            rejected = outcome.rejected,
            "Live ingest finished"
        );
        outcome
    })
}

/// Add entries in order; returns how many were rejected.
fn apply_entries(store: &mut FieldStore, entries: &[Entry]) -> u64 {
    let mut rejected = 0;
    for entry in entries {
        if let Err(e) = store.add(entry) {
            tracing::warn!("Entry skipped: {}", e);
            rejected += 1;
        }
    }
    rejected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RlogError;
    use crate::model::{Value, ValueType};
    use crate::protocol::EntryEncoder;

    fn log_bytes() -> Vec<u8> {
        EntryEncoder::encode_log(&[
            Entry::new(1.0).with("/A", Value::Integer(1)),
            Entry::new(2.0).with("/A", Value::Integer(2)),
        ])
        .unwrap()
    }

    #[test]
    fn test_load_bytes() {
        let store = load_bytes(&log_bytes(), &DecoderConfig::default()).unwrap();
        let field = store.find_field("/A", ValueType::Integer).unwrap();
        assert_eq!(store.field_timestamps(field), vec![1.0, 2.0]);
    }

    #[test]
    fn test_load_bytes_rejects_revision() {
        let mut bytes = log_bytes();
        bytes[0] = 2;
        let err = load_bytes(&bytes, &DecoderConfig::default()).unwrap_err();
        assert!(matches!(err, RlogError::FormatIncompatible { revision: 2 }));
    }

    #[test]
    fn test_out_of_order_entries_skipped() {
        let mut store = FieldStore::new();
        let rejected = apply_entries(
            &mut store,
            &[Entry::new(2.0), Entry::new(1.0), Entry::new(3.0)],
        );
        assert_eq!(rejected, 1);
        assert_eq!(store.timestamps(), vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_load_file() {
        let path = std::env::temp_dir().join(format!("rlog-ingest-{}.rlog", std::process::id()));
        std::fs::write(&path, log_bytes()).unwrap();

        let store = load_file(&path, DecoderConfig::default()).await.unwrap().unwrap();
        assert_eq!(store.len(), 2);

        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_load_missing_file_is_io_error() {
        let result = load_file("/nonexistent/rlog/file.rlog", DecoderConfig::default())
            .await
            .unwrap();
        assert!(matches!(result, Err(RlogError::Io(_))));
    }
}
