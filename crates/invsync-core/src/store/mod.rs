//! Snapshot and metadata storage
//!
//! [`SnapshotStore`] keeps the last accepted row set of every domain and
//! classifies each new batch against it. [`MetadataStore`] is a small
//! key/value map for first-scan markers and other housekeeping values.

pub mod memory;
pub mod sqlite;

use std::collections::{BTreeMap, HashMap};

use invsync_api::Domain;
use invsync_probe::RawDocument;
use tracing::info;

use crate::error::StoreError;
use crate::hash::{HashId, hash_id};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Outcome of one row in a diff pass
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedRow {
    /// Present now, absent before
    Inserted(RawDocument),
    /// Present in both, with differing content
    Modified {
        previous: RawDocument,
        current: RawDocument,
    },
    /// Present before, absent now
    Deleted(RawDocument),
}

impl ClassifiedRow {
    /// Latest known content of the row
    #[must_use]
    pub fn document(&self) -> &RawDocument {
        match self {
            ClassifiedRow::Inserted(doc) | ClassifiedRow::Deleted(doc) => doc,
            ClassifiedRow::Modified { current, .. } => current,
        }
    }
}

/// Table-oriented snapshot storage with diff-on-write
pub trait SnapshotStore: Send + Sync {
    /// Classify `rows` against the stored snapshot of `domain`, then replace
    /// the snapshot with `rows`
    ///
    /// The replacement is all-or-nothing: on error the previous snapshot is
    /// left untouched. An empty `rows` deletes every stored row.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be read or written.
    fn sync(&self, domain: Domain, rows: Vec<RawDocument>)
    -> Result<Vec<ClassifiedRow>, StoreError>;

    /// Drop every stored row of `domain`
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be written.
    fn clear(&self, domain: Domain) -> Result<(), StoreError>;

    /// Stored rows of `domain`, ordered by hash id
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be read.
    fn rows(&self, domain: Domain) -> Result<Vec<RawDocument>, StoreError>;
}

/// Persisted key/value map
pub trait MetadataStore: Send + Sync {
    /// # Errors
    /// Returns an error if the store cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// # Errors
    /// Returns an error if the store cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// # Errors
    /// Returns an error if the store cannot be written.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Pair every row with its hash id, collapsing duplicate keys
///
/// A duplicate keeps the position of its first occurrence and the content of
/// its last one.
pub(crate) fn keyed_rows(domain: Domain, rows: Vec<RawDocument>) -> Vec<(HashId, RawDocument)> {
    let mut positions: HashMap<HashId, usize> = HashMap::with_capacity(rows.len());
    let mut keyed: Vec<(HashId, RawDocument)> = Vec::with_capacity(rows.len());

    for row in rows {
        let id = hash_id(domain, &row);
        if let Some(&pos) = positions.get(&id) {
            info!(%domain, id = %id, "duplicate primary key in batch, keeping last");
            keyed[pos].1 = row;
        } else {
            positions.insert(id.clone(), keyed.len());
            keyed.push((id, row));
        }
    }

    keyed
}

/// Symmetric difference between a stored snapshot and a keyed batch
///
/// Inserted and modified rows follow batch order; deleted rows follow hash
/// order.
pub(crate) fn classify(
    mut previous: BTreeMap<HashId, RawDocument>,
    current: &[(HashId, RawDocument)],
) -> Vec<ClassifiedRow> {
    let mut classified = Vec::new();

    for (id, doc) in current {
        match previous.remove(id) {
            None => classified.push(ClassifiedRow::Inserted(doc.clone())),
            Some(old) if old != *doc => classified.push(ClassifiedRow::Modified {
                previous: old,
                current: doc.clone(),
            }),
            Some(_) => {}
        }
    }

    classified.extend(previous.into_values().map(ClassifiedRow::Deleted));
    classified
}


/// Behaviour every [`SnapshotStore`] and [`MetadataStore`] must share
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use serde_json::{Value, json};

    fn doc(value: Value) -> RawDocument {
        value.as_object().cloned().unwrap()
    }

    pub(crate) fn sync_is_idempotent(store: &dyn SnapshotStore) {
        let rows = vec![
            doc(json!({"pid": 100, "local_port": 22})),
            doc(json!({"pid": 200, "local_port": 80})),
        ];
        assert_eq!(store.sync(Domain::Ports, rows.clone()).unwrap().len(), 2);
        assert!(store.sync(Domain::Ports, rows).unwrap().is_empty());
    }

    pub(crate) fn sync_detects_changes(store: &dyn SnapshotStore) {
        store
            .sync(
                Domain::Packages,
                vec![
                    doc(json!({"name": "vim", "version": "9.0", "vendor": "x"})),
                    doc(json!({"name": "curl", "version": "8.0"})),
                ],
            )
            .unwrap();

        let rows = store
            .sync(
                Domain::Packages,
                vec![doc(json!({"name": "vim", "version": "9.0", "vendor": "y"}))],
            )
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert!(matches!(&rows[0], ClassifiedRow::Modified { previous, current }
            if previous["vendor"] == "x" && current["vendor"] == "y"));
        assert!(matches!(&rows[1], ClassifiedRow::Deleted(d) if d["name"] == "curl"));
        assert_eq!(store.rows(Domain::Packages).unwrap().len(), 1);
    }

    pub(crate) fn empty_sync_deletes_everything(store: &dyn SnapshotStore) {
        store
            .sync(Domain::Hotfixes, vec![doc(json!({"hotfix": "KB1"})), doc(json!({"hotfix": "KB2"}))])
            .unwrap();
        let rows = store.sync(Domain::Hotfixes, Vec::new()).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| matches!(r, ClassifiedRow::Deleted(_))));
        assert!(store.rows(Domain::Hotfixes).unwrap().is_empty());
        assert!(store.sync(Domain::Hotfixes, Vec::new()).unwrap().is_empty());
    }

    pub(crate) fn domains_are_isolated(store: &dyn SnapshotStore) {
        store.sync(Domain::Processes, vec![doc(json!({"pid": 1}))]).unwrap();
        store.sync(Domain::Ports, vec![doc(json!({"pid": 1, "local_port": 22}))]).unwrap();
        store.clear(Domain::Processes).unwrap();
        assert!(store.rows(Domain::Processes).unwrap().is_empty());
        assert_eq!(store.rows(Domain::Ports).unwrap().len(), 1);
    }

    pub(crate) fn metadata_round_trip(store: &dyn MetadataStore) {
        assert_eq!(store.read("first_scan:packages").unwrap(), None);
        store.write("first_scan:packages", "a").unwrap();
        store.write("first_scan:packages", "b").unwrap();
        assert_eq!(store.read("first_scan:packages").unwrap().as_deref(), Some("b"));
        store.delete("first_scan:packages").unwrap();
        store.delete("first_scan:packages").unwrap();
        assert_eq!(store.read("first_scan:packages").unwrap(), None);
    }
}
