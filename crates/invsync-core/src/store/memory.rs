//! In-process store

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use invsync_api::Domain;
use invsync_probe::RawDocument;

use crate::error::StoreError;
use crate::hash::HashId;
use crate::store::{ClassifiedRow, MetadataStore, SnapshotStore, classify, keyed_rows};

type Tables = HashMap<Domain, BTreeMap<HashId, RawDocument>>;

/// Snapshot and metadata store kept in memory
///
/// Nothing survives the process; every domain behaves as never scanned after
/// a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    metadata: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, StoreError> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Io("snapshot mutex poisoned".to_string()))
    }

    fn metadata(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.metadata
            .lock()
            .map_err(|_| StoreError::Io("metadata mutex poisoned".to_string()))
    }
}

impl SnapshotStore for MemoryStore {
    fn sync(
        &self,
        domain: Domain,
        rows: Vec<RawDocument>,
    ) -> Result<Vec<ClassifiedRow>, StoreError> {
        let keyed = keyed_rows(domain, rows);
        let mut tables = self.tables()?;
        let previous = tables.remove(&domain).unwrap_or_default();
        let classified = classify(previous, &keyed);
        tables.insert(domain, keyed.into_iter().collect());
        Ok(classified)
    }

    fn clear(&self, domain: Domain) -> Result<(), StoreError> {
        self.tables()?.remove(&domain);
        Ok(())
    }

    fn rows(&self, domain: Domain) -> Result<Vec<RawDocument>, StoreError> {
        Ok(self
            .tables()?
            .get(&domain)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }
}

impl MetadataStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.metadata()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.metadata()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.metadata()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::contract;

    #[test]
    fn test_snapshot_contract() {
        contract::sync_is_idempotent(&MemoryStore::new());
        contract::sync_detects_changes(&MemoryStore::new());
        contract::empty_sync_deletes_everything(&MemoryStore::new());
        contract::domains_are_isolated(&MemoryStore::new());
    }

    #[test]
    fn test_metadata_contract() {
        contract::metadata_round_trip(&MemoryStore::new());
    }
}
