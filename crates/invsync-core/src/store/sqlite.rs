//! SQLite-backed store

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use invsync_api::Domain;
use invsync_probe::RawDocument;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info, instrument};

use crate::error::StoreError;
use crate::hash::HashId;
use crate::store::{ClassifiedRow, MetadataStore, SnapshotStore, classify, keyed_rows};

/// Snapshot and metadata store in one SQLite file
///
/// Every domain has its own `snapshot_<table>` table keyed by hash id; the
/// `metadata` table holds the key/value markers.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    ///
    /// # Errors
    /// Returns [`StoreError::Open`] if the file cannot be opened or the schema
    /// cannot be created.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Open(e.to_string()))?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::Open(e.to_string()))?;
        let store = Self::with_connection(conn)?;

        info!("inventory database opened");

        Ok(store)
    }

    /// Open a private in-memory database
    ///
    /// # Errors
    /// Returns [`StoreError::Open`] if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Open(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn).map_err(|e| StoreError::Open(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Io("connection mutex poisoned".to_string()))
    }
}

fn snapshot_table(domain: Domain) -> String {
    format!("snapshot_{}", domain.table())
}

fn init_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    let mut ddl = String::from(
        "PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS metadata (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    );

    for domain in Domain::ALL {
        ddl.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                hash_id TEXT PRIMARY KEY,
                document TEXT NOT NULL
            );",
            snapshot_table(domain)
        ));
    }

    conn.execute_batch(&ddl)
}

fn load_snapshot(
    conn: &Connection,
    domain: Domain,
) -> Result<BTreeMap<HashId, RawDocument>, StoreError> {
    let table = snapshot_table(domain);
    let mut stmt = conn.prepare(&format!("SELECT hash_id, document FROM {table}"))?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut snapshot = BTreeMap::new();
    for row in rows {
        let (id, document) = row?;
        let doc: RawDocument =
            serde_json::from_str(&document).map_err(|e| StoreError::Corrupt {
                table: table.clone(),
                reason: e.to_string(),
            })?;
        snapshot.insert(HashId::from(id), doc);
    }

    Ok(snapshot)
}

impl SnapshotStore for SqliteStore {
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    fn sync(
        &self,
        domain: Domain,
        rows: Vec<RawDocument>,
    ) -> Result<Vec<ClassifiedRow>, StoreError> {
        let keyed = keyed_rows(domain, rows);
        let table = snapshot_table(domain);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let previous = load_snapshot(&tx, domain)?;
        let classified = classify(previous, &keyed);

        if classified.is_empty() {
            debug!("snapshot unchanged");
            return Ok(classified);
        }

        tx.execute(&format!("DELETE FROM {table}"), [])?;
        {
            let mut insert =
                tx.prepare(&format!("INSERT INTO {table} (hash_id, document) VALUES (?1, ?2)"))?;
            for (id, doc) in &keyed {
                let document = serde_json::to_string(doc).map_err(|e| StoreError::Corrupt {
                    table: table.clone(),
                    reason: e.to_string(),
                })?;
                insert.execute(params![id.as_str(), document])?;
            }
        }
        tx.commit()?;

        debug!(changes = classified.len(), "snapshot replaced");

        Ok(classified)
    }

    fn clear(&self, domain: Domain) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(&format!("DELETE FROM {}", snapshot_table(domain)), [])?;
        Ok(())
    }

    fn rows(&self, domain: Domain) -> Result<Vec<RawDocument>, StoreError> {
        let conn = self.lock()?;
        Ok(load_snapshot(&conn, domain)?.into_values().collect())
    }
}

impl MetadataStore for SqliteStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO metadata (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM metadata WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::store::contract;
    use serde_json::json;

    fn temp_db(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("invsync-{name}-{}-{nanos}.db", std::process::id()))
    }

    #[test]
    fn test_snapshot_contract() {
        contract::sync_is_idempotent(&SqliteStore::open_in_memory().unwrap());
        contract::sync_detects_changes(&SqliteStore::open_in_memory().unwrap());
        contract::empty_sync_deletes_everything(&SqliteStore::open_in_memory().unwrap());
        contract::domains_are_isolated(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_metadata_contract() {
        contract::metadata_round_trip(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_snapshot_survives_reopen() {
        let path = temp_db("reopen");
        let row = json!({"name": "vim", "version": "9.0"}).as_object().cloned().unwrap();

        {
            let store = SqliteStore::open(&path).unwrap();
            assert_eq!(store.sync(Domain::Packages, vec![row.clone()]).unwrap().len(), 1);
            store.write("first_scan:packages", "2024-01-01T00:00:00Z").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.sync(Domain::Packages, vec![row]).unwrap().is_empty());
        assert!(store.read("first_scan:packages").unwrap().is_some());

        drop(store);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_corrupt_row_leaves_snapshot_intact() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO snapshot_processes (hash_id, document) VALUES ('x', 'not json')",
                [],
            )
            .unwrap();

        let result = store.sync(Domain::Processes, Vec::new());
        assert!(matches!(result, Err(StoreError::Corrupt { .. })));

        let count: i64 = store
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM snapshot_processes", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
