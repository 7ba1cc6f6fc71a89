//! Snapshot diffing and event construction

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use invsync_api::events::MODULE_NAME;
use invsync_api::{DeltaEvent, Domain, Event, Operation, StatelessEvent};
use invsync_probe::RawDocument;

use crate::error::StoreError;
use crate::hash::hash_id;
use crate::normalize::{FieldPolicy, NormalizedDocument, normalize};
use crate::store::{ClassifiedRow, SnapshotStore};

/// Turns a domain's current rows into delta and discovery events
pub struct DiffEngine {
    store: Arc<dyn SnapshotStore>,
}

impl DiffEngine {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Sync `rows` into the snapshot of `domain` and build its events
    ///
    /// Delta events come first, in classification order. On a first scan one
    /// stateless create event per current row follows.
    ///
    /// # Errors
    /// Returns an error if the snapshot could not be replaced; no events are
    /// produced in that case.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub fn process_domain(
        &self,
        domain: Domain,
        rows: Vec<RawDocument>,
        first_scan: bool,
        scanned_at: DateTime<Utc>,
    ) -> Result<Vec<Event>, StoreError> {
        let discovery: Vec<RawDocument> = if first_scan {
            rows.clone()
        } else {
            Vec::new()
        };

        let classified = self.store.sync(domain, rows)?;

        let mut events: Vec<Event> = classified
            .into_iter()
            .map(|row| delta_event(domain, row, scanned_at))
            .collect();

        events.extend(discovery.iter().map(|doc| {
            Event::Stateless(StatelessEvent {
                operation: Operation::Create,
                kind: domain,
                module: MODULE_NAME.to_string(),
                scanned_at,
                data: Value::Object(normalize(doc, domain, FieldPolicy::MaterializeDefaults)),
            })
        }));

        debug!(events = events.len(), first_scan, "domain processed");

        Ok(events)
    }
}

fn delta_event(domain: Domain, row: ClassifiedRow, scanned_at: DateTime<Utc>) -> Event {
    let id = hash_id(domain, row.document()).into_string();
    let normalized = |doc: &RawDocument| normalize(doc, domain, FieldPolicy::MaterializeDefaults);

    let (operation, previous, current, changed_fields) = match row {
        ClassifiedRow::Inserted(doc) => (Operation::Create, None, Some(normalized(&doc)), None),
        ClassifiedRow::Modified { previous, current } => {
            let previous = normalized(&previous);
            let current = normalized(&current);
            let changed = changed_fields(&previous, &current);
            (Operation::Update, Some(previous), Some(current), Some(changed))
        }
        ClassifiedRow::Deleted(doc) => (Operation::Delete, Some(normalized(&doc)), None, None),
    };

    Event::Delta(DeltaEvent {
        id,
        operation,
        collector: domain,
        module: MODULE_NAME.to_string(),
        scanned_at,
        previous: previous.map(Value::Object),
        current: current.map(Value::Object),
        changed_fields,
    })
}

/// Sorted dotted paths whose leaf values differ between two documents
///
/// Arrays are compared as a whole.
#[must_use]
pub fn changed_fields(previous: &NormalizedDocument, current: &NormalizedDocument) -> Vec<String> {
    let mut before = Vec::new();
    let mut after = Vec::new();
    flatten("", previous, &mut before);
    flatten("", current, &mut after);

    let before: std::collections::BTreeMap<_, _> = before.into_iter().collect();
    let after: std::collections::BTreeMap<_, _> = after.into_iter().collect();

    let paths: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    paths
        .into_iter()
        .filter(|path| before.get(*path) != after.get(*path))
        .cloned()
        .collect()
}

fn flatten<'a>(prefix: &str, map: &'a Map<String, Value>, out: &mut Vec<(String, &'a Value)>) {
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => flatten(&path, inner, out),
            leaf => out.push((path, leaf)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn doc(value: Value) -> RawDocument {
        value.as_object().cloned().unwrap()
    }

    fn engine() -> DiffEngine {
        DiffEngine::new(Arc::new(MemoryStore::new()))
    }

    fn delta(event: &Event) -> &DeltaEvent {
        match event {
            Event::Delta(d) => d,
            Event::Stateless(_) => panic!("expected delta event"),
        }
    }

    #[test]
    fn test_first_scan_emits_creates_then_discovery() {
        let engine = engine();
        let rows = vec![
            doc(json!({"name": "vim", "version": "9.0"})),
            doc(json!({"name": "curl", "version": "8.0"})),
        ];

        let events = engine
            .process_domain(Domain::Packages, rows, true, Utc::now())
            .unwrap();

        assert_eq!(events.len(), 4);
        assert!(events[..2].iter().all(Event::is_delta));
        assert!(events[2..].iter().all(|e| !e.is_delta()));
        assert_eq!(delta(&events[0]).operation, Operation::Create);
        assert!(delta(&events[0]).previous.is_none());
        assert_eq!(
            delta(&events[0]).current.as_ref().unwrap()["package"]["name"],
            "vim"
        );
        assert_eq!(delta(&events[0]).current.as_ref().unwrap()["package"]["vendor"], "");
    }

    #[test]
    fn test_update_carries_changed_fields() {
        let engine = engine();
        let now = Utc::now();
        engine
            .process_domain(
                Domain::Processes,
                vec![doc(json!({"pid": 1, "name": "bash", "nice": 0}))],
                false,
                now,
            )
            .unwrap();

        let events = engine
            .process_domain(
                Domain::Processes,
                vec![doc(json!({"pid": 1, "name": "zsh", "nice": 5}))],
                false,
                now,
            )
            .unwrap();

        assert_eq!(events.len(), 1);
        let update = delta(&events[0]);
        assert_eq!(update.operation, Operation::Update);
        assert_eq!(
            update.changed_fields.as_deref(),
            Some(&["process.name".to_string(), "process.nice".to_string()][..])
        );
        assert_eq!(update.previous.as_ref().unwrap()["process"]["name"], "bash");
        assert_eq!(update.current.as_ref().unwrap()["process"]["name"], "zsh");
    }

    #[test]
    fn test_update_emitted_when_normalized_forms_match() {
        let engine = engine();
        let now = Utc::now();
        engine
            .process_domain(Domain::Hotfixes, vec![doc(json!({"hotfix": "KB1", "x": 1}))], false, now)
            .unwrap();
        let events = engine
            .process_domain(Domain::Hotfixes, vec![doc(json!({"hotfix": "KB1", "x": 2}))], false, now)
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(delta(&events[0]).operation, Operation::Update);
        assert_eq!(delta(&events[0]).changed_fields, Some(Vec::new()));
    }

    #[test]
    fn test_delete_carries_previous_only() {
        let engine = engine();
        let now = Utc::now();
        let row = doc(json!({"pid": 100, "local_port": 22}));
        engine.process_domain(Domain::Ports, vec![row.clone()], false, now).unwrap();

        let events = engine.process_domain(Domain::Ports, Vec::new(), false, now).unwrap();
        assert_eq!(events.len(), 1);
        let deleted = delta(&events[0]);
        assert_eq!(deleted.operation, Operation::Delete);
        assert!(deleted.current.is_none());
        assert_eq!(deleted.previous.as_ref().unwrap()["source"]["port"], 22);
        assert_eq!(deleted.id, hash_id(Domain::Ports, &row).into_string());
    }

    #[test]
    fn test_changed_fields_compares_leaves() {
        let a = doc(json!({"host": {"os": {"name": "Debian", "version": "11"}}, "tags": ["a"]}));
        let b = doc(json!({"host": {"os": {"name": "Debian", "version": "12"}}, "tags": ["a", "b"], "extra": 1}));
        assert_eq!(
            changed_fields(&a, &b),
            vec!["extra".to_string(), "host.os.version".to_string(), "tags".to_string()]
        );
        assert!(changed_fields(&a, &a).is_empty());
    }
}
