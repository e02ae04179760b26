//! StateStore — redb-backed persistence for external metric records.
//!
//! Supports both on-disk and in-memory backends (the latter for testing).
//! Batch operations run in a single write transaction so a reconciliation
//! pass is persisted atomically.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use extmetrics_core::{ExternalMetricValue, ObjectReference};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe record store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

/// Key prefix shared by every record of one policy object.
fn owner_prefix(owner: &ObjectReference) -> String {
    format!("{}/{}/{}/", owner.namespace, owner.name, owner.uid)
}

fn record_key(owner: &ObjectReference, metric_name: &str) -> String {
    format!("{}{metric_name}", owner_prefix(owner))
}

impl StateStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(EXTERNAL_METRICS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or update a single record.
    pub fn put_external_metric(&self, record: &ExternalMetricValue) -> StateResult<()> {
        self.put_external_metrics(std::slice::from_ref(record))
    }

    /// Insert or update a batch of records in one transaction.
    pub fn put_external_metrics(&self, records: &[ExternalMetricValue]) -> StateResult<()> {
        if records.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(EXTERNAL_METRICS).map_err(map_err!(Table))?;
            for record in records {
                let key = record.table_key();
                let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count = records.len(), "external metrics stored");
        Ok(())
    }

    /// Get the record for `metric_name` owned by `owner`.
    pub fn get_external_metric(
        &self,
        owner: &ObjectReference,
        metric_name: &str,
    ) -> StateResult<Option<ExternalMetricValue>> {
        let key = record_key(owner, metric_name);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EXTERNAL_METRICS).map_err(map_err!(Table))?;
        match table.get(key.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: ExternalMetricValue =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all stored records.
    pub fn list_external_metrics(&self) -> StateResult<Vec<ExternalMetricValue>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EXTERNAL_METRICS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: ExternalMetricValue =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    /// List the records owned by one policy object (by key prefix scan).
    pub fn list_external_metrics_for_owner(
        &self,
        owner: &ObjectReference,
    ) -> StateResult<Vec<ExternalMetricValue>> {
        let prefix = owner_prefix(owner);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(EXTERNAL_METRICS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(&prefix) {
                let record: ExternalMetricValue =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(record);
            }
        }
        Ok(results)
    }

    /// Delete one record by `(namespace, name, uid, metric_name)`. Returns
    /// true if it existed.
    pub fn delete_external_metric(
        &self,
        owner: &ObjectReference,
        metric_name: &str,
    ) -> StateResult<bool> {
        let key = record_key(owner, metric_name);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(EXTERNAL_METRICS).map_err(map_err!(Table))?;
            existed = table.remove(key.as_str()).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "external metric deleted");
        Ok(existed)
    }

    /// Delete a batch of records in one transaction. Returns the number
    /// that existed.
    pub fn delete_external_metrics(&self, records: &[ExternalMetricValue]) -> StateResult<u32> {
        if records.is_empty() {
            return Ok(0);
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut count = 0;
        {
            let mut table = txn.open_table(EXTERNAL_METRICS).map_err(map_err!(Table))?;
            for record in records {
                let key = record.table_key();
                if table.remove(key.as_str()).map_err(map_err!(Write))?.is_some() {
                    count += 1;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count, "external metrics deleted");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extmetrics_core::Labels;

    fn owner(name: &str, uid: &str) -> ObjectReference {
        ObjectReference {
            name: name.to_string(),
            namespace: "default".to_string(),
            uid: uid.to_string(),
        }
    }

    fn test_record(owner: ObjectReference, metric: &str) -> ExternalMetricValue {
        let mut labels = Labels::new();
        labels.insert("role".to_string(), "frontend".to_string());
        ExternalMetricValue {
            metric_name: metric.to_string(),
            labels,
            value: 12,
            valid: true,
            timestamp: 1000,
            owner,
        }
    }

    #[test]
    fn record_put_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let record = test_record(owner("api", "uid-1"), "requests");

        store.put_external_metric(&record).unwrap();
        let retrieved = store
            .get_external_metric(&owner("api", "uid-1"), "requests")
            .unwrap();

        assert_eq!(retrieved, Some(record));
    }

    #[test]
    fn record_get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        let result = store
            .get_external_metric(&owner("api", "uid-1"), "requests")
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn record_update_in_place() {
        let store = StateStore::open_in_memory().unwrap();
        let mut record = test_record(owner("api", "uid-1"), "requests");
        store.put_external_metric(&record).unwrap();

        record.valid = false;
        record.timestamp = 2000;
        store.put_external_metric(&record).unwrap();

        let all = store.list_external_metrics().unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].valid);
        assert_eq!(all[0].timestamp, 2000);
    }

    #[test]
    fn records_list_for_owner() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_external_metrics(&[
                test_record(owner("api", "uid-1"), "requests"),
                test_record(owner("api", "uid-1"), "latency"),
                test_record(owner("worker", "uid-2"), "queue.depth"),
            ])
            .unwrap();

        assert_eq!(store.list_external_metrics().unwrap().len(), 3);
        assert_eq!(
            store
                .list_external_metrics_for_owner(&owner("api", "uid-1"))
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            store
                .list_external_metrics_for_owner(&owner("worker", "uid-2"))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn record_delete_single() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_external_metric(&test_record(owner("api", "uid-1"), "requests"))
            .unwrap();

        assert!(store
            .delete_external_metric(&owner("api", "uid-1"), "requests")
            .unwrap());
        assert!(!store
            .delete_external_metric(&owner("api", "uid-1"), "requests")
            .unwrap());
        assert!(store.list_external_metrics().unwrap().is_empty());
    }

    #[test]
    fn recreated_owner_with_new_uid_is_a_distinct_key() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_external_metric(&test_record(owner("api", "uid-1"), "requests"))
            .unwrap();
        store
            .put_external_metric(&test_record(owner("api", "uid-2"), "requests"))
            .unwrap();

        assert!(store
            .delete_external_metric(&owner("api", "uid-1"), "requests")
            .unwrap());
        let remaining = store.list_external_metrics().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].owner.uid, "uid-2");
    }

    #[test]
    fn records_delete_batch_counts_existing() {
        let store = StateStore::open_in_memory().unwrap();
        let kept = test_record(owner("worker", "uid-2"), "queue.depth");
        let stored = test_record(owner("api", "uid-1"), "requests");
        let never_stored = test_record(owner("api", "uid-1"), "latency");
        store
            .put_external_metrics(&[stored.clone(), kept.clone()])
            .unwrap();

        let deleted = store
            .delete_external_metrics(&[stored, never_stored])
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.list_external_metrics().unwrap(), vec![kept]);
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store
                .put_external_metric(&test_record(owner("api", "uid-1"), "requests"))
                .unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let record = store
            .get_external_metric(&owner("api", "uid-1"), "requests")
            .unwrap();
        assert_eq!(record.map(|r| r.value), Some(12));
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_external_metrics().unwrap().is_empty());
        assert!(store
            .list_external_metrics_for_owner(&owner("api", "uid-1"))
            .unwrap()
            .is_empty());
        assert_eq!(store.delete_external_metrics(&[]).unwrap(), 0);
        store.put_external_metrics(&[]).unwrap();
    }
}
