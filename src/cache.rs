//! Durable local fallback storage.
//!
//! The cache keeps the last known-good snapshot of each synced collection so
//! the app can render real data before the first remote round-trip and keep
//! rendering it through an outage. It is never authoritative. Reads that hit
//! malformed data return an empty array; failed writes are logged and
//! swallowed so they cannot block the live update path.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};
use serde_json::Value;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::model::{CollectionKind, SCHEMA_VERSION};
use crate::time::now_ms;

/// Marker set once the one-shot legacy migration has completed.
pub const MIGRATED_KEY: &str = "tallykeep-migrated-v1";
/// Schema version written alongside every snapshot.
pub const SCHEMA_VERSION_KEY: &str = "tallykeep-schema-version";

// Deprecated pre-sync storage keys. Only expenses and goals existed before
// the remote store did; the keys deliberately lack the `-v2` suffix of the
// snapshot namespace.
pub const LEGACY_EXPENSES_KEY: &str = "tallykeep-expenses";
pub const LEGACY_GOALS_KEY: &str = "tallykeep-goals";

/// Snapshot key for a collection. Debts and recurring charges predate
/// nothing and were never cached; they return `None` and ride out outages
/// on their last in-memory view.
pub fn collection_key(kind: CollectionKind) -> Option<&'static str> {
    match kind {
        CollectionKind::Expenses => Some("tallykeep-expenses-v2"),
        CollectionKind::Goals => Some("tallykeep-goals-v2"),
        CollectionKind::Incomes => Some("tallykeep-incomes-v2"),
        CollectionKind::Budgets => Some("tallykeep-budgets-v2"),
        CollectionKind::Debts | CollectionKind::Recurring => None,
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LegacyData {
    pub expenses: Vec<Value>,
    pub goals: Vec<Value>,
}

impl LegacyData {
    pub fn is_empty(&self) -> bool {
        self.expenses.is_empty() && self.goals.is_empty()
    }
}

pub struct DurableCache {
    conn: Mutex<Connection>,
}

impl DurableCache {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let conn = Connection::open(path).map_err(AppError::from)?;
        Self::init(conn)
    }

    pub fn in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(AppError::from)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (\
               key        TEXT PRIMARY KEY,\
               value      TEXT NOT NULL,\
               updated_at INTEGER NOT NULL\
             )",
        )
        .map_err(AppError::from)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_key(&self, key: &str) -> rusqlite::Result<Option<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn write_key(conn: &Connection, key: &str, value: &str) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now_ms()],
        )?;
        Ok(())
    }

    /// Last stored snapshot for a key. Missing keys, unreadable rows and
    /// malformed payloads all come back as an empty array.
    pub fn snapshot(&self, key: &str) -> Vec<Value> {
        match self.read_key(key) {
            Ok(Some(text)) => match serde_json::from_str::<Vec<Value>>(&text) {
                Ok(docs) => docs,
                Err(err) => {
                    warn!(
                        target: "tallykeep",
                        event = "cache_snapshot_malformed",
                        key,
                        error = %err
                    );
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(target: "tallykeep", event = "cache_read_failed", key, error = %err);
                Vec::new()
            }
        }
    }

    /// Store a snapshot together with the schema-version marker. Failures
    /// are logged and swallowed; only offline durability degrades.
    pub fn store_snapshot(&self, key: &str, docs: &[Value]) {
        let payload = match serde_json::to_string(docs) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(target: "tallykeep", event = "cache_encode_failed", key, error = %err);
                return;
            }
        };
        if let Err(err) = self.write_snapshot(key, &payload) {
            warn!(target: "tallykeep", event = "cache_write_failed", key, error = %err);
        }
    }

    fn write_snapshot(&self, key: &str, payload: &str) -> rusqlite::Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        Self::write_key(&tx, key, payload)?;
        Self::write_key(&tx, SCHEMA_VERSION_KEY, SCHEMA_VERSION)?;
        tx.commit()
    }

    pub fn schema_version(&self) -> Option<String> {
        self.read_key(SCHEMA_VERSION_KEY).ok().flatten()
    }

    pub fn migration_complete(&self) -> bool {
        matches!(self.read_key(MIGRATED_KEY), Ok(Some(v)) if v == "true")
    }

    pub fn has_legacy_data(&self) -> bool {
        let present = |key| matches!(self.read_key(key), Ok(Some(_)));
        present(LEGACY_EXPENSES_KEY) || present(LEGACY_GOALS_KEY)
    }

    pub fn load_legacy_data(&self) -> LegacyData {
        LegacyData {
            expenses: self.snapshot(LEGACY_EXPENSES_KEY),
            goals: self.snapshot(LEGACY_GOALS_KEY),
        }
    }

    /// Drop the deprecated keys and set the migration marker, atomically.
    /// Failure is logged and swallowed; the migration will simply run again
    /// on next startup.
    pub fn clear_legacy_data(&self) {
        if let Err(err) = self.clear_legacy_inner() {
            warn!(target: "tallykeep", event = "legacy_clear_failed", error = %err);
        }
    }

    fn clear_legacy_inner(&self) -> rusqlite::Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM kv WHERE key IN (?1, ?2)",
            params![LEGACY_EXPENSES_KEY, LEGACY_GOALS_KEY],
        )?;
        Self::write_key(&tx, MIGRATED_KEY, "true")?;
        tx.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache() -> DurableCache {
        DurableCache::in_memory().expect("in-memory cache")
    }

    #[test]
    fn snapshot_round_trips_and_stamps_schema_version() {
        let cache = cache();
        let docs = vec![json!({ "id": "a", "amount": 1.0 })];
        cache.store_snapshot("tallykeep-expenses-v2", &docs);
        assert_eq!(cache.snapshot("tallykeep-expenses-v2"), docs);
        assert_eq!(cache.schema_version().as_deref(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn missing_key_reads_as_empty() {
        assert!(cache().snapshot("tallykeep-budgets-v2").is_empty());
    }

    #[test]
    fn malformed_payload_reads_as_empty() {
        let cache = cache();
        {
            let conn = cache.lock();
            DurableCache::write_key(&conn, "tallykeep-goals-v2", "{not json").unwrap();
        }
        assert!(cache.snapshot("tallykeep-goals-v2").is_empty());

        {
            let conn = cache.lock();
            DurableCache::write_key(&conn, "tallykeep-goals-v2", "{\"an\": \"object\"}").unwrap();
        }
        assert!(cache.snapshot("tallykeep-goals-v2").is_empty());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("cache.sqlite");
        {
            let cache = DurableCache::open(&path).unwrap();
            cache.store_snapshot("tallykeep-incomes-v2", &[json!({ "id": "i1" })]);
        }
        let cache = DurableCache::open(&path).unwrap();
        let docs = cache.snapshot("tallykeep-incomes-v2");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["id"], json!("i1"));
    }

    #[test]
    fn legacy_keys_are_disjoint_from_snapshot_keys() {
        let cache = cache();
        cache.store_snapshot(LEGACY_EXPENSES_KEY, &[json!({ "id": "old" })]);
        assert!(cache.has_legacy_data());
        assert!(cache.snapshot("tallykeep-expenses-v2").is_empty());
    }

    #[test]
    fn clear_legacy_removes_keys_and_sets_marker() {
        let cache = cache();
        cache.store_snapshot(LEGACY_EXPENSES_KEY, &[json!({ "id": "old" })]);
        cache.store_snapshot(LEGACY_GOALS_KEY, &[json!({ "id": "g" })]);
        assert!(!cache.migration_complete());

        cache.clear_legacy_data();
        assert!(cache.migration_complete());
        assert!(!cache.has_legacy_data());
        assert!(cache.load_legacy_data().is_empty());
    }

    #[test]
    fn collection_keys_only_exist_for_cached_collections() {
        assert!(collection_key(CollectionKind::Expenses).is_some());
        assert!(collection_key(CollectionKind::Goals).is_some());
        assert!(collection_key(CollectionKind::Incomes).is_some());
        assert!(collection_key(CollectionKind::Budgets).is_some());
        assert!(collection_key(CollectionKind::Debts).is_none());
        assert!(collection_key(CollectionKind::Recurring).is_none());
    }
}
