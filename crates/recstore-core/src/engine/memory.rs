//! In-memory storage engine
//!
//! A BTreeMap-based engine with the same observable semantics as the browser
//! engine: key ordering, unique indexes, multi-entry indexes, versioned
//! upgrades and live cursors. Databases outlive their connections, so a
//! reopened database sees earlier writes.
//!
//! Useful for:
//! - Unit and integration testing
//! - Native processes that don't need persistence

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::{
    AccessMode, Connection, CursorOps, Engine, IndexInstaller, IndexOps, IndexTarget, Record,
    RecordCursor, StoreOps,
};
use crate::error::{StoreError, StoreResult};
use crate::key::{resolve_key_path, Key, KeyRange};
use crate::schema::{DatabaseConfig, IndexDecl};

type SharedDatabase = Rc<RefCell<MemoryDatabase>>;

#[derive(Debug, Clone)]
struct MemoryDatabase {
    version: u32,
    stores: BTreeMap<String, MemoryObjectStore>,
}

#[derive(Debug, Clone)]
struct MemoryObjectStore {
    key_path: String,
    indexes: Vec<IndexDecl>,
    records: BTreeMap<Key, Record>,
}

impl MemoryObjectStore {
    fn new(key_path: &str) -> Self {
        Self {
            key_path: key_path.to_string(),
            indexes: Vec::new(),
            records: BTreeMap::new(),
        }
    }

    fn primary_key(&self, record: &Record) -> StoreResult<Key> {
        Key::from_record(record, &self.key_path).ok_or_else(|| {
            StoreError::InvalidKey(format!(
                "record has no valid key at '{}'",
                self.key_path
            ))
        })
    }

    fn index(&self, store: &str, name: &str) -> StoreResult<&IndexDecl> {
        self.indexes
            .iter()
            .find(|i| i.index_name == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                store: store.to_string(),
                index: name.to_string(),
            })
    }

    /// Reject `record` if any unique index value is held by a different record.
    fn check_unique(&self, key: &Key, record: &Record) -> StoreResult<()> {
        for index in self.indexes.iter().filter(|i| i.object_parameters.unique) {
            let wanted = index_keys(index, record);
            if wanted.is_empty() {
                continue;
            }
            let clash = self
                .records
                .iter()
                .filter(|(other_key, _)| *other_key != key)
                .any(|(_, other)| index_keys(index, other).iter().any(|k| wanted.contains(k)));
            if clash {
                return Err(StoreError::Constraint(format!(
                    "unique index '{}' already holds this value",
                    index.index_name
                )));
            }
        }
        Ok(())
    }

    /// (index key, primary key) pairs inside `query`, in index order.
    fn index_entries(&self, index: &IndexDecl, query: &KeyRange) -> Vec<(Key, Key)> {
        let mut entries: Vec<(Key, Key)> = self
            .records
            .iter()
            .flat_map(|(pk, record)| {
                index_keys(index, record)
                    .into_iter()
                    .filter(|k| query.contains(k))
                    .map(move |k| (k, pk.clone()))
            })
            .collect();
        entries.sort();
        entries
    }

    fn write(&mut self, record: &Record, overwrite: bool) -> StoreResult<Key> {
        let key = self.primary_key(record)?;
        if !overwrite && self.records.contains_key(&key) {
            return Err(StoreError::Constraint(format!(
                "key {:?} already exists",
                key
            )));
        }
        self.check_unique(&key, record)?;
        self.records.insert(key.clone(), record.clone());
        Ok(key)
    }
}

/// Keys a record contributes to `index`. Records without a valid value at the
/// key path are simply not indexed.
fn index_keys(index: &IndexDecl, record: &Record) -> Vec<Key> {
    let Some(value) = resolve_key_path(record, &index.key_path) else {
        return Vec::new();
    };
    match value {
        Value::Array(items) if index.object_parameters.multi_entry => {
            let mut keys: Vec<Key> = items.iter().filter_map(Key::from_value).collect();
            keys.sort();
            keys.dedup();
            keys
        }
        other => Key::from_value(other).into_iter().collect(),
    }
}

struct MemoryIndexTarget<'a> {
    name: &'a str,
    store: &'a mut MemoryObjectStore,
}

impl IndexTarget for MemoryIndexTarget<'_> {
    fn store_name(&self) -> &str {
        self.name
    }

    fn create_index(&mut self, index: &IndexDecl) -> StoreResult<()> {
        if self
            .store
            .indexes
            .iter()
            .any(|i| i.index_name == index.index_name)
        {
            return Err(StoreError::Constraint(format!(
                "index '{}' already exists on store '{}'",
                index.index_name, self.name
            )));
        }
        self.store.indexes.push(index.clone());
        Ok(())
    }
}

/// In-memory engine. Clones share the same set of databases.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    databases: Rc<RefCell<HashMap<String, SharedDatabase>>>,
    supported: bool,
}

impl MemoryEngine {
    /// Create a new engine with no databases.
    pub fn new() -> Self {
        Self {
            databases: Rc::new(RefCell::new(HashMap::new())),
            supported: true,
        }
    }

    /// An engine that behaves like a host without storage support.
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            ..Self::new()
        }
    }

    /// Names of all databases created so far (for testing).
    pub fn database_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Engine for MemoryEngine {
    type Connection = MemoryConnection;

    fn check_supported(&self) -> StoreResult<()> {
        if self.supported {
            Ok(())
        } else {
            Err(StoreError::NotSupported(
                "memory engine created as unsupported".into(),
            ))
        }
    }

    async fn open(
        &self,
        config: &DatabaseConfig,
        installer: Rc<dyn IndexInstaller>,
    ) -> StoreResult<MemoryConnection> {
        self.check_supported()?;

        let existing = self.databases.borrow().get(&config.name).cloned();
        let current_version = existing.as_ref().map(|db| db.borrow().version).unwrap_or(0);

        if config.version < current_version {
            return Err(StoreError::Open(format!(
                "requested version {} is lower than existing version {}",
                config.version, current_version
            )));
        }

        let db = match existing {
            Some(db) if config.version == current_version => db,
            existing => {
                // Upgrade on a copy so a failing installer leaves nothing behind
                let mut upgraded = existing
                    .as_ref()
                    .map(|db| db.borrow().clone())
                    .unwrap_or(MemoryDatabase {
                        version: 0,
                        stores: BTreeMap::new(),
                    });

                for decl in &config.stores {
                    if upgraded.stores.contains_key(&decl.name) {
                        continue;
                    }
                    tracing::debug!(store = %decl.name, key = %decl.key, "creating store");
                    let mut store = MemoryObjectStore::new(&decl.key);
                    installer
                        .install(
                            &decl.index_list,
                            &mut MemoryIndexTarget {
                                name: &decl.name,
                                store: &mut store,
                            },
                        )
                        .map_err(|e| StoreError::Open(format!("upgrade aborted: {}", e)))?;
                    upgraded.stores.insert(decl.name.clone(), store);
                }
                upgraded.version = config.version;

                match existing {
                    Some(db) => {
                        *db.borrow_mut() = upgraded;
                        db
                    }
                    None => {
                        let db = Rc::new(RefCell::new(upgraded));
                        self.databases
                            .borrow_mut()
                            .insert(config.name.clone(), db.clone());
                        db
                    }
                }
            }
        };

        Ok(MemoryConnection {
            db,
            closed: Rc::new(Cell::new(false)),
        })
    }

    async fn delete_database(&self, name: &str) -> StoreResult<()> {
        self.check_supported()?;
        self.databases.borrow_mut().remove(name);
        Ok(())
    }
}

/// Connection to one in-memory database.
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    db: SharedDatabase,
    closed: Rc<Cell<bool>>,
}

impl MemoryConnection {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.get() {
            return Err(StoreError::Transaction("connection is closing".into()));
        }
        Ok(())
    }

    fn read<T>(
        &self,
        store: &str,
        f: impl FnOnce(&MemoryObjectStore) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.ensure_open()?;
        let db = self.db.borrow();
        let object_store = db
            .stores
            .get(store)
            .ok_or_else(|| StoreError::UnknownStore(store.to_string()))?;
        f(object_store)
    }

    fn write<T>(
        &self,
        store: &str,
        f: impl FnOnce(&mut MemoryObjectStore) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.ensure_open()?;
        let mut db = self.db.borrow_mut();
        let object_store = db
            .stores
            .get_mut(store)
            .ok_or_else(|| StoreError::UnknownStore(store.to_string()))?;
        f(object_store)
    }

    /// Current schema version of the database.
    pub fn version(&self) -> u32 {
        self.db.borrow().version
    }
}

impl Connection for MemoryConnection {
    fn close(&self) {
        self.closed.set(true);
    }

    fn store_names(&self) -> Vec<String> {
        self.db.borrow().stores.keys().cloned().collect()
    }
}

#[async_trait(?Send)]
impl StoreOps for MemoryConnection {
    async fn add(&self, store: &str, record: &Record) -> StoreResult<Key> {
        self.write(store, |s| s.write(record, false))
    }

    async fn put(&self, store: &str, record: &Record) -> StoreResult<Key> {
        self.write(store, |s| s.write(record, true))
    }

    async fn get(&self, store: &str, key: &Key) -> StoreResult<Option<Record>> {
        self.read(store, |s| Ok(s.records.get(key).cloned()))
    }

    async fn get_all(&self, store: &str) -> StoreResult<Vec<Record>> {
        self.read(store, |s| Ok(s.records.values().cloned().collect()))
    }

    async fn get_all_keys(&self, store: &str) -> StoreResult<Vec<Key>> {
        self.read(store, |s| Ok(s.records.keys().cloned().collect()))
    }

    async fn count(&self, store: &str) -> StoreResult<u32> {
        self.read(store, |s| Ok(s.records.len() as u32))
    }

    async fn delete(&self, store: &str, key: &Key) -> StoreResult<()> {
        self.write(store, |s| {
            s.records.remove(key);
            Ok(())
        })
    }

    async fn clear(&self, store: &str) -> StoreResult<()> {
        self.write(store, |s| {
            s.records.clear();
            Ok(())
        })
    }
}

#[async_trait(?Send)]
impl IndexOps for MemoryConnection {
    async fn index_get(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Option<Record>> {
        self.read(store, |s| {
            let decl = s.index(store, index)?;
            Ok(s
                .index_entries(decl, query)
                .first()
                .and_then(|(_, pk)| s.records.get(pk).cloned()))
        })
    }

    async fn index_count(&self, store: &str, index: &str, query: &KeyRange) -> StoreResult<u32> {
        self.read(store, |s| {
            let decl = s.index(store, index)?;
            Ok(s.index_entries(decl, query).len() as u32)
        })
    }

    async fn index_get_all(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Vec<Record>> {
        self.read(store, |s| {
            let decl = s.index(store, index)?;
            Ok(s
                .index_entries(decl, query)
                .iter()
                .filter_map(|(_, pk)| s.records.get(pk).cloned())
                .collect())
        })
    }

    async fn index_get_all_keys(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Vec<Key>> {
        self.read(store, |s| {
            let decl = s.index(store, index)?;
            Ok(s
                .index_entries(decl, query)
                .into_iter()
                .map(|(_, pk)| pk)
                .collect())
        })
    }

    async fn index_get_key(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Option<Key>> {
        self.read(store, |s| {
            let decl = s.index(store, index)?;
            Ok(s
                .index_entries(decl, query)
                .into_iter()
                .next()
                .map(|(_, pk)| pk))
        })
    }
}

#[async_trait(?Send)]
impl CursorOps for MemoryConnection {
    type Cursor = MemoryCursor;

    async fn open_cursor(&self, store: &str, mode: AccessMode) -> StoreResult<MemoryCursor> {
        let current = self.read(store, |s| {
            Ok(s.records
                .iter()
                .next()
                .map(|(k, v)| (k.clone(), v.clone())))
        })?;
        Ok(MemoryCursor {
            connection: self.clone(),
            store: store.to_string(),
            mode,
            current,
        })
    }
}

/// Live cursor over an in-memory store; sees writes made while iterating.
#[derive(Debug)]
pub struct MemoryCursor {
    connection: MemoryConnection,
    store: String,
    mode: AccessMode,
    current: Option<(Key, Record)>,
}

impl MemoryCursor {
    fn current_key(&self) -> StoreResult<&Key> {
        self.current
            .as_ref()
            .map(|(k, _)| k)
            .ok_or_else(|| StoreError::Request("cursor is exhausted".into()))
    }

    fn ensure_writable(&self) -> StoreResult<()> {
        match self.mode {
            AccessMode::ReadWrite => Ok(()),
            AccessMode::ReadOnly => Err(StoreError::Transaction(
                "cursor transaction is read-only".into(),
            )),
        }
    }
}

#[async_trait(?Send)]
impl RecordCursor for MemoryCursor {
    fn primary_key(&self) -> Option<&Key> {
        self.current.as_ref().map(|(k, _)| k)
    }

    fn value(&self) -> Option<&Record> {
        self.current.as_ref().map(|(_, v)| v)
    }

    async fn advance(&mut self) -> StoreResult<()> {
        let Some((key, _)) = self.current.take() else {
            return Err(StoreError::Request("cursor is exhausted".into()));
        };
        self.current = self.connection.read(&self.store, |s| {
            Ok(s.records
                .range((Bound::Excluded(key), Bound::Unbounded))
                .next()
                .map(|(k, v)| (k.clone(), v.clone())))
        })?;
        Ok(())
    }

    async fn update(&self, record: &Record) -> StoreResult<()> {
        self.ensure_writable()?;
        let key = self.current_key()?;
        self.connection.write(&self.store, |s| {
            if &s.primary_key(record)? != key {
                return Err(StoreError::InvalidKey(
                    "cursor update cannot change the primary key".into(),
                ));
            }
            s.write(record, true).map(|_| ())
        })
    }

    async fn delete(&self) -> StoreResult<()> {
        self.ensure_writable()?;
        let key = self.current_key()?;
        self.connection.write(&self.store, |s| {
            s.records.remove(key);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DeclaredIndexes;
    use crate::schema::StoreDecl;
    use serde_json::json;

    fn config() -> DatabaseConfig {
        DatabaseConfig::new("test").with_store(
            StoreDecl::new("users", "id")
                .with_index(IndexDecl::new("by_email", "email").unique())
                .with_index(IndexDecl::new("by_tag", "tags").multi_entry()),
        )
    }

    async fn open(engine: &MemoryEngine, config: &DatabaseConfig) -> MemoryConnection {
        engine.open(config, Rc::new(DeclaredIndexes)).await.unwrap()
    }

    #[tokio::test]
    async fn test_add_duplicate_key_fails() {
        let engine = MemoryEngine::new();
        let conn = open(&engine, &config()).await;

        conn.add("users", &json!({"id": 1})).await.unwrap();
        let result = conn.add("users", &json!({"id": 1})).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_unique_index_enforced_on_put() {
        let engine = MemoryEngine::new();
        let conn = open(&engine, &config()).await;

        conn.add("users", &json!({"id": 1, "email": "a@x"})).await.unwrap();
        conn.add("users", &json!({"id": 2, "email": "b@x"})).await.unwrap();

        // Rewriting a record with its own value is fine
        conn.put("users", &json!({"id": 1, "email": "a@x", "n": 1}))
            .await
            .unwrap();
        let result = conn.put("users", &json!({"id": 2, "email": "a@x"})).await;
        assert!(matches!(result, Err(StoreError::Constraint(_))));
    }

    #[tokio::test]
    async fn test_multi_entry_index() {
        let engine = MemoryEngine::new();
        let conn = open(&engine, &config()).await;

        conn.add("users", &json!({"id": 1, "tags": ["a", "b"]})).await.unwrap();
        conn.add("users", &json!({"id": 2, "tags": ["b"]})).await.unwrap();
        conn.add("users", &json!({"id": 3})).await.unwrap();

        let keys = conn
            .index_get_all_keys("users", "by_tag", &KeyRange::only("b"))
            .await
            .unwrap();
        assert_eq!(keys, vec![Key::from(1), Key::from(2)]);
        assert_eq!(
            conn.index_count("users", "by_tag", &KeyRange::all()).await.unwrap(),
            3
        );
    }

    #[tokio::test]
    async fn test_unknown_store_and_index() {
        let engine = MemoryEngine::new();
        let conn = open(&engine, &config()).await;

        assert!(matches!(
            conn.get_all("missing").await,
            Err(StoreError::UnknownStore(_))
        ));
        assert!(matches!(
            conn.index_get("users", "missing", &KeyRange::all()).await,
            Err(StoreError::UnknownIndex { .. })
        ));
    }

    #[tokio::test]
    async fn test_reopen_keeps_data_and_upgrade_adds_stores() {
        let engine = MemoryEngine::new();
        let conn = open(&engine, &config()).await;
        conn.add("users", &json!({"id": 1})).await.unwrap();
        conn.close();

        let upgraded = config().version(2).with_store(StoreDecl::new("notes", "id"));
        let conn = open(&engine, &upgraded).await;
        assert_eq!(conn.version(), 2);
        assert_eq!(conn.store_names(), vec!["notes", "users"]);
        assert_eq!(conn.count("users").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lower_version_fails() {
        let engine = MemoryEngine::new();
        open(&engine, &config().version(3)).await;
        let result = engine.open(&config(), Rc::new(DeclaredIndexes)).await;
        assert!(matches!(result, Err(StoreError::Open(_))));
    }

    #[tokio::test]
    async fn test_failed_installer_leaves_no_database() {
        let engine = MemoryEngine::new();
        let failing = |_: &[IndexDecl], _: &mut dyn IndexTarget| -> StoreResult<()> {
            Err(StoreError::Config("nope".into()))
        };
        let result = engine.open(&config(), Rc::new(failing)).await;
        assert!(matches!(result, Err(StoreError::Open(_))));
        assert!(engine.database_names().is_empty());
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_requests() {
        let engine = MemoryEngine::new();
        let conn = open(&engine, &config()).await;
        conn.close();
        assert!(matches!(
            conn.get_all("users").await,
            Err(StoreError::Transaction(_))
        ));
    }

    #[tokio::test]
    async fn test_cursor_walks_in_key_order_and_sees_deletes() {
        let engine = MemoryEngine::new();
        let conn = open(&engine, &config()).await;
        for id in [3, 1, 2] {
            conn.add("users", &json!({ "id": id })).await.unwrap();
        }

        let mut cursor = conn.open_cursor("users", AccessMode::ReadWrite).await.unwrap();
        let mut seen = Vec::new();
        while let Some(key) = cursor.primary_key().cloned() {
            if key == Key::from(1) {
                cursor.delete().await.unwrap();
            }
            seen.push(key);
            cursor.advance().await.unwrap();
        }
        assert_eq!(seen, vec![Key::from(1), Key::from(2), Key::from(3)]);
        assert_eq!(
            conn.get_all_keys("users").await.unwrap(),
            vec![Key::from(2), Key::from(3)]
        );
    }

    #[tokio::test]
    async fn test_read_only_cursor_cannot_write() {
        let engine = MemoryEngine::new();
        let conn = open(&engine, &config()).await;
        conn.add("users", &json!({"id": 1})).await.unwrap();

        let cursor = conn.open_cursor("users", AccessMode::ReadOnly).await.unwrap();
        assert!(cursor.delete().await.is_err());
        assert!(cursor.update(&json!({"id": 1, "x": 1})).await.is_err());
    }

    #[tokio::test]
    async fn test_cursor_update_rejects_key_change() {
        let engine = MemoryEngine::new();
        let conn = open(&engine, &config()).await;
        conn.add("users", &json!({"id": 1})).await.unwrap();

        let cursor = conn.open_cursor("users", AccessMode::ReadWrite).await.unwrap();
        let result = cursor.update(&json!({"id": 2})).await;
        assert!(matches!(result, Err(StoreError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_unsupported_engine() {
        let engine = MemoryEngine::unsupported();
        let result = engine.open(&config(), Rc::new(DeclaredIndexes)).await;
        assert!(matches!(result, Err(StoreError::NotSupported(_))));
    }
}
