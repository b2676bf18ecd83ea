//! IndexedDB engine implementing the recstore-core engine capabilities.
//!
//! Every store and index operation runs in its own transaction: begin, issue one
//! request, await the request, then await the transaction's completion.

use std::rc::Rc;

use async_trait::async_trait;
use recstore_core::{
    AccessMode, Connection, CursorOps, DatabaseConfig, Engine, IndexInstaller, IndexOps, Key,
    KeyRange, Record, StoreError, StoreOps, StoreResult,
};
use wasm_bindgen::JsValue;
use web_sys::{IdbDatabase, IdbIndex, IdbObjectStore, IdbRequest, IdbTransactionMode};

use crate::convert;
use crate::cursor::IndexedDbCursor;
use crate::error::{IndexedDbError, Result};
use crate::idb;

/// Opens IndexedDB connections through the global `indexedDB` factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexedDbEngine;

impl IndexedDbEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl Engine for IndexedDbEngine {
    type Connection = IndexedDbConnection;

    fn check_supported(&self) -> StoreResult<()> {
        idb::idb_factory()?;
        Ok(())
    }

    async fn open(
        &self,
        config: &DatabaseConfig,
        installer: Rc<dyn IndexInstaller>,
    ) -> StoreResult<IndexedDbConnection> {
        let db = idb::open_database(config, installer).await?;
        tracing::info!(
            database = %config.name,
            version = config.version,
            stores = db.object_store_names().length(),
            "opened IndexedDB database"
        );
        Ok(IndexedDbConnection { db })
    }

    async fn delete_database(&self, name: &str) -> StoreResult<()> {
        idb::delete_database(name).await?;
        tracing::info!(database = %name, "deleted IndexedDB database");
        Ok(())
    }
}

/// An open IndexedDB database.
///
/// All methods are async because IndexedDB is callback-based.
pub struct IndexedDbConnection {
    db: IdbDatabase,
}

fn tx_mode(mode: AccessMode) -> IdbTransactionMode {
    match mode {
        AccessMode::ReadOnly => IdbTransactionMode::Readonly,
        AccessMode::ReadWrite => IdbTransactionMode::Readwrite,
    }
}

impl IndexedDbConnection {
    pub fn database(&self) -> &IdbDatabase {
        &self.db
    }

    /// Run one request against `store` in a fresh transaction and return its result.
    async fn store_request<F>(&self, store: &str, mode: AccessMode, make: F) -> Result<JsValue>
    where
        F: FnOnce(&IdbObjectStore) -> std::result::Result<IdbRequest, JsValue>,
    {
        let (tx, object_store) = idb::begin_transaction(&self.db, store, tx_mode(mode))?;
        let req = make(&object_store).map_err(IndexedDbError::from_js)?;
        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;
        Ok(result)
    }

    /// Run one read request against `index` on `store`.
    async fn index_request<F>(&self, store: &str, index: &str, make: F) -> Result<JsValue>
    where
        F: FnOnce(&IdbIndex) -> std::result::Result<IdbRequest, JsValue>,
    {
        let (tx, object_store) =
            idb::begin_transaction(&self.db, store, IdbTransactionMode::Readonly)?;
        if !object_store.index_names().contains(index) {
            return Err(IndexedDbError::UnknownIndex {
                store: store.to_string(),
                index: index.to_string(),
            });
        }
        let idx = object_store.index(index).map_err(IndexedDbError::from_js)?;
        let req = make(&idx).map_err(IndexedDbError::from_js)?;
        let result = idb::await_request(&req).await?;
        idb::await_transaction(&tx).await?;
        Ok(result)
    }
}

impl Connection for IndexedDbConnection {
    fn close(&self) {
        self.db.close();
    }

    fn store_names(&self) -> Vec<String> {
        idb::store_names(&self.db)
    }
}

#[async_trait(?Send)]
impl StoreOps for IndexedDbConnection {
    async fn add(&self, store: &str, record: &Record) -> StoreResult<Key> {
        let js_val = convert::json_to_js(record)?;
        let key = self
            .store_request(store, AccessMode::ReadWrite, |s| s.add(&js_val))
            .await?;
        Ok(convert::js_to_key(&key)?)
    }

    async fn put(&self, store: &str, record: &Record) -> StoreResult<Key> {
        let js_val = convert::json_to_js(record)?;
        let key = self
            .store_request(store, AccessMode::ReadWrite, |s| s.put(&js_val))
            .await?;
        Ok(convert::js_to_key(&key)?)
    }

    async fn get(&self, store: &str, key: &Key) -> StoreResult<Option<Record>> {
        let js_key = convert::key_to_js(key)?;
        let result = self
            .store_request(store, AccessMode::ReadOnly, |s| s.get(&js_key))
            .await?;
        Ok(convert::js_to_record(&result)?)
    }

    async fn get_all(&self, store: &str) -> StoreResult<Vec<Record>> {
        let result = self
            .store_request(store, AccessMode::ReadOnly, |s| s.get_all())
            .await?;
        Ok(convert::js_to_records(&result)?)
    }

    async fn get_all_keys(&self, store: &str) -> StoreResult<Vec<Key>> {
        let result = self
            .store_request(store, AccessMode::ReadOnly, |s| s.get_all_keys())
            .await?;
        Ok(convert::js_to_keys(&result)?)
    }

    async fn count(&self, store: &str) -> StoreResult<u32> {
        let result = self
            .store_request(store, AccessMode::ReadOnly, |s| s.count())
            .await?;
        Ok(convert::js_to_count(&result)?)
    }

    async fn delete(&self, store: &str, key: &Key) -> StoreResult<()> {
        let js_key = convert::key_to_js(key)?;
        self.store_request(store, AccessMode::ReadWrite, |s| s.delete(&js_key))
            .await?;
        Ok(())
    }

    async fn clear(&self, store: &str) -> StoreResult<()> {
        self.store_request(store, AccessMode::ReadWrite, |s| s.clear())
            .await?;
        Ok(())
    }
}

#[async_trait(?Send)]
impl IndexOps for IndexedDbConnection {
    async fn index_get(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Option<Record>> {
        let query = convert::key_range_to_query(query)?;
        let result = self.index_request(store, index, |i| i.get(&query)).await?;
        Ok(convert::js_to_record(&result)?)
    }

    async fn index_count(&self, store: &str, index: &str, query: &KeyRange) -> StoreResult<u32> {
        let query = convert::key_range_to_js(query)?;
        let result = self
            .index_request(store, index, |i| match &query {
                Some(q) => i.count_with_key(q),
                None => i.count(),
            })
            .await?;
        Ok(convert::js_to_count(&result)?)
    }

    async fn index_get_all(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Vec<Record>> {
        let query = convert::key_range_to_js(query)?;
        let result = self
            .index_request(store, index, |i| match &query {
                Some(q) => i.get_all_with_key(q),
                None => i.get_all(),
            })
            .await?;
        Ok(convert::js_to_records(&result)?)
    }

    async fn index_get_all_keys(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Vec<Key>> {
        let query = convert::key_range_to_js(query)?;
        let result = self
            .index_request(store, index, |i| match &query {
                Some(q) => i.get_all_keys_with_key(q),
                None => i.get_all_keys(),
            })
            .await?;
        Ok(convert::js_to_keys(&result)?)
    }

    async fn index_get_key(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Option<Key>> {
        let query = convert::key_range_to_query(query)?;
        let result = self
            .index_request(store, index, |i| i.get_key(&query))
            .await?;
        Ok(convert::js_to_optional_key(&result)?)
    }
}

#[async_trait(?Send)]
impl CursorOps for IndexedDbConnection {
    type Cursor = IndexedDbCursor;

    async fn open_cursor(&self, store: &str, mode: AccessMode) -> StoreResult<IndexedDbCursor> {
        let (tx, object_store) = idb::begin_transaction(&self.db, store, tx_mode(mode))?;
        let request = object_store.open_cursor().map_err(IndexedDbError::from_js)?;
        let cursor = IndexedDbCursor::start(store, tx, request)
            .await
            .map_err(StoreError::from)?;
        Ok(cursor)
    }
}
