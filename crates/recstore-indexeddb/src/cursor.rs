//! Forward-only object store cursor
//!
//! One `IDBRequest` drives the whole scan: each `continue()` re-fires its
//! success event with the next position, or with `null` once exhausted.

use async_trait::async_trait;
use recstore_core::{Key, Record, RecordCursor, StoreResult};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{IdbCursorWithValue, IdbRequest, IdbTransaction};

use crate::convert;
use crate::error::{IndexedDbError, Result};
use crate::idb;

pub struct IndexedDbCursor {
    store: String,
    tx: IdbTransaction,
    request: IdbRequest,
    cursor: Option<IdbCursorWithValue>,
    key: Option<Key>,
    value: Option<Record>,
}

impl IndexedDbCursor {
    /// Await the first position of a freshly opened cursor request.
    pub(crate) async fn start(store: &str, tx: IdbTransaction, request: IdbRequest) -> Result<Self> {
        let mut cursor = Self {
            store: store.to_string(),
            tx,
            request,
            cursor: None,
            key: None,
            value: None,
        };
        let first = idb::await_request(&cursor.request).await?;
        cursor.settle(first).await?;
        Ok(cursor)
    }

    /// Load the position carried by a request result. `null` ends the scan and
    /// waits for the transaction to commit.
    async fn settle(&mut self, result: JsValue) -> Result<()> {
        if result.is_null() || result.is_undefined() {
            self.cursor = None;
            self.key = None;
            self.value = None;
            idb::await_transaction(&self.tx).await?;
            tracing::trace!(store = %self.store, "cursor exhausted");
            return Ok(());
        }

        let cursor = result
            .dyn_into::<IdbCursorWithValue>()
            .map_err(|_| IndexedDbError::JsValue("request result is not a cursor".into()))?;
        let key = cursor.primary_key().map_err(IndexedDbError::from_js)?;
        let value = cursor.value().map_err(IndexedDbError::from_js)?;

        self.key = Some(convert::js_to_key(&key)?);
        self.value = Some(convert::js_to_json(&value)?);
        self.cursor = Some(cursor);
        Ok(())
    }

    fn current(&self) -> Result<&IdbCursorWithValue> {
        self.cursor
            .as_ref()
            .ok_or_else(|| IndexedDbError::Request("cursor is exhausted".into()))
    }
}

#[async_trait(?Send)]
impl RecordCursor for IndexedDbCursor {
    fn primary_key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    fn value(&self) -> Option<&Record> {
        self.value.as_ref()
    }

    async fn advance(&mut self) -> StoreResult<()> {
        let Some(cursor) = &self.cursor else {
            return Ok(());
        };
        cursor.continue_().map_err(IndexedDbError::from_js)?;
        let next = idb::await_request(&self.request).await?;
        self.settle(next).await?;
        Ok(())
    }

    async fn update(&self, record: &Record) -> StoreResult<()> {
        let js_val = convert::json_to_js(record)?;
        let req = self
            .current()?
            .update(&js_val)
            .map_err(IndexedDbError::from_js)?;
        idb::await_request(&req).await?;
        Ok(())
    }

    async fn delete(&self) -> StoreResult<()> {
        let req = self.current()?.delete().map_err(IndexedDbError::from_js)?;
        idb::await_request(&req).await?;
        Ok(())
    }
}
