//! Browser WASM bindings using wasm-bindgen and IndexedDB storage
//!
//! `RecordStore` wraps a `Session<IndexedDbEngine>`. Every method returns a
//! Promise:
//!
//! - status operations resolve with `{code, message}` and reject with
//!   `{code, message, reason?}`
//! - fetches resolve with the data, or `undefined` when the request failed
//!   or nothing matched
//! - cursor mutations resolve with `{code, message, matched, applied}`

use std::future::Future;
use std::rc::Rc;

use js_sys::Promise;
use recstore_core::{CursorReport, DatabaseConfig, Key, Session, Status, StoreError, StoreResult};
use recstore_indexeddb::{convert, IndexedDbEngine};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

use crate::payload;

type BrowserSession = Session<IndexedDbEngine>;

fn to_js(value: &Value) -> JsValue {
    convert::json_to_js(value).unwrap_or_else(|e| JsValue::from_str(&e.to_string()))
}

fn from_js(value: &JsValue) -> StoreResult<Value> {
    Ok(convert::js_to_json(value)?)
}

fn reject(err: StoreError) -> JsValue {
    to_js(&payload::error_payload(&err))
}

/// Settle a status operation.
fn status_promise<F>(fut: F) -> Promise
where
    F: Future<Output = StoreResult<Status>> + 'static,
{
    future_to_promise(async move {
        match fut.await {
            Ok(status) => Ok(to_js(&payload::status_payload(status))),
            Err(err) => Err(reject(err)),
        }
    })
}

/// Settle a fetch; `None` resolves with `undefined`.
fn fetch_promise<F, T, G>(fut: F, encode: G) -> Promise
where
    F: Future<Output = StoreResult<Option<T>>> + 'static,
    G: FnOnce(T) -> Value + 'static,
{
    future_to_promise(async move {
        match fut.await {
            Ok(Some(data)) => Ok(to_js(&encode(data))),
            Ok(None) => Ok(JsValue::UNDEFINED),
            Err(err) => Err(reject(err)),
        }
    })
}

/// Settle a cursor mutation.
fn report_promise<F>(fut: F) -> Promise
where
    F: Future<Output = StoreResult<CursorReport>> + 'static,
{
    future_to_promise(async move {
        match fut.await {
            Ok(report) => Ok(to_js(&payload::report_payload(&report))),
            Err(err) => Err(reject(err)),
        }
    })
}

fn keys_to_json(keys: Vec<Key>) -> Value {
    Value::Array(keys.iter().map(Key::to_value).collect())
}

/// Record store backed by the browser's IndexedDB.
#[wasm_bindgen]
pub struct RecordStore {
    session: Rc<BrowserSession>,
}

#[wasm_bindgen]
impl RecordStore {
    /// `new RecordStore(name, stores, version?)`; `stores` is an array of
    /// `{name, key, indexList?}` declarations.
    #[wasm_bindgen(constructor)]
    pub fn new(name: String, stores: JsValue, version: Option<u32>) -> Result<RecordStore, JsValue> {
        // Route Rust panics to console.error instead of "RuntimeError: unreachable"
        console_error_panic_hook::set_once();

        let stores = from_js(&stores)
            .and_then(payload::stores_from_json)
            .map_err(reject)?;
        let mut config = DatabaseConfig::new(name);
        config.stores = stores;
        if let Some(version) = version {
            config = config.version(version);
        }

        let session = Session::new(IndexedDbEngine::new(), config).map_err(reject)?;
        Ok(RecordStore {
            session: Rc::new(session),
        })
    }

    #[wasm_bindgen(js_name = isOpen)]
    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// Resolves with `true` once the database is open.
    pub fn open(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            session.open().await.map_err(reject)?;
            Ok(JsValue::TRUE)
        })
    }

    pub fn close(&self) -> Result<(), JsValue> {
        self.session.close().map_err(reject)
    }

    #[wasm_bindgen(js_name = deleteDatabase)]
    pub fn delete_database(&self) -> Promise {
        let session = self.session.clone();
        future_to_promise(async move {
            session.delete_database().await.map_err(reject)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = storeNames)]
    pub fn store_names(&self) -> Result<Vec<String>, JsValue> {
        self.session.store_names().map_err(reject)
    }

    // ========================================================================
    // CRUD
    // ========================================================================

    pub fn set(&self, store: String, value: JsValue) -> Promise {
        let session = self.session.clone();
        status_promise(async move { session.set(&store, &from_js(&value)?).await })
    }

    #[wasm_bindgen(js_name = setBatch)]
    pub fn set_batch(&self, store: String, values: JsValue) -> Promise {
        let session = self.session.clone();
        status_promise(async move {
            let values = match from_js(&values)? {
                Value::Array(items) => items,
                other => {
                    return Err(StoreError::Rejected {
                        status: Status::BatchInsertFailed,
                        reason: format!("expected an array of records, got {}", other),
                    })
                }
            };
            session.set_batch(&store, &values).await
        })
    }

    pub fn update(&self, store: String, value: JsValue) -> Promise {
        let session = self.session.clone();
        status_promise(async move { session.update(&store, &from_js(&value)?).await })
    }

    pub fn get(&self, store: String, key: JsValue) -> Promise {
        let session = self.session.clone();
        fetch_promise(
            async move {
                let key = payload::key_from_json(&from_js(&key)?)?;
                session.get(&store, key).await
            },
            |record: Value| record,
        )
    }

    #[wasm_bindgen(js_name = getAll)]
    pub fn get_all(&self, store: String) -> Promise {
        let session = self.session.clone();
        fetch_promise(async move { session.get_all(&store).await }, Value::Array)
    }

    #[wasm_bindgen(js_name = getAllKeys)]
    pub fn get_all_keys(&self, store: String) -> Promise {
        let session = self.session.clone();
        fetch_promise(async move { session.get_all_keys(&store).await }, keys_to_json)
    }

    pub fn count(&self, store: String) -> Promise {
        let session = self.session.clone();
        fetch_promise(async move { session.count(&store).await }, |n: u32| Value::from(n))
    }

    pub fn remove(&self, store: String, key: JsValue) -> Promise {
        let session = self.session.clone();
        status_promise(async move {
            let key = payload::key_from_json(&from_js(&key)?).map_err(|e| StoreError::Rejected {
                status: Status::DeleteFailed,
                reason: e.to_string(),
            })?;
            session.remove(&store, key).await
        })
    }

    #[wasm_bindgen(js_name = removeAll)]
    pub fn remove_all(&self, store: String) -> Promise {
        let session = self.session.clone();
        status_promise(async move { session.remove_all(&store).await })
    }

    // ========================================================================
    // Index queries
    // ========================================================================

    #[wasm_bindgen(js_name = getByIndex)]
    pub fn get_by_index(&self, store: String, index: String, query: JsValue) -> Promise {
        let session = self.session.clone();
        fetch_promise(
            async move {
                let query = payload::query_from_json(&from_js(&query)?)?;
                session.get_by_index(&store, &index, query).await
            },
            |record: Value| record,
        )
    }

    #[wasm_bindgen(js_name = getCountByIndex)]
    pub fn get_count_by_index(&self, store: String, index: String, query: JsValue) -> Promise {
        let session = self.session.clone();
        fetch_promise(
            async move {
                let query = payload::query_from_json(&from_js(&query)?)?;
                session.get_count_by_index(&store, &index, query).await
            },
            |n: u32| Value::from(n),
        )
    }

    #[wasm_bindgen(js_name = getAllByIndex)]
    pub fn get_all_by_index(&self, store: String, index: String, query: JsValue) -> Promise {
        let session = self.session.clone();
        fetch_promise(
            async move {
                let query = payload::query_from_json(&from_js(&query)?)?;
                session.get_all_by_index(&store, &index, query).await
            },
            Value::Array,
        )
    }

    #[wasm_bindgen(js_name = getAllKeysByIndex)]
    pub fn get_all_keys_by_index(&self, store: String, index: String, query: JsValue) -> Promise {
        let session = self.session.clone();
        fetch_promise(
            async move {
                let query = payload::query_from_json(&from_js(&query)?)?;
                session.get_all_keys_by_index(&store, &index, query).await
            },
            keys_to_json,
        )
    }

    #[wasm_bindgen(js_name = getKeyByIndex)]
    pub fn get_key_by_index(&self, store: String, index: String, query: JsValue) -> Promise {
        let session = self.session.clone();
        fetch_promise(
            async move {
                let query = payload::query_from_json(&from_js(&query)?)?;
                session.get_key_by_index(&store, &index, query).await
            },
            |key: Key| key.to_value(),
        )
    }

    // ========================================================================
    // Cursor scans
    // ========================================================================

    #[wasm_bindgen(js_name = getAllByCursor)]
    pub fn get_all_by_cursor(&self, store: String) -> Promise {
        let session = self.session.clone();
        fetch_promise(
            async move { session.get_all_by_cursor(&store).await },
            Value::Array,
        )
    }

    #[wasm_bindgen(js_name = updateByCursor)]
    pub fn update_by_cursor(
        &self,
        store: String,
        attr_name: String,
        attr_value: JsValue,
        new_record: JsValue,
    ) -> Promise {
        let session = self.session.clone();
        report_promise(async move {
            let attr_value = from_js(&attr_value)?;
            let new_record = from_js(&new_record)?;
            session
                .update_by_cursor(&store, &attr_name, &attr_value, &new_record)
                .await
        })
    }

    #[wasm_bindgen(js_name = deleteByCursor)]
    pub fn delete_by_cursor(&self, store: String, attr_name: String, attr_value: JsValue) -> Promise {
        let session = self.session.clone();
        report_promise(async move {
            let attr_value = from_js(&attr_value)?;
            session.delete_by_cursor(&store, &attr_name, &attr_value).await
        })
    }
}
