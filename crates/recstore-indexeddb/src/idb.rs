//! Low-level IndexedDB helpers using web-sys
//!
//! Wraps the callback-based IndexedDB API into Rust futures using
//! `wasm_bindgen_futures::JsFuture` and `js_sys::Promise`.

use js_sys::Promise;
use recstore_core::{DatabaseConfig, IndexDecl, IndexInstaller, IndexTarget, StoreDecl, StoreError};
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    IdbDatabase, IdbFactory, IdbObjectStore, IdbOpenDbRequest, IdbRequest, IdbTransaction,
    IdbTransactionMode,
};

use crate::error::{describe, IndexedDbError, Result};

/// Type alias for upgrade closure to reduce complexity
type UpgradeClosure = Rc<RefCell<Option<Closure<dyn FnMut(web_sys::IdbVersionChangeEvent)>>>>;

/// First failure raised inside the upgrade callback, reported after open settles.
type UpgradeFailure = Rc<RefCell<Option<IndexedDbError>>>;

/// Get the global IndexedDB factory.
pub fn idb_factory() -> Result<IdbFactory> {
    let global = js_sys::global();

    let idb: JsValue = js_sys::Reflect::get(&global, &"indexedDB".into())
        .map_err(|_| IndexedDbError::NotAvailable("no indexedDB on global".into()))?;

    if idb.is_undefined() || idb.is_null() {
        return Err(IndexedDbError::NotAvailable(
            "indexedDB is null/undefined".into(),
        ));
    }

    idb.dyn_into::<IdbFactory>()
        .map_err(|_| IndexedDbError::NotAvailable("indexedDB is not IdbFactory".into()))
}

/// Convert an IdbRequest into a JS Promise that resolves with the request's result.
///
/// Rejects with the request's `DOMException` so callers can tell error kinds apart.
/// Safe to call again on the same request (cursor requests fire once per step).
fn request_to_promise(req: &IdbRequest) -> Promise {
    let req_success = req.clone();
    let req_error = req.clone();

    Promise::new(&mut move |resolve, reject| {
        // Store closures in Rc<RefCell> to manage their lifetime without leaking
        type ClosurePair = (
            Closure<dyn FnMut(web_sys::Event)>,
            Closure<dyn FnMut(web_sys::Event)>,
        );
        let closures: Rc<RefCell<Option<ClosurePair>>> = Rc::new(RefCell::new(None));

        let req_s = req_success.clone();
        let closures_for_success = closures.clone();
        let on_success = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let result = req_s.result().unwrap_or(JsValue::UNDEFINED);
            let _ = resolve.call1(&JsValue::UNDEFINED, &result);
            // Clean up both closures after success
            *closures_for_success.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let req_e = req_error.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let err = match req_e.error() {
                Ok(Some(dom)) => JsValue::from(dom),
                _ => JsValue::from_str("unknown IDB error"),
            };
            // Handled here; keep the transaction alive for the caller to inspect
            event.prevent_default();
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            // Clean up both closures after error
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        req_success.set_onsuccess(Some(on_success.as_ref().unchecked_ref()));
        req_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));

        // Store both closures to keep them alive until one fires
        *closures.borrow_mut() = Some((on_success, on_error));
    })
}

/// Convert an IdbTransaction completion into a JS Promise.
fn transaction_to_promise(tx: &IdbTransaction) -> Promise {
    let tx_complete = tx.clone();
    let tx_error = tx.clone();

    Promise::new(&mut move |resolve, reject| {
        type ClosurePair = (
            Closure<dyn FnMut(web_sys::Event)>,
            Closure<dyn FnMut(web_sys::Event)>,
        );
        let closures: Rc<RefCell<Option<ClosurePair>>> = Rc::new(RefCell::new(None));

        let closures_for_complete = closures.clone();
        let on_complete = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let _ = resolve.call0(&JsValue::UNDEFINED);
            *closures_for_complete.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        let tx_e = tx_error.clone();
        let closures_for_error = closures.clone();
        let on_error = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            let err = tx_e
                .error()
                .map(JsValue::from)
                .unwrap_or_else(|| JsValue::from_str("transaction error"));
            let _ = reject.call1(&JsValue::UNDEFINED, &err);
            *closures_for_error.borrow_mut() = None;
        }) as Box<dyn FnMut(web_sys::Event)>);

        tx_complete.set_oncomplete(Some(on_complete.as_ref().unchecked_ref()));
        tx_error.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        tx_error.set_onabort(Some(on_error.as_ref().unchecked_ref()));

        *closures.borrow_mut() = Some((on_complete, on_error));
    })
}

/// Handle to a store created during `upgradeneeded`, handed to the index installer.
struct UpgradeStore<'a> {
    name: &'a str,
    store: IdbObjectStore,
}

impl IndexTarget for UpgradeStore<'_> {
    fn store_name(&self) -> &str {
        self.name
    }

    fn create_index(&mut self, index: &IndexDecl) -> recstore_core::StoreResult<()> {
        let params = web_sys::IdbIndexParameters::new();
        set_flag(&params, "unique", index.object_parameters.unique)?;
        set_flag(&params, "multiEntry", index.object_parameters.multi_entry)?;

        self.store
            .create_index_with_str_and_optional_parameters(
                &index.index_name,
                &index.key_path,
                &params,
            )
            .map_err(|e| StoreError::from(IndexedDbError::from_js(e)))?;
        Ok(())
    }
}

fn set_flag(target: &JsValue, name: &str, value: bool) -> recstore_core::StoreResult<()> {
    js_sys::Reflect::set(target, &name.into(), &JsValue::from_bool(value))
        .map_err(|e| StoreError::Open(format!("set {}: {}", name, describe(&e))))?;
    Ok(())
}

/// Create every declared store missing from `db`, registering indexes through `installer`.
fn create_missing_stores(
    db: &IdbDatabase,
    stores: &[StoreDecl],
    installer: &dyn IndexInstaller,
) -> Result<()> {
    let existing = db.object_store_names();
    for decl in stores {
        if existing.contains(&decl.name) {
            continue;
        }

        let params = web_sys::IdbObjectStoreParameters::new();
        js_sys::Reflect::set(&params, &"keyPath".into(), &decl.key.as_str().into())
            .map_err(|e| IndexedDbError::Open(format!("set keyPath: {}", describe(&e))))?;

        let store = db
            .create_object_store_with_optional_parameters(&decl.name, &params)
            .map_err(|e| IndexedDbError::Open(format!("create store {}: {}", decl.name, describe(&e))))?;
        tracing::debug!(store = %decl.name, key = %decl.key, "created object store");

        installer
            .install(
                &decl.index_list,
                &mut UpgradeStore {
                    name: &decl.name,
                    store,
                },
            )
            .map_err(|e| IndexedDbError::Open(format!("install indexes on {}: {}", decl.name, e)))?;
    }
    Ok(())
}

/// Open (or create/upgrade) the database described by `config`.
pub async fn open_database(
    config: &DatabaseConfig,
    installer: Rc<dyn IndexInstaller>,
) -> Result<IdbDatabase> {
    let factory = idb_factory()?;

    let open_req: IdbOpenDbRequest = factory
        .open_with_u32(&config.name, config.version)
        .map_err(|e| IndexedDbError::Open(describe(&e)))?;

    // Store upgrade closure to manage its lifetime without leaking
    let upgrade_closure: UpgradeClosure = Rc::new(RefCell::new(None));
    let upgrade_closure_for_drop = upgrade_closure.clone();

    let failure: UpgradeFailure = Rc::new(RefCell::new(None));
    let failure_for_upgrade = failure.clone();
    let stores = config.stores.clone();

    // Handle upgradeneeded: create missing object stores and their indexes
    let on_upgrade = Closure::wrap(Box::new(move |event: web_sys::IdbVersionChangeEvent| {
        let Some(req) = event
            .target()
            .and_then(|t| t.dyn_into::<IdbOpenDbRequest>().ok())
        else {
            tracing::error!("upgradeneeded event without an open request target");
            return;
        };
        let db = match req.result().and_then(|r| r.dyn_into::<IdbDatabase>()) {
            Ok(db) => db,
            Err(e) => {
                tracing::error!("upgradeneeded without a database: {}", describe(&e));
                return;
            }
        };

        tracing::debug!(
            old_version = event.old_version(),
            new_version = ?event.new_version(),
            "upgrading database"
        );

        if let Err(err) = create_missing_stores(&db, &stores, installer.as_ref()) {
            tracing::error!("schema upgrade failed: {}", err);
            // Aborting the version change makes the open request fail
            if let Some(tx) = req.transaction() {
                let _ = tx.abort();
            }
            *failure_for_upgrade.borrow_mut() = Some(err);
        }
    }) as Box<dyn FnMut(web_sys::IdbVersionChangeEvent)>);

    open_req.set_onupgradeneeded(Some(on_upgrade.as_ref().unchecked_ref()));

    // Store closure to keep it alive during the open request
    *upgrade_closure.borrow_mut() = Some(on_upgrade);

    // Await the open request via promise
    let open_promise = request_to_promise(open_req.unchecked_ref());
    let result = wasm_bindgen_futures::JsFuture::from(open_promise).await;

    // Clean up upgrade closure now that open is complete
    *upgrade_closure_for_drop.borrow_mut() = None;

    if let Some(err) = failure.borrow_mut().take() {
        if let Ok(db) = result.as_ref().map(|r| r.clone().unchecked_into::<IdbDatabase>()) {
            db.close();
        }
        return Err(err);
    }

    result
        .map_err(|e| IndexedDbError::Open(describe(&e)))?
        .dyn_into::<IdbDatabase>()
        .map_err(|_| IndexedDbError::Open("result is not IdbDatabase".into()))
}

/// Start a transaction scoped to one object store.
pub fn begin_transaction(
    db: &IdbDatabase,
    store_name: &str,
    mode: IdbTransactionMode,
) -> Result<(IdbTransaction, IdbObjectStore)> {
    if !db.object_store_names().contains(store_name) {
        return Err(IndexedDbError::UnknownStore(store_name.to_string()));
    }
    let tx = db
        .transaction_with_str_and_mode(store_name, mode)
        .map_err(|e| IndexedDbError::Transaction(describe(&e)))?;
    let store = tx.object_store(store_name).map_err(IndexedDbError::from_js)?;
    Ok((tx, store))
}

/// Await an IdbRequest, resolving to its result JsValue.
pub async fn await_request(req: &IdbRequest) -> Result<JsValue> {
    let promise = request_to_promise(req);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(IndexedDbError::from_js)
}

/// Await an IdbTransaction to complete.
pub async fn await_transaction(tx: &IdbTransaction) -> Result<()> {
    let promise = transaction_to_promise(tx);
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| IndexedDbError::Transaction(describe(&e)))?;
    Ok(())
}

/// Delete an IndexedDB database by name.
pub async fn delete_database(db_name: &str) -> Result<()> {
    let factory = idb_factory()?;
    let req = factory
        .delete_database(db_name)
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", describe(&e))))?;
    let promise = request_to_promise(req.unchecked_ref());
    wasm_bindgen_futures::JsFuture::from(promise)
        .await
        .map_err(|e| IndexedDbError::Open(format!("delete db: {}", describe(&e))))?;
    Ok(())
}

/// Names of the object stores in an open database.
pub fn store_names(db: &IdbDatabase) -> Vec<String> {
    let list = db.object_store_names();
    (0..list.length()).filter_map(|i| list.item(i)).collect()
}
