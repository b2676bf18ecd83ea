//! IndexedDB engine for recstore (browser WASM)
//!
//! Implements the recstore-core engine capabilities (`Engine`, `StoreOps`,
//! `IndexOps`, `CursorOps`) on top of the browser's IndexedDB through web-sys,
//! so a `Session<IndexedDbEngine>` behaves like the in-memory engine used in
//! native tests.
//!
//! # Schema
//!
//! Object stores are created on `upgradeneeded` from the `DatabaseConfig`, with
//! the declared key path as in-line key. Stores that already exist are left as
//! they are; indexes are only registered on newly created stores.
//!
//! Records are plain JSON values, converted with `JSON.parse`/`JSON.stringify`.
//!
//! # Example
//!
//! ```rust,ignore
//! use recstore_core::{DatabaseConfig, Session, StoreDecl};
//! use recstore_indexeddb::IndexedDbEngine;
//! use serde_json::json;
//!
//! let config = DatabaseConfig::new("app").with_store(StoreDecl::new("users", "id"));
//! let session = Session::new(IndexedDbEngine::new(), config)?;
//! session.open().await?;
//!
//! session.set("users", &json!({"id": 1, "name": "Ada"})).await?;
//! let ada = session.get("users", 1).await?;
//! assert!(ada.is_some());
//! ```

pub mod convert;
pub mod cursor;
pub mod error;
pub mod idb;
pub mod store;

pub use cursor::IndexedDbCursor;
pub use error::{IndexedDbError, Result};
pub use store::{IndexedDbConnection, IndexedDbEngine};
