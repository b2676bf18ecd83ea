//! recstore core
//!
//! A thin, typed layer over a key-value record store with declared stores,
//! secondary indexes and cursors. The same `Session` drives the browser's
//! IndexedDB (via `recstore-indexeddb`) and the in-memory engine used for
//! native tests.
//!
//! # Error policies
//!
//! Operations fall into three categories that report engine failures
//! differently (see [`ErrorPolicy`]):
//!
//! - status operations (`set`, `update`, `remove`, ...) settle with a fixed
//!   [`Status`] and fail with `StoreError::Rejected` carrying the failure status
//! - data fetches (`get`, index queries, `get_all_by_cursor`) return `None`
//!   when the request fails, the same as when nothing is stored
//! - cursor mutations settle with a [`CursorReport`] whose status encodes
//!   failures
//!
//! Using a closed session is always an error (`StoreError::Closed`).
//!
//! # Example
//!
//! ```rust
//! use recstore_core::{DatabaseConfig, IndexDecl, MemoryEngine, Session, Status, StoreDecl};
//! use serde_json::json;
//!
//! # futures::executor::block_on(async {
//! let config = DatabaseConfig::new("app").with_store(
//!     StoreDecl::new("users", "id").with_index(IndexDecl::new("by_email", "email").unique()),
//! );
//! let session = Session::new(MemoryEngine::new(), config)?;
//! session.open().await?;
//!
//! let status = session.set("users", &json!({"id": 1, "email": "ada@example.com"})).await?;
//! assert_eq!(status, Status::InsertOk);
//!
//! let ada = session
//!     .get_by_index("users", "by_email", recstore_core::Key::from("ada@example.com"))
//!     .await?;
//! assert!(ada.is_some());
//! # Ok::<(), recstore_core::StoreError>(())
//! # }).unwrap();
//! ```

pub mod cursor;
pub mod engine;
pub mod error;
pub mod index;
pub mod key;
#[cfg(feature = "subscriber")]
pub mod logging;
pub mod promise;
pub mod schema;
pub mod session;
pub mod status;

// Re-export main types at crate root
pub use cursor::CursorReport;
pub use engine::{
    AccessMode, Connection, CursorOps, DeclaredIndexes, Engine, IndexInstaller, IndexOps,
    IndexTarget, MemoryEngine, Record, RecordCursor, StoreOps,
};
pub use error::{ErrorPolicy, Operation, StoreError, StoreResult};
pub use key::{Key, KeyRange};
pub use schema::{DatabaseConfig, IndexDecl, IndexParameters, StoreDecl};
pub use session::Session;
pub use status::Status;
