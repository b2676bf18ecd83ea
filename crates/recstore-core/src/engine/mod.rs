//! Storage engine abstraction
//!
//! An engine is split into capabilities rather than one large trait:
//!
//! - [`Engine`]: opens connections and runs schema upgrades
//! - [`StoreOps`]: single-request CRUD against a store (every connection)
//! - [`IndexOps`]: queries through a secondary index (optional)
//! - [`CursorOps`]: forward-only iteration with in-place mutation (optional)
//!
//! The [`Session`](crate::Session) only exposes index and cursor methods when
//! the engine's connection implements the matching capability.
//!
//! Implementations exist for:
//!
//! - **Memory**: in-process engine for tests and native use ([`MemoryEngine`])
//! - **IndexedDB**: browser storage via web-sys (separate crate, WASM only)
//!
//! All futures are `!Send`; engines live on a single-threaded event loop.

mod memory;

use std::rc::Rc;

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::key::{Key, KeyRange};
use crate::schema::{DatabaseConfig, IndexDecl};

pub use memory::{MemoryConnection, MemoryCursor, MemoryEngine};

/// A stored record: any JSON value carrying its store's key path.
pub type Record = serde_json::Value;

/// Transaction mode requested for a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
}

/// A store being created during a schema upgrade.
pub trait IndexTarget {
    fn store_name(&self) -> &str;

    /// Declare a secondary index on the store.
    fn create_index(&mut self, index: &IndexDecl) -> StoreResult<()>;
}

/// Hook invoked once per newly created store during an upgrade, with the
/// store's declared indexes and a handle to the new store.
pub trait IndexInstaller {
    fn install(&self, indexes: &[IndexDecl], store: &mut dyn IndexTarget) -> StoreResult<()>;
}

impl<F> IndexInstaller for F
where
    F: Fn(&[IndexDecl], &mut dyn IndexTarget) -> StoreResult<()>,
{
    fn install(&self, indexes: &[IndexDecl], store: &mut dyn IndexTarget) -> StoreResult<()> {
        self(indexes, store)
    }
}

/// Default installer: creates every declared index as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredIndexes;

impl IndexInstaller for DeclaredIndexes {
    fn install(&self, indexes: &[IndexDecl], store: &mut dyn IndexTarget) -> StoreResult<()> {
        for index in indexes {
            tracing::debug!(
                store = store.store_name(),
                index = %index.index_name,
                key_path = %index.key_path,
                unique = index.object_parameters.unique,
                "creating index"
            );
            store.create_index(index)?;
        }
        Ok(())
    }
}

/// Opens connections to named, versioned databases.
#[async_trait(?Send)]
pub trait Engine {
    type Connection: Connection;

    /// Fails with `StoreError::NotSupported` when the host has no usable engine.
    fn check_supported(&self) -> StoreResult<()>;

    /// Open `config.name` at `config.version`, creating missing stores
    /// (and their indexes, through `installer`) when an upgrade runs.
    async fn open(
        &self,
        config: &DatabaseConfig,
        installer: Rc<dyn IndexInstaller>,
    ) -> StoreResult<Self::Connection>;

    /// Delete a database by name.
    async fn delete_database(&self, name: &str) -> StoreResult<()>;
}

/// A live database connection.
pub trait Connection: StoreOps {
    fn close(&self);

    /// Names of the stores present in the opened database.
    fn store_names(&self) -> Vec<String>;
}

/// Store-level operations. Each call is one transaction with one request.
#[async_trait(?Send)]
pub trait StoreOps {
    /// Insert a record; fails if its primary key is already taken.
    async fn add(&self, store: &str, record: &Record) -> StoreResult<Key>;

    /// Insert or overwrite a record.
    async fn put(&self, store: &str, record: &Record) -> StoreResult<Key>;

    async fn get(&self, store: &str, key: &Key) -> StoreResult<Option<Record>>;

    async fn get_all(&self, store: &str) -> StoreResult<Vec<Record>>;

    async fn get_all_keys(&self, store: &str) -> StoreResult<Vec<Key>>;

    async fn count(&self, store: &str) -> StoreResult<u32>;

    async fn delete(&self, store: &str, key: &Key) -> StoreResult<()>;

    async fn clear(&self, store: &str) -> StoreResult<()>;
}

/// Queries through a named secondary index. Results are ordered by index key,
/// then primary key.
#[async_trait(?Send)]
pub trait IndexOps {
    /// First record whose index key falls in `query`.
    async fn index_get(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Option<Record>>;

    async fn index_count(&self, store: &str, index: &str, query: &KeyRange) -> StoreResult<u32>;

    async fn index_get_all(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Vec<Record>>;

    /// Primary keys of all records whose index key falls in `query`.
    async fn index_get_all_keys(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Vec<Key>>;

    /// Primary key of the first record whose index key falls in `query`.
    async fn index_get_key(
        &self,
        store: &str,
        index: &str,
        query: &KeyRange,
    ) -> StoreResult<Option<Key>>;
}

/// Opens forward-only cursors over a store.
#[async_trait(?Send)]
pub trait CursorOps {
    type Cursor: RecordCursor;

    /// Open a cursor positioned on the first record (or already exhausted).
    async fn open_cursor(&self, store: &str, mode: AccessMode) -> StoreResult<Self::Cursor>;
}

/// Forward-only iterator over a store in primary key order.
///
/// ```rust,ignore
/// let mut cursor = conn.open_cursor("users", AccessMode::ReadOnly).await?;
/// while let Some(record) = cursor.value() {
///     println!("{}", record);
///     cursor.advance().await?;
/// }
/// ```
#[async_trait(?Send)]
pub trait RecordCursor {
    /// Primary key of the current record, `None` once exhausted.
    fn primary_key(&self) -> Option<&Key>;

    /// Current record, `None` once exhausted.
    fn value(&self) -> Option<&Record>;

    /// Move to the next record.
    async fn advance(&mut self) -> StoreResult<()>;

    /// Overwrite the current record. The primary key must not change.
    async fn update(&self, record: &Record) -> StoreResult<()>;

    /// Delete the current record.
    async fn delete(&self) -> StoreResult<()>;
}
