//! Session: connection lifecycle and the store-level (CRUD) facade
//!
//! A `Session` owns the configuration and, while open, one engine connection.
//! Every facade method fails fast with `StoreError::Closed` when the session
//! is not open.
//!
//! Index and cursor methods live in [`crate::index`] and [`crate::cursor`] and
//! are only available when the engine's connection implements
//! [`IndexOps`](crate::engine::IndexOps) / [`CursorOps`](crate::engine::CursorOps).

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::join_all;

use crate::engine::{Connection, DeclaredIndexes, Engine, IndexInstaller, Record, StoreOps};
use crate::error::{Operation, StoreError, StoreResult};
use crate::key::{resolve_key_path, Key};
use crate::promise::{promisify_fixed, promisify_result};
use crate::schema::DatabaseConfig;
use crate::status::Status;

enum SessionState<C> {
    Closed,
    Open(Rc<C>),
}

/// A database session over an engine `E`.
///
/// ```rust,ignore
/// let session = Session::new(MemoryEngine::new(), config)?;
/// session.open().await?;
/// session.set("users", &json!({"id": 1, "name": "Ada"})).await?;
/// let ada = session.get("users", 1).await?;
/// session.close()?;
/// ```
pub struct Session<E: Engine> {
    engine: E,
    config: DatabaseConfig,
    state: RefCell<SessionState<E::Connection>>,
}

impl<E: Engine> Session<E> {
    /// Create a closed session. The configuration is validated here.
    pub fn new(engine: E, config: DatabaseConfig) -> StoreResult<Self> {
        config.validate()?;
        Ok(Self {
            engine,
            config,
            state: RefCell::new(SessionState::Closed),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Open(_))
    }

    /// Open the database, creating declared stores and their indexes.
    pub async fn open(&self) -> StoreResult<()> {
        self.open_with(DeclaredIndexes).await
    }

    /// Open the database, registering indexes of newly created stores
    /// through `installer`.
    pub async fn open_with(&self, installer: impl IndexInstaller + 'static) -> StoreResult<()> {
        if self.is_open() {
            return Err(StoreError::AlreadyOpen);
        }
        // Checked before any request is issued
        self.engine.check_supported()?;

        let connection = self
            .engine
            .open(&self.config, Rc::new(installer))
            .await
            .map_err(|err| match err {
                StoreError::NotSupported(_) | StoreError::Open(_) => err,
                other => StoreError::Open(other.to_string()),
            })?;

        let mut state = self.state.borrow_mut();
        if matches!(*state, SessionState::Open(_)) {
            // A concurrent open won while this one was pending
            connection.close();
            return Err(StoreError::AlreadyOpen);
        }
        *state = SessionState::Open(Rc::new(connection));

        tracing::info!(
            db = %self.config.name,
            version = self.config.version,
            stores = self.config.stores.len(),
            "database opened"
        );
        Ok(())
    }

    /// Release the connection. The session can be opened again afterwards.
    pub fn close(&self) -> StoreResult<()> {
        let previous = std::mem::replace(&mut *self.state.borrow_mut(), SessionState::Closed);
        match previous {
            SessionState::Open(connection) => {
                connection.close();
                tracing::info!(db = %self.config.name, "database closed");
                Ok(())
            }
            SessionState::Closed => Err(StoreError::Closed),
        }
    }

    /// Delete the whole database. Only allowed while the session is closed.
    pub async fn delete_database(&self) -> StoreResult<()> {
        if self.is_open() {
            return Err(StoreError::AlreadyOpen);
        }
        self.engine.check_supported()?;
        self.engine.delete_database(&self.config.name).await?;
        tracing::info!(db = %self.config.name, "database deleted");
        Ok(())
    }

    /// Stores present in the opened database.
    pub fn store_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.connection()?.store_names())
    }

    /// The live connection, or `Closed`.
    pub(crate) fn connection(&self) -> StoreResult<Rc<E::Connection>> {
        match &*self.state.borrow() {
            SessionState::Open(connection) => Ok(connection.clone()),
            SessionState::Closed => Err(StoreError::Closed),
        }
    }

    // ========================================================================
    // Store operations
    // ========================================================================

    /// Insert `value`, or update it if its key is already present.
    ///
    /// Resolves with `NoKeyField` (not an error) if `value` lacks the store's
    /// key field. The existence check and the write are separate requests and
    /// are not atomic.
    pub async fn set(&self, store: &str, value: &Record) -> StoreResult<Status> {
        let connection = self.connection()?;
        let decl = self
            .config
            .require_store(store)
            .map_err(|err| rejected(Status::InsertFailed, err))?;

        let Some(raw_key) = resolve_key_path(value, &decl.key) else {
            tracing::debug!(store, key_path = %decl.key, "record has no key field");
            return Ok(Status::NoKeyField);
        };
        let key = Key::from_value(raw_key).ok_or_else(|| {
            rejected(
                Status::InsertFailed,
                StoreError::InvalidKey(raw_key.to_string()),
            )
        })?;

        let existing = connection
            .get_all_keys(store)
            .await
            .map_err(|err| rejected(Status::InsertFailed, err))?;

        if existing.contains(&key) {
            tracing::debug!(store, ?key, "key exists, updating");
            return self.update(store, value).await;
        }

        tracing::debug!(store, ?key, "adding record");
        promisify_fixed(
            Operation::Set,
            connection.add(store, value),
            Status::InsertOk,
            Status::InsertFailed,
        )
        .await
    }

    /// `set` every value concurrently. Succeeds only if every record was
    /// written; individual failures are not reported.
    pub async fn set_batch(&self, store: &str, values: &[Record]) -> StoreResult<Status> {
        self.connection()?;

        let results = join_all(values.iter().map(|value| self.set(store, value))).await;
        let written = results
            .iter()
            .filter(|result| matches!(result, Ok(status) if status.is_success()))
            .count();

        tracing::debug!(store, written, total = values.len(), "batch settled");

        if written == values.len() {
            Ok(Status::BatchInsertOk)
        } else {
            Err(StoreError::Rejected {
                status: Status::BatchInsertFailed,
                reason: format!("{} of {} records failed", values.len() - written, values.len()),
            })
        }
    }

    /// Unconditional upsert keyed by the value's key field.
    pub async fn update(&self, store: &str, value: &Record) -> StoreResult<Status> {
        let connection = self.connection()?;
        promisify_fixed(
            Operation::Update,
            connection.put(store, value),
            Status::UpdateOk,
            Status::UpdateFailed,
        )
        .await
    }

    /// Fetch one record; `None` if absent or if the request failed.
    pub async fn get(&self, store: &str, key: impl Into<Key>) -> StoreResult<Option<Record>> {
        let connection = self.connection()?;
        let key = key.into();
        Ok(promisify_result(Operation::Get, connection.get(store, &key))
            .await
            .flatten())
    }

    pub async fn get_all(&self, store: &str) -> StoreResult<Option<Vec<Record>>> {
        let connection = self.connection()?;
        Ok(promisify_result(Operation::GetAll, connection.get_all(store)).await)
    }

    pub async fn get_all_keys(&self, store: &str) -> StoreResult<Option<Vec<Key>>> {
        let connection = self.connection()?;
        Ok(promisify_result(Operation::GetAllKeys, connection.get_all_keys(store)).await)
    }

    pub async fn count(&self, store: &str) -> StoreResult<Option<u32>> {
        let connection = self.connection()?;
        Ok(promisify_result(Operation::Count, connection.count(store)).await)
    }

    pub async fn remove(&self, store: &str, key: impl Into<Key>) -> StoreResult<Status> {
        let connection = self.connection()?;
        let key = key.into();
        promisify_fixed(
            Operation::Remove,
            connection.delete(store, &key),
            Status::DeleteOk,
            Status::DeleteFailed,
        )
        .await
    }

    pub async fn remove_all(&self, store: &str) -> StoreResult<Status> {
        let connection = self.connection()?;
        promisify_fixed(
            Operation::RemoveAll,
            connection.clear(store),
            Status::ClearOk,
            Status::ClearFailed,
        )
        .await
    }
}

fn rejected(status: Status, err: StoreError) -> StoreError {
    StoreError::Rejected {
        status,
        reason: err.to_string(),
    }
}
