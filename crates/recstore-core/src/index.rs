//! Index facade: reads scoped through a named secondary index
//!
//! Every method issues one read-only index request. Failures (unknown index,
//! engine errors) resolve to `None`, the same as a missing record.

use crate::engine::{Engine, IndexOps, Record};
use crate::error::{Operation, StoreResult};
use crate::key::{Key, KeyRange};
use crate::promise::promisify_result;
use crate::session::Session;

impl<E> Session<E>
where
    E: Engine,
    E::Connection: IndexOps,
{
    /// First record whose `index` value matches `query`.
    pub async fn get_by_index(
        &self,
        store: &str,
        index: &str,
        query: impl Into<KeyRange>,
    ) -> StoreResult<Option<Record>> {
        let connection = self.connection()?;
        let query = query.into();
        tracing::debug!(store, index, "index get");
        Ok(promisify_result(
            Operation::GetByIndex,
            connection.index_get(store, index, &query),
        )
        .await
        .flatten())
    }

    /// Number of index entries matching `query`.
    pub async fn get_count_by_index(
        &self,
        store: &str,
        index: &str,
        query: impl Into<KeyRange>,
    ) -> StoreResult<Option<u32>> {
        let connection = self.connection()?;
        let query = query.into();
        tracing::debug!(store, index, "index count");
        Ok(promisify_result(
            Operation::GetCountByIndex,
            connection.index_count(store, index, &query),
        )
        .await)
    }

    pub async fn get_all_by_index(
        &self,
        store: &str,
        index: &str,
        query: impl Into<KeyRange>,
    ) -> StoreResult<Option<Vec<Record>>> {
        let connection = self.connection()?;
        let query = query.into();
        tracing::debug!(store, index, "index get all");
        Ok(promisify_result(
            Operation::GetAllByIndex,
            connection.index_get_all(store, index, &query),
        )
        .await)
    }

    /// Primary keys of the records matching `query`, in index order.
    pub async fn get_all_keys_by_index(
        &self,
        store: &str,
        index: &str,
        query: impl Into<KeyRange>,
    ) -> StoreResult<Option<Vec<Key>>> {
        let connection = self.connection()?;
        let query = query.into();
        tracing::debug!(store, index, "index get all keys");
        Ok(promisify_result(
            Operation::GetAllKeysByIndex,
            connection.index_get_all_keys(store, index, &query),
        )
        .await)
    }

    /// Primary key of the first record matching `query`.
    pub async fn get_key_by_index(
        &self,
        store: &str,
        index: &str,
        query: impl Into<KeyRange>,
    ) -> StoreResult<Option<Key>> {
        let connection = self.connection()?;
        let query = query.into();
        tracing::debug!(store, index, "index get key");
        Ok(promisify_result(
            Operation::GetKeyByIndex,
            connection.index_get_key(store, index, &query),
        )
        .await
        .flatten())
    }
}
