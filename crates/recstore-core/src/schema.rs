//! Database configuration: stores, primary key paths and index declarations
//!
//! Field names serialize in camelCase so the same configuration can be
//! written by JavaScript callers:
//!
//! ```json
//! {
//!   "name": "app",
//!   "version": 1,
//!   "stores": [
//!     {
//!       "name": "users",
//!       "key": "id",
//!       "indexList": [
//!         {"indexName": "by_email", "keyPath": "email", "objectParameters": {"unique": true}}
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

fn default_version() -> u32 {
    1
}

/// A named, versioned database and the stores it declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub stores: Vec<StoreDecl>,
}

impl DatabaseConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            stores: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_store(mut self, store: StoreDecl) -> Self {
        self.stores.push(store);
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let config: DatabaseConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Look up a store declaration by name.
    pub fn store(&self, name: &str) -> Option<&StoreDecl> {
        self.stores.iter().find(|s| s.name == name)
    }

    /// Like [`store`](Self::store), but fails with `UnknownStore`.
    pub fn require_store(&self, name: &str) -> StoreResult<&StoreDecl> {
        self.store(name)
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.name.is_empty() {
            return Err(StoreError::Config("database name is empty".into()));
        }
        if self.version == 0 {
            return Err(StoreError::Config("database version must be >= 1".into()));
        }

        let mut seen = HashSet::new();
        for store in &self.stores {
            store.validate()?;
            if !seen.insert(store.name.as_str()) {
                return Err(StoreError::Config(format!(
                    "store '{}' declared twice",
                    store.name
                )));
            }
        }
        Ok(())
    }
}

/// A record store: name, primary key path and its secondary indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDecl {
    pub name: String,
    /// Key path of the primary key inside each record.
    pub key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub index_list: Vec<IndexDecl>,
}

impl StoreDecl {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            index_list: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: IndexDecl) -> Self {
        self.index_list.push(index);
        self
    }

    pub fn find_index(&self, name: &str) -> Option<&IndexDecl> {
        self.index_list.iter().find(|i| i.index_name == name)
    }

    fn validate(&self) -> StoreResult<()> {
        if self.name.is_empty() {
            return Err(StoreError::Config("store name is empty".into()));
        }
        if self.key.is_empty() {
            return Err(StoreError::Config(format!(
                "store '{}' has an empty key path",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for index in &self.index_list {
            if index.index_name.is_empty() || index.key_path.is_empty() {
                return Err(StoreError::Config(format!(
                    "store '{}' has an index with an empty name or key path",
                    self.name
                )));
            }
            if !seen.insert(index.index_name.as_str()) {
                return Err(StoreError::Config(format!(
                    "index '{}' declared twice on store '{}'",
                    index.index_name, self.name
                )));
            }
        }
        Ok(())
    }
}

/// A secondary index over one key path of a store's records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDecl {
    pub index_name: String,
    pub key_path: String,
    #[serde(default)]
    pub object_parameters: IndexParameters,
}

impl IndexDecl {
    pub fn new(index_name: impl Into<String>, key_path: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            key_path: key_path.into(),
            object_parameters: IndexParameters::default(),
        }
    }

    /// Reject records whose indexed value is already taken by another record.
    pub fn unique(mut self) -> Self {
        self.object_parameters.unique = true;
        self
    }

    /// Index each element of an array-valued key path separately.
    pub fn multi_entry(mut self) -> Self {
        self.object_parameters.multi_entry = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexParameters {
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub multi_entry: bool,
}
