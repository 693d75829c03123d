//! Key-value cache store shared by the registry, the change detector and the API.
//!
//! Writers always replace a key's whole value; there are no partial updates, so
//! concurrent refreshes resolve as last-writer-wins.

use crate::core::domain::error::{SwapperError, SwapperResult};
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use url::Url;

/// Storage backend holding JSON values under string keys.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> SwapperResult<Option<Value>>;

    /// Replaces the value stored under `key`.
    async fn set_raw(&self, key: &str, value: Value) -> SwapperResult<()>;

    async fn delete(&self, key: &str) -> SwapperResult<()>;
}

impl dyn KvStore {
    /// Reads and decodes `key`; `None` when the key was never written.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> SwapperResult<Option<T>> {
        match self.get_raw(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> SwapperResult<()> {
        let value = serde_json::to_value(value)?;
        self.set_raw(key, value).await
    }
}

/// Opens the store named by a `KV_URI`: `memory://`, or a redb file given as
/// `redb:///path/to/cache.redb` or `file:///path/to/cache.redb`.
pub async fn open_store(uri: &str) -> SwapperResult<Arc<dyn KvStore>> {
    if uri.starts_with("memory:") {
        info!("using in-memory cache store");
        return Ok(Arc::new(MemoryKvStore::new()));
    }

    let url = Url::parse(uri)
        .map_err(|e| SwapperError::Store(format!("Invalid store URI '{}': {}", uri, e)))?;
    let path = match url.scheme() {
        "file" => url
            .to_file_path()
            .map_err(|()| SwapperError::Store(format!("Invalid file path in '{}'", uri)))?,
        "redb" if !url.path().is_empty() => PathBuf::from(url.path()),
        scheme => {
            return Err(SwapperError::Store(format!(
                "Unsupported store scheme '{}'",
                scheme
            )));
        }
    };
    info!(path = %path.display(), "using redb cache store");
    Ok(Arc::new(RedbKvStore::open(path)?))
}

/// Process-local store; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    inner: RwLock<HashMap<String, Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get_raw(&self, key: &str) -> SwapperResult<Option<Value>> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set_raw(&self, key: &str, value: Value) -> SwapperResult<()> {
        self.inner.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> SwapperResult<()> {
        self.inner.write().await.remove(key);
        Ok(())
    }
}

const CACHE_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("swapper_cache");

/// Store backed by a redb database file; values are kept as JSON bytes.
#[derive(Clone)]
pub struct RedbKvStore {
    path: PathBuf,
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbKvStore").field("path", &self.path).finish()
    }
}

impl RedbKvStore {
    /// Opens `path`, creating the database and its table when missing.
    pub fn open(path: impl Into<PathBuf>) -> SwapperResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SwapperError::Store(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let db = Database::create(&path)?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CACHE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            path,
            db: Arc::new(db),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn join_error(e: tokio::task::JoinError) -> SwapperError {
    SwapperError::Store(format!("Cache task failed: {}", e))
}

#[async_trait]
impl KvStore for RedbKvStore {
    async fn get_raw(&self, key: &str) -> SwapperResult<Option<Value>> {
        let db = self.db.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let read_txn = db.begin_read()?;
            let table = read_txn.open_table(CACHE_TABLE)?;
            match table.get(key.as_str())? {
                Some(bytes) => Ok(Some(serde_json::from_slice(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(join_error)?
    }

    async fn set_raw(&self, key: &str, value: Value) -> SwapperResult<()> {
        let db = self.db.clone();
        let key = key.to_string();
        let bytes = serde_json::to_vec(&value)?;

        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(CACHE_TABLE)?;
                table.insert(key.as_str(), bytes.as_slice())?;
            }
            write_txn.commit()?;
            debug!(key = %key, "cache key written");
            Ok(())
        })
        .await
        .map_err(join_error)?
    }

    async fn delete(&self, key: &str) -> SwapperResult<()> {
        let db = self.db.clone();
        let key = key.to_string();

        tokio::task::spawn_blocking(move || {
            let write_txn = db.begin_write()?;
            {
                let mut table = write_txn.open_table(CACHE_TABLE)?;
                table.remove(key.as_str())?;
            }
            write_txn.commit()?;
            Ok(())
        })
        .await
        .map_err(join_error)?
    }
}
