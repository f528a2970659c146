use crate::error::{storage_error, AppResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Raw key/value persistence under the store's flat key namespace
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Read the JSON text stored under `key`
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Replace the JSON text stored under `key`
    async fn set(&self, key: &str, value: String) -> AppResult<()>;

    /// Remove `key`; missing keys are not an error
    async fn remove(&self, key: &str) -> AppResult<()>;
}

/// In-process backend, lost on restart
#[derive(Default)]
pub struct MemoryBackend {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside a data directory
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Create the backend, creating the directory if needed
    pub async fn new(dir: impl AsRef<Path>) -> AppResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        info!("File store at {}", dir.display());
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> AppResult<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(storage_error(&format!("Invalid store key: {}", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        let path = self.path_for(key)?;
        // Write-then-rename so a crash never leaves a truncated file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Wrote store key {}", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Redis keys under a fixed prefix
pub struct RedisBackend {
    connection: ConnectionManager,
    prefix: String,
}

impl RedisBackend {
    pub const DEFAULT_PREFIX: &'static str = "agendavoz:";

    /// Connect to Redis and keep a managed, auto-reconnecting connection
    pub async fn connect(redis_url: &str) -> AppResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Connected to Redis store at {}", redis_url);
        Ok(Self {
            connection,
            prefix: Self::DEFAULT_PREFIX.to_string(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl StorageBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(self.full_key(key)).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.set(self.full_key(key), value).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(self.full_key(key)).await?;
        Ok(())
    }
}
