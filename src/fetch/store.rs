//! Key-value stores backing the durable cache

use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::debug;

use crate::{PaddockError, Result};

const ENTRY_EXTENSION: &str = "json";

/// Makes staging file names unique within this process; the pid covers other processes.
static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Persistent string key-value storage.
///
/// Mirrors the async-storage contract the cache was designed around: single-key
/// get/set, key enumeration, and bulk removal.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Returns `Ok(None)` when the key is absent.
    async fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Insert or replace the value for `key`.
    async fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// All keys currently stored, in no particular order.
    async fn get_all_keys(&self) -> Result<Vec<String>>;

    /// Remove every listed key. Missing keys are ignored.
    async fn multi_remove(&self, keys: &[String]) -> Result<()>;
}

/// In-process store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.get(key).map(|value| value.clone()))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        Ok(self.items.iter().map(|entry| entry.key().clone()).collect())
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            self.items.remove(key);
        }
        Ok(())
    }
}

/// Directory-backed store, one file per key.
///
/// File names are the hex encoding of the key, so arbitrary fingerprints map to
/// portable names. Writes go through a temporary file and a rename.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|e| {
            PaddockError::cache("open", format!("{}: {}", root.display(), e))
        })?;
        debug!(root = %root.display(), "Opened file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.{}", encode_key(key), ENTRY_EXTENSION))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PaddockError::cache("read", format!("{}: {}", key, e))),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let target = self.path_for(key);
        let staging = target.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            STAGING_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&staging, value)
            .await
            .map_err(|e| PaddockError::cache("write", format!("{}: {}", key, e)))?;
        if let Err(e) = fs::rename(&staging, &target).await {
            let _ = fs::remove_file(&staging).await;
            return Err(PaddockError::cache("write", format!("{}: {}", key, e)));
        }
        Ok(())
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| PaddockError::cache("list", e.to_string()))?;

        let mut keys = Vec::new();
        while let Some(entry) =
            entries.next_entry().await.map_err(|e| PaddockError::cache("list", e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(key) = path.file_stem().and_then(|stem| stem.to_str()).and_then(decode_key)
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    async fn multi_remove(&self, keys: &[String]) -> Result<()> {
        for key in keys {
            match fs::remove_file(self.path_for(key)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(PaddockError::cache("remove", format!("{}: {}", key, e))),
            }
        }
        Ok(())
    }
}

fn encode_key(key: &str) -> String {
    key.bytes().map(|b| format!("{:02x}", b)).collect()
}

fn decode_key(encoded: &str) -> Option<String> {
    if encoded.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..encoded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(encoded.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}
