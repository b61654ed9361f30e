//! The Credential Store: the process-wide owner of the access/refresh token pair.
//!
//! Storage is read once when the store is loaded. After that `get` is answered from memory and
//! `set`/`clear` write through to the durable [`KeyValueStore`].

use crate::error::{ErrorType, IntoResult, Res};
use crate::{utils, Result};
use anyhow::Context;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

pub(crate) const ACCESS_TOKEN: &str = "access_token";
pub(crate) const REFRESH_TOKEN: &str = "refresh_token";

/// Durable string-to-string storage.
#[async_trait::async_trait]
pub(crate) trait KeyValueStore: Send + Sync {
    async fn load(&self) -> Res<BTreeMap<String, String>>;
    async fn save(&self, entries: &BTreeMap<String, String>) -> Res<()>;
}

/// A JSON object on disk. A missing file is an empty store.
pub(crate) struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl KeyValueStore for FileStore {
    async fn load(&self) -> Res<BTreeMap<String, String>> {
        match utils::read_optional(&self.path).await? {
            None => Ok(BTreeMap::new()),
            Some(s) if s.trim().is_empty() => Ok(BTreeMap::new()),
            Some(s) => serde_json::from_str(&s).with_context(|| {
                format!("Unable to parse the storage file {}", self.path.display())
            }),
        }
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> Res<()> {
        if let Some(parent) = self.path.parent() {
            utils::make_dir(parent).await?;
        }
        let data = serde_json::to_string_pretty(entries).context("Unable to serialize storage")?;
        utils::write_private(&self.path, data).await
    }
}

/// Storage that lives only as long as the process.
#[derive(Default)]
pub(crate) struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self) -> Res<BTreeMap<String, String>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    async fn save(&self, entries: &BTreeMap<String, String>) -> Res<()> {
        *self.entries.lock().unwrap_or_else(PoisonError::into_inner) = entries.clone();
        Ok(())
    }
}

/// The access and refresh tokens. They are always stored and cleared together.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub access: String,
    pub refresh: String,
}

impl CredentialPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

// Tokens must never end up in a log line.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access", &"<redacted>")
            .field("refresh", &"<redacted>")
            .finish()
    }
}

/// Shared handle to the credential pair. Clones share the same cache and storage.
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn KeyValueStore>,
    cache: Arc<Mutex<BTreeMap<String, String>>>,
}

impl CredentialStore {
    /// Reads the storage file at `path`. This is the only time storage is read.
    pub async fn open(path: &Path) -> Result<Self> {
        Self::load(Arc::new(FileStore::new(path)))
            .await
            .pub_result(ErrorType::Storage)
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            storage: Arc::new(MemoryStore::default()),
            cache: Arc::default(),
        }
    }

    pub(crate) async fn load(storage: Arc<dyn KeyValueStore>) -> Res<Self> {
        let entries = storage
            .load()
            .await
            .context("Unable to read the credential storage")?;
        debug!("Loaded credential storage with {} entries", entries.len());
        Ok(Self {
            storage,
            cache: Arc::new(Mutex::new(entries)),
        })
    }

    /// Returns the pair, or `None` unless both tokens are present.
    pub fn get(&self) -> Option<CredentialPair> {
        let cache = self.lock();
        let access = cache.get(ACCESS_TOKEN)?;
        let refresh = cache.get(REFRESH_TOKEN)?;
        Some(CredentialPair::new(access, refresh))
    }

    /// The bearer token attached to outbound requests.
    pub fn access_token(&self) -> Option<String> {
        self.lock().get(ACCESS_TOKEN).cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    pub async fn set(&self, pair: CredentialPair) -> Result<()> {
        let snapshot = {
            let mut cache = self.lock();
            cache.insert(ACCESS_TOKEN.to_string(), pair.access);
            cache.insert(REFRESH_TOKEN.to_string(), pair.refresh);
            cache.clone()
        };
        self.persist(snapshot).await
    }

    /// Removes both tokens. Clearing an empty store is not an error.
    pub async fn clear(&self) -> Result<()> {
        let snapshot = {
            let mut cache = self.lock();
            let removed_access = cache.remove(ACCESS_TOKEN).is_some();
            let removed_refresh = cache.remove(REFRESH_TOKEN).is_some();
            if !removed_access && !removed_refresh {
                return Ok(());
            }
            cache.clone()
        };
        self.persist(snapshot).await
    }

    async fn persist(&self, snapshot: BTreeMap<String, String>) -> Result<()> {
        self.storage
            .save(&snapshot)
            .await
            .context("Unable to write the credential storage")
            .pub_result(ErrorType::Storage)
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
