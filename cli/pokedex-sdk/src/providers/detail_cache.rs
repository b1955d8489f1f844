//! Two-tier cache of the card fields derived from entity details.
//!
//! The in-memory tier is authoritative while the process runs.
//! The durable tier is a single JSON snapshot of the whole map,
//! read once when the cache is opened and rewritten after every mutation.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use pokedex_catalog::{ClientTrait, EntityDetail, EntityId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::utils::errors::display_chain;
use crate::utils::single_flight::SingleFlight;

/// File name of the durable snapshot inside the cache directory.
pub const DETAIL_CACHE_FILE_NAME: &str = "detail-cache.json";

#[derive(Debug, Error)]
pub enum DetailCacheError {
    #[error("failed to read detail cache")]
    Read(#[source] std::io::Error),
    #[error("failed to write detail cache")]
    Write(#[source] std::io::Error),
    #[error("failed to parse detail cache")]
    Deserialize(#[source] serde_json::Error),
    #[error("failed to serialize detail cache")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to move detail cache into place")]
    Persist(#[source] tempfile::PersistError),
    #[error("failed to create cache directory '{}'", .0.display())]
    CreateDir(PathBuf, #[source] std::io::Error),
}

/// Card fields derived from an [EntityDetail].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedCacheEntry {
    pub image_ref: Option<Url>,
    pub types: Option<Vec<String>>,
}

impl DerivedCacheEntry {
    pub fn from_detail(detail: &EntityDetail) -> Self {
        Self {
            image_ref: detail.image_ref(),
            types: Some(detail.type_names()),
        }
    }

    /// Complete entries are never fetched again.
    pub fn is_complete(&self) -> bool {
        self.image_ref.is_some() && self.types.is_some()
    }

    /// Fields of `newer` win, missing ones are kept from `self`.
    pub fn merge(self, newer: DerivedCacheEntry) -> DerivedCacheEntry {
        DerivedCacheEntry {
            image_ref: newer.image_ref.or(self.image_ref),
            types: newer.types.or(self.types),
        }
    }
}

/// On-disk representation of the whole cache.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CacheSnapshot {
    #[serde(rename = "spriteURLByID", default)]
    pub image_refs: BTreeMap<String, String>,
    #[serde(rename = "typesByID", default)]
    pub types: BTreeMap<String, Vec<String>>,
}

impl CacheSnapshot {
    fn from_entries(entries: &HashMap<EntityId, DerivedCacheEntry>) -> Self {
        let mut snapshot = CacheSnapshot::default();
        for (id, entry) in entries {
            if let Some(image_ref) = &entry.image_ref {
                snapshot
                    .image_refs
                    .insert(id.to_string(), image_ref.to_string());
            }
            if let Some(types) = &entry.types {
                snapshot.types.insert(id.to_string(), types.clone());
            }
        }
        snapshot
    }

    /// Keys that are not entity ids and unparsable URLs are skipped.
    fn into_entries(self) -> HashMap<EntityId, DerivedCacheEntry> {
        let mut entries: HashMap<EntityId, DerivedCacheEntry> = HashMap::new();

        for (key, raw_url) in self.image_refs {
            let Ok(id) = key.parse::<EntityId>() else {
                debug!(key, "skipping cached image with invalid id");
                continue;
            };
            let Ok(image_ref) = Url::parse(&raw_url) else {
                debug!(%id, raw_url, "skipping cached image with invalid url");
                continue;
            };
            entries.entry(id).or_default().image_ref = Some(image_ref);
        }

        for (key, types) in self.types {
            let Ok(id) = key.parse::<EntityId>() else {
                debug!(key, "skipping cached types with invalid id");
                continue;
            };
            entries.entry(id).or_default().types = Some(types);
        }

        entries
    }
}

/// Read the snapshot at `path`, [None] if there is no file yet.
pub fn read_snapshot(path: &Path) -> Result<Option<CacheSnapshot>, DetailCacheError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DetailCacheError::Read(e)),
    };

    let snapshot = serde_json::from_str(&contents).map_err(DetailCacheError::Deserialize)?;
    Ok(Some(snapshot))
}

/// Atomically replace the snapshot at `path`.
///
/// The snapshot is written to a temporary file next to `path` and renamed
/// into place, so readers never observe a partial file.
pub fn write_snapshot(path: &Path, snapshot: &CacheSnapshot) -> Result<(), DetailCacheError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| DetailCacheError::CreateDir(dir.to_path_buf(), e))?;

    let contents = serde_json::to_string_pretty(snapshot).map_err(DetailCacheError::Serialize)?;

    let mut temp_file = tempfile::Builder::new()
        .prefix(".detail-cache")
        .tempfile_in(dir)
        .map_err(DetailCacheError::Write)?;
    temp_file
        .write_all(contents.as_bytes())
        .map_err(DetailCacheError::Write)?;
    temp_file.persist(path).map_err(DetailCacheError::Persist)?;

    Ok(())
}

struct CacheInner<C> {
    client: Arc<C>,
    path: PathBuf,
    entries: Mutex<HashMap<EntityId, DerivedCacheEntry>>,
    flights: SingleFlight<EntityId, Option<DerivedCacheEntry>>,
    /// Serializes snapshot writes so the newest map is written last.
    persist_lock: tokio::sync::Mutex<()>,
}

impl<C> CacheInner<C> {
    fn entries(&self) -> MutexGuard<'_, HashMap<EntityId, DerivedCacheEntry>> {
        self.entries.lock().expect("detail cache mutex poisoned")
    }
}

/// Cache of [DerivedCacheEntry] by entity id, backed by a snapshot file.
///
/// Concurrent [DetailCache::ensure] calls for the same id share one detail
/// fetch. Cloning the cache is cheap and clones share the same state.
pub struct DetailCache<C> {
    inner: Arc<CacheInner<C>>,
}

impl<C> Clone for DetailCache<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> std::fmt::Debug for DetailCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetailCache")
            .field("path", &self.inner.path)
            .field("entries", &self.inner.entries().len())
            .finish_non_exhaustive()
    }
}

impl<C> DetailCache<C>
where
    C: ClientTrait + 'static,
{
    /// An empty cache persisting to `path`.
    pub fn new(client: Arc<C>, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                client,
                path: path.into(),
                entries: Mutex::new(HashMap::new()),
                flights: SingleFlight::new(),
                persist_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Open the cache at `path`, loading the durable tier if present.
    pub fn load(client: Arc<C>, path: impl Into<PathBuf>) -> Self {
        let cache = Self::new(client, path);
        cache.reload();
        cache
    }

    /// Replace the in-memory tier with the contents of the snapshot file.
    ///
    /// A missing file is expected on first run and leaves the cache empty.
    /// Any other failure is logged and also leaves the cache empty.
    pub fn reload(&self) {
        let path = &self.inner.path;
        let entries = match read_snapshot(path) {
            Ok(Some(snapshot)) => snapshot.into_entries(),
            Ok(None) => {
                debug!(?path, "no detail cache snapshot yet");
                HashMap::new()
            },
            Err(e) => {
                warn!(?path, "ignoring detail cache: {}", display_chain(&e));
                HashMap::new()
            },
        };

        debug!(?path, entries = entries.len(), "loaded detail cache");
        *self.inner.entries() = entries;
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// In-memory lookup, never fetches.
    pub fn get(&self, id: EntityId) -> Option<DerivedCacheEntry> {
        self.inner.entries().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make sure the entry for `id` is populated.
    ///
    /// Returns `true` without a network call if the entry is already
    /// complete. Otherwise fetches the detail, stores the derived fields and
    /// persists the cache. Returns `false` if the fetch failed, in which case
    /// the cache is unchanged.
    pub async fn ensure(&self, id: EntityId) -> bool {
        self.ensure_entry(id).await.is_some()
    }

    /// Like [Self::ensure], returning the entry.
    #[instrument(skip_all, fields(%id))]
    pub async fn ensure_entry(&self, id: EntityId) -> Option<DerivedCacheEntry> {
        if let Some(entry) = self.get(id).filter(DerivedCacheEntry::is_complete) {
            debug!("detail cache hit");
            return Some(entry);
        }

        let inner = Arc::clone(&self.inner);
        self.inner
            .flights
            .run(id, move || fetch_and_store(inner, id).boxed())
            .await
    }

    /// Write the whole in-memory tier to the snapshot file.
    ///
    /// Failures are logged, the next session will refetch what is missing.
    pub async fn persist(&self) {
        persist(&self.inner).await
    }
}

async fn fetch_and_store<C>(inner: Arc<CacheInner<C>>, id: EntityId) -> Option<DerivedCacheEntry>
where
    C: ClientTrait + 'static,
{
    // completed by a flight that ended while this one was being started
    if let Some(entry) = inner.entries().get(&id).filter(|e| e.is_complete()) {
        return Some(entry.clone());
    }

    let detail = match inner.client.fetch_detail(id).await {
        Ok(detail) => detail,
        Err(e) => {
            debug!(%id, "could not fetch detail: {}", display_chain(&e));
            return None;
        },
    };

    let entry = {
        let mut entries = inner.entries();
        let merged = entries
            .remove(&id)
            .unwrap_or_default()
            .merge(DerivedCacheEntry::from_detail(&detail));
        entries.insert(id, merged.clone());
        merged
    };
    debug!(%id, complete = entry.is_complete(), "stored derived detail");

    persist(&inner).await;
    Some(entry)
}

async fn persist<C>(inner: &CacheInner<C>) {
    let _persisting = inner.persist_lock.lock().await;

    let snapshot = CacheSnapshot::from_entries(&inner.entries());
    let path = inner.path.clone();

    let result = tokio::task::spawn_blocking(move || write_snapshot(&path, &snapshot)).await;
    match result {
        Ok(Ok(())) => debug!(path = ?inner.path, "persisted detail cache"),
        Ok(Err(e)) => warn!(path = ?inner.path, "{}", display_chain(&e)),
        Err(e) => warn!(path = ?inner.path, "detail cache writer did not complete: {e}"),
    }
}
