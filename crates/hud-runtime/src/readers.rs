//! Cached, file-backed snapshots of auxiliary JSON documents.
//!
//! A [`CachedReader`] owns one document path. The first read parses and
//! validates it into a typed snapshot which is then served from cache until
//! [`CachedReader::force_refresh`] (or the optional TTL) says otherwise.
//!
//! Failures never clear data: a read that fails keeps the last good
//! snapshot and reports the error alongside it. A missing file is not an
//! error; it simply has no data.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use hud_core::{HudConfig, SettingsSnapshot, SnapshotError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// Snapshot Trait
// ============================================================================

/// A typed view of one JSON document.
pub trait Snapshot: Sized + Clone {
    /// Document name used in diagnostics.
    const DOCUMENT: &'static str;

    fn from_json(value: &Value) -> Result<Self, SnapshotError>;
}

impl Snapshot for HudConfig {
    const DOCUMENT: &'static str = "config";

    fn from_json(value: &Value) -> Result<Self, SnapshotError> {
        HudConfig::from_value(value)
    }
}

impl Snapshot for SettingsSnapshot {
    const DOCUMENT: &'static str = "settings";

    fn from_json(value: &Value) -> Result<Self, SnapshotError> {
        SettingsSnapshot::from_value(value)
    }
}

// ============================================================================
// Errors & Status
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    #[error("Failed to read {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Invalid JSON in {path}: {reason}")]
    InvalidJson { path: String, reason: String },

    #[error("Invalid document {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Data and error side by side.
///
/// `data` is the best snapshot available, possibly stale when `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadStatus<T> {
    pub data: Option<T>,
    pub error: Option<ReaderError>,
}

impl<T> ReadStatus<T> {
    pub fn empty() -> Self {
        Self {
            data: None,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl<T> Default for ReadStatus<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Outcome of loading a document once, before merging with the cache.
enum Loaded<T> {
    Missing,
    Data(T),
    Failed(ReaderError),
}

fn decode<T: Snapshot>(path: &Path, read: io::Result<String>) -> Loaded<T> {
    let display = path.display().to_string();
    let text = match read {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Loaded::Missing,
        Err(e) => {
            return Loaded::Failed(ReaderError::Io {
                path: display,
                reason: e.to_string(),
            })
        }
    };
    let value: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(e) => {
            return Loaded::Failed(ReaderError::InvalidJson {
                path: display,
                reason: e.to_string(),
            })
        }
    };
    match T::from_json(&value) {
        Ok(snapshot) => Loaded::Data(snapshot),
        Err(e) => Loaded::Failed(ReaderError::Invalid {
            path: display,
            reason: e.to_string(),
        }),
    }
}

/// Reads and validates a document once, without caching.
pub fn read_snapshot<T: Snapshot>(path: &Path) -> ReadStatus<T> {
    merge(None, decode(path, std::fs::read_to_string(path)))
}

/// Async form of [`read_snapshot`].
pub async fn read_snapshot_async<T: Snapshot>(path: &Path) -> ReadStatus<T> {
    merge(None, decode(path, tokio::fs::read_to_string(path).await))
}

fn merge<T>(previous: Option<T>, loaded: Loaded<T>) -> ReadStatus<T> {
    match loaded {
        Loaded::Missing => ReadStatus::empty(),
        Loaded::Data(data) => ReadStatus {
            data: Some(data),
            error: None,
        },
        Loaded::Failed(error) => ReadStatus {
            data: previous,
            error: Some(error),
        },
    }
}

// ============================================================================
// Cached Reader
// ============================================================================

struct CacheEntry<T> {
    status: ReadStatus<T>,
    loaded_at: Instant,
}

/// Owns one document and its cached snapshot.
pub struct CachedReader<T> {
    path: PathBuf,
    ttl: Option<Duration>,
    cache: Option<CacheEntry<T>>,
    /// The last load found no file.
    was_missing: bool,
}

pub type ConfigReader = CachedReader<HudConfig>;
pub type SettingsReader = CachedReader<SettingsSnapshot>;

impl<T: Snapshot> CachedReader<T> {
    /// Reader that caches until an explicit refresh.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ttl: None,
            cache: None,
            was_missing: false,
        }
    }

    /// Also reloads once the cached snapshot is older than `ttl`.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cached(&self) -> Option<&ReadStatus<T>> {
        let entry = self.cache.as_ref()?;
        match self.ttl {
            Some(ttl) if entry.loaded_at.elapsed() >= ttl => None,
            _ => Some(&entry.status),
        }
    }

    fn store(&mut self, loaded: Loaded<T>) -> ReadStatus<T> {
        let previous = self
            .cache
            .take()
            .and_then(|entry| entry.status.data);
        // a single missing read keeps the snapshot (atomic saves rename over the file)
        let status = match loaded {
            Loaded::Missing if previous.is_some() && !self.was_missing => {
                self.was_missing = true;
                debug!(document = T::DOCUMENT, "Document missing, keeping last snapshot");
                ReadStatus {
                    data: previous,
                    error: None,
                }
            }
            loaded => {
                self.was_missing = matches!(loaded, Loaded::Missing);
                merge(previous, loaded)
            }
        };
        if let Some(error) = &status.error {
            warn!(document = T::DOCUMENT, error = %error, "Snapshot read failed");
        } else {
            debug!(
                document = T::DOCUMENT,
                path = %self.path.display(),
                present = status.data.is_some(),
                "Snapshot loaded"
            );
        }
        self.cache = Some(CacheEntry {
            status: status.clone(),
            loaded_at: Instant::now(),
        });
        status
    }

    // ------------------------------------------------------------------------
    // Synchronous access
    // ------------------------------------------------------------------------

    pub fn read(&mut self) -> Option<T> {
        self.read_with_status().data
    }

    pub fn read_with_status(&mut self) -> ReadStatus<T> {
        if let Some(status) = self.cached() {
            return status.clone();
        }
        self.force_refresh_with_status()
    }

    pub fn force_refresh(&mut self) -> Option<T> {
        self.force_refresh_with_status().data
    }

    pub fn force_refresh_with_status(&mut self) -> ReadStatus<T> {
        let loaded = decode(&self.path, std::fs::read_to_string(&self.path));
        self.store(loaded)
    }

    // ------------------------------------------------------------------------
    // Asynchronous access
    // ------------------------------------------------------------------------

    pub async fn read_async(&mut self) -> Option<T> {
        self.read_with_status_async().await.data
    }

    pub async fn read_with_status_async(&mut self) -> ReadStatus<T> {
        if let Some(status) = self.cached() {
            return status.clone();
        }
        self.force_refresh_with_status_async().await
    }

    pub async fn force_refresh_async(&mut self) -> Option<T> {
        self.force_refresh_with_status_async().await.data
    }

    pub async fn force_refresh_with_status_async(&mut self) -> ReadStatus<T> {
        let loaded = decode(&self.path, tokio::fs::read_to_string(&self.path).await);
        self.store(loaded)
    }

    /// Drops the cached snapshot; the next read goes to disk.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }
}
