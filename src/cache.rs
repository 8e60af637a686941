//! Download-attempt cache.
//!
//! Fetching a candidate URL is expensive and side-effecting, and a URL that
//! validated as "not an image" yesterday is still not an image today. This
//! module memoizes the outcome of every attempt by URL so repeat runs skip
//! straight past known-bad candidates and recognize already-collected ones
//! without re-requesting anything.
//!
//! # Design
//!
//! Two capabilities, composed by delegation:
//!
//! - [`CacheFile`] is the store: a versioned JSON document on disk. Reads
//!   are tolerant — a missing, truncated, corrupt, or version-mismatched
//!   file loads as an empty mapping, never an error. Writes stage to a
//!   temp file and rename over the target so a crash mid-write leaves the
//!   previous version intact.
//! - [`DownloadCache`] is the memoizer: a lazily loaded URL →
//!   [`DownloadRecord`] map with dirty tracking.
//!   [`get_or_fetch`](DownloadCache::get_or_fetch) is the memoized call;
//!   [`persist`](DownloadCache::persist) flushes only when something
//!   changed.
//!
//! The cache distinguishes "permanently known-bad" (an invalid record)
//! from "not yet attempted" (no record). Transient transport failures are
//! deliberately never recorded (see the resolver) so that distinction
//! stays meaningful across the lifetime of the file.
//!
//! One process at a time is assumed. Concurrent runs don't corrupt the
//! file (writes are whole-document and atomic) but interleave as
//! last-writer-wins at persist time; there is no file lock.
//!
//! ## Scoped save
//!
//! A collection run mutates the cache at several points and must flush
//! exactly once at the end, on both success and failure paths.
//! [`DownloadCache::saving`] wraps the run and guarantees the flush.
//!
//! ## Clearing
//!
//! [`reinitialize`](DownloadCache::reinitialize) empties both the file and
//! memory — the `clear` subcommand's half of the cache lifecycle.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, error};

/// Version of the cache file format. Bump to invalidate existing caches
/// when the record shape changes.
const CACHE_VERSION: u32 = 1;

/// Memoized outcome of one download attempt.
///
/// Created once per unique URL the first time it is fetched; later lookups
/// return the stored record without re-fetching, unless evicted. `path` is
/// present exactly when the record is not `invalid`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct DownloadRecord {
    pub url: String,
    /// Epoch seconds captured when the attempt ran.
    pub timestamp: u64,
    pub invalid: bool,
    /// Short reason or status ("downloaded", "not an image", ...).
    pub message: String,
    pub path: Option<PathBuf>,
}

impl DownloadRecord {
    /// Record a usable image saved at `path`.
    pub fn valid(url: &str, message: &str, path: PathBuf) -> Self {
        Self {
            url: url.to_string(),
            timestamp: epoch_seconds(),
            invalid: false,
            message: message.to_string(),
            path: Some(path),
        }
    }

    /// Record a candidate rejected by validation.
    pub fn invalid(url: &str, message: &str) -> Self {
        Self {
            url: url.to_string(),
            timestamp: epoch_seconds(),
            invalid: true,
            message: message.to_string(),
            path: None,
        }
    }
}

fn epoch_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Serialized form of the cache file.
#[derive(serde::Deserialize)]
struct Snapshot {
    version: u32,
    entries: HashMap<String, DownloadRecord>,
}

/// Borrowing twin of [`Snapshot`] for writes.
#[derive(serde::Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    entries: &'a HashMap<String, DownloadRecord>,
}

/// On-disk store for download records.
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored mapping. Returns an empty mapping if the file is
    /// missing or can't be parsed (truncation, corruption, version
    /// mismatch) — never an error for those cases.
    pub fn read(&self) -> HashMap<String, DownloadRecord> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return HashMap::new(),
        };
        let snapshot: Snapshot = match serde_json::from_str(&content) {
            Ok(s) => s,
            Err(_) => return HashMap::new(),
        };
        if snapshot.version != CACHE_VERSION {
            return HashMap::new();
        }
        snapshot.entries
    }

    /// Write the full mapping, staged through a temp file in the same
    /// directory so the previous version survives a crash mid-write.
    pub fn write(&self, entries: &HashMap<String, DownloadRecord>) -> io::Result<()> {
        let json = serde_json::to_string_pretty(&SnapshotRef {
            version: CACHE_VERSION,
            entries,
        })?;
        let staged = self.path.with_extension("tmp");
        std::fs::write(&staged, json)?;
        std::fs::rename(&staged, &self.path)
    }

    /// Remove the file. An already-absent file is fine.
    pub fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Memoized download attempts, optionally backed by a [`CacheFile`].
///
/// The backing file is read on the first access, not at construction, so
/// building a cache costs nothing until it is actually consulted.
#[derive(Debug)]
pub struct DownloadCache {
    file: Option<CacheFile>,
    entries: HashMap<String, DownloadRecord>,
    loaded: bool,
    dirty: bool,
}

impl DownloadCache {
    /// File-backed cache at `path`.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(CacheFile::new(path)),
            entries: HashMap::new(),
            loaded: false,
            dirty: false,
        }
    }

    /// Purely in-memory cache: nothing is read or written to disk.
    pub fn in_memory() -> Self {
        Self {
            file: None,
            entries: HashMap::new(),
            loaded: true,
            dirty: false,
        }
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        if let Some(file) = &self.file {
            self.entries = file.read();
            debug!(
                "loaded {} cached records from {}",
                self.entries.len(),
                file.path().display()
            );
        }
    }

    pub fn get(&mut self, url: &str) -> Option<&DownloadRecord> {
        self.ensure_loaded();
        self.entries.get(url)
    }

    pub fn contains(&mut self, url: &str) -> bool {
        self.ensure_loaded();
        self.entries.contains_key(url)
    }

    /// Store `record` under its URL.
    pub fn insert(&mut self, record: DownloadRecord) {
        self.ensure_loaded();
        self.dirty = true;
        self.entries.insert(record.url.clone(), record);
    }

    /// Evict the record for `url`, if present. Absence is not an error;
    /// callers that care check [`contains`](Self::contains) first.
    pub fn remove(&mut self, url: &str) -> Option<DownloadRecord> {
        self.ensure_loaded();
        let removed = self.entries.remove(url);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Memoized call: return the stored record for `url` without invoking
    /// `fetch`, or run `fetch`, store its record under `url`, and return
    /// it. The boolean is true when `fetch` ran this call.
    pub fn get_or_fetch<E>(
        &mut self,
        url: &str,
        fetch: impl FnOnce() -> Result<DownloadRecord, E>,
    ) -> Result<(DownloadRecord, bool), E> {
        self.ensure_loaded();
        if let Some(record) = self.entries.get(url) {
            return Ok((record.clone(), false));
        }
        let record = fetch()?;
        self.dirty = true;
        self.entries.insert(url.to_string(), record.clone());
        Ok((record, true))
    }

    /// Flush to the backing file. A clean cache, and an in-memory cache,
    /// are both no-ops. Write errors are the caller's problem — the cache
    /// stays dirty so a later flush can retry.
    pub fn persist(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(file) = &self.file {
            file.write(&self.entries)?;
        }
        self.dirty = false;
        Ok(())
    }

    /// Reset both the file and the in-memory mapping to empty.
    pub fn reinitialize(&mut self) -> io::Result<()> {
        self.entries.clear();
        self.loaded = true;
        self.dirty = false;
        match &self.file {
            Some(file) => {
                debug!("clearing cache at {}", file.path().display());
                file.clear()
            }
            None => Ok(()),
        }
    }

    /// Run `f` and persist on the way out, success or failure.
    ///
    /// When `f` succeeds but the flush fails, the flush error is the
    /// result. When both fail, `f`'s error wins and the flush failure is
    /// logged.
    pub fn saving<T, E>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<io::Error>,
    {
        let result = f(self);
        match self.persist() {
            Ok(()) => result,
            Err(persist_err) => match result {
                Ok(_) => Err(E::from(persist_err)),
                Err(run_err) => {
                    error!("cache flush failed: {persist_err}");
                    Err(run_err)
                }
            },
        }
    }
}
