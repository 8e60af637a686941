//! Collection orchestration: connectivity gate, directory lifecycle,
//! scoped cache save, and the failsafe ladder.
//!
//! [`Collector::collect`] is the top of the pipeline. Per invocation it
//! waits for connectivity, makes sure the download directory exists, runs
//! one listing resolution with the cache flushed exactly once at the end,
//! and, when the listing yields nothing, applies the configured
//! [`Failsafe`]:
//!
//! - [`Failsafe::Fail`] reports the exhaustion.
//! - [`Failsafe::All`] falls back to a uniformly random file from the
//!   whole directory, regardless of this run's listing.
//! - [`Failsafe::New`] falls back to a uniformly random file among the
//!   candidates this run skipped as already collected; when that set is
//!   empty it fails like `Fail`. It never widens to the directory.
//!
//! No connection is terminal for the run even when a failsafe is set: the
//! ladder applies to an exhausted listing, not to an unreachable network.

use crate::cache::DownloadCache;
use crate::config;
use crate::connectivity::{self, ConnectivityProbe};
use crate::http::{HttpBackend, HttpError};
use crate::listing::{self, Post, ResolveError, ResolveOutcome};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Connectivity probes per run.
const CONNECT_ATTEMPTS: u32 = 10;

/// Pause between connectivity probes.
const CONNECT_WAIT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum CollectError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("could not connect to the internet")]
    NoConnection,
    #[error("collection failed: {0}")]
    Exhausted(String),
    #[error("no suitable files: {}", .0.display())]
    NoFiles(PathBuf),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Where to turn when the listing yields nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Failsafe {
    /// Report failure.
    Fail,
    /// A random file already in the directory.
    All,
    /// A random file among this run's skipped duplicates.
    New,
}

/// Knobs for one collection run. [`Default`] supplies the production
/// connectivity bounds; tests shrink them to keep scenarios fast.
#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub listing_url: String,
    pub no_repeat: bool,
    pub failsafe: Failsafe,
    pub connect_attempts: u32,
    pub connect_wait: Duration,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            listing_url: config::DEFAULT_LISTING_URL.to_string(),
            no_repeat: false,
            failsafe: Failsafe::Fail,
            connect_attempts: CONNECT_ATTEMPTS,
            connect_wait: CONNECT_WAIT,
        }
    }
}

/// Outcome of a successful collection.
#[derive(Debug)]
pub struct Collected {
    pub path: PathBuf,
    /// Listing metadata for the chosen file. Absent when the path came
    /// from the directory-wide fallback, which bypasses the listing.
    pub post: Option<Post>,
}

/// Image collection rooted at a download directory.
#[derive(Debug, Clone)]
pub struct Collector {
    dir: PathBuf,
}

impl Collector {
    /// Create a collector for `dir`. The path may not exist yet, but an
    /// existing non-directory occupant is refused up front.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, CollectError> {
        let dir = dir.into();
        if dir.exists() && !dir.is_dir() {
            return Err(CollectError::NotADirectory(dir));
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the download directory if missing.
    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Fetch one image and return its path, with the listing post when
    /// one chose it. See the module docs for the full pipeline.
    pub fn collect<R: Rng + ?Sized>(
        &self,
        http: &dyn HttpBackend,
        probe: &dyn ConnectivityProbe,
        cache: &mut DownloadCache,
        rng: &mut R,
        options: &CollectOptions,
    ) -> Result<Collected, CollectError> {
        if !connectivity::wait_for_connection(probe, options.connect_attempts, options.connect_wait)
        {
            return Err(CollectError::NoConnection);
        }
        self.ensure_dir()?;

        let outcome = cache.saving(|cache| {
            listing::resolve(
                http,
                cache,
                &self.dir,
                &options.listing_url,
                options.no_repeat,
                rng,
            )
            .map_err(CollectError::from)
        })?;

        match outcome {
            ResolveOutcome::Accepted { post, path } => {
                log_post(&post, &path);
                Ok(Collected {
                    path,
                    post: Some(post),
                })
            }
            ResolveOutcome::Exhausted { seen } => self.recover(seen, rng, options),
        }
    }

    /// Apply the failsafe after an exhausted listing.
    fn recover<R: Rng + ?Sized>(
        &self,
        seen: Vec<(Post, PathBuf)>,
        rng: &mut R,
        options: &CollectOptions,
    ) -> Result<Collected, CollectError> {
        match options.failsafe {
            Failsafe::New => {
                debug!("falling back on an image from this listing");
                match seen.choose(rng) {
                    Some((post, path)) => {
                        log_post(post, path);
                        Ok(Collected {
                            path: path.clone(),
                            post: Some(post.clone()),
                        })
                    }
                    None => Err(CollectError::Exhausted(options.listing_url.clone())),
                }
            }
            Failsafe::All => {
                debug!("falling back on an image from the whole directory");
                let path = self.random_existing(rng)?;
                Ok(Collected { path, post: None })
            }
            Failsafe::Fail => Err(CollectError::Exhausted(options.listing_url.clone())),
        }
    }

    /// Uniformly random file in the download directory. Dotfiles are
    /// skipped so the co-located cache file is never served as an image.
    pub fn random_existing<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<PathBuf, CollectError> {
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            files.push(path);
        }
        files
            .choose(rng)
            .cloned()
            .ok_or_else(|| CollectError::NoFiles(self.dir.clone()))
    }

    /// Remove every download, leaving an empty directory behind.
    pub fn clear_downloads(&self) -> io::Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        std::fs::create_dir_all(&self.dir)
    }
}

/// Listing metadata for the chosen file, best effort.
fn log_post(post: &Post, path: &Path) {
    info!("Post: {}", post.permalink);
    info!("Title: {}", post.title);
    info!("Image: {}", post.url);
    info!("File: {}", path.display());
}
