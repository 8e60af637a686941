//! Listing resolution: one API fetch → one resolved image.
//!
//! [`resolve`] fetches the listing JSON, visits the candidate posts in a
//! uniformly random permutation, and attempts each through the fetcher
//! with every attempt memoized in the download cache. Invalid candidates
//! advance the loop; duplicates either satisfy the run or, under
//! no-repeat, are recorded into the seen set for the `new` failsafe.
//! Running out of candidates is a normal outcome ([`ResolveOutcome::Exhausted`]),
//! distinct from hard failures like an unreachable listing endpoint.

use crate::cache::{DownloadCache, DownloadRecord};
use crate::fetch::{FetchError, FetchOutcome, Fetcher};
use crate::http::{HttpBackend, HttpError};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// One listing entry, as served by the API.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Post {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub permalink: String,
}

impl Post {
    /// Whether the link target looks like a removed submission.
    pub fn is_removed(&self) -> bool {
        self.url.contains("removed")
    }
}

#[derive(serde::Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(serde::Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(serde::Deserialize)]
struct Child {
    data: Post,
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("listing request failed: {0}")]
    Listing(#[source] HttpError),
    #[error("listing is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// How one resolution pass ended.
#[derive(Debug)]
pub enum ResolveOutcome {
    /// A candidate was accepted; its file is on disk at `path`.
    Accepted { post: Post, path: PathBuf },
    /// Every candidate was invalid or skipped. `seen` holds the posts
    /// passed over only because their file already existed — the `new`
    /// failsafe draws from exactly this set.
    Exhausted { seen: Vec<(Post, PathBuf)> },
}

/// Resolve one image from the listing at `listing_url`.
///
/// Candidates are visited in a uniformly random permutation of the
/// listing order. Each URL gets at most one download attempt per run,
/// memoized through `cache` across runs. With `no_repeat`, a candidate
/// whose file is already on disk is recorded and skipped instead of
/// accepted.
pub fn resolve<R: Rng + ?Sized>(
    http: &dyn HttpBackend,
    cache: &mut DownloadCache,
    dir: &Path,
    listing_url: &str,
    no_repeat: bool,
    rng: &mut R,
) -> Result<ResolveOutcome, ResolveError> {
    let response = http.get(listing_url).map_err(ResolveError::Listing)?;
    let mut posts = dedup_posts(parse_listing(&response.body)?);
    posts.shuffle(rng);
    debug!("listing has {} candidate posts", posts.len());

    let fetcher = Fetcher::new(http, dir);
    let mut seen: Vec<(Post, PathBuf)> = Vec::new();

    for post in posts {
        match attempt(&fetcher, cache, &post.url)? {
            Attempt::Fresh(path) => {
                return Ok(ResolveOutcome::Accepted { post, path });
            }
            Attempt::Duplicate(path) => {
                if no_repeat {
                    debug!("already collected, skipping: {}", post.url);
                    seen.push((post, path));
                } else {
                    return Ok(ResolveOutcome::Accepted { post, path });
                }
            }
            Attempt::Rejected | Attempt::Skipped => {}
        }
    }

    Ok(ResolveOutcome::Exhausted { seen })
}

/// Decode the listing body into posts, in listing order.
fn parse_listing(body: &[u8]) -> Result<Vec<Post>, serde_json::Error> {
    let listing: Listing = serde_json::from_slice(body)?;
    Ok(listing.data.children.into_iter().map(|c| c.data).collect())
}

/// Collapse duplicate URLs: the first appearance keeps its position, the
/// last appearance supplies the metadata. Entries with an empty URL are
/// dropped.
fn dedup_posts(posts: Vec<Post>) -> Vec<Post> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<Post> = Vec::new();
    for post in posts {
        if post.url.is_empty() {
            continue;
        }
        match index.get(&post.url) {
            Some(&at) => out[at] = post,
            None => {
                index.insert(post.url.clone(), out.len());
                out.push(post);
            }
        }
    }
    out
}

/// How one candidate fared.
enum Attempt {
    /// Newly downloaded by this call.
    Fresh(PathBuf),
    /// Already on disk, from the cache or an existing file.
    Duplicate(PathBuf),
    /// Failed validation, now or in a previous run.
    Rejected,
    /// Not a real candidate; no request made and nothing cached.
    Skipped,
}

fn attempt(
    fetcher: &Fetcher,
    cache: &mut DownloadCache,
    url: &str,
) -> Result<Attempt, ResolveError> {
    if fetcher.dest_path(url).is_none() {
        debug!("no destination for candidate, skipping: {url}");
        return Ok(Attempt::Skipped);
    }

    // A valid record whose file has since been deleted is stale: evict it
    // so the URL is fetched again instead of replayed from the cache.
    let stale = cache
        .get(url)
        .is_some_and(|r| !r.invalid && !r.path.as_deref().is_some_and(|p| p.exists()));
    if stale {
        debug!("cached file is gone, refetching: {url}");
        cache.remove(url);
    }

    let mut downloaded: Option<PathBuf> = None;
    let (record, fetched) = cache.get_or_fetch(url, || -> Result<DownloadRecord, FetchError> {
        match fetcher.fetch(url)? {
            FetchOutcome::Downloaded(path) => {
                downloaded = Some(path.clone());
                Ok(DownloadRecord::valid(url, "downloaded", path))
            }
            FetchOutcome::AlreadyPresent(path) => {
                Ok(DownloadRecord::valid(url, "already downloaded", path))
            }
            FetchOutcome::Invalid(reason) => Ok(DownloadRecord::invalid(url, &reason)),
        }
    })?;

    if record.invalid {
        if !fetched {
            debug!("cached as invalid: {url} ({})", record.message);
        }
        return Ok(Attempt::Rejected);
    }
    // Valid records always carry a path
    let Some(path) = record.path else {
        return Ok(Attempt::Rejected);
    };
    Ok(match downloaded {
        Some(fresh) => Attempt::Fresh(fresh),
        None => Attempt::Duplicate(path),
    })
}
