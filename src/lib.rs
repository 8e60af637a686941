//! # wallgrab
//!
//! Fetch one image from a Reddit-style JSON listing into a local
//! directory. The chosen file's path is printed to stdout and everything
//! diagnostic goes to stderr, so composing with other tools stays a
//! one-liner:
//!
//! ```text
//! feh --bg-fill "$(wallgrab fetch)"
//! ```
//!
//! # Architecture: One Pass, Memoized
//!
//! A run is a single pass through a small pipeline:
//!
//! ```text
//! connectivity gate → listing fetch → random permutation
//!         → per-candidate validate/download (memoized) → failsafe ladder
//! ```
//!
//! Every download attempt is recorded in a persistent URL-keyed cache, so
//! repeat runs skip known-bad candidates without re-requesting them and
//! recognize already-collected images instantly. The cache is flushed
//! exactly once per run, on success and failure alike.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`collect`] | Orchestration — connectivity gate, directory lifecycle, failsafe ladder |
//! | [`listing`] | One listing fetch → one resolved image, via a random permutation of candidates |
//! | [`fetch`] | Single-URL download: destination naming, validation checks, byte persistence |
//! | [`cache`] | Persistent memoization of download attempts, with scoped save |
//! | [`http`] | The network seam: backend trait plus the blocking reqwest client |
//! | [`connectivity`] | Bounded-retry connection probe |
//! | [`config`] | Built-in defaults: endpoint, directories, User-Agent |
//! | [`logging`] | stderr subscriber setup, `-v` mapping |
//!
//! # Design Decisions
//!
//! ## The cache answers "should I even try"
//!
//! The interesting state is not which files exist — the filesystem
//! answers that — but which URLs are *known bad*: removed posts, HTML
//! pages, GIFs. Those verdicts don't change, so they are memoized by URL
//! and persisted. Transient transport errors are deliberately never
//! recorded; a URL that timed out once must stay in the "not yet
//! attempted" class rather than be condemned forever.
//!
//! ## Exhaustion is an outcome, not an error
//!
//! Visiting every candidate without accepting one is the normal result of
//! a small listing plus a warm cache. The resolver reports it as a value
//! and the orchestrator decides: fail, fall back to the whole directory,
//! or fall back to this run's skipped duplicates.
//!
//! ## Blocking I/O throughout
//!
//! One listing fetch and at most one image body per run, strictly
//! sequential. An async runtime would be carried for nothing.

pub mod cache;
pub mod collect;
pub mod config;
pub mod connectivity;
pub mod fetch;
pub mod http;
pub mod listing;
pub mod logging;

#[cfg(test)]
pub(crate) mod test_helpers;
