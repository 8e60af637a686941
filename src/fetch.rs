//! Single-image download: destination naming, response validation, byte
//! persistence.
//!
//! [`Fetcher::fetch`] turns one candidate URL into a [`FetchOutcome`].
//! Validation is an ordered list of checks over the response descriptor,
//! first match wins; every failed check is still evaluated so a response
//! failing several rules is fully visible at debug level. GIFs are
//! rejected on purpose — animated wallpapers are not wallpapers.

use crate::http::{HttpBackend, HttpError, HttpResponse};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Http(#[from] HttpError),
}

/// What one fetch attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Body bytes were written to a new file at this path.
    Downloaded(PathBuf),
    /// The destination already existed; no body was fetched and the
    /// existing bytes were left alone.
    AlreadyPresent(PathBuf),
    /// The candidate is not a usable static image; the reason is one of
    /// the validation messages (or "no usable file name").
    Invalid(String),
}

/// File name a URL downloads to: the last non-empty segment of the URL
/// path, so a trailing separator selects the segment before it. The query
/// and fragment never contribute, and no percent-decoding is applied.
/// `None` when the URL does not parse, has no non-empty segment, or the
/// segment would escape the directory.
pub fn url_file_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let name = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    if name == "." || name == ".." {
        return None;
    }
    Some(name.to_string())
}

/// Downloads one image URL into a target directory.
pub struct Fetcher<'a> {
    http: &'a dyn HttpBackend,
    dir: &'a Path,
}

impl<'a> Fetcher<'a> {
    pub fn new(http: &'a dyn HttpBackend, dir: &'a Path) -> Self {
        Self { http, dir }
    }

    /// Deterministic destination for `url` inside the target directory.
    pub fn dest_path(&self, url: &str) -> Option<PathBuf> {
        url_file_name(url).map(|name| self.dir.join(name))
    }

    /// Attempt to download `url`.
    ///
    /// Existing destinations short-circuit to [`FetchOutcome::AlreadyPresent`]
    /// without any request. Otherwise one GET runs, the validation checks
    /// decide, and on success the body lands in exactly one new file.
    /// Transport errors propagate — a flaky network is not a verdict on
    /// the candidate.
    pub fn fetch(&self, url: &str) -> Result<FetchOutcome, FetchError> {
        let Some(path) = self.dest_path(url) else {
            debug!("no usable file name: {url}");
            return Ok(FetchOutcome::Invalid("no usable file name".to_string()));
        };
        if path.exists() {
            debug!("already downloaded: {url}");
            return Ok(FetchOutcome::AlreadyPresent(path));
        }

        let response = self.http.get(url)?;
        if let Some(reason) = validate(&response) {
            debug!("{reason}: {url}");
            return Ok(FetchOutcome::Invalid(reason.to_string()));
        }

        std::fs::write(&path, &response.body)?;
        debug!("collected new image: {url}");
        Ok(FetchOutcome::Downloaded(path))
    }
}

/// Reject reasons in precedence order. A missing content type counts as
/// not-an-image.
fn validate(response: &HttpResponse) -> Option<&'static str> {
    let content_type = response.content_type.as_deref().unwrap_or("");
    let checks = [
        (
            response.final_url.contains("removed"),
            "appears to be removed",
        ),
        (!content_type.starts_with("image"), "not an image"),
        (content_type.ends_with("gif"), "is a .gif"),
    ];

    let failed: Vec<&'static str> = checks
        .iter()
        .filter(|(hit, _)| *hit)
        .map(|(_, reason)| *reason)
        .collect();
    if failed.len() > 1 {
        debug!("also failed: {}", failed[1..].join(", "));
    }
    failed.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::tests::FakeHttp;
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // Destination naming
    // =========================================================================

    #[test]
    fn file_name_is_the_last_path_segment() {
        assert_eq!(
            url_file_name("https://i.example/pics/dawn.jpg"),
            Some("dawn.jpg".to_string())
        );
    }

    #[test]
    fn trailing_slash_uses_the_previous_segment() {
        assert_eq!(
            url_file_name("https://i.example/pics/dawn.jpg/"),
            Some("dawn.jpg".to_string())
        );
    }

    #[test]
    fn query_and_fragment_do_not_contribute() {
        assert_eq!(
            url_file_name("https://i.example/dawn.jpg?raw=1#top"),
            Some("dawn.jpg".to_string())
        );
    }

    #[test]
    fn percent_encoding_is_kept_verbatim() {
        assert_eq!(
            url_file_name("https://i.example/a%20b.jpg"),
            Some("a%20b.jpg".to_string())
        );
    }

    #[test]
    fn bare_host_has_no_file_name() {
        assert_eq!(url_file_name("https://i.example"), None);
        assert_eq!(url_file_name("https://i.example/"), None);
    }

    #[test]
    fn unparseable_url_has_no_file_name() {
        assert_eq!(url_file_name("not a url"), None);
        assert_eq!(url_file_name("dawn.jpg"), None);
    }

    #[test]
    fn dot_segments_are_refused() {
        assert_eq!(url_file_name("https://i.example/pics/.."), None);
        assert_eq!(url_file_name("https://i.example/pics/."), None);
    }

    // =========================================================================
    // Fetch outcomes
    // =========================================================================

    #[test]
    fn downloaded_writes_the_body() {
        let tmp = TempDir::new().unwrap();
        let http = FakeHttp::new();
        http.serve_image("https://i.example/dawn.jpg", b"jpeg bytes");

        let fetcher = Fetcher::new(&http, tmp.path());
        let outcome = fetcher.fetch("https://i.example/dawn.jpg").unwrap();

        let expected = tmp.path().join("dawn.jpg");
        assert_eq!(outcome, FetchOutcome::Downloaded(expected.clone()));
        assert_eq!(fs::read(expected).unwrap(), b"jpeg bytes");
    }

    #[test]
    fn existing_destination_skips_the_request() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("dawn.jpg"), b"original").unwrap();
        let http = FakeHttp::new();

        let fetcher = Fetcher::new(&http, tmp.path());
        let outcome = fetcher.fetch("https://i.example/dawn.jpg").unwrap();

        assert_eq!(
            outcome,
            FetchOutcome::AlreadyPresent(tmp.path().join("dawn.jpg"))
        );
        assert!(http.get_requests().is_empty());
        // Existing bytes are never rewritten
        assert_eq!(fs::read(tmp.path().join("dawn.jpg")).unwrap(), b"original");
    }

    #[test]
    fn second_fetch_is_already_present_at_the_same_path() {
        let tmp = TempDir::new().unwrap();
        let http = FakeHttp::new();
        http.serve_image("https://i.example/dawn.jpg", b"jpeg bytes");
        let fetcher = Fetcher::new(&http, tmp.path());

        let first = fetcher.fetch("https://i.example/dawn.jpg").unwrap();
        let second = fetcher.fetch("https://i.example/dawn.jpg").unwrap();

        let path = tmp.path().join("dawn.jpg");
        assert_eq!(first, FetchOutcome::Downloaded(path.clone()));
        assert_eq!(second, FetchOutcome::AlreadyPresent(path));
        assert_eq!(http.request_count("https://i.example/dawn.jpg"), 1);
    }

    #[test]
    fn non_image_content_type_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let http = FakeHttp::new();
        http.serve(
            "https://i.example/page.jpg",
            HttpResponse {
                final_url: "https://i.example/page.jpg".to_string(),
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: b"<html>".to_vec(),
            },
        );

        let fetcher = Fetcher::new(&http, tmp.path());
        let outcome = fetcher.fetch("https://i.example/page.jpg").unwrap();

        assert_eq!(outcome, FetchOutcome::Invalid("not an image".to_string()));
        assert!(!tmp.path().join("page.jpg").exists());
    }

    #[test]
    fn missing_content_type_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let http = FakeHttp::new();
        http.serve(
            "https://i.example/dawn.jpg",
            HttpResponse {
                final_url: "https://i.example/dawn.jpg".to_string(),
                content_type: None,
                body: b"??".to_vec(),
            },
        );

        let fetcher = Fetcher::new(&http, tmp.path());
        assert_eq!(
            fetcher.fetch("https://i.example/dawn.jpg").unwrap(),
            FetchOutcome::Invalid("not an image".to_string())
        );
    }

    #[test]
    fn gif_content_type_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let http = FakeHttp::new();
        http.serve(
            "https://i.example/loop.gif",
            HttpResponse {
                final_url: "https://i.example/loop.gif".to_string(),
                content_type: Some("image/gif".to_string()),
                body: b"GIF89a".to_vec(),
            },
        );

        let fetcher = Fetcher::new(&http, tmp.path());
        assert_eq!(
            fetcher.fetch("https://i.example/loop.gif").unwrap(),
            FetchOutcome::Invalid("is a .gif".to_string())
        );
    }

    #[test]
    fn removal_takes_precedence_over_content_type() {
        let tmp = TempDir::new().unwrap();
        let http = FakeHttp::new();
        // Redirected to a removal page: both rule 1 and rule 2 fail, the
        // reported reason must be rule 1.
        http.serve(
            "https://i.example/dawn.jpg",
            HttpResponse {
                final_url: "https://i.example/removed.png".to_string(),
                content_type: Some("text/html".to_string()),
                body: b"<html>".to_vec(),
            },
        );

        let fetcher = Fetcher::new(&http, tmp.path());
        assert_eq!(
            fetcher.fetch("https://i.example/dawn.jpg").unwrap(),
            FetchOutcome::Invalid("appears to be removed".to_string())
        );
    }

    #[test]
    fn unusable_url_is_invalid_without_a_request() {
        let tmp = TempDir::new().unwrap();
        let http = FakeHttp::new();

        let fetcher = Fetcher::new(&http, tmp.path());
        assert_eq!(
            fetcher.fetch("https://i.example/").unwrap(),
            FetchOutcome::Invalid("no usable file name".to_string())
        );
        assert!(http.get_requests().is_empty());
    }

    #[test]
    fn transport_error_propagates_and_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let http = FakeHttp::new();
        http.fail("https://i.example/dawn.jpg");

        let fetcher = Fetcher::new(&http, tmp.path());
        let err = fetcher.fetch("https://i.example/dawn.jpg").unwrap_err();

        assert!(matches!(err, FetchError::Http(_)));
        assert!(!tmp.path().join("dawn.jpg").exists());
    }

    // =========================================================================
    // Validation ladder
    // =========================================================================

    #[test]
    fn valid_image_passes_all_checks() {
        let response = HttpResponse {
            final_url: "https://i.example/dawn.jpg".to_string(),
            content_type: Some("image/png".to_string()),
            body: Vec::new(),
        };
        assert_eq!(validate(&response), None);
    }

    #[test]
    fn gif_reported_even_though_it_is_an_image() {
        let response = HttpResponse {
            final_url: "https://i.example/loop.gif".to_string(),
            content_type: Some("image/gif".to_string()),
            body: Vec::new(),
        };
        assert_eq!(validate(&response), Some("is a .gif"));
    }
}
