//! HTTP backend trait and the production reqwest client.
//!
//! The [`HttpBackend`] trait is the single seam between this crate and the
//! network: one `GET`, returning the response as a plain value object.
//! Everything above it (validation, caching, listing resolution) works
//! against the trait, so tests drive the whole pipeline with the scripted
//! [`FakeHttp`](tests::FakeHttp) double instead of sockets.
//!
//! The production implementation is [`ReqwestBackend`]: a blocking client
//! with a fixed request timeout and a stable identifying User-Agent. Remote
//! listing APIs commonly reject default/anonymous agents, so the header is
//! set on every request, not per-call.

use crate::config;
use std::time::Duration;
use thiserror::Error;

/// Upper bound on one request, connect through body read.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("request failed: {0}")]
    Transport(String),
}

/// One completed response, reduced to the fields the pipeline inspects.
///
/// `final_url` is the URL after redirects — removal checks run against it,
/// not the requested URL. A missing `Content-Type` header is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub final_url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Trait for HTTP transports.
pub trait HttpBackend {
    /// Execute one GET and return the full response body.
    fn get(&self, url: &str) -> Result<HttpResponse, HttpError>;
}

/// Production backend over `reqwest::blocking`.
pub struct ReqwestBackend {
    client: reqwest::blocking::Client,
}

impl ReqwestBackend {
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(config::USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpBackend for ReqwestBackend {
    fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        // Non-2xx responses flow through as ordinary responses: an HTML
        // error page fails the image checks downstream.
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| HttpError::Transport(e.to_string()))?;
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let body = response
            .bytes()
            .map_err(|e| HttpError::Transport(e.to_string()))?
            .to_vec();
        Ok(HttpResponse {
            final_url,
            content_type,
            body,
        })
    }
}
