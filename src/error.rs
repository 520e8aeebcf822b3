//! Error types for the crawlers.
//!
//! The split mirrors how failures propagate:
//!
//! - [`SessionError`] is always fatal for a run.
//! - [`FetchError`] is fatal for the metadata crawler (wrapped in
//!   [`CrawlError::Page`]) and item-local for the detail fetcher, which
//!   retries and then records an empty body.
//! - [`FetcherError`] covers the detail fetcher's own files.
//! - [`ConfigError`] rejects unusable knob values before any request is made.
//!
//! Extraction misses, malformed resume lines and stubs without a route are
//! not errors: they are reported as outcomes and logged.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to establish an authenticated crawl session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("handshake request failed: {0}")]
    Request(#[source] FetchError),

    #[error("no `{field}` value found in the page served by {url}")]
    TokenMissing { url: String, field: String },
}

/// Failure of a single page or article request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned a response that is not valid JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that end a metadata crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("page {page} failed: {source}")]
    Page {
        page: u32,
        #[source]
        source: FetchError,
    },

    #[error("could not write {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that end a detail fetch.
#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("unsupported metadata file {} (expected .json or .jsonl)", .path.display())]
    UnsupportedInput { path: PathBuf },

    #[error("{} is not a JSON array of documents: {source}", .path.display())]
    InvalidInput {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Invalid or unreadable configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid site origin {origin:?}: {source}")]
    Origin {
        origin: String,
        #[source]
        source: url::ParseError,
    },

    #[error("invalid CSS selector {selector:?}: {message}")]
    Selector { selector: String, message: String },

    #[error("{field} must be at least 1")]
    Zero { field: &'static str },

    #[error("start_page {start_page} plus max_pages {max_pages} overflows the page counter")]
    PageRange { start_page: u32, max_pages: u32 },

    #[error("{field} must be between 0 and {max} seconds, got {value}")]
    Delay {
        field: &'static str,
        value: f64,
        max: u64,
    },
}
