//! Data models for search results and fetched article bodies.
//!
//! - [`ArticleStub`]: one document returned by the search API
//! - [`ArticleRecord`]: one line of the body output file
//! - [`SearchPage`]: the JSON envelope of a search API response
//! - [`CrawlSummary`] / [`FetchSummary`]: end-of-run counters
//!
//! Field names follow the wire format of the search API (`Id`, `Title`,
//! `Route`), hence the explicit `#[serde(rename)]` attributes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable article identifier as sent by the search API.
///
/// The API is not consistent about the JSON type of `Id` (string in some
/// editions, number in others), so the raw value is kept and compared by its
/// canonical [`key`](ArticleId::key).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(Value);

impl ArticleId {
    /// Canonical string form used for dedup and resume bookkeeping.
    pub fn key(&self) -> String {
        match &self.0 {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// `true` when the API sent no usable identifier.
    pub fn is_null(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for ArticleId {
    fn from(s: &str) -> Self {
        ArticleId(Value::String(s.to_string()))
    }
}

impl From<u64> for ArticleId {
    fn from(n: u64) -> Self {
        ArticleId(Value::from(n))
    }
}

impl PartialEq for ArticleId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ArticleId {}

impl Hash for ArticleId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// A lightweight reference to an article, as returned by the search API.
///
/// Everything besides `Id`, `Title` and `Route` (category, dates, tags, ...)
/// is preserved in `extra` so the stub round-trips without loss.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleStub {
    #[serde(rename = "Id")]
    pub id: ArticleId,
    #[serde(rename = "Title", default)]
    pub title: Option<String>,
    /// Kept as a raw value: the API occasionally sends `null` or non-strings.
    #[serde(rename = "Route", default)]
    pub route: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArticleStub {
    /// The route if it is a non-empty string.
    pub fn route_str(&self) -> Option<&str> {
        match &self.route {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Final output unit of the detail fetcher.
///
/// `full_text` is empty when the fetch failed or the page had no body
/// container; the record is written either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(rename = "Id")]
    pub id: ArticleId,
    #[serde(rename = "Title")]
    pub title: Option<String>,
    #[serde(rename = "Url")]
    pub url: String,
    pub full_text: String,
}

/// Envelope of a search API response.
#[derive(Debug, Default, Deserialize)]
pub struct SearchPage {
    #[serde(rename = "Documents", default)]
    pub documents: Vec<Value>,
}

/// Counters reported at the end of a metadata crawl.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlSummary {
    /// Page requests issued, including a failing one.
    pub pages_requested: u32,
    /// Pages whose response was decoded successfully.
    pub pages_fetched: u32,
    pub documents: usize,
    pub duplicates: usize,
    /// Documents that could not be read as an [`ArticleStub`].
    pub undecodable: usize,
    /// Set when an empty page ended the crawl before `max_pages`.
    pub stopped_early: bool,
}

/// Counters reported at the end of a detail fetch.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    /// Stubs in the selected window.
    pub total: usize,
    /// Stubs for which a record was written this run.
    pub attempted: usize,
    /// Records whose text reached the minimum length.
    pub succeeded: usize,
    /// Records written with empty or too-short text.
    pub failed: usize,
    pub missing_route: usize,
    pub already_done: usize,
    /// Transport rebuilds performed during the run.
    pub session_resets: u32,
}
