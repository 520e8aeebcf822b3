//! Site layout: origin, edition-specific paths and extraction presets.
//!
//! The agency serves a Turkish (`/tr`) and an English (`/en`) edition. Both
//! share the search API shape and the article container, but differ in
//! paths, default filters, paragraph markup and the footer lines appended to
//! every article.

use crate::error::ConfigError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_ORIGIN: &str = "https://www.aa.com.tr";

/// Name of the hidden form field carrying the anti-forgery token.
pub const TOKEN_FIELD: &str = "__RequestVerificationToken";

/// Element wrapping the article body on detail pages.
pub const BODY_CONTAINER: &str = "div.detay-icerik";

/// Subheadings inside the body container.
pub const BODY_HEADINGS: &str = "h3, h4";

/// Footer paragraphs of the Turkish edition.
const BOILERPLATE_TR: &[&str] = &[
    "Abonelik için lütfen iletişime geçiniz",
    "AA'nın WhatsApp kanallarına katılın",
];

/// Footer paragraphs of the English edition.
const BOILERPLATE_EN: &[&str] = &[
    "Anadolu Agency website contains only",
    "Please contact us for subscription options",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum Edition {
    #[default]
    #[value(name = "tr")]
    #[serde(rename = "tr")]
    Turkish,
    #[value(name = "en")]
    #[serde(rename = "en")]
    English,
}

impl Edition {
    pub fn path_prefix(self) -> &'static str {
        match self {
            Edition::Turkish => "/tr",
            Edition::English => "/en",
        }
    }

    /// Search category used when none is configured ("Gündem" / "World").
    pub fn default_category_id(self) -> u32 {
        match self {
            Edition::Turkish => 2,
            Edition::English => 4,
        }
    }

    /// The English endpoint needs a wildcard query to list everything.
    pub fn default_keyword(self) -> &'static str {
        match self {
            Edition::Turkish => "",
            Edition::English => "* * *",
        }
    }

    /// Detail fetcher pacing floor.
    pub fn default_min_delay(self) -> Duration {
        match self {
            Edition::Turkish => Duration::from_secs(1),
            Edition::English => Duration::from_millis(10),
        }
    }

    /// Detail fetcher attempts per article.
    pub fn default_max_retries(self) -> u32 {
        match self {
            Edition::Turkish => 2,
            Edition::English => 1,
        }
    }

    pub fn paragraph_selector(self) -> &'static str {
        match self {
            Edition::Turkish => "p",
            Edition::English => "p.selectionShareable",
        }
    }

    pub fn boilerplate(self) -> &'static [&'static str] {
        match self {
            Edition::Turkish => BOILERPLATE_TR,
            Edition::English => BOILERPLATE_EN,
        }
    }
}

/// Resolved site endpoints for one edition.
#[derive(Debug, Clone)]
pub struct Site {
    origin: Url,
    edition: Edition,
}

impl Site {
    pub fn new(origin: &str, edition: Edition) -> Result<Self, ConfigError> {
        let origin = Url::parse(origin).map_err(|source| ConfigError::Origin {
            origin: origin.to_string(),
            source,
        })?;
        Ok(Self { origin, edition })
    }

    pub fn edition(&self) -> Edition {
        self.edition
    }

    /// Origin without a trailing slash, e.g. `https://www.aa.com.tr`.
    pub fn origin(&self) -> &str {
        self.origin.as_str().trim_end_matches('/')
    }

    /// HTML page carrying the anti-forgery token.
    pub fn search_page_url(&self) -> String {
        format!("{}{}/Search", self.origin(), self.edition.path_prefix())
    }

    /// JSON endpoint the search form posts to.
    pub fn search_api_url(&self) -> String {
        format!("{}{}/Search/Search", self.origin(), self.edition.path_prefix())
    }

    /// Absolute URL of an article from its route.
    ///
    /// Absolute routes are used as-is; relative ones are appended to the
    /// origin.
    pub fn article_url(&self, route: &str) -> String {
        let route = route.trim();
        if route.starts_with("http://") || route.starts_with("https://") {
            route.to_string()
        } else if route.starts_with('/') {
            format!("{}{}", self.origin(), route)
        } else {
            format!("{}/{}", self.origin(), route)
        }
    }
}

impl Default for Site {
    fn default() -> Self {
        Self {
            origin: Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid URL"),
            edition: Edition::default(),
        }
    }
}
