//! Paginated metadata crawler for the search API.
//!
//! One authenticated session walks `max_pages` consecutive result pages,
//! posting the search form with the anti-forgery token and collecting the
//! returned documents as [`ArticleStub`]s.
//!
//! # Failure Policy
//!
//! Any failed page ends the whole crawl. Pages already written to the
//! incremental file stay there; restart from the failed page with
//! `start_page`.

use crate::error::{ConfigError, CrawlError, FetchError};
use crate::models::{ArticleId, ArticleStub, CrawlSummary, SearchPage};
use crate::outputs::jsonl::{JsonLinesWriter, WriteMode};
use crate::pacing::{Pacer, MAX_DELAY};
use crate::session::{establish, CrawlSession};
use crate::site::{Site, TOKEN_FIELD};
use crate::utils::truncate_for_log;
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Constructor-level settings of a metadata crawl.
#[derive(Debug, Clone)]
pub struct MetadataConfig {
    pub site: Site,
    pub start_page: u32,
    pub max_pages: u32,
    pub category_id: u32,
    pub keyword: String,
    pub page_size: u32,
    pub min_delay: Duration,
    pub request_timeout: Duration,
    /// Append each page's documents to this file as soon as it arrives.
    pub save_path: Option<PathBuf>,
    /// Truncate `save_path` before the first write instead of appending.
    pub in_place: bool,
    /// End the crawl at the first page without documents.
    pub stop_on_empty_page: bool,
}

impl MetadataConfig {
    /// Defaults for the site's edition: one page of 20 results.
    pub fn for_site(site: Site) -> Self {
        let edition = site.edition();
        Self {
            site,
            start_page: 1,
            max_pages: 1,
            category_id: edition.default_category_id(),
            keyword: edition.default_keyword().to_string(),
            page_size: 20,
            min_delay: Duration::from_secs(1),
            request_timeout: Duration::from_secs(25),
            save_path: None,
            in_place: true,
            stop_on_empty_page: false,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Zero { field: "page_size" });
        }
        if self.start_page.checked_add(self.max_pages).is_none() {
            return Err(ConfigError::PageRange {
                start_page: self.start_page,
                max_pages: self.max_pages,
            });
        }
        if self.min_delay > MAX_DELAY {
            return Err(ConfigError::Delay {
                field: "min_delay",
                value: self.min_delay.as_secs_f64(),
                max: MAX_DELAY.as_secs(),
            });
        }
        Ok(())
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::for_site(Site::default())
    }
}

/// Sequential crawler over search result pages.
#[derive(Debug)]
pub struct MetadataCrawler {
    config: MetadataConfig,
    stubs: Vec<ArticleStub>,
    seen: HashSet<ArticleId>,
}

impl MetadataCrawler {
    pub fn new(config: MetadataConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            stubs: Vec::new(),
            seen: HashSet::new(),
        })
    }

    /// Stubs collected so far, in crawl order. Still populated after a
    /// failed run.
    pub fn stubs(&self) -> &[ArticleStub] {
        &self.stubs
    }

    /// `(title, absolute url)` for every collected stub with a route.
    pub fn article_links(&self) -> Vec<(Option<String>, String)> {
        self.stubs
            .iter()
            .filter_map(|stub| {
                stub.route_str()
                    .map(|route| (stub.title.clone(), self.config.site.article_url(route)))
            })
            .collect()
    }

    /// Run the handshake and walk the configured pages.
    ///
    /// Previously collected stubs are cleared first.
    #[instrument(level = "info", skip_all, fields(
        start_page = self.config.start_page,
        max_pages = self.config.max_pages,
        category_id = self.config.category_id,
    ))]
    pub async fn run(&mut self) -> Result<CrawlSummary, CrawlError> {
        self.stubs.clear();
        self.seen.clear();

        let mut session = establish(
            &self.config.site.search_page_url(),
            self.config.request_timeout,
            Pacer::new(self.config.min_delay),
        )
        .await?;

        let mut summary = CrawlSummary::default();
        let mut writer: Option<JsonLinesWriter> = None;

        for i in 0..self.config.max_pages {
            let page = self.config.start_page + i;
            session.pace().await;
            summary.pages_requested += 1;

            let result = match self.fetch_page(&mut session, page).await {
                Ok(result) => result,
                Err(source) => {
                    warn!(page, error = %source, fetched = summary.pages_fetched, "page failed; aborting crawl");
                    return Err(CrawlError::Page { page, source });
                }
            };
            summary.pages_fetched += 1;

            let count = result.documents.len();
            if count == 0 && self.config.stop_on_empty_page {
                info!(page, "empty result page; stopping");
                summary.stopped_early = true;
                break;
            }

            let fresh = self.collect(result.documents, &mut summary);
            info!(page, documents = count, new = fresh.len(), "fetched result page");

            if let Some(path) = &self.config.save_path {
                if writer.is_none() {
                    let mode = if self.config.in_place {
                        WriteMode::Truncate
                    } else {
                        WriteMode::Append
                    };
                    let opened = JsonLinesWriter::open(path, mode)
                        .await
                        .map_err(|source| CrawlError::Output {
                            path: path.clone(),
                            source,
                        })?;
                    writer = Some(opened);
                }
                if let Some(out) = writer.as_mut() {
                    for doc in &fresh {
                        out.append(doc).await.map_err(|source| CrawlError::Output {
                            path: path.clone(),
                            source,
                        })?;
                    }
                }
            }
        }

        summary.documents = self.stubs.len();
        info!(
            pages = summary.pages_fetched,
            documents = summary.documents,
            duplicates = summary.duplicates,
            requests = session.requests(),
            saved = writer.as_ref().map_or(0, JsonLinesWriter::lines),
            "metadata crawl complete"
        );
        Ok(summary)
    }

    /// POST the search form for one page and decode the response.
    #[instrument(level = "debug", skip(self, session))]
    async fn fetch_page(
        &self,
        session: &mut CrawlSession,
        page: u32,
    ) -> Result<SearchPage, FetchError> {
        let url = self.config.site.search_api_url();
        let token = session.token().unwrap_or_default().to_string();
        let form = [
            ("PageSize", self.config.page_size.to_string()),
            ("Page", page.to_string()),
            ("Keywords", self.config.keyword.clone()),
            ("CategoryId", self.config.category_id.to_string()),
            ("TypeId", "1".to_string()),
            (TOKEN_FIELD, token),
        ];
        let headers = [
            ("Referer", self.config.site.search_page_url()),
            ("Origin", self.config.site.origin().to_string()),
            ("X-Requested-With", "XMLHttpRequest".to_string()),
        ];

        let body = session.post_form(&url, &form[..], &headers).await?;
        serde_json::from_str::<SearchPage>(&body).map_err(|source| {
            debug!(preview = %truncate_for_log(&body, 300), "undecodable search response");
            FetchError::Decode { url, source }
        })
    }

    /// Keep documents with an unseen id; return the raw documents kept.
    fn collect(&mut self, documents: Vec<Value>, summary: &mut CrawlSummary) -> Vec<Value> {
        let mut fresh = Vec::with_capacity(documents.len());
        for doc in documents {
            let stub = match serde_json::from_value::<ArticleStub>(doc.clone()) {
                Ok(stub) if !stub.id.is_null() => stub,
                Ok(_) | Err(_) => {
                    summary.undecodable += 1;
                    warn!(document = %truncate_for_log(&doc.to_string(), 200), "document without usable Id");
                    continue;
                }
            };
            if !self.seen.insert(stub.id.clone()) {
                summary.duplicates += 1;
                debug!(id = %stub.id, "duplicate document");
                continue;
            }
            self.stubs.push(stub);
            fresh.push(doc);
        }
        fresh
    }
}
