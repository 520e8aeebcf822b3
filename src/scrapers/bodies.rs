//! Resumable detail-page fetcher.
//!
//! Visits the page of every [`ArticleStub`], extracts the body text and
//! appends one [`ArticleRecord`] per stub to a JSON Lines file. The output
//! file doubles as the resume state: ids already present in it are skipped
//! on the next run.
//!
//! Unlike the metadata crawler, a failing article never stops the batch: it
//! is retried up to `max_retries` times and then recorded with empty text.

use crate::error::{ConfigError, FetcherError};
use crate::extract::{BodyExtractor, SelectorExtractor};
use crate::http::HttpTransport;
use crate::models::{ArticleRecord, ArticleStub, FetchSummary};
use crate::outputs::jsonl::{read_lines, JsonLinesWriter, WriteMode};
use crate::outputs::progress::FetchProgress;
use crate::pacing::{Pacer, RetryPolicy, MAX_DELAY};
use crate::session::CrawlSession;
use crate::site::Site;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Constructor-level settings of a detail fetch.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub site: Site,
    pub min_delay: Duration,
    /// Attempts per article, including the first.
    pub max_retries: u32,
    /// Replace the transport after this many fetched articles.
    pub session_reset_every: u32,
    pub request_timeout: Duration,
    /// Texts shorter than this are written but counted as failures.
    pub min_text_chars: usize,
    /// Extra file of earlier records whose ids count as done.
    pub resume_file: Option<PathBuf>,
}

impl FetcherConfig {
    /// Defaults for the site's edition.
    pub fn for_site(site: Site) -> Self {
        let edition = site.edition();
        Self {
            site,
            min_delay: edition.default_min_delay(),
            max_retries: edition.default_max_retries(),
            session_reset_every: 20,
            request_timeout: Duration::from_secs(25),
            min_text_chars: 50,
            resume_file: None,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::Zero {
                field: "max_retries",
            });
        }
        if self.session_reset_every == 0 {
            return Err(ConfigError::Zero {
                field: "session_reset_every",
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

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.min_delay)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self::for_site(Site::default())
    }
}

/// What happened to one stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// A record was appended; `success` tells whether the text is usable.
    Written { chars: usize, success: bool },
    /// No usable route: nothing written, not marked done.
    MissingRoute,
    /// Already present in the output or resume file.
    AlreadyDone,
}

/// Sequential, resumable article body fetcher.
#[derive(Debug)]
pub struct DetailFetcher<E = SelectorExtractor> {
    config: FetcherConfig,
    extractor: E,
    progress: FetchProgress,
}

impl DetailFetcher<SelectorExtractor> {
    /// Fetcher using the extraction preset of the site's edition.
    pub fn new(config: FetcherConfig) -> Result<Self, ConfigError> {
        let extractor = SelectorExtractor::for_edition(config.site.edition())?;
        Self::with_extractor(config, extractor)
    }
}

impl<E: BodyExtractor> DetailFetcher<E> {
    pub fn with_extractor(config: FetcherConfig, extractor: E) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            extractor,
            progress: FetchProgress::default(),
        })
    }

    /// Ids known to be written, as of the last [`run`](Self::run).
    pub fn progress(&self) -> &FetchProgress {
        &self.progress
    }

    /// Fetch every stub not yet present in `output`, appending to it.
    #[instrument(level = "info", skip_all, fields(output = %output.display(), stubs = stubs.len()))]
    pub async fn run(
        &mut self,
        stubs: &[ArticleStub],
        output: &Path,
    ) -> Result<FetchSummary, FetcherError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| FetcherError::Io { path, source }
        };

        // open first: it drops a partial last line before progress replays it
        let mut writer = JsonLinesWriter::open(output, WriteMode::Append)
            .await
            .map_err(io_err(output))?;
        self.progress = FetchProgress::load(output, self.config.resume_file.as_deref())
            .await
            .map_err(io_err(output))?;
        if self.progress.is_empty() {
            info!("no previous output; starting fresh");
        }

        let transport =
            HttpTransport::new(self.config.request_timeout).map_err(FetcherError::Client)?;
        let mut session = CrawlSession::anonymous(transport, Pacer::new(self.config.min_delay));

        let mut summary = FetchSummary {
            total: stubs.len(),
            ..FetchSummary::default()
        };

        for (i, stub) in stubs.iter().enumerate() {
            let outcome = self
                .process(&mut session, &mut writer, stub, summary.attempted)
                .await?;
            match outcome {
                ItemOutcome::Written { chars, success } => {
                    summary.attempted += 1;
                    if success {
                        summary.succeeded += 1;
                    } else {
                        summary.failed += 1;
                    }
                    info!(
                        item = i + 1,
                        total = summary.total,
                        id = %stub.id,
                        chars,
                        "article recorded"
                    );
                }
                ItemOutcome::MissingRoute => summary.missing_route += 1,
                ItemOutcome::AlreadyDone => summary.already_done += 1,
            }
        }

        summary.session_resets = session.transport().resets();
        info!(
            succeeded = summary.succeeded,
            total = summary.total,
            failed = summary.failed,
            missing_route = summary.missing_route,
            already_done = summary.already_done,
            requests = session.requests(),
            "detail fetch complete"
        );
        Ok(summary)
    }

    /// Handle one stub. `fetched` is the number of articles fetched so far
    /// in this run and drives session rotation.
    async fn process(
        &mut self,
        session: &mut CrawlSession,
        writer: &mut JsonLinesWriter,
        stub: &ArticleStub,
        fetched: usize,
    ) -> Result<ItemOutcome, FetcherError> {
        let Some(route) = stub.route_str() else {
            warn!(id = %stub.id, "skipping stub without route");
            return Ok(ItemOutcome::MissingRoute);
        };
        if self.progress.contains(&stub.id) {
            debug!(id = %stub.id, "already downloaded");
            return Ok(ItemOutcome::AlreadyDone);
        }
        let url = self.config.site.article_url(route);

        let every = self.config.session_reset_every as usize;
        if fetched > 0 && fetched % every == 0 {
            session.rotate().map_err(FetcherError::Client)?;
            info!(after = fetched, "rotated HTTP session");
        }
        session.transport_mut().rotate_identity();

        let text = self.fetch_body(session, &url).await;
        let chars = text.chars().count();
        let success = chars > 0 && chars >= self.config.min_text_chars;
        if !success {
            warn!(%url, chars, "failed or empty article");
        }

        let record = ArticleRecord {
            id: stub.id.clone(),
            title: stub.title.clone(),
            url,
            full_text: text,
        };
        writer
            .append(&record)
            .await
            .map_err(|source| FetcherError::Io {
                path: writer.path().to_path_buf(),
                source,
            })?;
        self.progress.insert(&stub.id);

        session.pacer().pause().await;
        Ok(ItemOutcome::Written { chars, success })
    }

    /// Fetch and extract one article, retrying transport failures.
    ///
    /// Returns an empty string once the attempts are exhausted or when the
    /// page has no body container.
    #[instrument(level = "debug", skip(self, session))]
    async fn fetch_body(&self, session: &mut CrawlSession, url: &str) -> String {
        let policy = self.config.retry_policy();
        let mut attempt = 0u32;
        loop {
            match session.get_text(url).await {
                Ok(html) => {
                    let extraction = self.extractor.extract(&html);
                    if !extraction.found {
                        warn!(%url, "body container not found");
                    }
                    return extraction.text;
                }
                Err(e) => {
                    attempt += 1;
                    if !policy.should_retry(attempt) {
                        error!(%url, attempt, max = policy.max_retries, error = %e, "giving up on article");
                        return String::new();
                    }
                    let delay = policy.backoff(attempt);
                    warn!(
                        %url,
                        attempt,
                        max = policy.max_retries,
                        ?delay,
                        ceiling = ?policy.backoff_ceiling(attempt),
                        error = %e,
                        "fetch failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Load stubs from a `.jsonl` (one object per line) or `.json` (array)
/// metadata file. Entries that are not stubs are skipped.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_stubs(path: &Path) -> Result<Vec<ArticleStub>, FetcherError> {
    let io_err = |source| FetcherError::Io {
        path: path.to_path_buf(),
        source,
    };
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let (stubs, skipped) = match ext.as_deref() {
        Some("jsonl") => {
            let read = read_lines::<ArticleStub>(path, false).await.map_err(io_err)?;
            (read.items, read.malformed)
        }
        Some("json") => {
            let raw = tokio::fs::read_to_string(path).await.map_err(io_err)?;
            let values: Vec<Value> =
                serde_json::from_str(&raw).map_err(|source| FetcherError::InvalidInput {
                    path: path.to_path_buf(),
                    source,
                })?;
            let total = values.len();
            let stubs: Vec<ArticleStub> = values
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect();
            let skipped = total - stubs.len();
            (stubs, skipped)
        }
        _ => {
            return Err(FetcherError::UnsupportedInput {
                path: path.to_path_buf(),
            })
        }
    };

    let before = stubs.len();
    let stubs: Vec<ArticleStub> = stubs.into_iter().filter(|s| !s.id.is_null()).collect();
    let skipped = skipped + (before - stubs.len());

    if skipped > 0 {
        warn!(skipped, "metadata entries without a usable shape");
    }
    info!(count = stubs.len(), "loaded metadata rows");
    Ok(stubs)
}

/// The `[start, end)` slice of `stubs`, clamped to its bounds.
pub fn window(stubs: &[ArticleStub], start: usize, end: Option<usize>) -> &[ArticleStub] {
    let end = end.unwrap_or(stubs.len()).min(stubs.len());
    let start = start.min(end);
    &stubs[start..end]
}
