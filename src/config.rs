//! YAML configuration file.
//!
//! Every field is optional. Values are layered as edition defaults, then
//! this file, then command-line flags (see [`crate::cli`]).
//!
//! ```yaml
//! site:
//!   origin: https://www.aa.com.tr
//!   edition: en
//!   request_timeout_secs: 25
//! metadata:
//!   max_pages: 50
//!   save_path: data/aa_metadata.jsonl
//! fetcher:
//!   input: data/aa_metadata.jsonl
//!   output: data/aa_bodies.jsonl
//!   max_retries: 3
//! ```

use crate::error::ConfigError;
use crate::pacing::MAX_DELAY;
use crate::scrapers::bodies::FetcherConfig;
use crate::scrapers::metadata::MetadataConfig;
use crate::site::{Edition, Site, DEFAULT_ORIGIN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Default body output file.
pub const DEFAULT_BODIES_PATH: &str = "aa_bodies.jsonl";

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub site: SiteSettings,
    pub metadata: MetadataSettings,
    pub fetcher: FetcherSettings,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteSettings {
    pub origin: Option<String>,
    pub edition: Option<Edition>,
    pub request_timeout_secs: Option<f64>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetadataSettings {
    pub start_page: Option<u32>,
    pub max_pages: Option<u32>,
    pub category_id: Option<u32>,
    pub keyword: Option<String>,
    pub page_size: Option<u32>,
    pub min_delay_secs: Option<f64>,
    pub save_path: Option<PathBuf>,
    pub in_place: Option<bool>,
    pub stop_on_empty_page: Option<bool>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetcherSettings {
    /// Metadata file (`.json` or `.jsonl`) listing the articles.
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub resume_file: Option<PathBuf>,
    /// First stub index to process.
    pub start: Option<usize>,
    /// Stub index to stop before.
    pub end: Option<usize>,
    pub min_delay_secs: Option<f64>,
    pub max_retries: Option<u32>,
    pub session_reset_every: Option<u32>,
    pub min_text_chars: Option<usize>,
}

impl Settings {
    /// Read and parse a YAML settings file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?settings, "loaded settings");
        Ok(settings)
    }

    /// Load `path` when given, otherwise start from empty settings.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigError> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    pub fn site(&self) -> Result<Site, ConfigError> {
        Site::new(
            self.site.origin.as_deref().unwrap_or(DEFAULT_ORIGIN),
            self.site.edition.unwrap_or_default(),
        )
    }

    fn request_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        secs("request_timeout_secs", self.site.request_timeout_secs)
    }

    /// Edition defaults overlaid with the `site` and `metadata` sections.
    pub fn metadata_config(&self) -> Result<MetadataConfig, ConfigError> {
        let mut config = MetadataConfig::for_site(self.site()?);
        let m = &self.metadata;
        if let Some(v) = m.start_page {
            config.start_page = v;
        }
        if let Some(v) = m.max_pages {
            config.max_pages = v;
        }
        if let Some(v) = m.category_id {
            config.category_id = v;
        }
        if let Some(v) = &m.keyword {
            config.keyword = v.clone();
        }
        if let Some(v) = m.page_size {
            config.page_size = v;
        }
        if let Some(v) = secs("metadata.min_delay_secs", m.min_delay_secs)? {
            config.min_delay = v;
        }
        if let Some(v) = self.request_timeout()? {
            config.request_timeout = v;
        }
        if let Some(v) = &m.save_path {
            config.save_path = Some(v.clone());
        }
        if let Some(v) = m.in_place {
            config.in_place = v;
        }
        if let Some(v) = m.stop_on_empty_page {
            config.stop_on_empty_page = v;
        }
        config.validate()?;
        Ok(config)
    }

    /// Edition defaults overlaid with the `site` and `fetcher` sections.
    pub fn fetcher_config(&self) -> Result<FetcherConfig, ConfigError> {
        let mut config = FetcherConfig::for_site(self.site()?);
        let f = &self.fetcher;
        if let Some(v) = secs("fetcher.min_delay_secs", f.min_delay_secs)? {
            config.min_delay = v;
        }
        if let Some(v) = f.max_retries {
            config.max_retries = v;
        }
        if let Some(v) = f.session_reset_every {
            config.session_reset_every = v;
        }
        if let Some(v) = f.min_text_chars {
            config.min_text_chars = v;
        }
        if let Some(v) = self.request_timeout()? {
            config.request_timeout = v;
        }
        config.resume_file = f.resume_file.clone();
        config.validate()?;
        Ok(config)
    }

    /// Body output path, defaulting to [`DEFAULT_BODIES_PATH`].
    pub fn bodies_output(&self) -> PathBuf {
        self.fetcher
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BODIES_PATH))
    }
}

fn secs(field: &'static str, value: Option<f64>) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|v| match Duration::try_from_secs_f64(v) {
            Ok(d) if d <= MAX_DELAY => Ok(d),
            _ => Err(ConfigError::Delay {
                field,
                value: v,
                max: MAX_DELAY.as_secs(),
            }),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_yaml(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_empty_settings_use_edition_defaults() {
        let settings = Settings::default();
        let meta = settings.metadata_config().unwrap();
        assert_eq!(meta.site.edition(), Edition::Turkish);
        assert_eq!(meta.category_id, 2);
        assert_eq!(meta.keyword, "");
        assert_eq!(meta.page_size, 20);

        let fetch = settings.fetcher_config().unwrap();
        assert_eq!(fetch.max_retries, 2);
        assert_eq!(fetch.session_reset_every, 20);
        assert_eq!(fetch.min_delay, Duration::from_secs(1));
        assert_eq!(settings.bodies_output(), PathBuf::from("aa_bodies.jsonl"));
    }

    #[test]
    fn test_file_overrides_edition_defaults() {
        let file = write_yaml(
            "site:\n  edition: en\n  request_timeout_secs: 5\nmetadata:\n  max_pages: 7\n  min_delay_secs: 0.5\nfetcher:\n  max_retries: 4\n  output: out/bodies.jsonl\n",
        );
        let settings = Settings::load(file.path()).unwrap();

        let meta = settings.metadata_config().unwrap();
        assert_eq!(meta.site.edition(), Edition::English);
        assert_eq!(meta.category_id, 4);
        assert_eq!(meta.keyword, "* * *");
        assert_eq!(meta.max_pages, 7);
        assert_eq!(meta.min_delay, Duration::from_millis(500));
        assert_eq!(meta.request_timeout, Duration::from_secs(5));

        let fetch = settings.fetcher_config().unwrap();
        assert_eq!(fetch.max_retries, 4);
        assert_eq!(fetch.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.bodies_output(), PathBuf::from("out/bodies.jsonl"));
    }

    #[test]
    fn test_unknown_key_is_parse_error() {
        let file = write_yaml("metadata:\n  pages: 3\n");
        assert!(matches!(
            Settings::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        assert!(matches!(
            Settings::load(Path::new("/nonexistent/aa.yaml")),
            Err(ConfigError::Read { .. })
        ));
        assert_eq!(Settings::load_optional(None).unwrap(), Settings::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut settings = Settings::default();
        settings.fetcher.max_retries = Some(0);
        assert!(matches!(
            settings.fetcher_config(),
            Err(ConfigError::Zero { field: "max_retries" })
        ));

        let mut settings = Settings::default();
        settings.metadata.min_delay_secs = Some(-1.0);
        assert!(matches!(
            settings.metadata_config(),
            Err(ConfigError::Delay { .. })
        ));

        let mut settings = Settings::default();
        settings.fetcher.min_delay_secs = Some(1e19);
        assert!(matches!(
            settings.fetcher_config(),
            Err(ConfigError::Delay {
                field: "fetcher.min_delay_secs",
                ..
            })
        ));

        let mut settings = Settings::default();
        settings.site.request_timeout_secs = Some(f64::NAN);
        assert!(matches!(
            settings.metadata_config(),
            Err(ConfigError::Delay { .. })
        ));

        let mut settings = Settings::default();
        settings.site.origin = Some("not a url".to_string());
        assert!(matches!(settings.site(), Err(ConfigError::Origin { .. })));
    }
}
