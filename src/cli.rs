//! Command-line interface definitions for the AA crawler.
//!
//! Every flag is optional and overrides the matching entry of the YAML
//! config file, which in turn overrides the edition defaults.

use crate::config::Settings;
use crate::site::Edition;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the crawler.
///
/// # Examples
///
/// ```sh
/// # First 50 result pages of the English edition
/// aa_crawler --edition en metadata -n 50 -o data/aa_metadata_en.jsonl
///
/// # Bodies for rows 0..1000 of that file, resuming from earlier runs
/// aa_crawler --edition en bodies -i data/aa_metadata_en.jsonl -o data/aa_bodies_en.jsonl --end 1000
///
/// # Everything from a config file
/// aa_crawler --config crawl.yaml bodies
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true, env = "AA_CRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Site edition
    #[arg(short, long, global = true, value_enum, env = "AA_EDITION")]
    pub edition: Option<Edition>,

    /// Site origin, e.g. https://www.aa.com.tr
    #[arg(long, global = true, env = "AA_ORIGIN")]
    pub origin: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<f64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl search result pages into a metadata file
    Metadata(MetadataArgs),
    /// Download article bodies for the rows of a metadata file
    Bodies(BodiesArgs),
}

#[derive(Args, Debug, Default)]
pub struct MetadataArgs {
    /// First result page to request
    #[arg(long)]
    pub start_page: Option<u32>,

    /// Number of consecutive pages to request
    #[arg(short = 'n', long)]
    pub max_pages: Option<u32>,

    #[arg(long)]
    pub category_id: Option<u32>,

    /// Search keyword
    #[arg(short, long)]
    pub keyword: Option<String>,

    /// Results per page
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Minimum delay between requests, in seconds
    #[arg(long)]
    pub min_delay: Option<f64>,

    /// Metadata output file (defaults to aa_metadata_<date>.jsonl)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Append to the output file instead of truncating it
    #[arg(long)]
    pub append: bool,

    /// Stop at the first page without results
    #[arg(long)]
    pub stop_on_empty_page: bool,
}

#[derive(Args, Debug, Default)]
pub struct BodiesArgs {
    /// Metadata file to read (.json or .jsonl)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Body output file, also used to resume
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Earlier body file whose ids count as done
    #[arg(long)]
    pub resume_file: Option<PathBuf>,

    /// First row of the metadata file to process
    #[arg(long)]
    pub start: Option<usize>,

    /// Row to stop before
    #[arg(long)]
    pub end: Option<usize>,

    /// Minimum delay between requests, in seconds
    #[arg(long)]
    pub min_delay: Option<f64>,

    /// Attempts per article, including the first
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Rebuild the HTTP session after this many articles
    #[arg(long)]
    pub session_reset_every: Option<u32>,

    /// Texts shorter than this count as failures
    #[arg(long)]
    pub min_text_chars: Option<usize>,
}

fn set<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
    }
}

impl Cli {
    /// Overlay the flags given on the command line onto `settings`.
    pub fn apply(&self, settings: &mut Settings) {
        set(&mut settings.site.origin, &self.origin);
        set(&mut settings.site.edition, &self.edition);
        set(&mut settings.site.request_timeout_secs, &self.timeout);

        match &self.command {
            Command::Metadata(args) => {
                let m = &mut settings.metadata;
                set(&mut m.start_page, &args.start_page);
                set(&mut m.max_pages, &args.max_pages);
                set(&mut m.category_id, &args.category_id);
                set(&mut m.keyword, &args.keyword);
                set(&mut m.page_size, &args.page_size);
                set(&mut m.min_delay_secs, &args.min_delay);
                set(&mut m.save_path, &args.output);
                if args.append {
                    m.in_place = Some(false);
                }
                if args.stop_on_empty_page {
                    m.stop_on_empty_page = Some(true);
                }
            }
            Command::Bodies(args) => {
                let f = &mut settings.fetcher;
                set(&mut f.input, &args.input);
                set(&mut f.output, &args.output);
                set(&mut f.resume_file, &args.resume_file);
                set(&mut f.start, &args.start);
                set(&mut f.end, &args.end);
                set(&mut f.min_delay_secs, &args.min_delay);
                set(&mut f.max_retries, &args.max_retries);
                set(&mut f.session_reset_every, &args.session_reset_every);
                set(&mut f.min_text_chars, &args.min_text_chars);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_metadata_parsing() {
        let cli = Cli::parse_from([
            "aa_crawler",
            "--edition",
            "en",
            "metadata",
            "-n",
            "3",
            "--keyword",
            "energy",
            "-o",
            "out.jsonl",
            "--append",
        ]);

        assert_eq!(cli.edition, Some(Edition::English));
        let Command::Metadata(args) = &cli.command else {
            panic!("expected metadata subcommand");
        };
        assert_eq!(args.max_pages, Some(3));
        assert_eq!(args.keyword.as_deref(), Some("energy"));
        assert_eq!(args.output, Some(PathBuf::from("out.jsonl")));
        assert!(args.append);
        assert!(!args.stop_on_empty_page);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "aa_crawler",
            "bodies",
            "-i",
            "meta.json",
            "-e",
            "tr",
            "--start",
            "10",
            "--end",
            "20",
        ]);

        assert_eq!(cli.edition, Some(Edition::Turkish));
        let Command::Bodies(args) = &cli.command else {
            panic!("expected bodies subcommand");
        };
        assert_eq!(args.input, Some(PathBuf::from("meta.json")));
        assert_eq!((args.start, args.end), (Some(10), Some(20)));
    }

    #[test]
    fn test_rejects_unknown_edition() {
        assert!(Cli::try_parse_from(["aa_crawler", "--edition", "de", "metadata"]).is_err());
        assert!(Cli::try_parse_from(["aa_crawler"]).is_err());
    }

    #[test]
    fn test_flags_override_file_settings() {
        let mut settings = Settings::default();
        settings.site.edition = Some(Edition::English);
        settings.fetcher.max_retries = Some(5);
        settings.fetcher.session_reset_every = Some(10);

        let cli = Cli::parse_from(["aa_crawler", "bodies", "--max-retries", "3", "--min-delay", "0.25"]);
        cli.apply(&mut settings);

        let config = settings.fetcher_config().unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.session_reset_every, 10);
        assert_eq!(config.min_delay, Duration::from_millis(250));
        assert_eq!(config.site.edition(), Edition::English);
    }

    #[test]
    fn test_append_flag_disables_in_place() {
        let mut settings = Settings::default();
        let cli = Cli::parse_from(["aa_crawler", "metadata", "--append", "--stop-on-empty-page"]);
        cli.apply(&mut settings);

        let config = settings.metadata_config().unwrap();
        assert!(!config.in_place);
        assert!(config.stop_on_empty_page);
    }
}
