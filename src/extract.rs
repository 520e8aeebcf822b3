//! Article body extraction.
//!
//! Everything that knows about the site's markup lives behind
//! [`BodyExtractor`], so the fetcher's retry and pacing logic can be
//! exercised against canned HTML or a stub extractor.

use crate::error::ConfigError;
use crate::site::{Edition, BODY_CONTAINER, BODY_HEADINGS};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};

/// Result of running an extractor over a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    /// `false` when the body container was absent; `text` is empty then.
    pub found: bool,
}

impl Extraction {
    pub fn missing() -> Self {
        Self {
            text: String::new(),
            found: false,
        }
    }
}

pub trait BodyExtractor {
    fn extract(&self, html: &str) -> Extraction;
}

/// CSS-selector based extractor for the agency's article pages.
#[derive(Debug, Clone)]
pub struct SelectorExtractor {
    container: Selector,
    /// Headings and paragraphs together, so selection keeps document order.
    pieces: Selector,
    paragraphs: Selector,
    boilerplate: Vec<String>,
}

impl SelectorExtractor {
    pub fn new(
        container: &str,
        headings: &str,
        paragraphs: &str,
        boilerplate: Vec<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            container: parse_selector(container)?,
            pieces: parse_selector(&format!("{headings}, {paragraphs}"))?,
            paragraphs: parse_selector(paragraphs)?,
            boilerplate,
        })
    }

    /// Preset for one edition of the site.
    pub fn for_edition(edition: Edition) -> Result<Self, ConfigError> {
        Self::new(
            BODY_CONTAINER,
            BODY_HEADINGS,
            edition.paragraph_selector(),
            edition.boilerplate().iter().map(|s| s.to_string()).collect(),
        )
    }

    fn is_boilerplate(&self, text: &str) -> bool {
        self.boilerplate.iter().any(|b| text.contains(b.as_str()))
    }
}

impl BodyExtractor for SelectorExtractor {
    fn extract(&self, html: &str) -> Extraction {
        let document = Html::parse_document(html);
        let Some(container) = document.select(&self.container).next() else {
            return Extraction::missing();
        };

        let text = container
            .select(&self.pieces)
            .filter_map(|element| {
                let text = element_text(&element);
                if text.is_empty() {
                    return None;
                }
                if self.paragraphs.matches(&element) && self.is_boilerplate(&text) {
                    return None;
                }
                Some(text)
            })
            .join("\n");

        let text = if text.trim().is_empty() {
            element_text(&container)
        } else {
            text
        };

        Extraction { text, found: true }
    }
}

/// Trimmed text nodes of an element, joined by single spaces.
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .join(" ")
}

fn parse_selector(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css).map_err(|e| ConfigError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> String {
        format!("<html><body><header><p>Menu</p></header>{body}<footer><p>Footer</p></footer></body></html>")
    }

    fn english() -> SelectorExtractor {
        SelectorExtractor::new(
            BODY_CONTAINER,
            BODY_HEADINGS,
            "p",
            Edition::English.boilerplate().iter().map(|s| s.to_string()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_boilerplate_paragraph_is_dropped() {
        let html = page(
            r#"<div class="detay-icerik">
                <p>Real content.</p>
                <p>Please contact us for subscription options.</p>
            </div>"#,
        );
        let out = english().extract(&html);
        assert!(out.found);
        assert_eq!(out.text, "Real content.");
    }

    #[test]
    fn test_missing_container_is_empty_and_not_found() {
        let out = english().extract(&page("<div class=\"other\"><p>Nope</p></div>"));
        assert_eq!(out, Extraction::missing());
        assert_eq!(out.text, "");
    }

    #[test]
    fn test_headings_and_paragraphs_keep_document_order() {
        let html = page(
            r#"<div class="detay-icerik">
                <p>Intro paragraph.</p>
                <h3>First heading</h3>
                <p>Body <strong>with</strong> markup.</p>
                <h4>Second heading</h4>
                <p>   </p>
            </div>"#,
        );
        let out = english().extract(&html);
        assert_eq!(
            out.text,
            "Intro paragraph.\nFirst heading\nBody with markup.\nSecond heading"
        );
    }

    #[test]
    fn test_falls_back_to_container_text() {
        let html = page(
            r#"<div class="detay-icerik">
                <span>Only</span> <em>inline</em> text
                <p>Please contact us for subscription options.</p>
            </div>"#,
        );
        let out = english().extract(&html);
        assert!(out.found);
        assert!(out.text.starts_with("Only inline text"));
    }

    #[test]
    fn test_turkish_preset_filters_its_footer() {
        let extractor = SelectorExtractor::for_edition(Edition::Turkish).unwrap();
        let html = page(
            r#"<div class="detay-icerik">
                <p>Ankara'da toplantı yapıldı.</p>
                <p>AA'nın WhatsApp kanallarına katılın, önemli gelişmeler cebinize gelsin.</p>
            </div>"#,
        );
        assert_eq!(extractor.extract(&html).text, "Ankara'da toplantı yapıldı.");
    }

    #[test]
    fn test_english_preset_only_reads_shareable_paragraphs() {
        let extractor = SelectorExtractor::for_edition(Edition::English).unwrap();
        let html = page(
            r#"<div class="detay-icerik">
                <p class="selectionShareable">GENEVA</p>
                <p>Related: something else</p>
                <p class="selectionShareable">Talks resumed on Monday.</p>
            </div>"#,
        );
        assert_eq!(
            extractor.extract(&html).text,
            "GENEVA\nTalks resumed on Monday."
        );
    }

    #[test]
    fn test_invalid_selector_is_config_error() {
        let err = SelectorExtractor::new("div[", "h3", "p", vec![]).unwrap_err();
        assert!(matches!(err, ConfigError::Selector { .. }));
    }
}
