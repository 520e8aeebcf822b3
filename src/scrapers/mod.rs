//! Anadolu Agency crawlers.
//!
//! Collection runs in two phases, each a strictly sequential request loop:
//!
//! 1. **Metadata**: [`metadata`] pages through the search API behind an
//!    anti-forgery token and stores the raw result documents.
//! 2. **Bodies**: [`bodies`] visits each document's article page, extracts
//!    the text and appends one record per article, resuming from its own
//!    output.
//!
//! # Failure Policy
//!
//! | Phase | On request failure |
//! |-------|--------------------|
//! | Metadata | Abort the crawl; pages already written stay on disk |
//! | Bodies | Retry with widening random backoff, then record empty text |

pub mod bodies;
pub mod metadata;
