//! Output files and resume state.
//!
//! # Submodules
//!
//! - [`jsonl`]: line-atomic JSON Lines writer and tolerant reader
//! - [`progress`]: the detail fetcher's resume set, rebuilt from its output
//!
//! # Output Structure
//!
//! ```text
//! data/
//! ├── aa_metadata_2025-05-06.jsonl   # raw search documents, one per line
//! └── aa_bodies.jsonl                # {"Id","Title","Url","full_text"} per line
//! ```

pub mod jsonl;
pub mod progress;
