//! # Journal Lookup
//!
//! Finds recent PubMed publications for a set of journals and topics and
//! turns them into a paginated report, one page per publication.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Query planning and the publication record model
//! - [`sources`]: PubMed transport, rate-limited client, response parsing and extraction
//! - [`utils`]: HTTP client, retry policy, deduplication
//! - [`report`]: Text layout, report assembly and document renderers
//! - [`pipeline`]: The end-to-end lookup run
//! - [`config`]: Lookup file and runtime settings
//! - [`ui`]: Terminal output

pub mod config;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod sources;
pub mod ui;
pub mod utils;

// Re-export commonly used types
pub use models::{PublicationRecord, PublicationSet, QuerySpec};
pub use pipeline::{LookupError, Pipeline, RunOutcome};
pub use sources::{RetrievalClient, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Date of the last behavioural update, `YYYYMMDD`
pub const LAST_UPDATED: &str = "20240710";
