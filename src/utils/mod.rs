//! Utility modules supporting the lookup pipeline.
//!
//! - [`deduplicate_by_title`]: Remove publications whose exact title was already seen
//! - [`HttpClient`]: Shared reqwest client with timeouts and user agent
//! - [`RetryPolicy`]: Attempt budget, backoff, pacing and the transient-error predicate
//! - [`with_retry`]: Caller-side retry loop driven by a [`RetryPolicy`]
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use journal_lookup::utils::{with_retry, RetryPolicy};
//! use journal_lookup::sources::SourceError;
//!
//! # async fn fetch_data() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let policy = RetryPolicy::default().max_attempts(3);
//! let result = with_retry(&policy, || fetch_data()).await?;
//! # Ok(())
//! # }
//! ```

mod dedup;
mod http;
mod retry;

pub use dedup::deduplicate_by_title;
pub use http::{HttpClient, DEFAULT_TIMEOUT};
pub use retry::{with_retry, RetryPolicy, TransientError};
