//! Remote retrieval from PubMed.
//!
//! This module defines the [`Transport`] trait: the raw E-utilities calls
//! (`esearch` for identifiers, `efetch` for article XML). [`EntrezTransport`]
//! talks HTTP to NCBI; tests plug in scripted transports.
//!
//! [`RetrievalClient`] sits on top of a transport and owns the service
//! etiquette: a mandatory pause before every fetch, classification of
//! overload / rate-limit responses into [`SourceError::Retryable`] after a
//! fixed backoff, and parsing of response bodies into [`RawRecord`]s.
//!
//! Fetches are issued one at a time. NCBI rejects clients that do not pace
//! their requests, so nothing here runs concurrently.

mod client;
mod pubmed;
mod records;

pub use client::RetrievalClient;
pub use pubmed::{EntrezTransport, EUTILS_BASE_URL};
pub use records::{
    extract, extract_article, parse_fetch_response, parse_search_response, RawArticle, RawRecord,
};

use async_trait::async_trait;

/// Raw access to the E-utilities endpoints
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Human-readable name of the remote service
    fn name(&self) -> &str;

    /// Run a search and return the raw response body
    async fn esearch(&self, term: &str) -> Result<String, SourceError>;

    /// Fetch one record and return the raw response body
    async fn efetch(&self, id: &str) -> Result<String, SourceError>;
}

/// Errors that can occur when talking to the remote service
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP failure; `status` is set when the server answered
    #[error("Transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The service is overloaded or rate limiting; try again later
    #[error("Service asked to retry later (HTTP {status})")]
    Retryable { status: u16 },

    /// The request succeeded but the body could not be understood
    #[error("Unparsable response: {0}")]
    Parse(String),

    /// A search failed; carries the query that caused it
    #[error("Search failed for query {query}: {source}")]
    Query {
        query: String,
        #[source]
        source: Box<SourceError>,
    },
}

impl SourceError {
    /// HTTP status attached to this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Transport { status, .. } => *status,
            SourceError::Retryable { status } => Some(*status),
            SourceError::Query { source, .. } => source.status(),
            SourceError::Parse(_) => None,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<quick_xml::DeError> for SourceError {
    fn from(err: quick_xml::DeError) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
