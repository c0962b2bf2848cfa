//! Rate-limited access to a [`Transport`].

use tokio::time::sleep;

use crate::models::QuerySpec;
use crate::sources::records::{parse_fetch_response, parse_search_response, RawRecord};
use crate::sources::{SourceError, Transport};
use crate::utils::RetryPolicy;

/// Paces fetches, classifies transient failures, and parses responses
///
/// The client never retries on its own. A transient failure costs one
/// backoff delay and comes back as [`SourceError::Retryable`]; the caller
/// decides whether to try again (see [`crate::utils::with_retry`]).
#[derive(Debug, Clone)]
pub struct RetrievalClient<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: Transport> RetrievalClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Run one search and return the matching PubMed identifiers
    ///
    /// Failures are not retried; they come back wrapped in
    /// [`SourceError::Query`] so the caller can report and skip the query.
    pub async fn search(&self, query: &QuerySpec) -> Result<Vec<String>, SourceError> {
        let term = query.term();
        tracing::debug!("Searching {}: {}", self.transport.name(), term);

        let annotate = |source: SourceError| SourceError::Query {
            query: term.clone(),
            source: Box::new(source),
        };

        let body = self.transport.esearch(&term).await.map_err(annotate)?;
        let ids = parse_search_response(&body).map_err(annotate)?;

        tracing::debug!("Query matched {} identifiers", ids.len());
        Ok(ids)
    }

    /// Fetch one record
    ///
    /// Always waits the pacing interval first, on every call including
    /// retries. Overload and rate-limit responses wait the backoff interval
    /// and return [`SourceError::Retryable`]; anything else propagates as is.
    pub async fn fetch(&self, id: &str) -> Result<RawRecord, SourceError> {
        sleep(self.policy.pacing).await;

        let body = match self.transport.efetch(id).await {
            Ok(body) => body,
            Err(err) => {
                if let Some(transient) = self.policy.classify(&err) {
                    tracing::warn!(
                        "{:?} fetching PMID {}, waiting {:?} before retrying",
                        transient,
                        id,
                        self.policy.backoff
                    );
                    sleep(self.policy.backoff).await;
                    return Err(SourceError::Retryable {
                        status: err.status().unwrap_or_default(),
                    });
                }
                return Err(err);
            }
        };

        parse_fetch_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateWindow;
    use crate::utils::with_retry;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    const ARTICLE: &str = "<PubmedArticleSet><PubmedArticle><MedlineCitation><Article>\
        <ArticleTitle>T</ArticleTitle><Abstract><AbstractText>A</AbstractText></Abstract>\
        </Article></MedlineCitation></PubmedArticle></PubmedArticleSet>";

    /// Transport that replays canned fetch outcomes and counts calls
    #[derive(Debug, Default)]
    struct ScriptedTransport {
        search: Mutex<Option<Result<String, SourceError>>>,
        fetches: Mutex<VecDeque<Result<String, SourceError>>>,
        fetch_calls: Mutex<usize>,
    }

    impl ScriptedTransport {
        fn with_fetches(fetches: Vec<Result<String, SourceError>>) -> Self {
            Self {
                fetches: Mutex::new(fetches.into()),
                ..Default::default()
            }
        }

        fn with_search(search: Result<String, SourceError>) -> Self {
            Self {
                search: Mutex::new(Some(search)),
                ..Default::default()
            }
        }

        fn fetch_calls(&self) -> usize {
            *self.fetch_calls.lock().unwrap()
        }
    }

    fn http(status: u16) -> SourceError {
        SourceError::Transport {
            status: Some(status),
            message: format!("HTTP {}", status),
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn esearch(&self, _term: &str) -> Result<String, SourceError> {
            self.search
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok("<eSearchResult><IdList/></eSearchResult>".to_string()))
        }

        async fn efetch(&self, _id: &str) -> Result<String, SourceError> {
            *self.fetch_calls.lock().unwrap() += 1;
            self.fetches
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ARTICLE.to_string()))
        }
    }

    fn query() -> QuerySpec {
        let window = DateWindow::new(
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            NaiveDate::from_ymd_opt(3000, 1, 1).unwrap(),
        );
        QuerySpec::new("rna", "Cell", window)
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_rate_limits_then_success() {
        let transport = ScriptedTransport::with_fetches(vec![
            Err(http(429)),
            Err(http(429)),
            Ok(ARTICLE.to_string()),
        ]);
        let policy = RetryPolicy::default().max_attempts(3);
        let client = RetrievalClient::new(transport, policy);

        let start = Instant::now();
        let record = with_retry(client.policy(), || client.fetch("1")).await.unwrap();

        assert_eq!(record.articles.len(), 1);
        assert_eq!(client.transport().fetch_calls(), 3);
        // three pacing pauses and exactly two backoffs
        assert_eq!(start.elapsed(), Duration::from_secs(3 + 2 * 10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_precedes_every_fetch() {
        let client = RetrievalClient::new(ScriptedTransport::default(), RetryPolicy::default());

        let start = Instant::now();
        for id in ["1", "2", "3"] {
            client.fetch(id).await.unwrap();
        }

        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_error_is_retryable() {
        let transport = ScriptedTransport::with_fetches(vec![Err(http(500))]);
        let client = RetrievalClient::new(transport, RetryPolicy::default());

        let start = Instant::now();
        let err = client.fetch("1").await.unwrap_err();

        assert!(matches!(err, SourceError::Retryable { status: 500 }));
        assert_eq!(start.elapsed(), Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_failures_propagate_without_backoff() {
        let transport = ScriptedTransport::with_fetches(vec![Err(http(404))]);
        let client = RetrievalClient::new(transport, RetryPolicy::default().max_attempts(3));

        let start = Instant::now();
        let err = with_retry(client.policy(), || client.fetch("1"))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(matches!(err, SourceError::Transport { .. }));
        assert_eq!(client.transport().fetch_calls(), 1);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let transport = ScriptedTransport::with_fetches(vec![Err(http(429)), Err(http(429))]);
        let client = RetrievalClient::new(transport, RetryPolicy::default());

        let err = with_retry(client.policy(), || client.fetch("1"))
            .await
            .unwrap_err();

        assert!(matches!(err, SourceError::Retryable { status: 429 }));
        assert_eq!(client.transport().fetch_calls(), 2);
    }

    #[tokio::test]
    async fn test_unparsable_fetch_body() {
        let transport =
            ScriptedTransport::with_fetches(vec![Ok("<html>maintenance</html>".to_string())]);
        let policy = RetryPolicy::default().pacing(Duration::ZERO);
        let client = RetrievalClient::new(transport, policy);

        assert!(matches!(
            client.fetch("1").await,
            Err(SourceError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_search_failure_is_annotated_with_query() {
        let client = RetrievalClient::new(
            ScriptedTransport::with_search(Err(http(502))),
            RetryPolicy::default(),
        );

        let err = client.search(&query()).await.unwrap_err();
        match err {
            SourceError::Query { query, source } => {
                assert!(query.contains("\"Cell\"[Journal]"));
                assert_eq!(source.status(), Some(502));
            }
            other => panic!("expected query error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_returns_ids() {
        let client = RetrievalClient::new(
            ScriptedTransport::with_search(Ok(
                "<eSearchResult><IdList><Id>7</Id><Id>8</Id></IdList></eSearchResult>".to_string(),
            )),
            RetryPolicy::default(),
        );

        assert_eq!(client.search(&query()).await.unwrap(), vec!["7", "8"]);
    }
}
