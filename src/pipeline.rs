//! The end-to-end lookup: plan, search, fetch, extract, deduplicate, report.
//!
//! Everything runs sequentially on the caller's task. A failed search skips
//! its query; a fetch that fails permanently skips its identifier. Only
//! configuration and output problems abort the run.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{ConfigError, LookupConfig};
use crate::models::{plan, DateFormatError, DateWindow, PublicationSet, QuerySpec};
use crate::report::{ensure_writable, DocumentRenderer, ReportAssembler, ReportError};
use crate::sources::{extract, RetrievalClient, SourceError, Transport};
use crate::utils::with_retry;

/// Errors that end a run
#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Date(#[from] DateFormatError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Counters collected during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub queries: usize,
    pub failed_queries: usize,
    pub identifiers: usize,
    pub failed_fetches: usize,
    pub extracted: usize,
    pub retained: usize,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Nothing survived extraction; no file was written
    NoResults(RunStats),
    Written {
        path: PathBuf,
        stats: RunStats,
        journal_counts: Vec<(String, usize)>,
    },
}

impl RunOutcome {
    pub fn stats(&self) -> &RunStats {
        match self {
            RunOutcome::NoResults(stats) => stats,
            RunOutcome::Written { stats, .. } => stats,
        }
    }
}

/// Observer for run progress; every hook defaults to doing nothing
pub trait ProgressSink: Send + Sync {
    fn query_started(&self, _index: usize, _total: usize, _query: &QuerySpec) {}

    fn identifiers_found(&self, _count: usize) {}

    fn fetch_finished(&self, _id: &str, _ok: bool) {}

    fn finished(&self) {}
}

/// A [`ProgressSink`] that ignores everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

pub struct Pipeline<T> {
    client: RetrievalClient<T>,
    assembler: ReportAssembler,
    renderer: Box<dyn DocumentRenderer>,
}

impl<T: Transport> Pipeline<T> {
    pub fn new(
        client: RetrievalClient<T>,
        assembler: ReportAssembler,
        renderer: Box<dyn DocumentRenderer>,
    ) -> Self {
        Self {
            client,
            assembler,
            renderer,
        }
    }

    pub fn client(&self) -> &RetrievalClient<T> {
        &self.client
    }

    /// Run a full lookup and write the report to `output`
    ///
    /// An existing `output` is rejected before any request is made.
    pub async fn run(
        &self,
        lookup: &LookupConfig,
        window: DateWindow,
        output: &Path,
        progress: &dyn ProgressSink,
    ) -> Result<RunOutcome, LookupError> {
        ensure_writable(output)?;

        let (publications, stats) = self.collect(lookup, window, progress).await;

        if publications.is_empty() {
            tracing::info!("No publications found for the given journals and topics");
            return Ok(RunOutcome::NoResults(stats));
        }

        let report = self.assembler.assemble(lookup, &window, &publications);
        self.renderer.render(&report, output)?;

        Ok(RunOutcome::Written {
            path: output.to_path_buf(),
            stats,
            journal_counts: report.journal_summary,
        })
    }

    /// Retrieve, extract and deduplicate without writing anything
    pub async fn collect(
        &self,
        lookup: &LookupConfig,
        window: DateWindow,
        progress: &dyn ProgressSink,
    ) -> (PublicationSet, RunStats) {
        let queries = plan(&lookup.journals, &lookup.topics, window);
        let mut stats = RunStats {
            queries: queries.len(),
            ..Default::default()
        };
        tracing::info!(
            "Running {} queries ({} journals x {} topics)",
            queries.len(),
            lookup.journals.len(),
            lookup.topics.len()
        );

        let mut records = Vec::new();
        for (index, query) in queries.iter().enumerate() {
            progress.query_started(index, queries.len(), query);

            let ids = match self.client.search(query).await {
                Ok(ids) => ids,
                Err(err) => {
                    tracing::warn!("Skipping query: {}", err);
                    stats.failed_queries += 1;
                    continue;
                }
            };
            tracing::info!(
                "{} / {}: {} identifiers",
                query.journal,
                query.keyword,
                ids.len()
            );
            stats.identifiers += ids.len();
            progress.identifiers_found(ids.len());

            for id in &ids {
                match with_retry(self.client.policy(), || self.client.fetch(id)).await {
                    Ok(record) => {
                        records.push(record);
                        progress.fetch_finished(id, true);
                    }
                    Err(err) => {
                        tracing::warn!("Skipping PMID {}: {}", id, err);
                        stats.failed_fetches += 1;
                        progress.fetch_finished(id, false);
                    }
                }
            }
        }
        progress.finished();

        let extracted = extract(&records);
        stats.extracted = extracted.len();

        let publications = PublicationSet::from_records(extracted);
        stats.retained = publications.len();

        tracing::info!(
            "Retained {} of {} extracted publications",
            stats.retained,
            stats.extracted
        );
        (publications, stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppInfo;
    use crate::report::{HtmlRenderer, LayoutBudgets};
    use crate::utils::RetryPolicy;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::tempdir;

    fn article(title: &str, journal: &str) -> String {
        format!(
            "<PubmedArticleSet><PubmedArticle><MedlineCitation><Article>\
             <Journal><Title>{}</Title></Journal>\
             <ArticleTitle>{}</ArticleTitle>\
             <Abstract><AbstractText>Abstract of {}</AbstractText></Abstract>\
             </Article></MedlineCitation></PubmedArticle></PubmedArticleSet>",
            journal, title, title
        )
    }

    /// Answers searches by journal name and fetches by identifier
    #[derive(Debug, Default)]
    struct MapTransport {
        searches: HashMap<String, Result<Vec<&'static str>, u16>>,
        articles: HashMap<&'static str, Result<String, u16>>,
        fetched: Mutex<Vec<String>>,
    }

    fn http(status: u16) -> SourceError {
        SourceError::Transport {
            status: Some(status),
            message: format!("HTTP {}", status),
        }
    }

    #[async_trait]
    impl Transport for MapTransport {
        fn name(&self) -> &str {
            "map"
        }

        async fn esearch(&self, term: &str) -> Result<String, SourceError> {
            let hit = self
                .searches
                .iter()
                .find(|(journal, _)| term.contains(&format!("\"{}\"[Journal]", journal)));
            match hit {
                Some((_, Ok(ids))) => Ok(format!(
                    "<eSearchResult><IdList>{}</IdList></eSearchResult>",
                    ids.iter()
                        .map(|id| format!("<Id>{}</Id>", id))
                        .collect::<String>()
                )),
                Some((_, Err(status))) => Err(http(*status)),
                None => Ok("<eSearchResult><IdList/></eSearchResult>".to_string()),
            }
        }

        async fn efetch(&self, id: &str) -> Result<String, SourceError> {
            self.fetched.lock().unwrap().push(id.to_string());
            match self.articles.get(id) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(http(*status)),
                None => Err(http(404)),
            }
        }
    }

    fn lookup(journals: &[&str]) -> LookupConfig {
        LookupConfig {
            contact: "reader@example.org".to_string(),
            journals: journals.iter().map(|j| j.to_string()).collect(),
            topics: vec!["rna".to_string()],
        }
    }

    fn pipeline(transport: MapTransport) -> Pipeline<MapTransport> {
        let policy = RetryPolicy::default()
            .pacing(Duration::ZERO)
            .backoff(Duration::ZERO);
        let today = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap();
        Pipeline::new(
            RetrievalClient::new(transport, policy),
            ReportAssembler::new(AppInfo::default(), LayoutBudgets::default(), today),
            Box::new(HtmlRenderer),
        )
    }

    fn window() -> DateWindow {
        DateWindow::last_week(NaiveDate::from_ymd_opt(2024, 7, 10).unwrap())
    }

    #[tokio::test]
    async fn test_failed_query_is_skipped() {
        let mut transport = MapTransport::default();
        transport.searches.insert("Broken".into(), Err(400));
        transport.searches.insert("Cell".into(), Ok(vec!["1"]));
        transport.articles.insert("1", Ok(article("Kept", "Cell")));

        let (set, stats) = pipeline(transport)
            .collect(&lookup(&["Broken", "Cell"]), window(), &NoProgress)
            .await;

        assert_eq!(set.len(), 1);
        assert_eq!(stats.queries, 2);
        assert_eq!(stats.failed_queries, 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_skipped() {
        let mut transport = MapTransport::default();
        transport.searches.insert("Cell".into(), Ok(vec!["1", "2", "3"]));
        transport.articles.insert("1", Ok(article("One", "Cell")));
        transport.articles.insert("2", Err(429));
        transport.articles.insert("3", Ok(article("Three", "Cell")));

        let pipeline = pipeline(transport);
        let (set, stats) = pipeline
            .collect(&lookup(&["Cell"]), window(), &NoProgress)
            .await;

        let titles: Vec<&str> = set.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Three"]);
        assert_eq!(stats.identifiers, 3);
        assert_eq!(stats.failed_fetches, 1);
        // identifier 2 used its full budget of two attempts
        let fetched = pipeline.client().transport().fetched.lock().unwrap().clone();
        assert_eq!(fetched, vec!["1", "2", "2", "3"]);
    }

    #[tokio::test]
    async fn test_duplicate_titles_across_queries() {
        let mut transport = MapTransport::default();
        transport.searches.insert("Nature".into(), Ok(vec!["1"]));
        transport.searches.insert("Cell".into(), Ok(vec!["2"]));
        transport.articles.insert("1", Ok(article("Same", "Nature")));
        transport.articles.insert("2", Ok(article("Same", "Cell")));

        let (set, stats) = pipeline(transport)
            .collect(&lookup(&["Nature", "Cell"]), window(), &NoProgress)
            .await;

        assert_eq!(stats.extracted, 2);
        assert_eq!(stats.retained, 1);
        assert_eq!(set.as_slice()[0].journal.as_deref(), Some("Nature"));
    }

    #[tokio::test]
    async fn test_run_writes_report() {
        let mut transport = MapTransport::default();
        transport.searches.insert("Cell".into(), Ok(vec!["1"]));
        transport.articles.insert("1", Ok(article("Written", "Cell")));

        let dir = tempdir().unwrap();
        let output = dir.path().join("publications.html");
        let outcome = pipeline(transport)
            .run(&lookup(&["Cell"]), window(), &output, &NoProgress)
            .await
            .unwrap();

        match outcome {
            RunOutcome::Written {
                path,
                journal_counts,
                ..
            } => {
                assert_eq!(path, output);
                assert_eq!(journal_counts, vec![("Cell".to_string(), 1)]);
            }
            other => panic!("expected a written report, got {:?}", other),
        }
        assert!(std::fs::read_to_string(&output).unwrap().contains("Written"));
    }

    #[tokio::test]
    async fn test_no_results_writes_nothing() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("publications.html");

        let outcome = pipeline(MapTransport::default())
            .run(&lookup(&["Cell"]), window(), &output, &NoProgress)
            .await
            .unwrap();

        assert!(matches!(outcome, RunOutcome::NoResults(_)));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_existing_output_aborts_before_requests() {
        let mut transport = MapTransport::default();
        transport.searches.insert("Cell".into(), Ok(vec!["1"]));
        transport.articles.insert("1", Ok(article("Never", "Cell")));

        let dir = tempdir().unwrap();
        let output = dir.path().join("publications.html");
        std::fs::write(&output, "old").unwrap();

        let pipeline = pipeline(transport);
        let err = pipeline
            .run(&lookup(&["Cell"]), window(), &output, &NoProgress)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LookupError::Report(ReportError::OutputExists(_))
        ));
        assert!(pipeline.client().transport().fetched.lock().unwrap().is_empty());
    }
}
