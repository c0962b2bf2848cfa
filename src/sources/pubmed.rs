//! PubMed transport using the NCBI E-utilities API.

use async_trait::async_trait;

use crate::sources::{SourceError, Transport};
use crate::utils::HttpClient;

/// PubMed E-utilities API root
pub const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// Default maximum number of identifiers returned by one search
pub const DEFAULT_RETMAX: u32 = 100_000;

/// HTTP transport for `esearch.fcgi` and `efetch.fcgi`
///
/// NCBI asks every client to identify itself with a tool name and a contact
/// e-mail; both are sent with each request.
#[derive(Debug, Clone)]
pub struct EntrezTransport {
    client: HttpClient,
    base_url: String,
    email: String,
    tool: String,
    api_key: Option<String>,
    retmax: u32,
}

impl EntrezTransport {
    /// Create a transport against the public E-utilities endpoint
    pub fn new(client: HttpClient, email: impl Into<String>) -> Self {
        Self {
            client,
            base_url: EUTILS_BASE_URL.to_string(),
            email: email.into(),
            tool: env!("CARGO_PKG_NAME").to_string(),
            api_key: None,
            retmax: DEFAULT_RETMAX,
        }
    }

    /// Point the transport at another E-utilities root (mirrors, tests)
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    pub fn api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn retmax(mut self, retmax: u32) -> Self {
        self.retmax = retmax;
        self
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("retmode", "xml".to_string()),
            ("tool", self.tool.clone()),
            ("email", self.email.clone()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    fn encode(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Build the E-utilities search URL
    fn build_search_url(&self, term: &str) -> String {
        let mut params = vec![
            ("term", term.to_string()),
            ("retmax", self.retmax.to_string()),
        ];
        params.extend(self.common_params());
        format!("{}/esearch.fcgi?{}", self.base_url, Self::encode(&params))
    }

    /// Build the E-utilities fetch URL for one PubMed ID
    fn build_fetch_url(&self, id: &str) -> String {
        let mut params = vec![("id", id.to_string()), ("rettype", "medline".to_string())];
        params.extend(self.common_params());
        format!("{}/efetch.fcgi?{}", self.base_url, Self::encode(&params))
    }

    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        tracing::debug!("GET {}", url);

        let response = self.client.client().get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Transport {
                status: Some(status.as_u16()),
                message: format!("PubMed API returned status: {}", status),
            });
        }

        response.text().await.map_err(|e| SourceError::Transport {
            status: None,
            message: format!("Failed to read response: {}", e),
        })
    }
}

#[async_trait]
impl Transport for EntrezTransport {
    fn name(&self) -> &str {
        "PubMed"
    }

    async fn esearch(&self, term: &str) -> Result<String, SourceError> {
        self.get_text(&self.build_search_url(term)).await
    }

    async fn efetch(&self, id: &str) -> Result<String, SourceError> {
        self.get_text(&self.build_fetch_url(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn transport() -> EntrezTransport {
        EntrezTransport::new(HttpClient::new().unwrap(), "reader@example.org")
    }

    #[test]
    fn test_build_search_url() {
        let url = transport().retmax(10).build_search_url(
            r#"cancer AND ("2024/07/01"[Date - Entry] : "3000/01/01"[Date - Entry]) AND "Cell"[Journal]"#,
        );

        assert!(url.starts_with("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi?"));
        assert!(url.contains("db=pubmed"));
        assert!(url.contains("term=cancer%20AND%20%28%222024%2F07%2F01%22%5BDate%20-%20Entry%5D"));
        assert!(url.contains("retmax=10"));
        assert!(url.contains("retmode=xml"));
        assert!(url.contains("email=reader%40example.org"));
        assert!(!url.contains("api_key"));
    }

    #[test]
    fn test_build_fetch_url() {
        let url = transport()
            .api_key(Some("secret".to_string()))
            .build_fetch_url("38970001");

        assert!(url.contains("/efetch.fcgi?"));
        assert!(url.contains("id=38970001"));
        assert!(url.contains("rettype=medline"));
        assert!(url.contains("api_key=secret"));
    }

    #[test]
    fn test_empty_api_key_is_ignored() {
        let url = transport()
            .api_key(Some(String::new()))
            .build_fetch_url("1");
        assert!(!url.contains("api_key"));
    }

    #[tokio::test]
    async fn test_esearch_returns_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/esearch.fcgi")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("db".into(), "pubmed".into()),
                Matcher::UrlEncoded("term".into(), "rna AND \"Cell\"[Journal]".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "text/xml")
            .with_body("<eSearchResult><IdList><Id>1</Id></IdList></eSearchResult>")
            .expect(1)
            .create_async()
            .await;

        let body = transport()
            .base_url(server.url())
            .esearch("rna AND \"Cell\"[Journal]")
            .await
            .unwrap();

        assert!(body.contains("<Id>1</Id>"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_efetch_reports_http_status() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/efetch.fcgi")
            .match_query(Matcher::UrlEncoded("id".into(), "42".into()))
            .with_status(429)
            .with_body("Too Many Requests")
            .expect(1)
            .create_async()
            .await;

        let err = transport()
            .base_url(format!("{}/", server.url()))
            .efetch("42")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(429));
        assert!(matches!(err, SourceError::Transport { .. }));
        mock.assert_async().await;
    }
}
