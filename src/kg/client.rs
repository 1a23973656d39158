//! Retrying query executor for the knowledge-graph search API

use super::results::{
    arxiv_search_string, doi_search_string, normalize_arxiv_results, normalize_doi_results,
    KgSearchResult, SearchPayload,
};
use crate::config::KgSettings;
use crate::curl::{curl_command, CurlBody};
use crate::network::HttpClient;
use crate::{DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Failure of a search query after every attempt was used up.
///
/// The final transport error is carried as the source; callers must
/// handle this explicitly, it is never mapped to a sentinel.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("search query failed after {attempts} attempts")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

/// Client for the MediaWiki `action=query&list=search` endpoint
pub struct KgClient {
    http: HttpClient,
    api_url: String,
    namespace: String,
}

impl KgClient {
    /// Create a client for the given endpoint settings
    pub fn new(http: HttpClient, settings: &KgSettings) -> Self {
        Self {
            http,
            api_url: settings.api_url.clone(),
            namespace: settings.namespace.clone(),
        }
    }

    /// Query pages mentioning an arXiv id, e.g. `"2104.06175"`.
    ///
    /// Searches for the literal `arXiv<id>MaRDI` pattern and extracts the
    /// QID from each snippet.
    pub async fn search_arxiv(&self, arxiv_id: &str) -> Result<Vec<KgSearchResult>, QueryError> {
        let payload = self
            .query(
                &arxiv_search_string(arxiv_id),
                DEFAULT_MAX_RETRIES,
                Duration::from_secs_f64(DEFAULT_RETRY_DELAY_SECS),
            )
            .await?;
        Ok(normalize_arxiv_results(&payload))
    }

    /// Query pages citing a DOI, e.g. `"10.1007/s40305-018-0210-x"`.
    ///
    /// Searches for the quoted `"doi.org/<doi>"` literal and derives the
    /// QID from each `Publication:<digits>` title.
    pub async fn search_doi(&self, doi: &str) -> Result<Vec<KgSearchResult>, QueryError> {
        let payload = self
            .query(
                &doi_search_string(doi),
                DEFAULT_MAX_RETRIES,
                Duration::from_secs_f64(DEFAULT_RETRY_DELAY_SECS),
            )
            .await?;
        Ok(normalize_doi_results(&payload))
    }

    /// Execute one search query with bounded retries.
    ///
    /// Sends one form-encoded POST per attempt. A failed transport, a
    /// non-2xx status and an undecodable body all count as failed
    /// attempts. The delay between attempts is constant; no backoff, no
    /// jitter. After the last attempt fails, a curl command reproducing
    /// the request is logged and the final error is returned.
    pub async fn query(
        &self,
        search: &str,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<SearchPayload, QueryError> {
        let max_retries = max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(search).await {
                Ok(payload) => return Ok(payload),
                Err(e) if attempt < max_retries => {
                    debug!(attempt, error = %e, "search attempt failed, retrying");
                    tokio::time::sleep(retry_delay).await;
                }
                Err(e) => {
                    error!("All retries failed. Curl for debugging:");
                    error!("{}", self.reproduction_command(search));
                    return Err(QueryError::RetriesExhausted {
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }

    /// Curl command equivalent to the POST this client sends for `search`
    pub fn reproduction_command(&self, search: &str) -> String {
        let params: BTreeMap<String, String> = self
            .search_params(search)
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        curl_command(&self.api_url, &params, CurlBody::Form)
    }

    fn search_params(&self, search: &str) -> Vec<(&'static str, String)> {
        vec![
            ("action", "query".to_string()),
            ("list", "search".to_string()),
            ("srsearch", search.to_string()),
            ("srnamespace", self.namespace.clone()),
            ("format", "json".to_string()),
        ]
    }

    async fn attempt(&self, search: &str) -> Result<SearchPayload, reqwest::Error> {
        let params = self.search_params(search);
        let form: Vec<(&str, &str)> = params.iter().map(|(k, v)| (*k, v.as_str())).collect();

        let response = self
            .http
            .inner()
            .post(&self.api_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;

        response.json::<SearchPayload>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: &str) -> KgClient {
        let settings = KgSettings {
            api_url: format!("{}/w/api.php", uri),
            namespace: "4206".to_string(),
        };
        KgClient::new(HttpClient::new().unwrap(), &settings)
    }

    #[tokio::test]
    async fn test_query_sends_search_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/w/api.php"))
            .and(body_string_contains("action=query"))
            .and(body_string_contains("list=search"))
            .and(body_string_contains("srnamespace=4206"))
            .and(body_string_contains("srsearch=test-query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"search": []}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let payload = client(&server.uri())
            .query("test-query", 1, Duration::ZERO)
            .await
            .unwrap();
        assert!(payload.query.unwrap().search.is_empty());
    }

    #[tokio::test]
    async fn test_query_retries_then_succeeds() {
        let server = MockServer::start().await;

        // First attempt fails, second succeeds
        Mock::given(method("POST"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"search": []}
            })))
            .mount(&server)
            .await;

        let payload = client(&server.uri())
            .query("test-query", 3, Duration::ZERO)
            .await
            .unwrap();

        assert!(payload.query.is_some());
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_query_exhausts_retries_and_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/w/api.php"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .query("final-query", 2, Duration::ZERO)
            .await
            .unwrap_err();

        match err {
            QueryError::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 2);
                assert_eq!(source.status().map(|s| s.as_u16()), Some(503));
            }
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reproduction_command_contains_search_parameter() {
        let kg = client("https://portal.example.org");
        let cmd = kg.reproduction_command("final-query");
        assert!(cmd.starts_with("curl -X POST "));
        assert!(cmd.contains("srsearch=final-query"));
        assert!(cmd.contains("srnamespace=4206"));
    }

    #[tokio::test]
    async fn test_search_arxiv_normalizes_hits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("srsearch=arXiv2104.06175MaRDI"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"search": [{
                    "title": "Publication:2176828",
                    "snippet": "Intro <span class=\"searchmatch\">QIDQ123</span> details"
                }]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client(&server.uri()).search_arxiv("2104.06175").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].qid.as_deref(), Some("Q123"));
        assert_eq!(results[0].snippet, "Intro QIDQ123 details");
    }

    #[tokio::test]
    async fn test_search_doi_normalizes_hits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("doi.org%2F10.1007%2Fs40305-018-0210-x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": {"search": [{
                    "title": "Publication:999",
                    "snippet": "Value <span class=\"searchmatch\">snippet</span>"
                }]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let results = client(&server.uri())
            .search_doi("10.1007/s40305-018-0210-x")
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].qid.as_deref(), Some("Q999"));
        assert_eq!(results[0].title, "Publication:999");
    }
}
