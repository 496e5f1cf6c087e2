//! HTTP draw source (500.com history pages)

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, REFERER, USER_AGENT};
use reqwest::Client;
use tracing::{debug, info, warn};

use super::{parse_document, DrawSource, FetchQuery};
use crate::draw::DrawRecord;
use crate::error::{Result, SourceError};
use crate::game::GameSchema;

const BROWSER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko)";

#[derive(Debug, Clone)]
pub struct HttpSourceOptions {
    /// Per-attempt request timeout
    pub timeout: Duration,
    /// Total attempts per request, at least one
    pub retries: u32,
    /// Pause between two attempts
    pub retry_pause: Duration,
}

impl Default for HttpSourceOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            retry_pause: Duration::from_secs(1),
        }
    }
}

/// Fetches history pages over HTTP and parses them with the schema's rules.
#[derive(Clone)]
pub struct HttpSource {
    client: Client,
    options: HttpSourceOptions,
}

impl HttpSource {
    pub fn new(options: HttpSourceOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));
        headers.insert(REFERER, HeaderValue::from_static("https://www.500.com/"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(options.timeout)
            .build()?;

        Ok(Self { client, options })
    }

    async fn get_page(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<String, SourceError> {
        let attempts = self.options.retries.max(1);
        let mut attempt = 1;
        loop {
            match self.try_get(url, params).await {
                Ok(body) => return Ok(body),
                Err(err) if attempt < attempts => {
                    warn!(url, attempt, error = %err, "fetch attempt failed, retrying");
                    tokio::time::sleep(self.options.retry_pause).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_get(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<String, SourceError> {
        let network = |e: reqwest::Error| SourceError::Network {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(network)
    }
}

/// Query parameters for `query`; the source takes short issue ids.
fn query_params(schema: &GameSchema, query: &FetchQuery) -> Vec<(&'static str, String)> {
    match query {
        FetchQuery::Range { start, end } => vec![
            ("start", schema.issue.short(start).to_string()),
            ("end", schema.issue.short(end).to_string()),
        ],
        FetchQuery::Latest { .. } => Vec::new(),
    }
}

impl DrawSource for HttpSource {
    fn name(&self) -> &str {
        "500.com"
    }

    async fn fetch(
        &self,
        schema: &GameSchema,
        query: &FetchQuery,
    ) -> Result<Vec<DrawRecord>, SourceError> {
        let params = query_params(schema, query);
        debug!(game = %schema.id, url = schema.source_url, ?params, "fetching");

        let body = self.get_page(schema.source_url, &params).await?;
        let parsed = parse_document(schema, &body)?;

        let mut records = parsed.records;
        if let FetchQuery::Latest { limit } = query {
            records.truncate(*limit);
        }

        info!(
            game = %schema.id,
            %query,
            records = records.len(),
            rejected = parsed.rejected,
            "fetched draws"
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameId;
    use crate::testing::{Reply, StubServer};

    fn quick(retries: u32) -> HttpSource {
        HttpSource::new(HttpSourceOptions {
            timeout: Duration::from_millis(200),
            retries,
            retry_pause: Duration::from_millis(10),
        })
        .unwrap()
    }

    #[test]
    fn test_range_query_uses_short_ids() {
        let schema = GameId::Dlt.schema();
        let query = FetchQuery::year(&schema, 2025);
        assert_eq!(
            query_params(&schema, &query),
            vec![("start", "25001".to_string()), ("end", "25200".to_string())]
        );
    }

    #[test]
    fn test_latest_query_has_no_params() {
        let schema = GameId::Ssq.schema();
        assert!(query_params(&schema, &FetchQuery::Latest { limit: 10 }).is_empty());
    }

    #[test]
    fn test_client_builds_with_defaults() {
        assert!(HttpSource::new(HttpSourceOptions::default()).is_ok());
    }

    #[tokio::test]
    async fn test_server_error_is_retried_then_reported() {
        let server = StubServer::start(vec![Reply::Status(503, "busy")]).await;
        let source = quick(3);

        let err = source.get_page(&server.base, &[]).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));
        assert_eq!(err.kind(), "NETWORK_ERROR");
        assert_eq!(server.hits(), 3);
    }

    #[tokio::test]
    async fn test_success_after_one_failure() {
        let server = StubServer::start(vec![
            Reply::Status(502, "bad gateway"),
            Reply::Status(200, "<table id=\"tdata\"></table>"),
        ])
        .await;
        let source = quick(3);

        let params = [("start", "25001".to_string())];
        let body = source.get_page(&server.base, &params).await.unwrap();
        assert_eq!(body, "<table id=\"tdata\"></table>");
        assert_eq!(server.hits(), 2);
        assert!(server.requests()[1].starts_with("GET /?start=25001 "));
    }

    #[tokio::test]
    async fn test_unanswered_request_times_out() {
        let server = StubServer::start(vec![Reply::Hang]).await;
        let source = quick(2);

        let err = source.get_page(&server.base, &[]).await.unwrap_err();
        assert!(matches!(err, SourceError::Network { .. }));
        assert_eq!(err.kind(), "NETWORK_ERROR");
        assert_eq!(server.hits(), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_still_attempts_once() {
        let server = StubServer::start(vec![Reply::Status(404, "")]).await;
        let err = quick(0).get_page(&server.base, &[]).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 404, .. }));
        assert_eq!(server.hits(), 1);
    }
}
