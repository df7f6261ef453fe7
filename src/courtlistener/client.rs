//! HTTP client for the CourtListener REST API
//!
//! Every call attaches the `Authorization: Token` header and records one
//! request against the shared rate limiter. Pagination is cursor-based: the
//! API hands back a full `next` URL which callers pass in verbatim on the
//! following invocation.
//!
//! A 429 is never retried here. The `Retry-After` value is surfaced to the
//! caller, who decides whether to wait or abort.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::courtlistener::types::{
    AffiliationRecord, ApiPage, CourtRecord, EducationRecord, OpinionRecord, PersonRecord,
    PositionRecord,
};
use crate::ratelimit::RateLimiter;
use crate::types::{Result, SyncError};

/// Longest slice of an error body carried into a `Fetch` error
const ERROR_BODY_LIMIT: usize = 256;

/// Read access to the judicial data source (mockable in tests)
#[async_trait]
pub trait CourtDataSource: Send + Sync {
    /// One page of courts; `cursor` is the previous page's `next` URL
    async fn fetch_courts(
        &self,
        cursor: Option<&str>,
        jurisdiction: Option<&str>,
        page_size: u32,
    ) -> Result<ApiPage<CourtRecord>>;

    /// One page of judges
    async fn fetch_people(
        &self,
        cursor: Option<&str>,
        jurisdiction: Option<&str>,
        page_size: u32,
    ) -> Result<ApiPage<PersonRecord>>;

    /// All positions held by one person
    async fn fetch_positions(&self, person_id: u64) -> Result<Vec<PositionRecord>>;

    /// All education entries for one person
    async fn fetch_educations(&self, person_id: u64) -> Result<Vec<EducationRecord>>;

    /// All political affiliations for one person
    async fn fetch_affiliations(&self, person_id: u64) -> Result<Vec<AffiliationRecord>>;

    /// One page of opinions authored by one person
    async fn fetch_opinions(&self, person_id: u64, page_size: u32)
        -> Result<ApiPage<OpinionRecord>>;
}

/// Configuration for the CourtListener client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, e.g. "https://www.courtlistener.com/api/rest/v4"
    pub base_url: String,
    /// API token; anonymous access works at a much lower quota
    pub token: Option<String>,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

/// CourtListener API client
pub struct CourtListenerClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    limiter: Arc<RateLimiter>,
}

impl CourtListenerClient {
    pub fn new(config: ClientConfig, limiter: Arc<RateLimiter>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token,
            limiter,
        })
    }

    fn auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Token {t}"))
    }

    /// Issue one GET, record it against the limiter, and decode the body
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.limiter.record_request();
        debug!(url, "CourtListener request");

        let mut request = self.client.get(url);
        if let Some(auth) = self.auth_header() {
            request = request.header(header::AUTHORIZATION, auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Network(e.to_string()))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(SyncError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(SyncError::Fetch {
                status: status.as_u16(),
                body: truncated,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SyncError::Parse(e.to_string()))
    }

    /// One page from a list endpoint, honoring a `next` cursor when present
    async fn get_page<T: DeserializeOwned>(
        &self,
        cursor: Option<&str>,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<ApiPage<T>> {
        let url = match cursor {
            Some(next) => next.to_string(),
            None => {
                let pairs: Vec<String> = query
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                format!("{}/{}/?{}", self.base_url, path, pairs.join("&"))
            }
        };
        self.get_json(&url).await
    }

    /// Drain a per-person list endpoint (small result sets, a few pages at most)
    async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page: ApiPage<T> = self.get_page(cursor.as_deref(), path, query).await?;
            out.extend(page.results);
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl CourtDataSource for CourtListenerClient {
    async fn fetch_courts(
        &self,
        cursor: Option<&str>,
        jurisdiction: Option<&str>,
        page_size: u32,
    ) -> Result<ApiPage<CourtRecord>> {
        let mut query = vec![("page_size", page_size.to_string())];
        if let Some(j) = jurisdiction {
            query.push(("jurisdiction", j.to_string()));
        }
        self.get_page(cursor, "courts", &query).await
    }

    async fn fetch_people(
        &self,
        cursor: Option<&str>,
        jurisdiction: Option<&str>,
        page_size: u32,
    ) -> Result<ApiPage<PersonRecord>> {
        let mut query = vec![("page_size", page_size.to_string())];
        if let Some(j) = jurisdiction {
            query.push(("positions__court__jurisdiction", j.to_string()));
        }
        self.get_page(cursor, "people", &query).await
    }

    async fn fetch_positions(&self, person_id: u64) -> Result<Vec<PositionRecord>> {
        self.get_all("positions", &[("person", person_id.to_string())])
            .await
    }

    async fn fetch_educations(&self, person_id: u64) -> Result<Vec<EducationRecord>> {
        self.get_all("educations", &[("person", person_id.to_string())])
            .await
    }

    async fn fetch_affiliations(&self, person_id: u64) -> Result<Vec<AffiliationRecord>> {
        self.get_all("political-affiliations", &[("person", person_id.to_string())])
            .await
    }

    async fn fetch_opinions(
        &self,
        person_id: u64,
        page_size: u32,
    ) -> Result<ApiPage<OpinionRecord>> {
        self.get_page(
            None,
            "opinions",
            &[
                ("author_id", person_id.to_string()),
                ("page_size", page_size.to_string()),
            ],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a random local port
    async fn serve_once(status_line: &str, headers: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status_line}\r\ncontent-length: {}\r\n{headers}connection: close\r\n\r\n{body}",
            body.len()
        );

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            // Drain the request head before answering.
            loop {
                let n = sock.read(&mut chunk).await.unwrap_or(0);
                buf.extend_from_slice(&chunk[..n]);
                if n == 0 || buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
        });

        format!("http://{addr}")
    }

    fn client(base_url: String, limiter: Arc<RateLimiter>) -> CourtListenerClient {
        CourtListenerClient::new(
            ClientConfig {
                base_url,
                token: Some("test-token".to_string()),
                timeout_ms: 5_000,
            },
            limiter,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_429_surfaces_retry_after() {
        let base = serve_once("429 Too Many Requests", "retry-after: 30\r\n", "").await;
        let limiter = Arc::new(RateLimiter::new(5000, 3600));
        let client = client(base, Arc::clone(&limiter));

        let err = client.fetch_courts(None, None, 10).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::RateLimited {
                retry_after_secs: Some(30)
            }
        ));
        // The failed call still consumed quota.
        assert_eq!(limiter.usage_stats().total_requests, 1);
    }

    #[tokio::test]
    async fn test_server_error_maps_to_fetch_with_body() {
        let base = serve_once("502 Bad Gateway", "", "upstream exploded").await;
        let client = client(base, Arc::new(RateLimiter::new(5000, 3600)));

        match client.fetch_courts(None, None, 10).await.unwrap_err() {
            SyncError::Fetch { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "upstream exploded");
            }
            other => panic!("expected Fetch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ok_page_decodes_and_counts() {
        let page = r#"{"count": 1, "next": null, "results": [
            {"id": "scotus", "full_name": "Supreme Court of the United States"}
        ]}"#;
        let base = serve_once("200 OK", "content-type: application/json\r\n", page).await;
        let limiter = Arc::new(RateLimiter::new(5000, 3600));
        let client = client(base, Arc::clone(&limiter));

        let page = client.fetch_courts(None, Some("F"), 10).await.unwrap();
        assert_eq!(page.results.len(), 1);
        assert!(page.next.is_none());
        assert_eq!(limiter.usage_stats().total_requests, 1);
    }
}
