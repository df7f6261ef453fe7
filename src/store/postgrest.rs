//! Supabase (PostgREST) implementation of the storage contract
//!
//! Upserts use `POST` with `Prefer: resolution=merge-duplicates` and an
//! `on_conflict` key, which is how PostgREST exposes
//! `INSERT ... ON CONFLICT DO UPDATE`. Lookups are filtered `GET`s; counts
//! come from the `content-range` header under `Prefer: count=exact`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::store::{CourtRow, DecisionRow, JudgeRow, StoreCounts, SyncStore};
use crate::types::{Result, SyncError};

const ERROR_BODY_LIMIT: usize = 256;

/// Connection settings for the Supabase data layer
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    /// Project URL, e.g. "https://abc123.supabase.co"
    pub url: String,
    /// Service role key
    pub key: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

/// PostgREST-backed store
pub struct PostgrestStore {
    client: Client,
    base_url: String,
    key: String,
}

impl PostgrestStore {
    pub fn new(config: PostgrestConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            key: config.key,
        })
    }

    fn request(&self, method: Method, table: &str, query: &str) -> RequestBuilder {
        let url = if query.is_empty() {
            format!("{}/{}", self.base_url, table)
        } else {
            format!("{}/{}?{}", self.base_url, table, query)
        };
        self.client
            .request(method, url)
            .header("apikey", &self.key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.key))
    }

    async fn check(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let truncated: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            return Err(SyncError::Storage(format!(
                "{context} failed with HTTP {status}: {truncated}"
            )));
        }
        Ok(response)
    }

    /// Filtered select returning at most one row
    async fn find_one<T: DeserializeOwned>(&self, table: &str, filter: &str) -> Result<Option<T>> {
        let response = self
            .request(Method::GET, table, &format!("{filter}&limit=1"))
            .send()
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let response = Self::check(response, &format!("select from {table}")).await?;
        let mut rows: Vec<T> = response
            .json()
            .await
            .map_err(|e| SyncError::Storage(format!("decode {table} row: {e}")))?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    async fn select_many<T: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Vec<T>> {
        let response = self
            .request(Method::GET, table, query)
            .send()
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let response = Self::check(response, &format!("select from {table}")).await?;
        response
            .json()
            .await
            .map_err(|e| SyncError::Storage(format!("decode {table} rows: {e}")))
    }

    /// Insert-or-update one row keyed by the conflict column
    async fn upsert<T: Serialize>(&self, table: &str, conflict_col: &str, row: &T) -> Result<()> {
        debug!(table, "PostgREST upsert");
        let response = self
            .request(
                Method::POST,
                table,
                &format!("on_conflict={conflict_col}"),
            )
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row])
            .send()
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        Self::check(response, &format!("upsert into {table}")).await?;
        Ok(())
    }

    /// Exact row count via the `content-range` header
    async fn count(&self, table: &str) -> Result<u64> {
        let response = self
            .request(Method::GET, table, "select=courtlistener_id")
            .header("Prefer", "count=exact")
            .header(header::RANGE, "0-0")
            .send()
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        let response = Self::check(response, &format!("count {table}")).await?;
        let range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| SyncError::Storage(format!("count {table}: no content-range")))?;

        // Format: "0-0/123" (or "*/0" when the table is empty)
        range
            .rsplit('/')
            .next()
            .and_then(|total| total.parse::<u64>().ok())
            .ok_or_else(|| {
                SyncError::Storage(format!("count {table}: malformed content-range {range}"))
            })
    }
}

#[async_trait]
impl SyncStore for PostgrestStore {
    async fn find_court(&self, external_id: &str) -> Result<Option<CourtRow>> {
        self.find_one("courts", &format!("courtlistener_id=eq.{external_id}"))
            .await
    }

    async fn upsert_court(&self, row: CourtRow) -> Result<()> {
        self.upsert("courts", "courtlistener_id", &row).await
    }

    async fn find_judge(&self, external_id: i64) -> Result<Option<JudgeRow>> {
        self.find_one("judges", &format!("courtlistener_id=eq.{external_id}"))
            .await
    }

    async fn upsert_judge(&self, row: JudgeRow) -> Result<()> {
        self.upsert("judges", "courtlistener_id", &row).await
    }

    async fn judges_needing_details(
        &self,
        limit: u32,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<JudgeRow>> {
        let filter = match stale_before {
            Some(cutoff) => format!(
                "or=(details_synced_at.is.null,details_synced_at.lt.{})",
                cutoff.to_rfc3339()
            ),
            None => "details_synced_at=is.null".to_string(),
        };
        self.select_many(
            "judges",
            &format!("{filter}&order=details_synced_at.asc.nullsfirst&limit={limit}"),
        )
        .await
    }

    async fn judges_needing_decisions(&self, limit: u32) -> Result<Vec<JudgeRow>> {
        self.select_many(
            "judges",
            &format!("decisions_synced_at=is.null&order=courtlistener_id.asc&limit={limit}"),
        )
        .await
    }

    async fn find_decision(&self, external_id: i64) -> Result<Option<DecisionRow>> {
        self.find_one("decisions", &format!("courtlistener_id=eq.{external_id}"))
            .await
    }

    async fn upsert_decision(&self, row: DecisionRow) -> Result<()> {
        self.upsert("decisions", "courtlistener_id", &row).await
    }

    async fn mark_decisions_synced(&self, judge_id: i64, at: DateTime<Utc>) -> Result<()> {
        let response = self
            .request(
                Method::PATCH,
                "judges",
                &format!("courtlistener_id=eq.{judge_id}"),
            )
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "decisions_synced_at": at }))
            .send()
            .await
            .map_err(|e| SyncError::Storage(e.to_string()))?;

        Self::check(response, "mark judge decisions synced").await?;
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            courts: self.count("courts").await?,
            judges: self.count("judges").await?,
            decisions: self.count("decisions").await?,
        })
    }
}
