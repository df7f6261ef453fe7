//! Storage layer for synced judicial records
//!
//! The platform database is Postgres behind Supabase's REST data layer, so
//! the store speaks HTTP, not SQL. The contract is deliberately small:
//! lookup and upsert keyed by the CourtListener external identifier, plus
//! the pending-work queries the detail and decision phases page through.
//! No transactions; safety under re-runs comes from per-record upsert
//! idempotency.

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Result;

pub use memory::MemoryStore;
pub use postgrest::{PostgrestConfig, PostgrestStore};

/// A court row, keyed by CourtListener's string court id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CourtRow {
    pub courtlistener_id: String,
    pub name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub citation_string: Option<String>,
    #[serde(default)]
    pub in_use: bool,
    pub synced_at: DateTime<Utc>,
}

/// One entry in a judge's position history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionEntry {
    pub court: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub date_start: Option<NaiveDate>,
    #[serde(default)]
    pub date_end: Option<NaiveDate>,
}

/// One entry in a judge's education history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EducationEntry {
    pub school: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

/// A judge row, keyed by CourtListener's numeric person id
///
/// Created by the judges phase, enriched by the judge-details phase, and
/// stamped by the decisions phase once the judge's opinions are pulled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JudgeRow {
    pub courtlistener_id: i64,
    pub name: String,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    /// External id of the court from the most recent position
    #[serde(default)]
    pub court_id: Option<String>,
    #[serde(default)]
    pub positions: Vec<PositionEntry>,
    #[serde(default)]
    pub educations: Vec<EducationEntry>,
    #[serde(default)]
    pub political_affiliation: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub details_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub decisions_synced_at: Option<DateTime<Utc>>,
    pub synced_at: DateTime<Utc>,
}

/// A decision row, keyed by CourtListener's numeric opinion id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRow {
    pub courtlistener_id: i64,
    /// External id of the authoring judge
    pub judge_id: i64,
    #[serde(default)]
    pub case_name: Option<String>,
    #[serde(default)]
    pub date_filed: Option<NaiveDate>,
    #[serde(default)]
    pub outcome: Option<String>,
    pub synced_at: DateTime<Utc>,
}

/// Record counts for the operator status report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    pub courts: u64,
    pub judges: u64,
    pub decisions: u64,
}

/// Storage contract for the sync phases
///
/// Implemented by `PostgrestStore` (production) and `MemoryStore`
/// (tests, `--offline` smoke runs).
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn find_court(&self, external_id: &str) -> Result<Option<CourtRow>>;

    /// Insert-or-update keyed by `courtlistener_id`
    async fn upsert_court(&self, row: CourtRow) -> Result<()>;

    async fn find_judge(&self, external_id: i64) -> Result<Option<JudgeRow>>;

    async fn upsert_judge(&self, row: JudgeRow) -> Result<()>;

    /// Judges whose details have never been synced, or were synced before
    /// `stale_before` when it is given; ordered oldest-first, nulls first
    async fn judges_needing_details(
        &self,
        limit: u32,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<JudgeRow>>;

    /// Judges whose decisions have never been synced
    async fn judges_needing_decisions(&self, limit: u32) -> Result<Vec<JudgeRow>>;

    async fn find_decision(&self, external_id: i64) -> Result<Option<DecisionRow>>;

    async fn upsert_decision(&self, row: DecisionRow) -> Result<()>;

    /// Stamp a judge as decision-synced without rewriting the whole row
    async fn mark_decisions_synced(&self, judge_id: i64, at: DateTime<Utc>) -> Result<()>;

    async fn counts(&self) -> Result<StoreCounts>;
}
