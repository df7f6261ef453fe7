//! Wire types for the CourtListener REST API
//!
//! Shapes mirror the v4 API responses. Every list endpoint wraps its results
//! in the same paginated envelope with a `next` URL cursor.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::types::{Result, SyncError};

/// Paginated response envelope
#[derive(Debug, Clone, Deserialize)]
pub struct ApiPage<T> {
    #[serde(default)]
    pub count: Option<u64>,
    pub next: Option<String>,
    pub results: Vec<T>,
}

/// A court from `/courts/`
#[derive(Debug, Clone, Deserialize)]
pub struct CourtRecord {
    pub id: String,
    pub full_name: String,
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub jurisdiction: Option<String>,
    #[serde(default)]
    pub citation_string: Option<String>,
    #[serde(default)]
    pub in_use: Option<bool>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// A judge from `/people/`
///
/// `positions` holds resource URLs only; the detail sync resolves them.
#[derive(Debug, Clone, Deserialize)]
pub struct PersonRecord {
    pub id: u64,
    #[serde(default)]
    pub name_first: Option<String>,
    #[serde(default)]
    pub name_middle: Option<String>,
    #[serde(default)]
    pub name_last: Option<String>,
    #[serde(default)]
    pub name_suffix: Option<String>,
    #[serde(default)]
    pub date_dob: Option<NaiveDate>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub positions: Vec<String>,
}

impl PersonRecord {
    /// Display name assembled from the name parts
    ///
    /// A person with no last name cannot be matched or displayed; that is a
    /// per-record mapping error, not a default.
    pub fn full_name(&self) -> Result<String> {
        let last = self
            .name_last
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                SyncError::Mapping(format!("person {} has no last name", self.id))
            })?;

        let mut parts: Vec<&str> = Vec::new();
        if let Some(first) = self.name_first.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(first);
        }
        if let Some(middle) = self.name_middle.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(middle);
        }
        parts.push(last);
        if let Some(suffix) = self.name_suffix.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(suffix);
        }
        Ok(parts.join(" "))
    }
}

/// A position from `/positions/?person={id}`
#[derive(Debug, Clone, Deserialize)]
pub struct PositionRecord {
    pub id: u64,
    /// Court resource URL, e.g. ".../api/rest/v4/courts/scotus/"
    #[serde(default)]
    pub court: Option<String>,
    #[serde(default)]
    pub position_type: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub date_start: Option<NaiveDate>,
    #[serde(default)]
    pub date_termination: Option<NaiveDate>,
}

impl PositionRecord {
    /// Extract the court's external id from its resource URL
    pub fn court_id(&self) -> Result<String> {
        let url = self.court.as_deref().ok_or_else(|| {
            SyncError::Mapping(format!("position {} has no court", self.id))
        })?;
        let id = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                SyncError::Mapping(format!("position {}: malformed court URL {url}", self.id))
            })?;
        Ok(id.to_string())
    }
}

/// An education entry from `/educations/?person={id}`
#[derive(Debug, Clone, Deserialize)]
pub struct EducationRecord {
    pub id: u64,
    #[serde(default)]
    pub school: Option<SchoolRecord>,
    #[serde(default)]
    pub degree_level: Option<String>,
    #[serde(default)]
    pub degree_year: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchoolRecord {
    pub name: String,
}

/// A political affiliation from `/political-affiliations/?person={id}`
#[derive(Debug, Clone, Deserialize)]
pub struct AffiliationRecord {
    pub id: u64,
    #[serde(default)]
    pub political_party: Option<String>,
    #[serde(default)]
    pub date_start: Option<NaiveDate>,
}

/// An authored opinion from `/opinions/?author_id={id}`
#[derive(Debug, Clone, Deserialize)]
pub struct OpinionRecord {
    pub id: u64,
    #[serde(default)]
    pub case_name: Option<String>,
    #[serde(default)]
    pub date_filed: Option<NaiveDate>,
    #[serde(default)]
    pub disposition: Option<String>,
    #[serde(default)]
    pub court: Option<String>,
}
