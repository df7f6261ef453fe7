//! Entity sync managers
//!
//! One manager per phase of the bulk import. Every manager does exactly one
//! page of work per invocation and reports a `SyncOutcome`; the orchestrator
//! decides whether to invoke it again.
//!
//! Per-record failures (bad mapping, rejected upsert) land in the outcome's
//! `errors` and never abort the batch. Failures of the batch itself (page
//! fetch, rate-limit exhaustion) propagate as `SyncError` and abort the
//! phase.

pub mod courts;
pub mod decisions;
pub mod judge_details;
pub mod judges;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::Result;

pub use courts::CourtSync;
pub use decisions::DecisionSync;
pub use judge_details::JudgeDetailSync;
pub use judges::JudgeSync;

/// One stage of the bulk import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Courts,
    Judges,
    JudgeDetails,
    Decisions,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Courts => "courts",
            Phase::Judges => "judges",
            Phase::JudgeDetails => "judge-details",
            Phase::Decisions => "decisions",
        };
        f.write_str(name)
    }
}

/// Options shared by every sync manager
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Restrict to one jurisdiction code
    pub jurisdiction: Option<String>,
    /// Records (or judges, for the detail/decision phases) per invocation
    pub batch_size: u32,
    /// Update local rows even when fresh
    pub force_refresh: bool,
    /// Days before a synced row counts as stale; 0 disables re-sync
    pub staleness_days: i64,
}

impl SyncOptions {
    /// Rows synced before this instant count as stale
    ///
    /// `force_refresh` makes everything stale; `staleness_days == 0` makes
    /// nothing stale.
    pub fn stale_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.force_refresh {
            Some(now)
        } else if self.staleness_days > 0 {
            Some(now - chrono::Duration::days(self.staleness_days))
        } else {
            None
        }
    }
}

/// Result of one sync invocation
///
/// `processed` counts the records the invocation looked at (judges, for the
/// detail and decision phases). `created`/`updated` count the rows the
/// invocation mutated; for the decisions phase those are decision rows, with
/// the judge tally carried in `notes`.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub success: bool,
    pub processed: u32,
    pub created: u32,
    pub updated: u32,
    pub errors: Vec<String>,
    pub duration: Duration,
    pub notes: Option<String>,
}

impl SyncOutcome {
    /// Outcome of an invocation that found nothing to do
    pub fn idle(duration: Duration) -> Self {
        Self {
            success: true,
            processed: 0,
            created: 0,
            updated: 0,
            errors: Vec::new(),
            duration,
            notes: None,
        }
    }
}

/// One phase of the bulk import, invoked repeatedly by the orchestrator
#[async_trait]
pub trait PhaseSync: Send + Sync {
    fn phase(&self) -> Phase;

    /// Do one page of work
    async fn run(&self, run_number: u32) -> Result<SyncOutcome>;
}

/// Cursor through a paginated list endpoint, kept across invocations
#[derive(Debug, Clone, Default)]
pub(crate) enum PageCursor {
    #[default]
    Start,
    Next(String),
    Exhausted,
}

impl PageCursor {
    pub(crate) fn advance(&mut self, next: Option<String>) {
        *self = match next {
            Some(url) => PageCursor::Next(url),
            None => PageCursor::Exhausted,
        };
    }
}
