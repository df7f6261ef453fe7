//! Configuration for gavel
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, ValueEnum};
use uuid::Uuid;

/// Which entities a run should synchronize
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum SyncTarget {
    /// Full bulk import: courts, judges, judge details, decisions
    All,
    Courts,
    Judges,
    JudgeDetails,
    Decisions,
}

/// gavel - bulk judicial data synchronization
///
/// Pulls courts, judges, and decisions from CourtListener and upserts them
/// into the platform database through its Supabase data layer.
#[derive(Parser, Debug, Clone)]
#[command(name = "gavel")]
#[command(about = "Bulk synchronization of judicial data from CourtListener")]
pub struct Args {
    /// Unique identifier for this sync run
    #[arg(long, env = "RUN_ID", default_value_t = Uuid::new_v4())]
    pub run_id: Uuid,

    /// Which entities to synchronize
    #[arg(long, value_enum, env = "SYNC_TARGET", default_value = "all")]
    pub entity: SyncTarget,

    /// CourtListener REST API base URL
    #[arg(
        long,
        env = "COURTLISTENER_URL",
        default_value = "https://www.courtlistener.com/api/rest/v4"
    )]
    pub courtlistener_url: String,

    /// CourtListener API token (required unless --offline)
    #[arg(long, env = "COURTLISTENER_API_TOKEN")]
    pub courtlistener_token: Option<String>,

    /// Supabase project URL (required unless --offline)
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase service role key (required unless --offline)
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY")]
    pub supabase_key: Option<String>,

    /// Restrict sync to one jurisdiction (e.g. "F" for federal appellate)
    #[arg(long, env = "SYNC_JURISDICTION")]
    pub jurisdiction: Option<String>,

    /// Page size for the courts and judges phases
    #[arg(long, env = "SYNC_BATCH_SIZE", default_value = "50")]
    pub batch_size: u32,

    /// Judges enriched per judge-details run
    #[arg(long, env = "SYNC_DETAIL_BATCH_SIZE", default_value = "20")]
    pub detail_batch_size: u32,

    /// Judges whose decisions are pulled per decisions run
    #[arg(long, env = "SYNC_DECISION_BATCH_SIZE", default_value = "10")]
    pub decision_batch_size: u32,

    /// Override every phase's batch size with one value
    #[arg(long)]
    pub limit: Option<u32>,

    /// Re-fetch records even when the local copy is fresh
    #[arg(long, env = "SYNC_FORCE_REFRESH", default_value = "false")]
    pub force_refresh: bool,

    /// Days before a synced record counts as stale
    #[arg(long, env = "SYNC_STALENESS_DAYS", default_value = "30")]
    pub staleness_days: i64,

    /// Hourly request quota for the CourtListener API
    #[arg(long, env = "COURTLISTENER_RATE_LIMIT", default_value = "5000")]
    pub rate_limit: u32,

    /// Rate-limit window length in seconds
    #[arg(long, env = "COURTLISTENER_RATE_WINDOW_SECS", default_value = "3600")]
    pub rate_window_secs: u64,

    /// HTTP request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// Run against an in-memory store with no credentials (smoke testing)
    #[arg(long, default_value = "false")]
    pub offline: bool,

    /// Print rate-limit usage and store record counts, then exit
    #[arg(long, default_value = "false")]
    pub status_only: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Page size for the courts phase
    pub fn court_batch(&self) -> u32 {
        self.limit.unwrap_or(self.batch_size)
    }

    /// Page size for the judges phase
    pub fn judge_batch(&self) -> u32 {
        self.limit.unwrap_or(self.batch_size)
    }

    /// Batch size for the judge-details phase
    pub fn detail_batch(&self) -> u32 {
        self.limit.unwrap_or(self.detail_batch_size)
    }

    /// Batch size for the decisions phase
    pub fn decision_batch(&self) -> u32 {
        self.limit.unwrap_or(self.decision_batch_size)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.offline {
            if self.courtlistener_token.is_none() {
                return Err("COURTLISTENER_API_TOKEN is required (or pass --offline)".to_string());
            }
            if self.supabase_url.is_none() || self.supabase_key.is_none() {
                return Err(
                    "SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY are required (or pass --offline)"
                        .to_string(),
                );
            }
        }

        if self.batch_size == 0 || self.detail_batch_size == 0 || self.decision_batch_size == 0 {
            return Err("Batch sizes must be greater than zero".to_string());
        }

        if let Some(0) = self.limit {
            return Err("--limit must be greater than zero".to_string());
        }

        if self.rate_limit == 0 {
            return Err("COURTLISTENER_RATE_LIMIT must be greater than zero".to_string());
        }

        Ok(())
    }
}
