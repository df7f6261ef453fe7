//! Bulk import orchestrator
//!
//! Drives the sync phases in order — courts, judges, judge details,
//! decisions — looping each phase until its convergence predicate says the
//! work is done, bounded by a per-phase run cap. Phase behavior lives in a
//! declarative table (`PhaseSpec`); the loop itself is phase-agnostic, so a
//! new phase is a new table row, not new orchestrator code.
//!
//! A phase that reports failure (or returns an error) fails the whole run:
//! later phases depend on earlier ones, so there is no partial continuation.
//! A phase that hits its run cap without converging is abandoned best-effort
//! with a warning and the run moves on; re-running the import picks up the
//! remainder, relying on upsert idempotency.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ratelimit::RateLimiter;
use crate::sync::{Phase, PhaseSync, SyncOutcome};

/// Stopping condition checked after each successful run of a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// One run is the whole phase (reference data)
    SingleRun,
    /// A short page means no further pages
    ShortPage,
    /// Nothing pending means nothing left
    NoWork,
}

impl Convergence {
    pub fn is_met(&self, outcome: &SyncOutcome, batch_size: u32) -> bool {
        match self {
            Convergence::SingleRun => true,
            Convergence::ShortPage => outcome.processed < batch_size,
            Convergence::NoWork => outcome.processed == 0,
        }
    }
}

/// One row of the phase table
#[derive(Debug, Clone)]
pub struct PhaseSpec {
    pub phase: Phase,
    /// Hard cap on runs; reaching it is a warning, not a failure
    pub max_runs: u32,
    /// Inter-run delay before rate-limit stretching
    pub base_delay: Duration,
    /// Batch size the phase's manager was built with
    pub batch_size: u32,
    pub convergence: Convergence,
}

impl PhaseSpec {
    /// Default specs matching each phase's weight
    ///
    /// Heavier phases get longer base delays and, for decisions, a larger
    /// run budget.
    pub fn defaults_for(phase: Phase, batch_size: u32) -> Self {
        match phase {
            Phase::Courts => Self {
                phase,
                max_runs: 1,
                base_delay: Duration::ZERO,
                batch_size,
                convergence: Convergence::SingleRun,
            },
            Phase::Judges => Self {
                phase,
                max_runs: 20,
                base_delay: Duration::from_secs(5),
                batch_size,
                convergence: Convergence::ShortPage,
            },
            Phase::JudgeDetails => Self {
                phase,
                max_runs: 20,
                base_delay: Duration::from_secs(5),
                batch_size,
                convergence: Convergence::ShortPage,
            },
            Phase::Decisions => Self {
                phase,
                max_runs: 80,
                base_delay: Duration::from_secs(10),
                batch_size,
                convergence: Convergence::NoWork,
            },
        }
    }
}

/// Record of one phase invocation, kept in memory for the final summary
#[derive(Debug, Clone)]
pub struct SyncRunStat {
    pub phase: Phase,
    pub run_number: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub processed: u32,
    pub created: u32,
    pub updated: u32,
    pub errors: Vec<String>,
    pub notes: Option<String>,
}

/// Terminal state of a bulk import run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    /// Every phase converged or was abandoned at its cap
    Done,
    /// A phase failed; later phases never ran
    Failed { phase: Phase, reason: String },
}

/// Everything the reporter needs about a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stats: Vec<SyncRunStat>,
}

/// Sequential phase driver
pub struct BulkImportOrchestrator {
    run_id: Uuid,
    limiter: Arc<RateLimiter>,
    phases: Vec<(PhaseSpec, Arc<dyn PhaseSync>)>,
}

impl BulkImportOrchestrator {
    pub fn new(run_id: Uuid, limiter: Arc<RateLimiter>) -> Self {
        Self {
            run_id,
            limiter,
            phases: Vec::new(),
        }
    }

    /// Append a phase; order of registration is order of execution
    pub fn register(mut self, spec: PhaseSpec, manager: Arc<dyn PhaseSync>) -> Self {
        self.phases.push((spec, manager));
        self
    }

    /// Run every registered phase to completion or failure
    pub async fn run(&self) -> RunReport {
        let started_at = Utc::now();
        let mut stats: Vec<SyncRunStat> = Vec::new();

        info!(run_id = %self.run_id, phases = self.phases.len(), "Bulk import starting");

        for (spec, manager) in &self.phases {
            if let Some(reason) = self.run_phase(spec, manager.as_ref(), &mut stats).await {
                error!(phase = %spec.phase, reason, "Phase failed, aborting run");
                return RunReport {
                    run_id: self.run_id,
                    state: RunState::Failed {
                        phase: spec.phase,
                        reason,
                    },
                    started_at,
                    finished_at: Utc::now(),
                    stats,
                };
            }
        }

        info!(run_id = %self.run_id, "Bulk import done");
        RunReport {
            run_id: self.run_id,
            state: RunState::Done,
            started_at,
            finished_at: Utc::now(),
            stats,
        }
    }

    /// Loop one phase until convergence, cap, or failure
    ///
    /// Returns `Some(reason)` on failure, `None` when the run may proceed.
    async fn run_phase(
        &self,
        spec: &PhaseSpec,
        manager: &dyn PhaseSync,
        stats: &mut Vec<SyncRunStat>,
    ) -> Option<String> {
        info!(phase = %spec.phase, max_runs = spec.max_runs, "Phase starting");

        for run_number in 1..=spec.max_runs {
            // Advisory pre-flight: warn on quota pressure, never block.
            self.limiter.warn_if_pressured();

            let run_started = Utc::now();
            let result = manager.run(run_number).await;
            let run_finished = Utc::now();

            match result {
                Err(e) => {
                    stats.push(SyncRunStat {
                        phase: spec.phase,
                        run_number,
                        started_at: run_started,
                        finished_at: run_finished,
                        success: false,
                        processed: 0,
                        created: 0,
                        updated: 0,
                        errors: vec![e.to_string()],
                        notes: None,
                    });
                    return Some(e.to_string());
                }
                Ok(outcome) => {
                    let converged = spec.convergence.is_met(&outcome, spec.batch_size);
                    let failed = !outcome.success;

                    stats.push(SyncRunStat {
                        phase: spec.phase,
                        run_number,
                        started_at: run_started,
                        finished_at: run_finished,
                        success: outcome.success,
                        processed: outcome.processed,
                        created: outcome.created,
                        updated: outcome.updated,
                        errors: outcome.errors.clone(),
                        notes: outcome.notes.clone(),
                    });

                    if failed {
                        return Some(format!(
                            "phase reported failure on run {run_number}: {}",
                            outcome.errors.first().cloned().unwrap_or_default()
                        ));
                    }

                    if converged {
                        info!(phase = %spec.phase, runs = run_number, "Phase converged");
                        return None;
                    }

                    if run_number == spec.max_runs {
                        warn!(
                            phase = %spec.phase,
                            runs = run_number,
                            "Phase hit its run cap without converging, may need additional runs"
                        );
                        return None;
                    }

                    let delay = self.limiter.suggested_delay(spec.base_delay);
                    info!(phase = %spec.phase, delay_ms = delay.as_millis() as u64, "Next run");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        None
    }
}
