//! End-of-run summary for the operator
//!
//! Groups the in-memory run stats by phase and prints a framed text block.
//! The audience is a human rerunning the script interactively; nothing here
//! is meant to be machine-parsed, and nothing is persisted.

use std::collections::BTreeMap;

use crate::orchestrator::{RunReport, RunState, SyncRunStat};
use crate::ratelimit::UsageStats;
use crate::sync::Phase;

/// Error strings echoed per phase before eliding the rest
const ERRORS_SHOWN: usize = 5;

/// Aggregated stats for one phase
#[derive(Debug, Default, Clone)]
pub struct PhaseSummary {
    pub runs: u32,
    pub successes: u32,
    pub failures: u32,
    pub processed: u32,
    pub created: u32,
    pub updated: u32,
    pub duration_ms: i64,
    pub errors: Vec<String>,
}

impl PhaseSummary {
    fn absorb(&mut self, stat: &SyncRunStat) {
        self.runs += 1;
        if stat.success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.processed += stat.processed;
        self.created += stat.created;
        self.updated += stat.updated;
        self.duration_ms += (stat.finished_at - stat.started_at).num_milliseconds();
        self.errors.extend(stat.errors.iter().cloned());
    }
}

/// Group run stats by phase, preserving execution order
pub fn summarize(stats: &[SyncRunStat]) -> Vec<(Phase, PhaseSummary)> {
    let mut order: Vec<Phase> = Vec::new();
    let mut by_phase: BTreeMap<String, PhaseSummary> = BTreeMap::new();

    for stat in stats {
        let key = stat.phase.to_string();
        if !by_phase.contains_key(&key) {
            order.push(stat.phase);
        }
        by_phase.entry(key).or_default().absorb(stat);
    }

    order
        .into_iter()
        .map(|phase| {
            let summary = by_phase.remove(&phase.to_string()).unwrap_or_default();
            (phase, summary)
        })
        .collect()
}

/// Print the end-of-run block
pub fn print_summary(report: &RunReport, usage: &UsageStats) {
    let summaries = summarize(&report.stats);
    let wall_ms = (report.finished_at - report.started_at).num_milliseconds();

    println!();
    println!("==========================================================");
    println!("  Bulk import summary  (run {})", report.run_id);
    println!("==========================================================");

    for (phase, s) in &summaries {
        println!(
            "  {:<14} {:>3} run(s)  {:>3} ok / {:>2} failed   {:>6} processed  {:>6} created  {:>6} updated  ({} ms)",
            phase.to_string(),
            s.runs,
            s.successes,
            s.failures,
            s.processed,
            s.created,
            s.updated,
            s.duration_ms,
        );
        for err in s.errors.iter().take(ERRORS_SHOWN) {
            println!("      ! {err}");
        }
        if s.errors.len() > ERRORS_SHOWN {
            println!("      ! ... and {} more", s.errors.len() - ERRORS_SHOWN);
        }
    }

    let (total_runs, total_errors): (u32, usize) = summaries
        .iter()
        .fold((0, 0), |(r, e), (_, s)| (r + s.runs, e + s.errors.len()));

    println!("----------------------------------------------------------");
    match &report.state {
        RunState::Done => println!("  Result: DONE  ({total_runs} runs, {total_errors} record errors, {wall_ms} ms)"),
        RunState::Failed { phase, reason } => {
            println!("  Result: FAILED in {phase} ({reason})");
        }
    }
    println!(
        "  API quota: {}/{} used ({:.1}%), window resets {}",
        usage.total_requests,
        usage.limit,
        usage.utilization_percent,
        usage.window_end.format("%H:%M:%S UTC"),
    );
    println!("==========================================================");
}

/// Print the rate-limit status line on its own (interrupt handler, --status-only)
pub fn print_usage(usage: &UsageStats) {
    println!(
        "API quota: {}/{} used ({:.1}%), {} remaining, window resets {}",
        usage.total_requests,
        usage.limit,
        usage.utilization_percent,
        usage.remaining,
        usage.window_end.format("%H:%M:%S UTC"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stat(phase: Phase, run_number: u32, success: bool, processed: u32) -> SyncRunStat {
        let now = Utc::now();
        SyncRunStat {
            phase,
            run_number,
            started_at: now,
            finished_at: now + chrono::Duration::milliseconds(250),
            success,
            processed,
            created: processed / 2,
            updated: 0,
            errors: if success {
                Vec::new()
            } else {
                vec!["boom".to_string()]
            },
            notes: None,
        }
    }

    #[test]
    fn test_summarize_groups_and_orders_by_phase() {
        let stats = vec![
            stat(Phase::Courts, 1, true, 20),
            stat(Phase::Judges, 1, true, 10),
            stat(Phase::Judges, 2, true, 4),
            stat(Phase::Decisions, 1, false, 0),
        ];

        let summaries = summarize(&stats);
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].0, Phase::Courts);
        assert_eq!(summaries[1].0, Phase::Judges);
        assert_eq!(summaries[1].1.runs, 2);
        assert_eq!(summaries[1].1.processed, 14);
        assert_eq!(summaries[2].1.failures, 1);
        assert_eq!(summaries[2].1.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn test_summarize_empty_run() {
        assert!(summarize(&[]).is_empty());
    }

    #[test]
    fn test_durations_accumulate() {
        let stats = vec![
            stat(Phase::Judges, 1, true, 10),
            stat(Phase::Judges, 2, true, 10),
        ];
        let summaries = summarize(&stats);
        assert_eq!(summaries[0].1.duration_ms, 500);
    }
}
