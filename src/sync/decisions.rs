//! Decisions phase: pulls authored opinions for judges that have none yet
//!
//! Heaviest phase by volume. Each run takes a batch of judges with no
//! decision sync stamp, pulls one page of opinions per judge, and stamps the
//! judge once its page lands. `processed` counts judges (the orchestrator's
//! convergence signal); `created`/`updated` count decision rows.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::courtlistener::{CourtDataSource, OpinionRecord};
use crate::store::{DecisionRow, JudgeRow, SyncStore};
use crate::sync::{Phase, PhaseSync, SyncOptions, SyncOutcome};
use crate::types::{Result, SyncError};

/// Opinions pulled per judge per run
const OPINION_PAGE_SIZE: u32 = 100;

pub struct DecisionSync {
    source: Arc<dyn CourtDataSource>,
    store: Arc<dyn SyncStore>,
    options: SyncOptions,
}

struct JudgeTally {
    created: u32,
    updated: u32,
    errors: Vec<String>,
}

impl DecisionSync {
    pub fn new(
        source: Arc<dyn CourtDataSource>,
        store: Arc<dyn SyncStore>,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    fn map_opinion(judge_id: i64, record: &OpinionRecord) -> DecisionRow {
        DecisionRow {
            courtlistener_id: record.id as i64,
            judge_id,
            case_name: record.case_name.clone(),
            date_filed: record.date_filed,
            outcome: record.disposition.clone(),
            synced_at: Utc::now(),
        }
    }

    /// Pull one page of opinions for one judge and upsert them
    async fn sync_judge(&self, judge: &JudgeRow) -> Result<JudgeTally> {
        let page = self
            .source
            .fetch_opinions(judge.courtlistener_id as u64, OPINION_PAGE_SIZE)
            .await?;

        let mut tally = JudgeTally {
            created: 0,
            updated: 0,
            errors: Vec::new(),
        };

        for record in &page.results {
            let row = Self::map_opinion(judge.courtlistener_id, record);
            match self.store.find_decision(row.courtlistener_id).await {
                Ok(None) => match self.store.upsert_decision(row).await {
                    Ok(()) => tally.created += 1,
                    Err(e) => tally.errors.push(format!("opinion {}: {e}", record.id)),
                },
                Ok(Some(_)) => match self.store.upsert_decision(row).await {
                    Ok(()) => tally.updated += 1,
                    Err(e) => tally.errors.push(format!("opinion {}: {e}", record.id)),
                },
                Err(e) => tally.errors.push(format!("opinion {}: {e}", record.id)),
            }
        }

        self.store
            .mark_decisions_synced(judge.courtlistener_id, Utc::now())
            .await?;
        Ok(tally)
    }
}

#[async_trait]
impl PhaseSync for DecisionSync {
    fn phase(&self) -> Phase {
        Phase::Decisions
    }

    async fn run(&self, run_number: u32) -> Result<SyncOutcome> {
        let started = Instant::now();
        let pending = self
            .store
            .judges_needing_decisions(self.options.batch_size)
            .await?;

        let mut outcome = SyncOutcome::idle(started.elapsed());
        let mut judges_synced = 0u32;

        for judge in &pending {
            outcome.processed += 1;
            match self.sync_judge(judge).await {
                Ok(tally) => {
                    judges_synced += 1;
                    outcome.created += tally.created;
                    outcome.updated += tally.updated;
                    outcome.errors.extend(tally.errors);
                }
                Err(e @ SyncError::RateLimited { .. }) => return Err(e),
                // The judge keeps a null stamp and is retried next run.
                Err(e) => outcome
                    .errors
                    .push(format!("judge {}: {e}", judge.courtlistener_id)),
            }
        }

        outcome.notes = Some(format!(
            "{judges_synced}/{} judges stamped",
            outcome.processed
        ));
        outcome.duration = started.elapsed();
        info!(
            run = run_number,
            judges = outcome.processed,
            decisions_created = outcome.created,
            decisions_updated = outcome.updated,
            errors = outcome.errors.len(),
            "Decisions batch done"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::courtlistener::testing::StubSource;
    use crate::store::MemoryStore;

    fn judge(id: i64) -> JudgeRow {
        JudgeRow {
            courtlistener_id: id,
            name: format!("Judge {id}"),
            jurisdiction: None,
            court_id: None,
            positions: Vec::new(),
            educations: Vec::new(),
            political_affiliation: None,
            date_of_birth: None,
            gender: None,
            details_synced_at: Some(Utc::now()),
            decisions_synced_at: None,
            synced_at: Utc::now(),
        }
    }

    fn opinion(id: u64, case_name: &str) -> OpinionRecord {
        OpinionRecord {
            id,
            case_name: Some(case_name.to_string()),
            date_filed: "2015-06-26".parse().ok(),
            disposition: Some("affirmed".to_string()),
            court: None,
        }
    }

    fn options(batch_size: u32) -> SyncOptions {
        SyncOptions {
            jurisdiction: None,
            batch_size,
            force_refresh: false,
            staleness_days: 30,
        }
    }

    #[tokio::test]
    async fn test_pulls_and_stamps() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_judge(judge(1)).await.unwrap();
        store.upsert_judge(judge(2)).await.unwrap();

        let source = StubSource {
            opinions: HashMap::from([
                (1u64, vec![opinion(100, "Obergefell v. Hodges")]),
                (2u64, vec![opinion(200, "Roe v. Wade"), opinion(201, "Doe v. Bolton")]),
            ]),
            ..Default::default()
        };

        let sync = DecisionSync::new(
            Arc::new(source),
            Arc::clone(&store) as Arc<dyn SyncStore>,
            options(10),
        );
        let outcome = sync.run(1).await.unwrap();

        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.created, 3);
        assert_eq!(outcome.updated, 0);
        assert_eq!(store.counts().await.unwrap().decisions, 3);
        assert!(store.judges_needing_decisions(10).await.unwrap().is_empty());

        let decision = store.find_decision(100).await.unwrap().unwrap();
        assert_eq!(decision.judge_id, 1);
        assert_eq!(decision.outcome.as_deref(), Some("affirmed"));
    }

    #[tokio::test]
    async fn test_no_pending_judges_means_no_work() {
        let store = Arc::new(MemoryStore::new());
        let sync = DecisionSync::new(
            Arc::new(StubSource::default()),
            store as Arc<dyn SyncStore>,
            options(10),
        );

        let outcome = sync.run(1).await.unwrap();
        assert_eq!(outcome.processed, 0);
        assert_eq!(outcome.created, 0);
    }

    #[tokio::test]
    async fn test_failed_judge_is_not_stamped() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_judge(judge(1)).await.unwrap();
        store.upsert_judge(judge(2)).await.unwrap();

        let source = StubSource {
            opinions: HashMap::from([(1u64, vec![opinion(100, "Good v. Case")])]),
            broken_people: vec![2],
            ..Default::default()
        };

        let sync = DecisionSync::new(
            Arc::new(source),
            Arc::clone(&store) as Arc<dyn SyncStore>,
            options(10),
        );
        let outcome = sync.run(1).await.unwrap();

        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.errors.len(), 1);

        // Judge 2 stays pending for the next run.
        let pending = store.judges_needing_decisions(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].courtlistener_id, 2);
    }

    #[tokio::test]
    async fn test_rerun_updates_instead_of_creating() {
        let store = Arc::new(MemoryStore::new());
        store.upsert_judge(judge(1)).await.unwrap();

        let source = Arc::new(StubSource {
            opinions: HashMap::from([(1u64, vec![opinion(100, "Brown v. Board")])]),
            ..Default::default()
        });

        let first = DecisionSync::new(
            Arc::clone(&source) as Arc<dyn CourtDataSource>,
            Arc::clone(&store) as Arc<dyn SyncStore>,
            options(10),
        );
        first.run(1).await.unwrap();

        // Clear the stamp, as a forced re-run would, and sync again.
        store.upsert_judge(judge(1)).await.unwrap();
        let second = DecisionSync::new(
            source as Arc<dyn CourtDataSource>,
            Arc::clone(&store) as Arc<dyn SyncStore>,
            options(10),
        );
        let outcome = second.run(1).await.unwrap();

        assert_eq!(outcome.created, 0);
        assert_eq!(outcome.updated, 1);
        assert_eq!(store.counts().await.unwrap().decisions, 1);
    }
}
