//! Judges phase: pulls people from CourtListener and creates judge rows
//!
//! Court linkage and position history are deliberately left to the
//! judge-details phase; this phase only establishes the judge's identity so
//! later phases have rows to enrich.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use crate::courtlistener::{CourtDataSource, PersonRecord};
use crate::store::{JudgeRow, SyncStore};
use crate::sync::{PageCursor, Phase, PhaseSync, SyncOptions, SyncOutcome};
use crate::types::Result;

pub struct JudgeSync {
    source: Arc<dyn CourtDataSource>,
    store: Arc<dyn SyncStore>,
    options: SyncOptions,
    cursor: Mutex<PageCursor>,
}

impl JudgeSync {
    pub fn new(
        source: Arc<dyn CourtDataSource>,
        store: Arc<dyn SyncStore>,
        options: SyncOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
            cursor: Mutex::new(PageCursor::default()),
        }
    }

    fn map_person(&self, record: &PersonRecord) -> Result<JudgeRow> {
        Ok(JudgeRow {
            courtlistener_id: record.id as i64,
            name: record.full_name()?,
            jurisdiction: self.options.jurisdiction.clone(),
            court_id: None,
            positions: Vec::new(),
            educations: Vec::new(),
            political_affiliation: None,
            date_of_birth: record.date_dob,
            gender: record.gender.clone(),
            details_synced_at: None,
            decisions_synced_at: None,
            synced_at: Utc::now(),
        })
    }
}

#[async_trait]
impl PhaseSync for JudgeSync {
    fn phase(&self) -> Phase {
        Phase::Judges
    }

    async fn run(&self, run_number: u32) -> Result<SyncOutcome> {
        let started = Instant::now();
        let mut cursor = self.cursor.lock().await;

        let page_cursor = match &*cursor {
            PageCursor::Start => None,
            PageCursor::Next(url) => Some(url.clone()),
            PageCursor::Exhausted => return Ok(SyncOutcome::idle(started.elapsed())),
        };

        let page = self
            .source
            .fetch_people(
                page_cursor.as_deref(),
                self.options.jurisdiction.as_deref(),
                self.options.batch_size,
            )
            .await?;
        cursor.advance(page.next.clone());
        drop(cursor);

        let now = Utc::now();
        let cutoff = self.options.stale_cutoff(now);
        let mut outcome = SyncOutcome::idle(started.elapsed());

        for record in &page.results {
            outcome.processed += 1;

            let row = match self.map_person(record) {
                Ok(row) => row,
                Err(e) => {
                    outcome.errors.push(e.to_string());
                    continue;
                }
            };

            match self.store.find_judge(row.courtlistener_id).await {
                Ok(None) => match self.store.upsert_judge(row).await {
                    Ok(()) => outcome.created += 1,
                    Err(e) => outcome.errors.push(format!("judge {}: {e}", record.id)),
                },
                Ok(Some(existing)) => {
                    let stale = cutoff.is_some_and(|c| existing.synced_at < c);
                    if stale {
                        // Identity fields refresh; enrichment from the
                        // details phase is preserved.
                        let refreshed = JudgeRow {
                            court_id: existing.court_id,
                            positions: existing.positions,
                            educations: existing.educations,
                            political_affiliation: existing.political_affiliation,
                            details_synced_at: existing.details_synced_at,
                            decisions_synced_at: existing.decisions_synced_at,
                            ..row
                        };
                        match self.store.upsert_judge(refreshed).await {
                            Ok(()) => outcome.updated += 1,
                            Err(e) => outcome.errors.push(format!("judge {}: {e}", record.id)),
                        }
                    }
                }
                Err(e) => outcome.errors.push(format!("judge {}: {e}", record.id)),
            }
        }

        outcome.duration = started.elapsed();
        info!(
            run = run_number,
            processed = outcome.processed,
            created = outcome.created,
            updated = outcome.updated,
            errors = outcome.errors.len(),
            "Judges batch done"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::courtlistener::testing::StubSource;
    use crate::store::MemoryStore;
    use crate::types::SyncError;

    fn person(id: u64, first: &str, last: Option<&str>) -> PersonRecord {
        PersonRecord {
            id,
            name_first: Some(first.to_string()),
            name_middle: None,
            name_last: last.map(str::to_string),
            name_suffix: None,
            date_dob: None,
            gender: None,
            positions: Vec::new(),
        }
    }

    fn options(batch_size: u32) -> SyncOptions {
        SyncOptions {
            jurisdiction: Some("F".to_string()),
            batch_size,
            force_refresh: false,
            staleness_days: 30,
        }
    }

    #[tokio::test]
    async fn test_creates_new_judges() {
        let people = vec![
            person(1, "Ruth", Some("Ginsburg")),
            person(2, "Thurgood", Some("Marshall")),
        ];
        let store = Arc::new(MemoryStore::new());
        let sync = JudgeSync::new(
            Arc::new(StubSource {
                people,
                ..Default::default()
            }),
            Arc::clone(&store) as Arc<dyn SyncStore>,
            options(10),
        );

        let outcome = sync.run(1).await.unwrap();
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.created, 2);
        assert!(outcome.created + outcome.updated <= outcome.processed);

        let judge = store.find_judge(1).await.unwrap().unwrap();
        assert_eq!(judge.name, "Ruth Ginsburg");
        assert_eq!(judge.jurisdiction.as_deref(), Some("F"));
        assert!(judge.details_synced_at.is_none());
    }

    #[tokio::test]
    async fn test_nameless_person_is_an_error_not_a_row() {
        let people = vec![person(1, "Ruth", Some("Ginsburg")), person(2, "Ghost", None)];
        let store = Arc::new(MemoryStore::new());
        let sync = JudgeSync::new(
            Arc::new(StubSource {
                people,
                ..Default::default()
            }),
            Arc::clone(&store) as Arc<dyn SyncStore>,
            options(10),
        );

        let outcome = sync.run(1).await.unwrap();
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.created, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(store.find_judge(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let people = vec![person(1, "Sandra", Some("O'Connor"))];
        let store = Arc::new(MemoryStore::new());

        for expected_created in [1u32, 0] {
            let sync = JudgeSync::new(
                Arc::new(StubSource {
                    people: people.clone(),
                    ..Default::default()
                }),
                Arc::clone(&store) as Arc<dyn SyncStore>,
                options(10),
            );
            let outcome = sync.run(1).await.unwrap();
            assert_eq!(outcome.created, expected_created);
            assert_eq!(outcome.updated, 0);
        }
    }

    #[tokio::test]
    async fn test_refresh_preserves_enrichment() {
        let store = Arc::new(MemoryStore::new());
        let enriched = JudgeRow {
            courtlistener_id: 1,
            name: "Old Name".to_string(),
            jurisdiction: Some("F".to_string()),
            court_id: Some("scotus".to_string()),
            positions: Vec::new(),
            educations: Vec::new(),
            political_affiliation: Some("Independent".to_string()),
            date_of_birth: None,
            gender: None,
            details_synced_at: Some(Utc::now()),
            decisions_synced_at: None,
            synced_at: Utc::now() - chrono::Duration::days(90),
        };
        store.upsert_judge(enriched).await.unwrap();

        let sync = JudgeSync::new(
            Arc::new(StubSource {
                people: vec![person(1, "New", Some("Name"))],
                ..Default::default()
            }),
            Arc::clone(&store) as Arc<dyn SyncStore>,
            options(10),
        );

        let outcome = sync.run(1).await.unwrap();
        assert_eq!(outcome.updated, 1);

        let judge = store.find_judge(1).await.unwrap().unwrap();
        assert_eq!(judge.name, "New Name");
        assert_eq!(judge.court_id.as_deref(), Some("scotus"));
        assert!(judge.details_synced_at.is_some());
    }

    #[tokio::test]
    async fn test_rate_limit_aborts_the_batch() {
        let sync = JudgeSync::new(
            Arc::new(StubSource {
                rate_limited: true,
                ..Default::default()
            }),
            Arc::new(MemoryStore::new()),
            options(10),
        );

        let err = sync.run(1).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::RateLimited {
                retry_after_secs: Some(120)
            }
        ));
    }
}
