//! Courts phase: reference data pulled ahead of every other phase
//!
//! Judges and decisions link to courts by external id, so courts land
//! first. The orchestrator runs this phase exactly once per bulk import.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::info;

use crate::courtlistener::{CourtDataSource, CourtRecord};
use crate::store::{CourtRow, SyncStore};
use crate::sync::{PageCursor, Phase, PhaseSync, SyncOptions, SyncOutcome};
use crate::types::{Result, SyncError};

pub struct CourtSync {
    source: Arc<dyn CourtDataSource>,
    store: Arc<dyn SyncStore>,
    options: SyncOptions,
    cursor: Mutex<PageCursor>,
}

impl CourtSync {
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

    fn map_court(record: &CourtRecord) -> Result<CourtRow> {
        if record.full_name.trim().is_empty() {
            return Err(SyncError::Mapping(format!(
                "court {} has no name",
                record.id
            )));
        }
        Ok(CourtRow {
            courtlistener_id: record.id.clone(),
            name: record.full_name.clone(),
            short_name: record.short_name.clone(),
            jurisdiction: record.jurisdiction.clone(),
            citation_string: record.citation_string.clone(),
            in_use: record.in_use.unwrap_or(true),
            synced_at: Utc::now(),
        })
    }
}

#[async_trait]
impl PhaseSync for CourtSync {
    fn phase(&self) -> Phase {
        Phase::Courts
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
            .fetch_courts(
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

            let row = match Self::map_court(record) {
                Ok(row) => row,
                Err(e) => {
                    outcome.errors.push(e.to_string());
                    continue;
                }
            };

            match self.store.find_court(&row.courtlistener_id).await {
                Ok(None) => match self.store.upsert_court(row).await {
                    Ok(()) => outcome.created += 1,
                    Err(e) => outcome.errors.push(format!("court {}: {e}", record.id)),
                },
                Ok(Some(existing)) => {
                    let stale = cutoff.is_some_and(|c| existing.synced_at < c);
                    if stale {
                        match self.store.upsert_court(row).await {
                            Ok(()) => outcome.updated += 1,
                            Err(e) => outcome.errors.push(format!("court {}: {e}", record.id)),
                        }
                    }
                }
                Err(e) => outcome.errors.push(format!("court {}: {e}", record.id)),
            }
        }

        outcome.duration = started.elapsed();
        info!(
            run = run_number,
            processed = outcome.processed,
            created = outcome.created,
            updated = outcome.updated,
            errors = outcome.errors.len(),
            "Courts batch done"
        );
        Ok(outcome)
    }
}
