//! Judge-details phase: enriches judge rows with position history,
//! education, and political affiliation
//!
//! Works off the local store, not the external list endpoint: each run takes
//! a batch of judges whose details were never synced (or have gone stale)
//! and pulls their sub-resources. A judge that fails to enrich keeps a null
//! sync stamp and is retried on a later run.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::courtlistener::{CourtDataSource, PositionRecord};
use crate::store::{EducationEntry, JudgeRow, PositionEntry, SyncStore};
use crate::sync::{Phase, PhaseSync, SyncOptions, SyncOutcome};
use crate::types::{Result, SyncError};

pub struct JudgeDetailSync {
    source: Arc<dyn CourtDataSource>,
    store: Arc<dyn SyncStore>,
    options: SyncOptions,
}

impl JudgeDetailSync {
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

    /// Map positions into history entries; the most recent one carries the
    /// judge's court linkage
    fn map_positions(
        judge_id: i64,
        records: &[PositionRecord],
    ) -> Result<(Vec<PositionEntry>, Option<String>)> {
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let court = record.court_id().map_err(|_| {
                SyncError::Mapping(format!(
                    "judge {judge_id}: position {} has no court match",
                    record.id
                ))
            })?;
            entries.push(PositionEntry {
                court,
                title: record
                    .job_title
                    .clone()
                    .or_else(|| record.position_type.clone()),
                date_start: record.date_start,
                date_end: record.date_termination,
            });
        }

        entries.sort_by_key(|e| e.date_start);
        let current_court = entries.last().map(|e| e.court.clone());
        Ok((entries, current_court))
    }

    /// Pull every sub-resource for one judge and write the enriched row
    async fn enrich(&self, judge: &JudgeRow) -> Result<()> {
        let person_id = judge.courtlistener_id as u64;

        let positions = self.source.fetch_positions(person_id).await?;
        let educations = self.source.fetch_educations(person_id).await?;
        let affiliations = self.source.fetch_affiliations(person_id).await?;

        let (position_entries, current_court) =
            Self::map_positions(judge.courtlistener_id, &positions)?;

        if let Some(court) = &current_court {
            if self.store.find_court(court).await?.is_none() {
                return Err(SyncError::Mapping(format!(
                    "judge {}: no court match for {court}",
                    judge.courtlistener_id
                )));
            }
        }

        let education_entries: Vec<EducationEntry> = educations
            .iter()
            .filter_map(|e| {
                e.school.as_ref().map(|s| EducationEntry {
                    school: s.name.clone(),
                    degree: e.degree_level.clone(),
                    year: e.degree_year,
                })
            })
            .collect();

        // Latest affiliation wins.
        let political_affiliation = affiliations
            .iter()
            .max_by_key(|a| a.date_start)
            .and_then(|a| a.political_party.clone());

        let enriched = JudgeRow {
            court_id: current_court,
            positions: position_entries,
            educations: education_entries,
            political_affiliation,
            details_synced_at: Some(Utc::now()),
            ..judge.clone()
        };
        self.store.upsert_judge(enriched).await
    }
}

#[async_trait]
impl PhaseSync for JudgeDetailSync {
    fn phase(&self) -> Phase {
        Phase::JudgeDetails
    }

    async fn run(&self, run_number: u32) -> Result<SyncOutcome> {
        let started = Instant::now();
        let cutoff = self.options.stale_cutoff(Utc::now());
        let pending = self
            .store
            .judges_needing_details(self.options.batch_size, cutoff)
            .await?;

        let mut outcome = SyncOutcome::idle(started.elapsed());

        for judge in &pending {
            outcome.processed += 1;
            match self.enrich(judge).await {
                Ok(()) => outcome.updated += 1,
                // Quota exhaustion is the batch's problem, not the record's.
                Err(e @ SyncError::RateLimited { .. }) => return Err(e),
                Err(e) => outcome.errors.push(e.to_string()),
            }
        }

        outcome.duration = started.elapsed();
        info!(
            run = run_number,
            processed = outcome.processed,
            enriched = outcome.updated,
            errors = outcome.errors.len(),
            "Judge-details batch done"
        );
        Ok(outcome)
    }
}
