//! In-memory implementation of the storage contract
//!
//! Backs tests and `--offline` smoke runs. Semantics mirror the PostgREST
//! store: upserts replace by external id, pending-work queries order
//! oldest-first with never-synced rows ahead of stale ones.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::store::{CourtRow, DecisionRow, JudgeRow, StoreCounts, SyncStore};
use crate::types::Result;

#[derive(Default)]
pub struct MemoryStore {
    courts: RwLock<HashMap<String, CourtRow>>,
    judges: RwLock<HashMap<i64, JudgeRow>>,
    decisions: RwLock<HashMap<i64, DecisionRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn find_court(&self, external_id: &str) -> Result<Option<CourtRow>> {
        Ok(self.courts.read().await.get(external_id).cloned())
    }

    async fn upsert_court(&self, row: CourtRow) -> Result<()> {
        self.courts
            .write()
            .await
            .insert(row.courtlistener_id.clone(), row);
        Ok(())
    }

    async fn find_judge(&self, external_id: i64) -> Result<Option<JudgeRow>> {
        Ok(self.judges.read().await.get(&external_id).cloned())
    }

    async fn upsert_judge(&self, row: JudgeRow) -> Result<()> {
        self.judges.write().await.insert(row.courtlistener_id, row);
        Ok(())
    }

    async fn judges_needing_details(
        &self,
        limit: u32,
        stale_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<JudgeRow>> {
        let judges = self.judges.read().await;
        let mut pending: Vec<JudgeRow> = judges
            .values()
            .filter(|j| match (j.details_synced_at, stale_before) {
                (None, _) => true,
                (Some(at), Some(cutoff)) => at < cutoff,
                (Some(_), None) => false,
            })
            .cloned()
            .collect();

        // Never-synced first, then oldest sync, id as tiebreak for stable pages.
        pending.sort_by_key(|j| (j.details_synced_at.is_some(), j.details_synced_at, j.courtlistener_id));
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn judges_needing_decisions(&self, limit: u32) -> Result<Vec<JudgeRow>> {
        let judges = self.judges.read().await;
        let mut pending: Vec<JudgeRow> = judges
            .values()
            .filter(|j| j.decisions_synced_at.is_none())
            .cloned()
            .collect();

        pending.sort_by_key(|j| j.courtlistener_id);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn find_decision(&self, external_id: i64) -> Result<Option<DecisionRow>> {
        Ok(self.decisions.read().await.get(&external_id).cloned())
    }

    async fn upsert_decision(&self, row: DecisionRow) -> Result<()> {
        self.decisions
            .write()
            .await
            .insert(row.courtlistener_id, row);
        Ok(())
    }

    async fn mark_decisions_synced(&self, judge_id: i64, at: DateTime<Utc>) -> Result<()> {
        if let Some(judge) = self.judges.write().await.get_mut(&judge_id) {
            judge.decisions_synced_at = Some(at);
        }
        Ok(())
    }

    async fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            courts: self.courts.read().await.len() as u64,
            judges: self.judges.read().await.len() as u64,
            decisions: self.decisions.read().await.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn judge(id: i64, details_synced_at: Option<DateTime<Utc>>) -> JudgeRow {
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
            details_synced_at,
            decisions_synced_at: None,
            synced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_external_id() {
        let store = MemoryStore::new();
        store.upsert_judge(judge(1, None)).await.unwrap();

        let mut updated = judge(1, None);
        updated.name = "Updated".to_string();
        store.upsert_judge(updated).await.unwrap();

        assert_eq!(store.counts().await.unwrap().judges, 1);
        assert_eq!(store.find_judge(1).await.unwrap().unwrap().name, "Updated");
    }

    #[tokio::test]
    async fn test_needing_details_orders_never_synced_first() {
        let store = MemoryStore::new();
        let old: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        store.upsert_judge(judge(1, Some(old))).await.unwrap();
        store.upsert_judge(judge(2, None)).await.unwrap();

        let cutoff: DateTime<Utc> = "2026-02-01T00:00:00Z".parse().unwrap();
        let pending = store.judges_needing_details(10, Some(cutoff)).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].courtlistener_id, 2);
        assert_eq!(pending[1].courtlistener_id, 1);
    }

    #[tokio::test]
    async fn test_needing_details_without_cutoff_skips_synced() {
        let store = MemoryStore::new();
        store
            .upsert_judge(judge(1, Some(Utc::now())))
            .await
            .unwrap();
        store.upsert_judge(judge(2, None)).await.unwrap();

        let pending = store.judges_needing_details(10, None).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].courtlistener_id, 2);
    }

    #[tokio::test]
    async fn test_mark_decisions_synced() {
        let store = MemoryStore::new();
        store.upsert_judge(judge(5, None)).await.unwrap();
        assert_eq!(store.judges_needing_decisions(10).await.unwrap().len(), 1);

        store.mark_decisions_synced(5, Utc::now()).await.unwrap();
        assert!(store.judges_needing_decisions(10).await.unwrap().is_empty());
    }
}
