//! CourtListener API integration
//!
//! - **client**: authenticated, rate-limit-accounted HTTP client
//! - **types**: wire shapes for the v4 REST endpoints

pub mod client;
pub mod types;

pub use client::{ClientConfig, CourtDataSource, CourtListenerClient};
pub use types::{
    AffiliationRecord, ApiPage, CourtRecord, EducationRecord, OpinionRecord, PersonRecord,
    PositionRecord, SchoolRecord,
};

#[cfg(test)]
pub(crate) mod testing {
    //! Canned data source for sync-manager tests

    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::types::{Result, SyncError};

    /// `CourtDataSource` serving fixed data, with offset-encoded cursors
    #[derive(Default)]
    pub(crate) struct StubSource {
        pub courts: Vec<CourtRecord>,
        pub people: Vec<PersonRecord>,
        pub positions: HashMap<u64, Vec<PositionRecord>>,
        pub educations: HashMap<u64, Vec<EducationRecord>>,
        pub affiliations: HashMap<u64, Vec<AffiliationRecord>>,
        pub opinions: HashMap<u64, Vec<OpinionRecord>>,
        /// Person ids whose sub-resource fetches fail
        pub broken_people: Vec<u64>,
        /// Every call fails with `RateLimited` when set
        pub rate_limited: bool,
    }

    fn page_of<T: Clone>(items: &[T], cursor: Option<&str>, page_size: u32) -> ApiPage<T> {
        let offset: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let results: Vec<T> = items
            .iter()
            .skip(offset)
            .take(page_size as usize)
            .cloned()
            .collect();
        let consumed = offset + results.len();
        ApiPage {
            count: Some(items.len() as u64),
            next: (consumed < items.len()).then(|| consumed.to_string()),
            results,
        }
    }

    impl StubSource {
        fn gate(&self, person_id: u64) -> Result<()> {
            if self.rate_limited {
                return Err(SyncError::RateLimited {
                    retry_after_secs: Some(120),
                });
            }
            if self.broken_people.contains(&person_id) {
                return Err(SyncError::Fetch {
                    status: 502,
                    body: format!("upstream error for person {person_id}"),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl CourtDataSource for StubSource {
        async fn fetch_courts(
            &self,
            cursor: Option<&str>,
            _jurisdiction: Option<&str>,
            page_size: u32,
        ) -> Result<ApiPage<CourtRecord>> {
            if self.rate_limited {
                return Err(SyncError::RateLimited {
                    retry_after_secs: Some(120),
                });
            }
            Ok(page_of(&self.courts, cursor, page_size))
        }

        async fn fetch_people(
            &self,
            cursor: Option<&str>,
            _jurisdiction: Option<&str>,
            page_size: u32,
        ) -> Result<ApiPage<PersonRecord>> {
            if self.rate_limited {
                return Err(SyncError::RateLimited {
                    retry_after_secs: Some(120),
                });
            }
            Ok(page_of(&self.people, cursor, page_size))
        }

        async fn fetch_positions(&self, person_id: u64) -> Result<Vec<PositionRecord>> {
            self.gate(person_id)?;
            Ok(self.positions.get(&person_id).cloned().unwrap_or_default())
        }

        async fn fetch_educations(&self, person_id: u64) -> Result<Vec<EducationRecord>> {
            self.gate(person_id)?;
            Ok(self.educations.get(&person_id).cloned().unwrap_or_default())
        }

        async fn fetch_affiliations(&self, person_id: u64) -> Result<Vec<AffiliationRecord>> {
            self.gate(person_id)?;
            Ok(self
                .affiliations
                .get(&person_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn fetch_opinions(
            &self,
            person_id: u64,
            page_size: u32,
        ) -> Result<ApiPage<OpinionRecord>> {
            self.gate(person_id)?;
            Ok(page_of(
                self.opinions
                    .get(&person_id)
                    .map(Vec::as_slice)
                    .unwrap_or_default(),
                None,
                page_size,
            ))
        }
    }
}
