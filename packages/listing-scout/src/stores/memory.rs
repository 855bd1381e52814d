//! In-memory storage for tests, the CLI default and embedding.
//!
//! Data is lost on restart.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{ListingStore, ReportStore, UpsertOutcome};
use crate::types::listing::ListingRecord;
use crate::types::report::ComparisonReport;

/// Listings keyed by link in insertion order, plus saved reports.
#[derive(Default)]
pub struct MemoryStore {
    listings: RwLock<IndexMap<String, ListingRecord>>,
    reports: RwLock<Vec<ComparisonReport>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("memory store lock poisoned".into())
}

#[async_trait]
impl ListingStore for MemoryStore {
    async fn upsert_listing(&self, record: &ListingRecord) -> StoreResult<UpsertOutcome> {
        // Check and insert under one write lock so concurrent sessions
        // cannot both insert the same link.
        let mut listings = self.listings.write().map_err(poisoned)?;
        match listings.get_mut(&record.link) {
            Some(existing) => {
                existing.last_seen_session_id = record.session_id;
                Ok(UpsertOutcome::Refreshed)
            }
            None => {
                listings.insert(record.link.clone(), record.clone());
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn get_listing(&self, link: &str) -> StoreResult<Option<ListingRecord>> {
        let listings = self.listings.read().map_err(poisoned)?;
        Ok(listings.get(link).cloned())
    }

    async fn listings_for_subject(&self, subject: &str) -> StoreResult<Vec<ListingRecord>> {
        let listings = self.listings.read().map_err(poisoned)?;
        Ok(listings
            .values()
            .filter(|r| r.subject.eq_ignore_ascii_case(subject))
            .cloned()
            .collect())
    }

    async fn count_listings(&self) -> StoreResult<usize> {
        Ok(self.listings.read().map_err(poisoned)?.len())
    }
}

#[async_trait]
impl ReportStore for MemoryStore {
    async fn save_report(&self, report: &ComparisonReport) -> StoreResult<()> {
        self.reports.write().map_err(poisoned)?.push(report.clone());
        Ok(())
    }

    async fn latest_report(&self, a: &str, b: &str) -> StoreResult<Option<ComparisonReport>> {
        let reports = self.reports.read().map_err(poisoned)?;
        Ok(reports.iter().rev().find(|r| r.covers(a, b)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::listing::{ListingCandidate, ListingFields};
    use crate::types::session::BackendKind;
    use std::sync::Arc;
    use uuid::Uuid;

    const LINK: &str = "https://ikman.lk/en/ad/toyota-aqua-2015-for-sale-colombo-4412";

    fn record(subject: &str, session: Uuid, price: &str) -> ListingRecord {
        let candidate = ListingCandidate::new(LINK, subject, "ikman.lk");
        let fields = ListingFields::default()
            .with_title("Toyota Aqua 2015")
            .with_price(price);
        ListingRecord::from_fields(fields, &candidate, session)
    }

    fn report(session: Uuid, text: &str) -> ComparisonReport {
        ComparisonReport::new(
            session,
            "Toyota Aqua",
            "Honda Fit",
            BackendKind::LocalDeterministic,
            text,
        )
    }

    #[tokio::test]
    async fn test_first_writer_wins() {
        let store = MemoryStore::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        assert_eq!(
            store.upsert_listing(&record("Toyota Aqua", first, "4,500,000")).await.unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            store.upsert_listing(&record("Aqua Hybrid", second, "9,999,999")).await.unwrap(),
            UpsertOutcome::Refreshed
        );

        assert_eq!(store.count_listings().await.unwrap(), 1);
        let stored = store.get_listing(LINK).await.unwrap().unwrap();
        assert_eq!(stored.subject, "Toyota Aqua");
        assert_eq!(stored.price, "LKR 4,500,000");
        assert_eq!(stored.session_id, first);
        assert_eq!(stored.last_seen_session_id, second);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_insert_once() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .upsert_listing(&record("Toyota Aqua", Uuid::new_v4(), "1"))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() == UpsertOutcome::Inserted {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.count_listings().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_listings_for_subject() {
        let store = MemoryStore::new();
        store.upsert_listing(&record("Toyota Aqua", Uuid::new_v4(), "1")).await.unwrap();

        assert_eq!(store.listings_for_subject("toyota aqua").await.unwrap().len(), 1);
        assert!(store.listings_for_subject("Honda Fit").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_report_either_order() {
        let store = MemoryStore::new();
        let session = Uuid::new_v4();
        store
            .save_report(&report(session, "old"))
            .await
            .unwrap();
        store
            .save_report(&report(session, "new"))
            .await
            .unwrap();

        let found = store.latest_report("honda fit", "Toyota Aqua").await.unwrap().unwrap();
        assert_eq!(found.text, "new");
        assert!(store.latest_report("Honda Fit", "Suzuki Alto").await.unwrap().is_none());
    }

    #[test]
    fn test_empty_store_lookups() {
        let store = MemoryStore::new();
        tokio_test::block_on(async {
            assert_eq!(store.count_listings().await.unwrap(), 0);
            assert!(store.get_listing(LINK).await.unwrap().is_none());
            assert!(store.listings_for_subject("Toyota Aqua").await.unwrap().is_empty());
            assert!(store
                .latest_report("Toyota Aqua", "Honda Fit")
                .await
                .unwrap()
                .is_none());
        });
    }
}
