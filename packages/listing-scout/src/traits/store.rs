//! Storage traits for listings and comparison reports.
//!
//! - `ListingStore`: records deduplicated by canonical link
//! - `ReportStore`: comparison reports, looked up by subject pair
//! - `ScoutStore`: composite of both, what the pipeline holds

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::types::listing::ListingRecord;
use crate::types::report::ComparisonReport;

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpsertOutcome {
    /// New link, record stored as given.
    Inserted,
    /// Known link. Content untouched, last-seen session updated.
    Refreshed,
}

/// Listing records keyed by `link`.
///
/// First writer wins for content. Implementations must enforce link
/// uniqueness themselves, since sessions write concurrently.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn upsert_listing(&self, record: &ListingRecord) -> StoreResult<UpsertOutcome>;

    async fn get_listing(&self, link: &str) -> StoreResult<Option<ListingRecord>>;

    /// Records first stored for `subject`, oldest first.
    async fn listings_for_subject(&self, subject: &str) -> StoreResult<Vec<ListingRecord>>;

    async fn count_listings(&self) -> StoreResult<usize>;
}

/// Comparison reports.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save_report(&self, report: &ComparisonReport) -> StoreResult<()>;

    /// Most recent report for the pair, subjects in either order.
    async fn latest_report(&self, a: &str, b: &str) -> StoreResult<Option<ComparisonReport>>;
}

/// Everything the pipeline persists.
pub trait ScoutStore: ListingStore + ReportStore {}

impl<T: ListingStore + ReportStore> ScoutStore for T {}
