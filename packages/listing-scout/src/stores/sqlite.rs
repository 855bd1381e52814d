//! SQLite storage implementation.
//!
//! Creates its own schema on connect. Link uniqueness is enforced by the
//! table's primary key, so concurrent sessions may upsert freely.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::traits::store::{ListingStore, ReportStore, UpsertOutcome};
use crate::types::listing::ListingRecord;
use crate::types::report::ComparisonReport;

/// SQLite-backed listing and report store.
pub struct SqliteStore {
    pool: SqlitePool,
}

fn storage(e: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(e))
}

impl SqliteStore {
    /// Connect and create the schema.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://scout.db?mode=rwc` - File, created if missing
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        // Every connection to `:memory:` is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(storage)?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn in_memory() -> StoreResult<Self> {
        Self::new("sqlite::memory:").await
    }

    async fn run_migrations(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS listings (
                link TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                price TEXT NOT NULL,
                price_raw TEXT NOT NULL,
                price_value INTEGER,
                location TEXT NOT NULL,
                mileage TEXT NOT NULL,
                mileage_raw TEXT NOT NULL,
                mileage_km INTEGER,
                year TEXT NOT NULL,
                subject TEXT NOT NULL,
                session_id TEXT NOT NULL,
                last_seen_session_id TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_listings_subject ON listings(subject);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comparison_reports (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                subject_a TEXT NOT NULL,
                subject_b TEXT NOT NULL,
                backend TEXT NOT NULL,
                report TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct ListingRow {
    link: String,
    title: String,
    price: String,
    price_raw: String,
    price_value: Option<i64>,
    location: String,
    mileage: String,
    mileage_raw: String,
    mileage_km: Option<i64>,
    year: String,
    subject: String,
    session_id: String,
    last_seen_session_id: String,
    created_at: String,
}

impl ListingRow {
    fn into_record(self) -> StoreResult<ListingRecord> {
        Ok(ListingRecord {
            title: self.title,
            price: self.price,
            price_raw: self.price_raw,
            price_value: self.price_value.map(|v| v as u64),
            location: self.location,
            mileage: self.mileage,
            mileage_raw: self.mileage_raw,
            mileage_km: self.mileage_km.map(|v| v as u64),
            year: self.year,
            subject: self.subject,
            session_id: parse_uuid(&self.session_id)?,
            last_seen_session_id: parse_uuid(&self.last_seen_session_id)?,
            created_at: parse_time(&self.created_at)?,
            link: self.link,
        })
    }
}

#[derive(Debug, FromRow)]
struct ReportRow {
    session_id: String,
    subject_a: String,
    subject_b: String,
    backend: String,
    report: String,
    created_at: String,
}

impl ReportRow {
    fn into_report(self) -> StoreResult<ComparisonReport> {
        Ok(ComparisonReport {
            session_id: parse_uuid(&self.session_id)?,
            backend: self
                .backend
                .parse()
                .map_err(|_| StoreError::Corrupt(format!("unknown backend {}", self.backend)))?,
            created_at: parse_time(&self.created_at)?,
            subject_a: self.subject_a,
            subject_b: self.subject_b,
            text: self.report,
        })
    }
}

fn parse_uuid(raw: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Corrupt(format!("bad uuid {raw}: {e}")))
}

fn parse_time(raw: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {raw}: {e}")))
}

#[async_trait]
impl ListingStore for SqliteStore {
    async fn upsert_listing(&self, record: &ListingRecord) -> StoreResult<UpsertOutcome> {
        // `changes()` is 1 on both paths, so the returned first-writer columns
        // tell an insert from a refresh.
        let (stored_session, stored_at): (String, String) = sqlx::query_as(
            r#"
            INSERT INTO listings (
                link, title, price, price_raw, price_value, location, mileage,
                mileage_raw, mileage_km, year, subject, session_id,
                last_seen_session_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(link) DO UPDATE SET
                last_seen_session_id = excluded.last_seen_session_id
            RETURNING session_id, created_at
            "#,
        )
        .bind(&record.link)
        .bind(&record.title)
        .bind(&record.price)
        .bind(&record.price_raw)
        .bind(record.price_value.map(|v| v as i64))
        .bind(&record.location)
        .bind(&record.mileage)
        .bind(&record.mileage_raw)
        .bind(record.mileage_km.map(|v| v as i64))
        .bind(&record.year)
        .bind(&record.subject)
        .bind(record.session_id.to_string())
        .bind(record.last_seen_session_id.to_string())
        .bind(record.created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(storage)?;

        let inserted = stored_session == record.session_id.to_string()
            && stored_at == record.created_at.to_rfc3339();
        if inserted {
            Ok(UpsertOutcome::Inserted)
        } else {
            Ok(UpsertOutcome::Refreshed)
        }
    }

    async fn get_listing(&self, link: &str) -> StoreResult<Option<ListingRecord>> {
        let row = sqlx::query_as::<_, ListingRow>("SELECT * FROM listings WHERE link = ?")
            .bind(link)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;

        row.map(ListingRow::into_record).transpose()
    }

    async fn listings_for_subject(&self, subject: &str) -> StoreResult<Vec<ListingRecord>> {
        let rows = sqlx::query_as::<_, ListingRow>(
            "SELECT * FROM listings WHERE subject = ? COLLATE NOCASE ORDER BY rowid",
        )
        .bind(subject)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.into_iter().map(ListingRow::into_record).collect()
    }

    async fn count_listings(&self) -> StoreResult<usize> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM listings")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        Ok(count as usize)
    }
}

#[async_trait]
impl ReportStore for SqliteStore {
    async fn save_report(&self, report: &ComparisonReport) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO comparison_reports
                (session_id, subject_a, subject_b, backend, report, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.session_id.to_string())
        .bind(&report.subject_a)
        .bind(&report.subject_b)
        .bind(report.backend.as_str())
        .bind(&report.text)
        .bind(report.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(())
    }

    async fn latest_report(&self, a: &str, b: &str) -> StoreResult<Option<ComparisonReport>> {
        let row = sqlx::query_as::<_, ReportRow>(
            r#"
            SELECT session_id, subject_a, subject_b, backend, report, created_at
            FROM comparison_reports
            WHERE (subject_a = ?1 COLLATE NOCASE AND subject_b = ?2 COLLATE NOCASE)
               OR (subject_a = ?2 COLLATE NOCASE AND subject_b = ?1 COLLATE NOCASE)
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        row.map(ReportRow::into_report).transpose()
    }
}
