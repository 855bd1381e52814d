//! Listing candidates and normalized listing records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::normalize::{self, SENTINEL};

/// A discovered URL not yet confirmed to be a valid single-item page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingCandidate {
    /// Canonical link.
    pub url: String,

    /// The subject this URL was discovered for.
    pub subject: String,

    /// Host of the marketplace site, without `www.`.
    pub site: String,
}

impl ListingCandidate {
    pub fn new(
        url: impl Into<String>,
        subject: impl Into<String>,
        site: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            subject: subject.into(),
            site: site.into(),
        }
    }
}

/// Raw field text as located on a page, before normalization.
///
/// `None` means the field could not be located.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingFields {
    pub title: Option<String>,
    pub price: Option<String>,
    pub location: Option<String>,
    pub mileage: Option<String>,
    pub year: Option<String>,
}

impl ListingFields {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_mileage(mut self, mileage: impl Into<String>) -> Self {
        self.mileage = Some(mileage.into());
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }
}

/// A normalized, deduplicated listing.
///
/// Unresolved fields carry the literal sentinel `"Not Found"`; the numeric
/// companions are `None` in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub price: String,
    pub price_raw: String,
    pub price_value: Option<u64>,
    pub location: String,
    pub mileage: String,
    pub mileage_raw: String,
    pub mileage_km: Option<u64>,
    pub year: String,

    /// Canonical link. Globally unique.
    pub link: String,
    pub subject: String,

    /// Session that first stored this link.
    pub session_id: Uuid,

    /// Most recent session that re-discovered this link.
    pub last_seen_session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl ListingRecord {
    /// Build a record from raw fields, applying the field normalizer.
    pub fn from_fields(
        fields: ListingFields,
        candidate: &ListingCandidate,
        session_id: Uuid,
    ) -> Self {
        let price_raw = fields.price.unwrap_or_else(|| SENTINEL.to_string());
        let mileage_raw = fields.mileage.unwrap_or_else(|| SENTINEL.to_string());

        let price = normalize::normalize_price(&price_raw);
        let mileage = normalize::normalize_mileage(&mileage_raw);

        Self {
            title: normalize::normalize_text(fields.title.as_deref()),
            price_value: normalize::parse_price(&price),
            price,
            price_raw,
            location: normalize::normalize_text(fields.location.as_deref()),
            mileage_km: normalize::parse_mileage_km(&mileage),
            mileage,
            mileage_raw,
            year: normalize::normalize_year(fields.year.as_deref().unwrap_or(SENTINEL)),
            link: candidate.url.clone(),
            subject: candidate.subject.clone(),
            session_id,
            last_seen_session_id: session_id,
            created_at: Utc::now(),
        }
    }

    /// A record whose every field is the sentinel.
    pub fn degraded(candidate: &ListingCandidate, session_id: Uuid) -> Self {
        Self::from_fields(ListingFields::default(), candidate, session_id)
    }

    /// Number of the five content fields that were resolved.
    pub fn resolved_fields(&self) -> usize {
        [
            &self.title,
            &self.price,
            &self.location,
            &self.mileage,
            &self.year,
        ]
        .iter()
        .filter(|v| v.as_str() != SENTINEL)
        .count()
    }

    /// True when nothing at all was extracted.
    pub fn is_blank(&self) -> bool {
        self.resolved_fields() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> ListingCandidate {
        ListingCandidate::new(
            "https://ikman.lk/en/ad/toyota-aqua-2015-for-sale-colombo-4412",
            "Toyota Aqua",
            "ikman.lk",
        )
    }

    #[test]
    fn test_from_fields_normalizes() {
        let fields = ListingFields::default()
            .with_title("  Toyota Aqua 2015  ")
            .with_price("Rs 4,550,000")
            .with_location("Colombo")
            .with_mileage("only 85km")
            .with_year("Year: 2015");

        let record = ListingRecord::from_fields(fields, &candidate(), Uuid::new_v4());

        assert_eq!(record.title, "Toyota Aqua 2015");
        assert_eq!(record.price, "LKR 4,550,000");
        assert_eq!(record.price_raw, "Rs 4,550,000");
        assert_eq!(record.price_value, Some(4_550_000));
        assert_eq!(record.mileage, "85,000 km");
        assert_eq!(record.mileage_km, Some(85_000));
        assert_eq!(record.year, "2015");
        assert_eq!(record.resolved_fields(), 5);
    }

    #[test]
    fn test_degraded_record_is_blank() {
        let session = Uuid::new_v4();
        let record = ListingRecord::degraded(&candidate(), session);

        assert!(record.is_blank());
        assert_eq!(record.price, SENTINEL);
        assert_eq!(record.price_value, None);
        assert_eq!(record.session_id, session);
        assert_eq!(record.link, candidate().url);
    }
}
