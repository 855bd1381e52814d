//! Filtering and price statistics over listing records.

use serde::{Deserialize, Serialize};

use crate::types::listing::ListingRecord;

/// Record filter. Unset bounds match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,

    /// Exact manufacture year.
    pub year: Option<String>,

    /// Case-insensitive substring of the location.
    pub location: Option<String>,
}

impl ListingFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price_range(mut self, min: Option<u64>, max: Option<u64>) -> Self {
        self.min_price = min;
        self.max_price = max;
        self
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        self.year = Some(year.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Records without a numeric price never match.
    pub fn matches(&self, record: &ListingRecord) -> bool {
        let Some(price) = record.price_value else {
            return false;
        };

        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        if let Some(year) = &self.year {
            if record.year.trim() != year.trim() {
                return false;
            }
        }
        if let Some(location) = &self.location {
            if !record
                .location
                .to_lowercase()
                .contains(&location.trim().to_lowercase())
            {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, records: &'a [ListingRecord]) -> Vec<&'a ListingRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

/// Price summary of a set of records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingStats {
    pub count: usize,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,

    /// Integer mean, truncated.
    pub avg_price: Option<u64>,
}

/// Summarize the priced records among `records`.
pub fn summarize<'a, I>(records: I) -> ListingStats
where
    I: IntoIterator<Item = &'a ListingRecord>,
{
    let prices: Vec<u64> = records.into_iter().filter_map(|r| r.price_value).collect();
    if prices.is_empty() {
        return ListingStats::default();
    }

    let total: u128 = prices.iter().map(|&p| p as u128).sum();
    ListingStats {
        count: prices.len(),
        min_price: prices.iter().copied().min(),
        max_price: prices.iter().copied().max(),
        avg_price: Some((total / prices.len() as u128) as u64),
    }
}

/// Filter, then summarize.
pub fn filter_and_summarize<'a>(
    records: &'a [ListingRecord],
    filter: &ListingFilter,
) -> (Vec<&'a ListingRecord>, ListingStats) {
    let matched = filter.apply(records);
    let stats = summarize(matched.iter().copied());
    (matched, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::listing::{ListingCandidate, ListingFields};
    use uuid::Uuid;

    fn record(id: u32, price: &str, year: &str, location: &str) -> ListingRecord {
        let candidate = ListingCandidate::new(
            format!("https://ikman.lk/en/ad/toyota-aqua-for-sale-{id}"),
            "Toyota Aqua",
            "ikman.lk",
        );
        let fields = ListingFields::default()
            .with_price(price)
            .with_year(year)
            .with_location(location);
        ListingRecord::from_fields(fields, &candidate, Uuid::new_v4())
    }

    fn sample() -> Vec<ListingRecord> {
        vec![
            record(1, "Rs 4,000,000", "2014", "Colombo"),
            record(2, "Rs 5,000,000", "2015", "Kandy"),
            record(3, "Rs 6,500,000", "2015", "Colombo 7"),
            record(4, "Negotiable", "2016", "Galle"),
        ]
    }

    #[test]
    fn test_unfiltered_stats_skip_unpriced() {
        let records = sample();
        let (matched, stats) = filter_and_summarize(&records, &ListingFilter::new());

        assert_eq!(matched.len(), 3);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min_price, Some(4_000_000));
        assert_eq!(stats.max_price, Some(6_500_000));
        assert_eq!(stats.avg_price, Some(5_166_666));
    }

    #[test]
    fn test_filters_combine() {
        let records = sample();
        let filter = ListingFilter::new()
            .with_price_range(Some(4_500_000), None)
            .with_year("2015")
            .with_location("colombo");
        let (matched, stats) = filter_and_summarize(&records, &filter);

        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].location, "Colombo 7");
        assert_eq!(stats.avg_price, Some(6_500_000));
    }

    #[test]
    fn test_empty_stats() {
        let stats = summarize(&Vec::<ListingRecord>::new());
        assert_eq!(stats, ListingStats::default());
        assert_eq!(stats.avg_price, None);
    }
}
