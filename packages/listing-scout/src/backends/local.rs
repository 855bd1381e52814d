//! Offline deterministic backend.
//!
//! Produces a templated comparison, synthetic ikman.lk detail URLs and
//! synthetic listing fields, all derived from SHA-256 of the inputs. Same
//! input, same output, no network. This backend has no failure path.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::normalize::group_thousands;
use crate::types::listing::{ListingCandidate, ListingFields, ListingRecord};

const LOCAL_SITE: &str = "ikman.lk";

/// Listings synthesized per subject before the candidate cap applies.
const LOCAL_LISTINGS: usize = 5;

const LOCATIONS: &[&str] = &[
    "Colombo",
    "Kandy",
    "Galle",
    "Negombo",
    "Kurunegala",
    "Ratnapura",
    "Anuradhapura",
];
const YEARS: &[u32] = &[2016, 2017, 2018, 2019, 2020, 2021, 2022];
const CONDITIONS: &[&str] = &[
    "Excellent",
    "Very Good",
    "Good",
    "Well Maintained",
    "Perfect",
    "Mint",
];

/// The deterministic backend.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    max_candidates: usize,
}

impl LocalBackend {
    pub fn new(max_candidates: usize) -> Self {
        Self { max_candidates }
    }

    pub fn produce_comparison(&self, subject_a: &str, subject_b: &str) -> String {
        let rating_a = 70 + seed(&[subject_a, "rating"]) % 20;
        let rating_b = 70 + seed(&[subject_b, "rating"]) % 20;
        let (low_a, high_a) = price_band(subject_a);
        let (low_b, high_b) = price_band(subject_b);

        format!(
            "# Comparison: {subject_a} vs {subject_b}\n\
             \n\
             ## Summary\n\
             Both the {subject_a} and the {subject_b} are common choices on the local used market. \
             This report was generated offline and contains indicative figures only.\n\
             \n\
             ## Market Positioning\n\
             ### {subject_a}\n\
             - **Price Range**: LKR {} - {} (used market)\n\
             - **Best For**: buyers prioritising running costs\n\
             \n\
             ### {subject_b}\n\
             - **Price Range**: LKR {} - {} (used market)\n\
             - **Best For**: buyers prioritising comfort and resale value\n\
             \n\
             ## Ownership Notes\n\
             - Check service records and the condition of the transmission on both.\n\
             - Confirm mileage against the service book before paying a deposit.\n\
             \n\
             ## Overall Rating\n\
             - {subject_a}: {}.{}/10\n\
             - {subject_b}: {}.{}/10\n",
            group_thousands(low_a),
            group_thousands(high_a),
            group_thousands(low_b),
            group_thousands(high_b),
            rating_a / 10,
            rating_a % 10,
            rating_b / 10,
            rating_b % 10,
        )
    }

    pub fn discover_listing_urls(&self, subject: &str) -> Vec<ListingCandidate> {
        let slug = slugify(subject);
        (0..LOCAL_LISTINGS.min(self.max_candidates))
            .map(|i| {
                // Last digit is the index, so ids never collide.
                let id = (10_000 + seed(&[subject, &i.to_string()]) % 90_000) * 10 + i as u64;
                ListingCandidate::new(
                    format!("https://{LOCAL_SITE}/en/ad/{slug}-for-sale-{id}"),
                    subject,
                    LOCAL_SITE,
                )
            })
            .collect()
    }

    pub fn extract_details(&self, candidate: &ListingCandidate, session_id: Uuid) -> ListingRecord {
        ListingRecord::from_fields(synthetic_fields(candidate), candidate, session_id)
    }
}

/// Listing fields for a synthetic candidate.
fn synthetic_fields(candidate: &ListingCandidate) -> ListingFields {
    let url = candidate.url.as_str();
    let year = pick(YEARS, &[url, "year"]);
    let mileage = 25_000 + seed(&[url, "mileage"]) % 60_000;
    let (base, _) = price_band(&candidate.subject);

    let age_discount = u64::from(2023u32.saturating_sub(year)) * 200_000;
    let jitter = seed(&[url, "price"]) % 600_000;
    let price = (base + 1_500_000 + jitter)
        .saturating_sub(age_discount)
        .saturating_sub(mileage * 10);

    ListingFields::default()
        .with_title(format!(
            "{} {} - {} Condition",
            candidate.subject,
            year,
            pick(CONDITIONS, &[url, "condition"])
        ))
        .with_price(format!("LKR {}", group_thousands(price)))
        .with_location(pick(LOCATIONS, &[url, "location"]).to_string())
        .with_mileage(format!("{} km", group_thousands(mileage)))
        .with_year(year.to_string())
}

/// Indicative used-market band for a subject, in whole LKR.
fn price_band(subject: &str) -> (u64, u64) {
    let low = 3_000_000 + (seed(&[subject, "band"]) % 20) * 100_000;
    (low, low + 1_600_000)
}

fn seed(parts: &[&str]) -> u64 {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.to_lowercase().as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn pick<T: Copy>(items: &[T], parts: &[&str]) -> T {
    items[(seed(parts) % items.len() as u64) as usize]
}

fn slugify(subject: &str) -> String {
    let mut slug = String::with_capacity(subject.len());
    for ch in subject.to_lowercase().chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch);
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::SENTINEL;
    use crate::sites::{SiteSet, UrlClass};

    #[test]
    fn test_comparison_is_deterministic() {
        let local = LocalBackend::new(5);
        let first = local.produce_comparison("Toyota Aqua", "Honda Fit");
        assert_eq!(first, local.produce_comparison("Toyota Aqua", "Honda Fit"));
        assert!(first.contains("Toyota Aqua"));
        assert!(first.contains("Honda Fit"));
    }

    #[test]
    fn test_discovered_urls_classify_as_detail() {
        let local = LocalBackend::new(3);
        let candidates = local.discover_listing_urls("Toyota Aqua");
        assert_eq!(candidates.len(), 3);

        let sites = SiteSet::default();
        for c in &candidates {
            assert_eq!(sites.classify(&c.url), UrlClass::Detail, "{}", c.url);
            assert_eq!(c.subject, "Toyota Aqua");
        }
        assert_eq!(candidates, local.discover_listing_urls("Toyota Aqua"));
    }

    #[test]
    fn test_extracted_records_fully_resolved() {
        let local = LocalBackend::new(5);
        let session = Uuid::new_v4();
        for candidate in local.discover_listing_urls("Honda Fit") {
            let record = local.extract_details(&candidate, session);
            assert_eq!(record.resolved_fields(), 5);
            assert!(record.price.starts_with("LKR "));
            assert!(record.price_value.is_some());
            assert!(record.mileage_km.is_some());
            assert_ne!(record.location, SENTINEL);
            assert_eq!(record.link, candidate.url);
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Toyota Aqua"), "toyota-aqua");
        assert_eq!(slugify("  Honda  Fit GP5! "), "honda-fit-gp5");
        assert_eq!(slugify("***"), "item");
    }
}
