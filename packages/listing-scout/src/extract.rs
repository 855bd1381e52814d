//! Detail extractor.
//!
//! Turns one fetched detail page into a [`ListingRecord`]. Each field is
//! located by the site's CSS selectors, then by a labeled row ("Mileage:"
//! followed by its value), then, for mileage and year only, by a regex over
//! the page text. A field that survives none of these becomes the sentinel.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, LazyLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::{FetchError, FetchResult};
use crate::sites::{FieldSelectors, SiteProfile, SiteSet};
use crate::traits::fetcher::{FetchedPage, PageFetcher};
use crate::types::listing::{ListingCandidate, ListingFields, ListingRecord};

static RE_BODY_MILEAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,3}(?:,\d{3})+|\d+)\s*km\b").unwrap());
static RE_BODY_YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());

const MILEAGE_LABELS: &[&str] = &["mileage", "odometer", "kilometers run", "km run"];
const YEAR_LABELS: &[&str] = &[
    "year of manufacture",
    "model year",
    "manufactured year",
    "year",
];

/// Fetches and extracts detail pages for one site set.
pub struct DetailExtractor {
    fetcher: Arc<dyn PageFetcher>,
    sites: SiteSet,
}

impl DetailExtractor {
    pub fn new(fetcher: Arc<dyn PageFetcher>, sites: SiteSet) -> Self {
        Self { fetcher, sites }
    }

    /// Fetch the candidate's page and extract a normalized record.
    pub async fn extract(
        &self,
        candidate: &ListingCandidate,
        session_id: Uuid,
    ) -> FetchResult<ListingRecord> {
        let page = self.fetcher.fetch(&candidate.url).await?;
        let site = self
            .sites
            .iter()
            .find(|s| s.domain == candidate.site)
            .cloned()
            .unwrap_or_else(SiteProfile::ikman);

        let fields = extract_fields(&page, &site.selectors)?;
        debug!(
            url = %candidate.url,
            fetcher = self.fetcher.name(),
            "extracted listing fields"
        );
        Ok(ListingRecord::from_fields(fields, candidate, session_id))
    }
}

/// Locate the raw field text on a fetched page.
pub fn extract_fields(
    page: &FetchedPage,
    selectors: &FieldSelectors,
) -> FetchResult<ListingFields> {
    if !page.is_html() {
        return Err(FetchError::ParseFailure {
            url: page.url.clone(),
            reason: format!(
                "unexpected content type {}",
                page.content_type.as_deref().unwrap_or("unknown")
            ),
        });
    }
    if page.body.trim().is_empty() || !page.body.contains('<') {
        return Err(FetchError::ParseFailure {
            url: page.url.clone(),
            reason: "body is not HTML".to_string(),
        });
    }

    let document = Html::parse_document(&page.body);
    let body_text = document_text(&document);

    let title = first_match(&document, selectors.title)
        .or_else(|| first_match(&document, &["title"]));

    let price = first_match(&document, selectors.price);

    let location = joined_matches(&document, selectors.location_parts)
        .or_else(|| first_match(&document, selectors.location));

    let mileage = first_match(&document, selectors.mileage)
        .or_else(|| labeled_value(&document, selectors.labels, MILEAGE_LABELS))
        .or_else(|| RE_BODY_MILEAGE.find(&body_text).map(|m| m.as_str().to_string()));

    let year = first_match(&document, selectors.year)
        .or_else(|| labeled_value(&document, selectors.labels, YEAR_LABELS))
        .or_else(|| RE_BODY_YEAR.find(&body_text).map(|m| m.as_str().to_string()));

    Ok(ListingFields {
        title,
        price,
        location,
        mileage,
        year,
    })
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn document_text(document: &Html) -> String {
    match Selector::parse("body") {
        Ok(body) => document
            .select(&body)
            .next()
            .map(element_text)
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Text of the first non-empty element matched by any selector, in order.
fn first_match(document: &Html, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|sel| {
            document
                .select(&sel)
                .map(element_text)
                .find(|t| !t.is_empty())
        })
}

/// Text of every selector that matched, joined with ", ".
fn joined_matches(document: &Html, selectors: &[&str]) -> Option<String> {
    let parts: Vec<String> = selectors
        .iter()
        .filter_map(|s| first_match(document, &[*s]))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Value of a labeled row: either "Label: value" in one element, or a label
/// element followed by a sibling holding the value.
fn labeled_value(document: &Html, label_selectors: &[&str], names: &[&str]) -> Option<String> {
    for sel in label_selectors.iter().filter_map(|s| Selector::parse(s).ok()) {
        for el in document.select(&sel) {
            let text = element_text(el);
            let lowered = text.to_lowercase();
            if !names.iter().any(|n| lowered.starts_with(n)) {
                continue;
            }

            if let Some((label, value)) = text.split_once(':') {
                let value = value.trim();
                let label = label.trim().to_lowercase();
                if !value.is_empty() && names.contains(&label.as_str()) {
                    return Some(value.to_string());
                }
            }

            let sibling = el
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .map(element_text)
                .find(|t| !t.is_empty());
            if sibling.is_some() {
                return sibling;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::SENTINEL;
    use crate::testing::{sample_listing_html, MockPageFetcher};

    fn page(body: &str) -> FetchedPage {
        FetchedPage::new("https://ikman.lk/en/ad/toyota-aqua-2015-for-sale-colombo-4412", body)
    }

    #[test]
    fn test_extracts_ikman_layout() {
        let html = r#"<html><body>
            <h1>Toyota Aqua S 2015</h1>
            <div data-testid="price">Rs 4,550,000</div>
            <a data-testid="subtitle-sublocation-link">Dehiwala</a>
            <a data-testid="subtitle-parentlocation-link">Colombo</a>
            <div class="label--x">Year of Manufacture: </div><div class="value--y">2015</div>
            <div class="label--x">Mileage: </div><div class="value--y">72,000 km</div>
        </body></html>"#;

        let fields = extract_fields(&page(html), &SiteProfile::ikman().selectors).unwrap();
        assert_eq!(fields.title.as_deref(), Some("Toyota Aqua S 2015"));
        assert_eq!(fields.price.as_deref(), Some("Rs 4,550,000"));
        assert_eq!(fields.location.as_deref(), Some("Dehiwala, Colombo"));
        assert_eq!(fields.year.as_deref(), Some("2015"));
        assert_eq!(fields.mileage.as_deref(), Some("72,000 km"));
    }

    #[test]
    fn test_inline_label_and_body_fallbacks() {
        let html = r#"<html><body>
            <div class="ad-title">Honda Fit GP5</div>
            <table><tr><td>Mileage: only 65</td></tr></table>
            <p>Registered 2016, well maintained.</p>
        </body></html>"#;

        let fields = extract_fields(&page(html), &SiteProfile::riyasewana().selectors).unwrap();
        assert_eq!(fields.title.as_deref(), Some("Honda Fit GP5"));
        assert_eq!(fields.mileage.as_deref(), Some("only 65"));
        assert_eq!(fields.year.as_deref(), Some("2016"));
        assert!(fields.price.is_none());
        assert!(fields.location.is_none());
    }

    #[test]
    fn test_non_html_is_parse_failure() {
        let json = page("{\"ok\":true}").with_content_type("application/json");
        assert!(matches!(
            extract_fields(&json, &SiteProfile::ikman().selectors),
            Err(FetchError::ParseFailure { .. })
        ));

        assert!(matches!(
            extract_fields(&page("   "), &SiteProfile::ikman().selectors),
            Err(FetchError::ParseFailure { .. })
        ));
    }

    #[tokio::test]
    async fn test_extractor_builds_normalized_record() {
        let url = "https://ikman.lk/en/ad/toyota-aqua-2015-for-sale-colombo-4412";
        let fetcher = MockPageFetcher::new().with_page(
            url,
            &sample_listing_html("Toyota Aqua 2015", "Rs 4,550,000", "Colombo", "just 72", "2015"),
        );
        let extractor = DetailExtractor::new(Arc::new(fetcher), SiteSet::default());
        let candidate = ListingCandidate::new(url, "Toyota Aqua", "ikman.lk");

        let record = extractor.extract(&candidate, Uuid::new_v4()).await.unwrap();
        assert_eq!(record.price, "LKR 4,550,000");
        assert_eq!(record.mileage, "72,000 km");
        assert_eq!(record.year, "2015");
        assert_eq!(record.location, "Colombo");
        assert_ne!(record.title, SENTINEL);
    }

    #[tokio::test]
    async fn test_extractor_propagates_fetch_errors() {
        let extractor = DetailExtractor::new(Arc::new(MockPageFetcher::new()), SiteSet::default());
        let candidate = ListingCandidate::new("https://ikman.lk/en/ad/gone-9", "x", "ikman.lk");
        assert!(matches!(
            extractor.extract(&candidate, Uuid::new_v4()).await,
            Err(FetchError::NotFound { .. })
        ));
    }
}
