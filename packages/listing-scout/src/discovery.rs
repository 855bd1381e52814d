//! Listing discovery.
//!
//! Site-scoped searches per subject, filtered through the URL classifier.
//! Candidates come back in discovery order, deduplicated by canonical link
//! and capped per subject.

use indexmap::IndexSet;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info};

use crate::error::BackendResult;
use crate::sites::SiteSet;
use crate::traits::searcher::WebSearcher;
use crate::types::listing::ListingCandidate;

static RE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s"'<>()\[\]{}`]+"#).unwrap());

/// Results requested per site query.
const RESULTS_PER_QUERY: usize = 10;

/// Finds candidate detail pages through a web search provider.
pub struct ListingDiscoverer {
    searcher: Arc<dyn WebSearcher>,
    sites: SiteSet,
    max_candidates: usize,
}

impl ListingDiscoverer {
    pub fn new(searcher: Arc<dyn WebSearcher>, sites: SiteSet, max_candidates: usize) -> Self {
        Self {
            searcher,
            sites,
            max_candidates,
        }
    }

    /// Search each allow-listed site in turn until the cap is reached.
    pub async fn discover(&self, subject: &str) -> BackendResult<Vec<ListingCandidate>> {
        let mut urls = Vec::new();

        for site in self.sites.iter() {
            let query = site_query(site.domain, subject);
            let results = self
                .searcher
                .search_with_limit(&query, RESULTS_PER_QUERY)
                .await?;
            debug!(
                searcher = self.searcher.name(),
                query = %query,
                results = results.len(),
                "search completed"
            );
            urls.extend(results.into_iter().map(|r| r.url.to_string()));

            if candidates_from_urls(&urls, subject, &self.sites, self.max_candidates).len()
                >= self.max_candidates
            {
                break;
            }
        }

        let candidates = candidates_from_urls(&urls, subject, &self.sites, self.max_candidates);
        info!(
            subject = %subject,
            raw = urls.len(),
            candidates = candidates.len(),
            "listing discovery finished"
        );
        Ok(candidates)
    }
}

/// Query used to search one site for one subject.
pub fn site_query(domain: &str, subject: &str) -> String {
    format!("site:{domain} {subject} for sale")
}

/// Classify raw URLs into at most `cap` detail-page candidates.
pub fn candidates_from_urls<S: AsRef<str>>(
    urls: &[S],
    subject: &str,
    sites: &SiteSet,
    cap: usize,
) -> Vec<ListingCandidate> {
    let mut seen = IndexSet::new();
    let mut candidates = Vec::new();

    for raw in urls {
        if candidates.len() >= cap {
            break;
        }
        if let Some(candidate) = sites.candidate(raw.as_ref(), subject) {
            if seen.insert(candidate.url.clone()) {
                candidates.push(candidate);
            }
        }
    }
    candidates
}

/// Pull URLs out of free text (model replies, bullet lists, JSON arrays),
/// in order of first appearance.
pub fn extract_urls(text: &str) -> Vec<String> {
    let mut urls = IndexSet::new();
    for m in RE_URL.find_iter(text) {
        let url = m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '?', '*']);
        if !url.is_empty() {
            urls.insert(url.to_string());
        }
    }
    urls.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::searcher::MockWebSearcher;

    #[test]
    fn test_extract_urls_from_free_text() {
        let text = "Here are some ads:\n\
            - https://ikman.lk/en/ad/test-3\n\
            * https://riyasewana.com/buy/test-4.\n\
            • https://ikman.lk/en/ad/test-5, and again https://ikman.lk/en/ad/test-3\n\
            [\"https://patpat.lk/vehicle/car/test-6\"] (https://example.com/x)";

        assert_eq!(
            extract_urls(text),
            vec![
                "https://ikman.lk/en/ad/test-3",
                "https://riyasewana.com/buy/test-4",
                "https://ikman.lk/en/ad/test-5",
                "https://patpat.lk/vehicle/car/test-6",
                "https://example.com/x",
            ]
        );
    }

    #[test]
    fn test_candidates_filtered_deduped_and_capped() {
        let urls = [
            "https://ikman.lk/en/ads/sri-lanka/cars/toyota/aqua",
            "https://ikman.lk/en/ad/toyota-aqua-2015-for-sale-colombo-1",
            "https://www.ikman.lk/en/ad/toyota-aqua-2015-for-sale-colombo-1/",
            "https://example.com/en/ad/toyota-aqua-2",
            "https://riyasewana.com/buy/toyota-aqua-for-rent-kandy-3",
            "https://riyasewana.com/buy/toyota-aqua-sale-kandy-4",
            "https://ikman.lk/en/ad/toyota-aqua-2017-for-sale-galle-5",
        ];
        let sites = SiteSet::default();

        let all = candidates_from_urls(&urls, "Toyota Aqua", &sites, 10);
        let links: Vec<_> = all.iter().map(|c| c.url.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://ikman.lk/en/ad/toyota-aqua-2015-for-sale-colombo-1",
                "https://riyasewana.com/buy/toyota-aqua-sale-kandy-4",
                "https://ikman.lk/en/ad/toyota-aqua-2017-for-sale-galle-5",
            ]
        );

        assert_eq!(candidates_from_urls(&urls, "Toyota Aqua", &sites, 2).len(), 2);
    }

    #[tokio::test]
    async fn test_discover_uses_site_queries() {
        let searcher = Arc::new(MockWebSearcher::new().with_urls(
            "honda fit",
            &[
                "https://ikman.lk/en/ad/honda-fit-gp5-2014-for-sale-colombo-11",
                "https://ikman.lk/en/ads/sri-lanka/cars/honda/fit",
                "https://riyasewana.com/buy/honda-fit-gp1-sale-gampaha-12",
            ],
        ));
        let discoverer = ListingDiscoverer::new(searcher.clone(), SiteSet::default(), 5);

        let candidates = discoverer.discover("Honda Fit").await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.subject == "Honda Fit"));

        let queries = searcher.queries();
        assert_eq!(queries.len(), 3);
        assert_eq!(queries[0], "site:ikman.lk Honda Fit for sale");
    }

    #[tokio::test]
    async fn test_discover_stops_at_cap() {
        let searcher = Arc::new(MockWebSearcher::new().with_urls(
            "honda fit",
            &[
                "https://ikman.lk/en/ad/honda-fit-a-1",
                "https://ikman.lk/en/ad/honda-fit-b-2",
            ],
        ));
        let discoverer = ListingDiscoverer::new(searcher.clone(), SiteSet::default(), 2);

        assert_eq!(discoverer.discover("Honda Fit").await.unwrap().len(), 2);
        assert_eq!(searcher.queries().len(), 1);
    }
}
