//! Target marketplace sites and the URL classifier.
//!
//! Classification is pattern based. A URL is a detail page only when its path
//! matches the site's single-item pattern and does not match the site's
//! category/search pattern. Everything else is discarded, favoring precision:
//! a search page fed to the extractor yields generic markup, not an ad.

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

use crate::types::listing::ListingCandidate;

/// Slug words marking an ad that is not a sale.
pub const NON_SALE_KEYWORDS: &[&str] = &[
    "rent",
    "rental",
    "hire",
    "lease",
    "parts",
    "spare",
    "accessories",
    "service",
    "repair",
];

static RE_IKMAN_DETAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/(?:en|si|ta)/ad/[a-z0-9-]*[a-z][a-z0-9-]*-\d+$").unwrap());
static RE_IKMAN_LISTING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/(?:en|si|ta)/ads(?:/[a-z0-9-]+)*$").unwrap());

static RE_RIYASEWANA_DETAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/(?:buy|ad)/[a-z0-9-]*[a-z][a-z0-9-]*-\d+$").unwrap());
static RE_RIYASEWANA_LISTING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/search(?:/[a-z0-9-]+)*$").unwrap());

static RE_PATPAT_DETAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^/vehicle/(?:[a-z0-9-]+/)*[a-z0-9-]*[a-z][a-z0-9-]*-\d+$").unwrap()
});
static RE_PATPAT_LISTING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^/vehicle(?:/[a-z-]+)*$").unwrap());

/// CSS selectors tried in order for each field of a detail page.
#[derive(Debug, Clone)]
pub struct FieldSelectors {
    pub title: &'static [&'static str],
    pub price: &'static [&'static str],

    /// Parts joined with ", " when more than one matches.
    pub location_parts: &'static [&'static str],
    pub location: &'static [&'static str],
    pub mileage: &'static [&'static str],
    pub year: &'static [&'static str],

    /// Elements whose text is a field label ("Mileage", "Year").
    pub labels: &'static [&'static str],
}

const DEFAULT_SELECTORS: FieldSelectors = FieldSelectors {
    title: &["h1", ".ad-title", "[data-testid=\"ad-title\"]", ".title"],
    price: &["[data-testid=\"price\"]", ".price", ".ad-price", ".price-value"],
    location_parts: &[
        "[data-testid=\"subtitle-sublocation-link\"]",
        "[data-testid=\"subtitle-parentlocation-link\"]",
    ],
    location: &[".location", ".ad-location", ".area"],
    mileage: &["[data-testid=\"mileage\"]", ".mileage"],
    year: &["[data-testid=\"year\"]", ".year"],
    labels: &["dt", "th", "td", ".label", "[class*=\"label\"]"],
};

/// A supported marketplace.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    /// Host without `www.`.
    pub domain: &'static str,
    detail: &'static LazyLock<Regex>,
    listing: &'static LazyLock<Regex>,
    pub selectors: FieldSelectors,
}

impl SiteProfile {
    pub fn ikman() -> Self {
        Self {
            domain: "ikman.lk",
            detail: &RE_IKMAN_DETAIL,
            listing: &RE_IKMAN_LISTING,
            selectors: DEFAULT_SELECTORS,
        }
    }

    pub fn riyasewana() -> Self {
        Self {
            domain: "riyasewana.com",
            detail: &RE_RIYASEWANA_DETAIL,
            listing: &RE_RIYASEWANA_LISTING,
            selectors: FieldSelectors {
                title: &["h1", ".ad-title", ".title"],
                price: &[".price", ".ad-price", ".price-value", "[data-testid=\"price\"]"],
                ..DEFAULT_SELECTORS
            },
        }
    }

    pub fn patpat() -> Self {
        Self {
            domain: "patpat.lk",
            detail: &RE_PATPAT_DETAIL,
            listing: &RE_PATPAT_LISTING,
            selectors: DEFAULT_SELECTORS,
        }
    }

    /// Classify a URL path against this site's patterns.
    pub fn classify_path(&self, path: &str) -> UrlClass {
        match (self.detail.is_match(path), self.listing.is_match(path)) {
            (true, false) => UrlClass::Detail,
            (false, true) => UrlClass::Listing,
            _ => UrlClass::Ambiguous,
        }
    }
}

/// Outcome of classifying one URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlClass {
    Detail,
    Listing,
    /// Matches both patterns or neither.
    Ambiguous,
    /// Unparseable, or a host outside the allow-list.
    Unsupported,
}

/// The allow-list of marketplaces searched during discovery.
#[derive(Debug, Clone)]
pub struct SiteSet {
    sites: Vec<SiteProfile>,
}

impl Default for SiteSet {
    fn default() -> Self {
        Self {
            sites: vec![
                SiteProfile::ikman(),
                SiteProfile::riyasewana(),
                SiteProfile::patpat(),
            ],
        }
    }
}

impl SiteSet {
    pub fn new(sites: Vec<SiteProfile>) -> Self {
        Self { sites }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SiteProfile> {
        self.sites.iter()
    }

    pub fn domains(&self) -> Vec<&'static str> {
        self.sites.iter().map(|s| s.domain).collect()
    }

    /// Profile for the host of `url`, if it is allow-listed.
    pub fn site_for(&self, url: &Url) -> Option<&SiteProfile> {
        let host = bare_host(url)?;
        self.sites.iter().find(|s| s.domain == host)
    }

    pub fn classify(&self, raw: &str) -> UrlClass {
        let Ok(url) = Url::parse(raw.trim()) else {
            return UrlClass::Unsupported;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return UrlClass::Unsupported;
        }
        match self.site_for(&url) {
            Some(site) => site.classify_path(trimmed_path(&url)),
            None => UrlClass::Unsupported,
        }
    }

    /// Turn a raw discovered URL into a candidate, or `None` if it is not a
    /// sale detail page on an allow-listed site.
    pub fn candidate(&self, raw: &str, subject: &str) -> Option<ListingCandidate> {
        if self.classify(raw) != UrlClass::Detail {
            return None;
        }
        let url = Url::parse(raw.trim()).ok()?;
        if is_non_sale(trimmed_path(&url)) {
            return None;
        }
        let site = self.site_for(&url)?;
        Some(ListingCandidate::new(
            canonical_link(&url),
            subject,
            site.domain,
        ))
    }
}

/// Canonical form of a link: https, lowercase host without `www.`, no
/// trailing slash, no query or fragment.
pub fn canonical_link(url: &Url) -> String {
    let host = bare_host(url).unwrap_or_default();
    format!("https://{}{}", host, trimmed_path(url))
}

/// Parse then canonicalize.
pub fn canonicalize(raw: &str) -> Option<String> {
    Url::parse(raw.trim()).ok().map(|u| canonical_link(&u))
}

/// Whether a path's slug marks a non-sale ad.
pub fn is_non_sale(path: &str) -> bool {
    path.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| NON_SALE_KEYWORDS.contains(&word))
}

fn bare_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

fn trimmed_path(url: &Url) -> &str {
    let path = url.path();
    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        ""
    }
}
