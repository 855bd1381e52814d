//! Field normalizer.
//!
//! Pure functions turning raw scraped text into the canonical strings shown
//! to users. Every function here is idempotent: feeding its own output back
//! in returns the same value.

use regex::Regex;
use std::sync::LazyLock;

/// Placeholder for a field that could not be located.
pub const SENTINEL: &str = "Not Found";

/// Currency label prefixed to normalized prices.
pub const CURRENCY_LABEL: &str = "LKR";

// "just 50", "only 25km", "only 120 kms". What follows the number is checked in
// `shorthand_thousands` so "only 85,000" and "only 8.5" are not read as shorthand.
static RE_SHORTHAND_MILEAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:just|only)\s+(\d{2,3})").unwrap());

static RE_MILEAGE_WITH_UNIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,3}(?:,\d{3})+|\d+)\s*(?:km|kms|kilometers?|kilometres?)\b").unwrap()
});

static RE_YEAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{4}\b").unwrap());

/// Group a number's digits in threes: `4550000` -> `4,550,000`.
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Canonical price string.
///
/// All non-digit characters are stripped. If digits remain they are grouped
/// and prefixed with the currency label, otherwise the input is returned as
/// is (`"Negotiable"`, the sentinel).
pub fn normalize_price(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return raw.to_string();
    }

    match digits.parse::<u64>() {
        Ok(value) => format!("{CURRENCY_LABEL} {}", group_thousands(value)),
        // More digits than fit in a u64 is not a price.
        Err(_) => raw.to_string(),
    }
}

/// Numeric value of a normalized price, if it has one.
pub fn parse_price(normalized: &str) -> Option<u64> {
    let rest = normalized.strip_prefix(CURRENCY_LABEL)?.trim();
    rest.replace(',', "").parse().ok()
}

/// Canonical mileage string, `N,NNN km`.
///
/// Sellers often write "just 50" meaning 50,000 km, so a bare two or three
/// digit number after "just" or "only" is scaled by 1000. Otherwise the first
/// number carrying a km unit is regrouped: "72000km" becomes "72,000 km" and
/// "45,000 km" stays as it is. Text with neither is returned unchanged.
pub fn normalize_mileage(raw: &str) -> String {
    if let Some(thousands) = shorthand_thousands(raw) {
        return format!("{} km", group_thousands(thousands * 1000));
    }
    match parse_mileage_km(raw) {
        Some(km) => format!("{} km", group_thousands(km)),
        None => raw.to_string(),
    }
}

/// Kilometres in a mileage string that carries a unit.
pub fn parse_mileage_km(normalized: &str) -> Option<u64> {
    RE_MILEAGE_WITH_UNIT.captures_iter(normalized).find_map(|caps| {
        let number = caps.get(1)?;
        // "8.5 km" and "1,2000 km" are not whole kilometre counts.
        if normalized[..number.start()].ends_with(['.', ',']) {
            return None;
        }
        number.as_str().replace(',', "").parse().ok()
    })
}

fn shorthand_thousands(raw: &str) -> Option<u64> {
    RE_SHORTHAND_MILEAGE.captures_iter(raw).find_map(|caps| {
        let number = caps.get(1)?;
        if continues_number(&raw[number.end()..]) {
            return None;
        }
        number.as_str().parse().ok()
    })
}

/// True when `rest` carries on the number just before it: more digits, or a
/// separator followed by a digit.
fn continues_number(rest: &str) -> bool {
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some(',' | '.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// First 4-digit token, or the sentinel.
pub fn normalize_year(raw: &str) -> String {
    RE_YEAR
        .find(raw)
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| SENTINEL.to_string())
}

/// Trimmed text, or the sentinel when absent or blank.
pub fn normalize_text(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(text) if !text.is_empty() => collapse_whitespace(text),
        _ => SENTINEL.to_string(),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
