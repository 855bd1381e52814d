//! Prompts for the remote models.

pub const COMPARISON_SYSTEM: &str = "You are an expert reviewer for the Sri Lankan used vehicle \
market. Write detailed, factual comparisons in markdown. Quote prices in LKR.";

pub const URL_FINDER_SYSTEM: &str = "You find individual for-sale advertisements on Sri Lankan \
marketplace websites. You answer with URLs only, one per line, and never with search or \
category pages.";

pub fn comparison_prompt(subject_a: &str, subject_b: &str) -> String {
    format!(
        "Compare the {subject_a} and the {subject_b}.

Use these sections, in this order:
# Comparison: {subject_a} vs {subject_b}
## Executive Summary
## Technical Specifications (engine, fuel economy in L/100km and km/l, power, torque, transmission, drive type)
## Reliability & Maintenance (strengths, common issues, maintenance cost in LKR)
## Pros and Cons
## Market Positioning in Sri Lanka (target buyer, used price range in LKR, best for)
## Final Recommendation
## Overall Rating (X.X/10 each, with fuel economy, reliability, comfort, performance, value for money)"
    )
}

pub fn url_finder_prompt(subject: &str, domains: &[&str], limit: usize) -> String {
    format!(
        "List up to {limit} URLs of individual advertisements selling a {subject} on {}.

Individual ad URLs look like:
- https://ikman.lk/en/ad/honda-fit-gp5-2013-for-sale-colombo-12345
- https://riyasewana.com/buy/honda-fit-2015-for-sale-456789

Do NOT return search or category pages such as https://ikman.lk/en/ads/sri-lanka/cars/honda/fit.
Do NOT return rentals, hire, leasing or spare parts ads.
Return one URL per line and nothing else.",
        domains.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_mention_subjects() {
        let prompt = comparison_prompt("Toyota Aqua", "Honda Fit");
        assert!(prompt.contains("Toyota Aqua vs Honda Fit"));

        let prompt = url_finder_prompt("Honda Fit", &["ikman.lk", "riyasewana.com"], 5);
        assert!(prompt.contains("up to 5"));
        assert!(prompt.contains("ikman.lk, riyasewana.com"));
    }
}
