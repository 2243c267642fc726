//! Remote enrichment with deterministic fallback
//!
//! Given a bare brand reference, fetch the fully detailed record from the
//! remote data service; when the service is unreachable, times out, or
//! answers with a record that does not describe the requested brand,
//! synthesize a complete record as a pure function of the identifier. The
//! caller persists whichever record results and never sees the difference.

use tracing::warn;

use crate::error::{PrefsError, Result};
use crate::records::{BrandDetail, BrandRef};
use crate::service::BrandDataService;

// =============================================================================
// Fixed option tables
//
// Every synthetic field is drawn from these by `seed % len`. The tables are
// part of the product's fallback behavior: changing an entry changes the
// synthetic record of every brand whose seed lands on it.
// =============================================================================

const GRADES: &[&str] = &["A+", "A", "A-", "B+", "B"];

const INVESTMENT_RANGES: &[(u64, u64)] = &[
    (95_000, 210_000),
    (150_000, 350_000),
    (220_000, 480_000),
    (300_000, 650_000),
    (450_000, 900_000),
    (600_000, 1_200_000),
    (1_000_000, 2_400_000),
];

const FRANCHISE_FEES: &[u64] = &[19_500, 25_000, 30_000, 35_000, 40_000, 45_000, 50_000];

const WORKING_CAPITAL: &[u64] = &[30_000, 45_000, 60_000, 80_000, 100_000, 150_000];

/// Percent of gross sales
const MARKETING_FEES: &[f64] = &[1.0, 1.5, 2.0, 2.5, 3.0, 4.0];

/// Percent of gross sales
const ROYALTIES: &[f64] = &[4.0, 4.5, 5.0, 5.5, 6.0, 6.5, 7.0];

/// Years
const INITIAL_TERMS: &[u32] = &[5, 7, 10, 15, 20];

const LOCATION_COUNTS: &[u32] = &[45, 85, 140, 230, 410, 620, 1_150, 2_300];

const FOUNDED_YEARS: &[u32] = &[1968, 1975, 1982, 1988, 1994, 1999, 2004, 2009, 2014];

const AVG_REVENUES: &[u64] = &[520_000, 740_000, 900_000, 1_150_000, 1_400_000, 1_900_000];

const AVG_PROFITS: &[u64] = &[70_000, 95_000, 120_000, 160_000, 210_000, 280_000];

const WHY_YES: &[&str] = &[
    "Established brand recognition in its category",
    "Comprehensive initial training program",
    "Strong franchisee support network",
    "Proven unit-level economics",
    "National marketing fund",
    "Territory protection for new units",
    "Multiple revenue streams per location",
    "Scalable multi-unit ownership path",
];

const WHY_NOT: &[&str] = &[
    "Significant upfront capital requirement",
    "Crowded competitive category",
    "Labor-intensive daily operations",
    "Long build-out timeline before opening",
    "Royalty load on thin margins",
    "Limited resale market for units",
    "Real-estate dependent site selection",
    "Seasonal revenue swings",
];

// =============================================================================
// Pure helpers
// =============================================================================

/// Stable numeric seed for an identifier: the sum of its character codes.
pub fn seed_for(id: &str) -> u32 {
    id.chars().fold(0u32, |acc, c| acc.wrapping_add(c as u32))
}

fn pick<T: Copy>(table: &[T], seed: u32) -> T {
    table[seed as usize % table.len()]
}

fn pick_list(table: &[&str], seed: u32, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| table[(seed as usize + i) % table.len()].to_string())
        .collect()
}

/// The key the remote service is queried with: the identifier trimmed of a
/// trailing `-<digits>` instance-disambiguating suffix.
pub fn lookup_key(id: &str) -> &str {
    match id.rfind('-') {
        Some(pos) if pos > 0 && !id[pos + 1..].is_empty() => {
            if id[pos + 1..].chars().all(|c| c.is_ascii_digit()) {
                &id[..pos]
            } else {
                id
            }
        }
        _ => id,
    }
}

fn titlecase(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Derive a display name from an identifier: hyphen-split, titlecased.
pub fn name_from_id(id: &str) -> String {
    lookup_key(id)
        .split('-')
        .filter(|part| !part.is_empty())
        .map(titlecase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn display_name(reference: &BrandRef) -> String {
    let trimmed = reference.name.trim();
    if trimmed.is_empty() {
        name_from_id(reference.id.trim())
    } else {
        trimmed.to_string()
    }
}

/// Synthesize a complete, internally consistent detail record as a pure
/// function of the reference identifier. The same identifier always yields
/// the bit-identical record.
pub fn synthesize_detail(reference: &BrandRef) -> BrandDetail {
    let id = reference.id.trim();
    let seed = seed_for(id);
    let (investment_min, investment_max) = pick(INVESTMENT_RANGES, seed);
    let item19_disclosed = seed % 2 == 0;

    BrandDetail {
        id: id.to_string(),
        name: display_name(reference),
        logo: reference.logo.clone(),
        grade: pick(GRADES, seed).to_string(),
        investment_min,
        investment_max,
        franchise_fee: pick(FRANCHISE_FEES, seed),
        working_capital: pick(WORKING_CAPITAL, seed),
        marketing_fee: pick(MARKETING_FEES, seed),
        royalty: pick(ROYALTIES, seed),
        initial_term: pick(INITIAL_TERMS, seed),
        locations: pick(LOCATION_COUNTS, seed),
        founded: pick(FOUNDED_YEARS, seed),
        item19_disclosed,
        why_yes: pick_list(WHY_YES, seed, 3),
        why_not: pick_list(WHY_NOT, seed, 3),
        // Earnings figures exist only where an Item 19 is on file.
        avg_revenue: item19_disclosed.then(|| pick(AVG_REVENUES, seed)),
        avg_profit: item19_disclosed.then(|| pick(AVG_PROFITS, seed)),
    }
}

fn matches_reference(detail: &BrandDetail, id: &str, key: &str, name: &str) -> bool {
    if detail.id == id || detail.id == key {
        return true;
    }
    !detail.name.trim().is_empty() && detail.name.eq_ignore_ascii_case(name)
}

// =============================================================================
// Enrichment
// =============================================================================

/// Resolve a bare reference to a full detail record.
///
/// Always resolves to a usable record: a validated remote response when the
/// service delivers one, otherwise the deterministic synthetic record. The
/// only error is an empty or whitespace-only identifier, which is rejected
/// before any I/O.
pub async fn enrich(reference: &BrandRef, service: &dyn BrandDataService) -> Result<BrandDetail> {
    let id = reference.id.trim();
    if id.is_empty() {
        return Err(PrefsError::InvalidReference(
            "empty brand identifier".to_string(),
        ));
    }

    let key = lookup_key(id);
    let name = display_name(reference);

    match service.fetch_brand_detail(key).await {
        Ok(mut detail) if matches_reference(&detail, id, key, &name) => {
            // Re-key to the requested identity so the compare set's
            // id-uniqueness holds regardless of backend canonicalization.
            detail.id = id.to_string();
            if detail.name.trim().is_empty() {
                detail.name = name;
            }
            Ok(detail)
        }
        Ok(other) => {
            warn!(
                requested = key,
                received = %other.id,
                "fetched record does not describe the requested brand, synthesizing"
            );
            Ok(synthesize_detail(reference))
        }
        Err(err) => {
            warn!(requested = key, %err, "remote fetch failed, synthesizing");
            Ok(synthesize_detail(reference))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{MockBehavior, MockCrmService};

    #[test]
    fn lookup_key_trims_instance_suffix() {
        assert_eq!(lookup_key("subway-1"), "subway");
        assert_eq!(lookup_key("golden-crust-12"), "golden-crust");
        assert_eq!(lookup_key("kfc"), "kfc");
        assert_eq!(lookup_key("brand-x"), "brand-x");
        assert_eq!(lookup_key("-1"), "-1");
        assert_eq!(lookup_key("kfc-"), "kfc-");
    }

    #[test]
    fn name_derivation_titlecases_hyphen_parts() {
        assert_eq!(name_from_id("golden-crust-3"), "Golden Crust");
        assert_eq!(name_from_id("subway"), "Subway");
    }

    #[test]
    fn synthesis_is_deterministic() {
        let reference = BrandRef::new("subway-1", "Subway");
        let first = synthesize_detail(&reference);
        let second = synthesize_detail(&reference);
        assert_eq!(first, second);

        // Seed comes from the full identifier, not the lookup key.
        let seed = seed_for("subway-1");
        assert_eq!(
            (first.investment_min, first.investment_max),
            INVESTMENT_RANGES[seed as usize % INVESTMENT_RANGES.len()]
        );
    }

    #[test]
    fn synthesis_is_internally_consistent() {
        for id in ["a-1", "bb-2", "ccc-3", "dddd-4", "subway-1", "kfc-1"] {
            let detail = synthesize_detail(&BrandRef::new(id, ""));
            assert_eq!(detail.avg_revenue.is_some(), detail.item19_disclosed);
            assert_eq!(detail.avg_profit.is_some(), detail.item19_disclosed);
            assert!(detail.investment_min < detail.investment_max);
            assert_eq!(detail.why_yes.len(), 3);
            assert_eq!(detail.why_not.len(), 3);
        }
    }

    #[test]
    fn synthesis_derives_missing_name() {
        let detail = synthesize_detail(&BrandRef::new("golden-crust-3", ""));
        assert_eq!(detail.name, "Golden Crust");
    }

    #[tokio::test]
    async fn enrich_rejects_empty_identifier() {
        let service = MockCrmService::default();
        let err = enrich(&BrandRef::new("   ", "Ghost"), &service)
            .await
            .unwrap_err();
        assert!(matches!(err, PrefsError::InvalidReference(_)));
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_identically_every_time() {
        let service = MockCrmService::with_behavior(MockBehavior::Unreachable);
        let reference = BrandRef::new("subway-1", "Subway");
        let first = enrich(&reference, &service).await.unwrap();
        let second = enrich(&reference, &service).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, synthesize_detail(&reference));
    }

    #[tokio::test]
    async fn placeholder_response_is_detected_as_mismatch() {
        // A not-yet-connected backend answers every key with the same
        // generic record; that must not be accepted as Subway.
        let service = MockCrmService::with_behavior(MockBehavior::Placeholder);
        let reference = BrandRef::new("subway-1", "Subway");
        let detail = enrich(&reference, &service).await.unwrap();
        assert_eq!(detail, synthesize_detail(&reference));
        assert_eq!(detail.id, "subway-1");
    }

    #[tokio::test]
    async fn matching_fetch_wins_over_synthesis() {
        let canned = synthesize_detail(&BrandRef::new("subway", "Subway"));
        let service = MockCrmService::connected().with_brand(canned.clone());
        let reference = BrandRef::new("subway-1", "Subway");
        let detail = enrich(&reference, &service).await.unwrap();
        // Remote record, re-keyed to the requested instance id.
        assert_eq!(detail.id, "subway-1");
        assert_eq!(detail.grade, canned.grade);
        assert_eq!(detail.investment_min, canned.investment_min);
    }

    #[tokio::test]
    async fn fallback_matches_across_failure_modes() {
        // fetch-throws and fetch-mismatches must land on the same record.
        let reference = BrandRef::new("kfc-7", "KFC");
        let via_error = enrich(
            &reference,
            &MockCrmService::with_behavior(MockBehavior::Unreachable),
        )
        .await
        .unwrap();
        let via_mismatch = enrich(
            &reference,
            &MockCrmService::with_behavior(MockBehavior::Placeholder),
        )
        .await
        .unwrap();
        assert_eq!(via_error, via_mismatch);
    }
}
