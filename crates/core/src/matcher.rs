//! Keyword scoring of vendors against a free-text request.

use serde::{Deserialize, Serialize};

use crate::domain::vendor::Vendor;
use crate::keywords::{extract_keywords, KeywordSet};

/// Upper bound on vendors offered in a rendered selection list.
pub const MAX_LISTED_VENDORS: usize = 10;

/// Flat bonus when any query keyword appears in the services text.
pub const SERVICES_BONUS: u32 = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VendorMatch {
    pub vendor: Vendor,
    pub score: u32,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct VendorMatcher;

impl VendorMatcher {
    /// Full ranked set, best first. Equal scores keep the order of `vendors`.
    pub fn search(&self, query: &str, vendors: &[Vendor]) -> Vec<VendorMatch> {
        let keywords = extract_keywords(query);
        if keywords.is_empty() {
            return Vec::new();
        }
        self.rank(&keywords, vendors)
    }

    pub fn rank(&self, keywords: &KeywordSet, vendors: &[Vendor]) -> Vec<VendorMatch> {
        let mut matches: Vec<VendorMatch> = vendors
            .iter()
            .filter_map(|vendor| {
                let score = score_vendor(keywords, vendor);
                (score > 0).then(|| VendorMatch { vendor: vendor.clone(), score })
            })
            .collect();

        // `sort_by` is stable.
        matches.sort_by(|left, right| right.score.cmp(&left.score));
        matches
    }
}

pub fn vendor_corpus(vendor: &Vendor) -> String {
    format!(
        "{} {} {} {}",
        vendor.business_name, vendor.services, vendor.keywords, vendor.description
    )
    .to_lowercase()
}

pub fn score_vendor(keywords: &KeywordSet, vendor: &Vendor) -> u32 {
    let corpus = vendor_corpus(vendor);
    let services = vendor.services.to_lowercase();

    let base = keywords.iter().filter(|keyword| corpus.contains(keyword)).count();
    let base = u32::try_from(base).unwrap_or(u32::MAX);
    let bonus =
        if keywords.iter().any(|keyword| services.contains(keyword)) { SERVICES_BONUS } else { 0 };

    base.saturating_add(bonus)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{VendorMatcher, SERVICES_BONUS};
    use crate::domain::{
        user::UserId,
        vendor::{Vendor, VendorId},
    };
    use crate::keywords::extract_keywords;

    fn vendor(id: i64, name: &str, services: &str, description: &str) -> Vendor {
        Vendor {
            id: VendorId(id),
            owner: UserId(1_000 + id),
            business_name: name.to_owned(),
            services: services.to_owned(),
            keywords: extract_keywords(services).join(),
            contact: "08000000000".to_owned(),
            bot_handle: None,
            description: description.to_owned(),
            price_range: "₦1000".to_owned(),
            avg_rating: 0.0,
            total_orders: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn query_without_keywords_returns_nothing() {
        let vendors = vec![vendor(1, "Mama Put", "food", "hot food")];
        assert!(VendorMatcher.search("I need the", &vendors).is_empty());
        assert!(VendorMatcher.search("", &vendors).is_empty());
    }

    #[test]
    fn food_delivery_request_scores_by_keyword_hits() {
        let vendors = vec![
            vendor(1, "Mama Put", "food, soups", "Hot food delivered to your door"),
            vendor(2, "Quick Dispatch", "parcel courier", "Packages delivered same day"),
            vendor(3, "Snap Studio", "photography", "Weddings and portraits"),
        ];

        let matches = VendorMatcher.search("I need food delivered", &vendors);
        let ranked: Vec<(i64, u32)> =
            matches.iter().map(|entry| (entry.vendor.id.0, entry.score)).collect();

        assert_eq!(ranked, vec![(1, 2 + SERVICES_BONUS), (2, 1)]);
    }

    #[test]
    fn services_match_outranks_description_only_match() {
        let mut description_only = vendor(1, "Lens Hub", "weddings coverage", "We also do cakes");
        let mut in_services = vendor(2, "Sweet Tooth", "cakes", "Custom weddings coverage");
        description_only.keywords.clear();
        in_services.keywords.clear();
        let vendors = vec![description_only, in_services];

        let matches = VendorMatcher.search("birthday cakes", &vendors);
        assert_eq!(matches[0].vendor.id.0, 2);
        assert!(matches[0].score > matches[1].score);
        assert_eq!(matches[1].score, 1);
    }

    #[test]
    fn equal_scores_keep_original_scan_order() {
        let vendors = vec![
            vendor(1, "Alpha Catering", "catering", ""),
            vendor(2, "Bravo Photos", "photography", ""),
            vendor(3, "Charlie Catering", "catering", ""),
            vendor(4, "Delta Catering", "catering", ""),
            vendor(5, "Echo Events", "event planning", "catering for parties"),
            vendor(6, "Foxtrot Events", "event planning", "catering for parties"),
        ];

        let matches = VendorMatcher.search("catering", &vendors);
        let order: Vec<i64> = matches.iter().map(|entry| entry.vendor.id.0).collect();
        assert_eq!(order, vec![1, 3, 4, 5, 6]);
        assert_eq!(matches[3].score, matches[4].score);
    }

    #[test]
    fn matcher_returns_full_ranked_set_beyond_list_cap() {
        let vendors: Vec<Vendor> = (1..=14)
            .map(|id| vendor(id, &format!("Baker {id}"), "cakes", "fresh bakes"))
            .collect();

        assert_eq!(VendorMatcher.search("cakes", &vendors).len(), 14);
    }
}
