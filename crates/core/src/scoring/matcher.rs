use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::listing::Listing;
use crate::domain::mandate::Mandate;
use crate::geo::GeoNormalizer;

pub const TYPE_POINTS: f64 = 30.0;
pub const AREA_POINTS: f64 = 25.0;
pub const BUDGET_POINTS: f64 = 25.0;
pub const NEAR_BUDGET_POINTS: f64 = 10.0;
pub const BEDROOM_POINTS: f64 = 10.0;
pub const SIZE_POINTS: f64 = 10.0;

pub const REASON_TYPE: &str = "Property type matches mandate";
pub const REASON_AREA: &str = "Located in a preferred area";
pub const REASON_BUDGET: &str = "Price within mandate budget";
pub const REASON_NEAR_BUDGET: &str = "Near mandate budget range";
pub const REASON_BEDROOMS: &str = "Bedroom count matches mandate";
pub const REASON_SIZE: &str = "Size within mandate range";

/// Prices within this fraction of the nearer budget bound earn partial credit.
fn near_budget_band() -> Decimal {
    Decimal::new(15, 2)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Additive mandate fit used for explainability. Every fired rule appends its
/// reason, in rule order.
#[derive(Clone, Debug, Default)]
pub struct MandateMatcher {
    normalizer: GeoNormalizer,
}

impl MandateMatcher {
    pub fn new(normalizer: GeoNormalizer) -> Self {
        Self { normalizer }
    }

    pub fn normalizer(&self) -> &GeoNormalizer {
        &self.normalizer
    }

    pub fn score(&self, listing: &Listing, mandate: Option<&Mandate>) -> MatchResult {
        let Some(mandate) = mandate else {
            return MatchResult::default();
        };

        let mut result = MatchResult::default();
        let mut award = |points: f64, reason: &str| {
            result.score += points;
            result.reasons.push(reason.to_string());
        };

        if self.type_matches(listing, mandate) {
            award(TYPE_POINTS, REASON_TYPE);
        }
        if self.area_matches(listing, mandate) {
            award(AREA_POINTS, REASON_AREA);
        }
        match budget_fit(listing.price, mandate) {
            BudgetFit::Within => award(BUDGET_POINTS, REASON_BUDGET),
            BudgetFit::Near => award(NEAR_BUDGET_POINTS, REASON_NEAR_BUDGET),
            BudgetFit::Outside | BudgetFit::Unconstrained => {}
        }
        if listing
            .bedrooms
            .is_some_and(|bedrooms| mandate.preferred_bedrooms.contains(&bedrooms))
        {
            award(BEDROOM_POINTS, REASON_BEDROOMS);
        }
        if size_fits(listing.size, mandate.min_size, mandate.max_size) {
            award(SIZE_POINTS, REASON_SIZE);
        }

        result.score = result.score.clamp(0.0, 100.0);
        result
    }

    pub fn type_matches(&self, listing: &Listing, mandate: &Mandate) -> bool {
        self.normalizer.first_match(&listing.property_type, &mandate.property_types).is_some()
    }

    pub fn area_matches(&self, listing: &Listing, mandate: &Mandate) -> bool {
        self.normalizer.first_match(&listing.area, &mandate.preferred_areas).is_some()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BudgetFit {
    Within,
    Near,
    Outside,
    Unconstrained,
}

/// Missing bounds are open on that side; a mandate without either bound does
/// not score the budget rule at all.
pub fn budget_fit(price: Decimal, mandate: &Mandate) -> BudgetFit {
    if !mandate.has_budget() {
        return BudgetFit::Unconstrained;
    }

    let band = near_budget_band();
    let above_max = mandate.max_investment.filter(|max| price > *max);
    let below_min = mandate.min_investment.filter(|min| price < *min);

    let upper_edge = Decimal::ONE + band;
    let lower_edge = Decimal::ONE - band;

    match (above_max, below_min) {
        (None, None) => BudgetFit::Within,
        (Some(max), _) if max.checked_mul(upper_edge).is_some_and(|edge| price <= edge) => {
            BudgetFit::Near
        }
        (_, Some(min)) if min.checked_mul(lower_edge).is_some_and(|edge| price >= edge) => {
            BudgetFit::Near
        }
        _ => BudgetFit::Outside,
    }
}

fn size_fits(size: Option<f64>, min_size: Option<f64>, max_size: Option<f64>) -> bool {
    let Some(size) = size else {
        return false;
    };
    if min_size.is_none() && max_size.is_none() {
        return false;
    }
    min_size.map_or(true, |min| size >= min) && max_size.map_or(true, |max| size <= max)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{budget_fit, BudgetFit, MandateMatcher};
    use crate::domain::ids::ListingId;
    use crate::domain::listing::{Listing, ListingSource, ReadinessStatus};
    use crate::domain::mandate::Mandate;

    fn marina_mandate() -> Mandate {
        Mandate {
            property_types: vec!["apartment".to_string()],
            preferred_areas: vec!["Marina".to_string()],
            min_investment: Some(Decimal::new(1_000_000, 0)),
            max_investment: Some(Decimal::new(5_000_000, 0)),
            ..Mandate::default()
        }
    }

    fn listing(price: i64) -> Listing {
        Listing {
            id: ListingId::new("lst-1"),
            title: "Marina Gate 2BR".to_string(),
            area: "Dubai Marina".to_string(),
            property_type: "apartment".to_string(),
            price: Decimal::new(price, 0),
            size: None,
            bedrooms: None,
            status: "available".to_string(),
            trust_score: None,
            roi: None,
            readiness_status: ReadinessStatus::Ready,
            source: ListingSource::Internal,
        }
    }

    #[test]
    fn type_area_and_budget_score_eighty() {
        let result = MandateMatcher::default().score(&listing(3_000_000), Some(&marina_mandate()));

        assert_eq!(result.score, 80.0);
        assert_eq!(
            result.reasons,
            vec![
                "Property type matches mandate",
                "Located in a preferred area",
                "Price within mandate budget"
            ]
        );
    }

    #[test]
    fn twenty_percent_over_budget_earns_no_budget_points() {
        let result = MandateMatcher::default().score(&listing(6_000_000), Some(&marina_mandate()));

        assert_eq!(result.score, 55.0);
        assert_eq!(result.reasons.len(), 2);
    }

    #[test]
    fn near_budget_band_is_fifteen_percent_of_nearer_bound() {
        let mandate = marina_mandate();
        assert_eq!(budget_fit(Decimal::new(5_750_000, 0), &mandate), BudgetFit::Near);
        assert_eq!(budget_fit(Decimal::new(5_750_001, 0), &mandate), BudgetFit::Outside);
        assert_eq!(budget_fit(Decimal::new(850_000, 0), &mandate), BudgetFit::Near);
        assert_eq!(budget_fit(Decimal::new(849_999, 0), &mandate), BudgetFit::Outside);
        assert_eq!(budget_fit(Decimal::new(1_000_000, 0), &mandate), BudgetFit::Within);
        assert_eq!(budget_fit(Decimal::new(1_000_000, 0), &Mandate::default()), BudgetFit::Unconstrained);
    }

    #[test]
    fn band_edge_past_decimal_range_is_outside() {
        let mandate = Mandate {
            max_investment: Some(Decimal::MAX - Decimal::TEN),
            ..Mandate::default()
        };

        assert_eq!(budget_fit(Decimal::MAX, &mandate), BudgetFit::Outside);
        assert_eq!(budget_fit(Decimal::new(5_000_000, 0), &mandate), BudgetFit::Within);
    }

    #[test]
    fn bedrooms_and_open_ended_size_score() {
        let mandate = Mandate {
            preferred_bedrooms: vec![2, 3],
            min_size: Some(900.0),
            ..Mandate::default()
        };
        let mut candidate = listing(2_000_000);
        candidate.bedrooms = Some(2);
        candidate.size = Some(1_250.0);

        let result = MandateMatcher::default().score(&candidate, Some(&mandate));
        assert_eq!(result.score, 20.0);
        assert_eq!(result.reasons, vec!["Bedroom count matches mandate", "Size within mandate range"]);

        candidate.size = None;
        assert_eq!(MandateMatcher::default().score(&candidate, Some(&mandate)).score, 10.0);
    }

    #[test]
    fn missing_mandate_scores_zero() {
        let result = MandateMatcher::default().score(&listing(3_000_000), None);
        assert_eq!(result.score, 0.0);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn score_stays_within_bounds_for_generated_inputs() {
        let matcher = MandateMatcher::default();
        let mandates = [
            Mandate::default(),
            marina_mandate(),
            Mandate {
                property_types: vec!["apartment".to_string(), "apt".to_string()],
                preferred_areas: vec!["Marina".to_string(), "Dubai".to_string()],
                min_investment: Some(Decimal::ZERO),
                max_investment: Some(Decimal::new(9_000_000, 0)),
                preferred_bedrooms: vec![0, 1, 2, 3, 4],
                min_size: Some(0.0),
                max_size: Some(10_000.0),
                yield_target: Some("6%".to_string()),
            },
        ];

        for mandate in &mandates {
            for price in [0_i64, 850_000, 3_000_000, 5_750_000, 20_000_000] {
                for bedrooms in [None, Some(0), Some(2), Some(7)] {
                    let mut candidate = listing(price);
                    candidate.bedrooms = bedrooms;
                    candidate.size = Some(1_000.0);
                    let score = matcher.score(&candidate, Some(mandate)).score;
                    assert!((0.0..=100.0).contains(&score), "score {score} out of bounds");
                }
            }
        }
    }
}
