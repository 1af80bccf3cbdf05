use crate::domain::listing::Listing;
use crate::domain::mandate::Mandate;
use crate::geo::GeoNormalizer;

const TRUST_WEIGHT: f64 = 0.55;
const ROI_WEIGHT: f64 = 3.5;
const TYPE_BONUS: f64 = 10.0;
const DEFAULT_TRUST: f64 = 50.0;

/// Overall listing strength used to gate counterfactuals. Separate from the
/// additive mandate fit, which only explains why a listing matches.
///
/// `0.55 * trust + 3.5 * roi + type bonus`, clamped to 0..=100 and rounded.
/// Missing trust counts as 50, missing roi as 0.
pub fn strength_score(listing: &Listing, mandate: Option<&Mandate>, normalizer: &GeoNormalizer) -> f64 {
    let trust = listing.trust_score.filter(|value| value.is_finite()).unwrap_or(DEFAULT_TRUST);
    let roi = listing.roi.filter(|value| value.is_finite()).unwrap_or(0.0);
    let type_bonus = match mandate {
        Some(mandate)
            if normalizer.first_match(&listing.property_type, &mandate.property_types).is_some() =>
        {
            TYPE_BONUS
        }
        _ => 0.0,
    };

    (TRUST_WEIGHT * trust + ROI_WEIGHT * roi + type_bonus).clamp(0.0, 100.0).round()
}
