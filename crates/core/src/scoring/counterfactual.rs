//! Constraint evaluation that splits candidates into recommended listings and
//! near-miss counterfactuals.
//!
//! Constraints run in a fixed order and never short-circuit, so a listing can
//! collect several violations. Only the six hard constraints count toward the
//! "one or two violations" gate; area/type mismatches and liquidity risk are
//! reported as soft reason codes. A counterfactual additionally needs a
//! strength score above [`COUNTERFACTUAL_MIN_STRENGTH`].

use std::collections::{HashMap, HashSet};

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::ListingId;
use crate::domain::investor::Holding;
use crate::domain::listing::{Listing, ListingSource, ReadinessStatus};
use crate::domain::mandate::Mandate;
use crate::domain::market::RelevantSignal;
use crate::domain::opportunity::{
    ConstraintKey, Counterfactual, RecommendedCandidate, SoftReason, ViolatedConstraint,
};
use crate::geo::GeoNormalizer;
use crate::money::format_compact_aed;
use crate::scoring::matcher::MandateMatcher;
use crate::scoring::strength::strength_score;

pub const MAX_RECOMMENDED: usize = 6;
pub const MAX_COUNTERFACTUALS: usize = 10;
pub const MAX_COUNTERFACTUAL_VIOLATIONS: usize = 2;
pub const COUNTERFACTUAL_MIN_STRENGTH: f64 = 50.0;
/// Holdings in one area at which another purchase there is disqualified.
pub const CONCENTRATION_LIMIT: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrustPolicy {
    pub min_trust_score: f64,
    pub require_verification: bool,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self { min_trust_score: 60.0, require_verification: true }
    }
}

/// Holding counts per normalized area.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortfolioContext {
    area_counts: HashMap<String, usize>,
    owned: HashSet<ListingId>,
}

impl PortfolioContext {
    pub fn from_holdings(holdings: &[Holding], normalizer: &GeoNormalizer) -> Self {
        let mut context = Self::default();
        for holding in holdings {
            context.owned.insert(holding.property_id.clone());
            if let Some(area) = holding.area.as_deref() {
                let area = normalizer.normalize(area);
                if !area.is_empty() {
                    *context.area_counts.entry(area).or_default() += 1;
                }
            }
        }
        context
    }

    pub fn holdings_in(&self, area: &str, normalizer: &GeoNormalizer) -> usize {
        self.area_counts.get(&normalizer.normalize(area)).copied().unwrap_or_default()
    }

    pub fn owns(&self, listing_id: &ListingId) -> bool {
        self.owned.contains(listing_id)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstraintEvaluation {
    pub violations: Vec<ViolatedConstraint>,
    pub soft_reasons: Vec<SoftReason>,
    pub hints: Vec<String>,
}

impl ConstraintEvaluation {
    pub fn blocking_violations(&self) -> usize {
        self.violations.iter().filter(|violation| violation.key.blocks_recommendation()).count()
    }

    pub fn reason_codes(&self) -> Vec<String> {
        self.violations
            .iter()
            .map(|violation| violation.key.as_str().to_string())
            .chain(self.soft_reasons.iter().map(|reason| reason.as_str().to_string()))
            .collect()
    }

    pub fn reason_labels(&self) -> Vec<String> {
        self.violations
            .iter()
            .map(|violation| violation.key.label().to_string())
            .chain(self.soft_reasons.iter().map(|reason| reason.label().to_string()))
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CandidateDecision {
    Recommended(RecommendedCandidate),
    Counterfactual(Counterfactual),
    Excluded,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterfactualSplit {
    pub recommended: Vec<RecommendedCandidate>,
    pub counterfactuals: Vec<Counterfactual>,
}

#[derive(Clone, Debug, Default)]
pub struct CounterfactualEngine {
    policy: TrustPolicy,
    matcher: MandateMatcher,
}

impl CounterfactualEngine {
    pub fn new(policy: TrustPolicy, matcher: MandateMatcher) -> Self {
        Self { policy, matcher }
    }

    pub fn policy(&self) -> &TrustPolicy {
        &self.policy
    }

    fn normalizer(&self) -> &GeoNormalizer {
        self.matcher.normalizer()
    }

    pub fn evaluate(
        &self,
        listing: &Listing,
        mandate: Option<&Mandate>,
        portfolio: &PortfolioContext,
    ) -> ConstraintEvaluation {
        let mut evaluation = ConstraintEvaluation::default();

        if let Some(max) = mandate.and_then(|mandate| mandate.max_investment) {
            if listing.price > max {
                evaluation.violations.push(ViolatedConstraint {
                    key: ConstraintKey::OverBudget,
                    expected: format!("<= {}", format_compact_aed(max)),
                    actual: format_compact_aed(listing.price),
                    gap: listing.price.checked_sub(max),
                });
                evaluation.hints.push(format!("If price <= {}", format_compact_aed(max)));
            }
        }

        if let Some(min) = mandate.and_then(|mandate| mandate.min_investment) {
            if listing.price < min {
                evaluation.violations.push(ViolatedConstraint {
                    key: ConstraintKey::UnderBudgetMin,
                    expected: format!(">= {}", format_compact_aed(min)),
                    actual: format_compact_aed(listing.price),
                    gap: min.checked_sub(listing.price),
                });
                evaluation
                    .hints
                    .push(format!("If minimum ticket were {} or lower", format_compact_aed(listing.price)));
            }
        }

        if let (Some(target), Some(roi)) =
            (mandate.and_then(Mandate::yield_target_pct), listing.roi.filter(|roi| roi.is_finite()))
        {
            if roi < target {
                evaluation.violations.push(ViolatedConstraint {
                    key: ConstraintKey::YieldBelowTarget,
                    expected: format!(">= {target}%"),
                    actual: format!("{roi}%"),
                    gap: Decimal::from_f64(target - roi).map(|gap| gap.round_dp(2)),
                });
                evaluation.hints.push(format!("If yield >= {target}%"));
            }
        }

        if let Some(trust) = listing.trust_score {
            if trust < self.policy.min_trust_score {
                evaluation.violations.push(ViolatedConstraint {
                    key: ConstraintKey::LowTrustScore,
                    expected: format!(">= {}", self.policy.min_trust_score),
                    actual: trust.to_string(),
                    gap: Decimal::from_f64(self.policy.min_trust_score - trust)
                        .map(|gap| gap.round_dp(2)),
                });
                evaluation
                    .hints
                    .push(format!("If trust score >= {}", self.policy.min_trust_score));
            }
        }

        if self.policy.require_verification
            && listing.readiness_status == ReadinessStatus::NeedsVerification
        {
            evaluation.violations.push(ViolatedConstraint {
                key: ConstraintKey::NeedsVerification,
                expected: ReadinessStatus::Ready.as_str().to_string(),
                actual: listing.readiness_status.as_str().to_string(),
                gap: None,
            });
            evaluation.hints.push("If the listing is verified".to_string());
        }

        let held_in_area = portfolio.holdings_in(&listing.area, self.normalizer());
        if held_in_area >= CONCENTRATION_LIMIT {
            evaluation.violations.push(ViolatedConstraint {
                key: ConstraintKey::ConcentrationRisk,
                expected: format!("< {CONCENTRATION_LIMIT} holdings in {}", listing.area),
                actual: format!("{held_in_area} holdings"),
                gap: None,
            });
            evaluation.hints.push(format!(
                "If the portfolio held fewer than {CONCENTRATION_LIMIT} properties in {}",
                listing.area
            ));
        }

        if let Some(mandate) = mandate {
            if !mandate.preferred_areas.is_empty() && !self.matcher.area_matches(listing, mandate) {
                evaluation.soft_reasons.push(SoftReason::AreaMismatch);
            }
            if !mandate.property_types.is_empty() && !self.matcher.type_matches(listing, mandate) {
                evaluation.soft_reasons.push(SoftReason::TypeMismatch);
            }
        }
        if listing.source == ListingSource::Portal && listing.trust_score.is_none() {
            evaluation.soft_reasons.push(SoftReason::LiquidityRisk);
        }

        evaluation
    }

    pub fn decide(
        &self,
        listing: &Listing,
        mandate: Option<&Mandate>,
        portfolio: &PortfolioContext,
    ) -> CandidateDecision {
        let evaluation = self.evaluate(listing, mandate, portfolio);
        let strength = strength_score(listing, mandate, self.normalizer());

        if evaluation.blocking_violations() == 0 && evaluation.soft_reasons.is_empty() {
            return CandidateDecision::Recommended(RecommendedCandidate {
                property_id: listing.id.clone(),
                score: strength,
                reasons: self.matcher.score(listing, mandate).reasons,
                reported_codes: evaluation.reason_codes(),
            });
        }

        let violation_count = evaluation.violations.len();
        if (1..=MAX_COUNTERFACTUAL_VIOLATIONS).contains(&violation_count)
            && strength > COUNTERFACTUAL_MIN_STRENGTH
        {
            return CandidateDecision::Counterfactual(Counterfactual {
                property_id: listing.id.clone(),
                reason_codes: evaluation.reason_codes(),
                reason_labels: evaluation.reason_labels(),
                what_would_change_my_mind: evaluation.hints,
                violated_constraints: evaluation.violations,
                score: strength,
            });
        }

        CandidateDecision::Excluded
    }

    /// Signals routed to the investor that touch this listing, either as
    /// evidence or through its area, in the order given.
    pub fn signal_reasons(&self, listing: &Listing, signals: &[RelevantSignal]) -> Vec<String> {
        signals
            .iter()
            .filter(|signal| {
                signal.listing_ids.contains(&listing.id)
                    || self.normalizer().matches(&listing.area, &signal.geo_name)
            })
            .map(|signal| {
                format!(
                    "{} signal in {} ({})",
                    signal.signal_type.label(),
                    signal.geo_name,
                    signal.severity.as_str()
                )
            })
            .collect()
    }

    /// Unavailable and already owned listings are skipped. Recommended
    /// candidates carry mandate reasons followed by signal reasons. Both lists
    /// are ordered by strength (ties by listing id) and capped.
    pub fn split(
        &self,
        listings: &[Listing],
        mandate: Option<&Mandate>,
        portfolio: &PortfolioContext,
        signals: &[RelevantSignal],
    ) -> CounterfactualSplit {
        let mut split = CounterfactualSplit::default();

        for listing in listings {
            if !listing.is_available() || portfolio.owns(&listing.id) {
                continue;
            }
            match self.decide(listing, mandate, portfolio) {
                CandidateDecision::Recommended(mut candidate) => {
                    candidate.reasons.extend(self.signal_reasons(listing, signals));
                    split.recommended.push(candidate)
                }
                CandidateDecision::Counterfactual(counterfactual) => {
                    split.counterfactuals.push(counterfactual)
                }
                CandidateDecision::Excluded => {}
            }
        }

        split.recommended.sort_by(|left, right| {
            right.score.total_cmp(&left.score).then_with(|| left.property_id.cmp(&right.property_id))
        });
        split.recommended.truncate(MAX_RECOMMENDED);

        let recommended: HashSet<&ListingId> =
            split.recommended.iter().map(|candidate| &candidate.property_id).collect();
        let mut counterfactuals: Vec<Counterfactual> = split
            .counterfactuals
            .drain(..)
            .filter(|counterfactual| !recommended.contains(&counterfactual.property_id))
            .collect();
        counterfactuals.sort_by(|left, right| {
            right.score.total_cmp(&left.score).then_with(|| left.property_id.cmp(&right.property_id))
        });
        counterfactuals.truncate(MAX_COUNTERFACTUALS);
        split.counterfactuals = counterfactuals;

        split
    }
}
