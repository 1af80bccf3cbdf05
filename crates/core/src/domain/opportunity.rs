use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{InvestorId, ListingId, SignalId};
use crate::domain::market::{Severity, SignalType};

pub const DEFAULT_OPPORTUNITY_LIMIT: usize = 50;
pub const MAX_OPPORTUNITY_LIMIT: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Recommended,
    Shortlisted,
    Memo,
    Deal,
    Holding,
}

impl LifecycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recommended => "recommended",
            Self::Shortlisted => "shortlisted",
            Self::Memo => "memo",
            Self::Deal => "deal",
            Self::Holding => "holding",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityScores {
    pub combined: f64,
    pub mandate_match: f64,
    pub signal_relevance: f64,
    pub shortlist_match: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShortlistState {
    pub in_shortlist: bool,
    pub match_score: Option<f64>,
    pub rank: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalSource {
    pub signal_id: SignalId,
    pub signal_type: SignalType,
    pub severity: Severity,
    pub relevance_score: f64,
    pub direct: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpportunitySources {
    pub mandate_reasons: Vec<String>,
    pub shortlist: ShortlistState,
    pub signals: Vec<SignalSource>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lifecycle {
    pub stage: LifecycleStage,
    pub is_owned: bool,
    pub is_shortlisted: bool,
    pub is_in_deal: bool,
    pub has_memo: bool,
    pub is_memo_approved: bool,
}

impl Lifecycle {
    /// First match wins: owned, deal, memo, shortlisted, otherwise recommended.
    pub fn resolve(
        is_owned: bool,
        is_in_deal: bool,
        has_memo: bool,
        is_memo_approved: bool,
        is_shortlisted: bool,
    ) -> Self {
        let stage = if is_owned {
            LifecycleStage::Holding
        } else if is_in_deal {
            LifecycleStage::Deal
        } else if has_memo {
            LifecycleStage::Memo
        } else if is_shortlisted {
            LifecycleStage::Shortlisted
        } else {
            LifecycleStage::Recommended
        };

        Self { stage, is_owned, is_shortlisted, is_in_deal, has_memo, is_memo_approved }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub listing_id: ListingId,
    pub investor_id: InvestorId,
    pub title: String,
    pub area: String,
    pub scores: OpportunityScores,
    pub sources: OpportunitySources,
    pub lifecycle: Lifecycle,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityCounts {
    pub total: usize,
    pub returned: usize,
    pub recommended: usize,
    pub shortlisted: usize,
    pub memo: usize,
    pub deal: usize,
    pub holding: usize,
}

impl OpportunityCounts {
    pub fn record(&mut self, stage: LifecycleStage) {
        self.total += 1;
        match stage {
            LifecycleStage::Recommended => self.recommended += 1,
            LifecycleStage::Shortlisted => self.shortlisted += 1,
            LifecycleStage::Memo => self.memo += 1,
            LifecycleStage::Deal => self.deal += 1,
            LifecycleStage::Holding => self.holding += 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityOptions {
    pub include_owned: bool,
    pub limit: Option<usize>,
}

impl OpportunityOptions {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_OPPORTUNITY_LIMIT).clamp(1, MAX_OPPORTUNITY_LIMIT)
    }
}

/// Constraint keys in evaluation order. Only these count toward the
/// counterfactual eligibility gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKey {
    OverBudget,
    UnderBudgetMin,
    YieldBelowTarget,
    LowTrustScore,
    NeedsVerification,
    ConcentrationRisk,
}

impl ConstraintKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OverBudget => "over_budget",
            Self::UnderBudgetMin => "under_budget_min",
            Self::YieldBelowTarget => "yield_below_target",
            Self::LowTrustScore => "low_trust_score",
            Self::NeedsVerification => "needs_verification",
            Self::ConcentrationRisk => "concentration_risk",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::OverBudget => "Price exceeds mandate budget",
            Self::UnderBudgetMin => "Price below mandate minimum ticket",
            Self::YieldBelowTarget => "Yield below mandate target",
            Self::LowTrustScore => "Listing trust score below policy minimum",
            Self::NeedsVerification => "Listing still needs verification",
            Self::ConcentrationRisk => "Portfolio already concentrated in this area",
        }
    }

    /// `under_budget_min` is reported but does not block a recommendation.
    pub fn blocks_recommendation(&self) -> bool {
        !matches!(self, Self::UnderBudgetMin)
    }
}

/// Reason codes that are explained but never counted as violations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoftReason {
    AreaMismatch,
    TypeMismatch,
    LiquidityRisk,
}

impl SoftReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AreaMismatch => "area_mismatch",
            Self::TypeMismatch => "type_mismatch",
            Self::LiquidityRisk => "liquidity_risk",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::AreaMismatch => "Area is outside the mandate's preferred areas",
            Self::TypeMismatch => "Property type is outside the mandate",
            Self::LiquidityRisk => "Portal-sourced listing without a trust score",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViolatedConstraint {
    pub key: ConstraintKey,
    pub expected: String,
    pub actual: String,
    /// Numeric distance from the constraint where one exists (overage, yield gap).
    pub gap: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Counterfactual {
    pub property_id: ListingId,
    pub reason_codes: Vec<String>,
    pub reason_labels: Vec<String>,
    pub violated_constraints: Vec<ViolatedConstraint>,
    pub what_would_change_my_mind: Vec<String>,
    pub score: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendedCandidate {
    pub property_id: ListingId,
    pub score: f64,
    pub reasons: Vec<String>,
    /// Non-blocking codes still worth showing (a lone `under_budget_min`).
    pub reported_codes: Vec<String>,
}
