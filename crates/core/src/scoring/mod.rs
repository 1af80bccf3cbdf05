pub mod counterfactual;
pub mod matcher;
pub mod opportunity;
pub mod strength;

pub use counterfactual::{
    CandidateDecision, ConstraintEvaluation, CounterfactualEngine, CounterfactualSplit,
    PortfolioContext, TrustPolicy,
};
pub use matcher::{MandateMatcher, MatchResult};
pub use opportunity::{combined_score, OpportunityContext, OpportunityScorer, ScoredOpportunities};
pub use strength::strength_score;
