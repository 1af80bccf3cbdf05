use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::ids::{InvestorId, TenantId};
use crate::domain::investor::Investor;
use crate::domain::opportunity::{
    Counterfactual, Opportunity, OpportunityCounts, OpportunityOptions, RecommendedCandidate,
};
use crate::errors::{LookupError, StoreError};
use crate::geo::GeoNormalizer;
use crate::scoring::counterfactual::{CounterfactualEngine, PortfolioContext};
use crate::scoring::matcher::MandateMatcher;
use crate::scoring::opportunity::{OpportunityContext, OpportunityScorer};
use crate::store::{CrmStore, MarketStore};

use super::{lookup, or_default, PipelineSettings};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OpportunityResult {
    pub investor_id: InvestorId,
    pub items: Vec<Opportunity>,
    pub counts: OpportunityCounts,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CounterfactualResult {
    pub investor_id: InvestorId,
    pub recommended: Vec<RecommendedCandidate>,
    pub counterfactuals: Vec<Counterfactual>,
    pub errors: Vec<String>,
}

/// Investor-facing queries. Only an unknown or unreadable investor is an
/// error; any other failed source degrades the answer and is listed in
/// `errors`.
pub struct OpportunityService {
    market: Arc<dyn MarketStore>,
    crm: Arc<dyn CrmStore>,
    settings: PipelineSettings,
    normalizer: GeoNormalizer,
    scorer: OpportunityScorer,
    engine: CounterfactualEngine,
}

impl OpportunityService {
    pub fn new(
        market: Arc<dyn MarketStore>,
        crm: Arc<dyn CrmStore>,
        settings: PipelineSettings,
    ) -> Self {
        let normalizer = GeoNormalizer::default();
        let matcher = MandateMatcher::new(normalizer.clone());
        let engine = CounterfactualEngine::new(settings.trust.clone(), matcher.clone());
        Self { market, crm, settings, normalizer, scorer: OpportunityScorer::new(matcher), engine }
    }

    pub async fn compute_opportunities(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
        options: OpportunityOptions,
    ) -> Result<OpportunityResult, LookupError> {
        let run_id = Uuid::new_v4().to_string();
        let investor = self.find_investor(tenant_id, investor_id).await?;
        let timeout = self.settings.query_timeout;

        let (listings, holdings, shortlist, memos, deal_rooms, signals) = tokio::join!(
            lookup("listings", timeout, self.crm.listings(tenant_id)),
            lookup("holdings", timeout, self.crm.holdings(tenant_id, investor_id)),
            lookup("shortlist_items", timeout, self.crm.shortlist_items(tenant_id, investor_id)),
            lookup("memos", timeout, self.crm.memos(tenant_id, investor_id)),
            lookup("deal_rooms", timeout, self.crm.deal_rooms(tenant_id, investor_id)),
            lookup("relevant_signals", timeout, self.market.relevant_signals(tenant_id, investor_id)),
        );

        let mut errors = Vec::new();
        let listings = or_default(listings, &run_id, &mut errors);
        let holdings = or_default(holdings, &run_id, &mut errors);
        let shortlist = or_default(shortlist, &run_id, &mut errors);
        let memos = or_default(memos, &run_id, &mut errors);
        let deal_rooms = or_default(deal_rooms, &run_id, &mut errors);
        let signals = or_default(signals, &run_id, &mut errors);

        let context = OpportunityContext {
            investor_id,
            mandate: investor.mandate.as_ref(),
            listings: &listings,
            holdings: &holdings,
            shortlist: &shortlist,
            memos: &memos,
            deal_rooms: &deal_rooms,
            signals: &signals,
        };
        let options = OpportunityOptions {
            limit: options.limit.or(Some(self.settings.default_opportunity_limit)),
            ..options
        };
        let scored = self.scorer.score(&context, &options);

        info!(
            event_name = "query.opportunities.complete",
            correlation_id = %run_id,
            tenant_id = %tenant_id,
            investor_id = %investor_id,
            total = scored.counts.total,
            returned = scored.counts.returned,
            error_count = errors.len(),
            "opportunities computed"
        );

        Ok(OpportunityResult {
            investor_id: investor_id.clone(),
            items: scored.items,
            counts: scored.counts,
            errors,
        })
    }

    pub async fn compute_counterfactuals(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<CounterfactualResult, LookupError> {
        let run_id = Uuid::new_v4().to_string();
        let investor = self.find_investor(tenant_id, investor_id).await?;
        let timeout = self.settings.query_timeout;

        let (listings, holdings, signals) = tokio::join!(
            lookup("listings", timeout, self.crm.listings(tenant_id)),
            lookup("holdings", timeout, self.crm.holdings(tenant_id, investor_id)),
            lookup("relevant_signals", timeout, self.market.relevant_signals(tenant_id, investor_id)),
        );

        let mut errors = Vec::new();
        let listings = or_default(listings, &run_id, &mut errors);
        let holdings = or_default(holdings, &run_id, &mut errors);
        let signals = or_default(signals, &run_id, &mut errors);

        let portfolio = PortfolioContext::from_holdings(&holdings, &self.normalizer);
        let split =
            self.engine.split(&listings, investor.mandate.as_ref(), &portfolio, &signals);

        info!(
            event_name = "query.counterfactuals.complete",
            correlation_id = %run_id,
            tenant_id = %tenant_id,
            investor_id = %investor_id,
            recommended = split.recommended.len(),
            counterfactuals = split.counterfactuals.len(),
            error_count = errors.len(),
            "counterfactuals computed"
        );

        Ok(CounterfactualResult {
            investor_id: investor_id.clone(),
            recommended: split.recommended,
            counterfactuals: split.counterfactuals,
            errors,
        })
    }

    async fn find_investor(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Investor, LookupError> {
        let timeout = self.settings.query_timeout;
        let found = match tokio::time::timeout(timeout, self.crm.find_investor(tenant_id, investor_id))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(LookupError::Store(StoreError::Unavailable(format!(
                    "investor lookup timed out after {}ms",
                    timeout.as_millis()
                ))))
            }
        };

        found.ok_or_else(|| LookupError::InvestorNotFound {
            tenant_id: tenant_id.clone(),
            investor_id: investor_id.clone(),
        })
    }
}
