use crate::commands::{execute, CommandResult, Failure, GlobalOptions};
use brickwise_core::domain::ids::InvestorId;
use brickwise_core::domain::opportunity::OpportunityOptions;
use brickwise_core::errors::LookupError;
use brickwise_core::pipeline::OpportunityService;

pub fn run(options: &GlobalOptions, investor: &str, request: OpportunityOptions) -> CommandResult {
    let investor_id = InvestorId::new(investor.trim());

    execute("opportunities", options, move |session| async move {
        let service = OpportunityService::new(session.market(), session.crm(), session.settings());
        let result = service
            .compute_opportunities(&session.tenant, &investor_id, request)
            .await
            .map_err(lookup_failure)?;

        let message = format!(
            "{} of {} opportunities for investor {}",
            result.counts.returned, result.counts.total, result.investor_id
        );
        let degraded = !result.errors.is_empty();
        Ok(CommandResult::report("opportunities", message, result, degraded))
    })
}

pub fn run_counterfactuals(options: &GlobalOptions, investor: &str) -> CommandResult {
    let investor_id = InvestorId::new(investor.trim());

    execute("counterfactuals", options, move |session| async move {
        let service = OpportunityService::new(session.market(), session.crm(), session.settings());
        let result = service
            .compute_counterfactuals(&session.tenant, &investor_id)
            .await
            .map_err(lookup_failure)?;

        let message = format!(
            "{} recommended, {} near misses for investor {}",
            result.recommended.len(),
            result.counterfactuals.len(),
            result.investor_id
        );
        let degraded = !result.errors.is_empty();
        Ok(CommandResult::report("counterfactuals", message, result, degraded))
    })
}

fn lookup_failure(error: LookupError) -> Failure {
    match error {
        LookupError::InvestorNotFound { .. } => {
            Failure::new("investor_not_found", error.to_string(), 8)
        }
        LookupError::Store(_) => Failure::new("store", error.to_string(), 10),
    }
}
