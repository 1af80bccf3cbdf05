use chrono::{NaiveDate, Utc};

use crate::commands::{execute, CommandResult, GlobalOptions};
use brickwise_core::pipeline::SummaryPipeline;

/// Compiles summaries as of `as_of`, today (UTC) when absent.
pub fn run(options: &GlobalOptions, as_of: Option<NaiveDate>) -> CommandResult {
    let as_of = as_of.unwrap_or_else(|| Utc::now().date_naive());

    execute("summaries", options, move |session| async move {
        let pipeline = SummaryPipeline::new(session.market(), session.settings());
        let result = pipeline.run(&session.tenant, as_of).await;

        let message = format!(
            "{} summaries created, {} updated as of {as_of}",
            result.summaries_created, result.summaries_updated
        );
        let degraded = !result.success;
        Ok(CommandResult::report("summaries", message, result, degraded))
    })
}
