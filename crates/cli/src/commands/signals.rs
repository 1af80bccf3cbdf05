use crate::commands::{execute, CommandResult, GlobalOptions};
use brickwise_core::pipeline::SignalsPipeline;

pub fn run(options: &GlobalOptions) -> CommandResult {
    execute("signals", options, |session| async move {
        let pipeline = SignalsPipeline::new(session.market(), session.crm(), session.settings());
        let result = pipeline.run(&session.tenant).await;

        let message = format!(
            "{} official, {} portal signals created; {} investor mappings",
            result.truth_created, result.portal_created, result.mappings_created
        );
        let degraded = !result.success;
        Ok(CommandResult::report("signals", message, result, degraded))
    })
}
