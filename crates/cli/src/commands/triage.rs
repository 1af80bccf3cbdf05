use clap::ValueEnum;

use crate::commands::{execute, CommandResult, Failure, GlobalOptions};
use brickwise_core::domain::ids::SignalId;
use brickwise_core::domain::market::StatusChange;
use brickwise_core::errors::TriageError;
use brickwise_core::pipeline::SignalTriage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TriageAction {
    #[value(alias = "acknowledge")]
    Ack,
    Dismiss,
    Route,
}

pub fn run(options: &GlobalOptions, action: TriageAction, signal_id: &str) -> CommandResult {
    let signal_id = SignalId::new(signal_id.trim());

    execute("triage", options, move |session| async move {
        let triage = SignalTriage::new(session.market());
        let outcome = match action {
            TriageAction::Ack => triage.acknowledge(&session.tenant, &signal_id).await,
            TriageAction::Dismiss => triage.dismiss(&session.tenant, &signal_id).await,
            TriageAction::Route => triage.route(&session.tenant, &signal_id).await,
        }
        .map_err(triage_failure)?;

        let message = match outcome.change {
            StatusChange::Applied => format!(
                "signal {} moved from {} to {}",
                outcome.signal_id,
                outcome.previous.as_str(),
                outcome.status.as_str()
            ),
            StatusChange::Unchanged => {
                format!("signal {} already {}", outcome.signal_id, outcome.status.as_str())
            }
        };
        Ok(CommandResult::report("triage", message, outcome, false))
    })
}

fn triage_failure(error: TriageError) -> Failure {
    match error {
        TriageError::SignalNotFound { .. } => Failure::new("signal_not_found", error.to_string(), 8),
        TriageError::Domain(_) => Failure::new("invalid_transition", error.to_string(), 9),
        TriageError::Store(_) => Failure::new("store", error.to_string(), 10),
    }
}

#[cfg(test)]
mod tests {
    use brickwise_core::domain::ids::{SignalId, TenantId};
    use brickwise_core::domain::market::SignalStatus;
    use brickwise_core::errors::{DomainError, TriageError};

    use super::triage_failure;

    #[test]
    fn triage_errors_have_distinct_classes() {
        let missing = triage_failure(TriageError::SignalNotFound {
            tenant_id: TenantId::new("org-demo"),
            signal_id: SignalId::new("sig_x"),
        });
        let invalid = triage_failure(TriageError::Domain(DomainError::InvalidSignalTransition {
            from: SignalStatus::Dismissed,
            to: SignalStatus::Routed,
        }));

        assert_eq!((missing.error_class, missing.exit_code), ("signal_not_found", 8));
        assert_eq!((invalid.error_class, invalid.exit_code), ("invalid_transition", 9));
    }
}
