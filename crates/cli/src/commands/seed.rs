use crate::commands::{execute, CommandResult, Failure, GlobalOptions};
use brickwise_db::{DemoSeedDataset, VerificationResult};

/// Replaces the demo tenant with a fresh copy of the deterministic dataset.
pub fn run(options: &GlobalOptions) -> CommandResult {
    execute("seed", options, |session| async move {
        DemoSeedDataset::clean(&session.pool)
            .await
            .map_err(|error| Failure::new("seed_execution", error.to_string(), 6))?;

        let seed_result = DemoSeedDataset::load(&session.pool)
            .await
            .map_err(|error| Failure::new("seed_execution", error.to_string(), 6))?;

        let verification = DemoSeedDataset::verify(&session.pool)
            .await
            .map_err(|error| Failure::new("seed_verification", error.to_string(), 7))?;
        if !verification.all_present {
            return Err(Failure::new("seed_verification", verification_message(&verification), 7));
        }

        Ok(CommandResult::success(
            "seed",
            format!(
                "demo dataset loaded for tenant {} ({} tables, investors: {})",
                seed_result.tenant_id,
                seed_result.tables_seeded,
                seed_result.investor_ids.join(", ")
            ),
        ))
    })
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed_checks = verification.failed_checks();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use brickwise_db::VerificationResult;

    use super::verification_message;

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let verification = VerificationResult {
            all_present: false,
            checks: vec![("listings", true), ("investors", false), ("investor-mandates", false)],
        };

        assert_eq!(
            verification_message(&verification),
            "Seed verification failed for checks: investors, investor-mandates"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let verification = VerificationResult { all_present: false, checks: Vec::new() };

        assert_eq!(verification_message(&verification), "Some seed data failed to load");
    }
}
