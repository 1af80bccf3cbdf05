use std::env;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use brickwise_cli::commands::triage::TriageAction;
use brickwise_cli::commands::{
    doctor, migrate, opportunities, seed, signals, summaries, triage, CommandResult, GlobalOptions,
};
use brickwise_core::domain::opportunity::OpportunityOptions;
use chrono::NaiveDate;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_for_fresh_database() {
    with_database(|options| {
        let result = migrate::run(options);
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert!(payload["error_class"].is_null());
    });
}

#[test]
fn doctor_reports_unmigrated_schema_then_passes() {
    with_database(|options| {
        let before = doctor::run(options, true);
        assert!(!before.healthy, "fresh database should fail the schema check");

        migrate::run(options);
        let after = doctor::run(options, true);
        assert!(after.healthy, "doctor output: {}", after.output);

        let report: Value = serde_json::from_str(&after.output).expect("doctor json");
        assert_eq!(report["overall_status"], "pass");
        let names: Vec<&str> =
            report["checks"].as_array().expect("checks").iter().filter_map(|c| c["name"].as_str()).collect();
        assert_eq!(names, vec!["config_validation", "database_connectivity", "schema_migrations"]);
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_database(|options| {
        let first = seed::run(options);
        assert_eq!(first.exit_code, 0, "first seed failed: {}", first.output);
        let second = seed::run(options);
        assert_eq!(second.exit_code, 0, "second seed failed: {}", second.output);

        let first_payload = parse_payload(&first);
        let second_payload = parse_payload(&second);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["message"], second_payload["message"]);
        assert!(first_payload["message"].as_str().unwrap_or_default().contains("org-demo"));
    });
}

#[test]
fn demo_tenant_end_to_end() {
    with_database(|options| {
        assert_eq!(seed::run(options).exit_code, 0);

        let first = parse_payload(&signals::run(options));
        assert_eq!(first["status"], "ok", "signals payload: {first}");
        assert!(first["body"]["truth_created"].as_u64().unwrap_or_default() > 0);
        assert!(first["body"]["mappings_created"].as_u64().unwrap_or_default() > 0);

        let rerun = parse_payload(&signals::run(options));
        assert_eq!(rerun["body"]["truth_created"], 0);
        assert_eq!(rerun["body"]["portal_created"], 0);
        assert_eq!(rerun["body"]["mappings_created"], 0);

        let ranked = opportunities::run(
            options,
            "inv-demo-1",
            OpportunityOptions { include_owned: false, limit: Some(10) },
        );
        assert_eq!(ranked.exit_code, 0, "opportunities output: {}", ranked.output);
        let ranked = parse_payload(&ranked);
        let items = ranked["body"]["items"].as_array().expect("items").clone();
        let marina = items
            .iter()
            .find(|item| item["listing_id"] == "lst-demo-marina-1")
            .expect("marina listing ranked");
        assert_eq!(marina["lifecycle"]["stage"], "memo");
        let signal_id = marina["sources"]["signals"][0]["signal_id"]
            .as_str()
            .expect("attached signal")
            .to_string();

        let split = parse_payload(&opportunities::run_counterfactuals(options, "inv-demo-1"));
        assert_eq!(split["status"], "ok");
        let near_misses = split["body"]["counterfactuals"].as_array().expect("counterfactuals");
        assert!(near_misses.iter().any(|item| item["property_id"] == "lst-demo-marina-2"));

        let as_of = NaiveDate::from_ymd_opt(2026, 10, 1);
        let compiled = parse_payload(&summaries::run(options, as_of));
        assert_eq!(compiled["body"]["summaries_created"], 3);
        let recompiled = parse_payload(&summaries::run(options, as_of));
        assert_eq!(recompiled["body"]["summaries_created"], 0);
        assert_eq!(recompiled["body"]["summaries_updated"], 3);

        let acked = triage::run(options, TriageAction::Ack, &signal_id);
        assert_eq!(acked.exit_code, 0, "triage output: {}", acked.output);
        assert_eq!(parse_payload(&acked)["body"]["status"], "acknowledged");

        let again = parse_payload(&triage::run(options, TriageAction::Ack, &signal_id));
        assert_eq!(again["body"]["change"], "unchanged");

        assert_eq!(triage::run(options, TriageAction::Dismiss, &signal_id).exit_code, 0);
        let rejected = triage::run(options, TriageAction::Route, &signal_id);
        assert_eq!(rejected.exit_code, 9);
        assert_eq!(parse_payload(&rejected)["error_class"], "invalid_transition");
    });
}

#[test]
fn unknown_investor_is_a_not_found_failure() {
    with_database(|options| {
        seed::run(options);

        let result = opportunities::run(options, "inv-missing", OpportunityOptions::default());

        assert_eq!(result.exit_code, 8);
        let payload = parse_payload(&result);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "investor_not_found");
    });
}

#[test]
fn triage_of_unknown_signal_is_a_not_found_failure() {
    with_database(|options| {
        let result = triage::run(options, TriageAction::Dismiss, "sig_missing");

        assert_eq!(result.exit_code, 8);
        assert_eq!(parse_payload(&result)["error_class"], "signal_not_found");
    });
}

#[test]
fn invalid_configuration_fails_before_touching_the_database() {
    with_env(&[("BRICKWISE_PIPELINE_QUERY_TIMEOUT_SECS", "0")], || {
        let dir = TempDir::new().expect("temp dir");
        let options = options_for(dir.path());

        let result = signals::run(&options);

        assert_eq!(result.exit_code, 2, "expected config validation failure code");
        let payload = parse_payload(&result);
        assert_eq!(payload["command"], "signals");
        assert_eq!(payload["error_class"], "config_validation");
        assert!(!dir.path().join("brickwise.db").exists());
    });
}

#[test]
fn blank_tenant_is_rejected() {
    with_database(|options| {
        let options = GlobalOptions { tenant: Some("  ".to_string()), ..options.clone() };

        let result = summaries::run(&options, None);

        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result)["error_class"], "config_validation");
    });
}

fn parse_payload(result: &CommandResult) -> Value {
    serde_json::from_str(&result.output).expect("command output should be valid JSON")
}

fn options_for(dir: &Path) -> GlobalOptions {
    GlobalOptions {
        tenant: None,
        database_url: Some(format!("sqlite://{}?mode=rwc", dir.join("brickwise.db").display())),
    }
}

fn with_database(test_fn: impl FnOnce(&GlobalOptions)) {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let options = options_for(dir.path());
        test_fn(&options);
    });
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "BRICKWISE_DATABASE_URL",
        "BRICKWISE_DATABASE_MAX_CONNECTIONS",
        "BRICKWISE_DATABASE_TIMEOUT_SECS",
        "BRICKWISE_PIPELINE_DEFAULT_TENANT",
        "BRICKWISE_PIPELINE_QUERY_TIMEOUT_SECS",
        "BRICKWISE_PIPELINE_DEFAULT_OPPORTUNITY_LIMIT",
        "BRICKWISE_PIPELINE_MAX_SUMMARY_CHARS",
        "BRICKWISE_SIGNALS_TREND_THRESHOLD",
        "BRICKWISE_SIGNALS_WATCH_THRESHOLD",
        "BRICKWISE_SIGNALS_URGENT_THRESHOLD",
        "BRICKWISE_SIGNALS_FULL_CONFIDENCE_SAMPLES",
        "BRICKWISE_TRUST_MIN_TRUST_SCORE",
        "BRICKWISE_TRUST_REQUIRE_VERIFICATION",
        "BRICKWISE_LOGGING_LEVEL",
        "BRICKWISE_LOGGING_FORMAT",
        "BRICKWISE_LOG_LEVEL",
        "BRICKWISE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
