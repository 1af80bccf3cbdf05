pub mod commands;

use std::process::ExitCode;

use anyhow::anyhow;
use brickwise_core::config::{AppConfig, LogFormat};
use brickwise_core::domain::opportunity::OpportunityOptions;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use crate::commands::triage::TriageAction;
use crate::commands::{CommandResult, GlobalOptions};

#[derive(Debug, Parser)]
#[command(
    name = "brickwise",
    about = "Brickwise market signal and opportunity engine",
    long_about = "Detect market signals, route them to investor mandates, rank opportunities and compile area summaries.",
    after_help = "Examples:\n  brickwise seed\n  brickwise signals\n  brickwise opportunities --investor inv-demo-1 --limit 10\n  brickwise triage ack sig_0123abcd"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Tenant to operate on (defaults to pipeline.default_tenant)")]
    tenant: Option<String>,
    #[arg(long, global = true, help = "Override the configured database URL")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Load the deterministic demo tenant")]
    Seed,
    #[command(about = "Detect market signals and route them to investor mandates")]
    Signals,
    #[command(about = "Rank opportunities for one investor")]
    Opportunities {
        #[arg(long)]
        investor: String,
        #[arg(long, help = "Maximum items returned (1..=200)")]
        limit: Option<usize>,
        #[arg(long, help = "Include listings the investor already holds")]
        include_owned: bool,
    },
    #[command(about = "Split candidates into recommended listings and near misses")]
    Counterfactuals {
        #[arg(long)]
        investor: String,
    },
    #[command(about = "Compile per-community market summaries")]
    Summaries {
        #[arg(long, value_name = "YYYY-MM-DD", help = "Summary date (defaults to today, UTC)")]
        as_of: Option<NaiveDate>,
    },
    #[command(about = "Acknowledge, dismiss or route a signal")]
    Triage {
        #[arg(value_enum)]
        action: TriageAction,
        signal_id: String,
    },
    #[command(about = "Validate config, database connectivity and schema state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = GlobalOptions { tenant: cli.tenant, database_url: cli.database_url };

    if let Ok(config) = options.load_config() {
        if let Err(error) = init_logging(&config) {
            eprintln!("logging disabled: {error}");
        }
    }

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(&options),
        Command::Seed => commands::seed::run(&options),
        Command::Signals => commands::signals::run(&options),
        Command::Opportunities { investor, limit, include_owned } => {
            commands::opportunities::run(
                &options,
                &investor,
                OpportunityOptions { include_owned, limit },
            )
        }
        Command::Counterfactuals { investor } => {
            commands::opportunities::run_counterfactuals(&options, &investor)
        }
        Command::Summaries { as_of } => commands::summaries::run(&options, as_of),
        Command::Triage { action, signal_id } => {
            commands::triage::run(&options, action, &signal_id)
        }
        Command::Doctor { json } => {
            let report = commands::doctor::run(&options, json);
            CommandResult { exit_code: u8::from(!report.healthy), output: report.output }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Events go to stderr so stdout carries only the command payload.
pub fn init_logging(config: &AppConfig) -> anyhow::Result<()> {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    let installed = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow!("failed to install tracing subscriber: {error}"))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};
    use crate::commands::triage::TriageAction;

    #[test]
    fn parses_opportunity_flags_and_global_tenant() {
        let cli = Cli::try_parse_from([
            "brickwise",
            "opportunities",
            "--investor",
            "inv-demo-1",
            "--limit",
            "5",
            "--include-owned",
            "--tenant",
            "org-7",
        ])
        .expect("valid arguments");

        assert_eq!(cli.tenant.as_deref(), Some("org-7"));
        match cli.command {
            Command::Opportunities { investor, limit, include_owned } => {
                assert_eq!(investor, "inv-demo-1");
                assert_eq!(limit, Some(5));
                assert!(include_owned);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_triage_action_aliases() {
        let cli = Cli::try_parse_from(["brickwise", "triage", "acknowledge", "sig_1"])
            .expect("valid arguments");

        match cli.command {
            Command::Triage { action, signal_id } => {
                assert_eq!(action, TriageAction::Ack);
                assert_eq!(signal_id, "sig_1");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_as_of_date() {
        assert!(Cli::try_parse_from(["brickwise", "summaries", "--as-of", "01/10/2026"]).is_err());
    }
}
