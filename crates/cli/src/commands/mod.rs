pub mod doctor;
pub mod migrate;
pub mod opportunities;
pub mod seed;
pub mod signals;
pub mod summaries;
pub mod triage;

use std::future::Future;
use std::sync::Arc;

use brickwise_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use brickwise_core::domain::ids::TenantId;
use brickwise_core::pipeline::PipelineSettings;
use brickwise_core::store::{CrmStore, MarketStore};
use brickwise_db::{
    connect, migrations, DbPool, SqlCrmRepository, SqlMarketRepository,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            body: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Success carrying a result body. A run that finished with degraded
    /// lookups reports `status: "degraded"` and exit code 1.
    pub fn report(
        command: &str,
        message: impl Into<String>,
        body: impl Serialize,
        degraded: bool,
    ) -> Self {
        let body = match serde_json::to_value(body) {
            Ok(body) => body,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 10);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            error_class: None,
            message: message.into(),
            body: Some(body),
        };
        Self { exit_code: u8::from(degraded), output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            body: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub tenant: Option<String>,
    pub database_url: Option<String>,
}

impl GlobalOptions {
    pub fn load_config(&self) -> Result<AppConfig, brickwise_core::config::ConfigError> {
        AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                database_url: self.database_url.clone(),
                default_tenant: self.tenant.clone(),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
    }
}

/// Failure raised inside a command body.
#[derive(Debug)]
pub(crate) struct Failure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl Failure {
    pub fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }
}

/// Migrated database plus the effective configuration for one command.
#[derive(Clone)]
pub(crate) struct Session {
    pub config: AppConfig,
    pub tenant: TenantId,
    pub pool: DbPool,
}

impl Session {
    pub fn market(&self) -> Arc<dyn MarketStore> {
        Arc::new(SqlMarketRepository::new(self.pool.clone()))
    }

    pub fn crm(&self) -> Arc<dyn CrmStore> {
        Arc::new(SqlCrmRepository::new(self.pool.clone()))
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings::from_config(&self.config)
    }
}

/// Loads config, connects, applies pending migrations and runs `action`
/// on a single-threaded runtime. Exit codes: 2 config, 3 runtime, 4 database
/// connectivity, 5 migration; command bodies use 6 and above.
pub(crate) fn execute<F, Fut>(command: &'static str, options: &GlobalOptions, action: F) -> CommandResult
where
    F: FnOnce(Session) -> Fut,
    Fut: Future<Output = Result<CommandResult, Failure>>,
{
    let config = match options.load_config() {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect(&config.database)
            .await
            .map_err(|error| Failure::new("db_connectivity", error.to_string(), 4))?;

        if let Err(error) = migrations::run_pending(&pool).await {
            pool.close().await;
            return Err(Failure::new("migration", error.to_string(), 5));
        }

        let tenant = TenantId::new(config.pipeline.default_tenant.clone());
        let session = Session { config, tenant, pool: pool.clone() };
        let outcome = action(session).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(result) => result,
        Err(failure) => {
            CommandResult::failure(command, failure.error_class, failure.message, failure.exit_code)
        }
    }
}
