use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::market::detector::SignalDetectorConfig;
use crate::market::summary::DEFAULT_MAX_SUMMARY_CHARS;
use crate::scoring::counterfactual::TrustPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub pipeline: PipelineConfig,
    pub signals: SignalsConfig,
    pub trust: TrustConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub default_tenant: String,
    pub query_timeout_secs: u64,
    pub default_opportunity_limit: usize,
    pub max_summary_chars: usize,
}

#[derive(Clone, Debug)]
pub struct SignalsConfig {
    pub trend_threshold: f64,
    pub watch_threshold: f64,
    pub urgent_threshold: f64,
    pub full_confidence_samples: u32,
}

#[derive(Clone, Debug)]
pub struct TrustConfig {
    pub min_trust_score: f64,
    pub require_verification: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub default_tenant: Option<String>,
    pub query_timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        let detector = SignalDetectorConfig::default();
        let trust = TrustPolicy::default();
        Self {
            database: DatabaseConfig {
                url: "sqlite://brickwise.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            pipeline: PipelineConfig {
                default_tenant: "org-demo".to_string(),
                query_timeout_secs: 10,
                default_opportunity_limit: 50,
                max_summary_chars: DEFAULT_MAX_SUMMARY_CHARS,
            },
            signals: SignalsConfig {
                trend_threshold: detector.trend_threshold,
                watch_threshold: detector.watch_threshold,
                urgent_threshold: detector.urgent_threshold,
                full_confidence_samples: detector.full_confidence_samples,
            },
            trust: TrustConfig {
                min_trust_score: trust.min_trust_score,
                require_verification: trust.require_verification,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("brickwise.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.query_timeout_secs)
    }

    pub fn detector_config(&self) -> SignalDetectorConfig {
        SignalDetectorConfig {
            trend_threshold: self.signals.trend_threshold,
            watch_threshold: self.signals.watch_threshold,
            urgent_threshold: self.signals.urgent_threshold,
            full_confidence_samples: self.signals.full_confidence_samples,
        }
    }

    pub fn trust_policy(&self) -> TrustPolicy {
        TrustPolicy {
            min_trust_score: self.trust.min_trust_score,
            require_verification: self.trust.require_verification,
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(pipeline) = patch.pipeline {
            if let Some(default_tenant) = pipeline.default_tenant {
                self.pipeline.default_tenant = default_tenant;
            }
            if let Some(query_timeout_secs) = pipeline.query_timeout_secs {
                self.pipeline.query_timeout_secs = query_timeout_secs;
            }
            if let Some(limit) = pipeline.default_opportunity_limit {
                self.pipeline.default_opportunity_limit = limit;
            }
            if let Some(max_summary_chars) = pipeline.max_summary_chars {
                self.pipeline.max_summary_chars = max_summary_chars;
            }
        }

        if let Some(signals) = patch.signals {
            if let Some(trend_threshold) = signals.trend_threshold {
                self.signals.trend_threshold = trend_threshold;
            }
            if let Some(watch_threshold) = signals.watch_threshold {
                self.signals.watch_threshold = watch_threshold;
            }
            if let Some(urgent_threshold) = signals.urgent_threshold {
                self.signals.urgent_threshold = urgent_threshold;
            }
            if let Some(samples) = signals.full_confidence_samples {
                self.signals.full_confidence_samples = samples;
            }
        }

        if let Some(trust) = patch.trust {
            if let Some(min_trust_score) = trust.min_trust_score {
                self.trust.min_trust_score = min_trust_score;
            }
            if let Some(require_verification) = trust.require_verification {
                self.trust.require_verification = require_verification;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("BRICKWISE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("BRICKWISE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("BRICKWISE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("BRICKWISE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("BRICKWISE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("BRICKWISE_PIPELINE_DEFAULT_TENANT") {
            self.pipeline.default_tenant = value;
        }
        if let Some(value) = read_env("BRICKWISE_PIPELINE_QUERY_TIMEOUT_SECS") {
            self.pipeline.query_timeout_secs =
                parse_u64("BRICKWISE_PIPELINE_QUERY_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("BRICKWISE_PIPELINE_DEFAULT_OPPORTUNITY_LIMIT") {
            self.pipeline.default_opportunity_limit =
                parse_usize("BRICKWISE_PIPELINE_DEFAULT_OPPORTUNITY_LIMIT", &value)?;
        }
        if let Some(value) = read_env("BRICKWISE_PIPELINE_MAX_SUMMARY_CHARS") {
            self.pipeline.max_summary_chars =
                parse_usize("BRICKWISE_PIPELINE_MAX_SUMMARY_CHARS", &value)?;
        }

        if let Some(value) = read_env("BRICKWISE_SIGNALS_TREND_THRESHOLD") {
            self.signals.trend_threshold = parse_f64("BRICKWISE_SIGNALS_TREND_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("BRICKWISE_SIGNALS_WATCH_THRESHOLD") {
            self.signals.watch_threshold = parse_f64("BRICKWISE_SIGNALS_WATCH_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("BRICKWISE_SIGNALS_URGENT_THRESHOLD") {
            self.signals.urgent_threshold =
                parse_f64("BRICKWISE_SIGNALS_URGENT_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("BRICKWISE_SIGNALS_FULL_CONFIDENCE_SAMPLES") {
            self.signals.full_confidence_samples =
                parse_u32("BRICKWISE_SIGNALS_FULL_CONFIDENCE_SAMPLES", &value)?;
        }

        if let Some(value) = read_env("BRICKWISE_TRUST_MIN_TRUST_SCORE") {
            self.trust.min_trust_score = parse_f64("BRICKWISE_TRUST_MIN_TRUST_SCORE", &value)?;
        }
        if let Some(value) = read_env("BRICKWISE_TRUST_REQUIRE_VERIFICATION") {
            self.trust.require_verification =
                parse_bool("BRICKWISE_TRUST_REQUIRE_VERIFICATION", &value)?;
        }

        let log_level =
            read_env("BRICKWISE_LOGGING_LEVEL").or_else(|| read_env("BRICKWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("BRICKWISE_LOGGING_FORMAT").or_else(|| read_env("BRICKWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(default_tenant) = overrides.default_tenant {
            self.pipeline.default_tenant = default_tenant;
        }
        if let Some(query_timeout_secs) = overrides.query_timeout_secs {
            self.pipeline.query_timeout_secs = query_timeout_secs;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_pipeline(&self.pipeline)?;
        validate_signals(&self.signals)?;
        validate_trust(&self.trust)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("brickwise.toml"), PathBuf::from("config/brickwise.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ConfigError> {
    if pipeline.default_tenant.trim().is_empty() {
        return Err(ConfigError::Validation(
            "pipeline.default_tenant must not be empty".to_string(),
        ));
    }

    if pipeline.query_timeout_secs == 0 || pipeline.query_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "pipeline.query_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !(1..=200).contains(&pipeline.default_opportunity_limit) {
        return Err(ConfigError::Validation(
            "pipeline.default_opportunity_limit must be in range 1..=200".to_string(),
        ));
    }

    if pipeline.max_summary_chars < 80 || pipeline.max_summary_chars > 4_000 {
        return Err(ConfigError::Validation(
            "pipeline.max_summary_chars must be in range 80..=4000".to_string(),
        ));
    }

    Ok(())
}

fn validate_signals(signals: &SignalsConfig) -> Result<(), ConfigError> {
    let thresholds = [signals.trend_threshold, signals.watch_threshold, signals.urgent_threshold];
    if thresholds.iter().any(|value| !value.is_finite() || *value <= 0.0) {
        return Err(ConfigError::Validation(
            "signals thresholds must be positive finite numbers".to_string(),
        ));
    }

    if !(signals.trend_threshold <= signals.watch_threshold
        && signals.watch_threshold <= signals.urgent_threshold)
    {
        return Err(ConfigError::Validation(
            "signals thresholds must satisfy trend <= watch <= urgent".to_string(),
        ));
    }

    if signals.full_confidence_samples == 0 {
        return Err(ConfigError::Validation(
            "signals.full_confidence_samples must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_trust(trust: &TrustConfig) -> Result<(), ConfigError> {
    if !(0.0..=100.0).contains(&trust.min_trust_score) {
        return Err(ConfigError::Validation(
            "trust.min_trust_score must be in range 0..=100".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| invalid(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    pipeline: Option<PipelinePatch>,
    signals: Option<SignalsPatch>,
    trust: Option<TrustPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PipelinePatch {
    default_tenant: Option<String>,
    query_timeout_secs: Option<u64>,
    default_opportunity_limit: Option<usize>,
    max_summary_chars: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct SignalsPatch {
    trend_threshold: Option<f64>,
    watch_threshold: Option<f64>,
    urgent_threshold: Option<f64>,
    full_confidence_samples: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct TrustPatch {
    min_trust_score: Option<f64>,
    require_verification: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_validate() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.pipeline.query_timeout_secs == 10, "query timeout should default to 10s")?;
        ensure(config.pipeline.max_summary_chars == 480, "summary bound should default to 480")?;
        ensure(config.trust.min_trust_score == 60.0, "trust minimum should default to 60")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_BRICKWISE_DB_PATH", "/tmp/brickwise-from-env.db");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("brickwise.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://${TEST_BRICKWISE_DB_PATH}"

[signals]
urgent_threshold = 0.3
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite:///tmp/brickwise-from-env.db",
                "database url should be interpolated from environment",
            )?;
            ensure(
                config.detector_config().urgent_threshold == 0.3,
                "urgent threshold should be read from file",
            )?;
            Ok(())
        })();

        clear_vars(&["TEST_BRICKWISE_DB_PATH"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BRICKWISE_LOG_LEVEL", "warn");
        env::set_var("BRICKWISE_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["BRICKWISE_LOG_LEVEL", "BRICKWISE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BRICKWISE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("BRICKWISE_PIPELINE_QUERY_TIMEOUT_SECS", "20");
        env::set_var("BRICKWISE_TRUST_REQUIRE_VERIFICATION", "false");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("brickwise.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[pipeline]
query_timeout_secs = 15
default_tenant = "org-file"

[trust]
min_trust_score = 70.0

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.pipeline.query_timeout_secs == 20, "env timeout should win over file")?;
            ensure(config.pipeline.default_tenant == "org-file", "file tenant should win over default")?;
            ensure(config.trust.min_trust_score == 70.0, "file trust minimum should apply")?;
            ensure(!config.trust.require_verification, "env verification flag should apply")?;
            Ok(())
        })();

        clear_vars(&[
            "BRICKWISE_DATABASE_URL",
            "BRICKWISE_PIPELINE_QUERY_TIMEOUT_SECS",
            "BRICKWISE_TRUST_REQUIRE_VERIFICATION",
        ]);
        result
    }

    #[test]
    fn non_monotonic_thresholds_are_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BRICKWISE_SIGNALS_WATCH_THRESHOLD", "0.5");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("trend <= watch <= urgent")
            );
            ensure(has_message, "validation failure should mention threshold ordering")
        })();

        clear_vars(&["BRICKWISE_SIGNALS_WATCH_THRESHOLD"]);
        result
    }

    #[test]
    fn unparseable_env_override_names_the_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("BRICKWISE_DATABASE_MAX_CONNECTIONS", "many");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected env override failure".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::InvalidEnvOverride { ref key, .. }
                        if key == "BRICKWISE_DATABASE_MAX_CONNECTIONS"
                ),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["BRICKWISE_DATABASE_MAX_CONNECTIONS"]);
        result
    }
}
