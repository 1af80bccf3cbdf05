//! Batch and query entry points. Each service is built once with its stores and
//! settings; a run reads through [`lookup`] so one slow or failing source only
//! empties its own contribution and lands in the run's `errors`.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::AppConfig;
use crate::domain::opportunity::DEFAULT_OPPORTUNITY_LIMIT;
use crate::errors::StoreError;
use crate::market::detector::SignalDetectorConfig;
use crate::market::summary::DEFAULT_MAX_SUMMARY_CHARS;
use crate::scoring::counterfactual::TrustPolicy;

pub mod opportunities;
pub mod signals;
pub mod summaries;

#[cfg(test)]
pub(crate) mod fixtures;

pub use opportunities::{CounterfactualResult, OpportunityResult, OpportunityService};
pub use signals::{SignalTriage, SignalsPipeline, SignalsRunResult, TriageOutcome};
pub use summaries::{SummaryPipeline, SummaryRunResult};

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub query_timeout: Duration,
    pub default_opportunity_limit: usize,
    pub max_summary_chars: usize,
    pub detector: SignalDetectorConfig,
    pub trust: TrustPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(10),
            default_opportunity_limit: DEFAULT_OPPORTUNITY_LIMIT,
            max_summary_chars: DEFAULT_MAX_SUMMARY_CHARS,
            detector: SignalDetectorConfig::default(),
            trust: TrustPolicy::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            query_timeout: config.query_timeout(),
            default_opportunity_limit: config.pipeline.default_opportunity_limit,
            max_summary_chars: config.pipeline.max_summary_chars,
            detector: config.detector_config(),
            trust: config.trust_policy(),
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }
}

/// Awaits one store call under the query timeout. The error is already
/// rendered for a run's `errors` list.
pub(crate) async fn lookup<T, F>(source: &'static str, timeout: Duration, call: F) -> Result<T, String>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(format!("{source}: {error}")),
        Err(_) => Err(format!("{source}: timed out after {}ms", timeout.as_millis())),
    }
}

/// Unwraps a lookup, recording the failure and falling back to the empty value.
pub(crate) fn or_default<T: Default>(
    result: Result<T, String>,
    run_id: &str,
    errors: &mut Vec<String>,
) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            warn!(
                event_name = "pipeline.lookup.degraded",
                correlation_id = %run_id,
                error = %error,
                "source lookup failed; continuing with empty input"
            );
            errors.push(error);
            T::default()
        }
    }
}
