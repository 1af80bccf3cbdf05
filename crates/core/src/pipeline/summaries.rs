use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::domain::ids::TenantId;
use crate::market::detector::SignalDetector;
use crate::market::summary::SummaryCompiler;
use crate::store::MarketStore;

use super::{lookup, or_default, PipelineSettings};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRunResult {
    pub run_id: String,
    pub success: bool,
    pub summaries_created: usize,
    pub summaries_updated: usize,
    pub errors: Vec<String>,
}

pub struct SummaryPipeline {
    market: Arc<dyn MarketStore>,
    settings: PipelineSettings,
    compiler: SummaryCompiler,
}

impl SummaryPipeline {
    pub fn new(market: Arc<dyn MarketStore>, settings: PipelineSettings) -> Self {
        let compiler = SummaryCompiler::new(
            settings.max_summary_chars,
            SignalDetector::new(settings.detector.clone()),
        );
        Self { market, settings, compiler }
    }

    /// Rebuilds the per-segment summaries as of `as_of` and upserts them on
    /// (tenant, geo, segment, date).
    pub async fn run(&self, tenant_id: &TenantId, as_of: NaiveDate) -> SummaryRunResult {
        let run_id = Uuid::new_v4().to_string();
        let timeout = self.settings.query_timeout;
        info!(
            event_name = "pipeline.summaries.start",
            correlation_id = %run_id,
            tenant_id = %tenant_id,
            as_of = %as_of,
            "summary pipeline started"
        );

        let (metrics, portal) = tokio::join!(
            lookup("metric_snapshots", timeout, self.market.metric_snapshots(tenant_id)),
            lookup("portal_snapshots", timeout, self.market.portal_snapshots(tenant_id)),
        );

        let mut errors = Vec::new();
        let metrics = or_default(metrics, &run_id, &mut errors);
        let portal = or_default(portal, &run_id, &mut errors);

        let summaries = self.compiler.compile(tenant_id, as_of, &metrics, &portal);
        let counts = if summaries.is_empty() {
            Default::default()
        } else {
            let upserted =
                lookup("summaries", timeout, self.market.upsert_summaries(&summaries)).await;
            or_default(upserted, &run_id, &mut errors)
        };

        let result = SummaryRunResult {
            success: errors.is_empty(),
            run_id,
            summaries_created: counts.created,
            summaries_updated: counts.updated,
            errors,
        };

        info!(
            event_name = "pipeline.summaries.complete",
            correlation_id = %result.run_id,
            tenant_id = %tenant_id,
            created = result.summaries_created,
            updated = result.summaries_updated,
            error_count = result.errors.len(),
            "summary pipeline finished"
        );

        result
    }
}
