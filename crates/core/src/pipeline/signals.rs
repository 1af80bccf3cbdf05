use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::ids::{ListingId, SignalId, TenantId};
use crate::domain::listing::Listing;
use crate::domain::market::{MarketSignal, MetricSnapshot, SignalStatus, SourceType, StatusChange};
use crate::errors::{StoreError, TriageError};
use crate::geo::GeoNormalizer;
use crate::market::aggregator::MetricAggregator;
use crate::market::detector::SignalDetector;
use crate::market::targeting::SignalRouter;
use crate::store::{CrmStore, MarketStore};

use super::{lookup, or_default, PipelineSettings};

/// Listings attached to a signal as supporting evidence.
pub const MAX_EVIDENCE_LISTINGS: usize = 5;

/// Statuses only move forward through four states, so a triage call can lose
/// at most three races before the transition settles.
const TRIAGE_ATTEMPTS: usize = 4;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalsRunResult {
    pub run_id: String,
    pub success: bool,
    pub truth_created: usize,
    pub portal_created: usize,
    pub mappings_created: usize,
    pub errors: Vec<String>,
}

pub struct SignalsPipeline {
    market: Arc<dyn MarketStore>,
    crm: Arc<dyn CrmStore>,
    settings: PipelineSettings,
    aggregator: MetricAggregator,
    detector: SignalDetector,
    router: SignalRouter,
    normalizer: GeoNormalizer,
}

impl SignalsPipeline {
    pub fn new(
        market: Arc<dyn MarketStore>,
        crm: Arc<dyn CrmStore>,
        settings: PipelineSettings,
    ) -> Self {
        let detector = SignalDetector::new(settings.detector.clone());
        Self {
            market,
            crm,
            settings,
            aggregator: MetricAggregator::new(),
            detector,
            router: SignalRouter::default(),
            normalizer: GeoNormalizer::default(),
        }
    }

    /// Detects official and portal signals for one tenant, stores the new ones
    /// and maps them onto investor mandates. Never fails; partial failures are
    /// listed in `errors`.
    pub async fn run(&self, tenant_id: &TenantId) -> SignalsRunResult {
        let run_id = Uuid::new_v4().to_string();
        let timeout = self.settings.query_timeout;
        info!(
            event_name = "pipeline.signals.start",
            correlation_id = %run_id,
            tenant_id = %tenant_id,
            "signals pipeline started"
        );

        let (metrics, portal, investors, listings) = tokio::join!(
            lookup("metric_snapshots", timeout, self.market.metric_snapshots(tenant_id)),
            lookup("portal_snapshots", timeout, self.market.portal_snapshots(tenant_id)),
            lookup("investors", timeout, self.crm.list_investors(tenant_id)),
            lookup("listings", timeout, self.crm.listings(tenant_id)),
        );

        let mut errors = Vec::new();
        let metrics = or_default(metrics, &run_id, &mut errors);
        let portal = or_default(portal, &run_id, &mut errors);
        let investors = or_default(investors, &run_id, &mut errors);
        let listings = or_default(listings, &run_id, &mut errors);

        let mut rows: Vec<MetricSnapshot> = metrics;
        rows.extend(portal.iter().flat_map(|snapshot| snapshot.to_metric_snapshots()));
        let trends = self.aggregator.trends(&rows);
        let mut detected = self.detector.detect(tenant_id, &trends, Utc::now());
        self.attach_evidence(&mut detected, &listings);

        let (truth, portal_signals): (Vec<MarketSignal>, Vec<MarketSignal>) = detected
            .into_iter()
            .partition(|signal| signal.source_type == SourceType::Official);

        let mut routable = Vec::with_capacity(truth.len() + portal_signals.len());
        let truth_created = self
            .store_signals("insert_truth_signals", truth, timeout, &mut routable, &mut errors)
            .await;
        let portal_created = self
            .store_signals(
                "insert_portal_signals",
                portal_signals,
                timeout,
                &mut routable,
                &mut errors,
            )
            .await;

        let targets = self.router.route(tenant_id, &routable, &investors);
        let mappings_created = if targets.is_empty() {
            0
        } else {
            let upserted =
                lookup("signal_targets", timeout, self.market.upsert_signal_targets(&targets)).await;
            or_default(upserted, &run_id, &mut errors)
        };

        let result = SignalsRunResult {
            success: errors.is_empty(),
            run_id,
            truth_created,
            portal_created,
            mappings_created,
            errors,
        };

        info!(
            event_name = "pipeline.signals.complete",
            correlation_id = %result.run_id,
            tenant_id = %tenant_id,
            truth_created = result.truth_created,
            portal_created = result.portal_created,
            mappings_created = result.mappings_created,
            error_count = result.errors.len(),
            "signals pipeline finished"
        );

        result
    }

    async fn store_signals(
        &self,
        source: &'static str,
        signals: Vec<MarketSignal>,
        timeout: Duration,
        routable: &mut Vec<MarketSignal>,
        errors: &mut Vec<String>,
    ) -> usize {
        if signals.is_empty() {
            return 0;
        }
        match lookup(source, timeout, self.market.insert_signals(&signals)).await {
            Ok(created) => {
                routable.extend(signals);
                created
            }
            Err(error) => {
                warn!(event_name = "pipeline.signals.insert_failed", error = %error, "signal insert failed");
                errors.push(error);
                0
            }
        }
    }

    /// Available listings of the signal's segment inside its geo, by id.
    fn attach_evidence(&self, signals: &mut [MarketSignal], listings: &[Listing]) {
        let mut candidates: Vec<&Listing> =
            listings.iter().filter(|listing| listing.is_available()).collect();
        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        for signal in signals {
            signal.evidence_listing_ids = candidates
                .iter()
                .filter(|listing| {
                    self.normalizer.matches(&listing.area, &signal.geo_name)
                        && self.normalizer.matches(&listing.property_type, &signal.segment)
                })
                .take(MAX_EVIDENCE_LISTINGS)
                .map(|listing| listing.id.clone())
                .collect::<Vec<ListingId>>();
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageOutcome {
    pub signal_id: SignalId,
    pub previous: SignalStatus,
    pub status: SignalStatus,
    pub change: StatusChange,
}

/// Status changes requested by a human reviewer.
pub struct SignalTriage {
    market: Arc<dyn MarketStore>,
}

impl SignalTriage {
    pub fn new(market: Arc<dyn MarketStore>) -> Self {
        Self { market }
    }

    pub async fn acknowledge(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
    ) -> Result<TriageOutcome, TriageError> {
        self.apply(tenant_id, signal_id, SignalStatus::Acknowledged).await
    }

    pub async fn dismiss(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
    ) -> Result<TriageOutcome, TriageError> {
        self.apply(tenant_id, signal_id, SignalStatus::Dismissed).await
    }

    pub async fn route(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
    ) -> Result<TriageOutcome, TriageError> {
        self.apply(tenant_id, signal_id, SignalStatus::Routed).await
    }

    /// Re-applying the current status writes nothing. The write is
    /// conditional on the status read; if another writer got there first the
    /// transition is re-evaluated against the fresh status.
    pub async fn apply(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
        status: SignalStatus,
    ) -> Result<TriageOutcome, TriageError> {
        let not_found = || TriageError::SignalNotFound {
            tenant_id: tenant_id.clone(),
            signal_id: signal_id.clone(),
        };

        for _ in 0..TRIAGE_ATTEMPTS {
            let signal =
                self.market.find_signal(tenant_id, signal_id).await?.ok_or_else(not_found)?;
            let change = signal.status.transition(status)?;
            let outcome =
                TriageOutcome { signal_id: signal_id.clone(), previous: signal.status, status, change };

            if change == StatusChange::Unchanged {
                return Ok(outcome);
            }

            let written = self
                .market
                .update_signal_status(tenant_id, signal_id, signal.status, status, Utc::now())
                .await?;
            if written {
                info!(
                    event_name = "signal.triage.applied",
                    tenant_id = %tenant_id,
                    signal_id = %signal_id,
                    from = signal.status.as_str(),
                    to = status.as_str(),
                    "signal status changed"
                );
                return Ok(outcome);
            }

            debug!(
                event_name = "signal.triage.conflict",
                tenant_id = %tenant_id,
                signal_id = %signal_id,
                expected = signal.status.as_str(),
                "signal status changed concurrently, re-evaluating"
            );
        }

        Err(TriageError::Store(StoreError::Unavailable(format!(
            "signal `{signal_id}` kept changing status during triage"
        ))))
    }
}
