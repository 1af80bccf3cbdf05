use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{SignalId, TenantId};
use crate::domain::market::{
    GeoType, MarketSignal, MetricKind, Severity, SignalStatus, SignalType,
};
use crate::market::aggregator::MetricTrend;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalDetectorConfig {
    /// Relative move below which a metric is considered stable.
    pub trend_threshold: f64,
    /// `|delta|` at or above which severity becomes watch.
    pub watch_threshold: f64,
    /// `|delta|` above which severity becomes urgent.
    pub urgent_threshold: f64,
    /// Sample size at which confidence reaches 1.0.
    pub full_confidence_samples: u32,
}

impl Default for SignalDetectorConfig {
    fn default() -> Self {
        Self {
            trend_threshold: 0.03,
            watch_threshold: 0.10,
            urgent_threshold: 0.25,
            full_confidence_samples: 100,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

impl TrendDirection {
    pub fn word(&self) -> &'static str {
        match self {
            Self::Rising => "rising",
            Self::Falling => "falling",
            Self::Stable => "stable",
        }
    }
}

/// Relative move between two readings, or `None` when it cannot be computed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrendReading {
    pub direction: TrendDirection,
    pub delta: f64,
}

#[derive(Clone, Debug, Default)]
pub struct SignalDetector {
    config: SignalDetectorConfig,
}

impl SignalDetector {
    pub fn new(config: SignalDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalDetectorConfig {
        &self.config
    }

    /// `(current - prior) / prior`. A zero or non-finite prior yields no trend.
    pub fn classify(&self, current: f64, prior: f64) -> Option<TrendReading> {
        if prior == 0.0 || !prior.is_finite() || !current.is_finite() {
            return None;
        }
        let delta = (current - prior) / prior;
        if !delta.is_finite() {
            return None;
        }

        let direction = if delta > self.config.trend_threshold {
            TrendDirection::Rising
        } else if delta < -self.config.trend_threshold {
            TrendDirection::Falling
        } else {
            TrendDirection::Stable
        };
        Some(TrendReading { direction, delta })
    }

    pub fn trend_of(&self, trend: &MetricTrend) -> Option<TrendReading> {
        let prior = trend.prior.as_ref()?;
        self.classify(trend.current.value, prior.value)
    }

    pub fn severity(&self, delta: f64) -> Severity {
        let magnitude = delta.abs();
        if magnitude > self.config.urgent_threshold {
            Severity::Urgent
        } else if magnitude >= self.config.watch_threshold {
            Severity::Watch
        } else {
            Severity::Info
        }
    }

    /// Grows with the square root of the sample size and caps at 1.0.
    pub fn confidence(&self, sample_size: u32) -> f64 {
        let full = f64::from(self.config.full_confidence_samples.max(1));
        let ratio = (f64::from(sample_size) / full).sqrt().min(1.0);
        round2(ratio)
    }

    pub fn signal_type(metric: MetricKind, direction: TrendDirection) -> Option<SignalType> {
        use TrendDirection::{Falling, Rising, Stable};

        match (metric, direction) {
            (_, Stable) => None,
            (MetricKind::MedianPrice | MetricKind::MedianPricePsf, _) => {
                Some(SignalType::PriceChange)
            }
            (MetricKind::MedianRentAnnual, _) => Some(SignalType::RentChange),
            (MetricKind::GrossYield, Rising) => Some(SignalType::YieldOpportunity),
            (MetricKind::GrossYield, Falling) => Some(SignalType::YieldCompression),
            (MetricKind::ActiveListings, Rising) => Some(SignalType::SupplySpike),
            (MetricKind::PriceCutsCount, Rising) => Some(SignalType::DiscountingSpike),
            (MetricKind::StaleListingsCount, Rising) => Some(SignalType::StalenessRise),
            (
                MetricKind::ActiveListings
                | MetricKind::PriceCutsCount
                | MetricKind::StaleListingsCount,
                Falling,
            ) => None,
        }
    }

    pub fn detect_one(
        &self,
        tenant_id: &TenantId,
        trend: &MetricTrend,
        detected_at: DateTime<Utc>,
    ) -> Option<MarketSignal> {
        let prior = trend.prior.as_ref()?;
        let reading = self.trend_of(trend)?;
        let signal_type = Self::signal_type(trend.metric, reading.direction)?;

        Some(MarketSignal {
            id: signal_id(
                tenant_id,
                signal_type,
                &trend.geo_id,
                &trend.segment,
                trend.metric,
                trend.current.window_end,
            ),
            tenant_id: tenant_id.clone(),
            created_at: detected_at,
            updated_at: detected_at,
            source_type: trend.metric.source_type(),
            signal_type,
            severity: self.severity(reading.delta),
            status: SignalStatus::New,
            geo_type: GeoType::Community,
            geo_id: trend.geo_id.clone(),
            geo_name: trend.geo_name.clone(),
            segment: trend.segment.clone(),
            metric: trend.metric,
            current_value: trend.current.value,
            prev_value: Some(prior.value),
            delta_value: Some(trend.current.value - prior.value),
            delta_pct: Some(round2(reading.delta * 100.0)),
            confidence_score: self.confidence(trend.current.sample_size),
            window_end: trend.current.window_end,
            evidence_listing_ids: Vec::new(),
        })
    }

    pub fn detect(
        &self,
        tenant_id: &TenantId,
        trends: &[MetricTrend],
        detected_at: DateTime<Utc>,
    ) -> Vec<MarketSignal> {
        trends.iter().filter_map(|trend| self.detect_one(tenant_id, trend, detected_at)).collect()
    }
}

/// Stable id for the natural key of a signal so that re-running detection over
/// the same window produces the same row.
pub fn signal_id(
    tenant_id: &TenantId,
    signal_type: SignalType,
    geo_id: &str,
    segment: &str,
    metric: MetricKind,
    window_end: NaiveDate,
) -> SignalId {
    let mut hasher = blake3::Hasher::new();
    for part in [
        tenant_id.as_str(),
        signal_type.as_str(),
        geo_id,
        segment,
        metric.as_str(),
        &window_end.to_string(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update(b"\x1f");
    }
    let digest = hasher.finalize().to_hex();
    SignalId(format!("sig_{}", &digest.as_str()[..24]))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
