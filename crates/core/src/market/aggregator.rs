use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::market::{MetricKind, MetricSnapshot};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub value: f64,
    pub sample_size: u32,
    pub window_end: NaiveDate,
}

impl MetricReading {
    fn from_snapshot(snapshot: &MetricSnapshot) -> Self {
        Self {
            value: snapshot.value,
            sample_size: snapshot.sample_size,
            window_end: snapshot.window_end,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentKey {
    pub geo_id: String,
    pub segment: String,
}

impl SegmentKey {
    pub fn new(geo_id: impl Into<String>, segment: impl Into<String>) -> Self {
        Self { geo_id: geo_id.into(), segment: segment.into() }
    }
}

/// Latest official metrics for one (geo, segment). Missing metrics stay `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetrics {
    pub geo_id: String,
    pub geo_name: String,
    pub segment: String,
    pub median_price: Option<MetricReading>,
    pub median_price_psf: Option<MetricReading>,
    pub median_rent_annual: Option<MetricReading>,
    pub gross_yield: Option<MetricReading>,
}

impl SegmentMetrics {
    fn empty(snapshot: &MetricSnapshot) -> Self {
        Self {
            geo_id: snapshot.geo_id.clone(),
            geo_name: snapshot.geo_name.clone(),
            segment: snapshot.segment.clone(),
            median_price: None,
            median_price_psf: None,
            median_rent_annual: None,
            gross_yield: None,
        }
    }

    pub fn key(&self) -> SegmentKey {
        SegmentKey::new(&self.geo_id, &self.segment)
    }

    fn slot(&mut self, metric: MetricKind) -> Option<&mut Option<MetricReading>> {
        match metric {
            MetricKind::MedianPrice => Some(&mut self.median_price),
            MetricKind::MedianPricePsf => Some(&mut self.median_price_psf),
            MetricKind::MedianRentAnnual => Some(&mut self.median_rent_annual),
            MetricKind::GrossYield => Some(&mut self.gross_yield),
            MetricKind::ActiveListings
            | MetricKind::PriceCutsCount
            | MetricKind::StaleListingsCount => None,
        }
    }
}

/// Current reading of one metric plus the latest strictly earlier reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricTrend {
    pub geo_id: String,
    pub geo_name: String,
    pub segment: String,
    pub metric: MetricKind,
    pub current: MetricReading,
    pub prior: Option<MetricReading>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MetricAggregator;

impl MetricAggregator {
    pub fn new() -> Self {
        Self
    }

    /// One merged record per (geo, segment), keeping the latest value of each
    /// metric. Ties on `window_end` keep the first row seen.
    pub fn aggregate(&self, snapshots: &[MetricSnapshot]) -> Vec<SegmentMetrics> {
        let mut merged: BTreeMap<SegmentKey, SegmentMetrics> = BTreeMap::new();

        for snapshot in latest_first(snapshots) {
            let entry = merged
                .entry(SegmentKey::new(&snapshot.geo_id, &snapshot.segment))
                .or_insert_with(|| SegmentMetrics::empty(snapshot));
            if let Some(slot) = entry.slot(snapshot.metric) {
                if slot.is_none() {
                    *slot = Some(MetricReading::from_snapshot(snapshot));
                }
            }
        }

        merged.into_values().collect()
    }

    /// Current and prior reading per (geo, segment, metric), official and
    /// portal metrics alike.
    pub fn trends(&self, snapshots: &[MetricSnapshot]) -> Vec<MetricTrend> {
        let mut trends: BTreeMap<(SegmentKey, MetricKind), MetricTrend> = BTreeMap::new();

        for snapshot in latest_first(snapshots) {
            let key = (SegmentKey::new(&snapshot.geo_id, &snapshot.segment), snapshot.metric);
            match trends.get_mut(&key) {
                None => {
                    trends.insert(
                        key,
                        MetricTrend {
                            geo_id: snapshot.geo_id.clone(),
                            geo_name: snapshot.geo_name.clone(),
                            segment: snapshot.segment.clone(),
                            metric: snapshot.metric,
                            current: MetricReading::from_snapshot(snapshot),
                            prior: None,
                        },
                    );
                }
                Some(trend) => {
                    if trend.prior.is_none() && snapshot.window_end < trend.current.window_end {
                        trend.prior = Some(MetricReading::from_snapshot(snapshot));
                    }
                }
            }
        }

        trends.into_values().collect()
    }
}

/// Finite rows sorted by `window_end` descending; the sort is stable so input
/// order decides ties.
fn latest_first(snapshots: &[MetricSnapshot]) -> Vec<&MetricSnapshot> {
    let mut ordered: Vec<&MetricSnapshot> =
        snapshots.iter().filter(|snapshot| snapshot.value.is_finite()).collect();
    ordered.sort_by(|a, b| b.window_end.cmp(&a.window_end));
    ordered
}
