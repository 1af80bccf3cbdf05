//! Fixed-template market summaries sized for downstream AI context.
//!
//! Each (geo, segment) gets one row per `as_of_date`. The text is composed from
//! a fixed list of clauses, each appended only when its input exists, and the
//! result never exceeds `max_chars` characters. Nothing time-dependent other
//! than the as-of date enters the text, so recompiling identical input yields
//! identical output.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::ids::TenantId;
use crate::domain::market::{MarketSummary, MetricKind, MetricSnapshot, PortalSnapshot};
use crate::market::aggregator::{MetricAggregator, MetricTrend, SegmentKey, SegmentMetrics};
use crate::market::detector::{SignalDetector, TrendDirection};
use crate::money::{format_compact_aed_f64, group_thousands};

pub const DEFAULT_MAX_SUMMARY_CHARS: usize = 480;

/// Asking prices within this band of transaction prices count as aligned.
const ALIGNED_BAND: f64 = 0.05;

/// Latest portal-side inventory for one (geo, segment).
#[derive(Clone, Debug, PartialEq)]
pub struct PortalInventory {
    pub active_listings: u32,
    pub price_cuts_count: u32,
    pub stale_listings_count: u32,
    pub median_asking_psf: Option<f64>,
}

impl From<&PortalSnapshot> for PortalInventory {
    fn from(snapshot: &PortalSnapshot) -> Self {
        Self {
            active_listings: snapshot.active_listings,
            price_cuts_count: snapshot.price_cuts_count,
            stale_listings_count: snapshot.stale_listings_count,
            median_asking_psf: snapshot.median_asking_psf,
        }
    }
}

impl PortalInventory {
    /// `price_cuts / active_listings` as a percentage, `None` without inventory.
    pub fn price_cut_rate_pct(&self) -> Option<f64> {
        if self.active_listings == 0 {
            return None;
        }
        Some(round1(f64::from(self.price_cuts_count) / f64::from(self.active_listings) * 100.0))
    }
}

/// Everything the template needs for one (geo, segment).
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentSummaryInput {
    pub geo_id: String,
    pub geo_name: String,
    pub segment: String,
    pub metrics: Option<SegmentMetrics>,
    pub portal: Option<PortalInventory>,
    pub price_trend: Option<TrendDirection>,
    pub supply_trend: Option<TrendDirection>,
}

#[derive(Clone, Debug)]
pub struct SummaryCompiler {
    max_chars: usize,
    aggregator: MetricAggregator,
    detector: SignalDetector,
}

impl Default for SummaryCompiler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SUMMARY_CHARS, SignalDetector::default())
    }
}

impl SummaryCompiler {
    pub fn new(max_chars: usize, detector: SignalDetector) -> Self {
        Self { max_chars: max_chars.max(1), aggregator: MetricAggregator::new(), detector }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// One summary per (geo, segment) seen in either source, using only rows on
    /// or before `as_of`.
    pub fn compile(
        &self,
        tenant_id: &TenantId,
        as_of: NaiveDate,
        metric_snapshots: &[MetricSnapshot],
        portal_snapshots: &[PortalSnapshot],
    ) -> Vec<MarketSummary> {
        let official: Vec<MetricSnapshot> = metric_snapshots
            .iter()
            .filter(|snapshot| snapshot.window_end <= as_of)
            .cloned()
            .collect();
        let portal: Vec<&PortalSnapshot> =
            portal_snapshots.iter().filter(|snapshot| snapshot.as_of_date <= as_of).collect();

        let mut inputs: BTreeMap<SegmentKey, SegmentSummaryInput> = BTreeMap::new();

        for metrics in self.aggregator.aggregate(&official) {
            let input = input_entry(&mut inputs, &metrics.geo_id, &metrics.geo_name, &metrics.segment);
            input.metrics = Some(metrics);
        }

        // Latest portal row per key; ties keep the first row seen.
        let mut latest_portal: BTreeMap<SegmentKey, &PortalSnapshot> = BTreeMap::new();
        for snapshot in portal.iter().copied() {
            let key = SegmentKey::new(&snapshot.geo_id, &snapshot.segment);
            match latest_portal.get(&key) {
                Some(existing) if existing.as_of_date >= snapshot.as_of_date => {}
                _ => {
                    latest_portal.insert(key, snapshot);
                }
            }
        }
        for snapshot in latest_portal.into_values() {
            let input =
                input_entry(&mut inputs, &snapshot.geo_id, &snapshot.geo_name, &snapshot.segment);
            input.portal = Some(PortalInventory::from(snapshot));
        }

        let mut trend_rows = official;
        trend_rows.extend(portal.iter().flat_map(|snapshot| snapshot.to_metric_snapshots()));
        for trend in self.aggregator.trends(&trend_rows) {
            let Some(input) = inputs.get_mut(&SegmentKey::new(&trend.geo_id, &trend.segment)) else {
                continue;
            };
            match trend.metric {
                // Price per sqft wins over the median price when both move.
                MetricKind::MedianPricePsf => {
                    if let Some(direction) = self.direction(&trend) {
                        input.price_trend = Some(direction);
                    }
                }
                MetricKind::MedianPrice if input.price_trend.is_none() => {
                    input.price_trend = self.direction(&trend);
                }
                MetricKind::ActiveListings => input.supply_trend = self.direction(&trend),
                _ => {}
            }
        }

        inputs.into_values().map(|input| self.compile_segment(tenant_id, as_of, &input)).collect()
    }

    pub fn compile_segment(
        &self,
        tenant_id: &TenantId,
        as_of: NaiveDate,
        input: &SegmentSummaryInput,
    ) -> MarketSummary {
        let metrics = input.metrics.as_ref();
        let value_of = |pick: fn(&SegmentMetrics) -> Option<f64>| metrics.and_then(pick);

        let median_price = value_of(|m| m.median_price.as_ref().map(|r| r.value));
        let median_psf = value_of(|m| m.median_price_psf.as_ref().map(|r| r.value));
        let median_rent = value_of(|m| m.median_rent_annual.as_ref().map(|r| r.value));
        let gross_yield = value_of(|m| m.gross_yield.as_ref().map(|r| round2(r.value)));

        let portal = input.portal.as_ref();
        let price_cut_rate = portal.and_then(PortalInventory::price_cut_rate_pct);

        let mut clauses = vec![format!("{} {} as of {}", input.geo_name, input.segment, as_of)];
        match (median_price.and_then(format_compact_aed_f64), median_psf) {
            (Some(price), Some(psf)) => {
                clauses.push(format!("median price {price} (AED {}/sqft)", group_thousands(psf)))
            }
            (Some(price), None) => clauses.push(format!("median price {price}")),
            (None, Some(psf)) => {
                clauses.push(format!("median price AED {}/sqft", group_thousands(psf)))
            }
            (None, None) => {}
        }
        if let Some(deviation) =
            portal.and_then(|inventory| deviation_clause(inventory.median_asking_psf?, median_psf?))
        {
            clauses.push(deviation);
        }
        if let Some(inventory) = portal {
            match price_cut_rate {
                Some(rate) => clauses.push(format!(
                    "{} active listings ({rate}% with price cuts)",
                    inventory.active_listings
                )),
                None => clauses.push(format!("{} active listings", inventory.active_listings)),
            }
        }
        if let Some(yield_pct) = gross_yield {
            clauses.push(format!("gross yield {yield_pct}%"));
        }
        if let Some(direction) = input.price_trend {
            clauses.push(format!("prices {}", direction.word()));
        }
        if let Some(direction) = input.supply_trend {
            clauses.push(format!("supply {}", direction.word()));
        }

        MarketSummary {
            tenant_id: tenant_id.clone(),
            geo_id: input.geo_id.clone(),
            geo_name: input.geo_name.clone(),
            segment: input.segment.clone(),
            as_of_date: as_of,
            median_dld_price: median_price,
            median_price_per_sqft: median_psf,
            median_rent_annual: median_rent,
            gross_yield_pct: gross_yield,
            active_listings_count: portal.map(|inventory| inventory.active_listings),
            price_cut_rate_pct: price_cut_rate,
            stale_listings_count: portal.map(|inventory| inventory.stale_listings_count),
            summary_text: bounded_text(&clauses, self.max_chars),
        }
    }

    fn direction(&self, trend: &MetricTrend) -> Option<TrendDirection> {
        self.detector.trend_of(trend).map(|reading| reading.direction)
    }
}

fn input_entry<'a>(
    inputs: &'a mut BTreeMap<SegmentKey, SegmentSummaryInput>,
    geo_id: &str,
    geo_name: &str,
    segment: &str,
) -> &'a mut SegmentSummaryInput {
    inputs.entry(SegmentKey::new(geo_id, segment)).or_insert_with(|| SegmentSummaryInput {
        geo_id: geo_id.to_string(),
        geo_name: geo_name.to_string(),
        segment: segment.to_string(),
        metrics: None,
        portal: None,
        price_trend: None,
        supply_trend: None,
    })
}

fn deviation_clause(asking_psf: f64, transacted_psf: f64) -> Option<String> {
    if transacted_psf <= 0.0 || !asking_psf.is_finite() || !transacted_psf.is_finite() {
        return None;
    }
    let deviation = (asking_psf - transacted_psf) / transacted_psf;
    if deviation.abs() <= ALIGNED_BAND {
        return Some("asking prices aligned with transactions".to_string());
    }
    let magnitude = (deviation.abs() * 100.0).round();
    let side = if deviation > 0.0 { "above" } else { "below" };
    Some(format!("asking prices {magnitude}% {side} transactions"))
}

/// Drops trailing clauses until the sentence fits; the opening clause is cut
/// on a character boundary if it alone is too long.
fn bounded_text(clauses: &[String], max_chars: usize) -> String {
    for keep in (1..=clauses.len()).rev() {
        let text = format!("{}.", clauses[..keep].join("; "));
        if text.chars().count() <= max_chars {
            return text;
        }
    }
    clauses.first().map(|opening| opening.chars().take(max_chars).collect()).unwrap_or_default()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
