use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::{InvestorId, ListingId, SignalId, TenantId};
use crate::errors::DomainError;

/// Metric carried by a single snapshot row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    MedianPrice,
    MedianPricePsf,
    MedianRentAnnual,
    GrossYield,
    ActiveListings,
    PriceCutsCount,
    StaleListingsCount,
}

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::MedianPrice,
        MetricKind::MedianPricePsf,
        MetricKind::MedianRentAnnual,
        MetricKind::GrossYield,
        MetricKind::ActiveListings,
        MetricKind::PriceCutsCount,
        MetricKind::StaleListingsCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MedianPrice => "median_price",
            Self::MedianPricePsf => "median_price_psf",
            Self::MedianRentAnnual => "median_rent_annual",
            Self::GrossYield => "gross_yield",
            Self::ActiveListings => "active_listings",
            Self::PriceCutsCount => "price_cuts_count",
            Self::StaleListingsCount => "stale_listings_count",
        }
    }

    /// Portal inventory counters come from listing portals; everything else is
    /// official transaction/tenancy data.
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::ActiveListings | Self::PriceCutsCount | Self::StaleListingsCount => {
                SourceType::Portal
            }
            _ => SourceType::Official,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| DomainError::InvariantViolation(format!("unknown metric `{value}`")))
    }
}

/// One immutable metric row written by the ingestion collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub geo_id: String,
    pub geo_name: String,
    pub segment: String,
    pub metric: MetricKind,
    pub value: f64,
    pub sample_size: u32,
    pub window_end: NaiveDate,
}

/// Portal inventory counters for one (geo, segment) on one day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PortalSnapshot {
    pub geo_id: String,
    pub geo_name: String,
    pub segment: String,
    pub active_listings: u32,
    pub price_cuts_count: u32,
    pub stale_listings_count: u32,
    pub median_asking_psf: Option<f64>,
    pub as_of_date: NaiveDate,
}

impl PortalSnapshot {
    /// Expands the row into metric snapshots so portal counters flow through the
    /// same aggregation and trend path as official metrics. The active listing
    /// count doubles as the sample size.
    pub fn to_metric_snapshots(&self) -> Vec<MetricSnapshot> {
        [
            (MetricKind::ActiveListings, self.active_listings),
            (MetricKind::PriceCutsCount, self.price_cuts_count),
            (MetricKind::StaleListingsCount, self.stale_listings_count),
        ]
        .into_iter()
        .map(|(metric, value)| MetricSnapshot {
            geo_id: self.geo_id.clone(),
            geo_name: self.geo_name.clone(),
            segment: self.segment.clone(),
            metric,
            value: f64::from(value),
            sample_size: self.active_listings,
            window_end: self.as_of_date,
        })
        .collect()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Official,
    Portal,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Portal => "portal",
        }
    }
}

impl FromStr for SourceType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "official" => Ok(Self::Official),
            "portal" => Ok(Self::Portal),
            other => Err(DomainError::InvariantViolation(format!("unknown source type `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoType {
    Community,
    Project,
    Building,
}

impl GeoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Community => "community",
            Self::Project => "project",
            Self::Building => "building",
        }
    }
}

impl FromStr for GeoType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "community" => Ok(Self::Community),
            "project" => Ok(Self::Project),
            "building" => Ok(Self::Building),
            other => Err(DomainError::InvariantViolation(format!("unknown geo type `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    PriceChange,
    RentChange,
    YieldOpportunity,
    YieldCompression,
    SupplySpike,
    DiscountingSpike,
    StalenessRise,
}

impl SignalType {
    pub const ALL: [SignalType; 7] = [
        SignalType::PriceChange,
        SignalType::RentChange,
        SignalType::YieldOpportunity,
        SignalType::YieldCompression,
        SignalType::SupplySpike,
        SignalType::DiscountingSpike,
        SignalType::StalenessRise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PriceChange => "price_change",
            Self::RentChange => "rent_change",
            Self::YieldOpportunity => "yield_opportunity",
            Self::YieldCompression => "yield_compression",
            Self::SupplySpike => "supply_spike",
            Self::DiscountingSpike => "discounting_spike",
            Self::StalenessRise => "staleness_rise",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PriceChange => "Price movement",
            Self::RentChange => "Rent movement",
            Self::YieldOpportunity => "Yield opportunity",
            Self::YieldCompression => "Yield compression",
            Self::SupplySpike => "Supply spike",
            Self::DiscountingSpike => "Discounting spike",
            Self::StalenessRise => "Stale inventory rising",
        }
    }
}

impl FromStr for SignalType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| DomainError::InvariantViolation(format!("unknown signal type `{value}`")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Watch,
    Urgent,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Watch => "watch",
            Self::Urgent => "urgent",
        }
    }
}

impl FromStr for Severity {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "watch" => Ok(Self::Watch),
            "urgent" => Ok(Self::Urgent),
            other => Err(DomainError::InvariantViolation(format!("unknown severity `{other}`"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    New,
    Acknowledged,
    Dismissed,
    Routed,
}

/// Result of applying a triage status to a signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusChange {
    Applied,
    Unchanged,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Acknowledged => "acknowledged",
            Self::Dismissed => "dismissed",
            Self::Routed => "routed",
        }
    }

    pub fn can_transition_to(&self, next: SignalStatus) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::Acknowledged)
                | (Self::New, Self::Dismissed)
                | (Self::New, Self::Routed)
                | (Self::Acknowledged, Self::Routed)
                | (Self::Acknowledged, Self::Dismissed)
                | (Self::Routed, Self::Dismissed)
        )
    }

    /// Re-applying the current status is a no-op rather than an error.
    pub fn transition(&self, next: SignalStatus) -> Result<StatusChange, DomainError> {
        if *self == next {
            return Ok(StatusChange::Unchanged);
        }
        if self.can_transition_to(next) {
            return Ok(StatusChange::Applied);
        }
        Err(DomainError::InvalidSignalTransition { from: *self, to: next })
    }
}

impl FromStr for SignalStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "acknowledged" => Ok(Self::Acknowledged),
            "dismissed" => Ok(Self::Dismissed),
            "routed" => Ok(Self::Routed),
            other => Err(DomainError::InvariantViolation(format!("unknown signal status `{other}`"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketSignal {
    pub id: SignalId,
    pub tenant_id: TenantId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub source_type: SourceType,
    pub signal_type: SignalType,
    pub severity: Severity,
    pub status: SignalStatus,
    pub geo_type: GeoType,
    pub geo_id: String,
    pub geo_name: String,
    pub segment: String,
    pub metric: MetricKind,
    pub current_value: f64,
    pub prev_value: Option<f64>,
    pub delta_value: Option<f64>,
    pub delta_pct: Option<f64>,
    pub confidence_score: f64,
    pub window_end: NaiveDate,
    pub evidence_listing_ids: Vec<ListingId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    New,
    Seen,
    Dismissed,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Seen => "seen",
            Self::Dismissed => "dismissed",
        }
    }
}

impl FromStr for TargetStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "seen" => Ok(Self::Seen),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(DomainError::InvariantViolation(format!("unknown target status `{other}`"))),
        }
    }
}

/// Why a signal was routed to an investor. Persisted as JSON.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetReason {
    pub matched_area: Option<String>,
    pub matched_type: Option<String>,
    pub severity: Option<Severity>,
    pub confidence_score: Option<f64>,
}

/// Mapping of one signal to one investor mandate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalTarget {
    pub tenant_id: TenantId,
    pub signal_id: SignalId,
    pub investor_id: InvestorId,
    pub relevance_score: f64,
    pub status: TargetStatus,
    pub reason: TargetReason,
}

/// Signal as seen from one investor: the routed relevance plus what the
/// opportunity scorer needs to attach it to listings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelevantSignal {
    pub signal_id: SignalId,
    pub signal_type: SignalType,
    pub severity: Severity,
    pub geo_name: String,
    pub relevance_score: f64,
    pub listing_ids: Vec<ListingId>,
}

/// Row of `ai_market_summary`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub tenant_id: TenantId,
    pub geo_id: String,
    pub geo_name: String,
    pub segment: String,
    pub as_of_date: NaiveDate,
    pub median_dld_price: Option<f64>,
    pub median_price_per_sqft: Option<f64>,
    pub median_rent_annual: Option<f64>,
    pub gross_yield_pct: Option<f64>,
    pub active_listings_count: Option<u32>,
    pub price_cut_rate_pct: Option<f64>,
    pub stale_listings_count: Option<u32>,
    pub summary_text: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertCounts {
    pub created: usize,
    pub updated: usize,
}
