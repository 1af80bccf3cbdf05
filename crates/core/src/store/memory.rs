use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::domain::ids::{InvestorId, SignalId, TenantId};
use crate::domain::investor::{DealRoom, Holding, Investor, Memo, ShortlistItem};
use crate::domain::listing::Listing;
use crate::domain::market::{
    MarketSignal, MarketSummary, MetricSnapshot, PortalSnapshot, RelevantSignal, SignalStatus,
    SignalTarget, TargetStatus, UpsertCounts,
};
use crate::errors::StoreError;

use super::{CrmStore, MarketStore};

/// Lookup that can be made to fail or stall in tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreSource {
    MetricSnapshots,
    PortalSnapshots,
    Signals,
    SignalTargets,
    Summaries,
    Investors,
    Listings,
    Holdings,
    Shortlist,
    Memos,
    DealRooms,
}

impl StoreSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetricSnapshots => "metric_snapshots",
            Self::PortalSnapshots => "portal_snapshots",
            Self::Signals => "signals",
            Self::SignalTargets => "signal_targets",
            Self::Summaries => "summaries",
            Self::Investors => "investors",
            Self::Listings => "listings",
            Self::Holdings => "holdings",
            Self::Shortlist => "shortlist",
            Self::Memos => "memos",
            Self::DealRooms => "deal_rooms",
        }
    }
}

type SummaryKey = (String, String, NaiveDate);

#[derive(Default)]
struct TenantData {
    metric_snapshots: Vec<MetricSnapshot>,
    portal_snapshots: Vec<PortalSnapshot>,
    signals: BTreeMap<SignalId, MarketSignal>,
    targets: BTreeMap<(SignalId, InvestorId), SignalTarget>,
    summaries: BTreeMap<SummaryKey, MarketSummary>,
    investors: BTreeMap<InvestorId, Investor>,
    listings: Vec<Listing>,
    holdings: Vec<Holding>,
    shortlist: Vec<ShortlistItem>,
    memos: Vec<Memo>,
    deal_rooms: Vec<DealRoom>,
}

/// Tenant-partitioned store held in memory. Constructed explicitly and shared
/// behind an `Arc`; there is no process-wide instance.
#[derive(Default)]
pub struct InMemoryStore {
    tenants: RwLock<HashMap<TenantId, TenantData>>,
    failures: RwLock<HashSet<StoreSource>>,
    delays: RwLock<HashMap<StoreSource, Duration>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn fail(&self, source: StoreSource) {
        self.failures.write().await.insert(source);
    }

    pub async fn recover(&self, source: StoreSource) {
        self.failures.write().await.remove(&source);
    }

    pub async fn delay(&self, source: StoreSource, delay: Duration) {
        self.delays.write().await.insert(source, delay);
    }

    async fn check(&self, source: StoreSource) -> Result<(), StoreError> {
        let delay = self.delays.read().await.get(&source).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failures.read().await.contains(&source) {
            return Err(StoreError::Unavailable(format!("{} lookup failed", source.as_str())));
        }
        Ok(())
    }

    async fn read_tenant<T>(
        &self,
        source: StoreSource,
        tenant_id: &TenantId,
        read: impl FnOnce(&TenantData) -> T,
    ) -> Result<T, StoreError>
    where
        T: Default,
    {
        self.check(source).await?;
        let tenants = self.tenants.read().await;
        Ok(tenants.get(tenant_id).map(read).unwrap_or_default())
    }

    pub async fn add_metric_snapshots(
        &self,
        tenant_id: &TenantId,
        snapshots: impl IntoIterator<Item = MetricSnapshot>,
    ) {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant_id.clone()).or_default().metric_snapshots.extend(snapshots);
    }

    pub async fn add_portal_snapshots(
        &self,
        tenant_id: &TenantId,
        snapshots: impl IntoIterator<Item = PortalSnapshot>,
    ) {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant_id.clone()).or_default().portal_snapshots.extend(snapshots);
    }

    pub async fn add_investor(&self, investor: Investor) {
        let mut tenants = self.tenants.write().await;
        tenants
            .entry(investor.tenant_id.clone())
            .or_default()
            .investors
            .insert(investor.id.clone(), investor);
    }

    pub async fn add_listings(&self, tenant_id: &TenantId, listings: impl IntoIterator<Item = Listing>) {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant_id.clone()).or_default().listings.extend(listings);
    }

    pub async fn add_holdings(&self, tenant_id: &TenantId, holdings: impl IntoIterator<Item = Holding>) {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant_id.clone()).or_default().holdings.extend(holdings);
    }

    pub async fn add_shortlist_items(
        &self,
        tenant_id: &TenantId,
        items: impl IntoIterator<Item = ShortlistItem>,
    ) {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant_id.clone()).or_default().shortlist.extend(items);
    }

    pub async fn add_memos(&self, tenant_id: &TenantId, memos: impl IntoIterator<Item = Memo>) {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant_id.clone()).or_default().memos.extend(memos);
    }

    pub async fn add_deal_rooms(&self, tenant_id: &TenantId, rooms: impl IntoIterator<Item = DealRoom>) {
        let mut tenants = self.tenants.write().await;
        tenants.entry(tenant_id.clone()).or_default().deal_rooms.extend(rooms);
    }

    pub async fn signal_targets(&self, tenant_id: &TenantId) -> Vec<SignalTarget> {
        let tenants = self.tenants.read().await;
        tenants
            .get(tenant_id)
            .map(|data| data.targets.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MarketStore for InMemoryStore {
    async fn metric_snapshots(&self, tenant_id: &TenantId) -> Result<Vec<MetricSnapshot>, StoreError> {
        self.read_tenant(StoreSource::MetricSnapshots, tenant_id, |data| data.metric_snapshots.clone())
            .await
    }

    async fn portal_snapshots(&self, tenant_id: &TenantId) -> Result<Vec<PortalSnapshot>, StoreError> {
        self.read_tenant(StoreSource::PortalSnapshots, tenant_id, |data| data.portal_snapshots.clone())
            .await
    }

    async fn insert_signals(&self, signals: &[MarketSignal]) -> Result<usize, StoreError> {
        self.check(StoreSource::Signals).await?;
        let mut tenants = self.tenants.write().await;
        let mut created = 0;
        for signal in signals {
            let data = tenants.entry(signal.tenant_id.clone()).or_default();
            if !data.signals.contains_key(&signal.id) {
                data.signals.insert(signal.id.clone(), signal.clone());
                created += 1;
            }
        }
        Ok(created)
    }

    async fn find_signal(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
    ) -> Result<Option<MarketSignal>, StoreError> {
        self.read_tenant(StoreSource::Signals, tenant_id, |data| data.signals.get(signal_id).cloned())
            .await
    }

    async fn list_signals(&self, tenant_id: &TenantId) -> Result<Vec<MarketSignal>, StoreError> {
        self.read_tenant(StoreSource::Signals, tenant_id, |data| {
            data.signals.values().cloned().collect()
        })
        .await
    }

    async fn update_signal_status(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
        expected: SignalStatus,
        status: SignalStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check(StoreSource::Signals).await?;
        let mut tenants = self.tenants.write().await;
        let Some(signal) = tenants
            .get_mut(tenant_id)
            .and_then(|data| data.signals.get_mut(signal_id))
            .filter(|signal| signal.status == expected)
        else {
            return Ok(false);
        };
        signal.status = status;
        signal.updated_at = updated_at;
        Ok(true)
    }

    async fn upsert_signal_targets(&self, targets: &[SignalTarget]) -> Result<usize, StoreError> {
        self.check(StoreSource::SignalTargets).await?;
        let mut tenants = self.tenants.write().await;
        let mut created = 0;
        for target in targets {
            let data = tenants.entry(target.tenant_id.clone()).or_default();
            let key = (target.signal_id.clone(), target.investor_id.clone());
            match data.targets.get_mut(&key) {
                Some(existing) => {
                    existing.relevance_score = target.relevance_score;
                    existing.reason = target.reason.clone();
                }
                None => {
                    data.targets.insert(key, target.clone());
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    async fn relevant_signals(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<RelevantSignal>, StoreError> {
        let mut relevant = self
            .read_tenant(StoreSource::SignalTargets, tenant_id, |data| {
                data.targets
                    .values()
                    .filter(|target| {
                        &target.investor_id == investor_id && target.status != TargetStatus::Dismissed
                    })
                    .filter_map(|target| {
                        let signal = data.signals.get(&target.signal_id)?;
                        (signal.status != SignalStatus::Dismissed).then(|| RelevantSignal {
                            signal_id: signal.id.clone(),
                            signal_type: signal.signal_type,
                            severity: signal.severity,
                            geo_name: signal.geo_name.clone(),
                            relevance_score: target.relevance_score,
                            listing_ids: signal.evidence_listing_ids.clone(),
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .await?;
        relevant.sort_by(|left, right| {
            right
                .relevance_score
                .total_cmp(&left.relevance_score)
                .then_with(|| left.signal_id.cmp(&right.signal_id))
        });
        Ok(relevant)
    }

    async fn upsert_summaries(&self, summaries: &[MarketSummary]) -> Result<UpsertCounts, StoreError> {
        self.check(StoreSource::Summaries).await?;
        let mut tenants = self.tenants.write().await;
        let mut counts = UpsertCounts::default();
        for summary in summaries {
            let data = tenants.entry(summary.tenant_id.clone()).or_default();
            let key = (summary.geo_id.clone(), summary.segment.clone(), summary.as_of_date);
            if data.summaries.insert(key, summary.clone()).is_some() {
                counts.updated += 1;
            } else {
                counts.created += 1;
            }
        }
        Ok(counts)
    }

    async fn list_summaries(&self, tenant_id: &TenantId) -> Result<Vec<MarketSummary>, StoreError> {
        self.read_tenant(StoreSource::Summaries, tenant_id, |data| {
            data.summaries.values().cloned().collect()
        })
        .await
    }
}

#[async_trait]
impl CrmStore for InMemoryStore {
    async fn find_investor(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Option<Investor>, StoreError> {
        self.read_tenant(StoreSource::Investors, tenant_id, |data| {
            data.investors.get(investor_id).cloned()
        })
        .await
    }

    async fn list_investors(&self, tenant_id: &TenantId) -> Result<Vec<Investor>, StoreError> {
        self.read_tenant(StoreSource::Investors, tenant_id, |data| {
            data.investors.values().cloned().collect()
        })
        .await
    }

    async fn listings(&self, tenant_id: &TenantId) -> Result<Vec<Listing>, StoreError> {
        self.read_tenant(StoreSource::Listings, tenant_id, |data| data.listings.clone()).await
    }

    async fn holdings(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<Holding>, StoreError> {
        self.read_tenant(StoreSource::Holdings, tenant_id, |data| {
            data.holdings
                .iter()
                .filter(|holding| &holding.investor_id == investor_id)
                .cloned()
                .map(|mut holding| {
                    if holding.area.is_none() {
                        holding.area = data
                            .listings
                            .iter()
                            .find(|listing| listing.id == holding.property_id)
                            .map(|listing| listing.area.clone());
                    }
                    holding
                })
                .collect()
        })
        .await
    }

    async fn shortlist_items(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<ShortlistItem>, StoreError> {
        self.read_tenant(StoreSource::Shortlist, tenant_id, |data| {
            data.shortlist.iter().filter(|item| &item.investor_id == investor_id).cloned().collect()
        })
        .await
    }

    async fn memos(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<Memo>, StoreError> {
        self.read_tenant(StoreSource::Memos, tenant_id, |data| {
            data.memos.iter().filter(|memo| &memo.investor_id == investor_id).cloned().collect()
        })
        .await
    }

    async fn deal_rooms(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<DealRoom>, StoreError> {
        self.read_tenant(StoreSource::DealRooms, tenant_id, |data| {
            data.deal_rooms.iter().filter(|room| &room.investor_id == investor_id).cloned().collect()
        })
        .await
    }
}
