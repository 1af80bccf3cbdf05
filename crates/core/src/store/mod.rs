//! Persistence seams. Pipelines only see these traits; `brickwise-db`
//! implements them over SQLite and [`memory::InMemoryStore`] backs tests and
//! embedding callers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::ids::{InvestorId, SignalId, TenantId};
use crate::domain::investor::{DealRoom, Holding, Investor, Memo, ShortlistItem};
use crate::domain::listing::Listing;
use crate::domain::market::{
    MarketSignal, MarketSummary, MetricSnapshot, PortalSnapshot, RelevantSignal, SignalStatus,
    SignalTarget, UpsertCounts,
};
use crate::errors::StoreError;

pub mod memory;

pub use memory::{InMemoryStore, StoreSource};

#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn metric_snapshots(&self, tenant_id: &TenantId)
        -> Result<Vec<MetricSnapshot>, StoreError>;

    async fn portal_snapshots(&self, tenant_id: &TenantId)
        -> Result<Vec<PortalSnapshot>, StoreError>;

    /// Inserts signals whose id is not stored yet and returns how many were new.
    async fn insert_signals(&self, signals: &[MarketSignal]) -> Result<usize, StoreError>;

    async fn find_signal(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
    ) -> Result<Option<MarketSignal>, StoreError>;

    async fn list_signals(&self, tenant_id: &TenantId) -> Result<Vec<MarketSignal>, StoreError>;

    /// Compare-and-set: writes only while the stored status still equals
    /// `expected`. Returns `false` when no signal matched both.
    async fn update_signal_status(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
        expected: SignalStatus,
        status: SignalStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Upserts on (signal, investor) and returns how many mappings were new.
    async fn upsert_signal_targets(&self, targets: &[SignalTarget]) -> Result<usize, StoreError>;

    /// Routed, non-dismissed signals for one investor.
    async fn relevant_signals(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<RelevantSignal>, StoreError>;

    /// Upserts on (tenant, geo, segment, as_of_date).
    async fn upsert_summaries(&self, summaries: &[MarketSummary])
        -> Result<UpsertCounts, StoreError>;

    async fn list_summaries(&self, tenant_id: &TenantId)
        -> Result<Vec<MarketSummary>, StoreError>;
}

#[async_trait]
pub trait CrmStore: Send + Sync {
    async fn find_investor(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Option<Investor>, StoreError>;

    async fn list_investors(&self, tenant_id: &TenantId) -> Result<Vec<Investor>, StoreError>;

    async fn listings(&self, tenant_id: &TenantId) -> Result<Vec<Listing>, StoreError>;

    /// Holdings with the area of the held listing resolved where known.
    async fn holdings(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<Holding>, StoreError>;

    async fn shortlist_items(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<ShortlistItem>, StoreError>;

    async fn memos(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<Memo>, StoreError>;

    async fn deal_rooms(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<DealRoom>, StoreError>;
}
