use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use tracing::debug;

use brickwise_core::domain::ids::{InvestorId, ListingId, SignalId, TenantId};
use brickwise_core::domain::market::{
    MarketSignal, MarketSummary, MetricSnapshot, PortalSnapshot, RelevantSignal, SignalStatus,
    SignalTarget, UpsertCounts,
};
use brickwise_core::errors::StoreError;
use brickwise_core::store::MarketStore;

use super::{
    column, count, decode_rows, parse_date, parse_name, parse_timestamp, RepositoryError,
    DATE_FORMAT,
};
use crate::DbPool;

pub struct SqlMarketRepository {
    pool: DbPool,
}

impl SqlMarketRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Appends ingested metric rows; a row already present for the same
    /// (geo, segment, metric, window) is left untouched.
    pub async fn record_metric_snapshots(
        &self,
        tenant_id: &TenantId,
        snapshots: &[MetricSnapshot],
    ) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for snapshot in snapshots {
            let result = sqlx::query(
                "INSERT INTO market_metric_snapshot
                    (org_id, geo_id, geo_name, segment, metric, value, sample_size, window_end)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(org_id, geo_id, segment, metric, window_end) DO NOTHING",
            )
            .bind(tenant_id.as_str())
            .bind(&snapshot.geo_id)
            .bind(&snapshot.geo_name)
            .bind(&snapshot.segment)
            .bind(snapshot.metric.as_str())
            .bind(snapshot.value)
            .bind(i64::from(snapshot.sample_size))
            .bind(snapshot.window_end.format(DATE_FORMAT).to_string())
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn record_portal_snapshots(
        &self,
        tenant_id: &TenantId,
        snapshots: &[PortalSnapshot],
    ) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for snapshot in snapshots {
            let result = sqlx::query(
                "INSERT INTO portal_listing_snapshot
                    (org_id, geo_id, geo_name, segment, active_listings, price_cuts_count,
                     stale_listings_count, median_asking_psf, as_of_date)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(org_id, geo_id, segment, as_of_date) DO NOTHING",
            )
            .bind(tenant_id.as_str())
            .bind(&snapshot.geo_id)
            .bind(&snapshot.geo_name)
            .bind(&snapshot.segment)
            .bind(i64::from(snapshot.active_listings))
            .bind(i64::from(snapshot.price_cuts_count))
            .bind(i64::from(snapshot.stale_listings_count))
            .bind(snapshot.median_asking_psf)
            .bind(snapshot.as_of_date.format(DATE_FORMAT).to_string())
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await?;
        Ok(inserted)
    }

    async fn load_metric_snapshots(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<MetricSnapshot>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT geo_id, geo_name, segment, metric, value, sample_size, window_end
             FROM market_metric_snapshot
             WHERE org_id = ?
             ORDER BY window_end, id",
        )
        .bind(tenant_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows("market_metric_snapshot", &rows, metric_snapshot_from_row))
    }

    async fn load_portal_snapshots(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<PortalSnapshot>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT geo_id, geo_name, segment, active_listings, price_cuts_count,
                    stale_listings_count, median_asking_psf, as_of_date
             FROM portal_listing_snapshot
             WHERE org_id = ?
             ORDER BY as_of_date, id",
        )
        .bind(tenant_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows("portal_listing_snapshot", &rows, portal_snapshot_from_row))
    }

    async fn save_signals(&self, signals: &[MarketSignal]) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for signal in signals {
            let evidence = serde_json::to_string(&signal.evidence_listing_ids)?;
            let result = sqlx::query(
                "INSERT INTO market_signal
                    (id, org_id, created_at, updated_at, source_type, type, severity, status,
                     geo_type, geo_id, geo_name, segment, metric, current_value, prev_value,
                     delta_value, delta_pct, confidence_score, window_end, evidence)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(id) DO NOTHING",
            )
            .bind(signal.id.as_str())
            .bind(signal.tenant_id.as_str())
            .bind(signal.created_at.to_rfc3339())
            .bind(signal.updated_at.to_rfc3339())
            .bind(signal.source_type.as_str())
            .bind(signal.signal_type.as_str())
            .bind(signal.severity.as_str())
            .bind(signal.status.as_str())
            .bind(signal.geo_type.as_str())
            .bind(&signal.geo_id)
            .bind(&signal.geo_name)
            .bind(&signal.segment)
            .bind(signal.metric.as_str())
            .bind(signal.current_value)
            .bind(signal.prev_value)
            .bind(signal.delta_value)
            .bind(signal.delta_pct)
            .bind(signal.confidence_score)
            .bind(signal.window_end.format(DATE_FORMAT).to_string())
            .bind(evidence)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        tx.commit().await?;
        debug!(
            event_name = "db.market_signal.inserted",
            offered = signals.len(),
            inserted,
            "market signals written"
        );
        Ok(inserted)
    }

    async fn load_signal(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
    ) -> Result<Option<MarketSignal>, RepositoryError> {
        let row = sqlx::query(&format!("{SIGNAL_SELECT} WHERE org_id = ? AND id = ?"))
            .bind(tenant_id.as_str())
            .bind(signal_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(signal_from_row).transpose()
    }

    async fn load_signals(&self, tenant_id: &TenantId) -> Result<Vec<MarketSignal>, RepositoryError> {
        let rows = sqlx::query(&format!("{SIGNAL_SELECT} WHERE org_id = ? ORDER BY id"))
            .bind(tenant_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(signal_from_row).collect()
    }

    async fn set_signal_status(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
        expected: SignalStatus,
        status: SignalStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE market_signal SET status = ?, updated_at = ?
             WHERE org_id = ? AND id = ? AND status = ?",
        )
        .bind(status.as_str())
        .bind(updated_at.to_rfc3339())
        .bind(tenant_id.as_str())
        .bind(signal_id.as_str())
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_targets(&self, targets: &[SignalTarget]) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut created = 0;
        for target in targets {
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM market_signal_target WHERE signal_id = ? AND investor_id = ?)",
            )
            .bind(target.signal_id.as_str())
            .bind(target.investor_id.as_str())
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO market_signal_target
                    (org_id, signal_id, investor_id, relevance_score, status, reason)
                 VALUES (?, ?, ?, ?, ?, ?)
                 ON CONFLICT(signal_id, investor_id) DO UPDATE SET
                     relevance_score = excluded.relevance_score,
                     reason = excluded.reason",
            )
            .bind(target.tenant_id.as_str())
            .bind(target.signal_id.as_str())
            .bind(target.investor_id.as_str())
            .bind(target.relevance_score)
            .bind(target.status.as_str())
            .bind(serde_json::to_string(&target.reason)?)
            .execute(&mut *tx)
            .await?;

            if exists == 0 {
                created += 1;
            }
        }
        tx.commit().await?;
        Ok(created)
    }

    async fn load_relevant_signals(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<RelevantSignal>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT s.id, s.type, s.severity, s.geo_name, s.evidence, t.relevance_score
             FROM market_signal_target t
             JOIN market_signal s ON s.id = t.signal_id
             WHERE t.org_id = ? AND t.investor_id = ?
               AND t.status != 'dismissed' AND s.status != 'dismissed'
             ORDER BY t.relevance_score DESC, s.id",
        )
        .bind(tenant_id.as_str())
        .bind(investor_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let evidence: String = column(row, "evidence")?;
                Ok(RelevantSignal {
                    signal_id: SignalId::new(column::<String>(row, "id")?),
                    signal_type: parse_name("type", &column::<String>(row, "type")?)?,
                    severity: parse_name("severity", &column::<String>(row, "severity")?)?,
                    geo_name: column(row, "geo_name")?,
                    relevance_score: column(row, "relevance_score")?,
                    listing_ids: serde_json::from_str::<Vec<ListingId>>(&evidence)?,
                })
            })
            .collect()
    }

    async fn save_summaries(
        &self,
        summaries: &[MarketSummary],
    ) -> Result<UpsertCounts, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let mut counts = UpsertCounts::default();
        let updated_at = Utc::now().to_rfc3339();
        for summary in summaries {
            let as_of_date = summary.as_of_date.format(DATE_FORMAT).to_string();
            let exists: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM ai_market_summary
                               WHERE org_id = ? AND geo_id = ? AND segment = ? AND as_of_date = ?)",
            )
            .bind(summary.tenant_id.as_str())
            .bind(&summary.geo_id)
            .bind(&summary.segment)
            .bind(&as_of_date)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO ai_market_summary
                    (org_id, geo_id, geo_name, segment, as_of_date, median_dld_price,
                     median_price_per_sqft, median_rent_annual, gross_yield_pct,
                     active_listings_count, price_cut_rate_pct, stale_listings_count,
                     summary_text, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                 ON CONFLICT(org_id, geo_id, segment, as_of_date) DO UPDATE SET
                     geo_name = excluded.geo_name,
                     median_dld_price = excluded.median_dld_price,
                     median_price_per_sqft = excluded.median_price_per_sqft,
                     median_rent_annual = excluded.median_rent_annual,
                     gross_yield_pct = excluded.gross_yield_pct,
                     active_listings_count = excluded.active_listings_count,
                     price_cut_rate_pct = excluded.price_cut_rate_pct,
                     stale_listings_count = excluded.stale_listings_count,
                     summary_text = excluded.summary_text,
                     updated_at = excluded.updated_at",
            )
            .bind(summary.tenant_id.as_str())
            .bind(&summary.geo_id)
            .bind(&summary.geo_name)
            .bind(&summary.segment)
            .bind(&as_of_date)
            .bind(summary.median_dld_price)
            .bind(summary.median_price_per_sqft)
            .bind(summary.median_rent_annual)
            .bind(summary.gross_yield_pct)
            .bind(summary.active_listings_count.map(i64::from))
            .bind(summary.price_cut_rate_pct)
            .bind(summary.stale_listings_count.map(i64::from))
            .bind(&summary.summary_text)
            .bind(&updated_at)
            .execute(&mut *tx)
            .await?;

            if exists == 0 {
                counts.created += 1;
            } else {
                counts.updated += 1;
            }
        }
        tx.commit().await?;
        Ok(counts)
    }

    async fn load_summaries(&self, tenant_id: &TenantId) -> Result<Vec<MarketSummary>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT org_id, geo_id, geo_name, segment, as_of_date, median_dld_price,
                    median_price_per_sqft, median_rent_annual, gross_yield_pct,
                    active_listings_count, price_cut_rate_pct, stale_listings_count, summary_text
             FROM ai_market_summary
             WHERE org_id = ?
             ORDER BY geo_id, segment, as_of_date",
        )
        .bind(tenant_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(summary_from_row).collect()
    }
}

#[async_trait]
impl MarketStore for SqlMarketRepository {
    async fn metric_snapshots(&self, tenant_id: &TenantId) -> Result<Vec<MetricSnapshot>, StoreError> {
        Ok(self.load_metric_snapshots(tenant_id).await?)
    }

    async fn portal_snapshots(&self, tenant_id: &TenantId) -> Result<Vec<PortalSnapshot>, StoreError> {
        Ok(self.load_portal_snapshots(tenant_id).await?)
    }

    async fn insert_signals(&self, signals: &[MarketSignal]) -> Result<usize, StoreError> {
        Ok(self.save_signals(signals).await?)
    }

    async fn find_signal(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
    ) -> Result<Option<MarketSignal>, StoreError> {
        Ok(self.load_signal(tenant_id, signal_id).await?)
    }

    async fn list_signals(&self, tenant_id: &TenantId) -> Result<Vec<MarketSignal>, StoreError> {
        Ok(self.load_signals(tenant_id).await?)
    }

    async fn update_signal_status(
        &self,
        tenant_id: &TenantId,
        signal_id: &SignalId,
        expected: SignalStatus,
        status: SignalStatus,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self.set_signal_status(tenant_id, signal_id, expected, status, updated_at).await?)
    }

    async fn upsert_signal_targets(&self, targets: &[SignalTarget]) -> Result<usize, StoreError> {
        Ok(self.save_targets(targets).await?)
    }

    async fn relevant_signals(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<RelevantSignal>, StoreError> {
        Ok(self.load_relevant_signals(tenant_id, investor_id).await?)
    }

    async fn upsert_summaries(&self, summaries: &[MarketSummary]) -> Result<UpsertCounts, StoreError> {
        Ok(self.save_summaries(summaries).await?)
    }

    async fn list_summaries(&self, tenant_id: &TenantId) -> Result<Vec<MarketSummary>, StoreError> {
        Ok(self.load_summaries(tenant_id).await?)
    }
}

const SIGNAL_SELECT: &str = "SELECT id, org_id, created_at, updated_at, source_type, type, severity,
        status, geo_type, geo_id, geo_name, segment, metric, current_value, prev_value,
        delta_value, delta_pct, confidence_score, window_end, evidence
     FROM market_signal";

fn metric_snapshot_from_row(row: &SqliteRow) -> Result<MetricSnapshot, RepositoryError> {
    Ok(MetricSnapshot {
        geo_id: column(row, "geo_id")?,
        geo_name: column(row, "geo_name")?,
        segment: column(row, "segment")?,
        metric: parse_name("metric", &column::<String>(row, "metric")?)?,
        value: column(row, "value")?,
        sample_size: count("sample_size", column(row, "sample_size")?)?,
        window_end: parse_date("window_end", &column::<String>(row, "window_end")?)?,
    })
}

fn portal_snapshot_from_row(row: &SqliteRow) -> Result<PortalSnapshot, RepositoryError> {
    Ok(PortalSnapshot {
        geo_id: column(row, "geo_id")?,
        geo_name: column(row, "geo_name")?,
        segment: column(row, "segment")?,
        active_listings: count("active_listings", column(row, "active_listings")?)?,
        price_cuts_count: count("price_cuts_count", column(row, "price_cuts_count")?)?,
        stale_listings_count: count("stale_listings_count", column(row, "stale_listings_count")?)?,
        median_asking_psf: column(row, "median_asking_psf")?,
        as_of_date: parse_date("as_of_date", &column::<String>(row, "as_of_date")?)?,
    })
}

fn signal_from_row(row: &SqliteRow) -> Result<MarketSignal, RepositoryError> {
    let evidence: String = column(row, "evidence")?;
    Ok(MarketSignal {
        id: SignalId::new(column::<String>(row, "id")?),
        tenant_id: TenantId::new(column::<String>(row, "org_id")?),
        created_at: parse_timestamp("created_at", &column::<String>(row, "created_at")?)?,
        updated_at: parse_timestamp("updated_at", &column::<String>(row, "updated_at")?)?,
        source_type: parse_name("source_type", &column::<String>(row, "source_type")?)?,
        signal_type: parse_name("type", &column::<String>(row, "type")?)?,
        severity: parse_name("severity", &column::<String>(row, "severity")?)?,
        status: parse_name("status", &column::<String>(row, "status")?)?,
        geo_type: parse_name("geo_type", &column::<String>(row, "geo_type")?)?,
        geo_id: column(row, "geo_id")?,
        geo_name: column(row, "geo_name")?,
        segment: column(row, "segment")?,
        metric: parse_name("metric", &column::<String>(row, "metric")?)?,
        current_value: column(row, "current_value")?,
        prev_value: column(row, "prev_value")?,
        delta_value: column(row, "delta_value")?,
        delta_pct: column(row, "delta_pct")?,
        confidence_score: column(row, "confidence_score")?,
        window_end: parse_date("window_end", &column::<String>(row, "window_end")?)?,
        evidence_listing_ids: serde_json::from_str(&evidence)?,
    })
}

fn summary_from_row(row: &SqliteRow) -> Result<MarketSummary, RepositoryError> {
    let active: Option<i64> = column(row, "active_listings_count")?;
    let stale: Option<i64> = column(row, "stale_listings_count")?;
    Ok(MarketSummary {
        tenant_id: TenantId::new(column::<String>(row, "org_id")?),
        geo_id: column(row, "geo_id")?,
        geo_name: column(row, "geo_name")?,
        segment: column(row, "segment")?,
        as_of_date: parse_date("as_of_date", &column::<String>(row, "as_of_date")?)?,
        median_dld_price: column(row, "median_dld_price")?,
        median_price_per_sqft: column(row, "median_price_per_sqft")?,
        median_rent_annual: column(row, "median_rent_annual")?,
        gross_yield_pct: column(row, "gross_yield_pct")?,
        active_listings_count: active.map(|value| count("active_listings_count", value)).transpose()?,
        price_cut_rate_pct: column(row, "price_cut_rate_pct")?,
        stale_listings_count: stale.map(|value| count("stale_listings_count", value)).transpose()?,
        summary_text: column(row, "summary_text")?,
    })
}
