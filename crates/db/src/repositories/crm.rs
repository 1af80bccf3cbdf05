use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use brickwise_core::domain::ids::{HoldingId, InvestorId, ListingId, TenantId};
use brickwise_core::domain::investor::{DealRoom, Holding, Investor, Memo, ShortlistItem};
use brickwise_core::domain::listing::{Listing, ListingSource, ReadinessStatus};
use brickwise_core::domain::mandate::Mandate;
use brickwise_core::errors::StoreError;
use brickwise_core::store::CrmStore;

use super::{
    column, count, decode_rows, parse_date, parse_decimal, parse_name_or, RepositoryError,
    DATE_FORMAT,
};
use crate::DbPool;

/// Read side of the CRM collaborator tables: investors, listings and the
/// per-investor lifecycle rows.
pub struct SqlCrmRepository {
    pool: DbPool,
}

impl SqlCrmRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save_investor(&self, investor: &Investor) -> Result<(), RepositoryError> {
        let mandate = investor.mandate.as_ref().map(serde_json::to_string).transpose()?;
        sqlx::query(
            "INSERT INTO investors (id, org_id, name, mandate)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 mandate = excluded.mandate",
        )
        .bind(investor.id.as_str())
        .bind(investor.tenant_id.as_str())
        .bind(&investor.name)
        .bind(mandate)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_listing(
        &self,
        tenant_id: &TenantId,
        listing: &Listing,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO listings
                (id, org_id, title, area, property_type, price, size, bedrooms, status,
                 trust_score, roi, readiness_status, source)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 area = excluded.area,
                 property_type = excluded.property_type,
                 price = excluded.price,
                 size = excluded.size,
                 bedrooms = excluded.bedrooms,
                 status = excluded.status,
                 trust_score = excluded.trust_score,
                 roi = excluded.roi,
                 readiness_status = excluded.readiness_status,
                 source = excluded.source",
        )
        .bind(listing.id.as_str())
        .bind(tenant_id.as_str())
        .bind(&listing.title)
        .bind(&listing.area)
        .bind(&listing.property_type)
        .bind(listing.price.to_string())
        .bind(listing.size)
        .bind(listing.bedrooms.map(i64::from))
        .bind(&listing.status)
        .bind(listing.trust_score)
        .bind(listing.roi)
        .bind(listing.readiness_status.as_str())
        .bind(listing.source.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_holding(
        &self,
        tenant_id: &TenantId,
        holding: &Holding,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO holdings
                (id, org_id, investor_id, property_id, purchase_price, purchase_date,
                 current_value, monthly_rent, occupancy_rate, annual_expenses)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 current_value = excluded.current_value,
                 monthly_rent = excluded.monthly_rent,
                 occupancy_rate = excluded.occupancy_rate,
                 annual_expenses = excluded.annual_expenses",
        )
        .bind(holding.id.as_str())
        .bind(tenant_id.as_str())
        .bind(holding.investor_id.as_str())
        .bind(holding.property_id.as_str())
        .bind(holding.purchase_price.to_string())
        .bind(holding.purchase_date.format(DATE_FORMAT).to_string())
        .bind(holding.current_value.to_string())
        .bind(holding.monthly_rent.to_string())
        .bind(holding.occupancy_rate)
        .bind(holding.annual_expenses.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_investor(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Option<Investor>, RepositoryError> {
        let row = sqlx::query("SELECT id, org_id, name, mandate FROM investors WHERE org_id = ? AND id = ?")
            .bind(tenant_id.as_str())
            .bind(investor_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(investor_from_row).transpose()
    }

    async fn load_investors(&self, tenant_id: &TenantId) -> Result<Vec<Investor>, RepositoryError> {
        let rows = sqlx::query("SELECT id, org_id, name, mandate FROM investors WHERE org_id = ? ORDER BY id")
            .bind(tenant_id.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(investor_from_row).collect()
    }

    async fn load_listings(&self, tenant_id: &TenantId) -> Result<Vec<Listing>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, title, area, property_type, price, size, bedrooms, status, trust_score,
                    roi, readiness_status, source
             FROM listings
             WHERE org_id = ?
             ORDER BY id",
        )
        .bind(tenant_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(decode_rows("listings", &rows, listing_from_row))
    }

    async fn load_holdings(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<Holding>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT h.id, h.investor_id, h.property_id, l.area, h.purchase_price, h.purchase_date,
                    h.current_value, h.monthly_rent, h.occupancy_rate, h.annual_expenses
             FROM holdings h
             LEFT JOIN listings l ON l.id = h.property_id AND l.org_id = h.org_id
             WHERE h.org_id = ? AND h.investor_id = ?
             ORDER BY h.id",
        )
        .bind(tenant_id.as_str())
        .bind(investor_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(holding_from_row).collect()
    }

    async fn load_shortlist_items(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<ShortlistItem>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT shortlist_id, investor_id, listing_id, match_score, rank
             FROM shortlist_items
             WHERE org_id = ? AND investor_id = ?
             ORDER BY shortlist_id, id",
        )
        .bind(tenant_id.as_str())
        .bind(investor_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let rank: Option<i64> = column(row, "rank")?;
                Ok(ShortlistItem {
                    shortlist_id: column(row, "shortlist_id")?,
                    investor_id: InvestorId::new(column::<String>(row, "investor_id")?),
                    listing_id: ListingId::new(column::<String>(row, "listing_id")?),
                    match_score: column(row, "match_score")?,
                    rank: rank.map(|value| count("rank", value)).transpose()?,
                })
            })
            .collect()
    }

    async fn load_memos(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<Memo>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, investor_id, listing_id, state FROM memos
             WHERE org_id = ? AND investor_id = ?
             ORDER BY id",
        )
        .bind(tenant_id.as_str())
        .bind(investor_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Memo {
                    id: column(row, "id")?,
                    listing_id: ListingId::new(column::<String>(row, "listing_id")?),
                    investor_id: InvestorId::new(column::<String>(row, "investor_id")?),
                    state: column(row, "state")?,
                })
            })
            .collect()
    }

    async fn load_deal_rooms(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<DealRoom>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, investor_id, property_id, status FROM deal_rooms
             WHERE org_id = ? AND investor_id = ?
             ORDER BY id",
        )
        .bind(tenant_id.as_str())
        .bind(investor_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(DealRoom {
                    id: column(row, "id")?,
                    property_id: ListingId::new(column::<String>(row, "property_id")?),
                    investor_id: InvestorId::new(column::<String>(row, "investor_id")?),
                    status: column(row, "status")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CrmStore for SqlCrmRepository {
    async fn find_investor(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Option<Investor>, StoreError> {
        Ok(self.load_investor(tenant_id, investor_id).await?)
    }

    async fn list_investors(&self, tenant_id: &TenantId) -> Result<Vec<Investor>, StoreError> {
        Ok(self.load_investors(tenant_id).await?)
    }

    async fn listings(&self, tenant_id: &TenantId) -> Result<Vec<Listing>, StoreError> {
        Ok(self.load_listings(tenant_id).await?)
    }

    async fn holdings(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<Holding>, StoreError> {
        Ok(self.load_holdings(tenant_id, investor_id).await?)
    }

    async fn shortlist_items(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<ShortlistItem>, StoreError> {
        Ok(self.load_shortlist_items(tenant_id, investor_id).await?)
    }

    async fn memos(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<Memo>, StoreError> {
        Ok(self.load_memos(tenant_id, investor_id).await?)
    }

    async fn deal_rooms(
        &self,
        tenant_id: &TenantId,
        investor_id: &InvestorId,
    ) -> Result<Vec<DealRoom>, StoreError> {
        Ok(self.load_deal_rooms(tenant_id, investor_id).await?)
    }
}

/// A mandate column that is not valid JSON is treated like a missing mandate.
fn investor_from_row(row: &SqliteRow) -> Result<Investor, RepositoryError> {
    let mandate: Option<String> = column(row, "mandate")?;
    let mandate = mandate
        .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
        .and_then(|document| Mandate::from_document(&document));

    Ok(Investor {
        id: InvestorId::new(column::<String>(row, "id")?),
        tenant_id: TenantId::new(column::<String>(row, "org_id")?),
        name: column(row, "name")?,
        mandate,
    })
}

fn listing_from_row(row: &SqliteRow) -> Result<Listing, RepositoryError> {
    let bedrooms: Option<i64> = column(row, "bedrooms")?;
    let bedrooms = bedrooms
        .map(|value| {
            u8::try_from(value).map_err(|_| {
                RepositoryError::Decode(format!("bedrooms `{value}` is out of range"))
            })
        })
        .transpose()?;

    Ok(Listing {
        id: ListingId::new(column::<String>(row, "id")?),
        title: column(row, "title")?,
        area: column(row, "area")?,
        property_type: column(row, "property_type")?,
        price: parse_decimal("price", &column::<String>(row, "price")?)?,
        size: column(row, "size")?,
        bedrooms,
        status: column(row, "status")?,
        trust_score: column(row, "trust_score")?,
        roi: column(row, "roi")?,
        readiness_status: parse_name_or(
            "readiness_status",
            &column::<String>(row, "readiness_status")?,
            ReadinessStatus::NeedsVerification,
        ),
        source: parse_name_or("source", &column::<String>(row, "source")?, ListingSource::Internal),
    })
}

fn holding_from_row(row: &SqliteRow) -> Result<Holding, RepositoryError> {
    Ok(Holding {
        id: HoldingId::new(column::<String>(row, "id")?),
        investor_id: InvestorId::new(column::<String>(row, "investor_id")?),
        property_id: ListingId::new(column::<String>(row, "property_id")?),
        area: column(row, "area")?,
        purchase_price: parse_decimal("purchase_price", &column::<String>(row, "purchase_price")?)?,
        purchase_date: parse_date("purchase_date", &column::<String>(row, "purchase_date")?)?,
        current_value: parse_decimal("current_value", &column::<String>(row, "current_value")?)?,
        monthly_rent: parse_decimal("monthly_rent", &column::<String>(row, "monthly_rent")?)?,
        occupancy_rate: column(row, "occupancy_rate")?,
        annual_expenses: parse_decimal(
            "annual_expenses",
            &column::<String>(row, "annual_expenses")?,
        )?,
    })
}
