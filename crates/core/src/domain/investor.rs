use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::{HoldingId, InvestorId, ListingId, TenantId};
use crate::domain::mandate::Mandate;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Investor {
    pub id: InvestorId,
    pub tenant_id: TenantId,
    pub name: String,
    pub mandate: Option<Mandate>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub id: HoldingId,
    pub investor_id: InvestorId,
    pub property_id: ListingId,
    /// Area of the held property, resolved from the listings table when known.
    pub area: Option<String>,
    pub purchase_price: Decimal,
    pub purchase_date: NaiveDate,
    pub current_value: Decimal,
    pub monthly_rent: Decimal,
    /// Fraction of the year the unit is let, 0..=1.
    pub occupancy_rate: f64,
    pub annual_expenses: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShortlistItem {
    pub shortlist_id: String,
    pub investor_id: InvestorId,
    pub listing_id: ListingId,
    pub match_score: Option<f64>,
    pub rank: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Memo {
    pub id: String,
    pub listing_id: ListingId,
    pub investor_id: InvestorId,
    pub state: String,
}

impl Memo {
    pub fn is_approved(&self) -> bool {
        self.state.trim().eq_ignore_ascii_case("approved")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DealRoom {
    pub id: String,
    pub property_id: ListingId,
    pub investor_id: InvestorId,
    pub status: String,
}

impl DealRoom {
    /// Closed or cancelled rooms no longer count as an active deal.
    pub fn is_active(&self) -> bool {
        let status = self.status.trim().to_ascii_lowercase();
        !matches!(status.as_str(), "cancelled" | "canceled" | "lost" | "archived")
    }
}
