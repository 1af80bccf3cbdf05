use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::ids::{HoldingId, InvestorId, ListingId, TenantId};
use crate::domain::investor::{Holding, Investor};
use crate::domain::listing::{Listing, ListingSource, ReadinessStatus};
use crate::domain::mandate::Mandate;
use crate::domain::market::{MetricKind, MetricSnapshot, PortalSnapshot};
use crate::store::InMemoryStore;

pub fn tenant() -> TenantId {
    TenantId::new("org-1")
}

pub fn investor_id() -> InvestorId {
    InvestorId::new("inv-1")
}

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).expect("valid date")
}

pub fn mandate() -> Mandate {
    Mandate {
        property_types: vec!["apartment".to_string()],
        preferred_areas: vec!["Marina".to_string(), "JVC".to_string()],
        min_investment: Some(Decimal::new(1_000_000, 0)),
        max_investment: Some(Decimal::new(5_000_000, 0)),
        ..Mandate::default()
    }
}

pub fn listing(id: &str, area: &str, price: i64) -> Listing {
    Listing {
        id: ListingId::new(id),
        title: format!("Apartment in {area}"),
        area: area.to_string(),
        property_type: "apartment".to_string(),
        price: Decimal::new(price, 0),
        size: None,
        bedrooms: None,
        status: "available".to_string(),
        trust_score: Some(80.0),
        roi: Some(6.0),
        readiness_status: ReadinessStatus::Ready,
        source: ListingSource::Internal,
    }
}

pub fn holding(property_id: &str) -> Holding {
    Holding {
        id: HoldingId::new(format!("h-{property_id}")),
        investor_id: investor_id(),
        property_id: ListingId::new(property_id),
        area: None,
        purchase_price: Decimal::new(2_000_000, 0),
        purchase_date: NaiveDate::from_ymd_opt(2023, 5, 1).expect("valid date"),
        current_value: Decimal::new(2_300_000, 0),
        monthly_rent: Decimal::new(11_000, 0),
        occupancy_rate: 1.0,
        annual_expenses: Decimal::new(20_000, 0),
    }
}

pub fn metric(geo: &str, metric: MetricKind, value: f64, window_end: NaiveDate) -> MetricSnapshot {
    MetricSnapshot {
        geo_id: geo.to_lowercase().replace(' ', "-"),
        geo_name: geo.to_string(),
        segment: "apartment".to_string(),
        metric,
        value,
        sample_size: 64,
        window_end,
    }
}

pub fn portal(geo: &str, active: u32, cuts: u32, as_of_date: NaiveDate) -> PortalSnapshot {
    PortalSnapshot {
        geo_id: geo.to_lowercase().replace(' ', "-"),
        geo_name: geo.to_string(),
        segment: "apartment".to_string(),
        active_listings: active,
        price_cuts_count: cuts,
        stale_listings_count: 20,
        median_asking_psf: Some(1_650.0),
        as_of_date,
    }
}

/// Marina prices up 12% (watch), Marina supply up 40% (urgent), and listings in
/// and outside the investor's areas.
pub async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    let tenant = tenant();

    store
        .add_metric_snapshots(
            &tenant,
            [
                metric("Dubai Marina", MetricKind::MedianPricePsf, 1_500.0, date(8, 31)),
                metric("Dubai Marina", MetricKind::MedianPricePsf, 1_680.0, date(9, 30)),
                metric("Business Bay", MetricKind::MedianPricePsf, 2_000.0, date(8, 31)),
                metric("Business Bay", MetricKind::MedianPricePsf, 2_010.0, date(9, 30)),
            ],
        )
        .await;
    store
        .add_portal_snapshots(
            &tenant,
            [portal("Dubai Marina", 300, 30, date(8, 31)), portal("Dubai Marina", 420, 30, date(9, 30))],
        )
        .await;
    store
        .add_investor(Investor {
            id: investor_id(),
            tenant_id: tenant.clone(),
            name: "Al Noor Family Office".to_string(),
            mandate: Some(mandate()),
        })
        .await;
    store
        .add_investor(Investor {
            id: InvestorId::new("inv-2"),
            tenant_id: tenant.clone(),
            name: "No Mandate Holdings".to_string(),
            mandate: None,
        })
        .await;
    store
        .add_listings(
            &tenant,
            [
                listing("lst-marina-1", "Dubai Marina", 3_000_000),
                listing("lst-marina-2", "Dubai Marina", 6_000_000),
                listing("lst-bay-1", "Business Bay", 2_500_000),
            ],
        )
        .await;

    store
}
