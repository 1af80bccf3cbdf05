use std::sync::Arc;

use chrono::NaiveDate;

use brickwise_core::domain::ids::{InvestorId, ListingId, TenantId};
use brickwise_core::domain::market::SignalStatus;
use brickwise_core::domain::opportunity::{LifecycleStage, OpportunityOptions};
use brickwise_core::pipeline::{
    OpportunityService, PipelineSettings, SignalTriage, SignalsPipeline, SummaryPipeline,
};
use brickwise_core::store::{CrmStore, MarketStore};
use brickwise_db::{
    connect_with_settings, migrations, DbPool, DemoSeedDataset, SqlCrmRepository,
    SqlMarketRepository, DEMO_TENANT,
};

type DemoTestResult<T = ()> = Result<T, String>;

macro_rules! require {
    ($cond:expr) => {
        if !$cond {
            return Err(format!("assertion failed: `{}`", stringify!($cond)));
        }
    };
    ($cond:expr, $($arg:tt)*) => {
        if !$cond {
            return Err(format!($($arg)*));
        }
    };
}

macro_rules! require_eq {
    ($left:expr, $right:expr) => {
        if $left != $right {
            return Err(format!(
                "assertion failed: `left == right` (`{:?}` != `{:?}`)",
                $left,
                $right
            ));
        }
    };
}

struct Demo {
    pool: DbPool,
    market: Arc<dyn MarketStore>,
    crm: Arc<dyn CrmStore>,
    tenant: TenantId,
}

async fn seeded_demo() -> DemoTestResult<Demo> {
    let pool: DbPool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .map_err(|error| format!("connect: {error}"))?;
    migrations::run_pending(&pool).await.map_err(|error| format!("migrate: {error}"))?;
    DemoSeedDataset::load(&pool).await.map_err(|error| format!("seed: {error}"))?;

    Ok(Demo {
        market: Arc::new(SqlMarketRepository::new(pool.clone())),
        crm: Arc::new(SqlCrmRepository::new(pool.clone())),
        pool,
        tenant: TenantId::new(DEMO_TENANT),
    })
}

fn demo_date(month: u32, day: u32) -> DemoTestResult<NaiveDate> {
    NaiveDate::from_ymd_opt(2026, month, day).ok_or_else(|| "invalid date".to_string())
}

#[tokio::test]
async fn signals_pipeline_over_demo_tenant_is_idempotent() -> DemoTestResult {
    let demo = seeded_demo().await?;
    let pipeline =
        SignalsPipeline::new(demo.market.clone(), demo.crm.clone(), PipelineSettings::default());

    let first = pipeline.run(&demo.tenant).await;
    require!(first.success, "first run errors: {:?}", first.errors);
    require!(first.truth_created > 0, "expected official signals");
    require!(first.portal_created > 0, "expected portal signals");
    require!(first.mappings_created > 0, "expected routed mappings");

    let second = pipeline.run(&demo.tenant).await;
    require!(second.success, "second run errors: {:?}", second.errors);
    require_eq!(
        (second.truth_created, second.portal_created, second.mappings_created),
        (0, 0, 0)
    );

    let stored = demo.market.list_signals(&demo.tenant).await.map_err(|error| error.to_string())?;
    require_eq!(stored.len(), first.truth_created + first.portal_created);
    require!(stored.iter().all(|signal| signal.status == SignalStatus::New));
    Ok(())
}

#[tokio::test]
async fn opportunities_reflect_demo_lifecycle() -> DemoTestResult {
    let demo = seeded_demo().await?;
    SignalsPipeline::new(demo.market.clone(), demo.crm.clone(), PipelineSettings::default())
        .run(&demo.tenant)
        .await;
    let service =
        OpportunityService::new(demo.market.clone(), demo.crm.clone(), PipelineSettings::default());

    let result = service
        .compute_opportunities(
            &demo.tenant,
            &InvestorId::new("inv-demo-1"),
            OpportunityOptions::default(),
        )
        .await
        .map_err(|error| error.to_string())?;

    require!(result.errors.is_empty(), "degraded lookups: {:?}", result.errors);
    let marina = result
        .items
        .iter()
        .find(|item| item.listing_id == ListingId::new("lst-demo-marina-1"))
        .ok_or_else(|| "lst-demo-marina-1 should be an opportunity".to_string())?;
    require_eq!(marina.lifecycle.stage, LifecycleStage::Memo);
    require!(marina.lifecycle.is_memo_approved);
    require!(!marina.sources.signals.is_empty(), "marina listing should carry signals");
    require!(result
        .items
        .iter()
        .all(|item| item.listing_id != ListingId::new("lst-demo-jvc-2")));
    Ok(())
}

#[tokio::test]
async fn unrecognised_listing_rows_do_not_empty_the_ranking() -> DemoTestResult {
    let demo = seeded_demo().await?;
    let service =
        OpportunityService::new(demo.market.clone(), demo.crm.clone(), PipelineSettings::default());
    let investor = InvestorId::new("inv-demo-1");
    let before = service
        .compute_opportunities(&demo.tenant, &investor, OpportunityOptions::default())
        .await
        .map_err(|error| error.to_string())?;

    sqlx::query(
        "INSERT INTO listings
            (id, org_id, title, area, property_type, price, bedrooms, readiness_status)
         VALUES ('lst-demo-marina-9', 'org-demo', 'Marina 2BR under review', 'Dubai Marina',
                 'apartment', '3100000', 2, 'UNDER_REVIEW'),
                ('lst-demo-marina-10', 'org-demo', 'Marina price on request', 'Dubai Marina',
                 'apartment', 'POA', 2, 'READY')",
    )
    .execute(&demo.pool)
    .await
    .map_err(|error| format!("insert: {error}"))?;

    let after = service
        .compute_opportunities(&demo.tenant, &investor, OpportunityOptions::default())
        .await
        .map_err(|error| error.to_string())?;

    require!(after.errors.is_empty(), "degraded lookups: {:?}", after.errors);
    require_eq!(after.items.len(), before.items.len() + 1);
    require!(after
        .items
        .iter()
        .any(|item| item.listing_id == ListingId::new("lst-demo-marina-9")));
    require!(after
        .items
        .iter()
        .all(|item| item.listing_id != ListingId::new("lst-demo-marina-10")));
    Ok(())
}

#[tokio::test]
async fn counterfactuals_explain_over_budget_listing() -> DemoTestResult {
    let demo = seeded_demo().await?;
    let service =
        OpportunityService::new(demo.market.clone(), demo.crm.clone(), PipelineSettings::default());

    let result = service
        .compute_counterfactuals(&demo.tenant, &InvestorId::new("inv-demo-1"))
        .await
        .map_err(|error| error.to_string())?;

    let over_budget = result
        .counterfactuals
        .iter()
        .find(|item| item.property_id == ListingId::new("lst-demo-marina-2"))
        .ok_or_else(|| "lst-demo-marina-2 should be a counterfactual".to_string())?;
    require!(
        over_budget.reason_codes.iter().any(|code| code == "over_budget"),
        "reason codes: {:?}",
        over_budget.reason_codes
    );
    require!(result
        .recommended
        .iter()
        .all(|candidate| candidate.property_id != ListingId::new("lst-demo-marina-2")));
    Ok(())
}

#[tokio::test]
async fn summaries_upsert_per_community() -> DemoTestResult {
    let demo = seeded_demo().await?;
    let pipeline = SummaryPipeline::new(demo.market.clone(), PipelineSettings::default());
    let as_of = demo_date(10, 1)?;

    let first = pipeline.run(&demo.tenant, as_of).await;
    let second = pipeline.run(&demo.tenant, as_of).await;

    require!(first.success, "first run errors: {:?}", first.errors);
    require_eq!((first.summaries_created, first.summaries_updated), (3, 0));
    require_eq!((second.summaries_created, second.summaries_updated), (0, 3));
    let stored =
        demo.market.list_summaries(&demo.tenant).await.map_err(|error| error.to_string())?;
    require_eq!(stored.len(), 3);
    require!(stored.iter().all(|summary| !summary.summary_text.is_empty()));
    Ok(())
}

#[tokio::test]
async fn triage_persists_status_changes() -> DemoTestResult {
    let demo = seeded_demo().await?;
    SignalsPipeline::new(demo.market.clone(), demo.crm.clone(), PipelineSettings::default())
        .run(&demo.tenant)
        .await;
    let signals = demo.market.list_signals(&demo.tenant).await.map_err(|error| error.to_string())?;
    let signal_id =
        signals.first().map(|signal| signal.id.clone()).ok_or_else(|| "no signals".to_string())?;
    let triage = SignalTriage::new(demo.market.clone());

    triage.acknowledge(&demo.tenant, &signal_id).await.map_err(|error| error.to_string())?;
    let dismissed =
        triage.dismiss(&demo.tenant, &signal_id).await.map_err(|error| error.to_string())?;

    require_eq!(dismissed.previous, SignalStatus::Acknowledged);
    let stored = demo
        .market
        .find_signal(&demo.tenant, &signal_id)
        .await
        .map_err(|error| error.to_string())?
        .ok_or_else(|| "signal disappeared".to_string())?;
    require_eq!(stored.status, SignalStatus::Dismissed);
    require!(triage.route(&demo.tenant, &signal_id).await.is_err());
    Ok(())
}
