use crate::connection::DbPool;
use crate::repositories::RepositoryError;
use sqlx::Executor;
use tracing::info;

pub const DEMO_TENANT: &str = "org-demo";

/// Expected row count per seeded table for the demo tenant.
const SEED_TABLES: &[SeedTableContract] = &[
    SeedTableContract { table: "market_metric_snapshot", expected_rows: 11 },
    SeedTableContract { table: "portal_listing_snapshot", expected_rows: 4 },
    SeedTableContract { table: "listings", expected_rows: 6 },
    SeedTableContract { table: "investors", expected_rows: 3 },
    SeedTableContract { table: "holdings", expected_rows: 1 },
    SeedTableContract { table: "shortlist_items", expected_rows: 2 },
    SeedTableContract { table: "memos", expected_rows: 1 },
    SeedTableContract { table: "deal_rooms", expected_rows: 1 },
];

/// Tables written by the pipelines, cleared together with the seed.
const DERIVED_TABLES: &[&str] = &["market_signal_target", "market_signal", "ai_market_summary"];

const SEED_INVESTOR_IDS: &[&str] = &["inv-demo-1", "inv-demo-2", "inv-demo-3"];

/// Demo tenant with three communities, two monthly windows of metrics and
/// investors whose mandates exercise routing, scoring and counterfactuals.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        info!(
            event_name = "db.seed.demo.loaded",
            tenant_id = DEMO_TENANT,
            tables = SEED_TABLES.len(),
            "demo dataset loaded"
        );

        Ok(SeedResult {
            tenant_id: DEMO_TENANT,
            investor_ids: SEED_INVESTOR_IDS.to_vec(),
            tables_seeded: SEED_TABLES.len(),
        })
    }

    /// Verify that every seeded table holds exactly the expected demo rows.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for contract in SEED_TABLES {
            let rows: i64 = sqlx::query_scalar(&format!(
                "SELECT COUNT(1) FROM {} WHERE org_id = ?1",
                contract.table
            ))
            .bind(DEMO_TENANT)
            .fetch_one(pool)
            .await?;
            checks.push((contract.table, rows == contract.expected_rows));
        }

        let mandates: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM investors WHERE org_id = ?1 AND json_valid(mandate)",
        )
        .bind(DEMO_TENANT)
        .fetch_one(pool)
        .await?;
        checks.push(("investor-mandates", mandates == 2));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Remove the demo tenant, including anything the pipelines derived from it.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for table in DERIVED_TABLES
            .iter()
            .copied()
            .chain(SEED_TABLES.iter().rev().map(|contract| contract.table))
        {
            sqlx::query(&format!("DELETE FROM {table} WHERE org_id = ?1"))
                .bind(DEMO_TENANT)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(event_name = "db.seed.demo.cleaned", tenant_id = DEMO_TENANT, "demo dataset removed");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedTableContract {
    table: &'static str,
    expected_rows: i64,
}

#[derive(Debug, Clone)]
pub struct SeedResult {
    pub tenant_id: &'static str,
    pub investor_ids: Vec<&'static str>,
    pub tables_seeded: usize,
}

#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl VerificationResult {
    pub fn failed_checks(&self) -> Vec<&'static str> {
        self.checks.iter().filter(|(_, ok)| !ok).map(|(name, _)| *name).collect()
    }
}
