use sqlx::{Executor, Row};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Canonical demo dataset: the loadboard postings and carriers the
/// verification stub knows about, loaded by `loadline seed`.
const SEED_LOAD_IDS: &[&str] = &["LD001", "LD002", "LD003", "LD004"];

const SEED_CARRIER_MCS: &[&str] = &["123456", "789012", "456789", "999888"];

/// One available load per equipment type the demo carriers run.
const SEED_AVAILABLE_LOADS: usize = 3;

pub struct DemoSeedDataset;

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub loads_seeded: usize,
    pub carriers_seeded: usize,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

impl DemoSeedDataset {
    /// SQL fixture content for the demo dataset.
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Load the demo dataset. Idempotent: seeds insert-or-replace on fixed
    /// identifiers.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            loads_seeded: SEED_LOAD_IDS.len(),
            carriers_seeded: SEED_CARRIER_MCS.len(),
        })
    }

    /// Verify that the seeded rows exist and match the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let load_count = count_in(pool, "loads", "load_id", SEED_LOAD_IDS).await?;
        checks.push(("seed-loads-present", load_count == SEED_LOAD_IDS.len() as i64));

        let carrier_count = count_in(pool, "carriers", "mc_number", SEED_CARRIER_MCS).await?;
        checks.push(("seed-carriers-present", carrier_count == SEED_CARRIER_MCS.len() as i64));

        let available: i64 = sqlx::query("SELECT COUNT(*) AS count FROM loads WHERE is_available = 1")
            .fetch_one(pool)
            .await?
            .get("count");
        checks.push(("seed-available-loads", available >= SEED_AVAILABLE_LOADS as i64));

        let verified: i64 = sqlx::query(
            "SELECT COUNT(*) AS count FROM carriers WHERE is_verified = 1 AND fmcsa_status = 'ACTIVE'",
        )
        .fetch_one(pool)
        .await?
        .get("count");
        checks.push(("seed-verified-carriers", verified >= 3));

        let all_present = checks.iter().all(|(_, passed)| *passed);
        Ok(VerificationResult { all_present, checks })
    }
}

async fn count_in(
    pool: &DbPool,
    table: &str,
    column: &str,
    ids: &[&str],
) -> Result<i64, RepositoryError> {
    let placeholders =
        (1..=ids.len()).map(|n| format!("?{n}")).collect::<Vec<_>>().join(", ");
    let query =
        format!("SELECT COUNT(*) AS count FROM {table} WHERE {column} IN ({placeholders})");

    let mut prepared = sqlx::query(&query);
    for id in ids {
        prepared = prepared.bind(*id);
    }
    Ok(prepared.fetch_one(pool).await?.get("count"))
}

#[cfg(test)]
mod tests {
    use crate::{connect_with_settings, migrations, DemoSeedDataset};

    #[tokio::test]
    async fn seed_loads_and_verifies_against_the_contract() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        let result = DemoSeedDataset::load(&pool).await.expect("seed");
        assert_eq!(result.loads_seeded, 4);
        assert_eq!(result.carriers_seeded, 4);

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "failed checks: {:?}", verification.checks);
    }

    #[tokio::test]
    async fn seeding_twice_is_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrate");

        DemoSeedDataset::load(&pool).await.expect("first seed");
        DemoSeedDataset::load(&pool).await.expect("second seed");

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present);
    }
}
