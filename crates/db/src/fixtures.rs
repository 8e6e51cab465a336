use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

/// Demo customers a fresh database needs before quotations can be drafted.
const SEED_CUSTOMERS: &[SeedCustomer] = &[
    SeedCustomer { id: "cust-demo-001", name: "Acme Packaging" },
    SeedCustomer { id: "cust-demo-002", name: "Northwind Pharma" },
    SeedCustomer { id: "cust-demo-003", name: "Globex Foods" },
];

pub struct DemoSeedDataset;

impl DemoSeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed_data.sql");

    /// Loads the demo customers. Loading twice leaves the same rows behind.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult { customer_ids: SEED_CUSTOMERS.iter().map(|customer| customer.id).collect() })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_CUSTOMERS.len());
        for customer in SEED_CUSTOMERS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM customers WHERE id = ?1 AND name = ?2)",
            )
            .bind(customer.id)
            .bind(customer.name)
            .fetch_one(pool)
            .await?;
            checks.push((customer.id, present == 1));
        }

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo customers. Fails while quotations still reference them.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;
        for customer in SEED_CUSTOMERS {
            sqlx::query("DELETE FROM customers WHERE id = ?1")
                .bind(customer.id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedCustomer {
    id: &'static str,
    name: &'static str,
}

#[derive(Debug)]
pub struct SeedResult {
    pub customer_ids: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
