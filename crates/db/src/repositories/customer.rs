use sqlx::{sqlite::SqliteRow, Row};

use presswork_core::domain::customer::{Customer, CustomerId};

use super::rows::{encode_timestamp, parse_timestamp};
use super::{CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, email, phone, created_at FROM customers WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(customer_from_row).transpose()
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customers (id, name, email, phone, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                email = excluded.email,
                phone = excluded.phone",
        )
        .bind(&customer.id.0)
        .bind(&customer.name)
        .bind(customer.email.as_deref())
        .bind(customer.phone.as_deref())
        .bind(encode_timestamp(&customer.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn customer_from_row(row: &SqliteRow) -> Result<Customer, RepositoryError> {
    Ok(Customer {
        id: CustomerId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use presswork_core::domain::customer::{Customer, CustomerId};

    use super::SqlCustomerRepository;
    use crate::repositories::CustomerRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn save_is_an_upsert_that_keeps_created_at() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlCustomerRepository::new(pool);
        let created_at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("timestamp");
        let customer = Customer {
            id: CustomerId("CUST-7".into()),
            name: "Northwind Labels".into(),
            email: Some("buying@northwind.test".into()),
            phone: None,
            created_at,
        };

        repo.save(customer.clone()).await.expect("save");
        repo.save(Customer {
            name: "Northwind Labels Ltd".into(),
            created_at: created_at + chrono::Duration::days(1),
            ..customer.clone()
        })
        .await
        .expect("resave");

        let found = repo.find_by_id(&customer.id).await.expect("find").expect("present");
        assert_eq!(found.name, "Northwind Labels Ltd");
        assert_eq!(found.created_at, created_at);
        assert_eq!(repo.find_by_id(&CustomerId("missing".into())).await.expect("find"), None);
    }
}
