use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use presswork_core::cpq::numbering::ORDER_NUMBERS;
use presswork_core::domain::order::{NewOrder, Order, OrderId, OrderStatus};

use super::rows::{encode_date, encode_json, encode_timestamp, parse_json, parse_timestamp};
use super::{map_write_error, OrderRepository, RepositoryError};
use crate::DbPool;

/// Attempts at allocating a free order number before giving up.
pub const ORDER_NUMBER_ATTEMPTS: usize = 3;

/// Minimal orders store standing in for the production module: it only assigns
/// numbers and keeps the converted details.
pub struct SqlOrderRepository {
    pool: DbPool,
}

impl SqlOrderRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn next_number(&self) -> Result<String, RepositoryError> {
        let today = Utc::now().date_naive();
        let latest = sqlx::query_scalar::<_, String>(
            "SELECT order_number
             FROM orders
             WHERE order_number LIKE ?
             ORDER BY length(order_number) DESC, order_number DESC
             LIMIT 1",
        )
        .bind(format!("{}%", ORDER_NUMBERS.day_prefix(today)))
        .fetch_optional(&self.pool)
        .await?;

        Ok(ORDER_NUMBERS.next(today, latest.as_deref()))
    }

    async fn try_insert(&self, order: &Order) -> Result<(), RepositoryError> {
        let details = &order.details;
        sqlx::query(
            "INSERT INTO orders (
                id,
                order_number,
                quotation_id,
                customer_id,
                status,
                total_amount,
                order_date,
                delivery_date,
                details_json,
                created_by,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.id.0)
        .bind(&order.order_number)
        .bind(&details.quotation_id.0)
        .bind(&details.customer_id.0)
        .bind(order.status.as_str())
        .bind(details.total_amount.to_string())
        .bind(encode_date(details.order_date))
        .bind(encode_date(details.delivery_date))
        .bind(encode_json("details_json", details)?)
        .bind(&order.created_by)
        .bind(encode_timestamp(&order.created_at))
        .execute(&self.pool)
        .await
        .map_err(|error| map_write_error(error, &format!("order number `{}`", order.order_number)))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderRepository for SqlOrderRepository {
    async fn create(&self, details: NewOrder, actor_id: &str) -> Result<Order, RepositoryError> {
        let mut order = Order {
            id: OrderId::generate(),
            order_number: String::new(),
            status: OrderStatus::Pending,
            details,
            created_by: actor_id.to_string(),
            created_at: Utc::now(),
        };

        let mut last_conflict = None;
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            order.order_number = self.next_number().await?;
            match self.try_insert(&order).await {
                Ok(()) => return Ok(order),
                Err(error @ RepositoryError::Conflict(_)) => last_conflict = Some(error),
                Err(error) => return Err(error),
            }
        }

        Err(last_conflict
            .unwrap_or_else(|| RepositoryError::Conflict("order number allocation failed".into())))
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, order_number, status, details_json, created_by, created_at
             FROM orders
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }
}

fn order_from_row(row: &SqliteRow) -> Result<Order, RepositoryError> {
    let status_raw = row.try_get::<String, _>("status")?;
    let status = OrderStatus::parse(&status_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown order status `{status_raw}`")))?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        order_number: row.try_get("order_number")?,
        status,
        details: parse_json("details_json", row.try_get("details_json")?)?,
        created_by: row.try_get("created_by")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
