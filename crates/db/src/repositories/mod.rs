use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use presswork_core::domain::customer::{Customer, CustomerId};
use presswork_core::domain::order::{NewOrder, Order, OrderId};
use presswork_core::domain::quotation::{
    Quotation, QuotationFilter, QuotationHistoryEntry, QuotationId,
};

pub mod customer;
pub mod memory;
pub mod order;
pub mod quotation;
mod rows;

pub use customer::SqlCustomerRepository;
pub use memory::{InMemoryCustomerRepository, InMemoryOrderRepository, InMemoryQuotationRepository};
pub use order::SqlOrderRepository;
pub use quotation::SqlQuotationRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

impl RepositoryError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Turns unique-constraint violations into [`RepositoryError::Conflict`].
pub(crate) fn map_write_error(error: sqlx::Error, what: &str) -> RepositoryError {
    match &error {
        sqlx::Error::Database(database) if database.is_unique_violation() => {
            RepositoryError::Conflict(format!("{what} already exists"))
        }
        _ => RepositoryError::Database(error),
    }
}

#[async_trait]
pub trait QuotationRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError>;

    /// Newest first, filtered and paged by `filter`.
    async fn list(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>, RepositoryError>;

    /// Highest quotation number starting with `prefix`, compared numerically on the suffix.
    async fn latest_number_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<String>, RepositoryError>;

    /// Stores a new quotation and its items. A taken number yields `Conflict`.
    async fn insert(&self, quotation: &Quotation) -> Result<(), RepositoryError>;

    /// Rewrites the quotation row, and its items when `replace_items` is set.
    async fn update(&self, quotation: &Quotation, replace_items: bool)
        -> Result<(), RepositoryError>;

    /// Persists a status change together with its history entry, atomically.
    async fn record_transition(
        &self,
        quotation: &Quotation,
        entry: &QuotationHistoryEntry,
    ) -> Result<(), RepositoryError>;

    /// Hard delete; items and history go with it. Returns whether a row was removed.
    async fn delete(&self, id: &QuotationId) -> Result<bool, RepositoryError>;

    async fn list_history(
        &self,
        id: &QuotationId,
    ) -> Result<Vec<QuotationHistoryEntry>, RepositoryError>;

    /// Draft, sent and approved quotations whose validity ended before `as_of`.
    async fn list_expirable(&self, as_of: NaiveDate) -> Result<Vec<Quotation>, RepositoryError>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError>;
    async fn save(&self, customer: Customer) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Creates a pending order with the next `ORD-YYYYMMDD-NNN` number.
    async fn create(&self, order: NewOrder, actor_id: &str) -> Result<Order, RepositoryError>;
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
}
