use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use presswork_core::cpq::numbering::ORDER_NUMBERS;
use presswork_core::domain::customer::{Customer, CustomerId};
use presswork_core::domain::order::{NewOrder, Order, OrderId, OrderStatus};
use presswork_core::domain::quotation::{
    Quotation, QuotationFilter, QuotationHistoryEntry, QuotationId, QuotationStatus,
};

use super::{CustomerRepository, OrderRepository, QuotationRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryQuotationRepository {
    quotations: RwLock<HashMap<String, Quotation>>,
    history: RwLock<Vec<QuotationHistoryEntry>>,
}

fn ensure_number_free(
    quotations: &HashMap<String, Quotation>,
    quotation: &Quotation,
) -> Result<(), RepositoryError> {
    let taken = quotations.values().any(|existing| {
        existing.id != quotation.id && existing.quotation_number == quotation.quotation_number
    });
    if taken {
        return Err(RepositoryError::Conflict(format!(
            "quotation number `{}` already exists",
            quotation.quotation_number
        )));
    }
    Ok(())
}

fn suffix_order(number: &str) -> (usize, &str) {
    (number.len(), number)
}

fn matches_filter(quotation: &Quotation, filter: &QuotationFilter) -> bool {
    if filter.status.is_some_and(|status| status != quotation.status) {
        return false;
    }
    if filter.customer_id.as_ref().is_some_and(|customer| customer != &quotation.customer_id) {
        return false;
    }
    match filter.search_term() {
        Some(term) => {
            let term = term.to_ascii_lowercase();
            quotation.quotation_number.to_ascii_lowercase().contains(&term)
                || quotation
                    .spec
                    .product_name
                    .as_deref()
                    .is_some_and(|name| name.to_ascii_lowercase().contains(&term))
        }
        None => true,
    }
}

#[async_trait::async_trait]
impl QuotationRepository for InMemoryQuotationRepository {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, RepositoryError> {
        let quotations = self.quotations.read().await;
        Ok(quotations.get(&id.0).cloned())
    }

    async fn list(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>, RepositoryError> {
        let quotations = self.quotations.read().await;
        let mut matching: Vec<&Quotation> =
            quotations.values().filter(|quotation| matches_filter(quotation, filter)).collect();
        matching.sort_by(|left, right| {
            (right.created_at, &right.quotation_number)
                .cmp(&(left.created_at, &left.quotation_number))
        });

        Ok(matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.effective_limit() as usize)
            .cloned()
            .collect())
    }

    async fn latest_number_with_prefix(
        &self,
        prefix: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let quotations = self.quotations.read().await;
        Ok(quotations
            .values()
            .map(|quotation| quotation.quotation_number.as_str())
            .filter(|number| number.starts_with(prefix))
            .max_by_key(|number| suffix_order(number))
            .map(str::to_string))
    }

    async fn insert(&self, quotation: &Quotation) -> Result<(), RepositoryError> {
        let mut quotations = self.quotations.write().await;
        ensure_number_free(&quotations, quotation)?;
        if quotations.contains_key(&quotation.id.0) {
            return Err(RepositoryError::Conflict(format!("quotation `{}` already exists", quotation.id)));
        }
        quotations.insert(quotation.id.0.clone(), quotation.clone());
        Ok(())
    }

    async fn update(
        &self,
        quotation: &Quotation,
        _replace_items: bool,
    ) -> Result<(), RepositoryError> {
        let mut quotations = self.quotations.write().await;
        ensure_number_free(&quotations, quotation)?;
        quotations.insert(quotation.id.0.clone(), quotation.clone());
        Ok(())
    }

    async fn record_transition(
        &self,
        quotation: &Quotation,
        entry: &QuotationHistoryEntry,
    ) -> Result<(), RepositoryError> {
        let mut quotations = self.quotations.write().await;
        let mut history = self.history.write().await;
        quotations.insert(quotation.id.0.clone(), quotation.clone());
        history.push(entry.clone());
        Ok(())
    }

    async fn delete(&self, id: &QuotationId) -> Result<bool, RepositoryError> {
        let mut quotations = self.quotations.write().await;
        let mut history = self.history.write().await;
        let removed = quotations.remove(&id.0).is_some();
        for quotation in quotations.values_mut() {
            if quotation.parent_quotation_id.as_ref() == Some(id) {
                quotation.parent_quotation_id = None;
            }
        }
        history.retain(|entry| &entry.quotation_id != id);
        Ok(removed)
    }

    async fn list_history(
        &self,
        id: &QuotationId,
    ) -> Result<Vec<QuotationHistoryEntry>, RepositoryError> {
        let history = self.history.read().await;
        let mut entries: Vec<QuotationHistoryEntry> =
            history.iter().filter(|entry| &entry.quotation_id == id).cloned().collect();
        // stable sort keeps insertion order for equal timestamps
        entries.sort_by_key(|entry| entry.changed_at);
        Ok(entries)
    }

    async fn list_expirable(&self, as_of: NaiveDate) -> Result<Vec<Quotation>, RepositoryError> {
        let quotations = self.quotations.read().await;
        let mut stale: Vec<Quotation> = quotations
            .values()
            .filter(|quotation| {
                matches!(
                    quotation.status,
                    QuotationStatus::Draft | QuotationStatus::Sent | QuotationStatus::Approved
                ) && quotation.valid_until < as_of
            })
            .cloned()
            .collect();
        stale.sort_by_key(|quotation| (quotation.valid_until, quotation.created_at));
        Ok(stale)
    }
}

#[derive(Default)]
pub struct InMemoryCustomerRepository {
    customers: RwLock<HashMap<String, Customer>>,
}

#[async_trait::async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, RepositoryError> {
        let customers = self.customers.read().await;
        Ok(customers.get(&id.0).cloned())
    }

    async fn save(&self, customer: Customer) -> Result<(), RepositoryError> {
        let mut customers = self.customers.write().await;
        let created_at = customers.get(&customer.id.0).map(|existing| existing.created_at);
        let customer = Customer { created_at: created_at.unwrap_or(customer.created_at), ..customer };
        customers.insert(customer.id.0.clone(), customer);
        Ok(())
    }
}

/// Orders kept in memory. An unavailable store refuses every write, which is how
/// callers exercise their handling of a failing orders collaborator.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Order>>,
    unavailable: bool,
}

impl InMemoryOrderRepository {
    pub fn unavailable() -> Self {
        Self { orders: RwLock::default(), unavailable: true }
    }
}

#[async_trait::async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, details: NewOrder, actor_id: &str) -> Result<Order, RepositoryError> {
        if self.unavailable {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }

        let mut orders = self.orders.write().await;
        let now = Utc::now();
        let today = now.date_naive();
        let prefix = ORDER_NUMBERS.day_prefix(today);
        let latest = orders
            .values()
            .map(|order| order.order_number.as_str())
            .filter(|number| number.starts_with(prefix.as_str()))
            .max_by_key(|number| suffix_order(number));

        let order = Order {
            id: OrderId::generate(),
            order_number: ORDER_NUMBERS.next(today, latest),
            status: OrderStatus::Pending,
            details,
            created_by: actor_id.to_string(),
            created_at: now,
        };
        orders.insert(order.id.0.clone(), order.clone());
        Ok(order)
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.get(&id.0).cloned())
    }
}
