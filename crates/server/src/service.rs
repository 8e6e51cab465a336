use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use presswork_core::cpq::numbering::QUOTATION_NUMBERS;
use presswork_core::cpq::{
    PricingBreakdown, PricingEngine, PricingInput, PricingRates, RateCardPricingEngine,
};
use presswork_core::domain::actor::Actor;
use presswork_core::domain::customer::CustomerId;
use presswork_core::domain::order::{Order, OrderOverrides};
use presswork_core::domain::quotation::{
    NewQuotation, Quotation, QuotationFilter, QuotationHistoryEntry, QuotationId, QuotationUpdate,
};
use presswork_core::errors::{ApplicationError, DomainError};
use presswork_core::lifecycle::{complete_conversion, prepare_conversion, revise, QuotationLifecycle};
use presswork_db::repositories::{SqlCustomerRepository, SqlOrderRepository, SqlQuotationRepository};
use presswork_db::{CustomerRepository, DbPool, OrderRepository, QuotationRepository, RepositoryError};

/// Attempts at claiming a free quotation number before the create fails.
pub const NUMBER_ALLOCATION_ATTEMPTS: usize = 3;

/// Who is calling, and the id their request is logged under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub actor: Actor,
    pub correlation_id: String,
}

impl RequestContext {
    pub fn new(actor: Actor, correlation_id: impl Into<String>) -> Self {
        Self { actor, correlation_id: correlation_id.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversionOutcome {
    pub quotation: Quotation,
    pub order: Order,
}

/// Runs quotation operations against the repositories. Every method loads what it
/// needs, applies the lifecycle rules, and persists the result in one write.
pub struct QuotationService {
    quotations: Arc<dyn QuotationRepository>,
    customers: Arc<dyn CustomerRepository>,
    orders: Arc<dyn OrderRepository>,
    lifecycle: QuotationLifecycle<RateCardPricingEngine>,
}

impl QuotationService {
    pub fn new(
        quotations: Arc<dyn QuotationRepository>,
        customers: Arc<dyn CustomerRepository>,
        orders: Arc<dyn OrderRepository>,
        rates: PricingRates,
    ) -> Self {
        Self {
            quotations,
            customers,
            orders,
            lifecycle: QuotationLifecycle::new(RateCardPricingEngine::new(rates)),
        }
    }

    pub fn sql(pool: DbPool, rates: PricingRates) -> Self {
        Self::new(
            Arc::new(SqlQuotationRepository::new(pool.clone())),
            Arc::new(SqlCustomerRepository::new(pool.clone())),
            Arc::new(SqlOrderRepository::new(pool)),
            rates,
        )
    }

    #[cfg(test)]
    pub fn in_memory(rates: PricingRates) -> Self {
        use presswork_db::repositories::{
            InMemoryCustomerRepository, InMemoryOrderRepository, InMemoryQuotationRepository,
        };

        Self::new(
            Arc::new(InMemoryQuotationRepository::default()),
            Arc::new(InMemoryCustomerRepository::default()),
            Arc::new(InMemoryOrderRepository::default()),
            rates,
        )
    }

    pub fn calculate(&self, input: &PricingInput) -> Result<PricingBreakdown, ApplicationError> {
        Ok(self.lifecycle.pricing().price(input)?)
    }

    pub async fn create(
        &self,
        input: NewQuotation,
        ctx: &RequestContext,
    ) -> Result<Quotation, ApplicationError> {
        input.validate()?;
        self.ensure_customer(&input.customer_id).await?;

        let now = Utc::now();
        let quotation = self
            .insert_numbered(now.date_naive(), ctx, |number| {
                self.lifecycle.draft(input.clone(), number, &ctx.actor, now)
            })
            .await?;

        info!(
            event_name = "quotation.created",
            correlation_id = %ctx.correlation_id,
            quotation_id = %quotation.id,
            quotation_number = %quotation.quotation_number,
            actor_id = %ctx.actor.id,
            total_amount = %quotation.total_amount(),
            "quotation drafted"
        );
        Ok(quotation)
    }

    pub async fn list(&self, filter: &QuotationFilter) -> Result<Vec<Quotation>, ApplicationError> {
        self.quotations.list(filter).await.map_err(persistence)
    }

    pub async fn get(&self, id: &QuotationId) -> Result<Quotation, ApplicationError> {
        self.quotations
            .find_by_id(id)
            .await
            .map_err(persistence)?
            .ok_or_else(|| ApplicationError::not_found("quotation", id.0.clone()))
    }

    pub async fn update(
        &self,
        id: &QuotationId,
        update: QuotationUpdate,
        ctx: &RequestContext,
    ) -> Result<Quotation, ApplicationError> {
        let mut quotation = self.get(id).await?;
        self.lifecycle.ensure_editable(&quotation)?;
        if let Some(customer_id) = &update.customer_id {
            self.ensure_customer(customer_id).await?;
        }

        let repriced = update.touches_pricing();
        let items_replaced = self.lifecycle.apply_update(&mut quotation, update, Utc::now())?;
        self.quotations.update(&quotation, items_replaced).await.map_err(persistence)?;

        info!(
            event_name = "quotation.updated",
            correlation_id = %ctx.correlation_id,
            quotation_id = %quotation.id,
            actor_id = %ctx.actor.id,
            repriced,
            items_replaced,
            "quotation updated"
        );
        Ok(quotation)
    }

    pub async fn send(
        &self,
        id: &QuotationId,
        ctx: &RequestContext,
    ) -> Result<Quotation, ApplicationError> {
        let mut quotation = self.get(id).await?;
        let entry = self.lifecycle.send(&mut quotation, &ctx.actor, Utc::now())?;
        self.record(&quotation, &entry, ctx, "quotation.sent").await?;
        Ok(quotation)
    }

    pub async fn approve(
        &self,
        id: &QuotationId,
        ctx: &RequestContext,
    ) -> Result<Quotation, ApplicationError> {
        let mut quotation = self.get(id).await?;
        let entry = self.lifecycle.approve(&mut quotation, &ctx.actor, Utc::now())?;
        self.record(&quotation, &entry, ctx, "quotation.approved").await?;
        Ok(quotation)
    }

    pub async fn reject(
        &self,
        id: &QuotationId,
        reason: Option<String>,
        ctx: &RequestContext,
    ) -> Result<Quotation, ApplicationError> {
        let mut quotation = self.get(id).await?;
        let entry = self.lifecycle.reject(&mut quotation, reason, &ctx.actor, Utc::now())?;
        self.record(&quotation, &entry, ctx, "quotation.rejected").await?;
        Ok(quotation)
    }

    pub async fn remove(&self, id: &QuotationId, ctx: &RequestContext) -> Result<(), ApplicationError> {
        let quotation = self.get(id).await?;
        self.lifecycle.ensure_removable(&quotation)?;
        if !self.quotations.delete(id).await.map_err(persistence)? {
            return Err(ApplicationError::not_found("quotation", id.0.clone()));
        }

        info!(
            event_name = "quotation.removed",
            correlation_id = %ctx.correlation_id,
            quotation_id = %id,
            actor_id = %ctx.actor.id,
            status = %quotation.status,
            "quotation removed"
        );
        Ok(())
    }

    pub async fn create_revision(
        &self,
        id: &QuotationId,
        ctx: &RequestContext,
    ) -> Result<Quotation, ApplicationError> {
        let source = self.get(id).await?;
        let now = Utc::now();
        let revision = self
            .insert_numbered(now.date_naive(), ctx, |number| {
                Ok(revise(&source, number, &ctx.actor, now))
            })
            .await?;

        info!(
            event_name = "quotation.revised",
            correlation_id = %ctx.correlation_id,
            quotation_id = %revision.id,
            parent_quotation_id = %source.id,
            version = revision.version,
            actor_id = %ctx.actor.id,
            "quotation revision drafted"
        );
        Ok(revision)
    }

    pub async fn convert_to_order(
        &self,
        id: &QuotationId,
        overrides: OrderOverrides,
        ctx: &RequestContext,
    ) -> Result<ConversionOutcome, ApplicationError> {
        let mut quotation = self.get(id).await?;
        let new_order = prepare_conversion(&quotation, overrides, Utc::now().date_naive())?;

        let order = self.orders.create(new_order, &ctx.actor.id).await.map_err(|error| {
            warn!(
                event_name = "quotation.conversion_failed",
                correlation_id = %ctx.correlation_id,
                quotation_id = %quotation.id,
                error = %error,
                "orders collaborator refused the conversion"
            );
            ApplicationError::Integration(format!("order creation failed: {error}"))
        })?;

        let entry = complete_conversion(&mut quotation, &order, &ctx.actor, Utc::now())?;
        self.record(&quotation, &entry, ctx, "quotation.converted").await?;
        Ok(ConversionOutcome { quotation, order })
    }

    pub async fn history(
        &self,
        id: &QuotationId,
    ) -> Result<Vec<QuotationHistoryEntry>, ApplicationError> {
        self.get(id).await?;
        self.quotations.list_history(id).await.map_err(persistence)
    }

    async fn ensure_customer(&self, id: &CustomerId) -> Result<(), ApplicationError> {
        match self.customers.find_by_id(id).await.map_err(persistence)? {
            Some(_) => Ok(()),
            None => Err(DomainError::Validation(format!("customer `{id}` does not exist")).into()),
        }
    }

    /// Builds a quotation around the next free number and inserts it, retrying when
    /// a concurrent writer claimed the same number first.
    async fn insert_numbered<F>(
        &self,
        date: NaiveDate,
        ctx: &RequestContext,
        build: F,
    ) -> Result<Quotation, ApplicationError>
    where
        F: Fn(String) -> Result<Quotation, DomainError>,
    {
        let prefix = QUOTATION_NUMBERS.day_prefix(date);
        for attempt in 1..=NUMBER_ALLOCATION_ATTEMPTS {
            let latest =
                self.quotations.latest_number_with_prefix(&prefix).await.map_err(persistence)?;
            let quotation = build(QUOTATION_NUMBERS.next(date, latest.as_deref()))?;
            match self.quotations.insert(&quotation).await {
                Ok(()) => return Ok(quotation),
                Err(error) if error.is_conflict() => {
                    warn!(
                        event_name = "quotation.number_conflict",
                        correlation_id = %ctx.correlation_id,
                        quotation_number = %quotation.quotation_number,
                        attempt,
                        "quotation number taken, retrying"
                    );
                }
                Err(error) => return Err(persistence(error)),
            }
        }

        Err(ApplicationError::Persistence(format!(
            "could not allocate a quotation number after {NUMBER_ALLOCATION_ATTEMPTS} attempts"
        )))
    }

    async fn record(
        &self,
        quotation: &Quotation,
        entry: &QuotationHistoryEntry,
        ctx: &RequestContext,
        event_name: &'static str,
    ) -> Result<(), ApplicationError> {
        self.quotations.record_transition(quotation, entry).await.map_err(persistence)?;
        info!(
            event_name,
            correlation_id = %ctx.correlation_id,
            quotation_id = %quotation.id,
            actor_id = %ctx.actor.id,
            old_status = %entry.old_status,
            new_status = %entry.new_status,
            "quotation status changed"
        );
        Ok(())
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;

    use presswork_core::cpq::{PricingInput, PricingRates};
    use presswork_core::domain::actor::{Actor, ActorRole};
    use presswork_core::domain::customer::{Customer, CustomerId};
    use presswork_core::domain::order::{OrderOverrides, OrderStatus};
    use presswork_core::domain::quotation::{
        NewQuotation, QuotationFilter, QuotationId, QuotationStatus, QuotationUpdate,
    };
    use presswork_core::errors::{ApplicationError, DomainError};
    use presswork_db::repositories::{
        InMemoryCustomerRepository, InMemoryOrderRepository, InMemoryQuotationRepository,
    };
    use presswork_db::CustomerRepository;

    use super::{QuotationService, RequestContext};

    fn ctx() -> RequestContext {
        RequestContext::new(Actor::new("u-sales", ActorRole::Sales), "test-correlation")
    }

    async fn service_with_orders(orders: InMemoryOrderRepository) -> QuotationService {
        let customers = Arc::new(InMemoryCustomerRepository::default());
        customers
            .save(Customer {
                id: CustomerId("CUST-1".into()),
                name: "Acme Packaging".into(),
                email: None,
                phone: None,
                created_at: Utc::now(),
            })
            .await
            .expect("seed customer");
        QuotationService::new(
            Arc::new(InMemoryQuotationRepository::default()),
            customers,
            Arc::new(orders),
            PricingRates::default(),
        )
    }

    async fn service() -> QuotationService {
        service_with_orders(InMemoryOrderRepository::default()).await
    }

    fn scenario() -> NewQuotation {
        serde_json::from_value(serde_json::json!({
            "customer_id": "CUST-1",
            "notes": "Reprint of last year's run",
            "spec": {
                "product_type": "carton",
                "product_name": "Cough syrup carton",
                "quantity": 1000,
                "length_mm": "300",
                "width_mm": "200",
                "gsm": 300,
                "color_front": 4,
                "color_back": 0
            },
            "terms": { "profit_margin_percent": "20", "discount_percent": "0", "tax_percent": "18" }
        }))
        .expect("scenario payload")
    }

    fn is_invalid_transition(error: &ApplicationError) -> bool {
        matches!(error, ApplicationError::Domain(DomainError::InvalidStateTransition { .. }))
    }

    #[tokio::test]
    async fn create_prices_numbers_and_defaults_validity() {
        let service = service().await;
        let first = service.create(scenario(), &ctx()).await.expect("create");
        let second = service.create(scenario(), &ctx()).await.expect("create again");

        let prefix = format!("QUO-{}-", Utc::now().date_naive().format("%Y%m%d"));
        assert_eq!(first.quotation_number, format!("{prefix}001"));
        assert_eq!(second.quotation_number, format!("{prefix}002"));
        assert_eq!(first.status, QuotationStatus::Draft);
        assert_eq!(first.version, 1);
        assert_eq!(first.valid_until, first.quotation_date + Duration::days(30));
        assert_eq!(first.pricing.tax_amount, Decimal::new(97_870, 2));
        assert_eq!(first.pricing.total_amount, Decimal::new(641_590, 2));
        assert!(service.history(&first.id).await.expect("history").is_empty());
    }

    #[tokio::test]
    async fn create_requires_an_existing_customer() {
        let service = service().await;
        let mut input = scenario();
        input.customer_id = CustomerId("CUST-404".into());

        let error = service.create(input, &ctx()).await.expect_err("unknown customer");
        assert!(matches!(error, ApplicationError::Domain(DomainError::Validation(_))));
        assert!(service.list(&QuotationFilter::default()).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn send_approve_convert_writes_three_ordered_history_rows() {
        let service = service().await;
        let quotation = service.create(scenario(), &ctx()).await.expect("create");

        service.send(&quotation.id, &ctx()).await.expect("send");
        service.approve(&quotation.id, &ctx()).await.expect("approve");
        let outcome = service
            .convert_to_order(&quotation.id, OrderOverrides::default(), &ctx())
            .await
            .expect("convert");

        assert_eq!(outcome.quotation.status, QuotationStatus::Converted);
        assert_eq!(outcome.quotation.converted_to_order_id, Some(outcome.order.id.clone()));
        assert_eq!(outcome.order.status, OrderStatus::Pending);
        assert_eq!(outcome.order.details.total_amount, Decimal::new(641_590, 2));
        assert_eq!(
            outcome.order.details.delivery_date,
            Utc::now().date_naive() + Duration::days(7)
        );
        assert_eq!(outcome.order.details.notes.as_deref(), Some("Reprint of last year's run"));

        let history = service.history(&quotation.id).await.expect("history");
        let transitions: Vec<_> =
            history.iter().map(|entry| (entry.old_status, entry.new_status)).collect();
        assert_eq!(
            transitions,
            [
                (QuotationStatus::Draft, QuotationStatus::Sent),
                (QuotationStatus::Sent, QuotationStatus::Approved),
                (QuotationStatus::Approved, QuotationStatus::Converted),
            ]
        );
        assert_eq!(
            history[2].note,
            Some(format!("Converted to order {}", outcome.order.order_number))
        );

        let again = service
            .convert_to_order(&quotation.id, OrderOverrides::default(), &ctx())
            .await
            .expect_err("second conversion");
        assert!(is_invalid_transition(&again));

        let removal = service.remove(&quotation.id, &ctx()).await.expect_err("converted stays");
        assert!(is_invalid_transition(&removal));
        assert!(service.get(&quotation.id).await.is_ok());
    }

    #[tokio::test]
    async fn illegal_transitions_leave_no_trace() {
        let service = service().await;
        let quotation = service.create(scenario(), &ctx()).await.expect("create");

        let approve = service.approve(&quotation.id, &ctx()).await.expect_err("approve draft");
        assert!(is_invalid_transition(&approve));
        assert!(approve.to_string().contains("only sent quotations can be approved"));

        service.send(&quotation.id, &ctx()).await.expect("send");
        let update = service
            .update(&quotation.id, QuotationUpdate::default(), &ctx())
            .await
            .expect_err("update sent");
        assert!(is_invalid_transition(&update));

        assert_eq!(service.history(&quotation.id).await.expect("history").len(), 1);
        let stored = service.get(&quotation.id).await.expect("get");
        assert_eq!(stored.status, QuotationStatus::Sent);
    }

    #[tokio::test]
    async fn reject_records_reason_or_default() {
        let service = service().await;
        let first = service.create(scenario(), &ctx()).await.expect("create");
        let second = service.create(scenario(), &ctx()).await.expect("create");
        for id in [&first.id, &second.id] {
            service.send(id, &ctx()).await.expect("send");
        }

        let rejected = service
            .reject(&first.id, Some("Price too high".into()), &ctx())
            .await
            .expect("reject");
        assert_eq!(rejected.status, QuotationStatus::Rejected);
        assert!(rejected.rejected_at.is_some());
        service.reject(&second.id, None, &ctx()).await.expect("reject without reason");

        let first_note = service.history(&first.id).await.expect("history")[1].note.clone();
        let second_note = service.history(&second.id).await.expect("history")[1].note.clone();
        assert_eq!(first_note.as_deref(), Some("Price too high"));
        assert_eq!(second_note.as_deref(), Some("Quotation rejected"));
    }

    #[tokio::test]
    async fn update_reprices_and_replaces_items() {
        let service = service().await;
        let quotation = service.create(scenario(), &ctx()).await.expect("create");

        let update: QuotationUpdate = serde_json::from_value(serde_json::json!({
            "items": [{ "description": "Cutting die", "quantity": "1", "unit_price": "1500" }]
        }))
        .expect("update payload");
        let updated = service.update(&quotation.id, update, &ctx()).await.expect("update");

        assert_eq!(updated.items.len(), 1);
        assert_eq!(updated.pricing.additional_items_cost, Decimal::new(1500, 0));
        assert!(updated.pricing.total_amount > quotation.pricing.total_amount);

        let notes_only = QuotationUpdate { notes: Some("Rush job".into()), ..Default::default() };
        let touched = service.update(&quotation.id, notes_only, &ctx()).await.expect("notes");
        assert_eq!(touched.pricing, updated.pricing);
        assert_eq!(touched.items, updated.items);
    }

    #[tokio::test]
    async fn editing_a_sent_quotation_reports_the_status_before_the_customer() {
        let service = service().await;
        let quotation = service.create(scenario(), &ctx()).await.expect("create");
        service.send(&quotation.id, &ctx()).await.expect("send");

        let update = QuotationUpdate {
            customer_id: Some(CustomerId("CUST-404".into())),
            ..Default::default()
        };
        let error = service.update(&quotation.id, update, &ctx()).await.expect_err("sent is locked");
        assert!(is_invalid_transition(&error));
    }

    #[tokio::test]
    async fn revision_copies_content_under_new_identity() {
        let service = service().await;
        let mut input = scenario();
        input.items = serde_json::from_value(serde_json::json!([
            { "description": "Proof copies", "quantity": "10", "unit": "sheets", "unit_price": "2.5" }
        ]))
        .expect("items");
        let source = service.create(input, &ctx()).await.expect("create");
        service.send(&source.id, &ctx()).await.expect("send");

        let revision = service.create_revision(&source.id, &ctx()).await.expect("revise");
        assert_eq!(revision.version, 2);
        assert_eq!(revision.status, QuotationStatus::Draft);
        assert_eq!(revision.parent_quotation_id, Some(source.id.clone()));
        assert_ne!(revision.quotation_number, source.quotation_number);
        assert_eq!(revision.pricing, source.pricing);
        assert!(revision.sent_at.is_none());
        assert_eq!(revision.items.len(), 1);
        assert_ne!(revision.items[0].id, source.items[0].id);
        assert_eq!(revision.items[0].description, source.items[0].description);
    }

    #[tokio::test]
    async fn failing_orders_collaborator_is_an_integration_error() {
        let service = service_with_orders(InMemoryOrderRepository::unavailable()).await;
        let quotation = service.create(scenario(), &ctx()).await.expect("create");
        service.send(&quotation.id, &ctx()).await.expect("send");
        service.approve(&quotation.id, &ctx()).await.expect("approve");

        let error = service
            .convert_to_order(&quotation.id, OrderOverrides::default(), &ctx())
            .await
            .expect_err("orders down");
        assert!(matches!(error, ApplicationError::Integration(_)));

        let stored = service.get(&quotation.id).await.expect("get");
        assert_eq!(stored.status, QuotationStatus::Approved);
        assert!(stored.converted_to_order_id.is_none());
    }

    #[tokio::test]
    async fn missing_quotations_are_not_found() {
        let service = service().await;
        let id = QuotationId("missing".into());

        assert!(matches!(service.get(&id).await, Err(ApplicationError::NotFound { .. })));
        assert!(matches!(service.history(&id).await, Err(ApplicationError::NotFound { .. })));
        assert!(matches!(
            service.remove(&id, &ctx()).await,
            Err(ApplicationError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn calculate_uses_the_configured_rate_card() {
        let rates = PricingRates { pre_press_base: Decimal::new(800, 0), ..PricingRates::default() };
        let service = QuotationService::in_memory(rates);
        let input = PricingInput { quantity: 100, ..PricingInput::default() };

        let breakdown = service.calculate(&input).expect("priced");
        assert_eq!(breakdown.pre_press_cost, Decimal::new(80_000, 2));

        let discounted = PricingInput { discount_percent: Some(Decimal::new(150, 0)), ..input };
        assert!(matches!(
            service.calculate(&discounted),
            Err(ApplicationError::Domain(DomainError::Validation(_)))
        ));
    }
}
