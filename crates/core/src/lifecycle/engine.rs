use chrono::{DateTime, Utc};

use crate::cpq::pricing::{
    CommercialTerms, PricingBreakdown, PricingEngine, PricingInput, RateCardPricingEngine,
};
use crate::domain::actor::Actor;
use crate::domain::quotation::{
    build_items, validate_validity, NewQuotation, ProductSpec, Quotation, QuotationHistoryEntry,
    QuotationHistoryId, QuotationId, QuotationItem, QuotationStatus, QuotationUpdate,
};
use crate::errors::DomainError;
use crate::lifecycle::states::{next_status, permits, LifecycleAction};

pub const DEFAULT_REJECTION_REASON: &str = "Quotation rejected";

/// Applies lifecycle rules to in-memory quotations. Persisting the result, and the
/// returned history entry, is the caller's job.
pub struct QuotationLifecycle<E = RateCardPricingEngine> {
    pricing: E,
}

impl<E> QuotationLifecycle<E>
where
    E: PricingEngine,
{
    pub fn new(pricing: E) -> Self {
        Self { pricing }
    }

    pub fn pricing(&self) -> &E {
        &self.pricing
    }

    pub fn price(
        &self,
        spec: &ProductSpec,
        terms: &CommercialTerms,
        items: &[QuotationItem],
    ) -> Result<PricingBreakdown, DomainError> {
        self.pricing.price(&PricingInput::from_parts(spec, terms, items))
    }

    /// Builds a priced draft numbered `quotation_number`.
    pub fn draft(
        &self,
        input: NewQuotation,
        quotation_number: String,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<Quotation, DomainError> {
        input.validate()?;
        let (quotation_date, valid_until) = input.resolve_dates(now.date_naive());
        validate_validity(quotation_date, valid_until)?;

        let items = build_items(&input.items)?;
        let pricing = self.price(&input.spec, &input.terms, &items)?;

        Ok(Quotation {
            id: QuotationId::generate(),
            quotation_number,
            version: 1,
            parent_quotation_id: None,
            status: QuotationStatus::Draft,
            customer_id: input.customer_id,
            quotation_date,
            valid_until,
            spec: input.spec,
            terms: input.terms,
            pricing,
            items,
            notes: input.notes,
            terms_and_conditions: input.terms_and_conditions,
            converted_to_order_id: None,
            converted_at: None,
            created_by: actor.id.clone(),
            sent_at: None,
            approved_at: None,
            rejected_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Refuses edits to anything but a draft.
    pub fn ensure_editable(&self, quotation: &Quotation) -> Result<(), DomainError> {
        ensure_permitted(quotation, LifecycleAction::Update)
    }

    /// Applies a partial update to a draft. Returns whether the item list was replaced.
    /// On error `quotation` is left untouched.
    pub fn apply_update(
        &self,
        quotation: &mut Quotation,
        update: QuotationUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        ensure_permitted(quotation, LifecycleAction::Update)?;
        update.validate()?;

        let reprice = update.touches_pricing();
        let quotation_date = update.quotation_date.unwrap_or(quotation.quotation_date);
        let valid_until = update.valid_until.unwrap_or(quotation.valid_until);
        validate_validity(quotation_date, valid_until)?;

        let mut next = quotation.clone();
        next.quotation_date = quotation_date;
        next.valid_until = valid_until;
        if let Some(customer_id) = update.customer_id {
            next.customer_id = customer_id;
        }
        if let Some(spec) = update.spec {
            next.spec = spec;
        }
        if let Some(terms) = update.terms {
            next.terms = terms;
        }
        let items_replaced = match update.items {
            Some(items) => {
                next.items = build_items(&items)?;
                true
            }
            None => false,
        };
        if let Some(notes) = update.notes {
            next.notes = Some(notes);
        }
        if let Some(terms_and_conditions) = update.terms_and_conditions {
            next.terms_and_conditions = Some(terms_and_conditions);
        }
        if reprice {
            next.pricing = self.price(&next.spec, &next.terms, &next.items)?;
        }
        next.updated_at = now;
        *quotation = next;
        Ok(items_replaced)
    }

    pub fn send(
        &self,
        quotation: &mut Quotation,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<QuotationHistoryEntry, DomainError> {
        let entry = transition(quotation, LifecycleAction::Send, actor, now, None)?;
        quotation.sent_at = Some(now);
        Ok(entry)
    }

    pub fn approve(
        &self,
        quotation: &mut Quotation,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<QuotationHistoryEntry, DomainError> {
        let entry = transition(quotation, LifecycleAction::Approve, actor, now, None)?;
        quotation.approved_at = Some(now);
        Ok(entry)
    }

    pub fn reject(
        &self,
        quotation: &mut Quotation,
        reason: Option<String>,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<QuotationHistoryEntry, DomainError> {
        let reason = reason
            .map(|reason| reason.trim().to_string())
            .filter(|reason| !reason.is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string());
        let entry = transition(quotation, LifecycleAction::Reject, actor, now, Some(reason))?;
        quotation.rejected_at = Some(now);
        Ok(entry)
    }

    pub fn expire(
        &self,
        quotation: &mut Quotation,
        actor: &Actor,
        now: DateTime<Utc>,
    ) -> Result<QuotationHistoryEntry, DomainError> {
        let note = format!("Validity ended on {}", quotation.valid_until);
        transition(quotation, LifecycleAction::Expire, actor, now, Some(note))
    }

    pub fn ensure_removable(&self, quotation: &Quotation) -> Result<(), DomainError> {
        ensure_permitted(quotation, LifecycleAction::Remove)
    }
}

impl Default for QuotationLifecycle<RateCardPricingEngine> {
    fn default() -> Self {
        Self::new(RateCardPricingEngine::default())
    }
}

pub(crate) fn ensure_permitted(
    quotation: &Quotation,
    action: LifecycleAction,
) -> Result<(), DomainError> {
    if permits(quotation.status, action) {
        Ok(())
    } else {
        Err(refusal(quotation.status, action))
    }
}

pub(crate) fn refusal(status: QuotationStatus, action: LifecycleAction) -> DomainError {
    DomainError::InvalidStateTransition {
        action,
        status,
        requirement: action.requirement().to_string(),
    }
}

/// Moves `quotation` along `action` and returns the matching history entry.
pub(crate) fn transition(
    quotation: &mut Quotation,
    action: LifecycleAction,
    actor: &Actor,
    now: DateTime<Utc>,
    note: Option<String>,
) -> Result<QuotationHistoryEntry, DomainError> {
    let old_status = quotation.status;
    let new_status = next_status(old_status, action).ok_or_else(|| refusal(old_status, action))?;

    quotation.status = new_status;
    quotation.updated_at = now;

    Ok(QuotationHistoryEntry {
        id: QuotationHistoryId::generate(),
        quotation_id: quotation.id.clone(),
        old_status,
        new_status,
        changed_by: actor.id.clone(),
        note,
        changed_at: now,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{QuotationLifecycle, DEFAULT_REJECTION_REASON};
    use crate::cpq::pricing::{CommercialTerms, PricingRates, RateCardPricingEngine};
    use crate::domain::actor::{Actor, ActorRole};
    use crate::domain::customer::CustomerId;
    use crate::domain::quotation::{
        NewQuotation, NewQuotationItem, Quotation, QuotationStatus, QuotationUpdate,
    };
    use crate::errors::DomainError;
    use crate::lifecycle::LifecycleAction;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 9, 30, 0).single().expect("timestamp")
    }

    fn sales() -> Actor {
        Actor::new("u-sales", ActorRole::Sales)
    }

    fn payload() -> NewQuotation {
        serde_json::from_value(serde_json::json!({
            "customer_id": "c-1",
            "spec": {
                "product_type": "carton",
                "product_name": "Tablet carton",
                "quantity": 1000,
                "length_mm": "300",
                "width_mm": "200",
                "gsm": 300,
                "color_front": 4,
                "color_back": 0
            },
            "terms": { "profit_margin_percent": "20", "discount_percent": "0", "tax_percent": "18" }
        }))
        .expect("payload")
    }

    fn draft() -> Quotation {
        QuotationLifecycle::default()
            .draft(payload(), "QUO-20260402-001".into(), &sales(), now())
            .expect("draft")
    }

    #[test]
    fn draft_is_priced_dated_and_versioned() {
        let quotation = draft();

        assert_eq!(quotation.status, QuotationStatus::Draft);
        assert_eq!(quotation.version, 1);
        assert_eq!(quotation.parent_quotation_id, None);
        assert_eq!(quotation.created_by, "u-sales");
        assert_eq!(quotation.quotation_date, NaiveDate::from_ymd_opt(2026, 4, 2).expect("date"));
        assert_eq!(quotation.valid_until, quotation.quotation_date + Duration::days(30));
        assert_eq!(quotation.total_amount(), "6415.90".parse::<Decimal>().expect("decimal"));
    }

    #[test]
    fn draft_rejects_inverted_validity_window() {
        let mut input = payload();
        input.quotation_date = NaiveDate::from_ymd_opt(2026, 5, 1);
        input.valid_until = NaiveDate::from_ymd_opt(2026, 4, 1);

        let error = QuotationLifecycle::default()
            .draft(input, "QUO-20260402-001".into(), &sales(), now())
            .expect_err("inverted window");
        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn update_reprices_and_replaces_items() {
        let lifecycle = QuotationLifecycle::default();
        let mut quotation = draft();
        let before = quotation.total_amount();

        let replaced = lifecycle
            .apply_update(
                &mut quotation,
                QuotationUpdate {
                    items: Some(vec![NewQuotationItem {
                        description: "Cutting die".into(),
                        quantity: Decimal::ONE,
                        unit: None,
                        unit_price: Decimal::new(1500, 0),
                    }]),
                    ..QuotationUpdate::default()
                },
                now(),
            )
            .expect("update draft");

        assert!(replaced);
        assert_eq!(quotation.items.len(), 1);
        assert_eq!(quotation.pricing.additional_items_cost, Decimal::new(150_000, 2));
        assert!(quotation.total_amount() > before);
    }

    #[test]
    fn notes_only_update_keeps_pricing() {
        let lifecycle = QuotationLifecycle::default();
        let mut quotation = draft();
        let pricing = quotation.pricing.clone();

        let replaced = lifecycle
            .apply_update(
                &mut quotation,
                QuotationUpdate { notes: Some("Rush job".into()), ..QuotationUpdate::default() },
                now(),
            )
            .expect("update notes");

        assert!(!replaced);
        assert_eq!(quotation.notes.as_deref(), Some("Rush job"));
        assert_eq!(quotation.pricing, pricing);
    }

    #[test]
    fn sent_quotation_is_not_editable() {
        let lifecycle = QuotationLifecycle::default();
        let mut quotation = draft();
        lifecycle.send(&mut quotation, &sales(), now()).expect("send");

        let error = lifecycle
            .apply_update(
                &mut quotation,
                QuotationUpdate {
                    customer_id: Some(CustomerId("c-2".into())),
                    ..QuotationUpdate::default()
                },
                now(),
            )
            .expect_err("sent is locked");
        assert!(matches!(
            error,
            DomainError::InvalidStateTransition { action: LifecycleAction::Update, status: QuotationStatus::Sent, .. }
        ));
    }

    #[test]
    fn editability_is_checked_without_an_update() {
        let lifecycle = QuotationLifecycle::default();
        let mut quotation = draft();
        assert!(lifecycle.ensure_editable(&quotation).is_ok());

        lifecycle.send(&mut quotation, &sales(), now()).expect("send");
        assert!(matches!(
            lifecycle.ensure_editable(&quotation),
            Err(DomainError::InvalidStateTransition { status: QuotationStatus::Sent, .. })
        ));
    }

    #[test]
    fn failed_reprice_leaves_the_draft_untouched() {
        let mut quotation = draft();
        let before = quotation.clone();
        let rates = PricingRates { paper_rate_per_kg: Decimal::MAX, ..PricingRates::default() };
        let lifecycle = QuotationLifecycle::new(RateCardPricingEngine::new(rates));

        let error = lifecycle
            .apply_update(
                &mut quotation,
                QuotationUpdate {
                    notes: Some("Rush job".into()),
                    terms: Some(CommercialTerms::default()),
                    ..QuotationUpdate::default()
                },
                now() + Duration::hours(1),
            )
            .expect_err("rate card overflows");

        assert!(matches!(error, DomainError::Validation(_)));
        assert_eq!(quotation, before);
    }

    #[test]
    fn send_then_approve_stamps_and_records_each_step() {
        let lifecycle = QuotationLifecycle::default();
        let mut quotation = draft();
        let later = now() + Duration::hours(2);

        let sent = lifecycle.send(&mut quotation, &sales(), now()).expect("send");
        let approved = lifecycle.approve(&mut quotation, &sales(), later).expect("approve");

        assert_eq!((sent.old_status, sent.new_status), (QuotationStatus::Draft, QuotationStatus::Sent));
        assert_eq!(
            (approved.old_status, approved.new_status),
            (QuotationStatus::Sent, QuotationStatus::Approved)
        );
        assert_eq!(quotation.sent_at, Some(now()));
        assert_eq!(quotation.approved_at, Some(later));
        assert_eq!(quotation.updated_at, later);
        assert_eq!(approved.changed_by, "u-sales");
    }

    #[test]
    fn approving_a_draft_is_refused_without_side_effects() {
        let lifecycle = QuotationLifecycle::default();
        let mut quotation = draft();

        let error = lifecycle.approve(&mut quotation, &sales(), now()).expect_err("draft");
        assert!(error.to_string().contains("only sent quotations can be approved"));
        assert_eq!(quotation.status, QuotationStatus::Draft);
        assert_eq!(quotation.approved_at, None);
    }

    #[test]
    fn reject_uses_default_reason_when_blank() {
        let lifecycle = QuotationLifecycle::default();
        let mut quotation = draft();
        lifecycle.send(&mut quotation, &sales(), now()).expect("send");

        let entry =
            lifecycle.reject(&mut quotation, Some("  ".into()), &sales(), now()).expect("reject");
        assert_eq!(entry.note.as_deref(), Some(DEFAULT_REJECTION_REASON));
        assert_eq!(quotation.status, QuotationStatus::Rejected);
        assert_eq!(quotation.rejected_at, Some(now()));
    }

    #[test]
    fn expire_moves_open_quotations_only() {
        let lifecycle = QuotationLifecycle::default();
        let mut quotation = draft();
        let entry = lifecycle.expire(&mut quotation, &Actor::system(), now()).expect("expire");

        assert_eq!(entry.new_status, QuotationStatus::Expired);
        assert_eq!(entry.changed_by, "system");
        assert!(lifecycle.expire(&mut quotation, &Actor::system(), now()).is_err());
    }

    #[test]
    fn converted_quotations_cannot_be_removed() {
        let lifecycle = QuotationLifecycle::default();
        let mut quotation = draft();
        assert!(lifecycle.ensure_removable(&quotation).is_ok());

        quotation.status = QuotationStatus::Converted;
        assert!(matches!(
            lifecycle.ensure_removable(&quotation),
            Err(DomainError::InvalidStateTransition { action: LifecycleAction::Remove, .. })
        ));
    }
}
