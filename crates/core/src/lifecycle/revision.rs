use chrono::{DateTime, Utc};

use crate::domain::actor::Actor;
use crate::domain::quotation::{Quotation, QuotationId, QuotationItem, QuotationStatus};

/// Clones `source` into a new draft one version up. Pricing is carried over as-is;
/// a revision may be spawned from any status.
pub fn revise(
    source: &Quotation,
    quotation_number: String,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Quotation {
    Quotation {
        id: QuotationId::generate(),
        quotation_number,
        version: source.version + 1,
        parent_quotation_id: Some(source.id.clone()),
        status: QuotationStatus::Draft,
        customer_id: source.customer_id.clone(),
        quotation_date: source.quotation_date,
        valid_until: source.valid_until,
        spec: source.spec.clone(),
        terms: source.terms.clone(),
        pricing: source.pricing.clone(),
        items: source.items.iter().map(QuotationItem::duplicate).collect(),
        notes: source.notes.clone(),
        terms_and_conditions: source.terms_and_conditions.clone(),
        converted_to_order_id: None,
        converted_at: None,
        created_by: actor.id.clone(),
        sent_at: None,
        approved_at: None,
        rejected_at: None,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::revise;
    use crate::domain::actor::{Actor, ActorRole};
    use crate::domain::order::OrderId;
    use crate::domain::quotation::{NewQuotation, QuotationStatus};
    use crate::lifecycle::QuotationLifecycle;

    #[test]
    fn revision_of_a_converted_quotation_is_a_fresh_draft() {
        let created = Utc.with_ymd_and_hms(2026, 2, 10, 8, 0, 0).single().expect("timestamp");
        let input: NewQuotation = serde_json::from_value(serde_json::json!({
            "customer_id": "c-9",
            "spec": { "product_type": "label", "quantity": 5000, "color_front": 2 },
            "items": [
                { "description": "Plates", "quantity": "2", "unit_price": "450" },
                { "description": "Proofs", "quantity": "1", "unit_price": "120.50", "unit": "set" }
            ],
            "notes": "Repeat of last month"
        }))
        .expect("payload");
        let mut source = QuotationLifecycle::default()
            .draft(input, "QUO-20260210-004".into(), &Actor::new("u-1", ActorRole::Sales), created)
            .expect("draft");
        source.status = QuotationStatus::Converted;
        source.sent_at = Some(created);
        source.approved_at = Some(created);
        source.converted_to_order_id = Some(OrderId("o-1".into()));
        source.converted_at = Some(created);

        let later = created + Duration::days(3);
        let revision =
            revise(&source, "QUO-20260213-001".into(), &Actor::new("u-2", ActorRole::Admin), later);

        assert_eq!(revision.version, 2);
        assert_eq!(revision.parent_quotation_id.as_ref(), Some(&source.id));
        assert_ne!(revision.id, source.id);
        assert_eq!(revision.status, QuotationStatus::Draft);
        assert_eq!(revision.created_by, "u-2");
        assert_eq!(revision.created_at, later);
        assert_eq!(revision.sent_at, None);
        assert_eq!(revision.approved_at, None);
        assert_eq!(revision.converted_to_order_id, None);
        assert_eq!(revision.converted_at, None);
        assert_eq!(revision.pricing, source.pricing);
        assert_eq!(revision.notes, source.notes);

        assert_eq!(revision.items.len(), 2);
        for (copy, original) in revision.items.iter().zip(&source.items) {
            assert_ne!(copy.id, original.id);
            assert_eq!(copy.description, original.description);
            assert_eq!(copy.position, original.position);
            assert_eq!(copy.total_price, original.total_price);
        }
        assert_eq!(revision.items[1].total_price, Decimal::new(12_050, 2));
    }
}
