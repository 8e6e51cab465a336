use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::domain::actor::Actor;
use crate::domain::order::{NewOrder, Order, OrderOverrides};
use crate::domain::quotation::{Quotation, QuotationHistoryEntry, QuotationStatus};
use crate::errors::DomainError;
use crate::lifecycle::engine::{refusal, transition};
use crate::lifecycle::states::LifecycleAction;

pub const DEFAULT_DELIVERY_LEAD_DAYS: i64 = 7;

/// Maps an approved quotation onto the order contract. Nothing is mutated; the
/// quotation only moves once the order exists.
pub fn prepare_conversion(
    quotation: &Quotation,
    overrides: OrderOverrides,
    today: NaiveDate,
) -> Result<NewOrder, DomainError> {
    if quotation.status != QuotationStatus::Approved || quotation.converted_to_order_id.is_some() {
        return Err(refusal(quotation.status, LifecycleAction::Convert));
    }

    let order_date = overrides.order_date.unwrap_or(today);
    let delivery_date = overrides
        .delivery_date
        .unwrap_or_else(|| today + Duration::days(DEFAULT_DELIVERY_LEAD_DAYS));
    let spec = &quotation.spec;

    Ok(NewOrder {
        quotation_id: quotation.id.clone(),
        customer_id: quotation.customer_id.clone(),
        product: spec.product.clone(),
        product_name: spec.product_name.clone(),
        quantity: spec.quantity,
        length_mm: spec.length_mm,
        width_mm: spec.width_mm,
        height_mm: spec.height_mm,
        gsm: spec.gsm,
        board_type: spec.board_type.clone(),
        paper_type: spec.paper_type.clone(),
        color_front: spec.color_front,
        color_back: spec.color_back,
        spot_colors: spec
            .spot_colors
            .iter()
            .filter(|spot| spot.enabled)
            .map(|spot| spot.name.clone())
            .collect(),
        finishing: spec.finishing.clone(),
        pre_press: spec.pre_press.clone(),
        total_amount: quotation.total_amount(),
        order_date,
        delivery_date,
        notes: overrides.notes.or_else(|| quotation.notes.clone()),
    })
}

/// Marks `quotation` converted into `order`.
pub fn complete_conversion(
    quotation: &mut Quotation,
    order: &Order,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<QuotationHistoryEntry, DomainError> {
    if quotation.converted_to_order_id.is_some() {
        return Err(refusal(quotation.status, LifecycleAction::Convert));
    }
    let note = format!("Converted to order {}", order.order_number);
    let entry = transition(quotation, LifecycleAction::Convert, actor, now, Some(note))?;
    quotation.converted_to_order_id = Some(order.id.clone());
    quotation.converted_at = Some(now);
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{complete_conversion, prepare_conversion};
    use crate::domain::actor::{Actor, ActorRole};
    use crate::domain::order::{Order, OrderId, OrderOverrides, OrderStatus};
    use crate::domain::quotation::{Quotation, QuotationStatus};
    use crate::errors::DomainError;
    use crate::lifecycle::QuotationLifecycle;

    fn approved() -> Quotation {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).single().expect("timestamp");
        let actor = Actor::new("u-1", ActorRole::Sales);
        let lifecycle = QuotationLifecycle::default();
        let input = serde_json::from_value(serde_json::json!({
            "customer_id": "c-3",
            "spec": {
                "product_type": "foil",
                "foil_thickness_micron": "25",
                "punch_size": "12x8",
                "product_name": "Blister foil",
                "quantity": 20000,
                "spot_colors": [{ "name": "PMS 286" }, { "name": "Silver", "enabled": false }],
                "finishing": { "die_cutting": true, "die_cutting_details": "rotary" },
                "pre_press": { "ctp_required": true }
            },
            "notes": "Pack in 500s"
        }))
        .expect("payload");
        let mut quotation =
            lifecycle.draft(input, "QUO-20260601-001".into(), &actor, now).expect("draft");
        lifecycle.send(&mut quotation, &actor, now).expect("send");
        lifecycle.approve(&mut quotation, &actor, now).expect("approve");
        quotation
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 2).expect("date")
    }

    #[test]
    fn mapping_copies_spec_and_defaults_dates() {
        let quotation = approved();
        let order = prepare_conversion(&quotation, OrderOverrides::default(), today())
            .expect("approved converts");

        assert_eq!(order.quotation_id, quotation.id);
        assert_eq!(order.customer_id, quotation.customer_id);
        assert_eq!(order.product, quotation.spec.product);
        assert_eq!(order.quantity, 20000);
        assert_eq!(order.spot_colors, vec!["PMS 286".to_string()]);
        assert!(order.finishing.die_cutting);
        assert!(order.pre_press.ctp_required);
        assert_eq!(order.total_amount, quotation.total_amount());
        assert_eq!(order.order_date, today());
        assert_eq!(order.delivery_date, NaiveDate::from_ymd_opt(2026, 6, 9).expect("date"));
        assert_eq!(order.notes.as_deref(), Some("Pack in 500s"));
    }

    #[test]
    fn overrides_replace_defaults() {
        let delivery = NaiveDate::from_ymd_opt(2026, 7, 1).expect("date");
        let order = prepare_conversion(
            &approved(),
            OrderOverrides { order_date: None, delivery_date: Some(delivery), notes: Some("Urgent".into()) },
            today(),
        )
        .expect("approved converts");

        assert_eq!(order.delivery_date, delivery);
        assert_eq!(order.notes.as_deref(), Some("Urgent"));
    }

    #[test]
    fn only_approved_and_unconverted_quotations_convert() {
        let mut quotation = approved();
        quotation.status = QuotationStatus::Sent;
        assert!(matches!(
            prepare_conversion(&quotation, OrderOverrides::default(), today()),
            Err(DomainError::InvalidStateTransition { .. })
        ));

        let mut quotation = approved();
        quotation.converted_to_order_id = Some(OrderId("o-0".into()));
        assert!(prepare_conversion(&quotation, OrderOverrides::default(), today()).is_err());
    }

    #[test]
    fn completion_links_the_order_and_records_its_number() {
        let mut quotation = approved();
        let details = prepare_conversion(&quotation, OrderOverrides::default(), today())
            .expect("approved converts");
        let now = Utc.with_ymd_and_hms(2026, 6, 2, 10, 0, 0).single().expect("timestamp");
        let order = Order {
            id: OrderId("o-7".into()),
            order_number: "ORD-20260602-001".into(),
            status: OrderStatus::Pending,
            details,
            created_by: "u-1".into(),
            created_at: now,
        };

        let actor = Actor::new("u-1", ActorRole::Sales);
        let entry = complete_conversion(&mut quotation, &order, &actor, now).expect("convert");

        assert_eq!(entry.note.as_deref(), Some("Converted to order ORD-20260602-001"));
        assert_eq!(quotation.status, QuotationStatus::Converted);
        assert_eq!(quotation.converted_to_order_id, Some(OrderId("o-7".into())));
        assert_eq!(quotation.converted_at, Some(now));
        assert!(complete_conversion(&mut quotation, &order, &actor, now).is_err());
    }
}
