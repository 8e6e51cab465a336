//! Print-job quotation pricing.
//!
//! `calculate_pricing` is a pure function of the job specification and a set of
//! [`PricingRates`]. Every monetary stage is rounded to two decimal places before
//! it feeds the next one, so the published breakdown always adds up exactly.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::quotation::{
    check_charge, check_colors, check_dimension, check_gsm, ProductSpec, QuotationItem,
    MAX_SPOT_COLORS,
};
use crate::errors::DomainError;

const SQ_MM_PER_SQ_M: i64 = 1_000_000;
const GRAMS_PER_KG: i64 = 1_000;

/// Two decimal places, midpoint away from zero. The scale is always exactly two so
/// amounts render as `2000.00` rather than `2000.0`.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Rate card used by the calculator. Defaults match the shop's standard card.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRates {
    pub paper_rate_per_kg: Decimal,
    pub default_gsm: u32,
    pub printing_rate_per_color: Decimal,
    pub varnish_rate: Decimal,
    pub lamination_rate: Decimal,
    pub embossing_rate: Decimal,
    pub foiling_rate: Decimal,
    pub die_cutting_rate: Decimal,
    pub pasting_rate: Decimal,
    pub pre_press_base: Decimal,
    pub ctp_rate_per_color: Decimal,
    pub overhead_percent: Decimal,
}

impl Default for PricingRates {
    fn default() -> Self {
        Self {
            paper_rate_per_kg: Decimal::new(80, 0),
            default_gsm: 300,
            printing_rate_per_color: Decimal::new(5, 1),
            varnish_rate: Decimal::new(3, 1),
            lamination_rate: Decimal::new(5, 1),
            embossing_rate: Decimal::new(8, 1),
            foiling_rate: Decimal::new(10, 1),
            die_cutting_rate: Decimal::new(4, 1),
            pasting_rate: Decimal::new(3, 1),
            pre_press_base: Decimal::new(500, 0),
            ctp_rate_per_color: Decimal::new(200, 0),
            overhead_percent: Decimal::new(15, 0),
        }
    }
}

impl PricingRates {
    pub fn validate(&self) -> Result<(), String> {
        let rates = [
            ("paper_rate_per_kg", self.paper_rate_per_kg),
            ("printing_rate_per_color", self.printing_rate_per_color),
            ("varnish_rate", self.varnish_rate),
            ("lamination_rate", self.lamination_rate),
            ("embossing_rate", self.embossing_rate),
            ("foiling_rate", self.foiling_rate),
            ("die_cutting_rate", self.die_cutting_rate),
            ("pasting_rate", self.pasting_rate),
            ("pre_press_base", self.pre_press_base),
            ("ctp_rate_per_color", self.ctp_rate_per_color),
            ("overhead_percent", self.overhead_percent),
        ];
        if let Some((name, _)) = rates.iter().find(|(_, value)| value.is_sign_negative()) {
            return Err(format!("pricing.{name} must not be negative"));
        }
        if self.default_gsm == 0 {
            return Err("pricing.default_gsm must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Margin, discount and tax percentages negotiated for one quotation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommercialTerms {
    pub profit_margin_percent: Decimal,
    pub discount_percent: Decimal,
    pub tax_percent: Decimal,
}

impl Default for CommercialTerms {
    fn default() -> Self {
        Self {
            profit_margin_percent: Decimal::new(20, 0),
            discount_percent: Decimal::ZERO,
            tax_percent: Decimal::new(18, 0),
        }
    }
}

impl CommercialTerms {
    pub fn validate(&self) -> Result<(), DomainError> {
        check_percent("terms.profit_margin_percent", self.profit_margin_percent)?;
        check_percent("terms.discount_percent", self.discount_percent)?;
        check_percent("terms.tax_percent", self.tax_percent)
    }
}

fn check_percent(field: &str, value: Decimal) -> Result<(), DomainError> {
    if value.is_sign_negative() || value > Decimal::ONE_HUNDRED {
        return Err(DomainError::Validation(format!("{field} must be between 0 and 100")));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalCharge {
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Flat calculator input, also accepted as-is by the preview endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingInput {
    pub product_type: Option<String>,
    pub quantity: u32,
    pub length_mm: Option<Decimal>,
    pub width_mm: Option<Decimal>,
    pub gsm: Option<u32>,
    pub color_front: u32,
    pub color_back: u32,
    pub pantone_flags: [bool; MAX_SPOT_COLORS],
    pub varnish: bool,
    pub lamination: bool,
    pub embossing: bool,
    pub foiling: bool,
    pub die_cutting: bool,
    pub pasting: bool,
    pub ctp_required: bool,
    pub profit_margin_percent: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    pub tax_percent: Option<Decimal>,
    pub additional_items: Vec<AdditionalCharge>,
}

impl PricingInput {
    pub fn from_parts(spec: &ProductSpec, terms: &CommercialTerms, items: &[QuotationItem]) -> Self {
        Self {
            product_type: Some(spec.product.product_type().to_string()),
            quantity: spec.quantity,
            length_mm: spec.length_mm,
            width_mm: spec.width_mm,
            gsm: spec.gsm,
            color_front: spec.color_front,
            color_back: spec.color_back,
            pantone_flags: spec.pantone_flags(),
            varnish: spec.finishing.has_varnish(),
            lamination: spec.finishing.has_lamination(),
            embossing: spec.finishing.embossing,
            foiling: spec.finishing.foiling,
            die_cutting: spec.finishing.die_cutting,
            pasting: spec.finishing.pasting,
            ctp_required: spec.pre_press.ctp_required,
            profit_margin_percent: Some(terms.profit_margin_percent),
            discount_percent: Some(terms.discount_percent),
            tax_percent: Some(terms.tax_percent),
            additional_items: items.iter().map(QuotationItem::as_charge).collect(),
        }
    }

    /// Applies the same bounds a saved quotation must satisfy, so a preview never
    /// prices a job that `create` would refuse.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quantity == 0 {
            return Err(DomainError::Validation("quantity must be greater than zero".into()));
        }
        check_colors("color_front", self.color_front)?;
        check_colors("color_back", self.color_back)?;
        check_dimension("length_mm", self.length_mm)?;
        check_dimension("width_mm", self.width_mm)?;
        check_gsm("gsm", self.gsm)?;
        for (field, value) in [
            ("profit_margin_percent", self.profit_margin_percent),
            ("discount_percent", self.discount_percent),
            ("tax_percent", self.tax_percent),
        ] {
            if let Some(value) = value {
                check_percent(field, value)?;
            }
        }
        self.additional_items.iter().enumerate().try_for_each(|(index, item)| {
            check_charge(&format!("additional_items[{index}]"), item.quantity, item.unit_price)
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingBreakdown {
    pub area_sqm: Decimal,
    pub weight_per_unit_kg: Decimal,
    pub total_colors: u32,
    pub material_cost: Decimal,
    pub printing_cost: Decimal,
    pub finishing_cost: Decimal,
    pub pre_press_cost: Decimal,
    pub additional_items_cost: Decimal,
    pub subtotal: Decimal,
    pub overhead_cost: Decimal,
    pub profit_margin_amount: Decimal,
    pub discount_amount: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
}

pub trait PricingEngine: Send + Sync {
    fn price(&self, input: &PricingInput) -> Result<PricingBreakdown, DomainError>;
}

/// Calculator bound to a fixed rate card.
#[derive(Clone, Debug, Default)]
pub struct RateCardPricingEngine {
    rates: PricingRates,
}

impl RateCardPricingEngine {
    pub fn new(rates: PricingRates) -> Self {
        Self { rates }
    }

    pub fn rates(&self) -> &PricingRates {
        &self.rates
    }
}

impl PricingEngine for RateCardPricingEngine {
    fn price(&self, input: &PricingInput) -> Result<PricingBreakdown, DomainError> {
        calculate_pricing(input, &self.rates)
    }
}

/// Validates `input`, then prices it. Every stage uses checked arithmetic, so an
/// amount outside the decimal range surfaces as a validation error.
pub fn calculate_pricing(
    input: &PricingInput,
    rates: &PricingRates,
) -> Result<PricingBreakdown, DomainError> {
    input.validate()?;

    let defaults = CommercialTerms::default();
    let quantity = Decimal::from(input.quantity);

    let length = input.length_mm.unwrap_or(Decimal::ZERO);
    let width = input.width_mm.unwrap_or(Decimal::ZERO);
    let area_sqm = ratio("area_sqm", product("area_sqm", &[length, width])?, SQ_MM_PER_SQ_M)?;

    let gsm = input.gsm.filter(|gsm| *gsm > 0).unwrap_or(rates.default_gsm);
    let weight_per_unit_kg = ratio(
        "weight_per_unit_kg",
        product("weight_per_unit_kg", &[area_sqm, Decimal::from(gsm)])?,
        GRAMS_PER_KG,
    )?;
    let material_cost = round_money(product(
        "material_cost",
        &[weight_per_unit_kg, rates.paper_rate_per_kg, quantity],
    )?);

    let pantone_count = input.pantone_flags.iter().filter(|flag| **flag).count() as u32;
    let total_colors = input
        .color_front
        .checked_add(input.color_back)
        .and_then(|colors| colors.checked_add(pantone_count))
        .ok_or_else(|| out_of_range("total_colors"))?;
    let colors = Decimal::from(total_colors);
    let printing_cost =
        round_money(product("printing_cost", &[colors, rates.printing_rate_per_color, quantity])?);

    let finishing_rate = sum(
        "finishing_cost",
        [
            (input.varnish, rates.varnish_rate),
            (input.lamination, rates.lamination_rate),
            (input.embossing, rates.embossing_rate),
            (input.foiling, rates.foiling_rate),
            (input.die_cutting, rates.die_cutting_rate),
            (input.pasting, rates.pasting_rate),
        ]
        .into_iter()
        .filter_map(|(selected, rate)| selected.then_some(rate)),
    )?;
    let finishing_cost = round_money(product("finishing_cost", &[finishing_rate, quantity])?);

    let ctp_cost = if input.ctp_required {
        product("pre_press_cost", &[rates.ctp_rate_per_color, colors])?
    } else {
        Decimal::ZERO
    };
    let pre_press_cost = round_money(sum("pre_press_cost", [rates.pre_press_base, ctp_cost])?);

    let line_totals = input
        .additional_items
        .iter()
        .map(|item| product("additional_items_cost", &[item.quantity, item.unit_price]))
        .collect::<Result<Vec<_>, _>>()?;
    let additional_items_cost = round_money(sum("additional_items_cost", line_totals)?);

    let subtotal = round_money(sum(
        "subtotal",
        [material_cost, printing_cost, finishing_cost, pre_press_cost, additional_items_cost],
    )?);
    let overhead_cost = round_money(percent_of("overhead_cost", subtotal, rates.overhead_percent)?);

    let margin_percent = input.profit_margin_percent.unwrap_or(defaults.profit_margin_percent);
    let cost_base = sum("profit_margin_amount", [subtotal, overhead_cost])?;
    let profit_margin_amount =
        round_money(percent_of("profit_margin_amount", cost_base, margin_percent)?);

    let discount_percent = input.discount_percent.unwrap_or(defaults.discount_percent);
    let discount_base = sum("discount_amount", [cost_base, profit_margin_amount])?;
    let discount_amount =
        round_money(percent_of("discount_amount", discount_base, discount_percent)?);

    let taxable_amount = round_money(
        discount_base.checked_sub(discount_amount).ok_or_else(|| out_of_range("taxable_amount"))?,
    );
    let tax_percent = input.tax_percent.unwrap_or(defaults.tax_percent);
    let tax_amount = round_money(percent_of("tax_amount", taxable_amount, tax_percent)?);
    let total_amount = round_money(sum("total_amount", [taxable_amount, tax_amount])?);

    Ok(PricingBreakdown {
        area_sqm,
        weight_per_unit_kg,
        total_colors,
        material_cost,
        printing_cost,
        finishing_cost,
        pre_press_cost,
        additional_items_cost,
        subtotal,
        overhead_cost,
        profit_margin_amount,
        discount_amount,
        taxable_amount,
        tax_amount,
        total_amount,
    })
}

/// Rounded `quantity * unit_price` for one quotation line.
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Result<Decimal, DomainError> {
    product("total_price", &[quantity, unit_price]).map(round_money)
}

fn out_of_range(stage: &str) -> DomainError {
    DomainError::Validation(format!("{stage} exceeds the supported amount range"))
}

fn product(stage: &str, factors: &[Decimal]) -> Result<Decimal, DomainError> {
    factors
        .iter()
        .try_fold(Decimal::ONE, |acc, factor| acc.checked_mul(*factor))
        .ok_or_else(|| out_of_range(stage))
}

fn sum(stage: &str, terms: impl IntoIterator<Item = Decimal>) -> Result<Decimal, DomainError> {
    terms
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, term| acc.checked_add(term))
        .ok_or_else(|| out_of_range(stage))
}

fn ratio(stage: &str, value: Decimal, divisor: i64) -> Result<Decimal, DomainError> {
    value.checked_div(Decimal::from(divisor)).ok_or_else(|| out_of_range(stage))
}

fn percent_of(stage: &str, base: Decimal, percent: Decimal) -> Result<Decimal, DomainError> {
    base.checked_mul(percent)
        .and_then(|value| value.checked_div(Decimal::ONE_HUNDRED))
        .ok_or_else(|| out_of_range(stage))
}
