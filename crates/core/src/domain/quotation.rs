use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cpq::pricing::{AdditionalCharge, CommercialTerms, PricingBreakdown, PricingInput};
use crate::domain::customer::CustomerId;
use crate::domain::order::OrderId;
use crate::errors::DomainError;

pub const MAX_SPOT_COLORS: usize = 4;
pub const MAX_COLORS_PER_SIDE: u32 = 12;
pub const MAX_DIMENSION_MM: i64 = 10_000;
pub const MAX_GSM: u32 = 5_000;
pub const MAX_ITEM_QUANTITY: i64 = 1_000_000_000;
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000;
pub const DEFAULT_VALIDITY_DAYS: i64 = 30;
pub const DEFAULT_ITEM_UNIT: &str = "pcs";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotationId(pub String);

impl QuotationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for QuotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotationItemId(pub String);

impl QuotationItemId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuotationHistoryId(pub String);

impl QuotationHistoryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Converted,
    Expired,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Converted => "converted",
            Self::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "converted" => Some(Self::Converted),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Product family of a quotation. Type-specific attributes only exist on the
/// variants that use them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "product_type", rename_all = "snake_case")]
pub enum ProductVariant {
    Carton,
    Label,
    Leaflet,
    Sleeve,
    CppCarton {
        #[serde(default)]
        cylinder_size: Option<String>,
    },
    Foil {
        #[serde(default)]
        foil_thickness_micron: Option<Decimal>,
        #[serde(default)]
        tablet_size: Option<String>,
        #[serde(default)]
        punch_size: Option<String>,
    },
    Other,
}

impl ProductVariant {
    pub fn product_type(&self) -> &'static str {
        match self {
            Self::Carton => "carton",
            Self::Label => "label",
            Self::Leaflet => "leaflet",
            Self::Sleeve => "sleeve",
            Self::CppCarton { .. } => "cpp_carton",
            Self::Foil { .. } => "foil",
            Self::Other => "other",
        }
    }
}

impl Default for ProductVariant {
    fn default() -> Self {
        Self::Carton
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotColor {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinishingSpec {
    pub varnish_type: Option<String>,
    pub lamination_type: Option<String>,
    pub embossing: bool,
    pub embossing_details: Option<String>,
    pub foiling: bool,
    pub foiling_details: Option<String>,
    pub die_cutting: bool,
    pub die_cutting_details: Option<String>,
    pub pasting: bool,
    pub pasting_details: Option<String>,
}

impl FinishingSpec {
    pub fn has_varnish(&self) -> bool {
        is_selected(self.varnish_type.as_deref())
    }

    pub fn has_lamination(&self) -> bool {
        is_selected(self.lamination_type.as_deref())
    }
}

fn is_selected(value: Option<&str>) -> bool {
    value.map(str::trim).is_some_and(|value| !value.is_empty() && !value.eq_ignore_ascii_case("none"))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrePressSpec {
    pub ctp_required: bool,
    pub design_required: bool,
    pub proof_required: bool,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSpec {
    #[serde(flatten)]
    pub product: ProductVariant,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub length_mm: Option<Decimal>,
    #[serde(default)]
    pub width_mm: Option<Decimal>,
    #[serde(default)]
    pub height_mm: Option<Decimal>,
    #[serde(default)]
    pub gsm: Option<u32>,
    #[serde(default)]
    pub board_type: Option<String>,
    #[serde(default)]
    pub paper_type: Option<String>,
    #[serde(default)]
    pub color_front: u32,
    #[serde(default)]
    pub color_back: u32,
    #[serde(default)]
    pub spot_colors: Vec<SpotColor>,
    #[serde(default)]
    pub finishing: FinishingSpec,
    #[serde(default)]
    pub pre_press: PrePressSpec,
}

impl ProductSpec {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quantity == 0 {
            return Err(DomainError::Validation("spec.quantity must be greater than zero".into()));
        }
        if self.spot_colors.len() > MAX_SPOT_COLORS {
            return Err(DomainError::Validation(format!(
                "spec.spot_colors supports at most {MAX_SPOT_COLORS} channels"
            )));
        }
        if self.spot_colors.iter().any(|spot| spot.name.trim().is_empty()) {
            return Err(DomainError::Validation("spec.spot_colors names must not be empty".into()));
        }
        check_colors("spec.color_front", self.color_front)?;
        check_colors("spec.color_back", self.color_back)?;
        check_dimension("spec.length_mm", self.length_mm)?;
        check_dimension("spec.width_mm", self.width_mm)?;
        check_dimension("spec.height_mm", self.height_mm)?;
        check_gsm("spec.gsm", self.gsm)?;
        if let ProductVariant::Foil { foil_thickness_micron: Some(thickness), .. } = &self.product {
            if thickness.is_sign_negative() {
                return Err(DomainError::Validation(
                    "spec.foil_thickness_micron must not be negative".into(),
                ));
            }
        }
        Ok(())
    }

    /// Flags of the four Pantone channels in order; absent channels are unset.
    pub fn pantone_flags(&self) -> [bool; MAX_SPOT_COLORS] {
        let mut flags = [false; MAX_SPOT_COLORS];
        for (flag, spot) in flags.iter_mut().zip(&self.spot_colors) {
            *flag = spot.enabled;
        }
        flags
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuotationItem {
    pub description: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit: Option<String>,
    pub unit_price: Decimal,
}

impl NewQuotationItem {
    fn validate(&self, index: usize) -> Result<(), DomainError> {
        if self.description.trim().is_empty() {
            return Err(DomainError::Validation(format!("items[{index}].description is required")));
        }
        check_charge(&format!("items[{index}]"), self.quantity, self.unit_price)
    }
}

pub(crate) fn check_colors(field: &str, value: u32) -> Result<(), DomainError> {
    if value > MAX_COLORS_PER_SIDE {
        return Err(DomainError::Validation(format!(
            "{field} must be at most {MAX_COLORS_PER_SIDE}"
        )));
    }
    Ok(())
}

pub(crate) fn check_dimension(field: &str, value: Option<Decimal>) -> Result<(), DomainError> {
    let Some(value) = value else {
        return Ok(());
    };
    if value.is_sign_negative() {
        return Err(DomainError::Validation(format!("{field} must not be negative")));
    }
    if value > Decimal::from(MAX_DIMENSION_MM) {
        return Err(DomainError::Validation(format!(
            "{field} must be at most {MAX_DIMENSION_MM} mm"
        )));
    }
    Ok(())
}

pub(crate) fn check_gsm(field: &str, value: Option<u32>) -> Result<(), DomainError> {
    if value.is_some_and(|gsm| gsm > MAX_GSM) {
        return Err(DomainError::Validation(format!("{field} must be at most {MAX_GSM}")));
    }
    Ok(())
}

/// Quantity must be positive and unit price non-negative, both within the supported range.
pub(crate) fn check_charge(
    prefix: &str,
    quantity: Decimal,
    unit_price: Decimal,
) -> Result<(), DomainError> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::Validation(format!("{prefix}.quantity must be greater than zero")));
    }
    if quantity > Decimal::from(MAX_ITEM_QUANTITY) {
        return Err(DomainError::Validation(format!(
            "{prefix}.quantity must be at most {MAX_ITEM_QUANTITY}"
        )));
    }
    if unit_price.is_sign_negative() {
        return Err(DomainError::Validation(format!("{prefix}.unit_price must not be negative")));
    }
    if unit_price > Decimal::from(MAX_UNIT_PRICE) {
        return Err(DomainError::Validation(format!(
            "{prefix}.unit_price must be at most {MAX_UNIT_PRICE}"
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationItem {
    pub id: QuotationItemId,
    pub position: u32,
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,
    pub unit_price: Decimal,
    pub total_price: Decimal,
}

impl QuotationItem {
    pub fn from_new(item: &NewQuotationItem, position: u32) -> Result<Self, DomainError> {
        let total_price = crate::cpq::pricing::line_total(item.quantity, item.unit_price)?;
        Ok(Self {
            id: QuotationItemId::generate(),
            position,
            description: item.description.trim().to_string(),
            quantity: item.quantity,
            unit: item
                .unit
                .as_deref()
                .map(str::trim)
                .filter(|unit| !unit.is_empty())
                .unwrap_or(DEFAULT_ITEM_UNIT)
                .to_string(),
            unit_price: item.unit_price,
            total_price,
        })
    }

    /// Same content under a fresh identity.
    pub fn duplicate(&self) -> Self {
        Self { id: QuotationItemId::generate(), ..self.clone() }
    }

    pub fn as_charge(&self) -> AdditionalCharge {
        AdditionalCharge { quantity: self.quantity, unit_price: self.unit_price }
    }
}

pub fn validate_items(items: &[NewQuotationItem]) -> Result<(), DomainError> {
    items.iter().enumerate().try_for_each(|(index, item)| item.validate(index))
}

pub fn build_items(items: &[NewQuotationItem]) -> Result<Vec<QuotationItem>, DomainError> {
    items
        .iter()
        .enumerate()
        .map(|(position, item)| QuotationItem::from_new(item, position as u32))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    pub quotation_number: String,
    pub version: u32,
    pub parent_quotation_id: Option<QuotationId>,
    pub status: QuotationStatus,
    pub customer_id: CustomerId,
    pub quotation_date: NaiveDate,
    pub valid_until: NaiveDate,
    pub spec: ProductSpec,
    pub terms: CommercialTerms,
    pub pricing: PricingBreakdown,
    pub items: Vec<QuotationItem>,
    pub notes: Option<String>,
    pub terms_and_conditions: Option<String>,
    pub converted_to_order_id: Option<OrderId>,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub sent_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Quotation {
    pub fn pricing_input(&self) -> PricingInput {
        PricingInput::from_parts(&self.spec, &self.terms, &self.items)
    }

    pub fn total_amount(&self) -> Decimal {
        self.pricing.total_amount
    }
}

/// Payload accepted by the create operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQuotation {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub quotation_date: Option<NaiveDate>,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    pub spec: ProductSpec,
    #[serde(default)]
    pub terms: CommercialTerms,
    #[serde(default)]
    pub items: Vec<NewQuotationItem>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub terms_and_conditions: Option<String>,
}

impl NewQuotation {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.customer_id.0.trim().is_empty() {
            return Err(DomainError::Validation("customer_id is required".into()));
        }
        self.spec.validate()?;
        self.terms.validate()?;
        validate_items(&self.items)?;
        if let (Some(quotation_date), Some(valid_until)) = (self.quotation_date, self.valid_until) {
            validate_validity(quotation_date, valid_until)?;
        }
        Ok(())
    }

    pub fn resolve_dates(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let quotation_date = self.quotation_date.unwrap_or(today);
        let valid_until = self
            .valid_until
            .unwrap_or_else(|| quotation_date + Duration::days(DEFAULT_VALIDITY_DAYS));
        (quotation_date, valid_until)
    }
}

/// Partial update of a draft. `None` leaves the field untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotationUpdate {
    pub customer_id: Option<CustomerId>,
    pub quotation_date: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
    pub spec: Option<ProductSpec>,
    pub terms: Option<CommercialTerms>,
    pub items: Option<Vec<NewQuotationItem>>,
    pub notes: Option<String>,
    pub terms_and_conditions: Option<String>,
}

impl QuotationUpdate {
    pub fn touches_pricing(&self) -> bool {
        self.spec.is_some() || self.terms.is_some() || self.items.is_some()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(customer_id) = &self.customer_id {
            if customer_id.0.trim().is_empty() {
                return Err(DomainError::Validation("customer_id must not be empty".into()));
            }
        }
        if let Some(spec) = &self.spec {
            spec.validate()?;
        }
        if let Some(terms) = &self.terms {
            terms.validate()?;
        }
        if let Some(items) = &self.items {
            validate_items(items)?;
        }
        Ok(())
    }
}

pub fn validate_validity(quotation_date: NaiveDate, valid_until: NaiveDate) -> Result<(), DomainError> {
    if valid_until < quotation_date {
        return Err(DomainError::Validation(
            "valid_until must not be earlier than quotation_date".into(),
        ));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotationHistoryEntry {
    pub id: QuotationHistoryId,
    pub quotation_id: QuotationId,
    pub old_status: QuotationStatus,
    pub new_status: QuotationStatus,
    pub changed_by: String,
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// Filters for listing quotations. Newest first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotationFilter {
    pub status: Option<QuotationStatus>,
    pub customer_id: Option<CustomerId>,
    pub search: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 200;

impl Default for QuotationFilter {
    fn default() -> Self {
        Self { status: None, customer_id: None, search: None, limit: DEFAULT_LIST_LIMIT, offset: 0 }
    }
}

impl QuotationFilter {
    pub fn effective_limit(&self) -> u32 {
        match self.limit {
            0 => DEFAULT_LIST_LIMIT,
            limit => limit.min(MAX_LIST_LIMIT),
        }
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|term| !term.is_empty())
    }
}
