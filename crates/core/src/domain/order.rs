use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::customer::CustomerId;
use crate::domain::quotation::{FinishingSpec, PrePressSpec, ProductVariant, QuotationId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fields handed to the orders collaborator when a quotation is converted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub quotation_id: QuotationId,
    pub customer_id: CustomerId,
    #[serde(flatten)]
    pub product: ProductVariant,
    pub product_name: Option<String>,
    pub quantity: u32,
    pub length_mm: Option<Decimal>,
    pub width_mm: Option<Decimal>,
    pub height_mm: Option<Decimal>,
    pub gsm: Option<u32>,
    pub board_type: Option<String>,
    pub paper_type: Option<String>,
    pub color_front: u32,
    pub color_back: u32,
    pub spot_colors: Vec<String>,
    pub finishing: FinishingSpec,
    pub pre_press: PrePressSpec,
    pub total_amount: Decimal,
    pub order_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub notes: Option<String>,
}

/// Caller-supplied values that replace the conversion defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderOverrides {
    pub order_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProduction,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProduction => "in_production",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "in_production" => Some(Self::InProduction),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub status: OrderStatus,
    #[serde(flatten)]
    pub details: NewOrder,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}
