pub mod config;
pub mod cpq;
pub mod domain;
pub mod errors;
pub mod lifecycle;

pub use cpq::{
    calculate_pricing, CommercialTerms, PricingBreakdown, PricingEngine, PricingInput,
    PricingRates, RateCardPricingEngine,
};
pub use domain::actor::{Actor, ActorRole};
pub use domain::customer::{Customer, CustomerId};
pub use domain::order::{NewOrder, Order, OrderId, OrderOverrides, OrderStatus};
pub use domain::quotation::{
    NewQuotation, NewQuotationItem, ProductSpec, ProductVariant, Quotation, QuotationFilter,
    QuotationHistoryEntry, QuotationId, QuotationItem, QuotationStatus, QuotationUpdate,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{LifecycleAction, QuotationLifecycle};
