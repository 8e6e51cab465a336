pub mod numbering;
pub mod pricing;

pub use numbering::{DailySequence, ORDER_NUMBERS, QUOTATION_NUMBERS};
pub use pricing::{
    calculate_pricing, round_money, AdditionalCharge, CommercialTerms, PricingBreakdown,
    PricingEngine, PricingInput, PricingRates, RateCardPricingEngine,
};
