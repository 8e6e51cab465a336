pub mod conversion;
pub mod engine;
pub mod revision;
pub mod states;

pub use conversion::{complete_conversion, prepare_conversion, DEFAULT_DELIVERY_LEAD_DAYS};
pub use engine::{QuotationLifecycle, DEFAULT_REJECTION_REASON};
pub use revision::revise;
pub use states::{next_status, LifecycleAction};
