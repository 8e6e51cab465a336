pub mod actor;
pub mod customer;
pub mod order;
pub mod quotation;
