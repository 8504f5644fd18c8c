//! Bakery Domain Concerns

pub mod addresses;
pub mod audit;
pub mod catalog;
pub mod orders;
pub mod payments;
pub mod postal;
pub mod stock;
pub mod users;
