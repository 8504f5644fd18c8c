//! Fornada
//!
//! Pricing primitives for the bakery order engine: customised cart line prices,
//! tiered delivery fees and promo-code discounts. Everything here is pure; the
//! only I/O is loading the pricing configuration.

pub mod calculator;
pub mod cart;
pub mod config;
pub mod customizations;
pub mod delivery;
pub mod money;
pub mod prelude;
pub mod promotions;
