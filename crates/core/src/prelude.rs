//! Fornada prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    calculator::{PricedLine, PricingCalculator, Totals},
    cart::CartLine,
    config::{PricingConfig, PricingConfigError},
    customizations::{Customization, CustomizationOption, Customizations, Surcharge, SurchargeError},
    delivery::{DeliveryPolicy, DeliveryTier, Destination, TierKind},
    money::{AmountOverflow, round_money},
    promotions::{PromoApplication, PromoCatalog, PromoCode, PromoCodeError, PromoKind},
};
