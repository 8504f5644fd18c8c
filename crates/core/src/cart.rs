//! Cart Lines

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    customizations::Customizations,
    money::{AmountOverflow, checked_add, checked_mul, round_money},
};

/// An ephemeral cart line, priced at checkout and converted into an order item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Catalog product.
    pub product_uuid: Uuid,

    /// Requested quantity (at least one).
    pub quantity: u32,

    /// Product base price at the time the line is priced.
    pub base_price: Decimal,

    /// Shipping weight of one unit, in kilograms.
    #[serde(default)]
    pub unit_weight_kg: Decimal,

    /// Chosen customizations.
    #[serde(default)]
    pub customizations: Customizations,
}

impl CartLine {
    /// Creates a line without customizations.
    pub fn new(product_uuid: Uuid, quantity: u32, base_price: Decimal) -> Self {
        Self {
            product_uuid,
            quantity,
            base_price,
            unit_weight_kg: Decimal::ZERO,
            customizations: Customizations::default(),
        }
    }

    /// Sets the per-unit shipping weight.
    #[must_use]
    pub fn with_unit_weight(mut self, unit_weight_kg: Decimal) -> Self {
        self.unit_weight_kg = unit_weight_kg;
        self
    }

    /// Replaces the line's customizations.
    #[must_use]
    pub fn with_customizations(mut self, customizations: Customizations) -> Self {
        self.customizations = customizations;
        self
    }

    /// Base price plus every customization surcharge.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] when the price is out of range.
    pub fn unit_price(&self) -> Result<Decimal, AmountOverflow> {
        let surcharges = self.customizations.surcharge_total()?;

        Ok(round_money(checked_add(self.base_price, surcharges)?))
    }

    /// Unit price times quantity.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] when the total is out of range.
    pub fn line_total(&self) -> Result<Decimal, AmountOverflow> {
        Ok(round_money(checked_mul(
            self.unit_price()?,
            Decimal::from(self.quantity),
        )?))
    }
}
