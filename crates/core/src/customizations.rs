//! Cart Line Customizations
//!
//! A cart line may carry at most one size, flavor and decoration choice plus any
//! number of extras. Every option carries a non-negative surcharge.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::money::{AmountOverflow, checked_add};

/// Largest surcharge a single option may carry, in BRL.
pub const MAX_SURCHARGE: Decimal = Decimal::from_parts(10_000_000, 0, 0, false, 2);

/// Errors raised while building surcharges.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SurchargeError {
    /// Surcharges must never reduce a price.
    #[error("surcharge cannot be negative: {0}")]
    Negative(Decimal),

    /// Surcharge above [`MAX_SURCHARGE`].
    #[error("surcharge {0} is above the allowed maximum")]
    TooLarge(Decimal),
}

/// A non-negative amount added to a product's base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Surcharge(Decimal);

impl Surcharge {
    /// No surcharge.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates a surcharge within `[0, MAX_SURCHARGE]`.
    ///
    /// # Errors
    ///
    /// - [`SurchargeError::Negative`] when `amount` is below zero.
    /// - [`SurchargeError::TooLarge`] when `amount` is above [`MAX_SURCHARGE`].
    pub fn new(amount: Decimal) -> Result<Self, SurchargeError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(SurchargeError::Negative(amount));
        }

        if amount > MAX_SURCHARGE {
            return Err(SurchargeError::TooLarge(amount));
        }

        Ok(Self(amount))
    }

    /// The surcharge amount.
    pub const fn amount(self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Surcharge {
    type Error = SurchargeError;

    fn try_from(amount: Decimal) -> Result<Self, Self::Error> {
        Self::new(amount)
    }
}

impl From<Surcharge> for Decimal {
    fn from(surcharge: Surcharge) -> Self {
        surcharge.0
    }
}

/// A selectable option, e.g. size `G` for R$ 8,00 more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomizationOption {
    /// Option code as shown in the catalog.
    pub code: String,

    /// Amount added to the unit price.
    #[serde(default)]
    pub surcharge: Surcharge,
}

impl CustomizationOption {
    /// Creates an option.
    pub fn new(code: impl Into<String>, surcharge: Surcharge) -> Self {
        Self {
            code: code.into(),
            surcharge,
        }
    }
}

/// A single customization choice on a cart line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Customization {
    /// Product size.
    Size(CustomizationOption),

    /// Dough or filling flavor.
    Flavor(CustomizationOption),

    /// Decoration (toppers, writing, etc.).
    Decoration(CustomizationOption),

    /// Additional item; a line may have several.
    Extra(CustomizationOption),
}

impl Customization {
    /// The selected option.
    pub const fn option(&self) -> &CustomizationOption {
        match self {
            Self::Size(option)
            | Self::Flavor(option)
            | Self::Decoration(option)
            | Self::Extra(option) => option,
        }
    }

    /// Surcharge this customization contributes to the unit price.
    pub const fn surcharge(&self) -> Surcharge {
        self.option().surcharge
    }

    /// Stable name of the customization kind.
    pub const fn kind_as_str(&self) -> &'static str {
        match self {
            Self::Size(_) => "size",
            Self::Flavor(_) => "flavor",
            Self::Decoration(_) => "decoration",
            Self::Extra(_) => "extra",
        }
    }
}

/// The customizations chosen for one cart line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customizations {
    /// Size choice.
    #[serde(default)]
    pub size: Option<CustomizationOption>,

    /// Flavor choice.
    #[serde(default)]
    pub flavor: Option<CustomizationOption>,

    /// Decoration choice.
    #[serde(default)]
    pub decoration: Option<CustomizationOption>,

    /// Extras, in selection order.
    #[serde(default)]
    pub extras: SmallVec<[CustomizationOption; 4]>,
}

impl Customizations {
    /// Adds a customization. A size, flavor or decoration replaces any previous
    /// choice of the same kind; extras accumulate.
    #[must_use]
    pub fn with(mut self, customization: Customization) -> Self {
        match customization {
            Customization::Size(option) => self.size = Some(option),
            Customization::Flavor(option) => self.flavor = Some(option),
            Customization::Decoration(option) => self.decoration = Some(option),
            Customization::Extra(option) => self.extras.push(option),
        }

        self
    }

    /// All present customizations.
    pub fn iter(&self) -> impl Iterator<Item = Customization> + '_ {
        let singles = [
            self.size.clone().map(Customization::Size),
            self.flavor.clone().map(Customization::Flavor),
            self.decoration.clone().map(Customization::Decoration),
        ];

        singles
            .into_iter()
            .flatten()
            .chain(self.extras.iter().cloned().map(Customization::Extra))
    }

    /// Sum of every present surcharge. Absent customizations contribute zero.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] when the sum is out of range.
    pub fn surcharge_total(&self) -> Result<Decimal, AmountOverflow> {
        self.iter().try_fold(Decimal::ZERO, |total, customization| {
            checked_add(total, customization.surcharge().amount())
        })
    }

    /// Whether nothing was customised.
    pub fn is_empty(&self) -> bool {
        self.size.is_none()
            && self.flavor.is_none()
            && self.decoration.is_none()
            && self.extras.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;

    fn option(code: &str, cents: i64) -> TestResult<CustomizationOption> {
        Ok(CustomizationOption::new(
            code,
            Surcharge::new(Decimal::new(cents, 2))?,
        ))
    }

    #[test]
    fn negative_surcharge_is_rejected() {
        let result = Surcharge::new(Decimal::new(-1, 2));

        assert_eq!(result, Err(SurchargeError::Negative(Decimal::new(-1, 2))));
    }

    #[test]
    fn surcharge_above_limit_is_rejected() -> TestResult {
        assert_eq!(Surcharge::new(MAX_SURCHARGE)?.amount(), Decimal::from(100_000));
        assert_eq!(
            Surcharge::new(Decimal::MAX),
            Err(SurchargeError::TooLarge(Decimal::MAX))
        );

        Ok(())
    }

    #[test]
    fn oversized_surcharge_fails_to_deserialize() {
        let result: Result<CustomizationOption, _> =
            serde_norway::from_str("code: ouro\nsurcharge: \"100000.01\"\n");

        assert!(result.is_err(), "oversized surcharge must be rejected");
    }

    #[test]
    fn zero_surcharge_is_allowed() -> TestResult {
        assert_eq!(Surcharge::new(Decimal::ZERO)?, Surcharge::ZERO);

        Ok(())
    }

    #[test]
    fn empty_customizations_add_nothing() {
        let customizations = Customizations::default();

        assert!(customizations.is_empty());
        assert_eq!(customizations.surcharge_total(), Ok(Decimal::ZERO));
    }

    #[test]
    fn surcharges_from_every_kind_are_summed() -> TestResult {
        let customizations = Customizations::default()
            .with(Customization::Size(option("G", 8_00)?))
            .with(Customization::Flavor(option("chocolate", 4_50)?))
            .with(Customization::Decoration(option("topo", 12_00)?))
            .with(Customization::Extra(option("vela", 2_00)?))
            .with(Customization::Extra(option("cartao", 1_50)?));

        assert_eq!(customizations.surcharge_total()?, Decimal::new(28_00, 2));
        assert_eq!(customizations.iter().count(), 5);

        Ok(())
    }

    #[test]
    fn later_size_replaces_earlier_choice() -> TestResult {
        let customizations = Customizations::default()
            .with(Customization::Size(option("P", 0)?))
            .with(Customization::Size(option("M", 5_00)?));

        assert_eq!(
            customizations.size.as_ref().map(|size| size.code.as_str()),
            Some("M")
        );
        assert_eq!(customizations.surcharge_total()?, Decimal::new(5_00, 2));

        Ok(())
    }

    #[test]
    fn negative_surcharge_fails_to_deserialize() {
        let result: Result<CustomizationOption, _> =
            serde_norway::from_str("code: desconto\nsurcharge: \"-3.00\"\n");

        assert!(result.is_err(), "negative surcharge must be rejected");
    }
}
