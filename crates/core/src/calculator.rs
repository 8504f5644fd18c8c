//! Pricing Calculator
//!
//! Combines line prices, the delivery schedule and promo codes into order
//! totals. Nothing here performs I/O or keeps state between calls.

use jiff::Timestamp;
use rust_decimal::Decimal;

use crate::{
    cart::CartLine,
    config::PricingConfig,
    delivery::{DeliveryPolicy, Destination, TierKind},
    money::{AmountOverflow, checked_add, checked_mul, round_money},
    promotions::{PromoApplication, PromoCatalog, PromoCodeError},
};

/// Anything that can be priced as an order line.
pub trait PricedLine {
    /// Price of one unit.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] when the price is out of range.
    fn unit_price(&self) -> Result<Decimal, AmountOverflow>;

    /// Units on the line.
    fn quantity(&self) -> u32;

    /// Shipping weight of one unit, in kilograms.
    fn unit_weight_kg(&self) -> Decimal;
}

impl PricedLine for CartLine {
    fn unit_price(&self) -> Result<Decimal, AmountOverflow> {
        CartLine::unit_price(self)
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }

    fn unit_weight_kg(&self) -> Decimal {
        self.unit_weight_kg
    }
}

/// Totals of an order or cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Totals {
    /// Sum of line totals.
    pub subtotal: Decimal,

    /// Total shipping weight.
    pub weight_kg: Decimal,

    /// Tier the delivery fee was taken from.
    pub tier: TierKind,

    /// Delivery fee.
    pub delivery_fee: Decimal,

    /// Promo code that applied, if any.
    pub promo_code: Option<String>,

    /// Promo discount.
    pub discount: Decimal,

    /// `subtotal + delivery_fee - discount`.
    pub total: Decimal,
}

/// Pure pricing over a loaded [`PricingConfig`].
#[derive(Debug, Clone)]
pub struct PricingCalculator {
    delivery: DeliveryPolicy,
    promotions: PromoCatalog,
}

impl PricingCalculator {
    /// Creates a calculator from configuration.
    pub fn new(config: PricingConfig) -> Self {
        Self {
            delivery: config.delivery,
            promotions: config.promotions,
        }
    }

    /// The delivery schedule in use.
    pub fn delivery_policy(&self) -> &DeliveryPolicy {
        &self.delivery
    }

    /// The promo codes in use.
    pub fn promotions(&self) -> &PromoCatalog {
        &self.promotions
    }

    /// Base price plus every customization surcharge on the line.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] when the price is out of range.
    pub fn unit_price(&self, line: &CartLine) -> Result<Decimal, AmountOverflow> {
        line.unit_price()
    }

    /// Tiered delivery fee.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] when the weight surcharge is out of range.
    pub fn delivery_fee(
        &self,
        destination: &Destination,
        weight_kg: Decimal,
        subtotal: Decimal,
    ) -> Result<Decimal, AmountOverflow> {
        self.delivery.fee(destination, weight_kg, subtotal)
    }

    /// Applies a promo code to a subtotal.
    ///
    /// # Errors
    ///
    /// See [`PromoCatalog::apply`].
    pub fn apply_promo_code(
        &self,
        code: &str,
        subtotal: Decimal,
        now: Timestamp,
    ) -> Result<PromoApplication, PromoCodeError> {
        self.promotions.apply(code, subtotal, now)
    }

    /// Subtotal of a set of lines.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] when the subtotal is out of range.
    pub fn subtotal<L: PricedLine>(&self, lines: &[L]) -> Result<Decimal, AmountOverflow> {
        Ok(summarize(lines)?.subtotal)
    }

    /// Full totals for a set of lines. A promo code that no longer applies
    /// contributes no discount.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] when any amount is out of range.
    pub fn totals<L: PricedLine>(
        &self,
        lines: &[L],
        destination: &Destination,
        promo_code: Option<&str>,
        now: Timestamp,
    ) -> Result<Totals, AmountOverflow> {
        let LineSummary {
            subtotal,
            weight_kg,
        } = summarize(lines)?;

        let tier = self.delivery.applied_tier(destination, subtotal);
        let delivery_fee = self.delivery.fee(destination, weight_kg, subtotal)?;

        let applied = promo_code.and_then(|code| self.promotions.apply(code, subtotal, now).ok());

        let (promo_code, discount) = applied.map_or((None, Decimal::ZERO), |applied| {
            (Some(applied.code), applied.discount)
        });

        let total = checked_add(subtotal, delivery_fee)?
            .checked_sub(discount)
            .ok_or(AmountOverflow)?;

        Ok(Totals {
            subtotal,
            weight_kg,
            tier,
            delivery_fee,
            promo_code,
            discount,
            total: round_money(total),
        })
    }
}

struct LineSummary {
    subtotal: Decimal,
    weight_kg: Decimal,
}

fn summarize<L: PricedLine>(lines: &[L]) -> Result<LineSummary, AmountOverflow> {
    lines.iter().try_fold(
        LineSummary {
            subtotal: Decimal::ZERO,
            weight_kg: Decimal::ZERO,
        },
        |summary, line| {
            let quantity = Decimal::from(line.quantity());
            let line_total = checked_mul(line.unit_price()?, quantity)?;
            let line_weight = checked_mul(line.unit_weight_kg(), quantity)?;

            Ok(LineSummary {
                subtotal: round_money(checked_add(summary.subtotal, line_total)?),
                weight_kg: checked_add(summary.weight_kg, line_weight)?,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::Decimal;
    use testresult::TestResult;
    use uuid::Uuid;

    use crate::{
        cart::CartLine,
        config::PricingConfig,
        customizations::{Customization, CustomizationOption, Customizations, Surcharge},
        delivery::{Destination, TierKind},
    };

    use super::*;

    fn calculator() -> TestResult<PricingCalculator> {
        Ok(PricingCalculator::new(PricingConfig::bundled()?))
    }

    fn sao_paulo() -> Destination {
        Destination::new("São Paulo", "SP")
    }

    #[test]
    fn unit_price_includes_customizations() -> TestResult {
        let line = CartLine::new(Uuid::now_v7(), 1, Decimal::new(45_00, 2)).with_customizations(
            Customizations::default().with(Customization::Decoration(CustomizationOption::new(
                "chantilly",
                Surcharge::new(Decimal::new(7_50, 2))?,
            ))),
        );

        assert_eq!(calculator()?.unit_price(&line)?, Decimal::new(52_50, 2));

        Ok(())
    }

    #[test]
    fn totals_combine_delivery_and_discount() -> TestResult {
        let lines = [
            CartLine::new(Uuid::now_v7(), 2, Decimal::new(30_00, 2))
                .with_unit_weight(Decimal::new(5, 1)),
            CartLine::new(Uuid::now_v7(), 1, Decimal::new(40_00, 2))
                .with_unit_weight(Decimal::ONE),
        ];

        let totals =
            calculator()?.totals(&lines, &sao_paulo(), Some("BEMVINDO10"), Timestamp::now())?;

        assert_eq!(totals.subtotal, Decimal::from(100));
        assert_eq!(totals.weight_kg, Decimal::from(2));
        assert_eq!(totals.tier, TierKind::Metro);
        assert_eq!(totals.delivery_fee, Decimal::new(8_00, 2));
        assert_eq!(totals.promo_code.as_deref(), Some("BEMVINDO10"));
        assert_eq!(totals.discount, Decimal::from(10));
        assert_eq!(totals.total, Decimal::from(98));

        Ok(())
    }

    #[test]
    fn inapplicable_code_contributes_no_discount() -> TestResult {
        let lines = [CartLine::new(Uuid::now_v7(), 1, Decimal::from(20))];

        let totals =
            calculator()?.totals(&lines, &sao_paulo(), Some("ANIVERSARIO20"), Timestamp::now())?;

        assert_eq!(totals.promo_code, None);
        assert_eq!(totals.discount, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::from(28));

        Ok(())
    }

    #[test]
    fn free_shipping_above_threshold() -> TestResult {
        let lines = [CartLine::new(Uuid::now_v7(), 3, Decimal::from(50))
            .with_unit_weight(Decimal::from(4))];

        let totals = calculator()?.totals(
            &lines,
            &Destination::new("Belém", "PA"),
            None,
            Timestamp::now(),
        )?;

        assert_eq!(totals.tier, TierKind::FreeShipping);
        assert_eq!(totals.delivery_fee, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::from(150));

        Ok(())
    }

    #[test]
    fn empty_cart_costs_only_delivery() -> TestResult {
        let lines: [CartLine; 0] = [];

        let totals = calculator()?.totals(&lines, &sao_paulo(), None, Timestamp::now())?;

        assert_eq!(totals.subtotal, Decimal::ZERO);
        assert_eq!(totals.total, totals.delivery_fee);

        Ok(())
    }

    #[test]
    fn overflowing_lines_are_an_error() -> TestResult {
        let lines = [
            CartLine::new(Uuid::now_v7(), u32::MAX, Decimal::MAX),
            CartLine::new(Uuid::now_v7(), 1, Decimal::ONE),
        ];

        let calculator = calculator()?;

        assert_eq!(calculator.subtotal(&lines), Err(AmountOverflow));
        assert_eq!(
            calculator.totals(&lines, &sao_paulo(), None, Timestamp::now()),
            Err(AmountOverflow)
        );

        Ok(())
    }
}
