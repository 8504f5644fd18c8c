//! Promo Codes
//!
//! Static discount rules looked up by code at checkout.

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::money::round_money;

/// Reasons a promo code does not apply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PromoCodeError {
    /// Unknown or expired code.
    #[error("invalid promo code: {code}")]
    InvalidCode {
        /// Code as supplied.
        code: String,
    },

    /// Subtotal below the code's minimum order value.
    #[error("order subtotal {subtotal} is below the {minimum} minimum for this code")]
    BelowMinimum {
        /// Minimum order value for the code.
        minimum: Decimal,

        /// Subtotal the code was tried against.
        subtotal: Decimal,
    },
}

/// How a promo code discounts an order.
#[derive(Debug, Clone, Copy)]
pub enum PromoKind {
    /// Percentage of the subtotal, e.g. 10% off.
    Percentage(Percentage),

    /// Fixed amount off.
    Fixed(Decimal),
}

impl PromoKind {
    /// Stable name of the kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Percentage(_) => "percentage",
            Self::Fixed(_) => "fixed",
        }
    }
}

/// A promo code rule.
#[derive(Debug, Clone)]
pub struct PromoCode {
    /// Canonical (upper-case) code.
    pub code: String,

    /// Discount rule.
    pub kind: PromoKind,

    /// Minimum subtotal for the code to apply.
    pub min_order_value: Decimal,

    /// Cap for percentage discounts.
    pub max_discount: Option<Decimal>,

    /// Instant from which the code is no longer accepted.
    pub expires_at: Option<Timestamp>,
}

impl PromoCode {
    /// Whether the code has expired at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Discount this rule grants on `subtotal`, ignoring minimum and expiry.
    /// Always within `[0, subtotal]`.
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let subtotal = subtotal.max(Decimal::ZERO);

        let raw = match self.kind {
            PromoKind::Fixed(amount) => amount,
            PromoKind::Percentage(percent) => {
                let discount = (percent * Decimal::ONE)
                    .checked_mul(subtotal)
                    .unwrap_or(subtotal);

                self.max_discount
                    .map_or(discount, |max_discount| discount.min(max_discount))
            }
        };

        round_money(raw).clamp(Decimal::ZERO, subtotal)
    }
}

/// A successfully applied promo code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoApplication {
    /// Canonical code that applied.
    pub code: String,

    /// Discount granted.
    pub discount: Decimal,
}

/// The set of promo codes accepted at checkout.
#[derive(Debug, Clone, Default)]
pub struct PromoCatalog {
    codes: FxHashMap<String, PromoCode>,
}

impl PromoCatalog {
    /// Builds a catalog; later duplicates replace earlier ones.
    pub fn new(codes: impl IntoIterator<Item = PromoCode>) -> Self {
        let codes = codes
            .into_iter()
            .map(|mut code| {
                code.code = canonical_code(&code.code);
                (code.code.clone(), code)
            })
            .collect();

        Self { codes }
    }

    /// Looks up a code, case-insensitively.
    pub fn get(&self, code: &str) -> Option<&PromoCode> {
        self.codes.get(&canonical_code(code))
    }

    /// Number of configured codes.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether no codes are configured.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Applies `code` to `subtotal` at `now`.
    ///
    /// # Errors
    ///
    /// - [`PromoCodeError::InvalidCode`] when the code is unknown or expired.
    /// - [`PromoCodeError::BelowMinimum`] when `subtotal` is under the code's minimum.
    pub fn apply(
        &self,
        code: &str,
        subtotal: Decimal,
        now: Timestamp,
    ) -> Result<PromoApplication, PromoCodeError> {
        let rule = self
            .get(code)
            .filter(|rule| !rule.is_expired(now))
            .ok_or_else(|| PromoCodeError::InvalidCode {
                code: code.to_string(),
            })?;

        if subtotal < rule.min_order_value {
            return Err(PromoCodeError::BelowMinimum {
                minimum: rule.min_order_value,
                subtotal,
            });
        }

        Ok(PromoApplication {
            code: rule.code.clone(),
            discount: rule.discount_for(subtotal),
        })
    }
}

pub(crate) fn canonical_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use decimal_percentage::Percentage;
    use jiff::{Timestamp, ToSpan};
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use super::*;

    fn catalog() -> PromoCatalog {
        PromoCatalog::new([
            PromoCode {
                code: "BEMVINDO10".to_string(),
                kind: PromoKind::Percentage(Percentage::from(0.10)),
                min_order_value: Decimal::from(50),
                max_discount: Some(Decimal::from(20)),
                expires_at: None,
            },
            PromoCode {
                code: "ANIVERSARIO20".to_string(),
                kind: PromoKind::Percentage(Percentage::from(0.20)),
                min_order_value: Decimal::from(100),
                max_discount: Some(Decimal::from(50)),
                expires_at: None,
            },
            PromoCode {
                code: "doce15".to_string(),
                kind: PromoKind::Fixed(Decimal::from(15)),
                min_order_value: Decimal::ZERO,
                max_discount: None,
                expires_at: None,
            },
        ])
    }

    #[test]
    fn welcome_code_takes_ten_percent() -> TestResult {
        let applied = catalog().apply("BEMVINDO10", Decimal::from(100), Timestamp::now())?;

        assert_eq!(applied.discount, Decimal::from(10));

        Ok(())
    }

    #[test]
    fn birthday_code_takes_twenty_percent() -> TestResult {
        let applied = catalog().apply("ANIVERSARIO20", Decimal::from(100), Timestamp::now())?;

        assert_eq!(applied.discount, Decimal::from(20));

        Ok(())
    }

    #[test]
    fn percentage_discount_is_capped() -> TestResult {
        let applied = catalog().apply("BEMVINDO10", Decimal::from(500), Timestamp::now())?;

        assert_eq!(applied.discount, Decimal::from(20));

        Ok(())
    }

    #[test]
    fn codes_match_case_insensitively() -> TestResult {
        let applied = catalog().apply(" bemvindo10 ", Decimal::from(60), Timestamp::now())?;

        assert_eq!(applied.code, "BEMVINDO10");
        assert_eq!(applied.discount, Decimal::from(6));

        Ok(())
    }

    #[test]
    fn unknown_code_is_invalid() {
        let result = catalog().apply("NOPE", Decimal::from(100), Timestamp::now());

        assert_eq!(
            result,
            Err(PromoCodeError::InvalidCode {
                code: "NOPE".to_string()
            })
        );
    }

    #[test]
    fn expired_code_is_invalid() -> TestResult {
        let now = Timestamp::now();
        let mut code = catalog()
            .get("BEMVINDO10")
            .cloned()
            .ok_or("BEMVINDO10 should be configured")?;
        code.expires_at = Some(now.checked_sub(1.hour())?);

        let result = PromoCatalog::new([code]).apply("BEMVINDO10", Decimal::from(100), now);

        assert!(
            matches!(result, Err(PromoCodeError::InvalidCode { .. })),
            "expected InvalidCode, got {result:?}"
        );

        Ok(())
    }

    #[test]
    fn subtotal_below_minimum_is_rejected() {
        let result = catalog().apply("ANIVERSARIO20", Decimal::new(99_99, 2), Timestamp::now());

        assert_eq!(
            result,
            Err(PromoCodeError::BelowMinimum {
                minimum: Decimal::from(100),
                subtotal: Decimal::new(99_99, 2),
            })
        );
    }

    #[test]
    fn fixed_discount_never_exceeds_subtotal() -> TestResult {
        let applied = catalog().apply("DOCE15", Decimal::new(9_90, 2), Timestamp::now())?;

        assert_eq!(applied.discount, Decimal::new(9_90, 2));

        Ok(())
    }

    #[test]
    fn discount_is_bounded_by_subtotal_for_any_rule() {
        let rules = [
            PromoKind::Percentage(Percentage::from(1.5)),
            PromoKind::Percentage(Percentage::from(0.33)),
            PromoKind::Fixed(Decimal::from(1_000)),
            PromoKind::Fixed(Decimal::from(-5)),
        ];

        let subtotals = [
            Decimal::ZERO,
            Decimal::new(1, 2),
            Decimal::new(49_99, 2),
            Decimal::from(250),
        ];

        for kind in rules {
            for max_discount in [None, Some(Decimal::from(10))] {
                let rule = PromoCode {
                    code: "X".to_string(),
                    kind,
                    min_order_value: Decimal::ZERO,
                    max_discount,
                    expires_at: None,
                };

                for subtotal in subtotals {
                    let discount = rule.discount_for(subtotal);

                    assert!(
                        discount >= Decimal::ZERO && discount <= subtotal,
                        "{} rule gave {discount} on {subtotal}",
                        kind.as_str()
                    );
                }
            }
        }
    }
}
