//! Pricing Configuration
//!
//! Delivery tiers and promo codes are data, loaded from YAML.

use std::{collections::BTreeMap, fs, io, path::Path};

use decimal_percentage::Percentage;
use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    delivery::DeliveryPolicy,
    promotions::{PromoCatalog, PromoCode, PromoKind},
};

const BUNDLED_PRICING_YAML: &str = include_str!("../config/pricing.yaml");

/// Errors raised while loading pricing configuration.
#[derive(Debug, Error)]
pub enum PricingConfigError {
    /// The configuration file could not be read.
    #[error("failed to read pricing config: {0}")]
    Io(#[from] io::Error),

    /// The YAML could not be parsed.
    #[error("failed to parse pricing config: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// A percentage promo code is outside 0-100%.
    #[error("promo code {code} has an invalid percentage: {value}")]
    InvalidPercentage {
        /// Offending code.
        code: String,

        /// Configured value.
        value: Decimal,
    },

    /// An amount that must not be negative is negative.
    #[error("{field} cannot be negative")]
    NegativeAmount {
        /// Name of the offending field.
        field: String,
    },
}

/// Promo code kinds as written in configuration.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PromoKindFixture {
    Percentage,
    Fixed,
}

/// Promo code as written in configuration.
#[derive(Debug, Deserialize)]
struct PromoCodeFixture {
    kind: PromoKindFixture,

    /// Percentage points for `percentage`, currency amount for `fixed`.
    value: Decimal,

    #[serde(default)]
    min_order_value: Decimal,

    #[serde(default)]
    max_discount: Option<Decimal>,

    #[serde(default)]
    expires_at: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
struct PricingFixture {
    delivery: DeliveryPolicy,

    #[serde(default)]
    promo_codes: BTreeMap<String, PromoCodeFixture>,
}

/// Loaded pricing configuration.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Delivery fee schedule.
    pub delivery: DeliveryPolicy,

    /// Accepted promo codes.
    pub promotions: PromoCatalog,
}

impl PricingConfig {
    /// The configuration bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the bundled YAML is invalid.
    pub fn bundled() -> Result<Self, PricingConfigError> {
        Self::from_yaml_str(BUNDLED_PRICING_YAML)
    }

    /// Reads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PricingConfigError> {
        let yaml = fs::read_to_string(path)?;

        Self::from_yaml_str(&yaml)
    }

    /// Parses configuration from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed YAML, negative amounts or out-of-range
    /// percentages.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, PricingConfigError> {
        let fixture: PricingFixture = serde_norway::from_str(yaml)?;

        validate_delivery(&fixture.delivery)?;

        let codes = fixture
            .promo_codes
            .into_iter()
            .map(|(code, fixture)| promo_code(code, fixture))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            delivery: fixture.delivery,
            promotions: PromoCatalog::new(codes),
        })
    }
}

fn promo_code(code: String, fixture: PromoCodeFixture) -> Result<PromoCode, PricingConfigError> {
    non_negative(&format!("{code}.value"), fixture.value)?;
    non_negative(&format!("{code}.min_order_value"), fixture.min_order_value)?;

    if let Some(max_discount) = fixture.max_discount {
        non_negative(&format!("{code}.max_discount"), max_discount)?;
    }

    let kind = match fixture.kind {
        PromoKindFixture::Fixed => PromoKind::Fixed(fixture.value),
        PromoKindFixture::Percentage => {
            if fixture.value > Decimal::ONE_HUNDRED {
                return Err(PricingConfigError::InvalidPercentage {
                    code,
                    value: fixture.value,
                });
            }

            let rate = (fixture.value / Decimal::ONE_HUNDRED).normalize().to_string();

            let percent = Percentage::try_from(rate.as_str()).map_err(|_err| {
                PricingConfigError::InvalidPercentage {
                    code: code.clone(),
                    value: fixture.value,
                }
            })?;

            PromoKind::Percentage(percent)
        }
    };

    Ok(PromoCode {
        code,
        kind,
        min_order_value: fixture.min_order_value,
        max_discount: fixture.max_discount,
        expires_at: fixture.expires_at,
    })
}

fn validate_delivery(policy: &DeliveryPolicy) -> Result<(), PricingConfigError> {
    non_negative("delivery.free_shipping_threshold", policy.free_shipping_threshold)?;
    non_negative("delivery.default_fee", policy.default_fee)?;
    non_negative("delivery.metro.fee", policy.metro.fee)?;
    non_negative("delivery.neighboring.fee", policy.neighboring.fee)?;
    non_negative("delivery.weight_threshold_kg", policy.weight_threshold_kg)?;
    non_negative("delivery.surcharge_per_kg", policy.surcharge_per_kg)
}

fn non_negative(field: &str, amount: Decimal) -> Result<(), PricingConfigError> {
    if amount < Decimal::ZERO {
        return Err(PricingConfigError::NegativeAmount {
            field: field.to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use jiff::Timestamp;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::delivery::{Destination, TierKind};

    use super::*;

    #[test]
    fn bundled_config_loads() -> TestResult {
        let config = PricingConfig::bundled()?;

        assert_eq!(config.promotions.len(), 3);
        assert_eq!(
            config
                .delivery
                .tier_for(&Destination::new("Santo Andre", "SP")),
            TierKind::Metro
        );

        Ok(())
    }

    #[test]
    fn bundled_promo_codes_match_published_rules() -> TestResult {
        let config = PricingConfig::bundled()?;
        let now = Timestamp::now();

        let welcome = config.promotions.apply("BEMVINDO10", Decimal::from(100), now)?;
        let birthday = config
            .promotions
            .apply("ANIVERSARIO20", Decimal::from(100), now)?;

        assert_eq!(welcome.discount, Decimal::from(10));
        assert_eq!(birthday.discount, Decimal::from(20));

        Ok(())
    }

    #[test]
    fn percentage_over_one_hundred_is_rejected() {
        let yaml = r#"
delivery:
  free_shipping_threshold: "100"
  default_fee: "20"
  weight_threshold_kg: "5"
  surcharge_per_kg: "1"
  metro: { fee: "5" }
  neighboring: { fee: "10" }
promo_codes:
  TUDO:
    kind: percentage
    value: "150"
"#;

        let result = PricingConfig::from_yaml_str(yaml);

        assert!(
            matches!(result, Err(PricingConfigError::InvalidPercentage { .. })),
            "expected InvalidPercentage, got {result:?}"
        );
    }

    #[test]
    fn negative_fee_is_rejected() {
        let yaml = r#"
delivery:
  free_shipping_threshold: "100"
  default_fee: "-1"
  weight_threshold_kg: "5"
  surcharge_per_kg: "1"
  metro: { fee: "5" }
  neighboring: { fee: "10" }
"#;

        let result = PricingConfig::from_yaml_str(yaml);

        assert!(
            matches!(result, Err(PricingConfigError::NegativeAmount { ref field }) if field == "delivery.default_fee"),
            "expected NegativeAmount, got {result:?}"
        );
    }

    #[test]
    fn expiry_is_read_from_yaml() -> TestResult {
        let yaml = r#"
delivery:
  free_shipping_threshold: "100"
  default_fee: "20"
  weight_threshold_kg: "5"
  surcharge_per_kg: "1"
  metro: { fee: "5" }
  neighboring: { fee: "10" }
promo_codes:
  NATAL:
    kind: fixed
    value: "10"
    expires_at: "2020-12-26T03:00:00Z"
"#;

        let config = PricingConfig::from_yaml_str(yaml)?;
        let result = config
            .promotions
            .apply("NATAL", Decimal::from(50), Timestamp::now());

        assert!(result.is_err(), "expired code must not apply");

        Ok(())
    }
}
