//! Delivery Fees
//!
//! Fees are chosen from nested tiers: free shipping above a subtotal threshold,
//! then the metro tier, then the neighboring tier, then the default fee. A city
//! match is narrower than a region (state) match, so a city listed in any tier
//! wins over a region listed in another. Tier membership is configuration data.

use std::fmt::{self, Display, Formatter};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::money::{AmountOverflow, checked_add, checked_mul, round_money};

/// Where an order is delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// City name, e.g. `São Paulo`.
    pub city: String,

    /// Region (state) code, e.g. `SP`.
    pub region: String,
}

impl Destination {
    /// Creates a destination.
    pub fn new(city: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            region: region.into(),
        }
    }
}

/// One delivery tier and the places it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryTier {
    /// Base fee charged for this tier.
    pub fee: Decimal,

    /// Cities covered by this tier.
    #[serde(default)]
    pub cities: Vec<String>,

    /// Regions (states) covered by this tier.
    #[serde(default)]
    pub regions: Vec<String>,
}

impl DeliveryTier {
    fn covers_city(&self, city: &str) -> bool {
        self.cities.iter().any(|candidate| normalize_place(candidate) == city)
    }

    fn covers_region(&self, region: &str) -> bool {
        self.regions
            .iter()
            .any(|candidate| normalize_place(candidate) == region)
    }
}

/// The tier a delivery fell into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// Subtotal reached the free-shipping threshold.
    FreeShipping,

    /// Same metropolitan area.
    Metro,

    /// Neighboring area.
    Neighboring,

    /// Anywhere else.
    Default,
}

impl TierKind {
    /// Stable name of the tier.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FreeShipping => "free_shipping",
            Self::Metro => "metro",
            Self::Neighboring => "neighboring",
            Self::Default => "default",
        }
    }
}

impl Display for TierKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tiered delivery fee schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    /// Subtotal at or above which delivery is free.
    pub free_shipping_threshold: Decimal,

    /// Same metropolitan area tier.
    pub metro: DeliveryTier,

    /// Neighboring area tier.
    pub neighboring: DeliveryTier,

    /// Fee for every other destination.
    pub default_fee: Decimal,

    /// Weight included in every non-zero fee.
    pub weight_threshold_kg: Decimal,

    /// Charged per kilogram above the threshold, prorated.
    pub surcharge_per_kg: Decimal,
}

impl DeliveryPolicy {
    /// Geographic tier for a destination, ignoring the subtotal.
    pub fn tier_for(&self, destination: &Destination) -> TierKind {
        let city = normalize_place(&destination.city);
        let region = normalize_place(&destination.region);

        if self.metro.covers_city(&city) {
            return TierKind::Metro;
        }

        if self.neighboring.covers_city(&city) {
            return TierKind::Neighboring;
        }

        if self.metro.covers_region(&region) {
            return TierKind::Metro;
        }

        if self.neighboring.covers_region(&region) {
            return TierKind::Neighboring;
        }

        TierKind::Default
    }

    /// Tier applied to a delivery, including the free-shipping rule.
    pub fn applied_tier(&self, destination: &Destination, subtotal: Decimal) -> TierKind {
        if subtotal >= self.free_shipping_threshold {
            return TierKind::FreeShipping;
        }

        self.tier_for(destination)
    }

    /// Delivery fee for a destination, parcel weight and order subtotal.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] when the weight surcharge is out of range.
    pub fn fee(
        &self,
        destination: &Destination,
        weight_kg: Decimal,
        subtotal: Decimal,
    ) -> Result<Decimal, AmountOverflow> {
        let base = match self.applied_tier(destination, subtotal) {
            TierKind::FreeShipping => return Ok(Decimal::ZERO),
            TierKind::Metro => self.metro.fee,
            TierKind::Neighboring => self.neighboring.fee,
            TierKind::Default => self.default_fee,
        };

        Ok(round_money(checked_add(
            base,
            self.weight_surcharge(weight_kg)?,
        )?))
    }

    /// Prorated surcharge for weight above the threshold.
    ///
    /// # Errors
    ///
    /// Returns [`AmountOverflow`] when the surcharge is out of range.
    pub fn weight_surcharge(&self, weight_kg: Decimal) -> Result<Decimal, AmountOverflow> {
        if weight_kg <= self.weight_threshold_kg {
            return Ok(Decimal::ZERO);
        }

        let excess = weight_kg
            .checked_sub(self.weight_threshold_kg)
            .ok_or(AmountOverflow)?;

        checked_mul(excess, self.surcharge_per_kg)
    }
}

/// Lowercases, trims, collapses inner whitespace and strips Portuguese accents.
pub(crate) fn normalize_place(place: &str) -> String {
    place
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .flat_map(char::to_lowercase)
        .map(strip_accent)
        .collect()
}

fn strip_accent(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}
