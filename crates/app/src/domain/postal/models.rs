//! Postal Models

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use crate::domain::postal::PostalLookupError;

/// An 8-digit CEP, stored without punctuation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PostalCode(String);

impl PostalCode {
    /// Normalises `01310-100`, `01.310-100` or `01310100` into `01310100`.
    ///
    /// # Errors
    ///
    /// Returns [`PostalLookupError::InvalidPostalCode`] unless exactly eight
    /// digits remain after stripping punctuation and whitespace.
    pub fn parse(raw: &str) -> Result<Self, PostalLookupError> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, '-' | '.' | ' '))
            .collect();

        if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(PostalLookupError::InvalidPostalCode(raw.to_string()));
        }

        Ok(Self(digits))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First five digits as a number, used for range tables.
    #[must_use]
    pub fn prefix(&self) -> u32 {
        self.0
            .chars()
            .take(5)
            .filter_map(|c| c.to_digit(10))
            .fold(0, |acc, digit| acc * 10 + digit)
    }
}

impl FromStr for PostalCode {
    type Err = PostalLookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for PostalCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Address fields resolved from a postal code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostalAddress {
    pub postal_code: PostalCode,
    pub street: String,
    pub neighborhood: String,
    pub city: String,
    pub region: String,
}

/// Outcome of resolving a postal code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The remote lookup answered.
    Resolved(PostalAddress),

    /// The remote lookup was unavailable; only the state could be inferred
    /// locally, if at all.
    Degraded {
        postal_code: PostalCode,
        region: Option<&'static str>,
    },
}

impl Resolution {
    #[must_use]
    pub fn postal_code(&self) -> &PostalCode {
        match self {
            Self::Resolved(address) => &address.postal_code,
            Self::Degraded { postal_code, .. } => postal_code,
        }
    }

    #[must_use]
    pub fn region(&self) -> Option<&str> {
        match self {
            Self::Resolved(address) => Some(address.region.as_str()),
            Self::Degraded { region, .. } => *region,
        }
    }

    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}
