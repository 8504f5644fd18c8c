//! Postal-code resolver with local fallback.

use std::{sync::Arc, time::Duration};

use tokio::time::timeout;
use tracing::warn;

use crate::domain::postal::{
    PostalLookupError,
    lookup::PostalCodeLookup,
    models::{PostalCode, Resolution},
};

/// CEP prefix ranges (first five digits, inclusive) per state.
const CEP_RANGES: &[(u32, u32, &str)] = &[
    (1_000, 19_999, "SP"),
    (20_000, 28_999, "RJ"),
    (29_000, 29_999, "ES"),
    (30_000, 39_999, "MG"),
    (40_000, 48_999, "BA"),
    (49_000, 49_999, "SE"),
    (50_000, 56_999, "PE"),
    (57_000, 57_999, "AL"),
    (58_000, 58_999, "PB"),
    (59_000, 59_999, "RN"),
    (60_000, 63_999, "CE"),
    (64_000, 64_999, "PI"),
    (65_000, 65_999, "MA"),
    (66_000, 68_899, "PA"),
    (68_900, 68_999, "AP"),
    (69_000, 69_299, "AM"),
    (69_300, 69_399, "RR"),
    (69_400, 69_899, "AM"),
    (69_900, 69_999, "AC"),
    (70_000, 72_799, "DF"),
    (72_800, 72_999, "GO"),
    (73_000, 73_699, "DF"),
    (73_700, 76_799, "GO"),
    (76_800, 76_999, "RO"),
    (77_000, 77_999, "TO"),
    (78_000, 78_899, "MT"),
    (79_000, 79_999, "MS"),
    (80_000, 87_999, "PR"),
    (88_000, 89_999, "SC"),
    (90_000, 99_999, "RS"),
];

/// State for a postal code from the local range table.
#[must_use]
pub fn local_region(postal_code: &PostalCode) -> Option<&'static str> {
    let prefix = postal_code.prefix();

    CEP_RANGES
        .iter()
        .find(|(start, end, _)| (*start..=*end).contains(&prefix))
        .map(|(_, _, region)| *region)
}

#[derive(Clone)]
pub struct PostalCodeResolver {
    lookup: Arc<dyn PostalCodeLookup>,
    timeout: Duration,
}

impl std::fmt::Debug for PostalCodeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostalCodeResolver")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl PostalCodeResolver {
    #[must_use]
    pub fn new(lookup: Arc<dyn PostalCodeLookup>, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    /// Resolves a raw postal code. A timeout or an unavailable lookup degrades
    /// to the local table instead of failing.
    ///
    /// # Errors
    ///
    /// - [`PostalLookupError::InvalidPostalCode`] for malformed input.
    /// - [`PostalLookupError::NotFound`] when the lookup answered that the code
    ///   does not exist.
    #[tracing::instrument(name = "postal.resolver.resolve", skip(self), err)]
    pub async fn resolve(&self, raw: &str) -> Result<Resolution, PostalLookupError> {
        let postal_code = PostalCode::parse(raw)?;

        let outcome = match timeout(self.timeout, self.lookup.lookup(&postal_code)).await {
            Ok(outcome) => outcome,
            Err(_elapsed) => Err(PostalLookupError::ExternalUnavailable(format!(
                "no answer within {} ms",
                self.timeout.as_millis()
            ))),
        };

        match outcome {
            Ok(address) => Ok(Resolution::Resolved(address)),
            Err(PostalLookupError::ExternalUnavailable(reason)) => {
                let region = local_region(&postal_code);

                warn!(
                    postal_code = %postal_code,
                    reason = %reason,
                    region = region.unwrap_or("unknown"),
                    "postal lookup unavailable, using local fallback"
                );

                Ok(Resolution::Degraded {
                    postal_code,
                    region,
                })
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use testresult::TestResult;

    use crate::domain::postal::{
        MockPostalCodeLookup,
        models::{PostalAddress, PostalCode},
    };

    use super::*;

    struct SlowLookup;

    #[async_trait]
    impl PostalCodeLookup for SlowLookup {
        async fn lookup(
            &self,
            _postal_code: &PostalCode,
        ) -> Result<PostalAddress, PostalLookupError> {
            tokio::time::sleep(Duration::from_secs(60)).await;

            Err(PostalLookupError::NotFound)
        }
    }

    fn paulista() -> TestResult<PostalAddress> {
        Ok(PostalAddress {
            postal_code: PostalCode::parse("01310-100")?,
            street: "Avenida Paulista".to_string(),
            neighborhood: "Bela Vista".to_string(),
            city: "São Paulo".to_string(),
            region: "SP".to_string(),
        })
    }

    #[tokio::test]
    async fn answered_lookup_is_resolved() -> TestResult {
        let address = paulista()?;
        let expected = address.clone();
        let mut lookup = MockPostalCodeLookup::new();

        lookup
            .expect_lookup()
            .times(1)
            .returning(move |_| Ok(address.clone()));

        let resolver = PostalCodeResolver::new(Arc::new(lookup), Duration::from_secs(1));

        assert_eq!(
            resolver.resolve("01310100").await?,
            Resolution::Resolved(expected)
        );

        Ok(())
    }

    #[tokio::test]
    async fn unavailable_lookup_degrades_to_local_region() -> TestResult {
        let mut lookup = MockPostalCodeLookup::new();

        lookup
            .expect_lookup()
            .times(1)
            .returning(|_| Err(PostalLookupError::ExternalUnavailable("503".to_string())));

        let resolver = PostalCodeResolver::new(Arc::new(lookup), Duration::from_secs(1));
        let resolution = resolver.resolve("20040-002").await?;

        assert!(resolution.is_degraded(), "expected degraded resolution");
        assert_eq!(resolution.region(), Some("RJ"));

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_lookup_degrades() -> TestResult {
        let resolver = PostalCodeResolver::new(Arc::new(SlowLookup), Duration::from_millis(500));

        let resolution = resolver.resolve("90010-000").await?;

        assert_eq!(
            resolution,
            Resolution::Degraded {
                postal_code: PostalCode::parse("90010000")?,
                region: Some("RS"),
            }
        );

        Ok(())
    }

    #[tokio::test]
    async fn unknown_code_is_not_degraded() {
        let mut lookup = MockPostalCodeLookup::new();

        lookup
            .expect_lookup()
            .returning(|_| Err(PostalLookupError::NotFound));

        let resolver = PostalCodeResolver::new(Arc::new(lookup), Duration::from_secs(1));

        assert_eq!(
            resolver.resolve("99999-999").await,
            Err(PostalLookupError::NotFound)
        );
    }

    #[tokio::test]
    async fn malformed_code_never_reaches_lookup() {
        let mut lookup = MockPostalCodeLookup::new();

        lookup.expect_lookup().never();

        let resolver = PostalCodeResolver::new(Arc::new(lookup), Duration::from_secs(1));

        assert!(matches!(
            resolver.resolve("abc").await,
            Err(PostalLookupError::InvalidPostalCode(_))
        ));
    }

    #[test]
    fn local_table_covers_known_capitals() -> TestResult {
        let cases = [
            ("01001-000", "SP"),
            ("30130-010", "MG"),
            ("40020-000", "BA"),
            ("69005-000", "AM"),
            ("70040-010", "DF"),
            ("80010-000", "PR"),
        ];

        for (code, region) in cases {
            assert_eq!(local_region(&PostalCode::parse(code)?), Some(region), "{code}");
        }

        Ok(())
    }

    #[test]
    fn codes_outside_any_range_have_no_region() -> TestResult {
        assert_eq!(local_region(&PostalCode::parse("00000-000")?), None);

        Ok(())
    }
}
