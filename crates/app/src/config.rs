//! Application configuration
//!
//! Every setting can come from a flag or from the environment (including a
//! `.env` file loaded by the binary).

use std::{path::PathBuf, time::Duration};

use clap::Args;
use fornada::prelude::{PricingConfig, PricingConfigError};
use jiff::SignedDuration;

use crate::domain::{
    audit::dispatcher::DEFAULT_AUDIT_QUEUE_CAPACITY,
    payments::pix::{MAX_KEY_LEN, PixSettings},
    postal::DEFAULT_POSTAL_LOOKUP_URL,
};

/// Longest checkout lifetime accepted, one day.
pub const MAX_PIX_TTL_MINUTES: i64 = 24 * 60;

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    #[default]
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(
        long,
        env = "LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Compact,
        global = true
    )]
    pub log_format: LogFormat,
}

/// Storage settings.
#[derive(Debug, Clone, Args)]
pub struct StorageConfig {
    /// `PostgreSQL` connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true, global = true)]
    pub database_url: Option<String>,

    /// Keep all state in process memory instead of `PostgreSQL`
    #[arg(long, env = "FORNADA_IN_MEMORY", global = true)]
    pub in_memory: bool,
}

/// Pricing settings.
#[derive(Debug, Clone, Args)]
pub struct PricingSettings {
    /// Pricing YAML (delivery tiers and promo codes); the bundled file when omitted
    #[arg(long, env = "PRICING_CONFIG", global = true)]
    pub pricing_config: Option<PathBuf>,
}

impl PricingSettings {
    /// Load the configured pricing file, or the bundled one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(&self) -> Result<PricingConfig, PricingConfigError> {
        match &self.pricing_config {
            Some(path) => PricingConfig::from_path(path),
            None => PricingConfig::bundled(),
        }
    }
}

/// Postal-code lookup settings.
#[derive(Debug, Clone, Args)]
pub struct PostalConfig {
    /// ViaCEP-compatible lookup endpoint
    #[arg(
        long,
        env = "POSTAL_LOOKUP_URL",
        default_value = DEFAULT_POSTAL_LOOKUP_URL,
        global = true
    )]
    pub postal_lookup_url: String,

    /// Lookup timeout in milliseconds before falling back to the local table
    #[arg(
        long,
        env = "POSTAL_LOOKUP_TIMEOUT_MS",
        default_value_t = 2_000u64,
        global = true
    )]
    pub postal_lookup_timeout_ms: u64,
}

impl PostalConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.postal_lookup_timeout_ms)
    }
}

/// Audit queue settings.
#[derive(Debug, Clone, Args)]
pub struct AuditConfig {
    /// Events buffered for the audit recorder before new ones are dropped
    #[arg(
        long,
        env = "AUDIT_QUEUE_CAPACITY",
        default_value_t = DEFAULT_AUDIT_QUEUE_CAPACITY,
        global = true
    )]
    pub audit_queue_capacity: usize,
}

/// PIX checkout settings.
#[derive(Debug, Clone, Args)]
pub struct PixConfig {
    /// PIX key receiving payments
    #[arg(
        long,
        env = "PIX_KEY",
        default_value = "pagamentos@fornada.com.br",
        value_parser = parse_pix_key,
        global = true
    )]
    pub pix_key: String,

    /// Merchant name printed in the PIX payload
    #[arg(long, env = "PIX_MERCHANT_NAME", default_value = "FORNADA", global = true)]
    pub pix_merchant_name: String,

    /// Merchant city printed in the PIX payload
    #[arg(long, env = "PIX_MERCHANT_CITY", default_value = "SAO PAULO", global = true)]
    pub pix_merchant_city: String,

    /// Minutes a checkout stays payable (1 to 1440)
    #[arg(
        long,
        env = "PIX_TTL_MINUTES",
        default_value_t = 30i64,
        value_parser = clap::value_parser!(i64).range(1..=MAX_PIX_TTL_MINUTES),
        global = true
    )]
    pub pix_ttl_minutes: i64,
}

fn parse_pix_key(raw: &str) -> Result<String, String> {
    let key = raw.trim();

    if key.is_empty() {
        return Err("PIX key cannot be empty".to_string());
    }

    if key.len() > MAX_KEY_LEN {
        return Err(format!(
            "PIX key is {} bytes; at most {MAX_KEY_LEN} fit the payload",
            key.len()
        ));
    }

    Ok(key.to_string())
}

impl From<&PixConfig> for PixSettings {
    fn from(config: &PixConfig) -> Self {
        Self {
            key: config.pix_key.clone(),
            merchant_name: config.pix_merchant_name.clone(),
            merchant_city: config.pix_merchant_city.clone(),
            ttl: SignedDuration::from_mins(config.pix_ttl_minutes),
        }
    }
}

/// Fornada application configuration
#[derive(Debug, Clone, Args)]
pub struct AppConfig {
    /// Logging output settings.
    #[command(flatten)]
    pub logging: LoggingConfig,

    /// Storage backend settings.
    #[command(flatten)]
    pub storage: StorageConfig,

    /// Pricing configuration source.
    #[command(flatten)]
    pub pricing: PricingSettings,

    /// Postal-code lookup settings.
    #[command(flatten)]
    pub postal: PostalConfig,

    /// Audit queue settings.
    #[command(flatten)]
    pub audit: AuditConfig,

    /// PIX checkout settings.
    #[command(flatten)]
    pub pix: PixConfig,
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use testresult::TestResult;

    use super::*;

    #[derive(Debug, Parser)]
    struct Harness {
        #[command(flatten)]
        config: AppConfig,
    }

    #[test]
    fn flags_override_defaults() -> TestResult {
        let harness = Harness::try_parse_from([
            "fornada",
            "--in-memory",
            "--log-format",
            "json",
            "--postal-lookup-timeout-ms",
            "250",
            "--pix-ttl-minutes",
            "5",
        ])?;

        assert!(harness.config.storage.in_memory, "in-memory flag should be set");
        assert_eq!(harness.config.logging.log_format, LogFormat::Json);
        assert_eq!(harness.config.postal.timeout(), Duration::from_millis(250));
        assert_eq!(
            PixSettings::from(&harness.config.pix).ttl,
            SignedDuration::from_mins(5)
        );

        Ok(())
    }

    #[test]
    fn checkout_lifetime_is_bounded() {
        for ttl in ["0", "-5", "1441", "9223372036854775807"] {
            let result = Harness::try_parse_from(["fornada", "--pix-ttl-minutes", ttl]);

            assert!(result.is_err(), "ttl {ttl} should be rejected");
        }
    }

    #[test]
    fn pix_key_must_fit_the_payload() -> TestResult {
        let longest = "k".repeat(MAX_KEY_LEN);
        let harness = Harness::try_parse_from(["fornada", "--pix-key", &longest])?;

        assert_eq!(harness.config.pix.pix_key, longest);

        let too_long = "k".repeat(MAX_KEY_LEN + 1);

        assert!(
            Harness::try_parse_from(["fornada", "--pix-key", &too_long]).is_err(),
            "oversized key should be rejected"
        );

        Ok(())
    }

    #[test]
    fn bundled_pricing_is_used_without_a_path() -> TestResult {
        let settings = PricingSettings {
            pricing_config: None,
        };

        let config = settings.load()?;

        assert!(
            config.promotions.get("BEMVINDO10").is_some(),
            "bundled codes should load"
        );

        Ok(())
    }
}
