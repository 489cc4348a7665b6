//! Application configuration loaded from environment variables.

use std::time::Duration;

use broker::ConsumerConfig;
use domain::Money;
use saga::PaymentConfig;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory stores when unset
/// - `BROKER_MAX_DELIVERY_ATTEMPTS`: deliveries per message (default: `5`)
/// - `BROKER_RETRY_BACKOFF_MS`: base redelivery backoff (default: `100`)
/// - `PAYMENT_MIN_AMOUNT_CENTS`: smallest chargeable total (default: `10`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub max_delivery_attempts: u32,
    pub retry_backoff_ms: u64,
    pub payment_min_amount_cents: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_delivery_attempts: parsed(&lookup, "BROKER_MAX_DELIVERY_ATTEMPTS")
                .unwrap_or(defaults.max_delivery_attempts),
            retry_backoff_ms: parsed(&lookup, "BROKER_RETRY_BACKOFF_MS")
                .unwrap_or(defaults.retry_backoff_ms),
            payment_min_amount_cents: parsed(&lookup, "PAYMENT_MIN_AMOUNT_CENTS")
                .unwrap_or(defaults.payment_min_amount_cents),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            max_attempts: self.max_delivery_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn payment_config(&self) -> PaymentConfig {
        PaymentConfig {
            min_amount: Money::from_cents(self.payment_min_amount_cents),
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            max_delivery_attempts: 5,
            retry_backoff_ms: 100,
            payment_min_amount_cents: 10,
        }
    }
}
