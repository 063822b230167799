//! # Engine Configuration
//!
//! Explicit configuration for the order-fulfillment engine.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults, and every value is PASSED INTO the component that needs it
//! at construction time. In particular the exchange rate and the gateway
//! minimum charge are constructor inputs to the payment reconciler —
//! never ambient global state.

use std::env;
use std::time::Duration;

use atlas_core::money::ExchangeRate;

// =============================================================================
// Gateway Configuration
// =============================================================================

/// Configuration for the external payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway API.
    pub base_url: String,

    /// API client id (basic auth username).
    pub client_id: String,

    /// API client secret (basic auth password).
    pub client_secret: String,

    /// ISO 4217 currency the gateway settles in.
    pub settlement_currency: String,

    /// Store cents per settlement cent. Must be >= 1.
    pub exchange_rate: ExchangeRate,

    /// The gateway's minimum chargeable amount, in settlement cents.
    /// Converted order totals below it are clamped up.
    pub minimum_charge_cents: i64,

    /// Upper bound on any single gateway call.
    ///
    /// On timeout the payment is left pending rather than auto-failed:
    /// failing it would release stock the gateway may still be charging
    /// for.
    pub capture_timeout: Duration,
}

// =============================================================================
// Sweep Configuration
// =============================================================================

/// Configuration for the abandonment sweeper.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// How old a pending order must be before it is swept.
    pub staleness: Duration,

    /// How often the sweeper wakes up.
    pub poll_interval: Duration,

    /// Maximum orders processed per sweep run.
    pub batch_size: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            staleness: Duration::from_secs(60 * 60),
            poll_interval: Duration::from_secs(5 * 60),
            batch_size: 200,
        }
    }
}

// =============================================================================
// Engine Configuration
// =============================================================================

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// ISO 4217 currency the store prices in.
    pub store_currency: String,

    /// Allowed drift between submitted and catalog unit prices, in cents.
    pub price_tolerance_cents: i64,

    pub gateway: GatewayConfig,
    pub sweep: SweepConfig,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = EngineConfig {
            store_currency: env::var("STORE_CURRENCY").unwrap_or_else(|_| "USD".to_string()),

            price_tolerance_cents: parse_env("PRICE_TOLERANCE_CENTS", atlas_core::PRICE_TOLERANCE_CENTS)?,

            gateway: GatewayConfig {
                base_url: env::var("GATEWAY_BASE_URL")
                    .unwrap_or_else(|_| "https://api.gateway.example".to_string()),

                client_id: env::var("GATEWAY_CLIENT_ID")
                    .map_err(|_| ConfigError::MissingRequired("GATEWAY_CLIENT_ID".to_string()))?,

                client_secret: env::var("GATEWAY_CLIENT_SECRET")
                    .map_err(|_| ConfigError::MissingRequired("GATEWAY_CLIENT_SECRET".to_string()))?,

                settlement_currency: env::var("GATEWAY_SETTLEMENT_CURRENCY")
                    .unwrap_or_else(|_| "USD".to_string()),

                exchange_rate: ExchangeRate::from_store_cents(parse_env(
                    "GATEWAY_EXCHANGE_RATE_STORE_CENTS",
                    1,
                )?),

                minimum_charge_cents: parse_env("GATEWAY_MINIMUM_CHARGE_CENTS", 100)?,

                capture_timeout: Duration::from_secs(parse_env("GATEWAY_TIMEOUT_SECS", 30)?),
            },

            sweep: SweepConfig {
                staleness: Duration::from_secs(60 * parse_env("SWEEP_STALENESS_MINUTES", 60)?),
                poll_interval: Duration::from_secs(60 * parse_env("SWEEP_POLL_MINUTES", 5)?),
                batch_size: parse_env("SWEEP_BATCH_SIZE", 200)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.exchange_rate.store_cents() < 1 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_EXCHANGE_RATE_STORE_CENTS must be >= 1".to_string(),
            ));
        }

        if self.gateway.minimum_charge_cents < 0 {
            return Err(ConfigError::InvalidValue(
                "GATEWAY_MINIMUM_CHARGE_CENTS must be >= 0".to_string(),
            ));
        }

        if self.sweep.staleness.is_zero() {
            return Err(ConfigError::InvalidValue(
                "SWEEP_STALENESS_MINUTES must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

// =============================================================================
// Unit Tests
// =============================================================================
