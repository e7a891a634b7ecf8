//! Checkout configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `EVAULT_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//!
//! ## Optional
//! - `EVAULT_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `EVAULT_DB_MIN_CONNECTIONS` - Idle connections kept open (default: 2)
//! - `EVAULT_SESSION_CART_KEY` - Session key of guest carts (default: cart)
//! - `EVAULT_DELIVERY_CHARGE` - Flat delivery charge, e.g. `75.00`
//!   (default: [`DEFAULT_DELIVERY_CHARGE`](crate::pricing::DEFAULT_DELIVERY_CHARGE))
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//!
//! GST is a constant in [`crate::pricing`].

use std::str::FromStr;

use rust_decimal::Decimal;
use secrecy::SecretString;
use thiserror::Error;

use evault_core::Money;

use crate::cart::SESSION_CART_KEY;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Checkout configuration.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Maximum pool connections
    pub max_connections: u32,
    /// Minimum pool connections
    pub min_connections: u32,
    /// Session key holding a guest's cart
    pub session_cart_key: String,
    /// Delivery charge replacing the default, if set
    pub delivery_charge: Option<Money>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

impl CheckoutConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the database URL is missing or a numeric
    /// variable doesn't parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`CheckoutConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("EVAULT_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("EVAULT_DATABASE_URL".to_string()))?;

        let max_connections = parse_or_default(&lookup, "EVAULT_DB_MAX_CONNECTIONS", 10)?;
        let min_connections = parse_or_default(&lookup, "EVAULT_DB_MIN_CONNECTIONS", 2)?;
        if min_connections > max_connections {
            return Err(ConfigError::InvalidEnvVar(
                "EVAULT_DB_MIN_CONNECTIONS".to_string(),
                format!("{min_connections} exceeds max connections {max_connections}"),
            ));
        }

        let session_cart_key = lookup("EVAULT_SESSION_CART_KEY")
            .filter(|k| !k.trim().is_empty())
            .unwrap_or_else(|| SESSION_CART_KEY.to_string());

        let delivery_charge = lookup("EVAULT_DELIVERY_CHARGE")
            .map(|value| parse_charge("EVAULT_DELIVERY_CHARGE", &value))
            .transpose()?;

        Ok(Self {
            database_url,
            max_connections,
            min_connections,
            session_cart_key,
            delivery_charge,
            sentry_dsn: lookup("SENTRY_DSN"),
            sentry_environment: lookup("SENTRY_ENVIRONMENT"),
        })
    }
}

fn parse_charge(key: &str, value: &str) -> Result<Money, ConfigError> {
    let amount: Decimal = value
        .trim()
        .parse()
        .map_err(|e: rust_decimal::Error| {
            ConfigError::InvalidEnvVar(key.to_string(), e.to_string())
        })?;
    if amount.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            format!("{amount} is negative"),
        ));
    }
    Ok(Money::new(amount))
}

fn parse_or_default<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key).map_or(Ok(default), |value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
