//! Application configuration

use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,

    // Stripe webhook verification. None means no secret is configured and
    // signature verification is skipped: a deliberate permissive mode for
    // environments without a shared secret, not an accident.
    pub stripe_webhook_secret: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),

            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),

            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn setup_minimal_config() {
        env::set_var("DATABASE_URL", "postgres://test");
        env::remove_var("BIND_ADDRESS");
        env::remove_var("DATABASE_MAX_CONNECTIONS");
        env::remove_var("STRIPE_WEBHOOK_SECRET");
    }

    #[test]
    #[serial]
    fn test_missing_database_url_fails() {
        env::remove_var("DATABASE_URL");
        let result = Config::from_env();
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    #[serial]
    fn test_defaults() {
        setup_minimal_config();
        let config = Config::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.database_max_connections, 5);
        assert!(config.stripe_webhook_secret.is_none());
    }

    #[test]
    #[serial]
    fn test_empty_webhook_secret_means_unconfigured() {
        setup_minimal_config();
        env::set_var("STRIPE_WEBHOOK_SECRET", "");
        let config = Config::from_env().unwrap();
        assert!(config.stripe_webhook_secret.is_none());

        env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_test");
        let config = Config::from_env().unwrap();
        assert_eq!(config.stripe_webhook_secret.as_deref(), Some("whsec_test"));
        env::remove_var("STRIPE_WEBHOOK_SECRET");
    }
}
