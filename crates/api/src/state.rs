//! Application state

use sqlx::PgPool;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        if config.stripe_webhook_secret.is_some() {
            tracing::info!("Webhook signature verification enabled");
        } else {
            tracing::warn!(
                "STRIPE_WEBHOOK_SECRET not set - webhook signature verification is disabled"
            );
        }

        Self { pool, config }
    }

    /// Configured webhook shared secret, if any
    pub fn webhook_secret(&self) -> Option<&str> {
        self.config.stripe_webhook_secret.as_deref()
    }
}
