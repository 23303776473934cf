#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Tollgate API Library
//!
//! HTTP surface for the Tollgate platform: tenant registration, bearer-token
//! auth, plan catalog and feature gating, and the Stripe-style webhook
//! ingestion endpoint.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::AppState;
