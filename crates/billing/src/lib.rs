#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Tollgate Billing
//!
//! Plan entitlement evaluation and Stripe-style subscription webhook
//! processing. The webhook path normalizes an untrusted external event
//! vocabulary onto the internal plan/status enums, applies it to a tenant's
//! subscription as a partial update, and guarantees exactly-once effect via
//! an append-only idempotency ledger.

pub mod entitlement;
pub mod error;
pub mod normalize;
pub mod reconcile;
pub mod webhook;

pub use entitlement::{feature_allowed, features_for, plan_allows};
pub use error::{BillingError, BillingResult};
pub use normalize::{normalize_plan, normalize_status};
pub use reconcile::{get_or_create_subscription, reconcile, ReconcileOutcome, SubscriptionPatch};
pub use webhook::{ingest, resolve_idempotency_key, verify_signature, IngestOutcome};
