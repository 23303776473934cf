//! API routes

pub mod auth;
pub mod billing;
pub mod features;
pub mod health;
pub mod organizations;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post},
    Router,
};

use crate::{auth::require_auth, state::AppState};

/// Create all API routes
pub fn create_router(state: AppState) -> Router {
    // Public routes: health, registration, the plan catalog, and the webhook
    // (which authenticates by signature, not bearer token)
    let public_routes = Router::new()
        .route("/health", get(health::health))
        .route("/auth/register", post(auth::register))
        .route("/billing/plans", get(billing::get_plan_catalog))
        .route("/billing/webhooks/stripe", post(billing::webhook));

    // Bearer-token protected routes
    let protected_routes = Router::new()
        .route("/auth/tokens/rotate", post(auth::rotate_token))
        .route("/organizations/me", get(organizations::get_org))
        .route(
            "/organizations/me/users",
            get(organizations::list_users).post(organizations::create_user),
        )
        .route("/billing/subscription", patch(billing::update_subscription))
        .route("/features/:feature_key", get(features::check_feature))
        .route("/reports/advanced", get(features::advanced_report))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Webhook payloads and registration bodies are small; cap everything
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}
