//! Registration and token routes

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tollgate_billing::get_or_create_subscription;
use tollgate_shared::types::{Organization, User};

use crate::{
    auth::{generate_access_token, hash_access_token, RequestContext},
    error::{ApiError, ApiResult},
    routes::billing::SubscriptionView,
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub organization_name: String,
    pub organization_slug: String,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub organization: Organization,
    pub user: User,
    pub subscription: SubscriptionView,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

// =============================================================================
// Validation
// =============================================================================

pub(crate) fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || email.len() > 255 {
        return false;
    }
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

pub(crate) fn is_valid_slug(slug: &str) -> bool {
    if slug.len() < 3 || slug.len() > 80 {
        return false;
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return false;
    }
    slug.chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

// =============================================================================
// Handlers
// =============================================================================

/// Register a new organization with its owner user
///
/// Organization, owner, starter subscription, and the first access token are
/// created in one transaction: a conflict rolls everything back and leaves
/// no partial tenant behind.
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    if !is_valid_email(&req.email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }
    if !is_valid_slug(req.organization_slug.trim()) {
        return Err(ApiError::Validation(
            "Organization slug must be 3-80 lowercase characters, digits, or hyphens".to_string(),
        ));
    }
    let org_name = req.organization_name.trim();
    if org_name.len() < 2 || org_name.len() > 200 {
        return Err(ApiError::Validation(
            "Organization name must be between 2 and 200 characters".to_string(),
        ));
    }
    let full_name = req.full_name.trim();
    if full_name.len() < 2 || full_name.len() > 200 {
        return Err(ApiError::Validation(
            "Full name must be between 2 and 200 characters".to_string(),
        ));
    }

    let slug = req.organization_slug.trim();
    let email = req.email.trim().to_lowercase();

    let exists: Option<(bool,)> =
        sqlx::query_as("SELECT EXISTS(SELECT 1 FROM organizations WHERE slug = $1)")
            .bind(slug)
            .fetch_optional(&state.pool)
            .await?;

    if exists.map(|r| r.0).unwrap_or(false) {
        return Err(ApiError::Conflict(
            "Organization slug already exists".to_string(),
        ));
    }

    let access_token = generate_access_token();

    // A unique violation here (slug raced with a concurrent registration)
    // rolls the whole transaction back and surfaces as 409.
    let mut tx = state.pool.begin().await?;

    let organization: Organization = sqlx::query_as(
        r#"
        INSERT INTO organizations (id, name, slug)
        VALUES ($1, $2, $3)
        RETURNING id, name, slug, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_name)
    .bind(slug)
    .fetch_one(&mut *tx)
    .await?;

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, org_id, email, full_name)
        VALUES ($1, $2, $3, $4)
        RETURNING id, org_id, email, full_name, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(organization.id)
    .bind(&email)
    .bind(full_name)
    .fetch_one(&mut *tx)
    .await?;

    let subscription = get_or_create_subscription(&mut *tx, organization.id).await?;

    sqlx::query(
        r#"
        INSERT INTO api_tokens (id, user_id, token_hash)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(hash_access_token(&access_token))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        org_id = %organization.id,
        slug = %organization.slug,
        "Organization registered"
    );

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            access_token,
            token_type: "bearer",
            organization,
            user,
            subscription: subscription.into(),
        }),
    ))
}

/// Rotate the presenting access token
///
/// Revokes the token used on this request and issues a replacement.
pub async fn rotate_token(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> ApiResult<Json<TokenResponse>> {
    let access_token = generate_access_token();

    let mut tx = state.pool.begin().await?;

    sqlx::query("UPDATE api_tokens SET revoked_at = NOW() WHERE id = $1")
        .bind(context.token_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO api_tokens (id, user_id, token_hash)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(context.user.id)
    .bind(hash_access_token(&access_token))
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %context.user.id, "Access token rotated");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer",
    }))
}
