//! Bearer-token authentication

pub mod tokens;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use tollgate_shared::types::{Organization, User};

use crate::{error::ApiError, state::AppState};

pub use tokens::{generate_access_token, hash_access_token};

/// Authenticated request context
///
/// Carries the resolved user and organization. The subscription is
/// deliberately not loaded here; handlers that need it call the explicit
/// `get_or_create_subscription` factory so its transaction boundary stays
/// visible at the call site.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user: User,
    pub organization: Organization,
    pub token_id: Uuid,
}

#[derive(Debug, FromRow)]
struct AuthRow {
    token_id: Uuid,
    user_id: Uuid,
    email: String,
    full_name: String,
    user_created_at: OffsetDateTime,
    org_id: Uuid,
    org_name: String,
    org_slug: String,
    org_created_at: OffsetDateTime,
}

/// Authentication middleware for protected routes
///
/// Hashes the presented bearer token and resolves the unrevoked token row
/// together with its user and organization in one query.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&request).ok_or(ApiError::MissingToken)?;
    let token_hash = hash_access_token(token);

    let row: Option<AuthRow> = sqlx::query_as(
        r#"
        SELECT
            t.id as token_id,
            u.id as user_id,
            u.email,
            u.full_name,
            u.created_at as user_created_at,
            o.id as org_id,
            o.name as org_name,
            o.slug as org_slug,
            o.created_at as org_created_at
        FROM api_tokens t
        JOIN users u ON u.id = t.user_id
        JOIN organizations o ON o.id = u.org_id
        WHERE t.token_hash = $1 AND t.revoked_at IS NULL
        "#,
    )
    .bind(&token_hash)
    .fetch_optional(&state.pool)
    .await?;

    let row = row.ok_or(ApiError::InvalidToken)?;

    let context = RequestContext {
        user: User {
            id: row.user_id,
            org_id: row.org_id,
            email: row.email,
            full_name: row.full_name,
            created_at: row.user_created_at,
        },
        organization: Organization {
            id: row.org_id,
            name: row.org_name,
            slug: row.org_slug,
            created_at: row.org_created_at,
        },
        token_id: row.token_id,
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

/// Extract the bearer token from the Authorization header
fn bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
