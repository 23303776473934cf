//! Organization and tenant user routes

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tollgate_billing::get_or_create_subscription;
use tollgate_shared::types::{Organization, Plan, User};

use crate::{
    auth::RequestContext,
    error::{ApiError, ApiResult},
    routes::auth::is_valid_email,
    routes::billing::SubscriptionView,
    state::AppState,
};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct OrgResponse {
    pub organization: Organization,
    pub subscription: SubscriptionView,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Current organization with its subscription
pub async fn get_org(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> ApiResult<Json<OrgResponse>> {
    let mut conn = state.pool.acquire().await?;
    let subscription = get_or_create_subscription(&mut conn, context.organization.id).await?;

    Ok(Json(OrgResponse {
        organization: context.organization,
        subscription: subscription.into(),
    }))
}

/// List the organization's users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> ApiResult<Json<Vec<User>>> {
    let users: Vec<User> = sqlx::query_as(
        r#"
        SELECT id, org_id, email, full_name, created_at
        FROM users
        WHERE org_id = $1
        ORDER BY created_at
        "#,
    )
    .bind(context.organization.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(users))
}

/// Add a user to the organization
///
/// The capacity check is best-effort read-then-write: two concurrent
/// creates can exceed max_users by one. Overage here is a business concern,
/// not a correctness invariant, so no stronger isolation is taken.
pub async fn create_user(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    if !is_valid_email(&req.email) {
        return Err(ApiError::Validation("Invalid email format".to_string()));
    }
    let full_name = req.full_name.trim();
    if full_name.len() < 2 || full_name.len() > 200 {
        return Err(ApiError::Validation(
            "Full name must be between 2 and 200 characters".to_string(),
        ));
    }

    let email = req.email.trim().to_lowercase();
    let org_id = context.organization.id;

    let mut conn = state.pool.acquire().await?;
    let subscription = get_or_create_subscription(&mut conn, org_id).await?;
    drop(conn);

    assert_user_capacity(&state, org_id, subscription.plan).await?;

    let exists: Option<(bool,)> = sqlx::query_as(
        "SELECT EXISTS(SELECT 1 FROM users WHERE org_id = $1 AND email = $2)",
    )
    .bind(org_id)
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?;

    if exists.map(|r| r.0).unwrap_or(false) {
        return Err(ApiError::Conflict(
            "User already exists in this organization".to_string(),
        ));
    }

    let user: User = sqlx::query_as(
        r#"
        INSERT INTO users (id, org_id, email, full_name)
        VALUES ($1, $2, $3, $4)
        RETURNING id, org_id, email, full_name, created_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .bind(&email)
    .bind(full_name)
    .fetch_one(&state.pool)
    .await?;

    tracing::info!(org_id = %org_id, user_id = %user.id, "User created");

    Ok((StatusCode::CREATED, Json(user)))
}

async fn assert_user_capacity(state: &AppState, org_id: Uuid, plan: Plan) -> Result<(), ApiError> {
    let (current_users,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE org_id = $1")
        .bind(org_id)
        .fetch_one(&state.pool)
        .await?;

    let max_users = plan.limits().max_users;
    if current_users >= max_users {
        return Err(ApiError::PlanLimitExceeded(format!(
            "Plan user limit reached ({}). Upgrade plan to add more users.",
            max_users
        )));
    }
    Ok(())
}
