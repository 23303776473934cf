//! Billing routes: plan catalog, administrative subscription updates, and
//! the Stripe-style webhook endpoint

use axum::{
    body::Bytes,
    extract::{Extension, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use tollgate_billing::{get_or_create_subscription, ingest, IngestOutcome};
use tollgate_shared::types::{Plan, PlanLimits, Subscription, SubscriptionStatus};

use crate::{auth::RequestContext, error::ApiResult, state::AppState};

const EVENT_ID_HEADER: &str = "x-stripe-event-id";
const SIGNATURE_HEADER: &str = "x-stripe-signature";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Subscription fields exposed over the API
#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<OffsetDateTime>,
    pub updated_at: OffsetDateTime,
}

impl From<Subscription> for SubscriptionView {
    fn from(subscription: Subscription) -> Self {
        Self {
            plan: subscription.plan,
            status: subscription.status,
            stripe_customer_id: subscription.stripe_customer_id,
            stripe_subscription_id: subscription.stripe_subscription_id,
            current_period_end: subscription.current_period_end,
            updated_at: subscription.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PlanEntry {
    pub name: Plan,
    pub rank: u8,
    pub limits: PlanLimits,
    pub features: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PlanCatalogResponse {
    pub plans: Vec<PlanEntry>,
}

/// Administrative subscription override
///
/// Plan and status are constrained to the enums at the serde boundary;
/// this trusted path bypasses the webhook normalizer entirely.
#[derive(Debug, Deserialize)]
pub struct UpdateSubscriptionRequest {
    pub plan: Plan,
    #[serde(default = "default_patch_status")]
    pub status: SubscriptionStatus,
}

fn default_patch_status() -> SubscriptionStatus {
    SubscriptionStatus::Active
}

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub idempotency_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_subscription: Option<bool>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Full plan catalog with per-plan rank, limits, and feature list
pub async fn get_plan_catalog() -> Json<PlanCatalogResponse> {
    Json(plan_catalog())
}

pub(crate) fn plan_catalog() -> PlanCatalogResponse {
    let plans = Plan::all()
        .into_iter()
        .map(|plan| PlanEntry {
            name: plan,
            rank: plan.rank(),
            limits: plan.limits(),
            features: tollgate_billing::features_for(plan),
        })
        .collect();
    PlanCatalogResponse { plans }
}

/// Administrative subscription override for the caller's organization
pub async fn update_subscription(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Json(req): Json<UpdateSubscriptionRequest>,
) -> ApiResult<Json<SubscriptionView>> {
    let mut tx = state.pool.begin().await?;

    get_or_create_subscription(&mut *tx, context.organization.id).await?;

    let subscription: Subscription = sqlx::query_as(
        r#"
        UPDATE subscriptions
        SET plan = $2, status = $3, updated_at = NOW()
        WHERE org_id = $1
        RETURNING id, org_id, plan, status, stripe_customer_id, stripe_subscription_id,
                  current_period_end, created_at, updated_at
        "#,
    )
    .bind(context.organization.id)
    .bind(req.plan)
    .bind(req.status)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        org_id = %context.organization.id,
        plan = %req.plan,
        status = %req.status,
        "Subscription updated by administrative override"
    );

    Ok(Json(subscription.into()))
}

/// Stripe-style webhook ingestion
///
/// The raw body bytes are authoritative for signature verification and must
/// not be re-serialized before checking.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let event_id = headers.get(EVENT_ID_HEADER).and_then(|v| v.to_str().ok());
    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());

    let outcome = ingest(
        &state.pool,
        &body,
        event_id,
        signature,
        state.webhook_secret(),
    )
    .await?;

    let response = match outcome {
        IngestOutcome::Duplicate {
            idempotency_key,
            event_type,
        } => WebhookResponse {
            status: "duplicate",
            idempotency_key,
            event_type: Some(event_type),
            updated_subscription: None,
        },
        IngestOutcome::Processed {
            idempotency_key,
            updated_subscription,
            ..
        } => WebhookResponse {
            status: "processed",
            idempotency_key,
            event_type: None,
            updated_subscription: Some(updated_subscription),
        },
    };

    Ok(Json(response))
}
