//! Feature gating routes

use std::str::FromStr;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};

use tollgate_billing::{feature_allowed, get_or_create_subscription, plan_allows};
use tollgate_shared::types::{Feature, Plan};

use crate::{
    auth::RequestContext,
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct FeatureAccessResponse {
    pub feature: Feature,
    pub plan: Plan,
    pub required_plan: Plan,
    pub allowed: bool,
}

/// Check the caller's access to a single feature
pub async fn check_feature(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    Path(feature_key): Path<String>,
) -> ApiResult<Json<FeatureAccessResponse>> {
    let feature = Feature::from_str(&feature_key).map_err(|_| ApiError::NotFound)?;

    let mut conn = state.pool.acquire().await?;
    let subscription = get_or_create_subscription(&mut conn, context.organization.id).await?;

    Ok(Json(FeatureAccessResponse {
        feature,
        plan: subscription.plan,
        required_plan: feature.min_plan(),
        allowed: plan_allows(subscription.plan, feature),
    }))
}

/// Advanced analytics report, gated on the advanced_analytics feature
pub async fn advanced_report(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
) -> ApiResult<Json<Value>> {
    let mut conn = state.pool.acquire().await?;
    let subscription = get_or_create_subscription(&mut conn, context.organization.id).await?;

    if !feature_allowed(subscription.plan, "advanced_analytics") {
        return Err(ApiError::PaymentRequired(
            "advanced_analytics requires Growth plan or higher".to_string(),
        ));
    }

    Ok(Json(json!({
        "kpis": {
            "mrr": 12800,
            "churn_rate": 0.032,
            "expansion_revenue": 1900,
        }
    })))
}
