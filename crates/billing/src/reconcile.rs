//! Subscription reconciliation
//!
//! Applies a normalized billing event to a tenant's subscription record.
//! The incoming event is reduced to a [`SubscriptionPatch`], a sparse
//! partial update where only the fields the event actually supplied are
//! present, and merged field-by-field, so a status-only event from one
//! lifecycle stage never clobbers plan data learned from an earlier one.

use serde::Serialize;
use serde_json::Value;
use sqlx::PgConnection;
use time::OffsetDateTime;
use uuid::Uuid;

use tollgate_shared::types::{Plan, Subscription, SubscriptionStatus};

use crate::error::BillingResult;
use crate::normalize::{normalize_plan, normalize_status};

/// Lifecycle event types the reconciler acts on; everything else is a no-op
const LIFECYCLE_EVENT_TYPES: &[&str] = &[
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
];

/// Result of applying one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    /// True when a recognized event resolved a known tenant, even if every
    /// field kept its previous value (audit semantics: "an applicable event
    /// was processed", not "a field changed").
    pub updated: bool,
    pub org_id: Option<Uuid>,
}

impl ReconcileOutcome {
    fn noop() -> Self {
        Self {
            updated: false,
            org_id: None,
        }
    }
}

/// Sparse partial update extracted from an event payload
///
/// Absent fields mean "leave the stored value untouched"; the merge policy
/// lives in the single UPDATE in [`reconcile`], not in scattered null
/// checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionPatch {
    pub plan: Option<Plan>,
    pub status: Option<SubscriptionStatus>,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<OffsetDateTime>,
}

impl SubscriptionPatch {
    /// Extract the patch from the event's `data.object`
    ///
    /// Plan is resolved from the first of plan.nickname, metadata.plan, or
    /// plan_name that normalizes; period end is accepted only as integer
    /// epoch seconds.
    pub fn from_event_object(object: &Value) -> Self {
        let plan_raw = object
            .pointer("/plan/nickname")
            .and_then(Value::as_str)
            .or_else(|| object.pointer("/metadata/plan").and_then(Value::as_str))
            .or_else(|| object.get("plan_name").and_then(Value::as_str));

        let current_period_end = object
            .get("current_period_end")
            .and_then(Value::as_i64)
            .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok());

        Self {
            plan: normalize_plan(plan_raw),
            status: normalize_status(object.get("status").and_then(Value::as_str)),
            stripe_customer_id: object
                .get("customer")
                .and_then(Value::as_str)
                .map(str::to_string),
            stripe_subscription_id: object
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_string),
            current_period_end,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.plan.is_none()
            && self.status.is_none()
            && self.stripe_customer_id.is_none()
            && self.stripe_subscription_id.is_none()
            && self.current_period_end.is_none()
    }
}

fn is_lifecycle_event(event_type: &str) -> bool {
    LIFECYCLE_EVENT_TYPES.contains(&event_type)
}

fn organization_slug(payload: &Value) -> Option<&str> {
    payload
        .pointer("/data/object/metadata/organization_slug")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Fetch the organization's subscription, creating the default row if none
/// exists yet
///
/// Idempotent: the insert races safely on the org_id unique constraint, so
/// concurrent first accesses converge on the same row. New subscriptions
/// start on the starter plan in trialing status.
pub async fn get_or_create_subscription(
    conn: &mut PgConnection,
    org_id: Uuid,
) -> BillingResult<Subscription> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (id, org_id, plan, status)
        VALUES ($1, $2, 'starter', 'trialing')
        ON CONFLICT (org_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(org_id)
    .execute(&mut *conn)
    .await?;

    let subscription: Subscription = sqlx::query_as(
        r#"
        SELECT id, org_id, plan, status, stripe_customer_id, stripe_subscription_id,
               current_period_end, created_at, updated_at
        FROM subscriptions
        WHERE org_id = $1
        "#,
    )
    .bind(org_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(subscription)
}

/// Apply one webhook event to the subscription it targets
///
/// Runs inside the caller's transaction so the ledger append in the webhook
/// gate commits atomically with the mutation here.
pub async fn reconcile(
    conn: &mut PgConnection,
    payload: &Value,
) -> BillingResult<ReconcileOutcome> {
    let event_type = payload.get("type").and_then(Value::as_str).unwrap_or("");
    if !is_lifecycle_event(event_type) {
        tracing::debug!(event_type = %event_type, "Ignoring non-lifecycle event");
        return Ok(ReconcileOutcome::noop());
    }

    let Some(slug) = organization_slug(payload) else {
        tracing::warn!(event_type = %event_type, "Lifecycle event missing organization slug");
        return Ok(ReconcileOutcome::noop());
    };

    let org: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM organizations WHERE slug = $1")
        .bind(slug)
        .fetch_optional(&mut *conn)
        .await?;

    let Some((org_id,)) = org else {
        tracing::warn!(slug = %slug, "Lifecycle event for unknown organization");
        return Ok(ReconcileOutcome::noop());
    };

    get_or_create_subscription(&mut *conn, org_id).await?;

    let object = payload
        .pointer("/data/object")
        .cloned()
        .unwrap_or(Value::Null);
    let patch = SubscriptionPatch::from_event_object(&object);

    // Merge policy in one place: absent patch fields keep the stored value
    sqlx::query(
        r#"
        UPDATE subscriptions SET
            plan = COALESCE($2, plan),
            status = COALESCE($3, status),
            stripe_customer_id = COALESCE($4, stripe_customer_id),
            stripe_subscription_id = COALESCE($5, stripe_subscription_id),
            current_period_end = COALESCE($6, current_period_end),
            updated_at = NOW()
        WHERE org_id = $1
        "#,
    )
    .bind(org_id)
    .bind(patch.plan)
    .bind(patch.status)
    .bind(&patch.stripe_customer_id)
    .bind(&patch.stripe_subscription_id)
    .bind(patch.current_period_end)
    .execute(&mut *conn)
    .await?;

    tracing::info!(
        org_id = %org_id,
        event_type = %event_type,
        patched_plan = ?patch.plan,
        patched_status = ?patch.status,
        "Subscription reconciled"
    );

    Ok(ReconcileOutcome {
        updated: true,
        org_id: Some(org_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_event_recognition() {
        assert!(is_lifecycle_event("customer.subscription.created"));
        assert!(is_lifecycle_event("customer.subscription.updated"));
        assert!(is_lifecycle_event("customer.subscription.deleted"));
        assert!(!is_lifecycle_event("invoice.paid"));
        assert!(!is_lifecycle_event(""));
    }

    #[test]
    fn test_organization_slug_extraction() {
        let payload = json!({
            "type": "customer.subscription.updated",
            "data": {"object": {"metadata": {"organization_slug": "acme"}}}
        });
        assert_eq!(organization_slug(&payload), Some("acme"));

        let missing = json!({"type": "customer.subscription.updated", "data": {"object": {}}});
        assert_eq!(organization_slug(&missing), None);

        let empty = json!({
            "data": {"object": {"metadata": {"organization_slug": ""}}}
        });
        assert_eq!(organization_slug(&empty), None);
    }

    #[test]
    fn test_patch_from_full_event_object() {
        let object = json!({
            "id": "sub_001",
            "customer": "cus_001",
            "status": "active",
            "current_period_end": 1_767_225_600,
            "plan": {"nickname": "Enterprise Annual"},
            "metadata": {"organization_slug": "acme"}
        });

        let patch = SubscriptionPatch::from_event_object(&object);
        assert_eq!(patch.plan, Some(Plan::Enterprise));
        assert_eq!(patch.status, Some(SubscriptionStatus::Active));
        assert_eq!(patch.stripe_customer_id.as_deref(), Some("cus_001"));
        assert_eq!(patch.stripe_subscription_id.as_deref(), Some("sub_001"));
        assert_eq!(
            patch.current_period_end,
            OffsetDateTime::from_unix_timestamp(1_767_225_600).ok()
        );
    }

    #[test]
    fn test_patch_from_status_only_event_is_sparse() {
        // A deleted-style event carrying only a status must not produce
        // patch fields that would null out known plan data.
        let object = json!({"status": "canceled"});
        let patch = SubscriptionPatch::from_event_object(&object);

        assert_eq!(patch.status, Some(SubscriptionStatus::Canceled));
        assert_eq!(patch.plan, None);
        assert_eq!(patch.stripe_customer_id, None);
        assert_eq!(patch.stripe_subscription_id, None);
        assert_eq!(patch.current_period_end, None);
    }

    #[test]
    fn test_patch_plan_source_priority() {
        // nickname wins over metadata.plan and plan_name
        let object = json!({
            "plan": {"nickname": "Enterprise"},
            "metadata": {"plan": "growth"},
            "plan_name": "starter"
        });
        assert_eq!(
            SubscriptionPatch::from_event_object(&object).plan,
            Some(Plan::Enterprise)
        );

        // metadata.plan is the fallback when nickname is absent
        let object = json!({"metadata": {"plan": "growth"}, "plan_name": "starter"});
        assert_eq!(
            SubscriptionPatch::from_event_object(&object).plan,
            Some(Plan::Growth)
        );

        // plan_name is the last resort
        let object = json!({"plan_name": "starter"});
        assert_eq!(
            SubscriptionPatch::from_event_object(&object).plan,
            Some(Plan::Starter)
        );
    }

    #[test]
    fn test_patch_rejects_non_integer_period_end() {
        let object = json!({"current_period_end": "1767225600"});
        assert_eq!(
            SubscriptionPatch::from_event_object(&object).current_period_end,
            None
        );

        let object = json!({"current_period_end": 1767225600.5});
        assert_eq!(
            SubscriptionPatch::from_event_object(&object).current_period_end,
            None
        );
    }

    #[test]
    fn test_patch_unnormalizable_values_stay_absent() {
        let object = json!({
            "status": "paused",
            "plan": {"nickname": "platinum"}
        });
        let patch = SubscriptionPatch::from_event_object(&object);
        assert_eq!(patch.plan, None);
        assert_eq!(patch.status, None);
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(SubscriptionPatch::default().is_empty());
        assert!(SubscriptionPatch::from_event_object(&Value::Null).is_empty());

        let patch = SubscriptionPatch {
            status: Some(SubscriptionStatus::Active),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
