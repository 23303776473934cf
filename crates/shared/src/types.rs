//! Common types used across Tollgate

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Plan Catalog
// =============================================================================

/// Subscription plan tier
///
/// Plans are totally ordered by rank; entitlement checks compare ranks, so
/// any feature available on a lower plan is available on every higher one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Starter,
    Growth,
    Enterprise,
}

impl Default for Plan {
    fn default() -> Self {
        Self::Starter
    }
}

/// Per-plan resource limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub max_users: i64,
    pub max_projects: i64,
}

impl Plan {
    /// Ordering rank for entitlement comparison (higher = more access)
    pub fn rank(&self) -> u8 {
        match self {
            Self::Starter => 1,
            Self::Growth => 2,
            Self::Enterprise => 3,
        }
    }

    /// Resource limits for this plan
    pub fn limits(&self) -> PlanLimits {
        match self {
            Self::Starter => PlanLimits {
                max_users: 5,
                max_projects: 10,
            },
            Self::Growth => PlanLimits {
                max_users: 50,
                max_projects: 100,
            },
            Self::Enterprise => PlanLimits {
                max_users: 500,
                max_projects: 1000,
            },
        }
    }

    /// All plans in rank order
    pub fn all() -> [Plan; 3] {
        [Self::Starter, Self::Growth, Self::Enterprise]
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starter => write!(f, "starter"),
            Self::Growth => write!(f, "growth"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "starter" => Ok(Self::Starter),
            "growth" => Ok(Self::Growth),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("Invalid plan: {}", s)),
        }
    }
}

/// Gated capability with a minimum required plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    TeamManagement,
    BasicAnalytics,
    PrioritySupport,
    AdvancedAnalytics,
    ApiAccess,
    Sso,
}

impl Feature {
    /// Minimum plan required to use this feature
    pub fn min_plan(&self) -> Plan {
        match self {
            Self::TeamManagement | Self::BasicAnalytics => Plan::Starter,
            Self::PrioritySupport | Self::AdvancedAnalytics => Plan::Growth,
            Self::ApiAccess | Self::Sso => Plan::Enterprise,
        }
    }

    /// All features in the catalog
    pub fn all() -> [Feature; 6] {
        [
            Self::TeamManagement,
            Self::BasicAnalytics,
            Self::PrioritySupport,
            Self::AdvancedAnalytics,
            Self::ApiAccess,
            Self::Sso,
        ]
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TeamManagement => write!(f, "team_management"),
            Self::BasicAnalytics => write!(f, "basic_analytics"),
            Self::PrioritySupport => write!(f, "priority_support"),
            Self::AdvancedAnalytics => write!(f, "advanced_analytics"),
            Self::ApiAccess => write!(f, "api_access"),
            Self::Sso => write!(f, "sso"),
        }
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "team_management" => Ok(Self::TeamManagement),
            "basic_analytics" => Ok(Self::BasicAnalytics),
            "priority_support" => Ok(Self::PrioritySupport),
            "advanced_analytics" => Ok(Self::AdvancedAnalytics),
            "api_access" => Ok(Self::ApiAccess),
            "sso" => Ok(Self::Sso),
            _ => Err(format!("Unknown feature: {}", s)),
        }
    }
}

/// Subscription status
///
/// The internal status vocabulary is deliberately small; the billing
/// normalizer collapses everything a provider reports onto these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    Canceled,
}

impl Default for SubscriptionStatus {
    fn default() -> Self {
        Self::Trialing
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trialing => write!(f, "trialing"),
            Self::Active => write!(f, "active"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trialing" => Ok(Self::Trialing),
            "active" => Ok(Self::Active),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("Invalid subscription status: {}", s)),
        }
    }
}

// =============================================================================
// Database Models
// =============================================================================

/// Organization (tenant) model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: OffsetDateTime,
}

/// User model
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub org_id: Uuid,
    pub email: String,
    pub full_name: String,
    pub created_at: OffsetDateTime,
}

/// API token model
///
/// Only the SHA-256 hash of the raw bearer token is stored; the raw value
/// is returned to the caller once at creation and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiToken {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub created_at: OffsetDateTime,
    pub revoked_at: Option<OffsetDateTime>,
}

/// Subscription model (exactly one per organization)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub org_id: Uuid,
    pub plan: Plan,
    pub status: SubscriptionStatus,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub current_period_end: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Billing event ledger record
///
/// Append-only. A row's existence under an idempotency key is the sole
/// deduplication signal for redelivered webhook events; org_id is null when
/// the event did not resolve to a tenant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BillingEvent {
    pub id: Uuid,
    pub org_id: Option<Uuid>,
    pub event_type: String,
    pub idempotency_key: String,
    pub payload: serde_json::Value,
    pub received_at: OffsetDateTime,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    // =========================================================================
    // Plan Tests
    // =========================================================================

    #[test]
    fn test_plan_default() {
        assert_eq!(Plan::default(), Plan::Starter);
    }

    #[test]
    fn test_plan_ranks_are_totally_ordered() {
        assert!(Plan::Starter.rank() < Plan::Growth.rank());
        assert!(Plan::Growth.rank() < Plan::Enterprise.rank());
    }

    #[test]
    fn test_plan_limits() {
        assert_eq!(Plan::Starter.limits().max_users, 5);
        assert_eq!(Plan::Starter.limits().max_projects, 10);
        assert_eq!(Plan::Growth.limits().max_users, 50);
        assert_eq!(Plan::Growth.limits().max_projects, 100);
        assert_eq!(Plan::Enterprise.limits().max_users, 500);
        assert_eq!(Plan::Enterprise.limits().max_projects, 1000);
    }

    #[test]
    fn test_plan_limits_grow_with_rank() {
        let plans = Plan::all();
        for pair in plans.windows(2) {
            assert!(pair[0].limits().max_users < pair[1].limits().max_users);
            assert!(pair[0].limits().max_projects < pair[1].limits().max_projects);
        }
    }

    #[test]
    fn test_plan_display_and_parse() {
        assert_eq!(Plan::Starter.to_string(), "starter");
        assert_eq!(Plan::Growth.to_string(), "growth");
        assert_eq!(Plan::Enterprise.to_string(), "enterprise");

        assert_eq!(Plan::from_str("growth").unwrap(), Plan::Growth);
        assert_eq!(Plan::from_str("ENTERPRISE").unwrap(), Plan::Enterprise);
        assert!(Plan::from_str("platinum").is_err());
    }

    // =========================================================================
    // Feature Tests
    // =========================================================================

    #[test]
    fn test_feature_min_plans() {
        assert_eq!(Feature::TeamManagement.min_plan(), Plan::Starter);
        assert_eq!(Feature::BasicAnalytics.min_plan(), Plan::Starter);
        assert_eq!(Feature::PrioritySupport.min_plan(), Plan::Growth);
        assert_eq!(Feature::AdvancedAnalytics.min_plan(), Plan::Growth);
        assert_eq!(Feature::ApiAccess.min_plan(), Plan::Enterprise);
        assert_eq!(Feature::Sso.min_plan(), Plan::Enterprise);
    }

    #[test]
    fn test_feature_display_round_trips() {
        for feature in Feature::all() {
            let parsed = Feature::from_str(&feature.to_string()).unwrap();
            assert_eq!(parsed, feature);
        }
    }

    #[test]
    fn test_feature_unknown_key_fails() {
        assert!(Feature::from_str("quantum_sync").is_err());
        assert!(Feature::from_str("").is_err());
        // Keys are exact, not case-folded
        assert!(Feature::from_str("SSO").is_err());
    }

    // =========================================================================
    // SubscriptionStatus Tests
    // =========================================================================

    #[test]
    fn test_status_default() {
        assert_eq!(SubscriptionStatus::default(), SubscriptionStatus::Trialing);
    }

    #[test]
    fn test_status_display_and_parse() {
        assert_eq!(SubscriptionStatus::Active.to_string(), "active");
        assert_eq!(
            SubscriptionStatus::from_str("canceled").unwrap(),
            SubscriptionStatus::Canceled
        );
        assert!(SubscriptionStatus::from_str("past_due").is_err());
    }
}
