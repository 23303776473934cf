//! Event vocabulary normalization
//!
//! External billing providers emit a larger, looser vocabulary than the
//! internal three-plan/three-status model. These functions are the boundary
//! that keeps internal state closed over the small enum set while tolerating
//! upstream drift. Both are total over arbitrary untrusted strings and
//! return None rather than guessing; callers must never overwrite existing
//! state with None.

use std::str::FromStr;

use tollgate_shared::types::{Plan, SubscriptionStatus};

/// Map an external plan name onto the canonical plan enum
///
/// Substring matches run in priority order before exact catalog membership
/// so vendor nicknames like "Enterprise Annual" normalize correctly.
pub fn normalize_plan(raw: Option<&str>) -> Option<Plan> {
    let normalized = raw?.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    if normalized.contains("enterprise") {
        return Some(Plan::Enterprise);
    }
    if normalized.contains("growth") || normalized.contains("pro") {
        return Some(Plan::Growth);
    }
    if normalized.contains("starter") || normalized.contains("basic") {
        return Some(Plan::Starter);
    }
    Plan::from_str(&normalized).ok()
}

/// Map an external subscription status onto the canonical status enum
///
/// Unpaid-style states collapse to Canceled: an unknown payment state is
/// treated as loss of active entitlement, never as access.
pub fn normalize_status(raw: Option<&str>) -> Option<SubscriptionStatus> {
    let normalized = raw?.trim().to_lowercase();
    match normalized.as_str() {
        "trialing" => Some(SubscriptionStatus::Trialing),
        "active" => Some(SubscriptionStatus::Active),
        "canceled" => Some(SubscriptionStatus::Canceled),
        "unpaid" | "past_due" | "incomplete" | "incomplete_expired" => {
            Some(SubscriptionStatus::Canceled)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // normalize_plan
    // =========================================================================

    #[test]
    fn test_plan_canonical_names_pass_through() {
        assert_eq!(normalize_plan(Some("starter")), Some(Plan::Starter));
        assert_eq!(normalize_plan(Some("growth")), Some(Plan::Growth));
        assert_eq!(normalize_plan(Some("enterprise")), Some(Plan::Enterprise));
    }

    #[test]
    fn test_plan_vendor_nicknames() {
        // Substring priority handles decorated vendor names
        assert_eq!(
            normalize_plan(Some("Enterprise Annual")),
            Some(Plan::Enterprise)
        );
        assert_eq!(normalize_plan(Some("Pro Monthly")), Some(Plan::Growth));
        assert_eq!(normalize_plan(Some("Basic")), Some(Plan::Starter));
    }

    #[test]
    fn test_plan_enterprise_wins_over_other_matches() {
        // "enterprise" is checked first even when another token also matches
        assert_eq!(
            normalize_plan(Some("enterprise-pro bundle")),
            Some(Plan::Enterprise)
        );
    }

    #[test]
    fn test_plan_trims_and_lowercases() {
        assert_eq!(normalize_plan(Some("  GROWTH  ")), Some(Plan::Growth));
    }

    #[test]
    fn test_plan_unknown_and_empty_yield_none() {
        assert_eq!(normalize_plan(Some("platinum")), None);
        assert_eq!(normalize_plan(Some("")), None);
        assert_eq!(normalize_plan(Some("   ")), None);
        assert_eq!(normalize_plan(None), None);
    }

    #[test]
    fn test_plan_normalization_is_idempotent() {
        for raw in ["Enterprise Annual", "pro", "starter", "  Basic  "] {
            let first = normalize_plan(Some(raw)).unwrap();
            let second = normalize_plan(Some(&first.to_string())).unwrap();
            assert_eq!(first, second);
        }
    }

    // =========================================================================
    // normalize_status
    // =========================================================================

    #[test]
    fn test_status_passthrough() {
        assert_eq!(
            normalize_status(Some("trialing")),
            Some(SubscriptionStatus::Trialing)
        );
        assert_eq!(
            normalize_status(Some("active")),
            Some(SubscriptionStatus::Active)
        );
        assert_eq!(
            normalize_status(Some("canceled")),
            Some(SubscriptionStatus::Canceled)
        );
    }

    #[test]
    fn test_status_delinquent_states_collapse_to_canceled() {
        for raw in ["unpaid", "past_due", "incomplete", "incomplete_expired"] {
            assert_eq!(
                normalize_status(Some(raw)),
                Some(SubscriptionStatus::Canceled),
                "{} should collapse to canceled",
                raw
            );
        }
    }

    #[test]
    fn test_status_trims_and_lowercases() {
        assert_eq!(
            normalize_status(Some(" ACTIVE ")),
            Some(SubscriptionStatus::Active)
        );
        assert_eq!(
            normalize_status(Some("Past_Due")),
            Some(SubscriptionStatus::Canceled)
        );
    }

    #[test]
    fn test_status_unknown_and_empty_yield_none() {
        assert_eq!(normalize_status(Some("paused")), None);
        assert_eq!(normalize_status(Some("")), None);
        assert_eq!(normalize_status(None), None);
    }
}
