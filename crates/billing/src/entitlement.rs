//! Entitlement Module
//!
//! Answers the question: "can this plan use this feature right now?"
//! Access is a pure rank comparison against the plan catalog, so the
//! decision is deterministic and monotonic: anything a lower plan can do,
//! every higher plan can do too.

use std::str::FromStr;

use tollgate_shared::types::{Feature, Plan};

/// Check whether a plan grants access to a feature
pub fn plan_allows(plan: Plan, feature: Feature) -> bool {
    plan.rank() >= feature.min_plan().rank()
}

/// String-keyed entitlement check for gating paths
///
/// Unknown feature keys are treated as inaccessible rather than erroring
/// the whole gate.
pub fn feature_allowed(plan: Plan, feature_key: &str) -> bool {
    match Feature::from_str(feature_key) {
        Ok(feature) => plan_allows(plan, feature),
        Err(_) => false,
    }
}

/// Sorted list of feature keys available on a plan
pub fn features_for(plan: Plan) -> Vec<String> {
    let mut features: Vec<String> = Feature::all()
        .into_iter()
        .filter(|f| plan_allows(plan, *f))
        .map(|f| f.to_string())
        .collect();
    features.sort();
    features
}
