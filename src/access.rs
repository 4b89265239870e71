//! Lookups exposed to UI consumers
//!
//! These take the role as the raw string the UI holds. Unknown roles and
//! unknown feature keys are denied.

use crate::navigation::NavigationEntry;
use crate::roles::{FeatureKey, REGISTRY};
use tracing::debug;

/// Menu entries for a role; empty for unknown roles
pub fn get_navigation_for_role(role: &str) -> &'static [NavigationEntry] {
    REGISTRY.entries_for_raw(role)
}

/// Check if `route` is one of the role's entries or a descendant of one
pub fn has_access_to_route(role: &str, route: &str) -> bool {
    get_navigation_for_role(role)
        .iter()
        .any(|entry| entry.covers(route))
}

/// Check if the role's flag set grants `feature`
pub fn can_access_feature(role: &str, feature: &str) -> bool {
    let Ok(key) = feature.parse::<FeatureKey>() else {
        debug!(feature = %feature, "Unknown feature key");
        return false;
    };

    REGISTRY.flags_for_raw(role).allows(key)
}

/// Landing route for a role; the login route for unknown roles
pub fn get_dashboard_route(role: &str) -> &'static str {
    REGISTRY.landing_route_raw(role)
}

/// Roles whose menus cover `route`, in registry order
pub fn roles_with_route(route: &str) -> Vec<&'static str> {
    REGISTRY
        .profiles()
        .filter(|p| p.entries.iter().any(|e| e.covers(route)))
        .map(|p| p.role.as_str())
        .collect()
}
