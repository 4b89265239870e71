//! Navigation entries and route membership
//!
//! Routes are slash-separated paths: `/alumni/mentorship/requests`.
//! An entry covers its own route and every descendant path:
//! - `/alumni/dashboard` covers `/alumni/dashboard/settings`
//! - `/alumni/dashboard` does NOT cover `/alumni/dashboards`
//!
//! Query strings, fragments and a trailing slash are ignored when matching.

use crate::roles::{Role, REGISTRY};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// One item in a role's menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NavigationEntry {
    pub name: &'static str,
    pub route: &'static str,
    /// Rendering hint only
    pub icon: &'static str,
    pub description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub badge: Option<&'static str>,
    #[serde(skip_serializing_if = "no_children")]
    pub children: &'static [NavigationEntry],
}

fn no_children(children: &&'static [NavigationEntry]) -> bool {
    children.is_empty()
}

impl NavigationEntry {
    /// Check if this entry or any of its children covers `route`
    pub fn covers(&self, route: &str) -> bool {
        route_covers(self.route, route) || self.children.iter().any(|c| c.covers(route))
    }
}

/// Strip query, fragment and trailing slash
pub fn normalize_route(route: &str) -> &str {
    let end = route.find(['?', '#']).unwrap_or(route.len());
    let path = &route[..end];

    if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    }
}

/// Check if `base` equals `route` or is a path-prefix ancestor of it
pub fn route_covers(base: &str, route: &str) -> bool {
    let base = normalize_route(base);
    let route = normalize_route(route);

    if base.is_empty() || route.is_empty() {
        return false;
    }

    if base == "/" {
        return route.starts_with('/');
    }

    // Must continue at a segment boundary: "/a/b" covers "/a/b/c", not "/a/bc"
    route.starts_with(base)
        && (route.len() == base.len() || route.as_bytes()[base.len()] == b'/')
}

/// Navigation composed for one role
#[derive(Debug)]
pub struct Navigation {
    role: Role,
    entries: &'static [NavigationEntry],
    /// Every route reachable from the menu, children included
    routes: Vec<&'static str>,
}

impl Navigation {
    fn compose(role: Role) -> Self {
        let entries = REGISTRY.entries_for(role);

        let mut routes = Vec::new();
        let mut stack: Vec<&NavigationEntry> = entries.iter().rev().collect();
        while let Some(entry) = stack.pop() {
            routes.push(entry.route);
            stack.extend(entry.children.iter().rev());
        }

        Self {
            role,
            entries,
            routes,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Top-level entries, in display order
    pub fn entries(&self) -> &'static [NavigationEntry] {
        self.entries
    }

    /// All routes, depth-first in display order
    pub fn routes(&self) -> &[&'static str] {
        &self.routes
    }

    pub fn contains_route(&self, route: &str) -> bool {
        self.routes.iter().any(|base| route_covers(base, route))
    }

    /// The most specific entry covering `route` (for highlighting the active item)
    pub fn active_entry(&self, route: &str) -> Option<&'static NavigationEntry> {
        fn walk(
            entries: &'static [NavigationEntry],
            route: &str,
        ) -> Option<&'static NavigationEntry> {
            let entry = entries.iter().find(|e| e.covers(route))?;
            walk(entry.children, route).or_else(|| {
                route_covers(entry.route, route).then_some(entry)
            })
        }

        walk(self.entries, route)
    }

    pub fn landing_route(&self) -> &'static str {
        REGISTRY.landing_route(self.role)
    }
}

/// Memoizing navigation composer
///
/// Keeps the last composed [`Navigation`]; asking again for the same role
/// returns the cached value without recomposing.
#[derive(Debug, Default)]
pub struct NavigationComposer {
    cached: Mutex<Option<Arc<Navigation>>>,
    compositions: AtomicU64,
}

impl NavigationComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn navigation_for(&self, role: Role) -> Arc<Navigation> {
        let mut cached = self.cached.lock();

        if let Some(nav) = cached.as_ref() {
            if nav.role == role {
                return nav.clone();
            }
        }

        let nav = Arc::new(Navigation::compose(role));
        self.compositions.fetch_add(1, Ordering::Relaxed);
        debug!(role = %role, routes = nav.routes.len(), "Composed navigation");

        *cached = Some(nav.clone());
        nav
    }

    pub fn is_route_in_role(&self, role: Role, route: &str) -> bool {
        self.navigation_for(role).contains_route(route)
    }

    pub fn default_landing_route(&self, role: Role) -> &'static str {
        REGISTRY.landing_route(role)
    }

    /// Number of times navigation was actually (re)composed
    pub fn compositions(&self) -> u64 {
        self.compositions.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_route() {
        assert_eq!(normalize_route("/alumni/dashboard/"), "/alumni/dashboard");
        assert_eq!(normalize_route("/alumni/jobs?page=2"), "/alumni/jobs");
        assert_eq!(normalize_route("/alumni/jobs#top"), "/alumni/jobs");
        assert_eq!(normalize_route("/"), "/");
        assert_eq!(normalize_route(""), "");
    }

    #[test]
    fn test_route_covers() {
        assert!(route_covers("/alumni/dashboard", "/alumni/dashboard"));
        assert!(route_covers("/alumni/dashboard", "/alumni/dashboard/settings"));
        assert!(route_covers("/alumni/dashboard", "/alumni/dashboard/"));
        assert!(route_covers("/alumni/dashboard", "/alumni/dashboard?tab=1"));

        assert!(!route_covers("/alumni/dashboard", "/alumni/dashboards"));
        assert!(!route_covers("/alumni/dashboard", "/alumni"));
        assert!(!route_covers("/alumni/dashboard", "/student/dashboard"));
        assert!(!route_covers("/alumni/dashboard", ""));
    }

    #[test]
    fn test_route_covers_root() {
        assert!(route_covers("/", "/anything/at/all"));
        assert!(!route_covers("/", "relative"));
    }

    #[test]
    fn test_entry_covers_children() {
        let nav = Navigation::compose(Role::Alumni);
        let mentorship = nav
            .entries()
            .iter()
            .find(|e| e.route == "/alumni/mentorship")
            .unwrap();

        assert!(mentorship.covers("/alumni/mentorship/requests/42"));
        assert!(!mentorship.covers("/alumni/jobs"));
    }

    #[test]
    fn test_compose_flattens_children_in_order() {
        let nav = Navigation::compose(Role::Student);
        let routes = nav.routes();

        let jobs = routes.iter().position(|r| *r == "/student/jobs").unwrap();
        assert_eq!(routes[jobs + 1], "/student/jobs/browse");
        assert_eq!(routes[jobs + 2], "/student/jobs/applications");
        assert_eq!(routes[0], "/student/dashboard");
    }

    #[test]
    fn test_is_route_in_role_prefix() {
        let composer = NavigationComposer::new();

        assert!(composer.is_route_in_role(Role::Alumni, "/alumni/dashboard/settings"));
        assert!(composer.is_route_in_role(Role::Admin, "/admin/users/alumni/17"));
        assert!(!composer.is_route_in_role(Role::Student, "/admin/users"));
        assert!(!composer.is_route_in_role(Role::Student, "/alumni/dashboard"));
    }

    #[test]
    fn test_composer_memoizes_on_role() {
        let composer = NavigationComposer::new();

        let a = composer.navigation_for(Role::Student);
        let b = composer.navigation_for(Role::Student);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(composer.compositions(), 1);

        let c = composer.navigation_for(Role::Admin);
        assert_eq!(c.role(), Role::Admin);
        assert_eq!(composer.compositions(), 2);

        composer.navigation_for(Role::Admin);
        assert_eq!(composer.compositions(), 2);
    }

    #[test]
    fn test_active_entry_prefers_deepest() {
        let nav = Navigation::compose(Role::Admin);

        let active = nav.active_entry("/admin/users/students/3").unwrap();
        assert_eq!(active.route, "/admin/users/students");

        let active = nav.active_entry("/admin/users").unwrap();
        assert_eq!(active.route, "/admin/users");

        assert!(nav.active_entry("/student/jobs").is_none());
    }

    #[test]
    fn test_default_landing_route() {
        let composer = NavigationComposer::new();
        assert_eq!(composer.default_landing_route(Role::Student), "/student/dashboard");
        assert_eq!(composer.default_landing_route(Role::Alumni), "/alumni/dashboard");
        assert_eq!(composer.default_landing_route(Role::Admin), "/admin/dashboard");
    }

    #[test]
    fn test_entry_serialization_skips_empty_fields() {
        let nav = Navigation::compose(Role::Student);
        let json = serde_json::to_value(nav.entries()).unwrap();

        let dashboard = &json[0];
        assert_eq!(dashboard["route"], "/student/dashboard");
        assert!(dashboard.get("badge").is_none());
        assert!(dashboard.get("children").is_none());

        let jobs = json
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["route"] == "/student/jobs")
            .unwrap();
        assert_eq!(jobs["children"].as_array().unwrap().len(), 2);
    }
}
