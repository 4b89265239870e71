//! Static role registry
//!
//! One [`RoleProfile`] per [`Role`], indexed by the role itself so every
//! table lookup is exhaustive. Nothing here is mutated after compilation;
//! sessions share the registry without locking.

use super::{FeatureFlagSet, FeatureKey, Role};
use crate::navigation::NavigationEntry;
use tracing::warn;

/// Route shown to sessions without a usable role
pub const LOGIN_ROUTE: &str = "/login";

/// Everything the registry knows about one role
#[derive(Debug)]
pub struct RoleProfile {
    pub role: Role,
    /// Route a freshly signed-in session lands on
    pub landing_route: &'static str,
    /// Menu entries, in display order
    pub entries: &'static [NavigationEntry],
    pub flags: FeatureFlagSet,
}

/// Role-indexed lookup table
#[derive(Debug)]
pub struct RoleRegistry {
    profiles: [RoleProfile; 3],
}

pub static REGISTRY: RoleRegistry = RoleRegistry {
    profiles: [STUDENT, ALUMNI, ADMIN],
};

impl RoleRegistry {
    pub fn profile(&self, role: Role) -> &RoleProfile {
        &self.profiles[role.index()]
    }

    pub fn entries_for(&self, role: Role) -> &'static [NavigationEntry] {
        self.profile(role).entries
    }

    pub fn flags_for(&self, role: Role) -> FeatureFlagSet {
        self.profile(role).flags
    }

    pub fn landing_route(&self, role: Role) -> &'static str {
        self.profile(role).landing_route
    }

    pub fn profiles(&self) -> impl Iterator<Item = &RoleProfile> {
        self.profiles.iter()
    }

    /// Look up a raw role value, e.g. one read from storage or a URL.
    ///
    /// Unknown values are reported as data-integrity anomalies and yield
    /// `None`; callers treat that as default-deny.
    pub fn lookup(&self, raw: &str) -> Option<&RoleProfile> {
        match raw.parse::<Role>() {
            Ok(role) => Some(self.profile(role)),
            Err(e) => {
                warn!(data_integrity = true, role = %raw, error = %e, "Unknown role value");
                None
            }
        }
    }

    /// Entries for a raw role value; empty for unknown roles
    pub fn entries_for_raw(&self, raw: &str) -> &'static [NavigationEntry] {
        self.lookup(raw).map(|p| p.entries).unwrap_or(&[])
    }

    /// Flags for a raw role value; all-false for unknown roles
    pub fn flags_for_raw(&self, raw: &str) -> FeatureFlagSet {
        self.lookup(raw)
            .map(|p| p.flags)
            .unwrap_or_else(FeatureFlagSet::empty)
    }

    /// Landing route for a raw role value; the login route for unknown roles
    pub fn landing_route_raw(&self, raw: &str) -> &'static str {
        self.lookup(raw)
            .map(|p| p.landing_route)
            .unwrap_or(LOGIN_ROUTE)
    }
}

const fn entry(
    name: &'static str,
    route: &'static str,
    icon: &'static str,
    description: &'static str,
) -> NavigationEntry {
    NavigationEntry {
        name,
        route,
        icon,
        description,
        badge: None,
        children: &[],
    }
}

const STUDENT: RoleProfile = RoleProfile {
    role: Role::Student,
    landing_route: "/student/dashboard",
    entries: &[
        entry("Dashboard", "/student/dashboard", "home", "Your activity at a glance"),
        entry("Find Mentors", "/student/mentors", "users", "Browse alumni offering mentorship"),
        NavigationEntry {
            children: &[
                entry("Browse Jobs", "/student/jobs/browse", "search", "Openings posted by alumni"),
                entry(
                    "My Applications",
                    "/student/jobs/applications",
                    "file-text",
                    "Track submitted applications",
                ),
            ],
            ..entry("Jobs", "/student/jobs", "briefcase", "Internships and job openings")
        },
        entry("Events", "/student/events", "calendar", "Upcoming webinars and meetups"),
        entry(
            "Alumni Directory",
            "/student/directory",
            "book-open",
            "Search the alumni network",
        ),
        NavigationEntry {
            badge: Some("New"),
            ..entry("Messages", "/student/messages", "message-circle", "Conversations with mentors")
        },
        entry("Profile", "/student/profile", "user", "Your academic profile"),
    ],
    flags: FeatureFlagSet::of(&[
        FeatureKey::CanApplyJobs,
        FeatureKey::CanRequestMentorship,
        FeatureKey::CanBrowseAlumniDirectory,
    ]),
};

const ALUMNI: RoleProfile = RoleProfile {
    role: Role::Alumni,
    landing_route: "/alumni/dashboard",
    entries: &[
        entry("Dashboard", "/alumni/dashboard", "home", "Your mentoring overview"),
        NavigationEntry {
            children: &[
                entry(
                    "Requests",
                    "/alumni/mentorship/requests",
                    "inbox",
                    "Pending mentorship requests",
                ),
                entry(
                    "Sessions",
                    "/alumni/mentorship/sessions",
                    "clock",
                    "Scheduled mentoring sessions",
                ),
            ],
            ..entry("Mentorship", "/alumni/mentorship", "users", "Guide current students")
        },
        entry("Post Jobs", "/alumni/jobs", "briefcase", "Share openings with students"),
        NavigationEntry {
            badge: Some("Host"),
            ..entry("Webinars", "/alumni/webinars", "video", "Create and host webinars")
        },
        entry("Events", "/alumni/events", "calendar", "Reunions and networking events"),
        entry(
            "Alumni Directory",
            "/alumni/directory",
            "book-open",
            "Reconnect with classmates",
        ),
        entry("Messages", "/alumni/messages", "message-circle", "Conversations with students"),
        entry("Profile", "/alumni/profile", "user", "Your professional profile"),
    ],
    flags: FeatureFlagSet::of(&[
        FeatureKey::CanCreateWebinars,
        FeatureKey::CanPostJobs,
        FeatureKey::CanMentor,
        FeatureKey::CanBrowseAlumniDirectory,
    ]),
};

const ADMIN: RoleProfile = RoleProfile {
    role: Role::Admin,
    landing_route: "/admin/dashboard",
    entries: &[
        entry("Dashboard", "/admin/dashboard", "home", "Platform health and activity"),
        NavigationEntry {
            children: &[
                entry("Students", "/admin/users/students", "user", "Manage student accounts"),
                entry("Alumni", "/admin/users/alumni", "award", "Verify and manage alumni"),
            ],
            ..entry("Users", "/admin/users", "users", "Manage accounts and roles")
        },
        NavigationEntry {
            badge: Some("Review"),
            ..entry("Moderation", "/admin/moderation", "shield", "Review reported content")
        },
        entry("Events", "/admin/events", "calendar", "Manage events and webinars"),
        entry("Jobs", "/admin/jobs", "briefcase", "Oversee job postings"),
        entry("Analytics", "/admin/analytics", "bar-chart", "Engagement and growth metrics"),
        entry("Settings", "/admin/settings", "settings", "Platform configuration"),
    ],
    flags: FeatureFlagSet::of(&[
        FeatureKey::CanCreateWebinars,
        FeatureKey::CanManageUsers,
        FeatureKey::CanPostJobs,
        FeatureKey::CanViewAnalytics,
        FeatureKey::CanModerateContent,
        FeatureKey::CanManageEvents,
        FeatureKey::CanBrowseAlumniDirectory,
    ]),
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all_routes(entries: &[NavigationEntry], out: &mut Vec<&'static str>) {
        for e in entries {
            out.push(e.route);
            all_routes(e.children, out);
        }
    }

    #[test]
    fn test_every_role_has_entries() {
        for role in Role::ALL {
            assert!(!REGISTRY.entries_for(role).is_empty(), "{} has no entries", role);
        }
    }

    #[test]
    fn test_routes_unique_within_role() {
        for role in Role::ALL {
            let mut routes = Vec::new();
            all_routes(REGISTRY.entries_for(role), &mut routes);

            let unique: HashSet<_> = routes.iter().collect();
            assert_eq!(unique.len(), routes.len(), "duplicate route for {}", role);
        }
    }

    #[test]
    fn test_profiles_indexed_by_role() {
        for role in Role::ALL {
            assert_eq!(REGISTRY.profile(role).role, role);
        }
        assert_eq!(REGISTRY.profiles().count(), Role::ALL.len());
    }

    #[test]
    fn test_landing_route_is_a_registered_entry() {
        for role in Role::ALL {
            let landing = REGISTRY.landing_route(role);
            assert!(REGISTRY.entries_for(role).iter().any(|e| e.route == landing));
        }
    }

    #[test]
    fn test_flags() {
        assert!(REGISTRY.flags_for(Role::Admin).allows(FeatureKey::CanManageUsers));
        assert!(!REGISTRY.flags_for(Role::Student).allows(FeatureKey::CanManageUsers));
        assert!(REGISTRY.flags_for(Role::Alumni).allows(FeatureKey::CanCreateWebinars));
        assert!(!REGISTRY.flags_for(Role::Student).allows(FeatureKey::CanCreateWebinars));
    }

    #[test]
    fn test_unknown_role_is_default_deny() {
        assert!(REGISTRY.lookup("guest").is_none());
        assert!(REGISTRY.entries_for_raw("guest").is_empty());
        assert!(REGISTRY.flags_for_raw("guest").is_empty());
        assert_eq!(REGISTRY.landing_route_raw("guest"), LOGIN_ROUTE);
    }

    #[test]
    fn test_raw_lookup_known_role() {
        assert_eq!(REGISTRY.entries_for_raw("alumni"), REGISTRY.entries_for(Role::Alumni));
        assert_eq!(REGISTRY.landing_route_raw("admin"), "/admin/dashboard");
    }
}
