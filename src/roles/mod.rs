//! Roles and feature flags
//!
//! Roles:
//! - `student`: current students looking for mentors, jobs and events
//! - `alumni`: graduates who mentor, post jobs and host webinars
//! - `admin`: platform staff managing users and content
//!
//! Every role owns a fixed [`FeatureFlagSet`] and an ordered navigation
//! list, both held by the static [`registry`].

pub mod registry;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use registry::{RoleProfile, RoleRegistry, REGISTRY};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleError {
    #[error("unknown role '{0}'")]
    UnknownRole(String),

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),
}

/// Access-level category assigned to a user
///
/// Deserializes through [`FromStr`], so stored values parse the same way on
/// every path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Role {
    Student,
    Alumni,
    Admin,
}

impl Role {
    /// All roles, in registry order
    pub const ALL: [Role; 3] = [Role::Student, Role::Alumni, Role::Admin];

    /// Least-privileged role, used whenever no stored role can be read
    pub const FALLBACK: Role = Role::Student;

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Alumni => "alumni",
            Role::Admin => "admin",
        }
    }

    /// Human-readable name
    pub fn label(self) -> &'static str {
        match self {
            Role::Student => "Student",
            Role::Alumni => "Alumni",
            Role::Admin => "Administrator",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Role::Student => "Find mentors, apply to jobs and join events",
            Role::Alumni => "Mentor students, post jobs and host webinars",
            Role::Admin => "Manage users, content and platform analytics",
        }
    }

    /// Position of this role in registry tables
    pub(crate) const fn index(self) -> usize {
        match self {
            Role::Student => 0,
            Role::Alumni => 1,
            Role::Admin => 2,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Role {
    type Error = RoleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Role {
    type Err = RoleError;

    /// Stored role values are matched case-insensitively, surrounding
    /// whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "alumni" => Ok(Role::Alumni),
            "admin" => Ok(Role::Admin),
            _ => Err(RoleError::UnknownRole(s.to_string())),
        }
    }
}

/// Capability gated per role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureKey {
    CanCreateWebinars,
    CanManageUsers,
    CanPostJobs,
    CanApplyJobs,
    CanMentor,
    CanRequestMentorship,
    CanViewAnalytics,
    CanModerateContent,
    CanManageEvents,
    CanBrowseAlumniDirectory,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 10] = [
        FeatureKey::CanCreateWebinars,
        FeatureKey::CanManageUsers,
        FeatureKey::CanPostJobs,
        FeatureKey::CanApplyJobs,
        FeatureKey::CanMentor,
        FeatureKey::CanRequestMentorship,
        FeatureKey::CanViewAnalytics,
        FeatureKey::CanModerateContent,
        FeatureKey::CanManageEvents,
        FeatureKey::CanBrowseAlumniDirectory,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureKey::CanCreateWebinars => "canCreateWebinars",
            FeatureKey::CanManageUsers => "canManageUsers",
            FeatureKey::CanPostJobs => "canPostJobs",
            FeatureKey::CanApplyJobs => "canApplyJobs",
            FeatureKey::CanMentor => "canMentor",
            FeatureKey::CanRequestMentorship => "canRequestMentorship",
            FeatureKey::CanViewAnalytics => "canViewAnalytics",
            FeatureKey::CanModerateContent => "canModerateContent",
            FeatureKey::CanManageEvents => "canManageEvents",
            FeatureKey::CanBrowseAlumniDirectory => "canBrowseAlumniDirectory",
        }
    }

    const fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureKey {
    type Err = RoleError;

    /// Feature keys are exact, case-sensitive identifiers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FeatureKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| RoleError::UnknownFeature(s.to_string()))
    }
}

/// Set of features granted to a role
///
/// Anything not explicitly granted is denied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FeatureFlagSet {
    bits: u16,
}

impl FeatureFlagSet {
    /// The all-false set
    pub const fn empty() -> Self {
        Self { bits: 0 }
    }

    /// Build a set granting exactly `keys`
    pub const fn of(keys: &[FeatureKey]) -> Self {
        let mut bits = 0;
        let mut i = 0;
        while i < keys.len() {
            bits |= keys[i].bit();
            i += 1;
        }
        Self { bits }
    }

    /// Grant a feature
    pub fn grant(&mut self, key: FeatureKey) {
        self.bits |= key.bit();
    }

    /// Revoke a feature
    pub fn revoke(&mut self, key: FeatureKey) {
        self.bits &= !key.bit();
    }

    /// Check if the feature is granted
    pub fn allows(&self, key: FeatureKey) -> bool {
        self.bits & key.bit() != 0
    }

    /// Check by raw key; unknown keys are denied
    pub fn allows_key(&self, key: &str) -> bool {
        key.parse::<FeatureKey>()
            .map(|k| self.allows(k))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Granted features, in declaration order
    pub fn granted(&self) -> impl Iterator<Item = FeatureKey> + '_ {
        FeatureKey::ALL.into_iter().filter(|k| self.allows(*k))
    }
}

impl FromIterator<FeatureKey> for FeatureFlagSet {
    fn from_iter<T: IntoIterator<Item = FeatureKey>>(iter: T) -> Self {
        let mut set = FeatureFlagSet::empty();
        for key in iter {
            set.grant(key);
        }
        set
    }
}

/// Serialized as the full `{ featureKey: bool }` map UI gates consume
impl Serialize for FeatureFlagSet {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(FeatureKey::ALL.len()))?;
        for key in FeatureKey::ALL {
            map.serialize_entry(key.as_str(), &self.allows(key))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
        assert_eq!("Alumni".parse::<Role>().unwrap(), Role::Alumni);
        assert_eq!(" ADMIN ".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(
            "guest".parse::<Role>(),
            Err(RoleError::UnknownRole("guest".to_string()))
        );
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_display() {
        for role in Role::ALL {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert_eq!(Role::Admin.label(), "Administrator");
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Alumni).unwrap(), "\"alumni\"");
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn test_role_deserialize_matches_from_str() {
        for raw in ["admin", " Alumni ", "STUDENT", "guest", ""] {
            let json = serde_json::to_string(raw).unwrap();
            let via_serde = serde_json::from_str::<Role>(&json).ok();
            assert_eq!(via_serde, raw.parse::<Role>().ok(), "{:?}", raw);
        }
    }

    #[test]
    fn test_feature_key_parse_is_case_sensitive() {
        assert_eq!(
            "canManageUsers".parse::<FeatureKey>().unwrap(),
            FeatureKey::CanManageUsers
        );
        assert!("canmanageusers".parse::<FeatureKey>().is_err());
        assert!("canFly".parse::<FeatureKey>().is_err());
    }

    #[test]
    fn test_feature_key_serde_matches_as_str() {
        for key in FeatureKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn test_flag_set() {
        let mut set = FeatureFlagSet::of(&[FeatureKey::CanMentor, FeatureKey::CanPostJobs]);

        assert!(set.allows(FeatureKey::CanMentor));
        assert!(set.allows_key("canPostJobs"));
        assert!(!set.allows(FeatureKey::CanManageUsers));
        assert!(!set.allows_key("canTimeTravel"));

        set.revoke(FeatureKey::CanMentor);
        assert!(!set.allows(FeatureKey::CanMentor));

        set.grant(FeatureKey::CanManageUsers);
        assert_eq!(
            set.granted().collect::<Vec<_>>(),
            vec![FeatureKey::CanManageUsers, FeatureKey::CanPostJobs]
        );
    }

    #[test]
    fn test_empty_flag_set_denies_everything() {
        let set = FeatureFlagSet::empty();
        assert!(set.is_empty());
        for key in FeatureKey::ALL {
            assert!(!set.allows(key));
        }
    }

    #[test]
    fn test_flag_set_serializes_as_full_map() {
        let set: FeatureFlagSet = [FeatureKey::CanApplyJobs].into_iter().collect();
        let value = serde_json::to_value(set).unwrap();
        let map = value.as_object().unwrap();

        assert_eq!(map.len(), FeatureKey::ALL.len());
        assert_eq!(map["canApplyJobs"], serde_json::json!(true));
        assert_eq!(map["canMentor"], serde_json::json!(false));
    }
}
