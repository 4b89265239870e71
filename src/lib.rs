//! Mentorgate - role-based navigation and feature gating
//!
//! Resolves the effective role (student, alumni or admin) of a signed-in
//! session against a hosted profile store, composes the role's navigation
//! and answers feature-gate queries. Role changes pushed by the backend's
//! change feed are applied to live sessions.

pub mod access;
pub mod config;
pub mod navigation;
pub mod roles;
pub mod session;
pub mod storage;

pub use access::{can_access_feature, get_dashboard_route, get_navigation_for_role, has_access_to_route};
pub use config::GateConfig;
pub use navigation::{Navigation, NavigationComposer, NavigationEntry};
pub use roles::{FeatureFlagSet, FeatureKey, Role, RoleError, REGISTRY};
pub use session::{EffectiveRole, Session, SessionError};
pub use storage::{ChangeFeed, MemoryStore, PostgresStore, ProfileStore, RoleChangeEvent};
