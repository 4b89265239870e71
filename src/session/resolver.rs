//! Effective-role resolution
//!
//! Priority: session override, then the stored profile role, then
//! [`Role::FALLBACK`]. Resolution never fails; backend errors and bad
//! stored values fall through to the fallback role.
//!
//! Overrides can only be set in test builds or with the `diagnostics`
//! feature.

use crate::config::GateConfig;
use crate::roles::Role;
use crate::storage::{ProfileStore, RoleChangeEvent};
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Where a resolved role came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSource {
    Override,
    Profile,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub role: Role,
    pub source: RoleSource,
}

/// Inputs for resolving one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub subject: String,
    override_role: Option<Role>,
}

impl SessionContext {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            override_role: None,
        }
    }

    pub fn override_role(&self) -> Option<Role> {
        self.override_role
    }

    #[cfg(any(test, feature = "diagnostics"))]
    pub fn with_override(mut self, role: Option<Role>) -> Self {
        self.override_role = role;
        self
    }

    #[cfg(any(test, feature = "diagnostics"))]
    pub(crate) fn set_override(&mut self, role: Option<Role>) {
        self.override_role = role;
    }
}

pub struct RoleResolver {
    store: Arc<dyn ProfileStore>,
    config: GateConfig,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn ProfileStore>, config: GateConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Resolve by fetching the subject's profile
    pub async fn resolve(&self, ctx: &SessionContext) -> Resolution {
        if let Some(role) = ctx.override_role {
            return Resolution {
                role,
                source: RoleSource::Override,
            };
        }

        match timeout(self.config.fetch_timeout, self.store.fetch_profile(&ctx.subject)).await {
            Ok(Ok(profile)) => self.from_stored(&ctx.subject, profile.role.as_deref()),
            Ok(Err(e)) => {
                warn!(subject = %ctx.subject, error = %e, "Profile fetch failed, using fallback role");
                self.fallback()
            }
            Err(_) => {
                warn!(
                    subject = %ctx.subject,
                    timeout = ?self.config.fetch_timeout,
                    "Profile fetch timed out, using fallback role"
                );
                self.fallback()
            }
        }
    }

    /// Resolve from the stored value carried by a change event
    pub fn resolve_event(&self, ctx: &SessionContext, event: &RoleChangeEvent) -> Resolution {
        if let Some(role) = ctx.override_role {
            return Resolution {
                role,
                source: RoleSource::Override,
            };
        }

        self.from_stored(&ctx.subject, event.new_role.as_deref())
    }

    fn from_stored(&self, subject: &str, raw: Option<&str>) -> Resolution {
        let Some(raw) = raw else {
            debug!(subject = %subject, "Profile has no role, using fallback role");
            return self.fallback();
        };

        match raw.parse::<Role>() {
            Ok(role) => Resolution {
                role,
                source: RoleSource::Profile,
            },
            Err(e) => {
                warn!(
                    data_integrity = true,
                    subject = %subject,
                    role = %raw,
                    error = %e,
                    "Stored role is not a known role, using fallback role"
                );
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> Resolution {
        Resolution {
            role: Role::FALLBACK,
            source: RoleSource::Default,
        }
    }
}
