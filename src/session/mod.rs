//! Per-session effective role
//!
//! A [`Session`] moves through three states:
//! - `Unresolved`: signed in, first resolution still running
//! - `Resolved(role)`: a role governs what the session may see
//! - `Unauthenticated`: signed out (also the initial state)
//!
//! While signed in, a background adapter owns the session's change-feed
//! subscription and republishes the role whenever the subject's stored
//! role changes. Observers watch the session's own channel; nothing is
//! registered globally.

mod feed;
pub mod resolver;

pub use resolver::{Resolution, RoleResolver, RoleSource, SessionContext};

use crate::config::GateConfig;
use crate::navigation::{Navigation, NavigationComposer};
use crate::roles::registry::LOGIN_ROUTE;
use crate::roles::{FeatureKey, Role, REGISTRY};
use crate::storage::{ChangeFeed, ProfileStore};
use feed::{Command, FeedAdapter};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session already signed in as {0}")]
    AlreadyActive(String),

    #[error("session is not signed in")]
    NotActive,
}

/// The role currently governing a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "role", rename_all = "lowercase")]
pub enum EffectiveRole {
    Unresolved,
    Resolved(Role),
    Unauthenticated,
}

impl EffectiveRole {
    pub fn role(self) -> Option<Role> {
        match self {
            EffectiveRole::Resolved(role) => Some(role),
            _ => None,
        }
    }

    pub fn is_resolved(self) -> bool {
        matches!(self, EffectiveRole::Resolved(_))
    }
}

impl fmt::Display for EffectiveRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectiveRole::Unresolved => write!(f, "unresolved"),
            EffectiveRole::Resolved(role) => write!(f, "{}", role),
            EffectiveRole::Unauthenticated => write!(f, "unauthenticated"),
        }
    }
}

/// State shared between a session handle and its adapter task
pub(crate) struct Shared {
    pub(crate) resolver: RoleResolver,
    pub(crate) state: watch::Sender<EffectiveRole>,
    /// Bumped on every sign-in and sign-out; results from older epochs are dropped
    epoch: AtomicU64,
}

impl Shared {
    /// Publish `next` if `epoch` is still current and the value changed
    pub(crate) fn publish(&self, epoch: u64, next: EffectiveRole) -> bool {
        self.state.send_if_modified(|current| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                debug!(epoch, "Discarding role from a finished session");
                return false;
            }
            if *current == next {
                return false;
            }
            *current = next;
            true
        })
    }

    /// Start a new epoch and set the state it begins in
    fn begin_epoch(&self, state: EffectiveRole) -> u64 {
        let mut epoch = 0;
        self.state.send_modify(|current| {
            epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            *current = state;
        });
        epoch
    }
}

struct ActiveSession {
    subject: String,
    commands: mpsc::Sender<Command>,
    shutdown: watch::Sender<bool>,
    adapter: JoinHandle<()>,
}

/// One user's session: effective role, navigation and feature gates
pub struct Session {
    id: Uuid,
    shared: Arc<Shared>,
    feed: Arc<dyn ChangeFeed>,
    composer: NavigationComposer,
    active: Mutex<Option<ActiveSession>>,
}

impl Session {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        feed: Arc<dyn ChangeFeed>,
        config: GateConfig,
    ) -> Self {
        let (state, _) = watch::channel(EffectiveRole::Unauthenticated);

        Self {
            id: Uuid::new_v4(),
            shared: Arc::new(Shared {
                resolver: RoleResolver::new(store, config),
                state,
                epoch: AtomicU64::new(0),
            }),
            feed,
            composer: NavigationComposer::new(),
            active: Mutex::new(None),
        }
    }

    /// Session over a backend that serves both profiles and the change feed
    pub fn with_backend<B>(backend: Arc<B>, config: GateConfig) -> Self
    where
        B: ProfileStore + ChangeFeed + 'static,
    {
        Self::new(backend.clone(), backend, config)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Subject currently signed in
    pub fn subject(&self) -> Option<String> {
        self.active.lock().as_ref().map(|a| a.subject.clone())
    }

    /// Sign in `subject`, subscribe to its role changes and resolve its role
    ///
    /// Returns once the first resolution is published, or the adapter has
    /// exited. Backend failures resolve to [`Role::FALLBACK`] rather than
    /// an error.
    pub async fn sign_in(&self, subject: &str) -> Result<EffectiveRole, SessionError> {
        let mut rx = self.shared.state.subscribe();
        let (exited, mut adapter_exit) = oneshot::channel::<()>();
        let epoch = {
            let mut active = self.active.lock();
            if let Some(current) = active.as_ref() {
                return Err(SessionError::AlreadyActive(current.subject.clone()));
            }

            let epoch = self.shared.begin_epoch(EffectiveRole::Unresolved);
            let config = self.shared.resolver.config();
            let (commands, commands_rx) = mpsc::channel(config.event_buffer);
            let (shutdown, shutdown_rx) = watch::channel(false);

            let adapter = FeedAdapter {
                ctx: SessionContext::new(subject),
                epoch,
                shared: self.shared.clone(),
                feed: self.feed.clone(),
                commands: commands_rx,
                shutdown: shutdown_rx,
                exited,
            };

            info!(session = %self.id, subject = %subject, "Session signed in");
            *active = Some(ActiveSession {
                subject: subject.to_string(),
                commands,
                shutdown,
                adapter: tokio::spawn(adapter.run()),
            });
            epoch
        };

        let resolved = tokio::select! {
            biased;
            state = rx.wait_for(|s| *s != EffectiveRole::Unresolved) => state.is_ok(),
            _ = &mut adapter_exit => false,
        };

        if !resolved {
            // The adapter died before its first resolution
            warn!(
                session = %self.id,
                subject = %subject,
                "Change-feed adapter exited before resolving, using fallback role"
            );
            self.shared.publish(epoch, EffectiveRole::Resolved(Role::FALLBACK));
        }
        Ok(self.effective_role())
    }

    /// Sign out: cancel any pending fetch, release the change-feed
    /// subscription and move to `Unauthenticated`
    pub async fn sign_out(&self) -> Result<(), SessionError> {
        let active = self.active.lock().take().ok_or(SessionError::NotActive)?;

        self.shared.begin_epoch(EffectiveRole::Unauthenticated);
        let _ = active.shutdown.send(true);
        drop(active.commands);

        if let Err(e) = active.adapter.await {
            warn!(session = %self.id, error = %e, "Change-feed adapter ended abnormally");
        }

        info!(session = %self.id, subject = %active.subject, "Session signed out");
        Ok(())
    }

    /// Re-fetch the subject's profile, e.g. after a failed fetch
    pub async fn refresh(&self) -> Result<EffectiveRole, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Refresh(tx)).await?;
        rx.await.map_err(|_| SessionError::NotActive)
    }

    /// Force a role for this session, or clear the override with `None`
    ///
    /// Local diagnostics only; excluded from default builds.
    #[cfg(any(test, feature = "diagnostics"))]
    pub async fn set_override(&self, role: Option<Role>) -> Result<EffectiveRole, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Override(role, tx)).await?;
        rx.await.map_err(|_| SessionError::NotActive)
    }

    async fn send(&self, cmd: Command) -> Result<(), SessionError> {
        let commands = self
            .active
            .lock()
            .as_ref()
            .map(|a| a.commands.clone())
            .ok_or(SessionError::NotActive)?;

        commands.send(cmd).await.map_err(|_| SessionError::NotActive)
    }

    pub fn effective_role(&self) -> EffectiveRole {
        *self.shared.state.borrow()
    }

    /// Watch effective-role changes; identical values are not re-sent
    pub fn subscribe(&self) -> watch::Receiver<EffectiveRole> {
        self.shared.state.subscribe()
    }

    /// Navigation for the current role; `None` unless resolved
    pub fn navigation(&self) -> Option<Arc<Navigation>> {
        self.effective_role()
            .role()
            .map(|role| self.composer.navigation_for(role))
    }

    pub fn has_access_to_route(&self, route: &str) -> bool {
        self.navigation()
            .map(|nav| nav.contains_route(route))
            .unwrap_or(false)
    }

    pub fn can_access(&self, feature: FeatureKey) -> bool {
        self.effective_role()
            .role()
            .map(|role| REGISTRY.flags_for(role).allows(feature))
            .unwrap_or(false)
    }

    /// Check by raw feature key; unknown keys are denied
    pub fn can_access_key(&self, feature: &str) -> bool {
        feature
            .parse::<FeatureKey>()
            .map(|key| self.can_access(key))
            .unwrap_or(false)
    }

    /// Where to send the session: its dashboard, or the login page
    pub fn landing_route(&self) -> &'static str {
        match self.effective_role().role() {
            Some(role) => self.composer.default_landing_route(role),
            None => LOGIN_ROUTE,
        }
    }

    /// Number of navigation compositions performed by this session
    pub fn navigation_compositions(&self) -> u64 {
        self.composer.compositions()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.effective_role())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(active) = self.active.get_mut().take() {
            self.shared.begin_epoch(EffectiveRole::Unauthenticated);
            let _ = active.shutdown.send(true);
        }
    }
}
