//! Change-notification adapter
//!
//! One task per active session. It owns the session's change-feed
//! subscription and is the only writer of the session's effective role, so
//! initial resolution, role-change events and overrides are applied in the
//! order they arrive. The subscription is released on every exit path.

#[cfg(any(test, feature = "diagnostics"))]
use crate::roles::Role;
use crate::session::resolver::{Resolution, SessionContext};
use crate::session::{EffectiveRole, Shared};
use crate::storage::{ChangeFeed, FeedSubscription, RoleChangeEvent, StorageError};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

/// Requests from the session handle to its task
pub(crate) enum Command {
    /// Re-fetch the profile and republish
    Refresh(oneshot::Sender<EffectiveRole>),
    /// Replace the local override and republish
    #[cfg(any(test, feature = "diagnostics"))]
    Override(Option<Role>, oneshot::Sender<EffectiveRole>),
}

enum Step {
    Stop,
    Command(Command),
    Event(RoleChangeEvent),
    Disconnected,
    Resubscribe,
}

pub(crate) struct FeedAdapter {
    pub(crate) ctx: SessionContext,
    pub(crate) epoch: u64,
    pub(crate) shared: Arc<Shared>,
    pub(crate) feed: Arc<dyn ChangeFeed>,
    pub(crate) commands: mpsc::Receiver<Command>,
    pub(crate) shutdown: watch::Receiver<bool>,
    /// Dropped with the adapter, on any exit including a panic
    pub(crate) exited: oneshot::Sender<()>,
}

impl FeedAdapter {
    pub(crate) async fn run(mut self) {
        let config = self.shared.resolver.config().clone();

        // Subscribe before the first fetch so no change slips in between
        let mut subscription = match self.subscribe().await {
            Some(Ok(sub)) => Some(sub),
            Some(Err(e)) => {
                warn!(subject = %self.ctx.subject, error = %e, "Role-change subscription failed");
                None
            }
            None => return,
        };

        if !self.refresh().await {
            return;
        }

        let mut attempt: u32 = 0;
        let mut retry_at = (subscription.is_none() && config.auto_reconnect)
            .then(|| Instant::now() + config.backoff(attempt));

        loop {
            let step = match subscription.as_mut() {
                Some(sub) => tokio::select! {
                    biased;
                    _ = self.shutdown.changed() => Step::Stop,
                    cmd = self.commands.recv() => cmd.map_or(Step::Stop, Step::Command),
                    event = sub.next() => event.map_or(Step::Disconnected, Step::Event),
                },
                None => {
                    let retry = async {
                        match retry_at {
                            Some(at) => sleep_until(at).await,
                            None => std::future::pending().await,
                        }
                    };
                    tokio::select! {
                        biased;
                        _ = self.shutdown.changed() => Step::Stop,
                        cmd = self.commands.recv() => cmd.map_or(Step::Stop, Step::Command),
                        _ = retry => Step::Resubscribe,
                    }
                }
            };

            match step {
                Step::Stop => break,
                Step::Command(cmd) => {
                    if !self.handle_command(cmd).await {
                        break;
                    }
                }
                Step::Event(event) => self.apply_event(&event),
                Step::Disconnected => {
                    warn!(subject = %self.ctx.subject, "Role-change feed disconnected");
                    subscription = None;
                    attempt = 0;
                    retry_at = config
                        .auto_reconnect
                        .then(|| Instant::now() + config.backoff(attempt));
                }
                Step::Resubscribe => match self.subscribe().await {
                    Some(Ok(sub)) => {
                        info!(subject = %self.ctx.subject, attempt, "Role-change feed reconnected");
                        subscription = Some(sub);
                        attempt = 0;
                        retry_at = None;
                        // Changes made while disconnected were missed
                        if !self.refresh().await {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        attempt = attempt.saturating_add(1);
                        let delay = config.backoff(attempt);
                        warn!(
                            subject = %self.ctx.subject,
                            attempt,
                            error = %e,
                            "Resubscribe failed, retrying in {:?}",
                            delay
                        );
                        retry_at = Some(Instant::now() + delay);
                    }
                    None => break,
                },
            }
        }

        drop(subscription);
        debug!(subject = %self.ctx.subject, "Change-feed adapter stopped");
    }

    /// Subscribe unless the session shuts down first (`None`)
    ///
    /// Bounded by the fetch timeout; a feed that never answers counts as a
    /// failed attempt.
    async fn subscribe(&mut self) -> Option<Result<FeedSubscription, StorageError>> {
        let limit = self.shared.resolver.config().fetch_timeout;
        let attempt = timeout(limit, self.feed.subscribe_role_changes(&self.ctx.subject));

        tokio::select! {
            biased;
            _ = self.shutdown.changed() => None,
            result = attempt => Some(result.unwrap_or_else(|_| {
                Err(StorageError::Unavailable(format!(
                    "subscribe timed out after {:?}",
                    limit
                )))
            })),
        }
    }

    /// Fetch and publish; `false` if the session shut down mid-fetch
    async fn refresh(&mut self) -> bool {
        let resolution = tokio::select! {
            biased;
            _ = self.shutdown.changed() => return false,
            resolution = self.shared.resolver.resolve(&self.ctx) => resolution,
        };

        self.publish(resolution);
        true
    }

    fn apply_event(&self, event: &RoleChangeEvent) {
        if event.subject != self.ctx.subject {
            debug!(subject = %self.ctx.subject, event = %event, "Ignoring event for another subject");
            return;
        }

        debug!(event = %event, "Role change received");
        let resolution = self.shared.resolver.resolve_event(&self.ctx, event);
        self.publish(resolution);
    }

    /// Returns `false` if the session shut down while handling the command
    async fn handle_command(&mut self, cmd: Command) -> bool {
        let (ack, alive) = match cmd {
            Command::Refresh(ack) => (ack, self.refresh().await),
            #[cfg(any(test, feature = "diagnostics"))]
            Command::Override(role, ack) => {
                info!(subject = %self.ctx.subject, role = ?role, "Role override changed");
                self.ctx.set_override(role);
                (ack, self.refresh().await)
            }
        };

        let _ = ack.send(*self.shared.state.borrow());
        alive
    }

    fn publish(&self, resolution: Resolution) {
        let changed = self
            .shared
            .publish(self.epoch, EffectiveRole::Resolved(resolution.role));

        if changed {
            info!(
                subject = %self.ctx.subject,
                role = %resolution.role,
                source = ?resolution.source,
                "Effective role updated"
            );
        }
    }
}
