//! Backends for user profiles and role-change notifications
//!
//! - Postgres: the hosted `profiles` table, LISTEN/NOTIFY for role changes
//! - Memory: in-process store that also acts as a fake event source

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{PostgresConfig, PostgresStore, CHANGE_CHANNEL};

pub use async_trait::async_trait;
use crate::roles::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// A user's stored profile row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    /// Raw role column; may hold values outside the known roles
    pub role: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl Profile {
    pub fn new(id: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            id: id.into(),
            role: role.map(|r| r.as_str().to_string()),
            full_name: None,
            email: None,
        }
    }
}

/// Notification that a subject's stored role changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleChangeEvent {
    pub subject: String,
    pub previous_role: Option<String>,
    pub new_role: Option<String>,
    pub timestamp: SystemTime,
}

impl RoleChangeEvent {
    pub fn new(subject: impl Into<String>, previous: Option<Role>, new: Role) -> Self {
        Self {
            subject: subject.into(),
            previous_role: previous.map(|r| r.as_str().to_string()),
            new_role: Some(new.as_str().to_string()),
            timestamp: SystemTime::now(),
        }
    }
}

impl fmt::Display for RoleChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.subject,
            self.previous_role.as_deref().unwrap_or("none"),
            self.new_role.as_deref().unwrap_or("none")
        )
    }
}

/// Live role-change subscription for one subject
///
/// Dropping the subscription releases it at the backend.
pub struct FeedSubscription {
    id: Uuid,
    subject: String,
    rx: mpsc::Receiver<RoleChangeEvent>,
    on_cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl FeedSubscription {
    pub fn new(subject: impl Into<String>, rx: mpsc::Receiver<RoleChangeEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            rx,
            on_cancel: None,
        }
    }

    /// Run `f` once when the subscription is released
    pub fn on_cancel(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(f));
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Next event, in delivery order. `None` means the feed disconnected.
    pub async fn next(&mut self) -> Option<RoleChangeEvent> {
        self.rx.recv().await
    }

    /// Release the subscription
    pub fn cancel(self) {
        drop(self);
    }
}

impl fmt::Debug for FeedSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedSubscription")
            .field("id", &self.id)
            .field("subject", &self.subject)
            .finish()
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(cancel) = self.on_cancel.take() {
            cancel();
        }
    }
}

/// Request/response access to stored profiles
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a subject's profile
    async fn fetch_profile(&self, subject: &str) -> Result<Profile, StorageError>;
}

/// Streaming access to role changes
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Subscribe to role changes for one subject
    async fn subscribe_role_changes(&self, subject: &str)
        -> Result<FeedSubscription, StorageError>;
}
