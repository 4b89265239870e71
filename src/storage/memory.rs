//! In-memory profile store and change feed
//!
//! Stands in for the hosted backend in tests and local runs. Role updates
//! made through [`MemoryStore::set_role`] are pushed to subscribers the way
//! the hosted change feed would; events can also be injected directly.

use crate::roles::Role;
use crate::storage::{
    async_trait, ChangeFeed, FeedSubscription, Profile, ProfileStore, RoleChangeEvent,
    StorageError,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

type Subscribers = DashMap<String, Vec<(Uuid, mpsc::Sender<RoleChangeEvent>)>>;

/// In-memory backend with failure injection
#[derive(Clone)]
pub struct MemoryStore {
    profiles: Arc<DashMap<String, Profile>>,
    subscribers: Arc<Subscribers>,
    buffer: usize,
    fail_fetches: Arc<AtomicBool>,
    failing_subscribes: Arc<AtomicUsize>,
    fetch_delay: Arc<Mutex<Option<Duration>>>,
    fetches: Arc<AtomicU64>,
    subscribes: Arc<AtomicU64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_buffer(64)
    }

    /// Create a store whose subscriptions buffer `buffer` events each
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            profiles: Arc::new(DashMap::new()),
            subscribers: Arc::new(DashMap::new()),
            buffer: buffer.max(1),
            fail_fetches: Arc::new(AtomicBool::new(false)),
            failing_subscribes: Arc::new(AtomicUsize::new(0)),
            fetch_delay: Arc::new(Mutex::new(None)),
            fetches: Arc::new(AtomicU64::new(0)),
            subscribes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Insert or replace a profile without notifying subscribers
    pub fn insert_profile(&self, profile: Profile) {
        self.profiles.insert(profile.id.clone(), profile);
    }

    /// Store a raw role value (possibly invalid) without notifying
    pub fn insert_raw_role(&self, subject: &str, role: &str) {
        let mut profile = Profile::new(subject, None);
        profile.role = Some(role.to_string());
        self.insert_profile(profile);
    }

    /// Update a subject's role and notify its subscribers
    ///
    /// Returns the number of subscriptions notified.
    pub fn set_role(&self, subject: &str, role: Role) -> usize {
        let previous = {
            let mut entry = self
                .profiles
                .entry(subject.to_string())
                .or_insert_with(|| Profile::new(subject, None));
            entry.role.replace(role.as_str().to_string())
        };

        self.publish(RoleChangeEvent {
            subject: subject.to_string(),
            previous_role: previous,
            new_role: Some(role.as_str().to_string()),
            timestamp: std::time::SystemTime::now(),
        })
    }

    /// Deliver an event to the subject's subscribers as-is
    ///
    /// Closed or full subscriptions are dropped. Returns the number notified.
    pub fn publish(&self, event: RoleChangeEvent) -> usize {
        let Some(mut subs) = self.subscribers.get_mut(&event.subject) else {
            return 0;
        };

        let mut delivered = 0;
        subs.retain(|(id, tx)| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(e) => {
                debug!(subscription = %id, error = %e, "Dropping role-change subscriber");
                false
            }
        });

        delivered
    }

    /// Drop every live subscription for `subject`, as a feed disconnect would
    pub fn disconnect(&self, subject: &str) {
        self.subscribers.remove(subject);
    }

    /// Number of live subscriptions for `subject`
    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.subscribers
            .get(subject)
            .map(|subs| subs.iter().filter(|(_, tx)| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Make every profile fetch fail
    pub fn set_fetch_failure(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Make the next `n` subscribe calls fail
    pub fn fail_next_subscribes(&self, n: usize) {
        self.failing_subscribes.store(n, Ordering::SeqCst);
    }

    /// Delay every profile fetch
    pub fn set_fetch_delay(&self, delay: Option<Duration>) {
        *self.fetch_delay.lock() = delay;
    }

    /// Number of profile fetches served or failed so far
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of subscribe attempts so far
    pub fn subscribe_count(&self) -> u64 {
        self.subscribes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn fetch_profile(&self, subject: &str) -> Result<Profile, StorageError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("injected fetch failure".into()));
        }

        self.profiles
            .get(subject)
            .map(|p| p.value().clone())
            .ok_or_else(|| StorageError::NotFound(format!("Profile not found: {}", subject)))
    }
}

#[async_trait]
impl ChangeFeed for MemoryStore {
    async fn subscribe_role_changes(
        &self,
        subject: &str,
    ) -> Result<FeedSubscription, StorageError> {
        self.subscribes.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .failing_subscribes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(StorageError::Unavailable("injected subscribe failure".into()));
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        let sub = FeedSubscription::new(subject, rx);
        let id = sub.id();

        self.subscribers
            .entry(subject.to_string())
            .or_default()
            .push((id, tx));

        let subscribers = self.subscribers.clone();
        let subject = subject.to_string();
        Ok(sub.on_cancel(move || {
            let now_empty = match subscribers.get_mut(&subject) {
                Some(mut subs) => {
                    subs.retain(|(sid, _)| *sid != id);
                    subs.is_empty()
                }
                None => false,
            };
            if now_empty {
                subscribers.remove_if(&subject, |_, subs| subs.is_empty());
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_profile() {
        let store = MemoryStore::new();
        store.insert_profile(Profile::new("u1", Some(Role::Alumni)));

        let profile = store.fetch_profile("u1").await.unwrap();
        assert_eq!(profile.role.as_deref(), Some("alumni"));

        let missing = store.fetch_profile("u2").await;
        assert!(matches!(missing, Err(StorageError::NotFound(_))));
        assert_eq!(store.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_injection() {
        let store = MemoryStore::new();
        store.insert_profile(Profile::new("u1", Some(Role::Admin)));
        store.set_fetch_failure(true);

        assert!(matches!(
            store.fetch_profile("u1").await,
            Err(StorageError::Unavailable(_))
        ));

        store.set_fetch_failure(false);
        assert!(store.fetch_profile("u1").await.is_ok());
    }

    #[tokio::test]
    async fn test_set_role_notifies_subscriber() {
        let store = MemoryStore::new();
        store.insert_profile(Profile::new("u1", Some(Role::Student)));

        let mut sub = store.subscribe_role_changes("u1").await.unwrap();
        assert_eq!(store.set_role("u1", Role::Alumni), 1);

        let event = sub.next().await.unwrap();
        assert_eq!(event.subject, "u1");
        assert_eq!(event.previous_role.as_deref(), Some("student"));
        assert_eq!(event.new_role.as_deref(), Some("alumni"));
    }

    #[tokio::test]
    async fn test_events_are_scoped_to_subject() {
        let store = MemoryStore::new();
        let _sub = store.subscribe_role_changes("u1").await.unwrap();

        assert_eq!(store.set_role("u2", Role::Admin), 0);
        assert_eq!(store.set_role("u1", Role::Admin), 1);
    }

    #[tokio::test]
    async fn test_cancel_removes_subscriber() {
        let store = MemoryStore::new();
        let sub = store.subscribe_role_changes("u1").await.unwrap();
        assert_eq!(store.subscriber_count("u1"), 1);

        sub.cancel();
        assert_eq!(store.subscriber_count("u1"), 0);
        assert_eq!(store.set_role("u1", Role::Alumni), 0);
    }

    #[tokio::test]
    async fn test_disconnect_ends_stream() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe_role_changes("u1").await.unwrap();

        store.disconnect("u1");
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_failure_injection() {
        let store = MemoryStore::new();
        store.fail_next_subscribes(2);

        assert!(store.subscribe_role_changes("u1").await.is_err());
        assert!(store.subscribe_role_changes("u1").await.is_err());
        assert!(store.subscribe_role_changes("u1").await.is_ok());
        assert_eq!(store.subscribe_count(), 3);
    }
}
