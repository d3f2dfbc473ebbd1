//! # Session Store Module
//!
//! Pending extracted text per conversation. At most one document is pending
//! for a conversation; `take` reads and removes it in one step, so a prompt
//! can only ever consume the text of the upload that preceded it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Conversation identity (the platform chat id)
pub type ConversationId = i64;

/// Key-value store for pending documents.
///
/// Implementations must be safe under concurrent `put`/`take` from different
/// conversations.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store `text` for `id`, replacing any pending document
    async fn put(&self, id: ConversationId, text: String);

    /// Remove and return the pending document for `id`
    async fn take(&self, id: ConversationId) -> Option<String>;

    /// Whether `id` has a pending document
    async fn contains(&self, id: ConversationId) -> bool;

    /// Drop expired entries and return how many were removed
    async fn purge_expired(&self) -> usize;
}

struct Entry {
    text: String,
    stored_at: Instant,
}

/// Mutex-guarded in-memory store with optional expiry.
///
/// Without a TTL an abandoned document stays until process restart.
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<ConversationId, Entry>>,
    ttl: Option<Duration>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_ttl(None)
    }

    pub fn with_ttl(ttl: Option<Duration>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ConversationId, Entry>> {
        // A panic while holding the lock cannot leave the map half-updated,
        // so a poisoned guard is still usable.
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Session store lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn put(&self, id: ConversationId, text: String) {
        let replaced = self
            .lock()
            .insert(
                id,
                Entry {
                    text,
                    stored_at: Instant::now(),
                },
            )
            .is_some();
        debug!(user_id = id, replaced, "Stored pending document");
    }

    async fn take(&self, id: ConversationId) -> Option<String> {
        let entry = self.lock().remove(&id)?;
        if self.is_expired(&entry) {
            info!(user_id = id, "Pending document expired before prompt");
            return None;
        }
        Some(entry.text)
    }

    async fn contains(&self, id: ConversationId) -> bool {
        self.lock()
            .get(&id)
            .is_some_and(|entry| !self.is_expired(entry))
    }

    async fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry));
        let purged = before - entries.len();
        if purged > 0 {
            info!(purged, "Purged expired pending documents");
        }
        purged
    }
}

/// Periodically purge expired entries from `store`
pub fn spawn_expiry_sweeper(store: Arc<dyn SessionStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            store.purge_expired().await;
        }
    })
}
