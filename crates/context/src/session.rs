//! Session registry.
//!
//! Maps session ids to their conversation memories. Each session's
//! memory sits behind its own lock so concurrent queries against
//! different sessions never contend, while two queries against the same
//! session serialize at the memory and observe its no-partial-mutation
//! guarantee.

use ragline_core::message::SessionId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::memory::ConversationMemory;

struct SessionEntry {
    memory: Arc<Mutex<ConversationMemory>>,
    last_seen: Instant,
}

/// Registry of per-session conversation memories.
///
/// Sessions are created on first use and evicted lazily after sitting
/// idle past the configured TTL. Clearing an unknown session is a no-op.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
    idle_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Fetch the memory for `session_id`, creating an empty one on
    /// first use, and refresh its idle timer.
    pub async fn get_or_create(&self, session_id: &SessionId) -> Arc<Mutex<ConversationMemory>> {
        {
            let mut sessions = self.sessions.write().await;
            if let Some(entry) = sessions.get_mut(session_id) {
                entry.last_seen = Instant::now();
                return Arc::clone(&entry.memory);
            }
        }

        let memory = Arc::new(Mutex::new(ConversationMemory::new()));
        let mut sessions = self.sessions.write().await;
        // Another task may have created the session between locks.
        let entry = sessions.entry(session_id.clone()).or_insert(SessionEntry {
            memory,
            last_seen: Instant::now(),
        });
        entry.last_seen = Instant::now();
        debug!(session = %session_id, "session memory attached");
        Arc::clone(&entry.memory)
    }

    /// Drop a session's history and summary entirely. Idempotent:
    /// clearing a session that never existed succeeds.
    pub async fn clear(&self, session_id: &SessionId) {
        let removed = self.sessions.write().await.remove(session_id).is_some();
        if removed {
            info!(session = %session_id, "session cleared");
        }
    }

    /// Whether the registry currently holds state for `session_id`.
    pub async fn contains(&self, session_id: &SessionId) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions idle past the TTL. Called opportunistically from
    /// the request path rather than a background task.
    pub async fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.last_seen.elapsed() < self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!(evicted, "idle sessions evicted");
        }
        evicted
    }
}
