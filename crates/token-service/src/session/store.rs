//! Session store boundary and the in-memory backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::context::RequestContext;
use super::state::SessionRecord;
use crate::error::StoreResult;

/// Cleanup interval: 1 minute.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Opaque per-browser key/value store addressed by session id.
///
/// Handlers load a record once on entry and save it at most once before
/// responding. Concurrent saves for the same id are last-write-wins.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Fetch the record stored under `id`, if any.
    async fn load(&self, ctx: &RequestContext, id: &str) -> StoreResult<Option<SessionRecord>>;

    /// Commit `record` under `id`, replacing what was there.
    async fn save(&self, ctx: &RequestContext, id: &str, record: &SessionRecord) -> StoreResult<()>;

    /// Forget `id`.
    async fn delete(&self, ctx: &RequestContext, id: &str) -> StoreResult<()>;
}

struct StoredSession {
    data: String,
    last_active: Instant,
}

/// In-memory session store with idle expiry.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, StoredSession>>>,
    ttl: Duration,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { sessions: Arc::new(RwLock::new(HashMap::new())), ttl }
    }

    /// Number of live sessions (for monitoring).
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle for longer than the TTL.
    pub async fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| s.last_active.elapsed() <= self.ttl);
        before - sessions.len()
    }

    /// Start background cleanup task.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                let cleaned = self.cleanup_expired().await;
                if cleaned > 0 {
                    tracing::debug!(count = cleaned, "Cleaned up idle sessions");
                }
            }
        });
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(crate::config::defaults::SESSION_TTL)
    }
}

impl std::fmt::Debug for MemorySessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySessionStore").field("ttl", &self.ttl).finish()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, ctx: &RequestContext, id: &str) -> StoreResult<Option<SessionRecord>> {
        let sessions = self.sessions.read().await;
        let Some(stored) = sessions.get(id) else {
            return Ok(None);
        };
        if stored.last_active.elapsed() > self.ttl {
            tracing::debug!(request_id = %ctx.request_id(), "Session idle past TTL");
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&stored.data)?))
    }

    async fn save(&self, ctx: &RequestContext, id: &str, record: &SessionRecord) -> StoreResult<()> {
        let data = serde_json::to_string(record)?;
        self.sessions
            .write()
            .await
            .insert(id.to_owned(), StoredSession { data, last_active: Instant::now() });
        tracing::trace!(request_id = %ctx.request_id(), "Session saved");
        Ok(())
    }

    async fn delete(&self, _ctx: &RequestContext, id: &str) -> StoreResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FormParams, LoginState};

    fn ctx() -> RequestContext {
        RequestContext::new(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemorySessionStore::default();
        let record = SessionRecord {
            return_uri: Some(FormParams::parse("client_id=X&response_type=code")),
            login: LoginState::Authenticated { user: "alice".into() },
        };

        store.save(&ctx(), "s1", &record).await.unwrap();
        assert_eq!(store.load(&ctx(), "s1").await.unwrap(), Some(record));
        assert_eq!(store.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let store = MemorySessionStore::default();
        assert!(store.load(&ctx(), "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_write_wins() {
        let store = MemorySessionStore::default();
        let first = SessionRecord::default();
        let second = SessionRecord {
            login: LoginState::Authenticated { user: "bob".into() },
            ..SessionRecord::default()
        };

        store.save(&ctx(), "s1", &first).await.unwrap();
        store.save(&ctx(), "s1", &second).await.unwrap();
        assert_eq!(store.load(&ctx(), "s1").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemorySessionStore::default();
        store.save(&ctx(), "s1", &SessionRecord::default()).await.unwrap();
        store.delete(&ctx(), "s1").await.unwrap();
        assert!(store.load(&ctx(), "s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = MemorySessionStore::new(Duration::ZERO);
        store.save(&ctx(), "s1", &SessionRecord::default()).await.unwrap();
        std::thread::sleep(Duration::from_millis(5));

        assert!(store.load(&ctx(), "s1").await.unwrap().is_none());
        assert_eq!(store.cleanup_expired().await, 1);
        assert_eq!(store.session_count().await, 0);
    }
}
