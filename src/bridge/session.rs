use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::backend::SessionBackend;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct CachedSession {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

/// In-process cache of backend sessions known to exist.
///
/// The cache reflects desired state, not backend-confirmed state; the backend
/// remains authoritative. All operations degrade rather than propagate
/// transport errors, so a registry outage never blocks the conversational
/// call that follows.
pub struct SessionRegistry {
    backend: Arc<dyn SessionBackend>,
    cache: Mutex<HashSet<String>>,
}

fn session_key(app_name: &str, user_id: &str, session_id: &str) -> String {
    format!("{app_name}:{user_id}:{session_id}")
}

impl SessionRegistry {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend, cache: Mutex::new(HashSet::new()) }
    }

    /// Idempotently make sure the backend session exists. The lock is held
    /// across the create call so concurrent ensures for one key cannot
    /// double-create.
    pub async fn ensure(&self, app_name: &str, user_id: &str, session_id: &str) {
        let key = session_key(app_name, user_id, session_id);
        let mut cache = self.cache.lock().await;
        if cache.contains(&key) {
            tracing::debug!(%key, "session already cached");
            return;
        }
        match self.backend.create_session(app_name, user_id, session_id).await {
            Ok(true) => {
                tracing::info!(%key, "backend session ensured");
                cache.insert(key);
            }
            Ok(false) => {
                tracing::warn!(%key, "backend refused session creation, proceeding anyway");
            }
            Err(e) => {
                // Session absence is not necessarily fatal to the run call.
                tracing::error!(%key, error = %e, "failed to ensure backend session");
            }
        }
    }

    /// Delete the backend session. The cache entry is removed regardless of
    /// the backend outcome; "not found" counts as success.
    pub async fn delete(&self, app_name: &str, user_id: &str, session_id: &str) -> bool {
        let key = session_key(app_name, user_id, session_id);
        let ok = match self.backend.delete_session(app_name, user_id, session_id).await {
            Ok(settled) => {
                if !settled {
                    tracing::warn!(%key, "backend did not confirm session deletion");
                }
                settled
            }
            Err(e) => {
                tracing::error!(%key, error = %e, "failed to delete backend session");
                false
            }
        };
        self.cache.lock().await.remove(&key);
        ok
    }

    /// Recover a corrupted session: delete then ensure, unconditionally.
    pub async fn reset(&self, app_name: &str, user_id: &str, session_id: &str) {
        tracing::warn!(
            session = %session_key(app_name, user_id, session_id),
            "resetting backend session"
        );
        self.delete(app_name, user_id, session_id).await;
        self.ensure(app_name, user_id, session_id).await;
    }

    /// Enumerate cached sessions. Informational only; not authoritative for
    /// backend state.
    pub async fn list_cached(&self) -> Vec<CachedSession> {
        let cache = self.cache.lock().await;
        let mut sessions: Vec<CachedSession> = cache
            .iter()
            .filter_map(|key| {
                let mut it = key.splitn(3, ':');
                Some(CachedSession {
                    app_name: it.next()?.to_string(),
                    user_id: it.next()?.to_string(),
                    session_id: it.next()?.to_string(),
                })
            })
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AdkError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockBackend {
        creates: AtomicUsize,
        deletes: AtomicUsize,
        fail_create: bool,
        refuse_create: bool,
    }

    #[async_trait::async_trait]
    impl SessionBackend for MockBackend {
        async fn create_session(&self, _: &str, _: &str, _: &str) -> Result<bool, AdkError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return Err(AdkError::Unavailable("connection refused".into()));
            }
            Ok(!self.refuse_create)
        }

        async fn delete_session(&self, _: &str, _: &str, _: &str) -> Result<bool, AdkError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let backend = Arc::new(MockBackend::default());
        let registry = SessionRegistry::new(backend.clone());
        registry.ensure("agent", "u1", "session_u1").await;
        registry.ensure("agent", "u1", "session_u1").await;
        registry.ensure("agent", "u1", "session_u1").await;
        assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
        assert_eq!(registry.list_cached().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_ensures_create_once() {
        let backend = Arc::new(MockBackend::default());
        let registry = Arc::new(SessionRegistry::new(backend.clone()));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let r = registry.clone();
            handles.push(tokio::spawn(async move {
                r.ensure("agent", "u1", "session_u1").await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(backend.creates.load(Ordering::SeqCst), 1);
        let cached = registry.list_cached().await;
        assert_eq!(
            cached,
            vec![CachedSession {
                app_name: "agent".into(),
                user_id: "u1".into(),
                session_id: "session_u1".into(),
            }]
        );
    }

    #[tokio::test]
    async fn ensure_swallows_transport_errors_and_retries_later() {
        let backend = Arc::new(MockBackend { fail_create: true, ..Default::default() });
        let registry = SessionRegistry::new(backend.clone());
        registry.ensure("agent", "u1", "session_u1").await;
        assert!(registry.list_cached().await.is_empty());
        // Not cached, so the next ensure tries the backend again.
        registry.ensure("agent", "u1", "session_u1").await;
        assert_eq!(backend.creates.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn refused_creation_is_not_cached() {
        let backend = Arc::new(MockBackend { refuse_create: true, ..Default::default() });
        let registry = SessionRegistry::new(backend.clone());
        registry.ensure("agent", "u1", "session_u1").await;
        assert!(registry.list_cached().await.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_cache_entry() {
        let backend = Arc::new(MockBackend::default());
        let registry = SessionRegistry::new(backend.clone());
        registry.ensure("agent", "u1", "session_u1").await;
        assert!(registry.delete("agent", "u1", "session_u1").await);
        assert!(registry.list_cached().await.is_empty());
    }

    #[tokio::test]
    async fn reset_deletes_then_recreates() {
        let backend = Arc::new(MockBackend::default());
        let registry = SessionRegistry::new(backend.clone());
        registry.ensure("agent", "u1", "session_u1").await;
        registry.reset("agent", "u1", "session_u1").await;
        assert_eq!(backend.deletes.load(Ordering::SeqCst), 1);
        assert_eq!(backend.creates.load(Ordering::SeqCst), 2);
        assert_eq!(registry.list_cached().await.len(), 1);
    }
}
