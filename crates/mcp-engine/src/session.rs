//! Session lifecycle: creation at `initialize`, resolution and version
//! cross-checking on every later request, and the bounded per-session
//! seen-request-id set used for duplicate detection.

use std::sync::Arc;

use chrono::{Duration, Utc};
use mcp_core::{session_id, Error, ErrorCode, Result};
use mcp_storage::{Session, Storage};
use uuid::Uuid;

/// Owns session creation/resolution against a [`Storage`] backend.
pub struct SessionManager {
    storage: Arc<dyn Storage>,
    lifetime_secs: i64,
    max_seen_ids: usize,
}

impl SessionManager {
    /// Build a manager with the given session TTL and seen-id cap.
    pub fn new(storage: Arc<dyn Storage>, lifetime_secs: u64, max_seen_ids: usize) -> Self {
        Self {
            storage,
            lifetime_secs: lifetime_secs as i64,
            max_seen_ids,
        }
    }

    /// Create a new session for a successful `initialize`, returning its id.
    pub async fn create(
        &self,
        protocol_version: &str,
        tenant_id: Uuid,
        user_id: Option<String>,
    ) -> Result<String> {
        let id = session_id::generate(protocol_version);
        let now = Utc::now();
        let session = Session {
            id: id.clone(),
            protocol_version: protocol_version.to_string(),
            tenant_id,
            user_id,
            created_at: now,
            expires_at: now + Duration::seconds(self.lifetime_secs),
            seen_ids: Vec::new(),
            log_level: None,
        };
        self.storage.put_session(session).await?;
        Ok(id)
    }

    /// Resolve `session_id`, enforcing expiry and the version-prefix
    /// cross-check. Returns `SessionRequired` on any mismatch.
    pub async fn resolve(&self, session_id: &str) -> Result<Session> {
        let session = self
            .storage
            .get_session(session_id)
            .await?
            .filter(|s| s.is_valid(Utc::now()))
            .ok_or_else(session_required)?;

        let prefix = session_id::version_prefix(session_id).ok_or_else(session_required)?;
        if prefix != session.protocol_version {
            return Err(session_required());
        }

        Ok(session)
    }

    /// Record `request_id` as seen on `session_id`, atomically, evicting the
    /// oldest entry once `max_seen_ids` is exceeded. Returns `false` if the
    /// id was already present (a duplicate, which the caller must reject
    /// with -32600). The check-and-insert happens in one storage call so two
    /// concurrent requests for the same id can't both observe it absent.
    pub async fn mark_seen(&self, session_id: &str, request_id: &str) -> Result<bool> {
        self.storage
            .mark_request_seen(session_id, request_id, self.max_seen_ids)
            .await
    }
}

fn session_required() -> Error {
    Error::protocol(ErrorCode::SessionRequired, "session required")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_storage::MemoryStorage;

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemoryStorage::new()), 3600, 4)
    }

    #[tokio::test]
    async fn created_session_resolves() {
        let mgr = manager();
        let id = mgr
            .create("2025-06-18", Uuid::new_v4(), None)
            .await
            .unwrap();
        let session = mgr.resolve(&id).await.unwrap();
        assert_eq!(session.id, id);
    }

    #[tokio::test]
    async fn unknown_session_is_session_required() {
        let mgr = manager();
        let err = mgr.resolve("2025-06-18_deadbeef").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SessionRequired);
    }

    #[tokio::test]
    async fn mismatched_version_prefix_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        let mgr = SessionManager::new(storage.clone(), 3600, 4);
        let id = mgr
            .create("2025-06-18", Uuid::new_v4(), None)
            .await
            .unwrap();

        let tampered_id = format!("2024-11-05_{}", id.split_once('_').unwrap().1);
        let err = mgr.resolve(&tampered_id).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::SessionRequired);
    }

    #[tokio::test]
    async fn seen_ids_are_bounded() {
        let mgr = manager();
        let id = mgr
            .create("2025-06-18", Uuid::new_v4(), None)
            .await
            .unwrap();

        for i in 0..6 {
            let fresh = mgr.mark_seen(&id, &format!("req-{i}")).await.unwrap();
            assert!(fresh);
        }

        let session = mgr.resolve(&id).await.unwrap();
        assert_eq!(session.seen_ids.len(), 4);
        assert!(!session.seen_ids.contains(&"req-0".to_string()));
    }

    #[tokio::test]
    async fn duplicate_request_id_is_rejected() {
        let mgr = manager();
        let id = mgr
            .create("2025-06-18", Uuid::new_v4(), None)
            .await
            .unwrap();

        assert!(mgr.mark_seen(&id, "req-1").await.unwrap());
        assert!(!mgr.mark_seen(&id, "req-1").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_mark_seen_for_the_same_id_admits_exactly_one() {
        let mgr = Arc::new(manager());
        let id = mgr
            .create("2025-06-18", Uuid::new_v4(), None)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let mgr = mgr.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                mgr.mark_seen(&id, "req-race").await.unwrap()
            }));
        }

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }
}
