//! In-memory `Storage` implementation. Backs local development and the
//! workspace's test suite; not durable across process restarts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mcp_core::{Error, Result};
use parking_lot::RwLock;
use rand::Rng;
use uuid::Uuid;

use crate::models::{
    AccessToken, AuthorizationCode, ContextType, OAuthClient, OobKind, OobRecord, QueuedMessage,
    Session, TenantContext, TokenContext, User,
};
use crate::Storage;

/// Probability (out of 100) that a session write also triggers a full
/// expired-record sweep, so long-running processes don't need an external
/// cron purely to bound memory use.
const CLEANUP_PROBABILITY_PCT: u8 = 1;

#[derive(Default)]
struct Tables {
    tenants: HashMap<Uuid, TenantContext>,
    users: HashMap<String, User>,
    users_by_email: HashMap<String, String>,
    clients: HashMap<String, OAuthClient>,
    auth_codes: HashMap<String, AuthorizationCode>,
    tokens: HashMap<String, AccessToken>,
    tokens_by_refresh: HashMap<String, String>,
    sessions: HashMap<String, Session>,
    queues: HashMap<String, Vec<QueuedMessage>>,
    oob_sampling: HashMap<(String, String), OobRecord>,
    oob_roots: HashMap<(String, String), OobRecord>,
    oob_elicitation: HashMap<(String, String), OobRecord>,
}

/// In-memory, `Clone`-able reference implementation of [`Storage`].
///
/// Seed tenants/users/clients via [`MemoryStorage::seed_tenant`] and friends
/// before serving traffic; the constructor itself starts empty.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStorage {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tenant context, for test/dev seeding.
    pub fn seed_tenant(&self, tenant: TenantContext) {
        self.tables.write().tenants.insert(tenant.uuid, tenant);
    }

    /// Insert or replace a user account, for test/dev seeding.
    pub fn seed_user(&self, user: User) {
        let mut tables = self.tables.write();
        tables.users_by_email.insert(user.email.clone(), user.id.clone());
        tables.users.insert(user.id.clone(), user);
    }

    fn oob_table(tables: &mut Tables, kind: OobKind) -> &mut HashMap<(String, String), OobRecord> {
        match kind {
            OobKind::Sampling => &mut tables.oob_sampling,
            OobKind::Roots => &mut tables.oob_roots,
            OobKind::Elicitation => &mut tables.oob_elicitation,
        }
    }

    fn sweep(tables: &mut Tables) {
        let now = Utc::now();
        tables.sessions.retain(|_, s| s.is_valid(now));
        let live_sessions: std::collections::HashSet<String> =
            tables.sessions.keys().cloned().collect();
        tables.queues.retain(|id, _| live_sessions.contains(id));

        let dead_tokens: Vec<String> = tables
            .tokens
            .iter()
            .filter(|(_, t)| !t.is_valid(now))
            .map(|(k, _)| k.clone())
            .collect();
        for access_token in dead_tokens {
            if let Some(t) = tables.tokens.remove(&access_token) {
                tables.tokens_by_refresh.remove(&t.refresh_token);
            }
        }

        tables
            .auth_codes
            .retain(|_, c| c.is_valid(now) || c.revoked);
        tables.auth_codes.retain(|_, c| c.is_valid(now));
    }

    fn maybe_sweep(tables: &mut Tables) {
        if rand::rng().random_range(0..100) < CLEANUP_PROBABILITY_PCT {
            Self::sweep(tables);
        }
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_tenant(&self, uuid: Uuid) -> Result<Option<TenantContext>> {
        Ok(self.tables.read().tenants.get(&uuid).cloned())
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.read();
        let Some(id) = tables.users_by_email.get(email) else {
            return Ok(None);
        };
        Ok(tables.users.get(id).cloned())
    }

    async fn put_client(&self, client: OAuthClient) -> Result<OAuthClient> {
        let mut tables = self.tables.write();
        tables.clients.insert(client.client_id.clone(), client.clone());
        Ok(client)
    }

    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>> {
        Ok(self.tables.read().clients.get(client_id).cloned())
    }

    async fn put_auth_code(&self, code: AuthorizationCode) -> Result<()> {
        self.tables.write().auth_codes.insert(code.code.clone(), code);
        Ok(())
    }

    async fn get_auth_code(&self, code: &str) -> Result<Option<AuthorizationCode>> {
        Ok(self.tables.read().auth_codes.get(code).cloned())
    }

    async fn revoke_auth_code(&self, code: &str) -> Result<()> {
        if let Some(c) = self.tables.write().auth_codes.get_mut(code) {
            c.revoked = true;
        }
        Ok(())
    }

    async fn put_token(&self, token: AccessToken) -> Result<()> {
        let mut tables = self.tables.write();
        tables
            .tokens_by_refresh
            .insert(token.refresh_token.clone(), token.access_token.clone());
        tables.tokens.insert(token.access_token.clone(), token);
        Ok(())
    }

    async fn get_token(&self, access_token: &str) -> Result<Option<AccessToken>> {
        Ok(self.tables.read().tokens.get(access_token).cloned())
    }

    async fn get_token_by_refresh(&self, refresh_token: &str) -> Result<Option<AccessToken>> {
        let tables = self.tables.read();
        let Some(access_token) = tables.tokens_by_refresh.get(refresh_token) else {
            return Ok(None);
        };
        Ok(tables.tokens.get(access_token).cloned())
    }

    async fn revoke_token(&self, access_token: &str) -> Result<()> {
        if let Some(t) = self.tables.write().tokens.get_mut(access_token) {
            t.revoked = true;
        }
        Ok(())
    }

    async fn validate_token(
        &self,
        access_token: &str,
        ctx: TokenContext,
    ) -> Result<Option<AccessToken>> {
        let tables = self.tables.read();
        let Some(token) = tables.tokens.get(access_token) else {
            return Ok(None);
        };
        if !token.is_valid(Utc::now()) {
            return Ok(None);
        }
        match ctx.context_type {
            ContextType::Agency if token.tenant_id != ctx.uuid => Ok(None),
            _ => Ok(Some(token.clone())),
        }
    }

    async fn put_session(&self, session: Session) -> Result<()> {
        let mut tables = self.tables.write();
        tables.sessions.insert(session.id.clone(), session);
        Self::maybe_sweep(&mut tables);
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        Ok(self.tables.read().sessions.get(session_id).cloned())
    }

    async fn update_session(&self, session: Session) -> Result<()> {
        let mut tables = self.tables.write();
        tables.sessions.insert(session.id.clone(), session);
        Self::maybe_sweep(&mut tables);
        Ok(())
    }

    async fn mark_request_seen(
        &self,
        session_id: &str,
        request_id: &str,
        max_seen_ids: usize,
    ) -> Result<bool> {
        let mut tables = self.tables.write();
        let session = tables
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::Storage(format!("unknown session '{session_id}'")))?;
        if session.seen_ids.iter().any(|id| id == request_id) {
            return Ok(false);
        }
        session.seen_ids.push(request_id.to_string());
        if session.seen_ids.len() > max_seen_ids {
            session.seen_ids.remove(0);
        }
        Ok(true)
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut tables = self.tables.write();
        tables.sessions.remove(session_id);
        tables.queues.remove(session_id);
        Ok(())
    }

    async fn enqueue_message(
        &self,
        session_id: &str,
        payload: serde_json::Value,
        max_queue_len: usize,
    ) -> Result<()> {
        let mut tables = self.tables.write();
        let queue = tables.queues.entry(session_id.to_string()).or_default();
        queue.push(QueuedMessage {
            id: Uuid::new_v4(),
            session_id: session_id.to_string(),
            payload,
            created_at: Utc::now(),
        });
        while queue.len() > max_queue_len {
            let dropped = queue.remove(0);
            tracing::warn!(
                session_id,
                message_id = %dropped.id,
                queue_soft_cap = max_queue_len,
                "dropping oldest queued message: soft cap exceeded"
            );
        }
        Ok(())
    }

    async fn list_messages(&self, session_id: &str, limit: usize) -> Result<Vec<QueuedMessage>> {
        let tables = self.tables.read();
        Ok(tables
            .queues
            .get(session_id)
            .map(|queue| queue.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn delete_message(&self, session_id: &str, message_id: Uuid) -> Result<()> {
        let mut tables = self.tables.write();
        if let Some(queue) = tables.queues.get_mut(session_id) {
            queue.retain(|m| m.id != message_id);
        }
        Ok(())
    }

    async fn queue_depth(&self, session_id: &str) -> Result<usize> {
        Ok(self
            .tables
            .read()
            .queues
            .get(session_id)
            .map(Vec::len)
            .unwrap_or(0))
    }

    async fn put_oob_response(&self, kind: OobKind, record: OobRecord) -> Result<()> {
        let mut tables = self.tables.write();
        let key = (record.session_id.clone(), record.request_id.clone());
        Self::oob_table(&mut tables, kind).insert(key, record);
        Ok(())
    }

    async fn take_oob_response(
        &self,
        kind: OobKind,
        session_id: &str,
        request_id: &str,
    ) -> Result<Option<OobRecord>> {
        let mut tables = self.tables.write();
        let key = (session_id.to_string(), request_id.to_string());
        Ok(Self::oob_table(&mut tables, kind).remove(&key))
    }

    async fn cleanup_expired(&self) -> Result<()> {
        Self::sweep(&mut self.tables.write());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContextType;
    use chrono::Duration;

    fn tenant(uuid: Uuid) -> TenantContext {
        TenantContext {
            id: 1,
            uuid,
            display_name: "Acme".to_string(),
            active: true,
        }
    }

    fn token(tenant_id: Uuid, resource: &str, valid_for: Duration) -> AccessToken {
        AccessToken {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Uuid::new_v4().to_string(),
            client_id: "client-1".to_string(),
            tenant_id,
            user_id: "user-1".to_string(),
            scope: "mcp".to_string(),
            resource: resource.to_string(),
            aud: vec![resource.to_string()],
            issued_at: Utc::now(),
            expires_at: Utc::now() + valid_for,
            revoked: false,
        }
    }

    #[tokio::test]
    async fn tenant_round_trips() {
        let store = MemoryStorage::new();
        let uuid = Uuid::new_v4();
        store.seed_tenant(tenant(uuid));
        assert!(store.get_tenant(uuid).await.unwrap().is_some());
        assert!(store.get_tenant(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn validate_token_rejects_wrong_tenant() {
        let store = MemoryStorage::new();
        let tenant_id = Uuid::new_v4();
        let t = token(tenant_id, "https://mcp.example.com/mcp/abc", Duration::hours(1));
        store.put_token(t.clone()).await.unwrap();

        let ok = store
            .validate_token(
                &t.access_token,
                TokenContext {
                    context_type: ContextType::Agency,
                    uuid: tenant_id,
                },
            )
            .await
            .unwrap();
        assert!(ok.is_some());

        let wrong = store
            .validate_token(
                &t.access_token,
                TokenContext {
                    context_type: ContextType::Agency,
                    uuid: Uuid::new_v4(),
                },
            )
            .await
            .unwrap();
        assert!(wrong.is_none());
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let store = MemoryStorage::new();
        let tenant_id = Uuid::new_v4();
        let t = token(tenant_id, "https://mcp.example.com/mcp/abc", Duration::seconds(-1));
        store.put_token(t.clone()).await.unwrap();

        let result = store
            .validate_token(
                &t.access_token,
                TokenContext {
                    context_type: ContextType::Agency,
                    uuid: tenant_id,
                },
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn queue_lists_fifo_without_removing() {
        let store = MemoryStorage::new();
        for i in 0..5 {
            store
                .enqueue_message("sess-1", serde_json::json!({ "n": i }), 1024)
                .await
                .unwrap();
        }
        assert_eq!(store.queue_depth("sess-1").await.unwrap(), 5);

        let first = store.list_messages("sess-1", 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].payload["n"], 0);
        assert_eq!(first[1].payload["n"], 1);
        assert_eq!(store.queue_depth("sess-1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn delete_message_removes_only_that_entry() {
        let store = MemoryStorage::new();
        for i in 0..3 {
            store
                .enqueue_message("sess-1", serde_json::json!({ "n": i }), 1024)
                .await
                .unwrap();
        }
        let messages = store.list_messages("sess-1", 10).await.unwrap();
        store
            .delete_message("sess-1", messages[0].id)
            .await
            .unwrap();

        let remaining = store.list_messages("sess-1", 10).await.unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].payload["n"], 1);
    }

    #[tokio::test]
    async fn enqueue_drops_oldest_once_soft_cap_exceeded() {
        let store = MemoryStorage::new();
        for i in 0..5 {
            store
                .enqueue_message("sess-1", serde_json::json!({ "n": i }), 3)
                .await
                .unwrap();
        }
        assert_eq!(store.queue_depth("sess-1").await.unwrap(), 3);
        let remaining = store.list_messages("sess-1", 10).await.unwrap();
        assert_eq!(remaining[0].payload["n"], 2);
        assert_eq!(remaining[2].payload["n"], 4);
    }

    #[tokio::test]
    async fn mark_request_seen_rejects_duplicate_and_bounds_history() {
        let store = MemoryStorage::new();
        let session = Session {
            id: "2025-06-18_abc123".to_string(),
            protocol_version: "2025-06-18".to_string(),
            tenant_id: Uuid::new_v4(),
            user_id: None,
            created_at: Utc::now(),
            expires_at: Utc::now() + Duration::hours(1),
            seen_ids: Vec::new(),
            log_level: None,
        };
        store.put_session(session.clone()).await.unwrap();

        assert!(store
            .mark_request_seen(&session.id, "req-1", 2)
            .await
            .unwrap());
        assert!(!store
            .mark_request_seen(&session.id, "req-1", 2)
            .await
            .unwrap());

        store.mark_request_seen(&session.id, "req-2", 2).await.unwrap();
        store.mark_request_seen(&session.id, "req-3", 2).await.unwrap();
        let stored = store.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.seen_ids, vec!["req-2".to_string(), "req-3".to_string()]);
    }

    #[tokio::test]
    async fn oob_response_is_consumed_once() {
        let store = MemoryStorage::new();
        let record = OobRecord {
            session_id: "sess-1".to_string(),
            request_id: "req-1".to_string(),
            data: serde_json::json!({ "ok": true }),
            created_at: Utc::now(),
        };
        store
            .put_oob_response(OobKind::Sampling, record)
            .await
            .unwrap();

        let first = store
            .take_oob_response(OobKind::Sampling, "sess-1", "req-1")
            .await
            .unwrap();
        assert!(first.is_some());

        let second = store
            .take_oob_response(OobKind::Sampling, "sess-1", "req-1")
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn cleanup_removes_expired_sessions_and_their_queues() {
        let store = MemoryStorage::new();
        let expired = Session {
            id: "2025-06-18_deadbeef".to_string(),
            protocol_version: "2025-06-18".to_string(),
            tenant_id: Uuid::new_v4(),
            user_id: None,
            created_at: Utc::now() - Duration::hours(2),
            expires_at: Utc::now() - Duration::hours(1),
            seen_ids: Vec::new(),
            log_level: None,
        };
        store.put_session(expired.clone()).await.unwrap();
        store
            .enqueue_message(&expired.id, serde_json::json!({}), 1024)
            .await
            .unwrap();

        store.cleanup_expired().await.unwrap();

        assert!(store.get_session(&expired.id).await.unwrap().is_none());
        assert_eq!(store.queue_depth(&expired.id).await.unwrap(), 0);
    }
}
