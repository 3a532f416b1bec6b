//! Abstract persistence contract the engine, auth server, and transport
//! layer depend on, plus an in-memory reference implementation.
//!
//! The contract is deliberately narrow: callers never see a connection pool,
//! a transaction, or a driver-specific error. A durable implementation
//! (Postgres, SQLite, ...) lives outside this workspace and plugs in by
//! implementing `Storage`.

pub mod memory;
pub mod models;

pub use memory::MemoryStorage;
pub use models::{
    AccessToken, AuthorizationCode, ContextType, OAuthClient, OobKind, OobRecord, QueuedMessage,
    Session, TenantContext, TokenContext, User,
};

use async_trait::async_trait;
use mcp_core::Result;
use uuid::Uuid;

/// The persistence contract. Grouped by the resource it manages; a durable
/// backend typically maps each group onto its own table or collection.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    // -- Tenant contexts --------------------------------------------------

    /// Look up a tenant by its URL-facing UUID.
    async fn get_tenant(&self, uuid: Uuid) -> Result<Option<TenantContext>>;

    // -- Users --------------------------------------------------------------

    /// Look up a user by id.
    async fn get_user(&self, id: &str) -> Result<Option<User>>;

    /// Look up a user by login email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;

    // -- OAuth clients ------------------------------------------------------

    /// Register a new client, returning it unchanged.
    async fn put_client(&self, client: OAuthClient) -> Result<OAuthClient>;

    /// Look up a client by id.
    async fn get_client(&self, client_id: &str) -> Result<Option<OAuthClient>>;

    // -- Authorization codes --------------------------------------------------

    /// Persist a freshly-issued authorization code.
    async fn put_auth_code(&self, code: AuthorizationCode) -> Result<()>;

    /// Look up an authorization code by its value.
    async fn get_auth_code(&self, code: &str) -> Result<Option<AuthorizationCode>>;

    /// Mark a code as consumed so it cannot be redeemed twice.
    async fn revoke_auth_code(&self, code: &str) -> Result<()>;

    // -- Access / refresh tokens ----------------------------------------------

    /// Persist a freshly-issued token pair.
    async fn put_token(&self, token: AccessToken) -> Result<()>;

    /// Look up a token record by its bearer access-token value.
    async fn get_token(&self, access_token: &str) -> Result<Option<AccessToken>>;

    /// Look up a token record by its refresh-token value.
    async fn get_token_by_refresh(&self, refresh_token: &str) -> Result<Option<AccessToken>>;

    /// Revoke a token by its bearer access-token value.
    async fn revoke_token(&self, access_token: &str) -> Result<()>;

    /// Validate a bearer token against the context a route is bound to;
    /// returns the resolved tenant context when the token is valid, unexpired,
    /// and (when `ctx.context_type` requires it) bound to `ctx.uuid`.
    async fn validate_token(
        &self,
        access_token: &str,
        ctx: TokenContext,
    ) -> Result<Option<AccessToken>>;

    // -- Sessions -------------------------------------------------------------

    /// Persist a newly created session.
    async fn put_session(&self, session: Session) -> Result<()>;

    /// Look up a session by id.
    async fn get_session(&self, session_id: &str) -> Result<Option<Session>>;

    /// Replace a session's stored state (used to refresh expiry or log level).
    async fn update_session(&self, session: Session) -> Result<()>;

    /// Atomically record `request_id` as seen on `session_id`, evicting the
    /// oldest entry once `max_seen_ids` is exceeded. Returns `false` without
    /// mutating anything if the id was already present -- the caller must
    /// reject the request as a duplicate. The check-and-insert happens under
    /// a single lock/row write so two concurrent calls for the same id can
    /// never both observe it absent.
    async fn mark_request_seen(
        &self,
        session_id: &str,
        request_id: &str,
        max_seen_ids: usize,
    ) -> Result<bool>;

    /// Delete a session and everything queued against it.
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    // -- Queued messages --------------------------------------------------------

    /// Enqueue a message for delivery to `session_id`'s drain loop. Once the
    /// queue exceeds `max_queue_len`, the oldest undelivered entries are
    /// dropped and the eviction is logged.
    async fn enqueue_message(
        &self,
        session_id: &str,
        payload: serde_json::Value,
        max_queue_len: usize,
    ) -> Result<()>;

    /// List up to `limit` queued messages for `session_id`, oldest first,
    /// without removing them. The caller deletes each message individually,
    /// via `delete_message`, only once it has actually been delivered.
    async fn list_messages(&self, session_id: &str, limit: usize) -> Result<Vec<QueuedMessage>>;

    /// Delete one queued message by id, once delivery has been confirmed.
    async fn delete_message(&self, session_id: &str, message_id: Uuid) -> Result<()>;

    /// Number of messages currently queued for `session_id`.
    async fn queue_depth(&self, session_id: &str) -> Result<usize>;

    // -- Out-of-band responses -----------------------------------------------

    /// Record a client's reply to a server-originated request.
    async fn put_oob_response(&self, kind: OobKind, record: OobRecord) -> Result<()>;

    /// Take the reply recorded for `(session_id, request_id)`, if any,
    /// removing it so it is delivered at most once.
    async fn take_oob_response(
        &self,
        kind: OobKind,
        session_id: &str,
        request_id: &str,
    ) -> Result<Option<OobRecord>>;

    // -- Maintenance ------------------------------------------------------------

    /// Remove every expired session, token, and authorization code. Backends
    /// are free to call this opportunistically (the in-memory implementation
    /// does, probabilistically, on session writes) or via an external sweep.
    async fn cleanup_expired(&self) -> Result<()>;
}
