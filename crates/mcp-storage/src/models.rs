//! Data model shared by every `Storage` implementation: tenants, OAuth
//! clients/codes/tokens, sessions, queued messages, out-of-band reply
//! records, and user accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A tenant ("agency context"). Immutable to the MCP engine; owned externally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantContext {
    /// Stable surrogate id (e.g. a database primary key).
    pub id: i64,
    /// Externally visible UUID, used in request URLs.
    pub uuid: Uuid,
    /// Display name.
    pub display_name: String,
    /// Whether this tenant may currently authenticate.
    pub active: bool,
}

/// The type of context a route/token is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    /// A tenant ("agency") context.
    Agency,
    /// An individual user context.
    User,
}

/// A registered OAuth client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthClient {
    /// Client identifier.
    pub client_id: String,
    /// Client secret, absent for public clients.
    pub client_secret: Option<String>,
    /// Human-readable name.
    pub client_name: String,
    /// Registered redirect URIs, in registration order.
    pub redirect_uris: Vec<String>,
    /// Allowed grant types, e.g. `["authorization_code", "refresh_token"]`.
    pub grant_types: Vec<String>,
    /// Allowed response types, e.g. `["code"]`.
    pub response_types: Vec<String>,
}

impl OAuthClient {
    /// Is `redirect_uri` one of this client's registered URIs?
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == redirect_uri)
    }

    /// Is `grant_type` permitted for this client?
    pub fn allows_grant(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }
}

/// A one-time authorization-code artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    /// The code value itself.
    pub code: String,
    /// Client the code was issued to.
    pub client_id: String,
    /// Tenant the eventual token will be scoped to.
    pub tenant_id: Uuid,
    /// User who consented.
    pub user_id: String,
    /// Requested scope string.
    pub scope: String,
    /// PKCE `code_challenge` (base64url, no padding).
    pub code_challenge: String,
    /// PKCE method; only `"S256"` is accepted.
    pub code_challenge_method: String,
    /// Redirect URI the authorize step was bound to.
    pub redirect_uri: String,
    /// RFC 8707 resource URL.
    pub resource: String,
    /// Expiry; issued codes live no longer than 10 minutes.
    pub expires_at: DateTime<Utc>,
    /// Set true once consumed by `/token`.
    pub revoked: bool,
}

impl AuthorizationCode {
    /// Is this code still usable right now?
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }
}

/// An issued access/refresh token pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    /// Opaque bearer token string.
    pub access_token: String,
    /// Opaque refresh token string.
    pub refresh_token: String,
    /// Client the token was issued to.
    pub client_id: String,
    /// Tenant the token is scoped to.
    pub tenant_id: Uuid,
    /// User who authorized the grant.
    pub user_id: String,
    /// Granted scope string.
    pub scope: String,
    /// RFC 8707 resource URL this token was bound to at issuance.
    pub resource: String,
    /// Audience set; contains at least `resource`.
    pub aud: Vec<String>,
    /// Issuance time.
    pub issued_at: DateTime<Utc>,
    /// Expiry time.
    pub expires_at: DateTime<Utc>,
    /// Set true once revoked.
    pub revoked: bool,
}

impl AccessToken {
    /// Is this token currently usable?
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && self.expires_at > now
    }

    /// Is this token usable against tenant `tenant_id` at `expected_resource`
    /// (the `<base_url>/mcp/<uuid>` URL for the request being served)?
    pub fn binds_to(&self, tenant_id: Uuid, expected_resource: &str) -> bool {
        self.tenant_id == tenant_id
            && self.resource == expected_resource
            && self.aud.iter().any(|a| a == expected_resource)
    }
}

/// A live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// `"<protocolVersion>_<hex>"`.
    pub id: String,
    /// Protocol version negotiated at `initialize`.
    pub protocol_version: String,
    /// Tenant this session belongs to.
    pub tenant_id: Uuid,
    /// Authenticated user, when known.
    pub user_id: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Expiry time (TTL from creation).
    pub expires_at: DateTime<Utc>,
    /// Bounded ring of JSON-RPC request ids already seen in this session,
    /// capped to prevent unbounded growth over a long-lived session.
    pub seen_ids: Vec<String>,
    /// Per-session log level set via `logging/setLevel`, if any.
    pub log_level: Option<String>,
}

impl Session {
    /// Is this session still live at `now`?
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// A queued outbound JSON-RPC message (response or server-originated
/// request), FIFO per session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedMessage {
    /// Opaque message id, used for deletion after delivery.
    pub id: Uuid,
    /// Owning session.
    pub session_id: String,
    /// The JSON-RPC payload to deliver verbatim.
    pub payload: Value,
    /// Enqueue time; messages are drained in this order.
    pub created_at: DateTime<Utc>,
}

/// Which out-of-band response table a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OobKind {
    /// `sampling/createMessage` replies.
    Sampling,
    /// `roots/list` replies.
    Roots,
    /// `elicitation/create` replies.
    Elicitation,
}

/// A client→server reply to a server-originated request ("OOB response").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OobRecord {
    /// Session the server-originated request was sent on.
    pub session_id: String,
    /// The request id the server used when it sent the original request.
    pub request_id: String,
    /// The client's reply payload.
    pub data: Value,
    /// Time the reply was recorded.
    pub created_at: DateTime<Utc>,
}

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable user id.
    pub id: String,
    /// Login email.
    pub email: String,
    /// Salted password hash, absent for identity-provider-only accounts.
    pub password_hash: Option<String>,
}

/// Parameters identifying the tenant context a token must be bound to,
/// passed to `Storage::validate_token`.
#[derive(Debug, Clone, Copy)]
pub struct TokenContext {
    /// Which kind of context (`agency` or `user`) the route binds to.
    pub context_type: ContextType,
    /// The tenant UUID extracted from the request URL.
    pub uuid: Uuid,
}
