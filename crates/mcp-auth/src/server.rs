//! OAuth 2.1 authorization-server logic: `/authorize`, `/verify`, `/consent`,
//! `/token`, `/revoke`, `/register`. HTTP routing lives in `mcp-transport`;
//! this module is the business logic each route calls into.

use std::sync::Arc;

use chrono::{Duration, Utc};
use mcp_core::{config::ServerConfig, Error, ErrorCode, Result};
use mcp_storage::{AccessToken, AuthorizationCode, OAuthClient, Storage};
use rand::RngCore;
use ring::digest;
use serde::{Deserialize, Serialize};

use crate::pkce;

/// Authorization codes live no longer than 10 minutes.
const AUTH_CODE_TTL_SECS: i64 = 600;
/// Access tokens are valid for one hour.
const ACCESS_TOKEN_TTL_SECS: i64 = 3600;
/// Minimum entropy, in bytes, for generated codes and tokens (≥128 bits for
/// codes, ≥256 bits for tokens).
const CODE_BYTES: usize = 18;
const TOKEN_BYTES: usize = 32;

/// Query parameters accepted by `GET /authorize`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizeRequest {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scope: String,
    pub state: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    pub resource: Option<String>,
}

/// Body of `POST /token` for `grant_type=authorization_code`.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthorizationCodeGrant {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub code_verifier: String,
    pub resource: Option<String>,
}

/// Body of `POST /token` for `grant_type=refresh_token`.
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenGrant {
    pub refresh_token: String,
    pub client_id: String,
    pub resource: Option<String>,
}

/// Body of `POST /register`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterClientRequest {
    pub client_name: String,
    pub redirect_uris: Vec<String>,
    pub grant_types: Option<Vec<String>>,
    pub response_types: Option<Vec<String>>,
    pub token_endpoint_auth_method: Option<String>,
}

/// `POST /token` success body.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_token: String,
    pub scope: String,
}

/// The OAuth 2.1 authorization-server logic, parameterized over the store.
pub struct AuthServer {
    storage: Arc<dyn Storage>,
    config: ServerConfig,
}

impl AuthServer {
    /// Build a server over `storage` using `config`'s auth settings.
    pub fn new(storage: Arc<dyn Storage>, config: ServerConfig) -> Self {
        Self { storage, config }
    }

    /// Validate an incoming `/authorize` request's static shape (before any
    /// login/consent UI is shown). Returns the resolved `resource` URL.
    pub async fn validate_authorize(
        &self,
        req: &AuthorizeRequest,
        protocol_version: Option<&str>,
    ) -> Result<()> {
        if req.response_type != "code" {
            return Err(invalid_request("response_type must be 'code'"));
        }
        if req.code_challenge_method != pkce::REQUIRED_METHOD {
            return Err(invalid_request("code_challenge_method must be S256"));
        }

        let client = self
            .storage
            .get_client(&req.client_id)
            .await?
            .ok_or_else(|| invalid_request("unknown client_id"))?;
        if !client.allows_redirect(&req.redirect_uri) {
            return Err(invalid_request("redirect_uri not registered for client"));
        }

        if let Some(version) = protocol_version {
            if self.config.auth.require_resource_binding_for(version) {
                let Some(resource) = &req.resource else {
                    return Err(invalid_request("resource is required"));
                };
                self.check_resource_matches_tenant(resource)?;
            }
        }

        Ok(())
    }

    fn check_resource_matches_tenant(&self, resource: &str) -> Result<()> {
        let prefix = format!("{}/mcp/", self.config.base_url);
        if !resource.starts_with(&prefix) {
            return Err(invalid_request("resource does not match this server's MCP endpoint"));
        }
        Ok(())
    }

    /// Resolve a login attempt to a user id, for the `/verify` step.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<String> {
        let user = self
            .storage
            .get_user_by_email(email)
            .await?
            .ok_or_else(|| invalid_request("invalid credentials"))?;
        let Some(hash) = &user.password_hash else {
            return Err(invalid_request("invalid credentials"));
        };
        if !verify_password(password, hash) {
            return Err(invalid_request("invalid credentials"));
        }
        Ok(user.id)
    }

    /// Finalize consent: mint an authorization code and build the redirect
    /// target (`redirect_uri?code=...&state=...`).
    pub async fn complete_consent(
        &self,
        req: &AuthorizeRequest,
        tenant_id: uuid::Uuid,
        user_id: &str,
    ) -> Result<String> {
        let code = generate_token(CODE_BYTES);
        let record = AuthorizationCode {
            code: code.clone(),
            client_id: req.client_id.clone(),
            tenant_id,
            user_id: user_id.to_string(),
            scope: req.scope.clone(),
            code_challenge: req.code_challenge.clone(),
            code_challenge_method: req.code_challenge_method.clone(),
            redirect_uri: req.redirect_uri.clone(),
            resource: req.resource.clone().unwrap_or_default(),
            expires_at: Utc::now() + Duration::seconds(AUTH_CODE_TTL_SECS),
            revoked: false,
        };
        self.storage.put_auth_code(record).await?;

        let mut url = url::Url::parse(&req.redirect_uri)
            .map_err(|_| invalid_request("redirect_uri is not a valid URL"))?;
        url.query_pairs_mut()
            .append_pair("code", &code)
            .append_pair("state", &req.state);
        Ok(url.to_string())
    }

    /// Build the `redirect_uri?error=access_denied&state=...` target for a
    /// rejected consent.
    pub fn deny_consent(&self, req: &AuthorizeRequest) -> Result<String> {
        let mut url = url::Url::parse(&req.redirect_uri)
            .map_err(|_| invalid_request("redirect_uri is not a valid URL"))?;
        url.query_pairs_mut()
            .append_pair("error", "access_denied")
            .append_pair("state", &req.state);
        Ok(url.to_string())
    }

    /// `POST /token`, `grant_type=authorization_code`.
    pub async fn token_from_code(
        &self,
        grant: AuthorizationCodeGrant,
        protocol_version: Option<&str>,
    ) -> Result<TokenResponse> {
        let code = self
            .storage
            .get_auth_code(&grant.code)
            .await?
            .filter(|c| c.is_valid(Utc::now()))
            .ok_or_else(|| invalid_grant("invalid or expired code"))?;

        if code.client_id != grant.client_id || code.redirect_uri != grant.redirect_uri {
            return Err(invalid_grant("client_id/redirect_uri mismatch"));
        }
        if !pkce::verify(&grant.code_verifier, &code.code_challenge) {
            return Err(invalid_grant("code_verifier does not match code_challenge"));
        }
        if let Some(version) = protocol_version {
            if self.config.auth.require_resource_binding_for(version)
                && grant.resource.as_deref() != Some(code.resource.as_str())
            {
                return Err(invalid_grant("resource does not match the authorized value"));
            }
        }

        self.storage.revoke_auth_code(&code.code).await?;

        let token = self.issue_token(
            code.client_id.clone(),
            code.tenant_id,
            code.user_id.clone(),
            code.scope.clone(),
            code.resource.clone(),
        );
        self.storage.put_token(token.clone()).await?;
        Ok(to_response(&token))
    }

    /// `POST /token`, `grant_type=refresh_token`. Rotates the token pair.
    pub async fn token_from_refresh(
        &self,
        grant: RefreshTokenGrant,
        protocol_version: Option<&str>,
    ) -> Result<TokenResponse> {
        let old = self
            .storage
            .get_token_by_refresh(&grant.refresh_token)
            .await?
            .ok_or_else(|| invalid_grant("invalid refresh_token"))?;

        if old.client_id != grant.client_id {
            return Err(invalid_grant("client_id mismatch"));
        }
        if let Some(version) = protocol_version {
            if self.config.auth.require_resource_binding_for(version)
                && grant.resource.as_deref() != Some(old.resource.as_str())
            {
                return Err(invalid_grant("resource does not match the original grant"));
            }
        }

        self.storage.revoke_token(&old.access_token).await?;

        let new_token = self.issue_token(
            old.client_id.clone(),
            old.tenant_id,
            old.user_id.clone(),
            old.scope.clone(),
            old.resource.clone(),
        );
        self.storage.put_token(new_token.clone()).await?;
        Ok(to_response(&new_token))
    }

    fn issue_token(
        &self,
        client_id: String,
        tenant_id: uuid::Uuid,
        user_id: String,
        scope: String,
        resource: String,
    ) -> AccessToken {
        let now = Utc::now();
        AccessToken {
            access_token: generate_token(TOKEN_BYTES),
            refresh_token: generate_token(TOKEN_BYTES),
            client_id,
            tenant_id,
            user_id,
            scope,
            aud: vec![resource.clone()],
            resource,
            issued_at: now,
            expires_at: now + Duration::seconds(ACCESS_TOKEN_TTL_SECS),
            revoked: false,
        }
    }

    /// `POST /revoke`. Always succeeds, per RFC 7009 idempotency.
    pub async fn revoke(&self, token_or_refresh: &str) -> Result<()> {
        if self.storage.get_token(token_or_refresh).await?.is_some() {
            self.storage.revoke_token(token_or_refresh).await?;
            return Ok(());
        }
        if let Some(token) = self
            .storage
            .get_token_by_refresh(token_or_refresh)
            .await?
        {
            self.storage.revoke_token(&token.access_token).await?;
        }
        Ok(())
    }

    /// `POST /register`, RFC 7591-shaped dynamic client registration.
    pub async fn register_client(&self, req: RegisterClientRequest) -> Result<OAuthClient> {
        if req.redirect_uris.is_empty() {
            return Err(invalid_request("redirect_uris must not be empty"));
        }
        let public_client = req.token_endpoint_auth_method.as_deref() == Some("none");
        let client = OAuthClient {
            client_id: generate_token(CODE_BYTES),
            client_secret: if public_client {
                None
            } else {
                Some(generate_token(TOKEN_BYTES))
            },
            client_name: req.client_name,
            redirect_uris: req.redirect_uris,
            grant_types: req
                .grant_types
                .unwrap_or_else(|| vec!["authorization_code".to_string(), "refresh_token".to_string()]),
            response_types: req.response_types.unwrap_or_else(|| vec!["code".to_string()]),
        };
        self.storage.put_client(client.clone()).await?;
        Ok(client)
    }
}

fn to_response(token: &AccessToken) -> TokenResponse {
    TokenResponse {
        access_token: token.access_token.clone(),
        token_type: "Bearer",
        expires_in: ACCESS_TOKEN_TTL_SECS,
        refresh_token: token.refresh_token.clone(),
        scope: token.scope.clone(),
    }
}

fn generate_token(entropy_bytes: usize) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    let mut bytes = vec![0u8; entropy_bytes];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a plaintext password for storage (PBKDF2-HMAC-SHA256). Not a wire
/// format; used only by seeding/test tooling and the `/verify` comparison.
pub fn hash_password(password: &str, salt: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use std::num::NonZeroU32;

    let mut out = [0u8; digest::SHA256_OUTPUT_LEN];
    ring::pbkdf2::derive(
        ring::pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(100_000).expect("nonzero"),
        salt,
        password.as_bytes(),
        &mut out,
    );
    format!("{}${}", URL_SAFE_NO_PAD.encode(salt), URL_SAFE_NO_PAD.encode(out))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let Some((salt_b64, _)) = stored_hash.split_once('$') else {
        return false;
    };
    let Ok(salt) = URL_SAFE_NO_PAD.decode(salt_b64) else {
        return false;
    };
    let recomputed = hash_password(password, &salt);
    use subtle::ConstantTimeEq;
    recomputed.as_bytes().ct_eq(stored_hash.as_bytes()).into()
}

fn invalid_request(detail: &str) -> Error {
    Error::protocol(ErrorCode::InvalidParams, detail.to_string())
}

fn invalid_grant(detail: &str) -> Error {
    Error::protocol(ErrorCode::InvalidParams, detail.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_storage::MemoryStorage;

    fn client() -> OAuthClient {
        OAuthClient {
            client_id: "client-1".to_string(),
            client_secret: Some("secret".to_string()),
            client_name: "Test Client".to_string(),
            redirect_uris: vec!["https://client.example.com/callback".to_string()],
            grant_types: vec!["authorization_code".to_string(), "refresh_token".to_string()],
            response_types: vec!["code".to_string()],
        }
    }

    fn authorize_request(resource: Option<&str>) -> AuthorizeRequest {
        AuthorizeRequest {
            response_type: "code".to_string(),
            client_id: "client-1".to_string(),
            redirect_uri: "https://client.example.com/callback".to_string(),
            scope: "mcp".to_string(),
            state: "xyz".to_string(),
            code_challenge: pkce::challenge_from_verifier("verifier-value"),
            code_challenge_method: "S256".to_string(),
            resource: resource.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn full_authorization_code_flow_issues_tokens() {
        let storage = Arc::new(MemoryStorage::new());
        storage.put_client(client()).await.unwrap();
        let mut config = ServerConfig::default();
        config.base_url = "https://mcp.example.com".to_string();
        let server = AuthServer::new(storage.clone(), config);

        let tenant_id = uuid::Uuid::new_v4();
        let resource = format!("https://mcp.example.com/mcp/{tenant_id}");
        let req = authorize_request(Some(&resource));

        server
            .validate_authorize(&req, Some("2025-06-18"))
            .await
            .unwrap();

        let redirect = server
            .complete_consent(&req, tenant_id, "user-1")
            .await
            .unwrap();
        let url = url::Url::parse(&redirect).unwrap();
        let code = url
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.to_string())
            .unwrap();

        let token = server
            .token_from_code(
                AuthorizationCodeGrant {
                    code,
                    client_id: "client-1".to_string(),
                    redirect_uri: "https://client.example.com/callback".to_string(),
                    code_verifier: "verifier-value".to_string(),
                    resource: Some(resource.clone()),
                },
                Some("2025-06-18"),
            )
            .await
            .unwrap();

        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, ACCESS_TOKEN_TTL_SECS);
    }

    #[tokio::test]
    async fn wrong_code_verifier_is_rejected() {
        let storage = Arc::new(MemoryStorage::new());
        storage.put_client(client()).await.unwrap();
        let config = ServerConfig::default();
        let server = AuthServer::new(storage.clone(), config);

        let tenant_id = uuid::Uuid::new_v4();
        let req = authorize_request(None);
        let redirect = server
            .complete_consent(&req, tenant_id, "user-1")
            .await
            .unwrap();
        let url = url::Url::parse(&redirect).unwrap();
        let code = url
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.to_string())
            .unwrap();

        let err = server
            .token_from_code(
                AuthorizationCodeGrant {
                    code,
                    client_id: "client-1".to_string(),
                    redirect_uri: "https://client.example.com/callback".to_string(),
                    code_verifier: "totally-wrong".to_string(),
                    resource: None,
                },
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidParams);
    }

    #[tokio::test]
    async fn refresh_rotates_token_pair() {
        let storage = Arc::new(MemoryStorage::new());
        storage.put_client(client()).await.unwrap();
        let config = ServerConfig::default();
        let server = AuthServer::new(storage.clone(), config);

        let tenant_id = uuid::Uuid::new_v4();
        let req = authorize_request(None);
        let redirect = server
            .complete_consent(&req, tenant_id, "user-1")
            .await
            .unwrap();
        let url = url::Url::parse(&redirect).unwrap();
        let code = url
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.to_string())
            .unwrap();
        let first = server
            .token_from_code(
                AuthorizationCodeGrant {
                    code,
                    client_id: "client-1".to_string(),
                    redirect_uri: "https://client.example.com/callback".to_string(),
                    code_verifier: "verifier-value".to_string(),
                    resource: None,
                },
                None,
            )
            .await
            .unwrap();

        let second = server
            .token_from_refresh(
                RefreshTokenGrant {
                    refresh_token: first.refresh_token.clone(),
                    client_id: "client-1".to_string(),
                    resource: None,
                },
                None,
            )
            .await
            .unwrap();

        assert_ne!(first.access_token, second.access_token);
        assert!(storage.get_token(&first.access_token).await.unwrap().unwrap().revoked);
    }

    #[test]
    fn password_hash_round_trips() {
        let hash = hash_password("hunter2", b"some-salt-bytes!");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("wrong", &hash));
    }
}
