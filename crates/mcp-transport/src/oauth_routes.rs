//! HTTP surface for the OAuth 2.1 authorization server: login form,
//! consent form, and the token/revoke/register JSON endpoints. The actual
//! grant logic lives in `mcp_auth::server::AuthServer`; these handlers only
//! render HTML and translate between the wire format and that API.
//!
//! Form bodies are flat `application/x-www-form-urlencoded`; `serde_urlencoded`
//! can't deserialize `#[serde(flatten)]` or internally-tagged enums, so every
//! form struct here lists its fields explicitly instead of embedding
//! `AuthorizeRequest`.

use axum::extract::{Form, Query, State};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use mcp_auth::{AuthorizationCodeGrant, AuthorizeRequest, RefreshTokenGrant, RegisterClientRequest};
use mcp_core::{Error, ErrorCode};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::state::AppState;

pub async fn authorize(State(state): State<AppState>, Query(req): Query<AuthorizeRequest>) -> Response {
    if let Err(e) = state.auth.validate_authorize(&req, None).await {
        return error_page(&e);
    }
    Html(login_form_html(&req)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct VerifyForm {
    email: String,
    password: String,
    response_type: String,
    client_id: String,
    redirect_uri: String,
    scope: String,
    state: String,
    code_challenge: String,
    code_challenge_method: String,
    resource: Option<String>,
}

impl VerifyForm {
    fn authorize_request(&self) -> AuthorizeRequest {
        AuthorizeRequest {
            response_type: self.response_type.clone(),
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scope: self.scope.clone(),
            state: self.state.clone(),
            code_challenge: self.code_challenge.clone(),
            code_challenge_method: self.code_challenge_method.clone(),
            resource: self.resource.clone(),
        }
    }
}

pub async fn verify(State(state): State<AppState>, Form(form): Form<VerifyForm>) -> Response {
    let user_id = match state.auth.verify_credentials(&form.email, &form.password).await {
        Ok(id) => id,
        Err(e) => return error_page(&e),
    };
    Html(consent_form_html(&form.authorize_request(), &user_id)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct ConsentForm {
    action: String,
    user_id: String,
    response_type: String,
    client_id: String,
    redirect_uri: String,
    scope: String,
    state: String,
    code_challenge: String,
    code_challenge_method: String,
    resource: Option<String>,
}

impl ConsentForm {
    fn authorize_request(&self) -> AuthorizeRequest {
        AuthorizeRequest {
            response_type: self.response_type.clone(),
            client_id: self.client_id.clone(),
            redirect_uri: self.redirect_uri.clone(),
            scope: self.scope.clone(),
            state: self.state.clone(),
            code_challenge: self.code_challenge.clone(),
            code_challenge_method: self.code_challenge_method.clone(),
            resource: self.resource.clone(),
        }
    }
}

pub async fn consent(State(state): State<AppState>, Form(form): Form<ConsentForm>) -> Response {
    let req = form.authorize_request();

    if form.action != "accept" {
        return match state.auth.deny_consent(&req) {
            Ok(url) => Redirect::to(&url).into_response(),
            Err(e) => error_page(&e),
        };
    }

    let Some(tenant_id) = tenant_id_from_resource(req.resource.as_deref()) else {
        return error_page(&Error::protocol(
            ErrorCode::InvalidParams,
            "resource does not identify a tenant",
        ));
    };

    match state.auth.complete_consent(&req, tenant_id, &form.user_id).await {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => error_page(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct TokenForm {
    grant_type: String,
    code: Option<String>,
    client_id: String,
    redirect_uri: Option<String>,
    code_verifier: Option<String>,
    refresh_token: Option<String>,
    resource: Option<String>,
}

pub async fn token(State(state): State<AppState>, Form(form): Form<TokenForm>) -> Response {
    let result = match form.grant_type.as_str() {
        "authorization_code" => {
            let (Some(code), Some(redirect_uri), Some(code_verifier)) =
                (form.code, form.redirect_uri, form.code_verifier)
            else {
                return error_page(&Error::protocol(
                    ErrorCode::InvalidParams,
                    "code, redirect_uri, and code_verifier are required",
                ));
            };
            state
                .auth
                .token_from_code(
                    AuthorizationCodeGrant {
                        code,
                        client_id: form.client_id,
                        redirect_uri,
                        code_verifier,
                        resource: form.resource,
                    },
                    None,
                )
                .await
        }
        "refresh_token" => {
            let Some(refresh_token) = form.refresh_token else {
                return error_page(&Error::protocol(
                    ErrorCode::InvalidParams,
                    "refresh_token is required",
                ));
            };
            state
                .auth
                .token_from_refresh(
                    RefreshTokenGrant {
                        refresh_token,
                        client_id: form.client_id,
                        resource: form.resource,
                    },
                    None,
                )
                .await
        }
        other => {
            return error_page(&Error::protocol(
                ErrorCode::InvalidParams,
                format!("unsupported grant_type '{other}'"),
            ))
        }
    };

    match result {
        Ok(response) => Json(response).into_response(),
        Err(e) => error_page(&e),
    }
}

#[derive(Debug, Deserialize)]
pub struct RevokeForm {
    token: String,
}

pub async fn revoke(State(state): State<AppState>, Form(form): Form<RevokeForm>) -> Response {
    match state.auth.revoke(&form.token).await {
        Ok(()) => Json(json!({})).into_response(),
        Err(e) => error_page(&e),
    }
}

pub async fn register(State(state): State<AppState>, Json(req): Json<RegisterClientRequest>) -> Response {
    match state.auth.register_client(req).await {
        Ok(client) => Json(client).into_response(),
        Err(e) => error_page(&e),
    }
}

fn tenant_id_from_resource(resource: Option<&str>) -> Option<Uuid> {
    let resource = resource?;
    let segment = resource.rsplit('/').next()?;
    Uuid::parse_str(segment).ok()
}

fn error_page(error: &Error) -> Response {
    let status = match error.code() {
        ErrorCode::AuthRequired => axum::http::StatusCode::UNAUTHORIZED,
        _ => axum::http::StatusCode::BAD_REQUEST,
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

fn login_form_html(req: &AuthorizeRequest) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><body>
<h1>Sign in</h1>
<form method="post" action="/oauth/verify">
  <input type="email" name="email" placeholder="Email" required>
  <input type="password" name="password" placeholder="Password" required>
  {hidden}
  <button type="submit">Sign in</button>
</form>
</body></html>"#,
        hidden = hidden_fields(req),
    )
}

fn consent_form_html(req: &AuthorizeRequest, user_id: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><body>
<h1>Authorize this application?</h1>
<p>Requested scope: {scope}</p>
<form method="post" action="/oauth/consent">
  <input type="hidden" name="user_id" value="{user_id}">
  {hidden}
  <button type="submit" name="action" value="accept">Allow</button>
  <button type="submit" name="action" value="deny">Deny</button>
</form>
</body></html>"#,
        scope = req.scope,
        user_id = user_id,
        hidden = hidden_fields(req),
    )
}

fn hidden_fields(req: &AuthorizeRequest) -> String {
    let mut fields = vec![
        ("response_type", req.response_type.clone()),
        ("client_id", req.client_id.clone()),
        ("redirect_uri", req.redirect_uri.clone()),
        ("scope", req.scope.clone()),
        ("state", req.state.clone()),
        ("code_challenge", req.code_challenge.clone()),
        ("code_challenge_method", req.code_challenge_method.clone()),
    ];
    if let Some(resource) = &req.resource {
        fields.push(("resource", resource.clone()));
    }
    fields
        .into_iter()
        .map(|(name, value)| format!(r#"<input type="hidden" name="{name}" value="{value}">"#))
        .collect::<Vec<_>>()
        .join("\n  ")
}
