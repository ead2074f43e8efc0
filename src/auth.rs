//! Bearer-token authorization guard for protected routes.
//!
//! Every protected route names the scopes it requires; the guard
//! verifies the presented access token and checks that its granted
//! scopes cover the requirement. All failures collapse to a bare 403
//! so a probing caller learns nothing about why it was refused.

use crate::scope::ScopeSet;
use crate::state::AppState;
use crate::token::{TokenClaims, TokenKind};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use log::debug;

/// Cookie consulted when no Authorization header is present; lets the
/// interactive consent page reuse a session token.
pub const AUTH_COOKIE: &str = "homegate_auth";

/// Extracts the bearer token from the Authorization header, falling
/// back to the auth cookie.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ").map(str::trim) {
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
        return None;
    }
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Verifies the request's access token against the required scopes.
///
/// The granted scopes are the token's own; a token issued without a
/// client falls back to the user's currently configured scopes when its
/// claim carries none.
pub fn verify_request(
    state: &AppState,
    headers: &HeaderMap,
    required: &ScopeSet,
) -> Result<TokenClaims, StatusCode> {
    let token = bearer_token(headers).ok_or(StatusCode::FORBIDDEN)?;
    let claims = state.codec.parse(&token).map_err(|_| {
        debug!("rejected unverifiable access token");
        StatusCode::FORBIDDEN
    })?;
    if claims.kind != TokenKind::Access {
        return Err(StatusCode::FORBIDDEN);
    }

    let granted = if claims.scope.is_empty() && claims.client_id.is_none() {
        claims
            .user_name
            .as_deref()
            .and_then(|name| state.credentials.lookup_user(name))
            .map(|user| user.scope.clone())
            .unwrap_or_default()
    } else {
        claims.scope.clone()
    };

    if !granted.test(required, true) {
        debug!("access token lacks required scopes");
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(claims)
}

/// Verified claims of the request's access token, attached as a request
/// extension by [`require_scopes`].
#[derive(Debug, Clone)]
pub struct VerifiedClaims(pub TokenClaims);

impl<S: Send + Sync> FromRequestParts<S> for VerifiedClaims {
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedClaims>()
            .cloned()
            .ok_or(StatusCode::FORBIDDEN)
    }
}

/// Middleware form of the guard; its state carries the scope
/// requirement alongside the application state.
pub async fn require_scopes(
    State((state, required)): State<(AppState, ScopeSet)>,
    mut req: Request,
    next: Next,
) -> Response {
    match verify_request(&state, req.headers(), &required) {
        Ok(claims) => {
            req.extensions_mut().insert(VerifiedClaims(claims));
            next.run(req).await
        }
        Err(status) => status.into_response(),
    }
}

/// Wraps a handler in the guard. The guard sits inside the route
/// pipeline, so an OPTIONS preflight never reaches it.
pub fn scope_guard(
    state: &AppState,
    required: ScopeSet,
    handler: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    handler.layer(middleware::from_fn_with_state(
        (state.clone(), required),
        require_scopes,
    ))
}
