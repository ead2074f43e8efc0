//! Token endpoint grant flows and the interactive authorization page.

use crate::api::oauth::models::{
    AuthorizeParams, ConsentForm, GrantError, TokenRequest, TokenResponse,
};
use crate::credentials::{ClientInfo, ClientOptions};
use crate::scope::ScopeSet;
use crate::state::AppState;
use crate::token::TokenKind;
use axum::extract::{Form, Query, State};
use axum::http::header::{HeaderValue, AUTHORIZATION, LOCATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{debug, info, warn};
use url::Url;

/// POST (or GET) /token. Dispatches on `grant_type`.
pub async fn token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    let result = match request.grant_type.as_deref() {
        Some("authorization_code") => authorization_code_grant(&state, &request, &headers),
        Some("client_credentials") => client_credentials_grant(&state, &request, &headers),
        Some("refresh_token") => refresh_token_grant(&state, &request, &headers),
        Some("user_credentials") => user_credentials_grant(&state, &request, &headers),
        Some(other) => {
            debug!("unsupported grant type '{other}'");
            Err(GrantError::UnsupportedGrantType)
        }
        None => Err(GrantError::InvalidRequest),
    };
    match result {
        Ok(response) => Json(response).into_response(),
        Err(error) => {
            debug!("token request refused: {error}");
            error.into_response()
        }
    }
}

/// Exchanges an authorization code for an access token, plus a refresh
/// token when the client is allowed them.
fn authorization_code_grant(
    state: &AppState,
    request: &TokenRequest,
    headers: &HeaderMap,
) -> Result<TokenResponse, GrantError> {
    let code = non_empty(&request.code).ok_or(GrantError::InvalidRequest)?;
    let redirect_uri = non_empty(&request.redirect_uri).ok_or(GrantError::InvalidRequest)?;

    let client = authenticate_client(state, request, headers)?;
    if !client.options.contains(ClientOptions::AUTHORIZATION_CODE) {
        return Err(GrantError::UnauthorizedClient);
    }
    if !client.matches_redirect(redirect_uri) {
        return Err(GrantError::InvalidGrant);
    }

    let claims = state.codec.parse(code).map_err(|_| GrantError::InvalidGrant)?;
    if claims.kind != TokenKind::Code || claims.client_id.as_deref() != Some(client.id.as_str()) {
        return Err(GrantError::InvalidGrant);
    }

    info!(
        "authorization code exchanged by client '{}' for user '{}'",
        client.id,
        claims.user_name.as_deref().unwrap_or("?")
    );
    issue_pair(state, client, claims.user_name.as_deref(), &claims.scope)
}

/// Issues a token to the client itself; the requested scope must be a
/// non-empty subset of the client's registered scope.
fn client_credentials_grant(
    state: &AppState,
    request: &TokenRequest,
    headers: &HeaderMap,
) -> Result<TokenResponse, GrantError> {
    let client = authenticate_client(state, request, headers)?;
    if !client.options.contains(ClientOptions::CLIENT_CREDENTIALS) {
        return Err(GrantError::UnauthorizedClient);
    }

    let requested = parse_scope(&request.scope)?;
    if !client.scope.test(&requested, false) {
        return Err(GrantError::InvalidScope);
    }

    info!("client credentials grant for '{}'", client.id);
    issue_pair(state, client, None, &requested)
}

/// Rolls a refresh token into a fresh access/refresh pair. A supplied
/// scope must match the original grant exactly.
fn refresh_token_grant(
    state: &AppState,
    request: &TokenRequest,
    headers: &HeaderMap,
) -> Result<TokenResponse, GrantError> {
    let client = authenticate_client(state, request, headers)?;
    if !client.options.contains(ClientOptions::REFRESH_TOKEN) {
        return Err(GrantError::UnauthorizedClient);
    }

    let token = non_empty(&request.refresh_token).ok_or(GrantError::InvalidRequest)?;
    let claims = state.codec.parse(token).map_err(|_| GrantError::InvalidGrant)?;
    if claims.kind != TokenKind::Refresh || claims.client_id.as_deref() != Some(client.id.as_str())
    {
        return Err(GrantError::InvalidGrant);
    }

    let scope = match non_empty(&request.scope) {
        None => claims.scope.clone(),
        Some(text) => {
            let requested = ScopeSet::parse(text).map_err(|_| GrantError::InvalidScope)?;
            if !client.scope.test(&requested, false) || !requested.same(&claims.scope) {
                return Err(GrantError::InvalidScope);
            }
            requested
        }
    };

    info!("refresh token rolled for client '{}'", client.id);
    issue_pair(state, client, claims.user_name.as_deref(), &scope)
}

/// Resource-owner grant. Issues an access token bound to the user
/// alone; never a refresh token. An empty requested scope is permitted
/// and stays empty in the claim, where the guard resolves it against
/// the user record at verification time.
fn user_credentials_grant(
    state: &AppState,
    request: &TokenRequest,
    headers: &HeaderMap,
) -> Result<TokenResponse, GrantError> {
    let (name, password) = match (non_empty(&request.user), non_empty(&request.password)) {
        (Some(name), Some(password)) => (name.to_string(), password.to_string()),
        _ => basic_credentials(headers).ok_or(GrantError::InvalidRequest)?,
    };
    let user = state
        .credentials
        .verify_user(&name, &password)
        .ok_or(GrantError::InvalidUser)?;

    let requested = parse_scope(&request.scope)?;
    if !user.scope.test(&requested, true) {
        return Err(GrantError::InvalidScope);
    }

    info!("user credentials grant for '{}'", user.name);
    let access = sign(state, TokenKind::Access, None, Some(&user.name), requested.clone())?;
    Ok(TokenResponse::new(
        access,
        state.codec.access_lifetime_secs(),
        None,
        requested.to_string(),
    ))
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_scope(field: &Option<String>) -> Result<ScopeSet, GrantError> {
    match non_empty(field) {
        Some(text) => ScopeSet::parse(text).map_err(|_| GrantError::InvalidScope),
        None => Ok(ScopeSet::new()),
    }
}

/// Client id/secret from the form fields, else from HTTP basic auth.
fn authenticate_client<'a>(
    state: &'a AppState,
    request: &TokenRequest,
    headers: &HeaderMap,
) -> Result<&'a ClientInfo, GrantError> {
    let (id, secret) = match (non_empty(&request.client_id), non_empty(&request.client_secret)) {
        (Some(id), Some(secret)) => (id.to_string(), secret.to_string()),
        _ => basic_credentials(headers).ok_or(GrantError::InvalidRequest)?,
    };
    let client = state
        .credentials
        .lookup_client(&id)
        .ok_or(GrantError::InvalidClient)?;
    if client.secret != secret {
        warn!("client '{id}' presented a wrong secret");
        return Err(GrantError::InvalidClient);
    }
    Ok(client)
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(BASE64.decode(encoded.trim()).ok()?).ok()?;
    let (name, secret) = decoded.split_once(':')?;
    Some((name.to_string(), secret.to_string()))
}

fn sign(
    state: &AppState,
    kind: TokenKind,
    client_id: Option<&str>,
    user_name: Option<&str>,
    scope: ScopeSet,
) -> Result<String, GrantError> {
    state
        .codec
        .issue(kind, client_id, user_name, scope)
        .map_err(|e| {
            warn!("token signing failed: {e}");
            GrantError::Server
        })
}

/// Access token plus a refresh token when the client has the option.
fn issue_pair(
    state: &AppState,
    client: &ClientInfo,
    user_name: Option<&str>,
    scope: &ScopeSet,
) -> Result<TokenResponse, GrantError> {
    let access = sign(state, TokenKind::Access, Some(&client.id), user_name, scope.clone())?;
    let refresh = if client.options.contains(ClientOptions::REFRESH_TOKEN) {
        Some(sign(state, TokenKind::Refresh, Some(&client.id), user_name, scope.clone())?)
    } else {
        None
    };
    Ok(TokenResponse::new(
        access,
        state.codec.access_lifetime_secs(),
        refresh,
        scope.to_string(),
    ))
}

/// GET /authorize. Validates the request and renders the consent form.
pub async fn authorize_page(
    State(state): State<AppState>,
    Query(params): Query<AuthorizeParams>,
) -> Response {
    match validate_authorize(&state, &params) {
        Ok((client, scope)) => consent_page(&state, &client, &scope, None).into_response(),
        Err(response) => response,
    }
}

/// POST /authorize. Handles the consent form submission; the original
/// authorization parameters ride along in the query string.
pub async fn authorize_submit(
    State(state): State<AppState>,
    Query(params): Query<AuthorizeParams>,
    Form(form): Form<ConsentForm>,
) -> Response {
    let (client, scope) = match validate_authorize(&state, &params) {
        Ok(validated) => validated,
        Err(response) => return response,
    };
    // present and matching, or validate_authorize would have refused
    let redirect_uri = params.redirect_uri.as_deref().unwrap_or_default();
    let return_state = params.state.as_deref();

    if form.action.as_deref() != Some("allow") {
        info!("authorization denied by the user for client '{}'", client.id);
        return redirect_error(
            redirect_uri,
            "access_denied",
            "the user denied the request",
            return_state,
        );
    }

    let verified = match (non_empty(&form.username), non_empty(&form.password)) {
        (Some(name), Some(password)) => state.credentials.verify_user(name, password),
        _ => None,
    };
    let Some(user) = verified else {
        let message = state
            .config
            .consent
            .invalid_credentials
            .as_deref()
            .unwrap_or("Invalid user name or password");
        return consent_page(&state, &client, &scope, Some(message)).into_response();
    };

    if !user.scope.test(&scope, false) {
        return redirect_error(
            redirect_uri,
            "access_denied",
            "the requested scope is not available to this user",
            return_state,
        );
    }

    let code = match sign(&state, TokenKind::Code, Some(&client.id), Some(&user.name), scope.clone())
    {
        Ok(code) => code,
        Err(error) => return error.into_response(),
    };
    info!(
        "authorization code issued for user '{}' to client '{}'",
        user.name, client.id
    );

    let scope_text = scope.to_string();
    let mut pairs = vec![
        ("code", code.as_str()),
        ("client_id", client.id.as_str()),
        ("scope", scope_text.as_str()),
    ];
    if let Some(return_state) = return_state {
        pairs.push(("state", return_state));
    }
    redirect_with(redirect_uri, &pairs)
}

/// Validates the authorization query. Any failure is a plain 400 page;
/// the caller is never redirected to an unvalidated URI.
fn validate_authorize(
    state: &AppState,
    params: &AuthorizeParams,
) -> Result<(ClientInfo, ScopeSet), Response> {
    let refuse = || {
        debug!("refused malformed authorization request");
        (StatusCode::BAD_REQUEST, "invalid authorization request").into_response()
    };

    if params.response_type.as_deref() != Some("code") {
        return Err(refuse());
    }
    let client = non_empty(&params.client_id)
        .and_then(|id| state.credentials.lookup_client(id))
        .ok_or_else(refuse)?;
    if !client.options.contains(ClientOptions::AUTHORIZATION_CODE) {
        return Err(refuse());
    }
    let redirect_uri = non_empty(&params.redirect_uri).ok_or_else(refuse)?;
    if !client.matches_redirect(redirect_uri) {
        return Err(refuse());
    }
    non_empty(&params.state).ok_or_else(refuse)?;

    // a non-empty subset of the client's registered scope
    let requested = parse_scope(&params.scope).map_err(|_| refuse())?;
    if !client.scope.test(&requested, false) {
        return Err(refuse());
    }
    Ok((client.clone(), requested))
}

/// Renders the consent form. Only operator-configured texts and the
/// registered client name are interpolated, never caller input.
fn consent_page(
    state: &AppState,
    client: &ClientInfo,
    scope: &ScopeSet,
    notice: Option<&str>,
) -> Html<String> {
    let title = state.config.consent.title.as_deref().unwrap_or("Authorization");
    let header = state
        .config
        .consent
        .header
        .as_deref()
        .unwrap_or("Sign in to continue");
    let scopes: String = scope
        .iter()
        .map(|s| format!("<li>{}</li>", state.config.scope_display_name(s.as_str())))
        .collect();
    let notice = notice
        .map(|text| format!(r#"<p class="notice">{text}</p>"#))
        .unwrap_or_default();

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<h1>{header}</h1>
<p><strong>{client_name}</strong> requests access to:</p>
<ul>{scopes}</ul>
{notice}
<form method="post" action="">
  <label>User name <input type="text" name="username"></label>
  <label>Password <input type="password" name="password"></label>
  <button type="submit" name="action" value="allow">Allow</button>
  <button type="submit" name="action" value="deny">Deny</button>
</form>
</body>
</html>"#,
        client_name = client.name,
    ))
}

fn redirect_error(redirect_uri: &str, error: &str, description: &str, state: Option<&str>) -> Response {
    let mut pairs = vec![("error", error), ("error_description", description)];
    if let Some(state) = state {
        pairs.push(("state", state));
    }
    redirect_with(redirect_uri, &pairs)
}

/// 302 back to the registered redirect URI with the given pairs
/// appended to its query.
fn redirect_with(redirect_uri: &str, pairs: &[(&str, &str)]) -> Response {
    match Url::parse(redirect_uri) {
        Ok(mut url) => {
            url.query_pairs_mut().extend_pairs(pairs);
            let location =
                HeaderValue::from_str(url.as_str()).unwrap_or(HeaderValue::from_static("/"));
            let mut response = StatusCode::FOUND.into_response();
            response.headers_mut().insert(LOCATION, location);
            response
        }
        Err(e) => {
            warn!("registered redirect URI does not parse: {e}");
            (StatusCode::BAD_REQUEST, "invalid authorization request").into_response()
        }
    }
}
