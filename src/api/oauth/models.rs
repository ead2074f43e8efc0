//! Wire types for the token and authorization endpoints.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

/// Form body of a token-endpoint request. Every field is optional at
/// the wire level; each grant flow checks for the fields it needs.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
    pub code: Option<String>,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Successful token-endpoint response.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "bearer".
    pub token_type: &'static str,
    /// Access-token lifetime in seconds.
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Space-joined granted scopes.
    pub scope: String,
}

impl TokenResponse {
    pub fn new(
        access_token: String,
        expires_in: u64,
        refresh_token: Option<String>,
        scope: String,
    ) -> Self {
        Self {
            access_token,
            token_type: "bearer",
            expires_in,
            refresh_token,
            scope,
        }
    }
}

/// Token-endpoint failures, rendered as `{"error": "<code>"}` bodies
/// with the matching status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GrantError {
    #[error("invalid_request")]
    InvalidRequest,
    #[error("invalid_client")]
    InvalidClient,
    #[error("invalid_grant")]
    InvalidGrant,
    #[error("unauthorized_client")]
    UnauthorizedClient,
    #[error("invalid_scope")]
    InvalidScope,
    #[error("invalid_user")]
    InvalidUser,
    #[error("unsupported_grant_type")]
    UnsupportedGrantType,
    /// Internal failure, e.g. token signing. Deliberately uninformative.
    #[error("server_error")]
    Server,
}

impl GrantError {
    pub fn status(self) -> StatusCode {
        match self {
            GrantError::InvalidClient | GrantError::InvalidUser => StatusCode::UNAUTHORIZED,
            GrantError::Server => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GrantError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Query parameters of an authorization request. Shared by the GET
/// consent page and the POST consent submission.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthorizeParams {
    pub response_type: Option<String>,
    pub client_id: Option<String>,
    pub redirect_uri: Option<String>,
    pub scope: Option<String>,
    pub state: Option<String>,
}

/// Form body of a consent-page submission.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConsentForm {
    pub username: Option<String>,
    pub password: Option<String>,
    /// "allow" grants, anything else denies.
    pub action: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_response_omits_absent_refresh_token() {
        let with = serde_json::to_value(TokenResponse::new(
            "a".into(),
            3600,
            Some("r".into()),
            "yandex-home".into(),
        ))
        .unwrap();
        assert_eq!(with["token_type"], "bearer");
        assert_eq!(with["expires_in"], 3600);
        assert_eq!(with["refresh_token"], "r");
        assert_eq!(with["scope"], "yandex-home");

        let without =
            serde_json::to_value(TokenResponse::new("a".into(), 3600, None, String::new()))
                .unwrap();
        assert!(without.get("refresh_token").is_none());
    }

    #[test]
    fn grant_errors_map_to_oauth_codes() {
        assert_eq!(GrantError::InvalidClient.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GrantError::InvalidUser.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GrantError::InvalidScope.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            GrantError::Server.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(GrantError::UnsupportedGrantType.to_string(), "unsupported_grant_type");
    }
}
