//! Shared fixtures for router-level tests.

use crate::config::{ClientConfig, GatewayConfig, UserConfig};
use crate::state::AppState;
use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

/// A fully wired application over an in-memory configuration.
pub struct TestFixture {
    pub state: AppState,
}

impl TestFixture {
    pub fn new() -> Self {
        let state = AppState::new(test_config()).expect("test configuration must be valid");
        Self { state }
    }

    /// A fresh router; rate-limit buckets do not carry over between calls.
    pub fn app(&self) -> Router {
        crate::create_app(self.state.clone())
    }

    pub async fn get(&self, path: &str) -> Response {
        self.app()
            .oneshot(Request::get(path).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn post_form(&self, path: &str, body: &str) -> Response {
        self.app()
            .oneshot(
                Request::post(path)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn post_form_with_auth(&self, path: &str, body: &str, authorization: &str) -> Response {
        self.app()
            .oneshot(
                Request::post(path)
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .header(header::AUTHORIZATION, authorization)
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

/// A deterministic configuration with one user and three clients
/// covering every grant-option combination the tests need.
pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.authorization.token_secret = Some("test-secret".to_string());

    config.credentials.users.push(UserConfig {
        name: "alice".to_string(),
        password: "wonderland".to_string(),
        scope: "yandex-home yandex-dialogs".to_string(),
    });
    config.credentials.clients.push(ClientConfig {
        id: "web".to_string(),
        secret: "web-secret".to_string(),
        options: "clientCredentials".to_string(),
        scope: "yandex-home".to_string(),
        ..ClientConfig::default()
    });
    config.credentials.clients.push(ClientConfig {
        id: "mobile".to_string(),
        secret: "mobile-secret".to_string(),
        redirect_uri: vec!["https://a/cb".to_string()],
        options: "authorizationCode, refreshToken".to_string(),
        scope: "yandex-home yandex-dialogs".to_string(),
        ..ClientConfig::default()
    });
    config.credentials.clients.push(ClientConfig {
        id: "svc".to_string(),
        secret: "svc-secret".to_string(),
        options: "clientCredentials, refreshToken".to_string(),
        scope: "yandex-home".to_string(),
        ..ClientConfig::default()
    });

    config
}

pub async fn read_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn read_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&read_text(response).await).unwrap()
}
