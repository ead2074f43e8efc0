//! Per-route middleware pipeline.
//!
//! Every mounted route passes its requests through the same fixed stage
//! order: body limit, rate limit, method filter, origin check, header
//! injection, credentials flag, OPTIONS short circuit, handler. Stages
//! whose descriptor field is absent or zero are skipped entirely.

use crate::routes::rate::TokenBucket;
use crate::routes::{OriginPolicy, RouteDescriptor};
use axum::extract::{DefaultBodyLimit, Request};
use axum::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, ORIGIN, VARY,
};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::MethodRouter;
use axum::Router;
use log::debug;
use std::sync::Arc;

/// Mounts a handler at the descriptor's path, wrapped in the pipeline.
///
/// The handler is registered for any method; the pipeline's method
/// filter is the single source of truth for what is allowed.
pub fn mount<S>(router: Router<S>, descriptor: &RouteDescriptor, handler: MethodRouter<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route(&descriptor.path, apply(descriptor, handler))
}

/// Wraps a method router in the pipeline stages.
///
/// Layers are attached innermost first; the last layer added runs first
/// on the way in, which yields the body-limit-outermost order.
pub fn apply<S>(descriptor: &RouteDescriptor, handler: MethodRouter<S>) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    let mut handler = handler.layer(middleware::from_fn(options_short_circuit));

    if descriptor.allow_credentials {
        handler = handler.layer(middleware::from_fn(allow_credentials));
    }

    if let Some(headers) = descriptor.headers.as_deref() {
        let value = HeaderValue::from_str(headers).unwrap_or(HeaderValue::from_static(""));
        handler = handler.layer(middleware::from_fn(move |req: Request, next: Next| {
            let value = value.clone();
            async move {
                let mut response = next.run(req).await;
                response
                    .headers_mut()
                    .insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
                response
            }
        }));
    }

    if !matches!(descriptor.origins, OriginPolicy::None) {
        let origins = Arc::new(descriptor.origins.clone());
        handler = handler.layer(middleware::from_fn(move |req: Request, next: Next| {
            let origins = origins.clone();
            async move { check_origin(origins, req, next).await }
        }));
    }

    if !descriptor.methods.is_empty() {
        let methods = Arc::new(descriptor.methods.clone());
        handler = handler.layer(middleware::from_fn(move |req: Request, next: Next| {
            let methods = methods.clone();
            async move { filter_methods(methods, req, next).await }
        }));
    }

    if descriptor.rate_limit > 0.0 {
        let bucket = Arc::new(TokenBucket::new(descriptor.rate_limit, descriptor.rate_burst));
        let path = descriptor.path.clone();
        handler = handler.layer(middleware::from_fn(move |req: Request, next: Next| {
            let bucket = bucket.clone();
            let path = path.clone();
            async move {
                if !bucket.try_consume() {
                    debug!("rate limit exceeded on {path}");
                    return StatusCode::TOO_MANY_REQUESTS.into_response();
                }
                next.run(req).await
            }
        }));
    }

    if descriptor.max_body_size > 0 {
        handler = handler.layer(DefaultBodyLimit::max(descriptor.max_body_size));
    }

    handler
}

/// Answers preflight and probe OPTIONS requests without invoking the
/// handler. The outer stages still decorate the response.
async fn options_short_circuit(req: Request, next: Next) -> Response {
    if req.method() == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    next.run(req).await
}

async fn allow_credentials(req: Request, next: Next) -> Response {
    let mut response = next.run(req).await;
    response.headers_mut().insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    response
}

/// Rejects disallowed methods with 405 and an Allow header; on the way
/// out advertises the allowed set for CORS clients.
async fn filter_methods(methods: Arc<Vec<Method>>, req: Request, next: Next) -> Response {
    let joined = methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    let joined = HeaderValue::from_str(&joined).unwrap_or(HeaderValue::from_static(""));

    if !methods.contains(req.method()) {
        let mut response = StatusCode::METHOD_NOT_ALLOWED.into_response();
        response.headers_mut().insert(ALLOW, joined);
        return response;
    }

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_METHODS, joined);
    response
}

/// Echoes the request origin back when the policy allows it; otherwise
/// the response simply carries no allow-origin header.
async fn check_origin(origins: Arc<OriginPolicy>, req: Request, next: Next) -> Response {
    let origin = req
        .headers()
        .get(ORIGIN)
        .filter(|value| value.to_str().map(|o| origins.allows(o)).unwrap_or(false))
        .cloned();

    let mut response = next.run(req).await;
    if let Some(origin) = origin {
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    response
        .headers_mut()
        .insert(VARY, HeaderValue::from_static("Origin"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{RouteId, RouteRegistry};
    use axum::body::Body;
    use axum::routing::any;
    use tower::ServiceExt;

    async fn handler(body: String) -> String {
        format!("echo:{body}")
    }

    fn descriptor() -> RouteDescriptor {
        RouteDescriptor {
            id: RouteId::OAuthToken,
            path: "/token".to_string(),
            rate_limit: 0.0,
            rate_burst: 0,
            max_body_size: 0,
            methods: vec![Method::GET, Method::POST, Method::OPTIONS],
            origins: OriginPolicy::None,
            headers: None,
            allow_credentials: false,
        }
    }

    fn app(descriptor: &RouteDescriptor) -> Router {
        mount(Router::new(), descriptor, any(handler))
    }

    fn request(method: Method, path: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn passes_allowed_methods_through() {
        let response = app(&descriptor())
            .oneshot(request(Method::POST, "/token"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, OPTIONS"
        );
    }

    #[tokio::test]
    async fn rejects_disallowed_method_with_allow_header() {
        let response = app(&descriptor())
            .oneshot(request(Method::DELETE, "/token"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, POST, OPTIONS");
    }

    #[tokio::test]
    async fn options_never_reaches_the_handler() {
        let mut descriptor = descriptor();
        descriptor.allow_credentials = true;
        descriptor.headers = Some("Authorization".to_string());

        let response = app(&descriptor)
            .oneshot(request(Method::OPTIONS, "/token"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        // outer stages still decorate the short-circuited response
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_HEADERS],
            "Authorization"
        );
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, OPTIONS"
        );
    }

    #[tokio::test]
    async fn rate_limit_admits_burst_then_rejects() {
        let mut descriptor = descriptor();
        descriptor.rate_limit = 0.001;
        descriptor.rate_burst = 2;
        let app = app(&descriptor);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(request(Method::GET, "/token"))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app
            .oneshot(request(Method::GET, "/token"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut descriptor = descriptor();
        descriptor.max_body_size = 16;
        let app = app(&descriptor);

        let small = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .body(Body::from("ok"))
            .unwrap();
        assert_eq!(app.clone().oneshot(small).await.unwrap().status(), StatusCode::OK);

        let big = Request::builder()
            .method(Method::POST)
            .uri("/token")
            .body(Body::from("x".repeat(64)))
            .unwrap();
        assert_eq!(
            app.oneshot(big).await.unwrap().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[tokio::test]
    async fn origin_is_echoed_only_when_allowed() {
        let mut descriptor = descriptor();
        descriptor.origins = OriginPolicy::Patterns {
            includes: vec![regex::Regex::new("^https://app\\.example\\.com$").unwrap()],
            excludes: vec![],
        };
        let app = app(&descriptor);

        let mut allowed = request(Method::GET, "/token");
        allowed
            .headers_mut()
            .insert(ORIGIN, HeaderValue::from_static("https://app.example.com"));
        let response = app.clone().oneshot(allowed).await.unwrap();
        assert_eq!(
            response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
        assert_eq!(response.headers()[VARY], "Origin");

        let mut denied = request(Method::GET, "/token");
        denied
            .headers_mut()
            .insert(ORIGIN, HeaderValue::from_static("https://evil.example.com"));
        let response = app.oneshot(denied).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!response.headers().contains_key(ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn catalogue_defaults_mount_cleanly() {
        let registry = RouteRegistry::default();
        let response = app(registry.descriptor(RouteId::OAuthToken))
            .oneshot(request(Method::GET, "/token"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
