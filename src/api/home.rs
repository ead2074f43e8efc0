//! Yandex-facing endpoints mounted behind the route pipeline.
//!
//! The gateway owns authorization and traffic control; the device and
//! dialogue backends live in separate services, so the payloads here
//! are the minimal valid shapes.

use crate::auth::{scope_guard, VerifiedClaims};
use crate::routes::{pipeline, RouteId};
use crate::scope::{Scope, ScopeSet};
use crate::state::AppState;
use axum::http::StatusCode;
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::{json, Value};

pub(super) fn router(state: &AppState) -> Router<AppState> {
    let home: ScopeSet = [Scope::YandexHome].into_iter().collect();
    let dialogs: ScopeSet = [Scope::YandexDialogs].into_iter().collect();
    let routes = &state.routes;

    let mut router = Router::new();
    router = pipeline::mount(router, routes.descriptor(RouteId::HomeHealth), get(health));
    router = pipeline::mount(
        router,
        routes.descriptor(RouteId::HomeUnlink),
        scope_guard(state, home.clone(), any(unlink)),
    );
    router = pipeline::mount(
        router,
        routes.descriptor(RouteId::HomeDevices),
        scope_guard(state, home.clone(), any(devices)),
    );
    router = pipeline::mount(
        router,
        routes.descriptor(RouteId::HomeQuery),
        scope_guard(state, home.clone(), any(query)),
    );
    router = pipeline::mount(
        router,
        routes.descriptor(RouteId::HomeAction),
        scope_guard(state, home, any(action)),
    );
    pipeline::mount(
        router,
        routes.descriptor(RouteId::DialogsTales),
        scope_guard(state, dialogs, any(tales)),
    )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn unlink() -> Json<Value> {
    Json(json!({}))
}

async fn devices(VerifiedClaims(claims): VerifiedClaims) -> Json<Value> {
    Json(json!({
        "payload": {
            "user_id": claims.user_name.unwrap_or_default(),
            "devices": [],
        }
    }))
}

async fn query() -> Json<Value> {
    Json(json!({ "payload": { "devices": [] } }))
}

async fn action() -> Json<Value> {
    Json(json!({ "payload": { "devices": [] } }))
}

// the dialogue backend is a separate service and is not attached here
async fn tales() -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}
