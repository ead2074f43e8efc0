pub mod handlers;
pub mod models;

use crate::routes::{pipeline, RouteId};
use crate::state::AppState;
use axum::routing::{any, get};
use axum::Router;

pub(super) fn router(state: &AppState) -> Router<AppState> {
    let routes = &state.routes;
    let router = pipeline::mount(
        Router::new(),
        routes.descriptor(RouteId::OAuthAuthorize),
        get(handlers::authorize_page).post(handlers::authorize_submit),
    );
    pipeline::mount(
        router,
        routes.descriptor(RouteId::OAuthToken),
        any(handlers::token),
    )
}
