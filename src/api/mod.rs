pub(crate) mod home;
pub(crate) mod oauth;

use crate::state::AppState;
use axum::Router;

/// Combines all API routes into a single router.
pub(super) fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(oauth::router(state))
        .merge(home::router(state))
}
