mod api;
pub mod auth;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod routes;
pub mod scope;
pub mod state;
pub mod token;
#[cfg(test)]
mod test_utils;

use crate::state::AppState;
use axum::Router;

/// Create a new application instance with a given state
pub fn create_app(state: AppState) -> Router {
    Router::new().merge(api::router(&state)).with_state(state)
}
