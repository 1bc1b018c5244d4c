//! HTTP route handlers.

pub mod files;
pub mod health;
pub mod metrics;
pub mod photo;

use axum::Router;

use crate::state::AppState;

/// Build the application router without outer middleware.
pub fn app(state: AppState) -> Router {
    let photo_routes = photo::router(state.photos().policy());
    let file_routes = files::router(state.files_url());

    Router::new()
        .merge(photo_routes)
        .merge(file_routes)
        .merge(health::router())
        .merge(metrics::router())
        .with_state(state)
}
