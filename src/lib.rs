pub mod codes;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod links;
pub mod middleware;
pub mod models;
pub mod util;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::db::AppState;

/// The full HTTP application: public pages, payment links and admin API.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::public::router())
        .merge(handlers::admin::router())
        .layer(axum::middleware::from_fn(middleware::log_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
