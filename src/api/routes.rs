use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::state::AppState;

use super::handlers::{delete_url, get_stats, health_check, list_clicks, list_urls, shorten_url};
use super::static_files::{serve_favicon, serve_index};

pub fn create_api_router(state: Arc<AppState>) -> Router {
    let dashboard_routes = Router::new()
        .route("/api/urls", get(list_urls))
        .route("/api/urls/{code}/clicks", get(list_clicks))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/", get(serve_index))
        .route("/favicon.ico", get(serve_favicon))
        .route("/health", get(health_check))
        .route("/shorten", post(shorten_url))
        .route("/stats/{code}", get(get_stats))
        .route("/delete/{id}", post(delete_url))
        .merge(dashboard_routes)
        .with_state(state)
}
