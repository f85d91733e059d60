use axum::{middleware, routing::get, Router};
use std::sync::Arc;

use crate::state::AppState;

use super::handlers::redirect_url;
use super::middleware::redirect_timing;

pub fn create_redirect_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{code}", get(redirect_url))
        .layer(middleware::from_fn(redirect_timing))
        .with_state(state)
}
