use axum::{http::StatusCode, Router};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::config::Config;
use crate::redirect;
use crate::state::AppState;
use crate::storage::Storage;

/// Build the full service: JSON API, pages and the redirect route on one router.
pub fn create_app(storage: Arc<dyn Storage>, config: Arc<Config>) -> Router {
    let timeout = Duration::from_secs(config.request_timeout_secs);
    let state = Arc::new(AppState::new(storage, config));

    api::routes::create_api_router(Arc::clone(&state))
        .merge(redirect::routes::create_redirect_router(state))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http())
}
