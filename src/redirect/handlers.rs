use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::capture_click;
use crate::api::static_files::render_not_found;
use crate::shortener::ServiceError;
use crate::state::AppState;

/// Redirect to original URL
pub async fn redirect_url(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    request: Request,
) -> Response {
    let click = state.config.clicks.enabled.then(|| {
        let socket_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        capture_click(request.headers(), socket_ip, &state.config.clicks)
    });

    let url = match state.shortener.resolve_and_record(&code, click).await {
        Ok(url) => url,
        Err(ServiceError::NotFound) => return render_not_found(&code),
        Err(err) => {
            tracing::error!(short_code = %code, error = %err, "failed to record click");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    let location = match HeaderValue::from_bytes(url.original_url.as_bytes()) {
        Ok(location) => location,
        Err(_) => {
            tracing::error!(short_code = %code, "stored URL is not a valid Location header");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
        }
    };

    (
        state.config.redirect_status.status_code(),
        [(header::LOCATION, location)],
    )
        .into_response()
}
