use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

/// Response header carrying the time spent resolving a redirect
pub const TIMING_HEADER: HeaderName = HeaderName::from_static("x-tinylink-timing-ms");

/// Stamp redirect responses with the elapsed handling time in milliseconds.
pub async fn redirect_timing(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(request).await;

    if response.status().is_redirection() {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        response
            .headers_mut()
            .insert(TIMING_HEADER, HeaderValue::from(elapsed_ms));
    }

    response
}
