//! Visitor metadata captured for click events
//!
//! Capture is best effort: every field is optional and bounded in length,
//! and nothing here can fail a redirect.

pub mod ip_extractor;

pub use ip_extractor::extract_client_ip;

use axum::http::{header, HeaderMap};
use std::net::IpAddr;

use crate::config::ClickLogConfig;
use crate::models::NewClick;

/// Build the click event metadata for one request. `socket_ip` is the
/// connection peer when the server was started with connect info.
pub fn capture_click(
    headers: &HeaderMap,
    socket_ip: Option<IpAddr>,
    config: &ClickLogConfig,
) -> NewClick {
    let client_ip = socket_ip.map(|ip| extract_client_ip(headers, ip, config));

    NewClick::new(
        client_ip.map(|ip| ip.to_string()),
        header_str(headers, header::USER_AGENT),
        header_str(headers, header::REFERER),
    )
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
