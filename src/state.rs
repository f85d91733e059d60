use std::net::IpAddr;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use tracing::warn;

use crate::config::Config;
use crate::cursor::CursorSigner;
use crate::shortener::Shortener;
use crate::storage::Storage;

/// Shared, read-only state handed to every handler
pub struct AppState {
    pub shortener: Shortener,
    pub cursor_signer: CursorSigner,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, config: Arc<Config>) -> Self {
        Self {
            shortener: Shortener::new(storage, &config.short_code),
            cursor_signer: CursorSigner::new(config.pagination.cursor_hmac_secret.as_deref()),
            config,
        }
    }

    /// Prefix for short URLs: the configured base URL, or one derived from
    /// the request's Host and X-Forwarded-Proto headers.
    pub fn base_url(&self, headers: &HeaderMap) -> String {
        derive_base_url(&self.config, headers)
    }
}

fn derive_base_url(config: &Config, headers: &HeaderMap) -> String {
    if let Some(base) = &config.base_url {
        return base.clone();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| v == "https" || v == "http")
        .unwrap_or_else(|| "http".to_string());

    let host = match headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
        Some(host) => host.to_string(),
        None => {
            // A wildcard listen address is not reachable by clients
            let listen_host = match config.server.host.parse::<IpAddr>() {
                Ok(ip) if ip.is_unspecified() => "localhost",
                _ => config.server.host.as_str(),
            };
            warn!(
                listen_host,
                "request has no Host header and BASE_URL is unset; short URLs may not be reachable"
            );
            format!("{}:{}", listen_host, config.server.port)
        }
    };

    format!("{scheme}://{host}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config_with(base_url: Option<&str>, host: &str) -> Config {
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.base_url = base_url.map(str::to_string);
        config.server.host = host.to_string();
        config
    }

    #[test]
    fn test_configured_base_url_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("evil.example"));

        let config = config_with(Some("https://sho.rt"), "0.0.0.0");
        assert_eq!(derive_base_url(&config, &headers), "https://sho.rt");
    }

    #[test]
    fn test_base_url_from_host_and_forwarded_proto() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("links.example:8443"));
        headers.insert("x-forwarded-proto", HeaderValue::from_static("HTTPS"));

        let config = config_with(None, "0.0.0.0");
        assert_eq!(derive_base_url(&config, &headers), "https://links.example:8443");
    }

    #[test]
    fn test_missing_host_never_yields_wildcard_address() {
        let headers = HeaderMap::new();

        assert_eq!(
            derive_base_url(&config_with(None, "0.0.0.0"), &headers),
            "http://localhost:5000"
        );
        assert_eq!(
            derive_base_url(&config_with(None, "::"), &headers),
            "http://localhost:5000"
        );
        assert_eq!(
            derive_base_url(&config_with(None, "10.0.0.5"), &headers),
            "http://10.0.0.5:5000"
        );
    }
}
