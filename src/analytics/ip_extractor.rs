//! Client IP extraction from HTTP headers with trust validation
//!
//! - `none` mode always uses the socket peer address
//! - `cloudflare` mode reads CF-Connecting-IP
//! - `standard` mode reads RFC 7239 Forwarded, then X-Forwarded-For, walking
//!   the proxy chain from the right and skipping trusted hops
//!
//! When a trusted proxy list is configured, forwarding headers are ignored
//! unless the socket peer is itself one of those proxies.

use axum::http::HeaderMap;
use std::net::IpAddr;
use tracing::warn;

use crate::config::{ClickLogConfig, TrustedProxyMode};

/// Extract the client IP address for a request
pub fn extract_client_ip(headers: &HeaderMap, socket_addr: IpAddr, config: &ClickLogConfig) -> IpAddr {
    match config.trusted_proxy_mode {
        TrustedProxyMode::Cloudflare => extract_cloudflare_ip(headers).unwrap_or_else(|| {
            warn!("CF-Connecting-IP header missing in Cloudflare mode, using socket address");
            socket_addr
        }),
        TrustedProxyMode::Standard => {
            if !config.trusted_proxies.is_empty() && !is_trusted(socket_addr, config) {
                return socket_addr;
            }
            extract_standard_ip(headers, config).unwrap_or(socket_addr)
        }
        TrustedProxyMode::None => socket_addr,
    }
}

fn extract_cloudflare_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn extract_standard_ip(headers: &HeaderMap, config: &ClickLogConfig) -> Option<IpAddr> {
    // Prefer RFC 7239 Forwarded header
    let forwarded = forwarded_chain(headers);
    if !forwarded.is_empty() {
        return select_from_chain(&forwarded, config);
    }

    let xff = x_forwarded_for_chain(headers);
    select_from_chain(&xff, config)
}

/// `for=` values of every Forwarded element, left to right
fn forwarded_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    let Some(forwarded) = headers.get("forwarded").and_then(|h| h.to_str().ok()) else {
        return Vec::new();
    };

    forwarded
        .split(',')
        .flat_map(|element| element.split(';'))
        .filter_map(|param| {
            let (key, value) = param.trim().split_once('=')?;
            if key.eq_ignore_ascii_case("for") {
                parse_node(value)
            } else {
                None
            }
        })
        .collect()
}

/// Parse a Forwarded node such as `192.0.2.60`, `"192.0.2.60:8080"` or
/// `"[2001:db8::1]:4711"`
fn parse_node(value: &str) -> Option<IpAddr> {
    let value = value.trim().trim_matches('"');

    if let Some(rest) = value.strip_prefix('[') {
        let (addr, _) = rest.split_once(']')?;
        return addr.parse().ok();
    }

    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(ip);
    }

    // IPv4 with port
    let (addr, _port) = value.rsplit_once(':')?;
    addr.parse().ok()
}

fn x_forwarded_for_chain(headers: &HeaderMap) -> Vec<IpAddr> {
    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|h| h.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .collect()
}

/// Pick the client from a left-to-right proxy chain
fn select_from_chain(ips: &[IpAddr], config: &ClickLogConfig) -> Option<IpAddr> {
    if ips.is_empty() {
        return None;
    }

    // Skip a fixed number of hops from the right
    if let Some(num_trusted) = config.num_trusted_proxies {
        if ips.len() > num_trusted {
            return Some(ips[ips.len() - num_trusted - 1]);
        }
        return ips.first().copied();
    }

    // Rightmost address that is not one of our proxies
    if !config.trusted_proxies.is_empty() {
        return ips
            .iter()
            .rev()
            .find(|ip| !is_trusted(**ip, config))
            .or_else(|| ips.first())
            .copied();
    }

    ips.last().copied()
}

fn is_trusted(ip: IpAddr, config: &ClickLogConfig) -> bool {
    config.trusted_proxies.iter().any(|net| net.contains(&ip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn create_config(mode: TrustedProxyMode) -> ClickLogConfig {
        ClickLogConfig {
            enabled: true,
            trusted_proxy_mode: mode,
            trusted_proxies: vec![],
            num_trusted_proxies: None,
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_extract_client_ip_none_mode() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::None);

        let result = extract_client_ip(&headers, ip("192.168.1.1"), &config);
        assert_eq!(result, ip("192.168.1.1"));
    }

    #[test]
    fn test_extract_cloudflare_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::Cloudflare);

        let result = extract_client_ip(&headers, ip("192.168.1.1"), &config);
        assert_eq!(result, ip("203.0.113.1"));
    }

    #[test]
    fn test_cloudflare_mode_falls_back_to_socket() {
        let config = create_config(TrustedProxyMode::Cloudflare);
        let result = extract_client_ip(&HeaderMap::new(), ip("192.168.1.1"), &config);
        assert_eq!(result, ip("192.168.1.1"));
    }

    #[test]
    fn test_extract_x_forwarded_for_basic() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1"),
        );
        let config = create_config(TrustedProxyMode::Standard);

        let result = extract_client_ip(&headers, ip("192.168.1.1"), &config);
        // Rightmost IP in the absence of trust configuration
        assert_eq!(result, ip("198.51.100.1"));
    }

    #[test]
    fn test_x_forwarded_for_with_hop_count() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1, 10.0.0.2"),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.num_trusted_proxies = Some(2);

        let result = extract_client_ip(&headers, ip("10.0.0.1"), &config);
        assert_eq!(result, ip("203.0.113.1"));
    }

    #[test]
    fn test_x_forwarded_for_skips_trusted_cidrs() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.1, 198.51.100.1, 10.1.2.3"),
        );
        let mut config = create_config(TrustedProxyMode::Standard);
        config.trusted_proxies = vec!["10.0.0.0/8".parse().unwrap()];

        let result = extract_client_ip(&headers, ip("10.0.0.1"), &config);
        assert_eq!(result, ip("198.51.100.1"));
    }

    #[test]
    fn test_untrusted_peer_cannot_spoof_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let mut config = create_config(TrustedProxyMode::Standard);
        config.trusted_proxies = vec!["10.0.0.0/8".parse().unwrap()];

        let result = extract_client_ip(&headers, ip("198.51.100.77"), &config);
        assert_eq!(result, ip("198.51.100.77"));
    }

    #[test]
    fn test_forwarded_header_preferred() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "forwarded",
            HeaderValue::from_static("for=\"[2001:db8::1]:4711\";proto=https, for=192.0.2.60:8080"),
        );
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let config = create_config(TrustedProxyMode::Standard);

        let result = extract_client_ip(&headers, ip("10.0.0.1"), &config);
        assert_eq!(result, ip("192.0.2.60"));

        assert_eq!(forwarded_chain(&headers), vec![ip("2001:db8::1"), ip("192.0.2.60")]);
    }

    #[test]
    fn test_parse_node_variants() {
        assert_eq!(parse_node("192.0.2.60"), Some(ip("192.0.2.60")));
        assert_eq!(parse_node("\"192.0.2.60:80\""), Some(ip("192.0.2.60")));
        assert_eq!(parse_node("\"[::1]\""), Some(ip("::1")));
        assert_eq!(parse_node("unknown"), None);
        assert_eq!(parse_node("_hidden"), None);
    }
}
