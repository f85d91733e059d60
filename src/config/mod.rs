use anyhow::Context;
use axum::http::StatusCode;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SHORT_CODE_LENGTH: usize = 6;
pub const MAX_SHORT_CODE_LENGTH: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    /// Prefix for generated short URLs. When unset the request's Host header is used.
    pub base_url: Option<String>,
    pub short_code: ShortCodeConfig,
    pub request_timeout_secs: u64,
    pub redirect_status: RedirectMode,
    pub clicks: ClickLogConfig,
    pub pagination: PaginationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortCodeConfig {
    pub length: usize,
    pub max_attempts: u32,
}

impl Default for ShortCodeConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_SHORT_CODE_LENGTH,
            max_attempts: 10,
        }
    }
}

/// Status code used when redirecting a visitor to the stored URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    #[default]
    Found,
    Temporary,
    Permanent,
    MovedPermanently,
}

impl RedirectMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "302" | "found" => Some(Self::Found),
            "307" | "temporary" => Some(Self::Temporary),
            "308" | "permanent" => Some(Self::Permanent),
            "301" | "moved" => Some(Self::MovedPermanently),
            _ => None,
        }
    }

    pub fn status_code(self) -> StatusCode {
        match self {
            Self::Found => StatusCode::FOUND,
            Self::Temporary => StatusCode::TEMPORARY_REDIRECT,
            Self::Permanent => StatusCode::PERMANENT_REDIRECT,
            Self::MovedPermanently => StatusCode::MOVED_PERMANENTLY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket peer address only
    #[default]
    None,
    /// Trust RFC 7239 Forwarded and X-Forwarded-For
    Standard,
    /// Trust CF-Connecting-IP
    Cloudflare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickLogConfig {
    pub enabled: bool,
    pub trusted_proxy_mode: TrustedProxyMode,
    pub trusted_proxies: Vec<IpNet>,
    pub num_trusted_proxies: Option<usize>,
}

impl Default for ClickLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trusted_proxy_mode: TrustedProxyMode::None,
            trusted_proxies: Vec::new(),
            num_trusted_proxies: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Secret for signing listing cursors. A random key is used when unset,
    /// so cursors do not survive restarts.
    pub cursor_hmac_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("DATABASE_BACKEND")
            .unwrap_or_else(|| "sqlite".to_string())
            .to_lowercase()
            .as_str()
        {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            "sqlite" => DatabaseBackend::Sqlite,
            other => {
                tracing::warn!(
                    "Unknown DATABASE_BACKEND '{other}', falling back to 'sqlite'. Supported values: sqlite, postgres"
                );
                DatabaseBackend::Sqlite
            }
        };

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://urls.db?mode=rwc".to_string());

        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?
            .unwrap_or(10)
            .max(1);

        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = lookup("PORT")
            .unwrap_or_else(|| "5000".to_string())
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let base_url = lookup("BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let length = lookup("SHORT_CODE_LENGTH")
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("SHORT_CODE_LENGTH must be an integer")?
            .unwrap_or(DEFAULT_SHORT_CODE_LENGTH);
        if length == 0 || length > MAX_SHORT_CODE_LENGTH {
            anyhow::bail!("SHORT_CODE_LENGTH must be between 1 and {MAX_SHORT_CODE_LENGTH}");
        }

        let max_attempts = lookup("SHORT_CODE_MAX_ATTEMPTS")
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("SHORT_CODE_MAX_ATTEMPTS must be an integer")?
            .unwrap_or(10)
            .max(1);

        let request_timeout_secs = lookup("REQUEST_TIMEOUT_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("REQUEST_TIMEOUT_SECS must be an integer")?
            .unwrap_or(10)
            .max(1);

        let redirect_status = match lookup("REDIRECT_STATUS") {
            Some(raw) => RedirectMode::parse(&raw).with_context(|| {
                format!("Unsupported REDIRECT_STATUS '{raw}'. Supported values: 301, 302, 307, 308")
            })?,
            None => RedirectMode::default(),
        };

        let click_logging = lookup("CLICK_LOGGING")
            .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(true);

        let trusted_proxy_mode = match lookup("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = lookup("TRUSTED_PROXIES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        s.parse::<IpNet>()
                            .with_context(|| format!("Invalid CIDR in TRUSTED_PROXIES: '{s}'"))
                    })
                    .collect::<anyhow::Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let num_trusted_proxies = lookup("NUM_TRUSTED_PROXIES")
            .map(|v| v.parse::<usize>())
            .transpose()
            .context("NUM_TRUSTED_PROXIES must be an integer")?;

        let cursor_hmac_secret = lookup("CURSOR_HMAC_SECRET").filter(|v| !v.is_empty());

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            server: ServerConfig { host, port },
            base_url,
            short_code: ShortCodeConfig {
                length,
                max_attempts,
            },
            request_timeout_secs,
            redirect_status,
            clicks: ClickLogConfig {
                enabled: click_logging,
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
            },
            pagination: PaginationConfig { cursor_hmac_secret },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert_eq!(config.database.url, "sqlite://urls.db?mode=rwc");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.short_code.length, 6);
        assert_eq!(config.short_code.max_attempts, 10);
        assert_eq!(config.redirect_status, RedirectMode::Found);
        assert!(config.clicks.enabled);
        assert!(config.base_url.is_none());
    }

    #[test]
    fn test_postgres_backend_and_base_url() {
        let config = load(&[
            ("DATABASE_BACKEND", "PostgreSQL"),
            ("BASE_URL", "https://sho.rt/"),
            ("PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.database.backend, DatabaseBackend::Postgres);
        assert_eq!(config.base_url.as_deref(), Some("https://sho.rt"));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(load(&[("PORT", "not-a-port")]).is_err());
    }

    #[test]
    fn test_short_code_length_bounds() {
        assert!(load(&[("SHORT_CODE_LENGTH", "0")]).is_err());
        assert!(load(&[("SHORT_CODE_LENGTH", "33")]).is_err());
        assert_eq!(
            load(&[("SHORT_CODE_LENGTH", "8")]).unwrap().short_code.length,
            8
        );
    }

    #[test]
    fn test_redirect_status_parsing() {
        let config = load(&[("REDIRECT_STATUS", "308")]).unwrap();
        assert_eq!(config.redirect_status.status_code(), StatusCode::PERMANENT_REDIRECT);
        assert!(load(&[("REDIRECT_STATUS", "200")]).is_err());
    }

    #[test]
    fn test_trusted_proxies_parsing() {
        let config = load(&[
            ("TRUSTED_PROXY_MODE", "standard"),
            ("TRUSTED_PROXIES", "10.0.0.0/8, 192.168.0.0/16"),
            ("NUM_TRUSTED_PROXIES", "1"),
        ])
        .unwrap();
        assert_eq!(config.clicks.trusted_proxy_mode, TrustedProxyMode::Standard);
        assert_eq!(config.clicks.trusted_proxies.len(), 2);
        assert_eq!(config.clicks.num_trusted_proxies, Some(1));

        assert!(load(&[("TRUSTED_PROXIES", "not-a-cidr")]).is_err());
    }

    #[test]
    fn test_click_logging_toggle() {
        assert!(!load(&[("CLICK_LOGGING", "false")]).unwrap().clicks.enabled);
        assert!(load(&[("CLICK_LOGGING", "YES")]).unwrap().clicks.enabled);
    }
}
