use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const MAX_IP_LEN: usize = 64;
pub const MAX_USER_AGENT_LEN: usize = 512;
pub const MAX_REFERRER_LEN: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ClickEvent {
    pub id: i64,
    pub url_id: i64,
    pub clicked_at: i64,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// Request metadata captured for one visit, already bounded in length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewClick {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl NewClick {
    pub fn new(ip: Option<String>, user_agent: Option<&str>, referrer: Option<&str>) -> Self {
        Self {
            ip: ip.map(|v| truncate(&v, MAX_IP_LEN)),
            user_agent: user_agent
                .filter(|v| !v.is_empty())
                .map(|v| truncate(v, MAX_USER_AGENT_LEN)),
            referrer: referrer
                .filter(|v| !v.is_empty())
                .map(|v| truncate(v, MAX_REFERRER_LEN)),
        }
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => value[..idx].to_string(),
        None => value.to_string(),
    }
}
