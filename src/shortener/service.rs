use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::codegen::generate_code;
use crate::config::ShortCodeConfig;
use crate::models::{ClickEvent, NewClick, UrlRecord, UrlStats};
use crate::storage::{ListCursor, Storage, StorageError};

/// Longest URL accepted for shortening
pub const MAX_URL_LEN: usize = 2048;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The caller supplied a missing or malformed value
    #[error("{0}")]
    Validation(String),
    #[error("short link not found")]
    NotFound,
    /// Every attempt of the generate-and-insert loop hit an existing code
    #[error("no unique short code found after {0} attempts")]
    CodeSpaceExhausted(u32),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// A freshly created record and its public short URL
#[derive(Debug, Clone)]
pub struct Shortened {
    pub record: UrlRecord,
    pub short_url: String,
}

pub struct Shortener {
    storage: Arc<dyn Storage>,
    code_length: usize,
    max_attempts: u32,
}

impl Shortener {
    pub fn new(storage: Arc<dyn Storage>, config: &ShortCodeConfig) -> Self {
        Self {
            storage,
            code_length: config.length,
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Validate `original_url`, store it under a new unique code and build
    /// the short URL from `base_url`.
    pub async fn shorten(&self, original_url: &str, base_url: &str) -> Result<Shortened, ServiceError> {
        let original_url = validate_url(original_url)?;
        let record = self.insert_with_unique_code(original_url).await?;
        let short_url = short_url(base_url, &record.short_code);

        debug!(short_code = %record.short_code, "created short link");
        Ok(Shortened { record, short_url })
    }

    /// Generate a code and insert it in one atomic step, drawing a fresh code
    /// whenever the store reports a conflict.
    pub async fn insert_with_unique_code(&self, original_url: &str) -> Result<UrlRecord, ServiceError> {
        for attempt in 1..=self.max_attempts {
            let code = generate_code(self.code_length);
            match self.storage.insert(&code, original_url).await {
                Ok(record) => return Ok(record),
                Err(StorageError::Conflict) => {
                    debug!(attempt, short_code = %code, "short code collision, retrying");
                }
                Err(StorageError::Other(err)) => return Err(ServiceError::Storage(err)),
            }
        }

        Err(ServiceError::CodeSpaceExhausted(self.max_attempts))
    }

    /// Look up `short_code`, count the visit and return the record to redirect to.
    ///
    /// The counter increment is committed before this returns; a failed commit
    /// is an error. Click event logging is best effort and only logged when it
    /// fails.
    pub async fn resolve_and_record(
        &self,
        short_code: &str,
        click: Option<NewClick>,
    ) -> Result<UrlRecord, ServiceError> {
        let record = self
            .storage
            .increment_clicks(short_code)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if let Some(click) = click {
            if let Err(err) = self.storage.log_click(record.id, &click).await {
                warn!(short_code = %short_code, error = %err, "failed to log click event");
            }
        }

        Ok(record)
    }

    pub async fn get_stats(&self, short_code: &str) -> Result<UrlStats, ServiceError> {
        self.storage
            .get_stats(short_code)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    /// Remove a record and its click events.
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if self.storage.delete(id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound)
        }
    }

    pub async fn list(
        &self,
        limit: i64,
        after: Option<ListCursor>,
    ) -> Result<Vec<UrlRecord>, ServiceError> {
        Ok(self.storage.list(limit, after).await?)
    }

    pub async fn list_clicks(
        &self,
        short_code: &str,
        limit: i64,
    ) -> Result<(UrlRecord, Vec<ClickEvent>), ServiceError> {
        let record = self
            .storage
            .get(short_code)
            .await?
            .ok_or(ServiceError::NotFound)?;
        let clicks = self.storage.list_clicks(record.id, limit).await?;
        Ok((record, clicks))
    }
}

/// Trim `raw` and check it is a non-empty http(s) URL of bounded length
/// that can be sent back in a Location header.
pub fn validate_url(raw: &str) -> Result<&str, ServiceError> {
    let url = raw.trim();

    if url.is_empty() {
        return Err(ServiceError::Validation("URL is required".to_string()));
    }

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ServiceError::Validation(
            "Invalid URL. Must start with http:// or https://".to_string(),
        ));
    }

    if url.chars().any(char::is_control) {
        return Err(ServiceError::Validation(
            "URL contains invalid characters".to_string(),
        ));
    }

    if url.len() > MAX_URL_LEN {
        return Err(ServiceError::Validation(format!(
            "URL must be at most {MAX_URL_LEN} characters"
        )));
    }

    Ok(url)
}

pub fn short_url(base_url: &str, short_code: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), short_code)
}
