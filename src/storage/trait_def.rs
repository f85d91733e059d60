use crate::models::{ClickEvent, NewClick, UrlRecord, UrlStats};
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short code already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        let is_unique_violation = err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false);

        if is_unique_violation {
            StorageError::Conflict
        } else {
            StorageError::Other(err.into())
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Keyset position for newest-first listing: rows strictly older than
/// `(created_at, id)` are returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListCursor {
    pub created_at: i64,
    pub id: i64,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Create tables and indexes if they do not exist yet
    async fn init(&self) -> Result<()>;

    /// Insert a new record. Fails with [`StorageError::Conflict`] when the
    /// short code is already taken; nothing is written in that case.
    async fn insert(&self, short_code: &str, original_url: &str) -> StorageResult<UrlRecord>;

    /// Get a record by short code
    async fn get(&self, short_code: &str) -> Result<Option<UrlRecord>>;

    /// Get a record together with the time of its latest logged click
    async fn get_stats(&self, short_code: &str) -> Result<Option<UrlStats>>;

    /// Increment the click counter and commit. Returns the updated record,
    /// or `None` (with nothing written) when the code is unknown.
    async fn increment_clicks(&self, short_code: &str) -> Result<Option<UrlRecord>>;

    /// Append a click event for a record
    async fn log_click(&self, url_id: i64, click: &NewClick) -> Result<ClickEvent>;

    /// List records newest first, starting after `after` when given
    async fn list(&self, limit: i64, after: Option<ListCursor>) -> Result<Vec<UrlRecord>>;

    /// Newest click events of a record
    async fn list_clicks(&self, url_id: i64, limit: i64) -> Result<Vec<ClickEvent>>;

    /// Delete a record and its click events. Returns false if the id is unknown.
    async fn delete(&self, id: i64) -> Result<bool>;
}

pub(crate) fn unix_now() -> Result<i64> {
    Ok(std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)?
        .as_secs() as i64)
}
