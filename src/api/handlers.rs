use axum::{
    extract::{FromRequest, FromRequestParts, Path, Query, Request, State},
    http::{header, request::Parts, HeaderMap},
    Form, Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::cursor::CursorData;
use crate::models::{ClickEvent, UrlRecord};
use crate::shortener::service::short_url;
use crate::state::AppState;
use crate::storage::ListCursor;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 200;
const MAX_CLICKS_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct ShortenRequest {
    #[serde(default)]
    pub url: String,
}

/// Shorten request body, accepted either as JSON or as an HTML form
pub struct ShortenPayload(pub ShortenRequest);

impl<S> FromRequest<S> for ShortenPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_json(req.headers()) {
            let Json(body) = Json::<ShortenRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;
            Ok(Self(body))
        } else {
            let Form(body) = Form::<ShortenRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;
            Ok(Self(body))
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

/// Query string extractor whose rejections use the JSON error body
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        Ok(Self(value))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub success: bool,
    pub short_url: String,
    pub short_code: String,
    pub original_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub short_code: String,
    pub original_url: String,
    pub clicks: i64,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_click_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub cursor: Option<String>,
}

fn default_limit() -> i64 {
    DEFAULT_LIST_LIMIT
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UrlSummary {
    pub id: i64,
    pub short_code: String,
    pub original_url: String,
    pub short_url: String,
    pub clicks: i64,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub urls: Vec<UrlSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClicksQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClickView {
    pub clicked_at: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

impl From<ClickEvent> for ClickView {
    fn from(event: ClickEvent) -> Self {
        Self {
            clicked_at: format_timestamp(event.clicked_at),
            ip: event.ip,
            user_agent: event.user_agent,
            referrer: event.referrer,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClicksResponse {
    pub short_code: String,
    pub clicks: Vec<ClickView>,
}

/// Render a Unix timestamp as `YYYY-MM-DD HH:MM:SS` (UTC)
pub fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Create a new shortened URL
pub async fn shorten_url(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ShortenPayload(payload): ShortenPayload,
) -> Result<Json<ShortenResponse>, ApiError> {
    let base_url = state.base_url(&headers);
    let shortened = state.shortener.shorten(&payload.url, &base_url).await?;

    Ok(Json(ShortenResponse {
        success: true,
        short_url: shortened.short_url,
        short_code: shortened.record.short_code,
        original_url: shortened.record.original_url,
    }))
}

/// Statistics for one short code
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.shortener.get_stats(&code).await?;

    Ok(Json(StatsResponse {
        short_code: stats.short_code,
        original_url: stats.original_url,
        clicks: stats.clicks,
        created_at: format_timestamp(stats.created_at),
        last_click_at: stats.last_click_at.map(format_timestamp),
    }))
}

/// Delete a record and its click history
pub async fn delete_url(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    // A non-numeric id can never match a record
    let id = id
        .parse::<i64>()
        .map_err(|_| ApiError::NotFound("URL not found"))?;

    state.shortener.delete(id).await?;
    tracing::info!(id, "deleted short link");

    Ok(Json(SuccessResponse { success: true }))
}

/// List shortened URLs, newest first
pub async fn list_urls(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let limit = query.limit.clamp(1, MAX_LIST_LIMIT);

    let after: Option<ListCursor> = match query.cursor.as_deref().filter(|c| !c.is_empty()) {
        Some(cursor) => Some(
            state
                .cursor_signer
                .verify(cursor)
                .map_err(|e| ApiError::Validation(e.to_string()))?
                .into(),
        ),
        None => None,
    };

    // Fetch one extra row to learn whether another page exists
    let mut records = state.shortener.list(limit + 1, after).await?;
    let has_more = records.len() as i64 > limit;
    records.truncate(limit as usize);

    let next_cursor = match records.last() {
        Some(last) if has_more => Some(
            state
                .cursor_signer
                .create(&CursorData {
                    created_at: last.created_at,
                    id: last.id,
                })
                .map_err(|e| {
                    tracing::error!(error = ?e, "failed to sign cursor");
                    ApiError::Internal
                })?,
        ),
        _ => None,
    };

    let base_url = state.base_url(&headers);
    let urls = records
        .into_iter()
        .map(|record| summarize(record, &base_url))
        .collect();

    Ok(Json(ListResponse { urls, next_cursor }))
}

fn summarize(record: UrlRecord, base_url: &str) -> UrlSummary {
    UrlSummary {
        short_url: short_url(base_url, &record.short_code),
        id: record.id,
        short_code: record.short_code,
        original_url: record.original_url,
        clicks: record.clicks,
        created_at: format_timestamp(record.created_at),
    }
}

/// Most recent click events of one short code
pub async fn list_clicks(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    ApiQuery(query): ApiQuery<ClicksQuery>,
) -> Result<Json<ClicksResponse>, ApiError> {
    let limit = query.limit.clamp(1, MAX_CLICKS_LIMIT);
    let (record, clicks) = state.shortener.list_clicks(&code, limit).await?;

    Ok(Json(ClicksResponse {
        short_code: record.short_code,
        clicks: clicks.into_iter().map(ClickView::from).collect(),
    }))
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_is_json_content_types() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        assert!(is_json(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/merge-patch+json"));
        assert!(is_json(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        assert!(!is_json(&headers));
    }
}
