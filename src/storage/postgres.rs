use crate::models::{ClickEvent, NewClick, UrlRecord, UrlStats};
use crate::storage::trait_def::unix_now;
use crate::storage::{ListCursor, Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                id BIGSERIAL PRIMARY KEY,
                short_code TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL,
                clicks BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_urls_created ON urls(created_at, id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clicks (
                id BIGSERIAL PRIMARY KEY,
                url_id BIGINT NOT NULL REFERENCES urls(id) ON DELETE CASCADE,
                clicked_at BIGINT NOT NULL,
                ip TEXT,
                user_agent TEXT,
                referrer TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_clicks_url_id ON clicks(url_id)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn insert(&self, short_code: &str, original_url: &str) -> StorageResult<UrlRecord> {
        let created_at = unix_now()?;

        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, UrlRecord>(
            r#"
            INSERT INTO urls (short_code, original_url, clicks, created_at)
            VALUES ($1, $2, 0, $3)
            ON CONFLICT (short_code) DO NOTHING
            RETURNING id, short_code, original_url, clicks, created_at
            "#,
        )
        .bind(short_code)
        .bind(original_url)
        .bind(created_at)
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            Some(url) => {
                tx.commit().await?;
                Ok(url)
            }
            None => Err(StorageError::Conflict),
        }
    }

    async fn get(&self, short_code: &str) -> Result<Option<UrlRecord>> {
        let url = sqlx::query_as::<_, UrlRecord>(
            r#"
            SELECT id, short_code, original_url, clicks, created_at
            FROM urls
            WHERE short_code = $1
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(url)
    }

    async fn get_stats(&self, short_code: &str) -> Result<Option<UrlStats>> {
        let stats = sqlx::query_as::<_, UrlStats>(
            r#"
            SELECT u.id, u.short_code, u.original_url, u.clicks, u.created_at,
                   (SELECT MAX(c.clicked_at) FROM clicks c WHERE c.url_id = u.id) AS last_click_at
            FROM urls u
            WHERE u.short_code = $1
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(stats)
    }

    async fn increment_clicks(&self, short_code: &str) -> Result<Option<UrlRecord>> {
        let mut tx = self.pool.begin().await?;

        let url = sqlx::query_as::<_, UrlRecord>(
            r#"
            UPDATE urls
            SET clicks = clicks + 1
            WHERE short_code = $1
            RETURNING id, short_code, original_url, clicks, created_at
            "#,
        )
        .bind(short_code)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(url)
    }

    async fn log_click(&self, url_id: i64, click: &NewClick) -> Result<ClickEvent> {
        let clicked_at = unix_now()?;

        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, ClickEvent>(
            r#"
            INSERT INTO clicks (url_id, clicked_at, ip, user_agent, referrer)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, url_id, clicked_at, ip, user_agent, referrer
            "#,
        )
        .bind(url_id)
        .bind(clicked_at)
        .bind(click.ip.as_deref())
        .bind(click.user_agent.as_deref())
        .bind(click.referrer.as_deref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(event)
    }

    async fn list(&self, limit: i64, after: Option<ListCursor>) -> Result<Vec<UrlRecord>> {
        let urls = if let Some(cursor) = after {
            sqlx::query_as::<_, UrlRecord>(
                r#"
                SELECT id, short_code, original_url, clicks, created_at
                FROM urls
                WHERE (created_at, id) < ($1, $2)
                ORDER BY created_at DESC, id DESC
                LIMIT $3
                "#,
            )
            .bind(cursor.created_at)
            .bind(cursor.id)
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?
        } else {
            sqlx::query_as::<_, UrlRecord>(
                r#"
                SELECT id, short_code, original_url, clicks, created_at
                FROM urls
                ORDER BY created_at DESC, id DESC
                LIMIT $1
                "#,
            )
            .bind(limit)
            .fetch_all(self.pool.as_ref())
            .await?
        };

        Ok(urls)
    }

    async fn list_clicks(&self, url_id: i64, limit: i64) -> Result<Vec<ClickEvent>> {
        let clicks = sqlx::query_as::<_, ClickEvent>(
            r#"
            SELECT id, url_id, clicked_at, ip, user_agent, referrer
            FROM clicks
            WHERE url_id = $1
            ORDER BY clicked_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(url_id)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(clicks)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM clicks WHERE url_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM urls WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }
}
