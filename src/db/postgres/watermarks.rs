use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use super::super::{
    error::{DbError, Result},
    models::WatermarkRow,
    repositories::WatermarkRepository,
};

pub(crate) struct PgWatermarkRepo {
    pool: Arc<Pool<Postgres>>,
}

impl PgWatermarkRepo {
    pub fn new(pool: Arc<Pool<Postgres>>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &Pool<Postgres> {
        self.pool.as_ref()
    }
}

#[async_trait]
impl WatermarkRepository for PgWatermarkRepo {
    async fn get(&self, source: &str) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            r#"
                SELECT time
                FROM watermarks
                WHERE source = $1
            "#,
        )
        .bind(source)
        .fetch_optional(self.pool())
        .await
        .map_err(DbError::Query)?;

        row.map(|row| row.try_get("time").map_err(DbError::Query))
            .transpose()
    }

    async fn set(&self, source: &str, time: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
                INSERT INTO watermarks (source, time, updated_at)
                VALUES ($1, $2, now())
                ON CONFLICT (source)
                DO UPDATE SET time = EXCLUDED.time, updated_at = now()
            "#,
        )
        .bind(source)
        .bind(time)
        .execute(self.pool())
        .await
        .map_err(DbError::Query)?;

        Ok(())
    }

    async fn all(&self) -> Result<Vec<WatermarkRow>> {
        let rows = sqlx::query(
            r#"
                SELECT source, time, updated_at
                FROM watermarks
                ORDER BY source
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(DbError::Query)?;

        rows.into_iter()
            .map(|row| {
                Ok(WatermarkRow {
                    source: row.try_get("source").map_err(DbError::Query)?,
                    time: row.try_get("time").map_err(DbError::Query)?,
                    updated_at: row.try_get("updated_at").map_err(DbError::Query)?,
                })
            })
            .collect()
    }
}
