//! Postgres document store
//!
//! All collections share the `documents` table; a unique index on
//! `(collection, claim)` enforces claims at commit time.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    FromRow, Pool, Postgres,
};
use uuid::Uuid;

use super::{CollectionName, Document, DocumentWrite, Store};
use crate::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
};

/// Open the pool and bring the schema up to date.
///
/// Waiting for a connection is bounded by `acquire_timeout_secs`; every
/// statement on a pooled connection by `statement_timeout_secs`.
pub async fn connect(config: &DatabaseConfig) -> AppResult<Pool<Postgres>> {
    let options = config
        .url
        .parse::<PgConnectOptions>()?
        .options([("statement_timeout", format!("{}s", config.statement_timeout_secs))]);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await?;
    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::Internal(format!("Migration failed: {}", e)))?;
    tracing::info!("Database migrations completed");

    Ok(pool)
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: Uuid,
    body: Value,
    claim: Option<String>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            body: row.body,
            claim: row.claim,
        }
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Map a unique violation to `Conflict`, anything else to a database error
fn map_write_error(collection: CollectionName, error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::Conflict(format!(
            "{} write violates a uniqueness claim",
            collection
        )),
        _ => AppError::Database(error),
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert(&self, collection: CollectionName, document: Document) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body, claim, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            "#,
        )
        .bind(collection.as_str())
        .bind(document.id)
        .bind(&document.body)
        .bind(&document.claim)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(collection, e))?;
        Ok(())
    }

    async fn fetch(&self, collection: CollectionName, id: Uuid) -> AppResult<Document> {
        sqlx::query_as::<_, DocumentRow>(
            "SELECT id, body, claim FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Document::from)
        .ok_or_else(|| AppError::NotFound(format!("{} {} not found", collection, id)))
    }

    async fn fetch_all(&self, collection: CollectionName) -> AppResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, body, claim FROM documents WHERE collection = $1 ORDER BY created_at",
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn remove(&self, collection: CollectionName, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("{} {} not found", collection, id)));
        }
        Ok(())
    }

    async fn commit(&self, writes: Vec<DocumentWrite>) -> AppResult<()> {
        // Rolled back on drop if any step returns early
        let mut tx = self.pool.begin().await?;

        for write in writes {
            let current = sqlx::query_as::<_, DocumentRow>(
                r#"
                SELECT id, body, claim FROM documents
                WHERE collection = $1 AND id = $2
                FOR UPDATE
                "#,
            )
            .bind(write.collection.as_str())
            .bind(write.id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(current) = current else {
                if write.skip_missing {
                    continue;
                }
                return Err(AppError::NotFound(format!(
                    "{} {} not found",
                    write.collection, write.id
                )));
            };

            let next = (write.transform)(current.into())?;

            sqlx::query(
                r#"
                UPDATE documents SET body = $3, claim = $4, updated_at = NOW()
                WHERE collection = $1 AND id = $2
                "#,
            )
            .bind(write.collection.as_str())
            .bind(write.id)
            .bind(&next.body)
            .bind(&next.claim)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error(write.collection, e))?;
        }

        tx.commit().await?;
        Ok(())
    }
}
