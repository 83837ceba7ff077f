//! Tag repository implementation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Pool, Postgres, Row, Transaction};
use tracing::{debug, info, warn};

use taggable_core::{
    defaults, Error, Result, Tag, TagName, TagRepository, TagUsage, TaggingConfig,
};

/// Columns selected for a [`Tag`], unqualified.
pub(crate) const TAG_COLUMNS: &str = "id, name, normalized, created_at, updated_at";

/// Columns selected for a [`Tag`], qualified with the `t` alias.
pub(crate) const TAG_COLUMNS_T: &str = "t.id, t.name, t.normalized, t.created_at, t.updated_at";

pub(crate) fn tag_from_row(row: &PgRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        normalized: row.get("normalized"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// PostgreSQL implementation of TagRepository.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
    config: Arc<TaggingConfig>,
}

impl PgTagRepository {
    /// Create a new PgTagRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>, config: Arc<TaggingConfig>) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &TaggingConfig {
        &self.config
    }

    /// Find-or-create within a transaction.
    pub async fn find_or_create_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        name: &TagName,
    ) -> Result<Tag> {
        find_or_create_on(&mut **tx, name).await
    }

    /// Look up a tag by an already-normalized key within a transaction.
    pub async fn find_by_normalized_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        normalized: &str,
    ) -> Result<Option<Tag>> {
        select_by_normalized(&mut **tx, normalized).await
    }
}

async fn select_by_normalized(conn: &mut PgConnection, normalized: &str) -> Result<Option<Tag>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM tags WHERE normalized = $1",
        TAG_COLUMNS
    ))
    .bind(normalized)
    .fetch_optional(conn)
    .await
    .map_err(Error::Database)?;

    Ok(row.as_ref().map(tag_from_row))
}

/// Insert-or-fetch keyed on the unique `normalized` column.
///
/// The insert either creates the row or, when another writer got there first,
/// does nothing; the follow-up select then returns the winner. The select can
/// only come back empty if the winning row was deleted in between, in which
/// case the insert is retried.
async fn find_or_create_on(conn: &mut PgConnection, name: &TagName) -> Result<Tag> {
    for attempt in 1..=defaults::FIND_OR_CREATE_ATTEMPTS {
        let now = Utc::now();
        let inserted = sqlx::query(&format!(
            "INSERT INTO tags (name, normalized, created_at, updated_at)
             VALUES ($1, $2, $3, $3)
             ON CONFLICT (normalized) DO NOTHING
             RETURNING {}",
            TAG_COLUMNS
        ))
        .bind(name.name())
        .bind(name.normalized())
        .bind(now)
        .fetch_optional(&mut *conn)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = inserted {
            let tag = tag_from_row(&row);
            debug!(
                subsystem = "database",
                component = "tags",
                op = "create",
                tag_id = tag.id,
                normalized = %tag.normalized,
                "Created tag"
            );
            return Ok(tag);
        }

        if let Some(tag) = select_by_normalized(&mut *conn, name.normalized()).await? {
            return Ok(tag);
        }

        warn!(
            subsystem = "database",
            component = "tags",
            op = "find_or_create",
            attempt,
            normalized = %name.normalized(),
            "Conflicting tag disappeared before it could be read, retrying"
        );
    }

    Err(Error::Internal(format!(
        "Could not find or create tag '{}' after {} attempts",
        name.normalized(),
        defaults::FIND_OR_CREATE_ATTEMPTS
    )))
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn find_by_normalized_name(&self, raw: &str) -> Result<Option<Tag>> {
        let normalized = self.config.normalize(raw);
        if normalized.is_empty() {
            return Ok(None);
        }

        let mut conn = self.pool.acquire().await.map_err(Error::Database)?;
        select_by_normalized(&mut conn, &normalized).await
    }

    async fn find_or_create(&self, raw: &str) -> Result<Tag> {
        let name = TagName::new(raw, &self.config)?;
        let mut conn = self.pool.acquire().await.map_err(Error::Database)?;
        find_or_create_on(&mut conn, &name).await
    }

    async fn get(&self, id: i64) -> Result<Option<Tag>> {
        let row = sqlx::query(&format!("SELECT {} FROM tags WHERE id = $1", TAG_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(row.as_ref().map(tag_from_row))
    }

    async fn list(&self) -> Result<Vec<TagUsage>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}, COUNT(a.id) AS usage_count
            FROM tags t
            LEFT JOIN taggable_associations a ON a.tag_id = t.id
            GROUP BY t.id
            ORDER BY t.normalized
            "#,
            TAG_COLUMNS_T
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let tags = rows
            .iter()
            .map(|row| TagUsage {
                tag: tag_from_row(row),
                usage_count: row.get("usage_count"),
            })
            .collect();

        Ok(tags)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::TagNotFound(id));
        }

        info!(
            subsystem = "database",
            component = "tags",
            op = "delete",
            tag_id = id,
            "Deleted tag and its associations"
        );
        Ok(())
    }
}
