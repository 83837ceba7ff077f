//! Taggable association repository.
//!
//! Associations are polymorphic: each row stores the tag id together with the
//! entity's type discriminator and id. Every write runs in a transaction, and
//! each write has a `_tx` variant so hosts can compose tagging with their own
//! statements (for example removing an entity and its associations together).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::{debug, info, warn};

use taggable_core::{
    Error, Result, Tag, TagFilter, TagInput, TagName, TaggableRef, TaggableRepository,
    TaggingConfig, TypeRegistry,
};

use crate::tags::{tag_from_row, PgTagRepository, TAG_COLUMNS_T};

/// Attempts for `tag` and `retag` when the transaction is chosen as a
/// deadlock victim.
const MAX_WRITE_ATTEMPTS: u32 = 2;

/// PostgreSQL implementation of TaggableRepository.
#[derive(Clone)]
pub struct PgTaggableRepository {
    pool: Pool<Postgres>,
    tags: PgTagRepository,
    config: Arc<TaggingConfig>,
    registry: Arc<TypeRegistry>,
}

impl PgTaggableRepository {
    pub fn new(
        pool: Pool<Postgres>,
        tags: PgTagRepository,
        config: Arc<TaggingConfig>,
        registry: Arc<TypeRegistry>,
    ) -> Self {
        Self {
            pool,
            tags,
            config,
            registry,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Resolve an arbitrary filter to matching ids.
    pub async fn filter(&self, taggable_type: &str, filter: TagFilter) -> Result<Vec<i64>> {
        match filter {
            TagFilter::All(input) => self.with_all_tags(taggable_type, input).await,
            TagFilter::Any(input) => self.with_any_tags(taggable_type, input).await,
        }
    }

    // ==========================================================================
    // TRANSACTION METHODS
    // ==========================================================================

    /// Attach tags within a transaction.
    ///
    /// Every name is validated before the first statement runs. New tags are
    /// created in normalized-key order so concurrent writers lock the `tags`
    /// unique index in the same order. Two writers attaching the same tags to
    /// the same entity can still deadlock on the association index; `tag`
    /// retries that case, callers composing `_tx` variants must handle
    /// [`Error::is_deadlock`] themselves.
    pub async fn tag_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        target: &TaggableRef,
        input: &TagInput,
    ) -> Result<Vec<Tag>> {
        self.registry.ensure_registered(&target.taggable_type)?;
        let names = input.tag_names(&self.config)?;
        self.attach_all_tx(tx, target, &names).await
    }

    /// Detach the named tags within a transaction.
    pub async fn untag_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        target: &TaggableRef,
        input: &TagInput,
    ) -> Result<u64> {
        let keys = input.normalized(&self.config);
        if keys.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            DELETE FROM taggable_associations a
            USING tags t
            WHERE a.tag_id = t.id
              AND a.taggable_type = $1
              AND a.taggable_id = $2
              AND t.normalized = ANY($3)
            "#,
        )
        .bind(&target.taggable_type)
        .bind(target.taggable_id)
        .bind(&keys)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    /// Replace the target's tags within a transaction.
    pub async fn retag_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        target: &TaggableRef,
        input: &TagInput,
    ) -> Result<Vec<Tag>> {
        self.registry.ensure_registered(&target.taggable_type)?;
        let names = input.tag_names(&self.config)?;
        self.detag_tx(tx, target).await?;
        self.attach_all_tx(tx, target, &names).await
    }

    /// Remove every association of the target within a transaction.
    pub async fn detag_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        target: &TaggableRef,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM taggable_associations WHERE taggable_type = $1 AND taggable_id = $2",
        )
        .bind(&target.taggable_type)
        .bind(target.taggable_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected())
    }

    async fn attach_all_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        target: &TaggableRef,
        names: &[TagName],
    ) -> Result<Vec<Tag>> {
        let mut order: Vec<usize> = (0..names.len()).collect();
        order.sort_by(|&a, &b| names[a].normalized().cmp(names[b].normalized()));

        let mut resolved: Vec<Option<Tag>> = std::iter::repeat_with(|| None)
            .take(names.len())
            .collect();
        for i in order {
            resolved[i] = Some(self.tags.find_or_create_tx(tx, &names[i]).await?);
        }

        // Associations go in input order; their ids define tag order.
        let tags: Vec<Tag> = resolved.into_iter().flatten().collect();
        for tag in &tags {
            self.attach_tx(tx, target, tag.id).await?;
        }
        Ok(tags)
    }

    /// Insert one association; an existing one is left untouched.
    async fn attach_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        target: &TaggableRef,
        tag_id: i64,
    ) -> Result<bool> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO taggable_associations (tag_id, taggable_id, taggable_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (tag_id, taggable_id, taggable_type) DO NOTHING
            "#,
        )
        .bind(tag_id)
        .bind(target.taggable_id)
        .bind(&target.taggable_type)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl TaggableRepository for PgTaggableRepository {
    fn config(&self) -> &TaggingConfig {
        &self.config
    }

    async fn tag(&self, target: &TaggableRef, input: TagInput) -> Result<Vec<Tag>> {
        let start = Instant::now();
        let mut attempt = 0;
        let tags = loop {
            attempt += 1;
            let mut tx = self.pool.begin().await.map_err(Error::Database)?;
            match self.tag_tx(&mut tx, target, &input).await {
                Ok(tags) => {
                    tx.commit().await.map_err(Error::Database)?;
                    break tags;
                }
                Err(e) if e.is_deadlock() && attempt < MAX_WRITE_ATTEMPTS => {
                    // Dropping tx rolls it back
                    warn!(
                        subsystem = "database",
                        component = "taggables",
                        op = "tag",
                        taggable = %target,
                        attempt,
                        "Deadlock detected, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            subsystem = "database",
            component = "taggables",
            op = "tag",
            taggable = %target,
            tag_count = tags.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Tagged entity"
        );
        Ok(tags)
    }

    async fn untag(&self, target: &TaggableRef, input: TagInput) -> Result<u64> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let removed = self.untag_tx(&mut tx, target, &input).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "taggables",
            op = "untag",
            taggable = %target,
            removed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Untagged entity"
        );
        Ok(removed)
    }

    async fn retag(&self, target: &TaggableRef, input: TagInput) -> Result<Vec<Tag>> {
        let start = Instant::now();
        let mut attempt = 0;
        let tags = loop {
            attempt += 1;
            let mut tx = self.pool.begin().await.map_err(Error::Database)?;
            match self.retag_tx(&mut tx, target, &input).await {
                Ok(tags) => {
                    tx.commit().await.map_err(Error::Database)?;
                    break tags;
                }
                Err(e) if e.is_deadlock() && attempt < MAX_WRITE_ATTEMPTS => {
                    // Dropping tx rolls it back
                    warn!(
                        subsystem = "database",
                        component = "taggables",
                        op = "retag",
                        taggable = %target,
                        attempt,
                        "Deadlock detected, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        };

        info!(
            subsystem = "database",
            component = "taggables",
            op = "retag",
            taggable = %target,
            tag_count = tags.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Retagged entity"
        );
        Ok(tags)
    }

    async fn detag(&self, target: &TaggableRef) -> Result<u64> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let removed = self.detag_tx(&mut tx, target).await?;
        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "database",
            component = "taggables",
            op = "detag",
            taggable = %target,
            removed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Detagged entity"
        );
        Ok(removed)
    }

    async fn tags(&self, target: &TaggableRef) -> Result<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM taggable_associations a
            JOIN tags t ON t.id = a.tag_id
            WHERE a.taggable_type = $1 AND a.taggable_id = $2
            ORDER BY a.id
            "#,
            TAG_COLUMNS_T
        ))
        .bind(&target.taggable_type)
        .bind(target.taggable_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn with_all_tags(&self, taggable_type: &str, input: TagInput) -> Result<Vec<i64>> {
        let keys = input.normalized(&self.config);
        if keys.is_empty() {
            return self.tagged_ids(taggable_type).await;
        }

        let start = Instant::now();
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT a.taggable_id
            FROM taggable_associations a
            JOIN tags t ON t.id = a.tag_id
            WHERE a.taggable_type = $1 AND t.normalized = ANY($2)
            GROUP BY a.taggable_id
            HAVING COUNT(DISTINCT t.id) = $3
            ORDER BY a.taggable_id
            "#,
        )
        .bind(taggable_type)
        .bind(&keys)
        .bind(keys.len() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "taggables",
            op = "with_all_tags",
            taggable_type,
            tag_count = keys.len(),
            result_count = ids.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Filtered by all tags"
        );
        Ok(ids)
    }

    async fn with_any_tags(&self, taggable_type: &str, input: TagInput) -> Result<Vec<i64>> {
        let keys = input.normalized(&self.config);
        if keys.is_empty() {
            return self.tagged_ids(taggable_type).await;
        }

        let start = Instant::now();
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT a.taggable_id
            FROM taggable_associations a
            JOIN tags t ON t.id = a.tag_id
            WHERE a.taggable_type = $1 AND t.normalized = ANY($2)
            ORDER BY a.taggable_id
            "#,
        )
        .bind(taggable_type)
        .bind(&keys)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "taggables",
            op = "with_any_tags",
            taggable_type,
            tag_count = keys.len(),
            result_count = ids.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Filtered by any tag"
        );
        Ok(ids)
    }

    async fn type_tags(&self, taggable_type: &str) -> Result<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT DISTINCT {}
            FROM tags t
            JOIN taggable_associations a ON a.tag_id = t.id
            WHERE a.taggable_type = $1
            ORDER BY t.id
            "#,
            TAG_COLUMNS_T
        ))
        .bind(taggable_type)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn taggables_for_tag(&self, tag_id: i64) -> Result<Vec<TaggableRef>> {
        let rows = sqlx::query(
            r#"
            SELECT taggable_type, taggable_id
            FROM taggable_associations
            WHERE tag_id = $1
            ORDER BY taggable_type, taggable_id
            "#,
        )
        .bind(tag_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|row| TaggableRef::new(row.get::<String, _>("taggable_type"), row.get("taggable_id")))
            .collect())
    }
}

impl PgTaggableRepository {
    /// Ids of every entity of the type that carries at least one tag.
    async fn tagged_ids(&self, taggable_type: &str) -> Result<Vec<i64>> {
        sqlx::query_scalar(
            r#"
            SELECT DISTINCT taggable_id
            FROM taggable_associations
            WHERE taggable_type = $1
            ORDER BY taggable_id
            "#,
        )
        .bind(taggable_type)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)
    }
}
