//! # taggable-db
//!
//! PostgreSQL storage layer for taggable.
//!
//! This crate provides:
//! - Connection pool management
//! - The tag repository with race-free find-or-create
//! - The polymorphic association repository (tag, untag, retag, detag, filters)
//! - A SQL fragment builder for filtering host tables by tag membership
//!
//! ## Example
//!
//! ```rust,ignore
//! use taggable_db::{Database, TaggableExt, TaggingConfig, TypeRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = TypeRegistry::new().with::<Post>()?;
//!     let db = Database::connect("postgres://localhost/app", TaggingConfig::from_env()?, registry).await?;
//!
//!     let post = Post { id: 1 };
//!     post.tag(&db.taggables, "Apple,Banana").await?;
//!     println!("{}", post.tag_list(&db.taggables).await?);
//!     Ok(())
//! }
//! ```
pub mod pool;
pub mod tag_filter;
pub mod taggables;
pub mod tags;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

// Re-export core types
pub use taggable_core::*;

pub use pool::{
    create_pool, create_pool_with_config, log_pool_metrics, validate_schema_name, PoolConfig,
};
pub use tag_filter::{bind_params, QueryParam, TagFilterQueryBuilder};
pub use taggables::PgTaggableRepository;
pub use tags::PgTagRepository;

/// DDL for the `tags` and `taggable_associations` tables. Idempotent.
///
/// Hosts that manage their own schema can copy this into their migrations.
pub const SCHEMA_SQL: &str = include_str!("../sql/schema.sql");

/// Combined database access.
#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Postgres>,
    pub tags: PgTagRepository,
    pub taggables: PgTaggableRepository,
    config: Arc<TaggingConfig>,
    registry: Arc<TypeRegistry>,
}

impl Database {
    /// Create a new database instance from a connection pool.
    pub fn new(pool: Pool<Postgres>, config: TaggingConfig, registry: TypeRegistry) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(registry);
        let tags = PgTagRepository::new(pool.clone(), config.clone());
        let taggables =
            PgTaggableRepository::new(pool.clone(), tags.clone(), config.clone(), registry.clone());

        Self {
            pool,
            tags,
            taggables,
            config,
            registry,
        }
    }

    /// Connect to the database and create a new instance.
    pub async fn connect(
        database_url: &str,
        config: TaggingConfig,
        registry: TypeRegistry,
    ) -> Result<Self> {
        Self::connect_with_config(database_url, PoolConfig::default(), config, registry).await
    }

    /// Connect with explicit pool settings.
    pub async fn connect_with_config(
        database_url: &str,
        pool_config: PoolConfig,
        config: TaggingConfig,
        registry: TypeRegistry,
    ) -> Result<Self> {
        config.validate()?;
        let pool = create_pool_with_config(database_url, pool_config).await?;
        Ok(Self::new(pool, config, registry))
    }

    pub fn config(&self) -> &TaggingConfig {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Start a transaction for composing `_tx` operations.
    pub async fn begin(&self) -> Result<sqlx::Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(Error::Database)
    }

    /// Filter fragment for a host query; see [`TagFilterQueryBuilder`].
    pub fn filter_fragment<T: Taggable>(
        &self,
        filter: TagFilter,
        id_column: &str,
        param_offset: usize,
    ) -> Result<(String, Vec<QueryParam>)> {
        let builder =
            TagFilterQueryBuilder::new(filter, T::taggable_type(), id_column, param_offset)?;
        Ok(builder.build(&self.config))
    }

    /// Create the tagging tables if they do not exist.
    pub async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}
