//! Tag filter query builder.
//!
//! Turns a [`TagFilter`] into a parameterized SQL condition that can be spliced
//! into a host query's WHERE clause, so host tables can be filtered by tag
//! membership without first materializing id lists.

use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::Postgres;

use taggable_core::{Error, Result, TagFilter, TaggingConfig};

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryParam {
    /// 64-bit integer parameter.
    BigInt(i64),
    /// String parameter.
    String(String),
    /// Array of strings (normalized tag keys).
    StringArray(Vec<String>),
}

impl QueryParam {
    /// Bind this parameter as the next positional argument of `query`.
    pub fn bind_to<'q>(
        &'q self,
        query: Query<'q, Postgres, PgArguments>,
    ) -> Query<'q, Postgres, PgArguments> {
        match self {
            QueryParam::BigInt(val) => query.bind(val),
            QueryParam::String(s) => query.bind(s),
            QueryParam::StringArray(arr) => query.bind(arr),
        }
    }
}

/// Bind every parameter, in order.
pub fn bind_params<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = param.bind_to(query);
    }
    query
}

/// Generates a SQL WHERE clause fragment for a tag filter.
///
/// # Example
///
/// ```rust,ignore
/// use taggable_core::{TagFilter, TaggingConfig};
/// use taggable_db::tag_filter::{bind_params, TagFilterQueryBuilder};
///
/// let config = TaggingConfig::default();
/// let builder = TagFilterQueryBuilder::new(TagFilter::any("apple,banana"), "post", "p.id", 1)?;
/// let (fragment, params) = builder.build(&config);
/// // fragment: "EXISTS (... a.taggable_type = $2 AND a.taggable_id = p.id AND t.normalized = ANY($3::text[]))"
///
/// let sql = format!("SELECT p.id FROM posts p WHERE p.published = $1 AND {}", fragment);
/// let query = bind_params(sqlx::query(&sql).bind(true), &params);
/// ```
pub struct TagFilterQueryBuilder {
    filter: TagFilter,
    taggable_type: String,
    id_column: String,
    param_offset: usize,
}

impl TagFilterQueryBuilder {
    /// Maximum number of distinct tags in one filter.
    const MAX_FILTER_ELEMENTS: usize = 1000;

    /// Create a new builder.
    ///
    /// # Parameters
    ///
    /// * `filter` - The membership condition
    /// * `taggable_type` - Discriminator of the host entity type
    /// * `id_column` - Host id column, optionally qualified (`id` or `p.id`)
    /// * `param_offset` - Number of parameters already in the query
    pub fn new(
        filter: TagFilter,
        taggable_type: impl Into<String>,
        id_column: impl Into<String>,
        param_offset: usize,
    ) -> Result<Self> {
        let id_column = id_column.into();
        validate_column_reference(&id_column)?;
        Ok(Self {
            filter,
            taggable_type: taggable_type.into(),
            id_column,
            param_offset,
        })
    }

    /// Build the fragment and its parameters, in placeholder order.
    ///
    /// An `All` filter with no tags is vacuously true and yields `TRUE`. An
    /// `Any` filter with no tags matches entities carrying at least one tag.
    /// Filters with more than [`Self::MAX_FILTER_ELEMENTS`] tags match nothing.
    pub fn build(&self, config: &TaggingConfig) -> (String, Vec<QueryParam>) {
        let keys = self.filter.normalized(config);
        if keys.len() > Self::MAX_FILTER_ELEMENTS {
            return ("FALSE".to_string(), vec![]);
        }

        let type_idx = self.param_offset + 1;
        let keys_idx = self.param_offset + 2;
        let count_idx = self.param_offset + 3;

        match &self.filter {
            TagFilter::All(_) if keys.is_empty() => ("TRUE".to_string(), vec![]),
            TagFilter::All(_) => {
                let count = keys.len() as i64;
                let sql = format!(
                    "{} IN (SELECT a.taggable_id FROM taggable_associations a \
                     JOIN tags t ON t.id = a.tag_id \
                     WHERE a.taggable_type = ${} AND t.normalized = ANY(${}::text[]) \
                     GROUP BY a.taggable_id HAVING COUNT(DISTINCT t.id) = ${})",
                    self.id_column, type_idx, keys_idx, count_idx
                );
                (
                    sql,
                    vec![
                        QueryParam::String(self.taggable_type.clone()),
                        QueryParam::StringArray(keys),
                        QueryParam::BigInt(count),
                    ],
                )
            }
            TagFilter::Any(_) if keys.is_empty() => {
                let sql = format!(
                    "EXISTS (SELECT 1 FROM taggable_associations a \
                     WHERE a.taggable_type = ${} AND a.taggable_id = {})",
                    type_idx, self.id_column
                );
                (sql, vec![QueryParam::String(self.taggable_type.clone())])
            }
            TagFilter::Any(_) => {
                let sql = format!(
                    "EXISTS (SELECT 1 FROM taggable_associations a \
                     JOIN tags t ON t.id = a.tag_id \
                     WHERE a.taggable_type = ${} AND a.taggable_id = {} \
                     AND t.normalized = ANY(${}::text[]))",
                    type_idx, self.id_column, keys_idx
                );
                (
                    sql,
                    vec![
                        QueryParam::String(self.taggable_type.clone()),
                        QueryParam::StringArray(keys),
                    ],
                )
            }
        }
    }
}

/// Accept `column` or `alias.column`, each part a plain SQL identifier.
fn validate_column_reference(column: &str) -> Result<()> {
    let valid_part = |part: &str| {
        !part.is_empty()
            && !part.starts_with(|c: char| c.is_ascii_digit())
            && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    let parts: Vec<&str> = column.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|p| valid_part(p)) {
        return Err(Error::InvalidInput(format!(
            "Invalid id column reference: '{}'",
            column
        )));
    }
    Ok(())
}
