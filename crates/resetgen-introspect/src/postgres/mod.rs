use sqlx::PgPool;

use resetgen_core::{Result, SchemaSnapshot};

use crate::adapter::SchemaSource;
use crate::options::IntrospectOptions;

mod mapper;
mod queries;

/// Adapter for PostgreSQL databases.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    /// Create a new adapter using a pre-configured pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl SchemaSource for PostgresAdapter {
    fn engine(&self) -> &'static str {
        "postgres"
    }

    async fn snapshot(&self, opts: &IntrospectOptions) -> Result<SchemaSnapshot> {
        introspect(&self.pool, opts).await
    }
}

/// Introspect Postgres with default options.
pub async fn introspect_postgres(pool: &PgPool) -> Result<SchemaSnapshot> {
    introspect_postgres_with_options(pool, IntrospectOptions::default()).await
}

/// Introspect Postgres with caller-provided options.
pub async fn introspect_postgres_with_options(
    pool: &PgPool,
    opts: IntrospectOptions,
) -> Result<SchemaSnapshot> {
    introspect(pool, &opts).await
}

/// Introspect a Postgres database according to the provided options.
pub async fn introspect(pool: &PgPool, opts: &IntrospectOptions) -> Result<SchemaSnapshot> {
    let target = queries::fetch_target(pool).await?;
    let tables = mapper::map_tables(queries::list_tables(pool).await?, opts);
    let foreign_keys = mapper::map_foreign_keys(queries::list_foreign_keys(pool).await?, &tables);
    let identity_columns =
        mapper::map_identity_columns(queries::list_identity_columns(pool).await?, &tables);

    tracing::debug!(
        event = "catalog_read",
        database = %target.database,
        tables = tables.len(),
        foreign_keys = foreign_keys.len(),
        identity_columns = identity_columns.len()
    );

    Ok(SchemaSnapshot {
        database: Some(target.database),
        server: Some(target.server),
        tables,
        foreign_keys,
        identity_columns,
    })
}
