use async_trait::async_trait;

use resetgen_core::{Result, SchemaSnapshot};

use crate::options::IntrospectOptions;

/// Trait implemented by database adapters that can describe a schema for reset planning.
#[async_trait]
pub trait SchemaSource {
    /// Returns the engine identifier (e.g. `postgres`).
    fn engine(&self) -> &'static str;

    /// Read the catalog and return tables, foreign keys and identity columns.
    async fn snapshot(&self, opts: &IntrospectOptions) -> Result<SchemaSnapshot>;
}
