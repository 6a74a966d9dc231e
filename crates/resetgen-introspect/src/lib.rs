//! Catalog introspection for reset planning.

pub mod adapter;
pub mod options;
pub mod postgres;

pub use adapter::SchemaSource;
pub use options::IntrospectOptions;
pub use postgres::{PostgresAdapter, introspect_postgres, introspect_postgres_with_options};

pub use resetgen_core::SchemaSnapshot;
