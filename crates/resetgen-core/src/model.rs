use std::collections::BTreeSet;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Schema-qualified table identity.
///
/// Ordering is lexicographic by schema, then name. Every deterministic
/// ordering in the planner relies on this.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Quoted `"schema"."name"` form, safe to splice into SQL.
    pub fn quoted(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Foreign-key relationship: `child` holds a key referencing `parent`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKeyEdge {
    pub parent: TableRef,
    pub child: TableRef,
}

impl ForeignKeyEdge {
    pub fn new(parent: TableRef, child: TableRef) -> Self {
        Self { parent, child }
    }

    pub fn is_self_reference(&self) -> bool {
        self.parent == self.child
    }
}

/// An auto-incrementing column (identity or serial) on a table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct IdentityColumn {
    pub table: TableRef,
    pub column: String,
}

/// Catalog facts needed to plan a reset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SchemaSnapshot {
    /// Database name when available.
    pub database: Option<String>,
    /// Server address when available.
    pub server: Option<String>,
    pub tables: BTreeSet<TableRef>,
    pub foreign_keys: Vec<ForeignKeyEdge>,
    pub identity_columns: Vec<IdentityColumn>,
}

impl SchemaSnapshot {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Identity columns whose table is in `tables`, in table order.
    pub fn identity_columns_for(&self, tables: &BTreeSet<TableRef>) -> Vec<IdentityColumn> {
        let mut columns: Vec<IdentityColumn> = self
            .identity_columns
            .iter()
            .filter(|column| tables.contains(&column.table))
            .cloned()
            .collect();
        columns.sort();
        columns.dedup();
        columns
    }
}

/// Quote a SQL identifier, doubling embedded quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a SQL string literal, doubling embedded single quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
