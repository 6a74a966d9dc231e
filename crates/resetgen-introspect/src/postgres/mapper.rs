use std::collections::BTreeSet;

use resetgen_core::{ForeignKeyEdge, IdentityColumn, TableRef};

use crate::options::IntrospectOptions;

use super::queries::{RawForeignKey, RawIdentityColumn, RawTable};

pub fn is_system_schema(schema: &str) -> bool {
    schema.starts_with("pg_") || schema == "information_schema"
}

pub fn schema_enabled(schema: &str, opts: &IntrospectOptions) -> bool {
    match &opts.schemas {
        Some(list) => list.iter().any(|item| item == schema),
        None => opts.include_system_schemas || !is_system_schema(schema),
    }
}

pub fn map_tables(raw: Vec<RawTable>, opts: &IntrospectOptions) -> BTreeSet<TableRef> {
    raw.into_iter()
        .filter(|table| schema_enabled(&table.schema, opts))
        .map(|table| TableRef::new(table.schema, table.name))
        .collect()
}

/// Keep edges whose endpoints were both scanned.
pub fn map_foreign_keys(
    raw: Vec<RawForeignKey>,
    tables: &BTreeSet<TableRef>,
) -> Vec<ForeignKeyEdge> {
    let mut edges: Vec<ForeignKeyEdge> = raw
        .into_iter()
        .map(|fk| {
            ForeignKeyEdge::new(
                TableRef::new(fk.parent_schema, fk.parent_table),
                TableRef::new(fk.child_schema, fk.child_table),
            )
        })
        .filter(|edge| tables.contains(&edge.parent) && tables.contains(&edge.child))
        .collect();
    edges.sort();
    edges.dedup();
    edges
}

pub fn map_identity_columns(
    raw: Vec<RawIdentityColumn>,
    tables: &BTreeSet<TableRef>,
) -> Vec<IdentityColumn> {
    raw.into_iter()
        .map(|column| IdentityColumn {
            table: TableRef::new(column.schema, column.table),
            column: column.column,
        })
        .filter(|column| tables.contains(&column.table))
        .collect()
}
