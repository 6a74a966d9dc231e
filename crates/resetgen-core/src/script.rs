use std::fmt::{self, Write};

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::GENERATOR_NAME;
use crate::graph::DeletionPlan;
use crate::model::{IdentityColumn, TableRef, quote_literal};

const BLOCK_TAG: &str = "$reset$";
const INDENT: &str = "    ";

/// How foreign-key enforcement is handled while rows are deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Only circular tables run with constraints suspended.
    Ordered,
    /// Every cleaned table runs with constraints suspended.
    ConstraintsDisabled,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Ordered => "ordered",
            Strategy::ConstraintsDisabled => "constraints_disabled",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata recorded in the script's leading comment block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptHeader {
    pub generated_at: DateTime<Utc>,
    pub database: Option<String>,
    pub server: Option<String>,
    pub tables_cleaned: usize,
    pub tables_preserved: usize,
}

/// Rendered reset script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetScript {
    pub strategy: Strategy,
    pub sql: String,
}

/// Render a transactional reset script for `plan`.
///
/// Sections, in order: circular tables cleared with triggers disabled, the
/// ordered deletes, then identity reseeds. Any failure inside the block is
/// reported and re-raised, which aborts the surrounding transaction.
pub fn render_reset_script(
    plan: &DeletionPlan,
    identity_columns: &[IdentityColumn],
    header: &ScriptHeader,
    strategy: Strategy,
) -> ResetScript {
    let mut body = String::new();

    match strategy {
        Strategy::Ordered => {
            if !plan.circular.is_empty() {
                push_comment(&mut body, "Circular references: constraints suspended while clearing");
                push_suspended_deletes(&mut body, &plan.circular);
            }
            if !plan.order.is_empty() {
                push_comment(&mut body, "Dependency order: children before parents");
                for table in &plan.order {
                    push_statement(&mut body, &format!("DELETE FROM {};", table.quoted()));
                }
                body.push('\n');
            }
        }
        Strategy::ConstraintsDisabled => {
            let tables: Vec<TableRef> = plan.all_tables().cloned().collect();
            push_comment(&mut body, "All cleaned tables: constraints suspended while clearing");
            push_suspended_deletes(&mut body, &tables);
        }
    }

    if !identity_columns.is_empty() {
        push_comment(&mut body, "Identity reseed");
        for identity in identity_columns {
            push_statement(
                &mut body,
                &format!(
                    "PERFORM setval(pg_get_serial_sequence({}, {}), 1, false);",
                    quote_literal(&identity.table.quoted()),
                    quote_literal(&identity.column),
                ),
            );
        }
        body.push('\n');
    }

    let mut sql = render_header(header, strategy, plan.circular.len());
    sql.push_str("BEGIN;\n\n");
    let _ = writeln!(sql, "DO {BLOCK_TAG}");
    sql.push_str("BEGIN\n");
    sql.push_str(body.trim_end_matches('\n'));
    sql.push('\n');
    sql.push_str("EXCEPTION\n");
    let _ = writeln!(sql, "{INDENT}WHEN OTHERS THEN");
    let _ = writeln!(sql, "{INDENT}{INDENT}RAISE WARNING 'reset failed: %', SQLERRM;");
    let _ = writeln!(sql, "{INDENT}{INDENT}RAISE;");
    sql.push_str("END\n");
    let _ = writeln!(sql, "{BLOCK_TAG};");
    sql.push_str("\nCOMMIT;\n");

    ResetScript { strategy, sql }
}

/// Script for a schema with nothing to clean.
pub fn render_noop_script(header: &ScriptHeader) -> ResetScript {
    let mut sql = render_header(header, Strategy::Ordered, 0);
    sql.push_str("-- No application tables found; nothing to reset.\n\n");
    sql.push_str("BEGIN;\nCOMMIT;\n");
    ResetScript {
        strategy: Strategy::Ordered,
        sql,
    }
}

fn render_header(header: &ScriptHeader, strategy: Strategy, circular: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "-- Reset script generated by {GENERATOR_NAME}");
    let _ = writeln!(
        out,
        "-- generated_at: {}",
        header.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "-- database: {}", header_value(header.database.as_deref()));
    let _ = writeln!(out, "-- server: {}", header_value(header.server.as_deref()));
    let _ = writeln!(out, "-- strategy: {strategy}");
    let _ = writeln!(out, "-- tables_cleaned: {}", header.tables_cleaned);
    let _ = writeln!(out, "-- tables_preserved: {}", header.tables_preserved);
    let _ = writeln!(out, "-- tables_circular: {circular}");
    out.push('\n');
    out
}

fn header_value(value: Option<&str>) -> String {
    // Keep the comment on one line whatever the catalog returned.
    value
        .map(|value| value.replace(['\r', '\n'], " "))
        .unwrap_or_else(|| "unknown".to_string())
}

fn push_suspended_deletes(body: &mut String, tables: &[TableRef]) {
    for table in tables {
        push_statement(body, &format!("ALTER TABLE {} DISABLE TRIGGER ALL;", table.quoted()));
    }
    for table in tables {
        push_statement(body, &format!("DELETE FROM {};", table.quoted()));
    }
    for table in tables {
        push_statement(body, &format!("ALTER TABLE {} ENABLE TRIGGER ALL;", table.quoted()));
    }
    body.push('\n');
}

fn push_comment(body: &mut String, text: &str) {
    let _ = writeln!(body, "{INDENT}-- {text}");
}

fn push_statement(body: &mut String, statement: &str) {
    let _ = writeln!(body, "{INDENT}{statement}");
}
