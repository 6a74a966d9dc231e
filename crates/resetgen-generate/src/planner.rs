use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use resetgen_core::{
    Classification, DeletionPlan, IdentityColumn, PreserveRules, RedactedConnection, ResetScript,
    SchemaSnapshot, ScriptHeader, Strategy, build_deletion_plan, classify_tables, render_noop_script,
    render_reset_script,
};

/// Everything decided about a reset before any SQL is rendered.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResetPlan {
    pub database: Option<String>,
    pub server: Option<String>,
    pub classification: Classification,
    pub plan: DeletionPlan,
    /// Identity columns on cleaned tables only.
    pub identity_columns: Vec<IdentityColumn>,
}

impl ResetPlan {
    pub fn from_snapshot(snapshot: &SchemaSnapshot, rules: &PreserveRules) -> Self {
        let classification = classify_tables(&snapshot.tables, rules);
        let plan = build_deletion_plan(&classification.clean, &snapshot.foreign_keys);
        let identity_columns = snapshot.identity_columns_for(&classification.clean);

        Self {
            database: snapshot.database.clone(),
            server: snapshot.server.clone(),
            classification,
            plan,
            identity_columns,
        }
    }

    /// Name the server after the connection target when the catalog only
    /// reported a socket connection (`local`) or nothing at all.
    pub fn label_server_from(&mut self, connection: &RedactedConnection) {
        if !matches!(self.server.as_deref(), None | Some("local")) {
            return;
        }
        if let Some(label) = connection.server_label() {
            self.server = Some(label);
        }
    }

    pub fn is_noop(&self) -> bool {
        self.classification.is_noop()
    }

    pub fn tables_cleaned(&self) -> usize {
        self.classification.clean.len()
    }

    pub fn tables_preserved(&self) -> usize {
        self.classification.preserve.len()
    }

    pub fn header(&self, generated_at: DateTime<Utc>) -> ScriptHeader {
        ScriptHeader {
            generated_at,
            database: self.database.clone(),
            server: self.server.clone(),
            tables_cleaned: self.tables_cleaned(),
            tables_preserved: self.tables_preserved(),
        }
    }

    pub fn render(&self, strategy: Strategy, generated_at: DateTime<Utc>) -> ResetScript {
        let header = self.header(generated_at);
        if self.is_noop() {
            render_noop_script(&header)
        } else {
            render_reset_script(&self.plan, &self.identity_columns, &header, strategy)
        }
    }
}
