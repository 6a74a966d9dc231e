use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::TableRef;

/// Name patterns identifying framework-owned tables that a reset must keep.
///
/// Matching is ASCII case-insensitive and only looks at the bare table name,
/// never at the schema or at foreign keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PreserveRules {
    pub prefixes: Vec<String>,
    pub suffixes: Vec<String>,
    pub exact: Vec<String>,
}

impl Default for PreserveRules {
    fn default() -> Self {
        Self {
            prefixes: to_strings(&[
                "Abp",
                "Frwk_",
                "__EFMigrationsHistory",
                "VersionInfo",
                "Hangfire",
                "_sqlx_migrations",
                "vw_",
            ]),
            suffixes: to_strings(&["_Audit", "_AuditLog", "_History"]),
            exact: to_strings(&["schemaversions"]),
        }
    }
}

impl PreserveRules {
    /// Rules that preserve nothing.
    pub fn none() -> Self {
        Self {
            prefixes: Vec::new(),
            suffixes: Vec::new(),
            exact: Vec::new(),
        }
    }

    pub fn is_preserved(&self, table_name: &str) -> bool {
        let name = table_name.to_ascii_lowercase();
        self.exact
            .iter()
            .any(|pattern| name == pattern.to_ascii_lowercase())
            || self
                .prefixes
                .iter()
                .any(|pattern| name.starts_with(&pattern.to_ascii_lowercase()))
            || self
                .suffixes
                .iter()
                .any(|pattern| name.ends_with(&pattern.to_ascii_lowercase()))
    }
}

/// Partition of a table set into kept and cleaned tables.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Classification {
    pub preserve: BTreeSet<TableRef>,
    pub clean: BTreeSet<TableRef>,
}

impl Classification {
    pub fn is_noop(&self) -> bool {
        self.clean.is_empty()
    }
}

pub fn classify_tables<'a, I>(tables: I, rules: &PreserveRules) -> Classification
where
    I: IntoIterator<Item = &'a TableRef>,
{
    let mut classification = Classification::default();
    for table in tables {
        if rules.is_preserved(&table.name) {
            classification.preserve.insert(table.clone());
        } else {
            classification.clean.insert(table.clone());
        }
    }
    classification
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
