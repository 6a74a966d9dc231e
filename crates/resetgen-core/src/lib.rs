//! Core contracts and helpers for resetgen.
//!
//! This crate holds the schema snapshot model, table classification, the
//! foreign-key deletion planner, and the SQL reset script renderer. Nothing
//! here talks to a database.

pub mod classify;
pub mod config;
pub mod error;
pub mod graph;
pub mod model;
pub mod redaction;
pub mod script;
pub mod text;

pub use classify::{Classification, PreserveRules, classify_tables};
pub use config::{ResetConfig, SelfTestConfig};
pub use error::{Error, Result};
pub use graph::{DeletionPlan, build_deletion_plan};
pub use model::{ForeignKeyEdge, IdentityColumn, SchemaSnapshot, TableRef};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use script::{ResetScript, ScriptHeader, Strategy, render_noop_script, render_reset_script};
pub use text::{DEFAULT_ERROR_TAIL_CHARS, truncate_tail};

/// Name written into generated script headers.
pub const GENERATOR_NAME: &str = "resetgen";
