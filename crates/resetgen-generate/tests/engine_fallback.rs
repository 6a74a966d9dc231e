use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use resetgen_core::{
    Error as CoreError, ForeignKeyEdge, IdentityColumn, Result as CoreResult, SchemaSnapshot,
    Strategy, TableRef,
};
use resetgen_generate::{
    GenerateError, GenerateOptions, ResetGenerator, ScriptRunError, ScriptRunner,
};
use resetgen_introspect::{IntrospectOptions, SchemaSource};

struct FakeSource {
    snapshot: SchemaSnapshot,
}

#[async_trait]
impl SchemaSource for FakeSource {
    fn engine(&self) -> &'static str {
        "fake"
    }

    async fn snapshot(&self, _opts: &IntrospectOptions) -> CoreResult<SchemaSnapshot> {
        Ok(self.snapshot.clone())
    }
}

struct FailingSource;

#[async_trait]
impl SchemaSource for FailingSource {
    fn engine(&self) -> &'static str {
        "fake"
    }

    async fn snapshot(&self, _opts: &IntrospectOptions) -> CoreResult<SchemaSnapshot> {
        Err(CoreError::Connectivity("connection refused".to_string()))
    }
}

/// Replays scripted outcomes and records every script it was asked to run.
struct FakeRunner {
    outcomes: Mutex<VecDeque<Result<(), ScriptRunError>>>,
    scripts: Mutex<Vec<String>>,
}

impl FakeRunner {
    fn new(outcomes: Vec<Result<(), ScriptRunError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            scripts: Mutex::new(Vec::new()),
        }
    }

    fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScriptRunner for FakeRunner {
    async fn run(&self, sql: &str) -> Result<(), ScriptRunError> {
        self.scripts.lock().unwrap().push(sql.to_string());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

fn app(name: &str) -> TableRef {
    TableRef::new("app", name)
}

fn shop_snapshot() -> SchemaSnapshot {
    SchemaSnapshot {
        database: Some("shop".to_string()),
        server: Some("localhost:5432".to_string()),
        tables: ["AbpUsers", "Orders", "OrderLines", "X", "Y"]
            .iter()
            .map(|name| app(name))
            .collect(),
        foreign_keys: vec![
            ForeignKeyEdge::new(app("Orders"), app("OrderLines")),
            ForeignKeyEdge::new(app("X"), app("Y")),
            ForeignKeyEdge::new(app("Y"), app("X")),
        ],
        identity_columns: vec![IdentityColumn {
            table: app("Orders"),
            column: "Id".to_string(),
        }],
    }
}

fn temp_out_path(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("resetgen_generate_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp out dir");
    dir.join("reset.sql")
}

fn options() -> GenerateOptions {
    GenerateOptions {
        self_test_timeout: Duration::from_secs(5),
        error_tail_chars: 64,
        ..GenerateOptions::default()
    }
}

#[tokio::test]
async fn ordered_script_is_verified_on_first_attempt() {
    let source = FakeSource {
        snapshot: shop_snapshot(),
    };
    let runner = FakeRunner::new(vec![Ok(())]);
    let out = temp_out_path("primary");

    let outcome = ResetGenerator::new(&source, &runner, options())
        .generate(&out)
        .await
        .expect("generation succeeds");

    assert_eq!(outcome.tables_cleaned, 4);
    assert_eq!(outcome.tables_preserved, 1);
    assert_eq!(outcome.tables_circular, 2);
    assert!(!outcome.wrote_fallback);
    assert!(outcome.self_tested);
    assert_eq!(outcome.strategy, Strategy::Ordered);

    let written = fs::read_to_string(&out).expect("script on disk");
    assert_eq!(runner.scripts(), vec![written.clone()]);
    assert!(written.contains("-- strategy: ordered\n"));
    assert!(written.contains("-- database: shop\n"));
    assert!(!written.contains("AbpUsers"));
}

#[tokio::test]
async fn failed_self_test_falls_back_to_disabled_constraints() {
    let source = FakeSource {
        snapshot: shop_snapshot(),
    };
    let runner = FakeRunner::new(vec![
        Err(ScriptRunError::Execute(
            "update or delete on table \"Orders\" violates foreign key constraint".to_string(),
        )),
        Ok(()),
    ]);
    let out = temp_out_path("fallback");

    let outcome = ResetGenerator::new(&source, &runner, options())
        .generate(&out)
        .await
        .expect("fallback succeeds");

    assert!(outcome.wrote_fallback);
    assert_eq!(outcome.strategy, Strategy::ConstraintsDisabled);

    let scripts = runner.scripts();
    assert_eq!(scripts.len(), 2);
    assert!(scripts[0].contains("-- strategy: ordered\n"));
    assert!(scripts[1].contains("-- strategy: constraints_disabled\n"));
    assert!(scripts[1].contains("ALTER TABLE \"app\".\"Orders\" DISABLE TRIGGER ALL;"));

    let written = fs::read_to_string(&out).expect("script on disk");
    assert_eq!(written, scripts[1]);
}

#[tokio::test]
async fn timeouts_count_as_self_test_failures() {
    let source = FakeSource {
        snapshot: shop_snapshot(),
    };
    let runner = FakeRunner::new(vec![Err(ScriptRunError::Timeout(Duration::from_secs(5))), Ok(())]);
    let out = temp_out_path("timeout");

    let outcome = ResetGenerator::new(&source, &runner, options())
        .generate(&out)
        .await
        .expect("fallback succeeds");
    assert!(outcome.wrote_fallback);
}

#[tokio::test]
async fn double_failure_is_fatal_and_moves_script_aside() {
    let source = FakeSource {
        snapshot: shop_snapshot(),
    };
    let long_error = format!("{}permission denied: \"RI_ConstraintTrigger\" is a system trigger", "noise ".repeat(100));
    let runner = FakeRunner::new(vec![
        Err(ScriptRunError::Execute("violates foreign key constraint".to_string())),
        Err(ScriptRunError::Execute(long_error)),
    ]);
    let out = temp_out_path("fatal");

    let err = ResetGenerator::new(&source, &runner, options())
        .generate(&out)
        .await
        .expect_err("both strategies fail");

    match err {
        GenerateError::Fatal {
            failed_path,
            primary,
            fallback,
        } => {
            assert_eq!(primary, "violates foreign key constraint");
            assert!(fallback.starts_with("..."));
            assert!(fallback.ends_with("is a system trigger"));
            assert!(fallback.chars().count() <= 64 + 3);
            assert!(failed_path.exists());
            assert!(!out.exists(), "an unverified script must not stay current");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.scripts().len(), 2);
}

#[tokio::test]
async fn connectivity_loss_during_self_test_skips_fallback() {
    let source = FakeSource {
        snapshot: shop_snapshot(),
    };
    let runner = FakeRunner::new(vec![Err(ScriptRunError::Connect("connection refused".to_string()))]);
    let out = temp_out_path("connect");

    let err = ResetGenerator::new(&source, &runner, options())
        .generate(&out)
        .await
        .expect_err("connectivity is fatal");

    assert!(matches!(err, GenerateError::Core(CoreError::Connectivity(_))));
    assert_eq!(runner.scripts().len(), 1);
    assert!(!out.exists(), "an unverified script must not stay current");
    let parked = fs::read_to_string(out.with_file_name("reset.sql.failed")).expect("parked script");
    assert!(parked.contains("-- strategy: ordered\n"));
}

#[tokio::test]
async fn connectivity_loss_during_fallback_test_moves_script_aside() {
    let source = FakeSource {
        snapshot: shop_snapshot(),
    };
    let runner = FakeRunner::new(vec![
        Err(ScriptRunError::Execute("fk violation".to_string())),
        Err(ScriptRunError::Connect("connection refused".to_string())),
    ]);
    let out = temp_out_path("connect_fallback");

    let err = ResetGenerator::new(&source, &runner, options())
        .generate(&out)
        .await
        .expect_err("connectivity is fatal");

    assert!(matches!(err, GenerateError::Core(CoreError::Connectivity(_))));
    assert_eq!(runner.scripts().len(), 2);
    assert!(!out.exists(), "an unverified script must not stay current");
    let parked = fs::read_to_string(out.with_file_name("reset.sql.failed")).expect("parked script");
    assert!(parked.contains("-- strategy: constraints_disabled\n"));
}

#[tokio::test]
async fn catalog_failure_is_propagated_immediately() {
    let runner = FakeRunner::new(Vec::new());
    let out = temp_out_path("catalog");

    let err = ResetGenerator::new(&FailingSource, &runner, options())
        .generate(&out)
        .await
        .expect_err("catalog failure");

    assert!(matches!(err, GenerateError::Core(CoreError::Connectivity(_))));
    assert!(runner.scripts().is_empty());
    assert!(!out.exists());
}

#[tokio::test]
async fn empty_schema_writes_noop_without_self_test() {
    let source = FakeSource {
        snapshot: SchemaSnapshot {
            database: Some("empty".to_string()),
            ..SchemaSnapshot::default()
        },
    };
    let runner = FakeRunner::new(Vec::new());
    let out = temp_out_path("noop");

    let outcome = ResetGenerator::new(&source, &runner, options())
        .generate(&out)
        .await
        .expect("noop succeeds");

    assert_eq!(outcome.tables_cleaned, 0);
    assert!(!outcome.self_tested);
    assert!(runner.scripts().is_empty());
    let written = fs::read_to_string(&out).expect("noop script on disk");
    assert!(written.contains("nothing to reset"));
}

#[tokio::test]
async fn plan_only_does_not_touch_the_runner() {
    let source = FakeSource {
        snapshot: shop_snapshot(),
    };
    let runner = FakeRunner::new(Vec::new());

    let plan = ResetGenerator::new(&source, &runner, options())
        .plan()
        .await
        .expect("plan builds");

    assert_eq!(plan.plan.order, vec![app("OrderLines"), app("Orders")]);
    assert_eq!(plan.plan.circular, vec![app("X"), app("Y")]);
    assert!(runner.scripts().is_empty());
}
