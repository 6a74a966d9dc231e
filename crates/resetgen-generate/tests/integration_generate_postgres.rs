use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

use anyhow::{Context, Result};
use resetgen_core::Strategy;
use resetgen_generate::{
    GenerateOptions, PgScriptRunner, ScriptRunError, ScriptRunner, execute_reset_script,
    generate_reset_script,
};
use resetgen_introspect::IntrospectOptions;
use sqlx::{PgPool, postgres::PgPoolOptions};

const SCHEMA: &str = "resetgen_generate";

fn database_url() -> Option<String> {
    env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .ok()
}

async fn connect(db_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(db_url)
        .await
        .context("connecting to Postgres")
}

async fn load_fixture(pool: &PgPool, name: &str) -> Result<()> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/sql/postgres")
        .join(name);
    let script = fs::read_to_string(&path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    sqlx::raw_sql(&script)
        .execute(pool)
        .await
        .with_context(|| format!("executing fixture {}", path.display()))?;
    Ok(())
}

async fn count(pool: &PgPool, table: &str) -> Result<i64> {
    count_in(pool, SCHEMA, table).await
}

async fn count_in(pool: &PgPool, schema: &str, table: &str) -> Result<i64> {
    let sql = format!("select count(*) from {schema}.{table}");
    let rows = sqlx::query_scalar::<_, i64>(&sql).fetch_one(pool).await?;
    Ok(rows)
}

#[tokio::test]
async fn generated_script_resets_application_tables() -> Result<()> {
    let Some(db_url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL for integration tests");
        return Ok(());
    };

    let pool = connect(&db_url).await?;
    load_fixture(&pool, "generate_schema.sql").await?;

    let options = GenerateOptions {
        introspect: IntrospectOptions::with_schemas(vec![SCHEMA.to_string()]),
        self_test_timeout: Duration::from_secs(60),
        ..GenerateOptions::default()
    };

    let out = env::temp_dir()
        .join(format!("resetgen_it_{}", std::process::id()))
        .join("reset.sql");

    let outcome = generate_reset_script(&pool, &db_url, &out, &options).await?;
    assert_eq!(outcome.tables_cleaned, 5);
    assert_eq!(outcome.tables_preserved, 1);
    assert_eq!(outcome.tables_circular, 2, "teams and members reference each other");
    assert!(outcome.self_tested);

    for table in ["customers", "orders", "order_lines", "teams", "members"] {
        assert_eq!(count(&pool, table).await?, 0, "{table} should be empty");
    }
    assert_eq!(count(&pool, "\"AbpSettings\"").await?, 1);

    let next_customer: i64 = sqlx::query_scalar(&format!(
        "insert into {SCHEMA}.customers (name) values ('Linus') returning id::bigint"
    ))
    .fetch_one(&pool)
    .await?;
    assert_eq!(next_customer, 1, "identity counters restart after reset");

    // Running the persisted script again on a clean database is a no-op.
    execute_reset_script(&db_url, &out, Duration::from_secs(60), 2000).await?;
    execute_reset_script(&db_url, &out, Duration::from_secs(60), 2000).await?;
    assert_eq!(count(&pool, "customers").await?, 0);
    assert_eq!(count(&pool, "\"AbpSettings\"").await?, 1);

    Ok(())
}

#[tokio::test]
async fn preserved_references_force_the_constraints_disabled_script() -> Result<()> {
    let Some(db_url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL for integration tests");
        return Ok(());
    };
    const FALLBACK_SCHEMA: &str = "resetgen_fallback";

    let pool = connect(&db_url).await?;
    load_fixture(&pool, "generate_fallback_schema.sql").await?;

    let options = GenerateOptions {
        introspect: IntrospectOptions::with_schemas(vec![FALLBACK_SCHEMA.to_string()]),
        self_test_timeout: Duration::from_secs(60),
        ..GenerateOptions::default()
    };
    let out = env::temp_dir()
        .join(format!("resetgen_it_fallback_{}", std::process::id()))
        .join("reset.sql");

    let outcome = generate_reset_script(&pool, &db_url, &out, &options).await?;
    assert!(outcome.wrote_fallback, "AbpUsers still references customers");
    assert_eq!(outcome.strategy, Strategy::ConstraintsDisabled);
    assert_eq!(outcome.tables_cleaned, 2);
    assert_eq!(outcome.tables_preserved, 1);

    let written = fs::read_to_string(&out)?;
    assert!(written.contains("-- strategy: constraints_disabled\n"));

    for table in ["customers", "orders"] {
        assert_eq!(count_in(&pool, FALLBACK_SCHEMA, table).await?, 0, "{table} should be empty");
    }
    assert_eq!(count_in(&pool, FALLBACK_SCHEMA, "\"AbpUsers\"").await?, 1);

    Ok(())
}

#[tokio::test]
async fn timed_out_script_is_cancelled_and_rolled_back() -> Result<()> {
    let Some(db_url) = database_url() else {
        eprintln!("skipping: set TEST_DATABASE_URL or DATABASE_URL for integration tests");
        return Ok(());
    };

    let pool = connect(&db_url).await?;
    sqlx::raw_sql(
        "drop schema if exists resetgen_timeout cascade;
         create schema resetgen_timeout;
         create table resetgen_timeout.items (id int primary key);
         insert into resetgen_timeout.items values (1), (2), (3);",
    )
    .execute(&pool)
    .await
    .context("creating timeout fixture")?;

    let runner = PgScriptRunner::new(db_url.as_str(), Duration::from_secs(1));
    let result = runner
        .run(
            "BEGIN;\n\
             DO $reset$ BEGIN PERFORM pg_sleep(3); DELETE FROM resetgen_timeout.items; END $reset$;\n\
             COMMIT;\n",
        )
        .await;
    assert!(
        matches!(result, Err(ScriptRunError::Timeout(after)) if after == Duration::from_secs(1)),
        "unexpected result: {result:?}"
    );

    // Give a runaway backend time to finish before checking nothing committed.
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(count_in(&pool, "resetgen_timeout", "items").await?, 3);

    Ok(())
}
