mod registry;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use resetgen_core::{Error as CoreError, ResetConfig, redact_connection_string};
use resetgen_generate::{
    GenerateError, GenerateOptions, GenerationOutcome, PgScriptRunner, ResetGenerator,
    execute_reset_script,
};
use resetgen_introspect::PostgresAdapter;
use registry::{
    RunContext, RunOptions, RunPaths, RunStatus, init_run_logging, init_stderr_logging,
    start_run, write_outcome, write_plan,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("generation failed: {0}")]
    Generate(#[from] GenerateError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unsupported engine: {0}")]
    UnsupportedEngine(String),
}

#[derive(Parser, Debug)]
#[command(name = "resetgen", version, about = "Dependency-ordered database reset scripts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate, write and self-test a reset script.
    Generate(GenerateArgs),
    /// Print the table classification and deletion plan as JSON.
    Plan(PlanArgs),
    /// Execute a previously generated reset script.
    Reset(ResetArgs),
}

#[derive(Args, Debug)]
struct ConnArgs {
    /// Database connection string (flag form).
    #[arg(long, value_name = "CONNECTION_STRING", conflicts_with = "conn_pos")]
    conn: Option<String>,
    /// Database connection string (positional form).
    #[arg(value_name = "CONNECTION_STRING", required_unless_present = "conn")]
    conn_pos: Option<String>,
}

#[derive(Args, Debug)]
struct ScopeArgs {
    /// Schema name(s) holding application tables.
    #[arg(long, value_name = "SCHEMA")]
    schema: Vec<String>,
    /// Optional TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    conn: ConnArgs,
    #[command(flatten)]
    scope: ScopeArgs,
    /// Output path for the reset script.
    #[arg(long, value_name = "FILE")]
    out: PathBuf,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Self-test timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[command(flatten)]
    conn: ConnArgs,
    #[command(flatten)]
    scope: ScopeArgs,
}

#[derive(Args, Debug)]
struct ResetArgs {
    #[command(flatten)]
    conn: ConnArgs,
    /// Reset script to execute.
    #[arg(long, value_name = "FILE")]
    script: PathBuf,
    /// Optional TOML configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Execution timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args).await,
        Command::Plan(args) => run_plan(args).await,
        Command::Reset(args) => run_reset(args).await,
    }
}

async fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let GenerateArgs {
        conn,
        scope,
        out,
        run_dir,
        timeout_secs,
    } = args;

    let conn = resolve_connection(conn)?;
    let config = load_config(scope.config.as_deref(), scope.schema, timeout_secs)?;
    let options = GenerateOptions::from_config(&config);

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir,
        out: out.clone(),
        options: RunOptions {
            schemas: config.schemas.clone(),
            preserve_prefixes: config.preserve.prefixes.clone(),
            preserve_suffixes: config.preserve.suffixes.clone(),
            preserve_exact: config.preserve.exact.clone(),
            self_test_timeout_secs: config.self_test.timeout_secs,
            config_path: scope.config,
        },
        connection: redact_connection_string(&conn),
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        connection = %run_ctx.connection.redacted
    );
    let timer = Instant::now();

    let result = run_pipeline(&conn, options, &out, &run_ctx, &run_paths).await;
    finish_run(&run_paths, result, timer.elapsed().as_millis())
}

/// Connect, plan and generate. Every failure here happens after the run
/// directory exists and is recorded by [`finish_run`].
async fn run_pipeline(
    conn: &str,
    options: GenerateOptions,
    out: &Path,
    run_ctx: &RunContext,
    run_paths: &RunPaths,
) -> Result<GenerationOutcome, CliError> {
    let pool = connect(conn).await?;
    let source = PostgresAdapter::new(pool);
    let runner = PgScriptRunner::new(conn, options.self_test_timeout);
    let generator = ResetGenerator::new(&source, &runner, options);

    let mut plan = generator.plan().await?;
    plan.label_server_from(&run_ctx.connection);
    write_plan(run_paths, &plan)?;
    tracing::info!(event = "plan_written", path = %run_paths.plan_path.display());

    Ok(generator.generate_from_plan(&plan, out).await?)
}

fn finish_run(
    run_paths: &RunPaths,
    result: Result<GenerationOutcome, CliError>,
    duration_ms: u128,
) -> Result<(), CliError> {
    match result {
        Ok(outcome) => {
            write_outcome(run_paths, &RunStatus::Verified { outcome: &outcome })?;
            tracing::info!(
                event = "run_finished",
                status = "success",
                wrote_fallback = outcome.wrote_fallback,
                duration_ms = duration_ms
            );
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Err(err) => {
            write_outcome(
                run_paths,
                &RunStatus::Failed {
                    error: err.to_string(),
                },
            )?;
            tracing::error!(
                event = "run_finished",
                status = "failed",
                error = %err,
                duration_ms = duration_ms
            );
            Err(err)
        }
    }
}

async fn run_plan(args: PlanArgs) -> Result<(), CliError> {
    let PlanArgs { conn, scope } = args;

    let conn = resolve_connection(conn)?;
    let config = load_config(scope.config.as_deref(), scope.schema, None)?;
    let options = GenerateOptions::from_config(&config);
    init_stderr_logging()?;

    let pool = connect(&conn).await?;
    let source = PostgresAdapter::new(pool);
    // Planning never executes anything, so the runner is inert.
    let runner = PgScriptRunner::new(conn.as_str(), options.self_test_timeout);
    let mut plan = ResetGenerator::new(&source, &runner, options).plan().await?;
    plan.label_server_from(&redact_connection_string(&conn));

    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

async fn run_reset(args: ResetArgs) -> Result<(), CliError> {
    let ResetArgs {
        conn,
        script,
        config,
        timeout_secs,
    } = args;

    let conn = resolve_connection(conn)?;
    let config = load_config(config.as_deref(), Vec::new(), timeout_secs)?;
    init_stderr_logging()?;

    tracing::info!(
        event = "reset_requested",
        connection = %redact_connection_string(&conn).redacted,
        script = %script.display()
    );

    execute_reset_script(
        &conn,
        &script,
        config.self_test.timeout(),
        config.error_tail_chars,
    )
    .await?;
    Ok(())
}

fn resolve_connection(args: ConnArgs) -> Result<String, CliError> {
    let conn = match (args.conn, args.conn_pos) {
        (Some(value), None) => value,
        (None, Some(value)) => value,
        (Some(_), Some(_)) => {
            return Err(CliError::InvalidConfig(
                "use either --conn or positional connection string".to_string(),
            ));
        }
        (None, None) => {
            return Err(CliError::InvalidConfig(
                "connection string is required".to_string(),
            ));
        }
    };

    detect_engine(&conn)?;
    Ok(conn)
}

/// File settings first, then command-line overrides.
fn load_config(
    path: Option<&Path>,
    schemas: Vec<String>,
    timeout_secs: Option<u64>,
) -> Result<ResetConfig, CliError> {
    let mut config = ResetConfig::load_or_default(path)?;
    if !schemas.is_empty() {
        config.schemas = schemas;
    }
    if let Some(timeout_secs) = timeout_secs {
        config.self_test.timeout_secs = timeout_secs;
    }
    config.validate()?;
    Ok(config)
}

async fn connect(conn: &str) -> Result<PgPool, CliError> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(conn)
        .await
        .map_err(|err| CoreError::Connectivity(err.to_string()))?;
    Ok(pool)
}

fn detect_engine(conn: &str) -> Result<&'static str, CliError> {
    if conn.starts_with("postgres://") || conn.starts_with("postgresql://") {
        Ok("postgres")
    } else {
        Err(CliError::UnsupportedEngine(
            redact_connection_string(conn).redacted,
        ))
    }
}
