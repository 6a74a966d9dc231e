use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use sqlx::PgPool;

use resetgen_core::{
    DEFAULT_ERROR_TAIL_CHARS, Error as CoreError, PreserveRules, ResetConfig, ResetScript,
    Strategy, redact_connection_string, truncate_tail,
};
use resetgen_introspect::{IntrospectOptions, PostgresAdapter, SchemaSource};

use crate::errors::{GenerateError, GenerateResult};
use crate::output::{discard_unverified, mark_failed, write_script_atomic};
use crate::planner::ResetPlan;
use crate::runner::{PgScriptRunner, ScriptRunError, ScriptRunner};

/// Options for a generation run.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub introspect: IntrospectOptions,
    pub preserve: PreserveRules,
    pub self_test_timeout: Duration,
    pub error_tail_chars: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self::from_config(&ResetConfig::default())
    }
}

impl GenerateOptions {
    pub fn from_config(config: &ResetConfig) -> Self {
        Self {
            introspect: IntrospectOptions::with_schemas(config.schemas.clone()),
            preserve: config.preserve.clone(),
            self_test_timeout: config.self_test.timeout(),
            error_tail_chars: config.error_tail_chars,
        }
    }
}

/// Lifecycle of a generated script.
///
/// `Draft -> SelfTesting -> Verified`, or on failure
/// `FallbackDraft -> FallbackTesting -> Verified | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationPhase {
    Draft,
    SelfTesting,
    FallbackDraft,
    FallbackTesting,
    Verified,
    Failed,
}

impl GenerationPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationPhase::Draft => "draft",
            GenerationPhase::SelfTesting => "self_testing",
            GenerationPhase::FallbackDraft => "fallback_draft",
            GenerationPhase::FallbackTesting => "fallback_testing",
            GenerationPhase::Verified => "verified",
            GenerationPhase::Failed => "failed",
        }
    }
}

/// Result of a verified generation.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationOutcome {
    pub tables_cleaned: usize,
    pub tables_preserved: usize,
    pub tables_circular: usize,
    pub wrote_fallback: bool,
    pub strategy: Strategy,
    /// False only for no-op scripts, which are never executed.
    pub self_tested: bool,
    pub script_path: PathBuf,
}

enum SelfTest {
    Passed,
    Failed(String),
}

/// Drives introspection, planning, script output and the two-tier self-test.
pub struct ResetGenerator<'a, S, R> {
    source: &'a S,
    runner: &'a R,
    options: GenerateOptions,
}

impl<'a, S, R> ResetGenerator<'a, S, R>
where
    S: SchemaSource + Sync,
    R: ScriptRunner + Sync,
{
    pub fn new(source: &'a S, runner: &'a R, options: GenerateOptions) -> Self {
        Self {
            source,
            runner,
            options,
        }
    }

    /// Introspect and plan without writing or executing anything.
    pub async fn plan(&self) -> GenerateResult<ResetPlan> {
        let snapshot = self.source.snapshot(&self.options.introspect).await?;
        let plan = ResetPlan::from_snapshot(&snapshot, &self.options.preserve);

        tracing::info!(
            event = "plan_built",
            engine = self.source.engine(),
            tables_cleaned = plan.tables_cleaned(),
            tables_preserved = plan.tables_preserved(),
            tables_circular = plan.plan.circular.len()
        );

        Ok(plan)
    }

    /// Generate, write and verify a reset script at `output_path`.
    ///
    /// The ordered script is tried first. If it fails, a script that
    /// suspends constraints on every cleaned table replaces it and is tested
    /// once. If that fails too the file is renamed to `<file>.failed` and a
    /// [`GenerateError::Fatal`] is returned. Any other error after the first
    /// write, such as lost connectivity, moves the file aside the same way.
    pub async fn generate(&self, output_path: &Path) -> GenerateResult<GenerationOutcome> {
        let plan = self.plan().await?;
        self.generate_from_plan(&plan, output_path).await
    }

    /// Like [`ResetGenerator::generate`] for a plan the caller already built.
    pub async fn generate_from_plan(
        &self,
        plan: &ResetPlan,
        output_path: &Path,
    ) -> GenerateResult<GenerationOutcome> {
        if plan.is_noop() {
            enter(GenerationPhase::Draft);
            let script = plan.render(Strategy::Ordered, Utc::now());
            write_script_atomic(output_path, &script.sql)?;
            tracing::info!(event = "noop_script_written", path = %output_path.display());
            enter(GenerationPhase::Verified);
            return Ok(outcome(plan, &script, false, output_path));
        }

        enter(GenerationPhase::Draft);
        let primary = self.draft(plan, Strategy::Ordered, output_path)?;

        // From here on the output path holds an unverified script; every
        // error exit other than `Fatal` (which already moved it) moves it aside.
        match self.verify(plan, primary, output_path).await {
            Err(err) if !matches!(err, GenerateError::Fatal { .. }) => {
                enter(GenerationPhase::Failed);
                discard_unverified(output_path);
                Err(err)
            }
            result => result,
        }
    }

    async fn verify(
        &self,
        plan: &ResetPlan,
        primary: ResetScript,
        output_path: &Path,
    ) -> GenerateResult<GenerationOutcome> {
        enter(GenerationPhase::SelfTesting);
        let primary_error = match self.self_test(&primary).await? {
            SelfTest::Passed => {
                enter(GenerationPhase::Verified);
                return Ok(outcome(plan, &primary, true, output_path));
            }
            SelfTest::Failed(message) => message,
        };
        tracing::warn!(event = "self_test_failed", strategy = %primary.strategy, error = %primary_error);

        enter(GenerationPhase::FallbackDraft);
        let fallback = self.draft(plan, Strategy::ConstraintsDisabled, output_path)?;

        enter(GenerationPhase::FallbackTesting);
        match self.self_test(&fallback).await? {
            SelfTest::Passed => {
                enter(GenerationPhase::Verified);
                Ok(outcome(plan, &fallback, true, output_path))
            }
            SelfTest::Failed(fallback_error) => {
                enter(GenerationPhase::Failed);
                tracing::error!(event = "self_test_failed", strategy = %fallback.strategy, error = %fallback_error);
                let failed_path = mark_failed(output_path)?;
                Err(GenerateError::Fatal {
                    failed_path,
                    primary: primary_error,
                    fallback: fallback_error,
                })
            }
        }
    }

    fn draft(
        &self,
        plan: &ResetPlan,
        strategy: Strategy,
        output_path: &Path,
    ) -> GenerateResult<ResetScript> {
        let script = plan.render(strategy, Utc::now());
        write_script_atomic(output_path, &script.sql)?;
        tracing::info!(
            event = "script_written",
            strategy = %strategy,
            path = %output_path.display(),
            bytes = script.sql.len()
        );
        Ok(script)
    }

    async fn self_test(&self, script: &ResetScript) -> GenerateResult<SelfTest> {
        match self.runner.run(&script.sql).await {
            Ok(()) => {
                tracing::info!(event = "self_test_passed", strategy = %script.strategy);
                Ok(SelfTest::Passed)
            }
            Err(ScriptRunError::Connect(message)) => Err(CoreError::Connectivity(
                truncate_tail(&message, self.error_tail_chars()),
            )
            .into()),
            Err(err) => Ok(SelfTest::Failed(truncate_tail(
                &err.to_string(),
                self.error_tail_chars(),
            ))),
        }
    }

    fn error_tail_chars(&self) -> usize {
        if self.options.error_tail_chars == 0 {
            DEFAULT_ERROR_TAIL_CHARS
        } else {
            self.options.error_tail_chars
        }
    }
}

fn enter(phase: GenerationPhase) {
    tracing::info!(event = "phase_entered", phase = phase.as_str());
}

fn outcome(
    plan: &ResetPlan,
    script: &ResetScript,
    self_tested: bool,
    output_path: &Path,
) -> GenerationOutcome {
    GenerationOutcome {
        tables_cleaned: plan.tables_cleaned(),
        tables_preserved: plan.tables_preserved(),
        tables_circular: plan.plan.circular.len(),
        wrote_fallback: script.strategy == Strategy::ConstraintsDisabled,
        strategy: script.strategy,
        self_tested,
        script_path: output_path.to_path_buf(),
    }
}

/// Generate a verified reset script for the database behind `pool`.
///
/// Catalog reads go through `pool`; each self-test opens its own connection
/// from `connection_string`.
pub async fn generate_reset_script(
    pool: &PgPool,
    connection_string: &str,
    output_path: &Path,
    options: &GenerateOptions,
) -> GenerateResult<GenerationOutcome> {
    let source = PostgresAdapter::new(pool.clone());
    let runner = PgScriptRunner::new(connection_string, options.self_test_timeout);
    let generator = ResetGenerator::new(&source, &runner, options.clone());
    let mut plan = generator.plan().await?;
    plan.label_server_from(&redact_connection_string(connection_string));
    generator.generate_from_plan(&plan, output_path).await
}
