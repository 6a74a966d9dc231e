use std::path::Path;
use std::time::Duration;

use resetgen_core::{Error as CoreError, truncate_tail};

use crate::errors::{GenerateError, GenerateResult};
use crate::runner::{PgScriptRunner, ScriptRunError, ScriptRunner};

/// Run a previously generated reset script.
pub async fn execute_reset_script(
    connection_string: &str,
    script_path: &Path,
    timeout: Duration,
    error_tail_chars: usize,
) -> GenerateResult<()> {
    let runner = PgScriptRunner::new(connection_string, timeout);
    run_persisted_script(&runner, script_path, error_tail_chars).await
}

pub(crate) async fn run_persisted_script<R>(
    runner: &R,
    script_path: &Path,
    error_tail_chars: usize,
) -> GenerateResult<()>
where
    R: ScriptRunner + Sync,
{
    let sql = std::fs::read_to_string(script_path)?;
    tracing::info!(event = "reset_started", path = %script_path.display(), bytes = sql.len());

    match runner.run(&sql).await {
        Ok(()) => {
            tracing::info!(event = "reset_finished", status = "success");
            Ok(())
        }
        Err(ScriptRunError::Connect(message)) => {
            Err(CoreError::Connectivity(truncate_tail(&message, error_tail_chars)).into())
        }
        Err(ScriptRunError::Timeout(after)) => {
            tracing::error!(event = "reset_finished", status = "timeout", timeout_secs = after.as_secs());
            Err(GenerateError::Timeout(after))
        }
        Err(ScriptRunError::Execute(message)) => {
            let message = truncate_tail(&message, error_tail_chars);
            tracing::error!(event = "reset_finished", status = "failed", error = %message);
            Err(GenerateError::Execution(message))
        }
    }
}
