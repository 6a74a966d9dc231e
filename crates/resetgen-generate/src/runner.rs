use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, Executor, PgConnection};
use thiserror::Error;

/// SQLSTATE raised when `statement_timeout` cancels a statement.
const QUERY_CANCELED: &str = "57014";

/// Extra time the client waits for the server to report its own timeout.
const SERVER_CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Failure while running a reset script.
#[derive(Debug, Error)]
pub enum ScriptRunError {
    /// No connection could be opened; the script never ran.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The database rejected the script.
    #[error("{0}")]
    Execute(String),
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// Executes a complete SQL script against the target database.
#[async_trait]
pub trait ScriptRunner {
    async fn run(&self, sql: &str) -> Result<(), ScriptRunError>;
}

/// Runs scripts on a fresh Postgres connection per call.
///
/// The connection is discarded afterwards, so a script that fails inside its
/// own `BEGIN` block is rolled back by the server instead of leaking an
/// aborted transaction into a pool. The timeout is enforced server side
/// through `statement_timeout`, so a script that runs too long is cancelled
/// and rolled back rather than left to commit in the background.
#[derive(Debug, Clone)]
pub struct PgScriptRunner {
    connection_string: String,
    timeout: Duration,
}

impl PgScriptRunner {
    pub fn new(connection_string: impl Into<String>, timeout: Duration) -> Self {
        Self {
            connection_string: connection_string.into(),
            timeout,
        }
    }

    fn connect_options(&self) -> Result<PgConnectOptions, ScriptRunError> {
        let options = self
            .connection_string
            .parse::<PgConnectOptions>()
            .map_err(|err| ScriptRunError::Connect(err.to_string()))?;
        Ok(options.options([("statement_timeout", statement_timeout_ms(self.timeout))]))
    }

    async fn open(&self) -> Result<PgConnection, ScriptRunError> {
        let options = self.connect_options()?;
        match tokio::time::timeout(self.timeout, PgConnection::connect_with(&options)).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(err)) => Err(ScriptRunError::Connect(err.to_string())),
            Err(_) => Err(ScriptRunError::Connect(format!(
                "no connection within {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

#[async_trait]
impl ScriptRunner for PgScriptRunner {
    async fn run(&self, sql: &str) -> Result<(), ScriptRunError> {
        let mut conn = self.open().await?;

        let outcome = tokio::time::timeout(
            self.timeout + SERVER_CANCEL_GRACE,
            conn.execute(sqlx::raw_sql(sql)),
        )
        .await;

        match outcome {
            Ok(Ok(result)) => {
                tracing::debug!(event = "script_executed", rows_affected = result.rows_affected());
                let _ = conn.close().await;
                Ok(())
            }
            Ok(Err(err)) => {
                let _ = conn.close().await;
                if is_query_canceled(&err) {
                    Err(ScriptRunError::Timeout(self.timeout))
                } else {
                    Err(ScriptRunError::Execute(err.to_string()))
                }
            }
            // The server did not answer even after its own timeout; dropping
            // the connection closes the socket and the backend rolls back.
            Err(_) => Err(ScriptRunError::Timeout(self.timeout)),
        }
    }
}

/// `statement_timeout` value in milliseconds; zero would disable it.
fn statement_timeout_ms(timeout: Duration) -> u128 {
    timeout.as_millis().max(1)
}

fn is_query_canceled(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == QUERY_CANCELED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_timeout_never_disables_the_bound() {
        assert_eq!(statement_timeout_ms(Duration::from_secs(120)), 120_000);
        assert_eq!(statement_timeout_ms(Duration::ZERO), 1);
    }

    #[test]
    fn connect_options_reject_malformed_targets() {
        let runner = PgScriptRunner::new("not a url", Duration::from_secs(1));
        assert!(matches!(
            runner.connect_options(),
            Err(ScriptRunError::Connect(_))
        ));
    }

    #[test]
    fn non_database_errors_are_not_timeouts() {
        assert!(!is_query_canceled(&sqlx::Error::PoolTimedOut));
    }
}
