//! Reset script generation with self-test and fallback.

pub mod engine;
pub mod errors;
pub mod executor;
pub mod output;
pub mod planner;
pub mod runner;

pub use engine::{
    GenerateOptions, GenerationOutcome, GenerationPhase, ResetGenerator, generate_reset_script,
};
pub use errors::{GenerateError, GenerateResult};
pub use executor::execute_reset_script;
pub use planner::ResetPlan;
pub use runner::{PgScriptRunner, ScriptRunError, ScriptRunner};
