use crate::cli::{
    actions::{replay, stats, Action},
    telemetry,
};
use anyhow::Result;

/// Execute the provided action.
// This is the single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    let result = match action {
        Action::Replay(args) => replay::execute(args).await,
        Action::Stats(args) => stats::execute(&args),
    };

    telemetry::shutdown_tracer();
    result
}
