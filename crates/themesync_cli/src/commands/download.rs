//! Download command implementation.

use super::{finish, orchestrator, Options};

/// Runs the download command.
///
/// File names may be glob patterns matched against remote assets.
pub async fn run(
    options: &Options,
    files: &[String],
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = orchestrator(options).await?;
    let report = orchestrator.download(files, force).await;
    finish("download", &report)
}
