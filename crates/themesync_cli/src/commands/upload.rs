//! Upload command implementation.

use super::{finish, orchestrator, Options};

/// Runs the upload command.
pub async fn run(
    options: &Options,
    files: &[String],
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let orchestrator = orchestrator(options).await?;
    let report = orchestrator.upload(files, force).await;
    finish("upload", &report)
}
